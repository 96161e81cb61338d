// crates/core/src/lib.rs
pub mod chat;
pub mod keys;
pub mod phase;
pub mod poll;
pub mod reconcile;
pub mod registry;
pub mod sse;
pub mod status;
pub mod task;

pub use chat::*;
pub use keys::*;
pub use phase::*;
pub use poll::*;
pub use reconcile::*;
pub use registry::*;
pub use sse::*;
pub use status::*;
pub use task::*;
