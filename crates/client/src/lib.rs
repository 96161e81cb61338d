// crates/client/src/lib.rs
pub mod api;
pub mod chat;
pub mod error;
pub mod poller;

pub use api::*;
pub use chat::*;
pub use error::*;
pub use poller::*;
