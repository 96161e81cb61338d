// crates/client/src/error.rs
//! API error taxonomy.
//!
//! Expected steady states (409 "already running", 404 "no scan yet")
//! are typed, inspectable values intercepted at this boundary, never
//! thrown as generic failures to UI code.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// 401 — session-terminating; never retried.
    #[error("session expired")]
    Unauthorized,

    /// 404 on a results read: "nothing there yet", an empty state.
    #[error("resource not found")]
    NotFound,

    /// 409 on a trigger: the operation is already in flight; callers
    /// resynchronize instead of erroring.
    #[error("operation already in progress")]
    Conflict,

    /// Any other non-2xx response, with the server's `detail` message
    /// when the body carried one.
    #[error("server error ({status}): {detail}")]
    Server { status: u16, detail: String },

    /// Network-level failure (connect, DNS, body read).
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ApiError::Conflict)
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inspectors_match_their_variants() {
        assert!(ApiError::NotFound.is_not_found());
        assert!(ApiError::Conflict.is_conflict());
        assert!(ApiError::Unauthorized.is_unauthorized());
        assert!(!ApiError::Conflict.is_not_found());

        let err = ApiError::Server {
            status: 503,
            detail: "maintenance".into(),
        };
        assert!(!err.is_conflict());
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("maintenance"));
    }
}
