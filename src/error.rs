use thiserror::Error;

/// Errors raised at the backend boundary.
///
/// Everything above the fetcher/dispatcher layer converts these into a
/// message string plus an error flag; none of them end the process.
#[derive(Debug, Error)]
pub enum DeskError {
    /// The request could not complete (connection, timeout, TLS, ...).
    #[error("network error: {0}")]
    Network(String),

    /// The request completed but the backend rejected it.
    #[error("backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    /// A row or a piece of persisted local state had an unexpected shape.
    #[error("parse error: {0}")]
    Parse(String),

    /// A compare-and-swap update found the record changed since it was read.
    #[error("conflict: {0} was modified by someone else")]
    Conflict(String),
}

impl DeskError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        DeskError::Backend {
            status: 404,
            message: format!("{what} not found"),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DeskError::Backend { status: 404, .. })
    }

    /// Network failures, rate limiting and server-side faults are worth
    /// another attempt. Validation and not-found rejections are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            DeskError::Network(_) => true,
            DeskError::Backend { status, .. } => *status == 429 || *status >= 500,
            DeskError::Parse(_) | DeskError::Conflict(_) => false,
        }
    }
}

impl From<reqwest::Error> for DeskError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DeskError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            DeskError::Backend {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            DeskError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DeskError {
    fn from(err: serde_json::Error) -> Self {
        DeskError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(DeskError::Network("reset".into()).is_retryable());
        assert!(DeskError::Backend { status: 503, message: "down".into() }.is_retryable());
        assert!(DeskError::Backend { status: 429, message: "slow".into() }.is_retryable());
        assert!(!DeskError::Backend { status: 400, message: "bad".into() }.is_retryable());
        assert!(!DeskError::not_found("ticket T1").is_retryable());
        assert!(!DeskError::Parse("x".into()).is_retryable());
        assert!(!DeskError::Conflict("T1".into()).is_retryable());
    }

    #[test]
    fn not_found_is_a_backend_rejection() {
        let err = DeskError::not_found("ticket T9");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "backend error (404): ticket T9 not found");
    }
}
