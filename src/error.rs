use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("not authorized: {0}")]
    Unauthenticated(String),

    #[error("conflict: {0}")]
    Conflict(String),

    // Provider failures keep the raw text so a bad response can be diagnosed
    #[error("upstream error: {message}")]
    Upstream {
        message: String,
        raw_response: Option<String>,
    },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Error::Upstream {
            message: message.into(),
            raw_response: None,
        }
    }

    pub fn upstream_with_raw(message: impl Into<String>, raw: impl Into<String>) -> Self {
        Error::Upstream {
            message: message.into(),
            raw_response: Some(raw.into()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::Validation(_) => "validation",
            Error::Unauthenticated(_) => "unauthenticated",
            Error::Conflict(_) => "conflict",
            Error::Upstream { .. } => "upstream",
            Error::Database(_) => "database",
            Error::Serialization(_) => "serialization",
            Error::Storage(_) => "storage",
            Error::Internal(_) => "internal",
        }
    }

    /// Only a lost optimistic-version race or a flaky provider is worth
    /// retrying unchanged; everything else needs corrected input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict(_) | Error::Upstream { .. })
    }

    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::Upstream { raw_response, .. } => raw_response.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message() {
        let err = Error::not_found("Class");
        assert_eq!(err.to_string(), "Class not found");
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn retryable_kinds() {
        assert!(Error::Conflict("stale".into()).is_retryable());
        assert!(Error::upstream("quota").is_retryable());
        assert!(!Error::not_found("Folder").is_retryable());
        assert!(!Error::validation("Title is required").is_retryable());
        assert!(!Error::Unauthenticated("no token".into()).is_retryable());
    }

    #[test]
    fn upstream_keeps_raw_response() {
        let err = Error::upstream_with_raw("Invalid AI response: missing nextSteps", "{ }");
        assert_eq!(err.raw_response(), Some("{ }"));
        assert!(Error::upstream("boom").raw_response().is_none());
    }

    #[test]
    fn io_errors_convert_to_storage() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: Error = io.into();
        assert_eq!(err.kind(), "storage");
    }
}
