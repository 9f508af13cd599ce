use thiserror::Error;

/// Classified failure of a core operation.
///
/// Every mutating operation either commits completely or returns one of these
/// with nothing persisted.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Caller input fault (non-positive hours, unknown activity, wrong role
    /// on the target account, duplicate name). Not retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// The row is absent. For requests this usually means someone else has
    /// already resolved it.
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    /// Two mutations of the same request or counter could not be serialized
    /// in time. Retry the whole operation once.
    #[error("conflicting concurrent update of {resource}; retry the operation")]
    Conflict { resource: String },

    /// The durable store is unavailable or corrupt.
    #[error("storage failure: {0}")]
    Storage(#[from] std::io::Error),

    /// The caller's asserted role does not permit this operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl LedgerError {
    pub fn not_found(kind: &'static str, key: impl ToString) -> Self {
        LedgerError::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation(message.into())
    }

    pub fn corrupt(message: impl Into<String>) -> Self {
        LedgerError::Storage(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            message.into(),
        ))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LedgerError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(LedgerError::Conflict {
            resource: "request#1".into()
        }
        .is_retryable());
        assert!(!LedgerError::validation("hours must be positive").is_retryable());
        assert!(!LedgerError::not_found("request", "request#1").is_retryable());
        assert!(!LedgerError::corrupt("bad frame").is_retryable());
    }

    #[test]
    fn messages_name_the_missing_row() {
        let err = LedgerError::not_found("request", "request#3");
        assert_eq!(err.to_string(), "request not found: request#3");
        assert!(err.is_not_found());
    }
}
