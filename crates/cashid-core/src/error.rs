use thiserror::Error;

/// Capability-level error type.
///
/// These errors describe failures of the injected collaborators (cache,
/// notary) and of the engine's own plumbing, never protocol-level rejections.
/// Protocol rejections travel through the confirmation channel as status
/// codes; see `cashid-engine`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CashIdError {
    #[error("cache error: {0}")]
    Cache(String),

    #[error("notary error: {0}")]
    Notary(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type CashIdResult<T> = Result<T, CashIdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CashIdError::Cache("store failed".into());
        assert_eq!(err.to_string(), "cache error: store failed");
    }

    #[test]
    fn test_all_variants_display() {
        let variants = vec![
            CashIdError::Cache("x".into()),
            CashIdError::Notary("x".into()),
            CashIdError::Encoding("x".into()),
            CashIdError::Internal("x".into()),
        ];
        for v in variants {
            assert!(!v.to_string().is_empty());
        }
    }
}
