use thiserror::Error;

/// Core error types for CareHub operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Invalid time slot '{0}', expected HH:MM")]
    InvalidSlot(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CoreError {
    pub fn invalid_date(value: impl Into<String>) -> Self {
        Self::InvalidDate(value.into())
    }

    pub fn invalid_slot(value: impl Into<String>) -> Self {
        Self::InvalidSlot(value.into())
    }

    /// Errors caused by the caller's input (4xx category)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidDate(_) | Self::InvalidSlot(_))
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_date_error() {
        let err = CoreError::invalid_date("2026/01/01");
        assert_eq!(
            err.to_string(),
            "Invalid date '2026/01/01', expected YYYY-MM-DD"
        );
        assert!(err.is_client_error());
    }

    #[test]
    fn test_json_error_is_not_client_error() {
        let err: CoreError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(!err.is_client_error());
    }
}
