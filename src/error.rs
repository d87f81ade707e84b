use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::validation::ValidationError;

/// Classification recorded with every dead-letter entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    InvalidInput,
    ProviderUnavailable,
    Transient,
    Permanent,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::InvalidInput => "invalid_input",
            FailureClass::ProviderUnavailable => "provider_unavailable",
            FailureClass::Transient => "transient",
            FailureClass::Permanent => "permanent",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FailureClass::ProviderUnavailable | FailureClass::Transient
        )
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FailureClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invalid_input" => Ok(FailureClass::InvalidInput),
            "provider_unavailable" => Ok(FailureClass::ProviderUnavailable),
            "transient" => Ok(FailureClass::Transient),
            "permanent" => Ok(FailureClass::Permanent),
            other => Err(format!("unknown failure class '{}'", other)),
        }
    }
}

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Invalid embedding input: {0}")]
    InvalidInput(String),

    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),
}

impl EmbeddingError {
    pub fn class(&self) -> FailureClass {
        match self {
            EmbeddingError::ProviderUnavailable(_) => FailureClass::ProviderUnavailable,
            EmbeddingError::InvalidInput(_) => FailureClass::InvalidInput,
            EmbeddingError::InvalidResponse(_) => FailureClass::Permanent,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class().is_retryable()
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Transient storage failure: {0}")]
    Transient(String),

    #[error("Permanent storage failure: {0}")]
    Permanent(String),
}

impl StoreError {
    pub fn class(&self) -> FailureClass {
        match self {
            StoreError::Transient(_) => FailureClass::Transient,
            StoreError::Permanent(_) => FailureClass::Permanent,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => match db.code() {
                // SQLSTATE class 22 (data exception) and 23 (integrity constraint)
                Some(code) if code.starts_with("22") || code.starts_with("23") => {
                    StoreError::Permanent(err.to_string())
                }
                _ => StoreError::Transient(err.to_string()),
            },
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::TypeNotFound { .. }
            | sqlx::Error::Decode(_) => StoreError::Permanent(err.to_string()),
            _ => StoreError::Transient(err.to_string()),
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(err: ValidationError) -> Self {
        StoreError::Permanent(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Stream transport error: {0}")]
    Transport(String),

    #[error("Offset commit failed: {0}")]
    Commit(String),

    #[error("Malformed payload: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_error_classes() {
        assert_eq!(
            EmbeddingError::ProviderUnavailable("timeout".into()).class(),
            FailureClass::ProviderUnavailable
        );
        assert!(EmbeddingError::ProviderUnavailable("timeout".into()).is_retryable());
        assert!(!EmbeddingError::InvalidInput("empty".into()).is_retryable());
        assert_eq!(
            EmbeddingError::InvalidResponse("bad length".into()).class(),
            FailureClass::Permanent
        );
    }

    #[test]
    fn test_pool_timeout_is_transient() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_row_not_found_is_transient_by_default() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.class(), FailureClass::Transient);
    }

    #[test]
    fn test_column_not_found_is_permanent() {
        let err = StoreError::from(sqlx::Error::ColumnNotFound("embedding".into()));
        assert_eq!(err.class(), FailureClass::Permanent);
    }

    #[test]
    fn test_failure_class_round_trip() {
        for class in [
            FailureClass::InvalidInput,
            FailureClass::ProviderUnavailable,
            FailureClass::Transient,
            FailureClass::Permanent,
        ] {
            assert_eq!(class.as_str().parse::<FailureClass>().unwrap(), class);
        }
        assert!("unknown".parse::<FailureClass>().is_err());
    }
}
