use bigdecimal::{BigDecimal, Zero};
use std::fmt;

pub const TRANSACTION_ID_MAX_LEN: usize = 128;
pub const USER_ID_MAX_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_positive(field: &'static str, value: &BigDecimal) -> ValidationResult {
    if value <= &BigDecimal::zero() {
        return Err(ValidationError::new(field, "must be greater than zero"));
    }

    Ok(())
}

pub fn validate_finite(field: &'static str, values: &[f32]) -> ValidationResult {
    if let Some(position) = values.iter().position(|v| !v.is_finite()) {
        return Err(ValidationError::new(
            field,
            format!("component {} is not a finite number", position),
        ));
    }

    Ok(())
}
