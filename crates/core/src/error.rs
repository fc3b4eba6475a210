//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error shared by every bounded context.
///
/// Context-specific failures (billing ceilings, archived invoices, ...) live in
/// the owning crate and convert from this type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A required property was missing or blank at construction time.
    #[error("invalid property: {0}")]
    InvalidProperty(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn invalid_property(msg: impl Into<String>) -> Self {
        Self::InvalidProperty(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}

/// Reject a blank (empty or whitespace-only) string property.
pub fn ensure_not_blank(field: &str, value: &str) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::invalid_property(format!("{field} cannot be blank")));
    }
    Ok(())
}
