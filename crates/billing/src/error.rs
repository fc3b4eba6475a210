//! Billing error taxonomy.

use payhint_core::DomainError;
use thiserror::Error;

use crate::ids::{InstallmentId, InvoiceId, PaymentId};

pub type BillingResult<T> = Result<T, BillingError>;

/// Every way a billing mutation or construction can be rejected.
///
/// Errors are raised before any state changes, so a failed call leaves the
/// aggregate exactly as it was.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BillingError {
    /// A required field is missing or blank.
    #[error("invalid property: {0}")]
    InvalidProperty(String),

    /// An identifier string is not a UUID.
    #[error("invalid id format: {0}")]
    InvalidIdFormat(String),

    /// Negative amount, subtraction underflow, or a violated amount ceiling.
    #[error("invalid money value: {0}")]
    InvalidMoneyValue(String),

    #[error(
        "installment does not belong to invoice (installment: {}, invoice: {})",
        display_opt(.installment_id),
        display_opt(.invoice_id)
    )]
    InstallmentDoesNotBelongToInvoice {
        installment_id: Option<InstallmentId>,
        invoice_id: Option<InvoiceId>,
    },

    #[error(
        "payment does not belong to installment (payment: {}, installment: {})",
        display_opt(.payment_id),
        display_opt(.installment_id)
    )]
    PaymentDoesNotBelongToInstallment {
        payment_id: Option<PaymentId>,
        installment_id: Option<InstallmentId>,
    },

    /// An id or due date already exists in the target collection.
    #[error("duplicate entity: {0}")]
    DuplicateEntity(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invoice {} is archived and cannot be modified", display_opt(.0))]
    ArchivedInvoiceViolation(Option<InvoiceId>),
}

fn display_opt<T: core::fmt::Display>(value: &Option<T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "<unassigned>".to_string(),
    }
}

impl BillingError {
    pub fn invalid_property(msg: impl Into<String>) -> Self {
        Self::InvalidProperty(msg.into())
    }

    pub fn invalid_money(msg: impl Into<String>) -> Self {
        Self::InvalidMoneyValue(msg.into())
    }

    pub fn duplicate(msg: impl Into<String>) -> Self {
        Self::DuplicateEntity(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Stable machine-readable code, for collaborators that translate errors
    /// into protocol-level failures.
    pub fn kind(&self) -> &'static str {
        match self {
            BillingError::InvalidProperty(_) => "invalid_property",
            BillingError::InvalidIdFormat(_) => "invalid_id_format",
            BillingError::InvalidMoneyValue(_) => "invalid_money_value",
            BillingError::InstallmentDoesNotBelongToInvoice { .. } => {
                "installment_does_not_belong_to_invoice"
            }
            BillingError::PaymentDoesNotBelongToInstallment { .. } => {
                "payment_does_not_belong_to_installment"
            }
            BillingError::DuplicateEntity(_) => "duplicate_entity",
            BillingError::NotFound(_) => "not_found",
            BillingError::ArchivedInvoiceViolation(_) => "archived_invoice_violation",
        }
    }
}

impl From<DomainError> for BillingError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::InvalidProperty(msg) => BillingError::InvalidProperty(msg),
            DomainError::InvalidId(msg) => BillingError::InvalidIdFormat(msg),
        }
    }
}
