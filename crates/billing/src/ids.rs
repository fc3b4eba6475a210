//! Billing identifiers.

use payhint_core::uuid_newtype;

uuid_newtype! {
    /// Invoice identifier (aggregate root).
    pub struct InvoiceId;
}

uuid_newtype! {
    /// Installment identifier, unique within its invoice.
    pub struct InstallmentId;
}

uuid_newtype! {
    /// Payment identifier, unique within its installment.
    pub struct PaymentId;
}
