//! Invoice persistence boundary.
//!
//! The repository stores and returns whole invoice graphs. Every write is
//! checked against the version the caller loaded (optimistic concurrency), so
//! two writers racing on the same invoice cannot both win.

pub mod in_memory;

use std::sync::Arc;

use thiserror::Error;

use payhint_billing::{BillingError, Invoice, InvoiceId, InvoiceReference};
use payhint_core::ExpectedVersion;

pub use in_memory::InMemoryInvoiceRepository;

/// Repository operation error.
///
/// These are storage errors; domain rule violations never originate here
/// except when a stored record no longer satisfies the invariants (`Corrupt`).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("invoice not found: {0}")]
    NotFound(InvoiceId),

    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    #[error("invoice reference already in use: {0}")]
    DuplicateReference(InvoiceReference),

    #[error("stored invoice is corrupt: {0}")]
    Corrupt(#[source] BillingError),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Whole-aggregate store for invoices.
///
/// ## Versions
///
/// An invoice that was never stored is at version `0`. `insert` stores it at
/// version `1`; each successful `save` bumps the stored version by one and
/// hands back the invoice at that version. The caller keeps working with the
/// returned value.
///
/// ## Implementation requirements
///
/// - `save` replaces the full graph atomically, or not at all
/// - `save` fails with `Conflict` when the stored version differs from the
///   invoice's version
/// - invoice references are unique across the store
pub trait InvoiceRepository: Send + Sync {
    /// Store a new invoice, giving it an id if it has none.
    fn insert(&self, invoice: Invoice) -> Result<Invoice, RepositoryError>;

    fn load(&self, id: InvoiceId) -> Result<Invoice, RepositoryError>;

    /// Replace the stored graph if nobody else wrote since `invoice` was loaded.
    fn save(&self, invoice: &Invoice) -> Result<Invoice, RepositoryError>;

    fn delete(&self, id: InvoiceId, expected_version: ExpectedVersion) -> Result<(), RepositoryError>;

    fn find_by_reference(&self, reference: &InvoiceReference) -> Result<Option<Invoice>, RepositoryError>;
}

impl<R> InvoiceRepository for Arc<R>
where
    R: InvoiceRepository + ?Sized,
{
    fn insert(&self, invoice: Invoice) -> Result<Invoice, RepositoryError> {
        (**self).insert(invoice)
    }

    fn load(&self, id: InvoiceId) -> Result<Invoice, RepositoryError> {
        (**self).load(id)
    }

    fn save(&self, invoice: &Invoice) -> Result<Invoice, RepositoryError> {
        (**self).save(invoice)
    }

    fn delete(&self, id: InvoiceId, expected_version: ExpectedVersion) -> Result<(), RepositoryError> {
        (**self).delete(id, expected_version)
    }

    fn find_by_reference(&self, reference: &InvoiceReference) -> Result<Option<Invoice>, RepositoryError> {
        (**self).find_by_reference(reference)
    }
}
