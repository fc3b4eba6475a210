//! Billing domain module.
//!
//! Keeps an [`Invoice`], its [`Installment`]s and their [`Payment`]s mutually
//! consistent. All mutation enters through the invoice (the aggregate root),
//! which validates invoice-level invariants and delegates to the installment.
//! Pure domain logic: no IO, no HTTP, no storage.

pub mod command;
pub mod error;
pub mod ids;
pub mod installment;
pub mod invoice;
pub mod money;
pub mod payment;
pub mod record;
pub mod reference;
pub mod status;

pub use command::InvoiceCommand;
pub use error::{BillingError, BillingResult};
pub use ids::{InstallmentId, InvoiceId, PaymentId};
pub use installment::Installment;
pub use invoice::Invoice;
pub use money::Money;
pub use payment::Payment;
pub use record::{InstallmentRecord, InvoiceRecord, PaymentRecord};
pub use reference::InvoiceReference;
pub use status::PaymentStatus;
