//! Infrastructure layer: invoice persistence, application service, config.
//!
//! The billing domain stays pure; this crate loads invoices, runs commands
//! against them and writes them back under optimistic concurrency.

pub mod config;
pub mod repository;
pub mod service;

pub use config::InfraConfig;
pub use repository::{InMemoryInvoiceRepository, InvoiceRepository, RepositoryError};
pub use service::{InvoiceService, NewInvoice, ServiceError};
