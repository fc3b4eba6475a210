//! Invoice application service.
//!
//! Runs every change to an invoice as one unit of work:
//!
//! ```text
//! load invoice (at version N)
//!   ↓
//! build command from the loaded state, give new children their ids
//!   ↓
//! Invoice::execute (all invariants checked, all-or-nothing)
//!   ↓
//! save (succeeds only if the store is still at version N)
//! ```
//!
//! A command that leaves the invoice as it was is not saved, so the version
//! stays at N.
//!
//! A rejected command is returned to the caller as is. A lost race on save is
//! retried from a fresh load, up to the configured limit.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use payhint_billing::{BillingError, Invoice, InvoiceCommand, InvoiceId, InvoiceReference, Money};
use payhint_core::{Aggregate, AggregateRoot, CustomerId, ExpectedVersion};

use crate::config::InfraConfig;
use crate::repository::{InvoiceRepository, RepositoryError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("invoice {invoice_id}: gave up after {attempts} conflicting attempts")]
    ConflictRetriesExhausted { invoice_id: InvoiceId, attempts: u32 },
}

/// Parameters for a new invoice.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub customer_id: CustomerId,
    pub invoice_reference: InvoiceReference,
    pub total_amount: Money,
    pub currency: String,
}

#[derive(Debug)]
pub struct InvoiceService<R> {
    repository: R,
    config: InfraConfig,
}

impl<R> InvoiceService<R> {
    pub fn new(repository: R, config: InfraConfig) -> Self {
        Self { repository, config }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn config(&self) -> &InfraConfig {
        &self.config
    }
}

impl<R> InvoiceService<R>
where
    R: InvoiceRepository,
{
    pub fn create_invoice(&self, new: NewInvoice, occurred_at: DateTime<Utc>) -> Result<Invoice, ServiceError> {
        let invoice = Invoice::create(
            new.customer_id,
            new.invoice_reference,
            new.total_amount,
            new.currency,
            occurred_at,
        )?;
        let stored = self.repository.insert(invoice)?;

        info!(
            invoice_id = ?stored.id(),
            customer_id = %stored.customer_id(),
            reference = %stored.invoice_reference(),
            total_amount = %stored.total_amount(),
            "invoice created"
        );
        Ok(stored)
    }

    pub fn get(&self, invoice_id: InvoiceId) -> Result<Invoice, ServiceError> {
        Ok(self.repository.load(invoice_id)?)
    }

    pub fn find_by_reference(&self, reference: &InvoiceReference) -> Result<Option<Invoice>, ServiceError> {
        Ok(self.repository.find_by_reference(reference)?)
    }

    /// Run one command against the current state of an invoice and persist it.
    ///
    /// `make_command` receives the freshly loaded invoice, so it can pick the
    /// installments and payments it refers to from live state. It is called
    /// again on every retry. A command that changes nothing returns the loaded
    /// invoice without a write.
    pub fn execute<F>(&self, invoice_id: InvoiceId, make_command: F) -> Result<Invoice, ServiceError>
    where
        F: Fn(&Invoice) -> InvoiceCommand,
    {
        let attempts = self.config.max_conflict_retries.saturating_add(1);

        for attempt in 1..=attempts {
            let mut invoice = self.repository.load(invoice_id)?;
            let mut command = make_command(&invoice);
            command.assign_missing_ids()?;
            let name = command.name();

            let changed = match invoice.execute(command) {
                Ok(changed) => changed,
                Err(e) => {
                    warn!(
                        invoice_id = %invoice_id,
                        command = name,
                        error_kind = e.kind(),
                        error = %e,
                        "command rejected"
                    );
                    return Err(e.into());
                }
            };
            if !changed {
                debug!(
                    invoice_id = %invoice_id,
                    command = name,
                    version = invoice.version(),
                    "command changed nothing, skipping save"
                );
                return Ok(invoice);
            }

            match self.repository.save(&invoice) {
                Ok(saved) => {
                    debug!(
                        invoice_id = %invoice_id,
                        command = name,
                        version = saved.version(),
                        "command applied"
                    );
                    return Ok(saved);
                }
                Err(RepositoryError::Conflict(reason)) => {
                    warn!(
                        invoice_id = %invoice_id,
                        command = name,
                        attempt,
                        reason = %reason,
                        "concurrent update, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ServiceError::ConflictRetriesExhausted { invoice_id, attempts })
    }

    /// Re-evaluate `Late` statuses as of `now`.
    pub fn refresh_statuses(&self, invoice_id: InvoiceId, now: DateTime<Utc>) -> Result<Invoice, ServiceError> {
        self.execute(invoice_id, |_| InvoiceCommand::RefreshStatuses { now })
    }

    pub fn delete(&self, invoice_id: InvoiceId, expected_version: ExpectedVersion) -> Result<(), ServiceError> {
        self.repository.delete(invoice_id, expected_version)?;
        info!(invoice_id = %invoice_id, "invoice deleted");
        Ok(())
    }
}
