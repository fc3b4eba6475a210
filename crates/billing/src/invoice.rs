//! Invoice aggregate root.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use payhint_core::{AggregateRoot, CustomerId, Entity, error::ensure_not_blank};

use crate::error::{BillingError, BillingResult};
use crate::ids::{InstallmentId, InvoiceId};
use crate::installment::Installment;
use crate::money::Money;
use crate::payment::Payment;
use crate::reference::InvoiceReference;
use crate::status::PaymentStatus;

/// Aggregate root: Invoice.
///
/// Owns its installments, which own their payments. Every change to the graph
/// goes through the methods below; callers only ever get shared references.
///
/// Invariants held after every successful call:
/// - `sum(installments.amount_due) <= total_amount`
/// - no two installments share a due date
/// - every installment's `invoice_id` is this invoice's id
/// - while archived, nothing structural or financial changes
#[derive(Debug, Clone)]
pub struct Invoice {
    id: Option<InvoiceId>,
    customer_id: CustomerId,
    invoice_reference: InvoiceReference,
    total_amount: Money,
    currency: String,
    is_archived: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    installments: HashMap<InstallmentId, Installment>,
    version: u64,
}

impl Invoice {
    /// New, unsaved invoice with no installments.
    pub fn create(
        customer_id: CustomerId,
        invoice_reference: InvoiceReference,
        total_amount: Money,
        currency: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> BillingResult<Self> {
        let currency = currency.into();
        ensure_not_blank("currency", &currency)?;

        Ok(Self {
            id: None,
            customer_id,
            invoice_reference,
            total_amount,
            currency,
            is_archived: false,
            created_at,
            updated_at: created_at,
            installments: HashMap::new(),
            version: 0,
        })
    }

    /// Rebuild a persisted invoice graph, re-validating every invariant.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: InvoiceId,
        customer_id: CustomerId,
        invoice_reference: InvoiceReference,
        total_amount: Money,
        currency: String,
        is_archived: bool,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        installments: Vec<Installment>,
        version: u64,
    ) -> BillingResult<Self> {
        ensure_not_blank("currency", &currency)?;

        let mut invoice = Self {
            id: Some(id),
            customer_id,
            invoice_reference,
            total_amount,
            currency,
            is_archived,
            created_at,
            updated_at,
            installments: HashMap::with_capacity(installments.len()),
            version,
        };

        for installment in installments {
            invoice.ensure_belongs(&installment)?;
            let installment_id = require_installment_id(&installment)?;
            if invoice.installments.contains_key(&installment_id) {
                return Err(BillingError::duplicate(format!(
                    "installment {installment_id} appears twice in invoice {id}"
                )));
            }
            invoice.ensure_due_date_free(installment.due_date(), None)?;
            invoice.installments.insert(installment_id, installment);
        }

        let due = invoice.checked_installments_due(None, None)?;
        if due > invoice.total_amount {
            return Err(BillingError::invalid_money(format!(
                "invoice {id}: installments total {due} exceeds invoice total {}",
                invoice.total_amount
            )));
        }

        Ok(invoice)
    }

    /// Set the identity once; reassignment is rejected.
    pub fn assign_id(&mut self, id: InvoiceId) -> BillingResult<()> {
        if let Some(existing) = self.id {
            return Err(BillingError::invalid_property(format!(
                "invoice already has id {existing}"
            )));
        }
        self.id = Some(id);
        Ok(())
    }

    pub fn id(&self) -> Option<InvoiceId> {
        self.id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn invoice_reference(&self) -> &InvoiceReference {
        &self.invoice_reference
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn is_archived(&self) -> bool {
        self.is_archived
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Read-only snapshot of the installments, ordered by due date.
    pub fn installments(&self) -> Vec<&Installment> {
        let mut installments: Vec<&Installment> = self.installments.values().collect();
        installments.sort_by_key(|i| i.due_date());
        installments
    }

    pub fn installment(&self, id: InstallmentId) -> Option<&Installment> {
        self.installments.get(&id)
    }

    pub fn installment_count(&self) -> usize {
        self.installments.len()
    }

    /// Sum of the installments' amounts due.
    pub fn installments_total_due(&self) -> Money {
        self.installments.values().map(|i| i.amount_due()).sum()
    }

    /// Sum of what has been paid across all installments.
    pub fn total_paid(&self) -> Money {
        self.installments.values().map(|i| i.amount_paid()).sum()
    }

    /// `total_amount - total_paid`.
    pub fn remaining_amount(&self) -> Money {
        // total_paid <= installments_total_due <= total_amount.
        self.total_amount
            .subtract(&self.total_paid())
            .unwrap_or(Money::ZERO)
    }

    pub fn is_fully_paid(&self) -> bool {
        self.remaining_amount().is_zero()
    }

    /// Invoice-level status from totals alone; it never reports `Late`
    /// (combine with [`Invoice::is_overdue`] for that).
    pub fn payment_status(&self) -> PaymentStatus {
        let total_paid = self.total_paid();
        if total_paid == self.total_amount {
            PaymentStatus::Paid
        } else if !total_paid.is_zero() {
            PaymentStatus::PartiallyPaid
        } else {
            PaymentStatus::Pending
        }
    }

    pub fn is_overdue_on(&self, today: NaiveDate) -> bool {
        self.installments.values().any(|i| i.is_overdue_on(today))
    }

    pub fn is_overdue(&self) -> bool {
        self.is_overdue_on(Utc::now().date_naive())
    }

    /// Earliest-due installment that still has something to pay.
    pub fn next_unpaid_installment(&self) -> Option<&Installment> {
        self.installments
            .values()
            .filter(|i| !i.is_paid())
            .min_by_key(|i| i.due_date())
    }

    pub fn add_installment(&mut self, installment: Installment, occurred_at: DateTime<Utc>) -> BillingResult<()> {
        self.ensure_not_archived()?;
        self.ensure_belongs(&installment)?;
        let installment_id = require_installment_id(&installment)?;
        if self.installments.contains_key(&installment_id) {
            return Err(BillingError::duplicate(format!(
                "installment {installment_id} already exists in the invoice"
            )));
        }

        let would_be = self.checked_installments_due(None, Some(&installment.amount_due()))?;
        if would_be > self.total_amount {
            return Err(BillingError::invalid_money(format!(
                "installments would total {would_be}, exceeding invoice total {}",
                self.total_amount
            )));
        }
        self.ensure_due_date_free(installment.due_date(), None)?;

        self.installments.insert(installment_id, installment);
        self.updated_at = occurred_at;
        Ok(())
    }

    /// Apply a detached copy's amount due and due date to the live installment.
    pub fn update_installment(&mut self, updated: &Installment, occurred_at: DateTime<Utc>) -> BillingResult<()> {
        self.ensure_not_archived()?;
        let installment_id = self.locate(updated)?;
        let existing_due_date = self.installments[&installment_id].due_date();

        let would_be =
            self.checked_installments_due(Some(installment_id), Some(&updated.amount_due()))?;
        if would_be > self.total_amount {
            return Err(BillingError::invalid_money(format!(
                "updated installments would total {would_be}, exceeding invoice total {}",
                self.total_amount
            )));
        }
        if updated.due_date() != existing_due_date {
            self.ensure_due_date_free(updated.due_date(), Some(installment_id))?;
        }

        self.live(installment_id)?.update_details(
            Some(updated.amount_due()),
            Some(updated.due_date()),
            occurred_at,
        )?;
        self.updated_at = occurred_at;
        Ok(())
    }

    pub fn remove_installment(&mut self, installment: &Installment, occurred_at: DateTime<Utc>) -> BillingResult<()> {
        self.ensure_not_archived()?;
        self.ensure_belongs(installment)?;
        let installment_id = installment
            .id()
            .ok_or_else(|| BillingError::not_found("installment without id is not part of the invoice"))?;
        if self.installments.remove(&installment_id).is_none() {
            return Err(BillingError::not_found(format!(
                "installment {installment_id} not found in invoice"
            )));
        }
        self.updated_at = occurred_at;
        Ok(())
    }

    pub fn add_payment(
        &mut self,
        installment: &Installment,
        payment: Payment,
        occurred_at: DateTime<Utc>,
    ) -> BillingResult<()> {
        self.ensure_not_archived()?;
        let installment_id = self.locate(installment)?;
        self.live(installment_id)?.add_payment(payment, occurred_at)?;
        self.updated_at = occurred_at;
        Ok(())
    }

    pub fn update_payment(
        &mut self,
        installment: &Installment,
        payment: &Payment,
        occurred_at: DateTime<Utc>,
    ) -> BillingResult<()> {
        self.ensure_not_archived()?;
        let installment_id = self.locate(installment)?;
        self.live(installment_id)?.update_payment(payment, occurred_at)?;
        self.updated_at = occurred_at;
        Ok(())
    }

    pub fn remove_payment(
        &mut self,
        installment: &Installment,
        payment: &Payment,
        occurred_at: DateTime<Utc>,
    ) -> BillingResult<()> {
        self.ensure_not_archived()?;
        let installment_id = self.locate(installment)?;
        self.live(installment_id)?.remove_payment(payment, occurred_at)?;
        self.updated_at = occurred_at;
        Ok(())
    }

    /// Apply only the provided fields that differ from the current values.
    /// Returns whether anything changed; `updated_at` moves only if so.
    pub fn update_details(
        &mut self,
        invoice_reference: Option<InvoiceReference>,
        total_amount: Option<Money>,
        currency: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> BillingResult<bool> {
        self.ensure_not_archived()?;

        let invoice_reference = invoice_reference.filter(|r| *r != self.invoice_reference);
        let total_amount = total_amount.filter(|t| *t != self.total_amount);
        let currency = currency.filter(|c| *c != self.currency);

        if let Some(total) = total_amount {
            let due = self.installments_total_due();
            if total < due {
                return Err(BillingError::invalid_money(format!(
                    "total amount {total} cannot be less than the installments' total amount due {due}"
                )));
            }
        }
        if let Some(currency) = &currency {
            ensure_not_blank("currency", currency)?;
        }

        let changed = invoice_reference.is_some() || total_amount.is_some() || currency.is_some();
        if let Some(reference) = invoice_reference {
            self.invoice_reference = reference;
        }
        if let Some(total) = total_amount {
            self.total_amount = total;
        }
        if let Some(currency) = currency {
            self.currency = currency;
        }
        if changed {
            self.updated_at = occurred_at;
        }
        Ok(changed)
    }

    /// Lock the invoice against mutation. Unconditional; idempotent.
    /// Returns whether the flag flipped.
    pub fn archive(&mut self, occurred_at: DateTime<Utc>) -> bool {
        if self.is_archived {
            return false;
        }
        self.is_archived = true;
        self.updated_at = occurred_at;
        true
    }

    pub fn unarchive(&mut self, occurred_at: DateTime<Utc>) -> bool {
        if !self.is_archived {
            return false;
        }
        self.is_archived = false;
        self.updated_at = occurred_at;
        true
    }

    /// Re-evaluate time-dependent installment statuses (`Late`). Allowed on
    /// archived invoices. Returns how many installments changed status.
    pub fn refresh_statuses(&mut self, now: DateTime<Utc>) -> usize {
        self.installments
            .values_mut()
            .map(|i| i.refresh_status(now))
            .filter(|changed| *changed)
            .count()
    }

    pub(crate) fn ensure_not_archived(&self) -> BillingResult<()> {
        if self.is_archived {
            return Err(BillingError::ArchivedInvoiceViolation(self.id));
        }
        Ok(())
    }

    fn ensure_belongs(&self, installment: &Installment) -> BillingResult<()> {
        if self.id != Some(installment.invoice_id()) {
            return Err(BillingError::InstallmentDoesNotBelongToInvoice {
                installment_id: installment.id(),
                invoice_id: self.id,
            });
        }
        Ok(())
    }

    /// Validate ownership and find the live instance the caller's copy refers to.
    fn locate(&self, installment: &Installment) -> BillingResult<InstallmentId> {
        self.ensure_belongs(installment)?;
        match installment.id() {
            Some(id) if self.installments.contains_key(&id) => Ok(id),
            _ => Err(BillingError::InstallmentDoesNotBelongToInvoice {
                installment_id: installment.id(),
                invoice_id: self.id,
            }),
        }
    }

    fn live(&mut self, id: InstallmentId) -> BillingResult<&mut Installment> {
        let invoice_id = self.id;
        self.installments
            .get_mut(&id)
            .ok_or(BillingError::InstallmentDoesNotBelongToInvoice {
                installment_id: Some(id),
                invoice_id,
            })
    }

    fn ensure_due_date_free(&self, due_date: NaiveDate, except: Option<InstallmentId>) -> BillingResult<()> {
        let taken = self
            .installments
            .iter()
            .any(|(id, i)| Some(*id) != except && i.due_date() == due_date);
        if taken {
            return Err(BillingError::duplicate(format!(
                "an installment with due date {due_date} already exists"
            )));
        }
        Ok(())
    }

    /// Amount due across installments, leaving out `except` and adding `extra`.
    fn checked_installments_due(
        &self,
        except: Option<InstallmentId>,
        extra: Option<&Money>,
    ) -> BillingResult<Money> {
        let amounts: Vec<Money> = self
            .installments
            .iter()
            .filter(|(id, _)| Some(**id) != except)
            .map(|(_, i)| i.amount_due())
            .collect();
        Money::checked_sum(amounts.iter().chain(extra))
    }
}

fn require_installment_id(installment: &Installment) -> BillingResult<InstallmentId> {
    installment.id().ok_or_else(|| {
        BillingError::invalid_property("installment must have an id before it is attached to an invoice")
    })
}

impl Entity for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> Option<InvoiceId> {
        self.id
    }
}

impl AggregateRoot for Invoice {
    fn version(&self) -> u64 {
        self.version
    }
}

impl PartialEq for Invoice {
    fn eq(&self, other: &Self) -> bool {
        self.same_identity_as(other)
    }
}
