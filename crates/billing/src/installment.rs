//! Installment: a scheduled share of an invoice, owning its payments.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use payhint_core::Entity;

use crate::error::{BillingError, BillingResult};
use crate::ids::{InstallmentId, InvoiceId, PaymentId};
use crate::money::Money;
use crate::payment::Payment;
use crate::status::PaymentStatus;

/// A scheduled partial obligation against an invoice, due on one date.
///
/// Invariants held after every successful call:
/// - `amount_paid == sum(payments.amount)`
/// - `amount_paid <= amount_due`
/// - `status` agrees with the remaining amount (see [`PaymentStatus::derive`])
#[derive(Debug, Clone)]
pub struct Installment {
    id: Option<InstallmentId>,
    invoice_id: InvoiceId,
    amount_due: Money,
    amount_paid: Money,
    due_date: NaiveDate,
    status: PaymentStatus,
    payments: HashMap<PaymentId, Payment>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    status_updated_at: DateTime<Utc>,
}

impl Installment {
    /// New, unsaved installment with nothing paid: `Pending`, or `Paid` when
    /// nothing is due.
    pub fn create(
        invoice_id: InvoiceId,
        amount_due: Money,
        due_date: NaiveDate,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            invoice_id,
            amount_due,
            amount_paid: Money::ZERO,
            due_date,
            status: PaymentStatus::derive(&amount_due, &Money::ZERO, false),
            payments: HashMap::new(),
            created_at,
            updated_at: created_at,
            status_updated_at: created_at,
        }
    }

    /// Rebuild a persisted installment with its payments.
    ///
    /// `amount_paid` is recomputed from `payments`. The stored status only
    /// decides between `Pending` and `Late` when nothing has been paid.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: InstallmentId,
        invoice_id: InvoiceId,
        amount_due: Money,
        due_date: NaiveDate,
        stored_status: PaymentStatus,
        payments: Vec<Payment>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        status_updated_at: DateTime<Utc>,
    ) -> BillingResult<Self> {
        let mut by_id = HashMap::with_capacity(payments.len());
        for payment in payments {
            let payment_id = payment.id().ok_or_else(|| {
                BillingError::invalid_property(format!("installment {id} holds a payment without id"))
            })?;
            if payment.installment_id() != id {
                return Err(BillingError::PaymentDoesNotBelongToInstallment {
                    payment_id: Some(payment_id),
                    installment_id: Some(id),
                });
            }
            if by_id.insert(payment_id, payment).is_some() {
                return Err(BillingError::duplicate(format!(
                    "payment {payment_id} appears twice in installment {id}"
                )));
            }
        }

        let amounts: Vec<Money> = by_id.values().map(Payment::amount).collect();
        let amount_paid = Money::checked_sum(&amounts)?;
        if amount_paid > amount_due {
            return Err(BillingError::invalid_money(format!(
                "installment {id}: payments total {amount_paid} exceeds amount due {amount_due}"
            )));
        }

        let status = PaymentStatus::derive(
            &amount_due,
            &amount_paid,
            stored_status == PaymentStatus::Late,
        );

        Ok(Self {
            id: Some(id),
            invoice_id,
            amount_due,
            amount_paid,
            due_date,
            status,
            payments: by_id,
            created_at,
            updated_at,
            status_updated_at,
        })
    }

    /// Set the identity once; reassignment is rejected.
    pub fn assign_id(&mut self, id: InstallmentId) -> BillingResult<()> {
        if let Some(existing) = self.id {
            return Err(BillingError::invalid_property(format!(
                "installment already has id {existing}"
            )));
        }
        self.id = Some(id);
        Ok(())
    }

    pub fn id(&self) -> Option<InstallmentId> {
        self.id
    }

    pub fn invoice_id(&self) -> InvoiceId {
        self.invoice_id
    }

    pub fn amount_due(&self) -> Money {
        self.amount_due
    }

    pub fn amount_paid(&self) -> Money {
        self.amount_paid
    }

    pub fn due_date(&self) -> NaiveDate {
        self.due_date
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn status_updated_at(&self) -> DateTime<Utc> {
        self.status_updated_at
    }

    /// `amount_due - amount_paid`.
    pub fn remaining_amount(&self) -> Money {
        // amount_paid <= amount_due is held by every mutation.
        self.amount_due
            .subtract(&self.amount_paid)
            .unwrap_or(Money::ZERO)
    }

    pub fn is_paid(&self) -> bool {
        self.remaining_amount().is_zero()
    }

    /// Past due on `today` and not fully paid.
    pub fn is_overdue_on(&self, today: NaiveDate) -> bool {
        today > self.due_date && !self.is_paid()
    }

    pub fn is_overdue(&self) -> bool {
        self.is_overdue_on(Utc::now().date_naive())
    }

    /// Read-only view of the payments, ordered by payment date.
    pub fn payments(&self) -> Vec<&Payment> {
        let mut payments: Vec<&Payment> = self.payments.values().collect();
        payments.sort_by_key(|p| (p.payment_date(), p.created_at()));
        payments
    }

    pub fn payment(&self, id: PaymentId) -> Option<&Payment> {
        self.payments.get(&id)
    }

    pub fn payment_count(&self) -> usize {
        self.payments.len()
    }

    /// Record a payment. Fails without side effects when the payment would
    /// exceed the remaining amount.
    pub fn add_payment(&mut self, payment: Payment, occurred_at: DateTime<Utc>) -> BillingResult<()> {
        let payment_id = self.ensure_payment_belongs(&payment)?;
        if self.payments.contains_key(&payment_id) {
            return Err(BillingError::duplicate(format!(
                "payment {payment_id} already recorded on installment"
            )));
        }

        let remaining = self.remaining_amount();
        if payment.amount() > remaining {
            return Err(BillingError::invalid_money(format!(
                "payment amount {} exceeds remaining installment amount {remaining}",
                payment.amount()
            )));
        }
        let amount_paid = self.amount_paid.add(&payment.amount())?;

        self.payments.insert(payment_id, payment);
        self.amount_paid = amount_paid;
        self.updated_at = occurred_at;
        self.recompute_status(occurred_at);
        Ok(())
    }

    /// Replace the amount/date of an existing payment.
    ///
    /// The new amount may use everything still owed plus what the old payment
    /// already covered.
    pub fn update_payment(&mut self, updated: &Payment, occurred_at: DateTime<Utc>) -> BillingResult<()> {
        let payment_id = self.ensure_payment_belongs(updated)?;
        let old_amount = match self.payments.get(&payment_id) {
            Some(existing) => existing.amount(),
            None => {
                return Err(BillingError::not_found(format!(
                    "payment {payment_id} not found in installment"
                )));
            }
        };

        let ceiling = self.remaining_amount().add(&old_amount)?;
        if updated.amount() > ceiling {
            return Err(BillingError::invalid_money(format!(
                "updated payment amount {} exceeds allowed maximum {ceiling}",
                updated.amount()
            )));
        }
        let amount_paid = self.amount_paid.subtract(&old_amount)?.add(&updated.amount())?;

        if let Some(existing) = self.payments.get_mut(&payment_id) {
            existing.update_details(Some(updated.amount()), Some(updated.payment_date()), occurred_at);
        }
        self.amount_paid = amount_paid;
        self.updated_at = occurred_at;
        self.recompute_status(occurred_at);
        Ok(())
    }

    pub fn remove_payment(&mut self, payment: &Payment, occurred_at: DateTime<Utc>) -> BillingResult<()> {
        let payment_id = payment
            .id()
            .ok_or_else(|| BillingError::not_found("payment without id is not recorded on installment"))?;
        let old_amount = match self.payments.get(&payment_id) {
            Some(existing) => existing.amount(),
            None => {
                return Err(BillingError::not_found(format!(
                    "payment {payment_id} not found in installment"
                )));
            }
        };
        let amount_paid = self.amount_paid.subtract(&old_amount)?;

        self.payments.remove(&payment_id);
        self.amount_paid = amount_paid;
        self.updated_at = occurred_at;
        self.recompute_status(occurred_at);
        Ok(())
    }

    /// Change the amount due and/or due date.
    ///
    /// Cross-installment rules (invoice ceiling, unique due dates) are the
    /// invoice's job; this only refuses an amount due below what is already paid.
    pub fn update_details(
        &mut self,
        amount_due: Option<Money>,
        due_date: Option<NaiveDate>,
        occurred_at: DateTime<Utc>,
    ) -> BillingResult<bool> {
        let amount_due = amount_due.filter(|a| *a != self.amount_due);
        let due_date = due_date.filter(|d| *d != self.due_date);

        if let Some(new_due) = amount_due {
            if new_due < self.amount_paid {
                return Err(BillingError::invalid_money(format!(
                    "amount due {new_due} cannot be less than amount already paid {}",
                    self.amount_paid
                )));
            }
        }
        if amount_due.is_none() && due_date.is_none() {
            return Ok(false);
        }

        if let Some(new_due) = amount_due {
            self.amount_due = new_due;
        }
        if let Some(date) = due_date {
            self.due_date = date;
        }
        self.updated_at = occurred_at;
        self.recompute_status(occurred_at);
        Ok(true)
    }

    /// Re-evaluate the time-dependent part of the status. Returns whether the
    /// status changed.
    pub fn refresh_status(&mut self, now: DateTime<Utc>) -> bool {
        self.recompute_status(now)
    }

    fn recompute_status(&mut self, now: DateTime<Utc>) -> bool {
        let past_due = now.date_naive() > self.due_date;
        let status = PaymentStatus::derive(&self.amount_due, &self.amount_paid, past_due);
        if status == self.status {
            return false;
        }
        self.status = status;
        self.updated_at = now;
        self.status_updated_at = now;
        true
    }

    fn ensure_payment_belongs(&self, payment: &Payment) -> BillingResult<PaymentId> {
        let payment_id = payment.id().ok_or_else(|| {
            BillingError::invalid_property("payment must have an id before it is attached to an installment")
        })?;
        if self.id != Some(payment.installment_id()) {
            return Err(BillingError::PaymentDoesNotBelongToInstallment {
                payment_id: Some(payment_id),
                installment_id: self.id,
            });
        }
        Ok(payment_id)
    }
}

impl Entity for Installment {
    type Id = InstallmentId;

    fn id(&self) -> Option<InstallmentId> {
        self.id
    }
}

impl PartialEq for Installment {
    fn eq(&self, other: &Self) -> bool {
        self.same_identity_as(other)
    }
}
