//! A single amount paid against one installment.

use chrono::{DateTime, NaiveDate, Utc};
use payhint_core::Entity;

use crate::error::{BillingError, BillingResult};
use crate::ids::{InstallmentId, PaymentId};
use crate::money::Money;

/// A payment recorded against an installment.
///
/// Equality is identity: two payments are equal only when both have an id and
/// the ids match. An unsaved payment is never equal to anything.
#[derive(Debug, Clone)]
pub struct Payment {
    id: Option<PaymentId>,
    installment_id: InstallmentId,
    amount: Money,
    payment_date: NaiveDate,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// New, unsaved payment. The id is assigned later by the persistence boundary.
    pub fn create(
        installment_id: InstallmentId,
        amount: Money,
        payment_date: NaiveDate,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            installment_id,
            amount,
            payment_date,
            created_at,
            updated_at: None,
        }
    }

    /// Rebuild a persisted payment.
    pub fn restore(
        id: PaymentId,
        installment_id: InstallmentId,
        amount: Money,
        payment_date: NaiveDate,
        created_at: DateTime<Utc>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: Some(id),
            installment_id,
            amount,
            payment_date,
            created_at,
            updated_at,
        }
    }

    /// Set the identity once; reassignment is rejected.
    pub fn assign_id(&mut self, id: PaymentId) -> BillingResult<()> {
        if let Some(existing) = self.id {
            return Err(BillingError::invalid_property(format!(
                "payment already has id {existing}"
            )));
        }
        self.id = Some(id);
        Ok(())
    }

    pub fn id(&self) -> Option<PaymentId> {
        self.id
    }

    pub fn installment_id(&self) -> InstallmentId {
        self.installment_id
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn payment_date(&self) -> NaiveDate {
        self.payment_date
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Apply the provided fields. `updated_at` moves only when a value actually
    /// changed; returns whether anything changed.
    pub fn update_details(
        &mut self,
        amount: Option<Money>,
        payment_date: Option<NaiveDate>,
        occurred_at: DateTime<Utc>,
    ) -> bool {
        let mut changed = false;
        if let Some(amount) = amount {
            if amount != self.amount {
                self.amount = amount;
                changed = true;
            }
        }
        if let Some(date) = payment_date {
            if date != self.payment_date {
                self.payment_date = date;
                changed = true;
            }
        }
        if changed {
            self.updated_at = Some(occurred_at);
        }
        changed
    }
}

impl Entity for Payment {
    type Id = PaymentId;

    fn id(&self) -> Option<PaymentId> {
        self.id
    }
}

impl PartialEq for Payment {
    fn eq(&self, other: &Self) -> bool {
        self.same_identity_as(other)
    }
}
