//! Serializable snapshots of the invoice graph.
//!
//! Records are plain data: they carry every stored field, including the
//! derived ones, so a store can index or display them without the domain.
//! Turning a record back into an [`Invoice`] goes through `restore`, which
//! re-checks every invariant.

use chrono::{DateTime, NaiveDate, Utc};
use payhint_core::{AggregateRoot, CustomerId};
use serde::{Deserialize, Serialize};

use crate::error::{BillingError, BillingResult};
use crate::ids::{InstallmentId, InvoiceId, PaymentId};
use crate::installment::Installment;
use crate::invoice::Invoice;
use crate::money::Money;
use crate::payment::Payment;
use crate::reference::InvoiceReference;
use crate::status::PaymentStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub installment_id: InstallmentId,
    pub amount: Money,
    pub payment_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentRecord {
    pub id: InstallmentId,
    pub invoice_id: InvoiceId,
    pub amount_due: Money,
    pub amount_paid: Money,
    pub due_date: NaiveDate,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status_updated_at: DateTime<Utc>,
    #[serde(default)]
    pub payments: Vec<PaymentRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub id: InvoiceId,
    pub version: u64,
    pub customer_id: CustomerId,
    pub invoice_reference: InvoiceReference,
    pub total_amount: Money,
    pub currency: String,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub installments: Vec<InstallmentRecord>,
}

impl Payment {
    pub fn to_record(&self) -> BillingResult<PaymentRecord> {
        let id = self
            .id()
            .ok_or_else(|| BillingError::invalid_property("cannot persist a payment without id"))?;
        Ok(PaymentRecord {
            id,
            installment_id: self.installment_id(),
            amount: self.amount(),
            payment_date: self.payment_date(),
            created_at: self.created_at(),
            updated_at: self.updated_at(),
        })
    }

    pub fn from_record(record: PaymentRecord) -> Self {
        Payment::restore(
            record.id,
            record.installment_id,
            record.amount,
            record.payment_date,
            record.created_at,
            record.updated_at,
        )
    }
}

impl Installment {
    pub fn to_record(&self) -> BillingResult<InstallmentRecord> {
        let id = self
            .id()
            .ok_or_else(|| BillingError::invalid_property("cannot persist an installment without id"))?;
        let payments = self
            .payments()
            .into_iter()
            .map(Payment::to_record)
            .collect::<BillingResult<Vec<_>>>()?;

        Ok(InstallmentRecord {
            id,
            invoice_id: self.invoice_id(),
            amount_due: self.amount_due(),
            amount_paid: self.amount_paid(),
            due_date: self.due_date(),
            status: self.status(),
            created_at: self.created_at(),
            updated_at: self.updated_at(),
            status_updated_at: self.status_updated_at(),
            payments,
        })
    }

    /// Restore from a record. The stored `amount_paid` must match the payments.
    pub fn from_record(record: InstallmentRecord) -> BillingResult<Self> {
        let stored_paid = record.amount_paid;
        let installment = Installment::restore(
            record.id,
            record.invoice_id,
            record.amount_due,
            record.due_date,
            record.status,
            record.payments.into_iter().map(Payment::from_record).collect(),
            record.created_at,
            record.updated_at,
            record.status_updated_at,
        )?;

        if installment.amount_paid() != stored_paid {
            return Err(BillingError::invalid_money(format!(
                "installment {}: stored amount paid {stored_paid} disagrees with payments total {}",
                record.id,
                installment.amount_paid()
            )));
        }
        Ok(installment)
    }
}

impl Invoice {
    pub fn to_record(&self) -> BillingResult<InvoiceRecord> {
        let id = self
            .id()
            .ok_or_else(|| BillingError::invalid_property("cannot persist an invoice without id"))?;
        let installments = self
            .installments()
            .into_iter()
            .map(Installment::to_record)
            .collect::<BillingResult<Vec<_>>>()?;

        Ok(InvoiceRecord {
            id,
            version: self.version(),
            customer_id: self.customer_id(),
            invoice_reference: self.invoice_reference().clone(),
            total_amount: self.total_amount(),
            currency: self.currency().to_string(),
            is_archived: self.is_archived(),
            created_at: self.created_at(),
            updated_at: self.updated_at(),
            installments,
        })
    }

    pub fn from_record(record: InvoiceRecord) -> BillingResult<Self> {
        let installments = record
            .installments
            .into_iter()
            .map(Installment::from_record)
            .collect::<BillingResult<Vec<_>>>()?;

        Invoice::restore(
            record.id,
            record.customer_id,
            record.invoice_reference,
            record.total_amount,
            record.currency,
            record.is_archived,
            record.created_at,
            record.updated_at,
            installments,
            record.version,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, d, 8, 30, 0).unwrap()
    }

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn stored_invoice() -> Invoice {
        let mut invoice = Invoice::create(
            CustomerId::new(),
            InvoiceReference::new("INV-2025-042").unwrap(),
            "1000.00".parse().unwrap(),
            "EUR",
            at(1),
        )
        .unwrap();
        invoice.assign_id(InvoiceId::new()).unwrap();

        let mut inst = Installment::create(invoice.id().unwrap(), "400.00".parse().unwrap(), date(6, 1), at(2));
        inst.assign_id(InstallmentId::new()).unwrap();
        invoice.add_installment(inst.clone(), at(2)).unwrap();

        let mut payment = Payment::create(inst.id().unwrap(), "150.50".parse().unwrap(), date(5, 20), at(3));
        payment.assign_id(PaymentId::new()).unwrap();
        invoice.add_payment(&inst, payment, at(3)).unwrap();
        invoice
    }

    #[test]
    fn graph_survives_a_json_round_trip() {
        let invoice = stored_invoice();
        let record = invoice.to_record().unwrap();
        let json = serde_json::to_string(&record).unwrap();
        let back: InvoiceRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);

        let restored = Invoice::from_record(back).unwrap();
        assert_eq!(restored, invoice);
        assert_eq!(restored.total_paid(), "150.50".parse::<Money>().unwrap());
        assert_eq!(restored.updated_at(), invoice.updated_at());
        let inst = restored.installments()[0];
        assert_eq!(inst.status(), PaymentStatus::PartiallyPaid);
        assert_eq!(inst.payment_count(), 1);
    }

    #[test]
    fn money_is_stored_as_exact_decimal_strings() {
        let record = stored_invoice().to_record().unwrap();
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["total_amount"], "1000.00");
        assert_eq!(value["installments"][0]["amount_paid"], "150.50");
        assert_eq!(value["installments"][0]["status"], "PARTIALLY_PAID");
    }

    #[test]
    fn tampered_amount_paid_is_rejected() {
        let mut record = stored_invoice().to_record().unwrap();
        record.installments[0].amount_paid = "10".parse().unwrap();

        assert!(matches!(
            Invoice::from_record(record),
            Err(BillingError::InvalidMoneyValue(_))
        ));
    }

    #[test]
    fn negative_money_in_storage_fails_to_deserialize() {
        let mut value = serde_json::to_value(stored_invoice().to_record().unwrap()).unwrap();
        value["total_amount"] = serde_json::Value::String("-1".to_string());
        assert!(serde_json::from_value::<InvoiceRecord>(value).is_err());
    }

    #[test]
    fn unsaved_invoice_cannot_be_recorded() {
        let invoice = Invoice::create(
            CustomerId::new(),
            InvoiceReference::new("INV").unwrap(),
            "1".parse().unwrap(),
            "EUR",
            at(1),
        )
        .unwrap();
        assert!(matches!(invoice.to_record(), Err(BillingError::InvalidProperty(_))));
    }
}
