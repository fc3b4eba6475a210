//! Commands accepted by the [`Invoice`] aggregate.
//!
//! A command names one mutation and carries everything it needs, including the
//! moment it happened. [`Aggregate::execute`] maps each one onto the matching
//! invoice method, so services can work with a single entry point.

use chrono::{DateTime, Utc};
use payhint_core::Aggregate;

use crate::error::{BillingError, BillingResult};
use crate::ids::{InstallmentId, PaymentId};
use crate::installment::Installment;
use crate::invoice::Invoice;
use crate::money::Money;
use crate::payment::Payment;
use crate::reference::InvoiceReference;

#[derive(Debug, Clone)]
pub enum InvoiceCommand {
    AddInstallment {
        installment: Installment,
        occurred_at: DateTime<Utc>,
    },
    UpdateInstallment {
        installment: Installment,
        occurred_at: DateTime<Utc>,
    },
    RemoveInstallment {
        installment: Installment,
        occurred_at: DateTime<Utc>,
    },
    AddPayment {
        installment: Installment,
        payment: Payment,
        occurred_at: DateTime<Utc>,
    },
    UpdatePayment {
        installment: Installment,
        payment: Payment,
        occurred_at: DateTime<Utc>,
    },
    RemovePayment {
        installment: Installment,
        payment: Payment,
        occurred_at: DateTime<Utc>,
    },
    UpdateDetails {
        invoice_reference: Option<InvoiceReference>,
        total_amount: Option<Money>,
        currency: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    Archive {
        occurred_at: DateTime<Utc>,
    },
    Unarchive {
        occurred_at: DateTime<Utc>,
    },
    RefreshStatuses {
        now: DateTime<Utc>,
    },
}

impl InvoiceCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddInstallment { .. } => "add_installment",
            Self::UpdateInstallment { .. } => "update_installment",
            Self::RemoveInstallment { .. } => "remove_installment",
            Self::AddPayment { .. } => "add_payment",
            Self::UpdatePayment { .. } => "update_payment",
            Self::RemovePayment { .. } => "remove_payment",
            Self::UpdateDetails { .. } => "update_details",
            Self::Archive { .. } => "archive",
            Self::Unarchive { .. } => "unarchive",
            Self::RefreshStatuses { .. } => "refresh_statuses",
        }
    }

    /// Give a fresh id to the child this command introduces, if it has none.
    ///
    /// Only `AddInstallment` and `AddPayment` introduce children; every other
    /// command refers to existing ones and is left alone.
    pub fn assign_missing_ids(&mut self) -> BillingResult<()> {
        match self {
            Self::AddInstallment { installment, .. } if installment.id().is_none() => {
                installment.assign_id(InstallmentId::new())
            }
            Self::AddPayment { payment, .. } if payment.id().is_none() => payment.assign_id(PaymentId::new()),
            _ => Ok(()),
        }
    }
}

impl Aggregate for Invoice {
    type Command = InvoiceCommand;
    type Error = BillingError;

    /// Structural and payment commands always change the invoice when they
    /// succeed; the others report whether anything actually moved.
    fn execute(&mut self, command: InvoiceCommand) -> BillingResult<bool> {
        match command {
            InvoiceCommand::AddInstallment { installment, occurred_at } => {
                self.add_installment(installment, occurred_at)?
            }
            InvoiceCommand::UpdateInstallment { installment, occurred_at } => {
                self.update_installment(&installment, occurred_at)?
            }
            InvoiceCommand::RemoveInstallment { installment, occurred_at } => {
                self.remove_installment(&installment, occurred_at)?
            }
            InvoiceCommand::AddPayment { installment, payment, occurred_at } => {
                self.add_payment(&installment, payment, occurred_at)?
            }
            InvoiceCommand::UpdatePayment { installment, payment, occurred_at } => {
                self.update_payment(&installment, &payment, occurred_at)?
            }
            InvoiceCommand::RemovePayment { installment, payment, occurred_at } => {
                self.remove_payment(&installment, &payment, occurred_at)?
            }
            InvoiceCommand::UpdateDetails {
                invoice_reference,
                total_amount,
                currency,
                occurred_at,
            } => return self.update_details(invoice_reference, total_amount, currency, occurred_at),
            InvoiceCommand::Archive { occurred_at } => return Ok(self.archive(occurred_at)),
            InvoiceCommand::Unarchive { occurred_at } => return Ok(self.unarchive(occurred_at)),
            InvoiceCommand::RefreshStatuses { now } => return Ok(self.refresh_statuses(now) > 0),
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use payhint_core::CustomerId;

    use crate::ids::InvoiceId;
    use crate::status::PaymentStatus;

    fn at(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, d, 9, 0, 0).unwrap()
    }

    fn due(m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, 1).unwrap()
    }

    fn test_invoice() -> Invoice {
        let mut invoice = Invoice::create(
            CustomerId::new(),
            InvoiceReference::new("INV-9").unwrap(),
            "500".parse().unwrap(),
            "EUR",
            at(1),
        )
        .unwrap();
        invoice.assign_id(InvoiceId::new()).unwrap();
        invoice
    }

    #[test]
    fn add_commands_get_ids_before_execution() {
        let mut invoice = test_invoice();
        let mut command = InvoiceCommand::AddInstallment {
            installment: Installment::create(invoice.id().unwrap(), "200".parse().unwrap(), due(6), at(2)),
            occurred_at: at(2),
        };

        assert!(matches!(
            invoice.execute(command.clone()),
            Err(BillingError::InvalidProperty(_))
        ));

        command.assign_missing_ids().unwrap();
        invoice.execute(command.clone()).unwrap();
        assert_eq!(invoice.installment_count(), 1);

        // Already has an id: left untouched, so re-running is a duplicate.
        command.assign_missing_ids().unwrap();
        assert!(matches!(invoice.execute(command), Err(BillingError::DuplicateEntity(_))));
    }

    #[test]
    fn payment_commands_flow_through_the_root() {
        let mut invoice = test_invoice();
        let mut add = InvoiceCommand::AddInstallment {
            installment: Installment::create(invoice.id().unwrap(), "200".parse().unwrap(), due(6), at(2)),
            occurred_at: at(2),
        };
        add.assign_missing_ids().unwrap();
        invoice.execute(add).unwrap();
        let installment = invoice.installments()[0].clone();

        let mut pay = InvoiceCommand::AddPayment {
            installment: installment.clone(),
            payment: Payment::create(installment.id().unwrap(), "200".parse().unwrap(), due(5), at(3)),
            occurred_at: at(3),
        };
        pay.assign_missing_ids().unwrap();
        assert_eq!(pay.name(), "add_payment");
        invoice.execute(pay).unwrap();

        assert_eq!(invoice.installments()[0].status(), PaymentStatus::Paid);
        assert_eq!(invoice.updated_at(), at(3));
    }

    #[test]
    fn archive_commands_toggle_the_lock() {
        let mut invoice = test_invoice();
        assert!(invoice.execute(InvoiceCommand::Archive { occurred_at: at(2) }).unwrap());
        assert!(!invoice.execute(InvoiceCommand::Archive { occurred_at: at(3) }).unwrap());
        assert!(matches!(
            invoice.execute(InvoiceCommand::UpdateDetails {
                invoice_reference: None,
                total_amount: Some("1".parse().unwrap()),
                currency: None,
                occurred_at: at(3),
            }),
            Err(BillingError::ArchivedInvoiceViolation(_))
        ));
        assert!(!invoice.execute(InvoiceCommand::RefreshStatuses { now: at(3) }).unwrap());
        invoice.execute(InvoiceCommand::Unarchive { occurred_at: at(4) }).unwrap();
        assert!(!invoice.is_archived());
    }

    #[test]
    fn no_op_commands_report_no_change() {
        let mut invoice = test_invoice();
        let unchanged = InvoiceCommand::UpdateDetails {
            invoice_reference: Some(InvoiceReference::new("INV-9").unwrap()),
            total_amount: None,
            currency: Some("EUR".to_string()),
            occurred_at: at(2),
        };
        assert!(!invoice.execute(unchanged).unwrap());
        assert!(!invoice.execute(InvoiceCommand::Unarchive { occurred_at: at(2) }).unwrap());
        assert_eq!(invoice.updated_at(), at(1));

        let changed = InvoiceCommand::UpdateDetails {
            invoice_reference: None,
            total_amount: Some("600".parse().unwrap()),
            currency: None,
            occurred_at: at(3),
        };
        assert!(invoice.execute(changed).unwrap());
    }
}
