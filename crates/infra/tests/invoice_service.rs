use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use payhint_billing::{
    BillingError, Installment, Invoice, InvoiceCommand, InvoiceId, InvoiceReference, Money, Payment,
    PaymentStatus,
};
use payhint_core::{AggregateRoot, CustomerId, ExpectedVersion};
use payhint_infra::{
    InMemoryInvoiceRepository, InfraConfig, InvoiceRepository, InvoiceService, NewInvoice, RepositoryError,
    ServiceError,
};

fn test_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap()
}

fn money(s: &str) -> Money {
    s.parse().unwrap()
}

fn due(m: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, m, 1).unwrap()
}

fn new_invoice(reference: &str, total: &str) -> NewInvoice {
    NewInvoice {
        customer_id: CustomerId::new(),
        invoice_reference: InvoiceReference::new(reference).unwrap(),
        total_amount: money(total),
        currency: "EUR".to_string(),
    }
}

fn add_installment(amount: &'static str, month: u32) -> impl Fn(&Invoice) -> InvoiceCommand {
    move |invoice| InvoiceCommand::AddInstallment {
        installment: Installment::create(invoice.id().unwrap(), money(amount), due(month), test_time()),
        occurred_at: test_time(),
    }
}

fn pay_first_installment(amount: &'static str) -> impl Fn(&Invoice) -> InvoiceCommand {
    move |invoice| {
        let installment = invoice.installments()[0].clone();
        let payment = Payment::create(installment.id().unwrap(), money(amount), due(5), test_time());
        InvoiceCommand::AddPayment {
            installment,
            payment,
            occurred_at: test_time(),
        }
    }
}

/// Lets another writer sneak in before the next `races` saves.
struct RacingRepository {
    inner: InMemoryInvoiceRepository,
    races: AtomicU32,
}

impl RacingRepository {
    fn new(races: u32) -> Self {
        Self {
            inner: InMemoryInvoiceRepository::new(),
            races: AtomicU32::new(races),
        }
    }
}

impl InvoiceRepository for RacingRepository {
    fn insert(&self, invoice: Invoice) -> Result<Invoice, RepositoryError> {
        self.inner.insert(invoice)
    }

    fn load(&self, id: InvoiceId) -> Result<Invoice, RepositoryError> {
        self.inner.load(id)
    }

    fn save(&self, invoice: &Invoice) -> Result<Invoice, RepositoryError> {
        let race = self
            .races
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if race {
            if let Some(id) = invoice.id() {
                let other = self.inner.load(id)?;
                self.inner.save(&other)?;
            }
        }
        self.inner.save(invoice)
    }

    fn delete(&self, id: InvoiceId, expected_version: ExpectedVersion) -> Result<(), RepositoryError> {
        self.inner.delete(id, expected_version)
    }

    fn find_by_reference(&self, reference: &InvoiceReference) -> Result<Option<Invoice>, RepositoryError> {
        self.inner.find_by_reference(reference)
    }
}

#[test]
fn commands_are_applied_and_persisted() {
    let service = InvoiceService::new(InMemoryInvoiceRepository::new(), InfraConfig::default());
    let created = service
        .create_invoice(new_invoice("INV-2025-001", "1000.00"), test_time())
        .unwrap();
    let id = created.id().unwrap();
    assert_eq!(created.version(), 1);

    service.execute(id, add_installment("200.00", 6)).unwrap();
    service.execute(id, pay_first_installment("100.00")).unwrap();
    let after = service.execute(id, pay_first_installment("100.00")).unwrap();

    assert_eq!(after.version(), 4);
    let installment = after.installments()[0];
    assert_eq!(installment.status(), PaymentStatus::Paid);
    assert_eq!(installment.payment_count(), 2);

    let reloaded = service.get(id).unwrap();
    assert_eq!(reloaded.total_paid(), money("200.00"));
    assert_eq!(reloaded.remaining_amount(), money("800.00"));
    assert_eq!(reloaded.version(), 4);
}

#[test]
fn rejected_commands_leave_the_store_untouched() {
    let service = InvoiceService::new(InMemoryInvoiceRepository::new(), InfraConfig::default());
    let id = service
        .create_invoice(new_invoice("INV-2025-002", "1000.00"), test_time())
        .unwrap()
        .id()
        .unwrap();
    service.execute(id, add_installment("600.00", 6)).unwrap();

    let err = service.execute(id, add_installment("500.00", 7)).unwrap_err();
    assert!(matches!(err, ServiceError::Billing(BillingError::InvalidMoneyValue(_))));

    let stored = service.get(id).unwrap();
    assert_eq!(stored.version(), 2);
    assert_eq!(stored.installment_count(), 1);
}

#[test]
fn archived_invoice_rejects_commands_until_unarchived() {
    let service = InvoiceService::new(InMemoryInvoiceRepository::new(), InfraConfig::default());
    let id = service
        .create_invoice(new_invoice("INV-2025-003", "1000.00"), test_time())
        .unwrap()
        .id()
        .unwrap();

    service
        .execute(id, |_| InvoiceCommand::Archive { occurred_at: test_time() })
        .unwrap();
    let err = service.execute(id, add_installment("100.00", 6)).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Billing(BillingError::ArchivedInvoiceViolation(Some(_)))
    ));

    service
        .execute(id, |_| InvoiceCommand::Unarchive { occurred_at: test_time() })
        .unwrap();
    service.execute(id, add_installment("100.00", 6)).unwrap();
}

#[test]
fn lost_races_are_retried() {
    let service = InvoiceService::new(RacingRepository::new(2), InfraConfig::default());
    let id = service
        .create_invoice(new_invoice("INV-2025-004", "1000.00"), test_time())
        .unwrap()
        .id()
        .unwrap();

    let saved = service.execute(id, add_installment("100.00", 6)).unwrap();
    assert_eq!(saved.installment_count(), 1);
    // Two interleaved writes plus ours.
    assert_eq!(saved.version(), 4);
}

#[test]
fn retries_are_bounded() {
    let config = InfraConfig::default().with_max_conflict_retries(1);
    let service = InvoiceService::new(RacingRepository::new(u32::MAX), config);
    let id = service
        .create_invoice(new_invoice("INV-2025-005", "1000.00"), test_time())
        .unwrap()
        .id()
        .unwrap();

    let err = service.execute(id, add_installment("100.00", 6)).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::ConflictRetriesExhausted { attempts: 2, .. }
    ));
    assert_eq!(service.get(id).unwrap().installment_count(), 0);
}

#[test]
fn concurrent_payments_all_land() {
    let repository = Arc::new(InMemoryInvoiceRepository::new());
    let config = InfraConfig::default().with_max_conflict_retries(16);
    let service = Arc::new(InvoiceService::new(Arc::clone(&repository), config));

    let id = service
        .create_invoice(new_invoice("INV-2025-006", "1000.00"), test_time())
        .unwrap()
        .id()
        .unwrap();
    service.execute(id, add_installment("80.00", 6)).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&service);
            thread::spawn(move || service.execute(id, pay_first_installment("10.00")))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let invoice = repository.load(id).unwrap();
    assert_eq!(invoice.total_paid(), money("80.00"));
    assert_eq!(invoice.installments()[0].status(), PaymentStatus::Paid);
    assert_eq!(invoice.installments()[0].payment_count(), 8);
}

#[test]
fn invoices_are_found_by_reference_and_deleted() {
    let service = InvoiceService::new(InMemoryInvoiceRepository::new(), InfraConfig::default());
    let created = service
        .create_invoice(new_invoice("INV-2025-007", "10.00"), test_time())
        .unwrap();
    let reference = InvoiceReference::new("INV-2025-007").unwrap();

    let found = service.find_by_reference(&reference).unwrap().unwrap();
    assert_eq!(found, created);

    let err = service
        .create_invoice(new_invoice("INV-2025-007", "20.00"), test_time())
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Repository(RepositoryError::DuplicateReference(_))
    ));

    service.delete(created.id().unwrap(), ExpectedVersion::Exact(1)).unwrap();
    assert!(service.find_by_reference(&reference).unwrap().is_none());
}

#[test]
fn refresh_marks_overdue_installments_late() {
    let service = InvoiceService::new(InMemoryInvoiceRepository::new(), InfraConfig::default());
    let id = service
        .create_invoice(new_invoice("INV-2025-008", "100.00"), test_time())
        .unwrap()
        .id()
        .unwrap();
    service.execute(id, add_installment("100.00", 6)).unwrap();

    let later = Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap();
    let refreshed = service.refresh_statuses(id, later).unwrap();
    assert_eq!(refreshed.installments()[0].status(), PaymentStatus::Late);
    assert!(refreshed.is_overdue_on(later.date_naive()));

    let reloaded = service.get(id).unwrap();
    assert_eq!(reloaded.installments()[0].status(), PaymentStatus::Late);
}

#[test]
fn commands_that_change_nothing_are_not_saved() {
    let service = InvoiceService::new(InMemoryInvoiceRepository::new(), InfraConfig::default());
    let id = service
        .create_invoice(new_invoice("INV-2025-009", "100.00"), test_time())
        .unwrap()
        .id()
        .unwrap();
    service.execute(id, add_installment("100.00", 6)).unwrap();

    // Nothing is due yet.
    let refreshed = service.refresh_statuses(id, test_time()).unwrap();
    assert_eq!(refreshed.version(), 2);

    let same_total = service
        .execute(id, |_| InvoiceCommand::UpdateDetails {
            invoice_reference: Some(InvoiceReference::new("INV-2025-009").unwrap()),
            total_amount: Some(money("100.0")),
            currency: None,
            occurred_at: test_time(),
        })
        .unwrap();
    assert_eq!(same_total.version(), 2);

    let archive = |_: &Invoice| InvoiceCommand::Archive { occurred_at: test_time() };
    assert_eq!(service.execute(id, archive).unwrap().version(), 3);
    assert_eq!(service.execute(id, archive).unwrap().version(), 3);

    // Overdue installments still flip on an archived invoice and are saved.
    let later = Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap();
    assert_eq!(service.refresh_statuses(id, later).unwrap().version(), 4);
    assert_eq!(service.refresh_statuses(id, later).unwrap().version(), 4);
    assert_eq!(service.get(id).unwrap().version(), 4);
}
