use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;

use payhint_billing::{Invoice, InvoiceId, InvoiceRecord, InvoiceReference};
use payhint_core::{AggregateRoot, ExpectedVersion};

use super::{InvoiceRepository, RepositoryError};

#[derive(Debug, Default)]
struct Tables {
    /// Serialized `InvoiceRecord`s, one per invoice.
    invoices: HashMap<InvoiceId, JsonValue>,
    by_reference: HashMap<InvoiceReference, InvoiceId>,
}

/// In-memory invoice store.
///
/// Keeps each invoice as a serialized record so that nothing handed out can
/// alias stored state, and every load goes through the same validation a
/// database-backed store would. Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryInvoiceRepository {
    tables: RwLock<Tables>,
}

impl InMemoryInvoiceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize, RepositoryError> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables.invoices.len())
    }

    pub fn is_empty(&self) -> Result<bool, RepositoryError> {
        Ok(self.len()? == 0)
    }

    fn encode(invoice: &Invoice, version: u64) -> Result<(InvoiceRecord, JsonValue), RepositoryError> {
        let mut record = invoice
            .to_record()
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        record.version = version;
        let json = serde_json::to_value(&record)
            .map_err(|e| RepositoryError::Serialization(format!("record serialization failed: {e}")))?;
        Ok((record, json))
    }

    fn decode(json: &JsonValue) -> Result<Invoice, RepositoryError> {
        let record: InvoiceRecord = serde_json::from_value(json.clone())
            .map_err(|e| RepositoryError::Serialization(format!("record deserialization failed: {e}")))?;
        Invoice::from_record(record).map_err(RepositoryError::Corrupt)
    }

    fn stored_version(json: &JsonValue) -> Result<u64, RepositoryError> {
        json.get("version")
            .and_then(JsonValue::as_u64)
            .ok_or_else(|| RepositoryError::Serialization("stored record has no version".to_string()))
    }

    fn ensure_reference_free(
        tables: &Tables,
        reference: &InvoiceReference,
        owner: InvoiceId,
    ) -> Result<(), RepositoryError> {
        match tables.by_reference.get(reference) {
            Some(existing) if *existing != owner => Err(RepositoryError::DuplicateReference(reference.clone())),
            _ => Ok(()),
        }
    }
}

fn poisoned<T>(_: T) -> RepositoryError {
    RepositoryError::Unavailable("lock poisoned".to_string())
}

impl InvoiceRepository for InMemoryInvoiceRepository {
    fn insert(&self, mut invoice: Invoice) -> Result<Invoice, RepositoryError> {
        if invoice.version() != 0 {
            return Err(RepositoryError::Conflict(format!(
                "invoice is already stored at version {}",
                invoice.version()
            )));
        }
        let id = match invoice.id() {
            Some(id) => id,
            None => {
                let id = InvoiceId::new();
                invoice
                    .assign_id(id)
                    .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
                id
            }
        };

        let mut tables = self.tables.write().map_err(poisoned)?;
        if tables.invoices.contains_key(&id) {
            return Err(RepositoryError::Conflict(format!("invoice {id} already exists")));
        }
        Self::ensure_reference_free(&tables, invoice.invoice_reference(), id)?;

        let (record, json) = Self::encode(&invoice, 1)?;
        tables.by_reference.insert(record.invoice_reference.clone(), id);
        tables.invoices.insert(id, json);

        Invoice::from_record(record).map_err(RepositoryError::Corrupt)
    }

    fn load(&self, id: InvoiceId) -> Result<Invoice, RepositoryError> {
        let tables = self.tables.read().map_err(poisoned)?;
        let json = tables.invoices.get(&id).ok_or(RepositoryError::NotFound(id))?;
        Self::decode(json)
    }

    fn save(&self, invoice: &Invoice) -> Result<Invoice, RepositoryError> {
        let id = invoice
            .id()
            .ok_or_else(|| RepositoryError::Conflict("invoice has no id; insert it first".to_string()))?;

        let mut tables = self.tables.write().map_err(poisoned)?;
        let current = tables
            .invoices
            .get(&id)
            .map(Self::stored_version)
            .transpose()?
            .ok_or(RepositoryError::NotFound(id))?;

        if !ExpectedVersion::Exact(invoice.version()).matches(current) {
            return Err(RepositoryError::Conflict(format!(
                "invoice {id}: expected version {}, found {current}",
                invoice.version()
            )));
        }
        Self::ensure_reference_free(&tables, invoice.invoice_reference(), id)?;

        let (record, json) = Self::encode(invoice, current + 1)?;
        tables.by_reference.retain(|_, owner| *owner != id);
        tables.by_reference.insert(record.invoice_reference.clone(), id);
        tables.invoices.insert(id, json);

        Invoice::from_record(record).map_err(RepositoryError::Corrupt)
    }

    fn delete(&self, id: InvoiceId, expected_version: ExpectedVersion) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        let current = tables
            .invoices
            .get(&id)
            .map(Self::stored_version)
            .transpose()?
            .ok_or(RepositoryError::NotFound(id))?;

        if !expected_version.matches(current) {
            return Err(RepositoryError::Conflict(format!(
                "invoice {id}: expected {expected_version:?}, found {current}"
            )));
        }

        tables.invoices.remove(&id);
        tables.by_reference.retain(|_, owner| *owner != id);
        Ok(())
    }

    fn find_by_reference(&self, reference: &InvoiceReference) -> Result<Option<Invoice>, RepositoryError> {
        let tables = self.tables.read().map_err(poisoned)?;
        let Some(id) = tables.by_reference.get(reference) else {
            return Ok(None);
        };
        let json = tables.invoices.get(id).ok_or(RepositoryError::NotFound(*id))?;
        Self::decode(json).map(Some)
    }
}
