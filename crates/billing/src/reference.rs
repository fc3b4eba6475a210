//! Human-facing invoice reference.

use core::fmt;

use payhint_core::{ValueObject, error::ensure_not_blank};
use serde::{Deserialize, Serialize};

use crate::error::BillingResult;

/// Non-blank reference printed on an invoice (e.g. `INV-2025-0042`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InvoiceReference(String);

impl ValueObject for InvoiceReference {}

impl InvoiceReference {
    pub fn new(value: impl Into<String>) -> BillingResult<Self> {
        let value = value.into();
        ensure_not_blank("invoice reference", &value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for InvoiceReference {
    type Error = crate::error::BillingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        InvoiceReference::new(value)
    }
}

impl From<InvoiceReference> for String {
    fn from(value: InvoiceReference) -> Self {
        value.0
    }
}

impl fmt::Display for InvoiceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
