//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: two instances
/// holding the same value are interchangeable. To "modify" one, build a new
/// one. Construction validates, so an existing value object is always valid.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct InvoiceReference(String);
///
/// impl ValueObject for InvoiceReference {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
