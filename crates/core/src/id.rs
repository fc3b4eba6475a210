//! Strongly-typed identifiers used across the domain.
//!
//! Every identifier is a 128-bit UUID wrapped in its own newtype. Parsing is
//! case-insensitive; rendering is always the lower-case hyphenated form.

/// Declare a `Copy` UUID newtype with the standard identifier surface.
///
/// The calling crate must depend on `serde` (derive).
#[macro_export]
macro_rules! uuid_newtype {
    ($(#[$meta:meta])* $vis:vis struct $t:ident;) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        $vis struct $t($crate::__uuid::Uuid);

        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
            pub fn new() -> Self {
                Self($crate::__uuid::Uuid::now_v7())
            }

            pub fn from_uuid(uuid: $crate::__uuid::Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &$crate::__uuid::Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0.hyphenated(), f)
            }
        }

        impl From<$crate::__uuid::Uuid> for $t {
            fn from(value: $crate::__uuid::Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for $crate::__uuid::Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl core::str::FromStr for $t {
            type Err = $crate::DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = $crate::__uuid::Uuid::parse_str(s.trim()).map_err(|e| {
                    $crate::DomainError::invalid_id(format!("{}: {:?}: {}", stringify!($t), s, e))
                })?;
                Ok(Self(uuid))
            }
        }
    };
}

uuid_newtype! {
    /// Identifier of a customer (CRM context; referenced by invoices).
    pub struct CustomerId;
}
