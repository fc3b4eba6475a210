//! Configuration loading and representation.

use tracing::warn;

pub const MAX_CONFLICT_RETRIES_VAR: &str = "PAYHINT_MAX_CONFLICT_RETRIES";

/// Application-service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfraConfig {
    /// How many times a command is re-run on a freshly loaded invoice after
    /// an optimistic-concurrency conflict. `0` disables retrying.
    pub max_conflict_retries: u32,
}

impl Default for InfraConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 3,
        }
    }
}

impl InfraConfig {
    /// Read from the process environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`InfraConfig::from_env`], reading values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup(MAX_CONFLICT_RETRIES_VAR) {
            match raw.trim().parse::<u32>() {
                Ok(retries) => config.max_conflict_retries = retries,
                Err(e) => warn!(
                    var = MAX_CONFLICT_RETRIES_VAR,
                    value = %raw,
                    error = %e,
                    default = config.max_conflict_retries,
                    "invalid value, using default"
                ),
            }
        }
        config
    }

    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }
}
