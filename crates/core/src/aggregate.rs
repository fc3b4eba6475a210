//! Aggregate root trait and command execution for state-based domain models.

use crate::entity::Entity;

/// Aggregate root marker + minimal interface.
///
/// All consistency-relevant mutation of an aggregate's object graph goes
/// through its root. The root is loaded, mutated and saved as one unit.
pub trait AggregateRoot: Entity {
    /// Version of the persisted state this instance was loaded from.
    ///
    /// `0` means the aggregate has never been stored.
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for an aggregate.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (useful for migrations, administrative overwrites, etc.).
    Any,
    /// Require the aggregate to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }
}

/// Aggregate execution semantics (synchronous, in-memory).
///
/// `execute` validates the command against the current state and either
/// applies it completely or fails without changing anything. It returns
/// whether the state changed, so a no-op need not be persisted.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    fn execute(&mut self, command: Self::Command) -> Result<bool, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_version_must_match() {
        assert!(ExpectedVersion::Exact(3).matches(3));
        assert!(!ExpectedVersion::Exact(3).matches(4));
        assert!(ExpectedVersion::Any.matches(42));
    }
}
