//! De-duplicating log of collaborator failures.
//!
//! The first failure of each `(collaborator, operation)` pair is emitted as
//! a `warn!` event; repeats only bump a counter so a misbehaving
//! collaborator cannot flood the log once per organism per tick.

use std::collections::BTreeMap;

use tracing::warn;

use crate::error::CollaboratorError;

/// Counts collaborator failures and logs each kind once.
#[derive(Debug, Clone, Default)]
pub struct FailureLog {
    counts: BTreeMap<(&'static str, &'static str), u64>,
}

impl FailureLog {
    /// Empty log.
    pub const fn new() -> Self {
        Self {
            counts: BTreeMap::new(),
        }
    }

    /// Record a failure. Returns `true` if this was the first of its kind.
    pub fn record(
        &mut self,
        collaborator: &'static str,
        operation: &'static str,
        err: &CollaboratorError,
    ) -> bool {
        let count = self.counts.entry((collaborator, operation)).or_insert(0);
        *count = count.saturating_add(1);
        let first = *count == 1;
        if first {
            warn!(
                collaborator,
                operation,
                error = %err,
                "Collaborator call failed; treating as no-effect, repeats suppressed"
            );
        }
        first
    }

    /// Failures recorded for one pair.
    pub fn count(&self, collaborator: &'static str, operation: &'static str) -> u64 {
        self.counts
            .get(&(collaborator, operation))
            .copied()
            .unwrap_or(0)
    }

    /// Failures recorded across all pairs.
    pub fn total(&self) -> u64 {
        self.counts.values().fold(0_u64, |acc, n| acc.saturating_add(*n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_first_failure_is_reported() {
        let mut log = FailureLog::new();
        let err = CollaboratorError::failed("boom");
        assert!(log.record("stats", "on_birth", &err));
        assert!(!log.record("stats", "on_birth", &err));
        assert!(log.record("stats", "on_death", &err));
        assert_eq!(log.count("stats", "on_birth"), 2);
        assert_eq!(log.total(), 3);
    }
}
