//! Bounded-search limits.
//!
//! The nession engine and the Horn-clause elaborator both run fixed-point
//! searches that would not otherwise terminate. Three budgets bound them
//! (`max_nession_depth`, `max_message_depth`, `max_branching_per_frame`);
//! this module gives them cooperative, atomic-counter-backed enforcement —
//! periodic `check_*` calls rather than a preemptive interrupt.

use std::sync::atomic::{AtomicUsize, Ordering};

/// A limit that was exceeded during bounded search.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BudgetError {
    /// The nession engine reached `max_nession_depth` frames.
    #[error("nession depth limit exceeded: {actual} frames, limit {limit}")]
    NessionDepthExceeded { limit: usize, actual: usize },

    /// A branch point produced more candidate extensions than allowed.
    #[error("branching limit exceeded in frame {frame}: {actual} candidates, limit {limit}")]
    BranchingExceeded {
        limit: usize,
        actual: usize,
        frame: usize,
    },

    /// A composed message's depth exceeded `max_message_depth`; the clause
    /// that produced it is dropped, not an error to the caller — this
    /// variant exists for the elaborator's internal bookkeeping and tests,
    /// not for `QueryEngine::execute`'s return value.
    #[error("message depth limit exceeded: depth {actual}, limit {limit}")]
    MessageDepthExceeded { limit: usize, actual: usize },
}

/// Resource limits shared by the nession engine and the elaborator.
#[derive(Debug, Clone, Copy)]
pub struct SearchLimits {
    pub max_nession_depth: usize,
    pub max_message_depth: usize,
    pub max_branching_per_frame: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        SearchLimits {
            max_nession_depth: 6,
            max_message_depth: 20,
            max_branching_per_frame: 8,
        }
    }
}

impl SearchLimits {
    pub fn check_nession_depth(&self, actual: usize) -> Result<(), BudgetError> {
        if actual > self.max_nession_depth {
            Err(BudgetError::NessionDepthExceeded {
                limit: self.max_nession_depth,
                actual,
            })
        } else {
            Ok(())
        }
    }

    pub fn check_branching(&self, frame: usize, actual: usize) -> Result<(), BudgetError> {
        if actual > self.max_branching_per_frame {
            Err(BudgetError::BranchingExceeded {
                limit: self.max_branching_per_frame,
                actual,
                frame,
            })
        } else {
            Ok(())
        }
    }

    pub fn check_message_depth(&self, actual: usize) -> Result<(), BudgetError> {
        if actual > self.max_message_depth {
            Err(BudgetError::MessageDepthExceeded {
                limit: self.max_message_depth,
                actual,
            })
        } else {
            Ok(())
        }
    }
}

/// Counts branch points taken during one nession's extension, purely for
/// diagnostics (exposed via `tracing` at `debug` level by the caller).
#[derive(Debug, Default)]
pub struct BranchCounter(AtomicUsize);

impl BranchCounter {
    pub fn new() -> Self {
        BranchCounter(AtomicUsize::new(0))
    }

    pub fn record(&self, n: usize) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn total(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_within_limit() {
        let limits = SearchLimits::default();
        assert!(limits.check_nession_depth(6).is_ok());
        assert!(limits.check_nession_depth(7).is_err());
    }

    #[test]
    fn branching_within_limit() {
        let limits = SearchLimits::default();
        assert!(limits.check_branching(0, 8).is_ok());
        assert!(matches!(
            limits.check_branching(2, 9),
            Err(BudgetError::BranchingExceeded { frame: 2, .. })
        ));
    }

    #[test]
    fn branch_counter_accumulates() {
        let counter = BranchCounter::new();
        counter.record(3);
        counter.record(2);
        assert_eq!(counter.total(), 5);
    }
}
