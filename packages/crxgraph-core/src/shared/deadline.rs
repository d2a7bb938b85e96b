//! Cooperative wall-clock budget for one script analysis.
//!
//! The analysis has no suspension points; instead the top-level loops
//! (graph construction, rule iteration, flow enumeration) poll the
//! deadline and abort with [`CrxError::DeadlineExceeded`] once past it.

use std::time::{Duration, Instant};

use crate::errors::{CrxError, Result};

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    end: Option<Instant>,
    budget_secs: u64,
}

impl Deadline {
    /// Deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            end: Some(Instant::now() + budget),
            budget_secs: budget.as_secs(),
        }
    }

    pub fn after_secs(secs: u64) -> Self {
        Self::after(Duration::from_secs(secs))
    }

    /// A deadline that never expires (tests, interactive use).
    pub fn unlimited() -> Self {
        Self {
            end: None,
            budget_secs: 0,
        }
    }

    pub fn expired(&self) -> bool {
        match self.end {
            Some(end) => Instant::now() >= end,
            None => false,
        }
    }

    pub fn check(&self) -> Result<()> {
        if self.expired() {
            Err(CrxError::DeadlineExceeded(self.budget_secs))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_never_expires() {
        let d = Deadline::unlimited();
        assert!(!d.expired());
        assert!(d.check().is_ok());
    }

    #[test]
    fn test_zero_budget_expires_immediately() {
        let d = Deadline::after(Duration::from_secs(0));
        assert!(d.expired());
        assert!(matches!(d.check(), Err(CrxError::DeadlineExceeded(_))));
    }
}
