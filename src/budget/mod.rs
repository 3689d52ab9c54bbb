//! Byte budgets and the bookkeeping that decides when a sweep can stop.

pub mod tracker;

pub use tracker::{BestTracker, TrialHook};

use crate::error::ConfigError;

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

/// Maximum acceptable output size in bytes; always positive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Budget(usize);

impl Budget {
    pub fn new(bytes: usize) -> Result<Self, ConfigError> {
        if bytes == 0 {
            return Err(ConfigError::InvalidBudget(
                "budget must be at least one byte".to_string(),
            ));
        }
        Ok(Self(bytes))
    }

    /// `max_megabytes * 1024 * 1024`, truncated
    pub fn from_megabytes(max_megabytes: f64) -> Result<Self, ConfigError> {
        if !max_megabytes.is_finite() || max_megabytes <= 0.0 {
            return Err(ConfigError::InvalidBudget(format!(
                "{} MB is not a positive size",
                max_megabytes
            )));
        }
        let bytes = (max_megabytes * BYTES_PER_MEGABYTE) as usize;
        Self::new(bytes)
    }

    pub fn bytes(&self) -> usize {
        self.0
    }

    pub fn fits(&self, size: usize) -> bool {
        size <= self.0
    }

    /// Share of the budget for one page of a `page_count`-page document
    pub fn per_page(&self, page_count: usize) -> usize {
        self.0 / page_count.max(1)
    }
}

/// Decides from one rendered page whether a full rebuild is worth attempting.
///
/// Only meaningful for multi-page documents: a single page is its own sample.
#[derive(Debug, Clone, Copy)]
pub struct SampleGate {
    per_page_budget: usize,
    slack: f32,
}

impl SampleGate {
    /// None when `page_count <= 1`
    pub fn new(budget: Budget, page_count: usize, slack: f32) -> Option<Self> {
        if page_count <= 1 {
            return None;
        }
        Some(Self {
            per_page_budget: budget.per_page(page_count),
            slack,
        })
    }

    pub fn per_page_budget(&self) -> usize {
        self.per_page_budget
    }

    /// False when the sample exceeds the per-page budget times the slack
    pub fn allows(&self, sample_bytes: usize) -> bool {
        sample_bytes as f64 <= self.per_page_budget as f64 * f64::from(self.slack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_from_megabytes_truncates() {
        assert_eq!(Budget::from_megabytes(0.3).unwrap().bytes(), 314_572);
        assert_eq!(Budget::from_megabytes(2.0).unwrap().bytes(), 2_097_152);
    }

    #[test]
    fn test_budget_rejects_non_positive() {
        assert!(Budget::new(0).is_err());
        assert!(Budget::from_megabytes(0.0).is_err());
        assert!(Budget::from_megabytes(-1.0).is_err());
        assert!(Budget::from_megabytes(f64::NAN).is_err());
        // Truncates to zero bytes
        assert!(Budget::from_megabytes(1e-9).is_err());
    }

    #[test]
    fn test_sample_gate_single_page_disabled() {
        let budget = Budget::new(1000).unwrap();
        assert!(SampleGate::new(budget, 1, 1.5).is_none());
        assert!(SampleGate::new(budget, 0, 1.5).is_none());
    }

    #[test]
    fn test_sample_gate_slack() {
        let budget = Budget::new(300_000).unwrap();
        let gate = SampleGate::new(budget, 5, 1.5).unwrap();
        assert_eq!(gate.per_page_budget(), 60_000);
        assert!(gate.allows(90_000));
        assert!(!gate.allows(90_001));
    }
}
