use std::fmt;
use std::ops::ControlFlow;

use crate::model::{Compressed, Outcome, Trial, TrialParams, TrialResult};

use super::Budget;

/// Smallest output seen so far, and the trial that made it
#[derive(Debug, Clone)]
struct Candidate {
    bytes: Vec<u8>,
    params: TrialParams,
}

/// Callback run after every executed trial with that trial and the size of
/// the best candidate so far. Returning `Break` ends the sweep early.
pub type TrialHook = Box<dyn FnMut(&Trial, Option<usize>) -> ControlFlow<()> + Send>;

/// Running accumulator for one sweep.
///
/// Keeps the smallest output recorded so far and a log of every executed
/// trial. The best candidate only ever shrinks. A caller bounding latency
/// installs a hook with `with_hook`; it sees each trial as it lands and can
/// stop the sweep, which then returns the best candidate as if the budget
/// was never met.
pub struct BestTracker {
    budget: Budget,
    best: Option<Candidate>,
    trials: Vec<Trial>,
    skipped: Vec<TrialParams>,
    hook: Option<TrialHook>,
    stopped: bool,
}

impl fmt::Debug for BestTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BestTracker")
            .field("budget", &self.budget)
            .field("best", &self.best)
            .field("trials", &self.trials)
            .field("skipped", &self.skipped)
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}

impl BestTracker {
    pub fn new(budget: Budget) -> Self {
        Self {
            budget,
            best: None,
            trials: Vec::new(),
            skipped: Vec::new(),
            hook: None,
            stopped: false,
        }
    }

    pub fn with_hook<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&Trial, Option<usize>) -> ControlFlow<()> + Send + 'static,
    {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn budget(&self) -> Budget {
        self.budget
    }

    /// Record a trial's output. Returns true when it fits the budget and the
    /// sweep should stop.
    pub fn record(&mut self, params: TrialParams, bytes: Vec<u8>) -> bool {
        let size = bytes.len();
        let smaller = self
            .best
            .as_ref()
            .map_or(true, |best| size < best.bytes.len());
        if smaller {
            self.best = Some(Candidate { bytes, params });
        }
        self.log_trial(Trial {
            params,
            result: TrialResult::Produced(size),
        });

        let fits = self.budget.fits(size);
        log::debug!(
            "Trial {}: {} bytes ({} budget {})",
            params,
            size,
            if fits { "within" } else { "over" },
            self.budget.bytes()
        );
        fits
    }

    /// Log a trial aborted by a capability error; it never becomes the best
    pub fn record_failure(&mut self, params: TrialParams) {
        self.log_trial(Trial {
            params,
            result: TrialResult::Failed,
        });
    }

    fn log_trial(&mut self, trial: Trial) {
        let best_len = self.best_len();
        if let Some(hook) = self.hook.as_mut() {
            if hook(&trial, best_len).is_break() {
                log::info!("Sweep stopped by caller after trial {}", trial.params);
                self.stopped = true;
            }
        }
        self.trials.push(trial);
    }

    /// Whether the hook asked the sweep to end
    pub fn stopped(&self) -> bool {
        self.stopped
    }

    /// Log a parameter pair that the sample gate ruled out
    pub fn record_skip(&mut self, params: TrialParams) {
        self.skipped.push(params);
    }

    /// Best candidate bytes and the trial that produced them
    pub fn best(&self) -> Option<(&[u8], TrialParams)> {
        self.best
            .as_ref()
            .map(|best| (best.bytes.as_slice(), best.params))
    }

    pub fn best_len(&self) -> Option<usize> {
        self.best.as_ref().map(|best| best.bytes.len())
    }

    /// Executed trials in the order they ran
    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    /// Pairs skipped without a full rebuild
    pub fn skipped(&self) -> &[TrialParams] {
        &self.skipped
    }

    /// Best candidate as a finished result; `original` stands in when no
    /// trial produced anything
    pub fn finalize(&self, original: &[u8]) -> Outcome {
        let (bytes, trial) = match &self.best {
            Some(best) => (best.bytes.clone(), Some(best.params)),
            None => (original.to_vec(), None),
        };
        let within_budget = self.budget.fits(bytes.len());
        Outcome::Success(Compressed {
            bytes,
            within_budget,
            trial,
        })
    }
}
