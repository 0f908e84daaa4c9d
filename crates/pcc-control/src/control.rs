//! PCC rate-control state machine.
//!
//! [`RateControl::step`] runs once per monitoring interval with the utility
//! earned over that interval and returns the rate to use for the next one.
//! It is driven solely by the interval scheduler and never runs concurrently
//! with itself; callers serialize access through the controller's state lock.

use crate::errors::invariant_violation;
use crate::rng::{PccRng, RandomSource};
use crate::state::{trial_batch, vote, Phase, Trial, TrialDecision, TRIAL_COUNT};

/// Smallest trial step, also the Adjust ramp increment.
pub const EPS_MIN: f64 = 0.01;

/// Widest trial step reached after repeated inconclusive batches.
pub const EPS_MAX: f64 = 0.05;

/// Ceiling applied when no rate limit is configured; the largest rate the pacer can hold.
pub const MAX_RATE: f64 = u64::MAX as f64;

/// Startup / Decision / Adjust rate controller.
///
/// Rates are in operations per second and always published within
/// `[1, max_rate_limit]`.
pub struct RateControl<R: RandomSource = PccRng> {
    /// Stored raw so a corrupt value can be detected and repaired.
    phase: u8,
    current_rate: f64,
    previous_rate: f64,
    previous_utility: f64,
    eps: f64,
    sign: f64,
    adjust_iter: u32,
    trials: [Trial; TRIAL_COUNT],
    /// `None` when no trial batch is in progress.
    trial_index: Option<usize>,
    rate_before_trials: f64,
    max_rate_limit: f64,
    last_decision: Option<TrialDecision>,
    rng: R,
}

impl<R: RandomSource> RateControl<R> {
    /// Create a controller in Startup at `initial_rate`.
    pub fn new(initial_rate: f64, max_rate_limit: f64, rng: R) -> Self {
        let max_rate_limit = if max_rate_limit.is_nan() {
            MAX_RATE
        } else {
            max_rate_limit.clamp(1.0, MAX_RATE)
        };
        Self {
            phase: Phase::Startup as u8,
            current_rate: initial_rate,
            previous_rate: initial_rate,
            previous_utility: 0.0,
            eps: EPS_MIN,
            sign: 1.0,
            adjust_iter: 1,
            trials: [Trial::default(); TRIAL_COUNT],
            trial_index: None,
            rate_before_trials: 1.0,
            max_rate_limit,
            last_decision: None,
            rng,
        }
    }

    /// Advance one monitoring interval.
    ///
    /// Returns the clamped rate for the next interval, or `0.0` when the
    /// controller is in a sentinel phase (in which case nothing changes).
    pub fn step(&mut self, utility: f64, loss: f64) -> f64 {
        let phase = match Phase::from_u8(self.phase) {
            Some(phase) if phase.is_sentinel() => return 0.0,
            other => other,
        };

        let rate_before_previous = std::mem::replace(&mut self.previous_rate, self.current_rate);

        let new_rate = match phase {
            Some(Phase::Startup) => self.startup(utility, rate_before_previous),
            Some(Phase::Decision) => self.decision(utility),
            Some(Phase::Adjust) => self.adjust(utility),
            _ => {
                tracing::error!(
                    value = self.phase,
                    "Invalid PCC phase value, restarting from startup"
                );
                self.phase = Phase::Startup as u8;
                self.previous_rate
            }
        };

        let new_rate = new_rate.max(1.0).min(self.max_rate_limit);
        tracing::trace!(
            phase = %self.phase(),
            utility,
            loss,
            previous_utility = self.previous_utility,
            rate = new_rate,
            "PCC step"
        );
        self.previous_utility = utility;
        self.current_rate = new_rate;
        new_rate
    }

    /// Exponential search: double while utility improves.
    fn startup(&mut self, utility: f64, rate_before_previous: f64) -> f64 {
        if utility > self.previous_utility {
            2.0 * self.previous_rate
        } else {
            tracing::debug!(
                fallback_rate = rate_before_previous,
                "Startup utility dropped, entering decision"
            );
            self.phase = Phase::Decision as u8;
            rate_before_previous
        }
    }

    /// Trial batches: probe both directions, then vote.
    fn decision(&mut self, utility: f64) -> f64 {
        let index = match self.trial_index {
            Some(index) => index,
            None => {
                self.begin_trials();
                let Some(first) = self.trial_index else {
                    invariant_violation("trial batch initialization left no active trial");
                };
                return self.trials[first].rate;
            }
        };

        self.trials[index].utility = utility;
        if index + 1 < TRIAL_COUNT {
            self.trial_index = Some(index + 1);
            return self.trials[index + 1].rate;
        }

        self.trial_index = None;
        let decision = vote(&self.trials);
        self.last_decision = Some(decision);
        tracing::debug!(?decision, trials = ?self.trials, eps = self.eps, "Trial batch complete");

        match decision.sign() {
            Some(sign) => {
                let trial_eps = self.eps;
                self.eps = EPS_MIN;
                self.sign = sign;
                self.adjust_iter = 1;
                self.phase = Phase::Adjust as u8;
                self.rate_before_trials * (1.0 + sign * trial_eps)
            }
            None => {
                self.eps = (self.eps + EPS_MIN).min(EPS_MAX);
                self.rate_before_trials
            }
        }
    }

    fn begin_trials(&mut self) {
        let increase_first = self.rng.increase_first();
        self.trials = trial_batch(self.previous_rate, self.eps, increase_first);
        self.rate_before_trials = self.previous_rate;
        self.trial_index = Some(0);
        tracing::debug!(
            base_rate = self.rate_before_trials,
            eps = self.eps,
            increase_first,
            "Starting trial batch"
        );
    }

    /// Linear climb in the voted direction until utility stops improving.
    fn adjust(&mut self, utility: f64) -> f64 {
        if utility > self.previous_utility {
            let n = self.adjust_iter;
            self.adjust_iter += 1;
            self.previous_rate * (1.0 + self.sign * f64::from(n) * EPS_MIN)
        } else {
            tracing::debug!(
                steps = self.adjust_iter - 1,
                "Adjust utility dropped, entering decision"
            );
            self.phase = Phase::Decision as u8;
            self.adjust_iter = 1;
            self.previous_rate
        }
    }

    /// Stop producing rates.
    pub fn terminate(&mut self) {
        self.phase = Phase::Terminated as u8;
        self.trial_index = None;
    }

    /// Seed both current and previous rate.
    pub fn seed_rate(&mut self, rate: f64) {
        self.current_rate = rate;
        self.previous_rate = rate;
    }

    /// Current phase. A corrupt stored value reads as Startup, which is where
    /// the next step will put it.
    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase).unwrap_or(Phase::Startup)
    }

    pub fn current_rate(&self) -> f64 {
        self.current_rate
    }

    pub fn previous_rate(&self) -> f64 {
        self.previous_rate
    }

    pub fn previous_utility(&self) -> f64 {
        self.previous_utility
    }

    pub fn eps(&self) -> f64 {
        self.eps
    }

    pub fn sign(&self) -> f64 {
        self.sign
    }

    pub fn adjust_iter(&self) -> u32 {
        self.adjust_iter
    }

    pub fn trial_index(&self) -> Option<usize> {
        self.trial_index
    }

    pub fn trials(&self) -> &[Trial; TRIAL_COUNT] {
        &self.trials
    }

    pub fn rate_before_trials(&self) -> f64 {
        self.rate_before_trials
    }

    pub fn max_rate_limit(&self) -> f64 {
        self.max_rate_limit
    }

    /// Outcome of the most recently completed trial batch.
    pub fn last_decision(&self) -> Option<TrialDecision> {
        self.last_decision
    }

    /// The random source shared with interval jitter.
    pub(crate) fn random(&mut self) -> &mut R {
        &mut self.rng
    }

    #[cfg(test)]
    pub(crate) fn set_raw_phase(&mut self, raw: u8) {
        self.phase = raw;
    }
}

impl<R: RandomSource> std::fmt::Debug for RateControl<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateControl")
            .field("phase", &self.phase())
            .field("current_rate", &self.current_rate)
            .field("previous_rate", &self.previous_rate)
            .field("previous_utility", &self.previous_utility)
            .field("eps", &self.eps)
            .field("trial_index", &self.trial_index)
            .finish()
    }
}
