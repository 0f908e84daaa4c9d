//! PCC control-loop phases and rate control trials.
//!
//! ## Phase Transitions
//!
//! ```text
//! ┌────────────────┐
//! │    Startup     │  rate doubles every interval while utility grows
//! └───────┬────────┘
//!         │ (utility stops growing: fall back to the pre-doubling rate)
//!         ▼
//! ┌────────────────┐ ◄──────────────┐
//! │    Decision    │  4 trial rates  │ (inconclusive vote: widen eps, retry)
//! │                │ ───────────────┘
//! └───────┬────────┘
//!         │ (vote says Increase or Decrease)
//!         ▼
//! ┌────────────────┐
//! │     Adjust     │  linear steps in the voted direction
//! └───────┬────────┘
//!         │ (utility stops growing: keep the last good rate)
//!         └────────────────────────────────► Decision
//! ```
//!
//! `Uninitialized` and `Terminated` are sentinels that produce no rate.

/// Number of rate control trials per decision batch.
pub const TRIAL_COUNT: usize = 4;

/// Control-loop phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Phase {
    /// No RTT or rate information yet.
    Uninitialized = 0,
    /// Trial-based direction finding.
    Decision = 1,
    /// Linear climb in the direction picked by the last decision.
    Adjust = 2,
    /// Exponential search for the first utility drop.
    Startup = 3,
    /// Shut down; no further rate decisions.
    Terminated = 4,
}

impl Phase {
    /// Convert from u8, returning None for invalid values.
    pub(crate) fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Uninitialized),
            1 => Some(Self::Decision),
            2 => Some(Self::Adjust),
            3 => Some(Self::Startup),
            4 => Some(Self::Terminated),
            _ => None,
        }
    }

    /// Sentinel phases never produce a sending rate.
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Self::Uninitialized | Self::Terminated)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Uninitialized => write!(f, "uninitialized"),
            Phase::Decision => write!(f, "decision"),
            Phase::Adjust => write!(f, "adjust"),
            Phase::Startup => write!(f, "startup"),
            Phase::Terminated => write!(f, "terminated"),
        }
    }
}

/// One rate control trial: a probe rate and the utility it earned.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Trial {
    pub rate: f64,
    pub utility: f64,
}

impl Trial {
    pub(crate) fn new(rate: f64) -> Self {
        Self { rate, utility: 0.0 }
    }
}

/// Outcome of a completed trial batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialDecision {
    Increase,
    Decrease,
    Inconclusive,
}

impl TrialDecision {
    /// Direction to move the rate in, if any.
    pub fn sign(&self) -> Option<f64> {
        match self {
            TrialDecision::Increase => Some(1.0),
            TrialDecision::Decrease => Some(-1.0),
            TrialDecision::Inconclusive => None,
        }
    }
}

/// Build a batch of trial rates around `base_rate`.
///
/// Trials come in opposing pairs `base·(1+eps)` / `base·(1−eps)`. When
/// `increase_first` is set the higher rate leads each pair.
pub(crate) fn trial_batch(base_rate: f64, eps: f64, increase_first: bool) -> [Trial; TRIAL_COUNT] {
    std::array::from_fn(|i| {
        let leads = i % 2 == 0;
        let sign = if leads == increase_first { 1.0 } else { -1.0 };
        Trial::new(base_rate * (1.0 + sign * eps))
    })
}

/// Pairwise vote over a completed batch.
///
/// Each adjacent pair `(i, i+1)` votes `+1` when the higher-utility trial also
/// had the higher rate, `-1` otherwise. Pairs with equal utility abstain.
pub fn vote(trials: &[Trial]) -> TrialDecision {
    let mut score = 0i32;
    for pair in trials.chunks_exact(2) {
        let (a, b) = (pair[0], pair[1]);
        if a.utility == b.utility {
            continue;
        }
        let (winner, loser) = if a.utility > b.utility { (a, b) } else { (b, a) };
        score += if winner.rate > loser.rate { 1 } else { -1 };
    }

    match score {
        s if s > 0 => TrialDecision::Increase,
        s if s < 0 => TrialDecision::Decrease,
        _ => TrialDecision::Inconclusive,
    }
}
