//! Read-only snapshots of controller state.

use std::time::Duration;

use crate::state::{Phase, TrialDecision};

/// What happened over one monitoring interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalReport {
    pub tx_count: u64,
    pub loss_count: u64,
    /// Payload bytes per millisecond.
    pub throughput: f64,
    pub loss: f64,
    pub utility: f64,
    /// Rate chosen for the next interval (ops/sec); `0.0` if the controller is terminated.
    pub new_rate: f64,
    /// Whether `new_rate` was pushed to the pacer.
    pub published: bool,
}

/// Controller statistics for monitoring and tests.
#[derive(Debug, Clone)]
pub struct PccStats {
    pub phase: Phase,
    pub current_rate: f64,
    pub previous_rate: f64,
    pub previous_utility: f64,
    pub eps: f64,
    pub sign: f64,
    pub adjust_iter: u32,
    pub trial_index: Option<usize>,
    pub last_decision: Option<TrialDecision>,
    pub max_rate_limit: f64,
    /// Rate the pacer is enforcing right now (ops/sec).
    pub pacer_rate: u64,
    pub rtt: Option<Duration>,
    pub interval_duration: Option<Duration>,
    pub intervals: u64,
    pub scheduler_running: bool,
    pub last_interval: Option<IntervalReport>,
}
