//! PCC (Performance-oriented Congestion Control) rate controller.
//!
//! Answers one question for a packet sender: how many operations per second
//! may it perform right now. The transmission layer calls
//! [`Controller::limit`] before each send and [`Controller::add_loss`] when it
//! detects loss; a background monitoring-interval scheduler turns those
//! counts into throughput and loss, scores them with the [`utility()`]
//! function, and lets the [`RateControl`] state machine pick the next rate.
//!
//! ## Control Loop
//!
//! | Phase | Behavior |
//! |-------|----------|
//! | Startup | Double the rate every interval while utility grows |
//! | Decision | Probe `rate·(1±eps)` in randomized pairs and vote on a direction |
//! | Adjust | Step linearly in the voted direction until utility drops |
//!
//! Monitoring intervals last `rtt · U(1.7, 2.2)` so independent controllers
//! sharing a bottleneck do not tick in lockstep.
//!
//! Socket I/O, sequencing and retransmission are left to the caller.

mod config;
mod control;
mod controller;
mod counters;
mod errors;
mod pacer;
mod rng;
mod scheduler;
mod state;
mod stats;
mod time_source;
pub mod utility;


// Re-export public API
pub use config::{
    mbits_to_ops_per_sec, ops_per_sec_to_mbits, ControllerConfig, LoggingConfig,
    DEFAULT_PAYLOAD_SIZE, DEFAULT_START_RATE_MBITS, MIN_RTT_MILLIS, MI_MULTIPLIER_MAX,
    MI_MULTIPLIER_MIN,
};
pub use control::{RateControl, EPS_MAX, EPS_MIN, MAX_RATE};
pub use controller::Controller;
pub use errors::ConfigError;
pub use pacer::{Pacer, DEFAULT_PACER_BURST};
pub use rng::{PccRng, RandomSource};
pub use state::{vote, Phase, Trial, TrialDecision, TRIAL_COUNT};
pub use stats::{IntervalReport, PccStats};
pub use time_source::{InstantTimeSrc, TimeSource};
pub use utility::utility;
