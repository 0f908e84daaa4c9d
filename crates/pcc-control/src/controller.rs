//! Controller facade used by the transmission layer.
//!
//! ## Usage
//!
//! ```ignore
//! let controller = Arc::new(Controller::new(ControllerConfig::new(1200))?);
//! controller.update_rtt(40);
//!
//! // Sender threads:
//! controller.limit();
//! socket.send_to(&packet, peer)?;
//!
//! // Loss detection:
//! controller.add_loss(lost);
//! ```
//!
//! ## Locking
//!
//! All mutable controller state sits behind one mutex. `limit()` waits on the
//! pacer without holding it and only takes it afterwards to count the send.
//! The scheduler slot has its own mutex so stopping a ticker never waits on a
//! tick that is itself waiting for the state lock.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::{
    interval_duration, mbits_to_ops_per_sec, ops_per_sec_to_mbits, ControllerConfig,
    MIN_RTT_MILLIS, MI_MULTIPLIER_MAX, MI_MULTIPLIER_MIN,
};
use crate::control::{RateControl, MAX_RATE};
use crate::counters::IntervalCounters;
use crate::errors::ConfigError;
use crate::pacer::{Pacer, DEFAULT_PACER_BURST};
use crate::rng::{PccRng, RandomSource};
use crate::scheduler::MonitorTask;
use crate::state::Phase;
use crate::stats::{IntervalReport, PccStats};
use crate::utility::utility;

/// PCC rate controller.
///
/// Share it behind an `Arc`; every operation takes `&self`.
pub struct Controller<R: RandomSource = PccRng> {
    inner: Arc<Inner<R>>,
    scheduler: Mutex<Option<MonitorTask>>,
}

struct Inner<R: RandomSource> {
    state: Mutex<ControllerState<R>>,
    pacer: Pacer,
    settings: Settings,
    dispatch: Option<tracing::Dispatch>,
}

/// Immutable after construction.
#[derive(Debug, Clone, Copy)]
struct Settings {
    disabled: bool,
    fixed_rate_ops: Option<u64>,
    payload_size: usize,
}

struct ControllerState<R: RandomSource> {
    control: RateControl<R>,
    counters: IntervalCounters,
    rtt: Option<Duration>,
    interval: Option<Duration>,
    intervals: u64,
    last_interval: Option<IntervalReport>,
}

impl Controller<PccRng> {
    /// Build a controller with an entropy-seeded random source.
    pub fn new(config: ControllerConfig) -> Result<Self, ConfigError> {
        Self::with_random_source(config, PccRng::from_entropy())
    }
}

impl<R: RandomSource> Controller<R> {
    /// Build a controller drawing trial order and interval jitter from `rng`.
    pub fn with_random_source(config: ControllerConfig, rng: R) -> Result<Self, ConfigError> {
        config.validate()?;

        let payload_size = config.payload_size;
        let fixed_rate_ops = config
            .fixed_rate()
            .map(|mbits| mbits_to_ops_per_sec(mbits, payload_size));
        let start_ops = fixed_rate_ops.unwrap_or_else(|| {
            mbits_to_ops_per_sec(config.effective_start_rate_mbits(), payload_size)
        });
        let pacer_rate = if config.disable_congestion_control && fixed_rate_ops.is_none() {
            u64::MAX
        } else {
            start_ops
        };
        let max_rate_limit = fixed_rate_ops.map_or(MAX_RATE, |ops| ops as f64);

        let settings = Settings {
            disabled: config.disable_congestion_control,
            fixed_rate_ops,
            payload_size,
        };

        let inner = Inner {
            state: Mutex::new(ControllerState {
                control: RateControl::new(start_ops as f64, max_rate_limit, rng),
                counters: IntervalCounters::default(),
                rtt: None,
                interval: None,
                intervals: 0,
                last_interval: None,
            }),
            pacer: Pacer::new(pacer_rate, DEFAULT_PACER_BURST),
            settings,
            dispatch: config.logging,
        };

        inner.in_scope(|| {
            tracing::debug!(
                ops_per_sec = start_ops,
                payload_size,
                disabled = settings.disabled,
                fixed_rate_ops = ?settings.fixed_rate_ops,
                "Rate controller created"
            );
        });

        Ok(Self {
            inner: Arc::new(inner),
            scheduler: Mutex::new(None),
        })
    }

    /// Record an RTT sample (milliseconds) and restart the monitoring interval.
    ///
    /// The interval length is `rtt · U(1.7, 2.2)`. Any running scheduler is
    /// stopped before the new one starts.
    pub fn update_rtt(&self, rtt_millis: u64) {
        self.inner.in_scope(|| {
            let rtt_millis = if rtt_millis < MIN_RTT_MILLIS {
                tracing::warn!(rtt_millis, "RTT sample below minimum, clamping");
                MIN_RTT_MILLIS
            } else {
                rtt_millis
            };

            let mut slot = self.scheduler.lock();
            if let Some(task) = slot.take() {
                task.stop();
            }

            let (period, rate) = {
                let mut state = self.inner.state.lock();
                if state.control.phase() == Phase::Terminated {
                    tracing::debug!("RTT update ignored, controller is shut down");
                    return;
                }

                let multiplier = state
                    .control
                    .random()
                    .uniform(MI_MULTIPLIER_MIN, MI_MULTIPLIER_MAX);
                let period = interval_duration(rtt_millis, multiplier);
                state.rtt = Some(Duration::from_millis(rtt_millis));
                state.interval = Some(period);

                if state.control.current_rate() <= 0.0 {
                    let seeded = (self.inner.settings.payload_size as u64 / rtt_millis).max(1);
                    state.control.seed_rate(seeded as f64);
                }
                (period, state.control.current_rate())
            };

            self.inner.publish_rate(rate);

            let inner = self.inner.clone();
            let dispatch = self.inner.dispatch.clone();
            match MonitorTask::spawn(period, dispatch, move || {
                inner.on_interval();
            }) {
                Ok(task) => {
                    tracing::debug!(
                        rtt_millis,
                        period = ?task.period(),
                        rate,
                        "Monitoring interval restarted"
                    );
                    *slot = Some(task);
                }
                Err(error) => {
                    tracing::error!(%error, "Failed to start monitoring interval scheduler");
                }
            }
        })
    }

    /// Block until the pacer allows one more operation, then count it.
    ///
    /// Returns immediately without counting when congestion control is disabled.
    pub fn limit(&self) {
        if self.inner.settings.disabled {
            return;
        }
        self.inner.pacer.acquire();
        self.inner.state.lock().counters.record_tx();
    }

    /// Report `count` lost operations for the current interval.
    pub fn add_loss(&self, count: u64) {
        if self.inner.settings.disabled {
            return;
        }
        self.inner.state.lock().counters.record_loss(count);
    }

    /// Close the current monitoring interval now.
    ///
    /// This is exactly what the scheduler does on every tick.
    pub fn on_interval(&self) -> IntervalReport {
        self.inner.on_interval()
    }

    /// Stop the scheduler and move to the terminated phase.
    pub fn shutdown(&self) {
        self.inner.in_scope(|| {
            if let Some(task) = self.scheduler.lock().take() {
                task.stop();
            }
            self.inner.state.lock().control.terminate();
            tracing::debug!("Rate controller shut down");
        })
    }

    /// Rate the pacer currently enforces (ops/sec).
    pub fn pacer_rate(&self) -> u64 {
        self.inner.pacer.rate()
    }

    pub fn is_scheduler_running(&self) -> bool {
        self.scheduler.lock().is_some()
    }

    pub fn stats(&self) -> PccStats {
        let scheduler_running = self.is_scheduler_running();
        let state = self.inner.state.lock();
        let control = &state.control;
        PccStats {
            phase: control.phase(),
            current_rate: control.current_rate(),
            previous_rate: control.previous_rate(),
            previous_utility: control.previous_utility(),
            eps: control.eps(),
            sign: control.sign(),
            adjust_iter: control.adjust_iter(),
            trial_index: control.trial_index(),
            last_decision: control.last_decision(),
            max_rate_limit: control.max_rate_limit(),
            pacer_rate: self.inner.pacer.rate(),
            rtt: state.rtt,
            interval_duration: state.interval,
            intervals: state.intervals,
            scheduler_running,
            last_interval: state.last_interval,
        }
    }
}

impl<R: RandomSource> Drop for Controller<R> {
    fn drop(&mut self) {
        if let Some(task) = self.scheduler.get_mut().take() {
            self.inner.in_scope(|| task.stop());
        }
    }
}

impl<R: RandomSource> std::fmt::Debug for Controller<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("settings", &self.inner.settings)
            .field("control", &self.inner.state.lock().control)
            .field("pacer", &self.inner.pacer)
            .finish()
    }
}

impl<R: RandomSource> Inner<R> {
    /// Run `f` with the configured diagnostic sink as the default subscriber.
    fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }

    /// Whether decided rates reach the pacer.
    fn adaptive(&self) -> bool {
        !self.settings.disabled && self.settings.fixed_rate_ops.is_none()
    }

    fn publish_rate(&self, rate: f64) {
        if self.adaptive() && rate >= 1.0 {
            self.pacer.set_rate(rate as u64);
        }
    }

    fn on_interval(&self) -> IntervalReport {
        self.in_scope(|| {
            let payload_size = self.settings.payload_size;
            let mut state = self.state.lock();
            let interval_millis = state
                .interval
                .map_or(0.0, |period| period.as_secs_f64() * 1000.0);

            let sample = state.counters.take(payload_size, interval_millis);
            let utility = utility(sample.throughput, sample.loss);
            let new_rate = state.control.step(utility, sample.loss);
            let published = new_rate > 0.0 && self.adaptive();
            if published {
                self.publish_rate(new_rate);
            }

            let report = IntervalReport {
                tx_count: sample.tx_count,
                loss_count: sample.loss_count,
                throughput: sample.throughput,
                loss: sample.loss,
                utility,
                new_rate,
                published,
            };
            state.intervals += 1;
            state.last_interval = Some(report);

            tracing::debug!(
                phase = %state.control.phase(),
                tx = sample.tx_count,
                lost = sample.loss_count,
                throughput = sample.throughput,
                loss = sample.loss,
                utility,
                new_rate,
                new_rate_mbits = ops_per_sec_to_mbits(new_rate, payload_size),
                "Monitoring interval closed"
            );
            report
        })
    }
}
