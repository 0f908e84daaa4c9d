//! Controller configuration, unit conversions and tuning constants.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::errors::ConfigError;

/// Default payload size: one Ethernet MSS.
pub const DEFAULT_PAYLOAD_SIZE: usize = 1460;

/// Starting rate used when none (or zero) is configured.
pub const DEFAULT_START_RATE_MBITS: u32 = 1;

/// Lower bound of the monitoring interval length, in RTTs.
pub const MI_MULTIPLIER_MIN: f64 = 1.7;

/// Upper bound of the monitoring interval length, in RTTs.
pub const MI_MULTIPLIER_MAX: f64 = 2.2;

/// Smallest RTT sample accepted; shorter samples are raised to this.
pub const MIN_RTT_MILLIS: u64 = 1;

/// Rate controller configuration.
///
/// Everything but `logging` can be loaded from TOML:
///
/// ```toml
/// payload_size = 1200
/// start_rate_mbits = 10
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Bypass pacing and loss accounting entirely.
    pub disable_congestion_control: bool,
    /// Pin the pacer to this rate (Mbit/s). `0` means adaptive.
    pub fixed_rate_limit_mbits: u32,
    /// Rate used before the first interval completes (Mbit/s). `0` means default.
    pub start_rate_mbits: u32,
    /// Bytes per paced operation. Must be non-zero.
    pub payload_size: usize,
    /// Diagnostic sink. When unset the process-wide subscriber is used.
    #[serde(skip)]
    pub logging: Option<tracing::Dispatch>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            disable_congestion_control: false,
            fixed_rate_limit_mbits: 0,
            start_rate_mbits: DEFAULT_START_RATE_MBITS,
            payload_size: DEFAULT_PAYLOAD_SIZE,
            logging: None,
        }
    }
}

impl ControllerConfig {
    pub fn new(payload_size: usize) -> Self {
        Self {
            payload_size,
            ..Default::default()
        }
    }

    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    pub fn with_start_rate_mbits(mut self, mbits: u32) -> Self {
        self.start_rate_mbits = mbits;
        self
    }

    pub fn with_fixed_rate_mbits(mut self, mbits: u32) -> Self {
        self.fixed_rate_limit_mbits = mbits;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disable_congestion_control = true;
        self
    }

    pub fn with_logging(mut self, dispatch: tracing::Dispatch) -> Self {
        self.logging = Some(dispatch);
        self
    }

    /// Start rate with the zero value corrected to the default.
    pub(crate) fn effective_start_rate_mbits(&self) -> u32 {
        if self.start_rate_mbits == 0 {
            DEFAULT_START_RATE_MBITS
        } else {
            self.start_rate_mbits
        }
    }

    pub(crate) fn fixed_rate(&self) -> Option<u32> {
        (self.fixed_rate_limit_mbits > 0).then_some(self.fixed_rate_limit_mbits)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.payload_size == 0 {
            return Err(ConfigError::ZeroPayloadSize);
        }
        Ok(())
    }
}

/// Builds a formatted diagnostic sink for [`ControllerConfig::logging`].
pub struct LoggingConfig {
    pub level: LevelFilter,
    pub writer: BoxMakeWriter,
}

impl LoggingConfig {
    pub fn new(level: LevelFilter, writer: BoxMakeWriter) -> Self {
        Self { level, writer }
    }

    /// Log to stderr at `level`.
    pub fn stderr(level: LevelFilter) -> Self {
        Self::new(level, BoxMakeWriter::new(std::io::stderr))
    }

    pub fn into_dispatch(self) -> tracing::Dispatch {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(self.level)
            .with_writer(self.writer)
            .with_target(false)
            .finish();
        tracing::Dispatch::new(subscriber)
    }
}

/// Convert Mbit/s to operations per second for `payload_size`-byte operations.
///
/// `ops = mbits·1024·1024/8 / payload_size`, truncated.
pub fn mbits_to_ops_per_sec(mbits: u32, payload_size: usize) -> u64 {
    let bytes_per_sec = u64::from(mbits) * 1024 * 1024 / 8;
    bytes_per_sec / payload_size.max(1) as u64
}

/// Inverse of [`mbits_to_ops_per_sec`], used for diagnostics.
pub fn ops_per_sec_to_mbits(ops_per_sec: f64, payload_size: usize) -> f64 {
    ops_per_sec * payload_size as f64 * 8.0 / 1024.0 / 1024.0
}

/// Monitoring interval length for an RTT sample and a jitter multiplier.
pub(crate) fn interval_duration(rtt_millis: u64, multiplier: f64) -> Duration {
    Duration::from_secs_f64(rtt_millis as f64 * multiplier / 1000.0)
}
