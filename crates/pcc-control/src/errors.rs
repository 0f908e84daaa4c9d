use thiserror::Error;

/// Errors raised while building a controller. The hot path never fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("payload size must be greater than zero")]
    ZeroPayloadSize,

    #[error("invalid controller config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Abort on a broken internal invariant.
///
/// Reserved for programming errors; runtime conditions are handled in place.
#[cold]
#[track_caller]
pub(crate) fn invariant_violation(what: &str) -> ! {
    tracing::error!(invariant = what, "CRITICAL: rate controller invariant violated");
    panic!("rate controller invariant violated: {what}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "rate controller invariant violated: trial index")]
    fn test_invariant_violation_panics() {
        invariant_violation("trial index");
    }

    #[test]
    fn test_config_error_display() {
        assert_eq!(
            ConfigError::ZeroPayloadSize.to_string(),
            "payload size must be greater than zero"
        );
    }
}
