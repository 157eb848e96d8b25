//! Runner configuration, validation, and the fatal startup error type.

use std::error::Error;
use std::fmt;
use std::time::Duration;

// ── RunnerConfig ──────────────────────────────────────────────────

/// Configuration for one module runner thread.
///
/// The runner alternates between draining its control channel and doing
/// compute work; while idle it waits with an adaptive interval that
/// grows from `poll_min` to `poll_max` and snaps back to `poll_min` on
/// the first message.
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// Capacity of the control-message channel. Default: 64.
    pub control_capacity: usize,
    /// Capacity of the status-message channel. Default: 256.
    pub status_capacity: usize,
    /// Shortest idle wait per scheduling pass. Default: 1 ms.
    pub poll_min: Duration,
    /// Longest idle wait per scheduling pass. Default: 50 ms.
    pub poll_max: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            control_capacity: 64,
            status_capacity: 256,
            poll_min: Duration::from_millis(1),
            poll_max: Duration::from_millis(50),
        }
    }
}

impl RunnerConfig {
    /// Check structural invariants at startup.
    ///
    /// A module cannot run with a malformed configuration, so callers
    /// treat this failing as fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.control_capacity == 0 {
            return Err(ConfigError {
                reason: "control channel capacity must be nonzero".to_string(),
            });
        }
        if self.status_capacity == 0 {
            return Err(ConfigError {
                reason: "status channel capacity must be nonzero".to_string(),
            });
        }
        if self.poll_min.is_zero() {
            return Err(ConfigError {
                reason: "poll_min must be nonzero".to_string(),
            });
        }
        if self.poll_max < self.poll_min {
            return Err(ConfigError {
                reason: "poll_max must be at least poll_min".to_string(),
            });
        }
        Ok(())
    }
}

// ── ConfigError ───────────────────────────────────────────────────

/// A startup-time configuration failure. Fatal to the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    /// What was invalid.
    pub reason: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration error: {}", self.reason)
    }
}

impl Error for ConfigError {}
