//! Tunables for frame pacing and session retries.
//!
//! Defaults come from the constants in `shared`; the binary overrides them
//! from command line flags and calls `validate` before building a client.

use crate::error::ConfigError;
use shared::{
    CHANNEL_IDLE_TIMEOUT_MS, HANDSHAKE_TIMEOUT_MS, INITIAL_BUDGET, JOIN_ATTEMPTS,
    JOIN_RETRY_DELAY_MS, MAX_BUDGET, MEASUREMENT_INTERVAL_MS, NUM_TIMESTAMPS, REJOIN_ATTEMPTS,
    REJOIN_RETRY_DELAY_MS, TARGET_FPS_HI, TARGET_FPS_LO,
};
use std::time::Duration;

/// Upper bound for every session delay and timeout.
pub const MAX_SESSION_DELAY: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, PartialEq)]
pub struct PacerConfig {
    /// Requests in flight right after `start`.
    pub initial_budget: u32,
    pub max_budget: u32,
    /// Average fps below this grows the budget.
    pub fps_low: u32,
    /// Average fps above this shrinks the budget.
    pub fps_high: u32,
    pub measurement_interval: Duration,
    pub window_capacity: usize,
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self {
            initial_budget: INITIAL_BUDGET,
            max_budget: MAX_BUDGET,
            fps_low: TARGET_FPS_LO,
            fps_high: TARGET_FPS_HI,
            measurement_interval: Duration::from_millis(MEASUREMENT_INTERVAL_MS),
            window_capacity: NUM_TIMESTAMPS,
        }
    }
}

impl PacerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_budget == 0 {
            return Err(ConfigError::ZeroMaxBudget);
        }
        if self.initial_budget == 0 || self.initial_budget > self.max_budget {
            return Err(ConfigError::InitialBudgetOutOfRange {
                initial: self.initial_budget,
                max: self.max_budget,
            });
        }
        if self.fps_low >= self.fps_high {
            return Err(ConfigError::InvertedThresholds {
                low: self.fps_low,
                high: self.fps_high,
            });
        }
        if self.window_capacity < 2 {
            return Err(ConfigError::WindowTooSmall);
        }
        if self.measurement_interval.is_zero() {
            return Err(ConfigError::Zero("measurement interval"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Total handshakes tried for one `join` before giving up.
    pub join_attempts: u32,
    pub join_retry_delay: Duration,
    /// Total handshakes tried after a drop before the session is lost.
    pub rejoin_attempts: u32,
    pub rejoin_retry_delay: Duration,
    pub handshake_timeout: Duration,
    /// Silence on a joined channel longer than this counts as a drop.
    pub channel_idle_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            join_attempts: JOIN_ATTEMPTS,
            join_retry_delay: Duration::from_millis(JOIN_RETRY_DELAY_MS),
            rejoin_attempts: REJOIN_ATTEMPTS,
            rejoin_retry_delay: Duration::from_millis(REJOIN_RETRY_DELAY_MS),
            handshake_timeout: Duration::from_millis(HANDSHAKE_TIMEOUT_MS),
            channel_idle_timeout: Duration::from_millis(CHANNEL_IDLE_TIMEOUT_MS),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.join_attempts == 0 {
            return Err(ConfigError::Zero("join attempts"));
        }
        if self.rejoin_attempts == 0 {
            return Err(ConfigError::Zero("rejoin attempts"));
        }
        if self.handshake_timeout.is_zero() {
            return Err(ConfigError::Zero("handshake timeout"));
        }
        if self.channel_idle_timeout.is_zero() {
            return Err(ConfigError::Zero("channel idle timeout"));
        }
        let delays = [
            ("join retry delay", self.join_retry_delay),
            ("rejoin retry delay", self.rejoin_retry_delay),
            ("handshake timeout", self.handshake_timeout),
            ("channel idle timeout", self.channel_idle_timeout),
        ];
        for (what, delay) in delays {
            if delay > MAX_SESSION_DELAY {
                return Err(ConfigError::TooLong {
                    what,
                    max: MAX_SESSION_DELAY,
                });
            }
        }
        Ok(())
    }
}
