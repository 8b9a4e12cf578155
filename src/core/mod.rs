//! Core components of the callgate rate limiting library
//!
//! This module contains the fundamental building blocks:
//! - [`clock`]: Time sources the limiter reads its windows from
//! - [`rate_limiter`]: The fixed-window rate limiter itself
//! - [`threshold`]: Low-allowance warning hook

pub mod clock;
pub mod rate_limiter;
pub mod threshold;

pub use clock::{Clock, ManualClock, MonotonicClock};
#[cfg(feature = "tokio")]
pub use clock::TokioClock;
pub use rate_limiter::{Admission, RateLimiter, RateLimiterBuilder, WindowSnapshot};
pub use threshold::Threshold;

use std::time::Duration;

/// Returned when a call is attempted after the window's capacity is used up
///
/// Carries the time left until the current window resets, so callers can
/// back off for exactly that long (or hand the call to
/// [`SleepAndRetry`](crate::SleepAndRetry), which does it for them).
///
/// # Example
///
/// ```
/// use callgate::RateLimiter;
/// use std::time::Duration;
///
/// let limiter = RateLimiter::new(1, Duration::from_secs(60));
/// limiter.call(|| ()).unwrap();
///
/// let err = limiter.call(|| ()).unwrap_err();
/// assert!(err.period_remaining() <= Duration::from_secs(60));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("too many calls, window resets in {period_remaining:?}")]
pub struct RateLimitExceeded {
    period_remaining: Duration,
}

impl RateLimitExceeded {
    pub(crate) fn new(period_remaining: Duration) -> Self {
        RateLimitExceeded { period_remaining }
    }

    /// Time until the current window resets
    pub fn period_remaining(&self) -> Duration {
        self.period_remaining
    }

    /// Time until the current window resets, in fractional seconds
    pub fn period_remaining_secs(&self) -> f64 {
        self.period_remaining.as_secs_f64()
    }
}

/// Errors that can occur while building a [`RateLimiter`]
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The window length was zero, negative or not a finite number
    #[error("invalid period: window length must be positive")]
    InvalidPeriod,

    /// The threshold fraction was outside the open interval (0, 1)
    #[error("invalid threshold {0}: must lie strictly between 0 and 1")]
    InvalidThreshold(f64),

    /// Settings could not be loaded from the environment or a file
    #[cfg(feature = "config")]
    #[error("failed to load limiter config: {0}")]
    Config(#[from] config::ConfigError),
}
