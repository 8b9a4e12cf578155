//! Time sources for the rate limiter
//!
//! A [`Clock`] reports the time elapsed since some fixed origin. The limiter
//! only ever subtracts two readings, so the origin is irrelevant as long as
//! readings never go backwards.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonically non-decreasing time source
///
/// Any `Fn() -> Duration` closure is a clock as well, which is handy for
/// wiring the limiter to a time source the application already owns.
///
/// # Example
///
/// ```
/// use callgate::{Clock, RateLimiter};
/// use std::time::{Duration, Instant};
///
/// let origin = Instant::now();
/// let limiter = RateLimiter::builder()
///     .clock(move || origin.elapsed())
///     .build()
///     .unwrap();
/// ```
pub trait Clock: Send + Sync {
    /// Current time as an offset from the clock's origin
    fn now(&self) -> Duration;
}

impl<F> Clock for F
where
    F: Fn() -> Duration + Send + Sync,
{
    fn now(&self) -> Duration {
        self()
    }
}

/// Default clock backed by [`Instant`]
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        MonotonicClock {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven clock for tests and simulations
///
/// Clones share the same reading, so a test can keep one handle and give
/// another to the limiter.
///
/// # Example
///
/// ```
/// use callgate::{ManualClock, RateLimiter};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// let limiter = RateLimiter::builder()
///     .capacity(1)
///     .period(Duration::from_secs(10))
///     .clock(clock.clone())
///     .build()
///     .unwrap();
///
/// assert!(limiter.call(|| ()).is_ok());
/// assert!(limiter.call(|| ()).is_err());
///
/// clock.advance(Duration::from_secs(10));
/// assert!(limiter.call(|| ()).is_ok());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock reading zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock reading `start`
    pub fn starting_at(start: Duration) -> Self {
        let clock = Self::new();
        clock.set(start);
        clock
    }

    /// Move the clock forward by `by`
    pub fn advance(&self, by: Duration) {
        let by = saturating_nanos(by);
        let _ = self
            .nanos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(n.saturating_add(by))
            });
    }

    /// Jump to an absolute reading
    ///
    /// Readings that would move the clock backwards are ignored.
    pub fn set(&self, to: Duration) {
        self.nanos.fetch_max(saturating_nanos(to), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

fn saturating_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Clock backed by [`tokio::time::Instant`]
///
/// Follows tokio's paused test time, so `#[tokio::test(start_paused = true)]`
/// drives both the limiter's windows and the retry sleeps.
#[cfg(feature = "tokio")]
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

#[cfg(feature = "tokio")]
impl TokioClock {
    pub fn new() -> Self {
        TokioClock {
            origin: tokio::time::Instant::now(),
        }
    }
}

#[cfg(feature = "tokio")]
impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "tokio")]
impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}
