//! Fixed-window rate limiter implementation
//!
//! This module provides the main [`RateLimiter`] struct, which admits at most
//! `capacity` calls per `period` and reports how long callers have to wait
//! once the window is used up.
//!
//! # Known limitation
//!
//! Counting happens in fixed windows that start at the first attempt after
//! the previous window expired. There is no sliding smoothing: `capacity`
//! calls at the very end of one window followed by `capacity` calls at the
//! start of the next are all admitted.

use super::{BuildError, Clock, MonotonicClock, RateLimitExceeded, Threshold};
use crate::guarded::Guarded;
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

// Defaults mirror a 15 calls per 15 minutes API quota
const DEFAULT_CAPACITY: u64 = 15;
const DEFAULT_PERIOD: Duration = Duration::from_secs(900);

/// Outcome of a single [`RateLimiter::attempt`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The call fits in the current window and may run
    Permitted,
    /// The window is used up; carries the time until it resets
    Rejected(RateLimitExceeded),
}

impl Admission {
    /// Whether the call may run
    pub fn is_permitted(&self) -> bool {
        matches!(self, Admission::Permitted)
    }
}

/// Point-in-time view of the limiter's window
///
/// Taking a snapshot does not count as an attempt. An expired window is
/// reported the way the next attempt will see it: empty, with a full period
/// ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSnapshot {
    /// Attempts counted in the current window, rejected ones included
    pub call_count: u64,
    /// Maximum number of calls admitted per window
    pub capacity: u64,
    /// Calls still admitted before the window resets
    pub remaining: u64,
    /// Time until the window resets
    pub period_remaining: Duration,
}

struct Window {
    start: Duration,
    call_count: u64,
}

/// Fixed-window call-rate limiter for one guarded operation
///
/// Every call to a guarded operation goes through [`attempt`](Self::attempt),
/// which counts the call against the current window and decides whether it
/// may run. Accounting and the threshold callback run under a reentrant
/// lock; the operation itself always runs after the lock is released.
///
/// A limiter guards exactly one logical operation. Share it between threads
/// with an [`Arc`], never between different operations.
///
/// # Example
///
/// ```
/// use callgate::RateLimiter;
/// use std::time::Duration;
///
/// // Allow 2 calls per minute
/// let limiter = RateLimiter::new(2, Duration::from_secs(60));
///
/// assert_eq!(limiter.call(|| 1 + 1).unwrap(), Some(2));
/// assert_eq!(limiter.call(|| 2 + 2).unwrap(), Some(4));
///
/// // Third call in the same minute is rejected
/// let err = limiter.call(|| 3 + 3).unwrap_err();
/// println!("retry in {:?}", err.period_remaining());
/// ```
pub struct RateLimiter {
    capacity: u64,
    period: Duration,
    raise_on_limit: bool,
    threshold: Option<Threshold>,
    clock: Box<dyn Clock>,
    // Reentrant so the threshold callback may call back into the limiter
    window: ReentrantMutex<RefCell<Window>>,
}

/// Builder for configuring a [`RateLimiter`]
///
/// Starts from 15 calls per 900 seconds, a monotonic clock, rejections
/// raised as errors and no threshold.
///
/// # Example
///
/// ```
/// use callgate::RateLimiter;
/// use std::time::Duration;
///
/// let limiter = RateLimiter::builder()
///     .capacity(100)
///     .period(Duration::from_secs(60))
///     .threshold(0.2)
///     .on_threshold(|| eprintln!("less than 20% of the quota left"))
///     .build()
///     .unwrap();
/// ```
pub struct RateLimiterBuilder {
    capacity: u64,
    period: Duration,
    raise_on_limit: bool,
    threshold: Option<f64>,
    on_threshold: Option<Arc<dyn Fn() + Send + Sync>>,
    clock: Option<Box<dyn Clock>>,
}

impl RateLimiterBuilder {
    fn new() -> Self {
        RateLimiterBuilder {
            capacity: DEFAULT_CAPACITY,
            period: DEFAULT_PERIOD,
            raise_on_limit: true,
            threshold: None,
            on_threshold: None,
            clock: None,
        }
    }

    /// Maximum calls per window; zero is raised to one
    pub fn capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Window length
    pub fn period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Time source for the window; defaults to [`MonotonicClock`]
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Whether a rejected call returns [`RateLimitExceeded`] (the default) or
    /// is silently skipped
    pub fn raise_on_limit(mut self, raise: bool) -> Self {
        self.raise_on_limit = raise;
        self
    }

    /// Fraction of capacity under which the threshold callback fires
    ///
    /// Only takes effect together with [`on_threshold`](Self::on_threshold).
    pub fn threshold(mut self, fraction: f64) -> Self {
        self.threshold = Some(fraction);
        self
    }

    /// Callback fired while the remaining allowance is under the threshold
    ///
    /// Only takes effect together with [`threshold`](Self::threshold).
    pub fn on_threshold(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_threshold = Some(Arc::new(callback));
        self
    }

    /// Validate the settings and create the limiter
    ///
    /// # Errors
    ///
    /// - [`BuildError::InvalidPeriod`]: the period is zero
    /// - [`BuildError::InvalidThreshold`]: the threshold is not strictly between 0 and 1
    pub fn build(self) -> Result<RateLimiter, BuildError> {
        if self.period.is_zero() {
            return Err(BuildError::InvalidPeriod);
        }

        if let Some(fraction) = self.threshold {
            if !(fraction > 0.0 && fraction < 1.0) {
                return Err(BuildError::InvalidThreshold(fraction));
            }
        }

        // A threshold without a callback (or the reverse) stays inactive
        let threshold = match (self.threshold, self.on_threshold) {
            (Some(fraction), Some(callback)) => Some(Threshold::new(fraction, callback)),
            _ => None,
        };

        let clock: Box<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Box::new(MonotonicClock::new()),
        };

        Ok(RateLimiter::with_parts(
            self.capacity,
            self.period,
            self.raise_on_limit,
            threshold,
            clock,
        ))
    }
}

impl RateLimiter {
    /// Create a limiter admitting `capacity` calls per `period`
    ///
    /// Uses the default monotonic clock and raises on rejection. A capacity
    /// of zero is raised to one.
    ///
    /// # Panics
    ///
    /// Panics if `period` is zero. Use [`builder`](Self::builder) to get an
    /// error instead.
    pub fn new(capacity: u64, period: Duration) -> Self {
        assert!(!period.is_zero(), "rate limit period must be non-zero");
        Self::with_parts(
            capacity.max(1),
            period,
            true,
            None,
            Box::new(MonotonicClock::new()),
        )
    }

    /// Create a new builder starting from the default settings
    pub fn builder() -> RateLimiterBuilder {
        RateLimiterBuilder::new()
    }

    fn with_parts(
        capacity: u64,
        period: Duration,
        raise_on_limit: bool,
        threshold: Option<Threshold>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let start = clock.now();
        RateLimiter {
            capacity,
            period,
            raise_on_limit,
            threshold,
            clock,
            window: ReentrantMutex::new(RefCell::new(Window {
                start,
                call_count: 0,
            })),
        }
    }

    /// Maximum number of calls admitted per window
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Window length
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether rejections surface as [`RateLimitExceeded`]
    pub fn raise_on_limit(&self) -> bool {
        self.raise_on_limit
    }

    /// The active threshold, if both a fraction and a callback were configured
    pub fn threshold(&self) -> Option<&Threshold> {
        self.threshold.as_ref()
    }

    /// Count one call against the current window and decide whether it may run
    ///
    /// This is the single piece of shared state mutation in the crate. Under
    /// the limiter's lock:
    ///
    /// 1. Start a new window if the current one is at least `period` old
    /// 2. Increment the call counter, even if the call ends up rejected
    /// 3. Fire the threshold callback if the remaining allowance is under it
    /// 4. Reject when the counter exceeds capacity
    ///
    /// Callbacks from concurrent attempts never overlap and fire in
    /// admission order. The lock is reentrant, so a callback may call
    /// [`snapshot`](Self::snapshot) or `attempt` on the same limiter from the
    /// same thread; an attempt made from the callback counts as a call of
    /// its own and may fire the callback again.
    pub fn attempt(&self) -> Admission {
        let guard = self.window.lock();
        let now = self.clock.now();

        let (call_count, period_remaining) = {
            let mut window = guard.borrow_mut();

            if now.saturating_sub(window.start) >= self.period {
                tracing::debug!(
                    "Rate limit window reset after {} calls",
                    window.call_count
                );
                window.start = now;
                window.call_count = 0;
            }

            window.call_count = window.call_count.saturating_add(1);
            let period_remaining = self
                .period
                .saturating_sub(now.saturating_sub(window.start));

            (window.call_count, period_remaining)
        };

        // The window borrow is released so the callback can re-enter
        if let Some(threshold) = self
            .threshold
            .as_ref()
            .filter(|t| t.is_crossed(self.capacity, call_count))
        {
            tracing::debug!(
                "Remaining allowance under {:.0}% of capacity",
                threshold.fraction() * 100.0
            );
            threshold.fire();
        }

        let admission = if call_count > self.capacity {
            tracing::debug!(
                "Rate limit exceeded ({} > {}), window resets in {:?}",
                call_count,
                self.capacity,
                period_remaining
            );
            Admission::Rejected(RateLimitExceeded::new(period_remaining))
        } else {
            tracing::trace!("Call {}/{} admitted", call_count, self.capacity);
            Admission::Permitted
        };

        drop(guard);
        admission
    }

    /// Run a blocking operation if the limiter admits it
    ///
    /// # Returns
    ///
    /// - `Ok(Some(value))`: the call was admitted and `op` ran
    /// - `Ok(None)`: the call was rejected and the limiter does not raise
    /// - `Err(RateLimitExceeded)`: the call was rejected; `op` did not run
    pub fn call<T, F>(&self, op: F) -> Result<Option<T>, RateLimitExceeded>
    where
        F: FnOnce() -> T,
    {
        match self.attempt() {
            Admission::Permitted => Ok(Some(op())),
            Admission::Rejected(err) => self.reject(err),
        }
    }

    /// Run a fallible blocking operation if the limiter admits it
    ///
    /// Errors from `op` come back unchanged; rejections are converted into
    /// the operation's error type.
    ///
    /// # Example
    ///
    /// ```
    /// use callgate::{RateLimitExceeded, RateLimiter};
    /// use std::time::Duration;
    ///
    /// #[derive(Debug)]
    /// enum FetchError {
    ///     Limited(RateLimitExceeded),
    ///     NotFound,
    /// }
    ///
    /// impl From<RateLimitExceeded> for FetchError {
    ///     fn from(err: RateLimitExceeded) -> Self {
    ///         FetchError::Limited(err)
    ///     }
    /// }
    ///
    /// let limiter = RateLimiter::new(1, Duration::from_secs(60));
    /// let first: Result<Option<u32>, FetchError> = limiter.try_call(|| Err(FetchError::NotFound));
    /// assert!(matches!(first, Err(FetchError::NotFound)));
    ///
    /// let second: Result<Option<u32>, FetchError> = limiter.try_call(|| Ok(7));
    /// assert!(matches!(second, Err(FetchError::Limited(_))));
    /// ```
    pub fn try_call<T, E, F>(&self, op: F) -> Result<Option<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<RateLimitExceeded>,
    {
        match self.attempt() {
            Admission::Permitted => op().map(Some),
            Admission::Rejected(err) => self.reject(err),
        }
    }

    /// Async counterpart of [`call`](Self::call)
    ///
    /// Accounting runs synchronously when the returned future is first
    /// polled; `op` is only invoked, and its future only awaited, once the
    /// call has been admitted.
    pub async fn call_async<F, Fut>(
        &self,
        op: F,
    ) -> Result<Option<Fut::Output>, RateLimitExceeded>
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        match self.attempt() {
            Admission::Permitted => Ok(Some(op().await)),
            Admission::Rejected(err) => self.reject(err),
        }
    }

    /// Async counterpart of [`try_call`](Self::try_call)
    pub async fn try_call_async<T, E, F, Fut>(&self, op: F) -> Result<Option<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<RateLimitExceeded>,
    {
        match self.attempt() {
            Admission::Permitted => op().await.map(Some),
            Admission::Rejected(err) => self.reject(err),
        }
    }

    /// Bind this limiter to the one operation it guards
    ///
    /// See [`Guarded`] for calling it, and
    /// [`Guarded::sleep_and_retry`] for waiting out rejections.
    pub fn guard<F>(self, op: F) -> Guarded<F> {
        Guarded::new(self, op)
    }

    /// Inspect the current window without counting an attempt
    pub fn snapshot(&self) -> WindowSnapshot {
        let guard = self.window.lock();
        let window = guard.borrow();
        let elapsed = self.clock.now().saturating_sub(window.start);

        let (call_count, period_remaining) = if elapsed >= self.period {
            (0, self.period)
        } else {
            (window.call_count, self.period - elapsed)
        };

        WindowSnapshot {
            call_count,
            capacity: self.capacity,
            remaining: self.capacity.saturating_sub(call_count),
            period_remaining,
        }
    }

    fn reject<T, E>(&self, err: RateLimitExceeded) -> Result<Option<T>, E>
    where
        E: From<RateLimitExceeded>,
    {
        if self.raise_on_limit {
            Err(err.into())
        } else {
            Ok(None)
        }
    }
}
