//! Sleep-and-retry strategy for rate-limited calls
//!
//! When a guarded call is rejected, the strategy sleeps for exactly the time
//! the limiter reports until its window resets and then tries again. There
//! is no retry cap: the caller is assumed to want to wait out the limiter
//! rather than fail fast. Errors that are not rate-limit rejections are
//! returned straight away.
//!
//! # Example
//!
//! ```
//! use callgate::{RateLimiter, sleep_and_retry};
//! use std::time::Duration;
//!
//! let limiter = RateLimiter::new(5, Duration::from_millis(50));
//!
//! for i in 0..10 {
//!     // Blocks the thread whenever the window is used up
//!     let value = sleep_and_retry(|| limiter.call(|| i * 2));
//!     assert_eq!(value, Some(i * 2));
//! }
//! ```

use crate::RateLimitExceeded;
use std::time::Duration;

/// Blocking wait used between retries
///
/// Implemented for [`ThreadSleep`] and for any `Fn(Duration)` closure, so
/// tests can substitute a sleep that only advances a
/// [`ManualClock`](crate::ManualClock).
pub trait Sleep {
    fn sleep(&self, duration: Duration);
}

impl<F> Sleep for F
where
    F: Fn(Duration),
{
    fn sleep(&self, duration: Duration) {
        self(duration)
    }
}

/// Sleeps the current thread with [`std::thread::sleep`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleep;

impl Sleep for ThreadSleep {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration)
    }
}

/// Recognises a rate-limit rejection inside an error type
///
/// Implement this for application error enums that wrap
/// [`RateLimitExceeded`] so [`SleepAndRetry::try_call`] can tell rejections
/// apart from genuine failures.
pub trait AsRateLimitExceeded {
    fn as_rate_limit_exceeded(&self) -> Option<&RateLimitExceeded>;
}

impl AsRateLimitExceeded for RateLimitExceeded {
    fn as_rate_limit_exceeded(&self) -> Option<&RateLimitExceeded> {
        Some(self)
    }
}

/// Retries rejected calls after sleeping until the window resets
#[derive(Debug, Clone, Default)]
pub struct SleepAndRetry<S = ThreadSleep> {
    sleeper: S,
}

impl SleepAndRetry {
    /// Create a strategy that blocks the current thread between retries
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: Sleep> SleepAndRetry<S> {
    /// Create a strategy with a custom sleep
    pub fn with_sleeper(sleeper: S) -> Self {
        SleepAndRetry { sleeper }
    }

    /// Call `op` until it is no longer rejected
    ///
    /// `op` only fails with [`RateLimitExceeded`], so the rejection is fully
    /// absorbed and the operation's value is returned.
    pub fn call<T, F>(&self, mut op: F) -> T
    where
        F: FnMut() -> Result<T, RateLimitExceeded>,
    {
        loop {
            match op() {
                Ok(value) => return value,
                Err(err) => self.wait(err.period_remaining()),
            }
        }
    }

    /// Call a fallible `op` until it is no longer rejected
    ///
    /// Any error that is not a rate-limit rejection is returned immediately.
    pub fn try_call<T, E, F>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: AsRateLimitExceeded,
    {
        loop {
            let err = match op() {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let wait = err
                .as_rate_limit_exceeded()
                .map(RateLimitExceeded::period_remaining);

            match wait {
                Some(wait) => self.wait(wait),
                None => return Err(err),
            }
        }
    }

    fn wait(&self, duration: Duration) {
        tracing::debug!("Rate limited, retrying in {:?}", duration);
        self.sleeper.sleep(duration);
    }
}

/// Call `op` until it is no longer rejected, blocking the thread in between
pub fn sleep_and_retry<T, F>(op: F) -> T
where
    F: FnMut() -> Result<T, RateLimitExceeded>,
{
    SleepAndRetry::new().call(op)
}

/// Call a fallible `op` until it is no longer rejected, blocking the thread
/// in between
pub fn try_sleep_and_retry<T, E, F>(op: F) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: AsRateLimitExceeded,
{
    SleepAndRetry::new().try_call(op)
}

/// Async counterpart of [`sleep_and_retry`], waiting with
/// [`tokio::time::sleep`]
///
/// Dropping the returned future while it sleeps cancels the retry without
/// touching limiter state.
///
/// # Example
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use callgate::{RateLimiter, sleep_and_retry_async};
/// use std::time::Duration;
///
/// let limiter = RateLimiter::new(2, Duration::from_millis(20));
///
/// for i in 0..4 {
///     let value = sleep_and_retry_async(|| limiter.call_async(|| async move { i })).await;
///     assert_eq!(value, Some(i));
/// }
/// # }
/// ```
#[cfg(feature = "tokio")]
pub async fn sleep_and_retry_async<T, F, Fut>(mut op: F) -> T
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, RateLimitExceeded>>,
{
    loop {
        match op().await {
            Ok(value) => return value,
            Err(err) => wait_async(err.period_remaining()).await,
        }
    }
}

/// Async counterpart of [`try_sleep_and_retry`]
#[cfg(feature = "tokio")]
pub async fn try_sleep_and_retry_async<T, E, F, Fut>(mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: AsRateLimitExceeded,
{
    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let wait = err
            .as_rate_limit_exceeded()
            .map(RateLimitExceeded::period_remaining);

        match wait {
            Some(wait) => wait_async(wait).await,
            None => return Err(err),
        }
    }
}

#[cfg(feature = "tokio")]
async fn wait_async(duration: Duration) {
    tracing::debug!("Rate limited, retrying in {:?}", duration);
    tokio::time::sleep(duration).await;
}
