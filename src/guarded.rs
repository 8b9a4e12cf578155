//! Operations bound to their own rate limiter
//!
//! [`Guarded`] pairs a [`RateLimiter`] with the single operation it guards.
//! Calling it keeps the operation's input and output types, adding only the
//! rejection outcome. [`Retrying`] layers [`SleepAndRetry`] on top so
//! rejections never reach the caller.
//!
//! Blocking and async operations share the same types; which variant runs
//! is chosen by the method used (`call` or `call_async`).

use crate::retry::{Sleep, SleepAndRetry, ThreadSleep};
use crate::{RateLimitExceeded, RateLimiter};
use std::future::Future;

/// An operation that only runs when its limiter admits the call
///
/// # Example
///
/// ```
/// use callgate::RateLimiter;
/// use std::time::Duration;
///
/// let square = RateLimiter::new(2, Duration::from_secs(60)).guard(|x: u32| x * x);
///
/// assert_eq!(square.call_with(3).unwrap(), Some(9));
/// assert_eq!(square.call_with(4).unwrap(), Some(16));
/// assert!(square.call_with(5).is_err());
/// ```
pub struct Guarded<F> {
    limiter: RateLimiter,
    op: F,
}

impl<F> Guarded<F> {
    pub(crate) fn new(limiter: RateLimiter, op: F) -> Self {
        Guarded { limiter, op }
    }

    /// The limiter guarding this operation
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Run the operation if admitted
    ///
    /// See [`RateLimiter::call`] for the meaning of the result.
    pub fn call<T>(&self) -> Result<Option<T>, RateLimitExceeded>
    where
        F: Fn() -> T,
    {
        self.limiter.call(|| (self.op)())
    }

    /// Run a single-argument operation if admitted
    ///
    /// `arg` is dropped without being used when the call is rejected. Pass a
    /// tuple for operations taking several inputs.
    pub fn call_with<A, T>(&self, arg: A) -> Result<Option<T>, RateLimitExceeded>
    where
        F: Fn(A) -> T,
    {
        self.limiter.call(|| (self.op)(arg))
    }

    /// Run an async operation if admitted
    pub async fn call_async<Fut>(&self) -> Result<Option<Fut::Output>, RateLimitExceeded>
    where
        F: Fn() -> Fut,
        Fut: Future,
    {
        self.limiter.call_async(|| (self.op)()).await
    }

    /// Wrap in a strategy that sleeps the thread until the window resets
    /// whenever a call is rejected
    pub fn sleep_and_retry(self) -> Retrying<F> {
        Retrying {
            inner: self,
            strategy: SleepAndRetry::new(),
        }
    }

    /// Like [`sleep_and_retry`](Self::sleep_and_retry) with a custom sleep
    ///
    /// The sleeper only serves blocking calls. Async retries wait on tokio's
    /// timer, so `call_async` is only offered by the default
    /// [`ThreadSleep`] strategy:
    ///
    /// ```compile_fail
    /// use callgate::RateLimiter;
    /// use std::time::Duration;
    ///
    /// let op = RateLimiter::new(1, Duration::from_secs(1))
    ///     .guard(|| async { 1 })
    ///     .sleep_and_retry_with(|_wait: Duration| {});
    /// let _ = op.call_async();
    /// ```
    pub fn sleep_and_retry_with<S: Sleep>(self, sleeper: S) -> Retrying<F, S> {
        Retrying {
            inner: self,
            strategy: SleepAndRetry::with_sleeper(sleeper),
        }
    }
}

/// A guarded operation that waits out rejections instead of returning them
///
/// Calls return `Some(value)` once admitted. `None` is only returned by
/// limiters built with `raise_on_limit(false)`, which skip rejected calls
/// rather than report them.
///
/// # Example
///
/// ```
/// use callgate::RateLimiter;
/// use std::time::Duration;
///
/// let ping = RateLimiter::new(1, Duration::from_millis(10))
///     .guard(|| "pong")
///     .sleep_and_retry();
///
/// // The second call blocks for about 10ms
/// assert_eq!(ping.call(), Some("pong"));
/// assert_eq!(ping.call(), Some("pong"));
/// ```
pub struct Retrying<F, S = ThreadSleep> {
    inner: Guarded<F>,
    strategy: SleepAndRetry<S>,
}

impl<F, S: Sleep> Retrying<F, S> {
    /// The limiter guarding this operation
    pub fn limiter(&self) -> &RateLimiter {
        self.inner.limiter()
    }

    /// Run the operation, sleeping and retrying while rejected
    pub fn call<T>(&self) -> Option<T>
    where
        F: Fn() -> T,
    {
        self.strategy.call(|| self.inner.call())
    }

    /// Run a single-argument operation, sleeping and retrying while rejected
    pub fn call_with<A, T>(&self, arg: A) -> Option<T>
    where
        F: Fn(A) -> T,
        A: Clone,
    {
        self.strategy.call(|| self.inner.call_with(arg.clone()))
    }

}

#[cfg(feature = "tokio")]
impl<F> Retrying<F, ThreadSleep> {
    /// Run an async operation, suspending with [`tokio::time::sleep`] while
    /// rejected
    ///
    /// Pause tokio's clock to control the wait in tests.
    pub async fn call_async<Fut>(&self) -> Option<Fut::Output>
    where
        F: Fn() -> Fut,
        Fut: Future,
    {
        let inner = &self.inner;
        crate::retry::sleep_and_retry_async(move || inner.call_async()).await
    }
}
