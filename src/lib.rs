//! # callgate
//!
//! A fixed-window call-rate limiter for guarding a single operation.
//!
//! ## Overview
//!
//! A [`RateLimiter`] admits at most `capacity` calls per `period`. Calls past
//! that either fail with [`RateLimitExceeded`], which carries the time left
//! until the window resets, or are silently skipped. On top of that:
//! - **Threshold warnings**: a callback fires once the remaining allowance
//!   drops under a configured fraction of capacity
//! - **Sleep and retry**: [`SleepAndRetry`] waits out rejections so callers
//!   never see them
//! - **Blocking or async**: the same limiter guards closures and futures
//! - **Injectable time**: any [`Clock`] can drive the windows, which keeps
//!   tests deterministic
//!
//! ## Quick Start
//!
//! ```
//! use callgate::RateLimiter;
//! use std::time::Duration;
//!
//! // 15 calls every 15 minutes
//! let limiter = RateLimiter::new(15, Duration::from_secs(900));
//!
//! match limiter.call(|| "fetched") {
//!     Ok(Some(body)) => println!("got {body}"),
//!     Ok(None) => unreachable!("limiter raises on rejection by default"),
//!     Err(err) => println!("rate limited, retry in {:?}", err.period_remaining()),
//! }
//! ```
//!
//! ## Guarding an Operation
//!
//! ```
//! use callgate::RateLimiter;
//! use std::time::Duration;
//!
//! let lookup = RateLimiter::builder()
//!     .capacity(2)
//!     .period(Duration::from_millis(20))
//!     .build()?
//!     .guard(|id: u32| format!("user:{id}"))
//!     .sleep_and_retry();
//!
//! // The third call sleeps until the window resets instead of failing
//! for id in 0..3 {
//!     assert_eq!(lookup.call_with(id), Some(format!("user:{id}")));
//! }
//! # Ok::<(), callgate::BuildError>(())
//! ```
//!
//! ## Threshold Warnings
//!
//! ```
//! use callgate::RateLimiter;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::time::Duration;
//!
//! let warned = Arc::new(AtomicBool::new(false));
//! let flag = Arc::clone(&warned);
//!
//! let limiter = RateLimiter::builder()
//!     .capacity(10)
//!     .period(Duration::from_secs(60))
//!     .threshold(0.2)
//!     .on_threshold(move || flag.store(true, Ordering::SeqCst))
//!     .build()?;
//!
//! for _ in 0..9 {
//!     let _ = limiter.call(|| ());
//! }
//! assert!(warned.load(Ordering::SeqCst));
//! # Ok::<(), callgate::BuildError>(())
//! ```
//!
//! ## Thread Safety
//!
//! [`RateLimiter`] is `Send + Sync`; share it with an [`Arc`](std::sync::Arc).
//! Each attempt is counted under a reentrant lock, so admissions are
//! serialized in lock order. The threshold callback runs inside the lock and
//! may call back into the limiter; the guarded operation runs outside it.
//!
//! ## Features
//!
//! - `tokio`: async sleep-and-retry and a clock that follows tokio's paused time
//! - `config`: load settings from `CALLGATE_*` environment variables or files

pub mod core;
pub mod guarded;
pub mod retry;

#[cfg(feature = "config")]
pub mod config;

pub use crate::core::{
    Admission, BuildError, Clock, ManualClock, MonotonicClock, RateLimitExceeded, RateLimiter,
    RateLimiterBuilder, Threshold, WindowSnapshot,
};
#[cfg(feature = "tokio")]
pub use crate::core::TokioClock;
pub use guarded::{Guarded, Retrying};
pub use retry::{
    AsRateLimitExceeded, Sleep, SleepAndRetry, ThreadSleep, sleep_and_retry, try_sleep_and_retry,
};
#[cfg(feature = "tokio")]
pub use retry::{sleep_and_retry_async, try_sleep_and_retry_async};

#[cfg(feature = "config")]
pub use crate::config::LimiterConfig;
