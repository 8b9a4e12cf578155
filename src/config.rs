//! Limiter settings loaded from the environment or a file
//!
//! Supported sources:
//! - Environment variables (with CALLGATE_ prefix)
//! - Configuration files (any format the `config` crate understands)
//!
//! Only the plain settings are loadable. The threshold callback and the
//! clock are code and get attached to the returned builder.
//!
//! # Example Usage
//!
//! ```bash
//! export CALLGATE_CALLS=100
//! export CALLGATE_PERIOD_SECS=60
//! export CALLGATE_THRESHOLD=0.2
//! ```
//!
//! ```no_run
//! use callgate::LimiterConfig;
//!
//! let limiter = LimiterConfig::from_env()?
//!     .builder()?
//!     .on_threshold(|| eprintln!("quota almost used up"))
//!     .build()?;
//! # Ok::<(), callgate::BuildError>(())
//! ```

use crate::{BuildError, RateLimiter, RateLimiterBuilder};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const ENV_PREFIX: &str = "CALLGATE";

/// Plain limiter settings
///
/// Missing fields fall back to 15 calls per 900 seconds, raising on
/// rejection, with no threshold.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    /// Calls per window; fractional values truncate and values below one
    /// become one
    pub calls: f64,
    /// Window length in seconds
    pub period_secs: f64,
    /// Whether rejected calls raise [`RateLimitExceeded`](crate::RateLimitExceeded)
    pub raise_on_limit: bool,
    /// Fraction of capacity under which the threshold callback fires
    pub threshold: Option<f64>,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        LimiterConfig {
            calls: 15.0,
            period_secs: 900.0,
            raise_on_limit: true,
            threshold: None,
        }
    }
}

impl LimiterConfig {
    /// Read settings from `CALLGATE_*` environment variables
    pub fn from_env() -> Result<Self, BuildError> {
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Read settings from a file, with `CALLGATE_*` environment variables
    /// taking precedence
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BuildError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Parse settings from a TOML document
    pub fn from_toml(toml: &str) -> Result<Self, BuildError> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Validate the settings and turn them into a limiter builder
    ///
    /// # Errors
    ///
    /// - [`BuildError::InvalidPeriod`]: `period_secs` is not a positive finite number
    /// - [`BuildError::InvalidThreshold`]: `threshold` is not strictly between 0 and 1
    pub fn builder(&self) -> Result<RateLimiterBuilder, BuildError> {
        if !self.period_secs.is_finite() || self.period_secs <= 0.0 {
            return Err(BuildError::InvalidPeriod);
        }
        let period =
            Duration::try_from_secs_f64(self.period_secs).map_err(|_| BuildError::InvalidPeriod)?;
        if period.is_zero() {
            return Err(BuildError::InvalidPeriod);
        }

        let mut builder = RateLimiter::builder()
            .capacity(capacity_from_f64(self.calls))
            .period(period)
            .raise_on_limit(self.raise_on_limit);

        if let Some(fraction) = self.threshold {
            if !(fraction > 0.0 && fraction < 1.0) {
                return Err(BuildError::InvalidThreshold(fraction));
            }
            builder = builder.threshold(fraction);
        }

        Ok(builder)
    }
}

/// Truncate a fractional call count into a valid capacity
///
/// Negative, NaN and sub-one values clamp to 1; values beyond `u64::MAX`
/// saturate.
fn capacity_from_f64(calls: f64) -> u64 {
    // `as` saturates and maps NaN to 0
    (calls.floor() as u64).max(1)
}
