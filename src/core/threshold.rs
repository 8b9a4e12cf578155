//! Low-allowance warning hook

use std::fmt;
use std::sync::Arc;

/// Fires a callback once the remaining allowance drops below a fraction of
/// capacity
///
/// The check runs on every attempt after the window counter is incremented:
/// the callback fires when `(capacity - call_count) / capacity < fraction`.
/// Once under the threshold it keeps firing on every attempt, rejected ones
/// included, until the window resets.
#[derive(Clone)]
pub struct Threshold {
    fraction: f64,
    callback: Arc<dyn Fn() + Send + Sync>,
}

impl Threshold {
    pub(crate) fn new(fraction: f64, callback: Arc<dyn Fn() + Send + Sync>) -> Self {
        Threshold { fraction, callback }
    }

    /// Fraction of capacity under which the callback fires
    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    pub(crate) fn is_crossed(&self, capacity: u64, call_count: u64) -> bool {
        let remaining = capacity.saturating_sub(call_count);
        (remaining as f64) < self.fraction * capacity as f64
    }

    pub(crate) fn fire(&self) {
        (self.callback)()
    }
}

impl fmt::Debug for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Threshold")
            .field("fraction", &self.fraction)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Threshold {
        Threshold::new(0.5, Arc::new(|| {}))
    }

    #[test]
    fn test_crossing_uses_post_increment_count() {
        let threshold = noop();
        // capacity 4: remaining 3 and 2 are not below 2, remaining 1 is
        assert!(!threshold.is_crossed(4, 1));
        assert!(!threshold.is_crossed(4, 2));
        assert!(threshold.is_crossed(4, 3));
        assert!(threshold.is_crossed(4, 4));
    }

    #[test]
    fn test_stays_crossed_past_capacity() {
        let threshold = noop();
        assert!(threshold.is_crossed(4, 5));
        assert!(threshold.is_crossed(4, u64::MAX));
    }
}
