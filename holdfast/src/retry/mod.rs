//! Retry policies.
//!
//! A [`RetryPolicy`] is a pure decision function. Given the error from an
//! attempt and the zero-based retry number, it answers whether to retry
//! ([`RetryPolicy::should_retry`]) and how long to wait first
//! ([`RetryPolicy::delay`]). It never sleeps or calls the network itself.
//!
//! ```
//! use holdfast::retry::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::exponential(Duration::from_millis(500), 2.0, 3);
//! assert_eq!(policy.delay(0), Duration::from_millis(500));
//! assert_eq!(policy.delay(1), Duration::from_millis(1000));
//! assert_eq!(policy.delay(2), Duration::from_millis(2000));
//! ```

use crate::outcome::FailureKind;
use crate::transport::TransportError;
use rand::Rng;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Statuses retried by default.
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Failure kinds retried by default.
pub const DEFAULT_RETRYABLE_KINDS: [FailureKind; 2] = [FailureKind::Network, FailureKind::Timeout];

/// Which failures a built-in policy considers transient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryableSet {
    pub statuses: HashSet<u16>,
    pub kinds: HashSet<FailureKind>,
}

impl RetryableSet {
    pub fn matches(&self, error: &TransportError) -> bool {
        if let Some(status) = error.status() {
            if self.statuses.contains(&status) {
                return true;
            }
        }
        self.kinds.contains(&error.kind())
    }
}

impl Default for RetryableSet {
    fn default() -> Self {
        Self {
            statuses: DEFAULT_RETRYABLE_STATUSES.into_iter().collect(),
            kinds: DEFAULT_RETRYABLE_KINDS.into_iter().collect(),
        }
    }
}

/// Caller-supplied retry predicate.
pub type RetryPredicate = Arc<dyn Fn(&TransportError, u32) -> bool + Send + Sync>;

/// Caller-supplied delay function.
pub type DelayFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// Decides whether and when a failed attempt is retried.
#[derive(Clone)]
pub enum RetryPolicy {
    /// Never retry.
    None,

    /// Constant delay between retries.
    Fixed {
        max_attempts: u32,
        delay: Duration,
        retryable: RetryableSet,
    },

    /// `initial * multiplier^attempt`, optionally capped and jittered.
    Exponential {
        initial: Duration,
        multiplier: f64,
        max_delay: Option<Duration>,
        max_attempts: u32,
        /// Scale each delay by a random factor in [0.5, 1.0).
        jitter: bool,
        retryable: RetryableSet,
    },

    /// Caller-defined predicate and delay.
    Custom {
        max_attempts: u32,
        predicate: RetryPredicate,
        delay: DelayFn,
    },
}

impl RetryPolicy {
    pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
        RetryPolicy::Fixed {
            max_attempts,
            delay,
            retryable: RetryableSet::default(),
        }
    }

    /// Exponential backoff without cap or jitter.
    pub fn exponential(initial: Duration, multiplier: f64, max_attempts: u32) -> Self {
        RetryPolicy::Exponential {
            initial,
            multiplier,
            max_delay: None,
            max_attempts,
            jitter: false,
            retryable: RetryableSet::default(),
        }
    }

    pub fn custom<P, D>(max_attempts: u32, predicate: P, delay: D) -> Self
    where
        P: Fn(&TransportError, u32) -> bool + Send + Sync + 'static,
        D: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        RetryPolicy::Custom {
            max_attempts,
            predicate: Arc::new(predicate),
            delay: Arc::new(delay),
        }
    }

    /// Caps exponential delays. No effect on other variants.
    pub fn with_max_delay(mut self, cap: Duration) -> Self {
        if let RetryPolicy::Exponential { max_delay, .. } = &mut self {
            *max_delay = Some(cap);
        }
        self
    }

    /// Enables jitter on exponential delays. No effect on other variants.
    pub fn with_jitter(mut self) -> Self {
        if let RetryPolicy::Exponential { jitter, .. } = &mut self {
            *jitter = true;
        }
        self
    }

    /// Replaces the retryable set of a built-in variant.
    pub fn with_retryable(mut self, set: RetryableSet) -> Self {
        match &mut self {
            RetryPolicy::Fixed { retryable, .. } | RetryPolicy::Exponential { retryable, .. } => {
                *retryable = set
            }
            RetryPolicy::None | RetryPolicy::Custom { .. } => {}
        }
        self
    }

    /// Upper bound on the number of retries.
    pub fn max_attempts(&self) -> u32 {
        match self {
            RetryPolicy::None => 0,
            RetryPolicy::Fixed { max_attempts, .. }
            | RetryPolicy::Exponential { max_attempts, .. }
            | RetryPolicy::Custom { max_attempts, .. } => *max_attempts,
        }
    }

    /// Returns true if a failure on retry number `attempt` should be retried.
    ///
    /// `attempt` is zero for the decision after the first try. Once it
    /// reaches `max_attempts` the answer is always false.
    pub fn should_retry(&self, error: &TransportError, attempt: u32) -> bool {
        if attempt >= self.max_attempts() {
            return false;
        }
        if matches!(
            error.kind(),
            FailureKind::Cancelled | FailureKind::QueuedForLater
        ) {
            return false;
        }
        match self {
            RetryPolicy::None => false,
            RetryPolicy::Fixed { retryable, .. } | RetryPolicy::Exponential { retryable, .. } => {
                retryable.matches(error)
            }
            RetryPolicy::Custom { predicate, .. } => predicate(error, attempt),
        }
    }

    /// Delay before retry number `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            RetryPolicy::None => Duration::ZERO,
            RetryPolicy::Fixed { delay, .. } => *delay,
            RetryPolicy::Exponential {
                initial,
                multiplier,
                max_delay,
                jitter,
                ..
            } => {
                let factor = multiplier.powi(attempt.min(i32::MAX as u32) as i32);
                let mut secs = initial.as_secs_f64() * factor;
                if let Some(cap) = max_delay {
                    secs = secs.min(cap.as_secs_f64());
                }
                if *jitter {
                    secs *= rand::thread_rng().gen_range(0.5..1.0);
                }
                Duration::try_from_secs_f64(secs).unwrap_or(max_delay.unwrap_or(Duration::MAX))
            }
            RetryPolicy::Custom { delay, .. } => delay(attempt),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::exponential(Duration::from_millis(500), 2.0, 3)
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryPolicy::None => f.write_str("None"),
            RetryPolicy::Fixed {
                max_attempts,
                delay,
                retryable,
            } => f
                .debug_struct("Fixed")
                .field("max_attempts", max_attempts)
                .field("delay", delay)
                .field("retryable", retryable)
                .finish(),
            RetryPolicy::Exponential {
                initial,
                multiplier,
                max_delay,
                max_attempts,
                jitter,
                retryable,
            } => f
                .debug_struct("Exponential")
                .field("initial", initial)
                .field("multiplier", multiplier)
                .field("max_delay", max_delay)
                .field("max_attempts", max_attempts)
                .field("jitter", jitter)
                .field("retryable", retryable)
                .finish(),
            RetryPolicy::Custom { max_attempts, .. } => f
                .debug_struct("Custom")
                .field("max_attempts", max_attempts)
                .finish_non_exhaustive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportResponse;

    fn status_error(status: u16) -> TransportError {
        TransportError::from_response(TransportResponse::new(status, ""))
    }

    fn connect_error() -> TransportError {
        TransportError::Connect("refused".into())
    }

    #[test]
    fn test_none_never_retries() {
        let policy = RetryPolicy::None;
        assert!(!policy.should_retry(&connect_error(), 0));
        assert_eq!(policy.max_attempts(), 0);
    }

    #[test]
    fn test_exponential_delays_and_ceiling() {
        let policy = RetryPolicy::exponential(Duration::from_millis(500), 2.0, 3);
        let err = status_error(503);

        let delays: Vec<_> = (0..3).map(|a| policy.delay(a)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(500),
                Duration::from_millis(1000),
                Duration::from_millis(2000)
            ]
        );
        assert!(policy.should_retry(&err, 0));
        assert!(policy.should_retry(&err, 2));
        assert!(!policy.should_retry(&err, 3));
    }

    #[test]
    fn test_exponential_cap() {
        let policy = RetryPolicy::exponential(Duration::from_secs(1), 10.0, 5)
            .with_max_delay(Duration::from_secs(30));

        assert_eq!(policy.delay(1), Duration::from_secs(10));
        assert_eq!(policy.delay(2), Duration::from_secs(30));
        assert_eq!(policy.delay(40), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_stays_within_half_to_full() {
        let policy = RetryPolicy::exponential(Duration::from_millis(1000), 1.0, 3).with_jitter();

        for _ in 0..200 {
            let d = policy.delay(0);
            assert!(d >= Duration::from_millis(500), "{:?} too short", d);
            assert!(d < Duration::from_millis(1000), "{:?} too long", d);
        }
    }

    #[test]
    fn test_fixed_respects_retryable_sets() {
        let policy = RetryPolicy::fixed(Duration::from_millis(100), 5);

        assert!(policy.should_retry(&status_error(503), 0));
        assert!(policy.should_retry(&status_error(429), 0));
        assert!(!policy.should_retry(&status_error(404), 0));
        assert!(policy.should_retry(&connect_error(), 0));
        assert!(policy.should_retry(&TransportError::Timeout(Duration::from_secs(1)), 4));
        assert!(!policy.should_retry(&TransportError::Other("boom".into()), 0));
        assert_eq!(policy.delay(3), Duration::from_millis(100));
    }

    #[test]
    fn test_cancelled_is_never_retried() {
        let policy = RetryPolicy::custom(10, |_, _| true, |_| Duration::ZERO);

        assert!(!policy.should_retry(&TransportError::Cancelled, 0));
        assert!(policy.should_retry(&connect_error(), 0));
    }

    #[test]
    fn test_custom_hard_ceiling_overrides_predicate() {
        let policy = RetryPolicy::custom(2, |_, _| true, |a| Duration::from_secs(a as u64));

        assert!(policy.should_retry(&status_error(404), 1));
        assert!(!policy.should_retry(&status_error(404), 2));
        assert_eq!(policy.delay(1), Duration::from_secs(1));
    }

    #[test]
    fn test_custom_retryable_set() {
        let set = RetryableSet {
            statuses: [418].into_iter().collect(),
            kinds: HashSet::new(),
        };
        let policy = RetryPolicy::fixed(Duration::ZERO, 1).with_retryable(set);

        assert!(policy.should_retry(&status_error(418), 0));
        assert!(!policy.should_retry(&status_error(503), 0));
        assert!(!policy.should_retry(&connect_error(), 0));
    }
}
