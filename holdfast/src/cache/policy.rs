//! Cache read/write eligibility.

use crate::request::Method;
use std::collections::HashSet;
use std::time::Duration;

/// Methods cached by default.
pub const DEFAULT_CACHEABLE_METHODS: [Method; 2] = [Method::Get, Method::Head];

/// Statuses cached by default.
pub const DEFAULT_CACHEABLE_STATUSES: [u16; 4] = [200, 203, 300, 301];

/// How the cache participates in a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheStrategy {
    /// Never read or write.
    None,
    /// Try the network, fall back to a fresh cache entry on network failure.
    #[default]
    NetworkFirst,
    /// Serve a fresh cache entry without a network call when one exists.
    CacheFirst,
    /// Read the cache first; never populate it.
    CacheOnly,
    /// Never read or write.
    NetworkOnly,
}

impl CacheStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStrategy::None => "none",
            CacheStrategy::NetworkFirst => "network_first",
            CacheStrategy::CacheFirst => "cache_first",
            CacheStrategy::CacheOnly => "cache_only",
            CacheStrategy::NetworkOnly => "network_only",
        }
    }

    /// Parses a configuration value such as `cache_first`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "none" => Some(CacheStrategy::None),
            "network_first" => Some(CacheStrategy::NetworkFirst),
            "cache_first" => Some(CacheStrategy::CacheFirst),
            "cache_only" => Some(CacheStrategy::CacheOnly),
            "network_only" => Some(CacheStrategy::NetworkOnly),
            _ => None,
        }
    }

    fn reads(&self) -> bool {
        matches!(
            self,
            CacheStrategy::NetworkFirst | CacheStrategy::CacheFirst | CacheStrategy::CacheOnly
        )
    }

    fn writes(&self) -> bool {
        matches!(self, CacheStrategy::NetworkFirst | CacheStrategy::CacheFirst)
    }
}

/// Decides whether a request may read or populate the cache.
///
/// # Example
///
/// ```
/// use holdfast::cache::{CachePolicy, CacheStrategy};
/// use holdfast::request::Method;
/// use std::time::Duration;
///
/// let policy = CachePolicy::new(CacheStrategy::CacheFirst).with_ttl(Duration::from_secs(60));
/// assert!(policy.should_use_cache(Method::Get));
/// assert!(!policy.should_use_cache(Method::Post));
/// assert!(policy.should_cache(Method::Get, 200));
/// assert!(!policy.should_cache(Method::Get, 404));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    pub strategy: CacheStrategy,
    /// Lifetime of written entries. `None` entries never expire by time.
    pub ttl: Option<Duration>,
    pub cacheable_methods: HashSet<Method>,
    pub cacheable_statuses: HashSet<u16>,
}

impl CachePolicy {
    pub fn new(strategy: CacheStrategy) -> Self {
        Self {
            strategy,
            ttl: None,
            cacheable_methods: DEFAULT_CACHEABLE_METHODS.into_iter().collect(),
            cacheable_statuses: DEFAULT_CACHEABLE_STATUSES.into_iter().collect(),
        }
    }

    /// A policy that never touches the cache.
    pub fn disabled() -> Self {
        Self::new(CacheStrategy::None)
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.cacheable_methods = methods.into_iter().collect();
        self
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.cacheable_statuses = statuses.into_iter().collect();
        self
    }

    /// Returns true if the cache may be read for `method`.
    pub fn should_use_cache(&self, method: Method) -> bool {
        self.strategy.reads() && self.cacheable_methods.contains(&method)
    }

    /// Returns true if a response may be written to the cache.
    pub fn should_cache(&self, method: Method, status: u16) -> bool {
        self.strategy.writes()
            && self.cacheable_methods.contains(&method)
            && self.cacheable_statuses.contains(&status)
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Returns true if the cache is consulted before the network.
    pub fn prefers_cache(&self) -> bool {
        matches!(
            self.strategy,
            CacheStrategy::CacheFirst | CacheStrategy::CacheOnly
        )
    }

    /// Returns true if a fresh entry may stand in for a failed network call.
    pub fn falls_back_to_cache(&self) -> bool {
        self.strategy == CacheStrategy::NetworkFirst
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::new(CacheStrategy::default()).with_ttl(Duration::from_secs(300))
    }
}
