//! Configuration for query caching and simulated producer latency.

use std::time::Duration;

use rand::Rng;

/// Configuration for a [`QueryClient`](crate::client::QueryClient).
///
/// This controls how long shared cache entries are considered fresh and how
/// long they are retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    /// How long cached data is considered fresh.
    ///
    /// A query attached to the client skips its initial fetch while the cached
    /// entry for its key is fresh.
    pub stale_time: Duration,

    /// How long cached data is retained before
    /// [`collect_garbage`](crate::client::QueryClient::collect_garbage) drops it.
    pub cache_time: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_secs(0),      // immediately stale
            cache_time: Duration::from_secs(5 * 60), // 5 minutes
        }
    }
}

impl QueryConfig {
    /// Creates a new query configuration with the given stale and cache times.
    #[must_use]
    pub const fn new(stale_time: Duration, cache_time: Duration) -> Self {
        Self {
            stale_time,
            cache_time,
        }
    }
}

/// Artificial delay applied before a producer runs.
///
/// Used to make in-memory producers behave like network calls while a real
/// backend is not wired in. The delay is `base` plus a uniformly random part
/// in `0..=jitter`.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tears_query::Latency;
///
/// let latency = Latency::new(Duration::from_millis(300), Duration::from_millis(200));
/// let delay = latency.sample();
/// assert!(delay >= Duration::from_millis(300));
/// assert!(delay <= Duration::from_millis(500));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Latency {
    /// Minimum delay.
    pub base: Duration,
    /// Maximum random delay added on top of `base`.
    pub jitter: Duration,
}

impl Latency {
    /// Latency of a mocked read (300 to 500 ms).
    pub const MOCK_QUERY: Self = Self::new(Duration::from_millis(300), Duration::from_millis(200));

    /// Latency of a mocked write (400 to 600 ms).
    pub const MOCK_MUTATION: Self =
        Self::new(Duration::from_millis(400), Duration::from_millis(200));

    /// Creates a latency of `base` plus up to `jitter`.
    #[must_use]
    pub const fn new(base: Duration, jitter: Duration) -> Self {
        Self { base, jitter }
    }

    /// Creates a latency without jitter.
    #[must_use]
    pub const fn fixed(delay: Duration) -> Self {
        Self::new(delay, Duration::ZERO)
    }

    /// Draws one delay.
    #[must_use]
    pub fn sample(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.base;
        }
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let extra = rand::thread_rng().gen_range(0..=jitter_ms);
        self.base.saturating_add(Duration::from_millis(extra))
    }

    pub(crate) async fn wait(self) {
        let delay = self.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
