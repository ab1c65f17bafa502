//! Opt-in shared cache for query resources.
//!
//! Query resources own independent state by default. Attaching them to a
//! [`QueryClient`] turns the client into a keyed store shared by every attached
//! instance:
//!
//! 1. A successful fetch writes its result under the query key
//! 2. A new instance (or a key change) starts from the cached data
//! 3. Cached data younger than [`QueryConfig::stale_time`] suppresses the initial fetch
//! 4. [`QueryClient::invalidate`] makes every attached instance with that key refetch
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tears_query::{QueryClient, QueryOptions, QueryResource, ResourceError};
//!
//! # async fn run() {
//! let client = Arc::new(QueryClient::new());
//! let options = QueryOptions::default().with_client(client.clone());
//!
//! let bays = QueryResource::new(
//!     &"bays",
//!     || Box::pin(async { Ok::<_, ResourceError>(vec!["Bay 1", "Bay 2"]) }),
//!     options,
//! );
//!
//! // After a write elsewhere:
//! client.invalidate(&"bays");
//! # drop(bays);
//! # }
//! ```

mod cache;

use std::any::Any;
use std::sync::Arc;

use dashmap::DashMap;
use futures::StreamExt;
use tokio::sync::broadcast;
use tracing::debug;

use crate::command::Command;
use crate::config::QueryConfig;

pub use cache::CacheEntry;

type ErasedEntry = CacheEntry<Box<dyn Any + Send + Sync>>;

/// A client holding the shared query cache and broadcasting invalidations.
///
/// # Example
///
/// ```rust
/// use tears_query::{QueryClient, QueryConfig};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let config = QueryConfig::new(
///     Duration::from_secs(30),  // stale_time
///     Duration::from_secs(300), // cache_time
/// );
///
/// let client = Arc::new(QueryClient::with_config(config));
/// assert!(client.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct QueryClient {
    cache: Arc<DashMap<String, ErasedEntry>>,
    invalidation_tx: broadcast::Sender<String>,
    config: QueryConfig,
}

impl QueryClient {
    /// Creates a new query client with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(QueryConfig::default())
    }

    /// Creates a new query client with the given configuration.
    #[must_use]
    pub fn with_config(config: QueryConfig) -> Self {
        let (invalidation_tx, _) = broadcast::channel(100);
        Self {
            cache: Arc::new(DashMap::new()),
            invalidation_tx,
            config,
        }
    }

    /// Gets the client configuration.
    pub const fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Returns a copy of the cached entry for `key`, if one of type `T` exists.
    pub fn get<T: Clone + 'static>(&self, key: &str) -> Option<CacheEntry<T>> {
        let entry = self.cache.get(key)?;
        let data = entry.data.downcast_ref::<T>()?.clone();
        Some(CacheEntry {
            data,
            timestamp: entry.timestamp,
            is_stale: entry.is_stale,
        })
    }

    /// Stores `data` under `key`, replacing any previous entry.
    pub fn set<T: Send + Sync + 'static>(&self, key: &impl ToString, data: T) {
        let erased: Box<dyn Any + Send + Sync> = Box::new(data);
        self.cache.insert(key.to_string(), CacheEntry::new(erased));
    }

    /// Removes the entry for `key`. Returns `true` if one existed.
    pub fn remove(&self, key: &str) -> bool {
        self.cache.remove(key).is_some()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Marks the entry for `key` stale and notifies attached queries to refetch.
    ///
    /// Returns the number of listeners that were notified.
    pub fn invalidate(&self, key: &impl ToString) -> usize {
        let key = key.to_string();
        if let Some(mut entry) = self.cache.get_mut(&key) {
            entry.mark_stale();
        }
        let notified = self.invalidation_tx.send(key.clone()).unwrap_or(0);
        debug!(key = %key, notified, "query key invalidated");
        notified
    }

    /// Invalidates `key` as a [`Command`] that produces no messages.
    ///
    /// ```rust,ignore
    /// fn update(&mut self, msg: Message) -> Command<Message> {
    ///     match msg {
    ///         Message::BayCreated(_) => self.client.invalidate_command(&"bays"),
    ///     }
    /// }
    /// ```
    pub fn invalidate_command<Msg>(&self, key: &impl ToString) -> Command<Msg>
    where
        Msg: Send + 'static,
    {
        let client = self.clone();
        let key = key.to_string();
        Command::stream(
            futures::stream::once(async move {
                client.invalidate(&key);
            })
            .filter_map(|()| async { None }),
        )
    }

    /// Drops entries older than [`QueryConfig::cache_time`]. Returns how many were removed.
    pub fn collect_garbage(&self) -> usize {
        let before = self.cache.len();
        let cache_time = self.config.cache_time;
        self.cache.retain(|_, entry| !entry.should_gc(cache_time));
        let removed = before.saturating_sub(self.cache.len());
        if removed > 0 {
            debug!(removed, "collected expired cache entries");
        }
        removed
    }

    /// Subscribes to invalidation notifications.
    pub(crate) fn subscribe_invalidation(&self) -> broadcast::Receiver<String> {
        self.invalidation_tx.subscribe()
    }
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new()
    }
}
