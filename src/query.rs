//! Query resources: keyed asynchronous reads with refetch and polling.
//!
//! A [`QueryResource`] owns the loading/data/error state of one call site. It
//! runs its fetcher when created, whenever its inputs (key, skip flag, poll
//! interval) change, on every [`refetch`](QueryResource::refetch) and on every
//! poll tick.
//!
//! # Fetch cycles
//!
//! Each fetch cycle takes a sequence tag from a per-instance counter before
//! calling the fetcher. When the fetcher settles, its result is applied only
//! if no newer cycle has already applied its result and the inputs have not
//! changed since the cycle started. A slow response that arrives after a
//! faster, newer one is discarded instead of overwriting fresher state, while
//! overlapping cycles that settle in order all land. Poll ticks that fire
//! while a slow fetch is still running therefore never starve the state.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tears_query::{QueryOptions, QueryResource, ResourceError};
//!
//! # async fn run() {
//! let mut locations = QueryResource::new(
//!     &"locations",
//!     || Box::pin(async { Ok::<_, ResourceError>(vec!["North", "South", "Harbor"]) }),
//!     QueryOptions::default().with_poll_interval(Duration::from_secs(30)),
//! );
//!
//! let mut rx = locations.subscribe();
//! let state = rx.wait_for(|state| !state.loading).await.map(|s| s.clone());
//!
//! // Manual refresh, e.g. from a button.
//! locations.refetch().await;
//!
//! // Changing the key restarts the effect: one new fetch and a fresh poll timer.
//! locations.set_key(&"locations?region=north");
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::client::QueryClient;
use crate::command::Command;
use crate::config::Latency;
use crate::producer::{Fetcher, ProducerFuture, produce};
use crate::state::ResourceState;
use crate::subscription::SubscriptionSource;
use crate::subscription::time::Timer;
use crate::subscription::watch::StateWatch;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(0);

/// Options for a [`QueryResource`].
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// When `true` the fetcher is never called and `loading` stays `false`.
    pub skip: bool,
    /// Period of the poll timer. `None` or zero disables polling.
    pub poll_interval: Option<Duration>,
    /// Simulated latency applied before every fetcher call.
    pub latency: Option<Latency>,
    /// Shared cache to attach to. `None` keeps state private to the instance.
    pub client: Option<Arc<QueryClient>>,
}

impl QueryOptions {
    /// Sets the skip flag.
    #[must_use]
    pub fn with_skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    /// Enables polling with the given period.
    #[must_use]
    pub fn with_poll_interval(mut self, period: Duration) -> Self {
        self.poll_interval = Some(period);
        self
    }

    /// Applies a simulated latency before every fetch.
    #[must_use]
    pub fn with_latency(mut self, latency: Latency) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Attaches the query to a shared cache.
    #[must_use]
    pub fn with_client(mut self, client: Arc<QueryClient>) -> Self {
        self.client = Some(client);
        self
    }
}

/// The dependency set of a query: changing any of these restarts its effect.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryInputs {
    /// The cache key.
    pub key: String,
    /// Whether fetching is suppressed.
    pub skip: bool,
    /// Poll period; never `Some(Duration::ZERO)`.
    pub poll_interval: Option<Duration>,
}

impl QueryInputs {
    /// Inputs for `key` without skip or polling.
    pub fn new(key: &impl ToString) -> Self {
        Self {
            key: key.to_string(),
            skip: false,
            poll_interval: None,
        }
    }

    fn from_options(key: &impl ToString, options: &QueryOptions) -> Self {
        Self::new(key)
            .with_skip(options.skip)
            .with_poll_interval(options.poll_interval)
    }

    /// Sets the skip flag.
    #[must_use]
    pub fn with_skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    /// Sets the poll period. A zero period disables polling.
    #[must_use]
    pub fn with_poll_interval(mut self, period: Option<Duration>) -> Self {
        self.poll_interval = period.filter(|period| !period.is_zero());
        self
    }
}

struct Shared<T> {
    instance: u64,
    fetcher: Fetcher<T>,
    state: watch::Sender<ResourceState<T>>,
    inputs: watch::Sender<QueryInputs>,
    sequence: AtomicU64,
    /// Highest tag whose result was applied, or the tag of the last input change.
    applied: AtomicU64,
    latency: Option<Latency>,
    client: Option<Arc<QueryClient>>,
}

impl<T> Shared<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn next_tag(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Marks every tag issued so far as outdated.
    ///
    /// Must run inside a state transition so it is ordered with [`Self::try_apply`].
    fn supersede_in_flight(&self) {
        let tag = self.next_tag();
        self.applied.store(tag, Ordering::SeqCst);
    }

    /// Claims the right to apply the result for `tag`.
    ///
    /// Must run inside a state transition: the watch lock serializes claims.
    fn try_apply(&self, tag: u64) -> bool {
        if tag <= self.applied.load(Ordering::SeqCst) {
            return false;
        }
        self.applied.store(tag, Ordering::SeqCst);
        true
    }

    /// Runs one fetch cycle for the current inputs.
    async fn run_cycle(self: Arc<Self>) {
        let inputs = self.inputs.borrow().clone();
        if inputs.skip {
            trace!(key = %inputs.key, "query skipped, not fetching");
            return;
        }

        let mut tag = 0;
        self.state.send_modify(|state| {
            tag = self.next_tag();
            state.begin();
        });
        debug!(key = %inputs.key, tag, "query fetch started");

        let fetcher = Arc::clone(&self.fetcher);
        let outcome = produce(self.latency, move || fetcher()).await;

        match &outcome {
            Ok(_) => debug!(key = %inputs.key, tag, "query fetch succeeded"),
            Err(err) => warn!(key = %inputs.key, tag, error = %err, "query fetch failed"),
        }

        let applied = self.state.send_if_modified(|state| {
            if !self.try_apply(tag) {
                return false;
            }
            if let (Some(client), Ok(data)) = (&self.client, &outcome) {
                client.set(&inputs.key, data.clone());
            }
            state.settle(outcome);
            true
        });

        if !applied {
            trace!(key = %inputs.key, tag, "discarding superseded query result");
        }
    }

    /// Seeds `data` from the shared cache. Returns `true` if the entry is fresh.
    fn seed_from_cache(&self, key: &str) -> bool {
        let Some(client) = &self.client else {
            return false;
        };
        let Some(entry) = client.get::<T>(key) else {
            return false;
        };

        let fresh = !entry.is_stale_after(client.config().stale_time);
        self.state.send_modify(|state| {
            state.data = Some(entry.data);
            if fresh {
                state.loading = false;
            }
        });
        debug!(key, fresh, "query seeded from shared cache");
        fresh
    }
}

/// Starts the effect for the current inputs: the initial fetch, the poll timer
/// and the invalidation listener. Cancelling the returned token stops the
/// timer and the listener; fetches already running still complete.
///
/// Every poll tick runs a cycle, even while an earlier one is still in
/// flight, so the fetcher is called once per period whatever its latency.
fn start_effect<T>(shared: &Arc<Shared<T>>) -> CancellationToken
where
    T: Clone + Send + Sync + 'static,
{
    let token = CancellationToken::new();
    let inputs = shared.inputs.borrow().clone();
    if inputs.skip {
        return token;
    }

    if !shared.seed_from_cache(&inputs.key) {
        tokio::spawn(Arc::clone(shared).run_cycle());
    }

    if let Some(period) = inputs.poll_interval {
        let mut ticks = Timer::new(period).stream();
        let shared = Arc::clone(shared);
        let cancelled = token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancelled.cancelled() => break,
                    tick = ticks.next() => {
                        if tick.is_none() {
                            break;
                        }
                        tokio::spawn(Arc::clone(&shared).run_cycle());
                    }
                }
            }
        });
    }

    if let Some(client) = &shared.client {
        let mut rx = client.subscribe_invalidation();
        let shared = Arc::clone(shared);
        let cancelled = token.clone();
        let key = inputs.key;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancelled.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(invalidated) if invalidated == key => {
                            tokio::spawn(Arc::clone(&shared).run_cycle());
                        }
                        Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });
    }

    token
}

/// The read-side resource: a keyed asynchronous fetch with observable state.
///
/// Dropping the resource stops its poll timer. Must be created and updated
/// from within a Tokio runtime.
pub struct QueryResource<T> {
    shared: Arc<Shared<T>>,
    effect: CancellationToken,
}

impl<T> QueryResource<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a query and starts its effect.
    ///
    /// Unless `options.skip` is set, the state starts as `loading=true,data=None`
    /// and the fetcher is called right away.
    pub fn new<F>(key: &impl ToString, fetcher: F, options: QueryOptions) -> Self
    where
        F: Fn() -> ProducerFuture<T> + Send + Sync + 'static,
    {
        let inputs = QueryInputs::from_options(key, &options);
        let initial = if inputs.skip {
            ResourceState::idle()
        } else {
            ResourceState::pending()
        };

        let shared = Arc::new(Shared {
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            fetcher: Arc::new(fetcher),
            state: watch::Sender::new(initial),
            inputs: watch::Sender::new(inputs),
            sequence: AtomicU64::new(0),
            applied: AtomicU64::new(0),
            latency: options.latency,
            client: options.client,
        });
        let effect = start_effect(&shared);

        Self { shared, effect }
    }

    /// Returns a snapshot of the current state.
    pub fn state(&self) -> ResourceState<T> {
        self.shared.state.borrow().clone()
    }

    /// Returns a receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<ResourceState<T>> {
        self.shared.state.subscribe()
    }

    /// Returns a subscription source emitting every state change.
    pub fn watch(&self) -> StateWatch<T> {
        StateWatch::new(self.key(), self.shared.instance, self.subscribe())
    }

    /// Returns the current inputs.
    pub fn inputs(&self) -> QueryInputs {
        self.shared.inputs.borrow().clone()
    }

    /// Returns the current cache key.
    pub fn key(&self) -> String {
        self.shared.inputs.borrow().key.clone()
    }

    /// Runs one fetch cycle and waits for it to settle.
    ///
    /// Does nothing while the query is skipped. The cycle runs on its own task,
    /// so dropping the returned future does not leave the state loading.
    pub async fn refetch(&self) {
        let cycle = tokio::spawn(Arc::clone(&self.shared).run_cycle());
        if let Err(err) = cycle.await {
            warn!(key = %self.key(), error = %err, "refetch task failed");
        }
    }

    /// Runs one fetch cycle as a [`Command`] that produces no messages.
    ///
    /// The new state reaches the application through the query's
    /// [`watch`](Self::watch) subscription. Like [`refetch`](Self::refetch),
    /// the cycle runs on its own task, so a command dropped mid-cycle (for
    /// instance when the runtime quits) still lets the state settle.
    pub fn refetch_command<Msg>(&self) -> Command<Msg>
    where
        Msg: Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        Command::stream(
            futures::stream::once(async move {
                let key = shared.inputs.borrow().key.clone();
                if let Err(err) = tokio::spawn(shared.run_cycle()).await {
                    warn!(key = %key, error = %err, "refetch task failed");
                }
            })
            .filter_map(|()| async { None }),
        )
    }

    /// Replaces the inputs, restarting the effect if they differ.
    ///
    /// On a change the poll timer is cancelled, results of fetches still in
    /// flight are discarded, and a new effect (one fetch plus a new timer) is
    /// started. `data` keeps its previous value until the new fetch settles.
    /// Returns `false` if the inputs were unchanged.
    pub fn update(&mut self, inputs: QueryInputs) -> bool {
        if *self.shared.inputs.borrow() == inputs {
            return false;
        }

        debug!(
            key = %inputs.key,
            skip = inputs.skip,
            poll_interval = ?inputs.poll_interval,
            "query inputs changed"
        );
        self.effect.cancel();

        let skip = inputs.skip;
        self.shared.inputs.send_replace(inputs);
        self.shared.state.send_modify(|state| {
            self.shared.supersede_in_flight();
            if skip {
                state.loading = false;
            } else {
                state.begin();
            }
        });

        self.effect = start_effect(&self.shared);
        true
    }

    /// Changes the cache key. Returns `false` if it was unchanged.
    pub fn set_key(&mut self, key: &impl ToString) -> bool {
        let mut inputs = self.inputs();
        inputs.key = key.to_string();
        self.update(inputs)
    }

    /// Changes the skip flag. Returns `false` if it was unchanged.
    pub fn set_skip(&mut self, skip: bool) -> bool {
        let inputs = self.inputs().with_skip(skip);
        self.update(inputs)
    }

    /// Changes the poll period. Returns `false` if it was unchanged.
    pub fn set_poll_interval(&mut self, period: Option<Duration>) -> bool {
        let inputs = self.inputs().with_poll_interval(period);
        self.update(inputs)
    }
}

impl<T> Drop for QueryResource<T> {
    fn drop(&mut self) {
        self.effect.cancel();
    }
}

impl<T> std::fmt::Debug for QueryResource<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResource")
            .field("inputs", &*self.shared.inputs.borrow())
            .field("state", &*self.shared.state.borrow())
            .finish_non_exhaustive()
    }
}

/// Convenience alias matching the mutation side.
pub type QueryState<T> = ResourceState<T>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use crate::config::QueryConfig;
    use crate::error::ResourceError;
    use crate::state::Status;

    fn counting(calls: Arc<AtomicUsize>) -> impl Fn() -> ProducerFuture<usize> + Send + Sync + 'static {
        move || -> ProducerFuture<usize> {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Box::pin(async move { Ok::<_, ResourceError>(n) })
        }
    }

    fn slow_counting(
        calls: Arc<AtomicUsize>,
        delay: Duration,
    ) -> impl Fn() -> ProducerFuture<usize> + Send + Sync + 'static {
        move || -> ProducerFuture<usize> {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                Ok::<_, ResourceError>(n)
            })
        }
    }

    async fn settled<T: Clone>(query: &QueryResource<T>) -> ResourceState<T>
    where
        T: Send + Sync + 'static,
    {
        let mut rx = query.subscribe();
        rx.wait_for(|state| !state.loading)
            .await
            .expect("state channel open")
            .clone()
    }

    #[test]
    fn test_inputs_normalize_zero_poll_interval() {
        let inputs = QueryInputs::new(&"bays").with_poll_interval(Some(Duration::ZERO));
        assert_eq!(inputs.poll_interval, None);

        let options = QueryOptions::default()
            .with_skip(true)
            .with_poll_interval(Duration::from_secs(5));
        let inputs = QueryInputs::from_options(&"bays", &options);
        assert!(inputs.skip);
        assert_eq!(inputs.poll_interval, Some(Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_settles_with_data() {
        let calls = Arc::new(AtomicUsize::new(0));
        let query = QueryResource::new(&"members", counting(Arc::clone(&calls)), QueryOptions::default());

        let initial = query.state();
        assert!(initial.loading);
        assert!(initial.data.is_none());

        let state = settled(&query).await;
        assert_eq!(state.data, Some(1));
        assert!(state.error.is_none());
        assert_eq!(state.status(), Status::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_preserves_previous_data() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = {
            let calls = Arc::clone(&calls);
            move || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Box::pin(async move {
                    if n == 0 {
                        Ok::<_, ResourceError>("first")
                    } else {
                        Err(ResourceError::new("backend down"))
                    }
                }) as ProducerFuture<&'static str>
            }
        };
        let query = QueryResource::new(&"reporting", fetcher, QueryOptions::default());
        assert_eq!(settled(&query).await.data, Some("first"));

        query.refetch().await;

        let state = query.state();
        assert!(!state.loading);
        assert_eq!(state.data, Some("first"));
        assert_eq!(state.error, Some(ResourceError::new("backend down")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_never_fetches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let query = QueryResource::new(
            &"activity",
            counting(Arc::clone(&calls)),
            QueryOptions::default()
                .with_skip(true)
                .with_poll_interval(Duration::from_millis(10)),
        );

        assert!(!query.state().loading);
        query.refetch().await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(query.state().status(), Status::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unskipping_starts_a_fetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut query = QueryResource::new(
            &"activity",
            counting(Arc::clone(&calls)),
            QueryOptions::default().with_skip(true),
        );

        assert!(query.set_skip(false));
        assert_eq!(settled(&query).await.data, Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_change_fetches_once_per_change() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut query = QueryResource::new(&"bays?page=1", counting(Arc::clone(&calls)), QueryOptions::default());
        settled(&query).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Re-declaring the same inputs is a no-op.
        assert!(!query.set_key(&"bays?page=1"));
        assert!(!query.update(query.inputs()));

        assert!(query.set_key(&"bays?page=2"));
        assert!(!query.set_key(&"bays?page=2"));
        settled(&query).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(query.key(), "bays?page=2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_fetches_every_interval_until_drop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let query = QueryResource::new(
            &"activity",
            counting(Arc::clone(&calls)),
            QueryOptions::default().with_poll_interval(Duration::from_millis(100)),
        );

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        drop(query);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_does_not_slow_polling() {
        let calls = Arc::new(AtomicUsize::new(0));
        let query = QueryResource::new(
            &"occupancy",
            slow_counting(Arc::clone(&calls), Duration::from_millis(150)),
            QueryOptions::default().with_poll_interval(Duration::from_millis(100)),
        );

        tokio::time::sleep(Duration::from_millis(1050)).await;

        // The initial fetch plus one per tick at 100, 200, ..., 1000 ms.
        assert_eq!(calls.load(Ordering::SeqCst), 11);
        // Overlapping cycles settle in order, so their results keep landing.
        let data = query.state().data;
        assert!(data.is_some_and(|n| n >= 9), "latest applied result was {data:?}");
        assert!(query.state().error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_tick_during_manual_refetch_still_fetches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let query = QueryResource::new(
            &"occupancy",
            slow_counting(Arc::clone(&calls), Duration::from_millis(80)),
            QueryOptions::default().with_poll_interval(Duration::from_millis(100)),
        );
        assert_eq!(settled(&query).await.data, Some(1));

        tokio::time::sleep(Duration::from_millis(10)).await;
        // Refetch runs from 90 to 170 ms; the timer ticks at 100 ms.
        let (calls_during_refetch, ()) = tokio::join!(
            async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                calls.load(Ordering::SeqCst)
            },
            query.refetch(),
        );
        assert_eq!(calls_during_refetch, 3);

        tokio::time::sleep(Duration::from_millis(15)).await;
        let state = query.state();
        assert_eq!(state.data, Some(3));
        assert!(!state.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dependency_change_replaces_poll_timer() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut query = QueryResource::new(
            &"activity",
            counting(Arc::clone(&calls)),
            QueryOptions::default().with_poll_interval(Duration::from_millis(100)),
        );

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert!(query.set_poll_interval(None));
        tokio::time::sleep(Duration::from_millis(500)).await;

        // One fetch for the change itself, then the old timer is gone.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_fetch_is_discarded() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = {
            let calls = Arc::clone(&calls);
            move || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                let (delay, value) = if n == 0 { (500, "stale") } else { (50, "fresh") };
                Box::pin(async move {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    Ok::<_, ResourceError>(value)
                }) as ProducerFuture<&'static str>
            }
        };
        let query = QueryResource::new(&"staff", fetcher, QueryOptions::default());

        query.refetch().await;
        assert_eq!(query.state().data, Some("fresh"));

        tokio::time::sleep(Duration::from_millis(600)).await;
        let state = query.state();
        assert_eq!(state.data, Some("fresh"));
        assert!(!state.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_change_discards_in_flight_result() {
        let fetcher = |key: &'static str| {
            move || {
                Box::pin(async move {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok::<_, ResourceError>(key)
                }) as ProducerFuture<&'static str>
            }
        };
        // The fetcher ignores the key, so tag the value by call order instead.
        let calls = Arc::new(AtomicUsize::new(0));
        let tagged = {
            let calls = Arc::clone(&calls);
            move || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                fetcher(if n == 0 { "old" } else { "new" })()
            }
        };

        let mut query = QueryResource::new(&"locations", tagged, QueryOptions::default());
        tokio::time::sleep(Duration::from_millis(100)).await;
        query.set_key(&"locations?region=east");

        let state = settled(&query).await;
        assert_eq!(state.data, Some("new"));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(query.state().data, Some("new"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_fetcher_reports_unknown_error() {
        async fn explode() -> Result<u8, ResourceError> {
            panic!("fetcher exploded")
        }

        let query = QueryResource::new(&"broken", || Box::pin(explode()), QueryOptions::default());
        let state = settled(&query).await;
        assert_eq!(state.error, Some(ResourceError::Unknown));
        assert_eq!(state.error.map(|err| err.to_string()), Some("Unknown error".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_delays_settlement() {
        let calls = Arc::new(AtomicUsize::new(0));
        let start = tokio::time::Instant::now();
        let query = QueryResource::new(
            &"membership",
            counting(Arc::clone(&calls)),
            QueryOptions::default().with_latency(Latency::fixed(Duration::from_millis(300))),
        );

        settled(&query).await;
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_client_seeds_and_skips_fresh_fetch() {
        let client = Arc::new(QueryClient::with_config(QueryConfig::new(
            Duration::from_secs(60),
            Duration::from_secs(300),
        )));
        let options = QueryOptions::default().with_client(Arc::clone(&client));

        let first_calls = Arc::new(AtomicUsize::new(0));
        let first = QueryResource::new(&"tiers", counting(Arc::clone(&first_calls)), options.clone());
        assert_eq!(settled(&first).await.data, Some(1));
        assert_eq!(client.get::<usize>("tiers").map(|entry| entry.data), Some(1));

        let second_calls = Arc::new(AtomicUsize::new(0));
        let second = QueryResource::new(&"tiers", counting(Arc::clone(&second_calls)), options);
        let state = second.state();
        assert_eq!(state.data, Some(1));
        assert!(!state.loading);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidation_refetches_attached_queries() {
        let client = Arc::new(QueryClient::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let query = QueryResource::new(
            &"bays",
            counting(Arc::clone(&calls)),
            QueryOptions::default().with_client(Arc::clone(&client)),
        );
        assert_eq!(settled(&query).await.data, Some(1));

        let mut rx = query.subscribe();
        assert_eq!(client.invalidate(&"bays"), 1);
        client.invalidate(&"staff");

        let state = rx
            .wait_for(|state| state.data == Some(2) && !state.loading)
            .await
            .expect("state channel open")
            .clone();
        assert_eq!(state.data, Some(2));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetch_command_produces_no_messages() {
        use futures::StreamExt;

        let calls = Arc::new(AtomicUsize::new(0));
        let query = QueryResource::new(&"revenue", counting(Arc::clone(&calls)), QueryOptions::default());
        settled(&query).await;

        let cmd: Command<()> = query.refetch_command();
        let actions: Vec<_> = cmd.stream.expect("command has a stream").collect().await;

        assert!(actions.is_empty());
        assert_eq!(query.state().data, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_refetch_command_still_settles() {
        use futures::StreamExt;

        let calls = Arc::new(AtomicUsize::new(0));
        let query = QueryResource::new(
            &"revenue",
            slow_counting(Arc::clone(&calls), Duration::from_millis(100)),
            QueryOptions::default(),
        );
        settled(&query).await;

        let cmd: Command<()> = query.refetch_command();
        let mut stream = cmd.stream.expect("command has a stream");
        let polled = tokio::time::timeout(Duration::from_millis(10), stream.next()).await;
        assert!(polled.is_err(), "cycle should still be running");
        drop(stream);
        assert!(query.state().loading);

        let state = settled(&query).await;
        assert_eq!(state.data, Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
