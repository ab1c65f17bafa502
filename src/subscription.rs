//! Subscriptions: long-lived message sources managed by the runtime.
//!
//! A [`SubscriptionSource`] describes where messages come from (a timer, a
//! resource's state changes, ...) and carries a [`SubscriptionId`]. The
//! application declares its current set of subscriptions after every update
//! and the [`SubscriptionManager`] diffs that set against what is running:
//! new ids are started, vanished ids are cancelled, unchanged ids keep running.

pub mod time;
pub mod watch;

use std::any::TypeId;
use std::collections::HashMap;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Identity of a subscription, used to decide whether it must be restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    source: TypeId,
    hash: u64,
}

impl SubscriptionId {
    /// Creates an id for a source of type `S` with the given content hash.
    #[must_use]
    pub fn of<S: 'static>(hash: u64) -> Self {
        Self {
            source: TypeId::of::<S>(),
            hash,
        }
    }
}

/// A source of messages that can be subscribed to.
pub trait SubscriptionSource: Send + 'static {
    /// The type of items produced by the stream.
    type Output;

    /// Creates a fresh stream of items.
    fn stream(&self) -> BoxStream<'static, Self::Output>;

    /// Identity of this source. Two sources with the same id are interchangeable.
    fn id(&self) -> SubscriptionId;
}

/// A type-erased subscription producing messages of type `Msg`.
pub struct Subscription<Msg> {
    pub(crate) id: SubscriptionId,
    pub(crate) spawn: Box<dyn FnOnce() -> BoxStream<'static, Msg> + Send>,
}

impl<Msg: Send + 'static> Subscription<Msg> {
    /// Wraps a subscription source.
    pub fn new<S>(source: S) -> Self
    where
        S: SubscriptionSource<Output = Msg>,
    {
        Self {
            id: source.id(),
            spawn: Box::new(move || source.stream()),
        }
    }

    /// Transforms every message produced by this subscription.
    #[must_use]
    pub fn map<F, NewMsg>(self, f: F) -> Subscription<NewMsg>
    where
        F: Fn(Msg) -> NewMsg + Send + 'static,
        NewMsg: Send + 'static,
    {
        let spawn = self.spawn;
        Subscription {
            id: self.id,
            spawn: Box::new(move || spawn().map(f).boxed()),
        }
    }

    /// Identity of the underlying source.
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }
}

/// Handle for a running subscription task
pub struct Handle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl Handle {
    pub const fn new(token: CancellationToken, join: JoinHandle<()>) -> Self {
        Self { token, join }
    }

    /// Signal the task to stop without waiting for it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancel the subscription and wait for task completion
    pub async fn stop(self) {
        self.token.cancel();
        let _ = self.join.await;
    }
}

/// Keeps the set of running subscriptions in sync with the declared set.
pub struct SubscriptionManager<Msg> {
    tx: mpsc::UnboundedSender<Msg>,
    running: HashMap<SubscriptionId, Handle>,
}

impl<Msg: Send + 'static> SubscriptionManager<Msg> {
    pub fn new(tx: mpsc::UnboundedSender<Msg>) -> Self {
        Self {
            tx,
            running: HashMap::new(),
        }
    }

    /// Starts subscriptions with new ids and cancels the ones no longer declared.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn update(&mut self, subscriptions: impl IntoIterator<Item = Subscription<Msg>>) {
        let mut declared: HashMap<SubscriptionId, Subscription<Msg>> = HashMap::new();
        for subscription in subscriptions {
            declared.entry(subscription.id).or_insert(subscription);
        }

        self.running.retain(|id, handle| {
            let keep = declared.contains_key(id);
            if !keep {
                trace!(?id, "cancelling subscription");
                handle.cancel();
            }
            keep
        });

        for (id, subscription) in declared {
            if self.running.contains_key(&id) {
                continue;
            }
            trace!(?id, "starting subscription");
            let handle = self.spawn(subscription);
            self.running.insert(id, handle);
        }
    }

    /// Number of running subscriptions.
    pub fn len(&self) -> usize {
        self.running.len()
    }

    /// Returns `true` if no subscription is running.
    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }

    /// Returns `true` if a subscription with this id is running.
    pub fn contains(&self, id: &SubscriptionId) -> bool {
        self.running.contains_key(id)
    }

    /// Cancels every running subscription and waits for the tasks to finish.
    pub async fn shutdown(&mut self) {
        for (_, handle) in self.running.drain() {
            handle.stop().await;
        }
    }

    fn spawn(&self, subscription: Subscription<Msg>) -> Handle {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let tx = self.tx.clone();
        let mut stream = (subscription.spawn)();

        let join = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancelled.cancelled() => break,
                    item = stream.next() => match item {
                        Some(msg) => {
                            if tx.send(msg).is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
        });

        Handle::new(token, join)
    }
}

impl<Msg> Drop for SubscriptionManager<Msg> {
    fn drop(&mut self) {
        for handle in self.running.values() {
            handle.token.cancel();
        }
    }
}
