//! Subscription to the state of a query or mutation resource.

use std::hash::{DefaultHasher, Hash, Hasher};

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::state::ResourceState;
use crate::subscription::{SubscriptionId, SubscriptionSource};

/// Emits a resource's current state, then every subsequent state change.
///
/// Created by [`QueryResource::watch`](crate::QueryResource::watch) and
/// [`MutationResource::watch`](crate::MutationResource::watch). The id is
/// derived from the resource instance and its label (the cache key for
/// queries), so re-declaring the watch of the same instance keeps the running
/// subscription, while a new instance starts a new one.
///
/// The stream ends once the resource is dropped.
pub struct StateWatch<T> {
    label: String,
    instance: u64,
    rx: watch::Receiver<ResourceState<T>>,
}

impl<T> StateWatch<T> {
    pub(crate) const fn new(
        label: String,
        instance: u64,
        rx: watch::Receiver<ResourceState<T>>,
    ) -> Self {
        Self {
            label,
            instance,
            rx,
        }
    }

    /// The label this watch was created with.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl<T> SubscriptionSource for StateWatch<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Output = ResourceState<T>;

    fn stream(&self) -> BoxStream<'static, Self::Output> {
        WatchStream::new(self.rx.clone()).boxed()
    }

    fn id(&self) -> SubscriptionId {
        let mut hasher = DefaultHasher::new();
        self.instance.hash(&mut hasher);
        self.label.hash(&mut hasher);
        SubscriptionId::of::<Self>(hasher.finish())
    }
}
