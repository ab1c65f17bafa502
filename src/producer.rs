//! Producer function types and the shared "call and coerce" step.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::config::Latency;
use crate::error::ResourceError;

/// The future returned by fetchers and mutators.
pub type ProducerFuture<T> = BoxFuture<'static, Result<T, ResourceError>>;

/// A zero-argument asynchronous producer backing a query.
pub type Fetcher<T> = Arc<dyn Fn() -> ProducerFuture<T> + Send + Sync>;

/// A variables-taking asynchronous producer backing a mutation.
pub type Mutator<V, T> = Arc<dyn Fn(V) -> ProducerFuture<T> + Send + Sync>;

/// Waits for the optional latency, then runs the producer to completion.
///
/// A panic raised while creating or polling the producer future is coerced
/// into [`ResourceError::Unknown`].
pub(crate) async fn produce<T, F>(latency: Option<Latency>, call: F) -> Result<T, ResourceError>
where
    F: FnOnce() -> ProducerFuture<T>,
{
    if let Some(latency) = latency {
        latency.wait().await;
    }

    let future = match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(future) => future,
        Err(payload) => return Err(ResourceError::from_panic(payload.as_ref())),
    };

    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => Err(ResourceError::from_panic(payload.as_ref())),
    }
}
