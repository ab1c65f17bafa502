//! Mutation resources: explicitly invoked asynchronous writes.
//!
//! Unlike a query, a [`MutationResource`] never runs on its own. Each call to
//! [`mutate`](MutationResource::mutate) moves the state to loading, runs the
//! mutator, stores the outcome and hands it back to the caller, so a form
//! handler can both render the state and branch on the result (close a modal
//! on success, keep it open on failure).
//!
//! # Example
//!
//! ```rust,no_run
//! use tears_query::{MutationResource, ResourceError};
//!
//! #[derive(Debug, Clone)]
//! struct NewBay {
//!     name: String,
//! }
//!
//! # async fn run() {
//! let create_bay = MutationResource::new(|input: NewBay| {
//!     Box::pin(async move {
//!         if input.name.is_empty() {
//!             return Err(ResourceError::new("Name is required"));
//!         }
//!         Ok(input.name)
//!     })
//! });
//!
//! match create_bay.mutate(NewBay { name: "Bay 7".into() }).await {
//!     Ok(name) => println!("created {name}"),
//!     Err(err) => println!("failed: {err}"),
//! }
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::command::Command;
use crate::config::Latency;
use crate::error::ResourceError;
use crate::producer::{Mutator, ProducerFuture, produce};
use crate::state::ResourceState;
use crate::subscription::watch::StateWatch;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(0);

/// Options for a [`MutationResource`].
#[derive(Debug, Clone, Default)]
pub struct MutationOptions {
    /// Simulated latency applied before every mutator call.
    pub latency: Option<Latency>,
}

impl MutationOptions {
    /// Applies a simulated latency before every mutation.
    #[must_use]
    pub fn with_latency(mut self, latency: Latency) -> Self {
        self.latency = Some(latency);
        self
    }
}

struct Shared<V, T> {
    instance: u64,
    mutator: Mutator<V, T>,
    state: watch::Sender<ResourceState<T>>,
    sequence: AtomicU64,
    latency: Option<Latency>,
}

impl<V, T> Shared<V, T>
where
    V: Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    async fn run(self: Arc<Self>, variables: V) -> Result<T, ResourceError> {
        let mut tag = 0;
        self.state.send_modify(|state| {
            tag = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
            state.begin();
        });
        debug!(instance = self.instance, tag, "mutation started");

        let mutator = Arc::clone(&self.mutator);
        let outcome = produce(self.latency, move || mutator(variables)).await;

        match &outcome {
            Ok(_) => debug!(instance = self.instance, tag, "mutation succeeded"),
            Err(err) => warn!(instance = self.instance, tag, error = %err, "mutation failed"),
        }

        let applied = self.state.send_if_modified(|state| {
            if self.sequence.load(Ordering::SeqCst) != tag {
                return false;
            }
            state.settle(outcome.clone());
            true
        });
        if !applied {
            trace!(instance = self.instance, tag, "superseded mutation result not stored");
        }

        outcome
    }
}

/// The write-side resource: an asynchronous mutator with observable state.
///
/// Cloning the resource shares its state, so several handlers of one form can
/// hold the same mutation.
pub struct MutationResource<V, T> {
    shared: Arc<Shared<V, T>>,
}

impl<V, T> Clone for MutationResource<V, T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<V, T> MutationResource<V, T>
where
    V: Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Creates an idle mutation with default options.
    pub fn new<F>(mutator: F) -> Self
    where
        F: Fn(V) -> ProducerFuture<T> + Send + Sync + 'static,
    {
        Self::with_options(mutator, MutationOptions::default())
    }

    /// Creates an idle mutation with the given options.
    pub fn with_options<F>(mutator: F, options: MutationOptions) -> Self
    where
        F: Fn(V) -> ProducerFuture<T> + Send + Sync + 'static,
    {
        Self {
            shared: Arc::new(Shared {
                instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
                mutator: Arc::new(mutator),
                state: watch::Sender::new(ResourceState::idle()),
                sequence: AtomicU64::new(0),
                latency: options.latency,
            }),
        }
    }

    /// Runs the mutator with `variables` and returns its outcome.
    ///
    /// The outcome is also stored in the resource state unless a newer call
    /// was started meanwhile. The call runs on its own task, so dropping the
    /// returned future does not leave the state loading.
    ///
    /// # Errors
    ///
    /// Returns the mutator's error, coerced into a [`ResourceError`].
    pub async fn mutate(&self, variables: V) -> Result<T, ResourceError> {
        let call = tokio::spawn(Arc::clone(&self.shared).run(variables));
        match call.await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(instance = self.shared.instance, error = %err, "mutation task failed");
                Err(ResourceError::Unknown)
            }
        }
    }

    /// Runs the mutation as a [`Command`] producing its outcome.
    ///
    /// ```rust,ignore
    /// Message::Submit(form) => self
    ///     .create_staff
    ///     .command(form)
    ///     .map(Message::StaffCreated),
    /// ```
    pub fn command(&self, variables: V) -> Command<Result<T, ResourceError>> {
        let mutation = self.clone();
        Command::future(async move { mutation.mutate(variables).await })
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
        StateWatch::new("mutation".to_string(), self.shared.instance, self.subscribe())
    }

    /// Returns the state to idle. Calls still in flight will not store their outcome.
    pub fn reset(&self) {
        self.shared.state.send_modify(|state| {
            self.shared.sequence.fetch_add(1, Ordering::SeqCst);
            *state = ResourceState::idle();
        });
    }
}

impl<V, T> std::fmt::Debug for MutationResource<V, T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationResource")
            .field("state", &*self.shared.state.borrow())
            .finish_non_exhaustive()
    }
}

/// Convenience alias matching the query side.
pub type MutationState<T> = ResourceState<T>;
