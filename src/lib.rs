//! # tears-query - asynchronous query and mutation resources
//!
//! Two small state machines for data-driven dashboards, in the spirit of SWR
//! and TanStack Query, plus an Elm-style host to consume them.
//!
//! - [`QueryResource`]: a keyed asynchronous read exposing `data`, `loading`
//!   and `error`, with manual [`refetch`](QueryResource::refetch), optional
//!   polling and a `skip` flag. Changing the key, skip flag or poll interval
//!   restarts the fetch.
//! - [`MutationResource`]: an asynchronous write exposing the same state and
//!   an explicitly called [`mutate`](MutationResource::mutate) that returns
//!   the outcome to the caller.
//!
//! Both share one lifecycle:
//!
//! ```text
//! Idle ──▶ Pending ──▶ Success
//!             ▲   └──▶ Failure
//!             └── refetch / poll tick / input change / mutate
//! ```
//!
//! Each instance owns its state. A producer response that arrives after a
//! newer one has been stored never overwrites it. Sharing results between
//! instances is opt-in through a [`QueryClient`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use tears_query::{MutationResource, QueryOptions, QueryResource, ResourceError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let locations = QueryResource::new(
//!         &"locations",
//!         || Box::pin(async { Ok::<_, ResourceError>(vec!["North", "South"]) }),
//!         QueryOptions::default(),
//!     );
//!
//!     let rename = MutationResource::new(|name: String| {
//!         Box::pin(async move { Ok::<_, ResourceError>(name) })
//!     });
//!
//!     let renamed = rename.mutate("Harbor".to_string()).await;
//!     assert_eq!(renamed.as_deref(), Ok("Harbor"));
//!
//!     locations.refetch().await;
//!     assert!(!locations.state().loading);
//! }
//! ```

pub mod application;
pub mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod mutation;
pub mod prelude;
pub mod producer;
pub mod query;
pub mod runtime;
pub mod state;
pub mod subscription;

pub use client::QueryClient;
pub use command::Command;
pub use config::{Latency, QueryConfig};
pub use error::ResourceError;
pub use futures::stream::BoxStream;
pub use mutation::{MutationOptions, MutationResource, MutationState};
pub use query::{QueryInputs, QueryOptions, QueryResource, QueryState};
pub use state::{ResourceState, Status};
