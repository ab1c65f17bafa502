//! Prelude module for convenient imports.
//!
//! ```
//! use tears_query::prelude::*;
//! ```
//!
//! # What's included
//!
//! - [`QueryResource`], [`QueryOptions`] - Keyed asynchronous reads
//! - [`MutationResource`], [`MutationOptions`] - Explicit asynchronous writes
//! - [`ResourceState`], [`Status`], [`ResourceError`] - What both resources expose
//! - [`Application`], [`Command`], [`Action`], [`Subscription`], [`Runtime`] - The host

pub use crate::application::Application;
pub use crate::command::{Action, Command};
pub use crate::error::ResourceError;
pub use crate::mutation::{MutationOptions, MutationResource};
pub use crate::query::{QueryOptions, QueryResource};
pub use crate::runtime::Runtime;
pub use crate::state::{ResourceState, Status};
pub use crate::subscription::Subscription;
