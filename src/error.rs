//! Error type shared by query and mutation resources.

use std::any::Any;
use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

/// A producer's original error, shared so [`ResourceError`] stays cheap to clone.
pub type BoxedSource = Arc<dyn StdError + Send + Sync + 'static>;

/// Message used when a producer fails without a usable error value.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error";

/// Error produced when a fetcher or mutator fails.
///
/// There is a single failure category: the producer failed. Any error value
/// returned by a producer is coerced into [`ResourceError::Producer`], keeping
/// its message verbatim and the original error as its
/// [`source`](std::error::Error::source). A producer that panics is reported
/// as [`ResourceError::Unknown`].
///
/// Plain messages convert with `From<&str>` and `From<String>`. Any other
/// error type goes through [`ResourceError::from_error`], typically as
/// `.map_err(ResourceError::from_error)?`; boxed errors also convert with `?`.
///
/// Two errors compare equal when they have the same variant and message.
///
/// # Example
///
/// ```
/// use tears_query::ResourceError;
///
/// let err = ResourceError::from("Conflict");
/// assert_eq!(err.to_string(), "Conflict");
/// assert_eq!(ResourceError::Unknown.to_string(), "Unknown error");
///
/// let parsed = "12a".parse::<u32>().map_err(ResourceError::from_error);
/// let reason = parsed.as_ref().err().and_then(ResourceError::reason);
/// assert!(reason.is_some_and(|r| r.is::<std::num::ParseIntError>()));
/// ```
#[derive(Error, Debug, Clone)]
pub enum ResourceError {
    /// The producer returned an error.
    #[error("{message}")]
    Producer {
        /// The error message, shown verbatim.
        message: String,
        /// The error value the producer failed with, if it was more than a message.
        #[source]
        source: Option<BoxedSource>,
    },

    /// The producer failed without an error value (it panicked).
    #[error("Unknown error")]
    Unknown,
}

impl ResourceError {
    /// Creates a producer error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self::Producer {
            message: message.into(),
            source: None,
        }
    }

    /// Coerces any error value into a producer error, keeping its message and
    /// the value itself as the source.
    pub fn from_error<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::from_source(Arc::new(err))
    }

    fn from_source(source: BoxedSource) -> Self {
        Self::Producer {
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Returns the error value the producer failed with, if any.
    ///
    /// Unlike [`source`](std::error::Error::source) this exposes the original
    /// type, so callers can downcast it.
    #[must_use]
    pub fn reason(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            Self::Producer { source, .. } => source.as_deref(),
            Self::Unknown => None,
        }
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Producer { message, .. } => message,
            Self::Unknown => UNKNOWN_ERROR_MESSAGE,
        }
    }

    /// Coerces a panic payload caught from a producer.
    ///
    /// The payload is not an error value, so the result is always
    /// [`ResourceError::Unknown`]; the payload text is only logged.
    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned());
        tracing::warn!(panic = ?detail, "producer panicked");
        Self::Unknown
    }
}

impl PartialEq for ResourceError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Producer { message: a, .. }, Self::Producer { message: b, .. }) => a == b,
            (Self::Unknown, Self::Unknown) => true,
            _ => false,
        }
    }
}

impl Eq for ResourceError {}

impl From<String> for ResourceError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ResourceError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<Box<dyn StdError + Send + Sync>> for ResourceError {
    fn from(err: Box<dyn StdError + Send + Sync>) -> Self {
        Self::from_source(Arc::from(err))
    }
}

impl From<std::io::Error> for ResourceError {
    fn from(err: std::io::Error) -> Self {
        Self::from_error(err)
    }
}

impl From<std::fmt::Error> for ResourceError {
    fn from(err: std::fmt::Error) -> Self {
        Self::from_error(err)
    }
}
