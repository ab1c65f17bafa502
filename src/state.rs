//! Loading/data/error state shared by queries and mutations.

use crate::error::ResourceError;

/// Lifecycle phase derived from a [`ResourceState`].
///
/// `Success` and `Failure` are not terminal: a refetch, poll tick, dependency
/// change or new `mutate` call moves the resource back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Nothing has been requested yet (or the query is skipped without data).
    Idle,
    /// A producer call is in flight.
    Pending,
    /// The latest producer call succeeded.
    Success,
    /// The latest producer call failed.
    Failure,
}

/// The observable state of a query or mutation resource.
///
/// On failure `data` keeps its previous value, so a consumer can keep showing
/// stale data next to the error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceState<T> {
    /// The result of the latest successful producer call.
    pub data: Option<T>,
    /// Whether a producer call is in flight.
    pub loading: bool,
    /// The error of the latest failed producer call, cleared when a new call starts.
    pub error: Option<ResourceError>,
}

impl<T> ResourceState<T> {
    /// State of a resource that has not started anything.
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }

    /// State of a resource whose first producer call is in flight.
    #[must_use]
    pub const fn pending() -> Self {
        Self {
            data: None,
            loading: true,
            error: None,
        }
    }

    /// Returns the current lifecycle phase.
    pub const fn status(&self) -> Status {
        if self.loading {
            Status::Pending
        } else if self.error.is_some() {
            Status::Failure
        } else if self.data.is_some() {
            Status::Success
        } else {
            Status::Idle
        }
    }

    /// Returns the data if any producer call has succeeded.
    pub const fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    /// Returns the error of the latest failed call.
    pub const fn error(&self) -> Option<&ResourceError> {
        self.error.as_ref()
    }

    /// Returns `true` if a producer call is in flight.
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    /// Returns `true` if the latest call succeeded.
    pub const fn is_success(&self) -> bool {
        matches!(self.status(), Status::Success)
    }

    /// Returns `true` if the latest call failed.
    pub const fn is_error(&self) -> bool {
        matches!(self.status(), Status::Failure)
    }

    pub(crate) fn begin(&mut self) {
        self.loading = true;
        self.error = None;
    }

    pub(crate) fn settle(&mut self, outcome: Result<T, ResourceError>) {
        match outcome {
            Ok(data) => {
                self.data = Some(data);
                self.error = None;
            }
            Err(err) => self.error = Some(err),
        }
        self.loading = false;
    }
}

impl<T> Default for ResourceState<T> {
    fn default() -> Self {
        Self::idle()
    }
}
