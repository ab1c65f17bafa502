//! Timer subscription for periodic events.
//!
//! [`Timer`] drives query polling and can also be subscribed to directly by an
//! application that wants its own periodic messages.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::Duration;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::time::MissedTickBehavior;
use tokio::time::interval;
use tokio_stream::wrappers::IntervalStream;

use super::{SubscriptionId, SubscriptionSource};

/// Messages produced by the [`Timer`] subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A timer tick has occurred.
    Tick,
}

/// A timer subscription that emits tick messages at a fixed period.
///
/// The first tick arrives one full period after the stream is created, and
/// missed ticks are skipped rather than replayed (`MissedTickBehavior::Skip`).
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use tears_query::subscription::{Subscription, time::Timer};
///
/// enum AppMessage {
///     Refresh,
/// }
///
/// let sub = Subscription::new(Timer::new(Duration::from_secs(30)))
///     .map(|_| AppMessage::Refresh);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timer {
    period: Duration,
}

impl Timer {
    /// Create a new timer with the given period.
    ///
    /// A zero period never ticks: its stream ends immediately, matching how a
    /// zero poll interval disables polling.
    #[must_use]
    pub const fn new(period: Duration) -> Self {
        Self { period }
    }

    /// Create a new timer with a period in milliseconds.
    #[must_use]
    pub const fn from_millis(period_ms: u64) -> Self {
        Self::new(Duration::from_millis(period_ms))
    }

    /// The period between ticks.
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }
}

impl SubscriptionSource for Timer {
    type Output = Message;

    fn stream(&self) -> BoxStream<'static, Message> {
        if self.period.is_zero() {
            return futures::stream::empty().boxed();
        }

        let mut interval = interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        IntervalStream::new(interval)
            .skip(1) // Skip the first immediate tick
            .map(|_| Message::Tick)
            .boxed()
    }

    fn id(&self) -> SubscriptionId {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        SubscriptionId::of::<Self>(hasher.finish())
    }
}

impl Hash for Timer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.period.hash(state);
    }
}
