//! In-process change feed backed by a tokio broadcast channel.

use futures::Stream;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use terrarium_domain::change::ChangeEvent;
use terrarium_domain::entity::EntityKind;
use terrarium_domain::error::SubscriptionLagged;
use terrarium_domain::query::Predicate;

/// Fan-out of committed writes to any number of subscribers.
///
/// The channel is bounded: a subscriber that falls more than `capacity`
/// events behind skips ahead and is told how many events it missed.
/// Publishing succeeds even when there are no active subscribers
/// (the event is simply dropped).
#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    /// Create a new feed with the given channel capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Notify subscribers of a committed write.
    pub fn publish(&self, event: ChangeEvent) {
        // send only fails when nobody is subscribed
        let _ = self.sender.send(event);
    }

    /// Subscribe to changes of `kind` whose entity matches `predicate`.
    ///
    /// Only events published *after* the subscription is created are seen.
    pub fn subscribe(
        &self,
        kind: EntityKind,
        predicate: Predicate,
    ) -> impl Stream<Item = Result<ChangeEvent, SubscriptionLagged>> + Send + 'static {
        BroadcastStream::new(self.sender.subscribe()).filter_map(move |item| match item {
            Ok(event) if event.entity_kind() == kind && predicate.matches(&event.entity) => {
                Some(Ok(event))
            }
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(%kind, skipped, "change subscriber lagged");
                Some(Err(SubscriptionLagged { skipped }))
            }
        })
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
