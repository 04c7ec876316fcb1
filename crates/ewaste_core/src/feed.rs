//! Realtime change notifications.
//!
//! Events carry no record data. A subscriber that hears about a change to a
//! collection throws away what it holds and reloads the full list, so a
//! dropped or reordered event can never leave it showing a half-patched row.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::ports::ChangeFeed;

const FEED_CAPACITY: usize = 256;

/// A persisted collection that clients can watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    OfflineSessions,
    AdminUsers,
    CollectionRequests,
    DumpingReports,
    MarketplaceListings,
    EWasteItems,
    ChatConversations,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::OfflineSessions => "offline_sessions",
            Collection::AdminUsers => "admin_users",
            Collection::CollectionRequests => "collection_requests",
            Collection::DumpingReports => "dumping_reports",
            Collection::MarketplaceListings => "marketplace_listings",
            Collection::EWasteItems => "e_waste_items",
            Collection::ChatConversations => "chat_conversations",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub owner_id: Uuid,
    pub record_id: Uuid,
}

/// What a subscriber must reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidated {
    One(Collection),
    /// Events were missed; every watched collection is suspect.
    All,
}

/// One owner's view of the feed. Dropping it unsubscribes.
pub struct Subscription {
    receiver: broadcast::Receiver<ChangeEvent>,
    owner_id: Uuid,
    watched: HashSet<Collection>,
}

impl Subscription {
    pub fn new(receiver: broadcast::Receiver<ChangeEvent>, owner_id: Uuid) -> Self {
        Self {
            receiver,
            owner_id,
            watched: HashSet::new(),
        }
    }

    pub fn watch(&mut self, collection: Collection) {
        self.watched.insert(collection);
    }

    pub fn unwatch(&mut self, collection: Collection) {
        self.watched.remove(&collection);
    }

    pub fn is_watching(&self, collection: Collection) -> bool {
        self.watched.contains(&collection)
    }

    pub fn watched(&self) -> impl Iterator<Item = Collection> + '_ {
        self.watched.iter().copied()
    }

    fn matches(&self, event: &ChangeEvent) -> bool {
        event.owner_id == self.owner_id && self.watched.contains(&event.collection)
    }

    /// Waits for the next relevant change. `None` once the feed is gone.
    ///
    /// Cancel-safe: dropping the future loses no relevant event.
    pub async fn next_invalidation(&mut self) -> Option<Invalidated> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.matches(&event) => {
                    return Some(Invalidated::One(event.collection));
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Subscription for {} lagged by {} events", self.owner_id, skipped);
                    if !self.watched.is_empty() {
                        return Some(Invalidated::All);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// In-process fan-out of change events.
#[derive(Clone)]
pub struct BroadcastFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl BroadcastFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        Self { sender }
    }
}

impl Default for BroadcastFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed for BroadcastFeed {
    fn publish(&self, collection: Collection, owner_id: Uuid, record_id: Uuid) {
        let event = ChangeEvent {
            collection,
            owner_id,
            record_id,
        };
        // No receivers is the normal idle case.
        if self.sender.send(event).is_err() {
            debug!("No subscribers for {} change", collection.as_str());
        }
    }

    fn subscribe(&self, owner_id: Uuid) -> Subscription {
        Subscription::new(self.sender.subscribe(), owner_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn only_watched_collections_of_the_owner_are_delivered() {
        let feed = BroadcastFeed::new();
        let owner = Uuid::new_v4();
        let mut subscription = feed.subscribe_to(Collection::CollectionRequests, owner);

        feed.publish(Collection::CollectionRequests, Uuid::new_v4(), Uuid::new_v4());
        feed.publish(Collection::DumpingReports, owner, Uuid::new_v4());
        feed.publish(Collection::CollectionRequests, owner, Uuid::new_v4());

        assert_eq!(
            subscription.next_invalidation().await,
            Some(Invalidated::One(Collection::CollectionRequests))
        );
    }

    #[tokio::test]
    async fn unwatching_stops_delivery() {
        let feed = BroadcastFeed::new();
        let owner = Uuid::new_v4();
        let mut subscription = feed.subscribe_to(Collection::DumpingReports, owner);
        subscription.unwatch(Collection::DumpingReports);

        feed.publish(Collection::DumpingReports, owner, Uuid::new_v4());
        let waited =
            tokio::time::timeout(Duration::from_millis(50), subscription.next_invalidation()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn lagging_subscribers_reload_everything() {
        let feed = BroadcastFeed::new();
        let owner = Uuid::new_v4();
        let mut subscription = feed.subscribe_to(Collection::MarketplaceListings, owner);

        for _ in 0..(FEED_CAPACITY + 10) {
            feed.publish(Collection::MarketplaceListings, owner, Uuid::new_v4());
        }
        assert_eq!(subscription.next_invalidation().await, Some(Invalidated::All));
    }

    #[tokio::test]
    async fn closed_feed_ends_the_subscription() {
        let feed = BroadcastFeed::new();
        let mut subscription = feed.subscribe(Uuid::new_v4());
        drop(feed);
        assert_eq!(subscription.next_invalidation().await, None);
    }
}
