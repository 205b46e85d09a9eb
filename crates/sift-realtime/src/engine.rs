//! Subscription engine.
//!
//! [`RealtimeEngine`] binds the filter index to the room registry behind a
//! single lock, so every mutation keeps the two views consistent: one live
//! room per filter reference, one filter reference per live room. Matching
//! only takes the read side of the lock and can run from any number of
//! threads at once.

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use sift_core::{compile_with_limits, CollectionPath, FilterId, FilterIndex, FlatDocument};

use crate::config::EngineConfig;
use crate::error::{Result, SubscriptionError};
use crate::notification::{DocumentAction, DocumentNotification, NotificationScope};
use crate::registry::{CustomerId, RoomExit, RoomId, SubscriptionRegistry};

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct EngineState {
    index: FilterIndex,
    registry: SubscriptionRegistry,
}

/// Thread-safe subscription and matching engine.
///
/// Subscriptions with structurally equivalent filters share one room and
/// one stored filter; the room dies with its last subscriber and takes the
/// filter's index entries with it.
#[derive(Debug)]
pub struct RealtimeEngine {
    config: EngineConfig,
    state: RwLock<EngineState>,
}

impl Default for RealtimeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeEngine {
    /// Creates an engine with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates an engine with explicit limits.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            state: RwLock::new(EngineState {
                index: FilterIndex::new(),
                registry: SubscriptionRegistry::new(),
            }),
        }
    }

    /// The limits this engine was created with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Subscribes a customer to every future document matching `filter` in
    /// `index`/`collection`, returning the room that groups all customers
    /// with an equivalent filter.
    ///
    /// # Errors
    ///
    /// [`SubscriptionError::Filter`] when the filter body does not compile,
    /// [`SubscriptionError::DuplicateSubscription`] when the customer is
    /// already in the target room, [`SubscriptionError::RoomLimitExceeded`]
    /// when creating the room would pass the configured cap. A failed call
    /// changes nothing.
    pub fn subscribe(
        &self,
        customer: impl Into<CustomerId>,
        index: &str,
        collection: &str,
        filter: &Value,
    ) -> Result<RoomId> {
        let customer = customer.into();
        let normalized = compile_with_limits(filter, &self.config.compile_limits())?;
        let path = CollectionPath::new(index, collection);
        let room = RoomId::derive(&path, normalized.canonical_key());

        let mut state = self.state.write();
        if state.registry.is_member(&room, &customer) {
            return Err(SubscriptionError::DuplicateSubscription { customer, room });
        }
        if self.config.max_rooms != 0
            && !state.registry.contains_room(&room)
            && state.registry.room_count() >= self.config.max_rooms
        {
            return Err(SubscriptionError::RoomLimitExceeded { limit: self.config.max_rooms });
        }

        let outcome = state.index.add_filter(&path, &normalized);
        debug!(
            customer = %customer,
            room = %room,
            filter = %outcome.filter,
            created = outcome.created,
            "subscribed"
        );
        state.registry.join(customer, room.clone(), path, outcome.filter);
        Ok(room)
    }

    /// Removes one customer from one room, releasing the room's filter
    /// reference.
    ///
    /// # Errors
    ///
    /// [`SubscriptionError::RoomNotFound`] when the room does not exist,
    /// [`SubscriptionError::SubscriptionNotFound`] when the customer is not
    /// in it.
    pub fn unsubscribe(&self, customer: impl Into<CustomerId>, room: &RoomId) -> Result<RoomExit> {
        let customer = customer.into();
        let mut state = self.state.write();
        let exit = state.registry.leave(&customer, room)?;
        state.index.release_filter(exit.filter)?;
        debug!(customer = %customer, room = %room, removed = exit.removed, "unsubscribed");
        Ok(exit)
    }

    /// Drops every subscription a customer holds, in one pass.
    ///
    /// Returns the rooms the customer left, in room id order. Unknown
    /// customers yield an empty list, so disconnect handlers can call this
    /// unconditionally and repeatedly.
    pub fn remove_customer_from_all_rooms(&self, customer: impl Into<CustomerId>) -> Vec<RoomId> {
        let customer = customer.into();
        let mut state = self.state.write();
        let exits = state.registry.remove_customer(&customer);
        let mut rooms = Vec::with_capacity(exits.len());
        for exit in exits {
            if let Err(error) = state.index.release_filter(exit.filter) {
                warn!(%error, room = %exit.room, "no filter backing room during cleanup");
            }
            rooms.push(exit.room);
        }
        if !rooms.is_empty() {
            debug!(customer = %customer, rooms = rooms.len(), "customer disconnected");
        }
        rooms
    }

    /// Rooms whose filters match `document`, sorted by room id.
    ///
    /// This is the hot path: cost scales with the conditions the document's
    /// fields touch, not with the total number of rooms.
    #[must_use]
    pub fn matching_rooms(&self, index: &str, collection: &str, document: &Value) -> Vec<RoomId> {
        let path = CollectionPath::new(index, collection);
        let flat = FlatDocument::from_value(document);
        let state = self.state.read();
        let filters = state.index.evaluate(&path, &flat);
        let mut rooms = state.registry.rooms_for_filters(&filters);
        rooms.sort();
        rooms
    }

    /// Filter ids matching `document`, sorted.
    ///
    /// Lower-level form of [`RealtimeEngine::matching_rooms`] for hosts that
    /// track filters directly. Never fails; an empty list means no match.
    #[must_use]
    pub fn evaluate(&self, index: &str, collection: &str, document: &Value) -> Vec<FilterId> {
        let path = CollectionPath::new(index, collection);
        let flat = FlatDocument::from_value(document);
        self.state.read().index.evaluate(&path, &flat)
    }

    /// Matches `document` and packages the result for delivery.
    ///
    /// Returns `None` when no room matches, so hosts skip serialization and
    /// transport work for unwatched documents. `Delete` notifies with scope
    /// [`NotificationScope::Out`], every other action with
    /// [`NotificationScope::In`].
    #[must_use]
    pub fn notify_document(
        &self,
        action: DocumentAction,
        index: &str,
        collection: &str,
        document_id: &str,
        document: &Value,
    ) -> Option<DocumentNotification> {
        let rooms = self.matching_rooms(index, collection, document);
        if rooms.is_empty() {
            return None;
        }
        let scope = match action {
            DocumentAction::Delete => NotificationScope::Out,
            _ => NotificationScope::In,
        };
        let path = CollectionPath::new(index, collection);
        Some(
            DocumentNotification::new(scope, action, &path, rooms)
                .with_document(document_id, document.clone()),
        )
    }

    /// Number of subscribers currently in a room.
    ///
    /// # Errors
    ///
    /// [`SubscriptionError::RoomNotFound`] when the room does not exist.
    pub fn count_subscriptions(&self, room: &RoomId) -> Result<usize> {
        self.state.read().registry.count(room)
    }

    /// Collections that hold at least one live subscription, sorted.
    #[must_use]
    pub fn list_realtime_collections(&self) -> Vec<CollectionPath> {
        self.state.read().index.collections()
    }

    /// Rooms a customer is subscribed to, in room id order.
    #[must_use]
    pub fn customer_rooms(&self, customer: impl Into<CustomerId>) -> Vec<RoomId> {
        let customer = customer.into();
        self.state.read().registry.customer_rooms(&customer)
    }

    /// Point-in-time occupancy counters.
    #[must_use]
    pub fn metrics(&self) -> EngineMetrics {
        let state = self.state.read();
        EngineMetrics {
            rooms: state.registry.room_count(),
            customers: state.registry.customer_count(),
            filters: state.index.filter_count(),
            conditions: state.index.condition_count(),
            collections: state.index.collections().len(),
        }
    }
}

/// Occupancy counters reported by [`RealtimeEngine::metrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineMetrics {
    /// Active rooms.
    pub rooms: usize,
    /// Customers holding at least one subscription.
    pub customers: usize,
    /// Distinct filters stored in the index.
    pub filters: usize,
    /// Distinct leaf conditions stored in the index.
    pub conditions: usize,
    /// Collections with at least one filter.
    pub collections: usize,
}

// ===========================================================================
// Tests
// ===========================================================================
