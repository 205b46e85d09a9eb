//! Rooms and customers.
//!
//! A [`RoomId`] names one unique filter on one collection: every subscriber
//! with a structurally equivalent filter lands in the same room, which is
//! what lets one matching pass notify any number of clients. The registry
//! tracks room membership in both directions (room to customers, customer
//! to rooms) so a dropped connection can be cleaned up without scanning.
//!
//! The registry only manages membership; pairing each join/leave with the
//! filter index's reference counting is the engine's job.

use std::fmt;

use fxhash::{FxHashMap, FxHashSet};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use sift_core::{CollectionPath, FilterId};

use crate::error::SubscriptionError;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Opaque identifier of a connected client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CustomerId(String);

impl CustomerId {
    /// Wraps a connection identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CustomerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for CustomerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deterministic identifier of a room.
///
/// Derived from the collection path and the filter's canonical content key,
/// so the same normalized filter always maps to the same room, on any
/// engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RoomId(String);

impl RoomId {
    pub(crate) fn derive(path: &CollectionPath, filter_key: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(path.index.as_bytes());
        hasher.update([0u8]);
        hasher.update(path.collection.as_bytes());
        hasher.update([0u8]);
        hasher.update(filter_key.as_bytes());
        let digest = hasher.finalize();

        let mut id = String::with_capacity(32);
        for byte in &digest[..16] {
            id.push_str(&format!("{byte:02x}"));
        }
        Self(id)
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Room {
    path: CollectionPath,
    filter: FilterId,
    customers: FxHashSet<CustomerId>,
}

/// What one customer leaving one room changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomExit {
    /// Room the customer left.
    pub room: RoomId,
    /// Filter backing the room.
    pub filter: FilterId,
    /// Whether the room died with this exit.
    pub removed: bool,
    /// Subscribers remaining in the room.
    pub remaining: usize,
}

/// Two-way membership index between rooms and customers.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    rooms: FxHashMap<RoomId, Room>,
    customers: FxHashMap<CustomerId, FxHashSet<RoomId>>,
    rooms_by_filter: FxHashMap<FilterId, RoomId>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the customer is currently subscribed to the room.
    #[must_use]
    pub fn is_member(&self, room: &RoomId, customer: &CustomerId) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|entry| entry.customers.contains(customer))
    }

    /// Whether the room currently exists.
    #[must_use]
    pub fn contains_room(&self, room: &RoomId) -> bool {
        self.rooms.contains_key(room)
    }

    /// Adds a customer to a room, creating the room on first join.
    ///
    /// Returns `true` when this call created the room. Duplicate membership
    /// is the engine's concern and must be checked before calling.
    pub fn join(
        &mut self,
        customer: CustomerId,
        room: RoomId,
        path: CollectionPath,
        filter: FilterId,
    ) -> bool {
        let created = !self.rooms.contains_key(&room);
        if created {
            debug!(room = %room, path = %path, filter = %filter, "room created");
        }
        let entry = self.rooms.entry(room.clone()).or_insert_with(|| Room {
            path,
            filter,
            customers: FxHashSet::default(),
        });
        entry.customers.insert(customer.clone());
        self.rooms_by_filter.insert(filter, room.clone());
        self.customers.entry(customer).or_default().insert(room);
        created
    }

    /// Removes a customer from a room, dropping the room with its last
    /// subscriber.
    ///
    /// # Errors
    ///
    /// [`SubscriptionError::RoomNotFound`] if the room does not exist,
    /// [`SubscriptionError::SubscriptionNotFound`] if the customer is not
    /// in it.
    pub fn leave(
        &mut self,
        customer: &CustomerId,
        room: &RoomId,
    ) -> Result<RoomExit, SubscriptionError> {
        let entry = self
            .rooms
            .get_mut(room)
            .ok_or_else(|| SubscriptionError::RoomNotFound(room.clone()))?;
        if !entry.customers.remove(customer) {
            return Err(SubscriptionError::SubscriptionNotFound {
                customer: customer.clone(),
                room: room.clone(),
            });
        }
        let remaining = entry.customers.len();
        let filter = entry.filter;

        if let Some(rooms) = self.customers.get_mut(customer) {
            rooms.remove(room);
            if rooms.is_empty() {
                self.customers.remove(customer);
            }
        }
        let removed = remaining == 0;
        if removed {
            self.rooms.remove(room);
            self.rooms_by_filter.remove(&filter);
            debug!(room = %room, "room removed");
        }
        Ok(RoomExit { room: room.clone(), filter, removed, remaining })
    }

    /// Removes a customer from every room at once.
    ///
    /// Unknown customers yield an empty list; disconnect cleanup is
    /// idempotent. Exits are reported in room id order.
    pub fn remove_customer(&mut self, customer: &CustomerId) -> Vec<RoomExit> {
        let Some(rooms) = self.customers.remove(customer) else {
            return Vec::new();
        };
        let mut exits = Vec::with_capacity(rooms.len());
        for room in rooms {
            let Some(entry) = self.rooms.get_mut(&room) else {
                continue;
            };
            entry.customers.remove(customer);
            let remaining = entry.customers.len();
            let filter = entry.filter;
            let removed = remaining == 0;
            if removed {
                self.rooms.remove(&room);
                self.rooms_by_filter.remove(&filter);
                debug!(room = %room, "room removed");
            }
            exits.push(RoomExit { room, filter, removed, remaining });
        }
        exits.sort_by(|a, b| a.room.cmp(&b.room));
        exits
    }

    /// Number of subscribers in a room.
    ///
    /// # Errors
    ///
    /// [`SubscriptionError::RoomNotFound`] if the room does not exist.
    pub fn count(&self, room: &RoomId) -> Result<usize, SubscriptionError> {
        self.rooms
            .get(room)
            .map(|entry| entry.customers.len())
            .ok_or_else(|| SubscriptionError::RoomNotFound(room.clone()))
    }

    /// The filter backing a room.
    #[must_use]
    pub fn room_filter(&self, room: &RoomId) -> Option<FilterId> {
        self.rooms.get(room).map(|entry| entry.filter)
    }

    /// The collection a room is scoped to.
    #[must_use]
    pub fn room_path(&self, room: &RoomId) -> Option<&CollectionPath> {
        self.rooms.get(room).map(|entry| &entry.path)
    }

    /// Resolves filter ids to their rooms, keeping the input order.
    #[must_use]
    pub fn rooms_for_filters(&self, filters: &[FilterId]) -> Vec<RoomId> {
        filters
            .iter()
            .filter_map(|filter| self.rooms_by_filter.get(filter).cloned())
            .collect()
    }

    /// Rooms a customer is subscribed to, in room id order.
    #[must_use]
    pub fn customer_rooms(&self, customer: &CustomerId) -> Vec<RoomId> {
        let mut rooms: Vec<RoomId> = self
            .customers
            .get(customer)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default();
        rooms.sort();
        rooms
    }

    /// Number of active rooms.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of customers holding at least one subscription.
    #[must_use]
    pub fn customer_count(&self) -> usize {
        self.customers.len()
    }

    /// Whether no room and no customer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty() && self.customers.is_empty()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
