//! Notification payloads delivered to subscribers.
//!
//! The engine itself only computes which rooms a document or membership
//! change concerns; hosts serialize these payloads onto whatever transport
//! they run (websocket, MQTT, server-sent events).

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;

use sift_core::CollectionPath;

use crate::registry::RoomId;

// ---------------------------------------------------------------------------
// Building blocks
// ---------------------------------------------------------------------------

/// Whether the event enters or leaves the subscriber's scope.
///
/// A document update can produce both directions at once: `In` for rooms
/// the new version matches, `Out` for rooms only the previous version did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationScope {
    /// The document now matches the room's filter.
    In,
    /// The document no longer matches the room's filter.
    Out,
}

/// What happened to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentAction {
    /// A new document was stored.
    Create,
    /// An existing document was fully replaced.
    Replace,
    /// An existing document was partially updated.
    Update,
    /// A document was removed.
    Delete,
    /// A transient message was published without being stored.
    Publish,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|elapsed| u64::try_from(elapsed.as_millis()).ok())
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// A document change fanned out to the rooms it concerns.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentNotification {
    /// Direction of the change relative to the rooms' filters.
    pub scope: NotificationScope,
    /// Operation that triggered the notification.
    pub action: DocumentAction,
    /// Index the document lives in.
    pub index: String,
    /// Collection the document lives in.
    pub collection: String,
    /// Rooms whose subscribers must be notified.
    pub rooms: Vec<RoomId>,
    /// Storage identifier of the document, when it has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    /// Document body, when the host chooses to embed it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    /// Milliseconds since the Unix epoch at payload creation.
    pub timestamp_ms: u64,
}

impl DocumentNotification {
    /// Builds a payload for an arbitrary scope and action.
    #[must_use]
    pub fn new(
        scope: NotificationScope,
        action: DocumentAction,
        path: &CollectionPath,
        rooms: Vec<RoomId>,
    ) -> Self {
        Self {
            scope,
            action,
            index: path.index.clone(),
            collection: path.collection.clone(),
            rooms,
            document_id: None,
            content: None,
            timestamp_ms: now_ms(),
        }
    }

    /// Payload for a freshly stored document entering the given rooms.
    #[must_use]
    pub fn created(path: &CollectionPath, rooms: Vec<RoomId>) -> Self {
        Self::new(NotificationScope::In, DocumentAction::Create, path, rooms)
    }

    /// Payload for a deleted document leaving the given rooms.
    #[must_use]
    pub fn deleted(path: &CollectionPath, rooms: Vec<RoomId>) -> Self {
        Self::new(NotificationScope::Out, DocumentAction::Delete, path, rooms)
    }

    /// Payload for a transient message reaching the given rooms.
    #[must_use]
    pub fn published(path: &CollectionPath, rooms: Vec<RoomId>) -> Self {
        Self::new(NotificationScope::In, DocumentAction::Publish, path, rooms)
    }

    /// Attaches the document's id and body.
    #[must_use]
    pub fn with_document(mut self, id: impl Into<String>, content: Value) -> Self {
        self.document_id = Some(id.into());
        self.content = Some(content);
        self
    }
}

/// A membership change on one room.
#[derive(Debug, Clone, Serialize)]
pub struct UserNotification {
    /// `In` for a join, `Out` for a leave.
    pub scope: NotificationScope,
    /// Room whose membership changed.
    pub room: RoomId,
    /// Subscribers in the room after the change.
    pub subscriber_count: usize,
    /// Milliseconds since the Unix epoch at payload creation.
    pub timestamp_ms: u64,
}

impl UserNotification {
    /// Payload for a customer joining a room.
    #[must_use]
    pub fn joined(room: RoomId, subscriber_count: usize) -> Self {
        Self { scope: NotificationScope::In, room, subscriber_count, timestamp_ms: now_ms() }
    }

    /// Payload for a customer leaving a room.
    #[must_use]
    pub fn left(room: RoomId, subscriber_count: usize) -> Self {
        Self { scope: NotificationScope::Out, room, subscriber_count, timestamp_ms: now_ms() }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
