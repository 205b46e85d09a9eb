//! Real-time content-based subscription engine for `Sift`.
//!
//! Ties the filter compiler and index from `sift-core` to a room registry:
//! clients subscribe with a JSON filter, equivalent filters collapse into a
//! shared room, and each published document resolves to the rooms whose
//! filters it satisfies.
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use sift_realtime::RealtimeEngine;
//!
//! let engine = RealtimeEngine::new();
//!
//! let room = engine.subscribe("client-1", "crm", "tickets", &json!({
//!     "and": [
//!         { "equals": { "status": "open" } },
//!         { "range": { "priority": { "gte": 3 } } }
//!     ]
//! }))?;
//!
//! let rooms = engine.matching_rooms("crm", "tickets", &json!({
//!     "status": "open",
//!     "priority": 4
//! }));
//! assert_eq!(rooms, vec![room]);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod engine;
mod error;
mod notification;
mod registry;

pub use config::EngineConfig;
pub use engine::{EngineMetrics, RealtimeEngine};
pub use error::{Result, SubscriptionError};
pub use notification::{
    DocumentAction, DocumentNotification, NotificationScope, UserNotification,
};
pub use registry::{CustomerId, RoomExit, RoomId, SubscriptionRegistry};

/// Re-export of the filter vocabulary hosts need next to the engine.
pub use sift_core::{CollectionPath, FilterError, FilterId, FlatDocument};
