//! Engine error types.

use crate::registry::{CustomerId, RoomId};

/// Convenience alias for engine results.
pub type Result<T> = std::result::Result<T, SubscriptionError>;

/// Errors raised by subscription management and matching.
#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    /// The customer already holds this exact subscription.
    #[error("customer {customer} is already subscribed to room {room}")]
    DuplicateSubscription {
        /// Customer that attempted the duplicate subscription.
        customer: CustomerId,
        /// Room the customer is already in.
        room: RoomId,
    },

    /// No room with this identifier exists.
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    /// The customer is not subscribed to the room.
    #[error("customer {customer} has no subscription to room {room}")]
    SubscriptionNotFound {
        /// Customer that was expected in the room.
        customer: CustomerId,
        /// Room the customer is not in.
        room: RoomId,
    },

    /// Creating another room would exceed the configured cap.
    #[error("room limit of {limit} reached")]
    RoomLimitExceeded {
        /// Configured maximum number of concurrent rooms.
        limit: usize,
    },

    /// The subscription filter failed to compile.
    #[error("invalid filter: {0}")]
    Filter(#[from] sift_core::FilterError),

    /// The filter index rejected the operation.
    #[error("index error: {0}")]
    Index(#[from] sift_core::IndexError),
}
