//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the client and the API server
//! for realtime invalidations and the offline countdown.

use ewaste_core::feed::Collection;
use serde::{Deserialize, Serialize};

//=========================================================================================
// Messages Sent FROM the Client TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start receiving `invalidate` frames for one of the caller's collections.
    Subscribe { collection: Collection },

    Unsubscribe { collection: Collection },

    /// Re-read the caller's offline session and restart the countdown from it.
    StartCountdown,

    /// Stop sending ticks. The offline session itself keeps running.
    StopCountdown,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Subscribed { collection: Collection },

    Unsubscribed { collection: Collection },

    /// Something in `collection` changed; the client should reload the whole list.
    Invalidate { collection: Collection },

    /// Changes were missed; reload everything subscribed.
    InvalidateAll,

    /// Sent once per second while offline mode runs.
    OfflineTick { remaining_seconds: u32, display: String },

    /// The offline window closed, by expiry or an explicit end on any device.
    OfflineEnded,

    /// Reports a problem with the last client message.
    Error { message: String },
}
