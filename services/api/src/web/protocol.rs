//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the dispatch client and the API
//! server. Every server message carries a complete snapshot, never a delta.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::web::dto::{ChatMessageResponse, ReturnIncidentResponse, RosterEntryResponse};

//=========================================================================================
// Messages Sent FROM the Client TO the Server
//=========================================================================================

#[derive(Deserialize, Serialize, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Live roster of the caller's company, merged with pending returns.
    SubscribeRoster,

    /// Live return incidents of the caller's company.
    SubscribeReturns,

    /// Live messages of one chat the caller belongs to.
    SubscribeChat { chat_id: Uuid },

    /// Stops every active subscription on this connection.
    Unsubscribe,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client
//=========================================================================================

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    RosterSnapshot {
        entries: Vec<RosterEntryResponse>,
        checked_in_count: usize,
    },

    ReturnsSnapshot {
        incidents: Vec<ReturnIncidentResponse>,
    },

    ChatSnapshot {
        chat_id: Uuid,
        messages: Vec<ChatMessageResponse>,
    },

    /// A subscription failed; the client should alert the user. Nothing is retried.
    Error { message: String },
}
