use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{DocumentSlot, Event};

/// An update to a row of the `events` table, as published on the change feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventChange {
    pub old: Event,
    pub new: Event,
}

/// Realtime feeds a session can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feed {
    /// Updates to the caller's own events; raises a notice when production
    /// uploads a new document.
    ClientDocuments,
    /// Updates to every event; raises a notice when a client signs a
    /// contract. Only delivered while the caller is an administrator.
    AdminContracts,
}

/// User-facing notice raised by the notification bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    DocumentAvailable {
        event_id: Uuid,
        event_name: String,
        slot: DocumentSlot,
    },
    ContractSigned {
        event_id: Uuid,
        event_name: String,
        actor: String,
    },
}

impl Notification {
    pub fn message(&self) -> String {
        match self {
            Self::DocumentAvailable {
                event_name, slot, ..
            } => format!("{} is now available for {}", slot.label(), event_name),
            Self::ContractSigned {
                event_name, actor, ..
            } => format!("{} uploaded a signed contract for {}", actor, event_name),
        }
    }
}

/// Events sent over the websocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, email: String },

    /// A feed subscription is live
    Subscribed { feed: Feed },

    /// A feed subscription was torn down
    Unsubscribed { feed: Feed },

    Notification(Notification),
}

/// Commands sent FROM client TO server over the websocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the connection (when no token was given on upgrade)
    Identify { token: String },

    Subscribe { feed: Feed },

    Unsubscribe { feed: Feed },
}
