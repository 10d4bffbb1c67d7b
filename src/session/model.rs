//! Session events and wire types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conversation::{ConversationState, Message, NotificationLevel, QuoteContext};

/// Read-only view of a session for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub generation: u64,
    pub created_at: DateTime<Utc>,
    pub state: ConversationState,
    pub quote: QuoteContext,
    /// Option labels of the current stage.
    pub options: Vec<String>,
}

/// Events fanned out to every subscriber of a session.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Full state (sent on connect and after a subscriber lags).
    Sync { snapshot: SessionSnapshot },
    /// A new message, including typing placeholders.
    MessageAppended { message: Message },
    /// A placeholder was resolved.
    MessageUpdated { message: Message },
    StageChanged {
        stage_id: String,
        options: Vec<String>,
    },
    QuoteUpdated { quote: QuoteContext },
    Notification {
        level: NotificationLevel,
        message: String,
    },
    /// The session was reset; everything before this is stale.
    Reset { generation: u64 },
}

/// Actions a client can send over the WebSocket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientAction {
    Message { text: String },
    #[serde(rename = "option")]
    SelectOption { label: String },
    Reset,
}
