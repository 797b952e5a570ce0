use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ChatSyncError, Result};

// ── Stored types ───────────────────────────────────────────────

/// A single chat message as held in a conversation.
///
/// `id` is assigned by the remote service and stays stable across edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(alias = "messageId")]
    pub id: String,
    #[serde(alias = "senderId")]
    pub author_id: String,
    #[serde(alias = "content")]
    pub body: String,
    pub sent_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
}

/// Summary of a conversation for the sidebar listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub conversation_id: String,
    pub name: String,
    pub member_ids: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Whether a conversation's messages reflect the latest confirmed page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Freshness {
    Current,
    /// Restored from the retained cache; waiting for the initial page.
    Revalidating,
}

/// Health of the underlying event channel, as seen by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "state", content = "reason")]
pub enum ChannelStatus {
    Connected,
    Unavailable(String),
}

// ── Wire protocol types (inbound) ──────────────────────────────

/// How a batch reached the client, taken from the event name it came in on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BatchSource {
    /// Pushed to every member (send confirmation, broadcast).
    Live,
    /// Addressed to this client in answer to a fetch-history request.
    FetchResponse,
    /// The event name does not say; correlation falls back to page and
    /// page size.
    #[default]
    Unspecified,
}

/// A page of messages, sent both as fetch-history responses and as
/// send confirmations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBatch {
    #[serde(alias = "chatId")]
    pub conversation_id: String,
    pub page: u32,
    #[serde(alias = "limit")]
    pub page_size: u32,
    pub total: u32,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(skip)]
    pub source: BatchSource,
}

impl MessageBatch {
    pub fn is_historical(&self) -> bool {
        self.page > 1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEdited {
    #[serde(alias = "chatId")]
    pub conversation_id: String,
    pub message_id: String,
    #[serde(alias = "newContent")]
    pub new_body: String,
    pub edited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDeleted {
    #[serde(alias = "chatId")]
    pub conversation_id: String,
    pub message_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationCreated {
    #[serde(alias = "chatId")]
    pub conversation_id: String,
    #[serde(alias = "groupName")]
    pub name: String,
    #[serde(default, alias = "users")]
    pub member_ids: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRenamed {
    #[serde(alias = "chatId")]
    pub conversation_id: String,
    #[serde(alias = "newGroupName")]
    pub new_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDeleted {
    #[serde(alias = "chatId")]
    pub conversation_id: String,
    #[serde(alias = "deleted")]
    pub success: bool,
}

/// Confirmation for both add-members and remove-members.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembersChanged {
    #[serde(alias = "chatId")]
    pub conversation_id: String,
    #[serde(alias = "userIds")]
    pub member_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerError {
    pub error: String,
}

// ── Wire protocol types (outbound) ─────────────────────────────

/// An outbound intent. Every variant is confirmed by exactly one inbound
/// event; none of them mutates local state when submitted.
///
/// Serializes to the frame shape: `{"event": "<kebab-name>", "payload": {..}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "payload",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum OutboundIntent {
    CreateConversation {
        name: String,
        member_ids: Vec<String>,
    },
    RenameConversation {
        conversation_id: String,
        new_name: String,
    },
    DeleteConversation {
        conversation_id: String,
    },
    AddMembers {
        conversation_id: String,
        member_ids: Vec<String>,
    },
    RemoveMembers {
        conversation_id: String,
        member_ids: Vec<String>,
    },
    SendMessage {
        conversation_id: String,
        sender_id: String,
        body: String,
    },
    EditMessage {
        conversation_id: String,
        message_id: String,
        new_body: String,
    },
    DeleteMessage {
        conversation_id: String,
        message_id: String,
    },
    FetchHistory {
        conversation_id: String,
        page: u32,
        page_size: u32,
    },
}

impl OutboundIntent {
    /// The conversation this intent is correlated to, if any.
    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            OutboundIntent::CreateConversation { .. } => None,
            OutboundIntent::RenameConversation {
                conversation_id, ..
            }
            | OutboundIntent::DeleteConversation { conversation_id }
            | OutboundIntent::AddMembers {
                conversation_id, ..
            }
            | OutboundIntent::RemoveMembers {
                conversation_id, ..
            }
            | OutboundIntent::SendMessage {
                conversation_id, ..
            }
            | OutboundIntent::EditMessage {
                conversation_id, ..
            }
            | OutboundIntent::DeleteMessage {
                conversation_id, ..
            }
            | OutboundIntent::FetchHistory {
                conversation_id, ..
            } => Some(conversation_id),
        }
    }
}

/// A raw channel frame: event name plus JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelFrame {
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl TryFrom<&OutboundIntent> for ChannelFrame {
    type Error = ChatSyncError;

    fn try_from(intent: &OutboundIntent) -> Result<Self> {
        Ok(serde_json::from_value(serde_json::to_value(intent)?)?)
    }
}

// ── UI notifications ───────────────────────────────────────────

/// Notifications emitted towards the (external) rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", rename_all_fields = "camelCase")]
pub enum UiEvent {
    MessagesChanged {
        conversation_id: String,
        message_count: usize,
        has_more_older: bool,
    },
    DirectoryChanged {
        conversation_count: usize,
    },
    ConversationClosed {
        conversation_id: String,
    },
    ChannelStatusChanged {
        status: ChannelStatus,
    },
    ServerError {
        error: String,
    },
}
