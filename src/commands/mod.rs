// UI command handlers

pub mod chat;
pub mod settings;

pub use chat::*;
pub use settings::*;

use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;
use crate::services::config::ChatSyncConfig;
use crate::state::AppState;

/// A UI intent as it arrives over the driver's line protocol,
/// e.g. `{"type": "send", "conversationId": "c1", "body": "hi"}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum UiCommand {
    Open {
        conversation_id: String,
    },
    Close {
        conversation_id: String,
    },
    ScrolledToTop {
        conversation_id: String,
    },
    ToggleControls {
        conversation_id: String,
        message_id: String,
    },
    Send {
        conversation_id: String,
        body: String,
    },
    Edit {
        conversation_id: String,
        message_id: String,
        new_body: String,
    },
    DeleteMessage {
        conversation_id: String,
        message_id: String,
    },
    CreateConversation {
        name: String,
        #[serde(default)]
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
    Snapshot {
        conversation_id: String,
    },
    Conversations,
    Status,
    GetConfig,
    SaveConfig {
        config: ChatSyncConfig,
    },
}

/// Run one command against the shared state. The reply is whatever the
/// command returns, serialized (`null` for unit).
pub async fn dispatch(state: &AppState, command: UiCommand) -> Result<Value> {
    let reply = match command {
        UiCommand::Open { conversation_id } => {
            serde_json::to_value(open_conversation(state, conversation_id).await?)?
        }
        UiCommand::Close { conversation_id } => {
            serde_json::to_value(close_conversation(state, conversation_id).await?)?
        }
        UiCommand::ScrolledToTop { conversation_id } => {
            serde_json::to_value(scrolled_to_top(state, conversation_id).await?)?
        }
        UiCommand::ToggleControls {
            conversation_id,
            message_id,
        } => serde_json::to_value(
            toggle_message_controls(state, conversation_id, message_id).await?,
        )?,
        UiCommand::Send {
            conversation_id,
            body,
        } => serde_json::to_value(send_message(state, conversation_id, body).await?)?,
        UiCommand::Edit {
            conversation_id,
            message_id,
            new_body,
        } => serde_json::to_value(
            edit_message(state, conversation_id, message_id, new_body).await?,
        )?,
        UiCommand::DeleteMessage {
            conversation_id,
            message_id,
        } => serde_json::to_value(delete_message(state, conversation_id, message_id).await?)?,
        UiCommand::CreateConversation { name, member_ids } => {
            serde_json::to_value(create_conversation(state, name, member_ids).await?)?
        }
        UiCommand::RenameConversation {
            conversation_id,
            new_name,
        } => serde_json::to_value(rename_conversation(state, conversation_id, new_name).await?)?,
        UiCommand::DeleteConversation { conversation_id } => {
            serde_json::to_value(delete_conversation(state, conversation_id).await?)?
        }
        UiCommand::AddMembers {
            conversation_id,
            member_ids,
        } => serde_json::to_value(add_members(state, conversation_id, member_ids).await?)?,
        UiCommand::RemoveMembers {
            conversation_id,
            member_ids,
        } => serde_json::to_value(remove_members(state, conversation_id, member_ids).await?)?,
        UiCommand::Snapshot { conversation_id } => {
            serde_json::to_value(get_conversation_snapshot(state, conversation_id).await?)?
        }
        UiCommand::Conversations => serde_json::to_value(get_conversations(state).await?)?,
        UiCommand::Status => serde_json::to_value(get_channel_status(state).await?)?,
        UiCommand::GetConfig => serde_json::to_value(get_config(state).await?)?,
        UiCommand::SaveConfig { config } => serde_json::to_value(save_config(state, config).await?)?,
    };
    Ok(reply)
}
