use crate::error::{ChatSyncError, Result};
use crate::services::chat_message_store::ConversationSnapshot;
use crate::services::chat_types::*;
use crate::state::AppState;

// ── Navigation ────────────────────────────────────────────────

pub async fn open_conversation(state: &AppState, conversation_id: String) -> Result<()> {
    let mut chat = state.chat.write().await;
    chat.open_conversation(&conversation_id)
}

pub async fn close_conversation(state: &AppState, conversation_id: String) -> Result<()> {
    let mut chat = state.chat.write().await;
    chat.close_conversation(&conversation_id);
    Ok(())
}

pub async fn scrolled_to_top(state: &AppState, conversation_id: String) -> Result<bool> {
    let mut chat = state.chat.write().await;
    chat.scrolled_to_top(&conversation_id)
}

pub async fn toggle_message_controls(
    state: &AppState,
    conversation_id: String,
    message_id: String,
) -> Result<bool> {
    let mut chat = state.chat.write().await;
    Ok(chat.toggle_controls(&conversation_id, &message_id))
}

// ── Message Commands ──────────────────────────────────────────

pub async fn send_message(state: &AppState, conversation_id: String, body: String) -> Result<()> {
    let mut chat = state.chat.write().await;
    chat.send_message(&conversation_id, &body)
}

pub async fn edit_message(
    state: &AppState,
    conversation_id: String,
    message_id: String,
    new_body: String,
) -> Result<()> {
    let mut chat = state.chat.write().await;
    chat.edit_message(&conversation_id, &message_id, &new_body)
}

pub async fn delete_message(
    state: &AppState,
    conversation_id: String,
    message_id: String,
) -> Result<()> {
    let mut chat = state.chat.write().await;
    chat.delete_message(&conversation_id, &message_id)
}

// ── Conversation Commands ─────────────────────────────────────

pub async fn create_conversation(
    state: &AppState,
    name: String,
    member_ids: Vec<String>,
) -> Result<()> {
    let mut chat = state.chat.write().await;
    chat.create_conversation(&name, &member_ids)
}

pub async fn rename_conversation(
    state: &AppState,
    conversation_id: String,
    new_name: String,
) -> Result<()> {
    let mut chat = state.chat.write().await;
    chat.rename_conversation(&conversation_id, &new_name)
}

pub async fn delete_conversation(state: &AppState, conversation_id: String) -> Result<()> {
    let mut chat = state.chat.write().await;
    chat.delete_conversation(&conversation_id)
}

pub async fn add_members(
    state: &AppState,
    conversation_id: String,
    member_ids: Vec<String>,
) -> Result<()> {
    let mut chat = state.chat.write().await;
    chat.add_members(&conversation_id, &member_ids)
}

pub async fn remove_members(
    state: &AppState,
    conversation_id: String,
    member_ids: Vec<String>,
) -> Result<()> {
    let mut chat = state.chat.write().await;
    chat.remove_members(&conversation_id, &member_ids)
}

// ── Queries ───────────────────────────────────────────────────

pub async fn get_conversations(state: &AppState) -> Result<Vec<ConversationSummary>> {
    let chat = state.chat.read().await;
    Ok(chat.conversations())
}

pub async fn get_conversation_snapshot(
    state: &AppState,
    conversation_id: String,
) -> Result<ConversationSnapshot> {
    let chat = state.chat.read().await;
    chat.snapshot(&conversation_id).ok_or_else(|| {
        ChatSyncError::ChatError(format!("Conversation {} is not open", conversation_id))
    })
}

pub async fn get_channel_status(state: &AppState) -> Result<ChannelStatus> {
    let chat = state.chat.read().await;
    Ok(chat.channel_status())
}
