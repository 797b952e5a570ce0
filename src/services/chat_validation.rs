//! Outbound payload checks, applied before anything is submitted.

use super::config::LimitSettings;
use crate::error::{ChatSyncError, Result};

pub fn validate_id(field: &str, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(ChatSyncError::ValidationError(format!("Missing {}", field)));
    }
    Ok(())
}

/// Returns the trimmed body.
pub fn validate_message_body(limits: &LimitSettings, body: &str) -> Result<String> {
    let body = body.trim();
    if body.is_empty() {
        return Err(ChatSyncError::ValidationError(
            "Message body is empty".to_string(),
        ));
    }
    if body.chars().count() > limits.max_message_length {
        return Err(ChatSyncError::ValidationError(format!(
            "Message body exceeds {} characters",
            limits.max_message_length
        )));
    }
    Ok(body.to_string())
}

/// Returns the trimmed name.
pub fn validate_group_name(limits: &LimitSettings, name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ChatSyncError::ValidationError(
            "Conversation name is empty".to_string(),
        ));
    }
    if name.chars().count() > limits.max_group_name_length {
        return Err(ChatSyncError::ValidationError(format!(
            "Conversation name exceeds {} characters",
            limits.max_group_name_length
        )));
    }
    Ok(name.to_string())
}

/// Trims ids, drops blanks and repeats, then checks the bounds.
pub fn validate_members(limits: &LimitSettings, members: &[String]) -> Result<Vec<String>> {
    let mut cleaned: Vec<String> = Vec::with_capacity(members.len());
    for member in members {
        let member = member.trim();
        if member.is_empty() || cleaned.iter().any(|m| m == member) {
            continue;
        }
        if member.chars().count() > limits.max_user_id_length {
            return Err(ChatSyncError::ValidationError(format!(
                "User id exceeds {} characters",
                limits.max_user_id_length
            )));
        }
        cleaned.push(member.to_string());
    }

    if cleaned.len() < limits.min_members {
        return Err(ChatSyncError::ValidationError(format!(
            "At least {} member(s) required",
            limits.min_members
        )));
    }
    if cleaned.len() > limits.max_members {
        return Err(ChatSyncError::ValidationError(format!(
            "Maximum {} members allowed",
            limits.max_members
        )));
    }
    Ok(cleaned)
}
