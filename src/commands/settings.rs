use crate::error::Result;
use crate::services::config::ChatSyncConfig;
use crate::state::AppState;

pub async fn get_config(state: &AppState) -> Result<ChatSyncConfig> {
    let config = state.config.read().await;
    Ok(config.get())
}

/// Persisted immediately; sync and identity settings apply on next start.
pub async fn save_config(state: &AppState, config: ChatSyncConfig) -> Result<()> {
    let mut service = state.config.write().await;
    service.update(config)?;
    log::info!("Configuration saved to {:?}", service.path());
    Ok(())
}
