use std::sync::Arc;
use tokio::sync::RwLock;

use crate::services::{ChannelAdapter, ChatIncomingAdapter, ChatService, ConfigService};

/// Shared application state handed to every command.
pub struct AppState {
    pub chat: Arc<RwLock<ChatService>>,
    pub config: Arc<RwLock<ConfigService>>,
}

impl AppState {
    pub fn new(config_service: ConfigService, channel: Arc<dyn ChannelAdapter>) -> Self {
        let app_config = config_service.get();

        log::info!(
            "Initializing ChatService: user={}, page_size={}, retained={}",
            app_config.identity.user_id,
            app_config.sync.page_size,
            app_config.sync.retained_conversations
        );
        let chat = ChatService::new(channel, &app_config);

        Self {
            chat: Arc::new(RwLock::new(chat)),
            config: Arc::new(RwLock::new(config_service)),
        }
    }

    /// Inbound handler bound to this state's chat service.
    pub fn incoming_handler(&self) -> Arc<ChatIncomingAdapter> {
        Arc::new(ChatIncomingAdapter::new(self.chat.clone()))
    }
}
