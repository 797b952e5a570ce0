// Service layer

pub mod chat_channel;
pub mod chat_message_store;
pub mod chat_pagination;
pub mod chat_reconcile;
pub mod chat_service;
pub mod chat_types;
pub mod chat_validation;
pub mod config;

pub use chat_channel::{ChannelAdapter, ChannelEventHandler, InboundEvent, MpscChannel};
pub use chat_message_store::ConversationStore;
pub use chat_service::{ChatIncomingAdapter, ChatService};
pub use config::ConfigService;
