//! Chat orchestrator: UI intents in, inbound channel events in, UI
//! notifications out. Conversation state itself lives in the store.

use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use super::chat_channel::{ChannelAdapter, ChannelEventHandler, InboundEvent};
use super::chat_message_store::{ConversationSnapshot, ConversationStore};
use super::chat_reconcile::EditOutcome;
use super::chat_types::*;
use super::chat_validation::{
    validate_group_name, validate_id, validate_members, validate_message_body,
};
use super::config::{ChatSyncConfig, LimitSettings};
use crate::error::{ChatSyncError, Result};

/// Core chat service.
pub struct ChatService {
    store: ConversationStore,
    /// Known conversations, most recent first.
    directory: Vec<ConversationSummary>,
    status: ChannelStatus,
    limits: LimitSettings,
    local_user_id: String,
    /// Conversation currently shown by the UI.
    current: Option<String>,
    /// Sink for UI notifications (set after construction)
    ui_events: Option<mpsc::UnboundedSender<UiEvent>>,
}

impl ChatService {
    pub fn new(channel: Arc<dyn ChannelAdapter>, config: &ChatSyncConfig) -> Self {
        Self {
            store: ConversationStore::new(channel, &config.sync),
            directory: Vec::new(),
            status: ChannelStatus::Connected,
            limits: config.limits.clone(),
            local_user_id: config.identity.user_id.clone(),
            current: None,
            ui_events: None,
        }
    }

    pub fn set_ui_sink(&mut self, sink: mpsc::UnboundedSender<UiEvent>) {
        self.ui_events = Some(sink);
    }

    fn emit_event(&self, event: UiEvent) {
        if let Some(ref sink) = self.ui_events {
            let _ = sink.send(event);
        }
    }

    fn emit_messages_changed(&self, conversation_id: &str) {
        if let Some(conv) = self.store.conversation(conversation_id) {
            self.emit_event(UiEvent::MessagesChanged {
                conversation_id: conversation_id.to_string(),
                message_count: conv.messages.len(),
                has_more_older: conv.pagination.has_more_older(),
            });
        }
    }

    fn emit_directory_changed(&self) {
        self.emit_event(UiEvent::DirectoryChanged {
            conversation_count: self.directory.len(),
        });
    }

    // ── Channel status ─────────────────────────────────────────

    fn set_status(&mut self, status: ChannelStatus) {
        if self.status == status {
            return;
        }
        if let ChannelStatus::Unavailable(ref reason) = status {
            log::warn!("Channel unavailable: {}", reason);
        } else {
            log::info!("Channel connected");
        }
        self.status = status.clone();
        self.emit_event(UiEvent::ChannelStatusChanged { status });
    }

    fn channel_failed(&mut self, err: &ChatSyncError) {
        if let ChatSyncError::ChannelUnavailable(reason) = err {
            self.set_status(ChannelStatus::Unavailable(reason.clone()));
            let abandoned = self.store.abandon_fetches();
            if !abandoned.is_empty() {
                log::debug!("Abandoned in-flight fetches for {:?}", abandoned);
            }
        }
    }

    fn ensure_available(&self) -> Result<()> {
        match self.status {
            ChannelStatus::Connected => Ok(()),
            ChannelStatus::Unavailable(ref reason) => {
                Err(ChatSyncError::ChannelUnavailable(reason.clone()))
            }
        }
    }

    fn submit(&mut self, intent: OutboundIntent) -> Result<()> {
        self.ensure_available()?;
        if let Err(e) = self.store.submit_outbound(&intent) {
            self.channel_failed(&e);
            return Err(e);
        }
        Ok(())
    }

    // ── Navigation ─────────────────────────────────────────────

    /// Make `conversation_id` the shown conversation. The previous one is
    /// released and any of its late responses will be discarded.
    pub fn open_conversation(&mut self, conversation_id: &str) -> Result<()> {
        validate_id("conversationId", conversation_id)?;
        if self.current.as_deref() == Some(conversation_id) {
            return Ok(());
        }
        if let Some(previous) = self.current.take() {
            self.store.deactivate(&previous);
            self.emit_event(UiEvent::ConversationClosed {
                conversation_id: previous,
            });
        }

        self.current = Some(conversation_id.to_string());
        let result = if let Err(e) = self.ensure_available() {
            // The first page is requested once the channel reconnects
            self.store.attach(conversation_id);
            Err(e)
        } else {
            let result = self.store.activate(conversation_id);
            if let Err(ref e) = result {
                self.channel_failed(e);
            }
            result
        };
        self.emit_messages_changed(conversation_id);
        result
    }

    pub fn close_conversation(&mut self, conversation_id: &str) {
        if self.current.as_deref() == Some(conversation_id) {
            self.current = None;
        }
        if self.store.is_active(conversation_id) {
            self.store.deactivate(conversation_id);
            self.emit_event(UiEvent::ConversationClosed {
                conversation_id: conversation_id.to_string(),
            });
        }
    }

    /// Scrolled-to-top signal. Returns whether an older page was requested.
    pub fn scrolled_to_top(&mut self, conversation_id: &str) -> Result<bool> {
        self.ensure_available()?;
        match self.store.request_older(conversation_id) {
            Ok(issued) => Ok(issued),
            Err(e) => {
                self.channel_failed(&e);
                Err(e)
            }
        }
    }

    pub fn toggle_controls(&mut self, conversation_id: &str, message_id: &str) -> bool {
        self.store.toggle_controls(conversation_id, message_id)
    }

    // ── Message intents ────────────────────────────────────────

    pub fn send_message(&mut self, conversation_id: &str, body: &str) -> Result<()> {
        validate_id("conversationId", conversation_id)?;
        let body = validate_message_body(&self.limits, body)?;
        self.submit(OutboundIntent::SendMessage {
            conversation_id: conversation_id.to_string(),
            sender_id: self.local_user_id.clone(),
            body,
        })
    }

    pub fn edit_message(
        &mut self,
        conversation_id: &str,
        message_id: &str,
        new_body: &str,
    ) -> Result<()> {
        validate_id("conversationId", conversation_id)?;
        validate_id("messageId", message_id)?;
        let new_body = validate_message_body(&self.limits, new_body)?;
        self.submit(OutboundIntent::EditMessage {
            conversation_id: conversation_id.to_string(),
            message_id: message_id.to_string(),
            new_body,
        })
    }

    pub fn delete_message(&mut self, conversation_id: &str, message_id: &str) -> Result<()> {
        validate_id("conversationId", conversation_id)?;
        validate_id("messageId", message_id)?;
        self.submit(OutboundIntent::DeleteMessage {
            conversation_id: conversation_id.to_string(),
            message_id: message_id.to_string(),
        })
    }

    // ── Conversation intents ───────────────────────────────────

    /// The local user is always a member of what it creates.
    pub fn create_conversation(&mut self, name: &str, member_ids: &[String]) -> Result<()> {
        let name = validate_group_name(&self.limits, name)?;
        let mut members = Vec::with_capacity(member_ids.len() + 1);
        if !member_ids.iter().any(|m| m.trim() == self.local_user_id) {
            members.push(self.local_user_id.clone());
        }
        members.extend(member_ids.iter().cloned());
        let member_ids = validate_members(&self.limits, &members)?;

        self.submit(OutboundIntent::CreateConversation { name, member_ids })
    }

    pub fn rename_conversation(&mut self, conversation_id: &str, new_name: &str) -> Result<()> {
        validate_id("conversationId", conversation_id)?;
        let new_name = validate_group_name(&self.limits, new_name)?;
        self.submit(OutboundIntent::RenameConversation {
            conversation_id: conversation_id.to_string(),
            new_name,
        })
    }

    pub fn delete_conversation(&mut self, conversation_id: &str) -> Result<()> {
        validate_id("conversationId", conversation_id)?;
        self.submit(OutboundIntent::DeleteConversation {
            conversation_id: conversation_id.to_string(),
        })
    }

    pub fn add_members(&mut self, conversation_id: &str, member_ids: &[String]) -> Result<()> {
        validate_id("conversationId", conversation_id)?;
        let member_ids = validate_members(&self.limits, member_ids)?;
        self.submit(OutboundIntent::AddMembers {
            conversation_id: conversation_id.to_string(),
            member_ids,
        })
    }

    pub fn remove_members(&mut self, conversation_id: &str, member_ids: &[String]) -> Result<()> {
        validate_id("conversationId", conversation_id)?;
        let member_ids = validate_members(&self.limits, member_ids)?;
        self.submit(OutboundIntent::RemoveMembers {
            conversation_id: conversation_id.to_string(),
            member_ids,
        })
    }

    // ── Inbound ────────────────────────────────────────────────

    /// Apply one inbound event. Stale and missing-target events are not
    /// errors; they are logged by the store and dropped.
    pub fn handle_event(&mut self, event: InboundEvent) -> Result<()> {
        match event {
            InboundEvent::MessageBatch(batch) => {
                let conversation_id = batch.conversation_id.clone();
                if self.store.apply_inbound_batch(batch).is_some() {
                    self.emit_messages_changed(&conversation_id);
                }
            }
            InboundEvent::MessageEdited(edit) => {
                let outcome = self.store.apply_edit(
                    &edit.conversation_id,
                    &edit.message_id,
                    &edit.new_body,
                    edit.edited_at,
                );
                if outcome == Some(EditOutcome::Applied) {
                    self.emit_messages_changed(&edit.conversation_id);
                }
            }
            InboundEvent::MessageDeleted(del) => {
                if self
                    .store
                    .apply_delete(&del.conversation_id, &del.message_id)
                    .is_some()
                {
                    self.emit_messages_changed(&del.conversation_id);
                }
            }
            InboundEvent::ConversationCreated(created) => self.conversation_created(created),
            InboundEvent::ConversationRenamed(renamed) => {
                match self
                    .directory
                    .iter_mut()
                    .find(|c| c.conversation_id == renamed.conversation_id)
                {
                    Some(entry) => {
                        entry.name = renamed.new_name;
                        self.emit_directory_changed();
                    }
                    None => log::debug!(
                        "Rename for unknown conversation {} ignored",
                        renamed.conversation_id
                    ),
                }
            }
            InboundEvent::ConversationDeleted(deleted) => self.conversation_deleted(deleted),
            InboundEvent::MembersAdded(change) => {
                self.update_members(&change.conversation_id, |members| {
                    for id in change.member_ids.iter() {
                        if !members.contains(id) {
                            members.push(id.clone());
                        }
                    }
                });
            }
            InboundEvent::MembersRemoved(change) => {
                self.update_members(&change.conversation_id, |members| {
                    members.retain(|m| !change.member_ids.contains(m));
                });
            }
            InboundEvent::ServerError(err) => {
                log::warn!("Server reported error: {}", err.error);
                self.emit_event(UiEvent::ServerError { error: err.error });
            }
            InboundEvent::Connected => {
                self.set_status(ChannelStatus::Connected);
                // Conversations whose initial page was lost ask again
                for conversation_id in self.store.active_ids() {
                    if let Err(e) = self.store.request_initial(&conversation_id) {
                        self.channel_failed(&e);
                        return Err(e);
                    }
                }
            }
            InboundEvent::Disconnected { reason } => {
                self.channel_failed(&ChatSyncError::ChannelUnavailable(reason));
            }
        }
        Ok(())
    }

    fn conversation_created(&mut self, created: ConversationCreated) {
        if self
            .directory
            .iter()
            .any(|c| c.conversation_id == created.conversation_id)
        {
            log::debug!(
                "Conversation {} already listed, ignoring duplicate create",
                created.conversation_id
            );
            return;
        }
        log::info!(
            "Conversation {} created: '{}' ({} members)",
            created.conversation_id,
            created.name,
            created.member_ids.len()
        );
        self.directory.insert(
            0,
            ConversationSummary {
                conversation_id: created.conversation_id,
                name: created.name,
                member_ids: created.member_ids,
                created_at: created.created_at,
            },
        );
        self.emit_directory_changed();
    }

    fn conversation_deleted(&mut self, deleted: ConversationDeleted) {
        if !deleted.success {
            log::warn!(
                "Server declined to delete conversation {}",
                deleted.conversation_id
            );
            return;
        }
        let id = deleted.conversation_id;
        log::info!("Conversation {} deleted", id);

        if self.current.as_deref() == Some(id.as_str()) {
            self.current = None;
        }
        let was_active = self.store.is_active(&id);
        self.store.discard(&id);
        if was_active {
            self.emit_event(UiEvent::ConversationClosed {
                conversation_id: id.clone(),
            });
        }

        let before = self.directory.len();
        self.directory.retain(|c| c.conversation_id != id);
        if self.directory.len() != before {
            self.emit_directory_changed();
        }
    }

    fn update_members<F>(&mut self, conversation_id: &str, apply: F)
    where
        F: FnOnce(&mut Vec<String>),
    {
        match self
            .directory
            .iter_mut()
            .find(|c| c.conversation_id == conversation_id)
        {
            Some(entry) => {
                apply(&mut entry.member_ids);
                self.emit_directory_changed();
            }
            None => log::debug!(
                "Membership change for unknown conversation {} ignored",
                conversation_id
            ),
        }
    }

    // ── Queries ────────────────────────────────────────────────

    pub fn conversations(&self) -> Vec<ConversationSummary> {
        self.directory.clone()
    }

    pub fn snapshot(&self, conversation_id: &str) -> Option<ConversationSnapshot> {
        self.store.snapshot(conversation_id)
    }

    pub fn current_conversation(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn channel_status(&self) -> ChannelStatus {
        self.status.clone()
    }
}

/// Wrapper to implement ChannelEventHandler for Arc<RwLock<ChatService>>.
pub struct ChatIncomingAdapter {
    chat: Arc<RwLock<ChatService>>,
}

impl ChatIncomingAdapter {
    pub fn new(chat: Arc<RwLock<ChatService>>) -> Self {
        Self { chat }
    }
}

#[async_trait::async_trait]
impl ChannelEventHandler for ChatIncomingAdapter {
    async fn handle_event(&self, event: InboundEvent) -> Result<()> {
        let mut chat = self.chat.write().await;
        chat.handle_event(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::chat_channel::MockChannelAdapter;
    use crate::services::chat_pagination::FetchPhase;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    struct Harness {
        chat: ChatService,
        sent: Arc<Mutex<Vec<OutboundIntent>>>,
        ui: mpsc::UnboundedReceiver<UiEvent>,
    }

    impl Harness {
        fn new() -> Self {
            let sent = Arc::new(Mutex::new(Vec::new()));
            let sink = sent.clone();
            let mut mock = MockChannelAdapter::new();
            mock.expect_submit().returning(move |intent| {
                sink.lock().unwrap().push(intent.clone());
                Ok(())
            });

            let mut config = ChatSyncConfig::default();
            config.sync.page_size = 10;
            config.identity.user_id = "alice".to_string();

            let mut chat = ChatService::new(Arc::new(mock), &config);
            let (tx, ui) = mpsc::unbounded_channel();
            chat.set_ui_sink(tx);
            Self { chat, sent, ui }
        }

        fn sent(&self) -> Vec<OutboundIntent> {
            self.sent.lock().unwrap().clone()
        }

        fn ui_events(&mut self) -> Vec<UiEvent> {
            let mut events = Vec::new();
            while let Ok(ev) = self.ui.try_recv() {
                events.push(ev);
            }
            events
        }
    }

    fn msg(id: &str, minute: u32) -> Message {
        Message {
            id: id.to_string(),
            author_id: "bob".to_string(),
            body: format!("body {}", id),
            sent_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
            edited_at: None,
        }
    }

    fn batch(conv: &str, page: u32, total: u32, messages: Vec<Message>) -> InboundEvent {
        InboundEvent::MessageBatch(MessageBatch {
            conversation_id: conv.to_string(),
            page,
            page_size: 10,
            total,
            messages,
            source: BatchSource::Unspecified,
        })
    }

    fn created(conv: &str, name: &str) -> InboundEvent {
        InboundEvent::ConversationCreated(ConversationCreated {
            conversation_id: conv.to_string(),
            name: name.to_string(),
            member_ids: vec!["alice".to_string()],
            created_at: None,
        })
    }

    #[test]
    fn test_switching_discards_late_response() {
        let mut h = Harness::new();
        h.chat.open_conversation("c1").unwrap();
        h.chat.open_conversation("c2").unwrap();
        h.ui_events();

        // c1's first page arrives after the switch
        h.chat
            .handle_event(batch("c1", 1, 1, vec![msg("m1", 1)]))
            .unwrap();
        assert!(h.ui_events().is_empty());
        assert!(h.chat.snapshot("c1").is_none());
        assert_eq!(h.chat.current_conversation(), Some("c2"));
    }

    #[test]
    fn test_open_emits_close_for_previous() {
        let mut h = Harness::new();
        h.chat.open_conversation("c1").unwrap();
        h.ui_events();
        h.chat.open_conversation("c2").unwrap();

        let events = h.ui_events();
        assert_eq!(
            events[0],
            UiEvent::ConversationClosed {
                conversation_id: "c1".to_string()
            }
        );
        assert_eq!(h.sent().len(), 2);
    }

    #[test]
    fn test_reopening_current_is_noop() {
        let mut h = Harness::new();
        h.chat.open_conversation("c1").unwrap();
        h.chat.open_conversation("c1").unwrap();
        assert_eq!(h.sent().len(), 1);
    }

    #[test]
    fn test_batch_emits_messages_changed() {
        let mut h = Harness::new();
        h.chat.open_conversation("c1").unwrap();
        h.ui_events();

        h.chat
            .handle_event(batch("c1", 1, 25, vec![msg("m1", 1), msg("m2", 2)]))
            .unwrap();
        assert_eq!(
            h.ui_events(),
            vec![UiEvent::MessagesChanged {
                conversation_id: "c1".to_string(),
                message_count: 2,
                has_more_older: true,
            }]
        );
    }

    #[test]
    fn test_send_stamps_local_user_and_waits_for_confirmation() {
        let mut h = Harness::new();
        h.chat.open_conversation("c1").unwrap();
        h.chat.send_message("c1", "  hello  ").unwrap();

        assert_eq!(
            h.sent()[1],
            OutboundIntent::SendMessage {
                conversation_id: "c1".to_string(),
                sender_id: "alice".to_string(),
                body: "hello".to_string(),
            }
        );
        assert!(h.chat.snapshot("c1").unwrap().messages.is_empty());
    }

    #[test]
    fn test_invalid_input_sends_nothing() {
        let mut h = Harness::new();
        assert!(matches!(
            h.chat.send_message("c1", "   "),
            Err(ChatSyncError::ValidationError(_))
        ));
        assert!(h.chat.edit_message("c1", "", "x").is_err());
        assert!(h.chat.rename_conversation("c1", "").is_err());
        assert!(h.chat.add_members("c1", &[]).is_err());
        assert!(h.sent().is_empty());
    }

    #[test]
    fn test_create_includes_creator() {
        let mut h = Harness::new();
        h.chat
            .create_conversation("Team", &["bob".to_string()])
            .unwrap();
        h.chat
            .create_conversation("Pair", &["alice".to_string(), "carol".to_string()])
            .unwrap();

        let sent = h.sent();
        assert_eq!(
            sent[0],
            OutboundIntent::CreateConversation {
                name: "Team".to_string(),
                member_ids: vec!["alice".to_string(), "bob".to_string()],
            }
        );
        assert_eq!(
            sent[1],
            OutboundIntent::CreateConversation {
                name: "Pair".to_string(),
                member_ids: vec!["alice".to_string(), "carol".to_string()],
            }
        );
    }

    #[test]
    fn test_directory_newest_first_and_deduped() {
        let mut h = Harness::new();
        h.chat.handle_event(created("g1", "One")).unwrap();
        h.chat.handle_event(created("g2", "Two")).unwrap();
        h.chat.handle_event(created("g1", "One again")).unwrap();

        let names: Vec<String> = h.chat.conversations().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Two", "One"]);
    }

    #[test]
    fn test_directory_rename_and_membership() {
        let mut h = Harness::new();
        h.chat.handle_event(created("g1", "One")).unwrap();
        h.chat
            .handle_event(InboundEvent::ConversationRenamed(ConversationRenamed {
                conversation_id: "g1".to_string(),
                new_name: "Uno".to_string(),
            }))
            .unwrap();
        h.chat
            .handle_event(InboundEvent::MembersAdded(MembersChanged {
                conversation_id: "g1".to_string(),
                member_ids: vec!["bob".to_string(), "alice".to_string()],
            }))
            .unwrap();
        h.chat
            .handle_event(InboundEvent::MembersRemoved(MembersChanged {
                conversation_id: "g1".to_string(),
                member_ids: vec!["alice".to_string()],
            }))
            .unwrap();

        let entry = &h.chat.conversations()[0];
        assert_eq!(entry.name, "Uno");
        assert_eq!(entry.member_ids, vec!["bob".to_string()]);
    }

    #[test]
    fn test_deleted_conversation_is_closed() {
        let mut h = Harness::new();
        h.chat.handle_event(created("g1", "One")).unwrap();
        h.chat.open_conversation("g1").unwrap();
        h.ui_events();

        h.chat
            .handle_event(InboundEvent::ConversationDeleted(ConversationDeleted {
                conversation_id: "g1".to_string(),
                success: true,
            }))
            .unwrap();

        assert!(h.chat.conversations().is_empty());
        assert_eq!(h.chat.current_conversation(), None);
        assert!(h.chat.snapshot("g1").is_none());
        let events = h.ui_events();
        assert!(events.contains(&UiEvent::ConversationClosed {
            conversation_id: "g1".to_string()
        }));
        assert!(events.contains(&UiEvent::DirectoryChanged {
            conversation_count: 0
        }));
    }

    #[test]
    fn test_declined_delete_keeps_conversation() {
        let mut h = Harness::new();
        h.chat.handle_event(created("g1", "One")).unwrap();
        h.chat
            .handle_event(InboundEvent::ConversationDeleted(ConversationDeleted {
                conversation_id: "g1".to_string(),
                success: false,
            }))
            .unwrap();
        assert_eq!(h.chat.conversations().len(), 1);
    }

    #[test]
    fn test_disconnect_and_reconnect() {
        let mut h = Harness::new();
        h.chat.open_conversation("c1").unwrap();
        h.ui_events();

        h.chat
            .handle_event(InboundEvent::Disconnected {
                reason: "auth rejected".to_string(),
            })
            .unwrap();
        assert_eq!(
            h.chat.channel_status(),
            ChannelStatus::Unavailable("auth rejected".to_string())
        );
        assert_eq!(
            h.chat.snapshot("c1").unwrap().phase,
            FetchPhase::Idle
        );
        assert!(matches!(
            h.chat.send_message("c1", "hi"),
            Err(ChatSyncError::ChannelUnavailable(_))
        ));

        h.chat.handle_event(InboundEvent::Connected).unwrap();
        assert_eq!(h.chat.channel_status(), ChannelStatus::Connected);
        let sent = h.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(
            sent[1],
            OutboundIntent::FetchHistory {
                conversation_id: "c1".to_string(),
                page: 1,
                page_size: 10,
            }
        );

        let events = h.ui_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            UiEvent::ChannelStatusChanged {
                status: ChannelStatus::Unavailable(_)
            }
        ));
    }

    #[test]
    fn test_fetches_wait_for_reconnect() {
        let mut h = Harness::new();
        h.chat
            .handle_event(InboundEvent::Disconnected {
                reason: "down".to_string(),
            })
            .unwrap();

        assert!(matches!(
            h.chat.open_conversation("c1"),
            Err(ChatSyncError::ChannelUnavailable(_))
        ));
        assert!(h.sent().is_empty());
        assert_eq!(h.chat.snapshot("c1").unwrap().phase, FetchPhase::Idle);
        assert!(matches!(
            h.chat.scrolled_to_top("c1"),
            Err(ChatSyncError::ChannelUnavailable(_))
        ));
        assert!(h.sent().is_empty());

        h.chat.handle_event(InboundEvent::Connected).unwrap();
        assert_eq!(
            h.sent(),
            vec![OutboundIntent::FetchHistory {
                conversation_id: "c1".to_string(),
                page: 1,
                page_size: 10,
            }]
        );
        assert_eq!(
            h.chat.snapshot("c1").unwrap().phase,
            FetchPhase::FetchingInitial
        );

        h.chat
            .handle_event(batch("c1", 1, 25, vec![msg("m1", 1)]))
            .unwrap();
        assert!(h.chat.scrolled_to_top("c1").unwrap());
        assert_eq!(h.sent().len(), 2);
    }

    #[test]
    fn test_submit_failure_marks_channel_unavailable() {
        let mut mock = MockChannelAdapter::new();
        mock.expect_submit()
            .returning(|_| Err(ChatSyncError::ChannelUnavailable("socket closed".to_string())));
        let mut chat = ChatService::new(Arc::new(mock), &ChatSyncConfig::default());

        assert!(chat.open_conversation("c1").is_err());
        assert_eq!(
            chat.channel_status(),
            ChannelStatus::Unavailable("socket closed".to_string())
        );
        // The conversation stays shown so a reconnect can refetch it
        assert_eq!(chat.current_conversation(), Some("c1"));
    }

    #[test]
    fn test_server_error_is_surfaced() {
        let mut h = Harness::new();
        h.chat
            .handle_event(InboundEvent::ServerError(ServerError {
                error: "Chat group not found".to_string(),
            }))
            .unwrap();
        assert_eq!(
            h.ui_events(),
            vec![UiEvent::ServerError {
                error: "Chat group not found".to_string()
            }]
        );
    }

    #[test]
    fn test_scroll_to_top_pages_back() {
        let mut h = Harness::new();
        h.chat.open_conversation("c1").unwrap();
        assert!(!h.chat.scrolled_to_top("c1").unwrap());

        h.chat
            .handle_event(batch("c1", 1, 25, (0..10).map(|i| msg(&format!("n{}", i), 20 + i)).collect()))
            .unwrap();
        assert!(h.chat.scrolled_to_top("c1").unwrap());
        assert!(!h.chat.scrolled_to_top("c1").unwrap());
        assert!(matches!(
            h.sent().last(),
            Some(OutboundIntent::FetchHistory { page: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_incoming_adapter_locks_and_applies() {
        let h = Harness::new();
        let chat = Arc::new(RwLock::new(h.chat));
        chat.write().await.open_conversation("c1").unwrap();

        let adapter = ChatIncomingAdapter::new(chat.clone());
        adapter
            .handle_event(batch("c1", 1, 1, vec![msg("m1", 1)]))
            .await
            .unwrap();

        let snapshot = chat.read().await.snapshot("c1").unwrap();
        assert_eq!(snapshot.messages.len(), 1);
    }
}
