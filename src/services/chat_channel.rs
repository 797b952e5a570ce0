//! Channel boundary. Outbound intents go out as named frames; inbound
//! frames are decoded into typed events and handed to a handler.
//!
//! Request and result are separate events; correlation is carried only by
//! the ids in the payloads.

use std::sync::Arc;
use tokio::sync::mpsc;

use super::chat_types::{
    BatchSource, ChannelFrame, ConversationCreated, ConversationDeleted, ConversationRenamed,
    MembersChanged, MessageBatch, MessageDeleted, MessageEdited, OutboundIntent, ServerError,
};
use crate::error::{ChatSyncError, Result};

/// Outbound half of the duplex event channel. Fire-and-forget: the
/// confirmation, if any, arrives later as an inbound event.
#[cfg_attr(test, mockall::automock)]
pub trait ChannelAdapter: Send + Sync {
    fn submit(&self, intent: &OutboundIntent) -> Result<()>;
}

/// Typed inbound event.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    MessageBatch(MessageBatch),
    MessageEdited(MessageEdited),
    MessageDeleted(MessageDeleted),
    ConversationCreated(ConversationCreated),
    ConversationRenamed(ConversationRenamed),
    ConversationDeleted(ConversationDeleted),
    MembersAdded(MembersChanged),
    MembersRemoved(MembersChanged),
    ServerError(ServerError),
    Connected,
    Disconnected { reason: String },
}

impl InboundEvent {
    /// Decode a raw frame. Accepts the current event names and the legacy
    /// socket event names.
    pub fn decode(frame: ChannelFrame) -> Result<Self> {
        let ChannelFrame { event, payload } = frame;
        let parsed = match event.as_str() {
            "message-batch" => InboundEvent::MessageBatch(serde_json::from_value(payload)?),
            "receiveMessage" => {
                let mut batch: MessageBatch = serde_json::from_value(payload)?;
                batch.source = BatchSource::Live;
                InboundEvent::MessageBatch(batch)
            }
            "receiveMessageHistory" => {
                let mut batch: MessageBatch = serde_json::from_value(payload)?;
                batch.source = BatchSource::FetchResponse;
                InboundEvent::MessageBatch(batch)
            }
            "message-edited" | "messageEdited" => {
                InboundEvent::MessageEdited(serde_json::from_value(payload)?)
            }
            "message-deleted" | "messageDeleted" => {
                InboundEvent::MessageDeleted(serde_json::from_value(payload)?)
            }
            "conversation-created" | "chatGroupCreated" => {
                InboundEvent::ConversationCreated(serde_json::from_value(payload)?)
            }
            "conversation-renamed" | "chatGroupNameUpdated" => {
                InboundEvent::ConversationRenamed(serde_json::from_value(payload)?)
            }
            "conversation-deleted" | "chatGroupDeleted" => {
                InboundEvent::ConversationDeleted(serde_json::from_value(payload)?)
            }
            "members-added" | "usersAddedToChatGroup" => {
                InboundEvent::MembersAdded(serde_json::from_value(payload)?)
            }
            "members-removed" | "usersRemovedFromChatGroup" => {
                InboundEvent::MembersRemoved(serde_json::from_value(payload)?)
            }
            "error" => InboundEvent::ServerError(serde_json::from_value(payload)?),
            "connect" => InboundEvent::Connected,
            "disconnect" => InboundEvent::Disconnected {
                reason: payload
                    .get("reason")
                    .and_then(|r| r.as_str())
                    .unwrap_or("disconnected")
                    .to_string(),
            },
            other => {
                return Err(ChatSyncError::ProtocolError(format!(
                    "Unknown inbound event '{}'",
                    other
                )))
            }
        };
        Ok(parsed)
    }

    /// Conversation this event is correlated to, if any.
    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            InboundEvent::MessageBatch(b) => Some(&b.conversation_id),
            InboundEvent::MessageEdited(e) => Some(&e.conversation_id),
            InboundEvent::MessageDeleted(d) => Some(&d.conversation_id),
            InboundEvent::ConversationCreated(c) => Some(&c.conversation_id),
            InboundEvent::ConversationRenamed(r) => Some(&r.conversation_id),
            InboundEvent::ConversationDeleted(d) => Some(&d.conversation_id),
            InboundEvent::MembersAdded(m) | InboundEvent::MembersRemoved(m) => {
                Some(&m.conversation_id)
            }
            InboundEvent::ServerError(_)
            | InboundEvent::Connected
            | InboundEvent::Disconnected { .. } => None,
        }
    }
}

/// In-process adapter: outbound frames are pushed onto an unbounded queue
/// drained by whatever owns the real connection.
pub struct MpscChannel {
    tx: mpsc::UnboundedSender<ChannelFrame>,
}

impl MpscChannel {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ChannelFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ChannelAdapter for MpscChannel {
    fn submit(&self, intent: &OutboundIntent) -> Result<()> {
        let frame = ChannelFrame::try_from(intent)?;
        log::debug!(
            "Submitting '{}' for {}",
            frame.event,
            intent.conversation_id().unwrap_or("-")
        );
        self.tx
            .send(frame)
            .map_err(|_| ChatSyncError::ChannelUnavailable("outbound channel closed".to_string()))
    }
}

/// Inbound event handler, implemented over the chat service.
#[async_trait::async_trait]
pub trait ChannelEventHandler: Send + Sync {
    async fn handle_event(&self, event: InboundEvent) -> Result<()>;
}

/// Drain inbound frames until the sender side goes away. Undecodable
/// frames are logged and skipped; handler errors never stop the loop.
/// A closed channel is reported to the handler as a disconnect.
pub async fn run_inbound_loop(
    mut rx: mpsc::UnboundedReceiver<ChannelFrame>,
    handler: Arc<dyn ChannelEventHandler>,
) {
    while let Some(frame) = rx.recv().await {
        let name = frame.event.clone();
        let event = match InboundEvent::decode(frame) {
            Ok(event) => event,
            Err(e) => {
                log::warn!("Dropping inbound frame '{}': {}", name, e);
                continue;
            }
        };
        let conversation = event.conversation_id().unwrap_or("-").to_string();
        if let Err(e) = handler.handle_event(event).await {
            log::error!("Handling inbound '{}' for {} failed: {}", name, conversation, e);
        }
    }

    log::info!("Inbound channel closed");
    let closed = InboundEvent::Disconnected {
        reason: "inbound channel closed".to_string(),
    };
    if let Err(e) = handler.handle_event(closed).await {
        log::error!("Handling channel close failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn frame(event: &str, payload: serde_json::Value) -> ChannelFrame {
        ChannelFrame {
            event: event.to_string(),
            payload,
        }
    }

    #[test]
    fn test_decode_message_batch() {
        let ev = InboundEvent::decode(frame(
            "message-batch",
            json!({
                "conversationId": "c1",
                "page": 1,
                "pageSize": 20,
                "total": 1,
                "messages": [{
                    "id": "m1",
                    "authorId": "bob",
                    "body": "hi",
                    "sentAt": "2024-05-01T10:00:00Z"
                }]
            }),
        ))
        .unwrap();
        match ev {
            InboundEvent::MessageBatch(b) => {
                assert_eq!(b.conversation_id, "c1");
                assert_eq!(b.messages.len(), 1);
                assert_eq!(b.messages[0].author_id, "bob");
                assert_eq!(b.source, BatchSource::Unspecified);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_legacy_batch_keeps_source() {
        let payload = json!({"chatId": "c1", "page": 1, "limit": 20, "total": 1, "messages": []});
        let live = InboundEvent::decode(frame("receiveMessage", payload.clone())).unwrap();
        let history = InboundEvent::decode(frame("receiveMessageHistory", payload)).unwrap();
        match (live, history) {
            (InboundEvent::MessageBatch(live), InboundEvent::MessageBatch(history)) => {
                assert_eq!(live.source, BatchSource::Live);
                assert_eq!(history.source, BatchSource::FetchResponse);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_legacy_edit() {
        let ev = InboundEvent::decode(frame(
            "messageEdited",
            json!({
                "chatId": "c1",
                "messageId": "m1",
                "newContent": "fixed",
                "editedAt": "2024-05-01T10:05:00Z"
            }),
        ))
        .unwrap();
        assert_eq!(ev.conversation_id(), Some("c1"));
        match ev {
            InboundEvent::MessageEdited(e) => assert_eq!(e.new_body, "fixed"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_legacy_group_deleted() {
        let ev = InboundEvent::decode(frame(
            "chatGroupDeleted",
            json!({"chatId": "c9", "deleted": true}),
        ))
        .unwrap();
        match ev {
            InboundEvent::ConversationDeleted(d) => {
                assert_eq!(d.conversation_id, "c9");
                assert!(d.success);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_disconnect_reason() {
        let ev = InboundEvent::decode(frame("disconnect", json!({"reason": "auth rejected"})))
            .unwrap();
        match ev {
            InboundEvent::Disconnected { reason } => assert_eq!(reason, "auth rejected"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_unknown_event() {
        let err = InboundEvent::decode(frame("typing", json!({}))).unwrap_err();
        assert!(matches!(err, ChatSyncError::ProtocolError(_)));
    }

    #[test]
    fn test_decode_malformed_payload() {
        let err = InboundEvent::decode(frame("message-deleted", json!({"chatId": 1}))).unwrap_err();
        assert!(matches!(err, ChatSyncError::Json(_)));
    }

    #[test]
    fn test_mpsc_channel_submit() {
        let (channel, mut rx) = MpscChannel::new();
        channel
            .submit(&OutboundIntent::DeleteMessage {
                conversation_id: "c1".to_string(),
                message_id: "m1".to_string(),
            })
            .unwrap();
        let sent = rx.try_recv().unwrap();
        assert_eq!(sent.event, "delete-message");
        assert_eq!(sent.payload["messageId"], "m1");
    }

    #[test]
    fn test_mpsc_channel_closed() {
        let (channel, rx) = MpscChannel::new();
        drop(rx);
        let err = channel
            .submit(&OutboundIntent::DeleteConversation {
                conversation_id: "c1".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, ChatSyncError::ChannelUnavailable(_)));
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl ChannelEventHandler for Recorder {
        async fn handle_event(&self, event: InboundEvent) -> Result<()> {
            let label = match &event {
                InboundEvent::MessageDeleted(d) => format!("deleted:{}", d.message_id),
                InboundEvent::Disconnected { reason } => format!("disconnected:{}", reason),
                other => format!("{:?}", other),
            };
            self.seen.lock().unwrap().push(label);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_inbound_loop_skips_bad_frames_and_reports_close() {
        let (tx, rx) = mpsc::unbounded_channel();
        let recorder = Arc::new(Recorder::default());

        tx.send(frame("bogus", json!({}))).unwrap();
        tx.send(frame(
            "message-deleted",
            json!({"conversationId": "c1", "messageId": "m7"}),
        ))
        .unwrap();
        drop(tx);

        run_inbound_loop(rx, recorder.clone()).await;

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                "deleted:m7".to_string(),
                "disconnected:inbound channel closed".to_string()
            ]
        );
    }
}
