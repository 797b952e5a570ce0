use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use super::chat_channel::ChannelAdapter;
use super::chat_pagination::{FetchKind, FetchPhase, FetchRequest, PaginationController};
use super::chat_reconcile::{self, EditOutcome, Placement};
use super::chat_types::{BatchSource, Freshness, Message, MessageBatch, OutboundIntent};
use super::config::SyncSettings;
use crate::error::Result;

/// How an accepted batch was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BatchOrigin {
    /// Response to the in-flight first-page fetch.
    Initial,
    /// Page 1 arriving outside an initial fetch (send confirmation, push).
    Live,
    /// Response to the in-flight older-page fetch.
    Historical,
}

impl BatchOrigin {
    fn placement(self) -> Placement {
        match self {
            BatchOrigin::Initial => Placement::Replace,
            BatchOrigin::Live => Placement::Merge,
            BatchOrigin::Historical => Placement::Prepend,
        }
    }
}

/// What applying a batch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub origin: BatchOrigin,
    pub added: usize,
    pub duplicates: usize,
    pub anomaly: bool,
}

/// Per-conversation aggregate.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: String,
    /// Ascending by `sent_at`, unique by `id`.
    pub messages: Vec<Message>,
    pub pagination: PaginationController,
    pub freshness: Freshness,
    /// Message ids whose edit/delete controls are open. Keyed by id so it
    /// survives insertion and removal.
    open_controls: HashSet<String>,
}

impl Conversation {
    fn new(id: &str, page_size: u32) -> Self {
        Self {
            id: id.to_string(),
            messages: Vec::new(),
            pagination: PaginationController::new(page_size),
            freshness: Freshness::Current,
            open_controls: HashSet::new(),
        }
    }

    pub fn open_controls(&self) -> &HashSet<String> {
        &self.open_controls
    }

    /// Whether a page-1 batch is the response to the in-flight first-page
    /// fetch. A live push never is, whatever its page number; a batch of
    /// unknown source must also match the requested page size.
    fn answers_initial(&self, batch: &MessageBatch) -> bool {
        if self.pagination.in_flight_page(FetchKind::Initial) != Some(batch.page) {
            return false;
        }
        match batch.source {
            BatchSource::FetchResponse => true,
            BatchSource::Live => false,
            BatchSource::Unspecified => batch.page_size == self.pagination.page_size(),
        }
    }

    fn prune_controls(&mut self) {
        let held: HashSet<&str> = self.messages.iter().map(|m| m.id.as_str()).collect();
        self.open_controls.retain(|id| held.contains(id.as_str()));
    }
}

/// Serializable view of one conversation for the rendering layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSnapshot {
    pub conversation_id: String,
    pub messages: Vec<Message>,
    pub has_more_older: bool,
    pub phase: FetchPhase,
    pub freshness: Freshness,
    pub open_controls: Vec<String>,
}

/// Sole owner of conversation state: conversation id → (messages, pagination).
pub struct ConversationStore {
    active: HashMap<String, Conversation>,
    /// Deactivated conversations, oldest first.
    retained: VecDeque<Conversation>,
    retained_capacity: usize,
    page_size: u32,
    channel: Arc<dyn ChannelAdapter>,
}

impl ConversationStore {
    pub fn new(channel: Arc<dyn ChannelAdapter>, settings: &SyncSettings) -> Self {
        Self {
            active: HashMap::new(),
            retained: VecDeque::new(),
            retained_capacity: settings.retained_conversations,
            page_size: settings.page_size.max(1),
            channel,
        }
    }

    // ── Lifecycle ──────────────────────────────────────────────

    /// Reset or create the conversation and request its first page.
    pub fn activate(&mut self, conversation_id: &str) -> Result<()> {
        self.attach(conversation_id);
        self.request_initial(conversation_id).map(|_| ())
    }

    /// Reset or create the conversation without fetching anything. Its
    /// first page stays unrequested until `request_initial`.
    pub fn attach(&mut self, conversation_id: &str) {
        let conv = match self.take_retained(conversation_id) {
            Some(mut cached) => {
                cached.pagination.reset();
                cached.freshness = Freshness::Revalidating;
                cached.open_controls.clear();
                log::info!(
                    "Activated conversation {} from cache ({} messages, revalidating)",
                    conversation_id,
                    cached.messages.len()
                );
                cached
            }
            None => {
                log::info!("Activated conversation {}", conversation_id);
                Conversation::new(conversation_id, self.page_size)
            }
        };
        self.active.insert(conversation_id.to_string(), conv);
    }

    /// Release the conversation. Any in-flight fetch is forgotten; its late
    /// response will find the conversation inactive and be discarded.
    pub fn deactivate(&mut self, conversation_id: &str) {
        let Some(mut conv) = self.active.remove(conversation_id) else {
            return;
        };
        log::info!("Deactivated conversation {}", conversation_id);

        if self.retained_capacity == 0 {
            return;
        }
        conv.pagination.abandon();
        conv.open_controls.clear();
        self.retained.push_back(conv);
        while self.retained.len() > self.retained_capacity {
            if let Some(evicted) = self.retained.pop_front() {
                log::debug!("Evicted cached conversation {}", evicted.id);
            }
        }
    }

    /// Drop every trace of the conversation (deleted server-side).
    pub fn discard(&mut self, conversation_id: &str) {
        self.active.remove(conversation_id);
        self.retained.retain(|c| c.id != conversation_id);
    }

    fn take_retained(&mut self, conversation_id: &str) -> Option<Conversation> {
        let idx = self.retained.iter().position(|c| c.id == conversation_id)?;
        self.retained.remove(idx)
    }

    pub fn is_active(&self, conversation_id: &str) -> bool {
        self.active.contains_key(conversation_id)
    }

    pub fn active_ids(&self) -> Vec<String> {
        self.active.keys().cloned().collect()
    }

    // ── Fetching ───────────────────────────────────────────────

    /// Issue the first-page fetch if the controller allows it. Returns
    /// whether a fetch went out.
    pub fn request_initial(&mut self, conversation_id: &str) -> Result<bool> {
        self.request(conversation_id, FetchKind::Initial)
    }

    /// Scrolled-to-top: issue an older-page fetch if allowed.
    pub fn request_older(&mut self, conversation_id: &str) -> Result<bool> {
        self.request(conversation_id, FetchKind::Older)
    }

    fn request(&mut self, conversation_id: &str, kind: FetchKind) -> Result<bool> {
        let Some(conv) = self.active.get_mut(conversation_id) else {
            log::debug!("Fetch for inactive conversation {} ignored", conversation_id);
            return Ok(false);
        };
        let granted = match kind {
            FetchKind::Initial => conv.pagination.begin_initial(),
            FetchKind::Older => conv.pagination.begin_older(),
        };
        let Some(FetchRequest {
            page, page_size, ..
        }) = granted
        else {
            log::debug!(
                "{:?} fetch for {} dropped (phase {:?})",
                kind,
                conversation_id,
                conv.pagination.phase()
            );
            return Ok(false);
        };

        log::debug!(
            "Fetching page {} ({} per page) for {}",
            page,
            page_size,
            conversation_id
        );
        let intent = OutboundIntent::FetchHistory {
            conversation_id: conversation_id.to_string(),
            page,
            page_size,
        };
        if let Err(e) = self.channel.submit(&intent) {
            conv.pagination.abandon();
            return Err(e);
        }
        Ok(true)
    }

    /// Forget every in-flight fetch (channel lost). Returns the affected
    /// conversation ids.
    pub fn abandon_fetches(&mut self) -> Vec<String> {
        self.active
            .values_mut()
            .filter_map(|c| c.pagination.abandon().map(|_| c.id.clone()))
            .collect()
    }

    // ── Inbound ────────────────────────────────────────────────

    /// Reconcile a message batch. Returns `None` when the batch is a stale
    /// response and was discarded.
    pub fn apply_inbound_batch(&mut self, batch: MessageBatch) -> Option<BatchReport> {
        let Some(conv) = self.active.get_mut(&batch.conversation_id) else {
            log::debug!(
                "Discarding batch (page {}) for inactive conversation {}",
                batch.page,
                batch.conversation_id
            );
            return None;
        };

        // A history page is stale only while a different fetch is
        // outstanding; unsolicited pages are prepended without touching
        // pagination.
        let mut answers_fetch = false;
        let origin = if batch.is_historical() {
            match conv.pagination.phase() {
                FetchPhase::FetchingOlder
                    if conv.pagination.in_flight_page(FetchKind::Older) == Some(batch.page) =>
                {
                    answers_fetch = true;
                }
                FetchPhase::FetchingOlder | FetchPhase::FetchingInitial => {
                    log::debug!(
                        "Discarding stale history page {} for {} (phase {:?})",
                        batch.page,
                        batch.conversation_id,
                        conv.pagination.phase()
                    );
                    return None;
                }
                FetchPhase::Idle | FetchPhase::Exhausted => {}
            }
            BatchOrigin::Historical
        } else if conv.answers_initial(&batch) {
            BatchOrigin::Initial
        } else {
            BatchOrigin::Live
        };

        let returned = batch.messages.len();
        let out = chat_reconcile::reconcile(
            std::mem::take(&mut conv.messages),
            batch.messages,
            origin.placement(),
        );
        conv.messages = out.messages;
        debug_assert!(chat_reconcile::is_ordered(&conv.messages));

        match origin {
            BatchOrigin::Initial => {
                conv.pagination
                    .complete_initial(conv.messages.len(), batch.total);
                conv.freshness = Freshness::Current;
            }
            BatchOrigin::Historical if answers_fetch => {
                conv.pagination
                    .complete_older(returned, conv.messages.len(), batch.total);
            }
            BatchOrigin::Historical => {}
            BatchOrigin::Live => {}
        }
        conv.prune_controls();

        log::debug!(
            "{:?} batch for {}: +{} (dup {}), now {} messages",
            origin,
            conv.id,
            out.added,
            out.duplicates,
            conv.messages.len()
        );

        Some(BatchReport {
            origin,
            added: out.added,
            duplicates: out.duplicates,
            anomaly: out.anomaly,
        })
    }

    /// Apply a confirmed edit. `None` when the conversation is inactive.
    pub fn apply_edit(
        &mut self,
        conversation_id: &str,
        message_id: &str,
        new_body: &str,
        edited_at: DateTime<Utc>,
    ) -> Option<EditOutcome> {
        let Some(conv) = self.active.get_mut(conversation_id) else {
            log::debug!("Discarding edit for inactive conversation {}", conversation_id);
            return None;
        };
        let outcome = chat_reconcile::apply_edit(&mut conv.messages, message_id, new_body, edited_at);
        match outcome {
            EditOutcome::Missing => log::debug!(
                "Edit for unknown message {} in {} ignored",
                message_id,
                conversation_id
            ),
            EditOutcome::Superseded => log::debug!(
                "Edit for {} in {} older than held copy, ignored",
                message_id,
                conversation_id
            ),
            EditOutcome::Applied => {}
        }
        Some(outcome)
    }

    /// Apply a confirmed delete. Returns the removed message.
    pub fn apply_delete(&mut self, conversation_id: &str, message_id: &str) -> Option<Message> {
        let Some(conv) = self.active.get_mut(conversation_id) else {
            log::debug!("Discarding delete for inactive conversation {}", conversation_id);
            return None;
        };
        let removed = chat_reconcile::apply_delete(&mut conv.messages, message_id);
        if removed.is_some() {
            conv.open_controls.remove(message_id);
        } else {
            log::debug!(
                "Delete for unknown message {} in {} ignored",
                message_id,
                conversation_id
            );
        }
        removed
    }

    // ── Outbound ───────────────────────────────────────────────

    /// Forward an intent to the channel. Local state is untouched; the
    /// confirmation event does the mutation.
    pub fn submit_outbound(&self, intent: &OutboundIntent) -> Result<()> {
        self.channel.submit(intent)
    }

    // ── Transient UI state ─────────────────────────────────────

    /// Flip the controls of a held message. Returns whether they are now open.
    pub fn toggle_controls(&mut self, conversation_id: &str, message_id: &str) -> bool {
        let Some(conv) = self.active.get_mut(conversation_id) else {
            return false;
        };
        if !conv.messages.iter().any(|m| m.id == message_id) {
            return false;
        }
        if conv.open_controls.remove(message_id) {
            false
        } else {
            conv.open_controls.insert(message_id.to_string());
            true
        }
    }

    // ── Queries ────────────────────────────────────────────────

    pub fn conversation(&self, conversation_id: &str) -> Option<&Conversation> {
        self.active.get(conversation_id)
    }

    pub fn messages(&self, conversation_id: &str) -> Option<&[Message]> {
        self.active
            .get(conversation_id)
            .map(|c| c.messages.as_slice())
    }

    pub fn snapshot(&self, conversation_id: &str) -> Option<ConversationSnapshot> {
        let conv = self.active.get(conversation_id)?;
        let mut open_controls: Vec<String> = conv.open_controls.iter().cloned().collect();
        open_controls.sort();
        Some(ConversationSnapshot {
            conversation_id: conv.id.clone(),
            messages: conv.messages.clone(),
            has_more_older: conv.pagination.has_more_older(),
            phase: conv.pagination.phase(),
            freshness: conv.freshness,
            open_controls,
        })
    }

    pub fn retained_count(&self) -> usize {
        self.retained.len()
    }
}
