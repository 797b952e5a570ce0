//! Merges inbound batches and mutations into a conversation's ordered
//! message sequence.
//!
//! Everything here is a pure function of the current sequence and the
//! inbound data. Invariants after every call:
//! - no two messages share an `id`
//! - `sent_at` is non-decreasing
//!
//! Anything keyed by position in the sequence is invalid after a call.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use super::chat_types::Message;

/// Where an inbound batch lands relative to the existing sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Initial page: the batch is the authoritative current tail.
    Replace,
    /// Older history page: goes in front of everything held.
    Prepend,
    /// Live arrival: merged into the tail.
    Merge,
}

/// Result of reconciling one batch.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub messages: Vec<Message>,
    /// Messages from the batch that made it into the sequence.
    pub added: usize,
    /// Messages from the batch dropped because their id was already held.
    pub duplicates: usize,
    /// The historical batch overlapped the held range and was re-sorted.
    pub anomaly: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Applied,
    /// No message with that id is held.
    Missing,
    /// The held copy carries a newer edit.
    Superseded,
}

/// Merge `incoming` into `current` according to `placement`.
pub fn reconcile(current: Vec<Message>, incoming: Vec<Message>, placement: Placement) -> Reconciled {
    let offered = incoming.len();

    let held: HashSet<String> = match placement {
        Placement::Replace => HashSet::new(),
        Placement::Prepend | Placement::Merge => current.iter().map(|m| m.id.clone()).collect(),
    };
    let mut fresh = dedup(incoming, &held);
    sort_by_sent_at(&mut fresh);
    let added = fresh.len();
    let duplicates = offered - added;

    let (messages, anomaly) = match placement {
        Placement::Replace => (fresh, false),
        _ if fresh.is_empty() => (current, false),
        Placement::Prepend => prepend(current, fresh),
        Placement::Merge => (merge_tail(current, fresh), false),
    };

    Reconciled {
        messages,
        added,
        duplicates,
        anomaly,
    }
}

fn prepend(current: Vec<Message>, mut fresh: Vec<Message>) -> (Vec<Message>, bool) {
    let fits = match (fresh.last(), current.first()) {
        (Some(last_new), Some(first_held)) => last_new.sent_at <= first_held.sent_at,
        _ => true,
    };

    if fits {
        fresh.extend(current);
        return (fresh, false);
    }

    if let (Some(last_new), Some(first_held)) = (fresh.last(), current.first()) {
        log::warn!(
            "Reconciliation anomaly: historical batch ends at {} ({}) after held sequence starts at {} ({}); re-sorting union",
            last_new.sent_at,
            last_new.id,
            first_held.sent_at,
            first_held.id
        );
    }
    fresh.extend(current);
    sort_by_sent_at(&mut fresh);
    (fresh, true)
}

fn merge_tail(mut current: Vec<Message>, fresh: Vec<Message>) -> Vec<Message> {
    let in_order = match (current.last(), fresh.first()) {
        (Some(last_held), Some(first_new)) => last_held.sent_at <= first_new.sent_at,
        _ => true,
    };
    current.extend(fresh);
    if !in_order {
        // Stable: on equal timestamps held messages stay ahead of new ones.
        sort_by_sent_at(&mut current);
    }
    current
}

/// Drop messages whose id is in `held` or repeated within the batch
/// (first occurrence wins).
fn dedup(incoming: Vec<Message>, held: &HashSet<String>) -> Vec<Message> {
    let mut seen: HashSet<String> = HashSet::with_capacity(incoming.len());
    incoming
        .into_iter()
        .filter(|m| !held.contains(&m.id) && seen.insert(m.id.clone()))
        .collect()
}

fn sort_by_sent_at(messages: &mut [Message]) {
    messages.sort_by_key(|m| m.sent_at);
}

/// Replace the body of message `id` in place. Position never changes.
pub fn apply_edit(
    messages: &mut [Message],
    id: &str,
    new_body: &str,
    edited_at: DateTime<Utc>,
) -> EditOutcome {
    let Some(msg) = messages.iter_mut().find(|m| m.id == id) else {
        return EditOutcome::Missing;
    };
    if msg.edited_at.is_some_and(|prev| prev > edited_at) {
        return EditOutcome::Superseded;
    }
    msg.body = new_body.to_string();
    msg.edited_at = Some(edited_at);
    EditOutcome::Applied
}

/// Remove message `id`, returning it if it was held.
pub fn apply_delete(messages: &mut Vec<Message>, id: &str) -> Option<Message> {
    let idx = messages.iter().position(|m| m.id == id)?;
    Some(messages.remove(idx))
}

/// True when `sent_at` never decreases along the sequence.
pub fn is_ordered(messages: &[Message]) -> bool {
    messages.windows(2).all(|w| w[0].sent_at <= w[1].sent_at)
}
