//! Outbound message correlation registry.
//!
//! [`MessageRegistry`] remembers what was sent where, so a later answer can
//! edit an earlier message. Storage is a bounded FIFO per chat plus two
//! secondary indexes (by correlation key, by handler name). Every record in an
//! index is also in its chat's FIFO: when a chat overflows, the oldest record
//! is removed from both indexes before the new one is appended.
//!
//! "Most recent" always means insertion order, never platform timestamps.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use botty_core::{Answer, ChatId, MessageDescriptor, MessageId};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, trace};

/// Default bound of the per-chat FIFO.
pub const DEFAULT_MAX_PER_CHAT: usize = 100;

/// A delivered message, as recorded in the registry. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageRecord {
    pub message_id: MessageId,
    pub chat_id: ChatId,
    pub handler_name: Option<String>,
    /// Unix timestamp (seconds).
    pub timestamp: i64,
    pub metadata: Map<String, Value>,
    pub key: Option<String>,
    /// Global insertion sequence number.
    #[serde(skip)]
    seq: u64,
}

impl MessageRecord {
    /// Time elapsed since the record's timestamp.
    pub fn age(&self) -> Duration {
        let now = unix_now();
        Duration::from_secs(now.saturating_sub(self.timestamp).max(0) as u64)
    }

    pub fn is_older_than(&self, max_age: Duration) -> bool {
        self.age() > max_age
    }

    /// Insertion sequence number. Higher is more recent.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

#[derive(Default)]
struct RegistryState {
    next_seq: u64,
    chats: HashMap<ChatId, VecDeque<Arc<MessageRecord>>>,
    by_key: HashMap<(ChatId, String), Arc<MessageRecord>>,
    by_handler: HashMap<String, Vec<Arc<MessageRecord>>>,
}

impl RegistryState {
    /// Drops an evicted record from the secondary indexes.
    fn unindex(&mut self, evicted: &MessageRecord) {
        if let Some(key) = &evicted.key {
            let index_key = (evicted.chat_id, key.clone());
            if self
                .by_key
                .get(&index_key)
                .is_some_and(|r| r.seq == evicted.seq)
            {
                self.by_key.remove(&index_key);
            }
        }

        if let Some(handler) = &evicted.handler_name {
            if let Some(records) = self.by_handler.get_mut(handler) {
                records.retain(|r| r.seq != evicted.seq);
                if records.is_empty() {
                    self.by_handler.remove(handler);
                }
            }
        }
    }

    fn latest_for_handler(&self, handler: &str, chat_id: ChatId) -> Option<&Arc<MessageRecord>> {
        self.by_handler
            .get(handler)?
            .iter()
            .rev()
            .find(|r| r.chat_id == chat_id)
    }
}

/// Bounded, multi-indexed store of delivered messages.
///
/// All state sits behind one lock: the key and handler indexes span chats, so
/// per-chat locking would still need a global lock for them. Critical sections
/// are short and never held across an `.await`.
pub struct MessageRegistry {
    max_per_chat: usize,
    state: Mutex<RegistryState>,
}

impl Default for MessageRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PER_CHAT)
    }
}

impl MessageRegistry {
    /// Creates a registry keeping at most `max_per_chat` records per chat.
    /// A bound of zero is raised to one.
    pub fn new(max_per_chat: usize) -> Self {
        Self {
            max_per_chat: max_per_chat.max(1),
            state: Mutex::new(RegistryState::default()),
        }
    }

    pub fn max_per_chat(&self) -> usize {
        self.max_per_chat
    }

    /// Records a delivered message.
    ///
    /// If the chat is full, its oldest record is evicted (and unindexed)
    /// before the new one is appended. A key already pointing at another
    /// record in the same chat is re-pointed to the new one.
    pub fn register(
        &self,
        descriptor: &MessageDescriptor,
        handler_name: Option<&str>,
        key: Option<&str>,
        metadata: Option<Map<String, Value>>,
    ) -> Arc<MessageRecord> {
        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;

        let record = Arc::new(MessageRecord {
            message_id: descriptor.message_id,
            chat_id: descriptor.chat_id,
            handler_name: handler_name.map(str::to_string),
            timestamp: descriptor.timestamp.unwrap_or_else(unix_now),
            metadata: metadata.unwrap_or_default(),
            key: key.map(str::to_string),
            seq,
        });

        let max = self.max_per_chat;
        let mut evicted = Vec::new();
        {
            let queue = state.chats.entry(record.chat_id).or_default();
            while queue.len() >= max {
                match queue.pop_front() {
                    Some(oldest) => evicted.push(oldest),
                    None => break,
                }
            }
        }
        for oldest in &evicted {
            trace!(
                chat_id = oldest.chat_id,
                message_id = oldest.message_id,
                "Evicting oldest message record"
            );
            state.unindex(oldest);
        }

        state
            .chats
            .entry(record.chat_id)
            .or_default()
            .push_back(Arc::clone(&record));

        if let Some(key) = &record.key {
            if let Some(previous) = state
                .by_key
                .insert((record.chat_id, key.clone()), Arc::clone(&record))
            {
                debug!(
                    key = %key,
                    chat_id = record.chat_id,
                    previous = previous.message_id,
                    current = record.message_id,
                    "Message key re-pointed"
                );
            }
        }

        if let Some(handler) = &record.handler_name {
            state
                .by_handler
                .entry(handler.clone())
                .or_default()
                .push(Arc::clone(&record));
        }

        debug!(
            chat_id = record.chat_id,
            message_id = record.message_id,
            handler = record.handler_name.as_deref().unwrap_or("-"),
            "Registered message"
        );
        record
    }

    /// Picks the message an edit should target. First match wins:
    ///
    /// 1. the answer's explicit message id;
    /// 2. the answer's key, within `chat_id`;
    /// 3. the latest message in `chat_id` from the answer's handler override;
    /// 4. the latest message in `chat_id` from `current_handler`;
    /// 5. the latest message in `chat_id`.
    ///
    /// `None` means the transport should send a fresh message.
    pub fn find_edit_target(
        &self,
        answer: &Answer,
        chat_id: ChatId,
        current_handler: &str,
    ) -> Option<MessageId> {
        if let Some(id) = answer.target_message_id() {
            trace!(message_id = id, "Edit target from explicit id");
            return Some(id);
        }

        let state = self.state.lock();

        if let Some(key) = &answer.key {
            if let Some(record) = state.by_key.get(&(chat_id, key.clone())) {
                trace!(message_id = record.message_id, key = %key, "Edit target from key");
                return Some(record.message_id);
            }
        }

        if let Some(handler) = &answer.handler_name {
            if let Some(record) = state.latest_for_handler(handler, chat_id) {
                trace!(message_id = record.message_id, handler = %handler, "Edit target from handler override");
                return Some(record.message_id);
            }
        }

        if let Some(record) = state.latest_for_handler(current_handler, chat_id) {
            trace!(message_id = record.message_id, handler = current_handler, "Edit target from current handler");
            return Some(record.message_id);
        }

        let latest = state.chats.get(&chat_id).and_then(|q| q.back());
        if let Some(record) = latest {
            trace!(message_id = record.message_id, "Edit target from latest in chat");
        }
        latest.map(|r| r.message_id)
    }

    // ─── Queries ──────────────────────────────────────────────────────────────

    /// The most recent record in `chat_id`.
    pub fn last_in_chat(&self, chat_id: ChatId) -> Option<Arc<MessageRecord>> {
        self.state.lock().chats.get(&chat_id)?.back().cloned()
    }

    /// The record currently registered under `key` in `chat_id`.
    pub fn get_by_key(&self, chat_id: ChatId, key: &str) -> Option<Arc<MessageRecord>> {
        self.state
            .lock()
            .by_key
            .get(&(chat_id, key.to_string()))
            .cloned()
    }

    /// Records from `handler`, most recent first, optionally restricted to one
    /// chat and capped at `limit`.
    pub fn get_by_handler(
        &self,
        handler: &str,
        chat_id: Option<ChatId>,
        limit: Option<usize>,
    ) -> Vec<Arc<MessageRecord>> {
        let state = self.state.lock();
        let Some(records) = state.by_handler.get(handler) else {
            return Vec::new();
        };
        records
            .iter()
            .rev()
            .filter(|r| chat_id.is_none_or(|c| r.chat_id == c))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Records in `chat_id`, most recent first, capped at `limit`.
    pub fn all_for_chat(&self, chat_id: ChatId, limit: Option<usize>) -> Vec<Arc<MessageRecord>> {
        let state = self.state.lock();
        state
            .chats
            .get(&chat_id)
            .map(|q| {
                q.iter()
                    .rev()
                    .take(limit.unwrap_or(usize::MAX))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Total number of records across all chats.
    pub fn len(&self) -> usize {
        self.state.lock().chats.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets everything.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.chats.clear();
        state.by_key.clear();
        state.by_handler.clear();
    }
}

impl std::fmt::Debug for MessageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MessageRegistry")
            .field("max_per_chat", &self.max_per_chat)
            .field("chats", &state.chats.len())
            .field("keys", &state.by_key.len())
            .field("handlers", &state.by_handler.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sent(chat_id: ChatId, message_id: MessageId) -> MessageDescriptor {
        MessageDescriptor::new(chat_id, message_id)
    }

    #[test]
    fn test_register_and_query() {
        let registry = MessageRegistry::default();
        registry.register(&sent(1, 10), Some("start"), Some("welcome"), None);
        registry.register(&sent(1, 11), Some("start"), None, None);
        registry.register(&sent(2, 20), Some("start"), None, None);

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.last_in_chat(1).unwrap().message_id, 11);
        assert_eq!(registry.get_by_key(1, "welcome").unwrap().message_id, 10);
        assert!(registry.get_by_key(2, "welcome").is_none());

        let ids: Vec<_> = registry
            .get_by_handler("start", None, None)
            .iter()
            .map(|r| r.message_id)
            .collect();
        assert_eq!(ids, vec![20, 11, 10]);

        let ids: Vec<_> = registry
            .get_by_handler("start", Some(1), Some(1))
            .iter()
            .map(|r| r.message_id)
            .collect();
        assert_eq!(ids, vec![11]);

        let ids: Vec<_> = registry
            .all_for_chat(1, None)
            .iter()
            .map(|r| r.message_id)
            .collect();
        assert_eq!(ids, vec![11, 10]);
    }

    #[test]
    fn test_eviction_removes_oldest_from_all_indexes() {
        let max = 3;
        let registry = MessageRegistry::new(max);
        for id in 0..=max as i64 {
            let key = format!("k{id}");
            registry.register(&sent(1, id), Some("h"), Some(&key), None);
        }

        assert_eq!(registry.all_for_chat(1, None).len(), max);
        assert!(registry.get_by_key(1, "k0").is_none());
        assert!(registry.get_by_key(1, "k1").is_some());
        assert!(
            registry
                .get_by_handler("h", None, None)
                .iter()
                .all(|r| r.message_id != 0)
        );
        assert_eq!(registry.get_by_handler("h", None, None).len(), max);
    }

    #[test]
    fn test_eviction_keeps_repointed_key() {
        let registry = MessageRegistry::new(2);
        registry.register(&sent(1, 1), None, Some("k"), None);
        registry.register(&sent(1, 2), None, Some("k"), None);
        // evicts message 1, whose key now points at message 2
        registry.register(&sent(1, 3), None, None, None);

        assert_eq!(registry.get_by_key(1, "k").unwrap().message_id, 2);
    }

    #[test]
    fn test_eviction_is_per_chat() {
        let registry = MessageRegistry::new(1);
        registry.register(&sent(1, 1), None, None, None);
        registry.register(&sent(2, 2), None, None, None);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_find_edit_target_priority() {
        let registry = MessageRegistry::default();
        registry.register(&sent(1, 100), Some("h1"), Some("a"), None);
        registry.register(&sent(1, 101), Some("h2"), None, None);
        registry.register(&sent(1, 102), Some("h1"), None, None);
        registry.register(&sent(1, 103), Some("h3"), None, None);

        let edit = Answer::edit("x");
        assert_eq!(
            registry.find_edit_target(&edit.clone().key("a"), 1, "h2"),
            Some(100)
        );
        assert_eq!(
            registry.find_edit_target(&edit.clone().from_handler("h1"), 1, "h2"),
            Some(102)
        );
        assert_eq!(registry.find_edit_target(&edit, 1, "h2"), Some(101));
        assert_eq!(registry.find_edit_target(&edit, 1, "h9"), Some(103));
        assert_eq!(registry.find_edit_target(&edit, 2, "h1"), None);
        assert_eq!(
            registry.find_edit_target(&edit.clone().message_id(555), 1, "h1"),
            Some(555)
        );
    }

    #[test]
    fn test_key_lookup_is_scoped_to_chat() {
        let registry = MessageRegistry::default();
        registry.register(&sent(1, 10), Some("h"), Some("cd"), None);
        registry.register(&sent(2, 20), Some("other"), None, None);

        let edit = Answer::edit("x").key("cd");
        assert_eq!(registry.find_edit_target(&edit, 2, "h"), Some(20));
    }

    #[test]
    fn test_metadata_and_timestamp_are_kept() {
        let registry = MessageRegistry::default();
        let mut metadata = Map::new();
        metadata.insert("step".into(), Value::from(2));
        let record = registry.register(&sent(1, 1).at(1_000), None, None, Some(metadata));

        assert_eq!(record.timestamp, 1_000);
        assert_eq!(record.metadata["step"], 2);
        assert!(record.is_older_than(Duration::from_secs(60)));
    }

    #[test]
    fn test_clear() {
        let registry = MessageRegistry::default();
        registry.register(&sent(1, 1), Some("h"), Some("k"), None);
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.get_by_key(1, "k").is_none());
        assert!(registry.get_by_handler("h", None, None).is_empty());
    }
}
