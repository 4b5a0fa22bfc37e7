use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::StoreError;
use crate::llm::Message;

const TITLE_LIMIT: usize = 60;

#[derive(Clone, Debug, Serialize)]
pub struct Conversation {
    pub id: i64,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ConversationSummary {
    pub id: i64,
    pub title: String,
    pub message_count: usize,
    pub updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    conversations: BTreeMap<i64, Conversation>,
}

/// Chat transcripts held in process memory, with at most one running turn
/// per conversation.
#[derive(Default)]
pub struct ConversationStore {
    inner: RwLock<Inner>,
    active: Arc<Mutex<HashSet<i64>>>,
}

/// Marks a conversation busy until dropped.
pub struct TurnGuard {
    id: i64,
    active: Arc<Mutex<HashSet<i64>>>,
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        lock_active(&self.active).remove(&self.id);
    }
}

fn lock_active(active: &Mutex<HashSet<i64>>) -> MutexGuard<'_, HashSet<i64>> {
    active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, first_message: &str) -> Result<Conversation, StoreError> {
        let mut inner = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        inner.next_id += 1;
        let now = Utc::now();
        let conversation = Conversation {
            id: inner.next_id,
            title: title_from(first_message),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        inner.conversations.insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    pub fn get(&self, id: i64) -> Result<Option<Conversation>, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.conversations.get(&id).cloned())
    }

    /// Most recently updated first.
    pub fn list(&self) -> Result<Vec<ConversationSummary>, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        let mut items: Vec<ConversationSummary> = inner
            .conversations
            .values()
            .map(|c| ConversationSummary {
                id: c.id,
                title: c.title.clone(),
                message_count: c.messages.len(),
                updated_at: c.updated_at,
            })
            .collect();
        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(items)
    }

    pub fn append(&self, id: i64, messages: Vec<Message>) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        let conversation = inner
            .conversations
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Conversation with id {} not found", id)))?;
        conversation.messages.extend(messages);
        conversation.updated_at = Utc::now();
        Ok(())
    }

    /// `None` while another turn of the same conversation is running.
    pub fn begin_turn(&self, id: i64) -> Option<TurnGuard> {
        let mut active = lock_active(&self.active);
        if !active.insert(id) {
            return None;
        }
        Some(TurnGuard {
            id,
            active: self.active.clone(),
        })
    }
}

fn title_from(message: &str) -> String {
    let line = message.lines().next().unwrap_or_default().trim();
    let mut title: String = line.chars().take(TITLE_LIMIT).collect();
    if line.chars().count() > TITLE_LIMIT {
        title.push_str("...");
    }
    if title.is_empty() {
        title = "New conversation".to_string();
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turns_are_exclusive_per_conversation() {
        let store = ConversationStore::new();
        let convo = store.create("Find me Rust jobs in Berlin").unwrap();
        let guard = store.begin_turn(convo.id).unwrap();
        assert!(store.begin_turn(convo.id).is_none());
        drop(guard);
        assert!(store.begin_turn(convo.id).is_some());
    }

    #[test]
    fn append_extends_history() {
        let store = ConversationStore::new();
        let convo = store.create("hi").unwrap();
        store
            .append(convo.id, vec![Message::user("hi"), Message::assistant("hello", Vec::new())])
            .unwrap();
        assert_eq!(store.get(convo.id).unwrap().unwrap().messages.len(), 2);
        assert!(store.append(99, Vec::new()).is_err());
        assert_eq!(store.list().unwrap()[0].message_count, 2);
    }

    #[test]
    fn long_titles_are_shortened() {
        let title = title_from(&"x".repeat(100));
        assert_eq!(title.chars().count(), TITLE_LIMIT + 3);
    }
}
