//! Per-session conversation state and chat messages.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{Catalog, LineKind};

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Author {
    User,
    Assistant,
}

/// One line of chat history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    /// Empty while `pending` (typing placeholder).
    pub content: String,
    pub author: Author,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub hint: LineKind,
    #[serde(default)]
    pub pending: bool,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Author::User, content.into(), LineKind::Chat)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Author::Assistant, content.into(), LineKind::Chat)
    }

    pub fn assistant_with_hint(content: impl Into<String>, hint: LineKind) -> Self {
        Self::new(Author::Assistant, content.into(), hint)
    }

    /// An assistant typing indicator, to be resolved exactly once.
    pub fn placeholder() -> Self {
        Self {
            pending: true,
            ..Self::new(Author::Assistant, String::new(), LineKind::Chat)
        }
    }

    fn new(author: Author, content: String, hint: LineKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            content,
            author,
            timestamp: Utc::now(),
            hint,
            pending: false,
        }
    }
}

/// Progress of one session through the stage catalog.
///
/// Mutated only by the stage engine and the owning session.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationState {
    current_stage_id: String,
    current_question_index: usize,
    completed_stage_ids: BTreeSet<String>,
    answers: BTreeMap<String, String>,
    messages: Vec<Message>,
}

impl ConversationState {
    /// Start state: first catalog stage, question 0, nothing collected.
    pub fn new(catalog: &Catalog) -> Self {
        Self {
            current_stage_id: catalog.initial().id.clone(),
            current_question_index: 0,
            completed_stage_ids: BTreeSet::new(),
            answers: BTreeMap::new(),
            messages: Vec::new(),
        }
    }

    pub fn current_stage_id(&self) -> &str {
        &self.current_stage_id
    }

    pub fn current_question_index(&self) -> usize {
        self.current_question_index
    }

    pub fn completed_stage_ids(&self) -> &BTreeSet<String> {
        &self.completed_stage_ids
    }

    pub fn is_completed(&self, stage_id: &str) -> bool {
        self.completed_stage_ids.contains(stage_id)
    }

    pub fn answers(&self) -> &BTreeMap<String, String> {
        &self.answers
    }

    pub fn answer(&self, question_id: &str) -> Option<&str> {
        self.answers.get(question_id).map(String::as_str)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Whether a typing placeholder is still unresolved.
    pub fn has_pending(&self) -> bool {
        self.messages.iter().any(|m| m.pending)
    }

    /// Reinitialise unconditionally.
    pub(crate) fn reset(&mut self, catalog: &Catalog) {
        *self = Self::new(catalog);
    }

    /// Make `stage_id` current at question 0. Re-entering a stage takes it
    /// out of the completed set.
    pub(crate) fn enter_stage(&mut self, stage_id: &str) {
        self.completed_stage_ids.remove(stage_id);
        self.current_stage_id = stage_id.to_string();
        self.current_question_index = 0;
    }

    pub(crate) fn mark_completed(&mut self, stage_id: &str) {
        self.completed_stage_ids.insert(stage_id.to_string());
    }

    pub(crate) fn advance_question(&mut self) {
        self.current_question_index += 1;
    }

    pub(crate) fn record_answer(&mut self, question_id: &str, text: &str) {
        self.answers
            .insert(question_id.to_string(), text.trim().to_string());
    }

    pub(crate) fn push_message(&mut self, message: Message) -> Uuid {
        let id = message.id;
        self.messages.push(message);
        id
    }

    /// Fill in a pending placeholder. Returns the updated message, or `None`
    /// if `id` is unknown or already resolved.
    pub(crate) fn resolve_placeholder(&mut self, id: Uuid, content: String) -> Option<Message> {
        let message = self.messages.iter_mut().find(|m| m.id == id && m.pending)?;
        message.content = content;
        message.pending = false;
        message.timestamp = Utc::now();
        Some(message.clone())
    }
}
