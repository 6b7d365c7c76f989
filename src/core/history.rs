//! Conversation history shared with the model on every call.
//!
//! A history only grows in user/assistant pairs: a generation call appends its
//! prompt and answer together once the answer is complete, and leaves the
//! history untouched when it fails.

use serde::{Deserialize, Serialize};

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    role: Role,
    content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// The ordered, append-only log of turns of one conversation.
///
/// The order of turns is the literal context sent to the model on every call.
/// Only a [`StreamingSession`](crate::core::StreamingSession) extends it during
/// generation, and it never leaves a partial assistant turn behind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a history pre-filled with earlier turns.
    ///
    /// # Example
    /// ```
    /// use autoreview::core::ConversationHistory;
    ///
    /// let history = ConversationHistory::builder()
    ///     .user("Review this paragraph.")
    ///     .assistant("It reads well.")
    ///     .build();
    /// assert_eq!(history.len(), 2);
    /// ```
    pub fn builder() -> HistoryBuilder {
        HistoryBuilder::default()
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// A snapshot of the turns, in order, for the call about to be made.
    pub fn as_context(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    /// Drops every turn past `len`. Used to undo a failed generation.
    pub(crate) fn rollback(&mut self, len: usize) {
        self.turns.truncate(len);
    }
}

impl From<Vec<Turn>> for ConversationHistory {
    fn from(turns: Vec<Turn>) -> Self {
        Self { turns }
    }
}

impl<'a> IntoIterator for &'a ConversationHistory {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}

/// Builder for seeding a [`ConversationHistory`].
#[derive(Debug, Clone, Default)]
pub struct HistoryBuilder {
    turns: Vec<Turn>,
}

impl HistoryBuilder {
    pub fn user(mut self, content: impl Into<String>) -> Self {
        self.turns.push(Turn::user(content));
        self
    }

    pub fn assistant(mut self, content: impl Into<String>) -> Self {
        self.turns.push(Turn::assistant(content));
        self
    }

    pub fn build(self) -> ConversationHistory {
        ConversationHistory { turns: self.turns }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_keeps_insertion_order() {
        let mut history = ConversationHistory::new();
        history.append(Turn::user("first"));
        history.append(Turn::assistant("second"));
        history.append(Turn::user("third"));

        let contents: Vec<&str> = history.iter().map(Turn::content).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert_eq!(history.last().map(Turn::role), Some(Role::User));
    }

    #[test]
    fn test_context_is_a_snapshot() {
        let mut history = ConversationHistory::builder().user("hello").build();
        let context = history.as_context();
        history.append(Turn::assistant("hi"));

        assert_eq!(context, vec![Turn::user("hello")]);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_rollback_restores_previous_length() {
        let mut history = ConversationHistory::builder()
            .user("a")
            .assistant("b")
            .build();
        history.append(Turn::user("c"));
        history.rollback(2);

        assert_eq!(history.len(), 2);
        assert_eq!(history.last(), Some(&Turn::assistant("b")));
    }

    #[test]
    fn test_turn_serializes_with_lowercase_role() {
        let json = serde_json::to_value(Turn::assistant("done")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "assistant", "content": "done"}));
    }
}
