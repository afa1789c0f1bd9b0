//! Chat session state: an ordered transcript of user and assistant turns.
//!
//! The transcript is replayed verbatim as conversation context on every send,
//! so insertion order is load-bearing. Messages are never edited after they
//! are appended; the only mutations are append, remove-by-index and clear.

use serde::{Deserialize, Serialize};

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// A single chat turn. Assistant turns hold the extracted Python snippet,
/// not the prose the model wrapped around it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// Ordered transcript owned by the running session.
#[derive(Debug, Default)]
pub struct ChatHistory {
    messages: Vec<ChatMessage>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, role: ChatRole, content: impl Into<String>) {
        self.messages.push(ChatMessage {
            role,
            content: content.into(),
        });
    }

    /// Remove the turn at `index`. Returns the removed turn, or `None` when
    /// the index is already stale.
    pub fn remove(&mut self, index: usize) -> Option<ChatMessage> {
        if index < self.messages.len() {
            Some(self.messages.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ChatMessage> {
        self.messages.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_insertion_order() {
        let mut history = ChatHistory::new();
        history.append(ChatRole::User, "add a cube");
        history.append(ChatRole::Assistant, "import bpy");
        history.append(ChatRole::User, "make it red");

        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["add a cube", "import bpy", "make it red"]);
        assert_eq!(history.get(1).map(|m| m.role), Some(ChatRole::Assistant));
    }

    #[test]
    fn remove_and_clear_match_vec_semantics() {
        // Reference model: a plain Vec with the same operation sequence.
        let mut history = ChatHistory::new();
        let mut model: Vec<String> = Vec::new();

        let ops: &[(&str, usize)] = &[
            ("append", 0),
            ("append", 0),
            ("append", 0),
            ("remove", 1),
            ("append", 0),
            ("remove", 0),
            ("remove", 9), // stale index, must be a no-op
        ];

        let mut counter = 0;
        for (op, idx) in ops {
            match *op {
                "append" => {
                    let content = format!("turn-{counter}");
                    counter += 1;
                    history.append(ChatRole::User, content.clone());
                    model.push(content);
                }
                "remove" => {
                    let removed = history.remove(*idx);
                    if *idx < model.len() {
                        let expected = model.remove(*idx);
                        assert_eq!(removed.map(|m| m.content), Some(expected));
                    } else {
                        assert!(removed.is_none());
                    }
                }
                _ => unreachable!(),
            }
            assert_eq!(history.len(), model.len());
            let got: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
            let want: Vec<&str> = model.iter().map(|s| s.as_str()).collect();
            assert_eq!(got, want);
        }

        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.len(), 0);
    }
}
