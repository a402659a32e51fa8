use std::collections::HashMap;

use crate::api::MemoryMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: Option<String>,
    pub pending: bool,
}

impl Message {
    fn user(content: String) -> Self {
        Self {
            role: Role::User,
            content,
            timestamp: None,
            pending: false,
        }
    }

    fn placeholder() -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            timestamp: None,
            pending: true,
        }
    }
}

/// In-memory chat transcripts, one per `project/category` composite key.
/// Lists are append-only, so a placeholder index recorded at send time
/// stays valid until resolution.
#[derive(Default)]
pub struct ConversationStore {
    conversations: HashMap<String, Vec<Message>>,
    pending: HashMap<String, usize>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self, key: &str) -> &[Message] {
        self.conversations.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }

    /// Start a send: append the user message and a pending placeholder,
    /// returning the placeholder index. Refuses blank text, and refuses a
    /// second send while a placeholder is outstanding for this key.
    pub fn begin_send(&mut self, key: &str, text: &str) -> Option<usize> {
        let text = text.trim();
        if text.is_empty() || self.pending.contains_key(key) {
            return None;
        }
        let messages = self.conversations.entry(key.to_string()).or_default();
        messages.push(Message::user(text.to_string()));
        messages.push(Message::placeholder());
        let index = messages.len() - 1;
        self.pending.insert(key.to_string(), index);
        Some(index)
    }

    /// Finish a send: replace the placeholder at the recorded index with the
    /// reply, or with the error text on failure. If the index no longer
    /// holds a placeholder (the conversation was reset), the reply is
    /// appended rather than dropped.
    pub fn resolve(
        &mut self,
        key: &str,
        index: usize,
        result: Result<(String, Option<String>), String>,
    ) {
        self.pending.remove(key);
        let (content, timestamp) = match result {
            Ok((content, timestamp)) => (content, timestamp),
            Err(error) => (error, None),
        };
        let messages = self.conversations.entry(key.to_string()).or_default();
        match messages.get_mut(index) {
            Some(slot) if slot.pending => {
                slot.content = content;
                slot.timestamp = timestamp;
                slot.pending = false;
            }
            _ => messages.push(Message {
                role: Role::Assistant,
                content,
                timestamp,
                pending: false,
            }),
        }
    }

    /// Append an assistant message outside the send flow (agent action
    /// replies land here).
    pub fn push_assistant(&mut self, key: &str, content: String, timestamp: Option<String>) {
        self.conversations
            .entry(key.to_string())
            .or_default()
            .push(Message {
                role: Role::Assistant,
                content,
                timestamp,
                pending: false,
            });
    }

    /// Install backend memory into a conversation, but only if nothing has
    /// been typed locally yet.
    pub fn seed(&mut self, key: &str, memory: Vec<MemoryMessage>) {
        let entry = self.conversations.entry(key.to_string()).or_default();
        if !entry.is_empty() {
            return;
        }
        *entry = memory
            .into_iter()
            .map(|m| Message {
                role: if m.role == "assistant" {
                    Role::Assistant
                } else {
                    Role::User
                },
                content: m.content,
                timestamp: m.timestamp,
                pending: false,
            })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(role: &str, content: &str) -> MemoryMessage {
        serde_json::from_str(&format!(
            r#"{{"role": "{}", "content": "{}"}}"#,
            role, content
        ))
        .unwrap()
    }

    #[test]
    fn blank_send_is_refused() {
        let mut store = ConversationStore::new();
        assert!(store.begin_send("remote100k/slides", "").is_none());
        assert!(store.begin_send("remote100k/slides", "   \n").is_none());
        assert!(store.messages("remote100k/slides").is_empty());
    }

    #[test]
    fn send_appends_user_then_placeholder() {
        let mut store = ConversationStore::new();
        let index = store.begin_send("remote100k/slides", "hello").unwrap();
        let messages = store.messages("remote100k/slides");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[1].role, Role::Assistant);
        assert!(messages[1].pending);
        assert_eq!(index, 1);
    }

    #[test]
    fn second_send_refused_while_pending() {
        let mut store = ConversationStore::new();
        store.begin_send("remote100k/slides", "first").unwrap();
        assert!(store.begin_send("remote100k/slides", "second").is_none());
        // Other keys are unaffected.
        assert!(store.begin_send("app_304/slides", "other").is_some());
    }

    #[test]
    fn resolve_replaces_placeholder_exactly_once() {
        let mut store = ConversationStore::new();
        let index = store.begin_send("remote100k/slides", "hello").unwrap();
        store.resolve(
            "remote100k/slides",
            index,
            Ok(("hi!".to_string(), Some("2024-01-01T00:00:00Z".to_string()))),
        );
        let messages = store.messages("remote100k/slides");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "hi!");
        assert!(!messages[1].pending);
        assert!(!store.is_pending("remote100k/slides"));
    }

    #[test]
    fn failed_send_leaves_no_pending_message() {
        let mut store = ConversationStore::new();
        let index = store.begin_send("remote100k/slides", "hello").unwrap();
        store.resolve(
            "remote100k/slides",
            index,
            Err("Error: could not reach server".to_string()),
        );
        let messages = store.messages("remote100k/slides");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "Error: could not reach server");
        assert!(messages.iter().all(|m| !m.pending));
        // A new send is allowed again.
        assert!(store.begin_send("remote100k/slides", "retry").is_some());
    }

    #[test]
    fn stale_index_appends_instead_of_dropping() {
        let mut store = ConversationStore::new();
        store.resolve("remote100k/slides", 5, Ok(("late reply".to_string(), None)));
        let messages = store.messages("remote100k/slides");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "late reply");
    }

    #[test]
    fn conversations_are_isolated_by_key() {
        let mut store = ConversationStore::new();
        let index = store.begin_send("remote100k/slides", "hello").unwrap();
        store.resolve("remote100k/slides", index, Ok(("hi".to_string(), None)));
        store.begin_send("app_304/captions", "other").unwrap();
        assert_eq!(store.messages("remote100k/slides").len(), 2);
        assert_eq!(store.messages("remote100k/slides")[0].content, "hello");
        assert_eq!(store.messages("app_304/captions").len(), 2);
    }

    #[test]
    fn seed_only_fills_empty_conversations() {
        let mut store = ConversationStore::new();
        store.seed(
            "remote100k/slides",
            vec![memory("user", "old"), memory("assistant", "reply")],
        );
        assert_eq!(store.messages("remote100k/slides").len(), 2);
        assert_eq!(store.messages("remote100k/slides")[1].role, Role::Assistant);

        // Seeding again must not clobber.
        store.seed("remote100k/slides", vec![memory("user", "newer")]);
        assert_eq!(store.messages("remote100k/slides")[0].content, "old");
    }
}
