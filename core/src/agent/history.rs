use crate::sandbox::Value;
use crate::traits::{Message, Role};
use serde::{Deserialize, Serialize};

pub const SYSTEM_SENDER: &str = "system";
pub const USER_SENDER: &str = "user";

fn default_include_in_chat() -> bool {
    true
}

/// One message in a conversation, tagged with who produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub sender: String,
    pub message: Message,
    #[serde(default = "default_include_in_chat")]
    pub include_in_chat: bool,
}

impl ChatEntry {
    pub fn new(sender: impl Into<String>, message: Message) -> Self {
        Self {
            sender: sender.into(),
            message,
            include_in_chat: true,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.include_in_chat = false;
        self
    }

    pub fn role(&self) -> Role {
        self.message.role
    }

    pub fn content(&self) -> &str {
        &self.message.content
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    entries: Vec<ChatEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChatEntry> {
        self.entries.iter()
    }

    pub fn push(&mut self, entry: ChatEntry) {
        self.entries.push(entry);
    }

    pub fn init_or_extend(mut self, task: &str, system_prompt: impl FnOnce() -> String) -> Self {
        if self.entries.is_empty() {
            self.entries
                .push(ChatEntry::new(SYSTEM_SENDER, Message::system(system_prompt())));
        }
        if !task.is_empty() {
            self.entries
                .push(ChatEntry::new(USER_SENDER, Message::user(task)));
        }
        self
    }

    pub fn merge_foreign(&mut self, entries: impl IntoIterator<Item = ChatEntry>) {
        self.entries
            .extend(entries.into_iter().map(ChatEntry::hidden));
    }

    pub fn chat_messages(&self) -> Vec<Message> {
        self.entries
            .iter()
            .filter(|entry| entry.include_in_chat)
            .map(|entry| entry.message.clone())
            .collect()
    }

    pub fn last_message(&self) -> Option<&ChatEntry> {
        self.entries.last()
    }

    pub fn to_value(&self) -> Value {
        Value::List(self.entries.iter().cloned().map(Value::from).collect())
    }

    pub fn into_entries(self) -> Vec<ChatEntry> {
        self.entries
    }
}

impl From<Vec<ChatEntry>> for History {
    fn from(entries: Vec<ChatEntry>) -> Self {
        Self { entries }
    }
}

impl IntoIterator for History {
    type Item = ChatEntry;
    type IntoIter = std::vec::IntoIter<ChatEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a ChatEntry;
    type IntoIter = std::slice::Iter<'a, ChatEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_is_created_once() {
        let mut calls = 0;
        let history = History::new().init_or_extend("first", || {
            calls += 1;
            "prompt".to_string()
        });
        let history = history.init_or_extend("second", || {
            calls += 1;
            "other".to_string()
        });

        assert_eq!(calls, 1);
        assert_eq!(history.len(), 3);
        assert_eq!(history.entries()[0].role(), Role::System);
        assert_eq!(history.entries()[0].sender, "system");
        assert_eq!(history.entries()[2].content(), "second");
    }

    #[test]
    fn empty_task_means_continue() {
        let history = History::new().init_or_extend("", || "prompt".into());
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn foreign_entries_are_hidden_from_chat() {
        let mut history = History::new().init_or_extend("task", || "prompt".into());
        history.merge_foreign(vec![ChatEntry::new("seller", Message::assistant("sold"))]);

        assert_eq!(history.len(), 3);
        assert!(!history.entries()[2].include_in_chat);
        assert_eq!(history.chat_messages().len(), 2);
    }

    #[test]
    fn include_in_chat_defaults_to_true_when_deserialized() {
        let entry: ChatEntry = serde_json::from_value(serde_json::json!({
            "sender": "user",
            "message": {"role": "user", "content": "hi"}
        }))
        .unwrap();
        assert!(entry.include_in_chat);
    }
}
