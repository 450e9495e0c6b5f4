use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Who produced a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    Patient,
    Assistant,
}

/// One utterance in the consultation transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn patient(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Patient,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Shared state for one consultation session: a typed key/value bag plus the
/// ordered transcript of patient and assistant messages.
///
/// Cloning is cheap; all clones observe the same underlying data.
#[derive(Clone, Debug, Default)]
pub struct Context {
    data: Arc<DashMap<String, Value>>,
    transcript: Arc<Mutex<Vec<ChatMessage>>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, key: impl Into<String>, value: impl Serialize) {
        let value = serde_json::to_value(value).expect("value must serialize to JSON");
        self.data.insert(key.into(), value);
    }

    pub async fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Synchronous read, for edge conditions which cannot await
    pub fn get_sync<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub async fn remove(&self, key: &str) -> Option<Value> {
        self.data.remove(key).map(|(_, v)| v)
    }

    pub async fn clear(&self) {
        self.data.clear();
        self.transcript.lock().unwrap().clear();
    }

    pub async fn add_patient_message(&self, content: impl Into<String>) {
        self.transcript
            .lock()
            .unwrap()
            .push(ChatMessage::patient(content));
    }

    pub async fn add_assistant_message(&self, content: impl Into<String>) {
        self.transcript
            .lock()
            .unwrap()
            .push(ChatMessage::assistant(content));
    }

    /// Full transcript in arrival order
    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.transcript.lock().unwrap().clone()
    }

    /// Patient utterances only, in arrival order
    pub fn patient_messages(&self) -> Vec<String> {
        self.transcript
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.role == ChatRole::Patient)
            .map(|m| m.content.clone())
            .collect()
    }

    /// Number of patient utterances seen so far
    pub fn patient_turns(&self) -> usize {
        self.transcript
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.role == ChatRole::Patient)
            .count()
    }

    /// Last `n` transcript entries
    pub fn recent_transcript(&self, n: usize) -> Vec<ChatMessage> {
        let transcript = self.transcript.lock().unwrap();
        let start = transcript.len().saturating_sub(n);
        transcript[start..].to_vec()
    }
}
