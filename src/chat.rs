//! Conversational front-end over a generation client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::notifications::NotificationSink;
use crate::providers::{GenerationClient, ProviderError};

/// Context entries carried over from earlier turns
const MAX_CONTEXT: usize = 8;
/// Context entries attached to each assistant message
const MESSAGE_CONTEXT: usize = 5;
const SUMMARY_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

pub struct ChatSession {
    client: Arc<dyn GenerationClient>,
    notifier: Arc<dyn NotificationSink>,
    messages: Vec<ChatMessage>,
    context: Vec<String>,
}

impl ChatSession {
    pub fn new(client: Arc<dyn GenerationClient>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self {
            client,
            notifier,
            messages: Vec::new(),
            context: Vec::new(),
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn context(&self) -> &[String] {
        &self.context
    }

    fn build_prompt(&self, input: &str) -> String {
        let context = if self.context.is_empty() {
            String::new()
        } else {
            format!("Previous conversation context: {}\n\n", self.context.join(" "))
        };
        format!(
            "You are a specialized, intelligent AI assistant. Answer in a helpful, accurate and contextual way.\n{}User question: {}",
            context, input
        )
    }

    /// Sends a user message and records the reply.
    ///
    /// Blank input is ignored and yields `Ok(None)`. A provider failure is
    /// reported through the notification sink and returned; the user message
    /// stays in the history.
    pub async fn send(&mut self, input: &str) -> Result<Option<ChatMessage>, ProviderError> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(None);
        }

        self.messages.push(ChatMessage {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::User,
            content: input.to_string(),
            timestamp: Utc::now(),
            context: Vec::new(),
        });

        let prompt = self.build_prompt(input);
        let text = match self.client.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(provider = self.client.name(), error = %e, "Generation failed");
                self.notifier.error(
                    "Error",
                    "Failed to generate a response. Check your connection and API key.",
                );
                return Err(e);
            }
        };

        let keep_from = self.context.len().saturating_sub(MESSAGE_CONTEXT);
        let reply = ChatMessage {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content: text.clone(),
            timestamp: Utc::now(),
            context: self.context[keep_from..].to_vec(),
        };
        self.messages.push(reply.clone());

        let excess = self.context.len().saturating_sub(MAX_CONTEXT);
        self.context.drain(..excess);
        self.context.push(format!("User: {}", input));
        let summary: String = text.chars().take(SUMMARY_CHARS).collect();
        self.context.push(format!("Assistant: {}...", summary));

        Ok(Some(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::MemorySink;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Recorder {
        prompts: Mutex<Vec<String>>,
        fail: bool,
    }

    impl Recorder {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                prompts: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    #[async_trait]
    impl GenerationClient for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.fail {
                Err(ProviderError::Network("offline".to_string()))
            } else {
                Ok("x".repeat(300))
            }
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
            Ok(vec![0.0; 4])
        }
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let client = Recorder::new(false);
        let mut chat = ChatSession::new(client.clone(), Arc::new(MemorySink::new()));
        assert_eq!(chat.send("   ").await.unwrap(), None);
        assert!(chat.messages().is_empty());
        assert!(client.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_context_carries_into_next_prompt() {
        let client = Recorder::new(false);
        let mut chat = ChatSession::new(client.clone(), Arc::new(MemorySink::new()));

        chat.send("first question").await.unwrap();
        assert_eq!(chat.context().len(), 2);
        assert_eq!(chat.context()[0], "User: first question");
        assert_eq!(chat.context()[1], format!("Assistant: {}...", "x".repeat(200)));

        chat.send("second question").await.unwrap();
        let prompts = client.prompts.lock().unwrap();
        assert!(!prompts[0].contains("Previous conversation context"));
        assert!(prompts[1].contains("Previous conversation context: User: first question"));
        assert!(prompts[1].ends_with("User question: second question"));
    }

    #[tokio::test]
    async fn test_context_window_is_bounded() {
        let client = Recorder::new(false);
        let mut chat = ChatSession::new(client, Arc::new(MemorySink::new()));
        for i in 0..10 {
            chat.send(&format!("question {}", i)).await.unwrap();
        }
        assert_eq!(chat.context().len(), MAX_CONTEXT + 2);
        assert_eq!(chat.context()[MAX_CONTEXT], "User: question 9");

        let last = chat.messages().last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.context.len(), MESSAGE_CONTEXT);
    }

    #[tokio::test]
    async fn test_provider_error_is_reported_not_fatal() {
        let sink = MemorySink::new();
        let mut chat = ChatSession::new(Recorder::new(true), Arc::new(sink.clone()));

        let err = chat.send("hello").await.unwrap_err();
        assert_eq!(err, ProviderError::Network("offline".to_string()));
        assert_eq!(chat.messages().len(), 1);
        assert!(chat.context().is_empty());
        assert_eq!(sink.titles(), vec!["Error".to_string()]);
    }
}
