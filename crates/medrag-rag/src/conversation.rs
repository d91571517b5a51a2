//! Caller-owned chat history. The pipelines themselves are stateless.
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use medrag_core::types::{QueryResult, RetrievedChunk};

use crate::answer::classify_answer;

pub const MAX_MESSAGES: usize = 6;

pub const UNABLE_TO_GENERATE: &str = "Unable to generate a complete answer. \
     Please try rephrasing your question or check that the Ollama service is running.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Set on assistant answers that were actually generated.
    pub confidence: Option<u8>,
    pub sources: Vec<RetrievedChunk>,
    pub insufficient_context: bool,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), confidence: None, sources: Vec::new(), insufficient_context: false }
    }

    fn assistant_failure() -> Self {
        Self {
            role: Role::Assistant,
            content: UNABLE_TO_GENERATE.to_string(),
            confidence: None,
            sources: Vec::new(),
            insufficient_context: true,
        }
    }
}

/// The last [`MAX_MESSAGES`] messages, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    messages: VecDeque<Message>,
    capacity: usize,
}

impl Default for Conversation {
    fn default() -> Self { Self::with_capacity(MAX_MESSAGES) }
}

impl Conversation {
    pub fn new() -> Self { Self::default() }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { messages: VecDeque::with_capacity(capacity), capacity: capacity.max(1) }
    }

    /// Append the user's question and the assistant's reply. Failed or
    /// sentinel answers are replaced by [`UNABLE_TO_GENERATE`].
    pub fn record(&mut self, question: &str, result: &QueryResult) {
        self.push(Message::user(question));
        let reply = if result.is_failed() || !classify_answer(&result.answer).is_usable() {
            Message::assistant_failure()
        } else {
            Message {
                role: Role::Assistant,
                content: result.answer.clone(),
                confidence: Some(result.confidence),
                sources: result.retrieved_chunks.clone(),
                insufficient_context: result.insufficient_context,
            }
        };
        self.push(reply);
    }

    /// Record a question whose pipeline call returned an error.
    pub fn record_error(&mut self, question: &str) {
        self.push(Message::user(question));
        self.push(Message::assistant_failure());
    }

    fn push(&mut self, message: Message) {
        self.messages.push_back(message);
        while self.messages.len() > self.capacity {
            self.messages.pop_front();
        }
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> { self.messages.iter() }

    pub fn last_user_question(&self) -> Option<&str> {
        self.messages.iter().rev().find(|m| m.role == Role::User).map(|m| m.content.as_str())
    }

    pub fn len(&self) -> usize { self.messages.len() }

    pub fn is_empty(&self) -> bool { self.messages.is_empty() }

    pub fn clear(&mut self) { self.messages.clear() }
}
