//! Core data models shared by the chat view, the API client, and the CLI.
//!
//! These types describe the messages and citations that flow from the
//! knowledge-base backend into the rendered conversation.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Source prefix the backend uses for passages retrieved from the knowledge base.
pub const KNOWLEDGE_BASE_PREFIX: &str = "Knowledge Base";

/// One evidentiary source backing part of an assistant answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// The quoted or extracted content.
    pub text: String,
    /// Human-readable origin, e.g. `"Knowledge Base: handbook.pdf"` or a URL.
    pub source: String,
}

impl Citation {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
        }
    }

    /// Whether this citation came from the internal knowledge base rather
    /// than a web search.
    pub fn is_knowledge_base(&self) -> bool {
        self.source.starts_with(KNOWLEDGE_BASE_PREFIX)
    }
}

/// Ordered, immutable list of citations. Position `i` is reference `[i+1]`.
pub type CitationList = Arc<[Citation]>;

/// Who sent a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    /// CSS modifier used in the message markup (`message-user`, `message-ai`).
    pub fn css_class(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "ai",
        }
    }

    /// Label shown above the message body.
    pub fn label(&self) -> &'static str {
        match self {
            Sender::User => "You",
            Sender::Assistant => "AI Assistant",
        }
    }
}

/// Registry key for a message that carries citations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One turn of the conversation, as kept in the session history.
#[derive(Debug, Clone)]
pub struct Message {
    /// Raw text as received (legacy markers not yet rewritten).
    pub text: String,
    pub sender: Sender,
    /// Empty for user messages.
    pub citations: CitationList,
    /// Present only when `citations` is non-empty.
    pub id: Option<MessageId>,
    pub timestamp: DateTime<Local>,
}

// ============ Wire types ============

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
    pub use_knowledge_search: bool,
    pub use_web_search: bool,
}

/// Successful body of `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatResponse {
    pub response: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

/// Error body returned by every endpoint on non-2xx status.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: Option<String>,
}
