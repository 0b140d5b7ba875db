//! Conversation messages
//!
//! The message log is the backbone of a thread: routing reads it, handlers
//! append to it, and the history endpoint returns it.

use crate::types::{HandlerId, MessageId, ToolCallId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message from the system
    System,
    /// Message from the user
    User,
    /// Message from the AI assistant
    Assistant,
    /// Tool execution result
    Tool,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

/// A structured request to run a tool before the conversation continues
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: ToolCallId,
    pub name: String,
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

impl ToolCall {
    pub fn new(
        name: impl Into<String>,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: ToolCallId::new(),
            name: name.into(),
            arguments,
        }
    }
}

/// A single message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier for the message
    pub id: MessageId,
    /// Role of the message sender
    pub role: MessageRole,
    /// Content of the message
    pub content: String,
    /// Handler that wrote an assistant message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<HandlerId>,
    /// Tool requests carried by an assistant message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// For tool messages: the request this is the result of
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<ToolCallId>,
    /// For tool messages: the tool that produced the result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Timestamp when the message was created
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn with_role(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content: content.into(),
            author: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
            created_at: Utc::now(),
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::System, content)
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::User, content)
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Assistant, content)
    }

    /// Assistant message written by a specific handler
    pub fn from_handler(author: HandlerId, content: impl Into<String>) -> Self {
        let mut message = Self::assistant(content);
        message.author = Some(author);
        message
    }

    /// Assistant message that asks the executor to run tools
    pub fn tool_request(author: HandlerId, calls: Vec<ToolCall>) -> Self {
        let mut message = Self::from_handler(author, "");
        message.tool_calls = calls;
        message
    }

    /// Tool result answering `call`
    pub fn tool_result(call: &ToolCall, content: impl Into<String>) -> Self {
        let mut message = Self::with_role(MessageRole::Tool, content);
        message.tool_call_id = Some(call.id);
        message.tool_name = Some(call.name.clone());
        message
    }

    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }

    pub fn is_tool_result(&self) -> bool {
        self.role == MessageRole::Tool
    }

    /// Assistant message whose tool calls are still waiting to run
    pub fn has_tool_calls(&self) -> bool {
        self.role == MessageRole::Assistant && !self.tool_calls.is_empty()
    }

    /// Visible text exchanged between the user and the assistant
    pub fn is_conversational(&self) -> bool {
        match self.role {
            MessageRole::User => true,
            MessageRole::Assistant => !self.content.trim().is_empty(),
            MessageRole::System | MessageRole::Tool => false,
        }
    }
}

/// Keep only user and visible assistant messages, newest `limit` of them
pub fn conversational_tail(messages: &[Message], limit: usize) -> Vec<Message> {
    let visible: Vec<&Message> = messages.iter().filter(|m| m.is_conversational()).collect();
    let skip = visible.len().saturating_sub(limit);
    visible.into_iter().skip(skip).cloned().collect()
}

/// Text of the most recent user message
pub fn last_user_text(messages: &[Message]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.is_user())
        .map(|m| m.content.as_str())
}

/// The assistant message that issued the tool call `id`
pub fn find_tool_request(messages: &[Message], id: ToolCallId) -> Option<&Message> {
    messages
        .iter()
        .rev()
        .find(|m| m.tool_calls.iter().any(|call| call.id == id))
}
