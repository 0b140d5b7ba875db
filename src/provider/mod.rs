//! Chat-completion providers
//!
//! [`LLMProvider`] is the raw text-in/text-out seam to a hosted model.
//! Handlers never use it directly; they go through
//! [`crate::language::ProviderLanguageModel`].

use crate::context::{Message, MessageRole};
use crate::error::AgentError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAIProvider;

/// Model name and sampling settings of a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub model: String,
    /// Clamped to `0.0..=2.0`
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Clamped to `0.0..=1.0`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

fn default_temperature() -> f32 {
    0.7
}

impl ProviderConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: default_temperature(),
            max_tokens: None,
            top_p: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p.clamp(0.0, 1.0));
        self
    }
}

/// A hosted chat-completion model
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a complete response for the given messages
    async fn complete(&self, messages: Vec<Message>) -> std::result::Result<String, AgentError>;

    /// Short provider name used in logs
    fn name(&self) -> &str;

    fn config(&self) -> &ProviderConfig;
}

/// Split a prompt into the system text and the remaining turns
///
/// Tool traffic is dropped and several system messages are joined, since
/// both hosted APIs take a single system prompt.
pub fn split_system_prompt(messages: &[Message]) -> (String, Vec<(MessageRole, String)>) {
    let mut system = Vec::new();
    let mut turns = Vec::new();
    for message in messages {
        match message.role {
            MessageRole::System => system.push(message.content.as_str()),
            MessageRole::User | MessageRole::Assistant if !message.content.is_empty() => {
                turns.push((message.role, message.content.clone()))
            }
            _ => {}
        }
    }
    (system.join("\n\n"), turns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ToolCall;
    use crate::types::HandlerId;

    #[test]
    fn test_config_defaults() {
        let config = ProviderConfig::new("gpt-4o-mini");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.temperature, 0.7);
        assert!(config.max_tokens.is_none());
        assert!(config.top_p.is_none());
    }

    #[test]
    fn test_sampling_values_are_clamped() {
        let config = ProviderConfig::new("m").with_temperature(-0.5).with_top_p(1.5);
        assert_eq!(config.temperature, 0.0);
        assert_eq!(config.top_p, Some(1.0));

        let config = ProviderConfig::new("m").with_temperature(3.0).with_top_p(0.9);
        assert_eq!(config.temperature, 2.0);
        assert_eq!(config.top_p, Some(0.9));
    }

    #[test]
    fn test_config_from_partial_table() {
        let config: ProviderConfig =
            serde_json::from_str(r#"{"model": "gpt-4o", "max_tokens": 500}"#).unwrap();
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.max_tokens, Some(500));

        let json = serde_json::to_value(&config).unwrap();
        assert!(json.get("top_p").is_none());
    }

    #[test]
    fn test_split_system_prompt() {
        let call = ToolCall::new("flight-search-tool", serde_json::Map::new());
        let messages = vec![
            Message::system("persona"),
            Message::user("đặt vé"),
            Message::tool_request(HandlerId::Booking, vec![call.clone()]),
            Message::tool_result(&call, "[]"),
            Message::assistant("Dạ"),
            Message::system("instruction"),
        ];

        let (system, turns) = split_system_prompt(&messages);
        assert_eq!(system, "persona\n\ninstruction");
        assert_eq!(turns.len(), 2, "tool traffic is not sent to the provider");
        assert_eq!(turns[0], (MessageRole::User, "đặt vé".to_string()));
        assert_eq!(turns[1].0, MessageRole::Assistant);
    }
}
