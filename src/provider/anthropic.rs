//! Anthropic messages-API provider

use crate::context::{Message, MessageRole};
use crate::error::AgentError;
use crate::provider::{split_system_prompt, LLMProvider, ProviderConfig};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-20241022";

pub struct AnthropicProvider {
    api_key: String,
    config: ProviderConfig,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            config: ProviderConfig::new(DEFAULT_ANTHROPIC_MODEL),
        }
    }

    /// Read the key from `ANTHROPIC_API_KEY`
    pub fn from_env() -> Result<Self, AgentError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            AgentError::Configuration("ANTHROPIC_API_KEY environment variable not set".to_string())
        })?;

        Ok(Self::new(api_key))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.config = self.config.with_temperature(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.config = self.config.with_max_tokens(max_tokens);
        self
    }
}

/// Alternating user/assistant turns, starting with the user
///
/// The messages API rejects two consecutive turns with the same role, so
/// those are joined.
fn alternate_turns(turns: Vec<(MessageRole, String)>) -> Vec<Value> {
    let mut merged: Vec<(MessageRole, String)> = Vec::with_capacity(turns.len());
    for (role, content) in turns {
        match merged.last_mut() {
            Some((last_role, text)) if *last_role == role => {
                text.push_str("\n\n");
                text.push_str(&content);
            }
            None if role != MessageRole::User => {
                merged.push((MessageRole::User, "...".to_string()));
                merged.push((role, content));
            }
            _ => merged.push((role, content)),
        }
    }
    merged
        .into_iter()
        .map(|(role, content)| json!({"role": role.as_str(), "content": content}))
        .collect()
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    async fn complete(&self, messages: Vec<Message>) -> std::result::Result<String, AgentError> {
        info!(
            model = %self.config.model,
            message_count = messages.len(),
            "Requesting Anthropic completion"
        );

        let (system_prompt, turns) = split_system_prompt(&messages);
        let messages_value = Value::Array(alternate_turns(turns));

        // Client is not Clone, so one is built per request
        let mut client_builder = anthropic_sdk::Client::new()
            .auth(&self.api_key)
            .model(&self.config.model)
            .messages(&messages_value)
            .max_tokens(self.config.max_tokens.unwrap_or(4096) as i32)
            .temperature(self.config.temperature);

        if !system_prompt.is_empty() {
            client_builder = client_builder.system(&system_prompt);
        }

        let request = client_builder
            .build()
            .map_err(|e| AgentError::Provider(format!("Failed to build request: {e}")))?;

        let response_text = Arc::new(Mutex::new(String::new()));
        let response_text_clone = Arc::clone(&response_text);

        request
            .execute(|chunk| {
                let response_text = Arc::clone(&response_text_clone);
                async move {
                    let mut text = response_text.lock().await;
                    text.push_str(&chunk);
                }
            })
            .await
            .map_err(|e| {
                warn!(error = %e, "Anthropic API error");
                AgentError::Provider(format!("Anthropic API error: {e}"))
            })?;

        let final_text = response_text.lock().await.clone();
        if final_text.trim().is_empty() {
            return Err(AgentError::Provider(
                "Empty response from Anthropic".to_string(),
            ));
        }

        debug!(
            response_length = final_text.len(),
            "Anthropic completion successful"
        );
        Ok(final_text)
    }

    fn name(&self) -> &str {
        "Anthropic"
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}
