//! OpenAI chat-completion provider

use crate::context::{Message, MessageRole};
use crate::error::AgentError;
use crate::provider::{LLMProvider, ProviderConfig};
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, info, trace, warn};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

pub struct OpenAIProvider {
    client: Client<OpenAIConfig>,
    config: ProviderConfig,
}

impl OpenAIProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        let openai_config = OpenAIConfig::new().with_api_key(api_key);
        let client = Client::with_config(openai_config);

        Self {
            client,
            config: ProviderConfig::new(DEFAULT_OPENAI_MODEL),
        }
    }

    /// Read the key from `OPENAI_API_KEY`
    pub fn from_env() -> Result<Self, AgentError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            AgentError::Configuration("OPENAI_API_KEY environment variable not set".to_string())
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

    /// Map the prompt onto chat messages; tool traffic and empty turns are skipped
    fn convert_messages(&self, messages: Vec<Message>) -> Vec<ChatCompletionRequestMessage> {
        messages
            .into_iter()
            .filter_map(|m| match m.role {
                MessageRole::System => Some(ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessage {
                        content: ChatCompletionRequestSystemMessageContent::Text(m.content),
                        name: None,
                    },
                )),
                MessageRole::User => Some(ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessage {
                        content: ChatCompletionRequestUserMessageContent::Text(m.content),
                        name: None,
                    },
                )),
                MessageRole::Assistant if !m.content.trim().is_empty() => {
                    Some(ChatCompletionRequestMessage::Assistant(
                        ChatCompletionRequestAssistantMessage {
                            content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                                m.content,
                            )),
                            name: None,
                            tool_calls: None,
                            refusal: None,
                            #[allow(deprecated)]
                            function_call: None,
                        },
                    ))
                }
                MessageRole::Assistant | MessageRole::Tool => None,
            })
            .collect()
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn complete(&self, messages: Vec<Message>) -> std::result::Result<String, AgentError> {
        info!(
            model = %self.config.model,
            message_count = messages.len(),
            "Requesting OpenAI completion"
        );

        let openai_messages = self.convert_messages(messages);

        let mut request_builder = CreateChatCompletionRequestArgs::default();
        request_builder
            .model(&self.config.model)
            .messages(openai_messages)
            .temperature(self.config.temperature);

        if let Some(max_tokens) = self.config.max_tokens {
            request_builder.max_tokens(max_tokens);
        }
        if let Some(top_p) = self.config.top_p {
            request_builder.top_p(top_p);
        }

        let request = request_builder
            .build()
            .map_err(|e| AgentError::Provider(format!("Failed to build request: {e}")))?;

        trace!("Sending request to OpenAI");

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!(error = %e, "OpenAI API error");
            AgentError::Provider(format!("OpenAI API error: {e}"))
        })?;

        let message = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| {
                warn!("No content in OpenAI response");
                AgentError::Provider("No content in OpenAI response".to_string())
            })?;

        debug!(
            response_length = message.len(),
            "OpenAI completion successful"
        );

        Ok(message)
    }

    fn name(&self) -> &str {
        "OpenAI"
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}
