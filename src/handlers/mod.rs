//! Conversation handlers
//!
//! A handler reads the state and returns a [`StateUpdate`]; it never
//! mutates the state itself. [`HandlerSet`] maps every [`HandlerId`] to its
//! implementation so the turn engine can dispatch on the router's answer.

use crate::context::{conversational_tail, last_user_text};
use crate::error::{AgentError, Result};
use crate::intent::IntentMatcher;
use crate::language::{ExtractedFields, ExtractionSchema, LanguageModel, ReplyContext};
use crate::state::{ConversationState, StateUpdate};
use crate::types::HandlerId;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

pub mod booking;
pub mod cancel;
pub mod format;
pub mod general;
pub mod manager;
pub mod phase;
pub mod prompts;
pub mod schemas;

pub use booking::BookingHandler;
pub use cancel::CancelBookingHandler;
pub use general::GeneralHandler;
pub use manager::ManagerHandler;
pub use phase::BookingPhase;

/// Shared capabilities for one handler step
pub struct HandlerContext<'a> {
    pub model: &'a dyn LanguageModel,
    pub intents: &'a IntentMatcher,
    /// Reference date for relative expressions
    pub today: NaiveDate,
    /// Visible messages handed to the model when it writes a reply
    pub reply_window: usize,
}

impl HandlerContext<'_> {
    /// Extract fields, treating unusable model output as "nothing found"
    pub async fn extract_or_empty(
        &self,
        text: &str,
        schema: &ExtractionSchema,
    ) -> Result<ExtractedFields> {
        match self.model.extract(text, schema).await {
            Ok(fields) => Ok(fields),
            Err(AgentError::Extraction(reason)) => {
                warn!(schema = schema.name, reason = %reason, "Extraction failed, continuing without fields");
                Ok(ExtractedFields::empty())
            }
            Err(e) => Err(e),
        }
    }

    /// Persona, recent conversation and an instruction for this reply
    pub fn reply_context(
        &self,
        state: &ConversationState,
        instruction: impl Into<String>,
    ) -> ReplyContext {
        ReplyContext::new(
            prompts::PERSONA,
            conversational_tail(&state.messages, self.reply_window),
            instruction,
        )
    }

    /// Generate a reply, falling back to `fallback` when the model returns nothing
    pub async fn reply(
        &self,
        state: &ConversationState,
        instruction: impl Into<String>,
        fallback: &str,
    ) -> Result<String> {
        let context = self.reply_context(state, instruction);
        let text = self.model.generate_reply(&context).await?;
        Ok(if text.trim().is_empty() {
            fallback.to_string()
        } else {
            text
        })
    }
}

/// Text of the user message the step is answering
pub(crate) fn user_text(state: &ConversationState) -> &str {
    last_user_text(&state.messages).unwrap_or_default()
}

#[async_trait]
pub trait Handler: Send + Sync {
    fn id(&self) -> HandlerId;

    async fn handle(
        &self,
        state: &ConversationState,
        ctx: &HandlerContext<'_>,
    ) -> Result<StateUpdate>;
}

/// Specialist hands the conversation back to the dispatcher
pub(crate) fn handoff(from: HandlerId) -> StateUpdate {
    StateUpdate::reply(from, prompts::HANDOFF)
        .route_to(HandlerId::Manager)
        .handled_by(from)
}

#[derive(Clone)]
pub struct HandlerSet {
    handlers: HashMap<HandlerId, Arc<dyn Handler>>,
}

impl HandlerSet {
    /// The four standard handlers
    pub fn standard() -> Self {
        let mut set = Self {
            handlers: HashMap::new(),
        };
        set.insert(Arc::new(ManagerHandler));
        set.insert(Arc::new(BookingHandler));
        set.insert(Arc::new(CancelBookingHandler));
        set.insert(Arc::new(GeneralHandler));
        set
    }

    /// Replace the handler registered under `handler.id()`
    pub fn insert(&mut self, handler: Arc<dyn Handler>) {
        self.handlers.insert(handler.id(), handler);
    }

    pub fn get(&self, id: HandlerId) -> Option<Arc<dyn Handler>> {
        self.handlers.get(&id).cloned()
    }
}

impl Default for HandlerSet {
    fn default() -> Self {
        Self::standard()
    }
}
