//! Small talk and general questions

use crate::error::Result;
use crate::handlers::schemas::{self, INTENT_BOOKING, INTENT_CANCEL};
use crate::handlers::{prompts, user_text, Handler, HandlerContext};
use crate::state::{ConversationState, StateUpdate};
use crate::types::HandlerId;
use async_trait::async_trait;
use tracing::debug;

const ID: HandlerId = HandlerId::General;

pub struct GeneralHandler;

impl GeneralHandler {
    /// Whether the message is really a booking or cancellation request
    async fn belongs_elsewhere(&self, text: &str, ctx: &HandlerContext<'_>) -> Result<bool> {
        if ctx.intents.best_intent(text).is_some_and(|h| h.is_specialist() && h != ID) {
            return Ok(true);
        }
        let fields = ctx.extract_or_empty(text, &schemas::INTENT).await?;
        Ok(matches!(
            fields.text("intent").as_deref(),
            Some(INTENT_BOOKING | INTENT_CANCEL)
        ))
    }
}

#[async_trait]
impl Handler for GeneralHandler {
    fn id(&self) -> HandlerId {
        ID
    }

    async fn handle(
        &self,
        state: &ConversationState,
        ctx: &HandlerContext<'_>,
    ) -> Result<StateUpdate> {
        let text = user_text(state);

        // Only a conversation already parked here is re-checked; a fresh dispatch is trusted
        let dispatched_here = state.next_agent == Some(ID);
        if !dispatched_here && self.belongs_elsewhere(text, ctx).await? {
            debug!("General handler passing request to the dispatcher");
            return Ok(StateUpdate::new().route_to(HandlerId::Manager).handled_by(ID));
        }

        let answer = ctx
            .reply(state, prompts::GENERAL_INSTRUCTION, prompts::GENERAL_FALLBACK)
            .await?;
        Ok(StateUpdate::reply(ID, answer).handled_by(ID))
    }
}
