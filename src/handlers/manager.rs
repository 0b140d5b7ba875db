//! Dispatcher: decides which specialist owns the conversation

use crate::error::{AgentError, Result};
use crate::handlers::schemas::{self, INTENT_BOOKING, INTENT_CANCEL, INTENT_GENERAL};
use crate::handlers::{prompts, user_text, Handler, HandlerContext};
use crate::state::{ConversationState, StateUpdate};
use crate::types::HandlerId;
use async_trait::async_trait;
use tracing::{debug, info, warn};

pub struct ManagerHandler;

impl ManagerHandler {
    async fn classify(
        &self,
        text: &str,
        ctx: &HandlerContext<'_>,
    ) -> Result<Option<HandlerId>> {
        if let Some(handler) = ctx.intents.best_intent(text) {
            debug!(handler = %handler, "Intent matched by keywords");
            return Ok(Some(handler));
        }

        let fields = match ctx.model.extract(text, &schemas::INTENT).await {
            Ok(fields) => fields,
            Err(AgentError::Extraction(reason)) => {
                warn!(reason = %reason, "Intent classification failed");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let handler = match fields.text("intent").as_deref() {
            Some(INTENT_BOOKING) => Some(HandlerId::Booking),
            Some(INTENT_CANCEL) => Some(HandlerId::CancelBooking),
            Some(INTENT_GENERAL) => Some(HandlerId::General),
            Some(other) => {
                warn!(intent = %other, "Model returned an unknown intent");
                None
            }
            None => None,
        };
        Ok(handler)
    }
}

#[async_trait]
impl Handler for ManagerHandler {
    fn id(&self) -> HandlerId {
        HandlerId::Manager
    }

    async fn handle(
        &self,
        state: &ConversationState,
        ctx: &HandlerContext<'_>,
    ) -> Result<StateUpdate> {
        let text = user_text(state);
        let Some(mut chosen) = self.classify(text, ctx).await? else {
            return Ok(StateUpdate::reply(HandlerId::Manager, prompts::CLARIFY_INTENT));
        };

        // A specialist that just handed the conversation back does not get it again
        let handed_back = state.next_agent == Some(HandlerId::Manager);
        if handed_back && state.previous_agent == Some(chosen) {
            debug!(declined_by = %chosen, "Specialist handed off, using general");
            chosen = HandlerId::General;
        }

        info!(handler = %chosen, "Dispatching");
        Ok(StateUpdate::new().route_to(chosen))
    }
}
