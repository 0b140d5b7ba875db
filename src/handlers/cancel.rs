//! Cancellation specialist

use crate::context::{Message, ToolCall};
use crate::error::Result;
use crate::handlers::booking::tool_payload;
use crate::handlers::{handoff, prompts, schemas, user_text, Handler, HandlerContext};
use crate::normalize::booking_reference;
use crate::state::{BookingInfo, BookingStatus, ConversationState, StateUpdate};
use crate::tool::CANCEL_BOOKING_TOOL;
use crate::types::HandlerId;
use async_trait::async_trait;
use serde_json::{json, Map};
use tracing::{info, warn};

const ID: HandlerId = HandlerId::CancelBooking;

pub struct CancelBookingHandler;

impl CancelBookingHandler {
    fn read_result(&self, state: &ConversationState, content: &str) -> StateUpdate {
        let booking = match tool_payload::<BookingInfo>(content) {
            Ok(booking) => booking,
            Err(error) => {
                warn!(error = %error, "Cancellation failed");
                return StateUpdate::reply(ID, prompts::cancel_failed(&error));
            }
        };

        info!(booking_id = %booking.booking_id, "Booking cancelled");
        let mut update = StateUpdate::reply(ID, prompts::cancelled(&booking.booking_id));
        let is_current = state
            .booking
            .as_ref()
            .is_some_and(|current| current.booking_id == booking.booking_id);
        if is_current {
            // The old selection must not resurface in a new booking
            update.selected_flight = Some(None);
            update.flight_confirmed = Some(false);
            update.reset_passengers = true;
            update.booking = Some(Some(booking));
        }
        update
    }

    /// Reference from the message, the model, or the thread's own booking
    async fn reference(
        &self,
        state: &ConversationState,
        ctx: &HandlerContext<'_>,
    ) -> Result<Option<String>> {
        let text = user_text(state);
        if let Some(reference) = booking_reference(text) {
            return Ok(Some(reference));
        }

        let fields = ctx.extract_or_empty(text, &schemas::CANCELLATION).await?;
        if let Some(reference) = fields.text("booking_reference") {
            return Ok(Some(reference.trim().to_uppercase()));
        }

        Ok(state
            .booking
            .as_ref()
            .filter(|b| b.status != BookingStatus::Cancelled)
            .map(|b| b.booking_id.clone()))
    }
}

#[async_trait]
impl Handler for CancelBookingHandler {
    fn id(&self) -> HandlerId {
        ID
    }

    async fn handle(
        &self,
        state: &ConversationState,
        ctx: &HandlerContext<'_>,
    ) -> Result<StateUpdate> {
        if let Some(last) = state.last_message().filter(|m| m.is_tool_result()) {
            return Ok(self.read_result(state, &last.content).handled_by(ID));
        }

        if ctx.intents.best_intent(user_text(state)) == Some(HandlerId::Booking) {
            return Ok(handoff(ID));
        }

        let update = match self.reference(state, ctx).await? {
            Some(reference) => {
                info!(booking_id = %reference, "Requesting cancellation");
                let mut arguments = Map::new();
                arguments.insert("booking_id".to_string(), json!(reference));
                StateUpdate::new().with_message(Message::tool_request(
                    ID,
                    vec![ToolCall::new(CANCEL_BOOKING_TOOL, arguments)],
                ))
            }
            None => StateUpdate::reply(ID, prompts::ASK_BOOKING_REFERENCE),
        };
        Ok(update.handled_by(ID))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use crate::intent::IntentMatcher;
    use crate::language::{ExtractedFields, ExtractionSchema, LanguageModel, ReplyContext};
    use chrono::NaiveDate;

    struct NoReference;

    #[async_trait]
    impl LanguageModel for NoReference {
        async fn extract(&self, _text: &str, _schema: &ExtractionSchema) -> Result<ExtractedFields> {
            Err(AgentError::Extraction("nothing".to_string()))
        }

        async fn generate_reply(&self, _context: &ReplyContext) -> Result<String> {
            Ok(String::new())
        }
    }

    async fn step(state: &ConversationState) -> StateUpdate {
        let intents = IntentMatcher::with_default_rules().unwrap();
        let ctx = HandlerContext {
            model: &NoReference,
            intents: &intents,
            today: NaiveDate::from_ymd_opt(2026, 10, 17).unwrap(),
            reply_window: 10,
        };
        CancelBookingHandler.handle(state, &ctx).await.unwrap()
    }

    fn user(text: &str) -> ConversationState {
        let mut state = ConversationState::new();
        state.apply(StateUpdate::new().with_message(Message::user(text)));
        state
    }

    #[tokio::test]
    async fn test_reference_in_message_issues_cancel_call() {
        let update = step(&user("hủy giúp tôi vé mã ab12cd")).await;
        let call = &update.messages[0].tool_calls[0];
        assert_eq!(call.name, CANCEL_BOOKING_TOOL);
        assert_eq!(call.arguments["booking_id"], "AB12CD");
        assert_eq!(update.previous_agent, Some(ID));
    }

    #[tokio::test]
    async fn test_missing_reference_is_requested() {
        let update = step(&user("tôi muốn hủy vé")).await;
        assert_eq!(update.messages[0].content, prompts::ASK_BOOKING_REFERENCE);
        assert!(update.messages[0].tool_calls.is_empty());
    }

    #[tokio::test]
    async fn test_failed_cancellation_is_reported() {
        let mut state = user("hủy vé ZZZ999");
        let call = ToolCall::new(CANCEL_BOOKING_TOOL, Map::new());
        state.apply(StateUpdate::new().with_message(Message::tool_result(
            &call,
            r#"{"error": "Booking not found: ZZZ999"}"#,
        )));

        let update = step(&state).await;
        assert_eq!(
            update.messages[0].content,
            prompts::cancel_failed("Booking not found: ZZZ999")
        );
        assert!(update.booking.is_none());
    }
}
