//! Routing and state-merge properties checked over every combination of
//! routing fields, plus history growth through whole turns.

mod common;

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{today, ScriptedModel};
use flyagent::context::{Message, ToolCall};
use flyagent::language::{ExtractedFields, ExtractionSchema, LanguageModel, ReplyContext};
use flyagent::reservation::StubBookingService;
use flyagent::router::{check_transition, route, Node, Route};
use flyagent::search::StaticFlightSearch;
use flyagent::state::{ConversationState, PassengerInfo, PassengerType, StateUpdate};
use flyagent::storage::{InMemoryThreadStore, ThreadStore};
use flyagent::{AgentError, FlightAgent, HandlerId, ThreadId};
use std::sync::Arc;

fn routing_options() -> Vec<Option<HandlerId>> {
    std::iter::once(None)
        .chain(HandlerId::ALL.into_iter().map(Some))
        .collect()
}

fn with_messages(messages: Vec<Message>) -> ConversationState {
    let mut state = ConversationState::new();
    state.apply(StateUpdate {
        messages,
        ..StateUpdate::default()
    });
    state
}

#[test]
fn test_tool_result_never_routes_to_dispatcher() {
    for issuer in [HandlerId::Booking, HandlerId::CancelBooking] {
        for previous in routing_options() {
            for next in routing_options() {
                let call = ToolCall::new("flight-search-tool", serde_json::Map::new());
                let mut state = with_messages(vec![
                    Message::user("đặt vé"),
                    Message::tool_request(issuer, vec![call.clone()]),
                    Message::tool_result(&call, "[]"),
                ]);
                state.previous_agent = previous;
                state.next_agent = next;

                let route = route(&state).unwrap();
                assert_eq!(
                    route,
                    Route::Handler(issuer),
                    "previous={previous:?} next={next:?}"
                );
                assert!(check_transition(Node::Tool, route).is_ok());
            }
        }
    }
}

#[test]
fn test_pending_tool_calls_always_run_first() {
    for previous in routing_options() {
        for next in routing_options() {
            let call = ToolCall::new("cancel-booking-tool", serde_json::Map::new());
            let mut state = with_messages(vec![
                Message::user("hủy vé"),
                Message::tool_request(HandlerId::CancelBooking, vec![call]),
            ]);
            state.previous_agent = previous;
            state.next_agent = next;
            assert_eq!(route(&state).unwrap(), Route::CallTool);
        }
    }
}

#[test]
fn test_user_message_goes_to_a_handler() {
    for previous in routing_options() {
        let mut state = with_messages(vec![Message::user("xin chào")]);
        state.previous_agent = previous;

        let expected = match previous {
            Some(id) if id.is_specialist() => id,
            _ => HandlerId::Manager,
        };
        let route = route(&state).unwrap();
        assert_eq!(route, Route::Handler(expected));
        assert!(check_transition(Node::Entry, route).is_ok());
    }
}

#[test]
fn test_unknown_handler_names_are_rejected() {
    assert_eq!("booking_agent".parse::<HandlerId>().unwrap(), HandlerId::Booking);
    assert!("payment_agent".parse::<HandlerId>().is_err());
    assert!("".parse::<HandlerId>().is_err());
}

#[test]
fn test_passenger_cap_holds_for_every_count() {
    let passenger = |i: usize| PassengerInfo {
        full_name: format!("Hành khách {i}"),
        date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
        phone: "0901234567".to_string(),
        passenger_type: PassengerType::Adult,
    };

    for count in 1..=9u32 {
        for batch in 0..=12usize {
            let mut state = ConversationState::new();
            state.apply(StateUpdate {
                passenger_count: Some(count),
                ..StateUpdate::default()
            });
            state.apply(StateUpdate {
                passengers: (0..batch).map(passenger).collect(),
                ..StateUpdate::default()
            });
            state.apply(StateUpdate {
                passengers: vec![passenger(99)],
                ..StateUpdate::default()
            });

            assert!(state.passengers.len() <= count as usize);
            assert_eq!(state.passengers.len(), (batch + 1).min(count as usize));
            if batch > 0 {
                assert_eq!(state.passengers[0].full_name, passenger(0).full_name);
            }
        }
    }
}

/// Model that fails every call
struct Unavailable;

#[async_trait]
impl LanguageModel for Unavailable {
    async fn extract(&self, _text: &str, _schema: &ExtractionSchema) -> flyagent::Result<ExtractedFields> {
        Err(AgentError::Provider("connection refused".to_string()))
    }

    async fn generate_reply(&self, _context: &ReplyContext) -> flyagent::Result<String> {
        Err(AgentError::Provider("connection refused".to_string()))
    }
}

async fn agent_with(model: Arc<dyn LanguageModel>, store: InMemoryThreadStore) -> FlightAgent {
    FlightAgent::builder()
        .language_model(model)
        .flight_search(Arc::new(StaticFlightSearch::new()))
        .booking_service(Arc::new(StubBookingService::new()))
        .thread_store(Arc::new(store))
        .today(today())
        .build()
        .await
        .expect("agent builds")
}

#[tokio::test]
async fn test_history_never_shrinks() {
    let texts = [
        "xin chào",
        "tôi muốn đặt vé",
        "ừm",
        "cho tôi hủy vé",
        "đồng ý",
        "thời tiết thế nào",
    ];
    let models: Vec<Arc<dyn LanguageModel>> =
        vec![Arc::new(ScriptedModel::new()), Arc::new(Unavailable)];

    for model in models {
        let store = InMemoryThreadStore::new();
        let agent = agent_with(model, store.clone()).await;
        let thread = ThreadId::new();

        let mut seen = 0;
        for text in texts {
            agent
                .process_message(&thread, text)
                .await
                .expect("turn answers even when the model is down");
            let thread_record = store
                .get(&thread)
                .await
                .unwrap()
                .expect("thread persisted");
            let len = thread_record.state.messages.len();
            assert!(len >= seen + 2, "{text:?}: {seen} -> {len}");
            seen = len;
        }
    }
}
