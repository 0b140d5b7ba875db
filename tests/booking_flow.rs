//! End-to-end conversations through the turn engine
//!
//! The language model is scripted; search, booking service and storage are
//! the real in-process implementations.

mod common;

use common::{today, ScriptedModel, CANNED_REPLY};
use flyagent::handlers::prompts;
use flyagent::reservation::{BookingService, StubBookingService};
use flyagent::search::StaticFlightSearch;
use flyagent::state::{BookingStatus, ConversationState, PassengerType, TripField};
use flyagent::storage::{InMemoryThreadStore, ThreadStore};
use flyagent::{FlightAgent, HandlerId, ThreadId};
use serde_json::json;
use std::sync::Arc;

struct Harness {
    agent: FlightAgent,
    model: Arc<ScriptedModel>,
    search: Arc<StaticFlightSearch>,
    bookings: Arc<StubBookingService>,
    store: InMemoryThreadStore,
}

async fn harness_with(model: ScriptedModel, search: StaticFlightSearch) -> Harness {
    let model = Arc::new(model);
    let search = Arc::new(search);
    let bookings = Arc::new(StubBookingService::new());
    let store = InMemoryThreadStore::new();

    let agent = FlightAgent::builder()
        .language_model(model.clone())
        .flight_search(search.clone())
        .booking_service(bookings.clone())
        .thread_store(Arc::new(store.clone()))
        .today(today())
        .build()
        .await
        .expect("agent builds");

    Harness {
        agent,
        model,
        search,
        bookings,
        store,
    }
}

async fn harness(model: ScriptedModel) -> Harness {
    harness_with(model, StaticFlightSearch::new()).await
}

impl Harness {
    async fn say(&self, thread: &ThreadId, text: &str) -> String {
        let reply = self
            .agent
            .process_message(thread, text)
            .await
            .expect("turn succeeds");
        assert!(!reply.degraded, "turn for {text:?} was degraded");
        reply.response
    }

    async fn state(&self, thread: &ThreadId) -> ConversationState {
        self.store
            .get(thread)
            .await
            .unwrap()
            .expect("thread exists")
            .state
    }
}

#[tokio::test]
async fn test_full_booking_one_field_at_a_time() {
    let model = ScriptedModel::new()
        .on("trip", "Từ Hà Nội", json!({"departure_city": "Hà Nội"}))
        .on("trip", "Đà Nẵng", json!({"departure_city": "Đà Nẵng"}))
        .on("trip", "ngày mai", json!({"departure_date": "ngày mai"}))
        .on("trip", "2 người", json!({"passenger_count": 2}))
        .on(
            "passengers",
            "Nguyễn Văn An, sinh ngày 01/01/1990",
            json!({"passengers": [{"full_name": "Nguyễn Văn An", "date_of_birth": "01/01/1990"}]}),
        )
        .on(
            "passengers",
            "0901234567",
            json!({"passengers": [{"phone": "0901234567"}]}),
        )
        .on(
            "passengers",
            "Trần Thị Bình 15/03/2018 0912345678; Lê Văn Cường 02/02/1985 0987654321",
            json!({"passengers": [
                {"full_name": "Trần Thị Bình", "date_of_birth": "15/03/2018", "phone": "0912345678"},
                {"full_name": "Lê Văn Cường", "date_of_birth": "02/02/1985", "phone": "0987654321"}
            ]}),
        );
    let h = harness(model).await;
    let thread = ThreadId::from("full-booking");

    let reply = h.say(&thread, "Tôi muốn đặt vé máy bay").await;
    assert_eq!(
        reply,
        prompts::ask_missing_trip_fields(&[
            TripField::Origin,
            TripField::Destination,
            TripField::DepartureDate,
            TripField::PassengerCount,
        ])
    );

    let reply = h.say(&thread, "Từ Hà Nội").await;
    assert_eq!(
        reply,
        prompts::ask_missing_trip_fields(&[
            TripField::Destination,
            TripField::DepartureDate,
            TripField::PassengerCount,
        ])
    );

    let reply = h.say(&thread, "Đà Nẵng").await;
    assert_eq!(
        reply,
        prompts::ask_missing_trip_fields(&[TripField::DepartureDate, TripField::PassengerCount])
    );

    let reply = h.say(&thread, "ngày mai").await;
    assert_eq!(
        reply,
        prompts::ask_missing_trip_fields(&[TripField::PassengerCount])
    );
    assert_eq!(h.search.request_count(), 0, "no search before the trip is complete");

    let reply = h.say(&thread, "2 người").await;
    assert!(reply.contains("từ Hà Nội đến Đà Nẵng ngày 18/10/2026"), "{reply}");
    assert!(reply.contains("VJ123"));
    assert!(reply.ends_with(prompts::CHOOSE_FLIGHT));
    assert_eq!(h.search.request_count(), 1);

    let reply = h.say(&thread, "Cho em chuyến VJ123").await;
    assert!(reply.starts_with("Chuyến bay VJ123"), "{reply}");
    assert!(reply.ends_with(prompts::CONFIRM_FLIGHT));

    let reply = h.say(&thread, "đồng ý").await;
    assert_eq!(reply, prompts::ask_passenger(1, 2));

    let reply = h.say(&thread, "Nguyễn Văn An, sinh ngày 01/01/1990").await;
    assert!(reply.contains("số điện thoại"), "{reply}");
    assert!(reply.contains("1/2"));

    let reply = h.say(&thread, "0901234567").await;
    assert_eq!(reply, prompts::ask_passenger(2, 2));

    let reply = h
        .say(
            &thread,
            "Trần Thị Bình 15/03/2018 0912345678; Lê Văn Cường 02/02/1985 0987654321",
        )
        .await;
    assert!(reply.contains("Nguyễn Văn An"));
    assert!(reply.contains("Trần Thị Bình (trẻ em)"));
    assert!(!reply.contains("Lê Văn Cường"), "passengers beyond the count are dropped");
    assert!(reply.ends_with(prompts::REVIEW_QUESTION));

    let state = h.state(&thread).await;
    assert_eq!(state.passengers.len(), 2);
    assert_eq!(state.passengers[0].passenger_type, PassengerType::Adult);
    assert_eq!(state.passengers[1].passenger_type, PassengerType::Child);
    assert!(state.pending_passenger.is_empty());

    let reply = h.say(&thread, "xác nhận").await;
    let booking = h.state(&thread).await.booking.expect("booking created");
    assert_eq!(booking.status, BookingStatus::PendingPayment);
    let link = booking.payment_link.clone().expect("payment link");
    assert_eq!(reply, prompts::payment_requested(&booking.booking_id, &link));

    let reply = h.say(&thread, "tôi đã thanh toán rồi").await;
    assert_eq!(reply, prompts::ticket_issued(&booking.booking_id));
    assert_eq!(
        h.bookings.get(&booking.booking_id).await.unwrap().status,
        BookingStatus::Confirmed
    );

    let reply = h.say(&thread, "cho tôi hủy vé").await;
    assert!(reply.starts_with(prompts::HANDOFF), "{reply}");
    assert!(reply.ends_with(&prompts::cancelled(&booking.booking_id)));
    assert_eq!(
        h.bookings.get(&booking.booking_id).await.unwrap().status,
        BookingStatus::Cancelled
    );

    let state = h.state(&thread).await;
    assert_eq!(state.previous_agent, Some(HandlerId::CancelBooking));
    assert_eq!(state.next_agent, None);
    assert!(state.selected_flight.is_none());
    assert!(state.passengers.is_empty());

    assert_eq!(h.search.request_count(), 1, "exactly one search for the whole booking");
    assert_eq!(h.model.calls("intent"), 0, "keywords dispatched every turn");
}

#[tokio::test]
async fn test_complete_request_searches_on_first_turn() {
    let text = "Tôi muốn bay từ Hà Nội đi Sài Gòn ngày 20/10, 1 người";
    let model = ScriptedModel::new().on(
        "trip",
        text,
        json!({
            "departure_city": "Hà Nội",
            "destination_city": "Sài Gòn",
            "departure_date": "20/10",
            "passenger_count": 1
        }),
    );
    let h = harness(model).await;
    let thread = ThreadId::new();

    let reply = h.say(&thread, text).await;
    assert!(reply.contains("từ Hà Nội đến TP. Hồ Chí Minh ngày 20/10/2026"), "{reply}");
    assert_eq!(h.search.request_count(), 1);

    let state = h.state(&thread).await;
    assert_eq!(state.origin.as_deref(), Some("HAN"));
    assert_eq!(state.destination.as_deref(), Some("SGN"));
    assert_eq!(state.offers().len(), 3);
}

#[tokio::test]
async fn test_empty_search_is_not_repeated_until_trip_changes() {
    let first = "Đặt vé từ Hà Nội đi Đà Nẵng ngày mai cho 1 người";
    let model = ScriptedModel::new()
        .on(
            "trip",
            first,
            json!({
                "departure_city": "Hà Nội",
                "destination_city": "Đà Nẵng",
                "departure_date": "ngày mai",
                "passenger_count": 1
            }),
        )
        .on("trip", "Vậy đi Phú Quốc", json!({"destination_city": "Phú Quốc"}));
    let h = harness_with(model, StaticFlightSearch::new().without_route("HAN", "DAD")).await;
    let thread = ThreadId::new();

    assert_eq!(h.say(&thread, first).await, prompts::SEARCH_RETRY);
    assert_eq!(h.search.request_count(), 1);

    assert_eq!(h.say(&thread, "tìm lại giúp em").await, prompts::SEARCH_RETRY);
    assert_eq!(h.search.request_count(), 1, "unchanged trip is not searched again");

    let reply = h.say(&thread, "Vậy đi Phú Quốc").await;
    assert!(reply.contains("đến Phú Quốc"), "{reply}");
    assert_eq!(h.search.request_count(), 2);
}

#[tokio::test]
async fn test_invalid_trip_values_are_reported() {
    let text = "Đặt vé từ Hà Nội đi Nội Bài ngày 01/01/2020";
    let model = ScriptedModel::new().on(
        "trip",
        text,
        json!({
            "departure_city": "Hà Nội",
            "destination_city": "Nội Bài",
            "departure_date": "01/01/2020"
        }),
    );
    let h = harness(model).await;
    let thread = ThreadId::new();

    let reply = h.say(&thread, text).await;
    assert!(reply.contains(prompts::SAME_AIRPORT), "{reply}");
    assert!(reply.contains(prompts::PAST_DATE));
    assert_eq!(h.search.request_count(), 0);

    let state = h.state(&thread).await;
    assert_eq!(state.origin.as_deref(), Some("HAN"));
    assert!(state.destination.is_none());
    assert!(state.departure_date.is_none());
}

#[tokio::test]
async fn test_declining_flight_lists_offers_again() {
    let text = "Tìm chuyến bay Hà Nội - Đà Nẵng ngày mai 1 người";
    let model = ScriptedModel::new().on(
        "trip",
        text,
        json!({
            "departure_city": "Hà Nội",
            "destination_city": "Đà Nẵng",
            "departure_date": "ngày mai",
            "passenger_count": 1
        }),
    );
    let h = harness(model).await;
    let thread = ThreadId::new();

    h.say(&thread, text).await;
    let reply = h.say(&thread, "1").await;
    assert!(reply.starts_with("Chuyến bay VN213"), "{reply}");

    let reply = h.say(&thread, "Không, chọn lại").await;
    assert!(reply.ends_with(prompts::CHOOSE_FLIGHT));
    assert!(h.state(&thread).await.selected_flight.is_none());

    let reply = h.say(&thread, "7").await;
    assert_eq!(reply, prompts::invalid_option(3));

    let reply = h.say(&thread, "QH201").await;
    assert!(reply.starts_with("Chuyến bay QH201"), "{reply}");
    assert_eq!(h.search.request_count(), 1);
}

#[tokio::test]
async fn test_rebooking_after_cancel_needs_confirmation() {
    let trip = "Tìm chuyến bay Hà Nội - Đà Nẵng ngày mai 1 người";
    let passenger = "Nguyễn Văn An 01/01/1990 0901234567";
    let model = ScriptedModel::new()
        .on(
            "trip",
            trip,
            json!({
                "departure_city": "Hà Nội",
                "destination_city": "Đà Nẵng",
                "departure_date": "ngày mai",
                "passenger_count": 1
            }),
        )
        .on(
            "passengers",
            passenger,
            json!({"passengers": [
                {"full_name": "Nguyễn Văn An", "date_of_birth": "01/01/1990", "phone": "0901234567"}
            ]}),
        );
    let h = harness(model).await;
    let thread = ThreadId::from("cancel-rebook");

    h.say(&thread, trip).await;
    h.say(&thread, "1").await;
    assert_eq!(h.say(&thread, "đồng ý").await, prompts::ask_passenger(1, 1));
    let reply = h.say(&thread, passenger).await;
    assert!(reply.ends_with(prompts::REVIEW_QUESTION), "{reply}");
    h.say(&thread, "xác nhận").await;
    h.say(&thread, "tôi đã thanh toán rồi").await;
    let booking = h.state(&thread).await.booking.expect("booking created");

    let reply = h.say(&thread, "cho tôi hủy vé").await;
    assert!(reply.ends_with(&prompts::cancelled(&booking.booking_id)));
    let state = h.state(&thread).await;
    assert!(state.selected_flight.is_none());
    assert!(!state.flight_confirmed);

    h.say(&thread, "tôi muốn đặt vé").await;
    let reply = h.say(&thread, "2").await;
    assert!(reply.starts_with("Chuyến bay VJ123"), "{reply}");
    assert!(reply.ends_with(prompts::CONFIRM_FLIGHT));
    assert!(!h.state(&thread).await.flight_confirmed);

    let reply = h.say(&thread, "đồng ý").await;
    assert_eq!(reply, prompts::ask_passenger(1, 1));
    assert_eq!(h.search.request_count(), 1);
}

#[tokio::test]
async fn test_partial_passengers_are_not_mixed() {
    let trip = "Tìm chuyến bay Hà Nội - Đà Nẵng ngày mai 2 người";
    let partial = "Nguyễn Văn An 0901234567, Trần Thị Bình 02/02/1985";
    let model = ScriptedModel::new()
        .on(
            "trip",
            trip,
            json!({
                "departure_city": "Hà Nội",
                "destination_city": "Đà Nẵng",
                "departure_date": "ngày mai",
                "passenger_count": 2
            }),
        )
        .on(
            "passengers",
            partial,
            json!({"passengers": [
                {"full_name": "Nguyễn Văn An", "phone": "0901234567"},
                {"full_name": "Trần Thị Bình", "date_of_birth": "02/02/1985"}
            ]}),
        )
        .on(
            "passengers",
            "01/01/1990",
            json!({"passengers": [{"date_of_birth": "01/01/1990"}]}),
        );
    let h = harness(model).await;
    let thread = ThreadId::from("partial-passengers");

    h.say(&thread, trip).await;
    h.say(&thread, "1").await;
    assert_eq!(h.say(&thread, "đồng ý").await, prompts::ask_passenger(1, 2));

    let reply = h.say(&thread, partial).await;
    assert!(reply.contains("ngày sinh"), "{reply}");
    assert!(reply.contains("1/2"));
    let state = h.state(&thread).await;
    assert!(state.passengers.is_empty());
    assert_eq!(state.pending_passenger.full_name.as_deref(), Some("Nguyễn Văn An"));
    assert_eq!(state.pending_passenger.phone.as_deref(), Some("0901234567"));
    assert_eq!(state.pending_passenger.date_of_birth, None);

    let reply = h.say(&thread, "01/01/1990").await;
    assert_eq!(reply, prompts::ask_passenger(2, 2));
    let state = h.state(&thread).await;
    assert_eq!(state.passengers.len(), 1);
    assert_eq!(state.passengers[0].full_name, "Nguyễn Văn An");
    assert_eq!(state.passengers[0].phone, "0901234567");
}

#[tokio::test]
async fn test_general_conversation_hands_over_to_booking() {
    let model = ScriptedModel::new()
        .on("intent", "xin chào", json!({"intent": "general"}))
        .on(
            "trip",
            "Tôi muốn đặt vé đi Đà Nẵng",
            json!({"destination_city": "Đà Nẵng"}),
        );
    let h = harness(model).await;
    let thread = ThreadId::new();

    assert_eq!(h.say(&thread, "xin chào").await, CANNED_REPLY);
    assert_eq!(h.state(&thread).await.previous_agent, Some(HandlerId::General));

    let reply = h.say(&thread, "Tôi muốn đặt vé đi Đà Nẵng").await;
    assert_eq!(
        reply,
        prompts::ask_missing_trip_fields(&[
            TripField::Origin,
            TripField::DepartureDate,
            TripField::PassengerCount,
        ])
    );
    let state = h.state(&thread).await;
    assert_eq!(state.previous_agent, Some(HandlerId::Booking));
    assert_eq!(state.destination.as_deref(), Some("DAD"));
}

#[tokio::test]
async fn test_unclear_request_asks_for_intent() {
    let h = harness(ScriptedModel::new()).await;
    let reply = h.say(&ThreadId::new(), "ừm").await;
    assert_eq!(reply, prompts::CLARIFY_INTENT);
    assert_eq!(h.model.calls("intent"), 1);
}

#[tokio::test]
async fn test_cancel_unknown_reference() {
    let h = harness(ScriptedModel::new()).await;
    let thread = ThreadId::new();

    let reply = h.say(&thread, "Tôi muốn hủy vé ABC123").await;
    assert!(reply.starts_with("Dạ, em chưa hủy được vé"), "{reply}");
    assert!(reply.contains("ABC123"));
    assert!(h.bookings.is_empty().await);
}

#[tokio::test]
async fn test_cancel_without_reference_asks_for_it() {
    let h = harness(ScriptedModel::new()).await;
    let thread = ThreadId::new();

    assert_eq!(
        h.say(&thread, "tôi cần hủy vé").await,
        prompts::ASK_BOOKING_REFERENCE
    );
    assert_eq!(h.model.calls("cancellation"), 1);
    assert_eq!(
        h.state(&thread).await.previous_agent,
        Some(HandlerId::CancelBooking)
    );
}
