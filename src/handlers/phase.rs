//! Booking sub-phases
//!
//! The booking handler does not store its progress anywhere: the phase is
//! recomputed from the state markers on every step. [`BookingPhase::of`]
//! is that derivation, and [`BookingPhase::successors`] lists the phases a
//! single booking step may legally lead to.

use crate::error::RoutingError;
use crate::state::{BookingStatus, ConversationState};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingPhase {
    /// A tool result waits to be read
    ToolResult,
    /// Tool calls were issued and wait for the executor
    AwaitingTool,
    /// Collecting origin, destination, date and passenger count
    GatheringTrip,
    SelectingFlight,
    ConfirmingFlight,
    CollectingPassengers,
    /// Full summary shown, waiting for "xác nhận"
    ReviewingBooking,
    AwaitingPayment,
    Completed,
}

impl BookingPhase {
    pub fn of(state: &ConversationState) -> Self {
        if let Some(last) = state.last_message() {
            if last.is_tool_result() {
                return BookingPhase::ToolResult;
            }
            if last.has_tool_calls() {
                return BookingPhase::AwaitingTool;
            }
        }

        match state.booking.as_ref().map(|b| b.status) {
            Some(BookingStatus::PendingPayment) => return BookingPhase::AwaitingPayment,
            Some(BookingStatus::Confirmed) => return BookingPhase::Completed,
            Some(BookingStatus::Cancelled) | None => {}
        }

        let has_offers = state
            .search_results
            .as_ref()
            .is_some_and(|results| results.has_offers());

        if !has_offers {
            BookingPhase::GatheringTrip
        } else if state.selected_flight.is_none() {
            BookingPhase::SelectingFlight
        } else if !state.flight_confirmed {
            BookingPhase::ConfirmingFlight
        } else if state.passengers_remaining() > 0 {
            BookingPhase::CollectingPassengers
        } else {
            BookingPhase::ReviewingBooking
        }
    }

    /// Phases reachable in one step, besides staying put
    pub fn successors(self) -> &'static [BookingPhase] {
        use BookingPhase::*;
        match self {
            ToolResult => &[
                GatheringTrip,
                SelectingFlight,
                ReviewingBooking,
                AwaitingPayment,
                Completed,
            ],
            AwaitingTool => &[ToolResult],
            GatheringTrip => &[AwaitingTool],
            SelectingFlight => &[ConfirmingFlight, AwaitingTool],
            ConfirmingFlight => &[SelectingFlight, CollectingPassengers, ReviewingBooking],
            CollectingPassengers => &[ReviewingBooking],
            ReviewingBooking => &[CollectingPassengers, AwaitingTool],
            AwaitingPayment => &[AwaitingTool],
            Completed => &[],
        }
    }

    pub fn can_advance_to(self, next: BookingPhase) -> bool {
        self == next || self.successors().contains(&next)
    }

    /// Reject a step that leaves the successor table
    pub fn check_advance(self, next: BookingPhase) -> Result<(), RoutingError> {
        if self.can_advance_to(next) {
            Ok(())
        } else {
            Err(RoutingError::IllegalTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingPhase::ToolResult => "tool_result",
            BookingPhase::AwaitingTool => "awaiting_tool",
            BookingPhase::GatheringTrip => "gathering_trip",
            BookingPhase::SelectingFlight => "selecting_flight",
            BookingPhase::ConfirmingFlight => "confirming_flight",
            BookingPhase::CollectingPassengers => "collecting_passengers",
            BookingPhase::ReviewingBooking => "reviewing_booking",
            BookingPhase::AwaitingPayment => "awaiting_payment",
            BookingPhase::Completed => "completed",
        }
    }
}

impl fmt::Display for BookingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Message, ToolCall};
    use crate::state::{
        BookingInfo, FlightOffer, PassengerInfo, PassengerType, SearchOutcome, StateUpdate,
    };
    use crate::types::HandlerId;
    use chrono::NaiveDate;

    fn offer() -> FlightOffer {
        FlightOffer {
            airline: "VN".to_string(),
            flight_number: "VN213".to_string(),
            departure_airport: "HAN".to_string(),
            departure_time: "2026-10-18T06:00:00".to_string(),
            arrival_airport: "SGN".to_string(),
            arrival_time: "2026-10-18T08:10:00".to_string(),
            duration: None,
            stops: 0,
            price: 1_890_000.0,
            currency: "VND".to_string(),
        }
    }

    fn passenger() -> PassengerInfo {
        PassengerInfo {
            full_name: "Trần Thị Bình".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1992, 3, 4).unwrap(),
            phone: "0912345678".to_string(),
            passenger_type: PassengerType::Adult,
        }
    }

    fn booking(status: BookingStatus) -> BookingInfo {
        BookingInfo {
            booking_id: "ABC123".to_string(),
            status,
            payment_link: None,
            flight: Some(offer()),
            passengers: vec![passenger()],
        }
    }

    #[test]
    fn test_phase_progression() {
        let mut state = ConversationState::new();
        assert_eq!(BookingPhase::of(&state), BookingPhase::GatheringTrip);

        state.apply(StateUpdate {
            passenger_count: Some(1),
            search_results: Some(SearchOutcome::Offers {
                offers: vec![offer()],
            }),
            ..StateUpdate::default()
        });
        assert_eq!(BookingPhase::of(&state), BookingPhase::SelectingFlight);

        state.apply(StateUpdate {
            selected_flight: Some(Some(offer())),
            ..StateUpdate::default()
        });
        assert_eq!(BookingPhase::of(&state), BookingPhase::ConfirmingFlight);

        state.apply(StateUpdate {
            flight_confirmed: Some(true),
            ..StateUpdate::default()
        });
        assert_eq!(BookingPhase::of(&state), BookingPhase::CollectingPassengers);

        state.apply(StateUpdate {
            passengers: vec![passenger()],
            ..StateUpdate::default()
        });
        assert_eq!(BookingPhase::of(&state), BookingPhase::ReviewingBooking);

        state.apply(StateUpdate {
            booking: Some(Some(booking(BookingStatus::PendingPayment))),
            ..StateUpdate::default()
        });
        assert_eq!(BookingPhase::of(&state), BookingPhase::AwaitingPayment);

        state.apply(StateUpdate {
            booking: Some(Some(booking(BookingStatus::Confirmed))),
            ..StateUpdate::default()
        });
        assert_eq!(BookingPhase::of(&state), BookingPhase::Completed);
    }

    #[test]
    fn test_failed_search_keeps_gathering() {
        let mut state = ConversationState::new();
        state.apply(StateUpdate {
            search_results: Some(SearchOutcome::Failed {
                message: "none".to_string(),
            }),
            ..StateUpdate::default()
        });
        assert_eq!(BookingPhase::of(&state), BookingPhase::GatheringTrip);
    }

    #[test]
    fn test_cancelled_booking_falls_back_to_flight_phases() {
        let mut state = ConversationState::new();
        state.apply(StateUpdate {
            search_results: Some(SearchOutcome::Offers {
                offers: vec![offer()],
            }),
            booking: Some(Some(booking(BookingStatus::Cancelled))),
            ..StateUpdate::default()
        });
        assert_eq!(BookingPhase::of(&state), BookingPhase::SelectingFlight);
    }

    #[test]
    fn test_tool_messages_take_precedence() {
        let call = ToolCall::new("flight-search-tool", serde_json::Map::new());
        let mut state = ConversationState::new();
        state.apply(StateUpdate::new().with_message(Message::tool_request(
            HandlerId::Booking,
            vec![call.clone()],
        )));
        assert_eq!(BookingPhase::of(&state), BookingPhase::AwaitingTool);

        state.apply(StateUpdate::new().with_message(Message::tool_result(&call, "[]")));
        assert_eq!(BookingPhase::of(&state), BookingPhase::ToolResult);
    }

    #[test]
    fn test_successor_table() {
        use BookingPhase::*;
        assert!(GatheringTrip.can_advance_to(GatheringTrip));
        assert!(GatheringTrip.can_advance_to(AwaitingTool));
        assert!(!GatheringTrip.can_advance_to(ReviewingBooking));
        assert!(CollectingPassengers.can_advance_to(ReviewingBooking));
        assert!(!CollectingPassengers.can_advance_to(AwaitingPayment));
        assert!(AwaitingTool.can_advance_to(ToolResult));
        assert!(Completed.successors().is_empty());
    }

    #[test]
    fn test_check_advance_rejects_skipped_confirmation() {
        use BookingPhase::*;
        assert!(SelectingFlight.check_advance(ConfirmingFlight).is_ok());
        let err = SelectingFlight
            .check_advance(CollectingPassengers)
            .unwrap_err();
        assert!(matches!(
            err,
            RoutingError::IllegalTransition { ref from, ref to }
                if from == "selecting_flight" && to == "collecting_passengers"
        ));
    }
}
