//! Conversation state and the update record handlers return
//!
//! Handlers never touch [`ConversationState`] directly. They return a
//! [`StateUpdate`] and the turn engine merges it with [`ConversationState::apply`],
//! which is the only place the merge rules live:
//!
//! - `messages` and `passengers` append (passengers capped at the declared count)
//! - trip fields overwrite only when a new value is present
//! - every other field overwrites when the update carries it
//! - new search results supersede the current selection

use crate::context::Message;
use crate::types::HandlerId;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound on passengers per booking
pub const MAX_PASSENGERS: u32 = 9;

/// One bookable offer returned by a flight search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightOffer {
    pub airline: String,
    pub flight_number: String,
    pub departure_airport: String,
    pub departure_time: String,
    pub arrival_airport: String,
    pub arrival_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default)]
    pub stops: u32,
    pub price: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassengerType {
    Adult,
    Child,
    Infant,
}

impl PassengerType {
    /// Fare category by age on the day of travel
    pub fn on_date(date_of_birth: NaiveDate, travel_date: NaiveDate) -> Self {
        let mut age = travel_date.year() - date_of_birth.year();
        if (travel_date.month(), travel_date.day()) < (date_of_birth.month(), date_of_birth.day())
        {
            age -= 1;
        }
        match age {
            a if a < 2 => PassengerType::Infant,
            a if a < 12 => PassengerType::Child,
            _ => PassengerType::Adult,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PassengerType::Adult => "người lớn",
            PassengerType::Child => "trẻ em",
            PassengerType::Infant => "em bé",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassengerInfo {
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    pub phone: String,
    pub passenger_type: PassengerType,
}

/// Passenger details gathered so far, possibly across several messages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassengerDraft {
    pub full_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub phone: Option<String>,
}

/// A single piece of passenger information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassengerField {
    FullName,
    DateOfBirth,
    Phone,
}

impl PassengerField {
    pub fn label(self) -> &'static str {
        match self {
            PassengerField::FullName => "họ tên đầy đủ",
            PassengerField::DateOfBirth => "ngày sinh",
            PassengerField::Phone => "số điện thoại",
        }
    }
}

impl PassengerDraft {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.date_of_birth.is_none() && self.phone.is_none()
    }

    /// Fill the gaps of `self` from `other`; values already present win
    pub fn merge(mut self, other: PassengerDraft) -> Self {
        self.full_name = self.full_name.or(other.full_name);
        self.date_of_birth = self.date_of_birth.or(other.date_of_birth);
        self.phone = self.phone.or(other.phone);
        self
    }

    pub fn missing(&self) -> Vec<PassengerField> {
        let mut missing = Vec::new();
        if self.full_name.is_none() {
            missing.push(PassengerField::FullName);
        }
        if self.date_of_birth.is_none() {
            missing.push(PassengerField::DateOfBirth);
        }
        if self.phone.is_none() {
            missing.push(PassengerField::Phone);
        }
        missing
    }

    /// Turn a complete draft into a passenger record
    pub fn complete(&self, travel_date: NaiveDate) -> Option<PassengerInfo> {
        let full_name = self.full_name.clone()?;
        let date_of_birth = self.date_of_birth?;
        let phone = self.phone.clone()?;
        Some(PassengerInfo {
            full_name,
            date_of_birth,
            phone,
            passenger_type: PassengerType::on_date(date_of_birth, travel_date),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    PendingPayment,
    Confirmed,
    Cancelled,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BookingStatus::PendingPayment => "pending payment",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        };
        f.write_str(text)
    }
}

/// A reservation held by the booking service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingInfo {
    /// Passenger name record
    pub booking_id: String,
    pub status: BookingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flight: Option<FlightOffer>,
    #[serde(default)]
    pub passengers: Vec<PassengerInfo>,
}

/// What the last flight search produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchOutcome {
    Offers { offers: Vec<FlightOffer> },
    /// The search failed or its output was unreadable
    Failed { message: String },
}

impl SearchOutcome {
    pub fn offers(&self) -> &[FlightOffer] {
        match self {
            SearchOutcome::Offers { offers } => offers,
            SearchOutcome::Failed { .. } => &[],
        }
    }

    pub fn has_offers(&self) -> bool {
        !self.offers().is_empty()
    }
}

/// The four trip parameters a search needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripField {
    Origin,
    Destination,
    DepartureDate,
    PassengerCount,
}

impl TripField {
    pub fn label(self) -> &'static str {
        match self {
            TripField::Origin => "điểm đi",
            TripField::Destination => "điểm đến",
            TripField::DepartureDate => "ngày đi",
            TripField::PassengerCount => "số lượng hành khách",
        }
    }
}

/// Everything a thread knows about its conversation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub messages: Vec<Message>,

    /// IATA code
    pub origin: Option<String>,
    /// IATA code
    pub destination: Option<String>,
    pub departure_date: Option<NaiveDate>,
    pub return_date: Option<NaiveDate>,
    pub passenger_count: Option<u32>,

    pub search_results: Option<SearchOutcome>,
    pub selected_flight: Option<FlightOffer>,
    #[serde(default)]
    pub flight_confirmed: bool,
    #[serde(default)]
    pub passengers: Vec<PassengerInfo>,
    #[serde(default)]
    pub pending_passenger: PassengerDraft,
    pub booking: Option<BookingInfo>,

    /// Handler explicitly requested for the next step
    pub next_agent: Option<HandlerId>,
    /// Specialist that handled the previous step
    pub previous_agent: Option<HandlerId>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn offers(&self) -> &[FlightOffer] {
        self.search_results
            .as_ref()
            .map(SearchOutcome::offers)
            .unwrap_or(&[])
    }

    /// Trip fields a search still needs, in asking order
    pub fn missing_trip_fields(&self) -> Vec<TripField> {
        let mut missing = Vec::new();
        if self.origin.is_none() {
            missing.push(TripField::Origin);
        }
        if self.destination.is_none() {
            missing.push(TripField::Destination);
        }
        if self.departure_date.is_none() {
            missing.push(TripField::DepartureDate);
        }
        if self.passenger_count.is_none() {
            missing.push(TripField::PassengerCount);
        }
        missing
    }

    /// Passengers still to be entered before the booking can be reviewed
    pub fn passengers_remaining(&self) -> usize {
        let declared = self.passenger_count.unwrap_or(0) as usize;
        declared.saturating_sub(self.passengers.len())
    }

    /// Merge a handler's update into the state
    pub fn apply(&mut self, update: StateUpdate) {
        self.messages.extend(update.messages);

        if let Some(origin) = update.origin {
            self.origin = Some(origin);
        }
        if let Some(destination) = update.destination {
            self.destination = Some(destination);
        }
        if let Some(date) = update.departure_date {
            self.departure_date = Some(date);
        }
        if let Some(date) = update.return_date {
            self.return_date = Some(date);
        }
        if let Some(count) = update.passenger_count {
            self.passenger_count = Some(count);
            self.passengers.truncate(count as usize);
        }

        if let Some(results) = update.search_results {
            self.search_results = Some(results);
            self.selected_flight = None;
            self.flight_confirmed = false;
        }
        // A new selection (or clearing it) always needs a fresh confirmation
        if let Some(selected) = update.selected_flight {
            self.selected_flight = selected;
            self.flight_confirmed = false;
        }
        if let Some(confirmed) = update.flight_confirmed {
            self.flight_confirmed = confirmed;
        }

        if update.reset_passengers {
            self.passengers.clear();
            self.pending_passenger = PassengerDraft::default();
        }
        let capacity = self.passengers_remaining();
        self.passengers
            .extend(update.passengers.into_iter().take(capacity));
        if let Some(draft) = update.pending_passenger {
            self.pending_passenger = draft;
        }

        if let Some(booking) = update.booking {
            self.booking = booking;
        }
        if let Some(next) = update.next_agent {
            self.next_agent = next;
        }
        if let Some(previous) = update.previous_agent {
            self.previous_agent = Some(previous);
        }
    }
}

/// Partial state change produced by one handler step
///
/// `Option<Option<T>>` fields distinguish "leave alone" (`None`) from
/// "clear" (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub messages: Vec<Message>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub departure_date: Option<NaiveDate>,
    pub return_date: Option<NaiveDate>,
    pub passenger_count: Option<u32>,
    pub search_results: Option<SearchOutcome>,
    pub selected_flight: Option<Option<FlightOffer>>,
    pub flight_confirmed: Option<bool>,
    pub passengers: Vec<PassengerInfo>,
    pub reset_passengers: bool,
    pub pending_passenger: Option<PassengerDraft>,
    pub booking: Option<Option<BookingInfo>>,
    pub next_agent: Option<Option<HandlerId>>,
    pub previous_agent: Option<HandlerId>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update carrying a single assistant reply
    pub fn reply(author: HandlerId, text: impl Into<String>) -> Self {
        Self::new().with_message(Message::from_handler(author, text))
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Ask the router to send the next step to `handler`
    pub fn route_to(mut self, handler: HandlerId) -> Self {
        self.next_agent = Some(Some(handler));
        self
    }

    /// Record `handler` as the specialist that owns the conversation
    pub fn handled_by(mut self, handler: HandlerId) -> Self {
        self.previous_agent = Some(handler);
        self
    }
}
