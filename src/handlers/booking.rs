//! Booking specialist
//!
//! One step per user message (or tool result). The step to take is derived
//! from the state with [`BookingPhase::of`]; each phase reads the user
//! message with the keyword matcher first and the model second.

use crate::context::{Message, ToolCall};
use crate::error::{AgentError, Result};
use crate::handlers::format::{format_booking_summary, format_offer_details, format_offer_list};
use crate::handlers::phase::BookingPhase;
use crate::handlers::{handoff, prompts, schemas, user_text, Handler, HandlerContext};
use crate::language::ExtractedFields;
use crate::normalize::{airport_code, city_name, normalize_date, normalize_phone, parse_birth_date};
use crate::state::{
    BookingInfo, ConversationState, FlightOffer, PassengerDraft, PassengerInfo, SearchOutcome,
    StateUpdate, TripField, MAX_PASSENGERS,
};
use crate::tool::{CREATE_BOOKING_TOOL, FLIGHT_SEARCH_TOOL, ISSUE_TICKET_TOOL};
use crate::tool::flight::NO_FLIGHTS_MESSAGE;
use crate::types::HandlerId;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

const ID: HandlerId = HandlerId::Booking;

pub struct BookingHandler;

fn reply(text: impl Into<String>) -> StateUpdate {
    StateUpdate::reply(ID, text)
}

/// Decode a tool message; `Err` carries the text to show the user
pub(crate) fn tool_payload<T: DeserializeOwned>(content: &str) -> std::result::Result<T, String> {
    let value: Value =
        serde_json::from_str(content).map_err(|_| prompts::INVALID_TOOL_OUTPUT.to_string())?;
    if let Some(error) = value.get("error") {
        return Err(error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()));
    }
    serde_json::from_value(value).map_err(|_| prompts::INVALID_TOOL_OUTPUT.to_string())
}

fn search_outcome(content: &str) -> SearchOutcome {
    match tool_payload::<Vec<FlightOffer>>(content) {
        Ok(offers) if offers.is_empty() => SearchOutcome::Failed {
            message: NO_FLIGHTS_MESSAGE.to_string(),
        },
        Ok(offers) => SearchOutcome::Offers { offers },
        Err(message) => SearchOutcome::Failed { message },
    }
}

fn place(code: &str) -> String {
    city_name(code).unwrap_or(code).to_string()
}

/// Offer whose flight number appears in the message, spaces ignored
fn offer_named_in<'a>(offers: &'a [FlightOffer], text: &str) -> Option<&'a FlightOffer> {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    offers
        .iter()
        .find(|offer| compact.contains(&offer.flight_number.to_uppercase()))
}

/// Trip values pulled from one message, normalized and validated
#[derive(Debug, Default)]
struct TripChanges {
    origin: Option<String>,
    destination: Option<String>,
    departure_date: Option<NaiveDate>,
    return_date: Option<NaiveDate>,
    passenger_count: Option<u32>,
    problems: Vec<String>,
}

impl TripChanges {
    fn from_fields(fields: &ExtractedFields, state: &ConversationState, today: NaiveDate) -> Self {
        let mut changes = TripChanges::default();

        let mut departure = fields.text("departure_city");
        let mut destination = fields.text("destination_city");
        // A lone city answering "where to?" arrives as a departure city
        if destination.is_none() && state.destination.is_none() {
            if let (Some(origin), Some(city)) = (state.origin.as_deref(), departure.as_deref()) {
                if airport_code(city) != Some(origin) {
                    destination = departure.take();
                }
            }
        }

        if let Some(name) = departure {
            match airport_code(&name) {
                Some(code) => changes.origin = Some(code.to_string()),
                None => changes.problems.push(prompts::unknown_place(&name)),
            }
        }
        if let Some(name) = destination {
            match airport_code(&name) {
                Some(code) => changes.destination = Some(code.to_string()),
                None => changes.problems.push(prompts::unknown_place(&name)),
            }
        }
        if let (Some(origin), Some(destination)) = (changes.merged_origin(state), changes.merged_destination(state)) {
            if origin == destination {
                changes.problems.push(prompts::SAME_AIRPORT.to_string());
                if changes.destination.is_some() {
                    changes.destination = None;
                } else {
                    changes.origin = None;
                }
            }
        }

        if let Some(raw) = fields.text("departure_date") {
            match normalize_date(&raw, today) {
                Some(date) if date < today => changes.problems.push(prompts::PAST_DATE.to_string()),
                Some(date) => changes.departure_date = Some(date),
                None => changes.problems.push(prompts::unreadable_date(&raw)),
            }
        }
        if let Some(raw) = fields.text("return_date") {
            let departure = changes.departure_date.or(state.departure_date);
            match normalize_date(&raw, today) {
                Some(date) if departure.is_some_and(|d| date < d) => changes
                    .problems
                    .push(prompts::RETURN_BEFORE_DEPARTURE.to_string()),
                Some(date) => changes.return_date = Some(date),
                None => changes.problems.push(prompts::unreadable_date(&raw)),
            }
        }

        if let Some(count) = fields.integer("passenger_count") {
            match u32::try_from(count) {
                Ok(n) if (1..=MAX_PASSENGERS).contains(&n) => changes.passenger_count = Some(n),
                _ => changes
                    .problems
                    .push(prompts::passenger_count_out_of_range(MAX_PASSENGERS)),
            }
        }

        changes
    }

    fn merged_origin<'a>(&'a self, state: &'a ConversationState) -> Option<&'a str> {
        self.origin.as_deref().or(state.origin.as_deref())
    }

    fn merged_destination<'a>(&'a self, state: &'a ConversationState) -> Option<&'a str> {
        self.destination.as_deref().or(state.destination.as_deref())
    }

    fn is_empty(&self) -> bool {
        self.origin.is_none()
            && self.destination.is_none()
            && self.departure_date.is_none()
            && self.return_date.is_none()
            && self.passenger_count.is_none()
            && self.problems.is_empty()
    }

    /// Whether any value differs from what the state already holds
    fn changes(&self, state: &ConversationState) -> bool {
        fn differs<T: PartialEq>(new: &Option<T>, old: &Option<T>) -> bool {
            new.as_ref().is_some_and(|n| old.as_ref() != Some(n))
        }
        differs(&self.origin, &state.origin)
            || differs(&self.destination, &state.destination)
            || differs(&self.departure_date, &state.departure_date)
            || differs(&self.return_date, &state.return_date)
            || differs(&self.passenger_count, &state.passenger_count)
    }

    fn missing(&self, state: &ConversationState) -> Vec<TripField> {
        let mut missing = Vec::new();
        if self.merged_origin(state).is_none() {
            missing.push(TripField::Origin);
        }
        if self.merged_destination(state).is_none() {
            missing.push(TripField::Destination);
        }
        if self.departure_date.or(state.departure_date).is_none() {
            missing.push(TripField::DepartureDate);
        }
        if self.passenger_count.or(state.passenger_count).is_none() {
            missing.push(TripField::PassengerCount);
        }
        missing
    }

    /// The search call, once all four required fields are known
    fn search_call(&self, state: &ConversationState) -> Option<ToolCall> {
        let origin = self.merged_origin(state)?;
        let destination = self.merged_destination(state)?;
        let departure_date = self.departure_date.or(state.departure_date)?;
        let adults = self.passenger_count.or(state.passenger_count)?;

        let mut arguments = Map::new();
        arguments.insert("origin".to_string(), json!(origin));
        arguments.insert("destination".to_string(), json!(destination));
        arguments.insert(
            "departure_date".to_string(),
            json!(departure_date.format("%Y-%m-%d").to_string()),
        );
        arguments.insert("adults".to_string(), json!(adults));
        if let Some(return_date) = self.return_date.or(state.return_date) {
            arguments.insert(
                "return_date".to_string(),
                json!(return_date.format("%Y-%m-%d").to_string()),
            );
        }
        Some(ToolCall::new(FLIGHT_SEARCH_TOOL, arguments))
    }

    fn write_into(self, update: &mut StateUpdate) {
        update.origin = self.origin;
        update.destination = self.destination;
        update.departure_date = self.departure_date;
        update.return_date = self.return_date;
        update.passenger_count = self.passenger_count;
    }

    /// Reply with the problems, search, or ask for what is missing
    fn into_update(self, state: &ConversationState, force_search: bool) -> StateUpdate {
        let changed = self.changes(state);
        let missing = self.missing(state);
        let call = self.search_call(state);
        let mut problems = self.problems.clone();

        let mut update = StateUpdate::new();
        self.write_into(&mut update);

        if !problems.is_empty() {
            if !missing.is_empty() {
                problems.push(prompts::ask_missing_trip_fields(&missing));
            }
            return update.with_message(Message::from_handler(ID, problems.join(" ")));
        }

        match call {
            Some(call) if changed || force_search => {
                info!(arguments = ?call.arguments, "Trip complete, searching flights");
                update.with_message(Message::tool_request(ID, vec![call]))
            }
            Some(_) => update.with_message(Message::from_handler(ID, prompts::SEARCH_RETRY)),
            None => update.with_message(Message::from_handler(
                ID,
                prompts::ask_missing_trip_fields(&missing),
            )),
        }
    }
}

fn passenger_draft(
    record: &ExtractedFields,
    today: NaiveDate,
    problems: &mut Vec<String>,
) -> PassengerDraft {
    let full_name = record
        .text("full_name")
        .map(|name| name.split_whitespace().collect::<Vec<_>>().join(" "));
    let date_of_birth = record.text("date_of_birth").and_then(|raw| {
        let parsed = parse_birth_date(&raw, today);
        if parsed.is_none() {
            problems.push(prompts::invalid_birth_date(&raw));
        }
        parsed
    });
    let phone = record.text("phone").and_then(|raw| {
        let parsed = normalize_phone(&raw);
        if parsed.is_none() {
            problems.push(prompts::invalid_phone(&raw));
        }
        parsed
    });
    PassengerDraft {
        full_name,
        date_of_birth,
        phone,
    }
}

fn review_text(flight: &FlightOffer, passengers: &[PassengerInfo]) -> String {
    format!(
        "{}\n\n{}",
        format_booking_summary(flight, passengers),
        prompts::REVIEW_QUESTION
    )
}

fn selected_flight(state: &ConversationState) -> Result<&FlightOffer> {
    state
        .selected_flight
        .as_ref()
        .ok_or_else(|| AgentError::Internal("no selected flight".to_string()))
}

impl BookingHandler {
    /// `Some(true)` yes, `Some(false)` no, `None` unclear; `Err(handoff)` when off topic
    async fn confirmation(
        &self,
        text: &str,
        ctx: &HandlerContext<'_>,
    ) -> Result<std::result::Result<Option<bool>, StateUpdate>> {
        if let Some(decision) = ctx.intents.confirmation(text) {
            return Ok(Ok(Some(decision)));
        }
        let fields = ctx.extract_or_empty(text, &schemas::CONFIRMATION).await?;
        if fields.flag("confirmed") {
            Ok(Ok(Some(true)))
        } else if fields.flag("declined") {
            Ok(Ok(Some(false)))
        } else if fields.flag("off_topic") {
            Ok(Err(handoff(ID)))
        } else {
            Ok(Ok(None))
        }
    }

    fn read_tool_result(&self, state: &ConversationState) -> Result<StateUpdate> {
        let Some(last) = state.last_message() else {
            return Err(AgentError::Internal("empty conversation".to_string()));
        };
        let tool = last.tool_name.as_deref().unwrap_or_default();
        debug!(tool = %tool, "Reading tool result");

        match tool {
            FLIGHT_SEARCH_TOOL => {
                let outcome = search_outcome(&last.content);
                let text = match &outcome {
                    SearchOutcome::Offers { offers } => {
                        let route = match (state.origin.as_deref(), state.destination.as_deref(), state.departure_date) {
                            (Some(o), Some(d), Some(date)) => format!(
                                " từ {} đến {} ngày {}",
                                place(o),
                                place(d),
                                date.format("%d/%m/%Y")
                            ),
                            _ => String::new(),
                        };
                        format!(
                            "Dạ, em tìm được {} chuyến bay{route}:\n{}\n\n{}",
                            offers.len(),
                            format_offer_list(offers),
                            prompts::CHOOSE_FLIGHT
                        )
                    }
                    SearchOutcome::Failed { message } => {
                        info!(reason = %message, "Search returned no offers");
                        prompts::SEARCH_RETRY.to_string()
                    }
                };
                let mut update = reply(text);
                update.search_results = Some(outcome);
                Ok(update)
            }
            CREATE_BOOKING_TOOL => Ok(match tool_payload::<BookingInfo>(&last.content) {
                Ok(booking) => {
                    let link = booking.payment_link.clone().unwrap_or_default();
                    let mut update = reply(prompts::payment_requested(&booking.booking_id, &link));
                    update.booking = Some(Some(booking));
                    update
                }
                Err(error) => reply(prompts::booking_failed(&error)),
            }),
            ISSUE_TICKET_TOOL => Ok(match tool_payload::<BookingInfo>(&last.content) {
                Ok(booking) => {
                    let mut update = reply(prompts::ticket_issued(&booking.booking_id));
                    update.booking = Some(Some(booking));
                    update
                }
                Err(error) => reply(prompts::booking_failed(&error)),
            }),
            other => Err(AgentError::Internal(format!(
                "booking handler cannot read results of '{other}'"
            ))),
        }
    }

    async fn gather_trip(
        &self,
        state: &ConversationState,
        ctx: &HandlerContext<'_>,
    ) -> Result<StateUpdate> {
        let text = user_text(state);
        let fields = ctx.extract_or_empty(text, &schemas::TRIP).await?;
        let trip = TripChanges::from_fields(&fields, state, ctx.today);
        if trip.is_empty() && fields.flag("off_topic") {
            return Ok(handoff(ID));
        }
        let never_searched = state.search_results.is_none();
        Ok(trip.into_update(state, never_searched))
    }

    async fn select_flight(
        &self,
        state: &ConversationState,
        ctx: &HandlerContext<'_>,
    ) -> Result<StateUpdate> {
        let text = user_text(state);
        let offers = state.offers();

        if let Some(offer) = offer_named_in(offers, text) {
            return Ok(self.select(offer));
        }
        if let Ok(option) = text.trim().trim_end_matches('.').parse::<usize>() {
            return Ok(match option.checked_sub(1).and_then(|i| offers.get(i)) {
                Some(offer) => self.select(offer),
                None => reply(prompts::invalid_option(offers.len())),
            });
        }

        let fields = ctx.extract_or_empty(text, &schemas::SELECTION).await?;
        if let Some(offer) = fields
            .text("flight_number")
            .and_then(|number| offer_named_in(offers, &number))
        {
            return Ok(self.select(offer));
        }

        let trip = TripChanges::from_fields(&fields, state, ctx.today);
        if trip.changes(state) || !trip.problems.is_empty() {
            return Ok(trip.into_update(state, false));
        }

        if let Some(option) = fields.integer("option_number") {
            let chosen = usize::try_from(option)
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| offers.get(i));
            return Ok(match chosen {
                Some(offer) => self.select(offer),
                None => reply(prompts::invalid_option(offers.len())),
            });
        }

        if fields.flag("off_topic") {
            return Ok(handoff(ID));
        }

        let listing = format!("{}\n\n{}", format_offer_list(offers), prompts::CHOOSE_FLIGHT);
        let instruction = format!(
            "{}\nDanh sách chuyến bay:\n{}",
            prompts::SELECTION_INSTRUCTION,
            format_offer_list(offers)
        );
        Ok(reply(ctx.reply(state, instruction, &listing).await?))
    }

    fn select(&self, offer: &FlightOffer) -> StateUpdate {
        info!(flight = %offer.flight_number, "Flight selected");
        let mut update = reply(format!(
            "{}\n\n{}",
            format_offer_details(offer),
            prompts::CONFIRM_FLIGHT
        ));
        update.selected_flight = Some(Some(offer.clone()));
        update
    }

    async fn confirm_flight(
        &self,
        state: &ConversationState,
        ctx: &HandlerContext<'_>,
    ) -> Result<StateUpdate> {
        let text = user_text(state);
        let selected = selected_flight(state)?;

        if let Some(other) = offer_named_in(state.offers(), text)
            .filter(|offer| offer.flight_number != selected.flight_number)
        {
            return Ok(self.select(other));
        }

        let decision = match self.confirmation(text, ctx).await? {
            Ok(decision) => decision,
            Err(handoff) => return Ok(handoff),
        };

        match decision {
            Some(true) => {
                let total = state.passenger_count.unwrap_or(1);
                let mut update = if state.passengers_remaining() == 0 {
                    reply(review_text(selected, &state.passengers))
                } else {
                    reply(prompts::ask_passenger(state.passengers.len() + 1, total))
                };
                update.flight_confirmed = Some(true);
                Ok(update)
            }
            Some(false) => {
                let mut update = reply(format!(
                    "Dạ, em gửi lại danh sách chuyến bay:\n{}\n\n{}",
                    format_offer_list(state.offers()),
                    prompts::CHOOSE_FLIGHT
                ));
                update.selected_flight = Some(None);
                Ok(update)
            }
            None => Ok(reply(
                ctx.reply(state, prompts::CONFIRMATION_INSTRUCTION, prompts::CONFIRM_FLIGHT)
                    .await?,
            )),
        }
    }

    async fn collect_passengers(
        &self,
        state: &ConversationState,
        ctx: &HandlerContext<'_>,
    ) -> Result<StateUpdate> {
        let text = user_text(state);
        let fields = ctx.extract_or_empty(text, &schemas::PASSENGERS).await?;
        let records = fields.records("passengers");
        if records.is_empty() && fields.flag("off_topic") {
            return Ok(handoff(ID));
        }

        let travel_date = state.departure_date.unwrap_or(ctx.today);
        let total = state.passenger_count.unwrap_or(1);
        let remaining = state.passengers_remaining();

        let mut problems = Vec::new();
        let mut completed: Vec<PassengerInfo> = Vec::new();
        // The pending draft only continues the first record of the message;
        // records are never merged with each other
        let mut carry = state.pending_passenger.clone();
        for (position, record) in records.iter().enumerate() {
            if completed.len() >= remaining {
                debug!(extra = records.len() - position, "Ignoring passengers beyond the declared count");
                break;
            }
            let mut draft = passenger_draft(record, ctx.today, &mut problems);
            if position == 0 {
                draft = draft.merge(std::mem::take(&mut carry));
            }
            match draft.complete(travel_date) {
                Some(passenger) => completed.push(passenger),
                None => {
                    if position + 1 < records.len() {
                        debug!(
                            skipped = records.len() - position - 1,
                            "Incomplete passenger, later records wait for it"
                        );
                    }
                    carry = draft;
                    break;
                }
            }
        }

        let entered = state.passengers.len() + completed.len();
        let mut update = StateUpdate::new();

        let text = if entered >= total as usize {
            let all: Vec<PassengerInfo> = state
                .passengers
                .iter()
                .chain(completed.iter())
                .cloned()
                .collect();
            carry = PassengerDraft::default();
            review_text(selected_flight(state)?, &all)
        } else {
            let next = if carry.is_empty() {
                prompts::ask_passenger(entered + 1, total)
            } else {
                prompts::ask_passenger_fields(&carry.missing(), entered + 1, total)
            };
            problems.push(next);
            problems.join(" ")
        };

        info!(added = completed.len(), entered, total, "Passenger details processed");
        update.passengers = completed;
        update.pending_passenger = Some(carry);
        Ok(update.with_message(Message::from_handler(ID, text)))
    }

    async fn review_booking(
        &self,
        state: &ConversationState,
        ctx: &HandlerContext<'_>,
    ) -> Result<StateUpdate> {
        let text = user_text(state);
        let flight = selected_flight(state)?;

        let decision = match self.confirmation(text, ctx).await? {
            Ok(decision) => decision,
            Err(handoff) => return Ok(handoff),
        };

        match decision {
            Some(true) => {
                let mut arguments = Map::new();
                arguments.insert("flight".to_string(), serde_json::to_value(flight)?);
                arguments.insert(
                    "passengers".to_string(),
                    serde_json::to_value(&state.passengers)?,
                );
                info!(flight = %flight.flight_number, passengers = state.passengers.len(), "Booking confirmed by customer");
                Ok(StateUpdate::new().with_message(Message::tool_request(
                    ID,
                    vec![ToolCall::new(CREATE_BOOKING_TOOL, arguments)],
                )))
            }
            Some(false) => {
                let total = state.passenger_count.unwrap_or(1);
                let mut update = reply(format!(
                    "Dạ, em sẽ nhập lại thông tin hành khách. {}",
                    prompts::ask_passenger(1, total)
                ));
                update.reset_passengers = true;
                Ok(update)
            }
            None => Ok(reply(review_text(flight, &state.passengers))),
        }
    }

    async fn await_payment(
        &self,
        state: &ConversationState,
        ctx: &HandlerContext<'_>,
    ) -> Result<StateUpdate> {
        let text = user_text(state);
        let booking = state
            .booking
            .as_ref()
            .ok_or_else(|| AgentError::Internal("no booking awaiting payment".to_string()))?;

        let paid = if ctx.intents.is_paid(text) {
            true
        } else {
            let fields = ctx.extract_or_empty(text, &schemas::PAYMENT).await?;
            if !fields.flag("paid") && fields.flag("off_topic") {
                return Ok(handoff(ID));
            }
            fields.flag("paid")
        };

        if paid {
            let mut arguments = Map::new();
            arguments.insert("booking_id".to_string(), json!(booking.booking_id));
            return Ok(StateUpdate::new().with_message(Message::tool_request(
                ID,
                vec![ToolCall::new(ISSUE_TICKET_TOOL, arguments)],
            )));
        }

        let link = booking.payment_link.as_deref().unwrap_or_default();
        Ok(reply(prompts::payment_reminder(link)))
    }

    async fn follow_up(
        &self,
        state: &ConversationState,
        ctx: &HandlerContext<'_>,
    ) -> Result<StateUpdate> {
        let booking_id = state
            .booking
            .as_ref()
            .map(|b| b.booking_id.as_str())
            .unwrap_or_default();
        let instruction = format!("{} Mã đặt chỗ: {booking_id}.", prompts::COMPLETED_INSTRUCTION);
        Ok(reply(
            ctx.reply(state, instruction, prompts::GENERAL_FALLBACK).await?,
        ))
    }
}

#[async_trait]
impl Handler for BookingHandler {
    fn id(&self) -> HandlerId {
        ID
    }

    async fn handle(
        &self,
        state: &ConversationState,
        ctx: &HandlerContext<'_>,
    ) -> Result<StateUpdate> {
        let phase = BookingPhase::of(state);
        debug!(phase = %phase, "Booking step");

        let wants_cancel = || ctx.intents.best_intent(user_text(state)) == Some(HandlerId::CancelBooking);

        let update = match phase {
            BookingPhase::ToolResult => self.read_tool_result(state)?,
            BookingPhase::AwaitingTool => {
                return Err(AgentError::Internal(
                    "booking step requested while tool calls are pending".to_string(),
                ))
            }
            _ if wants_cancel() => handoff(ID),
            BookingPhase::GatheringTrip => self.gather_trip(state, ctx).await?,
            BookingPhase::SelectingFlight => self.select_flight(state, ctx).await?,
            BookingPhase::ConfirmingFlight => self.confirm_flight(state, ctx).await?,
            BookingPhase::CollectingPassengers => self.collect_passengers(state, ctx).await?,
            BookingPhase::ReviewingBooking => self.review_booking(state, ctx).await?,
            BookingPhase::AwaitingPayment => self.await_payment(state, ctx).await?,
            BookingPhase::Completed => self.follow_up(state, ctx).await?,
        }
        .handled_by(ID);

        let mut projected = state.clone();
        projected.apply(update.clone());
        let next = BookingPhase::of(&projected);
        if let Err(e) = phase.check_advance(next) {
            warn!(from = %phase, to = %next, "Booking step rejected");
            return Err(e.into());
        }
        if next != phase {
            debug!(from = %phase, to = %next, "Booking phase advanced");
        }

        Ok(update)
    }
}
