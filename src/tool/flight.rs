//! Flight search and reservation tools

use crate::error::{ToolError, ToolResult};
use crate::reservation::BookingService;
use crate::search::{FlightQuery, FlightSearch};
use crate::state::{FlightOffer, PassengerInfo};
use crate::tool::{error_payload, ParameterSchema, Parameters, Tool};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

pub const FLIGHT_SEARCH_TOOL: &str = "flight-search-tool";
pub const CREATE_BOOKING_TOOL: &str = "create-booking-tool";
pub const ISSUE_TICKET_TOOL: &str = "issue-ticket-tool";
pub const CANCEL_BOOKING_TOOL: &str = "cancel-booking-tool";

/// Payload text when a search yields nothing usable
pub const NO_FLIGHTS_MESSAGE: &str =
    "Xin lỗi, tôi không tìm thấy chuyến bay nào phù hợp hoặc đã có lỗi xảy ra.";

fn invalid(tool: &str, message: impl Into<String>) -> ToolError {
    ToolError::InvalidParameters {
        tool: tool.to_string(),
        message: message.into(),
    }
}

fn text_param<'a>(tool: &str, parameters: &'a Parameters, name: &str) -> ToolResult<&'a str> {
    parameters
        .get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid(tool, format!("'{name}' must be a non-empty string")))
}

fn date_param(tool: &str, parameters: &Parameters, name: &str) -> ToolResult<NaiveDate> {
    let raw = text_param(tool, parameters, name)?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| invalid(tool, format!("'{name}' must be a YYYY-MM-DD date, got {raw}")))
}

fn decode_param<T: DeserializeOwned>(
    tool: &str,
    parameters: &Parameters,
    name: &str,
) -> ToolResult<T> {
    let value = parameters
        .get(name)
        .cloned()
        .ok_or_else(|| invalid(tool, format!("missing '{name}'")))?;
    serde_json::from_value(value).map_err(|e| invalid(tool, format!("'{name}': {e}")))
}

fn to_output<T: serde::Serialize>(tool: &str, value: &T) -> ToolResult<Value> {
    serde_json::to_value(value).map_err(|e| ToolError::ExecutionFailed {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}

/// Searches offers through a [`FlightSearch`] backend
pub struct FlightSearchTool {
    search: Arc<dyn FlightSearch>,
    parameters: HashMap<String, ParameterSchema>,
}

impl FlightSearchTool {
    pub fn new(search: Arc<dyn FlightSearch>) -> Self {
        let parameters = HashMap::from([
            (
                "origin".to_string(),
                ParameterSchema::required("string", "IATA code of the departure airport"),
            ),
            (
                "destination".to_string(),
                ParameterSchema::required("string", "IATA code of the arrival airport"),
            ),
            (
                "departure_date".to_string(),
                ParameterSchema::required("string", "Departure date, YYYY-MM-DD"),
            ),
            (
                "return_date".to_string(),
                ParameterSchema::optional("string", "Return date, YYYY-MM-DD"),
            ),
            (
                "adults".to_string(),
                ParameterSchema::optional("integer", "Number of passengers").with_default(json!(1)),
            ),
        ]);
        Self { search, parameters }
    }
}

#[async_trait::async_trait]
impl Tool for FlightSearchTool {
    fn name(&self) -> &str {
        FLIGHT_SEARCH_TOOL
    }

    fn description(&self) -> &str {
        "Search flight offers for a route and date"
    }

    fn parameters(&self) -> &HashMap<String, ParameterSchema> {
        &self.parameters
    }

    async fn execute(&self, parameters: Parameters) -> ToolResult<Value> {
        let adults = parameters
            .get("adults")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n > 0)
            .ok_or_else(|| invalid(FLIGHT_SEARCH_TOOL, "'adults' must be a positive integer"))?;
        let return_date = match parameters.get("return_date") {
            Some(Value::String(_)) => Some(date_param(FLIGHT_SEARCH_TOOL, &parameters, "return_date")?),
            _ => None,
        };
        let query = FlightQuery {
            origin: text_param(FLIGHT_SEARCH_TOOL, &parameters, "origin")?.to_uppercase(),
            destination: text_param(FLIGHT_SEARCH_TOOL, &parameters, "destination")?
                .to_uppercase(),
            departure_date: date_param(FLIGHT_SEARCH_TOOL, &parameters, "departure_date")?,
            return_date,
            adults,
        };

        match self.search.search(&query).await {
            Ok(offers) if offers.is_empty() => {
                info!(origin = %query.origin, destination = %query.destination, "No offers found");
                Ok(error_payload(NO_FLIGHTS_MESSAGE))
            }
            Ok(offers) => {
                info!(
                    backend = self.search.name(),
                    offers = offers.len(),
                    "Flight search completed"
                );
                to_output(FLIGHT_SEARCH_TOOL, &offers)
            }
            Err(e) => {
                warn!(backend = self.search.name(), error = %e, "Flight search failed");
                Ok(json!({ "error": NO_FLIGHTS_MESSAGE, "details": e.to_string() }))
            }
        }
    }
}

/// Holds a booking for the selected flight and passengers
pub struct CreateBookingTool {
    bookings: Arc<dyn BookingService>,
    parameters: HashMap<String, ParameterSchema>,
}

impl CreateBookingTool {
    pub fn new(bookings: Arc<dyn BookingService>) -> Self {
        let parameters = HashMap::from([
            (
                "flight".to_string(),
                ParameterSchema::required("object", "The selected flight offer"),
            ),
            (
                "passengers".to_string(),
                ParameterSchema::required("array", "Passenger records"),
            ),
        ]);
        Self {
            bookings,
            parameters,
        }
    }
}

#[async_trait::async_trait]
impl Tool for CreateBookingTool {
    fn name(&self) -> &str {
        CREATE_BOOKING_TOOL
    }

    fn description(&self) -> &str {
        "Create a booking awaiting payment"
    }

    fn parameters(&self) -> &HashMap<String, ParameterSchema> {
        &self.parameters
    }

    async fn execute(&self, parameters: Parameters) -> ToolResult<Value> {
        let flight: FlightOffer = decode_param(CREATE_BOOKING_TOOL, &parameters, "flight")?;
        let passengers: Vec<PassengerInfo> =
            decode_param(CREATE_BOOKING_TOOL, &parameters, "passengers")?;

        let booking = self
            .bookings
            .create_booking(flight, passengers)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool: CREATE_BOOKING_TOOL.to_string(),
                message: e.to_string(),
            })?;
        to_output(CREATE_BOOKING_TOOL, &booking)
    }
}

fn booking_id_parameters() -> HashMap<String, ParameterSchema> {
    HashMap::from([(
        "booking_id".to_string(),
        ParameterSchema::required("string", "Booking reference (PNR)"),
    )])
}

/// Issues tickets once the booking is paid
pub struct IssueTicketTool {
    bookings: Arc<dyn BookingService>,
    parameters: HashMap<String, ParameterSchema>,
}

impl IssueTicketTool {
    pub fn new(bookings: Arc<dyn BookingService>) -> Self {
        Self {
            bookings,
            parameters: booking_id_parameters(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for IssueTicketTool {
    fn name(&self) -> &str {
        ISSUE_TICKET_TOOL
    }

    fn description(&self) -> &str {
        "Issue tickets for a paid booking"
    }

    fn parameters(&self) -> &HashMap<String, ParameterSchema> {
        &self.parameters
    }

    async fn execute(&self, parameters: Parameters) -> ToolResult<Value> {
        let booking_id = text_param(ISSUE_TICKET_TOOL, &parameters, "booking_id")?;
        let booking = self
            .bookings
            .issue_ticket(booking_id)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool: ISSUE_TICKET_TOOL.to_string(),
                message: e.to_string(),
            })?;
        to_output(ISSUE_TICKET_TOOL, &booking)
    }
}

pub struct CancelBookingTool {
    bookings: Arc<dyn BookingService>,
    parameters: HashMap<String, ParameterSchema>,
}

impl CancelBookingTool {
    pub fn new(bookings: Arc<dyn BookingService>) -> Self {
        Self {
            bookings,
            parameters: booking_id_parameters(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for CancelBookingTool {
    fn name(&self) -> &str {
        CANCEL_BOOKING_TOOL
    }

    fn description(&self) -> &str {
        "Cancel a booking by its reference"
    }

    fn parameters(&self) -> &HashMap<String, ParameterSchema> {
        &self.parameters
    }

    async fn execute(&self, parameters: Parameters) -> ToolResult<Value> {
        let booking_id = text_param(CANCEL_BOOKING_TOOL, &parameters, "booking_id")?;
        let booking = self
            .bookings
            .cancel(booking_id)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool: CANCEL_BOOKING_TOOL.to_string(),
                message: e.to_string(),
            })?;
        to_output(CANCEL_BOOKING_TOOL, &booking)
    }
}
