//! Flight search backends

use crate::error::SearchResult;
use crate::state::FlightOffer;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

pub mod amadeus;

pub use amadeus::{AmadeusClient, AmadeusConfig};

/// Parameters of one flight search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightQuery {
    /// IATA code
    pub origin: String,
    /// IATA code
    pub destination: String,
    pub departure_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_date: Option<NaiveDate>,
    pub adults: u32,
}

#[async_trait]
pub trait FlightSearch: Send + Sync {
    /// Offers for the query; an empty list means nothing matched
    async fn search(&self, query: &FlightQuery) -> SearchResult<Vec<FlightOffer>>;

    fn name(&self) -> &str;
}

/// Deterministic offline search
///
/// Returns the same three offers (one per Vietnamese carrier) for any
/// route, priced per adult, and counts how many searches it served.
#[derive(Debug, Default)]
pub struct StaticFlightSearch {
    requests: AtomicUsize,
    empty_routes: Vec<(String, String)>,
}

const SCHEDULE: [(&str, &str, u32, u32, f64); 3] = [
    ("VN", "213", 6, 130, 1_890_000.0),
    ("VJ", "123", 9, 125, 1_290_000.0),
    ("QH", "201", 14, 130, 1_450_000.0),
];

impl StaticFlightSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer searches on this route with no offers
    pub fn without_route(mut self, origin: &str, destination: &str) -> Self {
        self.empty_routes
            .push((origin.to_string(), destination.to_string()));
        self
    }

    /// Searches served so far
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FlightSearch for StaticFlightSearch {
    async fn search(&self, query: &FlightQuery) -> SearchResult<Vec<FlightOffer>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        debug!(
            origin = %query.origin,
            destination = %query.destination,
            date = %query.departure_date,
            "Static flight search"
        );

        let blocked = self
            .empty_routes
            .iter()
            .any(|(o, d)| *o == query.origin && *d == query.destination);
        if blocked {
            return Ok(Vec::new());
        }

        let adults = f64::from(query.adults.max(1));
        let offers = SCHEDULE
            .iter()
            .filter_map(|(carrier, number, hour, minutes, fare)| {
                let departure = query.departure_date.and_hms_opt(*hour, 0, 0)?;
                let arrival = departure + chrono::Duration::minutes(i64::from(*minutes));
                Some(FlightOffer {
                    airline: carrier.to_string(),
                    flight_number: format!("{carrier}{number}"),
                    departure_airport: query.origin.clone(),
                    departure_time: departure.format("%Y-%m-%dT%H:%M:%S").to_string(),
                    arrival_airport: query.destination.clone(),
                    arrival_time: arrival.format("%Y-%m-%dT%H:%M:%S").to_string(),
                    duration: Some(format!("PT{}H{}M", minutes / 60, minutes % 60)),
                    stops: 0,
                    price: fare * adults,
                    currency: "VND".to_string(),
                })
            })
            .collect();
        Ok(offers)
    }

    fn name(&self) -> &str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(adults: u32) -> FlightQuery {
        FlightQuery {
            origin: "HAN".to_string(),
            destination: "SGN".to_string(),
            departure_date: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
            return_date: None,
            adults,
        }
    }

    #[tokio::test]
    async fn test_static_search_is_deterministic() {
        let search = StaticFlightSearch::new();
        let first = search.search(&query(1)).await.unwrap();
        let second = search.search(&query(1)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].flight_number, "VN213");
        assert_eq!(first[0].departure_time, "2026-10-18T06:00:00");
        assert_eq!(first[0].arrival_time, "2026-10-18T08:10:00");
        assert_eq!(first[0].duration.as_deref(), Some("PT2H10M"));
        assert_eq!(search.request_count(), 2);
    }

    #[tokio::test]
    async fn test_static_search_prices_per_adult() {
        let search = StaticFlightSearch::new();
        let offers = search.search(&query(2)).await.unwrap();
        assert_eq!(offers[1].price, 2_580_000.0);
    }

    #[tokio::test]
    async fn test_static_search_empty_route() {
        let search = StaticFlightSearch::new().without_route("HAN", "SGN");
        assert!(search.search(&query(1)).await.unwrap().is_empty());
        assert_eq!(search.request_count(), 1);
    }
}
