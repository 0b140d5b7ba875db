//! Amadeus Self-Service flight offers client
//!
//! Client-credentials OAuth2 token, cached until shortly before it expires,
//! then `GET /v2/shopping/flight-offers`. Only the first itinerary of each
//! offer is kept, flattened into a [`FlightOffer`].

use crate::error::{SearchError, SearchResult};
use crate::search::{FlightQuery, FlightSearch};
use crate::state::FlightOffer;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

const TEST_BASE_URL: &str = "https://test.api.amadeus.com";
const PRODUCTION_BASE_URL: &str = "https://api.amadeus.com";

/// Renew tokens this long before the advertised expiry
const TOKEN_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct AmadeusConfig {
    pub client_id: String,
    pub client_secret: String,
    pub base_url: String,
    pub max_results: u32,
    pub currency: String,
    pub non_stop: bool,
    pub timeout: Duration,
}

impl AmadeusConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            base_url: TEST_BASE_URL.to_string(),
            max_results: 5,
            currency: "VND".to_string(),
            non_stop: false,
            timeout: Duration::from_secs(20),
        }
    }

    /// Read `AMADEUS_CLIENT_ID`, `AMADEUS_CLIENT_SECRET` and `AMADEUS_HOSTNAME`
    /// (`test` or `production`, default `test`)
    pub fn from_env() -> SearchResult<Self> {
        let client_id = std::env::var("AMADEUS_CLIENT_ID").map_err(|_| {
            SearchError::Configuration("AMADEUS_CLIENT_ID environment variable not set".to_string())
        })?;
        let client_secret = std::env::var("AMADEUS_CLIENT_SECRET").map_err(|_| {
            SearchError::Configuration(
                "AMADEUS_CLIENT_SECRET environment variable not set".to_string(),
            )
        })?;
        let hostname = std::env::var("AMADEUS_HOSTNAME").unwrap_or_else(|_| "test".to_string());

        Ok(Self::new(client_id, client_secret).with_hostname(&hostname))
    }

    pub fn with_hostname(mut self, hostname: &str) -> Self {
        self.base_url = match hostname {
            "production" => PRODUCTION_BASE_URL.to_string(),
            "test" => TEST_BASE_URL.to_string(),
            custom => custom.trim_end_matches('/').to_string(),
        };
        self
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn with_non_stop(mut self, non_stop: bool) -> Self {
        self.non_stop = non_stop;
        self
    }
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

pub struct AmadeusClient {
    client: Client,
    config: AmadeusConfig,
    token: Mutex<Option<AccessToken>>,
}

impl AmadeusClient {
    pub fn new(config: AmadeusConfig) -> SearchResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SearchError::Configuration(format!("failed to build HTTP client: {e}")))?;

        info!(base_url = %config.base_url, "Amadeus client ready");
        Ok(Self {
            client,
            config,
            token: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &AmadeusConfig {
        &self.config
    }

    async fn access_token(&self) -> SearchResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.expires_at > Instant::now()) {
            return Ok(token.value.clone());
        }

        debug!("Requesting Amadeus access token");
        let url = format!("{}/v1/security/oauth2/token", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SearchError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Amadeus token exchange rejected");
            return Err(SearchError::Authentication(format!("{status}: {body}")));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Decode(e.to_string()))?;

        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(TOKEN_MARGIN);
        let token = AccessToken {
            value: body.access_token,
            expires_at: Instant::now() + lifetime,
        };
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    fn query_params(&self, query: &FlightQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("originLocationCode", query.origin.clone()),
            ("destinationLocationCode", query.destination.clone()),
            ("departureDate", query.departure_date.format("%Y-%m-%d").to_string()),
            ("adults", query.adults.max(1).to_string()),
            ("nonStop", self.config.non_stop.to_string()),
            ("max", self.config.max_results.to_string()),
            ("currencyCode", self.config.currency.clone()),
        ];
        if let Some(return_date) = query.return_date {
            params.push(("returnDate", return_date.format("%Y-%m-%d").to_string()));
        }
        params
    }
}

#[async_trait]
impl FlightSearch for AmadeusClient {
    async fn search(&self, query: &FlightQuery) -> SearchResult<Vec<FlightOffer>> {
        let token = self.access_token().await?;
        let params = self.query_params(query);
        info!(
            origin = %query.origin,
            destination = %query.destination,
            date = %query.departure_date,
            adults = query.adults,
            "Searching Amadeus flight offers"
        );

        let url = format!("{}/v2/shopping/flight-offers", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&params)
            .send()
            .await
            .map_err(|e| SearchError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = %status, "Amadeus search failed");
            return Err(SearchError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: OffersResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Decode(e.to_string()))?;
        trace!(offers = body.data.len(), "Amadeus answered");

        Ok(flatten_offers(body.data, &self.config.currency))
    }

    fn name(&self) -> &str {
        "amadeus"
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_lifetime")]
    expires_in: u64,
}

fn default_token_lifetime() -> u64 {
    1799
}

#[derive(Debug, Deserialize)]
struct OffersResponse {
    #[serde(default)]
    data: Vec<Offer>,
}

#[derive(Debug, Deserialize)]
struct Offer {
    itineraries: Vec<Itinerary>,
    price: Price,
}

#[derive(Debug, Deserialize)]
struct Itinerary {
    #[serde(default)]
    duration: Option<String>,
    segments: Vec<Segment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Segment {
    carrier_code: String,
    number: String,
    departure: Endpoint,
    arrival: Endpoint,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Endpoint {
    iata_code: String,
    at: String,
}

#[derive(Debug, Deserialize)]
struct Price {
    total: String,
    #[serde(default)]
    currency: Option<String>,
}

/// Flatten API offers; offers without segments or a readable price are skipped
fn flatten_offers(offers: Vec<Offer>, currency: &str) -> Vec<FlightOffer> {
    offers
        .into_iter()
        .filter_map(|offer| {
            let itinerary = offer.itineraries.into_iter().next()?;
            let first = itinerary.segments.first()?;
            let last = itinerary.segments.last()?;
            let price = offer.price.total.parse::<f64>().ok()?;
            Some(FlightOffer {
                airline: first.carrier_code.clone(),
                flight_number: format!("{}{}", first.carrier_code, first.number),
                departure_airport: first.departure.iata_code.clone(),
                departure_time: first.departure.at.clone(),
                arrival_airport: last.arrival.iata_code.clone(),
                arrival_time: last.arrival.at.clone(),
                duration: itinerary.duration.clone(),
                stops: u32::try_from(itinerary.segments.len().saturating_sub(1)).unwrap_or(0),
                price,
                currency: offer
                    .price
                    .currency
                    .unwrap_or_else(|| currency.to_string()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const SAMPLE: &str = r#"{
        "meta": {"count": 2},
        "data": [
            {
                "id": "1",
                "itineraries": [{
                    "duration": "PT4H35M",
                    "segments": [
                        {"carrierCode": "VN", "number": "7213",
                         "departure": {"iataCode": "HAN", "at": "2026-10-18T06:00:00"},
                         "arrival": {"iataCode": "DAD", "at": "2026-10-18T07:20:00"}},
                        {"carrierCode": "VN", "number": "7120",
                         "departure": {"iataCode": "DAD", "at": "2026-10-18T09:10:00"},
                         "arrival": {"iataCode": "SGN", "at": "2026-10-18T10:35:00"}}
                    ]
                }],
                "price": {"currency": "VND", "total": "2150000.00"}
            },
            {
                "id": "2",
                "itineraries": [{"duration": "PT2H5M", "segments": []}],
                "price": {"currency": "VND", "total": "990000"}
            }
        ]
    }"#;

    #[test]
    fn test_flatten_offers() {
        let body: OffersResponse = serde_json::from_str(SAMPLE).unwrap();
        let offers = flatten_offers(body.data, "VND");

        assert_eq!(offers.len(), 1, "offers without segments are skipped");
        let offer = &offers[0];
        assert_eq!(offer.flight_number, "VN7213");
        assert_eq!(offer.departure_airport, "HAN");
        assert_eq!(offer.arrival_airport, "SGN");
        assert_eq!(offer.arrival_time, "2026-10-18T10:35:00");
        assert_eq!(offer.stops, 1);
        assert_eq!(offer.price, 2_150_000.0);
        assert_eq!(offer.duration.as_deref(), Some("PT4H35M"));
    }

    #[test]
    fn test_query_params() {
        let client = AmadeusClient::new(AmadeusConfig::new("id", "secret")).unwrap();
        let params = client.query_params(&FlightQuery {
            origin: "HAN".to_string(),
            destination: "SGN".to_string(),
            departure_date: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
            return_date: NaiveDate::from_ymd_opt(2026, 10, 25),
            adults: 2,
        });

        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("departureDate"), Some("2026-10-18"));
        assert_eq!(get("returnDate"), Some("2026-10-25"));
        assert_eq!(get("adults"), Some("2"));
        assert_eq!(get("max"), Some("5"));
        assert_eq!(get("currencyCode"), Some("VND"));
        assert_eq!(get("nonStop"), Some("false"));
    }

    #[test]
    fn test_hostname_selection() {
        let config = AmadeusConfig::new("id", "secret").with_hostname("production");
        assert_eq!(config.base_url, PRODUCTION_BASE_URL);
        let config = config.with_hostname("http://localhost:8080/");
        assert_eq!(config.base_url, "http://localhost:8080");
    }
}
