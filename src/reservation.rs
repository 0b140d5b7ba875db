//! Reservation lifecycle: hold, ticket, cancel

use crate::error::{BookingError, BookingResult};
use crate::state::{BookingInfo, BookingStatus, FlightOffer, PassengerInfo};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

#[async_trait]
pub trait BookingService: Send + Sync {
    /// Hold seats; the booking waits for payment
    async fn create_booking(
        &self,
        flight: FlightOffer,
        passengers: Vec<PassengerInfo>,
    ) -> BookingResult<BookingInfo>;

    /// Issue tickets for a paid booking
    async fn issue_ticket(&self, booking_id: &str) -> BookingResult<BookingInfo>;

    async fn cancel(&self, booking_id: &str) -> BookingResult<BookingInfo>;

    async fn get(&self, booking_id: &str) -> BookingResult<BookingInfo>;
}

pub const DEFAULT_PAYMENT_BASE: &str = "https://pay.flyagent.vn/checkout";

/// In-memory booking service with generated PNRs and payment links
#[derive(Clone)]
pub struct StubBookingService {
    bookings: Arc<RwLock<HashMap<String, BookingInfo>>>,
    payment_base: String,
}

impl StubBookingService {
    pub fn new() -> Self {
        Self::with_payment_base(DEFAULT_PAYMENT_BASE)
    }

    pub fn with_payment_base(base: impl Into<String>) -> Self {
        Self {
            bookings: Arc::new(RwLock::new(HashMap::new())),
            payment_base: base.into(),
        }
    }

    pub async fn len(&self) -> usize {
        self.bookings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.bookings.read().await.is_empty()
    }

    fn new_reference() -> String {
        Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(6)
            .collect::<String>()
            .to_uppercase()
    }

    async fn transition(
        &self,
        booking_id: &str,
        from: BookingStatus,
        to: BookingStatus,
        action: &'static str,
    ) -> BookingResult<BookingInfo> {
        let key = booking_id.trim().to_uppercase();
        let mut bookings = self.bookings.write().await;
        let booking = bookings
            .get_mut(&key)
            .ok_or_else(|| BookingError::NotFound(key.clone()))?;

        if booking.status != from {
            return Err(BookingError::InvalidState {
                booking_id: key,
                action,
                status: booking.status.to_string(),
            });
        }

        booking.status = to;
        if to != BookingStatus::PendingPayment {
            booking.payment_link = None;
        }
        info!(booking_id = %key, status = %to, "Booking updated");
        Ok(booking.clone())
    }
}

impl Default for StubBookingService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookingService for StubBookingService {
    async fn create_booking(
        &self,
        flight: FlightOffer,
        passengers: Vec<PassengerInfo>,
    ) -> BookingResult<BookingInfo> {
        if passengers.is_empty() {
            return Err(BookingError::InvalidRequest(
                "a booking needs at least one passenger".to_string(),
            ));
        }

        let mut bookings = self.bookings.write().await;
        let mut booking_id = Self::new_reference();
        while bookings.contains_key(&booking_id) {
            booking_id = Self::new_reference();
        }

        let booking = BookingInfo {
            payment_link: Some(format!("{}/{booking_id}", self.payment_base)),
            booking_id: booking_id.clone(),
            status: BookingStatus::PendingPayment,
            flight: Some(flight),
            passengers,
        };
        info!(
            booking_id = %booking_id,
            passengers = booking.passengers.len(),
            "Booking created"
        );
        bookings.insert(booking_id, booking.clone());
        Ok(booking)
    }

    async fn issue_ticket(&self, booking_id: &str) -> BookingResult<BookingInfo> {
        self.transition(
            booking_id,
            BookingStatus::PendingPayment,
            BookingStatus::Confirmed,
            "ticketed",
        )
        .await
    }

    async fn cancel(&self, booking_id: &str) -> BookingResult<BookingInfo> {
        let key = booking_id.trim().to_uppercase();
        let status = self.get(&key).await?.status;
        if status == BookingStatus::Cancelled {
            return Err(BookingError::InvalidState {
                booking_id: key,
                action: "cancelled",
                status: status.to_string(),
            });
        }
        self.transition(&key, status, BookingStatus::Cancelled, "cancelled")
            .await
    }

    async fn get(&self, booking_id: &str) -> BookingResult<BookingInfo> {
        let key = booking_id.trim().to_uppercase();
        self.bookings
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or(BookingError::NotFound(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PassengerType;
    use chrono::NaiveDate;

    fn flight() -> FlightOffer {
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
            full_name: "Nguyễn Văn An".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            phone: "0901234567".to_string(),
            passenger_type: PassengerType::Adult,
        }
    }

    #[tokio::test]
    async fn test_booking_lifecycle() {
        let service = StubBookingService::new();
        let booking = service
            .create_booking(flight(), vec![passenger()])
            .await
            .unwrap();

        assert_eq!(booking.booking_id.len(), 6);
        assert_eq!(booking.status, BookingStatus::PendingPayment);
        assert!(booking
            .payment_link
            .as_deref()
            .unwrap()
            .ends_with(&booking.booking_id));

        let lower = booking.booking_id.to_lowercase();
        let ticketed = service.issue_ticket(&lower).await.unwrap();
        assert_eq!(ticketed.status, BookingStatus::Confirmed);
        assert!(ticketed.payment_link.is_none());

        let cancelled = service.cancel(&booking.booking_id).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_ticket_requires_pending_payment() {
        let service = StubBookingService::new();
        let booking = service
            .create_booking(flight(), vec![passenger()])
            .await
            .unwrap();
        service.cancel(&booking.booking_id).await.unwrap();

        let err = service.issue_ticket(&booking.booking_id).await.unwrap_err();
        assert!(matches!(err, BookingError::InvalidState { action: "ticketed", .. }));

        let err = service.cancel(&booking.booking_id).await.unwrap_err();
        assert!(matches!(err, BookingError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_unknown_and_invalid_bookings() {
        let service = StubBookingService::new();
        assert!(matches!(
            service.cancel("ZZZ999").await,
            Err(BookingError::NotFound(_))
        ));
        assert!(matches!(
            service.create_booking(flight(), Vec::new()).await,
            Err(BookingError::InvalidRequest(_))
        ));
        assert!(service.is_empty().await);
    }
}
