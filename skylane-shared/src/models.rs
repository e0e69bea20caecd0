use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Seat capacity assumed when a flight does not declare its own.
pub const DEFAULT_TOTAL_SEATS: i64 = 100;

/// A flight as carried by the durable inventory store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightRecord {
    pub flight_id: String,
    pub origin: String,
    pub destination: String,
    pub duration: String,
    pub base_price: f64,
    pub seats_available: i64,
    pub total_seats: i64,
}

impl FlightRecord {
    pub fn new(
        flight_id: impl Into<String>,
        origin: impl Into<String>,
        destination: impl Into<String>,
        duration: impl Into<String>,
        base_price: f64,
        seats_available: i64,
    ) -> Self {
        Self {
            flight_id: flight_id.into(),
            origin: origin.into(),
            destination: destination.into(),
            duration: duration.into(),
            base_price,
            seats_available,
            total_seats: DEFAULT_TOTAL_SEATS,
        }
    }

    pub fn with_total_seats(mut self, total_seats: i64) -> Self {
        self.total_seats = total_seats;
        self
    }
}

/// Every intermediate value of a price computation, kept for observability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceBreakdown {
    pub base_price: f64,
    pub seats_available: i64,
    pub total_seats: i64,
    pub seats_remaining_pct: f64,
    pub tier_multiplier: f64,
    pub time_multiplier: f64,
    pub demand_multiplier: f64,
    pub combined_multiplier: f64,
    pub raw_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

/// One priced snapshot of a flight at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub base_price: f64,
    pub demand_level: f64,
    pub seats_available: i64,
    pub breakdown: Option<PriceBreakdown>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Passenger {
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Status of a durably persisted booking. Cancellation is a transition,
/// never a row deletion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "confirmed" => Some(BookingStatus::Confirmed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }
}

/// A booking as persisted by the durable store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRecord {
    pub booking_id: i64,
    pub pnr: String,
    pub flight_id: String,
    pub passenger_name: Option<String>,
    pub passenger_email: Option<String>,
    pub passenger_phone: Option<String>,
    pub seats: i64,
    pub status: BookingStatus,
    pub price: f64,
    pub created_at: DateTime<Utc>,
}

/// Payload for persisting a booking; the surrogate key and creation time
/// are assigned by the store.
#[derive(Debug, Clone, Serialize)]
pub struct NewBooking {
    pub pnr: String,
    pub flight_id: String,
    pub passenger: Option<Passenger>,
    pub seats: i64,
    pub status: BookingStatus,
    pub price: f64,
}

/// An append-only lifecycle event attached to a persisted booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingEvent {
    pub id: i64,
    pub booking_id: i64,
    pub pnr: Option<String>,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewBookingEvent {
    pub booking_id: i64,
    pub pnr: Option<String>,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub details: serde_json::Value,
}
