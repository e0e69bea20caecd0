use serde::Serialize;
use skylane_shared::Passenger;

/// Lifecycle state of an in-flight reservation. Only `Confirmed` ever
/// reaches the durable store; everything else lives and dies in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Reserved,
    PendingPassenger,
    Confirmed,
    Failed,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Reserved => "RESERVED",
            ReservationStatus::PendingPassenger => "PENDING_PASSENGER",
            ReservationStatus::Confirmed => "CONFIRMED",
            ReservationStatus::Failed => "FAILED",
        }
    }
}

/// A reservation held in memory between seat hold and payment. Seats are
/// already deducted from inventory while one of these exists in the
/// `Reserved` or `PendingPassenger` state.
#[derive(Debug, Clone, Serialize)]
pub struct TransientBooking {
    /// Opaque handle; replaced by the PNR once the booking confirms.
    pub code: String,
    pub flight_id: String,
    pub seats: i64,
    pub per_seat_price: f64,
    pub total_price: f64,
    pub status: ReservationStatus,
    pub passenger: Option<Passenger>,
    pub booking_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PaymentOutcome {
    Confirmed { pnr: String, booking_id: i64 },
    /// Paying a booking that already confirmed repeats the original answer.
    AlreadyConfirmed { pnr: String, booking_id: i64 },
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CancellationOutcome {
    Cancelled { seats_released: i64, refund_amount: f64 },
    AlreadyCancelled,
}
