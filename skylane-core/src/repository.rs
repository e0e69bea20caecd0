use async_trait::async_trait;
use skylane_shared::{BookingEvent, BookingRecord, FlightRecord, NewBooking, NewBookingEvent};

use crate::EngineResult;

/// Durable flight inventory access. Implementations must run
/// `reserve_seats`/`release_seats` inside an exclusive write transaction
/// spanning the read of the current count and the write of the new one, and
/// must leave no partial state on failure.
#[async_trait]
pub trait FlightStore: Send + Sync {
    async fn get_flight(&self, flight_id: &str) -> EngineResult<Option<FlightRecord>>;

    async fn list_flights(&self) -> EngineResult<Vec<FlightRecord>>;

    async fn insert_flight(&self, flight: &FlightRecord) -> EngineResult<()>;

    /// Atomically decrement `seats_available` by `seats`. Returns the
    /// post-reservation count.
    async fn reserve_seats(&self, flight_id: &str, seats: i64) -> EngineResult<i64>;

    /// Atomically increment `seats_available` by `seats`. Returns the new
    /// count. No upper bound is enforced.
    async fn release_seats(&self, flight_id: &str, seats: i64) -> EngineResult<i64>;
}

/// Durable booking and booking-history access.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Persists a booking, returning the surrogate `booking_id`.
    async fn insert_booking(&self, booking: &NewBooking) -> EngineResult<i64>;

    async fn get_booking(&self, booking_id: i64) -> EngineResult<Option<BookingRecord>>;

    async fn find_by_pnr(&self, pnr: &str) -> EngineResult<Option<BookingRecord>>;

    async fn list_recent(&self, limit: i64) -> EngineResult<Vec<BookingRecord>>;

    async fn pnr_exists(&self, pnr: &str) -> EngineResult<bool>;

    async fn mark_cancelled(&self, booking_id: i64) -> EngineResult<()>;

    /// Appends a lifecycle event. Events are never mutated or deleted.
    async fn append_event(&self, event: &NewBookingEvent) -> EngineResult<i64>;

    async fn events_for(&self, booking_id: i64) -> EngineResult<Vec<BookingEvent>>;
}
