use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde_json::json;
use skylane_catalog::{pricing, InventoryLedger, PriceRequest};
use skylane_core::random::{RandomSource, ThreadRandom};
use skylane_core::repository::BookingStore;
use skylane_core::{EngineError, EngineResult};
use skylane_market::DemandOracle;
use skylane_shared::{
    BookingEvent, BookingRecord, BookingStatus, NewBooking, NewBookingEvent, Passenger,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{CancellationOutcome, PaymentOutcome, ReservationStatus, TransientBooking};
use crate::pnr::PnrAllocator;

/// Drives a reservation from seat hold to durable booking. Seats are held
/// against the ledger the moment `start` succeeds; every later failure path
/// hands them back.
pub struct BookingLifecycle {
    ledger: Arc<InventoryLedger>,
    oracle: Arc<DemandOracle>,
    store: Arc<dyn BookingStore>,
    pnr: PnrAllocator,
    transient: Mutex<HashMap<String, TransientBooking>>,
    rng: tokio::sync::Mutex<Box<dyn RandomSource>>,
}

impl BookingLifecycle {
    pub fn new(
        ledger: Arc<InventoryLedger>,
        oracle: Arc<DemandOracle>,
        store: Arc<dyn BookingStore>,
    ) -> Self {
        Self::with_random(ledger, oracle, store, Box::new(ThreadRandom))
    }

    pub fn with_random(
        ledger: Arc<InventoryLedger>,
        oracle: Arc<DemandOracle>,
        store: Arc<dyn BookingStore>,
        rng: Box<dyn RandomSource>,
    ) -> Self {
        Self {
            ledger,
            oracle,
            store,
            pnr: PnrAllocator::default(),
            transient: Mutex::new(HashMap::new()),
            rng: tokio::sync::Mutex::new(rng),
        }
    }

    pub fn with_pnr_allocator(mut self, pnr: PnrAllocator) -> Self {
        self.pnr = pnr;
        self
    }

    fn transient(&self) -> MutexGuard<'_, HashMap<String, TransientBooking>> {
        self.transient
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Holds seats and prices them at the post-hold inventory level. The
    /// returned booking is memory-only until payment confirms it.
    pub async fn start(
        &self,
        flight_id: &str,
        seats: i64,
        travel_date: Option<&str>,
    ) -> EngineResult<TransientBooking> {
        if seats < 1 {
            return Err(EngineError::InvalidArgument(
                "seats must be >= 1".to_string(),
            ));
        }

        let remaining = self.ledger.reserve(flight_id, seats).await?;

        let quoted = match self.quote_held(flight_id, remaining, travel_date).await {
            Ok(quote) => quote,
            Err(err) => {
                // Hand the hold back before surfacing the failure.
                if let Err(release_err) = self.ledger.release(flight_id, seats).await {
                    warn!(%flight_id, %release_err, "failed to release seats after aborted start");
                }
                return Err(err);
            }
        };

        let code = format!("RSV{}", Uuid::new_v4().simple());
        let booking = TransientBooking {
            code: code.clone(),
            flight_id: flight_id.to_string(),
            seats,
            per_seat_price: quoted,
            total_price: round2(quoted * seats as f64),
            status: ReservationStatus::Reserved,
            passenger: None,
            booking_id: None,
        };
        self.transient().insert(code.clone(), booking.clone());
        info!(%flight_id, %code, seats, "reservation started");
        Ok(booking)
    }

    async fn quote_held(
        &self,
        flight_id: &str,
        seats_available: i64,
        travel_date: Option<&str>,
    ) -> EngineResult<f64> {
        let flight = self.ledger.flight(flight_id).await?;
        let quote = pricing::quote(&PriceRequest {
            base_price: flight.base_price,
            seats_available,
            total_seats: Some(flight.total_seats),
            travel_date,
            demand_level: self.oracle.level(flight_id),
            tiers: None,
        })?;
        Ok(quote.final_price)
    }

    /// Attaches (or replaces) passenger details on a held reservation.
    pub fn attach_passenger(
        &self,
        code: &str,
        passenger: Passenger,
    ) -> EngineResult<TransientBooking> {
        let mut map = self.transient();
        let booking = map
            .get_mut(code)
            .ok_or_else(|| EngineError::NotFound(format!("reservation {code}")))?;
        match booking.status {
            ReservationStatus::Confirmed => {
                return Err(EngineError::InvalidArgument(
                    "booking already confirmed".to_string(),
                ));
            }
            // Seats were already handed back; a new start is the retry path.
            ReservationStatus::Failed => {
                return Err(EngineError::InvalidArgument(
                    "payment already failed for this reservation".to_string(),
                ));
            }
            ReservationStatus::Reserved | ReservationStatus::PendingPassenger => {}
        }
        booking.passenger = Some(passenger);
        booking.status = ReservationStatus::PendingPassenger;
        Ok(booking.clone())
    }

    /// Settles payment. On success the reservation becomes a durable booking
    /// keyed by a fresh PNR; on simulated payment failure the held seats go
    /// back to inventory. `fail_probability` is the caller-supplied chance of
    /// the simulated payment declining.
    pub async fn pay(&self, code: &str, fail_probability: f64) -> EngineResult<PaymentOutcome> {
        let held = {
            let map = self.transient();
            map.get(code)
                .cloned()
                .ok_or_else(|| EngineError::NotFound(format!("reservation {code}")))?
        };

        match held.status {
            ReservationStatus::Confirmed => {
                if let Some(booking_id) = held.booking_id {
                    return Ok(PaymentOutcome::AlreadyConfirmed {
                        pnr: held.code,
                        booking_id,
                    });
                }
                return Err(EngineError::Store(
                    "confirmed reservation missing booking id".to_string(),
                ));
            }
            ReservationStatus::Failed => {
                return Err(EngineError::InvalidArgument(
                    "payment already failed for this reservation".to_string(),
                ));
            }
            ReservationStatus::Reserved => {
                return Err(EngineError::InvalidArgument(
                    "passenger details must be attached before payment".to_string(),
                ));
            }
            ReservationStatus::PendingPassenger => {}
        }

        let mut rng = self.rng.lock().await;
        if rng.uniform() < fail_probability {
            drop(rng);
            if let Err(err) = self.ledger.release(&held.flight_id, held.seats).await {
                warn!(flight_id = %held.flight_id, %err, "failed to release seats after declined payment");
            }
            if let Some(booking) = self.transient().get_mut(code) {
                booking.status = ReservationStatus::Failed;
            }
            info!(%code, "payment declined");
            return Ok(PaymentOutcome::Failed);
        }

        let pnr = self
            .pnr
            .allocate(self.store.as_ref(), &mut **rng)
            .await?;
        drop(rng);

        let booking_id = self
            .store
            .insert_booking(&NewBooking {
                pnr: pnr.clone(),
                flight_id: held.flight_id.clone(),
                passenger: held.passenger.clone(),
                seats: held.seats,
                status: BookingStatus::Confirmed,
                price: held.total_price,
            })
            .await?;

        // History is best effort; the booking row is already durable.
        let event = NewBookingEvent {
            booking_id,
            pnr: Some(pnr.clone()),
            event_type: "confirmed".to_string(),
            timestamp: Utc::now(),
            details: json!({
                "flight_id": held.flight_id,
                "seats": held.seats,
                "total_price": held.total_price,
            }),
        };
        if let Err(err) = self.store.append_event(&event).await {
            warn!(%pnr, %err, "failed to record confirmation event");
        }

        {
            let mut map = self.transient();
            if let Some(mut booking) = map.remove(code) {
                booking.code = pnr.clone();
                booking.status = ReservationStatus::Confirmed;
                booking.booking_id = Some(booking_id);
                map.insert(pnr.clone(), booking);
            }
        }

        info!(%pnr, booking_id, "booking confirmed");
        Ok(PaymentOutcome::Confirmed { pnr, booking_id })
    }

    /// Cancels a durable booking. The row survives with status `cancelled`;
    /// the seats return to inventory.
    pub async fn cancel_persisted(&self, booking_id: i64) -> EngineResult<CancellationOutcome> {
        let booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("booking {booking_id}")))?;

        if booking.status == BookingStatus::Cancelled {
            return Ok(CancellationOutcome::AlreadyCancelled);
        }

        self.store.mark_cancelled(booking_id).await?;

        let seats_released = match self.ledger.release(&booking.flight_id, booking.seats).await {
            Ok(_) => booking.seats,
            Err(err) => {
                warn!(booking_id, flight_id = %booking.flight_id, %err, "failed to return cancelled seats");
                0
            }
        };

        let event = NewBookingEvent {
            booking_id,
            pnr: Some(booking.pnr.clone()),
            event_type: "cancelled".to_string(),
            timestamp: Utc::now(),
            details: json!({
                "seats_released": seats_released,
                "refund_amount": booking.price,
            }),
        };
        if let Err(err) = self.store.append_event(&event).await {
            warn!(booking_id, %err, "failed to record cancellation event");
        }

        self.transient().remove(&booking.pnr);
        info!(booking_id, pnr = %booking.pnr, seats_released, "booking cancelled");
        Ok(CancellationOutcome::Cancelled {
            seats_released,
            refund_amount: booking.price,
        })
    }

    /// PNR-keyed cancellation for callers that never saw the surrogate key.
    pub async fn cancel_by_pnr(&self, pnr: &str) -> EngineResult<CancellationOutcome> {
        let booking = self
            .store
            .find_by_pnr(pnr)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("booking {pnr}")))?;
        self.cancel_persisted(booking.booking_id).await
    }

    /// Abandons an unconfirmed reservation and returns its held seats.
    pub async fn cancel_transient(&self, code: &str) -> EngineResult<CancellationOutcome> {
        let held = {
            let mut map = self.transient();
            let status = map
                .get(code)
                .map(|b| b.status)
                .ok_or_else(|| EngineError::NotFound(format!("reservation {code}")))?;
            if status == ReservationStatus::Confirmed {
                return Err(EngineError::InvalidArgument(
                    "confirmed bookings are cancelled by pnr".to_string(),
                ));
            }
            map.remove(code).ok_or_else(|| {
                EngineError::NotFound(format!("reservation {code}"))
            })?
        };

        // Failed reservations already gave their seats back.
        let seats_released = if held.status == ReservationStatus::Failed {
            0
        } else {
            match self.ledger.release(&held.flight_id, held.seats).await {
                Ok(_) => held.seats,
                Err(err) => {
                    warn!(%code, flight_id = %held.flight_id, %err, "failed to return abandoned seats");
                    0
                }
            }
        };

        Ok(CancellationOutcome::Cancelled {
            seats_released,
            refund_amount: 0.0,
        })
    }

    pub fn status(&self, code: &str) -> EngineResult<TransientBooking> {
        self.transient()
            .get(code)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("reservation {code}")))
    }

    pub async fn booking(&self, booking_id: i64) -> EngineResult<Option<BookingRecord>> {
        self.store.get_booking(booking_id).await
    }

    pub async fn find_by_pnr(&self, pnr: &str) -> EngineResult<Option<BookingRecord>> {
        self.store.find_by_pnr(pnr).await
    }

    pub async fn list_recent(&self, limit: i64) -> EngineResult<Vec<BookingRecord>> {
        self.store.list_recent(limit).await
    }

    pub async fn events(&self, booking_id: i64) -> EngineResult<Vec<BookingEvent>> {
        self.store.events_for(booking_id).await
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
