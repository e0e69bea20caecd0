use async_trait::async_trait;
use chrono::{DateTime, Utc};
use skylane_core::repository::BookingStore;
use skylane_core::{EngineError, EngineResult};
use skylane_shared::{BookingEvent, BookingRecord, BookingStatus, NewBooking, NewBookingEvent};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::store_err;

pub struct SqliteBookingStore {
    pool: SqlitePool,
}

impl SqliteBookingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_booking(row: &SqliteRow) -> EngineResult<BookingRecord> {
        let status_raw: String = row.get("status");
        let status = BookingStatus::parse(&status_raw)
            .ok_or_else(|| EngineError::Store(format!("unknown booking status: {status_raw}")))?;
        let created_raw: String = row.get("created_at");
        let created_at = DateTime::parse_from_rfc3339(&created_raw)
            .map_err(|e| EngineError::Store(format!("bad created_at timestamp: {e}")))?
            .with_timezone(&Utc);
        Ok(BookingRecord {
            booking_id: row.get("booking_id"),
            pnr: row.get("pnr"),
            flight_id: row.get("flight_id"),
            passenger_name: row.get("passenger_name"),
            passenger_email: row.get("passenger_email"),
            passenger_phone: row.get("passenger_phone"),
            seats: row.get("seats"),
            status,
            price: row.get("price"),
            created_at,
        })
    }
}

const BOOKING_COLUMNS: &str = "booking_id, pnr, flight_id, passenger_name, passenger_email, \
                               passenger_phone, seats, status, price, created_at";

#[async_trait]
impl BookingStore for SqliteBookingStore {
    async fn insert_booking(&self, booking: &NewBooking) -> EngineResult<i64> {
        let passenger = booking.passenger.as_ref();
        let result = sqlx::query(
            "INSERT INTO bookings \
             (pnr, flight_id, passenger_name, passenger_email, passenger_phone, seats, status, price, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&booking.pnr)
        .bind(&booking.flight_id)
        .bind(passenger.map(|p| p.full_name.clone()))
        .bind(passenger.and_then(|p| p.email.clone()))
        .bind(passenger.and_then(|p| p.phone.clone()))
        .bind(booking.seats)
        .bind(booking.status.as_str())
        .bind(booking.price)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(result.last_insert_rowid())
    }

    async fn get_booking(&self, booking_id: i64) -> EngineResult<Option<BookingRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE booking_id = ?"
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        row.as_ref().map(Self::row_to_booking).transpose()
    }

    async fn find_by_pnr(&self, pnr: &str) -> EngineResult<Option<BookingRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE pnr = ?"
        ))
        .bind(pnr)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        row.as_ref().map(Self::row_to_booking).transpose()
    }

    async fn list_recent(&self, limit: i64) -> EngineResult<Vec<BookingRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY booking_id DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.iter().map(Self::row_to_booking).collect()
    }

    async fn pnr_exists(&self, pnr: &str) -> EngineResult<bool> {
        let row = sqlx::query("SELECT 1 FROM bookings WHERE pnr = ?")
            .bind(pnr)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(row.is_some())
    }

    async fn mark_cancelled(&self, booking_id: i64) -> EngineResult<()> {
        let result = sqlx::query("UPDATE bookings SET status = 'cancelled' WHERE booking_id = ?")
            .bind(booking_id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        if result.rows_affected() == 0 {
            return Err(EngineError::NotFound(format!(
                "booking {booking_id} not found"
            )));
        }
        Ok(())
    }

    async fn append_event(&self, event: &NewBookingEvent) -> EngineResult<i64> {
        let details = serde_json::to_string(&event.details)
            .map_err(|e| EngineError::Store(format!("unserializable event details: {e}")))?;
        let result = sqlx::query(
            "INSERT INTO booking_history (booking_id, pnr, event_type, timestamp, details) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(event.booking_id)
        .bind(&event.pnr)
        .bind(&event.event_type)
        .bind(event.timestamp.to_rfc3339())
        .bind(details)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(result.last_insert_rowid())
    }

    async fn events_for(&self, booking_id: i64) -> EngineResult<Vec<BookingEvent>> {
        let rows = sqlx::query(
            "SELECT id, booking_id, pnr, event_type, timestamp, details \
             FROM booking_history WHERE booking_id = ? ORDER BY id ASC",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        let mut events = Vec::with_capacity(rows.len());
        for row in &rows {
            let timestamp_raw: String = row.get("timestamp");
            let timestamp = DateTime::parse_from_rfc3339(&timestamp_raw)
                .map_err(|e| EngineError::Store(format!("bad event timestamp: {e}")))?
                .with_timezone(&Utc);
            let details_raw: String = row.get("details");
            let details = serde_json::from_str(&details_raw)
                .unwrap_or(serde_json::Value::String(details_raw));
            events.push(BookingEvent {
                id: row.get("id"),
                booking_id: row.get("booking_id"),
                pnr: row.get("pnr"),
                event_type: row.get("event_type"),
                timestamp,
                details,
            });
        }
        Ok(events)
    }
}
