use async_trait::async_trait;
use skylane_core::repository::FlightStore;
use skylane_core::{EngineError, EngineResult};
use skylane_shared::FlightRecord;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::warn;

use crate::store_err;

pub struct SqliteFlightStore {
    pool: SqlitePool,
}

impl SqliteFlightStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_flight(row: &SqliteRow) -> FlightRecord {
        FlightRecord {
            flight_id: row.get("flight_id"),
            origin: row.get("origin"),
            destination: row.get("destination"),
            duration: row.get("duration"),
            base_price: row.get("base_price"),
            seats_available: row.get("seats_available"),
            total_seats: row.get("total_seats"),
        }
    }

    /// Check-then-adjust inside an already-open exclusive transaction.
    /// `delta` is negative for reservations, positive for releases.
    async fn adjust_seats(
        conn: &mut SqliteConnection,
        flight_id: &str,
        delta: i64,
        bounded: bool,
    ) -> EngineResult<i64> {
        let row = sqlx::query("SELECT seats_available FROM flights WHERE flight_id = ?")
            .bind(flight_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(store_err)?;
        let available: i64 = match row {
            Some(row) => row.get("seats_available"),
            None => {
                return Err(EngineError::NotFound(format!(
                    "flight {flight_id} not found"
                )))
            }
        };
        if bounded && available + delta < 0 {
            return Err(EngineError::InsufficientInventory {
                requested: -delta,
                available,
            });
        }
        sqlx::query("UPDATE flights SET seats_available = seats_available + ? WHERE flight_id = ?")
            .bind(delta)
            .bind(flight_id)
            .execute(&mut *conn)
            .await
            .map_err(store_err)?;
        Ok(available + delta)
    }

    /// Runs `adjust_seats` under `BEGIN IMMEDIATE` so the read and the write
    /// are serialized against concurrent writers. Any failure rolls back.
    async fn adjust_in_txn(&self, flight_id: &str, delta: i64, bounded: bool) -> EngineResult<i64> {
        let mut conn = self.pool.acquire().await.map_err(store_err)?;
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(store_err)?;

        let result = Self::adjust_seats(&mut conn, flight_id, delta, bounded).await;
        match &result {
            Ok(_) => {
                sqlx::query("COMMIT")
                    .execute(&mut *conn)
                    .await
                    .map_err(store_err)?;
            }
            Err(err) => {
                if let Err(rollback_err) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                    warn!(flight_id, %rollback_err, "rollback failed after {err}");
                }
            }
        }
        result
    }
}

#[async_trait]
impl FlightStore for SqliteFlightStore {
    async fn get_flight(&self, flight_id: &str) -> EngineResult<Option<FlightRecord>> {
        let row = sqlx::query(
            "SELECT flight_id, origin, destination, duration, base_price, seats_available, total_seats \
             FROM flights WHERE flight_id = ?",
        )
        .bind(flight_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(row.as_ref().map(Self::row_to_flight))
    }

    async fn list_flights(&self) -> EngineResult<Vec<FlightRecord>> {
        let rows = sqlx::query(
            "SELECT flight_id, origin, destination, duration, base_price, seats_available, total_seats \
             FROM flights ORDER BY flight_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(rows.iter().map(Self::row_to_flight).collect())
    }

    async fn insert_flight(&self, flight: &FlightRecord) -> EngineResult<()> {
        sqlx::query(
            "INSERT INTO flights (flight_id, origin, destination, duration, base_price, seats_available, total_seats) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&flight.flight_id)
        .bind(&flight.origin)
        .bind(&flight.destination)
        .bind(&flight.duration)
        .bind(flight.base_price)
        .bind(flight.seats_available)
        .bind(flight.total_seats)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn reserve_seats(&self, flight_id: &str, seats: i64) -> EngineResult<i64> {
        self.adjust_in_txn(flight_id, -seats, true).await
    }

    async fn release_seats(&self, flight_id: &str, seats: i64) -> EngineResult<i64> {
        self.adjust_in_txn(flight_id, seats, false).await
    }
}
