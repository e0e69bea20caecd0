use std::str::FromStr;
use std::time::Duration;

use skylane_core::EngineResult;
use skylane_shared::FlightRecord;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::{store_err, SqliteBookingStore, SqliteFlightStore};

#[derive(Clone)]
pub struct Store {
    pub pool: SqlitePool,
}

impl Store {
    pub async fn connect(url: &str) -> EngineResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(store_err)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect_with(options)
            .await
            .map_err(store_err)?;
        Ok(Self { pool })
    }

    /// Single-connection in-memory database, used by tests. One connection
    /// keeps the database alive for the pool's lifetime.
    pub async fn in_memory() -> EngineResult<Self> {
        let options = SqliteConnectOptions::new().in_memory(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(store_err)?;
        Ok(Self { pool })
    }

    pub fn flights(&self) -> SqliteFlightStore {
        SqliteFlightStore::new(self.pool.clone())
    }

    pub fn bookings(&self) -> SqliteBookingStore {
        SqliteBookingStore::new(self.pool.clone())
    }

    pub async fn init_schema(&self) -> EngineResult<()> {
        info!("initializing schema");
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS flights (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                flight_id TEXT UNIQUE NOT NULL,
                origin TEXT NOT NULL,
                destination TEXT NOT NULL,
                duration TEXT NOT NULL,
                base_price REAL NOT NULL,
                seats_available INTEGER NOT NULL,
                total_seats INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bookings (
                booking_id INTEGER PRIMARY KEY AUTOINCREMENT,
                pnr TEXT UNIQUE NOT NULL,
                flight_id TEXT NOT NULL,
                passenger_name TEXT,
                passenger_email TEXT,
                passenger_phone TEXT,
                seats INTEGER NOT NULL,
                status TEXT NOT NULL,
                price REAL NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS booking_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                booking_id INTEGER NOT NULL,
                pnr TEXT,
                event_type TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                details TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(())
    }

    /// Seeds the flights table, but only when it is empty, so restarts never
    /// clobber live seat counts.
    pub async fn seed_flights(&self, seeds: &[FlightRecord]) -> EngineResult<()> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(1) FROM flights")
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;
        if count > 0 {
            return Ok(());
        }
        let flights = self.flights();
        for seed in seeds {
            use skylane_core::repository::FlightStore;
            flights.insert_flight(seed).await?;
        }
        info!(seeded = seeds.len(), "flights table seeded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skylane_core::repository::FlightStore;

    fn seeds() -> Vec<FlightRecord> {
        vec![
            FlightRecord::new("SL-201", "NewYork", "London", "7hours", 9000.0, 50),
            FlightRecord::new("SL-202", "NewYork", "London", "6.5hours", 8500.0, 45),
        ]
    }

    #[tokio::test]
    async fn test_seed_only_when_empty() {
        let store = Store::in_memory().await.unwrap();
        store.init_schema().await.unwrap();

        store.seed_flights(&seeds()).await.unwrap();
        assert_eq!(store.flights().list_flights().await.unwrap().len(), 2);

        // A mutation must survive re-seeding.
        store.flights().reserve_seats("SL-201", 10).await.unwrap();
        store.seed_flights(&seeds()).await.unwrap();

        let flights = store.flights().list_flights().await.unwrap();
        assert_eq!(flights.len(), 2);
        let sl201 = flights.iter().find(|f| f.flight_id == "SL-201").unwrap();
        assert_eq!(sl201.seats_available, 40);
    }

    #[tokio::test]
    async fn test_init_schema_idempotent() {
        let store = Store::in_memory().await.unwrap();
        store.init_schema().await.unwrap();
        store.init_schema().await.unwrap();
    }
}
