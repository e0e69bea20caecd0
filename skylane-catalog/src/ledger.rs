use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use skylane_core::repository::FlightStore;
use skylane_core::{EngineError, EngineResult};
use skylane_shared::FlightRecord;
use tracing::debug;

/// Seat inventory facade. The durable store is the single source of truth;
/// the in-process copy is a read-through cache invalidated on every
/// successful write, never an independent write target.
pub struct InventoryLedger {
    store: Arc<dyn FlightStore>,
    cache: Mutex<HashMap<String, FlightRecord>>,
}

impl InventoryLedger {
    pub fn new(store: Arc<dyn FlightStore>) -> Self {
        Self {
            store,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<String, FlightRecord>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a flight with the durable store.
    pub async fn register(&self, flight: &FlightRecord) -> EngineResult<()> {
        if flight.base_price <= 0.0 {
            return Err(EngineError::InvalidArgument(
                "base_price must be > 0".to_string(),
            ));
        }
        if flight.total_seats <= 0 || flight.seats_available < 0
            || flight.seats_available > flight.total_seats
        {
            return Err(EngineError::InvalidArgument(
                "seats_available must be within 0..=total_seats".to_string(),
            ));
        }
        self.store.insert_flight(flight).await?;
        self.cache().remove(&flight.flight_id);
        Ok(())
    }

    /// Cached lookup; misses read through to the store.
    pub async fn flight(&self, flight_id: &str) -> EngineResult<FlightRecord> {
        if let Some(cached) = self.cache().get(flight_id) {
            return Ok(cached.clone());
        }
        let flight = self
            .store
            .get_flight(flight_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("flight {flight_id} not found")))?;
        self.cache()
            .insert(flight.flight_id.clone(), flight.clone());
        Ok(flight)
    }

    pub async fn list(&self) -> EngineResult<Vec<FlightRecord>> {
        self.store.list_flights().await
    }

    /// Atomically reserves `seats`, returning the post-reservation count.
    /// The store runs the check-then-decrement under an exclusive write
    /// transaction, so concurrent reservations can never jointly oversell.
    pub async fn reserve(&self, flight_id: &str, seats: i64) -> EngineResult<i64> {
        if seats < 1 {
            return Err(EngineError::InvalidArgument(
                "seats must be >= 1".to_string(),
            ));
        }
        let remaining = self.store.reserve_seats(flight_id, seats).await?;
        self.cache().remove(flight_id);
        debug!(flight_id, seats, remaining, "seats reserved");
        Ok(remaining)
    }

    /// Atomically releases `seats` back to the flight. No upper bound is
    /// enforced: releasing more than was ever reserved is accepted, an open
    /// trust assumption of the compensation paths.
    pub async fn release(&self, flight_id: &str, seats: i64) -> EngineResult<i64> {
        if seats < 1 {
            return Err(EngineError::InvalidArgument(
                "seats must be >= 1".to_string(),
            ));
        }
        let remaining = self.store.release_seats(flight_id, seats).await?;
        self.cache().remove(flight_id);
        debug!(flight_id, seats, remaining, "seats released");
        Ok(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skylane_store::Store;

    async fn ledger_with(seats: i64) -> InventoryLedger {
        let store = Store::in_memory().await.unwrap();
        store.init_schema().await.unwrap();
        let ledger = InventoryLedger::new(Arc::new(store.flights()));
        ledger
            .register(&FlightRecord::new(
                "SL-101", "NewYork", "London", "7hours", 9000.0, seats,
            ))
            .await
            .unwrap();
        ledger
    }

    #[tokio::test]
    async fn test_reserve_release_round_trip() {
        let ledger = ledger_with(50).await;
        assert_eq!(ledger.reserve("SL-101", 5).await.unwrap(), 45);
        assert_eq!(ledger.release("SL-101", 5).await.unwrap(), 50);
        assert_eq!(ledger.flight("SL-101").await.unwrap().seats_available, 50);
    }

    #[tokio::test]
    async fn test_reserve_unknown_flight() {
        let ledger = ledger_with(50).await;
        assert!(matches!(
            ledger.reserve("SL-999", 1).await,
            Err(EngineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reserve_rejects_non_positive_seats() {
        let ledger = ledger_with(50).await;
        assert!(matches!(
            ledger.reserve("SL-101", 0).await,
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            ledger.release("SL-101", -2).await,
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_insufficient_inventory_leaves_count_untouched() {
        let ledger = ledger_with(50).await;
        assert_eq!(ledger.reserve("SL-101", 48).await.unwrap(), 2);

        let err = ledger.reserve("SL-101", 5).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientInventory { requested: 5, available: 2 }
        ));
        assert_eq!(ledger.flight("SL-101").await.unwrap().seats_available, 2);
    }

    #[tokio::test]
    async fn test_release_has_no_upper_bound() {
        let ledger = ledger_with(50).await;
        assert_eq!(ledger.release("SL-101", 10).await.unwrap(), 60);
    }

    #[tokio::test]
    async fn test_cache_invalidated_on_write() {
        let ledger = ledger_with(50).await;
        // Prime the cache, then write through it.
        assert_eq!(ledger.flight("SL-101").await.unwrap().seats_available, 50);
        ledger.reserve("SL-101", 3).await.unwrap();
        assert_eq!(ledger.flight("SL-101").await.unwrap().seats_available, 47);
    }

    #[tokio::test]
    async fn test_concurrent_reservations_never_oversell() {
        let ledger = Arc::new(ledger_with(10).await);

        let mut handles = Vec::new();
        for _ in 0..10 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(
                async move { ledger.reserve("SL-101", 2).await },
            ));
        }

        let mut successes = 0i64;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }

        assert!(successes * 2 <= 10, "oversold: {successes} reservations of 2");
        let remaining = ledger.flight("SL-101").await.unwrap().seats_available;
        assert_eq!(remaining, 10 - successes * 2);
    }

    #[tokio::test]
    async fn test_register_validates_capacity() {
        let ledger = ledger_with(50).await;
        let bad = FlightRecord::new("SL-102", "Paris", "Rome", "2hours", 300.0, 120);
        assert!(matches!(
            ledger.register(&bad).await,
            Err(EngineError::InvalidArgument(_))
        ));
    }
}
