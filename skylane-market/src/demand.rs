use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;
use skylane_catalog::InventoryLedger;
use skylane_core::random::{RandomSource, ThreadRandom};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Demand reading for flights the simulator has not touched yet.
pub const DEFAULT_DEMAND: f64 = 0.5;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Per-flight demand level in [0, 1]. Owned state with an explicit
/// lifecycle; nothing survives a restart.
#[derive(Default)]
pub struct DemandOracle {
    levels: Mutex<HashMap<String, f64>>,
    last_update: Mutex<Option<DateTime<Utc>>>,
}

impl DemandOracle {
    pub fn new() -> Self {
        Self::default()
    }

    fn levels(&self) -> MutexGuard<'_, HashMap<String, f64>> {
        self.levels.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn level(&self, flight_id: &str) -> f64 {
        self.levels().get(flight_id).copied().unwrap_or(DEFAULT_DEMAND)
    }

    pub fn known_level(&self, flight_id: &str) -> Option<f64> {
        self.levels().get(flight_id).copied()
    }

    pub fn set_level(&self, flight_id: &str, level: f64) {
        self.levels()
            .insert(flight_id.to_string(), level.clamp(0.0, 1.0));
    }

    pub fn snapshot(&self) -> HashMap<String, f64> {
        self.levels().clone()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        *self
            .last_update
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn mark_updated(&self, now: DateTime<Utc>) {
        *self
            .last_update
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(now);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SimulatorControl {
    Started,
    AlreadyRunning,
    Stopped,
    NotRunning,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulatorStatus {
    pub is_running: bool,
    pub last_update: Option<DateTime<Utc>>,
    pub update_interval_seconds: u64,
    pub demand_levels: HashMap<String, f64>,
}

/// The one recurring background task: a mean-reverting random walk over
/// every known flight's demand, coupled to inventory depletion through the
/// ledger. At most one loop instance runs at a time.
pub struct DemandSimulator {
    shared: Arc<SimulatorShared>,
}

struct SimulatorShared {
    oracle: Arc<DemandOracle>,
    ledger: Arc<InventoryLedger>,
    interval: Duration,
    running: AtomicBool,
    rng: Mutex<Box<dyn RandomSource>>,
    stop_tx: Mutex<Option<watch::Sender<bool>>>,
}

impl DemandSimulator {
    pub fn new(oracle: Arc<DemandOracle>, ledger: Arc<InventoryLedger>) -> Self {
        Self::with_random(oracle, ledger, Box::new(ThreadRandom))
    }

    pub fn with_random(
        oracle: Arc<DemandOracle>,
        ledger: Arc<InventoryLedger>,
        rng: Box<dyn RandomSource>,
    ) -> Self {
        Self {
            shared: Arc::new(SimulatorShared {
                oracle,
                ledger,
                interval: DEFAULT_INTERVAL,
                running: AtomicBool::new(false),
                rng: Mutex::new(rng),
                stop_tx: Mutex::new(None),
            }),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        // Only callable before start; the Arc is still unshared here.
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.interval = interval;
        }
        self
    }

    /// Starts the recurring loop. Starting while already running is a no-op
    /// reported as `AlreadyRunning`, not an error.
    pub fn start(&self) -> SimulatorControl {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return SimulatorControl::AlreadyRunning;
        }
        let (tx, mut rx) = watch::channel(false);
        *self.shared.stop_lock() = Some(tx);

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            info!(interval_secs = shared.interval.as_secs(), "demand simulator started");
            loop {
                if !shared.running.load(Ordering::SeqCst) {
                    break;
                }
                shared.tick(Utc::now()).await;
                tokio::select! {
                    _ = tokio::time::sleep(shared.interval) => {}
                    _ = rx.changed() => break,
                }
            }
            info!("demand simulator stopped");
        });
        SimulatorControl::Started
    }

    /// Idempotent stop. Once observed, the next scheduled tick is guaranteed
    /// not to execute: the loop re-checks the flag before every tick and the
    /// watch channel cuts the sleep short.
    pub fn stop(&self) -> SimulatorControl {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return SimulatorControl::NotRunning;
        }
        if let Some(tx) = self.shared.stop_lock().take() {
            let _ = tx.send(true);
        }
        SimulatorControl::Stopped
    }

    pub fn status(&self) -> SimulatorStatus {
        SimulatorStatus {
            is_running: self.shared.running.load(Ordering::SeqCst),
            last_update: self.shared.oracle.last_update(),
            update_interval_seconds: self.shared.interval.as_secs(),
            demand_levels: self.shared.oracle.snapshot(),
        }
    }

    /// Advances the simulation once. Exposed so callers and tests can step
    /// the walk without the timer.
    pub async fn tick(&self, now: DateTime<Utc>) {
        self.shared.tick(now).await;
    }
}

impl SimulatorShared {
    fn stop_lock(&self) -> MutexGuard<'_, Option<watch::Sender<bool>>> {
        self.stop_tx.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn tick(&self, now: DateTime<Utc>) {
        let flights = match self.ledger.list().await {
            Ok(flights) => flights,
            Err(err) => {
                warn!(%err, "demand tick skipped: flight listing failed");
                return;
            }
        };

        for flight in flights {
            // Draw everything up front; the rng guard must not live across
            // the ledger await.
            let (demand, consume) = {
                let mut rng = self
                    .rng
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                let current = self
                    .oracle
                    .known_level(&flight.flight_id)
                    .unwrap_or_else(|| rng.uniform());

                // Mean-reverting walk toward 0.5 with Gaussian noise.
                let change = rng.gaussian(0.0, 0.1);
                let reversion = (DEFAULT_DEMAND - current) * 0.1;
                let mut demand = (current + change + reversion).clamp(0.0, 1.0);

                // Daypart boosts: business hours and rush-hour buckets.
                let hour = now.hour();
                if (9..=17).contains(&hour) {
                    demand += 0.1;
                }
                if matches!(hour, 8 | 9 | 17 | 18) {
                    demand += 0.2;
                }
                demand = demand.clamp(0.0, 1.0);

                let consume = if flight.seats_available > 0
                    && rng.uniform() < 0.3 * demand
                {
                    let cap = flight.seats_available.min(3) as u32;
                    Some(i64::from(rng.pick_in(1, cap)))
                } else {
                    None
                };
                (demand, consume)
            };

            self.oracle.set_level(&flight.flight_id, demand);

            if let Some(seats) = consume {
                // Simulated bookings go through the ledger like everyone
                // else; losing the race to real traffic is fine.
                if let Err(err) = self.ledger.reserve(&flight.flight_id, seats).await {
                    debug!(flight_id = %flight.flight_id, %err, "simulated booking skipped");
                }
            }
        }

        self.oracle.mark_updated(now);
    }
}
