pub mod demand;
pub mod fare_history;

pub use demand::{DemandOracle, DemandSimulator, SimulatorControl, SimulatorStatus};
pub use fare_history::FareHistory;
