pub mod app_config;
pub mod booking_store;
pub mod database;
pub mod flight_store;

pub use app_config::Config;
pub use booking_store::SqliteBookingStore;
pub use database::Store;
pub use flight_store::SqliteFlightStore;

use skylane_core::EngineError;

pub(crate) fn store_err(err: sqlx::Error) -> EngineError {
    EngineError::Store(err.to_string())
}
