pub mod manager;
pub mod models;
pub mod pnr;

pub use manager::BookingLifecycle;
pub use models::{CancellationOutcome, PaymentOutcome, ReservationStatus, TransientBooking};
pub use pnr::PnrAllocator;
