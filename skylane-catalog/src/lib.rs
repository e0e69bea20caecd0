pub mod ledger;
pub mod pricing;

pub use ledger::InventoryLedger;
pub use pricing::{PriceQuote, PriceRequest, PricingTiers};
