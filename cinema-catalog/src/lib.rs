pub mod inventory;
pub mod pricing;

pub use inventory::{Availability, SeatInventory};
pub use pricing::{PriceQuote, PricingConfig, PricingEngine, SeatCategory, SeatPrice};
