pub mod compensation;
pub mod gateway;
pub mod manager;
pub mod orchestrator;
pub mod rules;
pub mod service;
pub mod supervisor;
pub mod wallet;

pub use compensation::Compensations;
pub use gateway::{GatewayMode, MockPaymentGateway};
pub use manager::{ReservationManager, ReservationOrigin, ReservationRequest};
pub use orchestrator::SettlementOrchestrator;
pub use rules::BookingRules;
pub use service::{CinemaCore, CoreDeps};
pub use supervisor::{ExpirationSupervisor, RecoveryReport, ReleaseOutcome};
pub use wallet::WalletLedger;
