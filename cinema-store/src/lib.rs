pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod events;
pub mod hold_repo;
pub mod memory;
pub mod payment_repo;
pub mod redis_repo;
pub mod show_repo;
pub mod wallet_repo;

pub use app_config::{BusinessRules, Config};
pub use booking_repo::PgBookingRepository;
pub use database::DbClient;
pub use events::{LogEventPublisher, RecordingEventPublisher};
#[cfg(feature = "kafka")]
pub use events::KafkaEventPublisher;
pub use hold_repo::PgHoldRepository;
pub use memory::{InMemorySeatLocker, InMemoryStore};
pub use payment_repo::PgPaymentRepository;
pub use redis_repo::RedisSeatLocker;
pub use show_repo::PgShowRepository;
pub use wallet_repo::PgWalletRepository;
