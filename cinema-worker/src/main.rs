use anyhow::Context;
use cinema_booking::{BookingRules, CinemaCore, CoreDeps, MockPaymentGateway};
use cinema_core::{EventPublisher, SeatLocker, SystemClock};
use cinema_store::{
    app_config::Config, DbClient, InMemorySeatLocker, LogEventPublisher, PgBookingRepository,
    PgHoldRepository, PgPaymentRepository, PgShowRepository, PgWalletRepository, RedisSeatLocker,
};
use cinema_worker::run_expiration_worker;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cinema_worker=debug,cinema_booking=debug,cinema_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;

    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;
    let rules = db
        .fetch_business_rules(config.business_rules.clone())
        .await
        .context("Failed to load business rules")?;
    info!(?rules, "Business rules loaded");

    let locks: Arc<dyn SeatLocker> = match &config.redis {
        Some(redis) => Arc::new(
            RedisSeatLocker::new(&redis.url).context("Failed to create Redis client")?,
        ),
        None => {
            warn!("No Redis configured, seat locks are local to this process");
            Arc::new(InMemorySeatLocker::new())
        }
    };

    let pool = db.pool.clone();
    let deps = CoreDeps {
        shows: Arc::new(PgShowRepository::new(pool.clone())),
        bookings: Arc::new(PgBookingRepository::new(pool.clone())),
        holds: Arc::new(PgHoldRepository::new(pool.clone())),
        payments: Arc::new(PgPaymentRepository::new(pool.clone())),
        wallets: Arc::new(PgWalletRepository::new(pool)),
        locks,
        events: event_publisher(&config)?,
        gateway: Arc::new(MockPaymentGateway::new()),
        clock: Arc::new(SystemClock),
    };
    let core = Arc::new(CinemaCore::new(
        deps,
        BookingRules::from_seconds(
            rules.hold_seconds,
            rules.max_seats_per_booking,
            rules.premium_surcharge,
            rules.settlement_lease_seconds,
            rules.seat_lock_seconds,
        ),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(run_expiration_worker(
        core,
        Duration::from_secs(rules.sweep_interval_seconds),
        shutdown_rx,
    ));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");
    // Receiver may already be gone if the worker exited
    let _ = shutdown_tx.send(true);
    worker.await.context("Expiration worker panicked")?;
    Ok(())
}

#[cfg(feature = "kafka")]
fn event_publisher(config: &Config) -> anyhow::Result<Arc<dyn EventPublisher>> {
    match &config.kafka {
        Some(kafka) => Ok(Arc::new(
            cinema_store::KafkaEventPublisher::new(&kafka.brokers)
                .context("Failed to create Kafka producer")?,
        )),
        None => Ok(Arc::new(LogEventPublisher)),
    }
}

#[cfg(not(feature = "kafka"))]
fn event_publisher(config: &Config) -> anyhow::Result<Arc<dyn EventPublisher>> {
    if config.kafka.is_some() {
        warn!("Kafka configured but this build lacks the kafka feature; events go to the log");
    }
    Ok(Arc::new(LogEventPublisher))
}
