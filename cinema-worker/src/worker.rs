use cinema_booking::CinemaCore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Startup recovery, then a periodic sweep of lapsed holds until `shutdown`
/// flips to true or its sender goes away. Timers are aborted on exit.
pub async fn run_expiration_worker(
    core: Arc<CinemaCore>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    match core.recover().await {
        Ok(report) => info!(
            released = report.released,
            rescheduled = report.rescheduled,
            "Recovered pending reservations"
        ),
        // Sweep below catches whatever recovery missed
        Err(e) => error!(error = %e, "Expiration recovery failed"),
    }

    let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    info!(interval_secs = interval.as_secs(), "Expiration worker started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match core.sweep().await {
                    Ok(0) => debug!("Sweep found nothing to release"),
                    Ok(released) => info!(released, "Sweep released lapsed reservations"),
                    Err(e) => error!(error = %e, "Expiration sweep failed"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    core.shutdown();
    info!("Expiration worker stopped");
}
