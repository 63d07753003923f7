use async_trait::async_trait;
use cinema_core::{SeatLock, SeatLocker, StoreError};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

// Delete only if we still own the key, so an expired-and-retaken lock survives
const UNLOCK_SCRIPT: &str = r#"
    if redis.call("GET", KEYS[1]) == ARGV[1] then
        return redis.call("DEL", KEYS[1])
    else
        return 0
    end
"#;

/// Per-seat locks as `SET key token NX PX ttl`
#[derive(Clone)]
pub struct RedisSeatLocker {
    client: redis::Client,
}

impl RedisSeatLocker {
    pub fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    fn key(show_id: Uuid, seat_number: &str) -> String {
        format!("seat_lock:{}:{}", show_id, seat_number)
    }

    async fn release(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        show_id: Uuid,
        seats: &[String],
        token: &str,
    ) -> Result<(), redis::RedisError> {
        let script = redis::Script::new(UNLOCK_SCRIPT);
        for seat in seats {
            let _: i64 = script
                .key(Self::key(show_id, seat))
                .arg(token)
                .invoke_async(&mut *conn)
                .await?;
        }
        Ok(())
    }
}

fn unavailable(err: redis::RedisError) -> StoreError {
    StoreError::Unavailable(format!("redis: {}", err))
}

#[async_trait]
impl SeatLocker for RedisSeatLocker {
    async fn try_lock(
        &self,
        show_id: Uuid,
        seats: &[String],
        token: &str,
        ttl: Duration,
    ) -> Result<SeatLock, StoreError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(unavailable)?;
        let ttl_ms = ttl.as_millis().max(1) as u64;

        let mut acquired = Vec::with_capacity(seats.len());
        let mut contended = Vec::new();
        for seat in seats {
            // SET NX: only set if the key does not exist
            let result: Option<String> = redis::cmd("SET")
                .arg(Self::key(show_id, seat))
                .arg(token)
                .arg("NX")
                .arg("PX")
                .arg(ttl_ms)
                .query_async(&mut conn)
                .await
                .map_err(unavailable)?;

            match result {
                Some(_) => acquired.push(seat.clone()),
                None => contended.push(seat.clone()),
            }
        }

        if contended.is_empty() {
            debug!(show_id = %show_id, seats = ?seats, "Seat locks acquired");
            return Ok(SeatLock::Acquired);
        }

        // All or nothing: hand back what we got
        if let Err(e) = self.release(&mut conn, show_id, &acquired, token).await {
            warn!(show_id = %show_id, error = %e, "Failed to roll back partial seat locks; they will expire");
        }
        Ok(SeatLock::Contended(contended))
    }

    async fn unlock(&self, show_id: Uuid, seats: &[String], token: &str) -> Result<(), StoreError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(unavailable)?;
        self.release(&mut conn, show_id, seats, token)
            .await
            .map_err(unavailable)
    }
}
