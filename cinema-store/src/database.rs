use cinema_core::StoreError;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::app_config::BusinessRules;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Rules from the `business_rules` table layered over `defaults`
    pub async fn fetch_business_rules(&self, defaults: BusinessRules) -> Result<BusinessRules, sqlx::Error> {
        let rows: Vec<(String, Value)> =
            sqlx::query_as("SELECT rule_key, rule_value FROM business_rules")
                .fetch_all(&self.pool)
                .await?;

        Ok(apply_rule_overrides(defaults, rows))
    }
}

/// Each row value is expected as `{"value": <number or string>}`.
/// Unknown keys and unusable values are skipped.
pub fn apply_rule_overrides(defaults: BusinessRules, rows: Vec<(String, Value)>) -> BusinessRules {
    let mut rules = defaults;

    for (key, raw) in rows {
        let Some(v) = raw.get("value") else {
            warn!(rule = %key, "Business rule without a value, skipping");
            continue;
        };
        match key.as_str() {
            "hold_seconds" => {
                if let Some(u) = v.as_u64() {
                    rules.hold_seconds = u;
                }
            }
            "max_seats_per_booking" => {
                if let Some(u) = v.as_u64() {
                    rules.max_seats_per_booking = u as usize;
                }
            }
            "premium_surcharge" => {
                if let Some(d) = decimal_value(v) {
                    rules.premium_surcharge = d;
                }
            }
            "settlement_lease_seconds" => {
                if let Some(u) = v.as_u64() {
                    rules.settlement_lease_seconds = u;
                }
            }
            "seat_lock_seconds" => {
                if let Some(u) = v.as_u64() {
                    rules.seat_lock_seconds = u;
                }
            }
            "sweep_interval_seconds" => {
                if let Some(u) = v.as_u64() {
                    rules.sweep_interval_seconds = u;
                }
            }
            _ => {}
        }
    }

    rules
}

fn decimal_value(v: &Value) -> Option<Decimal> {
    match v {
        Value::String(s) => Decimal::from_str(s).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
}

/// sqlx failures as seen by the core
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::UniqueViolation(db.message().to_string())
        }
        sqlx::Error::RowNotFound => StoreError::NotFound("row not found".to_string()),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Corrupt(err.to_string())
        }
        other => StoreError::Unavailable(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_rule_overrides() {
        let rows = vec![
            ("hold_seconds".to_string(), json!({"value": 600})),
            ("premium_surcharge".to_string(), json!({"value": "65.25"})),
            ("seat_lock_seconds".to_string(), json!({"value": "not a number"})),
            ("unknown_rule".to_string(), json!({"value": 1})),
            ("max_seats_per_booking".to_string(), json!({})),
        ];

        let rules = apply_rule_overrides(BusinessRules::default(), rows);
        assert_eq!(rules.hold_seconds, 600);
        assert_eq!(rules.premium_surcharge, dec!(65.25));
        assert_eq!(rules.seat_lock_seconds, 10);
        assert_eq!(rules.max_seats_per_booking, 10);
    }

    #[test]
    fn test_numeric_surcharge() {
        let rows = vec![("premium_surcharge".to_string(), json!({"value": 40}))];
        let rules = apply_rule_overrides(BusinessRules::default(), rows);
        assert_eq!(rules.premium_surcharge, dec!(40));
    }

    #[test]
    fn test_missing_row_maps_to_not_found() {
        assert!(matches!(map_sqlx_error(sqlx::Error::RowNotFound), StoreError::NotFound(_)));
        assert!(matches!(map_sqlx_error(sqlx::Error::PoolTimedOut), StoreError::Unavailable(_)));
    }
}
