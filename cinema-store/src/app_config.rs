use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub redis: Option<RedisConfig>,
    pub kafka: Option<KafkaConfig>,
    #[serde(default)]
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BusinessRules {
    #[serde(default = "default_hold_seconds")]
    pub hold_seconds: u64,
    #[serde(default = "default_max_seats")]
    pub max_seats_per_booking: usize,
    #[serde(default = "default_premium_surcharge")]
    pub premium_surcharge: Decimal,
    #[serde(default = "default_settlement_lease_seconds")]
    pub settlement_lease_seconds: u64,
    #[serde(default = "default_seat_lock_seconds")]
    pub seat_lock_seconds: u64,
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
}

fn default_hold_seconds() -> u64 { 300 }
fn default_max_seats() -> usize { 10 }
fn default_premium_surcharge() -> Decimal { Decimal::new(5000, 2) }
fn default_settlement_lease_seconds() -> u64 { 60 }
fn default_seat_lock_seconds() -> u64 { 10 }
fn default_sweep_interval_seconds() -> u64 { 30 }

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            hold_seconds: default_hold_seconds(),
            max_seats_per_booking: default_max_seats(),
            premium_surcharge: default_premium_surcharge(),
            settlement_lease_seconds: default_settlement_lease_seconds(),
            seat_lock_seconds: default_seat_lock_seconds(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `CINEMA_DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("CINEMA").separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};
    use rust_decimal_macros::dec;

    fn parse(toml: &str) -> Config {
        config::Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_missing_rules_fall_back_to_defaults() {
        let config = parse(
            r#"
            [database]
            url = "postgres://localhost/cinema"
            "#,
        );
        assert_eq!(config.business_rules, BusinessRules::default());
        assert_eq!(config.business_rules.hold_seconds, 300);
        assert_eq!(config.business_rules.premium_surcharge, dec!(50.00));
        assert_eq!(config.database.max_connections, 5);
        assert!(config.redis.is_none());
        assert!(config.kafka.is_none());
    }

    #[test]
    fn test_partial_rules_override() {
        let config = parse(
            r#"
            [database]
            url = "postgres://localhost/cinema"

            [redis]
            url = "redis://127.0.0.1/"

            [business_rules]
            hold_seconds = 120
            premium_surcharge = "35.50"
            "#,
        );
        let rules = config.business_rules;
        assert_eq!(rules.hold_seconds, 120);
        assert_eq!(rules.premium_surcharge, dec!(35.50));
        assert_eq!(rules.max_seats_per_booking, 10);
        assert_eq!(config.redis.map(|r| r.url).as_deref(), Some("redis://127.0.0.1/"));
    }
}
