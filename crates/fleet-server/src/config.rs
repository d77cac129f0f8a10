//! Server configuration from environment.

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

use fleet_core::{AlertThresholds, IngestConfig, PricingConfig, RouteOptimizerConfig};

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    /// SQLite file; `None` keeps everything in memory
    pub database_path: Option<String>,
    pub database_max_connections: u32,
    /// Bounded channel size between the store and the persistence loop
    pub persist_queue: usize,
    pub log_json: bool,
    pub thresholds: AlertThresholds,
    pub pricing: PricingConfig,
    pub routing: RouteOptimizerConfig,
    pub ingest: IngestConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            database_path: None,
            database_max_connections: 5,
            persist_queue: 4096,
            log_json: false,
            thresholds: AlertThresholds::default(),
            pricing: PricingConfig::default(),
            routing: RouteOptimizerConfig::default(),
            ingest: IngestConfig::default(),
        }
    }
}

impl Config {
    /// Read `FLEET_*` variables. Unset variables keep their defaults; set but
    /// unparseable ones are an error.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let mut thresholds = defaults.thresholds.clone();
        thresholds.speeding_kmh = parsed("FLEET_SPEEDING_KMH", thresholds.speeding_kmh)?;
        thresholds.low_power_pct = parsed("FLEET_LOW_POWER_PCT", thresholds.low_power_pct)?;
        thresholds.time_gap_min = parsed("FLEET_TIME_GAP_MIN", thresholds.time_gap_min)?;
        thresholds.acceleration_kmh_per_s =
            parsed("FLEET_ACCEL_KMH_PER_S", thresholds.acceleration_kmh_per_s)?;
        thresholds.position_jump_kmh =
            parsed("FLEET_POSITION_JUMP_KMH", thresholds.position_jump_kmh)?;
        thresholds.speed_anomaly_kmh =
            parsed("FLEET_SPEED_ANOMALY_KMH", thresholds.speed_anomaly_kmh)?;
        thresholds.route_deviation_km =
            parsed("FLEET_ROUTE_DEVIATION_KM", thresholds.route_deviation_km)?;

        let mut ingest = defaults.ingest.clone();
        ingest.delay_extension_hours =
            parsed("FLEET_DELAY_EXTENSION_H", ingest.delay_extension_hours)?;

        let database_path = match env::var("FLEET_DATABASE_PATH") {
            Ok(path) if path.trim().is_empty() => None,
            Ok(path) => Some(path),
            Err(_) => Some("data/fleet.db".to_string()),
        };

        Ok(Self {
            server_port: parsed("FLEET_PORT", defaults.server_port)?,
            database_path,
            database_max_connections: parsed(
                "FLEET_DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,
            persist_queue: parsed("FLEET_PERSIST_QUEUE", defaults.persist_queue)?.max(1),
            log_json: flag("FLEET_LOG_JSON"),
            thresholds,
            pricing: defaults.pricing,
            routing: defaults.routing,
            ingest,
        })
    }
}

fn parsed<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        Err(_) => Ok(default),
    }
}

fn flag(key: &str) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}
