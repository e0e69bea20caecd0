use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub booking: BookingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimulatorConfig {
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookingConfig {
    #[serde(default = "default_pnr_length")]
    pub pnr_length: usize,
    #[serde(default = "default_pnr_max_attempts")]
    pub pnr_max_attempts: u32,
    #[serde(default = "default_retention_days")]
    pub history_retention_days: i64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            pnr_length: default_pnr_length(),
            pnr_max_attempts: default_pnr_max_attempts(),
            history_retention_days: default_retention_days(),
        }
    }
}

fn default_interval_seconds() -> u64 {
    30
}

fn default_pnr_length() -> usize {
    6
}

fn default_pnr_max_attempts() -> u32 {
    50
}

fn default_retention_days() -> i64 {
    7
}

impl Config {
    /// Layered configuration: `config/default`, then a `RUN_MODE`-named file,
    /// then a local override, then `SKYLANE_`-prefixed environment variables
    /// (e.g. `SKYLANE_DATABASE__URL`).
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("SKYLANE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_environment() {
        env::set_var("SKYLANE_DATABASE__URL", "sqlite://skylane-test.db");
        env::set_var("SKYLANE_SIMULATOR__INTERVAL_SECONDS", "5");

        let config = Config::load().unwrap();
        assert_eq!(config.database.url, "sqlite://skylane-test.db");
        assert_eq!(config.simulator.interval_seconds, 5);
        // Untouched sections fall back to defaults.
        assert_eq!(config.booking.pnr_length, 6);
        assert_eq!(config.booking.pnr_max_attempts, 50);
        assert_eq!(config.booking.history_retention_days, 7);

        env::remove_var("SKYLANE_DATABASE__URL");
        env::remove_var("SKYLANE_SIMULATOR__INTERVAL_SECONDS");
    }
}
