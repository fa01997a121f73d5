use config::{Config, ConfigError, Environment, File};
use safetyconnect_common::Coordinates;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub port: u16,
    pub host: String,
    pub log_level: String,
    /// Emit logs as JSON lines instead of the human-readable format.
    pub log_json: bool,
    pub request_timeout_secs: u64,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HotlineSettings {
    /// JSON region table. The embedded Philippine table is used when unset.
    pub table_path: Option<String>,
    pub fallback_latitude: f64,
    pub fallback_longitude: f64,
}

impl HotlineSettings {
    pub fn fallback(&self) -> Coordinates {
        Coordinates::new(self.fallback_latitude, self.fallback_longitude)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub hotlines: HotlineSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .set_default("server.port", 3000)?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.log_level", "info")?
            .set_default("server.log_json", false)?
            .set_default("server.request_timeout_secs", 30)?
            .set_default("server.rate_limit_per_second", 6)?
            .set_default("server.rate_limit_burst", 20)?
            .set_default("database.url", "sqlite://safetyconnect.db?mode=rwc")?
            .set_default("hotlines.fallback_latitude", 9.7392)?
            .set_default("hotlines.fallback_longitude", 118.7353)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        let settings: Settings = s.try_deserialize()?;
        validate_settings(&settings, &run_mode)?;
        Ok(settings)
    }

    /// Settings for an in-process instance backed by an in-memory database.
    pub fn in_memory() -> Self {
        Self {
            server: ServerSettings {
                port: 0,
                host: "127.0.0.1".to_string(),
                log_level: "info".to_string(),
                log_json: false,
                request_timeout_secs: 30,
                rate_limit_per_second: 6,
                rate_limit_burst: 20,
            },
            database: DatabaseSettings {
                url: "sqlite::memory:".to_string(),
            },
            hotlines: HotlineSettings {
                table_path: None,
                fallback_latitude: 9.7392,
                fallback_longitude: 118.7353,
            },
        }
    }
}

fn validate_settings(settings: &Settings, run_mode: &str) -> Result<(), ConfigError> {
    if !settings.hotlines.fallback().is_valid() {
        return Err(ConfigError::Message(format!(
            "hotlines fallback coordinate out of range: {}",
            settings.hotlines.fallback()
        )));
    }

    if settings.server.rate_limit_per_second == 0 || settings.server.rate_limit_burst == 0 {
        return Err(ConfigError::Message(
            "server.rate_limit_per_second and server.rate_limit_burst must be positive".to_string(),
        ));
    }

    if !is_production(run_mode) {
        return Ok(());
    }

    let mut bad = Vec::new();
    if settings.server.host == "127.0.0.1" || settings.server.host == "localhost" {
        bad.push("server.host");
    }
    if settings.database.url.contains(":memory:") {
        bad.push("database.url");
    }

    if !bad.is_empty() {
        return Err(ConfigError::Message(format!(
            "production config invalid: {}",
            bad.join(", ")
        )));
    }

    Ok(())
}

fn is_production(run_mode: &str) -> bool {
    matches!(run_mode.to_lowercase().as_str(), "production" | "prod")
}
