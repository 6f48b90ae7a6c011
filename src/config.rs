use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::AttendanceError;

/// Runtime settings. Sources, lowest precedence first: built-in defaults,
/// `attendance.toml` in the working directory, `ATTENDANCE_*` variables.
/// `DATABASE_URL` is honoured when `ATTENDANCE_DATABASE_URL` is unset.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: Option<String>,
    pub defaulter_threshold: f64,
    pub chat_list_threshold: f64,
    pub excellent_threshold: f64,
    pub log_level: String,
    pub seed: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: None,
            defaulter_threshold: 75.0,
            chat_list_threshold: 80.0,
            excellent_threshold: 85.0,
            log_level: "info".to_string(),
            seed: 42,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, AttendanceError> {
        Self::load_from(Some("attendance"), Environment::with_prefix("ATTENDANCE"))
    }

    fn load_from(file: Option<&str>, environment: Environment) -> Result<Self, AttendanceError> {
        let defaults = Settings::default();
        let mut builder = Config::builder()
            .set_default("defaulter_threshold", defaults.defaulter_threshold)?
            .set_default("chat_list_threshold", defaults.chat_list_threshold)?
            .set_default("excellent_threshold", defaults.excellent_threshold)?
            .set_default("log_level", defaults.log_level)?
            .set_default("seed", defaults.seed)?;

        if let Some(name) = file {
            builder = builder.add_source(File::with_name(name).required(false));
        }

        let mut settings: Settings = builder.add_source(environment).build()?.try_deserialize()?;

        if settings.database_url.is_none() {
            settings.database_url = std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty());
        }

        Ok(settings)
    }
}
