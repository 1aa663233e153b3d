use std::time::Duration;

use chrono_tz::Tz;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub classifier: ClassifierConfig,
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
    pub timezone: Tz,
    pub settings: SettingsConfig,
}

/// Connection details for the remote zero-shot classifier. The bearer
/// credential is not here: it travels with the user's filter settings.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub endpoint: Url,
    pub monthly_quota: u32,
    pub timeout: Duration,
    pub spoiler_label: String,
    pub general_label: String,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub logs_dir: String,
    pub data_dir: String,
    pub settings_db_filename: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone)]
pub struct SettingsConfig {
    pub poll_interval: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}
