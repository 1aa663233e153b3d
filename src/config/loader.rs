use std::{env, str::FromStr, time::Duration};

use chrono_tz::Tz;
use url::Url;

use super::env::{
    AppConfig, ClassifierConfig, ConfigError, DirectoryConfig, LoggingConfig, SettingsConfig,
};

pub const DEFAULT_CLASSIFIER_ENDPOINT: &str =
    "https://api-inference.huggingface.co/models/facebook/bart-large-mnli";

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_env()
}

impl AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let endpoint_raw = env::var("CLASSIFIER_ENDPOINT")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_CLASSIFIER_ENDPOINT.to_string());
        let endpoint = Url::parse(&endpoint_raw).map_err(|err| ConfigError::Invalid {
            key: "CLASSIFIER_ENDPOINT",
            value: endpoint_raw.clone(),
            reason: err.to_string(),
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                key: "CLASSIFIER_ENDPOINT",
                value: endpoint_raw,
                reason: "scheme must be http or https".to_string(),
            });
        }

        let classifier = ClassifierConfig {
            endpoint,
            monthly_quota: parse_or("CLASSIFIER_MONTHLY_QUOTA", 1_000)?,
            timeout: Duration::from_millis(parse_or("CLASSIFIER_TIMEOUT_MS", 5_000)?),
            spoiler_label: env::var("CLASSIFIER_SPOILER_LABEL")
                .unwrap_or_else(|_| "spoiler".to_string()),
            general_label: env::var("CLASSIFIER_GENERAL_LABEL")
                .unwrap_or_else(|_| "general".to_string()),
        };

        let directories = DirectoryConfig {
            logs_dir: env::var("LOGS_DIR").unwrap_or_else(|_| "logs".to_string()),
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            settings_db_filename: env::var("SETTINGS_DB_FILENAME")
                .unwrap_or_else(|_| "settings.db".to_string()),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        };

        let timezone_raw = env::var("GUARD_TIMEZONE").unwrap_or_else(|_| "Asia/Tokyo".to_string());
        let timezone = Tz::from_str(&timezone_raw).map_err(|err| ConfigError::Invalid {
            key: "GUARD_TIMEZONE",
            value: timezone_raw.clone(),
            reason: err.to_string(),
        })?;

        let settings = SettingsConfig {
            poll_interval: Duration::from_millis(parse_or("SETTINGS_POLL_INTERVAL_MS", 1_000)?),
        };

        Ok(Self {
            classifier,
            directories,
            logging,
            timezone,
            settings,
        })
    }
}

fn parse_or<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => {
            value
                .trim()
                .parse::<T>()
                .map_err(|err| ConfigError::Invalid {
                    key,
                    value: value.clone(),
                    reason: err.to_string(),
                })
        }
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_or_uses_default_when_unset_or_blank() {
        env::remove_var("SPOILER_GUARD_TEST_UNSET");
        assert_eq!(parse_or("SPOILER_GUARD_TEST_UNSET", 7u32).unwrap(), 7);

        env::set_var("SPOILER_GUARD_TEST_BLANK", "  ");
        assert_eq!(parse_or("SPOILER_GUARD_TEST_BLANK", 3u64).unwrap(), 3);
    }

    #[test]
    fn parse_or_reports_invalid_values() {
        env::set_var("SPOILER_GUARD_TEST_QUOTA", " 250 ");
        assert_eq!(parse_or("SPOILER_GUARD_TEST_QUOTA", 1_000u32).unwrap(), 250);

        env::set_var("SPOILER_GUARD_TEST_BAD", "lots");
        let err = parse_or("SPOILER_GUARD_TEST_BAD", 1_000u32).unwrap_err();
        match err {
            ConfigError::Invalid { key, value, .. } => {
                assert_eq!(key, "SPOILER_GUARD_TEST_BAD");
                assert_eq!(value, "lots");
            }
        }
    }

    #[test]
    fn default_endpoint_is_a_valid_https_url() {
        let url = Url::parse(DEFAULT_CLASSIFIER_ENDPOINT).unwrap();
        assert_eq!(url.scheme(), "https");
    }
}
