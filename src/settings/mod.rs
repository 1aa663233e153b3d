use std::{sync::Arc, time::Duration};

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::{sync::watch, task::JoinHandle, time::sleep};

use crate::{
    db::settings::SettingsRepository,
    domain::{settings::SETTING_KEYS, FilterConfiguration, InvalidSettings},
    infrastructure::shutdown::ShutdownListener,
};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings storage unavailable: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("stored value for {key} is not valid JSON: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("settings could not be decoded: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("unknown settings key {0:?}")]
    UnknownKey(String),
    #[error(transparent)]
    Invalid(#[from] InvalidSettings),
}

/// Boundary to the persisted user settings. Reads fill unset keys from
/// defaults; every accepted write publishes a full snapshot to subscribers.
pub struct SettingsBridge {
    repo: SettingsRepository,
    sender: watch::Sender<Arc<FilterConfiguration>>,
}

impl SettingsBridge {
    pub async fn open(repo: SettingsRepository) -> Result<Self, SettingsError> {
        let initial = read_snapshot(&repo, &FilterConfiguration::default()).await?;
        let (sender, _) = watch::channel(Arc::new(initial));
        Ok(Self { repo, sender })
    }

    pub async fn get(&self) -> Result<FilterConfiguration, SettingsError> {
        self.get_with_defaults(&FilterConfiguration::default()).await
    }

    pub async fn get_with_defaults(
        &self,
        defaults: &FilterConfiguration,
    ) -> Result<FilterConfiguration, SettingsError> {
        read_snapshot(&self.repo, defaults).await
    }

    pub fn current(&self) -> Arc<FilterConfiguration> {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<FilterConfiguration>> {
        self.sender.subscribe()
    }

    /// Validates and stores one key, then publishes the resulting snapshot.
    pub async fn set(&self, key: &str, value: Value) -> Result<Arc<FilterConfiguration>, SettingsError> {
        if !SETTING_KEYS.contains(&key) {
            return Err(SettingsError::UnknownKey(key.to_string()));
        }
        let mut merged = stored_object(&self.repo, &FilterConfiguration::default()).await?;
        merged.insert(key.to_string(), value.clone());
        let candidate: FilterConfiguration =
            serde_json::from_value(Value::Object(merged)).map_err(SettingsError::Decode)?;
        candidate.validate()?;

        self.repo.upsert(key, &value.to_string()).await?;
        tracing::info!(target: "settings", key, "setting updated");
        Ok(self.publish(candidate))
    }

    /// Drops the stored value so the key reads as its default again.
    pub async fn reset(&self, key: &str) -> Result<Arc<FilterConfiguration>, SettingsError> {
        if !SETTING_KEYS.contains(&key) {
            return Err(SettingsError::UnknownKey(key.to_string()));
        }
        if self.repo.remove(key).await? {
            tracing::info!(target: "settings", key, "setting reset to default");
        }
        let latest = self.get().await?;
        Ok(self.publish(latest))
    }

    /// Returns `false` when the keyword was blank or already present.
    pub async fn add_keyword(&self, keyword: &str) -> Result<bool, SettingsError> {
        let mut config = self.get().await?;
        if !config.keywords.insert(keyword) {
            return Ok(false);
        }
        self.store_keywords(config).await?;
        Ok(true)
    }

    pub async fn remove_keyword(&self, keyword: &str) -> Result<bool, SettingsError> {
        let mut config = self.get().await?;
        if !config.keywords.remove(keyword) {
            return Ok(false);
        }
        self.store_keywords(config).await?;
        Ok(true)
    }

    async fn store_keywords(&self, config: FilterConfiguration) -> Result<(), SettingsError> {
        let value = serde_json::to_string(&config.keywords).map_err(SettingsError::Decode)?;
        self.repo.upsert("keywords", &value).await?;
        tracing::info!(target: "settings", count = config.keywords.len(), "keywords updated");
        self.publish(config);
        Ok(())
    }

    /// Re-reads the store and publishes if another writer changed it.
    pub async fn refresh(&self) -> Result<bool, SettingsError> {
        let latest = self.get().await?;
        let changed = *self.current() != latest;
        if changed {
            tracing::info!(target: "settings", "settings changed outside this process");
            self.publish(latest);
        }
        Ok(changed)
    }

    fn publish(&self, config: FilterConfiguration) -> Arc<FilterConfiguration> {
        let config = Arc::new(config);
        let next = config.clone();
        self.sender.send_if_modified(move |current| {
            if **current == *next {
                false
            } else {
                *current = next;
                true
            }
        });
        config
    }

    pub fn spawn_poller(self: Arc<Self>, interval: Duration, mut shutdown: ShutdownListener) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = sleep(interval) => {}
                    _ = shutdown.notified() => break,
                }
                if let Err(err) = self.refresh().await {
                    tracing::warn!(target: "settings", error = %err, "failed to refresh settings");
                }
            }
            tracing::debug!(target: "settings", "settings poller stopped");
        })
    }

    pub async fn close(&self) {
        self.repo.close().await;
    }
}

async fn stored_object(
    repo: &SettingsRepository,
    defaults: &FilterConfiguration,
) -> Result<Map<String, Value>, SettingsError> {
    let mut object = match serde_json::to_value(defaults).map_err(SettingsError::Decode)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    for (key, raw) in repo.load_all().await? {
        let value: Value =
            serde_json::from_str(&raw).map_err(|source| SettingsError::Corrupt {
                key: key.clone(),
                source,
            })?;
        object.insert(key, value);
    }
    Ok(object)
}

async fn read_snapshot(
    repo: &SettingsRepository,
    defaults: &FilterConfiguration,
) -> Result<FilterConfiguration, SettingsError> {
    let object = stored_object(repo, defaults).await?;
    serde_json::from_value(Value::Object(object)).map_err(SettingsError::Decode)
}
