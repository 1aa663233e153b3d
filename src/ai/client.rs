use reqwest::Client;

use crate::{config::ClassifierConfig, domain::ClassifierAccess};

use super::{
    inference::{build_request, parse_response, ClassifierError},
    quota::{MonthlyQuota, QuotaSnapshot},
};

/// Zero-shot spoiler classifier behind a monthly request budget. Every
/// failure collapses to `None`, which callers read as "no signal".
pub struct ClassifierClient {
    http: Client,
    config: ClassifierConfig,
    quota: MonthlyQuota,
}

impl ClassifierClient {
    pub fn new(http: Client, config: ClassifierConfig, quota: MonthlyQuota) -> Self {
        Self {
            http,
            config,
            quota,
        }
    }

    pub async fn score(&self, text: &str, access: ClassifierAccess<'_>) -> Option<f64> {
        let credential = access.usable_credential()?;

        if !self.quota.try_acquire() {
            let usage = self.quota.snapshot();
            tracing::debug!(
                target: "classifier",
                window = %usage.window,
                used = usage.used,
                quota = usage.quota,
                "monthly quota exhausted; skipping classifier"
            );
            return None;
        }

        match self.dispatch(text, credential).await {
            Ok(score) => {
                tracing::debug!(target: "classifier", score, "classifier scored title");
                Some(score)
            }
            Err(err) => {
                tracing::warn!(
                    target: "classifier",
                    error = %err,
                    endpoint = %self.config.endpoint,
                    "classifier unavailable; continuing without it"
                );
                None
            }
        }
    }

    async fn dispatch(&self, text: &str, credential: &str) -> Result<f64, ClassifierError> {
        let request = build_request(
            text,
            &self.config.spoiler_label,
            &self.config.general_label,
        );
        let response = self
            .http
            .post(self.config.endpoint.clone())
            .bearer_auth(credential)
            .timeout(self.config.timeout)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::Status(status));
        }
        parse_response(response, &self.config.spoiler_label).await
    }

    pub fn usage(&self) -> QuotaSnapshot {
        self.quota.snapshot()
    }
}
