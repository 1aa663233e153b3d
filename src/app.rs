use std::{path::Path, sync::Arc, time::Duration};

use anyhow::Result;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::{
    io::{stdin, AsyncBufReadExt, BufReader},
    time::timeout,
};

use crate::{
    ai::{quota::system_clock, ClassifierClient, MonthlyQuota},
    cli::SettingsAction,
    config::AppConfig,
    db::{self, settings::SettingsRepository},
    domain::{ControlResponse, HostEvent},
    filter::{EntryFilterEngine, StrengthCalculator},
    infrastructure::{directories::ResolvedPaths, shutdown::Shutdown},
    page::{PageReport, PageSnapshot},
    settings::SettingsBridge,
    tasks::{Reconciler, ReconcilerHandle},
};

pub struct SpoilerGuardApp {
    settings: Arc<SettingsBridge>,
    classifier: Arc<ClassifierClient>,
    engine: EntryFilterEngine,
    shutdown: Shutdown,
    config: Arc<AppConfig>,
}

impl SpoilerGuardApp {
    pub async fn initialize(
        config: AppConfig,
        paths: ResolvedPaths,
        shutdown: Shutdown,
    ) -> Result<Self> {
        let config = Arc::new(config);
        let pool = db::init_pool(&paths.settings_db).await?;
        let settings = Arc::new(SettingsBridge::open(SettingsRepository::new(pool)).await?);
        tracing::info!(
            target: "app",
            data_dir = %paths.data_dir.display(),
            store = %paths.settings_db.display(),
            "settings store opened"
        );

        let http_client = Client::builder()
            .user_agent(format!("spoiler-guard/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        let quota = MonthlyQuota::new(
            config.classifier.monthly_quota,
            config.timezone,
            system_clock(),
        );
        let classifier = Arc::new(ClassifierClient::new(
            http_client,
            config.classifier.clone(),
            quota,
        ));
        let engine = EntryFilterEngine::new(StrengthCalculator::new(classifier.clone()));

        Ok(Self {
            settings,
            classifier,
            engine,
            shutdown,
            config,
        })
    }

    /// Filters the page once with the stored settings.
    pub async fn run_once(&self, page: &Path) -> Result<PageReport> {
        let tree = PageSnapshot::load(page).await?.into_tree();
        let mut reconciler = Reconciler::new(tree, self.engine.clone(), self.settings.current());
        let stats = reconciler.sweep().await;
        let report = reconciler.report();
        let usage = self.classifier.usage();
        tracing::info!(
            target: "app",
            evaluated = stats.evaluated,
            flagged = stats.flagged,
            concealed = report.flagged(),
            classifier_used = usage.used,
            classifier_quota = usage.quota,
            "page filtered"
        );
        Ok(report)
    }

    pub async fn watch(self, page: &Path) -> Result<()> {
        let SpoilerGuardApp {
            settings,
            classifier: _,
            engine,
            shutdown,
            config,
        } = self;

        let tree = PageSnapshot::load(page).await?.into_tree();
        let reconciler = Reconciler::new(tree, engine, settings.current());
        let (handle, mut reconciler_handle) =
            reconciler.spawn(settings.subscribe(), shutdown.subscribe());
        let poller = settings
            .clone()
            .spawn_poller(config.settings.poll_interval, shutdown.subscribe());

        tracing::info!(target: "app", page = %page.display(), "watching page");
        print_line(&json!({ "report": handle.snapshot().await? }));

        let mut shutdown_listener = shutdown.subscribe();
        let mut lines = BufReader::new(stdin()).lines();
        let mut stdin_open = true;
        loop {
            tokio::select! {
                _ = shutdown_listener.notified() => break,
                res = &mut reconciler_handle => {
                    if let Err(err) = res {
                        tracing::error!(target: "app", error = %err, "reconciliation loop ended unexpectedly");
                    }
                    break;
                }
                line = lines.next_line(), if stdin_open => match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        print_line(&dispatch_host_line(&handle, &line).await);
                    }
                    Ok(None) => {
                        tracing::debug!(target: "app", "stdin closed; still watching settings");
                        stdin_open = false;
                    }
                    Err(err) => {
                        tracing::warn!(target: "app", error = %err, "failed to read stdin");
                        stdin_open = false;
                    }
                },
            }
        }

        shutdown.trigger();
        let shutdown_timeout = Duration::from_secs(5);

        if !reconciler_handle.is_finished() {
            match timeout(shutdown_timeout, &mut reconciler_handle).await {
                Ok(_) => {}
                Err(_) => {
                    tracing::warn!(
                        target: "reconciler",
                        "reconciliation loop did not stop within {:?}; aborting",
                        shutdown_timeout
                    );
                    reconciler_handle.abort();
                }
            }
        }
        if timeout(shutdown_timeout, poller).await.is_err() {
            tracing::warn!(target: "settings", "settings poller did not stop in time");
        }
        if timeout(shutdown_timeout, settings.close()).await.is_err() {
            tracing::warn!(
                target: "settings",
                "settings store did not close within {:?}",
                shutdown_timeout
            );
        }

        tracing::info!(target: "app", "watcher stopped");
        Ok(())
    }

    pub async fn settings_command(&self, action: SettingsAction) -> Result<()> {
        match action {
            SettingsAction::Show => {}
            SettingsAction::Set { key, value } => {
                self.settings.set(&key, parse_setting_value(&value)).await?;
            }
            SettingsAction::Reset { key } => {
                self.settings.reset(&key).await?;
            }
            SettingsAction::AddKeyword { keyword } => {
                if !self.settings.add_keyword(&keyword).await? {
                    tracing::info!(target: "settings", keyword = %keyword, "keyword already present or blank");
                }
            }
            SettingsAction::RemoveKeyword { keyword } => {
                if !self.settings.remove_keyword(&keyword).await? {
                    tracing::info!(target: "settings", keyword = %keyword, "keyword not found");
                }
            }
        }
        let mut shown = serde_json::to_value(self.settings.get().await?)?;
        if let Some(credential) = shown.get_mut("classifierCredential") {
            if credential.as_str().is_some_and(|c| !c.is_empty()) {
                *credential = Value::String("<set>".to_string());
            }
        }
        print_line(&shown);
        Ok(())
    }

    pub async fn close(self) {
        self.settings.close().await;
    }
}

/// Handles one JSON line from the host and returns what to print back.
async fn dispatch_host_line(handle: &ReconcilerHandle, line: &str) -> Value {
    let event: HostEvent = match serde_json::from_str(line) {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!(target: "app", error = %err, "unrecognized host message");
            return json!(ControlResponse::failure(format!("unrecognized message: {err}")));
        }
    };
    match event {
        HostEvent::Control(message) => json!(handle.control(message).await),
        HostEvent::Structure(change) => {
            if let Err(err) = handle.nodes_added(change).await {
                return json!(ControlResponse::failure(err));
            }
            match handle.snapshot().await {
                Ok(report) => json!({ "report": report }),
                Err(err) => json!(ControlResponse::failure(err)),
            }
        }
    }
}

fn parse_setting_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn print_line(value: &Value) {
    println!("{value}");
}
