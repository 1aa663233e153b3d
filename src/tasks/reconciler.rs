use std::sync::Arc;

use anyhow::{anyhow, Result};
use futures::future::join_all;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};

use crate::{
    domain::{ControlMessage, ControlResponse, FilterConfiguration, StructuralChange},
    filter::{
        context::{entry_nodes, extract_entry, is_entry, Entry},
        EntryFilterEngine,
    },
    infrastructure::shutdown::ShutdownListener,
    page::{NodeId, PageReport, PageTree},
};

const COMMAND_BUFFER: usize = 64;

pub enum ReconcileCommand {
    Structure(StructuralChange),
    Control {
        message: ControlMessage,
        reply: oneshot::Sender<ControlResponse>,
    },
    Snapshot {
        reply: oneshot::Sender<PageReport>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub evaluated: usize,
    pub flagged: usize,
}

/// Owns the page and is the only writer of its visual state.
pub struct Reconciler {
    tree: PageTree,
    engine: EntryFilterEngine,
    config: Arc<FilterConfiguration>,
}

impl Reconciler {
    pub fn new(tree: PageTree, engine: EntryFilterEngine, config: Arc<FilterConfiguration>) -> Self {
        Self {
            tree,
            engine,
            config,
        }
    }

    #[cfg(test)]
    pub fn config(&self) -> &FilterConfiguration {
        &self.config
    }

    pub fn report(&self) -> PageReport {
        PageReport::collect(&self.tree)
    }

    pub fn spawn(
        self,
        config_rx: watch::Receiver<Arc<FilterConfiguration>>,
        shutdown: ShutdownListener,
    ) -> (ReconcilerHandle, JoinHandle<PageTree>) {
        let (sender, receiver) = mpsc::channel(COMMAND_BUFFER);
        let handle = tokio::spawn(self.run_loop(receiver, config_rx, shutdown));
        (ReconcilerHandle { commands: sender }, handle)
    }

    async fn run_loop(
        mut self,
        mut commands: mpsc::Receiver<ReconcileCommand>,
        mut config_rx: watch::Receiver<Arc<FilterConfiguration>>,
        mut shutdown: ShutdownListener,
    ) -> PageTree {
        self.sweep().await;
        let mut config_open = true;

        loop {
            if shutdown.is_triggered() {
                break;
            }
            tokio::select! {
                _ = shutdown.notified() => break,
                changed = config_rx.changed(), if config_open => match changed {
                    Ok(()) => {
                        let next = config_rx.borrow_and_update().clone();
                        self.replace_config(next);
                        self.sweep().await;
                    }
                    Err(_) => {
                        tracing::debug!(target: "reconciler", "settings channel closed");
                        config_open = false;
                    }
                },
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
            }
        }
        tracing::info!(target: "reconciler", "reconciliation loop stopped");
        self.tree
    }

    async fn handle_command(&mut self, command: ReconcileCommand) {
        match command {
            ReconcileCommand::Structure(change) => {
                self.handle_structure(change).await;
            }
            ReconcileCommand::Control { message, reply } => {
                let response = self.handle_control(message).await;
                let _ = reply.send(response);
            }
            ReconcileCommand::Snapshot { reply } => {
                let _ = reply.send(self.report());
            }
        }
    }

    pub fn replace_config(&mut self, config: Arc<FilterConfiguration>) {
        tracing::info!(
            target: "reconciler",
            enabled = config.enabled,
            keywords = config.keywords.len(),
            "configuration replaced"
        );
        self.config = config;
    }

    /// Re-evaluates every entry on the page.
    pub async fn sweep(&mut self) -> SweepStats {
        let nodes = entry_nodes(&self.tree, self.tree.root());
        let stats = self.reconcile_nodes(nodes).await;
        tracing::info!(
            target: "reconciler",
            evaluated = stats.evaluated,
            flagged = stats.flagged,
            "full sweep finished"
        );
        stats
    }

    /// Inserts reported nodes and evaluates them plus any entries inside them.
    pub async fn handle_structure(&mut self, change: StructuralChange) -> SweepStats {
        let StructuralChange::NodesAdded { parent, nodes } = change;
        let parent_id = match parent.as_deref() {
            Some(dom_id) => self.tree.find_by_dom_id(dom_id).unwrap_or_else(|| {
                tracing::warn!(
                    target: "reconciler",
                    parent = dom_id,
                    "insertion parent not found; appending to document root"
                );
                self.tree.root()
            }),
            None => self.tree.root(),
        };
        let roots = self.tree.insert_fragment(parent_id, &nodes);
        tracing::debug!(
            target: "reconciler",
            parent = parent_id.index(),
            page_nodes = self.tree.len(),
            "fragment inserted"
        );
        self.reconcile_inserted(&roots).await
    }

    pub async fn reconcile_inserted(&mut self, roots: &[NodeId]) -> SweepStats {
        let mut targets = Vec::new();
        for root in roots {
            if is_entry(&self.tree, *root) {
                targets.push(*root);
            }
            targets.extend(entry_nodes(&self.tree, *root));
        }
        let stats = self.reconcile_nodes(targets).await;
        tracing::debug!(
            target: "reconciler",
            inserted = roots.len(),
            evaluated = stats.evaluated,
            flagged = stats.flagged,
            "inserted nodes reconciled"
        );
        stats
    }

    pub async fn handle_control(&mut self, message: ControlMessage) -> ControlResponse {
        match message {
            ControlMessage::SettingsChanged { settings } => {
                let next = match self.config.overlay(&settings) {
                    Ok(next) => next,
                    Err(err) => {
                        tracing::warn!(
                            target: "reconciler",
                            error = %err,
                            "rejected settings message; keeping previous configuration"
                        );
                        return ControlResponse::failure(err);
                    }
                };
                self.replace_config(Arc::new(next));
                self.sweep().await;
                ControlResponse::ok()
            }
        }
    }

    /// Scores entries concurrently, then writes the results one by one.
    async fn reconcile_nodes(&mut self, nodes: Vec<NodeId>) -> SweepStats {
        let entries: Vec<Entry> = nodes
            .into_iter()
            .map(|node| extract_entry(&self.tree, node))
            .collect();
        let config = self.config.clone();
        let engine = &self.engine;
        let decisions = join_all(entries.iter().map(|entry| engine.evaluate(entry, &config))).await;

        let mut stats = SweepStats::default();
        for (entry, decision) in entries.iter().zip(&decisions) {
            EntryFilterEngine::apply_decision(&mut self.tree, entry, decision);
            stats.evaluated += 1;
            if decision.is_flagged() {
                stats.flagged += 1;
            }
        }
        stats
    }
}

#[derive(Clone)]
pub struct ReconcilerHandle {
    commands: mpsc::Sender<ReconcileCommand>,
}

impl ReconcilerHandle {
    pub async fn nodes_added(&self, change: StructuralChange) -> Result<()> {
        self.commands
            .send(ReconcileCommand::Structure(change))
            .await
            .map_err(|_| anyhow!("reconciliation loop has stopped"))
    }

    /// Never fails outright: a stopped loop is reported back as a failed
    /// response, like any other message that could not be handled.
    pub async fn control(&self, message: ControlMessage) -> ControlResponse {
        let (reply, response) = oneshot::channel();
        if self
            .commands
            .send(ReconcileCommand::Control { message, reply })
            .await
            .is_err()
        {
            return ControlResponse::failure("reconciliation loop has stopped");
        }
        response
            .await
            .unwrap_or_else(|_| ControlResponse::failure("reconciliation loop dropped the message"))
    }

    pub async fn snapshot(&self) -> Result<PageReport> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(ReconcileCommand::Snapshot { reply })
            .await
            .map_err(|_| anyhow!("reconciliation loop has stopped"))?;
        response
            .await
            .map_err(|_| anyhow!("reconciliation loop dropped the snapshot request"))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::{json, Value};

    use super::*;
    use crate::{
        domain::settings::KeywordSet,
        infrastructure::shutdown::Shutdown,
        page::NodeSpec,
    };

    fn settings_changed(settings: Value) -> ControlMessage {
        serde_json::from_value(json!({ "type": "SETTINGS_CHANGED", "settings": settings })).unwrap()
    }

    fn entry(tag: &str, title: &str) -> NodeSpec {
        NodeSpec::new(tag)
            .child(NodeSpec::new("div").id("thumbnail").child(NodeSpec::new("img")))
            .child(NodeSpec::new("a").id("video-title").text(title))
    }

    fn config(keywords: &[&str]) -> Arc<FilterConfiguration> {
        Arc::new(FilterConfiguration {
            keywords: keywords.iter().collect::<KeywordSet>(),
            classifier_enabled: false,
            ..FilterConfiguration::default()
        })
    }

    fn page() -> PageTree {
        PageTree::from_specs(&[NodeSpec::new("div")
            .id("contents")
            .child(entry("ytd-video-renderer", "最終回の結末がヤバい"))
            .child(entry("ytd-grid-video-renderer", "日常アニメ第1話"))
            .child(entry("ytd-compact-video-renderer", "Finale reaction"))])
    }

    fn flagged_titles(report: &PageReport) -> Vec<String> {
        report
            .entries
            .iter()
            .filter(|e| e.blurred || !e.visible)
            .filter_map(|e| e.title.clone())
            .collect()
    }

    #[tokio::test]
    async fn sweep_covers_every_rendering_variant() {
        let mut reconciler =
            Reconciler::new(page(), EntryFilterEngine::default(), config(&["結末", "finale"]));
        let stats = reconciler.sweep().await;
        assert_eq!(stats, SweepStats { evaluated: 3, flagged: 2 });
        assert_eq!(
            flagged_titles(&reconciler.report()),
            vec!["最終回の結末がヤバい", "Finale reaction"]
        );
    }

    #[tokio::test]
    async fn inserted_entries_and_nested_entries_are_reconciled() {
        let mut reconciler =
            Reconciler::new(page(), EntryFilterEngine::default(), config(&["結末"]));
        reconciler.sweep().await;

        let stats = reconciler
            .handle_structure(StructuralChange::NodesAdded {
                parent: Some("contents".into()),
                nodes: vec![
                    entry("ytd-video-renderer", "結末を解説"),
                    NodeSpec::new("div").child(
                        NodeSpec::new("section")
                            .child(entry("ytd-compact-video-renderer", "真の結末")),
                    ),
                    NodeSpec::new("span").text("not an entry"),
                ],
            })
            .await;

        assert_eq!(stats, SweepStats { evaluated: 2, flagged: 2 });
        assert_eq!(reconciler.report().entries.len(), 5);
        assert_eq!(flagged_titles(&reconciler.report()).len(), 3);
    }

    #[tokio::test]
    async fn unknown_parent_falls_back_to_root() {
        let mut reconciler =
            Reconciler::new(page(), EntryFilterEngine::default(), config(&["結末"]));
        let stats = reconciler
            .handle_structure(StructuralChange::NodesAdded {
                parent: Some("missing".into()),
                nodes: vec![entry("ytd-video-renderer", "結末")],
            })
            .await;
        assert_eq!(stats.flagged, 1);
    }

    #[tokio::test]
    async fn invalid_control_message_keeps_last_good_config() {
        let mut reconciler =
            Reconciler::new(page(), EntryFilterEngine::default(), config(&["結末"]));
        reconciler.sweep().await;

        let response = reconciler
            .handle_control(settings_changed(json!({ "blurAmount": 9_999 })))
            .await;
        assert!(!response.success);
        assert!(response.error.unwrap().contains("blurAmount"));

        let response = reconciler
            .handle_control(settings_changed(json!({ "blurRadius": 4 })))
            .await;
        assert!(!response.success);
        assert!(response.error.unwrap().contains("blurRadius"));

        assert_eq!(reconciler.config().blur_amount_px, 10);
        assert_eq!(flagged_titles(&reconciler.report()).len(), 1);
    }

    #[tokio::test]
    async fn partial_control_message_keeps_unsent_settings() {
        let seeded = Arc::new(FilterConfiguration {
            classifier_credential: Some("hf_token".into()),
            ..(*config(&["結末"])).clone()
        });
        let mut reconciler = Reconciler::new(page(), EntryFilterEngine::default(), seeded);
        reconciler.sweep().await;
        assert_eq!(flagged_titles(&reconciler.report()), vec!["最終回の結末がヤバい"]);

        let response = reconciler
            .handle_control(settings_changed(
                json!({ "enabled": true, "enableBlur": true, "blurAmount": 12 }),
            ))
            .await;

        assert!(response.success);
        let config = reconciler.config();
        assert_eq!(config.keywords.iter().collect::<Vec<_>>(), vec!["結末"]);
        assert_eq!(config.classifier_credential.as_deref(), Some("hf_token"));
        assert_eq!(config.blur_amount_px, 12);
        let report = reconciler.report();
        let blurred = report.entries.iter().find(|e| e.blurred).unwrap();
        assert_eq!(blurred.title.as_deref(), Some("最終回の結末がヤバい"));
        assert_eq!(blurred.blur_px, Some(7));
    }

    #[tokio::test]
    async fn spawned_loop_handles_messages_in_order() {
        let (shutdown, _) = Shutdown::new();
        let (_config_tx, config_rx) = watch::channel(config(&[]));
        let reconciler = Reconciler::new(page(), EntryFilterEngine::default(), config(&[]));
        let (handle, join) = reconciler.spawn(config_rx, shutdown.subscribe());

        assert_eq!(flagged_titles(&handle.snapshot().await.unwrap()).len(), 0);

        let response = handle
            .control(settings_changed(json!({ "keywords": ["結末"] })))
            .await;
        assert!(response.success);
        assert_eq!(
            flagged_titles(&handle.snapshot().await.unwrap()),
            vec!["最終回の結末がヤバい"]
        );

        handle
            .nodes_added(StructuralChange::NodesAdded {
                parent: None,
                nodes: vec![entry("ytd-video-renderer", "衝撃の結末")],
            })
            .await
            .unwrap();
        assert_eq!(flagged_titles(&handle.snapshot().await.unwrap()).len(), 2);

        shutdown.trigger();
        let tree = join.await.unwrap();
        assert_eq!(PageReport::collect(&tree).entries.len(), 4);
        assert!(!handle.control(settings_changed(json!({}))).await.success);
    }

    #[tokio::test]
    async fn settings_change_triggers_full_sweep() {
        let (shutdown, _) = Shutdown::new();
        let (config_tx, config_rx) = watch::channel(config(&[]));
        let reconciler = Reconciler::new(page(), EntryFilterEngine::default(), config(&[]));
        let (handle, join) = reconciler.spawn(config_rx, shutdown.subscribe());

        config_tx.send(config(&["finale"])).unwrap();

        let mut flagged = Vec::new();
        for _ in 0..50 {
            flagged = flagged_titles(&handle.snapshot().await.unwrap());
            if !flagged.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(flagged, vec!["Finale reaction"]);

        shutdown.trigger();
        join.await.unwrap();
    }
}
