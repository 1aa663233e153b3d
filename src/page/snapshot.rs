use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::filter::{
    context::{entry_nodes, extract_entry},
    engine::{BLUR_CLASS, BLUR_VAR, REASON_ATTR},
};

use super::tree::{NodeSpec, PageTree};

/// A page as the host rendered it, stored as JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub nodes: Vec<NodeSpec>,
}

impl PageSnapshot {
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read page snapshot {}", path.display()))?;
        let snapshot = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse page snapshot {}", path.display()))?;
        Ok(snapshot)
    }

    pub fn into_tree(self) -> PageTree {
        PageTree::from_specs(&self.nodes)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryReport {
    pub node: usize,
    pub tag: String,
    pub title: Option<String>,
    pub visible: bool,
    pub blurred: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blur_px: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
}

/// Visual state of every entry currently in the tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageReport {
    pub entries: Vec<EntryReport>,
}

impl PageReport {
    pub fn collect(tree: &PageTree) -> Self {
        let entries = entry_nodes(tree, tree.root())
            .into_iter()
            .map(|node| {
                let entry = extract_entry(tree, node);
                let title_node = entry.title.as_ref().map(|t| t.node);
                let blurred = title_node
                    .map(|id| tree.has_class(id, BLUR_CLASS))
                    .unwrap_or(false)
                    || entry
                        .thumbnail
                        .map(|id| tree.has_class(id, BLUR_CLASS))
                        .unwrap_or(false);
                EntryReport {
                    node: node.index(),
                    tag: tree.node(node).tag().to_string(),
                    title: entry.title.map(|t| t.text),
                    visible: tree.style(node, "display") != Some("none"),
                    blurred,
                    blur_px: tree
                        .style(node, BLUR_VAR)
                        .and_then(|v| v.trim_end_matches("px").parse().ok()),
                    annotation: tree.attr(node, REASON_ATTR).map(str::to_string),
                }
            })
            .collect();
        Self { entries }
    }

    pub fn flagged(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| !e.visible || e.blurred)
            .count()
    }
}
