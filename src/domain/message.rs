use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::page::NodeSpec;

/// The one message the host sends to a running filter. `settings` may name
/// any subset of the settings keys; the rest keep their current values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    SettingsChanged { settings: Map<String, Value> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failure(error: impl ToString) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
        }
    }
}

/// Structural change reported by the host document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StructuralChange {
    NodesAdded {
        /// DOM id of the parent; the document root when absent.
        #[serde(default)]
        parent: Option<String>,
        nodes: Vec<NodeSpec>,
    },
}

/// Anything the host can push at a watcher over stdin.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum HostEvent {
    Control(ControlMessage),
    Structure(StructuralChange),
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_partial_settings_changed_message() {
        let raw = json!({
            "type": "SETTINGS_CHANGED",
            "settings": { "enabled": false, "blurAmount": 3 }
        });
        let event: HostEvent = serde_json::from_value(raw).unwrap();
        match event {
            HostEvent::Control(ControlMessage::SettingsChanged { settings }) => {
                assert_eq!(settings.len(), 2);
                assert_eq!(settings["enabled"], json!(false));
                assert_eq!(settings["blurAmount"], json!(3));
                assert!(!settings.contains_key("keywords"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn parses_nodes_added_event() {
        let raw = json!({
            "type": "NODES_ADDED",
            "parent": "contents",
            "nodes": [{ "tag": "ytd-video-renderer" }]
        });
        let event: HostEvent = serde_json::from_value(raw).unwrap();
        match event {
            HostEvent::Structure(StructuralChange::NodesAdded { parent, nodes }) => {
                assert_eq!(parent.as_deref(), Some("contents"));
                assert_eq!(nodes.len(), 1);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn failure_response_carries_error() {
        let value = serde_json::to_value(ControlResponse::failure("bad blur")).unwrap();
        assert_eq!(value, json!({ "success": false, "error": "bad blur" }));
        let value = serde_json::to_value(ControlResponse::ok()).unwrap();
        assert_eq!(value, json!({ "success": true }));
    }
}
