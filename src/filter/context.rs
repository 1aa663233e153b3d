use once_cell::sync::Lazy;

use crate::{
    domain::ContextSignals,
    page::{NodeId, PageTree, Selector},
};

use super::patterns::{matching, SignalKind};

/// Container tags for the standard, grid and compact listing renderings.
pub const ENTRY_TAGS: [&str; 3] = [
    "ytd-video-renderer",
    "ytd-grid-video-renderer",
    "ytd-compact-video-renderer",
];

const SHORTS_LINK_MARKER: &str = "/shorts/";

static ENTRY_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| Selector::list(&ENTRY_TAGS));
static TITLE_SELECTORS: Lazy<Vec<Selector>> =
    Lazy::new(|| Selector::list(&["#video-title", ".ytd-video-renderer"]));
static DESCRIPTION_SELECTORS: Lazy<Vec<Selector>> =
    Lazy::new(|| Selector::list(&["#description-text", ".metadata-snippet-text"]));
static CHANNEL_SELECTORS: Lazy<Vec<Selector>> =
    Lazy::new(|| Selector::list(&["#channel-name", ".ytd-channel-name"]));
static THUMBNAIL_SELECTORS: Lazy<Vec<Selector>> =
    Lazy::new(|| Selector::list(&["#thumbnail", ".ytd-thumbnail"]));
static IMAGE_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| Selector::list(&["img"]));
static LINK_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| Selector::list(&["a"]));

#[derive(Debug, Clone, PartialEq)]
pub struct TextField {
    pub node: NodeId,
    pub text: String,
}

/// Owned view of one listing item, re-read from the tree on every pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub node: NodeId,
    pub title: Option<TextField>,
    pub description: String,
    pub channel: String,
    pub thumbnail: Option<NodeId>,
    pub short_form: bool,
}

impl Entry {
    pub fn title_text(&self) -> &str {
        self.title.as_ref().map(|t| t.text.as_str()).unwrap_or("")
    }
}

pub fn is_entry(tree: &PageTree, node: NodeId) -> bool {
    tree.matches_any(node, &ENTRY_SELECTORS)
}

/// Entry containers strictly below `scope`.
pub fn entry_nodes(tree: &PageTree, scope: NodeId) -> Vec<NodeId> {
    tree.find_all(scope, &ENTRY_SELECTORS)
}

pub fn extract_entry(tree: &PageTree, node: NodeId) -> Entry {
    let title = tree.find_first(node, &TITLE_SELECTORS).map(|id| TextField {
        node: id,
        text: tree.text_content(id).trim().to_string(),
    });
    let description = field_text(tree, node, &DESCRIPTION_SELECTORS);
    let channel = field_text(tree, node, &CHANNEL_SELECTORS);
    let thumbnail = thumbnail_image(tree, node);

    Entry {
        node,
        title,
        description,
        channel,
        thumbnail,
        short_form: has_short_form_link(tree, node),
    }
}

fn field_text(tree: &PageTree, node: NodeId, selectors: &[Selector]) -> String {
    tree.find_first(node, selectors)
        .map(|id| tree.text_content(id).trim().to_string())
        .unwrap_or_default()
}

fn has_short_form_link(tree: &PageTree, node: NodeId) -> bool {
    let is_shorts_link = |id: NodeId| {
        tree.attr(id, "href")
            .map(|href| href.contains(SHORTS_LINK_MARKER))
            .unwrap_or(false)
    };
    (tree.matches_any(node, &LINK_SELECTORS) && is_shorts_link(node))
        || tree
            .find_all(node, &LINK_SELECTORS)
            .into_iter()
            .any(is_shorts_link)
}

/// First `img` in document order that sits inside a thumbnail container
/// below the entry.
fn thumbnail_image(tree: &PageTree, entry: NodeId) -> Option<NodeId> {
    tree.find_all(entry, &IMAGE_SELECTORS).into_iter().find(|img| {
        let mut cursor = tree.node(*img).parent();
        while let Some(id) = cursor {
            if id == entry {
                return false;
            }
            if tree.matches_any(id, &THUMBNAIL_SELECTORS) {
                return true;
            }
            cursor = tree.node(id).parent();
        }
        false
    })
}

/// Pattern signals are read from the title only; description and channel
/// are carried along for diagnostics.
pub fn analyze(entry: &Entry) -> ContextSignals {
    let kinds = matching(entry.title_text());
    ContextSignals {
        has_warning_pattern: kinds.contains(&SignalKind::Warning),
        is_review_pattern: kinds.contains(&SignalKind::Review),
        is_important_pattern: kinds.contains(&SignalKind::Important),
        has_episode_marker: kinds.contains(&SignalKind::Episode),
        channel_name: entry.channel.clone(),
        description: entry.description.clone(),
    }
}

impl ContextSignals {
    pub fn labels(&self) -> Vec<&'static str> {
        [
            (self.has_warning_pattern, SignalKind::Warning),
            (self.is_review_pattern, SignalKind::Review),
            (self.is_important_pattern, SignalKind::Important),
            (self.has_episode_marker, SignalKind::Episode),
        ]
        .into_iter()
        .filter(|(hit, _)| *hit)
        .map(|(_, kind)| kind.label())
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::page::NodeSpec;

    use super::*;

    fn entry_spec(title: &str) -> NodeSpec {
        NodeSpec::new("ytd-video-renderer")
            .child(
                NodeSpec::new("div")
                    .id("thumbnail")
                    .child(NodeSpec::new("img").attr("src", "thumb.jpg")),
            )
            .child(NodeSpec::new("a").id("video-title").text(title))
            .child(NodeSpec::new("div").id("channel-name").text(" Anime Ch "))
            .child(NodeSpec::new("yt-formatted-string").id("description-text").text("desc"))
    }

    #[test]
    fn extracts_all_fields() {
        let tree = PageTree::from_specs(&[entry_spec("  最終回の結末がヤバい ")]);
        let node = entry_nodes(&tree, tree.root())[0];
        let entry = extract_entry(&tree, node);
        assert_eq!(entry.title_text(), "最終回の結末がヤバい");
        assert_eq!(entry.channel, "Anime Ch");
        assert_eq!(entry.description, "desc");
        assert!(entry.thumbnail.is_some());
        assert!(!entry.short_form);
    }

    #[test]
    fn missing_optional_fields_are_empty() {
        let tree = PageTree::from_specs(&[NodeSpec::new("ytd-compact-video-renderer")]);
        let node = entry_nodes(&tree, tree.root())[0];
        let entry = extract_entry(&tree, node);
        assert!(entry.title.is_none());
        assert_eq!(entry.title_text(), "");
        assert_eq!(entry.channel, "");
        assert_eq!(entry.description, "");
        assert!(entry.thumbnail.is_none());
        assert_eq!(analyze(&entry), ContextSignals::default());
    }

    #[test]
    fn thumbnail_is_first_image_under_any_thumbnail_container() {
        let tree = PageTree::from_specs(&[NodeSpec::new("ytd-video-renderer")
            .child(NodeSpec::new("img").attr("src", "avatar.jpg"))
            .child(NodeSpec::new("div").id("thumbnail").child(NodeSpec::new("span")))
            .child(
                NodeSpec::new("div")
                    .class("ytd-thumbnail")
                    .child(NodeSpec::new("div").child(NodeSpec::new("img").attr("src", "thumb.jpg"))),
            )
            .child(NodeSpec::new("a").id("video-title").text("clip"))]);
        let node = entry_nodes(&tree, tree.root())[0];
        let thumbnail = extract_entry(&tree, node).thumbnail.unwrap();
        assert_eq!(tree.attr(thumbnail, "src"), Some("thumb.jpg"));
    }

    #[test]
    fn detects_short_form_link() {
        let tree = PageTree::from_specs(&[entry_spec("clip")
            .child(NodeSpec::new("a").attr("href", "/shorts/abc123"))]);
        let node = entry_nodes(&tree, tree.root())[0];
        assert!(extract_entry(&tree, node).short_form);
    }

    #[test]
    fn analyze_scores_title_only() {
        let tree = PageTree::from_specs(&[entry_spec("最終回の結末がヤバい")
            .child(NodeSpec::new("span").class("metadata-snippet-text").text("review"))]);
        let node = entry_nodes(&tree, tree.root())[0];
        let signals = analyze(&extract_entry(&tree, node));
        assert!(signals.has_warning_pattern);
        assert!(signals.is_important_pattern);
        assert!(!signals.is_review_pattern);
        assert!(!signals.has_episode_marker);
        assert_eq!(signals.channel_name, "Anime Ch");
        assert_eq!(signals.labels(), vec!["warning", "important"]);
    }

    #[test]
    fn recognizes_all_container_variants() {
        let tree = PageTree::from_specs(&[
            NodeSpec::new("ytd-video-renderer"),
            NodeSpec::new("ytd-grid-video-renderer"),
            NodeSpec::new("ytd-compact-video-renderer"),
            NodeSpec::new("ytd-playlist-renderer"),
        ]);
        let nodes = entry_nodes(&tree, tree.root());
        assert_eq!(nodes.len(), 3);
        assert!(nodes.iter().all(|n| is_entry(&tree, *n)));
    }
}
