use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Simple selectors: `tag`, `#id` or `.class`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Tag(String),
    Id(String),
    Class(String),
}

impl Selector {
    pub fn parse(raw: &str) -> Self {
        if let Some(id) = raw.strip_prefix('#') {
            Selector::Id(id.to_string())
        } else if let Some(class) = raw.strip_prefix('.') {
            Selector::Class(class.to_string())
        } else {
            Selector::Tag(raw.to_ascii_lowercase())
        }
    }

    pub fn list(raw: &[&str]) -> Vec<Selector> {
        raw.iter().map(|s| Selector::parse(s)).collect()
    }

    fn matches(&self, node: &Node) -> bool {
        match self {
            Selector::Tag(tag) => node.tag == *tag,
            Selector::Id(id) => node.dom_id.as_deref() == Some(id.as_str()),
            Selector::Class(class) => node.classes.contains(class),
        }
    }
}

/// Serializable description of a subtree, used for page snapshots and for
/// nodes the host reports as inserted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
impl NodeSpec {
    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    tag: String,
    dom_id: Option<String>,
    classes: BTreeSet<String>,
    attrs: BTreeMap<String, String>,
    styles: BTreeMap<String, String>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn from_spec(spec: &NodeSpec, parent: Option<NodeId>) -> Self {
        Self {
            tag: spec.tag.to_ascii_lowercase(),
            dom_id: spec.id.clone(),
            classes: spec.classes.iter().cloned().collect(),
            attrs: spec.attrs.clone(),
            styles: BTreeMap::new(),
            text: spec.text.clone().unwrap_or_default(),
            parent,
            children: Vec::new(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

/// Arena-backed stand-in for the host document. Node 0 is the `body`.
#[derive(Debug, Clone)]
pub struct PageTree {
    nodes: Vec<Node>,
}

impl Default for PageTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PageTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::from_spec(&NodeSpec::new("body"), None)],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn matches_any(&self, id: NodeId, selectors: &[Selector]) -> bool {
        let node = self.node(id);
        selectors.iter().any(|s| s.matches(node))
    }

    /// Descendants of `id` in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.node(id).children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.node(next).children.iter().rev().copied());
        }
        out
    }

    pub fn find_first(&self, id: NodeId, selectors: &[Selector]) -> Option<NodeId> {
        self.descendants(id)
            .into_iter()
            .find(|d| self.matches_any(*d, selectors))
    }

    pub fn find_all(&self, id: NodeId, selectors: &[Selector]) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|d| self.matches_any(*d, selectors))
            .collect()
    }

    pub fn find_by_dom_id(&self, dom_id: &str) -> Option<NodeId> {
        let root = self.root();
        if self.node(root).dom_id.as_deref() == Some(dom_id) {
            return Some(root);
        }
        self.find_first(root, &[Selector::Id(dom_id.to_string())])
    }

    /// Concatenated text of the node and everything below it.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut text = self.node(id).text.clone();
        for d in self.descendants(id) {
            text.push_str(&self.node(d).text);
        }
        text
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.node(id).attrs.get(name).map(String::as_str)
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        self.nodes[id.0]
            .attrs
            .insert(name.to_string(), value.to_string());
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        self.nodes[id.0].attrs.remove(name);
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.node(id).classes.contains(class)
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        self.nodes[id.0].classes.insert(class.to_string());
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        self.nodes[id.0].classes.remove(class);
    }

    pub fn style(&self, id: NodeId, property: &str) -> Option<&str> {
        self.node(id).styles.get(property).map(String::as_str)
    }

    pub fn set_style(&mut self, id: NodeId, property: &str, value: &str) {
        self.nodes[id.0]
            .styles
            .insert(property.to_string(), value.to_string());
    }

    pub fn remove_style(&mut self, id: NodeId, property: &str) {
        self.nodes[id.0].styles.remove(property);
    }

    pub fn append(&mut self, parent: NodeId, spec: &NodeSpec) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::from_spec(spec, Some(parent)));
        self.nodes[parent.0].children.push(id);
        for child in &spec.children {
            self.append(id, child);
        }
        id
    }

    /// Appends each top-level spec under `parent` and returns the new roots.
    pub fn insert_fragment(&mut self, parent: NodeId, specs: &[NodeSpec]) -> Vec<NodeId> {
        specs.iter().map(|spec| self.append(parent, spec)).collect()
    }

    pub fn from_specs(specs: &[NodeSpec]) -> Self {
        let mut tree = Self::new();
        let root = tree.root();
        tree.insert_fragment(root, specs);
        tree
    }
}
