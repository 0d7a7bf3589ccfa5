//! Arena model of the live page.
//!
//! Nodes are elements or shadow roots. Every element carries its laid-out
//! box in page coordinates plus the handful of computed style properties
//! that hit testing and UI suppression depend on.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;
use crate::geometry::{PagePoint, PageRect};
use crate::viewport::Viewport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PointerEvents {
    #[default]
    Auto,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Display {
    #[default]
    Block,
    Inline,
    Flex,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    #[default]
    Static,
    Relative,
    Absolute,
    Fixed,
    Sticky,
}

/// Computed style subset. `None` on an inherited property means "inherit".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Style {
    pub pointer_events: Option<PointerEvents>,
    pub visibility: Option<Visibility>,
    pub display: Display,
    pub position: Position,
    pub z_index: Option<i32>,
}

#[derive(Debug, Clone)]
enum NodeKind {
    Element { tag: String },
    ShadowRoot { host: NodeId },
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    shadow_root: Option<NodeId>,
    attributes: BTreeMap<String, String>,
    rect: PageRect,
    style: Style,
}

impl Node {
    fn element(tag: &str) -> Self {
        Self {
            kind: NodeKind::Element {
                tag: tag.to_ascii_lowercase(),
            },
            parent: None,
            children: Vec::new(),
            shadow_root: None,
            attributes: BTreeMap::new(),
            rect: PageRect::default(),
            style: Style::default(),
        }
    }
}

/// Recorded position of a detached node, enough to put it back exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub parent: NodeId,
    pub next_sibling: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    body: NodeId,
}

impl Document {
    pub fn new(width: f64, height: f64) -> Self {
        let mut body = Node::element("body");
        body.rect = PageRect::new(0.0, 0.0, width, height);
        Self {
            nodes: vec![body],
            body: NodeId(0),
        }
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.nodes.push(Node::element(tag));
        NodeId(self.nodes.len() - 1)
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Inserts `child` under `parent` before `reference`. A missing or
    /// foreign reference appends.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        self.detach(child);
        let siblings = &mut self.nodes[parent.0].children;
        let index = reference
            .and_then(|r| siblings.iter().position(|c| *c == r))
            .unwrap_or(siblings.len());
        siblings.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Removes `node` from its parent, returning where it was.
    pub fn detach(&mut self, node: NodeId) -> Option<Placement> {
        let parent = self.nodes[node.0].parent.take()?;
        let siblings = &mut self.nodes[parent.0].children;
        let index = siblings.iter().position(|c| *c == node)?;
        siblings.remove(index);
        Some(Placement {
            parent,
            next_sibling: siblings.get(index).copied(),
        })
    }

    pub fn attach_shadow(&mut self, host: NodeId) -> NodeId {
        if let Some(existing) = self.nodes[host.0].shadow_root {
            return existing;
        }
        self.nodes.push(Node {
            kind: NodeKind::ShadowRoot { host },
            parent: None,
            children: Vec::new(),
            shadow_root: None,
            attributes: BTreeMap::new(),
            rect: PageRect::default(),
            style: Style::default(),
        });
        let root = NodeId(self.nodes.len() - 1);
        self.nodes[host.0].shadow_root = Some(root);
        root
    }

    pub fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        self.nodes[host.0].shadow_root
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].kind, NodeKind::Element { .. })
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { tag } => Some(tag),
            NodeKind::ShadowRoot { .. } => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Parent in the flattened tree: a shadow root steps out to its host.
    pub fn composed_parent(&self, id: NodeId) -> Option<NodeId> {
        match self.nodes[id.0].kind {
            NodeKind::ShadowRoot { host } => Some(host),
            NodeKind::Element { .. } => self.nodes[id.0].parent,
        }
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.nodes[id.0].attributes.get(name).map(String::as_str)
    }

    pub fn attributes(&self, id: NodeId) -> &BTreeMap<String, String> {
        &self.nodes[id.0].attributes
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        self.nodes[id.0]
            .attributes
            .insert(name.to_string(), value.to_string());
    }

    pub fn rect(&self, id: NodeId) -> PageRect {
        self.nodes[id.0].rect
    }

    pub fn set_rect(&mut self, id: NodeId, rect: PageRect) {
        self.nodes[id.0].rect = rect;
    }

    pub fn style(&self, id: NodeId) -> &Style {
        &self.nodes[id.0].style
    }

    pub fn style_mut(&mut self, id: NodeId) -> &mut Style {
        &mut self.nodes[id.0].style
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.body {
                return true;
            }
            current = self.composed_parent(node);
        }
        false
    }

    /// Nearest inclusive ancestor carrying `attribute`. Like `Element.closest`
    /// this never leaves the node's own tree scope.
    pub fn closest(&self, id: NodeId, attribute: &str) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if !self.is_element(node) {
                return None;
            }
            if self.nodes[node.0].attributes.contains_key(attribute) {
                return Some(node);
            }
            current = self.nodes[node.0].parent;
        }
        None
    }

    /// Event path from `id` up to the body, crossing shadow boundaries.
    pub fn composed_path(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            path.push(node);
            current = self.composed_parent(node);
        }
        path
    }

    /// Connected nodes in paint order: a host, then its shadow tree, then its
    /// light children.
    pub fn composed_preorder(&self) -> Vec<NodeId> {
        self.composed_subtree(self.body)
    }

    /// `id` and everything below it in paint order, shadow trees included.
    pub fn composed_subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            let entry = &self.nodes[node.0];
            for child in entry.children.iter().rev() {
                stack.push(*child);
            }
            if let Some(root) = entry.shadow_root {
                stack.push(root);
            }
        }
        out
    }

    /// Connected elements carrying `name`, optionally with an exact value.
    pub fn find_by_attribute(&self, name: &str, value: Option<&str>) -> Vec<NodeId> {
        self.composed_preorder()
            .into_iter()
            .filter(|id| match self.attribute(*id, name) {
                Some(actual) => value.map_or(true, |want| want == actual),
                None => false,
            })
            .collect()
    }

    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        self.find_by_attribute("id", Some(id)).into_iter().next()
    }

    pub fn effective_pointer_events(&self, id: NodeId) -> PointerEvents {
        self.inherited(id, |style| style.pointer_events)
            .unwrap_or_default()
    }

    pub fn effective_visibility(&self, id: NodeId) -> Visibility {
        self.inherited(id, |style| style.visibility)
            .unwrap_or_default()
    }

    /// False when the node or any composed ancestor is `display: none`.
    pub fn is_rendered(&self, id: NodeId) -> bool {
        self.composed_path(id)
            .into_iter()
            .all(|node| self.nodes[node.0].style.display != Display::None)
    }

    fn inherited<T>(&self, id: NodeId, pick: impl Fn(&Style) -> Option<T>) -> Option<T> {
        self.composed_path(id)
            .into_iter()
            .find_map(|node| pick(&self.nodes[node.0].style))
    }

    fn stacking_z(&self, id: NodeId) -> i32 {
        self.composed_path(id)
            .into_iter()
            .find_map(|node| {
                let style = &self.nodes[node.0].style;
                match style.position {
                    Position::Static => None,
                    _ => style.z_index,
                }
            })
            .unwrap_or(0)
    }

    /// Topmost hit-testable element at `point`, including shadow-tree
    /// internals.
    pub fn deep_element_from_point(&self, point: PagePoint) -> Option<NodeId> {
        self.composed_preorder()
            .into_iter()
            .enumerate()
            .filter(|(_, id)| {
                self.is_element(*id)
                    && self.nodes[id.0].rect.contains(point)
                    && self.is_rendered(*id)
                    && self.effective_visibility(*id) == Visibility::Visible
                    && self.effective_pointer_events(*id) == PointerEvents::Auto
            })
            .max_by_key(|(order, id)| (self.stacking_z(*id), *order))
            .map(|(_, id)| id)
    }

    /// Document-level element-at-point: shadow internals are retargeted to
    /// their outermost host.
    pub fn element_from_point(&self, point: PagePoint) -> Option<NodeId> {
        self.deep_element_from_point(point)
            .map(|hit| self.retarget(hit))
    }

    pub fn retarget(&self, id: NodeId) -> NodeId {
        let mut result = id;
        let mut current = Some(id);
        while let Some(node) = current {
            if let NodeKind::ShadowRoot { host } = self.nodes[node.0].kind {
                result = host;
            }
            current = self.composed_parent(node);
        }
        result
    }

    /// Structural dump of the connected tree. Two equal outlines mean equal
    /// node order, attributes and visibility state.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.outline_into(self.body, 0, &mut out);
        out
    }

    fn outline_into(&self, id: NodeId, depth: usize, out: &mut String) {
        let node = &self.nodes[id.0];
        let indent = "  ".repeat(depth);
        match &node.kind {
            NodeKind::ShadowRoot { .. } => {
                let _ = writeln!(out, "{indent}#shadow-root");
            }
            NodeKind::Element { tag } => {
                let _ = write!(out, "{indent}<{tag}");
                for (name, value) in &node.attributes {
                    let _ = write!(out, " {name}=\"{value}\"");
                }
                let _ = writeln!(
                    out,
                    "> display={:?} visibility={:?} pointer-events={:?}",
                    node.style.display, node.style.visibility, node.style.pointer_events
                );
            }
        }
        if let Some(root) = node.shadow_root {
            self.outline_into(root, depth + 1, out);
        }
        for child in &node.children {
            self.outline_into(*child, depth + 1, out);
        }
    }

    pub fn from_snapshot(body: &ElementSnapshot) -> Self {
        let mut doc = Document::new(body.rect.width, body.rect.height);
        let root = doc.body;
        doc.nodes[root.0].rect = body.rect;
        doc.nodes[root.0].style = body.style.clone();
        doc.nodes[root.0].attributes = body.attributes.clone();
        doc.build_children(root, body);
        doc
    }

    fn build_children(&mut self, parent: NodeId, snapshot: &ElementSnapshot) {
        if let Some(shadow) = &snapshot.shadow {
            let root = self.attach_shadow(parent);
            for child in shadow {
                self.build_element(root, child);
            }
        }
        for child in &snapshot.children {
            self.build_element(parent, child);
        }
    }

    fn build_element(&mut self, parent: NodeId, snapshot: &ElementSnapshot) {
        let tag = if snapshot.tag.trim().is_empty() {
            "div"
        } else {
            snapshot.tag.trim()
        };
        let id = self.create_element(tag);
        {
            let node = &mut self.nodes[id.0];
            node.rect = snapshot.rect;
            node.style = snapshot.style.clone();
            node.attributes = snapshot.attributes.clone();
        }
        self.append_child(parent, id);
        self.build_children(id, snapshot);
    }
}

/// Serialized element tree, as exported from a live page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementSnapshot {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub rect: PageRect,
    pub style: Style,
    pub children: Vec<ElementSnapshot>,
    pub shadow: Option<Vec<ElementSnapshot>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageSnapshot {
    #[serde(default)]
    pub viewport: Viewport,
    pub body: ElementSnapshot,
}

impl PageSnapshot {
    pub fn from_json(raw: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let raw = fs::read_to_string(path).map_err(|source| SnapshotError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn into_document(self) -> (Document, Viewport) {
        (Document::from_snapshot(&self.body), self.viewport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new(1000.0, 2000.0);
        let body = doc.body();
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        let c = doc.create_element("div");
        doc.append_child(body, a);
        doc.append_child(body, b);
        doc.append_child(body, c);
        (doc, a, b, c)
    }

    #[test]
    fn detach_and_reinsert_restores_order() {
        let (mut doc, _a, b, _c) = page();
        let before = doc.outline();
        let placement = doc.detach(b).unwrap();
        assert_ne!(doc.outline(), before);
        doc.insert_before(placement.parent, b, placement.next_sibling);
        assert_eq!(doc.outline(), before);
    }

    #[test]
    fn detach_of_detached_node_is_none() {
        let (mut doc, a, _, _) = page();
        assert!(doc.detach(a).is_some());
        assert!(doc.detach(a).is_none());
        assert!(!doc.is_connected(a));
    }

    #[test]
    fn topmost_positioned_element_wins() {
        let (mut doc, a, b, _) = page();
        doc.set_rect(a, PageRect::new(0.0, 0.0, 100.0, 100.0));
        doc.set_rect(b, PageRect::new(0.0, 0.0, 100.0, 100.0));
        {
            let style = doc.style_mut(a);
            style.position = Position::Absolute;
            style.z_index = Some(5);
        }
        assert_eq!(doc.element_from_point(PagePoint { x: 10.0, y: 10.0 }), Some(a));
    }

    #[test]
    fn later_sibling_wins_without_z_index() {
        let (mut doc, a, b, _) = page();
        doc.set_rect(a, PageRect::new(0.0, 0.0, 100.0, 100.0));
        doc.set_rect(b, PageRect::new(50.0, 50.0, 100.0, 100.0));
        assert_eq!(doc.element_from_point(PagePoint { x: 60.0, y: 60.0 }), Some(b));
        assert_eq!(doc.element_from_point(PagePoint { x: 10.0, y: 10.0 }), Some(a));
    }

    #[test]
    fn pointer_events_none_is_inherited_but_overridable() {
        let (mut doc, a, _, _) = page();
        let inner = doc.create_element("span");
        doc.append_child(a, inner);
        doc.style_mut(a).pointer_events = Some(PointerEvents::None);
        assert_eq!(doc.effective_pointer_events(inner), PointerEvents::None);
        doc.style_mut(inner).pointer_events = Some(PointerEvents::Auto);
        assert_eq!(doc.effective_pointer_events(inner), PointerEvents::Auto);
    }

    #[test]
    fn shadow_hits_retarget_to_host() {
        let (mut doc, a, _, _) = page();
        let root = doc.attach_shadow(a);
        let button = doc.create_element("button");
        doc.append_child(root, button);
        doc.set_rect(a, PageRect::new(0.0, 0.0, 200.0, 200.0));
        doc.set_rect(button, PageRect::new(10.0, 10.0, 50.0, 20.0));

        let point = PagePoint { x: 20.0, y: 15.0 };
        assert_eq!(doc.deep_element_from_point(point), Some(button));
        assert_eq!(doc.element_from_point(point), Some(a));
        assert_eq!(doc.composed_path(button), vec![button, root, a, doc.body()]);
        assert_eq!(doc.closest(button, "id"), None);
    }

    #[test]
    fn snapshot_builds_shadow_trees() {
        let raw = r#"{
            "viewport": {"width": 800, "height": 600, "device_pixel_ratio": 2},
            "body": {
                "tag": "body",
                "rect": {"x": 0, "y": 0, "width": 800, "height": 1600},
                "children": [
                    {"tag": "main", "attributes": {"id": "main"},
                     "rect": {"x": 0, "y": 0, "width": 800, "height": 400}},
                    {"tag": "div", "attributes": {"data-parity-ui": "host"},
                     "style": {"position": "fixed", "z-index": 2147483647},
                     "shadow": [{"tag": "button", "attributes": {"data-parity-ui": "floating-control"}}]}
                ]
            }
        }"#;
        let (doc, viewport) = PageSnapshot::from_json(raw).unwrap().into_document();
        assert_eq!(viewport.device_pixel_ratio, 2.0);
        let main = doc.find_by_id("main").unwrap();
        assert_eq!(doc.tag(main), Some("main"));
        let controls = doc.find_by_attribute("data-parity-ui", Some("floating-control"));
        assert_eq!(controls.len(), 1);
        assert!(doc.is_connected(controls[0]));
        assert_eq!(doc.style(doc.retarget(controls[0])).position, Position::Fixed);
    }
}
