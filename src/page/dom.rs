//! Arena-backed element tree standing in for the host page.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Default)]
pub struct Element {
    tag: String,
    attributes: BTreeMap<String, String>,
    dataset: BTreeMap<String, String>,
    style: BTreeMap<String, String>,
    value: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    events: Vec<String>,
}

impl Element {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn data(&self, key: &str) -> Option<&str> {
        self.dataset.get(key).map(String::as_str)
    }

    pub fn style(&self, property: &str) -> Option<&str> {
        self.style.get(property).map(String::as_str)
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Names of dispatched events, oldest first.
    pub fn events(&self) -> &[String] {
        &self.events
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
    }

    /// `input[type="text"]` or `input` without a type.
    pub fn is_text_input(&self) -> bool {
        self.is("input")
            && self
                .attribute("type")
                .map_or(true, |kind| kind.eq_ignore_ascii_case("text"))
    }
}

pub type SharedDocument = Arc<Mutex<Document>>;

/// Lock a shared document, recovering from a poisoned lock.
pub fn lock(doc: &SharedDocument) -> MutexGuard<'_, Document> {
    doc.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Document {
    nodes: Vec<Element>,
    body: NodeId,
    watchers: Vec<mpsc::UnboundedSender<NodeId>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty `html > body` document.
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            body: NodeId(0),
            watchers: Vec::new(),
        };
        let html = doc.create_element("html");
        let body = doc.create_element("body");
        doc.link(html, body);
        doc.body = body;
        doc
    }

    pub fn into_shared(self) -> SharedDocument {
        Arc::new(Mutex::new(self))
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Element {
            tag: tag.to_ascii_lowercase(),
            ..Element::default()
        });
        id
    }

    /// Attach `child` under `parent`. Subscribers hear about it only when
    /// `parent` is part of the document.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.link(parent, child);
        if self.is_connected(parent) {
            self.watchers.retain(|tx| tx.send(child).is_ok());
        }
    }

    /// Whether the node hangs off the document root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current == NodeId(0)
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        if let Some(previous) = self.nodes[child.0].parent.take() {
            self.nodes[previous.0].children.retain(|c| *c != child);
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Subscribe to insertions into the document. A subtree built while
    /// detached is reported once, by its root, when it gets attached.
    pub fn watch_insertions(&mut self) -> mpsc::UnboundedReceiver<NodeId> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.watchers.push(tx);
        rx
    }

    pub fn element(&self, id: NodeId) -> &Element {
        &self.nodes[id.0]
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        self.nodes[id.0]
            .attributes
            .insert(name.to_ascii_lowercase(), value.to_string());
    }

    pub fn set_data(&mut self, id: NodeId, key: &str, value: &str) {
        self.nodes[id.0]
            .dataset
            .insert(key.to_string(), value.to_string());
    }

    pub fn set_style(&mut self, id: NodeId, property: &str, value: &str) {
        self.nodes[id.0]
            .style
            .insert(property.to_string(), value.to_string());
    }

    pub fn set_value(&mut self, id: NodeId, value: &str) {
        self.nodes[id.0].value = value.to_string();
    }

    pub fn dispatch_event(&mut self, id: NodeId, name: &str) {
        self.nodes[id.0].events.push(name.to_string());
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Other children of this node's parent, in document order.
    pub fn siblings(&self, id: NodeId) -> Vec<NodeId> {
        match self.parent(id) {
            Some(parent) => self
                .children(parent)
                .iter()
                .copied()
                .filter(|c| *c != id)
                .collect(),
            None => Vec::new(),
        }
    }

    /// `root` and all its descendants in preorder.
    pub fn subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// First descendant of `root` (excluding `root`) matching `predicate`.
    pub fn find_descendant(
        &self,
        root: NodeId,
        predicate: impl Fn(&Element) -> bool,
    ) -> Option<NodeId> {
        self.subtree(root)
            .into_iter()
            .skip(1)
            .find(|id| predicate(self.element(*id)))
    }

    /// Nearest inclusive ancestor whose tag is one of `tags`.
    pub fn closest(&self, id: NodeId, tags: &[&str]) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if tags.iter().any(|tag| self.element(node).is(tag)) {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el(doc: &mut Document, parent: NodeId, tag: &str) -> NodeId {
        let id = doc.create_element(tag);
        doc.append_child(parent, id);
        id
    }

    #[test]
    fn subtree_is_preorder_and_includes_root() {
        let mut doc = Document::new();
        let body = doc.body();
        let div = el(&mut doc, body, "div");
        let a = el(&mut doc, div, "span");
        let b = el(&mut doc, a, "img");
        let c = el(&mut doc, div, "input");

        assert_eq!(doc.subtree(div), vec![div, a, b, c]);
        assert_eq!(
            doc.find_descendant(div, |e| e.is("input")),
            Some(c)
        );
        assert_eq!(doc.find_descendant(b, |e| e.is("img")), None);
    }

    #[test]
    fn closest_walks_up_including_self() {
        let mut doc = Document::new();
        let body = doc.body();
        let form = el(&mut doc, body, "form");
        let td = el(&mut doc, form, "td");
        let img = el(&mut doc, td, "img");

        assert_eq!(doc.closest(img, &["div", "tr", "p", "form"]), Some(form));
        assert_eq!(doc.closest(form, &["form"]), Some(form));
        assert_eq!(doc.closest(img, &["table"]), None);
    }

    #[test]
    fn text_input_matching() {
        let mut doc = Document::new();
        let untyped = doc.create_element("input");
        let text = doc.create_element("INPUT");
        doc.set_attribute(text, "type", "Text");
        let hidden = doc.create_element("input");
        doc.set_attribute(hidden, "type", "hidden");

        assert!(doc.element(untyped).is_text_input());
        assert!(doc.element(text).is_text_input());
        assert!(!doc.element(hidden).is_text_input());
    }

    #[test]
    fn insertions_are_reported_to_watchers() {
        let mut doc = Document::new();
        let mut rx = doc.watch_insertions();
        let body = doc.body();
        let div = el(&mut doc, body, "div");
        let img = el(&mut doc, div, "img");

        assert_eq!(rx.try_recv().unwrap(), div);
        assert_eq!(rx.try_recv().unwrap(), img);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn detached_subtrees_are_reported_by_their_root() {
        let mut doc = Document::new();
        let mut rx = doc.watch_insertions();
        let div = doc.create_element("div");
        el(&mut doc, div, "img");
        assert!(rx.try_recv().is_err());

        let body = doc.body();
        doc.append_child(body, div);
        assert_eq!(rx.try_recv().unwrap(), div);
        assert!(rx.try_recv().is_err());
        assert!(doc.is_connected(div));
    }

    #[test]
    fn reparenting_moves_the_node() {
        let mut doc = Document::new();
        let body = doc.body();
        let first = el(&mut doc, body, "div");
        let second = el(&mut doc, body, "div");
        let img = el(&mut doc, first, "img");

        doc.append_child(second, img);

        assert!(doc.children(first).is_empty());
        assert_eq!(doc.parent(img), Some(second));
        assert_eq!(doc.siblings(first), vec![second]);
    }
}
