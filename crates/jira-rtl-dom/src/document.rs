use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::error::{DomError, Result};
use crate::event::{EventListener, EventType, ListenerEntry, ListenerId};
use crate::mutation::{MutationObserver, MutationObserverInit, MutationRecord, ObserverId, Registration};
use crate::node::{ElementData, NodeData, NodeId, NodeKind};
use crate::selector::Selector;
use crate::servo_dom::DomElement;

/// Shared handle to a live document.
///
/// The document is single-threaded state; every component that needs to read
/// or mutate it holds a clone of this handle and borrows it only for the
/// duration of one synchronous step.
pub type SharedDocument = Rc<RefCell<Document>>;

/// Arena-backed element/text tree with mutation observers and listeners.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<NodeData>,
    observers: Vec<Registration>,
    listeners: Vec<ListenerEntry>,
    next_observer: u64,
    next_listener: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData::new(NodeKind::Document)],
            observers: Vec::new(),
            listeners: Vec::new(),
            next_observer: 0,
            next_listener: 0,
        }
    }

    /// Parse a full HTML document.
    pub fn parse_html(html: &str) -> Self {
        crate::html::parse_document(html)
    }

    pub fn into_shared(self) -> SharedDocument {
        Rc::new(RefCell::new(self))
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The first `body` element, falling back to the document root.
    pub fn body(&self) -> NodeId {
        self.descendants(self.root())
            .into_iter()
            .find(|id| self.tag_name(*id) == Some("body"))
            .unwrap_or(self.root())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    fn node(&self, id: NodeId) -> Result<&NodeData> {
        self.nodes.get(id.0).ok_or(DomError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeData> {
        self.nodes.get_mut(id.0).ok_or(DomError::UnknownNode(id))
    }

    // ---- reads ----

    pub fn element_data(&self, id: NodeId) -> Option<&ElementData> {
        self.nodes.get(id.0).and_then(NodeData::as_element)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element_data(id).is_some()
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        self.text(id).is_some()
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element_data(id).map(ElementData::tag)
    }

    /// Character data of a text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes.get(id.0)?.kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element_data(id)?.attr(name)
    }

    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.attribute(id, name).is_some()
    }

    /// Current value of a form control.
    pub fn value(&self, id: NodeId) -> Option<&str> {
        self.element_data(id)?.value()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0)?.parent
    }

    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|p| self.is_element(*p))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
    }

    /// Ancestors of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), |p| self.parent(*p))
    }

    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        ancestor == node || self.ancestors(node).any(|a| a == ancestor)
    }

    /// Whether the node is attached to the document root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.contains(id) && self.is_inclusive_ancestor(self.root(), id)
    }

    /// Descendants of `id` in tree order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Concatenated character data of every descendant text node.
    pub fn text_content(&self, id: NodeId) -> Option<String> {
        let node = self.nodes.get(id.0)?;
        if let NodeKind::Text(text) = &node.kind {
            return Some(text.clone());
        }
        Some(
            self.descendants(id)
                .into_iter()
                .filter_map(|d| self.text(d))
                .collect(),
        )
    }

    // ---- selectors ----

    pub fn matches(&self, id: NodeId, selector: &Selector) -> bool {
        DomElement::new(self, id).is_some_and(|el| selector.matches_element(&el))
    }

    /// Matching descendant elements of `root` in tree order.
    pub fn query_selector_all(&self, root: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|id| self.matches(*id, selector))
            .collect()
    }

    pub fn query_selector(&self, root: NodeId, selector: &Selector) -> Option<NodeId> {
        self.descendants(root)
            .into_iter()
            .find(|id| self.matches(*id, selector))
    }

    /// Nearest inclusive ancestor element matching `selector`.
    pub fn closest(&self, id: NodeId, selector: &Selector) -> Option<NodeId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|a| self.matches(*a, selector))
    }

    // ---- creation ----

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_node(NodeKind::Element(ElementData::new(tag)))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeKind::Text(text.to_string()))
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData::new(kind));
        id
    }

    // ---- tree mutation ----

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.insert_before(parent, child, None)
    }

    /// Append several nodes under `parent`, reported as one child-list record.
    pub fn append_children(&mut self, parent: NodeId, children: &[NodeId]) -> Result<()> {
        for child in children {
            self.check_insert(parent, *child)?;
        }
        for child in children {
            self.detach_and_record(*child)?;
            self.node_mut(*child)?.parent = Some(parent);
            self.node_mut(parent)?.children.push(*child);
        }
        self.notify(MutationRecord::ChildList {
            target: parent,
            added: children.to_vec(),
            removed: Vec::new(),
        });
        Ok(())
    }

    /// Insert `child` before `reference`, or at the end when `reference` is
    /// `None` or not a child of `parent`.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<()> {
        self.check_insert(parent, child)?;
        self.detach_and_record(child)?;
        self.node_mut(child)?.parent = Some(parent);
        let siblings = &mut self.node_mut(parent)?.children;
        match reference.and_then(|r| siblings.iter().position(|c| *c == r)) {
            Some(pos) => siblings.insert(pos, child),
            None => siblings.push(child),
        }
        self.notify(MutationRecord::ChildList {
            target: parent,
            added: vec![child],
            removed: Vec::new(),
        });
        Ok(())
    }

    /// Detach `node` from its parent. Detached subtrees stay addressable.
    pub fn remove(&mut self, node: NodeId) -> Result<()> {
        self.node(node)?;
        self.detach_and_record(node)
    }

    pub fn remove_children(&mut self, parent: NodeId) -> Result<()> {
        let removed = std::mem::take(&mut self.node_mut(parent)?.children);
        if removed.is_empty() {
            return Ok(());
        }
        for child in &removed {
            self.node_mut(*child)?.parent = None;
        }
        self.notify(MutationRecord::ChildList {
            target: parent,
            added: Vec::new(),
            removed,
        });
        Ok(())
    }

    /// For text nodes this replaces the character data; for elements it
    /// replaces every child with one new text node.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) -> Result<()> {
        if self.is_text(id) {
            return self.set_data(id, text);
        }
        if !self.is_element(id) {
            return Err(DomError::NotAnElement(id));
        }
        let removed = std::mem::take(&mut self.node_mut(id)?.children);
        for child in &removed {
            self.node_mut(*child)?.parent = None;
        }
        let mut added = Vec::new();
        if !text.is_empty() {
            let text_node = self.create_text(text);
            self.node_mut(text_node)?.parent = Some(id);
            self.node_mut(id)?.children.push(text_node);
            added.push(text_node);
        }
        self.notify(MutationRecord::ChildList {
            target: id,
            added,
            removed,
        });
        Ok(())
    }

    /// Replace the character data of a text node.
    pub fn set_data(&mut self, id: NodeId, data: &str) -> Result<()> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Text(text) => {
                *text = data.to_string();
            }
            _ => return Err(DomError::NotText(id)),
        }
        self.notify(MutationRecord::CharacterData { target: id });
        Ok(())
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<()> {
        let el = self
            .node_mut(id)?
            .as_element_mut()
            .ok_or(DomError::NotAnElement(id))?;
        if el.set_attr(name, value).as_deref() == Some(value) {
            return Ok(());
        }
        self.notify(MutationRecord::Attributes {
            target: id,
            name: name.to_ascii_lowercase(),
        });
        Ok(())
    }

    /// Returns whether the attribute was present.
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<bool> {
        let el = self
            .node_mut(id)?
            .as_element_mut()
            .ok_or(DomError::NotAnElement(id))?;
        if el.remove_attr(name).is_none() {
            return Ok(false);
        }
        self.notify(MutationRecord::Attributes {
            target: id,
            name: name.to_ascii_lowercase(),
        });
        Ok(true)
    }

    /// Set the form value of an element. Like the `value` property this does
    /// not produce a mutation record.
    pub fn set_value(&mut self, id: NodeId, value: &str) -> Result<()> {
        let el = self
            .node_mut(id)?
            .as_element_mut()
            .ok_or(DomError::NotAnElement(id))?;
        el.value = Some(value.to_string());
        Ok(())
    }

    /// Parse `html` as a fragment and append its top-level nodes to `parent`
    /// as one child-list record. Returns the appended nodes.
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> Result<Vec<NodeId>> {
        let added = crate::html::import_fragment(self, html);
        self.append_children(parent, &added)?;
        Ok(added)
    }

    fn check_insert(&self, parent: NodeId, child: NodeId) -> Result<()> {
        let parent_node = self.node(parent)?;
        self.node(child)?;
        let parent_ok = matches!(parent_node.kind, NodeKind::Element(_) | NodeKind::Document);
        if !parent_ok || child == self.root() || self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        Ok(())
    }

    fn detach_and_record(&mut self, child: NodeId) -> Result<()> {
        let Some(old_parent) = self.node(child)?.parent else {
            return Ok(());
        };
        self.node_mut(old_parent)?.children.retain(|c| *c != child);
        self.node_mut(child)?.parent = None;
        self.notify(MutationRecord::ChildList {
            target: old_parent,
            added: Vec::new(),
            removed: vec![child],
        });
        Ok(())
    }

    /// Attach without producing a record; used while building detached or
    /// not-yet-observed trees.
    pub(crate) fn attach_silently(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.nodes.get_mut(child.0) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(parent.0) {
            node.children.push(child);
        }
    }

    pub(crate) fn element_data_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        self.nodes.get_mut(id.0).and_then(NodeData::as_element_mut)
    }

    // ---- observers ----

    pub fn observe(&mut self, target: NodeId, init: MutationObserverInit) -> MutationObserver {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        let (registration, observer) = Registration::new(id, target, init);
        self.observers.push(registration);
        trace!(observer = id.0, target = target.0, "mutation observer registered");
        observer
    }

    /// Returns whether the registration existed.
    pub fn disconnect(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|reg| reg.id != id);
        before != self.observers.len()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    fn notify(&mut self, record: MutationRecord) {
        if self.observers.is_empty() {
            return;
        }
        let target = record.target();
        let chain: Vec<NodeId> = std::iter::once(target).chain(self.ancestors(target)).collect();
        self.observers.retain(|reg| {
            let in_scope = if reg.init.subtree {
                chain.contains(&reg.root)
            } else {
                reg.root == target
            };
            !in_scope || reg.deliver(&record)
        });
    }

    // ---- listeners ----

    pub fn add_event_listener(
        &mut self,
        node: NodeId,
        kind: EventType,
        callback: EventListener,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push(ListenerEntry {
            id,
            node,
            kind,
            callback,
        });
        id
    }

    /// Returns whether the listener was registered.
    pub fn remove_event_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|entry| entry.id != id);
        before != self.listeners.len()
    }

    pub fn listener_count(&self, node: NodeId, kind: EventType) -> usize {
        self.listeners
            .iter()
            .filter(|e| e.node == node && e.kind == kind)
            .count()
    }

    pub(crate) fn listeners_for(&self, node: NodeId, kind: EventType) -> Vec<EventListener> {
        self.listeners
            .iter()
            .filter(|e| e.node == node && e.kind == kind)
            .map(|e| e.callback.clone())
            .collect()
    }
}
