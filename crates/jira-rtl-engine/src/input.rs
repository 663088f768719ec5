//! Bookkeeping for `input` listeners attached to form controls.

use std::collections::HashMap;

use jira_rtl_dom::{ListenerId, NodeId};

/// At most one listener per element.
#[derive(Debug, Default)]
pub struct InputListenerRegistry {
    listeners: HashMap<NodeId, ListenerId>,
}

impl InputListenerRegistry {
    pub fn contains(&self, element: NodeId) -> bool {
        self.listeners.contains_key(&element)
    }

    /// Record `listener` for `element`. Returns false, leaving the registry
    /// untouched, if the element already has one.
    pub fn insert(&mut self, element: NodeId, listener: ListenerId) -> bool {
        if self.contains(element) {
            return false;
        }
        self.listeners.insert(element, listener);
        true
    }

    pub fn get(&self, element: NodeId) -> Option<ListenerId> {
        self.listeners.get(&element).copied()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Empty the registry, handing back every listener for detaching.
    pub fn drain(&mut self) -> Vec<(NodeId, ListenerId)> {
        self.listeners.drain().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jira_rtl_dom::{Document, Event, EventType};
    use std::rc::Rc;

    #[test]
    fn one_listener_per_element() {
        let mut doc = Document::parse_html("<input><input>");
        let root = doc.root();
        let inputs: Vec<NodeId> = doc
            .descendants(root)
            .into_iter()
            .filter(|id| doc.tag_name(*id) == Some("input"))
            .collect();
        let first = doc.add_event_listener(inputs[0], EventType::Input, Rc::new(|_: &Event| {}));
        let second = doc.add_event_listener(inputs[0], EventType::Input, Rc::new(|_: &Event| {}));

        let mut registry = InputListenerRegistry::default();
        assert!(registry.insert(inputs[0], first));
        assert!(!registry.insert(inputs[0], second));
        assert_eq!(registry.get(inputs[0]), Some(first));
        assert!(!registry.contains(inputs[1]));

        let drained = registry.drain();
        assert_eq!(drained, vec![(inputs[0], first)]);
        assert!(registry.is_empty());
    }
}
