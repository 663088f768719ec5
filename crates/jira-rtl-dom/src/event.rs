//! Per-node event listeners.

use std::fmt;
use std::rc::Rc;

use crate::{NodeId, SharedDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Input,
    Change,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub kind: EventType,
    pub target: NodeId,
}

/// Listener callback. Listeners run with the document unborrowed, so they
/// are free to read and mutate it through the shared handle they captured.
pub type EventListener = Rc<dyn Fn(&Event)>;

/// Identity of one registered listener, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

pub(crate) struct ListenerEntry {
    pub(crate) id: ListenerId,
    pub(crate) node: NodeId,
    pub(crate) kind: EventType,
    pub(crate) callback: EventListener,
}

impl fmt::Debug for ListenerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerEntry")
            .field("id", &self.id)
            .field("node", &self.node)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Dispatch `kind` at `target`, invoking every listener registered on it in
/// registration order. Returns the number of listeners invoked.
pub fn dispatch_event(document: &SharedDocument, target: NodeId, kind: EventType) -> usize {
    let listeners = document.borrow().listeners_for(target, kind);
    let event = Event { kind, target };
    for listener in &listeners {
        listener(&event);
    }
    listeners.len()
}

/// Replace the value of a form control and fire `input` on it, the way a
/// user typing into the field would.
pub fn simulate_input(
    document: &SharedDocument,
    target: NodeId,
    value: &str,
) -> crate::Result<usize> {
    document.borrow_mut().set_value(target, value)?;
    Ok(dispatch_event(document, target, EventType::Input))
}
