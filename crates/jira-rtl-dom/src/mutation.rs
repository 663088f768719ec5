//! Mutation observation for live documents.
//!
//! Observers are registered on a node with a [`MutationObserverInit`]. Every
//! tree mutation that falls inside an observer's scope is delivered to it as
//! a batch of [`MutationRecord`]s over an unbounded channel, so mutating the
//! document never re-enters observer code. Consumers decide on which task
//! turn they drain their receiver.

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::NodeId;

/// Which mutation kinds an observer wants to see.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationObserverInit {
    pub child_list: bool,
    pub character_data: bool,
    pub attributes: bool,
    pub subtree: bool,
}

impl MutationObserverInit {
    /// Child-list and character-data changes across the whole subtree.
    pub fn content() -> Self {
        Self {
            child_list: true,
            character_data: true,
            attributes: false,
            subtree: true,
        }
    }

    /// Child-list changes across the whole subtree.
    pub fn structure() -> Self {
        Self {
            child_list: true,
            character_data: false,
            attributes: false,
            subtree: true,
        }
    }

    fn accepts(&self, record: &MutationRecord) -> bool {
        match record {
            MutationRecord::ChildList { .. } => self.child_list,
            MutationRecord::CharacterData { .. } => self.character_data,
            MutationRecord::Attributes { .. } => self.attributes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    ChildList {
        target: NodeId,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    CharacterData {
        target: NodeId,
    },
    Attributes {
        target: NodeId,
        name: String,
    },
}

impl MutationRecord {
    pub fn target(&self) -> NodeId {
        match self {
            MutationRecord::ChildList { target, .. }
            | MutationRecord::CharacterData { target }
            | MutationRecord::Attributes { target, .. } => *target,
        }
    }
}

/// Identifies one observer registration on a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub(crate) u64);

/// Receiving side of an observer registration.
///
/// The channel closes once the registration is disconnected, after any
/// batches already queued have been drained.
#[derive(Debug)]
pub struct MutationObserver {
    id: ObserverId,
    receiver: UnboundedReceiver<Vec<MutationRecord>>,
}

impl MutationObserver {
    pub fn id(&self) -> ObserverId {
        self.id
    }

    pub async fn next_batch(&mut self) -> Option<Vec<MutationRecord>> {
        self.receiver.recv().await
    }

    pub fn try_next_batch(&mut self) -> Option<Vec<MutationRecord>> {
        self.receiver.try_recv().ok()
    }
}

#[derive(Debug)]
pub(crate) struct Registration {
    pub(crate) id: ObserverId,
    pub(crate) root: NodeId,
    pub(crate) init: MutationObserverInit,
    sender: UnboundedSender<Vec<MutationRecord>>,
}

impl Registration {
    pub(crate) fn new(
        id: ObserverId,
        root: NodeId,
        init: MutationObserverInit,
    ) -> (Self, MutationObserver) {
        let (sender, receiver) = unbounded_channel();
        (
            Self {
                id,
                root,
                init,
                sender,
            },
            MutationObserver { id, receiver },
        )
    }

    /// Returns false once the receiving side has been dropped.
    pub(crate) fn deliver(&self, record: &MutationRecord) -> bool {
        if !self.init.accepts(record) {
            return !self.sender.is_closed();
        }
        self.sender.send(vec![record.clone()]).is_ok()
    }
}
