//! Mutation-driven direction maintenance.
//!
//! The engine owns one mutation subscription on the document. Every batch of
//! records is handled on a later task turn: inserted elements are matched
//! against the rule set, text changes re-evaluate the enclosing editor.
//! Full scans are queued the same way.
//!
//! All work runs as tokio local tasks, so the engine has to be driven from
//! inside a [`tokio::task::LocalSet`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use jira_rtl_dom::{
    Document, Event, EventType, MutationObserver, MutationObserverInit, MutationRecord, NodeId,
    ObserverId, SharedDocument,
};
use tokio::task::{self, JoinHandle};
use tracing::{debug, trace};

use crate::direction::{DirectionChange, Marker, sync_direction};
use crate::input::InputListenerRegistry;
use crate::rules::{ElementKind, Rule, RuleSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Running,
}

/// Handle to the engine. Clones share one engine.
#[derive(Clone)]
pub struct ObservationEngine {
    inner: Rc<EngineInner>,
}

struct Subscription {
    id: ObserverId,
    pump: JoinHandle<()>,
}

struct EngineInner {
    this: Weak<EngineInner>,
    document: SharedDocument,
    rules: RuleSet,
    marker: Marker,
    state: Cell<EngineState>,
    /// Bumped on every cleanup; deferred work from an older epoch is dropped.
    epoch: Cell<u64>,
    subscription: RefCell<Option<Subscription>>,
    inputs: RefCell<InputListenerRegistry>,
    pending_scans: RefCell<Vec<JoinHandle<()>>>,
}

impl fmt::Debug for ObservationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservationEngine")
            .field("state", &self.inner.state.get())
            .field("epoch", &self.inner.epoch.get())
            .field("observer", &self.observer_id())
            .field("input_listeners", &self.input_listener_count())
            .field("marker", &self.inner.marker)
            .finish_non_exhaustive()
    }
}

impl ObservationEngine {
    pub fn new(document: SharedDocument, rules: RuleSet, marker: Marker) -> Self {
        let inner = Rc::new_cyclic(|this| EngineInner {
            this: this.clone(),
            document,
            rules,
            marker,
            state: Cell::new(EngineState::Stopped),
            epoch: Cell::new(0),
            subscription: RefCell::new(None),
            inputs: RefCell::new(InputListenerRegistry::default()),
            pending_scans: RefCell::new(Vec::new()),
        });
        Self { inner }
    }

    /// Subscribe to document mutations and queue a full scan. Does nothing
    /// when already running.
    pub fn initialize(&self) {
        let inner = &self.inner;
        if inner.state.get() == EngineState::Running {
            trace!("observation engine already running");
            return;
        }
        inner.state.set(EngineState::Running);

        let observer = {
            let mut doc = inner.document.borrow_mut();
            let root = doc.root();
            doc.observe(root, MutationObserverInit::content())
        };
        let id = observer.id();
        let pump = task::spawn_local(pump_mutations(
            Rc::downgrade(inner),
            observer,
            inner.epoch.get(),
        ));
        *inner.subscription.borrow_mut() = Some(Subscription { id, pump });
        debug!(observer = ?id, "observation engine initialized");

        self.run_scan();
    }

    /// Stop observing, detach input listeners, drop queued scans and remove
    /// every marker. Does nothing when already stopped.
    pub fn cleanup(&self) {
        let inner = &self.inner;
        if inner.state.get() == EngineState::Stopped {
            trace!("observation engine already stopped");
            return;
        }
        inner.state.set(EngineState::Stopped);
        inner.epoch.set(inner.epoch.get() + 1);

        for handle in inner.pending_scans.borrow_mut().drain(..) {
            handle.abort();
        }
        let subscription = inner.subscription.borrow_mut().take();

        let mut doc = inner.document.borrow_mut();
        if let Some(subscription) = subscription {
            subscription.pump.abort();
            doc.disconnect(subscription.id);
        }
        let listeners = inner.inputs.borrow_mut().drain();
        for (_, listener) in &listeners {
            doc.remove_event_listener(*listener);
        }
        let annotated = inner.marker.annotated(&doc);
        for element in &annotated {
            inner.marker.remove(&mut doc, *element);
        }
        debug!(
            listeners = listeners.len(),
            markers = annotated.len(),
            "observation engine cleaned up"
        );
    }

    /// Queue a pass over every element matching the rule set. Allowed in
    /// either state; a scan queued before a cleanup never runs.
    pub fn run_scan(&self) {
        let engine = Rc::downgrade(&self.inner);
        let epoch = self.inner.epoch.get();
        let handle = task::spawn_local(async move {
            task::yield_now().await;
            if let Some(inner) = engine.upgrade()
                && inner.epoch.get() == epoch
            {
                inner.scan_document();
            }
        });
        let mut pending = self.inner.pending_scans.borrow_mut();
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    pub fn state(&self) -> EngineState {
        self.inner.state.get()
    }

    pub fn is_running(&self) -> bool {
        self.state() == EngineState::Running
    }

    pub fn observer_id(&self) -> Option<ObserverId> {
        self.inner.subscription.borrow().as_ref().map(|s| s.id)
    }

    pub fn input_listener_count(&self) -> usize {
        self.inner.inputs.borrow().len()
    }

    pub fn has_input_listener(&self, element: NodeId) -> bool {
        self.inner.inputs.borrow().contains(element)
    }

    pub fn document(&self) -> SharedDocument {
        self.inner.document.clone()
    }

    pub fn rules(&self) -> &RuleSet {
        &self.inner.rules
    }

    pub fn marker(&self) -> &Marker {
        &self.inner.marker
    }
}

async fn pump_mutations(engine: Weak<EngineInner>, mut observer: MutationObserver, epoch: u64) {
    while let Some(mut batch) = observer.next_batch().await {
        // Let the task that mutated the tree finish its turn first.
        task::yield_now().await;
        while let Some(more) = observer.try_next_batch() {
            batch.extend(more);
        }
        let Some(inner) = engine.upgrade() else {
            break;
        };
        if inner.state.get() != EngineState::Running || inner.epoch.get() != epoch {
            break;
        }
        inner.handle_mutations(&batch);
    }
    trace!("mutation pump finished");
}

impl EngineInner {
    fn scan_document(&self) {
        let mut doc = self.document.borrow_mut();
        let root = doc.root();
        let matched = doc.query_selector_all(root, self.rules.combined_selector());
        for element in &matched {
            self.process_matching(&mut doc, *element);
        }
        debug!(matched = matched.len(), "full scan finished");
    }

    fn handle_mutations(&self, batch: &[MutationRecord]) {
        let mut doc = self.document.borrow_mut();
        trace!(records = batch.len(), "handling mutations");
        for record in batch {
            match record {
                MutationRecord::ChildList { added, .. } => {
                    for node in added {
                        if !doc.is_connected(*node) {
                            trace!(node = node.index(), "added node already detached");
                        } else if doc.is_element(*node) {
                            self.process_created(&mut doc, *node);
                        } else if doc.is_text(*node) {
                            self.process_text_mutation(&mut doc, *node);
                        }
                    }
                }
                MutationRecord::CharacterData { target } => {
                    if doc.is_connected(*target) {
                        self.process_text_mutation(&mut doc, *target);
                    }
                }
                MutationRecord::Attributes { .. } => {}
            }
        }
    }

    /// An inserted element: either it matches itself, or its matching
    /// descendants are processed.
    fn process_created(&self, doc: &mut Document, node: NodeId) {
        if self.rules.matches_any(doc, node) {
            self.process_matching(doc, node);
            return;
        }
        let matched = doc.query_selector_all(node, self.rules.combined_selector());
        for element in matched {
            self.process_matching(doc, element);
        }
    }

    /// Text inserted or edited under `node`. The nearest enclosing editor is
    /// re-evaluated; a plain-text ancestor is re-evaluated only when its
    /// target is currently marked, so a marker never outlives its text.
    fn process_text_mutation(&self, doc: &mut Document, node: NodeId) {
        let mut current = doc.parent_element(node);
        while let Some(element) = current {
            if self.rules.matches_any(doc, element) {
                let editor = self.rules.first_matching_rule_of_kind(
                    doc,
                    element,
                    ElementKind::ContentEditable,
                );
                if let Some(rule) = editor {
                    self.process_element(doc, element, rule);
                    return;
                }
                if let Some(rule) = self.rules.first_matching_rule(doc, element)
                    && rule.kind() == ElementKind::Text
                    && rule
                        .target()
                        .resolve(doc, element)
                        .is_some_and(|target| self.marker.is_applied(doc, target))
                {
                    self.process_element(doc, element, rule);
                    return;
                }
            }
            current = doc.parent_element(element);
        }
    }

    fn process_matching(&self, doc: &mut Document, element: NodeId) {
        if let Some(rule) = self.rules.first_matching_rule(doc, element) {
            self.process_element(doc, element, rule);
        }
    }

    fn process_element(&self, doc: &mut Document, element: NodeId, rule: &Rule) {
        match rule.kind() {
            ElementKind::Text | ElementKind::ContentEditable => {
                self.sync(doc, element, rule);
            }
            ElementKind::Input => {
                if self.inputs.borrow().contains(element) {
                    trace!(element = element.index(), "input listener already attached");
                    return;
                }
                let engine = self.this.clone();
                let handler_rule = rule.clone();
                let listener = doc.add_event_listener(
                    element,
                    EventType::Input,
                    Rc::new(move |event: &Event| {
                        if let Some(inner) = engine.upgrade() {
                            inner.on_input(event.target, &handler_rule);
                        }
                    }),
                );
                self.inputs.borrow_mut().insert(element, listener);
                trace!(element = element.index(), "input listener attached");
                self.sync(doc, element, rule);
            }
        }
    }

    fn on_input(&self, target: NodeId, rule: &Rule) {
        let Ok(mut doc) = self.document.try_borrow_mut() else {
            debug!(
                element = target.index(),
                "document busy; skipping input event"
            );
            return;
        };
        self.sync(&mut doc, target, rule);
    }

    fn sync(&self, doc: &mut Document, element: NodeId, rule: &Rule) -> DirectionChange {
        let (target, text) = rule.resolve(doc, element);
        if target.is_none() {
            trace!(element = element.index(), "no target resolved");
        }
        sync_direction(doc, &self.marker, target, text.as_deref())
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        for handle in self.pending_scans.get_mut().drain(..) {
            handle.abort();
        }
        if let Some(subscription) = self.subscription.get_mut().take() {
            subscription.pump.abort();
            if let Ok(mut doc) = self.document.try_borrow_mut() {
                doc.disconnect(subscription.id);
            }
        }
    }
}
