//! Browsing context: location, session history and `popstate`.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::debug;
use url::Url;

use crate::error::{DomError, Result};
use crate::event::ListenerId;
use crate::SharedDocument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMethod {
    PushState,
    ReplaceState,
}

/// Extra behavior attached to the history entry points. It runs after the
/// window has already updated its location and entries.
pub type HistoryHook = Rc<dyn Fn(HistoryMethod, &Url)>;

pub type PopStateListener = Rc<dyn Fn()>;

/// A window owning one document, its location and its session history.
pub struct Window {
    document: SharedDocument,
    entries: RefCell<Vec<Url>>,
    index: Cell<usize>,
    /// Current location; may diverge from the active entry when a page
    /// rewrites the URL without going through history.
    location: RefCell<Url>,
    hook: RefCell<Option<HistoryHook>>,
    history_patchable: bool,
    popstate: RefCell<Vec<(ListenerId, PopStateListener)>>,
    next_listener: Cell<u64>,
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Window")
            .field("location", &self.location.borrow().as_str())
            .field("entries", &self.entries.borrow().len())
            .field("index", &self.index.get())
            .field("history_patchable", &self.history_patchable)
            .finish_non_exhaustive()
    }
}

impl Window {
    pub fn new(document: SharedDocument, url: &str) -> Result<Self> {
        Self::build(document, url, true)
    }

    /// A window whose history entry points cannot be replaced.
    pub fn with_frozen_history(document: SharedDocument, url: &str) -> Result<Self> {
        Self::build(document, url, false)
    }

    fn build(document: SharedDocument, url: &str, history_patchable: bool) -> Result<Self> {
        let initial = Url::parse(url).map_err(|source| DomError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        Ok(Self {
            document,
            entries: RefCell::new(vec![initial.clone()]),
            index: Cell::new(0),
            location: RefCell::new(initial),
            hook: RefCell::new(None),
            history_patchable,
            popstate: RefCell::new(Vec::new()),
            next_listener: Cell::new(0),
        })
    }

    pub fn document(&self) -> SharedDocument {
        self.document.clone()
    }

    pub fn href(&self) -> String {
        self.location.borrow().as_str().to_string()
    }

    pub fn location(&self) -> Url {
        self.location.borrow().clone()
    }

    pub fn history_len(&self) -> usize {
        self.entries.borrow().len()
    }

    fn resolve(&self, url: &str) -> Result<Url> {
        self.location
            .borrow()
            .join(url)
            .map_err(|source| DomError::InvalidUrl {
                url: url.to_string(),
                source,
            })
    }

    /// Add a history entry for `url` (resolved against the current location),
    /// dropping any forward entries.
    pub fn push_state(&self, url: &str) -> Result<()> {
        let next = self.resolve(url)?;
        {
            let mut entries = self.entries.borrow_mut();
            let keep = self.index.get() + 1;
            entries.truncate(keep);
            entries.push(next.clone());
            self.index.set(entries.len() - 1);
        }
        *self.location.borrow_mut() = next.clone();
        self.run_hook(HistoryMethod::PushState, &next);
        Ok(())
    }

    pub fn replace_state(&self, url: &str) -> Result<()> {
        let next = self.resolve(url)?;
        if let Some(entry) = self.entries.borrow_mut().get_mut(self.index.get()) {
            *entry = next.clone();
        }
        *self.location.borrow_mut() = next.clone();
        self.run_hook(HistoryMethod::ReplaceState, &next);
        Ok(())
    }

    /// Traverse one entry back; fires `popstate`. Returns false at the start
    /// of history.
    pub fn back(&self) -> bool {
        self.traverse(-1)
    }

    pub fn forward(&self) -> bool {
        self.traverse(1)
    }

    fn traverse(&self, delta: isize) -> bool {
        let Some(target) = self.index.get().checked_add_signed(delta) else {
            return false;
        };
        let Some(url) = self.entries.borrow().get(target).cloned() else {
            return false;
        };
        self.index.set(target);
        *self.location.borrow_mut() = url;
        self.fire_popstate();
        true
    }

    /// Change the location without touching history or firing any event,
    /// like a router that rewrites the address through other means.
    pub fn set_location_silently(&self, url: &str) -> Result<()> {
        let next = self.resolve(url)?;
        *self.location.borrow_mut() = next;
        Ok(())
    }

    pub fn is_history_patchable(&self) -> bool {
        self.history_patchable
    }

    /// Swap the hook attached to `pushState`/`replaceState`, returning the
    /// previous one so it can be restored later.
    pub fn swap_history_hook(&self, hook: Option<HistoryHook>) -> Result<Option<HistoryHook>> {
        if !self.history_patchable {
            return Err(DomError::HistoryFrozen);
        }
        Ok(std::mem::replace(&mut *self.hook.borrow_mut(), hook))
    }

    pub fn has_history_hook(&self) -> bool {
        self.hook.borrow().is_some()
    }

    fn run_hook(&self, method: HistoryMethod, url: &Url) {
        let hook = self.hook.borrow().clone();
        if let Some(hook) = hook {
            hook(method, url);
        }
    }

    pub fn add_popstate_listener(&self, listener: PopStateListener) -> ListenerId {
        let id = ListenerId(self.next_listener.get());
        self.next_listener.set(id.0 + 1);
        self.popstate.borrow_mut().push((id, listener));
        id
    }

    pub fn remove_popstate_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.popstate.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        before != listeners.len()
    }

    pub fn popstate_listener_count(&self) -> usize {
        self.popstate.borrow().len()
    }

    fn fire_popstate(&self) {
        let listeners: Vec<PopStateListener> =
            self.popstate.borrow().iter().map(|(_, l)| l.clone()).collect();
        debug!(url = %self.href(), listeners = listeners.len(), "popstate");
        for listener in listeners {
            listener();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Document;

    fn window() -> Window {
        Window::new(
            Document::new().into_shared(),
            "https://example.atlassian.net/jira/your-work",
        )
        .unwrap()
    }

    #[test]
    fn push_state_resolves_relative_urls() {
        let w = window();
        w.push_state("/browse/ABC-1").unwrap();
        assert_eq!(w.href(), "https://example.atlassian.net/browse/ABC-1");
        assert_eq!(w.history_len(), 2);
    }

    #[test]
    fn back_fires_popstate_and_restores_location() {
        let w = window();
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        w.add_popstate_listener(Rc::new(move || counter.set(counter.get() + 1)));
        w.push_state("/a").unwrap();
        assert!(w.back());
        assert_eq!(fired.get(), 1);
        assert_eq!(w.href(), "https://example.atlassian.net/jira/your-work");
        assert!(!w.back());
        assert!(w.forward());
        assert_eq!(w.href(), "https://example.atlassian.net/a");
    }

    #[test]
    fn hook_runs_after_location_update() {
        let w = Rc::new(window());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let weak = Rc::downgrade(&w);
        let previous = w
            .swap_history_hook(Some(Rc::new(move |method: HistoryMethod, url: &Url| {
                let href = weak.upgrade().map(|w| w.href());
                sink.borrow_mut().push((method, url.to_string(), href));
            })))
            .unwrap();
        assert!(previous.is_none());
        w.replace_state("/b").unwrap();
        let seen = seen.borrow();
        assert_eq!(seen[0].0, HistoryMethod::ReplaceState);
        assert_eq!(seen[0].2.as_deref(), Some(seen[0].1.as_str()));
    }

    #[test]
    fn frozen_history_rejects_hooks() {
        let w = Window::with_frozen_history(Document::new().into_shared(), "https://x.test/")
            .unwrap();
        assert!(matches!(
            w.swap_history_hook(None),
            Err(DomError::HistoryFrozen)
        ));
    }
}
