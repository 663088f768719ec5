//! Client-side navigation detection.
//!
//! Single-page apps change the URL through the history API, and sometimes by
//! means that leave no trace but a re-rendered tree. The watcher listens to
//! all three signals (history entry points, `popstate`, structural
//! mutations) and reports the settled URL once a burst of changes has gone
//! quiet for the debounce interval.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};
use std::time::Duration;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use jira_rtl_config::NavigationConfig;
use jira_rtl_dom::{
    DomError, HistoryHook, HistoryMethod, ListenerId, MutationObserver, MutationObserverInit,
    ObserverId, PopStateListener, SharedDocument, Window,
};
use tokio::task::{self, JoinHandle};
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::NavigationError;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Browsing context the watcher attaches to.
pub trait NavigationSource {
    fn current_url(&self) -> String;

    fn document(&self) -> SharedDocument;

    /// Replace the hook run by `pushState`/`replaceState`, returning the
    /// previous one.
    fn swap_history_hook(
        &self,
        hook: Option<HistoryHook>,
    ) -> Result<Option<HistoryHook>, NavigationError>;

    fn add_popstate_listener(&self, listener: PopStateListener) -> ListenerId;

    fn remove_popstate_listener(&self, id: ListenerId) -> bool;
}

impl NavigationSource for Window {
    fn current_url(&self) -> String {
        self.href()
    }

    fn document(&self) -> SharedDocument {
        Window::document(self)
    }

    fn swap_history_hook(
        &self,
        hook: Option<HistoryHook>,
    ) -> Result<Option<HistoryHook>, NavigationError> {
        Window::swap_history_hook(self, hook).map_err(|err| match err {
            DomError::HistoryFrozen => NavigationError::HistoryUnsupported,
            other => NavigationError::Source(other),
        })
    }

    fn add_popstate_listener(&self, listener: PopStateListener) -> ListenerId {
        Window::add_popstate_listener(self, listener)
    }

    fn remove_popstate_listener(&self, id: ListenerId) -> bool {
        Window::remove_popstate_listener(self, id)
    }
}

/// Where the debounce timer stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebouncePhase {
    /// Nothing queued since start.
    Idle,
    /// A change was seen; the timer is running.
    Pending,
    /// The callback ran for the last burst.
    Fired,
}

pub type NavigationCallback = Rc<dyn Fn(String) -> LocalBoxFuture<'static, ()>>;

/// Debounced URL change detector. Dropping the watcher stops it.
pub struct NavigationWatcher<S: NavigationSource + 'static> {
    inner: Rc<WatcherInner<S>>,
}

struct FallbackObserver {
    id: ObserverId,
    pump: JoinHandle<()>,
}

struct WatcherInner<S: NavigationSource + 'static> {
    source: Rc<S>,
    callback: NavigationCallback,
    debounce: Duration,
    started: Cell<bool>,
    phase: Cell<DebouncePhase>,
    last_url: RefCell<String>,
    timer: RefCell<Option<JoinHandle<()>>>,
    /// Hook that was installed before ours, called first from ours. `None`
    /// while our hook is not installed.
    previous_hook: Rc<RefCell<Option<Option<HistoryHook>>>>,
    popstate: Cell<Option<ListenerId>>,
    fallback: RefCell<Option<FallbackObserver>>,
}

impl<S: NavigationSource + 'static> fmt::Debug for NavigationWatcher<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationWatcher")
            .field("started", &self.inner.started.get())
            .field("phase", &self.inner.phase.get())
            .field("debounce", &self.inner.debounce)
            .field("last_url", &*self.inner.last_url.borrow())
            .finish_non_exhaustive()
    }
}

impl<S: NavigationSource + 'static> NavigationWatcher<S> {
    pub fn new<F, Fut>(source: Rc<S>, debounce: Duration, callback: F) -> Self
    where
        F: Fn(String) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        let callback: NavigationCallback = Rc::new(move |url| callback(url).boxed_local());
        let last_url = source.current_url();
        Self {
            inner: Rc::new(WatcherInner {
                source,
                callback,
                debounce,
                started: Cell::new(false),
                phase: Cell::new(DebouncePhase::Idle),
                last_url: RefCell::new(last_url),
                timer: RefCell::new(None),
                previous_hook: Rc::new(RefCell::new(None)),
                popstate: Cell::new(None),
                fallback: RefCell::new(None),
            }),
        }
    }

    pub fn from_config<F, Fut>(source: Rc<S>, config: &NavigationConfig, callback: F) -> Self
    where
        F: Fn(String) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        Self::new(source, Duration::from_millis(config.debounce_ms), callback)
    }

    /// Attach to the source. Does nothing when already started.
    pub fn start(&self) {
        let inner = &self.inner;
        if inner.started.replace(true) {
            return;
        }
        *inner.last_url.borrow_mut() = inner.source.current_url();
        inner.phase.set(DebouncePhase::Idle);

        inner.install_history_hook();

        let weak = Rc::downgrade(inner);
        let popstate = inner.source.add_popstate_listener(Rc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.queue_from_history();
            }
        }));
        inner.popstate.set(Some(popstate));

        let observer = {
            let document = inner.source.document();
            let mut doc = document.borrow_mut();
            let root = doc.root();
            doc.observe(root, MutationObserverInit::structure())
        };
        let id = observer.id();
        let pump = task::spawn_local(pump_structure(Rc::downgrade(inner), observer));
        *inner.fallback.borrow_mut() = Some(FallbackObserver { id, pump });

        debug!(url = %inner.last_url.borrow(), "navigation watcher started");
    }

    /// Detach from the source and drop any pending notification. Does
    /// nothing when not started.
    pub fn stop(&self) {
        self.inner.stop();
    }

    pub fn is_started(&self) -> bool {
        self.inner.started.get()
    }

    pub fn phase(&self) -> DebouncePhase {
        self.inner.phase.get()
    }

    pub fn last_url(&self) -> String {
        self.inner.last_url.borrow().clone()
    }

    pub fn debounce(&self) -> Duration {
        self.inner.debounce
    }
}

impl<S: NavigationSource + 'static> Drop for NavigationWatcher<S> {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

async fn pump_structure<S: NavigationSource + 'static>(
    watcher: Weak<WatcherInner<S>>,
    mut observer: MutationObserver,
) {
    while observer.next_batch().await.is_some() {
        while observer.try_next_batch().is_some() {}
        let Some(inner) = watcher.upgrade() else {
            break;
        };
        inner.queue_from_mutation();
    }
}

impl<S: NavigationSource + 'static> WatcherInner<S> {
    fn install_history_hook(self: &Rc<Self>) {
        let weak = Rc::downgrade(self);
        let previous = self.previous_hook.clone();
        let hook: HistoryHook = Rc::new(move |method: HistoryMethod, url: &Url| {
            let chained = previous.borrow().clone().flatten();
            if let Some(chained) = chained {
                chained(method, url);
            }
            if let Some(inner) = weak.upgrade() {
                trace!(?method, %url, "history entry point called");
                inner.queue_from_history();
            }
        });
        match self.source.swap_history_hook(Some(hook)) {
            Ok(previous) => {
                *self.previous_hook.borrow_mut() = Some(previous);
            }
            Err(error) => {
                warn!(%error, "history hook unavailable; relying on popstate and mutations");
            }
        }
    }

    fn restore_history_hook(&self) {
        let Some(previous) = self.previous_hook.borrow_mut().take() else {
            return;
        };
        if let Err(error) = self.source.swap_history_hook(previous) {
            warn!(%error, "failed to restore history hook");
        }
    }

    fn queue_from_history(self: &Rc<Self>) {
        if !self.started.get() {
            return;
        }
        self.queue();
    }

    fn queue_from_mutation(self: &Rc<Self>) {
        if !self.started.get() {
            return;
        }
        if self.source.current_url() == *self.last_url.borrow() {
            return;
        }
        self.queue();
    }

    /// Mark a notification pending and restart the one debounce timer.
    fn queue(self: &Rc<Self>) {
        self.phase.set(DebouncePhase::Pending);
        let weak = Rc::downgrade(self);
        let debounce = self.debounce;
        let timer = task::spawn_local(async move {
            tokio::time::sleep(debounce).await;
            if let Some(inner) = weak.upgrade() {
                inner.fire();
            }
        });
        if let Some(previous) = self.timer.borrow_mut().replace(timer) {
            previous.abort();
        }
    }

    fn fire(&self) {
        self.timer.borrow_mut().take();
        if !self.started.get() || self.phase.get() != DebouncePhase::Pending {
            return;
        }
        self.phase.set(DebouncePhase::Fired);
        let url = self.source.current_url();
        *self.last_url.borrow_mut() = url.clone();
        debug!(%url, "navigation detected");
        task::spawn_local((self.callback)(url));
    }

    fn stop(&self) {
        if !self.started.replace(false) {
            return;
        }
        self.restore_history_hook();
        if let Some(id) = self.popstate.take() {
            self.source.remove_popstate_listener(id);
        }
        if let Some(fallback) = self.fallback.borrow_mut().take() {
            fallback.pump.abort();
            if let Ok(mut doc) = self.source.document().try_borrow_mut() {
                doc.disconnect(fallback.id);
            }
        }
        if let Some(timer) = self.timer.borrow_mut().take() {
            timer.abort();
        }
        self.phase.set(DebouncePhase::Idle);
        debug!("navigation watcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jira_rtl_dom::Document;
    use tokio::task::LocalSet;

    fn window() -> Rc<Window> {
        Rc::new(
            Window::new(
                Document::parse_html("<body><main></main></body>").into_shared(),
                "https://acme.atlassian.net/jira/your-work",
            )
            .unwrap(),
        )
    }

    fn recording_watcher(
        source: Rc<Window>,
    ) -> (NavigationWatcher<Window>, Rc<RefCell<Vec<String>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let watcher = NavigationWatcher::new(source, DEFAULT_DEBOUNCE, move |url| {
            let sink = sink.clone();
            async move { sink.borrow_mut().push(url) }
        });
        (watcher, seen)
    }

    async fn wait(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn timer_resets_on_every_trigger() {
        LocalSet::new()
            .run_until(async {
                let w = window();
                let (watcher, seen) = recording_watcher(w.clone());
                watcher.start();

                w.push_state("/a").unwrap();
                wait(150).await;
                w.push_state("/b").unwrap();
                wait(150).await;
                assert_eq!(watcher.phase(), DebouncePhase::Pending);
                assert!(seen.borrow().is_empty());

                wait(100).await;
                assert_eq!(watcher.phase(), DebouncePhase::Fired);
                assert_eq!(*seen.borrow(), vec!["https://acme.atlassian.net/b".to_string()]);
                assert_eq!(watcher.last_url(), "https://acme.atlassian.net/b");
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn start_and_stop_are_idempotent_and_restore_hook() {
        LocalSet::new()
            .run_until(async {
                let w = window();
                let chained = Rc::new(Cell::new(0));
                let counter = chained.clone();
                w.swap_history_hook(Some(Rc::new(move |_: HistoryMethod, _: &Url| {
                    counter.set(counter.get() + 1)
                })))
                .unwrap();

                let (watcher, seen) = recording_watcher(w.clone());
                watcher.start();
                watcher.start();
                assert_eq!(w.popstate_listener_count(), 1);

                w.replace_state("/x").unwrap();
                assert_eq!(chained.get(), 1);

                watcher.stop();
                watcher.stop();
                assert!(!watcher.is_started());
                assert_eq!(w.popstate_listener_count(), 0);
                assert_eq!(watcher.phase(), DebouncePhase::Idle);

                // The pre-existing hook is back in place and ours is gone.
                w.push_state("/y").unwrap();
                assert_eq!(chained.get(), 2);
                wait(500).await;
                assert!(seen.borrow().is_empty());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn popstate_triggers_callback() {
        LocalSet::new()
            .run_until(async {
                let w = window();
                w.push_state("/first").unwrap();
                let (watcher, seen) = recording_watcher(w.clone());
                watcher.start();
                assert!(w.back());
                wait(250).await;
                assert_eq!(
                    *seen.borrow(),
                    vec!["https://acme.atlassian.net/jira/your-work".to_string()]
                );
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn frozen_history_falls_back_to_mutations() {
        LocalSet::new()
            .run_until(async {
                let w = Rc::new(
                    Window::with_frozen_history(
                        Document::parse_html("<main></main>").into_shared(),
                        "https://acme.atlassian.net/a",
                    )
                    .unwrap(),
                );
                let (watcher, seen) = recording_watcher(w.clone());
                watcher.start();
                assert!(watcher.is_started());

                let doc = w.document();
                let body = doc.borrow().body();
                // Same URL: the re-render alone is not a navigation.
                doc.borrow_mut().append_html(body, "<p>one</p>").unwrap();
                wait(250).await;
                assert!(seen.borrow().is_empty());
                assert_eq!(watcher.phase(), DebouncePhase::Idle);

                w.set_location_silently("/b").unwrap();
                doc.borrow_mut().append_html(body, "<p>two</p>").unwrap();
                wait(250).await;
                assert_eq!(*seen.borrow(), vec!["https://acme.atlassian.net/b".to_string()]);

                // URL unchanged since the last report.
                doc.borrow_mut().append_html(body, "<p>three</p>").unwrap();
                wait(250).await;
                assert_eq!(seen.borrow().len(), 1);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_watcher_detaches_it() {
        LocalSet::new()
            .run_until(async {
                let w = window();
                let (watcher, _seen) = recording_watcher(w.clone());
                watcher.start();
                assert!(w.has_history_hook());
                drop(watcher);
                assert!(!w.has_history_hook());
                assert_eq!(w.popstate_listener_count(), 0);
                assert_eq!(w.document().borrow().observer_count(), 0);
            })
            .await;
    }
}
