//! Wiring between user settings, the observation engine and the navigation
//! watcher.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use jira_rtl_config::{ExtensionSettings, JiraRtlConfig, SettingChange, SettingsStore};
use tokio::task::{self, JoinHandle};
use tracing::{debug, info, warn};

use crate::direction::Marker;
use crate::error::LifecycleError;
use crate::navigation::{NavigationSource, NavigationWatcher};
use crate::observer::ObservationEngine;
use crate::rules::RuleSet;

pub const DEFAULT_POST_LOAD_SCAN_DELAY: Duration = Duration::from_millis(4000);

pub struct LifecycleController<S, N>
where
    S: SettingsStore + 'static,
    N: NavigationSource + 'static,
{
    engine: ObservationEngine,
    watcher: NavigationWatcher<N>,
    store: Rc<S>,
    current: Cell<ExtensionSettings>,
    post_load_delay: Duration,
}

impl<S, N> LifecycleController<S, N>
where
    S: SettingsStore + 'static,
    N: NavigationSource + 'static,
{
    pub fn new(
        engine: ObservationEngine,
        watcher: NavigationWatcher<N>,
        store: Rc<S>,
        post_load_delay: Duration,
    ) -> Self {
        Self {
            engine,
            watcher,
            store,
            current: Cell::new(ExtensionSettings::default()),
            post_load_delay,
        }
    }

    /// Build the engine and a watcher that rescans after every navigation.
    pub fn from_config(
        source: Rc<N>,
        store: Rc<S>,
        config: &JiraRtlConfig,
    ) -> Result<Self, LifecycleError> {
        let rules = RuleSet::from_config(&config.engine)?;
        let engine = ObservationEngine::new(
            source.document(),
            rules,
            Marker::from_config(&config.engine),
        );
        let scanner = engine.clone();
        let watcher = NavigationWatcher::from_config(source, &config.navigation, move |url| {
            let scanner = scanner.clone();
            async move {
                debug!(%url, "rescanning after navigation");
                scanner.run_scan();
            }
        });
        Ok(Self::new(
            engine,
            watcher,
            store,
            Duration::from_millis(config.lifecycle.post_load_scan_ms),
        ))
    }

    /// Load settings and, if enabled, start observing.
    pub async fn start(&self) -> Result<(), LifecycleError> {
        let settings = self.store.load().await?;
        self.current.set(settings);
        if settings.enabled {
            info!("running initial scan");
            self.enable();
        }
        Ok(())
    }

    /// Run the handler of every setting that differs from the current ones,
    /// then adopt `settings`.
    pub fn apply_settings(&self, settings: ExtensionSettings) {
        for change in settings.changes_since(&self.current.get()) {
            match change {
                SettingChange::Enabled(true) => {
                    info!("enabled, starting a new scan");
                    self.enable();
                }
                SettingChange::Enabled(false) => {
                    info!("disabled, starting cleanup");
                    self.disable();
                }
            }
        }
        self.current.set(settings);
    }

    /// Apply every settings change published by the store until the store
    /// goes away.
    pub async fn watch_settings(&self) {
        let mut changes = self.store.subscribe();
        while changes.changed().await.is_ok() {
            let settings = *changes.borrow_and_update();
            self.apply_settings(settings);
        }
        debug!("settings channel closed");
    }

    /// One more scan once the page has had time to render lazily loaded
    /// content, if still enabled by then.
    pub fn schedule_post_load_scan(&self) -> JoinHandle<()> {
        let engine = self.engine.clone();
        let store = self.store.clone();
        let delay = self.post_load_delay;
        task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            match store.load().await {
                Ok(settings) if settings.enabled => {
                    info!("running post-load scan");
                    engine.run_scan();
                }
                Ok(_) => {}
                Err(error) => warn!(%error, "skipping post-load scan"),
            }
        })
    }

    fn enable(&self) {
        self.engine.initialize();
        self.watcher.start();
    }

    fn disable(&self) {
        self.watcher.stop();
        self.engine.cleanup();
    }

    pub fn engine(&self) -> &ObservationEngine {
        &self.engine
    }

    pub fn watcher(&self) -> &NavigationWatcher<N> {
        &self.watcher
    }

    pub fn settings(&self) -> ExtensionSettings {
        self.current.get()
    }

    pub fn post_load_delay(&self) -> Duration {
        self.post_load_delay
    }
}
