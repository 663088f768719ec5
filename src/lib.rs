//! jira-rtl: keeps right-to-left text in Jira pages flagged for
//! direction-aware styling.
//!
//! The workspace is split by concern; this crate re-exports the surface a
//! host needs:
//! - [`dom`]: live document, selectors, mutation observers, window/history
//! - [`text`]: right-to-left script detection
//! - [`config`]: `jira-rtl.toml`, env overrides and persisted settings
//! - [`engine`]: rules, the observation engine, navigation watcher and the
//!   lifecycle controller
//!
//! A host builds a [`Window`] over its [`Document`], picks a
//! [`SettingsStore`], then drives a [`LifecycleController`] from inside a
//! `tokio::task::LocalSet`.

pub use jira_rtl_config as config;
pub use jira_rtl_dom as dom;
pub use jira_rtl_engine as engine;
pub use jira_rtl_text as text;

pub use jira_rtl_config::{
    ExtensionSettings, FileSettingsStore, JiraRtlConfig, MemorySettingsStore, SettingsStore,
};
pub use jira_rtl_dom::{Document, NodeId, Selector, SharedDocument, Window};
pub use jira_rtl_engine::{
    ElementKind, LifecycleController, Marker, NavigationWatcher, ObservationEngine, Rule, RuleSet,
};
pub use jira_rtl_text::{TextDirection, is_right_to_left};
