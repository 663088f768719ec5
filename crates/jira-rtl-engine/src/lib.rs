//! jira-rtl-engine: rule-driven, incremental direction annotation.
//!
//! - [`RuleSet`]: which elements matter and how their text is read
//! - [`sync_direction`]: toggles the marker on one element
//! - [`ObservationEngine`]: keeps markers current as the document mutates
//! - [`NavigationWatcher`]: reports client-side URL changes, debounced
//! - [`LifecycleController`]: ties the above to persisted settings

pub mod direction;
pub mod error;
pub mod input;
pub mod lifecycle;
pub mod navigation;
pub mod observer;
mod rule_file;
pub mod rules;

pub use direction::{DEFAULT_MARKER_ATTRIBUTE, DirectionChange, Marker, sync_direction};
pub use error::{LifecycleError, NavigationError, RuleError};
pub use input::InputListenerRegistry;
pub use lifecycle::{DEFAULT_POST_LOAD_SCAN_DELAY, LifecycleController};
pub use navigation::{
    DEFAULT_DEBOUNCE, DebouncePhase, NavigationCallback, NavigationSource, NavigationWatcher,
};
pub use observer::{EngineState, ObservationEngine};
pub use rules::{
    DEFAULT_TREE_WALKER_EXCLUDE, ElementKind, ResolveTarget, ResolveText, Rule, RuleSet, TargetFn,
    TextFn,
};
