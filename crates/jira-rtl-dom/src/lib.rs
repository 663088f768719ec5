//! Live document model for the direction engine.
//!
//! A small, single-threaded stand-in for the slice of the browser platform
//! the engine consumes:
//! - an arena element/text tree ([`Document`]) with HTML import via `scraper`
//! - CSS selector matching through Servo's `selectors` crate ([`Selector`])
//! - mutation observers delivering [`MutationRecord`] batches
//! - per-node event listeners (`input`, `change`)
//! - a [`Window`] with location, session history and `popstate`

pub mod document;
pub mod error;
pub mod event;
mod html;
pub mod mutation;
pub mod node;
pub mod selector;
mod servo_dom;
pub mod window;

pub use document::{Document, SharedDocument};
pub use error::{DomError, Result};
pub use event::{Event, EventListener, EventType, ListenerId, dispatch_event, simulate_input};
pub use mutation::{MutationObserver, MutationObserverInit, MutationRecord, ObserverId};
pub use node::NodeId;
pub use selector::Selector;
pub use window::{HistoryHook, HistoryMethod, PopStateListener, Window};
