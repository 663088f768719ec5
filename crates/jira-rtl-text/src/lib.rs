//! jira-rtl-text: script detection for direction hints.
//!
//! Only a coarse, element-level decision is made here: does a run of text
//! contain any character from a right-to-left script. Full bidirectional
//! layout is left to the renderer.

pub mod script;

pub use script::{RTL_SCRIPTS, TextDirection, is_right_to_left};
