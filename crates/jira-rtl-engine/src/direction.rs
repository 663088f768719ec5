//! The per-element direction marker.

use jira_rtl_config::EngineConfig;
use jira_rtl_dom::{Document, NodeId};
use jira_rtl_text::TextDirection;
use tracing::trace;

pub const DEFAULT_MARKER_ATTRIBUTE: &str = "data-jira-rtl-applied";

const MARKER_VALUE: &str = "true";

/// Attribute flagging an element as right-to-left. Stylesheets key off
/// `[<attribute>="true"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    attribute: String,
}

impl Default for Marker {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER_ATTRIBUTE)
    }
}

impl Marker {
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.marker_attribute.as_str())
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn is_applied(&self, doc: &Document, element: NodeId) -> bool {
        doc.attribute(element, &self.attribute) == Some(MARKER_VALUE)
    }

    /// Every element under the document root carrying the marker.
    pub fn annotated(&self, doc: &Document) -> Vec<NodeId> {
        doc.descendants(doc.root())
            .into_iter()
            .filter(|id| self.is_applied(doc, *id))
            .collect()
    }

    fn apply(&self, doc: &mut Document, element: NodeId) -> bool {
        doc.set_attribute(element, &self.attribute, MARKER_VALUE).is_ok()
    }

    pub fn remove(&self, doc: &mut Document, element: NodeId) -> bool {
        doc.remove_attribute(element, &self.attribute).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionChange {
    Applied,
    Cleared,
    Unchanged,
}

/// Bring the marker on `element` in line with `text`: set it when the text
/// is right-to-left, drop it when it is not. A missing element is a no-op
/// and missing text counts as not right-to-left.
pub fn sync_direction(
    doc: &mut Document,
    marker: &Marker,
    element: Option<NodeId>,
    text: Option<&str>,
) -> DirectionChange {
    let Some(element) = element else {
        return DirectionChange::Unchanged;
    };
    let applied = marker.is_applied(doc, element);
    let direction = text.map(TextDirection::of).unwrap_or_default();

    let change = match (applied, direction) {
        (false, TextDirection::Rtl) if marker.apply(doc, element) => DirectionChange::Applied,
        (true, TextDirection::Ltr) if marker.remove(doc, element) => DirectionChange::Cleared,
        _ => DirectionChange::Unchanged,
    };
    if change != DirectionChange::Unchanged {
        trace!(element = element.index(), ?direction, ?change, "direction synced");
    }
    change
}
