//! Error types for document operations.

use thiserror::Error;

use crate::NodeId;

/// Result type for document operations.
pub type Result<T> = std::result::Result<T, DomError>;

/// Errors that can occur while querying or mutating a [`crate::Document`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// The selector source could not be parsed.
    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// The node id does not belong to this document.
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),

    /// An element operation was attempted on a non-element node.
    #[error("node {0:?} is not an element")]
    NotAnElement(NodeId),

    /// A character-data operation was attempted on a non-text node.
    #[error("node {0:?} is not a text node")]
    NotText(NodeId),

    /// The insertion would create a cycle or attach the document root.
    #[error("cannot insert {child:?} under {parent:?}")]
    HierarchyRequest { parent: NodeId, child: NodeId },

    /// The window does not allow its history entry points to be replaced.
    #[error("history entry points cannot be patched on this window")]
    HistoryFrozen,

    /// A history URL could not be resolved against the current location.
    #[error("invalid url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}
