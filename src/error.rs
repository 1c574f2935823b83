//! Error types.
//!
//! Configuration problems never surface here: they are rendered as inline
//! diagnostics by the region that hit them. These types cover invariant
//! violations, coordinate grammar, store failures and command routing.

use std::fmt;

use crate::types::NodeId;

/// Internal invariant violations. These indicate a logic defect, not bad data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A node handle no longer refers to a live node.
    StaleNode(NodeId),
    /// A tree operation was asked to do something structurally impossible.
    IllegalState(String),
    /// A drag or move referenced a source node that cannot be found.
    DragSourceMissing(String),
    /// A region operation was invoked on a node of the wrong kind.
    WrongRegion { expected: &'static str, node: NodeId },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaleNode(id) => write!(f, "node {id} is no longer in the document"),
            Self::IllegalState(msg) => write!(f, "illegal state: {msg}"),
            Self::DragSourceMissing(id) => write!(f, "drag source '{id}' not found"),
            Self::WrongRegion { expected, node } => {
                write!(f, "node {node} is not a {expected} region")
            }
        }
    }
}

impl std::error::Error for EngineError {}

/// Malformed coordinate strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// An `@` marker that is not one of the known indirections.
    UnknownIndirection(String),
    /// A bracket was opened but never closed.
    UnterminatedBracket(String),
    /// An indirection with an empty key, e.g. `@file[]`.
    EmptyKey(String),
    /// An anchor indirection somewhere other than the first segment.
    MisplacedAnchor(String),
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownIndirection(s) => write!(f, "unknown indirection in '{s}'"),
            Self::UnterminatedBracket(s) => write!(f, "unterminated bracket in '{s}'"),
            Self::EmptyKey(s) => write!(f, "empty indirection key in '{s}'"),
            Self::MisplacedAnchor(s) => write!(f, "anchor must lead the coordinate: '{s}'"),
        }
    }
}

impl std::error::Error for PathError {}

/// Failures reported by a remote store adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The named collection, file, dataset or snippet does not exist.
    NotFound(String),
    /// The path does not address a value of the required shape.
    InvalidPath(String),
    /// Transport or backend failure.
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::InvalidPath(path) => write!(f, "invalid path: {path}"),
            Self::Backend(msg) => write!(f, "store failure: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Failures while routing a command up the binding-node chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No ancestor could turn the coordinate into a store target.
    Unresolved(String),
    /// The coordinate reached the store but was malformed.
    Path(PathError),
    /// The store rejected the operation.
    Store(StoreError),
    /// The optimistic local update hit an invariant violation.
    Engine(EngineError),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unresolved(path) => write!(f, "cannot resolve coordinate '{path}'"),
            Self::Path(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Engine(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<PathError> for DispatchError {
    fn from(err: PathError) -> Self {
        Self::Path(err)
    }
}

impl From<EngineError> for DispatchError {
    fn from(err: EngineError) -> Self {
        Self::Engine(err)
    }
}

impl From<StoreError> for DispatchError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

/// Failure raised by a pluggable renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderError {
    pub message: String,
    pub stack: Option<String>,
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for RenderError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = DispatchError::from(StoreError::NotFound("@file[a.md]".into()));
        assert_eq!(err.to_string(), "not found: @file[a.md]");

        let err = RenderError::new("boom").with_stack("at render\nat main");
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.stack.as_deref(), Some("at render\nat main"));
    }
}
