//! Core types for editable-regions.
//!
//! These types define the foundation that everything builds on.
//! They flow between the document arena, the binding nodes and the reconcilers.

use std::fmt;

// =============================================================================
// Node Identity
// =============================================================================

/// Handle to a node in the live [`Document`](crate::engine::Document).
///
/// Slots are recycled through a free pool, so every handle carries the
/// generation of the slot it was issued for. A handle to a released node never
/// aliases the node that later reuses its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    /// Slot index inside the arena.
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}v{}", self.index, self.generation)
    }
}

// =============================================================================
// Region Kind
// =============================================================================

/// The closed set of editable region kinds a host element can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    Text,
    Component,
    Array,
    ArrayItem,
    Image,
    Source,
    Snippet,
}

impl RegionKind {
    pub const ALL: [RegionKind; 7] = [
        RegionKind::Array,
        RegionKind::ArrayItem,
        RegionKind::Component,
        RegionKind::Image,
        RegionKind::Snippet,
        RegionKind::Source,
        RegionKind::Text,
    ];

    /// Parse the value of the region kind attribute.
    pub fn from_attr(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "component" => Some(Self::Component),
            "array" => Some(Self::Array),
            "array-item" => Some(Self::ArrayItem),
            "image" => Some(Self::Image),
            "source" => Some(Self::Source),
            "snippet" => Some(Self::Snippet),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Component => "component",
            Self::Array => "array",
            Self::ArrayItem => "array-item",
            Self::Image => "image",
            Self::Source => "source",
            Self::Snippet => "snippet",
        }
    }

    /// Regions whose live node holds focus-sensitive editor state.
    pub fn is_text_like(&self) -> bool {
        matches!(self, Self::Text | Self::Source)
    }

    /// Comma separated list of supported kinds, used in diagnostics.
    pub fn supported_list() -> String {
        Self::ALL
            .iter()
            .map(|kind| kind.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Array Direction
// =============================================================================

/// Layout axis of a list region, used to orient move affordances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrayDirection {
    Row,
    #[default]
    Column,
    RowReverse,
    ColumnReverse,
}

impl ArrayDirection {
    pub fn from_attr(value: &str) -> Option<Self> {
        match value {
            "row" => Some(Self::Row),
            "column" => Some(Self::Column),
            "row-reverse" => Some(Self::RowReverse),
            "column-reverse" => Some(Self::ColumnReverse),
            _ => None,
        }
    }

    pub fn is_row(&self) -> bool {
        matches!(self, Self::Row | Self::RowReverse)
    }

    pub fn is_reversed(&self) -> bool {
        matches!(self, Self::RowReverse | Self::ColumnReverse)
    }

    /// Labels for the (backward, forward) move affordances.
    pub fn move_labels(&self) -> (&'static str, &'static str) {
        if self.is_row() {
            ("left", "right")
        } else {
            ("up", "down")
        }
    }
}

// =============================================================================
// Text Element Type
// =============================================================================

/// Editing mode requested by a text region's `data-type` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextType {
    Span,
    #[default]
    Text,
    Block,
}

impl TextType {
    pub fn from_attr(value: &str) -> Option<Self> {
        match value {
            "span" => Some(Self::Span),
            "text" => Some(Self::Text),
            "block" => Some(Self::Block),
            _ => None,
        }
    }
}

// =============================================================================
// Drop Position
// =============================================================================

/// Which side of a list item a dragged item is dropped on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropPosition {
    Before,
    After,
}

// =============================================================================
// Node Flags (bitflags)
// =============================================================================

bitflags::bitflags! {
    /// Lifecycle state of a binding node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u8 {
        const NONE = 0;
        /// `mount()` has run.
        const MOUNTED = 1 << 0;
        /// Listeners and subscriptions are wired.
        const CONNECTED = 1 << 1;
        /// An update was requested while one was in flight.
        const PENDING_UPDATE = 1 << 2;
        /// The region currently shows a diagnostic instead of content.
        const ERRORED = 1 << 3;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_kind_roundtrip() {
        for kind in RegionKind::ALL {
            assert_eq!(RegionKind::from_attr(kind.as_str()), Some(kind));
        }
        assert_eq!(RegionKind::from_attr("carousel"), None);
    }

    #[test]
    fn test_array_direction() {
        let dir = ArrayDirection::from_attr("row-reverse").unwrap();
        assert!(dir.is_row());
        assert!(dir.is_reversed());
        assert_eq!(dir.move_labels(), ("left", "right"));
        assert_eq!(ArrayDirection::default().move_labels(), ("up", "down"));
    }

    #[test]
    fn test_flags_combine() {
        let mut flags = NodeFlags::NONE;
        flags |= NodeFlags::MOUNTED | NodeFlags::CONNECTED;
        assert!(flags.contains(NodeFlags::MOUNTED));
        flags.remove(NodeFlags::MOUNTED);
        assert!(!flags.contains(NodeFlags::MOUNTED));
        assert!(flags.contains(NodeFlags::CONNECTED));
    }
}
