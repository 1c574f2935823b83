//! Regions - the closed set of editable region kinds.
//!
//! Every binding node carries one [`Region`] holding the kind-specific state.
//! The common capability surface (configuration and value validation, update
//! gating, mount/unmount and the update pass itself) lives in
//! [`capabilities`], which dispatches on the variant.
//!
//! | Kind         | Value                      | Update                         |
//! |--------------|----------------------------|--------------------------------|
//! | `text`       | string or null             | editor content                 |
//! | `component`  | anything                   | render + tree reconcile        |
//! | `array`      | array or remote list       | list reconcile                 |
//! | `array-item` | list entry                 | render or forward              |
//! | `image`      | `{src, alt, title}`        | `img` attributes               |
//! | `source`     | raw file source            | extracted fragment in editor   |
//! | `snippet`    | object with `_snippet_type`| render + tree reconcile        |

pub mod array;
pub mod array_item;
pub mod binding;
pub(crate) mod capabilities;
pub mod component;
pub mod image;
pub mod snippet;
pub mod source;
pub mod text;

pub use array::ArrayRegion;
pub use array_item::{ArrayItemRegion, DragPayload, ItemControls};
pub use binding::{BindingNode, Listener, NodeTask, PushContext};
pub use component::ComponentRegion;
pub use image::{ImageFields, ImageRegion};
pub use source::{SourceFormat, SourceRegion};
pub use text::TextRegion;

use crate::types::RegionKind;

/// Kind-specific state of a binding node.
#[derive(Debug)]
pub enum Region {
    Text(TextRegion),
    Component(ComponentRegion),
    Array(ArrayRegion),
    ArrayItem(ArrayItemRegion),
    Image(ImageRegion),
    Source(SourceRegion),
    Snippet(ComponentRegion),
}

impl Region {
    pub fn new(kind: RegionKind) -> Self {
        match kind {
            RegionKind::Text => Self::Text(TextRegion::default()),
            RegionKind::Component => Self::Component(ComponentRegion::default()),
            RegionKind::Array => Self::Array(ArrayRegion::default()),
            RegionKind::ArrayItem => Self::ArrayItem(ArrayItemRegion::default()),
            RegionKind::Image => Self::Image(ImageRegion::default()),
            RegionKind::Source => Self::Source(SourceRegion::default()),
            RegionKind::Snippet => Self::Snippet(ComponentRegion::default()),
        }
    }

    pub fn kind(&self) -> RegionKind {
        match self {
            Self::Text(_) => RegionKind::Text,
            Self::Component(_) => RegionKind::Component,
            Self::Array(_) => RegionKind::Array,
            Self::ArrayItem(_) => RegionKind::ArrayItem,
            Self::Image(_) => RegionKind::Image,
            Self::Source(_) => RegionKind::Source,
            Self::Snippet(_) => RegionKind::Snippet,
        }
    }

    /// Render state shared by component-like kinds.
    pub(crate) fn component_mut(&mut self) -> Option<&mut ComponentRegion> {
        match self {
            Self::Component(component) | Self::Snippet(component) => Some(component),
            Self::ArrayItem(item) => Some(&mut item.component),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_kind_matches_constructor() {
        for kind in RegionKind::ALL {
            assert_eq!(Region::new(kind).kind(), kind);
        }
    }
}
