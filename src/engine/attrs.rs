//! Declarative attribute names understood on host elements.

use indexmap::IndexMap;

use crate::types::RegionKind;

/// Region kind selector.
pub const EDITABLE: &str = "data-editable";
/// Base coordinate.
pub const PROP: &str = "data-prop";
/// Prefix of named sub-coordinates, `data-prop-<name>`.
pub const PROP_PREFIX: &str = "data-prop-";
pub const COMPONENT: &str = "data-component";
pub const ID_KEY: &str = "data-id-key";
pub const COMPONENT_KEY: &str = "data-component-key";
pub const ID: &str = "data-id";
pub const LENGTH: &str = "data-length";
pub const IGNORE: &str = "data-cloudcannon-ignore";
pub const DIRECTION: &str = "data-direction";
pub const TYPE: &str = "data-type";
pub const PATH: &str = "data-path";
pub const KEY: &str = "data-key";

pub const CLASS: &str = "class";

/// Tag whose contents are inert and never hydrated.
pub const TEMPLATE_TAG: &str = "template";
/// Tag of a bare list item built when no template exists.
pub const ARRAY_ITEM_TAG: &str = "array-item";

/// Custom element tags that declare a region kind without `data-editable`.
const TAG_KINDS: [(&str, RegionKind); 7] = [
    ("text-editable", RegionKind::Text),
    ("component-editable", RegionKind::Component),
    ("array-editable", RegionKind::Array),
    ("array-item", RegionKind::ArrayItem),
    ("image-editable", RegionKind::Image),
    ("source-editable", RegionKind::Source),
    ("snippet-editable", RegionKind::Snippet),
];

/// The region an element declares.
///
/// `None` when it declares nothing; `Some(Err(value))` when `data-editable`
/// names an unsupported kind.
pub fn region_kind(
    tag: &str,
    attributes: &IndexMap<String, String>,
) -> Option<Result<RegionKind, String>> {
    if let Some(declared) = attributes.get(EDITABLE) {
        return Some(RegionKind::from_attr(declared).ok_or_else(|| declared.clone()));
    }
    TAG_KINDS
        .iter()
        .find(|(name, _)| tag.eq_ignore_ascii_case(name))
        .map(|(_, kind)| Ok(*kind))
}

/// Whether the attribute configures a region (any `data-*`).
pub fn is_config(name: &str) -> bool {
    name.starts_with("data-")
}

pub fn is_coordinate(name: &str) -> bool {
    name == PROP || name.starts_with(PROP_PREFIX)
}

/// The `data-*` subset of an attribute map, in declaration order.
pub fn config_of(attributes: &IndexMap<String, String>) -> Vec<(&str, &str)> {
    attributes
        .iter()
        .filter(|(name, _)| is_config(name))
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect()
}

/// Region equality on configuration: identical `data-*` sets, order ignored.
pub fn same_config(a: &IndexMap<String, String>, b: &IndexMap<String, String>) -> bool {
    let mut left = config_of(a);
    let mut right = config_of(b);
    left.sort_unstable();
    right.sort_unstable();
    left == right
}
