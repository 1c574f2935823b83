//! Data coordinates.
//!
//! A coordinate is a dot separated path into the remote document. It is
//! relative by default and becomes absolute when it leads with an anchor
//! indirection:
//!
//! ```text
//! @collections[posts].0.title
//! @file[content/about.md].body
//! @data[authors].jane
//! ```
//!
//! `@snippet[id]` indirections may appear at any segment. Each one discards
//! the path accumulated before it and records its id, in order, so the
//! dispatcher can target the snippet inside the anchored object. Bracket
//! contents are opaque and may contain dots.

use std::fmt;

use indexmap::IndexMap;

use super::attrs;
use crate::error::PathError;

// =============================================================================
// Parsed Coordinate
// =============================================================================

/// The remote object a coordinate is anchored to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Anchor {
    Collection(String),
    File(String),
    Dataset(String),
    /// Implicit anchor for coordinates that reach the root still relative.
    CurrentFile,
}

/// A fully parsed coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coordinate {
    pub anchor: Anchor,
    /// Snippet ids in the order they were consumed.
    pub snippets: Vec<String>,
    /// Remaining dot separated path below the innermost indirection.
    pub path: String,
}

impl Coordinate {
    pub fn parse(input: &str) -> Result<Self, PathError> {
        let mut anchor = Anchor::CurrentFile;
        let mut snippets = Vec::new();
        let mut path: Vec<&str> = Vec::new();

        for (position, segment) in segments(input)?.into_iter().enumerate() {
            if !segment.starts_with('@') {
                path.push(segment);
                continue;
            }

            let (name, key) = parse_indirection(input, segment)?;
            match name {
                "snippet" => {
                    snippets.push(key.to_string());
                    path.clear();
                }
                "collections" | "file" | "data" if position != 0 => {
                    return Err(PathError::MisplacedAnchor(input.to_string()));
                }
                "collections" => anchor = Anchor::Collection(key.to_string()),
                "file" => anchor = Anchor::File(key.to_string()),
                "data" => anchor = Anchor::Dataset(key.to_string()),
                _ => return Err(PathError::UnknownIndirection(input.to_string())),
            }
        }

        Ok(Self {
            anchor,
            snippets,
            path: path.join("."),
        })
    }

    pub fn is_anchored(&self) -> bool {
        self.anchor != Anchor::CurrentFile
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        match &self.anchor {
            Anchor::Collection(key) => parts.push(format!("@collections[{key}]")),
            Anchor::File(path) => parts.push(format!("@file[{path}]")),
            Anchor::Dataset(key) => parts.push(format!("@data[{key}]")),
            Anchor::CurrentFile => {}
        }
        parts.extend(self.snippets.iter().map(|id| format!("@snippet[{id}]")));
        if !self.path.is_empty() {
            parts.push(self.path.clone());
        }
        f.write_str(&parts.join("."))
    }
}

fn parse_indirection<'a>(input: &str, segment: &'a str) -> Result<(&'a str, &'a str), PathError> {
    let body = &segment[1..];
    let Some(open) = body.find('[') else {
        return Err(PathError::UnknownIndirection(input.to_string()));
    };
    if !body.ends_with(']') {
        return Err(PathError::UnknownIndirection(input.to_string()));
    }
    let name = &body[..open];
    let key = &body[open + 1..body.len() - 1];
    if key.is_empty() {
        return Err(PathError::EmptyKey(input.to_string()));
    }
    Ok((name, key))
}

/// Split on dots outside brackets, dropping empty segments.
pub fn segments(input: &str) -> Result<Vec<&str>, PathError> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in input.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '.' if depth == 0 => {
                out.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth > 0 {
        return Err(PathError::UnterminatedBracket(input.to_string()));
    }
    out.push(&input[start..]);
    out.retain(|segment| !segment.is_empty());
    Ok(out)
}

// =============================================================================
// Composition
// =============================================================================

/// Whether a coordinate names its own anchor and so ignores ancestors.
pub fn is_absolute(coordinate: &str) -> bool {
    ["@collections[", "@file[", "@data["]
        .iter()
        .any(|prefix| coordinate.starts_with(prefix))
}

/// Join two fragments. An empty side means "the same value".
pub fn join(base: &str, rest: &str) -> String {
    match (base.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{base}.{rest}"),
    }
}

fn split_first(coordinate: &str) -> (&str, &str) {
    let mut depth = 0usize;
    for (i, ch) in coordinate.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '.' if depth == 0 => return (&coordinate[..i], &coordinate[i + 1..]),
            _ => {}
        }
    }
    (coordinate, "")
}

/// The coordinate attributes one host declares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragments {
    /// `data-prop`; `Some("")` binds to the same value as the parent.
    pub base: Option<String>,
    /// `data-prop-<name>` entries keyed by `<name>`.
    pub named: IndexMap<String, String>,
}

impl Fragments {
    pub fn from_attrs(attributes: &IndexMap<String, String>) -> Self {
        let mut fragments = Self::default();
        for (name, value) in attributes {
            if name == attrs::PROP {
                fragments.base = Some(value.clone());
            } else if let Some(key) = name.strip_prefix(attrs::PROP_PREFIX) {
                fragments.named.insert(key.to_string(), value.clone());
            }
        }
        fragments
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_none() && self.named.is_empty()
    }

    /// Extend a coordinate by one ancestor level.
    ///
    /// Absolute coordinates pass through untouched. Returns `None` when this
    /// host declares no coordinate that could contribute.
    pub fn extend(&self, coordinate: &str) -> Option<String> {
        if is_absolute(coordinate) {
            return Some(coordinate.to_string());
        }
        let (first, rest) = split_first(coordinate);
        if let Some(named) = self.named.get(first) {
            return Some(join(named, rest));
        }
        self.base.as_deref().map(|base| join(base, coordinate))
    }
}

/// Resolve a local fragment through its binding ancestors, nearest first.
///
/// Stops as soon as the coordinate is absolute. Returns `None` when some
/// ancestor cannot contribute, meaning "cannot resolve yet". A coordinate that
/// is still relative after the last ancestor addresses the current file.
pub fn resolve<'a>(
    local: &str,
    ancestors: impl IntoIterator<Item = &'a Fragments>,
) -> Option<String> {
    let mut coordinate = local.to_string();
    for fragments in ancestors {
        if is_absolute(&coordinate) {
            break;
        }
        coordinate = fragments.extend(&coordinate)?;
    }
    Some(coordinate)
}

/// Longest shared segment prefix of several coordinates.
pub fn common_prefix<'a>(coordinates: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut iter = coordinates.into_iter();
    let first = iter.next()?;
    let mut prefix: Vec<&str> = segments(first).ok()?;
    for coordinate in iter {
        let other = segments(coordinate).ok()?;
        let shared = prefix
            .iter()
            .zip(other.iter())
            .take_while(|(a, b)| a == b)
            .count();
        prefix.truncate(shared);
    }
    Some(prefix.join("."))
}
