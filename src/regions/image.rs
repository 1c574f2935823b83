//! Image regions.
//!
//! Binds `src`, `alt` and `title` onto an `img` element, either from one
//! object under `data-prop` or from per-field `data-prop-src`,
//! `data-prop-alt` and `data-prop-title` coordinates. Sources inside a
//! surrounding `picture` follow the image's preview URL.

use indexmap::IndexMap;

use super::binding::BindingNode;
use crate::dispatch::{Command, Reply};
use crate::engine::path;
use crate::engine::value::Value;
use crate::engine::{Document, attrs};
use crate::error::DispatchError;
use crate::renderer::diagnostics::Diagnostic;
use crate::store::InputConfig;
use crate::types::NodeId;

const HEADING: &str = "Failed to render image editable region";

const FIELDS: [&str; 3] = ["src", "alt", "title"];

#[derive(Debug, Default)]
pub struct ImageRegion {
    pub img: Option<NodeId>,
    /// Fields with a coordinate to write back to.
    pub configured: Vec<&'static str>,
    pub input_configs: IndexMap<&'static str, InputConfig>,
    applied_src: Option<String>,
}

/// The image value, as edited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageFields {
    pub src: Option<String>,
    pub alt: Option<String>,
    pub title: Option<String>,
}

impl ImageFields {
    fn from_value(value: &Value) -> Self {
        let field = |key: &str| value.get(key).and_then(Value::as_str).map(String::from);
        Self {
            src: field("src"),
            alt: field("alt"),
            title: field("title"),
        }
    }

    fn get(&self, key: &str) -> Option<&str> {
        match key {
            "src" => self.src.as_deref(),
            "alt" => self.alt.as_deref(),
            "title" => self.title.as_deref(),
            _ => None,
        }
    }
}

fn find_img(doc: &Document, host: NodeId) -> Option<NodeId> {
    doc.find_descendant(host, |doc, node| {
        doc.tag(node).is_some_and(|tag| tag.eq_ignore_ascii_case("img"))
    })
}

fn field_attr(field: &str) -> String {
    format!("{}{field}", attrs::PROP_PREFIX)
}

pub(crate) fn validate_configuration(node: &BindingNode) -> bool {
    let img = find_img(&node.env().doc(), node.host());
    let Some(img) = img else {
        node.show_diagnostic(&Diagnostic::new(
            HEADING,
            "Image editable regions must contain a child HTML element of type 'img'. Please check that this element has a child 'img' element.",
        ));
        return false;
    };
    if let super::Region::Image(region) = &mut *node.region_mut() {
        region.img = Some(img);
    }

    let has_prop = node.attr(attrs::PROP).is_some()
        || FIELDS.iter().any(|field| node.attr(&field_attr(field)).is_some());
    if !has_prop {
        show_keeping_image(
            node,
            Diagnostic::new(
                HEADING,
                "Image editable regions require atleast one valid 'data-prop-*' HTML attribute. The valid attributes are 'data-prop', 'data-prop-src', 'data-prop-alt', and 'data-prop-title'. Please check that this element has atleast one of these attributes.",
            ),
        );
        return false;
    }
    true
}

/// Cards go next to the image so it comes back once the value is fixed.
fn show_keeping_image(node: &BindingNode, diagnostic: Diagnostic) {
    node.show_diagnostic_keeping(&diagnostic, |_, _| true);
}

fn base_hint(node: &BindingNode) -> String {
    match node.context().full_path {
        Some(full_path) => format!(
            "This may mean that the 'data-prop' attribute is incorrectly set for this element, the full 'data-prop' path was '{full_path}'."
        ),
        None => "This may mean that the 'data-prop' attribute is incorrectly set for this element.".to_string(),
    }
}

pub(crate) fn validate_value(node: &BindingNode, value: Value) -> Option<Value> {
    if matches!(value, Value::Null | Value::Remote(_)) {
        return Some(value);
    }
    let Some(object) = value.as_object() else {
        show_keeping_image(
            node,
            Diagnostic::new(
                HEADING,
                format!(
                    "Image editable regions expect to receive a value of type \"object\" but instead received a value of type '{}'.",
                    value.type_name()
                ),
            )
            .with_hint(base_hint(node)),
        );
        return None;
    };

    for key in FIELDS {
        let Some(field) = object.get(key) else {
            continue;
        };
        if matches!(field, Value::String(_) | Value::Null) {
            continue;
        }
        let hint = match node.context_for(key).and_then(|context| context.full_path) {
            Some(full_path) => format!(
                "This may mean that the 'data-prop-{key}' attribute is incorrectly set for this element, the full 'data-prop-{key}' path was '{full_path}'."
            ),
            None if node.attr(&field_attr(key)).is_some() => format!(
                "This may mean that the 'data-prop-{key}' attribute is incorrectly set for this element."
            ),
            None => base_hint(node),
        };
        show_keeping_image(
            node,
            Diagnostic::new(
                HEADING,
                format!(
                    "Image editable regions expect the \"{key}\" key to have a value of type \"string\" but instead it was a value of type '{}'.",
                    field.type_name()
                ),
            )
            .with_hint(hint),
        );
        return None;
    }

    if let Some(unexpected) = object.keys().find(|key| !FIELDS.contains(&key.as_str())) {
        let hint = if node.attr(&field_attr(unexpected)).is_some() {
            format!("Try removing the 'data-prop-{unexpected}' HTML attribute from this element.")
        } else {
            base_hint(node)
        };
        show_keeping_image(
            node,
            Diagnostic::new(
                HEADING,
                format!(
                    "Image editable region received an unexpected value key \"{unexpected}\". The supported values are \"src\", \"alt\", and \"title\". Please check that your data is correctly formatted."
                ),
            )
            .with_hint(hint),
        );
        return None;
    }
    Some(value)
}

/// Coordinate a field writes to: its own attribute, else under `data-prop`.
fn field_path(node: &BindingNode, field: &str) -> Option<String> {
    node.attr(&field_attr(field))
        .or_else(|| node.attr(attrs::PROP).map(|prop| path::join(&prop, field)))
}

pub(crate) fn mount(node: &BindingNode) {
    let configured: Vec<&'static str> = FIELDS
        .into_iter()
        .filter(|field| field_path(node, field).is_some())
        .collect();
    if let super::Region::Image(region) = &mut *node.region_mut() {
        region.configured = configured.clone();
    }

    let node = node.clone();
    let env = node.env().clone();
    env.spawn(async move {
        for field in configured {
            let Some(path) = field_path(&node, field) else {
                continue;
            };
            match node.dispatch(Command::GetInputConfig { path }).await {
                Ok(Reply::InputConfig(config)) => {
                    if let super::Region::Image(region) = &mut *node.region_mut() {
                        region.input_configs.insert(field, config);
                    }
                }
                Ok(Reply::Done) => {}
                Err(err) => tracing::debug!(host = %node.host(), field, error = %err, "no input config"),
            }
        }
    });
}

pub(crate) async fn update(node: &BindingNode) {
    let value = match node.value() {
        Some(Value::Remote(remote)) => match remote.expand().await {
            Ok(expanded) => match validate_value(node, expanded) {
                Some(value) => value,
                None => return,
            },
            Err(err) => {
                tracing::error!(host = %node.host(), error = %err, "failed to fetch image value");
                return;
            }
        },
        Some(value) => value,
        None => Value::Null,
    };
    let fields = ImageFields::from_value(&value);

    let (img, configured, applied_src) = match &*node.region() {
        super::Region::Image(region) => (
            region.img,
            region.configured.clone(),
            region.applied_src.clone(),
        ),
        _ => return,
    };
    let Some(img) = img else {
        tracing::error!(host = %node.host(), "image region has no img element");
        return;
    };
    let env = node.env().clone();

    if configured.contains(&"src") && applied_src != fields.src {
        let asset = fields.src.clone().unwrap_or_default();
        match env.store().preview_url(&asset).await {
            Ok(url) => {
                if let Err(err) = apply_src(&mut env.doc_mut(), img, &url) {
                    tracing::error!(host = %node.host(), error = %err, "failed to apply image src");
                }
                if let super::Region::Image(region) = &mut *node.region_mut() {
                    region.applied_src = fields.src.clone();
                }
            }
            Err(err) => tracing::error!(host = %node.host(), error = %err, "preview url failed"),
        }
    }

    let mut doc = env.doc_mut();
    for field in ["alt", "title"] {
        if !configured.contains(&field) {
            continue;
        }
        if let Err(err) = doc.set_attr(img, field, fields.get(field).unwrap_or_default()) {
            tracing::error!(host = %node.host(), field, error = %err, "failed to apply image field");
        }
    }
}

/// Point the image, and any sibling `source` in a `picture`, at `url`.
fn apply_src(doc: &mut Document, img: NodeId, url: &str) -> Result<(), crate::error::EngineError> {
    doc.set_attr(img, "src", url)?;
    let Some(picture) = doc
        .parent(img)
        .filter(|parent| doc.tag(*parent).is_some_and(|tag| tag.eq_ignore_ascii_case("picture")))
    else {
        return Ok(());
    };
    for source in doc.element_children(picture) {
        if doc.tag(source).is_some_and(|tag| tag.eq_ignore_ascii_case("source")) {
            doc.set_attr(source, "src", url)?;
            doc.set_attr(source, "srcset", url)?;
        }
    }
    Ok(())
}

impl BindingNode {
    /// Current image fields of an image region.
    pub fn image_fields(&self) -> Option<ImageFields> {
        if !matches!(&*self.region(), super::Region::Image(_)) {
            return None;
        }
        Some(self.value().map(|value| ImageFields::from_value(&value)).unwrap_or_default())
    }

    /// Input configuration fetched for each configured field.
    pub fn image_input_configs(&self) -> IndexMap<&'static str, InputConfig> {
        match &*self.region() {
            super::Region::Image(region) => region.input_configs.clone(),
            _ => IndexMap::new(),
        }
    }

    /// Write edited fields back, one `Set` per configured field that changed.
    pub async fn set_image(&self, edited: ImageFields) -> Result<(), DispatchError> {
        let Some(current) = self.image_fields() else {
            return Ok(());
        };
        let configured = match &*self.region() {
            super::Region::Image(region) => region.configured.clone(),
            _ => Vec::new(),
        };
        for field in configured {
            let Some(new) = edited.get(field) else {
                continue;
            };
            if current.get(field) == Some(new) {
                continue;
            }
            let Some(path) = field_path(self, field) else {
                continue;
            };
            self.dispatch(Command::Set {
                path,
                value: serde_json::Value::String(new.to_string()),
            })
            .await?;
        }
        Ok(())
    }
}
