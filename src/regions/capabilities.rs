//! Capability dispatch.
//!
//! The binding node only ever calls these; each forwards to the region
//! module that owns the behavior.

use futures::FutureExt;
use futures::future::LocalBoxFuture;

use super::binding::BindingNode;
use super::{array, array_item, component, image, snippet, source, text};
use crate::engine::value::Value;
use crate::types::RegionKind;

/// Check host attributes. Shows a diagnostic and returns `false` when the
/// region cannot work with its configuration.
pub(crate) fn validate_configuration(node: &BindingNode) -> bool {
    match node.kind() {
        RegionKind::Text => text::validate_configuration(node),
        RegionKind::Component => component::validate_configuration(node),
        RegionKind::Array => array::validate_configuration(node),
        RegionKind::ArrayItem => array_item::validate_configuration(node),
        RegionKind::Image => image::validate_configuration(node),
        RegionKind::Source => source::validate_configuration(node),
        RegionKind::Snippet => true,
    }
}

/// Accept, adjust or reject an incoming merged value.
pub(crate) fn validate_value(node: &BindingNode, value: Value) -> Option<Value> {
    match node.kind() {
        RegionKind::Text => text::validate_value(node, value),
        RegionKind::Array => array::validate_value(node, value),
        RegionKind::Image => image::validate_value(node, value),
        RegionKind::Source => source::validate_value(node, value),
        RegionKind::Snippet => snippet::validate_value(node, value),
        RegionKind::Component | RegionKind::ArrayItem => Some(value),
    }
}

pub(crate) fn should_update(node: &BindingNode, value: &Value) -> bool {
    match node.kind() {
        RegionKind::Text | RegionKind::Source => text::should_update(node, value),
        _ => true,
    }
}

pub(crate) fn mount(node: &BindingNode) {
    match node.kind() {
        RegionKind::Text => text::mount(node),
        RegionKind::Source => source::mount(node),
        RegionKind::Component => component::mount(node),
        RegionKind::Array => array::mount(node),
        RegionKind::ArrayItem => array_item::mount(node),
        RegionKind::Image => image::mount(node),
        RegionKind::Snippet => {}
    }
}

pub(crate) fn unmount(node: &BindingNode) {
    if node.kind() == RegionKind::Source {
        source::unmount(node);
    }
    if node.kind().is_text_like() {
        node.env().editor().detach(node.host());
    }
}

/// One update pass.
pub(crate) fn run_update(node: &BindingNode) -> LocalBoxFuture<'static, ()> {
    let node = node.clone();
    async move {
        match node.kind() {
            RegionKind::Text => text::update(&node),
            RegionKind::Source => source::update(&node),
            RegionKind::Component => component::update(&node).await,
            RegionKind::Snippet => snippet::update(&node).await,
            RegionKind::Array => array::update(&node).await,
            RegionKind::ArrayItem => array_item::update(&node).await,
            RegionKind::Image => image::update(&node).await,
        }
    }
    .boxed_local()
}
