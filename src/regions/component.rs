//! Component regions.
//!
//! A component region looks its renderer up by `data-component`, renders the
//! realized value to a [`VNode`] and patches its live children against the
//! output with the tree reconciler. Snippets and array items with a component
//! reuse [`render`].

use serde_json::Value as Json;

use super::binding::BindingNode;
use crate::dispatch::Command;
use crate::engine::attrs;
use crate::engine::path;
use crate::engine::vnode::VNode;
use crate::error::DispatchError;
use crate::pipeline::hydrate;
use crate::reconcile::tree;
use crate::renderer::diagnostics::Diagnostic;
use crate::renderer::registry::Namespace;
use crate::types::{NodeId, RegionKind};

const HEADING: &str = "Failed to render component";

pub const CONTROLS_TAG: &str = "editable-component-controls";

/// Render state shared by every component-like region.
#[derive(Debug, Default)]
pub struct ComponentRegion {
    /// Coordinate the edit affordance opens, relative to the parent.
    pub edit_path: Option<String>,
    /// Affordance element kept as the host's last child.
    pub controls: Option<NodeId>,
    waiting_for_renderer: bool,
}

pub(crate) fn validate_configuration(node: &BindingNode) -> bool {
    if node.attr(attrs::COMPONENT).is_some() {
        return true;
    }
    node.show_diagnostic(&Diagnostic::new(
        HEADING,
        "Component editable regions require a 'data-component' HTML attribute but none was provided. Please check that this element has a valid 'data-component' attribute.",
    ));
    false
}

pub(crate) fn mount(node: &BindingNode) {
    let Some(edit_path) = edit_path(node) else {
        return;
    };
    let env = node.env();
    let controls = {
        let mut doc = env.doc_mut();
        let controls = doc.create_element(CONTROLS_TAG);
        let attached = doc
            .set_attr(controls, attrs::IGNORE, "")
            .and_then(|_| doc.append_child(node.host(), controls));
        match attached {
            Ok(()) => Some(controls),
            Err(err) => {
                tracing::error!(host = %node.host(), error = %err, "failed to attach component controls");
                None
            }
        }
    };
    if let Some(component) = node.region_mut().component_mut() {
        component.edit_path = Some(edit_path);
        component.controls = controls;
    }
}

/// Common prefix of the host's coordinates, else `data-prop`, else the first
/// named coordinate. Empty paths have nothing to edit.
fn edit_path(node: &BindingNode) -> Option<String> {
    let fragments = node.fragments();
    let all: Vec<&str> = fragments
        .base
        .iter()
        .chain(fragments.named.values())
        .map(String::as_str)
        .collect();
    [
        path::common_prefix(all.iter().copied()),
        fragments.base.clone(),
        fragments.named.values().next().cloned(),
    ]
    .into_iter()
    .flatten()
    .find(|candidate| !candidate.is_empty())
}

pub(crate) async fn update(node: &BindingNode) {
    render(node, Namespace::Component).await;
}

/// Render with the renderer named by `data-component` and patch the host.
/// Without `data-component`, the value is forwarded to listeners instead.
pub(crate) async fn render(node: &BindingNode, namespace: Namespace) {
    let Some(key) = node.attr(attrs::COMPONENT) else {
        node.forward_to_listeners().await;
        return;
    };
    node.clear_diagnostic();

    let env = node.env().clone();
    let renderers = env.renderers().clone();
    let Some(renderer) = renderers
        .resolve(namespace, &key, env.clock().as_ref(), env.config().retry)
        .await
    else {
        show_missing_renderer(node, namespace, &key);
        return;
    };

    let heading = format!("Failed to render component: {key}");
    let value = match node.value() {
        Some(value) => value.realize().await,
        None => Ok(Json::Null),
    };
    let value = match value {
        Ok(value) => value,
        Err(err) => {
            node.show_diagnostic(&Diagnostic::new(heading, err.to_string()));
            return;
        }
    };

    let mut output = match renderer(value).await {
        Ok(output) => output,
        Err(err) => {
            node.show_diagnostic(&Diagnostic::from_render_error(heading, &err));
            return;
        }
    };
    output.strip_tags(&env.config().stripped_tags);
    let rendered = rendered_children(unwrap_self(output, &key));
    patch(node, &rendered).await;
}

/// A renderer that wraps its output in the same component region is
/// unwrapped so the region does not nest inside itself.
fn unwrap_self(output: VNode, key: &str) -> VNode {
    let VNode::Element(root) = &output else {
        return output;
    };
    let first = root.children.iter().find(|child| child.is_element());
    let same_component = first.and_then(VNode::as_element).is_some_and(|child| {
        attrs::region_kind(&child.tag, &child.attrs) == Some(Ok(RegionKind::Component))
            && child.attrs.get(attrs::COMPONENT).map(String::as_str) == Some(key)
    });
    match (same_component, first) {
        (true, Some(child)) => child.clone(),
        _ => output,
    }
}

fn rendered_children(output: VNode) -> Vec<VNode> {
    match output {
        VNode::Element(root) => root.children,
        text @ VNode::Text(_) => vec![text],
    }
}

/// Patch the host's children, keeping any affordance element last.
pub(crate) async fn patch(node: &BindingNode, rendered: &[VNode]) {
    let env = node.env().clone();
    let controls = node.region_mut().component_mut().and_then(|c| c.controls);
    let result = {
        let mut doc = env.doc_mut();
        if let Some(controls) = controls
            && let Err(err) = doc.detach(controls)
        {
            tracing::error!(host = %node.host(), error = %err, "failed to detach controls");
        }
        let result =
            tree::patch_children(&mut doc, env.config(), env.as_ref(), node.host(), rendered);
        if let Some(controls) = controls
            && doc.contains(controls)
            && let Err(err) = doc.append_child(node.host(), controls)
        {
            tracing::error!(host = %node.host(), error = %err, "failed to reattach controls");
        }
        result
    };

    let report = match result {
        Ok(report) => report,
        Err(err) => {
            tracing::error!(host = %node.host(), error = %err, "tree reconciliation failed");
            return;
        }
    };
    tracing::trace!(
        host = %node.host(),
        mutations = report.mutations,
        inserted = report.inserted.len(),
        removed = report.removed.len(),
        "patched component"
    );

    for removed in &report.removed {
        hydrate::dehydrate(&env, *removed);
        hydrate::release(&env, *removed);
    }
    for inserted in &report.inserted {
        hydrate::hydrate(&env, *inserted);
    }
    for forward in &report.forwards {
        node.forward_to_host(*forward).await;
    }
}

fn show_missing_renderer(node: &BindingNode, namespace: Namespace, key: &str) {
    let renderers = node.env().renderers().clone();
    let mut diagnostic = Diagnostic::new(
        HEADING,
        format!(
            "Failed to find a registered component with the key \"{key}\". This may mean that the provided \"data-component\" attribute is incorrect or that the component hasn't been registered."
        ),
    );
    if renderers.keys(namespace).is_empty() {
        diagnostic = diagnostic.with_hint(
            "There are no registered components currently available. Please check that you've included your registration script and that it's running correctly.",
        );
    } else if let Some(close) = renderers.case_insensitive_match(namespace, key) {
        diagnostic = diagnostic.with_hint(format!(
            "The component key \"{key}\" is not case-sensitive. Did you mean \"{close}\"?"
        ));
    }
    node.show_diagnostic(&diagnostic);

    let already_waiting = node
        .region_mut()
        .component_mut()
        .map(|c| std::mem::replace(&mut c.waiting_for_renderer, true))
        .unwrap_or(true);
    if already_waiting {
        return;
    }
    let weak = node.downgrade();
    renderers.on_registered(namespace, key, move || {
        if let Some(node) = weak.upgrade() {
            if let Some(component) = node.region_mut().component_mut() {
                component.waiting_for_renderer = false;
            }
            node.schedule_update();
        }
    });
}

impl BindingNode {
    /// Open the host editor at this region's edit path.
    pub async fn edit(&self) -> Result<(), DispatchError> {
        let edit_path = match self.kind() {
            RegionKind::ArrayItem => self.attr(attrs::PROP),
            _ => self
                .region_mut()
                .component_mut()
                .and_then(|c| c.edit_path.clone()),
        };
        let Some(path) = edit_path else {
            return Err(DispatchError::Unresolved(format!("{} has no edit path", self.host())));
        };
        self.dispatch(Command::Edit { path }).await.map(|_| ())
    }
}
