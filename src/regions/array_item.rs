//! Array item regions.
//!
//! An item renders like a component when it has `data-component` and simply
//! forwards its entry to its own listeners otherwise. Its affordances
//! (add, duplicate, move, remove, drop) dispatch list commands through the
//! parent array and update the live tree right away, ahead of the store
//! change that will reconcile the list again.
//!
//! Positions come from `data-prop` and `data-length`, which the list
//! reconciler keeps current.

use super::binding::BindingNode;
use super::component;
use crate::dispatch::{Command, Reply};
use crate::engine::attrs;
use crate::error::{DispatchError, EngineError};
use crate::pipeline::hydrate;
use crate::reconcile::list;
use crate::renderer::diagnostics::Diagnostic;
use crate::renderer::registry::Namespace;
use crate::store::InputConfig;
use crate::types::{ArrayDirection, DropPosition, NodeId, RegionKind};

pub const CONTROLS_TAG: &str = "editable-array-item-controls";

#[derive(Debug, Default)]
pub struct ArrayItemRegion {
    pub component: component::ComponentRegion,
    pub controls: ItemControls,
}

/// State of the item's affordances.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemControls {
    pub move_backward_label: &'static str,
    pub move_forward_label: &'static str,
    pub disable_move_backward: bool,
    pub disable_move_forward: bool,
    pub disable_reorder: bool,
    pub disable_remove: bool,
    pub disable_add: bool,
    /// The affordance element, appended once the input config is known.
    pub element: Option<NodeId>,
}

/// What a drag carries from its source item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragPayload {
    /// Position of the source in its own list.
    pub index: usize,
    pub source: NodeId,
}

pub(crate) fn validate_configuration(node: &BindingNode) -> bool {
    if let Some(key) = node.attr(attrs::COMPONENT)
        && node.env().renderers().get(Namespace::Component, &key).is_none()
    {
        node.show_diagnostic(&Diagnostic::new(
            "Failed to render component",
            format!("Couldn't find component '{key}'"),
        ));
        return false;
    }
    let in_array = node
        .parent()
        .is_some_and(|parent| parent.kind() == RegionKind::Array);
    if !in_array {
        node.show_diagnostic(&Diagnostic::new(
            "Failed to render array item",
            "Parent array editable not found. Array items must be a descendant of an array editable.",
        ));
        return false;
    }
    true
}

pub(crate) fn mount(node: &BindingNode) {
    let element = {
        let mut doc = node.env().doc_mut();
        let element = doc.create_element(CONTROLS_TAG);
        match doc.set_attr(element, attrs::IGNORE, "") {
            Ok(_) => Some(element),
            Err(err) => {
                tracing::error!(host = %node.host(), error = %err, "failed to create item controls");
                None
            }
        }
    };
    if let super::Region::ArrayItem(item) = &mut *node.region_mut() {
        item.controls.element = element;
    }
    update_controls(node);

    let node = node.clone();
    let env = node.env().clone();
    env.spawn(async move {
        let config = match node.dispatch(Command::GetInputConfig { path: String::new() }).await {
            Ok(Reply::InputConfig(config)) => Some(config),
            Ok(Reply::Done) => None,
            Err(err) => {
                tracing::debug!(host = %node.host(), error = %err, "no input config for item");
                Some(InputConfig::restricted())
            }
        };
        attach_controls(&node, config);
    });
}

fn attach_controls(node: &BindingNode, config: Option<InputConfig>) {
    let element = {
        let mut region = node.region_mut();
        let super::Region::ArrayItem(item) = &mut *region else {
            return;
        };
        if let Some(config) = config {
            item.controls.disable_reorder = config.options.disable_reorder;
            item.controls.disable_remove = config.options.disable_remove;
            item.controls.disable_add = config.options.disable_add;
        }
        item.component.controls = item.controls.element;
        item.controls.element
    };
    if let Some(element) = element {
        let result = node.env().doc_mut().append_child(node.host(), element);
        if let Err(err) = result {
            tracing::error!(host = %node.host(), error = %err, "failed to attach item controls");
        }
    }
    update_controls(node);
}

pub(crate) async fn update(node: &BindingNode) {
    component::render(node, Namespace::Component).await;
    update_controls(node);
}

/// `(data-prop, data-length)` of the host.
fn position(node: &BindingNode) -> Option<(usize, usize)> {
    let prop = node.attr(attrs::PROP)?.parse().ok()?;
    let len = node
        .attr(attrs::LENGTH)
        .and_then(|len| len.parse().ok())
        .unwrap_or(prop + 1);
    Some((prop, len))
}

fn direction(node: &BindingNode) -> ArrayDirection {
    node.parent()
        .and_then(|parent| parent.direction())
        .unwrap_or_default()
}

/// Recompute move affordances from the host's position.
fn update_controls(node: &BindingNode) {
    let direction = direction(node);
    let (prop, len) = position(node).unwrap_or((0, 1));
    let last = prop + 1 >= len;
    let (backward, forward) = direction.move_labels();

    let controls = {
        let mut region = node.region_mut();
        let super::Region::ArrayItem(item) = &mut *region else {
            return;
        };
        let controls = &mut item.controls;
        controls.move_backward_label = backward;
        controls.move_forward_label = forward;
        if direction.is_reversed() {
            controls.disable_move_backward = last;
            controls.disable_move_forward = prop == 0;
        } else {
            controls.disable_move_backward = prop == 0;
            controls.disable_move_forward = last;
        }
        controls.clone()
    };

    let Some(element) = controls.element else {
        return;
    };
    let mut doc = node.env().doc_mut();
    let flags = [
        ("disable-move-backward", controls.disable_move_backward),
        ("disable-move-forward", controls.disable_move_forward),
        ("disable-reorder", controls.disable_reorder),
        ("disable-remove", controls.disable_remove),
        ("disable-add", controls.disable_add),
    ];
    let mut result = doc
        .set_attr(element, "move-backward-text", controls.move_backward_label)
        .and_then(|_| doc.set_attr(element, "move-forward-text", controls.move_forward_label));
    for (name, on) in flags {
        result = result.and_then(|_| {
            if on {
                doc.set_attr(element, name, "")
            } else {
                doc.remove_attr(element, name)
            }
        });
    }
    if let Err(err) = result {
        tracing::error!(host = %node.host(), error = %err, "failed to sync item controls");
    }
}

impl BindingNode {
    /// Affordance state of an array item.
    pub fn item_controls(&self) -> Option<ItemControls> {
        match &*self.region() {
            super::Region::ArrayItem(item) => Some(item.controls.clone()),
            _ => None,
        }
    }

    fn item_position(&self) -> Result<usize, DispatchError> {
        match position(self) {
            Some((prop, _)) if self.kind() == RegionKind::ArrayItem => Ok(prop),
            _ => Err(EngineError::WrongRegion {
                expected: "positioned array-item",
                node: self.host(),
            }
            .into()),
        }
    }

    /// Start a drag from this item.
    pub fn drag_payload(&self) -> Option<DragPayload> {
        let index = self.item_position().ok()?;
        Some(DragPayload {
            index,
            source: self.host(),
        })
    }

    /// Insert a new entry next to this one.
    pub async fn add_item(&self) -> Result<(), DispatchError> {
        let prop = self.item_position()?;
        self.dispatch(Command::AddArrayItem {
            path: String::new(),
            index: Some(neighbor(direction(self), prop)),
            value: None,
            source_index: Some(prop),
        })
        .await?;
        Ok(())
    }

    /// Insert a copy of this entry next to it and show the copy immediately.
    pub async fn duplicate_item(&self) -> Result<(), DispatchError> {
        let prop = self.item_position()?;
        let value = match self.value() {
            Some(value) => Some(value.realize().await?),
            None => None,
        };
        self.dispatch(Command::AddArrayItem {
            path: String::new(),
            index: Some(neighbor(direction(self), prop)),
            value,
            source_index: Some(prop),
        })
        .await?;

        let env = self.env().clone();
        let copy = {
            let mut doc = env.doc_mut();
            let copy = list::clone_item(&mut doc, self.host())?;
            doc.insert_after(self.host(), copy)?;
            copy
        };
        hydrate::hydrate(&env, copy);
        Ok(())
    }

    pub async fn move_backward(&self) -> Result<(), DispatchError> {
        self.move_item(true).await
    }

    pub async fn move_forward(&self) -> Result<(), DispatchError> {
        self.move_item(false).await
    }

    async fn move_item(&self, backward: bool) -> Result<(), DispatchError> {
        let prop = self.item_position()?;
        let disabled = self.item_controls().is_some_and(|controls| {
            controls.disable_reorder
                || if backward {
                    controls.disable_move_backward
                } else {
                    controls.disable_move_forward
                }
        });
        // Towards the start of the data is backward unless reversed.
        let toward_start = backward != direction(self).is_reversed();
        let to = if toward_start { prop.checked_sub(1) } else { Some(prop + 1) };
        let Some(to) = to.filter(|_| !disabled) else {
            tracing::debug!(host = %self.host(), backward, "move at list boundary ignored");
            return Ok(());
        };

        self.dispatch(Command::MoveArrayItem {
            path: String::new(),
            from: prop,
            to,
            from_path: None,
        })
        .await?;

        let env = self.env().clone();
        let mut doc = env.doc_mut();
        let host = self.host();
        if backward {
            if let Some(previous) = sibling_item(&env, &doc, host, true)
                && let Some(parent) = doc.parent(host)
            {
                doc.insert_before(parent, host, Some(previous))?;
            }
        } else if let Some(next) = sibling_item(&env, &doc, host, false) {
            doc.insert_after(next, host)?;
        }
        Ok(())
    }

    /// Remove this entry and its host.
    pub async fn remove_item(&self) -> Result<(), DispatchError> {
        let prop = self.item_position()?;
        self.dispatch(Command::RemoveArrayItem {
            path: String::new(),
            index: prop,
        })
        .await?;
        let env = self.env().clone();
        hydrate::dehydrate(&env, self.host());
        env.doc_mut().detach(self.host())?;
        hydrate::release(&env, self.host());
        Ok(())
    }

    /// Drop a dragged item on this one.
    ///
    /// Within one list this is a move; from another list it carries that
    /// list's full coordinate so the store can move across lists.
    pub async fn drop_item(
        &self,
        payload: DragPayload,
        drop: DropPosition,
    ) -> Result<(), DispatchError> {
        let prop = self.item_position()?;
        let env = self.env().clone();
        let source = env
            .registry()
            .get(payload.source)
            .filter(|source| env.doc().is_attached(source.host()))
            .ok_or_else(|| EngineError::DragSourceMissing(payload.source.to_string()))?;

        let mut to = match drop {
            DropPosition::Before => prop,
            DropPosition::After => prop + 1,
        };
        let source_list = source.parent();
        let same_list = match (&source_list, self.parent()) {
            (Some(a), Some(b)) => a.ptr_eq(&b),
            _ => false,
        };

        let from_path = if same_list {
            if payload.index < to {
                to -= 1;
            }
            if payload.index == to {
                return Ok(());
            }
            None
        } else {
            let coordinate = source_list.as_ref().and_then(|list| {
                let own = list.attr(attrs::PROP).unwrap_or_default();
                list.resolve_coordinate(&own)
            });
            let Some(coordinate) = coordinate else {
                return Err(DispatchError::Unresolved(format!(
                    "drag source list of {}",
                    payload.source
                )));
            };
            Some(coordinate)
        };

        {
            let mut doc = env.doc_mut();
            if !same_list {
                doc.set_attr(source.host(), attrs::PROP, &to.to_string())?;
            }
            match drop {
                DropPosition::After => doc.insert_after(self.host(), source.host())?,
                DropPosition::Before => {
                    let parent = doc
                        .parent(self.host())
                        .ok_or(EngineError::StaleNode(self.host()))?;
                    doc.insert_before(parent, source.host(), Some(self.host()))?;
                }
            }
        }

        self.dispatch(Command::MoveArrayItem {
            path: String::new(),
            from: payload.index,
            to,
            from_path,
        })
        .await?;
        Ok(())
    }
}

/// Index a new neighbor entry is inserted at.
fn neighbor(direction: ArrayDirection, prop: usize) -> usize {
    if direction.is_reversed() {
        prop.saturating_sub(1)
    } else {
        prop + 1
    }
}

fn sibling_item(
    env: &crate::engine::env::Env,
    doc: &crate::engine::Document,
    host: NodeId,
    previous: bool,
) -> Option<NodeId> {
    let mut current = if previous {
        doc.prev_sibling(host)
    } else {
        doc.next_sibling(host)
    };
    while let Some(node) = current {
        if doc.is_element(node) {
            let is_item = env
                .registry()
                .get(node)
                .is_some_and(|binding| binding.kind() == RegionKind::ArrayItem);
            return is_item.then_some(node);
        }
        current = if previous {
            doc.prev_sibling(node)
        } else {
            doc.next_sibling(node)
        };
    }
    None
}
