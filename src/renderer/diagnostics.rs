//! Inline diagnostic cards.
//!
//! A region that cannot render shows a card in place of its content and gets
//! the errored class. Diagnostics never propagate to ancestors; the region
//! stays connected and recovers on the next valid value.

use crate::config::EngineConfig;
use crate::engine::Document;
use crate::engine::vnode::VNode;
use crate::error::{EngineError, RenderError};
use crate::types::NodeId;

pub const ERROR_CARD_TAG: &str = "editable-region-error-card";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub heading: String,
    pub message: String,
    pub hint: Option<String>,
    pub stack: Option<String>,
}

impl Diagnostic {
    pub fn new(heading: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            message: message.into(),
            hint: None,
            stack: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Card for a renderer that failed.
    pub fn from_render_error(heading: impl Into<String>, err: &RenderError) -> Self {
        Self {
            heading: heading.into(),
            message: err.message.clone(),
            hint: None,
            stack: err.stack.clone(),
        }
    }

    /// Build the card, keeping at most `stack_lines` lines of stack.
    pub fn to_vnode(&self, stack_lines: usize) -> VNode {
        let mut card = VNode::element(ERROR_CARD_TAG)
            .attr("heading", self.heading.as_str())
            .attr("message", self.message.as_str());
        if let Some(hint) = &self.hint {
            card = card.attr("hint", hint.as_str());
        }
        if let Some(stack) = &self.stack {
            let trimmed: Vec<&str> = stack.lines().take(stack_lines).collect();
            card = card.attr("stack", trimmed.join("\n"));
        }
        card
    }
}

pub fn is_card(doc: &Document, node: NodeId) -> bool {
    doc.tag(node) == Some(ERROR_CARD_TAG)
}

/// Replace the host's content with a card.
pub fn show(
    doc: &mut Document,
    host: NodeId,
    diagnostic: &Diagnostic,
    config: &EngineConfig,
) -> Result<(), EngineError> {
    show_keeping(doc, host, diagnostic, config, |_, _| false)
}

/// Replace the host's content with a card, keeping children that match.
pub fn show_keeping(
    doc: &mut Document,
    host: NodeId,
    diagnostic: &Diagnostic,
    config: &EngineConfig,
    keep: impl Fn(&Document, NodeId) -> bool,
) -> Result<(), EngineError> {
    tracing::warn!(%host, heading = %diagnostic.heading, message = %diagnostic.message, "showing diagnostic");
    doc.add_class(host, &config.errored_class)?;
    for child in doc.children(host) {
        if !keep(doc, child) {
            doc.release(child)?;
        }
    }
    let card = doc.materialize(&diagnostic.to_vnode(config.stack_lines))?;
    doc.append_child(host, card)
}

/// Swap a single node for a card, leaving its siblings alone.
pub fn replace_node(
    doc: &mut Document,
    node: NodeId,
    diagnostic: &Diagnostic,
    config: &EngineConfig,
) -> Result<NodeId, EngineError> {
    tracing::warn!(%node, heading = %diagnostic.heading, message = %diagnostic.message, "replacing node with diagnostic");
    let card = doc.materialize(&diagnostic.to_vnode(config.stack_lines))?;
    doc.replace(node, card)?;
    doc.release(node)?;
    Ok(card)
}

/// Remove the errored class and any cards directly under the host.
pub fn clear(doc: &mut Document, host: NodeId, config: &EngineConfig) -> Result<(), EngineError> {
    doc.remove_class(host, &config.errored_class)?;
    for child in doc.children(host) {
        if is_card(doc, child) {
            doc.release(child)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn setup() -> (Document, NodeId, EngineConfig) {
        let mut doc = Document::new();
        let host = doc
            .materialize(
                &VNode::element("div")
                    .child(VNode::element("template"))
                    .child(VNode::element("p").child(VNode::text("old"))),
            )
            .unwrap();
        let root = doc.root();
        doc.append_child(root, host).unwrap();
        (doc, host, EngineConfig::default())
    }

    #[test]
    fn test_stack_is_trimmed() {
        let err = RenderError::new("boom").with_stack("1\n2\n3\n4\n5\n6\n7");
        let card =
            Diagnostic::from_render_error("Failed to render component: Card", &err).to_vnode(5);
        assert_eq!(card.get_attr("stack"), Some("1\n2\n3\n4\n5"));
        assert_eq!(card.get_attr("message"), Some("boom"));
    }

    #[traced_test]
    #[test]
    fn test_show_and_clear() {
        let (mut doc, host, config) = setup();
        let diagnostic = Diagnostic::new("Failed", "Missing attribute").with_hint("Add it");
        show_keeping(&mut doc, host, &diagnostic, &config, |doc, node| {
            doc.tag(node) == Some("template")
        })
        .unwrap();

        let children = doc.children(host);
        assert_eq!(children.len(), 2);
        assert_eq!(doc.tag(children[0]), Some("template"));
        assert!(is_card(&doc, children[1]));
        assert_eq!(doc.attr(children[1], "hint"), Some("Add it"));
        assert!(doc.has_class(host, "errored"));
        assert!(logs_contain("showing diagnostic"));

        clear(&mut doc, host, &config).unwrap();
        assert!(!doc.has_class(host, "errored"));
        assert_eq!(doc.children(host).len(), 1);
    }
}
