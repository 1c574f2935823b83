//! Owned subtree descriptions.
//!
//! Renderers produce a [`VNode`] instead of touching the live document. The
//! tree reconciler then patches the live arena against it and materializes
//! only the parts that actually have to be inserted.

use indexmap::IndexMap;

/// A rendered node: either an element or a run of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VNode {
    Element(VElement),
    Text(String),
}

/// A rendered element with ordered attributes and children.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VElement {
    pub tag: String,
    pub attrs: IndexMap<String, String>,
    pub children: Vec<VNode>,
}

impl VNode {
    /// Start building an element.
    pub fn element(tag: impl Into<String>) -> Self {
        VNode::Element(VElement {
            tag: tag.into(),
            ..Default::default()
        })
    }

    pub fn text(content: impl Into<String>) -> Self {
        VNode::Text(content.into())
    }

    /// Builder: set an attribute. No-op on text nodes.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let VNode::Element(el) = &mut self {
            el.attrs.insert(name.into(), value.into());
        }
        self
    }

    /// Builder: append a child. No-op on text nodes.
    pub fn child(mut self, child: VNode) -> Self {
        if let VNode::Element(el) = &mut self {
            el.children.push(child);
        }
        self
    }

    /// Builder: append several children.
    pub fn children(mut self, children: impl IntoIterator<Item = VNode>) -> Self {
        if let VNode::Element(el) = &mut self {
            el.children.extend(children);
        }
        self
    }

    pub fn is_element(&self) -> bool {
        matches!(self, VNode::Element(_))
    }

    pub fn as_element(&self) -> Option<&VElement> {
        match self {
            VNode::Element(el) => Some(el),
            VNode::Text(_) => None,
        }
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.as_element()
            .and_then(|el| el.attrs.get(name))
            .map(String::as_str)
    }

    /// Concatenated text of this subtree.
    pub fn text_content(&self) -> String {
        match self {
            VNode::Text(text) => text.clone(),
            VNode::Element(el) => el.children.iter().map(VNode::text_content).collect(),
        }
    }

    /// Remove every element with one of the given tags, recursively.
    pub fn strip_tags(&mut self, tags: &[String]) {
        if let VNode::Element(el) = self {
            el.children.retain(|child| match child {
                VNode::Element(c) => !tags.iter().any(|t| t.eq_ignore_ascii_case(&c.tag)),
                VNode::Text(_) => true,
            });
            for child in &mut el.children {
                child.strip_tags(tags);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let node = VNode::element("div")
            .attr("class", "card")
            .child(VNode::text("Hello"))
            .child(VNode::element("span").child(VNode::text(" world")));

        assert_eq!(node.get_attr("class"), Some("card"));
        assert_eq!(node.text_content(), "Hello world");
        assert!(VNode::text("x").attr("a", "b").as_element().is_none());
    }

    #[test]
    fn test_strip_tags() {
        let mut node = VNode::element("div")
            .child(VNode::element("noscript").child(VNode::text("no js")))
            .child(VNode::element("p").child(VNode::element("NOSCRIPT")))
            .child(VNode::text("kept"));

        node.strip_tags(&["noscript".to_string()]);
        assert_eq!(
            node,
            VNode::element("div")
                .child(VNode::element("p"))
                .child(VNode::text("kept"))
        );
    }
}
