//! Source regions.
//!
//! A source region edits one element of a file's raw markup. The element is
//! found by its unique `data-key` attribute; its inner content goes to the
//! editor, and edits are spliced back into the file with the surrounding
//! indentation and whitespace preserved.
//!
//! ```text
//! <div data-key="intro">\n    <p>Hi</p>\n</div>
//!                       ^^^^^^^^^^^^^^^^^^^
//!                       leading | indent + content | trailing
//! ```

use std::fmt;
use std::ops::Range;
use std::rc::Rc;

use super::binding::{BindingNode, PushContext};
use super::text;
use crate::engine::attrs;
use crate::engine::env::EditorOptions;
use crate::engine::value::Value;
use crate::renderer::diagnostics::Diagnostic;
use crate::store::{RemoteFile, SubscriptionId};
use crate::types::TextType;

const HEADING: &str = "Failed to render source editable region";

const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

#[derive(Default)]
pub struct SourceRegion {
    pub file: Option<Rc<dyn RemoteFile>>,
    subscription: Option<SubscriptionId>,
    pub format: SourceFormat,
}

impl fmt::Debug for SourceRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRegion")
            .field("file", &self.file.as_ref().map(|file| file.path().to_string()))
            .field("subscription", &self.subscription)
            .field("format", &self.format)
            .finish()
    }
}

/// Whitespace around the edited content, captured on every update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFormat {
    /// Whitespace before the first content line, through its last newline.
    pub leading: String,
    /// Newline and whitespace after the last content line.
    pub trailing: String,
    /// Indentation shared by every non-blank content line.
    pub indent: String,
}

impl SourceFormat {
    pub fn capture(content: &str) -> Self {
        let first = content
            .find(|c: char| !c.is_whitespace())
            .unwrap_or(content.len());
        let leading = match content[..first].rfind('\n') {
            Some(newline) if first < content.len() => content[..=newline].to_string(),
            _ => String::new(),
        };

        let last = content.trim_end().len();
        let trailing = if last > 0 && content[last..].starts_with('\n') {
            content[last..].to_string()
        } else {
            String::new()
        };

        let mut indent: Option<&str> = None;
        for line in content.lines().filter(|line| !line.trim().is_empty()) {
            if indent.is_none_or(|shared| !line.starts_with(shared)) {
                let width = line.len() - line.trim_start().len();
                indent = Some(&line[..width]);
            }
        }

        Self {
            leading,
            trailing,
            indent: indent.unwrap_or_default().to_string(),
        }
    }

    /// The content as the editor sees it: outer whitespace and shared
    /// indentation removed.
    pub fn strip(&self, content: &str) -> String {
        let end = content.len().saturating_sub(self.trailing.len()).max(self.leading.len());
        content[self.leading.len()..end]
            .split('\n')
            .map(|line| line.strip_prefix(self.indent.as_str()).unwrap_or(line))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Re-apply the captured layout to edited content.
    pub fn apply(&self, edited: &str) -> String {
        let body: Vec<String> = edited
            .split('\n')
            .map(|line| format!("{}{line}", self.indent))
            .collect();
        format!("{}{}{}", self.leading, body.join("\n"), self.trailing)
    }
}

// =============================================================================
// Markup Scanning
// =============================================================================

struct Tag {
    name: String,
    closing: bool,
    self_closing: bool,
    len: usize,
}

/// Parse the tag at the start of `input`, which begins with `<`.
fn parse_tag(input: &str) -> Option<Tag> {
    let rest = input.strip_prefix('<')?.trim_start();
    let (closing, rest) = match rest.strip_prefix('/') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, rest),
    };
    if !rest.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }
    let name_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .unwrap_or(rest.len());
    let end = input.find('>')?;
    Some(Tag {
        name: rest[..name_len].to_ascii_lowercase(),
        closing,
        self_closing: !closing && input[..end].trim_end().ends_with('/'),
        len: end + 1,
    })
}

fn key_marker(key: &str) -> String {
    format!("{}=\"{key}\"", attrs::KEY)
}

/// Byte range of the inner content of the element carrying `data-key`.
/// Unclosed elements run to the end of the source.
pub fn content_range(source: &str, key: &str) -> Option<Range<usize>> {
    let key_at = source.find(&key_marker(key))?;
    let open_at = source[..key_at].rfind('<')?;
    let name = parse_tag(&source[open_at..])?.name;
    let start = key_at + source[key_at..].find('>')? + 1;

    let mut stack = vec![name];
    let mut cursor = start;
    while let Some(offset) = source[cursor..].find('<') {
        let at = cursor + offset;
        let Some(tag) = parse_tag(&source[at..]) else {
            cursor = at + 1;
            continue;
        };
        if tag.closing {
            while let Some(open) = stack.pop() {
                if open == tag.name {
                    break;
                }
            }
        } else if !tag.self_closing && !VOID_ELEMENTS.contains(&tag.name.as_str()) {
            stack.push(tag.name);
        }
        if stack.is_empty() {
            return Some(start..at);
        }
        cursor = at + tag.len;
    }
    Some(start..source.len())
}

// =============================================================================
// Capabilities
// =============================================================================

pub(crate) fn validate_configuration(node: &BindingNode) -> bool {
    for (attr, message) in [
        (attrs::PATH, "Missing required attribute data-path"),
        (attrs::KEY, "Missing required attribute data-key"),
    ] {
        if node.attr(attr).is_none() {
            node.show_diagnostic(&Diagnostic::new(HEADING, message));
            return false;
        }
    }
    true
}

pub(crate) fn validate_value(node: &BindingNode, value: Value) -> Option<Value> {
    let source = match &value {
        Value::Null => return Some(value),
        Value::String(source) => source,
        other => {
            node.show_diagnostic(&Diagnostic::new(
                HEADING,
                format!("Illegal value type: {}. Supported types are string.", other.type_name()),
            ));
            return None;
        }
    };
    let Some(key) = node.attr(attrs::KEY) else {
        return Some(value);
    };
    let marker = key_marker(&key);
    let message = match source.match_indices(&marker).count() {
        0 => "Failed to find element with matching data-key attribute",
        1 => return Some(value),
        _ => "Found duplicate data-key attribute. Make sure all source editables have unique data-key attributes",
    };
    node.show_diagnostic(&Diagnostic::new(HEADING, message));
    None
}

/// Fetch the file named by `data-path`, follow its changes and push its
/// source as this node's value.
pub(crate) async fn connect(node: &BindingNode) {
    let Some(path) = node.attr(attrs::PATH) else {
        return;
    };
    let file = match node.env().store().file(&path).await {
        Ok(file) => file,
        Err(err) => {
            tracing::error!(host = %node.host(), path, error = %err, "source file unavailable");
            return;
        }
    };
    let weak = node.downgrade();
    let subscription = file.subscribe(Rc::new(move || {
        if let Some(node) = weak.upgrade() {
            let env = node.env().clone();
            env.spawn(async move { push_source(&node).await });
        }
    }));
    tracing::debug!(host = %node.host(), path, "subscribed to source file");
    if let super::Region::Source(region) = &mut *node.region_mut() {
        region.file = Some(file);
        region.subscription = Some(subscription);
    }
    push_source(node).await;
}

fn file_of(node: &BindingNode) -> Option<Rc<dyn RemoteFile>> {
    match &*node.region() {
        super::Region::Source(region) => region.file.clone(),
        _ => None,
    }
}

async fn push_source(node: &BindingNode) {
    let Some(file) = file_of(node) else {
        return;
    };
    match file.source().await {
        Ok(source) => {
            let context = PushContext::at(format!("@file[{}]", file.path()));
            node.push_value(Value::String(source), None, None, context).await;
        }
        Err(err) => tracing::error!(host = %node.host(), error = %err, "failed to read source"),
    }
}

pub(crate) fn unmount(node: &BindingNode) {
    let watched = match &mut *node.region_mut() {
        super::Region::Source(region) => region.file.clone().zip(region.subscription.take()),
        _ => None,
    };
    if let Some((file, subscription)) = watched {
        file.unsubscribe(subscription);
    }
}

pub(crate) fn mount(node: &BindingNode) {
    let text_type = node
        .attr(attrs::TYPE)
        .and_then(|declared| TextType::from_attr(&declared))
        .unwrap_or_default();
    let weak = node.downgrade();
    node.env().editor().attach(
        node.host(),
        EditorOptions {
            text_type,
            source: true,
        },
        Rc::new(move |content| {
            if let Some(node) = weak.upgrade() {
                let env = node.env().clone();
                env.spawn(async move { on_change(&node, content.unwrap_or_default()).await });
            }
        }),
    );
    text::watch_focus(node);
}

pub(crate) fn update(node: &BindingNode) {
    let Some(Value::String(source)) = node.value() else {
        return;
    };
    let Some(key) = node.attr(attrs::KEY) else {
        return;
    };
    let Some(range) = content_range(&source, &key) else {
        return;
    };
    let format = SourceFormat::capture(&source[range.clone()]);
    let content = format.strip(&source[range]);
    if let super::Region::Source(region) = &mut *node.region_mut() {
        region.format = format;
    }
    let env = node.env();
    let result = env.editor().set_content(&mut env.doc_mut(), node.host(), &content);
    if let Err(err) = result {
        tracing::error!(host = %node.host(), error = %err, "failed to set editor content");
    }
}

/// Splice an edit back into the latest source and save it.
async fn on_change(node: &BindingNode, edited: String) {
    let (Some(file), Some(key)) = (file_of(node), node.attr(attrs::KEY)) else {
        return;
    };
    let source = match file.source().await {
        Ok(source) => source,
        Err(err) => {
            tracing::error!(host = %node.host(), error = %err, "failed to read source");
            return;
        }
    };
    let Some(range) = content_range(&source, &key) else {
        tracing::warn!(host = %node.host(), key, "edited element no longer in source");
        return;
    };
    let format = match &*node.region() {
        super::Region::Source(region) => region.format.clone(),
        _ => return,
    };
    let spliced = format!(
        "{}{}{}",
        &source[..range.start],
        format.apply(&edited),
        &source[range.end..]
    );
    if node.value().as_ref().and_then(Value::as_str) == Some(spliced.as_str()) {
        return;
    }
    node.set_value(Some(Value::String(spliced.clone())));
    if let Err(err) = file.set_source(spliced).await {
        tracing::error!(host = %node.host(), error = %err, "failed to save source");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::env::{Env, PlainTextEditor};
    use crate::engine::vnode::VNode;
    use crate::pipeline::hydrate;
    use crate::store::{MemoryStore, StoreTarget};
    use futures::executor::LocalPool;
    use serde_json::json;

    const PAGE: &str = "<main>\n  <div data-key=\"intro\">\n    <p>Hi</p>\n    <br>\n  </div>\n  <div data-key=\"outro\"><img src=\"a\"/></div>\n</main>\n";

    fn setup(key: &str) -> (LocalPool, Rc<MemoryStore>, Rc<PlainTextEditor>, Rc<Env>, BindingNode) {
        let mut pool = LocalPool::new();
        let store = Rc::new(MemoryStore::new());
        store.insert_file("index.md", json!({}));
        store.insert_file("page.html", json!({}));
        store.insert_source("page.html", PAGE);
        let editor = Rc::new(PlainTextEditor::new());
        let env = Env::builder(store.clone(), Rc::new(pool.spawner()))
            .editor(editor.clone())
            .build();
        let host = {
            let mut doc = env.doc_mut();
            let host = doc
                .materialize(
                    &VNode::element("source-editable")
                        .attr("data-path", "page.html")
                        .attr("data-key", key),
                )
                .unwrap();
            let root = doc.root();
            doc.append_child(root, host).unwrap();
            host
        };
        let node = hydrate::hydrate(&env, host).remove(0);
        env.ready().mark_ready();
        pool.run_until_stalled();
        (pool, store, editor, env, node)
    }

    #[test]
    fn test_content_range_skips_void_and_nested() {
        let range = content_range(PAGE, "intro").unwrap();
        assert_eq!(&PAGE[range], "\n    <p>Hi</p>\n    <br>\n  ");
        let range = content_range(PAGE, "outro").unwrap();
        assert_eq!(&PAGE[range], "<img src=\"a\"/>");
        assert_eq!(content_range(PAGE, "missing"), None);
    }

    #[test]
    fn test_format_capture() {
        let format = SourceFormat::capture("\n    <p>Hi</p>\n    <br>\n  ");
        assert_eq!(format.leading, "\n");
        assert_eq!(format.trailing, "\n  ");
        assert_eq!(format.indent, "    ");
        assert_eq!(format.strip("\n    <p>Hi</p>\n    <br>\n  "), "<p>Hi</p>\n<br>");
        assert_eq!(format.apply("<p>Yo</p>"), "\n    <p>Yo</p>\n  ");

        let inline = SourceFormat::capture("<b>x</b>");
        assert_eq!(inline, SourceFormat::default());
    }

    #[test]
    fn test_extracted_content_reaches_editor() {
        let (_pool, _store, editor, env, node) = setup("intro");
        assert!(editor.options(node.host()).unwrap().source);
        assert_eq!(env.doc().text_content(node.host()), "<p>Hi</p>\n<br>");
    }

    #[test]
    fn test_edit_is_spliced_with_indentation() {
        let (mut pool, store, editor, env, node) = setup("intro");
        editor.input(&env, node.host(), "<p>Yo</p>").unwrap();
        pool.run_until_stalled();
        assert_eq!(
            store.file_source("page.html").unwrap(),
            "<main>\n  <div data-key=\"intro\">\n    <p>Yo</p>\n  </div>\n  <div data-key=\"outro\"><img src=\"a\"/></div>\n</main>\n"
        );
    }

    #[test]
    fn test_missing_key_is_reported() {
        let (_pool, _store, _editor, env, node) = setup("nowhere");
        let doc = env.doc();
        let card = doc.first_child(node.host()).unwrap();
        assert_eq!(
            doc.attr(card, "message"),
            Some("Failed to find element with matching data-key attribute")
        );
    }

    #[test]
    fn test_disconnect_unsubscribes() {
        let (mut pool, store, _editor, _env, node) = setup("intro");
        let page = StoreTarget::File("page.html".into());
        assert_eq!(store.subscriber_count(&page), 1);
        drop(node.disconnect());
        pool.run_until_stalled();
        assert_eq!(store.subscriber_count(&page), 0);
    }
}
