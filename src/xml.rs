//! Format-preserving edits on XML manifests.
//!
//! Documents are read with `roxmltree` and changed by splicing the raw source
//! at the byte ranges `roxmltree::Node::range()` reports. Text outside the
//! spliced ranges, including comments, attribute order and whitespace, is
//! never rewritten.

use std::borrow::Cow;
use std::path::Path;

use roxmltree::{Document, Node};

use crate::error::{ManifestError, Result};

pub(crate) fn parse<'a>(source: &'a str, path: &Path) -> Result<Document<'a>> {
    Document::parse(source).map_err(|e| ManifestError::xml(path, e))
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Edits
// ═══════════════════════════════════════════════════════════════════════════════

pub(crate) use crate::splice::{apply, line_range, Edit};

pub(crate) fn remove_node(source: &str, node: Node) -> Edit {
    Edit::delete(line_range(source, node.range()))
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Layout
// ═══════════════════════════════════════════════════════════════════════════════

/// Line ending and indentation step detected from a document.
#[derive(Debug, Clone)]
pub(crate) struct Layout {
    pub newline: &'static str,
    pub unit: String,
}

impl Layout {
    pub fn detect(source: &str, doc: &Document) -> Self {
        let newline = if source.contains("\r\n") { "\r\n" } else { "\n" };
        let unit = elements(doc.root_element())
            .next()
            .map(|first| indent_at(source, first.range().start).to_string())
            .filter(|unit| !unit.is_empty())
            .unwrap_or_else(|| "  ".to_string());
        Self { newline, unit }
    }

    /// Indentation for children of `parent`.
    pub fn child_indent(&self, source: &str, parent: Node) -> String {
        format!("{}{}", indent_at(source, parent.range().start), self.unit)
    }
}

/// Whitespace between the start of the line and `pos`; empty when anything
/// else precedes `pos` on that line.
pub(crate) fn indent_at(source: &str, pos: usize) -> &str {
    let line_start = source[..pos].rfind('\n').map_or(0, |i| i + 1);
    let prefix = &source[line_start..pos];
    if prefix.chars().all(|c| c == ' ' || c == '\t') {
        prefix
    } else {
        ""
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Rendering
// ═══════════════════════════════════════════════════════════════════════════════

pub(crate) fn escape(value: &str) -> Cow<'_, str> {
    if !value.contains(['&', '<', '>', '"']) {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn render_attrs(attrs: &[(&str, &str)]) -> String {
    attrs
        .iter()
        .map(|(k, v)| format!(" {k}=\"{}\"", escape(v)))
        .collect()
}

/// `<Name attrs />`, or with one `<key>value</key>` line per metadata entry.
/// The first line carries no indentation; `indent` is where the element sits.
pub(crate) fn render_element<'m>(
    name: &str,
    attrs: &[(&str, &str)],
    metadata: impl IntoIterator<Item = (&'m str, &'m str)>,
    indent: &str,
    layout: &Layout,
) -> String {
    let nl = layout.newline;
    let inner = format!("{indent}{}", layout.unit);
    let body: String = metadata
        .into_iter()
        .map(|(k, v)| format!("{nl}{inner}<{k}>{}</{k}>", escape(v)))
        .collect();
    if body.is_empty() {
        format!("<{name}{} />", render_attrs(attrs))
    } else {
        format!("<{name}{}>{body}{nl}{indent}</{name}>", render_attrs(attrs))
    }
}

/// `<ItemGroup>` around already rendered children.
pub(crate) fn render_group(children: &[String], indent: &str, layout: &Layout) -> String {
    let nl = layout.newline;
    let inner = format!("{indent}{}", layout.unit);
    let body: String = children
        .iter()
        .map(|child| format!("{nl}{inner}{child}"))
        .collect();
    format!("<ItemGroup>{body}{nl}{indent}</ItemGroup>")
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Structural edits
// ═══════════════════════════════════════════════════════════════════════════════

/// Byte length of the start tag at the beginning of `raw`.
fn start_tag_len(raw: &str) -> usize {
    let mut quote = None;
    for (i, c) in raw.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return i + 1,
            _ => {}
        }
    }
    raw.len()
}

/// Insert already rendered `text` as the last child element of `parent`.
pub(crate) fn append_child(source: &str, parent: Node, text: &str, layout: &Layout) -> Edit {
    let nl = layout.newline;
    let indent = indent_at(source, parent.range().start);
    let child_indent = format!("{indent}{}", layout.unit);

    if let Some(last) = elements(parent).last() {
        return Edit::insert(last.range().end, format!("{nl}{child_indent}{text}"));
    }

    let range = parent.range();
    let raw = &source[range.clone()];
    let name = parent.tag_name().name();
    if raw.ends_with("/>") {
        let open = raw[..raw.len() - 2].trim_end();
        return Edit::replace(
            range,
            format!("{open}>{nl}{child_indent}{text}{nl}{indent}</{name}>"),
        );
    }
    let open_end = range.start + start_tag_len(raw);
    let close_start = range.start + raw.rfind("</").unwrap_or(raw.len());
    Edit::replace(
        open_end..close_start,
        format!("{nl}{child_indent}{text}{nl}{indent}"),
    )
}

/// Replace the start tag of `node` with one carrying `attrs`, keeping the
/// element's content and its self-closing form.
pub(crate) fn rewrite_start_tag(source: &str, node: Node, attrs: &[(&str, &str)]) -> Edit {
    let range = node.range();
    let raw = &source[range.clone()];
    let len = start_tag_len(raw);
    let self_closing = raw[..len].ends_with("/>");
    let name = node.tag_name().name();
    let attrs = render_attrs(attrs);
    let tag = if self_closing {
        format!("<{name}{attrs} />")
    } else {
        format!("<{name}{attrs}>")
    };
    Edit::replace(range.start..range.start + len, tag)
}

/// Replace the whole element, keeping its indentation.
pub(crate) fn replace_node(node: Node, text: String) -> Edit {
    Edit::replace(node.range(), text)
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Queries
// ═══════════════════════════════════════════════════════════════════════════════

pub(crate) fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.is_element())
}

pub(crate) fn named<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    elements(node).filter(move |n| n.tag_name().name() == tag)
}

pub(crate) fn child_text(node: Node, tag: &str) -> Option<String> {
    elements(node)
        .find(|n| n.tag_name().name() == tag)
        .map(|n| n.text().unwrap_or_default().trim().to_string())
}

/// `<key>value</key>` children as pairs.
pub(crate) fn metadata(node: Node) -> Vec<(String, String)> {
    elements(node)
        .map(|n| {
            (
                n.tag_name().name().to_string(),
                n.text().unwrap_or_default().trim().to_string(),
            )
        })
        .collect()
}

pub(crate) fn attributes<'a>(node: Node<'a, '_>) -> Vec<(&'a str, &'a str)> {
    node.attributes().map(|a| (a.name(), a.value())).collect()
}
