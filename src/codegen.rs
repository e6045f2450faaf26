//! Markup → Element-Tree Codegen
//!
//! Walks a `ParsedNode` tree and emits nested element-construction calls
//! `factory(tag, props, ...children)`. Alongside the expression it reports the component
//! identifiers the tree references, in first-reference order, so the bundle linker can embed
//! exactly those definitions.

use lazy_static::lazy_static;
use log::warn;
use regex::Regex;

use crate::parse::{
    is_component_tag, parse_markup, AttrValue, Attribute, NodeKind, ParsedNode, TextPart,
    FRAGMENT_TAG, SLOT_TAG,
};

/// Identifiers the runtime provides; never embedded.
pub const BUILTIN_COMPONENTS: &[&str] = &["React", "Fragment", "Suspense", "StrictMode"];

const INDENT: &str = "    ";

lazy_static! {
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
    static ref IDENT_RE: Regex = Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIONS & OUTPUT
// ═══════════════════════════════════════════════════════════════════════════════

/// What the layout slot element renders as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotFill<'a> {
    /// Standalone layout module: the caller's children.
    Children,
    /// Page compile: the page's generated tree, verbatim.
    Tree(&'a str),
}

#[derive(Debug, Clone, Copy)]
pub struct CodegenOptions<'a> {
    pub factory: &'a str,
    pub fragment: &'a str,
    pub slot: SlotFill<'a>,
}

impl Default for CodegenOptions<'_> {
    fn default() -> Self {
        Self {
            factory: "React.createElement",
            fragment: "React.Fragment",
            slot: SlotFill::Children,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedTree {
    pub code: String,
    /// Referenced component identifiers, first-reference order, no duplicates.
    pub references: Vec<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse and generate. A markup parse failure degrades to the original text as a string.
///
/// html5ever recovers from malformed markup on its own, so only a failing read of the input
/// reaches the fallback.
pub fn generate_markup(markup: &str, file: &str, options: &CodegenOptions) -> GeneratedTree {
    match parse_markup(markup, file) {
        Ok(root) => generate(&root, options),
        Err(e) => {
            warn!("{}: {}; emitting markup as text", e.code(), e);
            unparsed_tree(markup)
        }
    }
}

/// The whole markup as one string literal, referencing nothing.
pub fn unparsed_tree(markup: &str) -> GeneratedTree {
    GeneratedTree {
        code: quote_single(markup),
        references: Vec::new(),
    }
}

pub fn generate(root: &ParsedNode, options: &CodegenOptions) -> GeneratedTree {
    let mut gen = Generator {
        options,
        references: Vec::new(),
    };

    let children = gen.render_children(std::slice::from_ref(root), 1);
    let code = match children.len() {
        0 => "null".to_string(),
        1 => children.into_iter().next().unwrap_or_default(),
        _ => format!(
            "{}({}, null,\n{}{}\n)",
            options.factory,
            options.fragment,
            INDENT,
            children.join(&format!(",\n{}", INDENT))
        ),
    };

    GeneratedTree {
        code,
        references: gen.references,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// GENERATOR
// ═══════════════════════════════════════════════════════════════════════════════

enum Child<'n> {
    Node(&'n ParsedNode),
    Text(Vec<&'n TextPart>),
}

struct Generator<'a> {
    options: &'a CodegenOptions<'a>,
    references: Vec<String>,
}

impl Generator<'_> {
    /// Rendered child expressions of a node list, after unwrapping and text coalescing.
    fn render_children(&mut self, nodes: &[ParsedNode], depth: usize) -> Vec<String> {
        let mut flat = Vec::new();
        flatten(nodes, &mut flat);

        let mut out = Vec::new();
        for child in coalesce(flat) {
            match child {
                Child::Text(parts) => {
                    if let Some(text) = render_text(&parts) {
                        out.push(text);
                    }
                }
                Child::Node(node) => out.push(self.render_element(node, depth)),
            }
        }
        out
    }

    fn render_element(&mut self, node: &ParsedNode, depth: usize) -> String {
        if node.tag_name == SLOT_TAG {
            return match self.options.slot {
                SlotFill::Children => "props.children".to_string(),
                SlotFill::Tree(tree) => tree.to_string(),
            };
        }

        let props = render_props(&node.attributes);

        if is_component_tag(&node.tag_name) {
            self.note_reference(&node.tag_name);
            // Component references never carry a children argument.
            return format!("{}({}, {})", self.options.factory, node.tag_name, props);
        }

        let tag = quote_single(&node.tag_name);
        let children = self.render_children(&node.children, depth + 1);
        if children.is_empty() {
            return format!("{}({}, {})", self.options.factory, tag, props);
        }

        let inner = INDENT.repeat(depth + 1);
        let outer = INDENT.repeat(depth);
        format!(
            "{}({}, {},\n{}{}\n{})",
            self.options.factory,
            tag,
            props,
            inner,
            children.join(&format!(",\n{}", inner)),
            outer
        )
    }

    fn note_reference(&mut self, tag_name: &str) {
        let head = tag_name.split('.').next().unwrap_or(tag_name);
        if BUILTIN_COMPONENTS.contains(&head) {
            return;
        }
        if !self.references.iter().any(|r| r == head) {
            self.references.push(head.to_string());
        }
    }
}

fn is_unwrapped(node: &ParsedNode) -> bool {
    match node.kind {
        NodeKind::Fragment => true,
        NodeKind::Element => matches!(
            node.tag_name.as_str(),
            "html" | "head" | "body" | FRAGMENT_TAG | "Fragment" | "React.Fragment"
        ),
        _ => false,
    }
}

/// Document wrappers and fragment markers dissolve into the surrounding sibling list.
fn flatten<'n>(nodes: &'n [ParsedNode], out: &mut Vec<&'n ParsedNode>) {
    for node in nodes {
        if is_unwrapped(node) {
            flatten(&node.children, out);
        } else if node.kind != NodeKind::Comment {
            out.push(node);
        }
    }
}

fn coalesce(nodes: Vec<&ParsedNode>) -> Vec<Child<'_>> {
    let mut out: Vec<Child> = Vec::new();
    for node in nodes {
        if node.kind == NodeKind::Text {
            if let Some(Child::Text(parts)) = out.last_mut() {
                parts.extend(node.text.iter());
                continue;
            }
            out.push(Child::Text(node.text.iter().collect()));
        } else {
            out.push(Child::Node(node));
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEXT
// ═══════════════════════════════════════════════════════════════════════════════

/// Render a run of text parts, or `None` when it is whitespace only.
///
/// Whitespace collapses to single spaces and the run is trimmed at both ends. Literals are
/// emitted only when non-empty; a run ending in an expression gets a trailing `''`.
pub fn render_text(parts: &[&TextPart]) -> Option<String> {
    let mut segments: Vec<TextPart> = Vec::new();
    for part in parts {
        match part {
            TextPart::Literal(s) => {
                let collapsed = WHITESPACE_RE.replace_all(s, " ");
                if let Some(TextPart::Literal(prev)) = segments.last_mut() {
                    prev.push_str(&collapsed);
                    let merged = WHITESPACE_RE.replace_all(prev, " ").into_owned();
                    *prev = merged;
                } else {
                    segments.push(TextPart::Literal(collapsed.into_owned()));
                }
            }
            TextPart::Expr(code) => segments.push(TextPart::Expr(code.clone())),
        }
    }

    if let Some(TextPart::Literal(first)) = segments.first_mut() {
        *first = first.trim_start().to_string();
    }
    if let Some(TextPart::Literal(last)) = segments.last_mut() {
        *last = last.trim_end().to_string();
    }
    segments.retain(|s| !matches!(s, TextPart::Literal(l) if l.is_empty()));

    if segments.is_empty() {
        return None;
    }

    let mut pieces: Vec<String> = segments
        .iter()
        .map(|s| match s {
            TextPart::Literal(l) => quote_single(l),
            TextPart::Expr(code) => format!("({})", code),
        })
        .collect();
    if matches!(segments.last(), Some(TextPart::Expr(_))) {
        pieces.push("''".to_string());
    }
    Some(pieces.join(" + "))
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROPS
// ═══════════════════════════════════════════════════════════════════════════════

fn prop_key(name: &str) -> String {
    let name = match name {
        "class" | "classname" => "className",
        "for" => "htmlFor",
        other => other,
    };
    if IDENT_RE.is_match(name) {
        name.to_string()
    } else {
        format!("\"{}\"", escape_js_string(name))
    }
}

pub fn render_props(attributes: &[Attribute]) -> String {
    if attributes.is_empty() {
        return "null".to_string();
    }

    let entries: Vec<String> = attributes
        .iter()
        .map(|attr| {
            let value = match &attr.value {
                AttrValue::Str(s) => format!("\"{}\"", escape_js_string(s)),
                AttrValue::Expr(code) => code.clone(),
                AttrValue::Bool(b) => b.to_string(),
            };
            format!("{}: {}", prop_key(&attr.name), value)
        })
        .collect();

    format!("{{{}}}", entries.join(", "))
}

// ═══════════════════════════════════════════════════════════════════════════════
// STRING ESCAPING
// ═══════════════════════════════════════════════════════════════════════════════

fn escape_js_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "")
}

/// Single-quoted JavaScript string literal.
pub fn quote_single(s: &str) -> String {
    let escaped = s
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('\r', "");
    format!("'{}'", escaped)
}
