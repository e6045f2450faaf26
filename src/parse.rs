//! Markup Parser
//!
//! Lenient HTML5 parsing of template markup into an owned `ParsedNode` tree.
//!
//! html5ever knows nothing about `{expr}` interpolation or upper-case component tags, so the
//! markup goes through a few text passes first:
//! 1. `<>`/`</>` fragment shorthand becomes `<hc-fragment>`
//! 2. every balanced `{...}` is swapped for an `__HC_EXPR_N__` placeholder
//! 3. self-closing non-void tags are expanded to open/close pairs
//! 4. component tags get a `data-hc-name` marker carrying their original casing
//!
//! The DOM is then converted into `ParsedNode`s, restoring names and expressions. Anything
//! the parser nested inside a component reference is hoisted out, right after the reference,
//! into the enclosing child list.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use lazy_static::lazy_static;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use regex::{Captures, Regex};
use std::collections::{HashMap, HashSet};

use crate::error::{CompileError, Result};
use crate::normalize::is_void_tag;

pub const FRAGMENT_TAG: &str = "hc-fragment";
pub const SLOT_TAG: &str = "hc-slot";
const NAME_MARKER: &str = "data-hc-name";

// ═══════════════════════════════════════════════════════════════════════════════
// TREE TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    Comment,
    Fragment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Str(String),
    Expr(String),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: AttrValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextPart {
    Literal(String),
    Expr(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedNode {
    pub kind: NodeKind,
    pub tag_name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<ParsedNode>,
    /// Text content; empty for non-text nodes.
    pub text: Vec<TextPart>,
}

impl ParsedNode {
    pub fn element(tag_name: impl Into<String>, attributes: Vec<Attribute>) -> Self {
        Self {
            kind: NodeKind::Element,
            tag_name: tag_name.into(),
            attributes,
            children: Vec::new(),
            text: Vec::new(),
        }
    }

    pub fn text(parts: Vec<TextPart>) -> Self {
        Self {
            kind: NodeKind::Text,
            tag_name: String::new(),
            attributes: Vec::new(),
            children: Vec::new(),
            text: parts,
        }
    }

    pub fn fragment(children: Vec<ParsedNode>) -> Self {
        Self {
            kind: NodeKind::Fragment,
            tag_name: String::new(),
            attributes: Vec::new(),
            children,
            text: Vec::new(),
        }
    }

    fn comment(text: String) -> Self {
        Self {
            kind: NodeKind::Comment,
            tag_name: String::new(),
            attributes: Vec::new(),
            children: Vec::new(),
            text: vec![TextPart::Literal(text)],
        }
    }

    pub fn is_component(&self) -> bool {
        self.kind == NodeKind::Element && is_component_tag(&self.tag_name)
    }
}

/// Component iff the first character is upper-case.
pub fn is_component_tag(tag_name: &str) -> bool {
    tag_name
        .chars()
        .next()
        .map(|c| c.is_uppercase())
        .unwrap_or(false)
}

// ═══════════════════════════════════════════════════════════════════════════════
// ATTRIBUTE NAME RESTORATION
// ═══════════════════════════════════════════════════════════════════════════════

lazy_static! {
    /// html5ever lowercases attribute names; these are restored for every element.
    static ref ATTR_CASE_MAP: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("classname", "className");
        m.insert("htmlfor", "htmlFor");
        m.insert("onclick", "onClick");
        m.insert("onchange", "onChange");
        m.insert("onsubmit", "onSubmit");
        m.insert("oninput", "onInput");
        m.insert("onkeydown", "onKeyDown");
        m.insert("onkeyup", "onKeyUp");
        m.insert("onfocus", "onFocus");
        m.insert("onblur", "onBlur");
        m.insert("onmouseenter", "onMouseEnter");
        m.insert("onmouseleave", "onMouseLeave");
        m.insert("suppresshydrationwarning", "suppressHydrationWarning");
        m.insert("defaultvalue", "defaultValue");
        m.insert("defaultchecked", "defaultChecked");
        m.insert("initialvalue", "initialValue");
        m.insert("tabindex", "tabIndex");
        m.insert("readonly", "readOnly");
        m.insert("maxlength", "maxLength");
        m.insert("minlength", "minLength");
        m.insert("autocomplete", "autoComplete");
        m.insert("autofocus", "autoFocus");
        m.insert("contenteditable", "contentEditable");
        m.insert("crossorigin", "crossOrigin");
        m.insert("srcset", "srcSet");
        m.insert("colspan", "colSpan");
        m.insert("rowspan", "rowSpan");
        m.insert("enctype", "encType");
        m.insert("datetime", "dateTime");
        m.insert("accesskey", "accessKey");
        m.insert("charset", "charSet");
        m.insert("spellcheck", "spellCheck");
        m
    };

    /// SVG presentation attributes, restored only on SVG elements.
    static ref SVG_ATTR_CASE_MAP: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("viewbox", "viewBox");
        m.insert("preserveaspectratio", "preserveAspectRatio");
        m.insert("gradienttransform", "gradientTransform");
        m.insert("gradientunits", "gradientUnits");
        m.insert("patternunits", "patternUnits");
        m.insert("patterntransform", "patternTransform");
        m.insert("clippathunits", "clipPathUnits");
        m.insert("markerheight", "markerHeight");
        m.insert("markerwidth", "markerWidth");
        m.insert("pathlength", "pathLength");
        m.insert("stddeviation", "stdDeviation");
        m.insert("textlength", "textLength");
        m.insert("refx", "refX");
        m.insert("refy", "refY");
        m.insert("fill-rule", "fillRule");
        m.insert("clip-rule", "clipRule");
        m.insert("stroke-width", "strokeWidth");
        m.insert("stroke-linecap", "strokeLinecap");
        m.insert("stroke-linejoin", "strokeLinejoin");
        m.insert("stroke-dasharray", "strokeDasharray");
        m.insert("stroke-dashoffset", "strokeDashoffset");
        m.insert("stop-color", "stopColor");
        m.insert("stop-opacity", "stopOpacity");
        m.insert("fill-opacity", "fillOpacity");
        m.insert("stroke-opacity", "strokeOpacity");
        m.insert("xlink:href", "xlinkHref");
        m
    };

    static ref SVG_TAGS: HashSet<&'static str> = [
        "svg", "path", "circle", "ellipse", "line", "polyline", "polygon", "rect", "g",
        "defs", "use", "symbol", "clippath", "mask", "pattern", "marker", "lineargradient",
        "radialgradient", "stop", "filter", "text", "tspan", "textpath", "image",
    ]
    .into_iter()
    .collect();

    /// Attributes whose empty value is meaningful, not a value-less flag.
    static ref KEEP_EMPTY: HashSet<&'static str> = [
        "alt", "value", "placeholder", "title", "content", "href", "src", "action", "name",
        "id", "className", "style", "type", "label", "htmlFor", "defaultValue",
    ]
    .into_iter()
    .collect();

    static ref HTML_TAGS: HashSet<&'static str> = [
        "a", "abbr", "address", "area", "article", "aside", "audio", "b", "base", "bdi", "bdo",
        "blockquote", "body", "br", "button", "canvas", "caption", "cite", "code", "col",
        "colgroup", "data", "datalist", "dd", "del", "details", "dfn", "dialog", "div", "dl",
        "dt", "em", "embed", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2",
        "h3", "h4", "h5", "h6", "head", "header", "hr", "html", "i", "iframe", "img", "input",
        "ins", "kbd", "label", "legend", "li", "link", "main", "map", "mark", "menu", "meta",
        "meter", "nav", "noscript", "object", "ol", "optgroup", "option", "output", "p",
        "picture", "pre", "progress", "q", "s", "samp", "script", "section", "select", "small",
        "source", "span", "strong", "style", "sub", "summary", "sup", "table", "tbody", "td",
        "template", "textarea", "tfoot", "th", "thead", "time", "title", "tr", "track", "u",
        "ul", "var", "video", "wbr",
    ]
    .into_iter()
    .collect();

    static ref EXPR_PLACEHOLDER_RE: Regex = Regex::new(r"__HC_EXPR_(\d+)__").unwrap();
    static ref EXACT_PLACEHOLDER_RE: Regex = Regex::new(r"^\s*__HC_EXPR_(\d+)__\s*$").unwrap();
}

/// Restore the React spelling of a (possibly parser-lowercased) attribute name.
pub fn restore_attr_name(name: &str, tag_name: &str) -> String {
    if name == "class" {
        return "className".to_string();
    }
    if name == "for" {
        return "htmlFor".to_string();
    }
    if SVG_TAGS.contains(tag_name.to_ascii_lowercase().as_str()) {
        if let Some(&restored) = SVG_ATTR_CASE_MAP.get(name) {
            return restored.to_string();
        }
    }
    if let Some(&restored) = ATTR_CASE_MAP.get(name) {
        return restored.to_string();
    }
    name.to_string()
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRE-PARSE PASSES
// ═══════════════════════════════════════════════════════════════════════════════

/// End index (exclusive) of the balanced `{...}` opening at `start`.
///
/// Strings and template literals are skipped, so braces inside them do not count.
fn find_balanced_brace_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = start;
    let mut in_string: Option<u8> = None;
    let mut in_template_literal = false;
    let mut template_brace_depth = 0usize;

    while i < bytes.len() {
        let c = bytes[i];

        if c == b'\\' && i + 1 < bytes.len() {
            i += 2;
            continue;
        }

        if let Some(q) = in_string {
            if c == q {
                in_string = None;
            }
            i += 1;
            continue;
        }

        if in_template_literal {
            if c == b'`' && template_brace_depth == 0 {
                in_template_literal = false;
            } else if c == b'$' && bytes.get(i + 1) == Some(&b'{') {
                template_brace_depth += 1;
                i += 2;
                continue;
            } else if c == b'}' && template_brace_depth > 0 {
                template_brace_depth -= 1;
            }
            i += 1;
            continue;
        }

        match c {
            b'"' | b'\'' if depth > 0 => in_string = Some(c),
            b'`' if depth > 0 => in_template_literal = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }

        i += 1;
    }

    None
}

/// Replace every balanced `{...}` with a placeholder. Returns the rewritten markup and the
/// expression sources, indexed by placeholder number.
fn extract_expressions(markup: &str) -> (String, Vec<String>) {
    let bytes = markup.as_bytes();
    let mut out = String::with_capacity(markup.len());
    let mut expressions = Vec::new();
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(end) = find_balanced_brace_end(bytes, i) {
                out.push_str(&markup[copied..i]);
                // Unquoted attribute values are quoted so a following `/>` stays out of them.
                if i > 0 && bytes[i - 1] == b'=' {
                    out.push_str(&format!("\"__HC_EXPR_{}__\"", expressions.len()));
                } else {
                    out.push_str(&format!("__HC_EXPR_{}__", expressions.len()));
                }
                expressions.push(markup[i + 1..end - 1].trim().to_string());
                i = end;
                copied = end;
                continue;
            }
        }
        i += 1;
    }

    out.push_str(&markup[copied..]);
    (out, expressions)
}

fn expand_fragment_shorthand(markup: &str) -> String {
    markup
        .replace("<>", &format!("<{}>", FRAGMENT_TAG))
        .replace("</>", &format!("</{}>", FRAGMENT_TAG))
}

/// html5ever treats `<Name />` and `<div/>` as open tags, which would swallow every
/// following sibling. Expand them into explicit open/close pairs; void tags stay as they are.
fn convert_self_closing_tags(markup: &str) -> String {
    lazy_static! {
        static ref SELF_CLOSING_RE: Regex =
            Regex::new(r"<([A-Za-z][A-Za-z0-9_.:-]*)((?:\s[^<>]*?)?)\s*/>").unwrap();
    }

    SELF_CLOSING_RE
        .replace_all(markup, |caps: &Captures| {
            let name = &caps[1];
            if is_void_tag(name) {
                caps[0].to_string()
            } else {
                format!("<{}{}></{}>", name, &caps[2], name)
            }
        })
        .into_owned()
}

/// Upper-case spelling of a plain HTML element (`<DIV>`, `<P>`), not a component.
fn is_shouted_html_tag(name: &str) -> bool {
    !name.chars().any(|c| c.is_ascii_lowercase())
        && HTML_TAGS.contains(name.to_ascii_lowercase().as_str())
}

/// Tag component openings with their original casing, which html5ever would lowercase.
fn mark_component_tags(markup: &str) -> String {
    lazy_static! {
        static ref TAG_OPEN_RE: Regex = Regex::new(r"<([A-Z][A-Za-z0-9_.]*)(\s|>)").unwrap();
    }

    TAG_OPEN_RE
        .replace_all(markup, |caps: &Captures| {
            if is_shouted_html_tag(&caps[1]) {
                return caps[0].to_string();
            }
            format!("<{} {}=\"{}\"{}", &caps[1], NAME_MARKER, &caps[1], &caps[2])
        })
        .into_owned()
}

// ═══════════════════════════════════════════════════════════════════════════════
// DOM CONVERSION
// ═══════════════════════════════════════════════════════════════════════════════

struct Converter<'a> {
    expressions: &'a [String],
}

impl Converter<'_> {
    fn expression(&self, index: &str) -> Option<&str> {
        index
            .parse::<usize>()
            .ok()
            .and_then(|i| self.expressions.get(i))
            .map(|s| s.as_str())
    }

    /// Put `{code}` back for every placeholder in a plain string.
    fn restore_braces(&self, value: &str) -> String {
        EXPR_PLACEHOLDER_RE
            .replace_all(value, |caps: &Captures| match self.expression(&caps[1]) {
                Some(code) => format!("{{{}}}", code),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    fn text_parts(&self, text: &str) -> Vec<TextPart> {
        let mut parts = Vec::new();
        let mut last_end = 0;

        for caps in EXPR_PLACEHOLDER_RE.captures_iter(text) {
            let Some(m) = caps.get(0) else { continue };
            if m.start() > last_end {
                parts.push(TextPart::Literal(text[last_end..m.start()].to_string()));
            }
            match self.expression(&caps[1]) {
                Some(code) if !code.is_empty() => parts.push(TextPart::Expr(code.to_string())),
                Some(_) => {}
                None => parts.push(TextPart::Literal(m.as_str().to_string())),
            }
            last_end = m.end();
        }

        if last_end < text.len() {
            parts.push(TextPart::Literal(text[last_end..].to_string()));
        }
        parts
    }

    fn attribute(&self, raw_name: &str, raw_value: &str, tag_name: &str) -> Attribute {
        let name = restore_attr_name(raw_name, tag_name);

        if !name.starts_with("data-alpine-") {
            if let Some(caps) = EXACT_PLACEHOLDER_RE.captures(raw_value) {
                if let Some(code) = self.expression(&caps[1]) {
                    if !code.is_empty() {
                        return Attribute {
                            name,
                            value: AttrValue::Expr(code.to_string()),
                        };
                    }
                }
            }
        }

        let value = self.restore_braces(raw_value);
        let value = if value.is_empty() && !KEEP_EMPTY.contains(name.as_str()) {
            AttrValue::Bool(true)
        } else {
            AttrValue::Str(value)
        };
        Attribute { name, value }
    }

    fn convert_children(&self, handle: &Handle) -> Vec<ParsedNode> {
        handle
            .children
            .borrow()
            .iter()
            .flat_map(|child| self.convert(child))
            .collect()
    }

    fn convert(&self, handle: &Handle) -> Vec<ParsedNode> {
        match &handle.data {
            NodeData::Document => self.convert_children(handle),

            NodeData::Doctype { .. } | NodeData::ProcessingInstruction { .. } => vec![],

            NodeData::Comment { contents } => vec![ParsedNode::comment(contents.to_string())],

            NodeData::Text { contents } => {
                let text = contents.borrow().to_string();
                vec![ParsedNode::text(self.text_parts(&text))]
            }

            NodeData::Element {
                name,
                attrs,
                template_contents,
                ..
            } => {
                let attrs = attrs.borrow();
                let mut tag_name = name.local.to_string();

                // CASING RESTORATION
                if let Some(marker) = attrs.iter().find(|a| &*a.name.local == NAME_MARKER) {
                    tag_name = marker.value.to_string();
                }

                let attributes: Vec<Attribute> = attrs
                    .iter()
                    .filter(|a| &*a.name.local != NAME_MARKER)
                    .map(|a| {
                        let raw_name = match &a.name.prefix {
                            Some(prefix) => format!("{}:{}", prefix, a.name.local),
                            None => a.name.local.to_string(),
                        };
                        self.attribute(&raw_name, &a.value, &tag_name)
                    })
                    .collect();

                let mut children = self.convert_children(handle);
                if let Some(content) = template_contents.borrow().as_ref() {
                    children.extend(self.convert_children(content));
                }

                let mut node = ParsedNode::element(tag_name, attributes);
                if node.is_component() {
                    // Sibling invariant: a component reference never owns children.
                    let mut out = vec![node];
                    out.extend(children);
                    out
                } else {
                    node.children = children;
                    vec![node]
                }
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAIN PARSING FUNCTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse template markup into a fragment node holding the top-level nodes.
pub fn parse_markup(markup: &str, file: &str) -> Result<ParsedNode> {
    let shorthand = expand_fragment_shorthand(markup);
    let (placeholdered, expressions) = extract_expressions(&shorthand);
    let closed = convert_self_closing_tags(&placeholdered);
    let marked = mark_component_tags(&closed);

    let dom = parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut marked.as_bytes())
        .map_err(|e| CompileError::Parse {
            file: file.to_string(),
            message: e.to_string(),
        })?;

    let converter = Converter {
        expressions: &expressions,
    };
    Ok(ParsedNode::fragment(converter.convert(&dom.document)))
}
