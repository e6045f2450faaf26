//! Syntax Normalizer
//!
//! Text-level rewrites that run before any tree parsing:
//! - `{{.Name}}` becomes `{page.Name}`; `{{define}}`, `{{template}}` and `{{end}}` are dropped
//! - the literal doctype variants are removed
//! - directive attributes (`x-data`, `@click`, ...) become `data-alpine-*`
//! - dotted attribute names become dashed, `class` becomes `className`
//! - void tags end in `/>` exactly once
//!
//! Attribute rewrites only apply to names inside an opening tag. Raw text of `<script>` and
//! `<style>` blocks is copied through untouched.

use lazy_static::lazy_static;
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;

// ═══════════════════════════════════════════════════════════════════════════════
// VOCABULARY
// ═══════════════════════════════════════════════════════════════════════════════

pub const VOID_TAGS: &[&str] = &[
    "meta", "link", "img", "input", "br", "hr", "area", "base", "col", "embed", "source",
    "track", "wbr",
];

const DOCTYPES: &[&str] = &["<!DOCTYPE html>", "<!doctype html>", "<!Doctype html>"];

lazy_static! {
    static ref DIRECTIVE_MAP: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("x-data", "data-alpine-data");
        m.insert("x-show", "data-alpine-show");
        m.insert("x-if", "data-alpine-if");
        m.insert("x-for", "data-alpine-for");
        m.insert("x-model", "data-alpine-model");
        m.insert("x-on:click", "data-alpine-on-click");
        m.insert("@click", "data-alpine-on-click");
        m
    };

    static ref FIELD_VAR_RE: Regex = Regex::new(r"^\.([A-Za-z_][A-Za-z0-9_]*)$").unwrap();
}

pub fn is_void_tag(tag: &str) -> bool {
    VOID_TAGS.contains(&tag.to_ascii_lowercase().as_str())
}

/// Run every normalization pass in order.
pub fn normalize(text: &str) -> String {
    let text = rewrite_template_vars(text);
    let text = strip_doctypes(&text);
    rewrite_tags(&text)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPLATE VARIABLES
// ═══════════════════════════════════════════════════════════════════════════════

/// Rewrite `{{...}}` constructs.
///
/// Only single-field access is translated; anything else (pipelines, range, if) is left as
/// written.
pub fn rewrite_template_vars(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };

        let raw = &rest[start..start + 2 + end + 2];
        let inner = after_open[..end].trim().trim_matches('-').trim();

        if let Some(caps) = FIELD_VAR_RE.captures(inner) {
            out.push_str("{page.");
            out.push_str(&caps[1]);
            out.push('}');
        } else if is_block_keyword(inner) {
            // dropped
        } else {
            out.push_str(raw);
        }

        rest = &after_open[end + 2..];
    }

    out.push_str(rest);
    out
}

fn is_block_keyword(inner: &str) -> bool {
    let keyword = inner.split_whitespace().next().unwrap_or_default();
    match keyword {
        "end" => inner == "end",
        "define" | "template" => true,
        _ => false,
    }
}

pub fn strip_doctypes(text: &str) -> String {
    let mut out = text.to_string();
    for doctype in DOCTYPES {
        if out.contains(doctype) {
            out = out.replace(doctype, "");
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// TAG SCANNER
// ═══════════════════════════════════════════════════════════════════════════════

/// Walk every opening tag and rewrite its attribute names and void-tag ending.
fn rewrite_tags(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len() + 16);
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'<' || i + 1 >= bytes.len() || !bytes[i + 1].is_ascii_alphabetic() {
            i += 1;
            continue;
        }

        let name_start = i + 1;
        let mut name_end = name_start;
        while name_end < bytes.len() && is_tag_name_byte(bytes[name_end]) {
            name_end += 1;
        }

        let Some(close) = find_tag_end(bytes, name_end) else {
            i += 1;
            continue;
        };

        let name = &text[name_start..name_end];
        let attrs = &text[name_end..close];

        out.push_str(&text[copied..i]);
        out.push('<');
        out.push_str(name);
        let attrs = rewrite_attr_names(attrs);

        if is_void_tag(name) {
            let trimmed = attrs.trim_end();
            let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed).trim_end();
            out.push_str(trimmed);
            out.push_str("/>");
        } else {
            out.push_str(&attrs);
            out.push('>');
        }

        i = close + 1;
        copied = i;

        let lower = name.to_ascii_lowercase();
        if lower == "script" || lower == "style" {
            let closing = format!("</{}", lower);
            let tail = &text[i..];
            let end = find_ascii_case_insensitive(tail, &closing)
                .map(|pos| i + pos)
                .unwrap_or(text.len());
            out.push_str(&text[i..end]);
            i = end;
            copied = end;
        }
    }

    out.push_str(&text[copied..]);
    out
}

fn is_tag_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.' || b == b':'
}

/// Index of the `>` closing a tag, skipping quoted values and `{...}` expressions.
fn find_tag_end(bytes: &[u8], from: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    let mut depth = 0usize;
    let mut i = from;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' if depth == 0 => quote = Some(b),
                b'{' => depth += 1,
                b'}' => depth = depth.saturating_sub(1),
                b'>' if depth == 0 => return Some(i),
                b'<' if depth == 0 => return None,
                _ => {}
            },
        }
        i += 1;
    }

    None
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() || hay.len() < needle.len() {
        return None;
    }
    (0..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

/// Rewrite every attribute name of a tag's attribute segment.
fn rewrite_attr_names(attrs: &str) -> String {
    let bytes = attrs.as_bytes();
    let mut out = String::with_capacity(attrs.len() + 8);
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];

        if b.is_ascii_whitespace() || b == b'/' {
            out.push(b as char);
            i += 1;
            continue;
        }

        // Attribute name
        let start = i;
        while i < bytes.len()
            && !bytes[i].is_ascii_whitespace()
            && bytes[i] != b'='
            && bytes[i] != b'>'
            && !(bytes[i] == b'/' && i > start)
        {
            if bytes[i] == b'{' {
                i = skip_braces(bytes, i);
                continue;
            }
            i += 1;
        }
        out.push_str(&rename_attr(&attrs[start..i]));

        // Optional `= value`
        let mut j = i;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if j < bytes.len() && bytes[j] == b'=' {
            j += 1;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            let value_end = skip_value(bytes, j);
            out.push_str(&attrs[i..value_end]);
            i = value_end;
        }
    }

    out
}

fn skip_value(bytes: &[u8], start: usize) -> usize {
    match bytes.get(start) {
        Some(&q @ (b'"' | b'\'')) => bytes[start + 1..]
            .iter()
            .position(|&b| b == q)
            .map(|p| start + 1 + p + 1)
            .unwrap_or(bytes.len()),
        Some(b'{') => skip_braces(bytes, start),
        Some(_) => {
            let mut i = start;
            while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            i
        }
        None => start,
    }
}

fn skip_braces(bytes: &[u8], start: usize) -> usize {
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = start;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' | b'`' => quote = Some(b),
                b'{' => depth += 1,
                b'}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return i + 1;
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    bytes.len()
}

/// Map one attribute name onto its normalized spelling.
pub fn rename_attr(name: &str) -> Cow<'_, str> {
    if let Some(mapped) = DIRECTIVE_MAP.get(name) {
        return Cow::Borrowed(mapped);
    }
    if name == "class" {
        return Cow::Borrowed("className");
    }
    if name.contains('.') && !name.starts_with('{') {
        return Cow::Owned(name.replace('.', "-"));
    }
    Cow::Borrowed(name)
}
