//! Asset Extractor
//!
//! Pulls inline `<style>` and `<script>` blocks out of template markup. Contents are kept in
//! document order, each followed by a newline, and the blocks are removed from the markup
//! handed to codegen. Tag attributes make no difference: a `<script src>` block is removed
//! like any other and contributes its (usually empty) body.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref STYLE_RE: Regex = Regex::new(r"(?is)<style\b[^>]*>(.*?)</style\s*>").unwrap();
    static ref SCRIPT_RE: Regex = Regex::new(r"(?is)<script\b[^>]*>(.*?)</script\s*>").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// ASSET TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Js,
    Css,
    /// Pre-codegen markup kept for inspection.
    Markup,
}

impl AssetKind {
    pub fn dir(self) -> &'static str {
        match self {
            AssetKind::Js => "js",
            AssetKind::Css => "css",
            AssetKind::Markup => "markup",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            AssetKind::Js => "js",
            AssetKind::Css => "css",
            AssetKind::Markup => "html",
        }
    }

    /// Relative file name under the output directory.
    pub fn file_name(self, key: &str) -> String {
        format!("{}/{}.{}", self.dir(), key, self.extension())
    }

    /// URL under which the serving layer exposes the asset.
    pub fn url(self, key: &str) -> String {
        format!("/{}", self.file_name(key))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedAsset {
    pub kind: AssetKind,
    pub key: String,
    pub content: String,
}

impl GeneratedAsset {
    pub fn new(kind: AssetKind, key: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
            content: content.into(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXTRACTION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedAssets {
    pub css: String,
    pub js: String,
    pub markup: String,
}

impl ExtractedAssets {
    /// CSS asset for `key`. Always produced, possibly empty.
    pub fn css_asset(&self, key: &str) -> GeneratedAsset {
        GeneratedAsset::new(AssetKind::Css, key, self.css.clone())
    }
}

pub fn extract(markup: &str) -> ExtractedAssets {
    let mut css = String::new();
    let without_styles = STYLE_RE.replace_all(markup, |caps: &Captures| {
        css.push_str(&caps[1]);
        css.push('\n');
        String::new()
    });

    let mut js = String::new();
    let without_scripts = SCRIPT_RE.replace_all(&without_styles, |caps: &Captures| {
        js.push_str(&caps[1]);
        js.push('\n');
        String::new()
    });

    ExtractedAssets {
        css,
        js,
        markup: without_scripts.into_owned(),
    }
}
