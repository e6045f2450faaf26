//! Layout Composer
//!
//! A layout is a template with one `{children}` content slot. The page's generated tree is
//! substituted at the slot, and the page's stylesheets and scripts are injected as
//! `<link>`/`<script>` tags before `</head>` and `</body>`.

use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use std::path::{Path, PathBuf};

use crate::assets;
use crate::context::CompileContext;
use crate::error::Result;
use crate::normalize::normalize;
use crate::parse::SLOT_TAG;
use crate::source::{TemplateKind, TemplateSource};

pub const SLOT_MARKER: &str = "{children}";

lazy_static! {
    static ref HEAD_CLOSE_RE: Regex = Regex::new(r"(?i)</head\s*>").unwrap();
    static ref BODY_CLOSE_RE: Regex = Regex::new(r"(?i)</body\s*>").unwrap();
    static ref SHELL_RE: Regex = Regex::new(r"(?i)<(html|head)[\s>]").unwrap();
}

/// A layout read and pre-processed up to the point where a page can be slotted in.
#[derive(Debug, Clone)]
pub struct PreparedLayout {
    pub source: TemplateSource,
    /// Markup with the slot marker replaced by the slot element.
    pub markup: String,
    pub css: String,
    pub js: String,
}

/// Whether the page brings its own document shell.
pub fn has_document_shell(markup: &str) -> bool {
    SHELL_RE.is_match(markup)
}

/// Layout file a page is wrapped in, or `None` when the page is rendered bare.
pub fn choose_layout(ctx: &CompileContext, page: &TemplateSource, markup: &str) -> Option<PathBuf> {
    if !ctx.mode.layouts {
        debug!("layouts disabled; {} rendered bare", page.path.display());
        return None;
    }
    if has_document_shell(markup) {
        return None;
    }

    let name = page
        .layout_hint()
        .unwrap_or_else(|| ctx.config.default_layout.clone());
    let path = ctx.config.layout_file(&name);
    if path.is_file() {
        Some(path)
    } else {
        debug!(
            "layout {} for {} not found; page rendered bare",
            path.display(),
            page.path.display()
        );
        None
    }
}

pub fn prepare_layout(ctx: &CompileContext, path: &Path) -> Result<PreparedLayout> {
    let source = TemplateSource::read(path, TemplateKind::Layout)?;
    let expanded = ctx.includes.resolve(&source.text, path);
    let normalized = normalize(&expanded);
    let extracted = assets::extract(&normalized);
    let markup = insert_slot(&extracted.markup, &source.path.to_string_lossy());

    Ok(PreparedLayout {
        source,
        markup,
        css: extracted.css,
        js: extracted.js,
    })
}

/// Swap the content-slot marker for the slot element.
///
/// Only the first marker is honoured. A layout without one gets the slot before `</body>`,
/// or at the end.
pub fn insert_slot(markup: &str, file: &str) -> String {
    let slot = format!("<{}></{}>", SLOT_TAG, SLOT_TAG);

    let Some(pos) = markup.find(SLOT_MARKER) else {
        warn!("layout {} has no {} slot; appending one", file, SLOT_MARKER);
        return match BODY_CLOSE_RE.find(markup) {
            Some(m) => format!("{}{}{}", &markup[..m.start()], slot, &markup[m.start()..]),
            None => format!("{}{}", markup, slot),
        };
    };

    let head = &markup[..pos];
    let tail = &markup[pos + SLOT_MARKER.len()..];
    if tail.contains(SLOT_MARKER) {
        warn!("layout {} has more than one {} slot; extra markers dropped", file, SLOT_MARKER);
    }
    format!("{}{}{}", head, slot, tail.replace(SLOT_MARKER, ""))
}

/// Non-empty entries of a comma-separated path list.
pub fn split_paths(paths: &str) -> Vec<&str> {
    paths
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Inject stylesheet links before `</head>` and scripts before `</body>`.
///
/// Each marker is matched case-insensitively; a missing marker means no injection there.
pub fn inject_assets(markup: &str, css_paths: &str, js_paths: &str) -> String {
    let links: String = split_paths(css_paths)
        .into_iter()
        .map(|p| format!("<link rel=\"stylesheet\" href=\"{}\"/>\n", p))
        .collect();
    let scripts: String = split_paths(js_paths)
        .into_iter()
        .map(|p| format!("<script src=\"{}\"></script>\n", p))
        .collect();

    let with_links = insert_before(markup, &HEAD_CLOSE_RE, &links);
    insert_before(&with_links, &BODY_CLOSE_RE, &scripts)
}

fn insert_before(markup: &str, marker: &Regex, insertion: &str) -> String {
    if insertion.is_empty() {
        return markup.to_string();
    }
    match marker.find(markup) {
        Some(m) => format!("{}{}{}", &markup[..m.start()], insertion, &markup[m.start()..]),
        None => markup.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BuildMode, CompilerConfig};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_inject_assets() {
        let markup = "<html><head><title>x</title></HEAD><body><main>{children}</main></Body></html>";
        let out = inject_assets(markup, "/css/pages_index.css, ,/css/component_simple.css", "/js/_common.js,/js/pages_index.js");
        assert_eq!(
            out,
            "<html><head><title>x</title><link rel=\"stylesheet\" href=\"/css/pages_index.css\"/>\n\
             <link rel=\"stylesheet\" href=\"/css/component_simple.css\"/>\n</HEAD>\
             <body><main>{children}</main><script src=\"/js/_common.js\"></script>\n\
             <script src=\"/js/pages_index.js\"></script>\n</Body></html>"
        );
    }

    #[test]
    fn test_inject_without_markers_is_noop() {
        assert_eq!(inject_assets("<div/>", "/a.css", "/a.js"), "<div/>");
    }

    #[test]
    fn test_insert_slot() {
        assert_eq!(
            insert_slot("<main>{children}</main>", "l.html"),
            "<main><hc-slot></hc-slot></main>"
        );
        assert_eq!(
            insert_slot("<main>{children}{children}</main>", "l.html"),
            "<main><hc-slot></hc-slot></main>"
        );
        assert_eq!(
            insert_slot("<body><p/></body>", "l.html"),
            "<body><p/><hc-slot></hc-slot></body>"
        );
    }

    #[test]
    fn test_document_shell_detection() {
        assert!(has_document_shell("<HTML lang=\"en\">"));
        assert!(has_document_shell("<head>"));
        assert!(!has_document_shell("<header>nav</header>"));
    }

    #[test]
    fn test_choose_layout_by_file_name() {
        let dir = TempDir::new().unwrap();
        let layouts = dir.path().join("layouts");
        fs::create_dir_all(&layouts).unwrap();
        fs::write(layouts.join("layout_pages.html"), "<body>{children}</body>").unwrap();
        fs::write(layouts.join("layout_landing.html"), "<body>{children}</body>").unwrap();

        let ctx = CompileContext::new(CompilerConfig::with_root(dir.path()), BuildMode::default());
        let page = |name: &str| TemplateSource {
            path: dir.path().join("pages").join(name),
            kind: TemplateKind::Page,
            text: String::new(),
        };

        assert_eq!(
            choose_layout(&ctx, &page("index.html"), "<p/>"),
            Some(layouts.join("layout_pages.html"))
        );
        assert_eq!(
            choose_layout(&ctx, &page("index.page.landing.html"), "<p/>"),
            Some(layouts.join("layout_landing.html"))
        );
        assert_eq!(choose_layout(&ctx, &page("index.page.missing.html"), "<p/>"), None);
        assert_eq!(choose_layout(&ctx, &page("index.html"), "<html><body/></html>"), None);

        let bare = CompileContext::new(
            CompilerConfig::with_root(dir.path()),
            BuildMode {
                layouts: false,
                ..BuildMode::default()
            },
        );
        assert_eq!(choose_layout(&bare, &page("index.html"), "<p/>"), None);
    }

    #[test]
    fn test_prepare_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("layout_pages.html");
        fs::write(
            &path,
            "<html><head><style>body{}</style></head><body class=\"app\"><!-- nav -->{children}</body></html>",
        )
        .unwrap();
        let ctx = CompileContext::new(CompilerConfig::with_root(dir.path()), BuildMode::default());
        let layout = prepare_layout(&ctx, Path::new(&path)).unwrap();
        assert_eq!(layout.css, "body{}\n");
        assert_eq!(
            layout.markup,
            "<html><head></head><body className=\"app\"><hc-slot></hc-slot></body></html>"
        );
    }
}
