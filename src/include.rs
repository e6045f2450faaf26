//! Include Resolver
//!
//! Splices `<!--#include "path"-->` directives (and `//#include "path"` lines in JavaScript)
//! recursively, relative to the including file. Comment stripping runs only after the
//! whole include tree is expanded, so partials may carry ordinary comments.

use lazy_static::lazy_static;
use log::{debug, warn};
use regex::{Captures, Regex};
use std::fs;
use std::path::{Path, PathBuf};

lazy_static! {
    static ref HTML_INCLUDE_RE: Regex =
        Regex::new(r#"<!--\s*#include\s+"([^"]+)"\s*-->"#).unwrap();
    static ref SCRIPT_INCLUDE_RE: Regex =
        Regex::new(r#"(?m)^[ \t]*//#include\s+(?:"([^"]+)"|(\S+))[ \t]*$"#).unwrap();
    static ref HTML_COMMENT_RE: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Syntax {
    Markup,
    Script,
}

/// Resolves include directives relative to the including file.
///
/// `root` anchors directives whose path starts with `/`.
#[derive(Debug, Clone)]
pub struct IncludeResolver {
    root: PathBuf,
}

impl IncludeResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Expand markup includes, then strip every HTML comment.
    pub fn resolve(&self, text: &str, base_path: &Path) -> String {
        let expanded = self.expand(text, base_path);
        strip_comments(&expanded)
    }

    /// Expand markup includes without stripping comments.
    pub fn expand(&self, text: &str, base_path: &Path) -> String {
        let mut chain = vec![normalize_path(base_path)];
        self.expand_with(text, base_path, Syntax::Markup, &mut chain)
    }

    /// Expand `//#include` lines of a JavaScript source.
    pub fn expand_script(&self, text: &str, base_path: &Path) -> String {
        let mut chain = vec![normalize_path(base_path)];
        self.expand_with(text, base_path, Syntax::Script, &mut chain)
    }

    fn expand_with(
        &self,
        text: &str,
        base_path: &Path,
        syntax: Syntax,
        chain: &mut Vec<PathBuf>,
    ) -> String {
        let pattern: &Regex = match syntax {
            Syntax::Markup => &HTML_INCLUDE_RE,
            Syntax::Script => &SCRIPT_INCLUDE_RE,
        };

        pattern
            .replace_all(text, |caps: &Captures| {
                let rel = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                let target = self.target_path(rel, base_path);
                let key = normalize_path(&target);

                if chain.contains(&key) {
                    warn!(
                        "include cycle: {} includes {} again; directive dropped",
                        base_path.display(),
                        target.display()
                    );
                    return String::new();
                }

                match fs::read_to_string(&target) {
                    Ok(content) => {
                        chain.push(key);
                        let nested = self.expand_with(&content, &target, syntax, chain);
                        chain.pop();
                        nested
                    }
                    Err(e) => {
                        debug!(
                            "include {} from {} not readable ({}); directive dropped",
                            target.display(),
                            base_path.display(),
                            e
                        );
                        String::new()
                    }
                }
            })
            .into_owned()
    }

    fn target_path(&self, rel: &str, base_path: &Path) -> PathBuf {
        if let Some(stripped) = rel.strip_prefix('/') {
            self.root.join(stripped)
        } else {
            base_path
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(rel)
        }
    }
}

/// Remove every `<!-- ... -->` comment, including multi-line ones.
pub fn strip_comments(text: &str) -> String {
    HTML_COMMENT_RE.replace_all(text, "").into_owned()
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_no_directives_only_strips_comments() {
        let resolver = IncludeResolver::new(".");
        let text = "<div>a<!-- note\nspanning lines --></div>";
        assert_eq!(resolver.resolve(text, Path::new("x/page.html")), "<div>a</div>");
        assert_eq!(resolver.resolve("<p>plain</p>", Path::new("page.html")), "<p>plain</p>");
    }

    #[test]
    fn test_nested_includes_relative_to_including_file() {
        let dir = TempDir::new().unwrap();
        let page = write(
            dir.path(),
            "layouts/main.html",
            r#"<body><!--#include "../_partials/header.html"--></body>"#,
        );
        write(
            dir.path(),
            "_partials/header.html",
            r#"<header><!-- header comment --><!--#include "nav.html" --></header>"#,
        );
        write(dir.path(), "_partials/nav.html", "<nav>links</nav>");

        let resolver = IncludeResolver::new(dir.path());
        let text = fs::read_to_string(&page).unwrap();
        assert_eq!(
            resolver.resolve(&text, &page),
            "<body><header><nav>links</nav></header></body>"
        );
    }

    #[test]
    fn test_missing_include_is_dropped() {
        let dir = TempDir::new().unwrap();
        let page = write(dir.path(), "page.html", r#"<a/><!--#include "missing.html"--><b/>"#);
        let resolver = IncludeResolver::new(dir.path());
        let text = fs::read_to_string(&page).unwrap();
        assert_eq!(resolver.resolve(&text, &page), "<a/><b/>");
    }

    #[test]
    fn test_self_include_terminates() {
        let dir = TempDir::new().unwrap();
        let partial = write(dir.path(), "loop.html", r#"<i>x</i><!--#include "loop.html"-->"#);
        let resolver = IncludeResolver::new(dir.path());
        let text = fs::read_to_string(&partial).unwrap();
        assert_eq!(resolver.resolve(&text, &partial), "<i>x</i>");
    }

    #[test]
    fn test_root_anchored_include() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "_partials/footer.html", "<footer/>");
        let page = write(dir.path(), "pages/a.html", r#"<!--#include "/_partials/footer.html"-->"#);
        let resolver = IncludeResolver::new(dir.path());
        let text = fs::read_to_string(&page).unwrap();
        assert_eq!(resolver.resolve(&text, &page), "<footer/>");
    }

    #[test]
    fn test_script_includes() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "views/js/lib/dom.js", "function $(s) { return s; }");
        let common = write(
            dir.path(),
            "views/js/_common.js",
            "// helpers\n//#include \"lib/dom.js\"\nwindow.ready = true;\n",
        );
        let resolver = IncludeResolver::new(dir.path());
        let text = fs::read_to_string(&common).unwrap();
        let out = resolver.expand_script(&text, &common);
        assert!(out.contains("function $(s) { return s; }"));
        assert!(out.contains("// helpers"));
        assert!(!out.contains("#include"));
    }
}
