//! Batch build.
//!
//! Discovers page and layout templates under the project root and compiles them in
//! parallel. Every file fails in isolation; failures are collected in the report.

use log::{debug, error, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::context::CompileContext;
use crate::error::CompileError;
use crate::pipeline::{compile_layout, compile_page, copy_common_script, CompiledTemplate};

// ═══════════════════════════════════════════════════════════════════════════════
// REPORT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildFailure {
    pub path: PathBuf,
    pub code: String,
    pub message: String,
}

impl BuildFailure {
    fn new(path: &Path, err: &CompileError) -> Self {
        Self {
            path: path.to_path_buf(),
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    pub compiled: Vec<PathBuf>,
    pub failed: Vec<BuildFailure>,
    pub components: Vec<String>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DISCOVERY
// ═══════════════════════════════════════════════════════════════════════════════

/// Recursively find all `.html` templates in a directory, sorted for stable output.
///
/// Files whose name starts with `_` are partials, reachable only through includes.
pub fn find_templates(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            let is_html = path.extension().is_some_and(|ext| ext == "html");
            let is_partial = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('_'));
            is_html && !is_partial
        })
        .collect();

    files.sort();
    files
}

pub fn discover_pages(ctx: &CompileContext) -> Vec<PathBuf> {
    ctx.config
        .page_dirs
        .iter()
        .flat_map(|dir| find_templates(&ctx.config.root.join(dir)))
        .collect()
}

pub fn discover_layouts(ctx: &CompileContext) -> Vec<PathBuf> {
    find_templates(&ctx.config.layouts_path())
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILD
// ═══════════════════════════════════════════════════════════════════════════════

/// Compile every page and layout of the project and write the manifest.
pub fn build_project(ctx: &CompileContext) -> BuildReport {
    let mut report = BuildReport::default();

    if let Err(e) = copy_common_script(ctx) {
        error!("[{}] {}", e.code(), e);
        report
            .failed
            .push(BuildFailure::new(&ctx.config.common_script_source(), &e));
    }

    let pages = discover_pages(ctx);
    let layouts = if ctx.mode.layouts {
        discover_layouts(ctx)
    } else {
        debug!("layouts disabled; layout modules not built");
        Vec::new()
    };
    if pages.is_empty() {
        warn!("no pages found under {}", ctx.config.root.display());
    }

    let results: Vec<(PathBuf, Result<CompiledTemplate, CompileError>)> = pages
        .par_iter()
        .map(|path| (path.clone(), compile_page(ctx, path)))
        .chain(
            layouts
                .par_iter()
                .map(|path| (path.clone(), compile_layout(ctx, path))),
        )
        .collect();

    for (path, result) in results {
        match result {
            Ok(compiled) => {
                info!(
                    "compiled {:?} {} → {}",
                    compiled.kind,
                    compiled.source_path.display(),
                    compiled.js_path(ctx).display()
                );
                report.compiled.push(compiled.source_path);
            }
            Err(e) => {
                error!("[{}] {}", e.code(), e);
                report.failed.push(BuildFailure::new(&path, &e));
            }
        }
    }

    if let Err(e) = ctx.writer.save_manifest() {
        error!("[{}] {}", e.code(), e);
        report
            .failed
            .push(BuildFailure::new(&ctx.writer.out_dir().join(crate::cache::MANIFEST_FILE), &e));
    }

    report.components = ctx.compiled_component_names();
    info!(
        "build finished: {} compiled, {} failed, {} components",
        report.compiled.len(),
        report.failed.len(),
        report.components.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BuildMode, CompilerConfig};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_find_templates_skips_partials_and_other_files() {
        let dir = TempDir::new().unwrap();
        let pages = dir.path().join("pages");
        fs::create_dir_all(pages.join("blog")).unwrap();
        fs::write(pages.join("index.html"), "<p/>").unwrap();
        fs::write(pages.join("blog/post.html"), "<p/>").unwrap();
        fs::write(pages.join("_header.html"), "<header/>").unwrap();
        fs::write(pages.join("notes.txt"), "x").unwrap();

        let found = find_templates(&pages);
        assert_eq!(found, vec![pages.join("blog/post.html"), pages.join("index.html")]);
        assert!(find_templates(&dir.path().join("missing")).is_empty());
    }

    #[test]
    fn test_failures_are_isolated() {
        let dir = TempDir::new().unwrap();
        let pages = dir.path().join("pages");
        fs::create_dir_all(&pages).unwrap();
        fs::write(pages.join("good.html"), "<p>ok</p>").unwrap();
        fs::write(pages.join("bad.html"), [0xff, 0xfe, 0x00]).unwrap();

        let ctx = CompileContext::new(CompilerConfig::with_root(dir.path()), BuildMode::default());
        let report = build_project(&ctx);

        assert_eq!(report.compiled, vec![pages.join("good.html")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].code, crate::error::ERR_READ);
        assert!(dir.path().join("generated/js/pages_good.js").exists());
        assert!(dir.path().join("generated/manifest.json").exists());
    }
}
