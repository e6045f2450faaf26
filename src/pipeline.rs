//! Single-file compile pipeline.
//!
//! include resolution → normalization → asset extraction → component resolution →
//! (layout composition) → codegen → function shape → bundle linking → assets on disk

use log::{debug, info};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::assets::{self, AssetKind, GeneratedAsset};
use crate::codegen::{generate_markup, SlotFill};
use crate::component::{CompiledComponent, ComponentResolver};
use crate::context::CompileContext;
use crate::error::Result;
use crate::finalize::{link_bundle, Trailer};
use crate::layout::{choose_layout, inject_assets, prepare_layout};
use crate::normalize::normalize;
use crate::parse::SLOT_TAG;
use crate::shape;
use crate::source::{base_name, TemplateKind, TemplateSource};

#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    pub kind: TemplateKind,
    pub source_path: PathBuf,
    pub key: String,
    /// Exported function name.
    pub name: String,
    pub bundle: String,
    /// Pre-codegen markup, as written to `markup/<key>.html`.
    pub markup: String,
    /// Component identifiers embedded in the bundle.
    pub components: Vec<String>,
    /// Layout the page was composed into, if any.
    pub layout: Option<PathBuf>,
}

impl CompiledTemplate {
    pub fn js_path(&self, ctx: &CompileContext) -> PathBuf {
        ctx.writer.out_dir().join(AssetKind::Js.file_name(&self.key))
    }
}

/// Compile a page or a layout, depending on where the file lives.
///
/// Layouts yield `None` while layout transpilation is off.
pub fn compile_file(ctx: &CompileContext, path: &Path) -> Result<Option<CompiledTemplate>> {
    if !path.starts_with(ctx.config.layouts_path()) {
        return compile_page(ctx, path).map(Some);
    }
    if !ctx.mode.layouts {
        info!("layouts disabled; {} skipped", path.display());
        return Ok(None);
    }
    compile_layout(ctx, path).map(Some)
}

// ═══════════════════════════════════════════════════════════════════════════════
// PAGES
// ═══════════════════════════════════════════════════════════════════════════════

pub fn compile_page(ctx: &CompileContext, path: &Path) -> Result<CompiledTemplate> {
    let source = TemplateSource::read(path, TemplateKind::Page)?;
    let key = source.asset_key();
    let name = source.export_name();
    let file = path.to_string_lossy().to_string();
    debug!("compiling page {} as {} ({})", path.display(), name, key);

    let expanded = ctx.includes.resolve(&source.text, path);
    let normalized = normalize(&expanded);
    let extracted = assets::extract(&normalized);

    let mut resolver = ComponentResolver::new(ctx);
    let (page_markup, _) = resolver.resolve(&extracted.markup)?;
    let page_tree = generate_markup(
        &page_markup,
        &file,
        &ctx.codegen_options(SlotFill::Children),
    );

    let layout_path = choose_layout(ctx, &source, &page_markup);
    let layout = match &layout_path {
        Some(layout_path) => {
            let prepared = prepare_layout(ctx, layout_path)?;
            let (markup, _) = resolver.resolve(&prepared.markup)?;
            Some((prepared, markup))
        }
        None => None,
    };

    // Everything the final tree references; injected tags add no components.
    let mut referenced = page_tree.references.clone();
    if let (Some(layout_path), Some((_, layout_markup))) = (&layout_path, &layout) {
        let layout_tree = generate_markup(
            layout_markup,
            &layout_path.to_string_lossy(),
            &ctx.codegen_options(SlotFill::Children),
        );
        merge_references(&mut referenced, layout_tree.references);
    }

    let mut css_paths = vec![AssetKind::Css.url(&key)];
    css_paths.extend(
        component_closure(&mut resolver, &referenced)?
            .iter()
            .map(|c| AssetKind::Css.url(&c.key)),
    );
    let js_paths = vec![
        AssetKind::Js.url(&common_script_key(ctx)),
        AssetKind::Js.url(&key),
    ];

    let mut setup = extracted.js.clone();
    let (markup, tree) = match (&layout_path, layout) {
        (Some(layout_path), Some((prepared, layout_markup))) => {
            if !prepared.css.trim().is_empty() {
                let layout_key = prepared.source.asset_key();
                ctx.writer.write(&GeneratedAsset::new(
                    AssetKind::Css,
                    layout_key.clone(),
                    prepared.css.clone(),
                ))?;
                css_paths.insert(0, AssetKind::Css.url(&layout_key));
            }
            setup.push_str(&prepared.js);

            let injected = inject_assets(&layout_markup, &css_paths.join(","), &js_paths.join(","));
            let mut composed = generate_markup(
                &injected,
                &layout_path.to_string_lossy(),
                &ctx.codegen_options(SlotFill::Tree(&page_tree.code)),
            );
            let mut references = page_tree.references.clone();
            merge_references(&mut references, std::mem::take(&mut composed.references));
            composed.references = references;

            let slot = format!("<{}></{}>", SLOT_TAG, SLOT_TAG);
            (injected.replacen(&slot, &page_markup, 1), composed)
        }
        _ => {
            let injected = inject_assets(&page_markup, &css_paths.join(","), &js_paths.join(","));
            let tree = generate_markup(&injected, &file, &ctx.codegen_options(SlotFill::Children));
            (injected, tree)
        }
    };

    let module = shape::emit(ctx.mode.shape, &name, &setup, &tree.code);
    let bundle = link_bundle(
        &mut resolver,
        &ctx.config,
        &name,
        &module,
        &tree.references,
        Trailer::Hydrate,
    )?;

    ctx.writer
        .write(&GeneratedAsset::new(AssetKind::Js, key.clone(), bundle.code.clone()))?;
    ctx.writer.write(&extracted.css_asset(&key))?;
    ctx.writer
        .write(&GeneratedAsset::new(AssetKind::Markup, key.clone(), markup.clone()))?;

    Ok(CompiledTemplate {
        kind: TemplateKind::Page,
        source_path: path.to_path_buf(),
        key,
        name,
        bundle: bundle.code,
        markup,
        components: bundle.embedded,
        layout: layout_path,
    })
}

fn merge_references(into: &mut Vec<String>, more: Vec<String>) {
    for r in more {
        if !into.contains(&r) {
            into.push(r);
        }
    }
}

/// Components reachable from `names`, depth-first in first-reference order.
///
/// Direct `<Name/>` references are compiled here if no placeholder did it yet.
fn component_closure(
    resolver: &mut ComponentResolver,
    names: &[String],
) -> Result<Vec<Arc<CompiledComponent>>> {
    let mut out: Vec<Arc<CompiledComponent>> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut pending: Vec<String> = names.iter().rev().cloned().collect();

    while let Some(name) = pending.pop() {
        if !seen.insert(name.clone()) {
            continue;
        }
        if let Some(component) = resolver.ensure_identifier(&name)? {
            pending.extend(component.references.iter().rev().cloned());
            out.push(component);
        }
    }
    Ok(out)
}

// ═══════════════════════════════════════════════════════════════════════════════
// LAYOUTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Compile a layout into a standalone module whose slot renders `props.children`.
pub fn compile_layout(ctx: &CompileContext, path: &Path) -> Result<CompiledTemplate> {
    let layout = prepare_layout(ctx, path)?;
    let key = layout.source.asset_key();
    let name = layout.source.export_name();
    debug!("compiling layout {} as {} ({})", path.display(), name, key);

    let mut resolver = ComponentResolver::new(ctx);
    let (markup, _) = resolver.resolve(&layout.markup)?;
    let tree = generate_markup(
        &markup,
        &path.to_string_lossy(),
        &ctx.codegen_options(SlotFill::Children),
    );

    let module = shape::emit(ctx.mode.shape, &name, &layout.js, &tree.code);
    let bundle = link_bundle(
        &mut resolver,
        &ctx.config,
        &name,
        &module,
        &tree.references,
        Trailer::Export,
    )?;

    ctx.writer
        .write(&GeneratedAsset::new(AssetKind::Js, key.clone(), bundle.code.clone()))?;
    ctx.writer
        .write(&GeneratedAsset::new(AssetKind::Css, key.clone(), layout.css.clone()))?;
    ctx.writer
        .write(&GeneratedAsset::new(AssetKind::Markup, key.clone(), markup.clone()))?;

    Ok(CompiledTemplate {
        kind: TemplateKind::Layout,
        source_path: path.to_path_buf(),
        key,
        name,
        bundle: bundle.code,
        markup,
        components: bundle.embedded,
        layout: None,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// SHARED HELPER SCRIPT
// ═══════════════════════════════════════════════════════════════════════════════

fn common_script_key(ctx: &CompileContext) -> String {
    base_name(Path::new(&ctx.config.common_script))
}

/// Copy the shared bootstrap helper to `js/`, expanding its `//#include` lines.
///
/// Returns the written path, or `None` when the project has no helper script.
pub fn copy_common_script(ctx: &CompileContext) -> Result<Option<PathBuf>> {
    let source_path = ctx.config.common_script_source();
    if !source_path.is_file() {
        debug!("no shared helper script at {}", source_path.display());
        return Ok(None);
    }

    let source = TemplateSource::read(&source_path, TemplateKind::Partial)?;
    let content = ctx.includes.expand_script(&source.text, &source_path);
    let asset = GeneratedAsset::new(AssetKind::Js, common_script_key(ctx), content);
    ctx.writer.write(&asset)?;
    info!("copied {}", source_path.display());
    Ok(Some(ctx.writer.path_of(&asset)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::component_key;
    use crate::config::{BuildMode, CompilerConfig};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_component_key_matches_css_url() {
        assert_eq!(
            AssetKind::Css.url(&component_key("simple")),
            "/css/component_simple.css"
        );
    }

    #[test]
    fn test_copy_common_script() {
        let dir = TempDir::new().unwrap();
        let js = dir.path().join("views/js");
        fs::create_dir_all(js.join("lib")).unwrap();
        fs::write(js.join("lib/a.js"), "var a = 1;").unwrap();
        fs::write(js.join("_common.js"), "//#include \"lib/a.js\"\nvar b = a;\n").unwrap();

        let ctx = CompileContext::new(CompilerConfig::with_root(dir.path()), BuildMode::default());
        let written = copy_common_script(&ctx).unwrap().unwrap();
        assert_eq!(written, dir.path().join("generated/js/_common.js"));
        assert_eq!(fs::read_to_string(written).unwrap(), "var a = 1;\nvar b = a;\n");
    }

    #[test]
    fn test_missing_common_script() {
        let dir = TempDir::new().unwrap();
        let ctx = CompileContext::new(CompilerConfig::with_root(dir.path()), BuildMode::default());
        assert!(copy_common_script(&ctx).unwrap().is_none());
    }
}
