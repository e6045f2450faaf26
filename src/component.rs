//! Component Resolver
//!
//! Finds component placeholders (`<div id="component-user-card"></div>` or the self-closing
//! form), compiles `<componentsDir>/<name>.html` through the same pipeline and swaps the
//! placeholder for a `<UserCard suppressHydrationWarning={true} />` reference.
//!
//! Each component is compiled at most once per run: the first resolver to reach it claims it
//! in the `CompileContext`, others wait for that result. A missing source leaves the
//! placeholder untouched.

use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::assets::{self, AssetKind, GeneratedAsset};
use crate::codegen::{generate_markup, SlotFill};
use crate::context::{Claim, CompileContext};
use crate::error::Result;
use crate::normalize::normalize;
use crate::shape;
use crate::source::{pascal_case, TemplateKind, TemplateSource};

lazy_static! {
    static ref PLACEHOLDER_RE: Regex = Regex::new(
        r#"<([a-zA-Z][a-zA-Z0-9-]*)\b([^>]*?)\sid\s*=\s*["']component[-_]([\w -]+)["']([^>]*?)(/?)>"#
    )
    .unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// One placeholder name as seen during a compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRef {
    pub pascal_name: String,
    pub source_path: PathBuf,
    pub resolved: bool,
}

#[derive(Debug, Clone)]
pub struct CompiledComponent {
    /// Name as written in the placeholder, e.g. `user-card`.
    pub name: String,
    pub pascal_name: String,
    /// Asset key, `component_<name>`.
    pub key: String,
    pub source_path: PathBuf,
    /// Module text: the function(s) plus the component's own script.
    pub module: String,
    /// Components this one references, first-reference order.
    pub references: Vec<String>,
}

pub fn component_key(name: &str) -> String {
    format!("component_{}", name)
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESOLVER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct ComponentResolver<'a> {
    ctx: &'a CompileContext,
    /// Components currently being compiled, outermost first.
    stack: Vec<String>,
}

struct Placeholder {
    start: usize,
    end: usize,
    name: String,
}

impl<'a> ComponentResolver<'a> {
    pub fn new(ctx: &'a CompileContext) -> Self {
        Self {
            ctx,
            stack: Vec::new(),
        }
    }

    pub fn source_path(&self, name: &str) -> PathBuf {
        self.ctx
            .config
            .components_path()
            .join(format!("{}.html", name))
    }

    /// Replace every resolvable placeholder in `markup`.
    ///
    /// Returns the rewritten markup and one `ComponentRef` per distinct resolved name.
    pub fn resolve(&mut self, markup: &str) -> Result<(String, Vec<ComponentRef>)> {
        let mut out = String::with_capacity(markup.len());
        let mut refs: Vec<ComponentRef> = Vec::new();
        let mut copied = 0;

        for placeholder in find_placeholders(markup) {
            out.push_str(&markup[copied..placeholder.start]);
            copied = placeholder.end;

            let pascal_name = pascal_case(&placeholder.name);
            let seen = refs.iter().any(|r| r.pascal_name == pascal_name);

            let resolved = if seen {
                true
            } else {
                match self.ensure_compiled(&placeholder.name)? {
                    Some(component) => {
                        refs.push(ComponentRef {
                            pascal_name: component.pascal_name.clone(),
                            source_path: component.source_path.clone(),
                            resolved: true,
                        });
                        true
                    }
                    None => false,
                }
            };

            if resolved {
                out.push_str(&format!(
                    "<{} suppressHydrationWarning={{true}} />",
                    pascal_name
                ));
            } else {
                out.push_str(&markup[placeholder.start..placeholder.end]);
            }
        }

        out.push_str(&markup[copied..]);
        Ok((out, refs))
    }

    /// Compiled component for a placeholder name, compiling it on first use.
    ///
    /// `None` when the source file is missing or the name is already on the compile stack.
    pub fn ensure_compiled(&mut self, name: &str) -> Result<Option<Arc<CompiledComponent>>> {
        let pascal_name = pascal_case(name);
        if let Some(existing) = self.ctx.component(&pascal_name) {
            return Ok(Some(existing));
        }

        if self.stack.iter().any(|n| pascal_case(n) == pascal_name) {
            warn!(
                "component cycle: {} -> {}; placeholder left unexpanded",
                self.stack.join(" -> "),
                name
            );
            return Ok(None);
        }

        let path = self.source_path(name);
        if !path.is_file() {
            debug!("component source {} not found; placeholder kept", path.display());
            return Ok(None);
        }

        match self.ctx.claim_component(&pascal_name) {
            Claim::Ready(existing) => return Ok(Some(existing)),
            Claim::Cycle => {
                warn!(
                    "component cycle through {} across parallel compiles; placeholder left unexpanded",
                    name
                );
                return Ok(None);
            }
            Claim::Owned => {}
        }

        self.stack.push(name.to_string());
        let compiled = self.compile(name, &path);
        self.stack.pop();

        match compiled {
            Ok(component) => Ok(Some(self.ctx.finish_component(component))),
            Err(e) => {
                self.ctx.abandon_component(&pascal_name);
                Err(e)
            }
        }
    }

    /// Look up a component by its identifier, for references written directly as `<Name/>`.
    ///
    /// Tries the lower-case, kebab-case and snake_case spellings of the identifier.
    pub fn ensure_identifier(&mut self, pascal_name: &str) -> Result<Option<Arc<CompiledComponent>>> {
        if let Some(existing) = self.ctx.component(pascal_name) {
            return Ok(Some(existing));
        }
        for candidate in file_name_candidates(pascal_name) {
            if self.source_path(&candidate).is_file() {
                return self.ensure_compiled(&candidate);
            }
        }
        Ok(None)
    }

    fn compile(&mut self, name: &str, path: &Path) -> Result<CompiledComponent> {
        let source = TemplateSource::read(path, TemplateKind::Component)?;
        let key = component_key(name);
        let pascal_name = pascal_case(name);
        debug!("compiling component {} from {}", pascal_name, path.display());

        let expanded = self.ctx.includes.resolve(&source.text, path);
        let normalized = normalize(&expanded);
        let extracted = assets::extract(&normalized);
        let (markup, _) = self.resolve(&extracted.markup)?;

        let tree = generate_markup(
            &markup,
            &path.to_string_lossy(),
            &self.ctx.codegen_options(SlotFill::Children),
        );

        let mut module = shape::emit(self.ctx.mode.shape, &pascal_name, "", &tree.code);
        let script = extracted.js.trim();
        if !script.is_empty() {
            module.push('\n');
            module.push_str(script);
            module.push('\n');
        }

        self.ctx
            .writer
            .write(&GeneratedAsset::new(AssetKind::Js, key.clone(), module.clone()))?;
        self.ctx.writer.write(&extracted.css_asset(&key))?;
        self.ctx
            .writer
            .write(&GeneratedAsset::new(AssetKind::Markup, key.clone(), markup.clone()))?;

        Ok(CompiledComponent {
            name: name.to_string(),
            pascal_name,
            key,
            source_path: path.to_path_buf(),
            module,
            references: tree.references,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PLACEHOLDER SCANNING
// ═══════════════════════════════════════════════════════════════════════════════

/// Placeholders in document order: empty elements (whitespace allowed inside) or
/// self-closing tags with a `component-`/`component_` id.
fn find_placeholders(markup: &str) -> Vec<Placeholder> {
    let mut found = Vec::new();
    let mut pos = 0;

    while let Some(caps) = PLACEHOLDER_RE.captures_at(markup, pos) {
        let Some(whole) = caps.get(0) else { break };
        let name = caps[3].trim().to_string();
        let tag = &caps[1];

        let end = if &caps[5] == "/" {
            Some(whole.end())
        } else {
            closing_tag_end(markup, whole.end(), tag)
        };

        match end {
            Some(end) if !name.is_empty() => {
                found.push(Placeholder {
                    start: whole.start(),
                    end,
                    name,
                });
                pos = end;
            }
            _ => pos = whole.end(),
        }
    }

    found
}

/// End of `</tag>` when only whitespace separates it from `from`.
fn closing_tag_end(markup: &str, from: usize, tag: &str) -> Option<usize> {
    let rest = &markup[from..];
    let trimmed = rest.trim_start();
    let offset = from + (rest.len() - trimmed.len());

    let closing = format!("</{}", tag);
    let head = trimmed.get(..closing.len())?;
    if !head.eq_ignore_ascii_case(&closing) {
        return None;
    }

    let after = &trimmed[closing.len()..];
    let after_trimmed = after.trim_start();
    if !after_trimmed.starts_with('>') {
        return None;
    }
    Some(offset + closing.len() + (after.len() - after_trimmed.len()) + 1)
}

fn file_name_candidates(pascal_name: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    for c in pascal_name.chars() {
        if c.is_uppercase() || words.is_empty() {
            words.push(c.to_lowercase().collect());
        } else if let Some(last) = words.last_mut() {
            last.push(c);
        }
    }

    let mut candidates = vec![words.join(""), words.join("-"), words.join("_")];
    candidates.dedup();
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BuildMode, CompilerConfig};
    use std::fs;
    use tempfile::TempDir;

    fn context(dir: &TempDir) -> CompileContext {
        let config = CompilerConfig::with_root(dir.path());
        CompileContext::new(config, BuildMode::default())
    }

    fn write_component(dir: &TempDir, name: &str, content: &str) {
        let path = dir.path().join("components").join(format!("{}.html", name));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_find_placeholders() {
        let markup = r#"<div id="component-simple"></div><span class="x" id='component_user card' />
<div id="component-full">has content</div><section id="component-a">
</section>"#;
        let names: Vec<String> = find_placeholders(markup).into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["simple", "user card", "a"]);
    }

    #[test]
    fn test_closing_tag_end() {
        let markup = "<div id=x>  </DIV >tail";
        let end = closing_tag_end(markup, 10, "div").unwrap();
        assert_eq!(&markup[end..], "tail");
        assert_eq!(closing_tag_end("<p>x</p>", 3, "p"), None);
    }

    #[test]
    fn test_file_name_candidates() {
        assert_eq!(file_name_candidates("Simple"), vec!["simple"]);
        assert_eq!(
            file_name_candidates("UserCard"),
            vec!["usercard", "user-card", "user_card"]
        );
    }

    #[test]
    fn test_resolve_replaces_and_dedups() {
        let dir = TempDir::new().unwrap();
        write_component(&dir, "simple", "<p>simple</p>");
        let ctx = context(&dir);
        let mut resolver = ComponentResolver::new(&ctx);

        let (markup, refs) = resolver
            .resolve(r#"<main><div id="component-simple"></div><div id="component-simple"/></main>"#)
            .unwrap();

        assert_eq!(
            markup,
            "<main><Simple suppressHydrationWarning={true} /><Simple suppressHydrationWarning={true} /></main>"
        );
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].pascal_name, "Simple");
        assert!(refs[0].resolved);
        assert!(dir.path().join("generated/js/component_simple.js").exists());
        assert!(dir.path().join("generated/css/component_simple.css").exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("generated/markup/component_simple.html")).unwrap(),
            "<p>simple</p>"
        );
    }

    #[test]
    fn test_parallel_resolvers_share_one_compile() {
        use rayon::prelude::*;

        let dir = TempDir::new().unwrap();
        write_component(&dir, "simple", "<p>simple</p>");
        let ctx = context(&dir);

        let compiled: Vec<Arc<CompiledComponent>> = (0..8)
            .into_par_iter()
            .map(|_| {
                ComponentResolver::new(&ctx)
                    .ensure_compiled("simple")
                    .unwrap()
                    .unwrap()
            })
            .collect();

        assert!(compiled.iter().all(|c| Arc::ptr_eq(c, &compiled[0])));
        assert_eq!(ctx.compiled_component_names(), vec!["Simple".to_string()]);
    }

    #[test]
    fn test_missing_component_left_unexpanded() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let mut resolver = ComponentResolver::new(&ctx);
        let input = r#"<div id="component-ghost"></div>"#;
        let (markup, refs) = resolver.resolve(input).unwrap();
        assert_eq!(markup, input);
        assert!(refs.is_empty());
    }

    #[test]
    fn test_component_module_carries_script_and_nested_refs() {
        let dir = TempDir::new().unwrap();
        write_component(
            &dir,
            "user-card",
            r#"<div class="card"><div id="component-avatar"></div></div><script>function greet() {}</script><style>.card{}</style>"#,
        );
        write_component(&dir, "avatar", "<img src=\"a.png\">");
        let ctx = context(&dir);
        let mut resolver = ComponentResolver::new(&ctx);

        let card = resolver.ensure_compiled("user-card").unwrap().unwrap();
        assert_eq!(card.pascal_name, "UserCard");
        assert_eq!(card.references, vec!["Avatar".to_string()]);
        assert!(card.module.contains("function UserCardTree(props, state)"));
        assert!(card.module.trim_end().ends_with("function greet() {}"));
        assert!(ctx.component("Avatar").is_some());

        let css = fs::read_to_string(dir.path().join("generated/css/component_user-card.css")).unwrap();
        assert_eq!(css, ".card{}\n");
    }

    #[test]
    fn test_component_cycle_terminates() {
        let dir = TempDir::new().unwrap();
        write_component(&dir, "ping", r#"<b><div id="component-pong"></div></b>"#);
        write_component(&dir, "pong", r#"<i><div id="component-ping"></div></i>"#);
        let ctx = context(&dir);
        let mut resolver = ComponentResolver::new(&ctx);

        let ping = resolver.ensure_compiled("ping").unwrap().unwrap();
        assert_eq!(ping.references, vec!["Pong".to_string()]);
        let pong = ctx.component("Pong").unwrap();
        assert!(pong.references.is_empty());
    }

    #[test]
    fn test_ensure_identifier_finds_kebab_file() {
        let dir = TempDir::new().unwrap();
        write_component(&dir, "nav-bar", "<nav/>");
        let ctx = context(&dir);
        let mut resolver = ComponentResolver::new(&ctx);
        let nav = resolver.ensure_identifier("NavBar").unwrap().unwrap();
        assert_eq!(nav.name, "nav-bar");
    }
}
