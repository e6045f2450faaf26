//! Hydration Trailer Generator
//!
//! Links a page (or standalone layout) module into one classic script: the module itself,
//! every component it transitively references (each exactly once, first-reference order),
//! then the trailer that publishes the function on `window` and hands it to the client
//! bootstrap helper.

use log::debug;
use std::collections::{HashSet, VecDeque};

use crate::component::ComponentResolver;
use crate::config::CompilerConfig;
use crate::error::Result;
use crate::shape::strip_export;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trailer {
    /// Publish on `window` and call the bootstrap helper.
    Hydrate,
    /// Publish on `window` only.
    Export,
}

#[derive(Debug, Clone, Default)]
pub struct Bundle {
    pub code: String,
    /// Embedded component identifiers, in embedding order.
    pub embedded: Vec<String>,
}

pub fn link_bundle(
    resolver: &mut ComponentResolver,
    config: &CompilerConfig,
    name: &str,
    module: &str,
    references: &[String],
    trailer: Trailer,
) -> Result<Bundle> {
    let mut code = strip_export(module);
    let mut embedded = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(name.to_string());

    let mut queue: VecDeque<String> = references.iter().cloned().collect();
    while let Some(reference) = queue.pop_front() {
        if !seen.insert(reference.clone()) {
            continue;
        }

        match resolver.ensure_identifier(&reference)? {
            Some(component) => {
                code.push('\n');
                code.push_str(&strip_export(&component.module));
                embedded.push(component.pascal_name.clone());
                queue.extend(component.references.iter().cloned());
            }
            None => debug!(
                "{} references {} without a component source; expecting a runtime global",
                name, reference
            ),
        }
    }

    code.push('\n');
    code.push_str(&match trailer {
        Trailer::Hydrate => hydration_trailer(name, config),
        Trailer::Export => format!("window.{} = {};\n", name, name),
    });

    Ok(Bundle { code, embedded })
}

pub fn hydration_trailer(name: &str, config: &CompilerConfig) -> String {
    format!(
        "var page = window.pageData || {{}};\n\
         window.{name} = {name};\n\
         try {{\n    \
         window.{bootstrap}('{name}', {{ page: window.pageData || {{}}, container: '{container}' }});\n\
         }} catch (e) {{\n    \
         console.error('Failed to hydrate {name}:', e);\n\
         }}\n",
        name = name,
        bootstrap = config.bootstrap,
        container = config.container,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildMode;
    use crate::context::CompileContext;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_hydration_trailer() {
        let trailer = hydration_trailer("Index", &CompilerConfig::default());
        assert_eq!(
            trailer,
            "var page = window.pageData || {};\n\
             window.Index = Index;\n\
             try {\n    window.hydrateReactApp('Index', { page: window.pageData || {}, container: 'main' });\n\
             } catch (e) {\n    console.error('Failed to hydrate Index:', e);\n}\n"
        );
    }

    #[test]
    fn test_transitive_closure_embedded_once() {
        let dir = TempDir::new().unwrap();
        let components = dir.path().join("components");
        fs::create_dir_all(&components).unwrap();
        fs::write(components.join("card.html"), r#"<div><div id="component-badge"></div></div>"#).unwrap();
        fs::write(components.join("badge.html"), "<span>b</span>").unwrap();
        fs::write(components.join("header.html"), r#"<h1><div id="component-badge"/></h1>"#).unwrap();

        let ctx = CompileContext::new(CompilerConfig::with_root(dir.path()), BuildMode::default());
        let mut resolver = ComponentResolver::new(&ctx);
        let refs = vec!["Header".to_string(), "Card".to_string(), "Header".to_string()];
        let bundle = link_bundle(
            &mut resolver,
            &ctx.config,
            "Index",
            "function Index(props) {}\n",
            &refs,
            Trailer::Hydrate,
        )
        .unwrap();

        assert_eq!(bundle.embedded, vec!["Header", "Card", "Badge"]);
        assert_eq!(bundle.code.matches("function Badge(props)").count(), 1);
        assert!(bundle.code.ends_with("}\n"));
        assert!(bundle.code.contains("window.Index = Index;"));
    }

    #[test]
    fn test_unknown_reference_skipped() {
        let dir = TempDir::new().unwrap();
        let ctx = CompileContext::new(CompilerConfig::with_root(dir.path()), BuildMode::default());
        let mut resolver = ComponentResolver::new(&ctx);
        let bundle = link_bundle(
            &mut resolver,
            &ctx.config,
            "LayoutPages",
            "export default function LayoutPages(props) {}\n",
            &["Widget".to_string()],
            Trailer::Export,
        )
        .unwrap();
        assert!(bundle.embedded.is_empty());
        assert!(bundle.code.starts_with("function LayoutPages(props) {}"));
        assert!(bundle.code.ends_with("window.LayoutPages = LayoutPages;\n"));
        assert!(!bundle.code.contains("hydrateReactApp"));
    }
}
