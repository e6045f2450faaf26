//! Build configuration.
//!
//! Two layers: `BuildMode`, read once from the process environment and never mutated, and
//! `CompilerConfig`, the project layout plus the runtime names the generated code targets.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CompileError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// BUILD MODE
// ═══════════════════════════════════════════════════════════════════════════════

pub const ENV_SINGLE_FUNCTION: &str = "WAX_FORK";
pub const ENV_NO_LAYOUTS: &str = "DEBUG_NO_LAYOUTS";
pub const ENV_DEBUG_TRACE: &str = "DEBUG_TRANSPILE";

/// Layout of the generated component function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FunctionShape {
    /// One exported function holding setup and tree.
    Single,
    /// Setup function delegating to a pure `<Name>Tree(props, state)` render function.
    #[default]
    Dual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildMode {
    pub shape: FunctionShape,
    pub layouts: bool,
    /// Raises log verbosity. Never changes generated bytes.
    pub debug_trace: bool,
}

impl Default for BuildMode {
    fn default() -> Self {
        Self {
            shape: FunctionShape::Dual,
            layouts: true,
            debug_trace: false,
        }
    }
}

impl BuildMode {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve the mode from an arbitrary variable source.
    ///
    /// A flag counts as set only for the exact value `1`; unset, empty and `0` all keep the
    /// default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| lookup(key).map(|v| v.trim() == "1").unwrap_or(false);

        Self {
            shape: if flag(ENV_SINGLE_FUNCTION) {
                FunctionShape::Single
            } else {
                FunctionShape::Dual
            },
            layouts: !flag(ENV_NO_LAYOUTS),
            debug_trace: flag(ENV_DEBUG_TRACE),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROJECT CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerConfig {
    /// Template root; every other input directory is relative to it.
    pub root: PathBuf,
    pub page_dirs: Vec<String>,
    pub layouts_dir: String,
    pub components_dir: String,
    pub views_dir: String,
    /// Output directory, relative to `root` unless absolute.
    pub output_dir: PathBuf,
    /// Callee of every element-construction call.
    pub factory: String,
    pub fragment: String,
    /// Global client helper that mounts/hydrates an exported page function.
    pub bootstrap: String,
    pub container: String,
    pub common_script: String,
    pub default_layout: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("tpl"),
            page_dirs: vec!["pages".into(), "admin".into(), "app".into()],
            layouts_dir: "layouts".into(),
            components_dir: "components".into(),
            views_dir: "views".into(),
            output_dir: PathBuf::from("generated"),
            factory: "React.createElement".into(),
            fragment: "React.Fragment".into(),
            bootstrap: "hydrateReactApp".into(),
            container: "main".into(),
            common_script: "_common.js".into(),
            default_layout: "pages".into(),
        }
    }
}

impl CompilerConfig {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|e| CompileError::read(path, e))?;
        serde_json::from_str(&data).map_err(|e| CompileError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn components_path(&self) -> PathBuf {
        self.root.join(&self.components_dir)
    }

    pub fn layouts_path(&self) -> PathBuf {
        self.root.join(&self.layouts_dir)
    }

    pub fn output_path(&self) -> PathBuf {
        if self.output_dir.is_absolute() {
            self.output_dir.clone()
        } else {
            self.root.join(&self.output_dir)
        }
    }

    pub fn common_script_source(&self) -> PathBuf {
        self.root
            .join(&self.views_dir)
            .join("js")
            .join(&self.common_script)
    }

    /// Layout file for a named layout, e.g. `landing` → `layouts/layout_landing.html`.
    pub fn layout_file(&self, layout: &str) -> PathBuf {
        self.layouts_path().join(format!("layout_{}.html", layout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn mode_with(vars: &[(&str, &str)]) -> BuildMode {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BuildMode::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_dual_is_default() {
        assert_eq!(mode_with(&[]).shape, FunctionShape::Dual);
        assert_eq!(mode_with(&[(ENV_SINGLE_FUNCTION, "0")]).shape, FunctionShape::Dual);
        assert_eq!(mode_with(&[(ENV_SINGLE_FUNCTION, "")]).shape, FunctionShape::Dual);
    }

    #[test]
    fn test_single_flag() {
        assert_eq!(mode_with(&[(ENV_SINGLE_FUNCTION, "1")]).shape, FunctionShape::Single);
    }

    #[test]
    fn test_layout_and_debug_flags() {
        let mode = mode_with(&[(ENV_NO_LAYOUTS, "1"), (ENV_DEBUG_TRACE, "1")]);
        assert!(!mode.layouts);
        assert!(mode.debug_trace);

        let mode = mode_with(&[]);
        assert!(mode.layouts);
        assert!(!mode.debug_trace);
    }

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let config: CompilerConfig =
            serde_json::from_str(r#"{"root": "site", "factory": "h"}"#).unwrap();
        assert_eq!(config.root, PathBuf::from("site"));
        assert_eq!(config.factory, "h");
        assert_eq!(config.fragment, "React.Fragment");
        assert_eq!(config.components_path(), PathBuf::from("site/components"));
        assert_eq!(config.output_path(), PathBuf::from("site/generated"));
        assert_eq!(
            config.layout_file("landing"),
            PathBuf::from("site/layouts/layout_landing.html")
        );
    }
}
