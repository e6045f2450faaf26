//! Template sources and the naming scheme shared with the serving layer.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CompileError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    Page,
    Layout,
    Component,
    Partial,
}

/// One template file as read from disk.
#[derive(Debug, Clone)]
pub struct TemplateSource {
    pub path: PathBuf,
    pub kind: TemplateKind,
    pub text: String,
}

impl TemplateSource {
    pub fn read(path: &Path, kind: TemplateKind) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| CompileError::read(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            kind,
            text,
        })
    }

    /// File name without its final extension, e.g. `index.page.landing`.
    pub fn base_name(&self) -> String {
        base_name(&self.path)
    }

    /// Asset key `<scope>_<basename>`, where scope is the parent directory name.
    pub fn asset_key(&self) -> String {
        let scope = self
            .path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|s| s.to_str())
            .unwrap_or("root");
        format!("{}_{}", scope, self.base_name())
    }

    /// Exported identifier of the generated function.
    ///
    /// Dot notation (`name.type.layout`) uses the first segment for two-part names and the
    /// whole name for three or more segments, so sibling variants never collide.
    pub fn export_name(&self) -> String {
        let base = self.base_name();
        let parts: Vec<&str> = base.split('.').collect();
        if parts.len() == 2 {
            pascal_case(parts[0])
        } else {
            pascal_case(&base)
        }
    }

    /// Layout named by a `name.type.layout` file name, if any.
    pub fn layout_hint(&self) -> Option<String> {
        let base = self.base_name();
        let parts: Vec<&str> = base.split('.').collect();
        if parts.len() >= 3 && !parts[2].is_empty() {
            Some(parts[2].to_string())
        } else {
            None
        }
    }
}

pub fn base_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}

/// PascalCase on word boundaries (`-`, `_`, `.`, whitespace).
pub fn pascal_case(name: &str) -> String {
    name.split(|c: char| c == '-' || c == '_' || c == '.' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
