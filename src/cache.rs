//! Asset writer and output manifest.
//!
//! Every generated asset is written to a temp file next to its target and renamed into
//! place. `manifest.json` maps each output file to the sha256 of its content; content whose
//! digest is unchanged (and whose file still exists) is not rewritten.

use log::{debug, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::assets::GeneratedAsset;
use crate::error::{CompileError, Result};

pub const MANIFEST_FILE: &str = "manifest.json";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub key: String,
    pub hash: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    /// Output-relative file name → entry.
    pub assets: BTreeMap<String, ManifestEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Unchanged,
}

pub struct AssetWriter {
    out_dir: PathBuf,
    manifest: Mutex<Manifest>,
}

impl AssetWriter {
    /// Open a writer over `out_dir`, loading any existing manifest.
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        let out_dir = out_dir.into();
        let manifest = Self::load_manifest(&out_dir.join(MANIFEST_FILE));
        Self {
            out_dir,
            manifest: Mutex::new(manifest),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn compute_hash(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn load_manifest(path: &Path) -> Manifest {
        let Ok(data) = fs::read_to_string(path) else {
            return Manifest::default();
        };

        match serde_json::from_str(&data) {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!("ignoring unreadable manifest {}: {}", path.display(), e);
                Manifest::default()
            }
        }
    }

    pub fn path_of(&self, asset: &GeneratedAsset) -> PathBuf {
        self.out_dir.join(asset.kind.file_name(&asset.key))
    }

    pub fn write(&self, asset: &GeneratedAsset) -> Result<WriteOutcome> {
        let rel = asset.kind.file_name(&asset.key);
        let target = self.out_dir.join(&rel);
        let hash = Self::compute_hash(&asset.content);

        let unchanged = self
            .manifest
            .lock()
            .assets
            .get(&rel)
            .is_some_and(|entry| entry.hash == hash);
        if unchanged && target.exists() {
            debug!("{} unchanged", rel);
            return Ok(WriteOutcome::Unchanged);
        }

        write_atomic(&target, &asset.content)?;
        self.manifest.lock().assets.insert(
            rel,
            ManifestEntry {
                key: asset.key.clone(),
                hash,
            },
        );
        Ok(WriteOutcome::Written)
    }

    pub fn save_manifest(&self) -> Result<()> {
        let data = serde_json::to_string_pretty(&*self.manifest.lock()).map_err(|e| {
            CompileError::Config {
                path: self.out_dir.join(MANIFEST_FILE),
                message: e.to_string(),
            }
        })?;
        write_atomic(&self.out_dir.join(MANIFEST_FILE), &data)
    }
}

/// Write `content` to a sibling temp file, then rename it over `target`.
pub fn write_atomic(target: &Path, content: &str) -> Result<()> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| CompileError::write(dir, e))?;

    let file_name = target
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("asset");
    let tmp = dir.join(format!(
        ".{}.{}.{}.tmp",
        file_name,
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    fs::write(&tmp, content).map_err(|e| CompileError::write(&tmp, e))?;
    fs::rename(&tmp, target).map_err(|e| {
        fs::remove_file(&tmp).ok();
        CompileError::write(target, e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetKind;
    use tempfile::TempDir;

    #[test]
    fn test_write_and_skip_unchanged() {
        let dir = TempDir::new().unwrap();
        let writer = AssetWriter::new(dir.path());
        let asset = GeneratedAsset::new(AssetKind::Css, "pages_index", ".a{}\n");

        assert_eq!(writer.write(&asset).unwrap(), WriteOutcome::Written);
        assert_eq!(writer.write(&asset).unwrap(), WriteOutcome::Unchanged);
        assert_eq!(
            fs::read_to_string(dir.path().join("css/pages_index.css")).unwrap(),
            ".a{}\n"
        );

        let changed = GeneratedAsset::new(AssetKind::Css, "pages_index", ".b{}\n");
        assert_eq!(writer.write(&changed).unwrap(), WriteOutcome::Written);
    }

    #[test]
    fn test_empty_content_is_written() {
        let dir = TempDir::new().unwrap();
        let writer = AssetWriter::new(dir.path());
        writer
            .write(&GeneratedAsset::new(AssetKind::Css, "pages_bare", ""))
            .unwrap();
        assert!(dir.path().join("css/pages_bare.css").exists());
    }

    #[test]
    fn test_manifest_round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        {
            let writer = AssetWriter::new(dir.path());
            writer
                .write(&GeneratedAsset::new(AssetKind::Js, "component_simple", "x"))
                .unwrap();
            writer.save_manifest().unwrap();
        }

        let saved: Manifest =
            serde_json::from_str(&fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap())
                .unwrap();
        let entry = saved.assets.get("js/component_simple.js").unwrap();
        assert_eq!(entry.key, "component_simple");

        let reopened = AssetWriter::new(dir.path());
        assert_eq!(entry.hash, AssetWriter::compute_hash("x"));
        assert_eq!(
            reopened
                .write(&GeneratedAsset::new(AssetKind::Js, "component_simple", "x"))
                .unwrap(),
            WriteOutcome::Unchanged
        );
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("js/a.js");
        write_atomic(&target, "a").unwrap();
        let names: Vec<_> = fs::read_dir(dir.path().join("js"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }
}
