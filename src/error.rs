//! Compiler errors.
//!
//! Only conditions that must stop a single file's compile live here. Missing includes,
//! missing component sources and unsupported template constructs are recovered where they
//! occur and never surface as a `CompileError`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_READ: &str = "HC-ERR-READ";
pub const ERR_WRITE: &str = "HC-ERR-WRITE";
pub const ERR_PARSE: &str = "HC-ERR-PARSE";
pub const ERR_CONFIG: &str = "HC-ERR-CONFIG";

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse markup of {file}: {message}")]
    Parse { file: String, message: String },

    #[error("invalid configuration {path}: {message}")]
    Config { path: PathBuf, message: String },
}

impl CompileError {
    pub fn read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CompileError::Read {
            path: path.into(),
            source,
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CompileError::Write {
            path: path.into(),
            source,
        }
    }

    /// Stable code reported alongside the message in batch reports.
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::Read { .. } => ERR_READ,
            CompileError::Write { .. } => ERR_WRITE,
            CompileError::Parse { .. } => ERR_PARSE,
            CompileError::Config { .. } => ERR_CONFIG,
        }
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;
