//! # Hydrate Compiler
//!
//! Compiles semi-HTML page, layout and component templates into standalone JavaScript
//! modules that build their UI through element-construction calls
//! `create(tag, props, ...children)` and hydrate it on the client.
//!
//! ## Pipeline
//!
//! 1. **Includes**: `<!--#include "path"-->` is spliced recursively, then comments go.
//! 2. **Normalization**: `{{.Name}}` → `{page.Name}`, directive attributes →
//!    `data-alpine-*`, void tags closed exactly once.
//! 3. **Assets**: inline `<style>`/`<script>` contents move to per-key CSS/JS.
//! 4. **Components**: `id="component-<name>"` placeholders become `<Pascal />` references,
//!    each component compiled once per run through the same pipeline.
//! 5. **Codegen**: the markup tree becomes nested construction calls.
//! 6. **Shape**: the tree is wrapped in a single or dual function layout.
//! 7. **Linking**: referenced components are embedded and the hydration trailer appended.
//!
//! ## Invariants
//!
//! - Component references are self-closing and never receive a children argument.
//! - Every compiled page has a CSS asset on disk, possibly empty.
//! - `BuildMode` is read once per process and never varies within a run.
//! - Missing includes and missing components degrade locally; they never fail a compile.

pub mod assets;
pub mod cache;
pub mod codegen;
pub mod component;
pub mod config;
pub mod context;
pub mod discovery;
pub mod error;
pub mod finalize;
pub mod include;
pub mod layout;
pub mod normalize;
pub mod parse;
pub mod pipeline;
pub mod shape;
pub mod source;


pub use assets::{AssetKind, GeneratedAsset};
pub use codegen::{generate_markup, CodegenOptions, GeneratedTree, SlotFill};
pub use config::{BuildMode, CompilerConfig, FunctionShape};
pub use context::CompileContext;
pub use discovery::{build_project, BuildFailure, BuildReport};
pub use error::{CompileError, Result};
pub use pipeline::{compile_file, compile_layout, compile_page, CompiledTemplate};
pub use source::{TemplateKind, TemplateSource};
