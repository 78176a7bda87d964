//! Compilation pipeline for the extension.
//!
//! This module provides:
//! - Compile planning (manifest → object paths, opt-in incremental skip)
//! - The toolchain seam (compiler and linker invocation)
//! - Compile strategies (sequential, or a parallel worker pool)
//!
//! # Architecture
//!
//! ```text
//! SourceManifest ──► CompilePlan ──► CompileStrategy ──► objects ──► Toolchain::link
//!                      │                  │
//!                      │                  └── Toolchain::compile (one call per task)
//!                      └── object ↦ CompileTask (pending units only)
//! ```

mod strategy;
mod toolchain;
mod types;

pub use strategy::{CompileStrategy, default_jobs};
pub use toolchain::{CommandToolchain, Toolchain};
pub use types::{
    CompilePlan, CompileTask, clear_fingerprint, compile_fingerprint, record_fingerprint,
    shared_library_extension,
};
