//! Core engine for the extbuild native-extension builder.
//!
//! This crate provides:
//! - Provenance stamping (git revisions into generated version files)
//! - Code generator and vendored-source stages
//! - Source set discovery into a frozen build manifest
//! - Sequential and parallel compile strategies plus linking
//! - Sentinel-aware cleanup driven by an ignore file
//!
//! # Architecture
//!
//! ```text
//! provenance ──► codegen ──► vendor ──► manifest ──► build
//!                                                     │
//!                                                     ├── CompileStrategy (parallel / sequential)
//!                                                     ├── link ──► build/lib/_native_ext.so
//!                                                     └── downstream test build
//! ```

pub mod build;
pub mod clean;
pub mod codegen;
pub mod compile;
pub mod config;
pub mod error;
pub mod layout;
pub mod manifest;
pub mod pipeline;
pub mod process;
pub mod provenance;
pub mod vendor;

pub use build::{BuildReport, ExtensionBuilder};
pub use clean::{CleanPlan, CleanReport, Cleaner};
pub use compile::{CommandToolchain, CompilePlan, CompileStrategy, CompileTask, Toolchain};
pub use config::BuildConfiguration;
pub use error::{BestEffort, Error, Result, Stage};
pub use layout::ProjectLayout;
pub use manifest::{SourceManifest, SourcePattern, SourceSetAssembler};
pub use pipeline::{BuildOptions, BuildOutcome, NoopObserver, Pipeline, PipelineObserver};
pub use provenance::{ProvenanceStamper, VersionRecord};
