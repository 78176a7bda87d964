//! Top-level build and clean pipelines.
//!
//! `build`: provenance → codegen → vendored copy → discovery → compile →
//! link → test build. Each stage runs only after the previous one succeeded,
//! so a failed generator never reaches discovery. `clean` runs alone.

use std::sync::Arc;

use crate::build::{BuildReport, ExtensionBuilder};
use crate::clean::{CleanReport, Cleaner};
use crate::codegen::CodeGenerator;
use crate::compile::CommandToolchain;
use crate::config::BuildConfiguration;
use crate::error::{Error, Result, Stage};
use crate::layout::ProjectLayout;
use crate::manifest::{SourceManifest, SourceSetAssembler};
use crate::provenance::{ProvenanceStamper, VersionRecord};
use crate::vendor;

/// Callback trait for stage progress reporting.
pub trait PipelineObserver: Send + Sync {
    /// Called when a stage starts.
    fn on_stage_started(&self, _stage: Stage) {}

    /// Called when a stage completes successfully.
    fn on_stage_completed(&self, _stage: Stage) {}

    /// Called when a stage is disabled by configuration.
    fn on_stage_skipped(&self, _stage: Stage) {}

    /// Called when a stage fails.
    fn on_stage_failed(&self, _stage: Stage, _error: &Error) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Run one stage, notifying `observer` and attributing failures to `stage`.
pub(crate) fn run_stage<T>(
    observer: &dyn PipelineObserver,
    stage: Stage,
    f: impl FnOnce() -> Result<T>,
) -> Result<T> {
    observer.on_stage_started(stage);
    match f() {
        Ok(value) => {
            observer.on_stage_completed(stage);
            Ok(value)
        }
        Err(e) => {
            let e = e.in_stage(stage);
            observer.on_stage_failed(stage, &e);
            Err(e)
        }
    }
}

/// Options for a build run.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Skip units whose object is up to date, unless the compile flags
    /// changed since the last build.
    pub incremental: bool,
}

/// Everything a successful build produced.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// Stamped version record.
    pub version: VersionRecord,

    /// Number of translation units in the manifest.
    pub sources: usize,

    /// Compile/link/test-build report.
    pub report: BuildReport,
}

/// The build pipeline for one repository.
pub struct Pipeline {
    layout: ProjectLayout,
    config: BuildConfiguration,
    observer: Arc<dyn PipelineObserver>,
}

impl Pipeline {
    /// Create a pipeline for a layout and configuration snapshot.
    pub fn new(layout: ProjectLayout, config: BuildConfiguration) -> Self {
        Self {
            layout,
            config,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Set the progress observer.
    pub fn with_observer(mut self, observer: impl PipelineObserver + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    /// Repository layout.
    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// Configuration snapshot.
    pub fn config(&self) -> &BuildConfiguration {
        &self.config
    }

    /// Resolve revisions and rewrite both version files.
    pub fn stamp(&self) -> Result<VersionRecord> {
        run_stage(self.observer.as_ref(), Stage::Provenance, || {
            ProvenanceStamper::new(&self.layout).stamp(&self.config)
        })
    }

    /// Assemble the manifest from the current tree.
    pub fn discover(&self) -> Result<SourceManifest> {
        run_stage(self.observer.as_ref(), Stage::Discover, || {
            Ok(SourceSetAssembler::standard().assemble(&self.config, &self.layout))
        })
    }

    /// Run the full build.
    pub fn run_build(&self, options: BuildOptions) -> Result<BuildOutcome> {
        let observer = self.observer.as_ref();

        let version = self.stamp()?;

        // Generated code must exist before the tree is globbed.
        run_stage(observer, Stage::Codegen, || CodeGenerator::new(&self.layout).run())?;
        run_stage(observer, Stage::Copy, || vendor::sync(&self.layout))?;

        let manifest = self.discover()?;
        let toolchain = CommandToolchain::new(&self.config, &self.layout, &manifest);

        let report = ExtensionBuilder::new(&self.layout, &self.config)
            .with_incremental(options.incremental)
            .build(&manifest, &toolchain, observer)?;

        Ok(BuildOutcome {
            version,
            sources: manifest.len(),
            report,
        })
    }

    /// Run the ignore-file driven clean.
    pub fn run_clean(&self) -> Result<CleanReport> {
        run_stage(self.observer.as_ref(), Stage::Clean, || {
            Cleaner::new(&self.layout).run()
        })
    }
}
