//! Extension build orchestration.
//!
//! Compiles the frozen manifest with the selected strategy, links the shared
//! library, then runs the downstream test build.

use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};

use crate::compile::{
    CompilePlan, CompileStrategy, Toolchain, clear_fingerprint, compile_fingerprint,
    record_fingerprint,
};
use crate::config::BuildConfiguration;
use crate::error::{Result, Stage};
use crate::layout::ProjectLayout;
use crate::manifest::SourceManifest;
use crate::pipeline::{PipelineObserver, run_stage};
use crate::process;

/// Result of a successful extension build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Linked shared library.
    pub artifact: PathBuf,

    /// Every object linked, in manifest order.
    pub objects: Vec<PathBuf>,

    /// Units actually compiled (an incremental build skips up-to-date ones).
    pub compiled: usize,

    /// Whether the downstream test build ran.
    pub tests_built: bool,

    /// Wall time of compile, link and test build.
    pub elapsed: Duration,
}

/// Drives compile, link and the downstream test build.
pub struct ExtensionBuilder<'a> {
    layout: &'a ProjectLayout,
    strategy: CompileStrategy,
    compiler: String,
    build_tests: bool,
    incremental: bool,
}

impl<'a> ExtensionBuilder<'a> {
    /// Create a builder using the strategy selected by `config`.
    pub fn new(layout: &'a ProjectLayout, config: &BuildConfiguration) -> Self {
        Self {
            layout,
            strategy: config.strategy(),
            compiler: config.compiler.clone(),
            build_tests: config.build_tests,
            incremental: false,
        }
    }

    /// Override the compile strategy.
    pub fn with_strategy(mut self, strategy: CompileStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Skip units whose object is newer than their source, as long as the
    /// compile flags match the previous build.
    pub fn with_incremental(mut self, incremental: bool) -> Self {
        self.incremental = incremental;
        self
    }

    /// Selected compile strategy.
    pub fn strategy(&self) -> CompileStrategy {
        self.strategy
    }

    /// Compile, link and (unless disabled) build the native tests.
    ///
    /// Each step is reported to `observer` and failures are attributed to
    /// the [`Stage`] that produced them.
    pub fn build(
        &self,
        manifest: &SourceManifest,
        toolchain: &dyn Toolchain,
        observer: &dyn PipelineObserver,
    ) -> Result<BuildReport> {
        let start = Instant::now();
        let fingerprint = compile_fingerprint(&self.compiler, manifest);
        let plan = if self.incremental {
            CompilePlan::incremental(manifest, self.layout, &fingerprint)
        } else {
            CompilePlan::new(manifest, self.layout)
        };

        let objects = run_stage(observer, Stage::Compile, || {
            self.layout.ensure_build_dirs()?;
            clear_fingerprint(self.layout)?;
            let objects = self.strategy.compile(&plan, toolchain)?;
            record_fingerprint(self.layout, &fingerprint)?;
            Ok(objects)
        })?;

        let artifact = self.layout.artifact_path();
        run_stage(observer, Stage::Link, || toolchain.link(&objects, &artifact))?;

        if self.build_tests {
            run_stage(observer, Stage::TestBuild, || self.run_test_build())?;
        } else {
            tracing::info!("Skipping native test build");
            observer.on_stage_skipped(Stage::TestBuild);
        }

        Ok(BuildReport {
            artifact,
            objects,
            compiled: plan.pending(),
            tests_built: self.build_tests,
            elapsed: start.elapsed(),
        })
    }

    /// Run the downstream test-build script with its clean-rebuild flag.
    pub fn run_test_build(&self) -> Result<()> {
        tracing::info!("Building native tests");
        process::run(
            Command::new(&self.layout.test_build_script)
                .arg("-B")
                .current_dir(&self.layout.root),
        )
    }
}
