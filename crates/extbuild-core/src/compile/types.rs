//! Common types for the compilation pipeline.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::layout::ProjectLayout;
use crate::manifest::SourceManifest;

/// One translation unit to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileTask {
    /// Source file, relative to the root unless absolute
    pub source: PathBuf,

    /// Object file written by the compiler
    pub object: PathBuf,

    /// Flags appended after the source-specific arguments
    pub extra_args: Vec<String>,
}

/// Output of the compile setup step.
///
/// `objects` lists every object of the manifest, in manifest order. Only
/// objects that need rebuilding have a task; strategies skip the rest.
#[derive(Debug, Clone, Default)]
pub struct CompilePlan {
    objects: Vec<PathBuf>,
    tasks: FxHashMap<PathBuf, CompileTask>,
}

impl CompilePlan {
    /// Plan a full compile: every unit of `manifest` gets a task.
    pub fn new(manifest: &SourceManifest, layout: &ProjectLayout) -> Self {
        Self::planned(manifest, layout, |_, _| true)
    }

    /// Plan an incremental compile.
    ///
    /// When `fingerprint` differs from the one recorded by the last
    /// successful compile, every unit is rebuilt. Otherwise a unit whose
    /// object exists and is at least as new as its source gets no task.
    /// Header changes are not tracked.
    pub fn incremental(manifest: &SourceManifest, layout: &ProjectLayout, fingerprint: &str) -> Self {
        let recorded = fs::read_to_string(&layout.compile_fingerprint).ok();
        if recorded.as_deref() != Some(fingerprint) {
            tracing::info!("Compile flags changed since the last build, rebuilding every unit");
            return Self::new(manifest, layout);
        }

        Self::planned(manifest, layout, |source, object| {
            !is_up_to_date(&layout.root.join(source), object)
        })
    }

    fn planned(
        manifest: &SourceManifest,
        layout: &ProjectLayout,
        needs_compile: impl Fn(&Path, &Path) -> bool,
    ) -> Self {
        let mut plan = Self::default();

        for source in manifest.sources() {
            let object = layout.object_path(source);

            if needs_compile(source.as_path(), object.as_path()) {
                plan.tasks.insert(
                    object.clone(),
                    CompileTask {
                        source: source.clone(),
                        object: object.clone(),
                        extra_args: manifest.extra_compile_args().to_vec(),
                    },
                );
            } else {
                tracing::debug!("up to date: {}", source.display());
            }
            plan.objects.push(object);
        }

        plan
    }

    /// Build a plan from explicit parts.
    pub fn from_parts(objects: Vec<PathBuf>, tasks: impl IntoIterator<Item = CompileTask>) -> Self {
        let tasks = tasks
            .into_iter()
            .map(|task| (task.object.clone(), task))
            .collect();
        Self { objects, tasks }
    }

    /// Every object path, in manifest order.
    pub fn objects(&self) -> &[PathBuf] {
        &self.objects
    }

    /// The task producing `object`, if it needs compiling.
    pub fn task(&self, object: &Path) -> Option<&CompileTask> {
        self.tasks.get(object)
    }

    /// Number of units that will be compiled.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }
}

/// Everything that changes the contents of an object besides its source:
/// the compiler driver, the include path and the compile flags.
pub fn compile_fingerprint(compiler: &str, manifest: &SourceManifest) -> String {
    let mut lines = vec![compiler.to_string()];
    lines.extend(
        manifest
            .include_dirs()
            .iter()
            .map(|dir| format!("-I{}", dir.display())),
    );
    lines.extend(manifest.extra_compile_args().iter().cloned());
    lines.join("\n")
}

/// Record the fingerprint the objects under `build/temp` were compiled with.
pub fn record_fingerprint(layout: &ProjectLayout, fingerprint: &str) -> Result<()> {
    let path = &layout.compile_fingerprint;
    fs::write(path, fingerprint).map_err(Error::io(path))
}

/// Forget the recorded fingerprint, so an interrupted compile is never
/// mistaken for a complete one.
pub fn clear_fingerprint(layout: &ProjectLayout) -> Result<()> {
    let path = &layout.compile_fingerprint;
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(path)(e)),
    }
}

/// An object is up to date when it exists and is not older than its source.
fn is_up_to_date(source: &Path, object: &Path) -> bool {
    let modified = |path: &Path| fs::metadata(path).and_then(|m| m.modified()).ok();
    match (modified(source), modified(object)) {
        (Some(src), Some(obj)) => obj >= src,
        _ => false,
    }
}

/// Platform-specific shared library extension.
pub fn shared_library_extension() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        "dll"
    }
    #[cfg(target_os = "macos")]
    {
        "dylib"
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        "so"
    }
}
