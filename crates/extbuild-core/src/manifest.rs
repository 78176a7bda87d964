//! Source set assembly.
//!
//! Expands the fixed directory patterns into translation units and freezes
//! them, together with include/library directories and compile/link flags,
//! into a [`SourceManifest`].

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::BuildConfiguration;
use crate::layout::{PACKAGE_DIR, ProjectLayout};

/// Support units listed explicitly because no pattern covers them.
pub const EXPLICIT_SOURCES: &[&str] = &[
    "third_party/computation_client/env_vars.cc",
    "third_party/computation_client/metrics.cc",
    "third_party/computation_client/metrics_reader.cc",
    "third_party/computation_client/multi_wait.cc",
    "third_party/computation_client/sys_util.cc",
    "third_party/computation_client/thread_pool.cc",
    "third_party/computation_client/triggered_task.cc",
];

/// Flags passed to every compile regardless of mode.
const BASE_COMPILE_ARGS: &[&str] = &[
    "-std=c++14",
    "-Wno-sign-compare",
    "-Wno-unknown-pragmas",
    "-Wno-return-type",
];

/// Glob options shared by discovery and clean: `*` and `?` never match a
/// leading dot, so hidden files are only matched by patterns that name them.
pub const MATCH_OPTIONS: glob::MatchOptions = glob::MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: true,
};

/// Extra warning suppressions for clang.
const CLANG_COMPILE_ARGS: &[&str] = &["-Wno-macro-redefined", "-Wno-return-std-move"];

/// A directory plus file-extension filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourcePattern {
    /// Directory relative to the root.
    pub dir: PathBuf,

    /// Extension without the dot (`cpp`, `cc`).
    pub extension: String,

    /// Also match files in subdirectories.
    pub recursive: bool,
}

impl SourcePattern {
    /// Non-recursive pattern `dir/*.extension`.
    pub fn new(dir: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.to_string(),
            recursive: false,
        }
    }

    /// Recursive pattern `dir/**/*.extension`.
    pub fn recursive(dir: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            recursive: true,
            ..Self::new(dir, extension)
        }
    }

    /// Glob expression anchored at `root`. The root itself is escaped.
    fn glob_expression(&self, root: &Path) -> String {
        let base = glob::Pattern::escape(&root.join(&self.dir).to_string_lossy());
        if self.recursive {
            format!("{base}/**/*.{}", self.extension)
        } else {
            format!("{base}/*.{}", self.extension)
        }
    }

    /// Matching files relative to `root`, in glob order (sorted by path).
    ///
    /// A pattern that matches nothing yields an empty list.
    pub fn expand(&self, root: &Path) -> Vec<PathBuf> {
        let expression = self.glob_expression(root);
        let entries = match glob::glob_with(&expression, MATCH_OPTIONS) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("invalid source pattern {}: {}", expression, e);
                return Vec::new();
            }
        };

        entries
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::debug!("skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|path| path.is_file())
            .map(|path| path.strip_prefix(root).map(Path::to_path_buf).unwrap_or(path))
            .collect()
    }
}

/// Frozen set of inputs for one build.
///
/// Sources are kept in discovery order and never de-duplicated. There is no
/// way to mutate a manifest once assembled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceManifest {
    sources: Vec<PathBuf>,
    include_dirs: Vec<PathBuf>,
    library_dirs: Vec<PathBuf>,
    extra_compile_args: Vec<String>,
    extra_link_args: Vec<String>,
}

impl SourceManifest {
    /// Translation units, relative to the root unless given absolute.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Header search directories.
    pub fn include_dirs(&self) -> &[PathBuf] {
        &self.include_dirs
    }

    /// Library search directories for the link.
    pub fn library_dirs(&self) -> &[PathBuf] {
        &self.library_dirs
    }

    /// Flags appended to every compile.
    pub fn extra_compile_args(&self) -> &[String] {
        &self.extra_compile_args
    }

    /// Flags appended to the link, rpath last.
    pub fn extra_link_args(&self) -> &[String] {
        &self.extra_link_args
    }

    /// Number of translation units.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns true if there are no translation units.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Discovers translation units and assembles the manifest.
#[derive(Debug, Clone)]
pub struct SourceSetAssembler {
    patterns: Vec<SourcePattern>,
    explicit: Vec<PathBuf>,
}

impl SourceSetAssembler {
    /// Assembler over custom patterns and explicit files.
    pub fn new(patterns: Vec<SourcePattern>, explicit: Vec<PathBuf>) -> Self {
        Self { patterns, explicit }
    }

    /// The project's fixed source trees.
    pub fn standard() -> Self {
        let csrc = Path::new(PACKAGE_DIR).join("csrc");
        let patterns = vec![
            SourcePattern::new(&csrc, "cpp"),
            SourcePattern::new(csrc.join("ops"), "cpp"),
            SourcePattern::new(csrc.join("compiler"), "cpp"),
            SourcePattern::new(csrc.join("backend"), "cpp"),
            SourcePattern::new("runtime/client", "cc"),
            SourcePattern::new("runtime", "cc"),
            SourcePattern::new("runtime/client/lib", "cc"),
            SourcePattern::new("runtime/core/platform", "cc"),
        ];
        let explicit = EXPLICIT_SOURCES.iter().map(PathBuf::from).collect();
        Self::new(patterns, explicit)
    }

    /// Declared patterns, in expansion order.
    pub fn patterns(&self) -> &[SourcePattern] {
        &self.patterns
    }

    /// Expand every pattern in order, then append the explicit list verbatim.
    pub fn discover(&self, root: &Path) -> Vec<PathBuf> {
        let mut sources = Vec::new();
        for pattern in &self.patterns {
            let matched = pattern.expand(root);
            tracing::debug!(
                "{}/*.{}: {} file(s)",
                pattern.dir.display(),
                pattern.extension,
                matched.len()
            );
            sources.extend(matched);
        }
        sources.extend(self.explicit.iter().cloned());
        sources
    }

    /// Discover sources and freeze the manifest for `config`.
    pub fn assemble(&self, config: &BuildConfiguration, layout: &ProjectLayout) -> SourceManifest {
        let sources = self.discover(&layout.root);
        tracing::info!("Discovered {} translation unit(s)", sources.len());

        let host = config
            .host_source_path
            .clone()
            .or_else(|| layout.root.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| layout.root.clone());

        let include_dirs = vec![
            layout.root.clone(),
            host.clone(),
            host.join("torch").join("csrc"),
            host.join("torch").join("lib").join("tmp_install").join("include"),
        ];

        SourceManifest {
            sources,
            include_dirs,
            library_dirs: vec![layout.lib_dir.clone()],
            extra_compile_args: compile_args(config),
            extra_link_args: link_args(config, &layout.relative_lib_dir()),
        }
    }
}

/// Compile flags for the configured compiler and mode.
pub fn compile_args(config: &BuildConfiguration) -> Vec<String> {
    let mut args: Vec<String> = BASE_COMPILE_ARGS.iter().map(|s| s.to_string()).collect();
    if config.is_clang() {
        args.extend(CLANG_COMPILE_ARGS.iter().map(|s| s.to_string()));
    }
    if config.debug {
        args.extend(["-O0".to_string(), "-g".to_string()]);
    } else {
        args.push("-DNDEBUG".to_string());
    }
    args
}

/// Link flags for the configured mode, ending with the relative rpath.
pub fn link_args(config: &BuildConfiguration, relative_lib_dir: &str) -> Vec<String> {
    let mut args = Vec::new();
    if config.debug {
        args.extend(["-O0".to_string(), "-g".to_string()]);
    }
    args.push(relative_rpath(relative_lib_dir));
    args
}

/// Runtime search path relative to the loaded extension.
pub fn relative_rpath(path: &str) -> String {
    if cfg!(target_os = "macos") {
        format!("-Wl,-rpath,@loader_path/{path}")
    } else {
        format!("-Wl,-rpath,$ORIGIN/{path}")
    }
}
