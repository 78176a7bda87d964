//! Provenance stamping.
//!
//! Resolves the git revisions of the repository and its enclosing host
//! repository, computes the build version and writes it into the two
//! generated version files (Python and C++). Both files are rewritten in
//! full on every build.

use std::fs;
use std::path::Path;
use std::process::Command;

use serde::Serialize;

use crate::config::BuildConfiguration;
use crate::error::{BestEffort, Error, Result};
use crate::layout::{PACKAGE_DIR, ProjectLayout};
use crate::process;

/// Number of revision characters appended to a versioned build.
pub const SHORT_REVISION_LEN: usize = 7;

/// Version and revisions embedded into the generated files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionRecord {
    /// Final version string, including any `+<rev>` suffix.
    pub version: String,

    /// HEAD commit of the repository root.
    pub primary_revision: String,

    /// HEAD commit of the enclosing repository, or empty.
    pub host_revision: String,
}

impl VersionRecord {
    /// Python module consumed by the package at import time.
    pub fn render_python(&self) -> String {
        format!(
            "# Autogenerated file, do not edit!\n\
             __version__ = '{}'\n\
             __gitrev__ = '{}'\n\
             __host_gitrev__ = '{}'\n",
            self.version, self.primary_revision, self.host_revision
        )
    }

    /// C++ translation unit compiled into the extension.
    pub fn render_cpp(&self, header_include: &str) -> String {
        format!(
            "// Autogenerated file, do not edit!\n\
             #include \"{header_include}\"\n\
             \n\
             namespace {PACKAGE_DIR} {{\n\
             \n\
             const char GITREV[] = {{\"{}\"}};\n\
             const char HOST_GITREV[] = {{\"{}\"}};\n\
             const char VERSION[] = {{\"{}\"}};\n\
             \n\
             }}  // namespace {PACKAGE_DIR}\n",
            self.primary_revision, self.host_revision, self.version
        )
    }
}

/// Resolve `git rev-parse HEAD` in `repo`.
///
/// # Errors
/// Fails if `repo` is not a directory, git cannot be started, or git exits
/// non-zero (e.g. outside a work tree or before the first commit).
pub fn head_revision(repo: &Path) -> Result<String> {
    if !repo.is_dir() {
        return Err(Error::InvalidRepository(repo.to_path_buf()));
    }
    process::capture(Command::new("git").args(["rev-parse", "HEAD"]).current_dir(repo))
}

/// Short revision suffix for a versioned build.
///
/// An empty revision cannot be sliced; the failure is reported as ignored so
/// the caller omits the suffix.
pub fn revision_suffix(revision: &str) -> BestEffort<String> {
    let short: String = revision.chars().take(SHORT_REVISION_LEN).collect();
    if short.is_empty() {
        return BestEffort::ignored("primary revision is empty");
    }
    BestEffort::Done(short)
}

/// Compute the version string from a base version and the primary revision.
pub fn build_version(base: &str, primary_revision: &str, versioned: bool) -> String {
    if !versioned {
        return base.to_string();
    }
    match revision_suffix(primary_revision) {
        BestEffort::Done(short) => format!("{base}+{short}"),
        BestEffort::Ignored { reason } => {
            tracing::warn!("omitting version suffix: {}", reason);
            base.to_string()
        }
    }
}

/// Writes the version record into the generated files.
pub struct ProvenanceStamper<'a> {
    layout: &'a ProjectLayout,
}

impl<'a> ProvenanceStamper<'a> {
    /// Create a stamper for a layout.
    pub fn new(layout: &'a ProjectLayout) -> Self {
        Self { layout }
    }

    /// Resolve revisions and compute the version record.
    pub fn resolve(&self, config: &BuildConfiguration) -> Result<VersionRecord> {
        let primary_revision = head_revision(&self.layout.root)?;
        let host_revision = match self.layout.parent_repository() {
            Some(parent) => head_revision(&parent)?,
            None => String::new(),
        };
        let version = build_version(config.base_version(), &primary_revision, config.versioned_build);

        Ok(VersionRecord {
            version,
            primary_revision,
            host_revision,
        })
    }

    /// Overwrite both generated version files with `record`.
    pub fn write(&self, record: &VersionRecord) -> Result<()> {
        let header = self.layout.version_header_include();
        let outputs = [
            (&self.layout.py_version_file, record.render_python()),
            (&self.layout.cpp_version_file, record.render_cpp(&header)),
        ];

        for (path, contents) in outputs {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(Error::io(parent))?;
            }
            fs::write(path, contents).map_err(Error::io(path))?;
        }
        Ok(())
    }

    /// Resolve, log and persist the version record.
    pub fn stamp(&self, config: &BuildConfiguration) -> Result<VersionRecord> {
        let record = self.resolve(config)?;

        tracing::info!("Building {} version: {}", config.package_name, record.version);
        tracing::info!("Commit ID: {}", record.primary_revision);
        tracing::info!("Host commit ID: {}", record.host_revision);

        self.write(&record)?;
        Ok(record)
    }
}
