//! Code generator invocation.
//!
//! The generator emits binding sources into the tree, so it must run after
//! the version files are stamped and before sources are discovered.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::Result;
use crate::layout::ProjectLayout;
use crate::process;

/// Runs the code generator script.
pub struct CodeGenerator {
    script: PathBuf,
    root: PathBuf,
}

impl CodeGenerator {
    /// Generator for the layout's fixed script path.
    pub fn new(layout: &ProjectLayout) -> Self {
        Self {
            script: layout.generator_script.clone(),
            root: layout.root.clone(),
        }
    }

    /// Path of the generator script.
    pub fn script(&self) -> &Path {
        &self.script
    }

    /// Run the generator with no arguments from the repository root.
    ///
    /// A non-zero exit is returned as [`crate::Error::CommandFailed`]; there
    /// is no retry.
    pub fn run(&self) -> Result<()> {
        tracing::info!("Generating bindings with {}", self.script.display());
        process::run(Command::new(&self.script).current_dir(&self.root))
    }
}
