//! Compiler and linker invocation.
//!
//! The toolchain is an opaque external driver (`c++`, `clang++`, ...). The
//! [`Toolchain`] trait is the seam strategies compile through, so they can be
//! exercised without a real compiler.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::BuildConfiguration;
use crate::error::{Error, Result};
use crate::layout::ProjectLayout;
use crate::manifest::SourceManifest;
use crate::process;

use super::types::CompileTask;

/// Compiles single translation units and links objects.
///
/// Implementations must be safe to call from several worker threads at once;
/// each call only writes its own output path.
pub trait Toolchain: Send + Sync {
    /// Compile one task's source into its object.
    fn compile(&self, task: &CompileTask) -> Result<()>;

    /// Link `objects` into the shared library at `output`.
    fn link(&self, objects: &[PathBuf], output: &Path) -> Result<()>;
}

/// Toolchain that runs the configured compiler driver as a subprocess.
#[derive(Debug, Clone)]
pub struct CommandToolchain {
    /// Resolved compiler driver (falls back to the configured name)
    program: PathBuf,

    /// Working directory for every invocation
    root: PathBuf,

    /// `-I` flags derived from the manifest
    include_args: Vec<String>,

    /// `-L` flags plus the manifest's link flags
    link_args: Vec<String>,
}

impl CommandToolchain {
    /// Create a toolchain for a frozen manifest.
    pub fn new(config: &BuildConfiguration, layout: &ProjectLayout, manifest: &SourceManifest) -> Self {
        let program = Self::resolve_program(&config.compiler);

        let include_args = manifest
            .include_dirs()
            .iter()
            .map(|dir| format!("-I{}", dir.display()))
            .collect();

        let mut link_args: Vec<String> = manifest
            .library_dirs()
            .iter()
            .map(|dir| format!("-L{}", dir.display()))
            .collect();
        link_args.extend(manifest.extra_link_args().iter().cloned());

        Self {
            program,
            root: layout.root.clone(),
            include_args,
            link_args,
        }
    }

    /// Path or name of the compiler driver.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Find the compiler in PATH.
    fn resolve_program(compiler: &str) -> PathBuf {
        match which::which(compiler) {
            Ok(path) => {
                tracing::debug!("using compiler {}", path.display());
                path
            }
            Err(e) => {
                tracing::warn!("compiler '{}' not found in PATH ({})", compiler, e);
                PathBuf::from(compiler)
            }
        }
    }

    /// Build the compile command for a task.
    pub fn compile_command(&self, task: &CompileTask) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.current_dir(&self.root).arg("-c").arg(&task.source).arg("-o").arg(&task.object);
        if cfg!(unix) {
            cmd.arg("-fPIC");
        }
        cmd.args(&self.include_args).args(&task.extra_args);
        cmd
    }

    /// Build the link command.
    pub fn link_command(&self, objects: &[PathBuf], output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.current_dir(&self.root).arg("-shared").args(objects).arg("-o").arg(output);
        if cfg!(target_os = "macos") {
            cmd.args(["-undefined", "dynamic_lookup"]);
        }
        cmd.args(&self.link_args);
        cmd
    }
}

impl Toolchain for CommandToolchain {
    fn compile(&self, task: &CompileTask) -> Result<()> {
        if let Some(parent) = task.object.parent() {
            fs::create_dir_all(parent).map_err(Error::io(parent))?;
        }
        tracing::debug!("compiling {}", task.source.display());
        process::run(&mut self.compile_command(task))
    }

    fn link(&self, objects: &[PathBuf], output: &Path) -> Result<()> {
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).map_err(Error::io(parent))?;
        }
        tracing::info!("Linking {} object(s) into {}", objects.len(), output.display());
        process::run(&mut self.link_command(objects, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::SourceSetAssembler;

    fn toolchain() -> (CommandToolchain, ProjectLayout) {
        let layout = ProjectLayout::new("/repo");
        let config = BuildConfiguration {
            compiler: "/opt/cc/bin/not-a-real-cxx".to_string(),
            ..Default::default()
        };
        let manifest = SourceSetAssembler::new(Vec::new(), Vec::new()).assemble(&config, &layout);
        (CommandToolchain::new(&config, &layout, &manifest), layout)
    }

    fn args(cmd: &Command) -> Vec<String> {
        cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_unresolved_compiler_keeps_name() {
        let (toolchain, _) = toolchain();
        assert_eq!(toolchain.program(), Path::new("/opt/cc/bin/not-a-real-cxx"));
    }

    #[test]
    fn test_compile_command() {
        let (toolchain, layout) = toolchain();
        let task = CompileTask {
            source: PathBuf::from("runtime/env.cc"),
            object: layout.object_path(Path::new("runtime/env.cc")),
            extra_args: vec!["-DNDEBUG".to_string()],
        };

        let cmd = toolchain.compile_command(&task);
        let args = args(&cmd);
        assert_eq!(&args[..4], &["-c", "runtime/env.cc", "-o", "/repo/build/temp/runtime/env.o"]);
        assert!(args.contains(&"-I/repo".to_string()));
        assert_eq!(args.last().unwrap(), "-DNDEBUG");
        assert_eq!(cmd.get_current_dir(), Some(Path::new("/repo")));
    }

    #[test]
    fn test_link_command() {
        let (toolchain, layout) = toolchain();
        let objects = vec![PathBuf::from("a.o"), PathBuf::from("b.o")];
        let cmd = toolchain.link_command(&objects, &layout.artifact_path());
        let args = args(&cmd);

        assert_eq!(&args[..3], &["-shared", "a.o", "b.o"]);
        assert!(args.contains(&"-L/repo/native_ext/lib".to_string()));
        assert!(args.last().unwrap().contains("-rpath"));
    }
}
