//! Error types for extbuild-core.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use thiserror::Error;

/// Result type for extbuild-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Resolving revisions and writing the version files.
    Provenance,
    /// Running the code generator script.
    Codegen,
    /// Copying vendored sources into the source tree.
    Copy,
    /// Expanding source patterns into the manifest.
    Discover,
    /// Compiling translation units.
    Compile,
    /// Linking the shared library.
    Link,
    /// Downstream native test build.
    TestBuild,
    /// Ignore-file driven cleanup.
    Clean,
}

impl Stage {
    /// Process exit status used when this stage fails.
    pub fn exit_code(self) -> u8 {
        match self {
            Stage::Codegen => 2,
            Stage::Copy => 3,
            Stage::TestBuild => 4,
            Stage::Compile | Stage::Link => 5,
            Stage::Provenance | Stage::Discover | Stage::Clean => 1,
        }
    }

    /// Human readable stage name.
    pub fn label(self) -> &'static str {
        match self {
            Stage::Provenance => "provenance stamping",
            Stage::Codegen => "code generation",
            Stage::Copy => "vendored source copy",
            Stage::Discover => "source discovery",
            Stage::Compile => "compilation",
            Stage::Link => "link",
            Stage::TestBuild => "test build",
            Stage::Clean => "clean",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors that can occur in extbuild-core.
#[derive(Debug, Error)]
pub enum Error {
    /// An external command ran but exited unsuccessfully.
    #[error("command `{command}` failed with {status}")]
    CommandFailed { command: String, status: ExitStatus },

    /// An external command could not be started.
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// IO error on a specific path.
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The repository root does not exist or is not a directory.
    #[error("not a repository: {}", .0.display())]
    InvalidRepository(PathBuf),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// The compile worker pool could not be created.
    #[error("failed to create compile worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A failure attributed to a pipeline stage.
    #[error("{stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Build a closure mapping an IO error onto `path`.
    pub fn io(path: impl AsRef<Path>) -> impl FnOnce(std::io::Error) -> Error {
        let path = path.as_ref().to_path_buf();
        move |source| Error::Io { path, source }
    }

    /// Attribute this error to `stage`. Already-attributed errors keep their stage.
    pub fn in_stage(self, stage: Stage) -> Error {
        match self {
            Error::Stage { .. } => self,
            other => Error::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage this error is attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        self.stage().map(Stage::exit_code).unwrap_or(1)
    }

    /// The failing command line, when an external command is to blame.
    pub fn failed_command(&self) -> Option<&str> {
        match self {
            Error::CommandFailed { command, .. } | Error::Spawn { command, .. } => Some(command),
            Error::Stage { source, .. } => source.failed_command(),
            _ => None,
        }
    }

    /// Render the error with a recovery hint where one is known.
    pub fn with_hint(&self) -> String {
        let hint = match self.stage() {
            Some(Stage::Provenance) => Some("run from a git checkout with at least one commit"),
            Some(Stage::Codegen) => Some("run scripts/generate_code.sh directly to see its output"),
            Some(Stage::Compile) => Some("set CC to choose another compiler, or COMPILE_PARALLEL=0 for ordered output"),
            Some(Stage::TestBuild) => Some("set BUILD_CPP_TESTS=0 to skip the downstream test build"),
            _ => None,
        };
        match hint {
            Some(hint) => format!("{self}\n  hint: {hint}"),
            None => self.to_string(),
        }
    }
}

/// Outcome of an operation whose failure must not abort the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BestEffort<T> {
    /// The operation succeeded.
    Done(T),
    /// The operation failed and the failure was ignored.
    Ignored { reason: String },
}

impl<T> BestEffort<T> {
    /// Record an ignored failure.
    pub fn ignored(reason: impl Into<String>) -> Self {
        BestEffort::Ignored {
            reason: reason.into(),
        }
    }

    /// Convert to an `Option`, dropping the failure reason.
    pub fn done(self) -> Option<T> {
        match self {
            BestEffort::Done(value) => Some(value),
            BestEffort::Ignored { .. } => None,
        }
    }

    /// Returns true if the failure was ignored.
    pub fn is_ignored(&self) -> bool {
        matches!(self, BestEffort::Ignored { .. })
    }
}
