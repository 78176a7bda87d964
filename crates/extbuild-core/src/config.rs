//! Build configuration derived from the environment.

use std::path::{Path, PathBuf};

use crate::compile::CompileStrategy;
use crate::error::{Error, Result};
use crate::layout::PACKAGE_DIR;

/// Base version used when no override is given.
pub const DEFAULT_VERSION: &str = "1.9";

/// Compiler driver used when `CC` is unset.
pub const DEFAULT_COMPILER: &str = "c++";

/// Snapshot of the environment-derived build flags.
///
/// Created once at process start and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfiguration {
    /// Build with `-O0 -g` instead of `-DNDEBUG` (`DEBUG`)
    pub debug: bool,

    /// Compile translation units concurrently (`COMPILE_PARALLEL`, default on)
    pub parallel_compile: bool,

    /// Run the downstream test build (`BUILD_CPP_TESTS`, default on)
    pub build_tests: bool,

    /// Append `+<rev7>` to the version (`VERSIONED_EXTBUILD`)
    pub versioned_build: bool,

    /// Replaces [`DEFAULT_VERSION`] (`EXTBUILD_VERSION`)
    pub version_override: Option<String>,

    /// Distribution package name (`EXTBUILD_PACKAGE_NAME`)
    pub package_name: String,

    /// Host source tree; defaults to the parent of the root (`HOST_SOURCE_PATH`)
    pub host_source_path: Option<PathBuf>,

    /// Compiler and linker driver (`CC`)
    pub compiler: String,

    /// Compile worker count; defaults to the CPU count (`EXTBUILD_JOBS`)
    pub jobs: Option<usize>,
}

impl Default for BuildConfiguration {
    fn default() -> Self {
        Self {
            debug: false,
            parallel_compile: true,
            build_tests: true,
            versioned_build: false,
            version_override: None,
            package_name: PACKAGE_DIR.to_string(),
            host_source_path: None,
            compiler: DEFAULT_COMPILER.to_string(),
            jobs: None,
        }
    }
}

impl BuildConfiguration {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if `EXTBUILD_JOBS` is not a positive integer.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let flag = |key: &str, default: bool| parse_flag(get(key).as_deref(), default);

        let jobs = match get("EXTBUILD_JOBS") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => Some(n),
                _ => {
                    return Err(Error::Config(format!(
                        "EXTBUILD_JOBS must be a positive integer, got '{raw}'"
                    )));
                }
            },
            None => None,
        };

        let defaults = Self::default();
        Ok(Self {
            debug: flag("DEBUG", defaults.debug),
            parallel_compile: flag("COMPILE_PARALLEL", defaults.parallel_compile),
            build_tests: flag("BUILD_CPP_TESTS", defaults.build_tests),
            versioned_build: flag("VERSIONED_EXTBUILD", defaults.versioned_build),
            version_override: get("EXTBUILD_VERSION"),
            package_name: get("EXTBUILD_PACKAGE_NAME").unwrap_or(defaults.package_name),
            host_source_path: get("HOST_SOURCE_PATH").map(PathBuf::from),
            compiler: get("CC").unwrap_or(defaults.compiler),
            jobs,
        })
    }

    /// Base version before any revision suffix.
    pub fn base_version(&self) -> &str {
        self.version_override.as_deref().unwrap_or(DEFAULT_VERSION)
    }

    /// Whether the compiler driver is clang (it gets extra warning suppressions).
    pub fn is_clang(&self) -> bool {
        Path::new(&self.compiler)
            .file_name()
            .is_some_and(|name| name.to_string_lossy().starts_with("clang"))
    }

    /// Compile strategy selected by this configuration.
    pub fn strategy(&self) -> CompileStrategy {
        if !self.parallel_compile {
            return CompileStrategy::Sequential;
        }
        match self.jobs {
            Some(jobs) => CompileStrategy::Parallel { jobs },
            None => CompileStrategy::parallel(),
        }
    }
}

/// Interpret an environment flag: `ON`, `1`, `YES`, `TRUE` and `Y` are true
/// (case-insensitive), any other value is false, and an unset flag takes
/// `default`.
pub fn parse_flag(value: Option<&str>, default: bool) -> bool {
    match value {
        Some(v) => matches!(
            v.trim().to_ascii_uppercase().as_str(),
            "ON" | "1" | "YES" | "TRUE" | "Y"
        ),
        None => default,
    }
}
