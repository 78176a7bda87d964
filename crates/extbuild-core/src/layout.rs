//! Repository layout for the extension build.
//!
//! Every input and output of the pipeline lives at a fixed path relative to
//! the repository root:
//!
//! ```text
//! <root>/
//! ├── native_ext/
//! │   ├── version.py          # generated, Python consumer
//! │   ├── csrc/version.cpp    # generated, C++ consumer
//! │   └── lib/                # shared-library dir (rpath target)
//! ├── scripts/generate_code.sh
//! ├── test/cpp/run_tests.sh
//! ├── third_party/computation_client/ ──► runtime/
//! ├── .gitignore              # drives `clean`
//! └── build/
//!     ├── temp/               # object files
//!     └── lib/                # linked extension
//! ```

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::compile::shared_library_extension;
use crate::error::{Error, Result};

/// Directory name of the package (and C++ namespace of the version file).
pub const PACKAGE_DIR: &str = "native_ext";

/// Base name of the linked extension artifact.
pub const EXTENSION_NAME: &str = "_native_ext";

/// Paths used by the build, all anchored at `root`.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    /// Repository root.
    pub root: PathBuf,

    /// Package directory (`native_ext/`).
    pub package_dir: PathBuf,

    /// Generated Python version module.
    pub py_version_file: PathBuf,

    /// Generated C++ version source.
    pub cpp_version_file: PathBuf,

    /// Shared libraries shipped next to the extension.
    pub lib_dir: PathBuf,

    /// Code generator script, run with no arguments.
    pub generator_script: PathBuf,

    /// Downstream test-build script, run with `-B`.
    pub test_build_script: PathBuf,

    /// Vendored sources copied into the tree before discovery.
    pub vendored_source: PathBuf,

    /// Destination directory of the vendored copy.
    pub vendored_dest: PathBuf,

    /// Ignore-pattern file that drives `clean`.
    pub ignore_file: PathBuf,

    /// Build output directory.
    pub build_dir: PathBuf,

    /// Object file directory.
    pub build_temp: PathBuf,

    /// Compile flags the objects in `build_temp` were built with.
    pub compile_fingerprint: PathBuf,

    /// Directory receiving the linked extension.
    pub build_lib: PathBuf,
}

impl ProjectLayout {
    /// Create the layout for a repository root. No directories are created.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let package_dir = root.join(PACKAGE_DIR);
        let build_dir = root.join("build");

        Self {
            py_version_file: package_dir.join("version.py"),
            cpp_version_file: package_dir.join("csrc").join("version.cpp"),
            lib_dir: package_dir.join("lib"),
            generator_script: root.join("scripts").join("generate_code.sh"),
            test_build_script: root.join("test").join("cpp").join("run_tests.sh"),
            vendored_source: root.join("third_party").join("computation_client"),
            vendored_dest: root.join("runtime"),
            ignore_file: root.join(".gitignore"),
            build_temp: build_dir.join("temp"),
            compile_fingerprint: build_dir.join("temp").join(".compile-fingerprint"),
            build_lib: build_dir.join("lib"),
            build_dir,
            package_dir,
            root,
        }
    }

    /// Create the layout for a root given on the command line, canonicalized.
    ///
    /// # Errors
    /// Returns [`Error::InvalidRepository`] if `root` is not a directory.
    pub fn from_root(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::InvalidRepository(root.to_path_buf()));
        }
        let root = root.canonicalize().map_err(Error::io(root))?;
        Ok(Self::new(root))
    }

    /// Parent repository directory, if it carries a `.git` directory.
    pub fn parent_repository(&self) -> Option<PathBuf> {
        let parent = self.root.parent()?;
        parent.join(".git").is_dir().then(|| parent.to_path_buf())
    }

    /// Library directory relative to the root, as used in rpath flags.
    pub fn relative_lib_dir(&self) -> String {
        format!("{PACKAGE_DIR}/lib")
    }

    /// Include line the generated C++ version file starts with.
    pub fn version_header_include(&self) -> String {
        format!("{PACKAGE_DIR}/csrc/version.h")
    }

    /// Object path for a translation unit.
    ///
    /// The source path is taken relative to the root and mirrored under
    /// `build/temp` with its extension replaced by `.o`, so distinct sources
    /// never share an object path.
    pub fn object_path(&self, source: &Path) -> PathBuf {
        let relative = source.strip_prefix(&self.root).unwrap_or(source);
        let mut object = self.build_temp.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => object.push(part),
                Component::ParentDir => object.push("__"),
                _ => {}
            }
        }
        object.set_extension("o");
        object
    }

    /// Path of the linked extension.
    pub fn artifact_path(&self) -> PathBuf {
        self.build_lib
            .join(format!("{EXTENSION_NAME}.{}", shared_library_extension()))
    }

    /// Create the build output directories.
    pub fn ensure_build_dirs(&self) -> Result<()> {
        for dir in [&self.build_temp, &self.build_lib, &self.lib_dir] {
            fs::create_dir_all(dir).map_err(Error::io(dir))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fixed_paths() {
        let layout = ProjectLayout::new("/repo");
        assert_eq!(layout.py_version_file, PathBuf::from("/repo/native_ext/version.py"));
        assert_eq!(
            layout.cpp_version_file,
            PathBuf::from("/repo/native_ext/csrc/version.cpp")
        );
        assert_eq!(layout.ignore_file, PathBuf::from("/repo/.gitignore"));
        assert_eq!(layout.relative_lib_dir(), "native_ext/lib");
    }

    #[test]
    fn test_object_path_mirrors_source() {
        let layout = ProjectLayout::new("/repo");
        assert_eq!(
            layout.object_path(Path::new("native_ext/csrc/ops/add.cpp")),
            PathBuf::from("/repo/build/temp/native_ext/csrc/ops/add.o")
        );
        assert_eq!(
            layout.object_path(Path::new("/repo/runtime/env.cc")),
            PathBuf::from("/repo/build/temp/runtime/env.o")
        );
    }

    #[test]
    fn test_object_path_keeps_directories() {
        let layout = ProjectLayout::new("/repo");
        let a = layout.object_path(Path::new("runtime/util.cc"));
        let b = layout.object_path(Path::new("runtime/client/util.cc"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_parent_repository_detection() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let root = temp.path().join("ext");
        fs::create_dir_all(&root).unwrap();

        let layout = ProjectLayout::new(&root);
        assert!(layout.parent_repository().is_none());

        fs::create_dir_all(temp.path().join(".git")).unwrap();
        assert_eq!(layout.parent_repository(), Some(temp.path().to_path_buf()));
    }

    #[test]
    fn test_from_root_rejects_missing_dir() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let result = ProjectLayout::from_root(&temp.path().join("missing"));
        assert!(matches!(result, Err(Error::InvalidRepository(_))));
    }

    #[test]
    fn test_ensure_build_dirs() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let layout = ProjectLayout::new(temp.path());
        layout.ensure_build_dirs().expect("Failed to create dirs");

        assert!(layout.build_temp.is_dir());
        assert!(layout.build_lib.is_dir());
        assert!(layout.lib_dir.is_dir());
    }
}
