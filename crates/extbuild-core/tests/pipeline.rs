//! Integration tests for the build pipeline.
//!
//! Each test builds a throwaway git repository with shell-script stand-ins
//! for the compiler, the code generator and the native test build.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

use extbuild_core::manifest::EXPLICIT_SOURCES;
use extbuild_core::{
    BuildConfiguration, BuildOptions, Error, Pipeline, PipelineObserver, ProjectLayout, Stage,
};
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

/// Compiler stand-in: writes its arguments to the `-o` target and fails for
/// any argument containing "broken".
const FAKE_CC: &str = r#"#!/bin/sh
out=""
prev=""
for arg in "$@"; do
  case "$arg" in
    *broken*) echo "error: cannot compile $arg" >&2; exit 1 ;;
  esac
  if [ "$prev" = "-o" ]; then out="$arg"; fi
  prev="$arg"
done
[ -n "$out" ] || exit 2
echo "$*" > "$out"
"#;

fn git_available() -> bool {
    Command::new("git").arg("--version").output().is_ok()
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(["-c", "user.name=extbuild", "-c", "user.email=extbuild@example.com"])
        .args(args)
        .current_dir(dir)
        .status()
        .expect("Failed to run git");
    assert!(status.success(), "git {args:?} failed");
}

fn init_repo(dir: &Path) -> String {
    fs::create_dir_all(dir).unwrap();
    git(dir, &["init", "-q"]);
    git(dir, &["commit", "-q", "--allow-empty", "-m", "init"]);
    let out = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(dir)
        .output()
        .unwrap();
    String::from_utf8(out.stdout).unwrap().trim().to_string()
}

fn write_file(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn write_script(path: &Path, body: &str) {
    write_file(path, body);
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

/// A temporary repository with a complete, buildable layout.
struct TestRepo {
    _temp: TempDir,
    root: PathBuf,
    head: String,
}

impl TestRepo {
    fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let root = temp.path().join("ext");
        let head = init_repo(&root);

        write_script(&root.join("tools/fakecc"), FAKE_CC);
        write_script(
            &root.join("scripts/generate_code.sh"),
            "#!/bin/sh\necho '// generated' > native_ext/csrc/generated.cpp\n",
        );
        write_script(
            &root.join("test/cpp/run_tests.sh"),
            "#!/bin/sh\n[ \"$1\" = \"-B\" ] || exit 7\ntouch test/cpp/built.marker\n",
        );

        write_file(&root.join("native_ext/csrc/tensor.cpp"), "int tensor;\n");
        write_file(&root.join("native_ext/csrc/ops/add.cpp"), "int add;\n");
        write_file(&root.join("runtime/client/session.cc"), "int session;\n");
        for explicit in EXPLICIT_SOURCES {
            write_file(&root.join(explicit), "int support;\n");
        }
        fs::create_dir_all(root.join("runtime")).unwrap();

        Self {
            _temp: temp,
            root,
            head,
        }
    }

    fn layout(&self) -> ProjectLayout {
        ProjectLayout::new(&self.root)
    }

    fn config(&self) -> BuildConfiguration {
        BuildConfiguration {
            compiler: self.root.join("tools/fakecc").display().to_string(),
            ..Default::default()
        }
    }

    fn pipeline(&self, config: BuildConfiguration) -> Pipeline {
        Pipeline::new(self.layout(), config)
    }
}

#[derive(Default, Clone)]
struct StageLog(Arc<Mutex<Vec<Stage>>>);

impl StageLog {
    fn started(&self) -> Vec<Stage> {
        self.0.lock().unwrap().clone()
    }
}

impl PipelineObserver for StageLog {
    fn on_stage_started(&self, stage: Stage) {
        self.0.lock().unwrap().push(stage);
    }
}

// =============================================================================
// Build
// =============================================================================

#[test]
fn test_full_build() {
    if !git_available() {
        return;
    }
    let repo = TestRepo::new();
    let log = StageLog::default();
    let pipeline = repo.pipeline(repo.config()).with_observer(log.clone());

    let outcome = pipeline.run_build(BuildOptions::default()).unwrap();

    // tensor, add, generated, version, session + explicit support units
    assert_eq!(outcome.sources, 5 + EXPLICIT_SOURCES.len());
    assert_eq!(outcome.report.compiled, outcome.sources);
    assert!(outcome.report.artifact.exists());
    assert!(outcome.report.tests_built);
    assert!(repo.root.join("test/cpp/built.marker").exists());
    for object in &outcome.report.objects {
        assert!(object.exists(), "missing object {}", object.display());
    }

    assert_eq!(outcome.version.version, "1.9");
    assert_eq!(outcome.version.primary_revision, repo.head);
    assert_eq!(outcome.version.host_revision, "");

    assert_eq!(
        log.started(),
        vec![
            Stage::Provenance,
            Stage::Codegen,
            Stage::Copy,
            Stage::Discover,
            Stage::Compile,
            Stage::Link,
            Stage::TestBuild,
        ]
    );
}

#[test]
fn test_generated_sources_are_discovered() {
    if !git_available() {
        return;
    }
    let repo = TestRepo::new();
    let outcome = repo
        .pipeline(repo.config())
        .run_build(BuildOptions::default())
        .unwrap();

    let layout = repo.layout();
    let generated = layout.object_path(Path::new("native_ext/csrc/generated.cpp"));
    let version = layout.object_path(Path::new("native_ext/csrc/version.cpp"));
    assert!(outcome.report.objects.contains(&generated));
    assert!(outcome.report.objects.contains(&version));
}

#[test]
fn test_versioned_build_appends_short_revision() {
    if !git_available() {
        return;
    }
    let repo = TestRepo::new();
    let config = BuildConfiguration {
        versioned_build: true,
        version_override: Some("2.1".to_string()),
        ..repo.config()
    };

    let record = repo.pipeline(config).stamp().unwrap();
    assert_eq!(record.version, format!("2.1+{}", &repo.head[..7]));

    let py = fs::read_to_string(repo.layout().py_version_file).unwrap();
    assert!(py.contains(&format!("__version__ = '2.1+{}'", &repo.head[..7])));
}

#[test]
fn test_restamping_is_byte_identical() {
    if !git_available() {
        return;
    }
    let repo = TestRepo::new();
    let pipeline = repo.pipeline(repo.config());
    let layout = repo.layout();

    pipeline.stamp().unwrap();
    let py = fs::read(&layout.py_version_file).unwrap();
    let cpp = fs::read(&layout.cpp_version_file).unwrap();

    pipeline.stamp().unwrap();
    assert_eq!(fs::read(&layout.py_version_file).unwrap(), py);
    assert_eq!(fs::read(&layout.cpp_version_file).unwrap(), cpp);
}

#[test]
fn test_host_revision_from_parent_repository() {
    if !git_available() {
        return;
    }
    let repo = TestRepo::new();
    let parent = repo.root.parent().unwrap();
    let host_head = init_repo(parent);

    let record = repo.pipeline(repo.config()).stamp().unwrap();
    assert_eq!(record.host_revision, host_head);
    assert_eq!(record.primary_revision, repo.head);

    let cpp = fs::read_to_string(repo.layout().cpp_version_file).unwrap();
    assert!(cpp.contains(&format!("HOST_GITREV[] = {{\"{host_head}\"}}")));
}

#[test]
fn test_stamp_outside_repository_fails() {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let pipeline = Pipeline::new(ProjectLayout::new(temp.path()), BuildConfiguration::default());

    let err = pipeline.stamp().unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Provenance));
}

// =============================================================================
// Stage failures
// =============================================================================

#[test]
fn test_codegen_failure_halts_before_discovery() {
    if !git_available() {
        return;
    }
    let repo = TestRepo::new();
    write_script(&repo.root.join("scripts/generate_code.sh"), "#!/bin/sh\nexit 1\n");

    let log = StageLog::default();
    let err = repo
        .pipeline(repo.config())
        .with_observer(log.clone())
        .run_build(BuildOptions::default())
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Codegen));
    assert_eq!(err.exit_code(), 2);
    assert!(err.failed_command().unwrap().ends_with("scripts/generate_code.sh"));
    assert_eq!(log.started(), vec![Stage::Provenance, Stage::Codegen]);
    assert!(!repo.layout().build_temp.exists());
}

#[test]
fn test_copy_failure_has_its_own_exit_code() {
    if !git_available() {
        return;
    }
    let repo = TestRepo::new();
    fs::remove_dir_all(repo.root.join("third_party")).unwrap();

    let err = repo
        .pipeline(repo.config())
        .run_build(BuildOptions::default())
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Copy));
    assert_eq!(err.exit_code(), 3);
}

#[test]
fn test_compile_failure_still_builds_siblings() {
    if !git_available() {
        return;
    }
    let repo = TestRepo::new();
    write_file(&repo.root.join("native_ext/csrc/broken.cpp"), "syntax error\n");

    let config = BuildConfiguration {
        jobs: Some(2),
        ..repo.config()
    };
    let err = repo
        .pipeline(config)
        .run_build(BuildOptions::default())
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Compile));
    assert_eq!(err.exit_code(), 5);
    assert!(matches!(
        err,
        Error::Stage { ref source, .. } if matches!(**source, Error::CommandFailed { .. })
    ));

    let layout = repo.layout();
    assert!(layout.object_path(Path::new("native_ext/csrc/tensor.cpp")).exists());
    assert!(layout.object_path(Path::new("runtime/client/session.cc")).exists());
    assert!(!layout.artifact_path().exists());
}

#[test]
fn test_test_build_can_be_disabled() {
    if !git_available() {
        return;
    }
    let repo = TestRepo::new();
    write_script(&repo.root.join("test/cpp/run_tests.sh"), "#!/bin/sh\nexit 1\n");

    let config = BuildConfiguration {
        build_tests: false,
        ..repo.config()
    };
    let outcome = repo
        .pipeline(config)
        .run_build(BuildOptions::default())
        .unwrap();
    assert!(!outcome.report.tests_built);

    let err = repo
        .pipeline(repo.config())
        .run_build(BuildOptions::default())
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::TestBuild));
    assert_eq!(err.exit_code(), 4);
}

// =============================================================================
// Strategies
// =============================================================================

#[test]
fn test_sequential_and_parallel_produce_same_objects() {
    if !git_available() {
        return;
    }
    let repo = TestRepo::new();
    for i in 0..12 {
        write_file(
            &repo.root.join(format!("native_ext/csrc/ops/op{i:02}.cpp")),
            "int op;\n",
        );
    }

    let sequential = BuildConfiguration {
        parallel_compile: false,
        build_tests: false,
        ..repo.config()
    };
    let first = repo
        .pipeline(sequential)
        .run_build(BuildOptions::default())
        .unwrap();

    let parallel = BuildConfiguration {
        jobs: Some(4),
        build_tests: false,
        ..repo.config()
    };
    let second = repo
        .pipeline(parallel)
        .run_build(BuildOptions::default())
        .unwrap();

    assert_eq!(first.report.objects, second.report.objects);
    assert_eq!(first.report.compiled, second.report.compiled);
}

#[test]
fn test_debug_rebuild_recompiles_release_objects() {
    if !git_available() {
        return;
    }
    let repo = TestRepo::new();
    let tensor = repo.layout().object_path(Path::new("native_ext/csrc/tensor.cpp"));

    for incremental in [false, true] {
        let release = BuildConfiguration {
            build_tests: false,
            ..repo.config()
        };
        repo.pipeline(release.clone())
            .run_build(BuildOptions { incremental })
            .unwrap();
        assert!(fs::read_to_string(&tensor).unwrap().contains("-DNDEBUG"));

        let debug = BuildConfiguration {
            debug: true,
            ..release
        };
        let outcome = repo
            .pipeline(debug)
            .run_build(BuildOptions { incremental })
            .unwrap();

        assert_eq!(outcome.report.compiled, outcome.sources);
        let args = fs::read_to_string(&tensor).unwrap();
        assert!(args.contains("-O0"), "release object linked into debug build: {args}");
        assert!(!args.contains("-DNDEBUG"));
    }
}

#[test]
fn test_incremental_rebuild_skips_unchanged_units() {
    if !git_available() {
        return;
    }
    let repo = TestRepo::new();
    let config = BuildConfiguration {
        build_tests: false,
        ..repo.config()
    };
    let options = BuildOptions { incremental: true };

    let first = repo.pipeline(config.clone()).run_build(options).unwrap();
    assert_eq!(first.report.compiled, first.sources);

    // The version and generated files are rewritten on every build.
    let second = repo.pipeline(config).run_build(options).unwrap();
    assert!(second.report.compiled < second.sources);
    assert_eq!(second.report.objects, first.report.objects);
}

// =============================================================================
// Clean
// =============================================================================

#[test]
fn test_clean_respects_sentinel() {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let root = temp.path();
    write_file(&root.join("build/x.o"), "o");
    write_file(&root.join("build/x.so"), "so");
    write_file(&root.join("build/temp/y.o"), "o");
    write_file(
        &root.join(".gitignore"),
        "# objects\nbuild/*.o\n\n# BEGIN NOT-CLEAN-FILES\nbuild/*.so\n",
    );

    let pipeline = Pipeline::new(ProjectLayout::new(root), BuildConfiguration::default());
    let report = pipeline.run_clean().unwrap();

    assert!(!root.join("build/x.o").exists());
    assert!(root.join("build/x.so").exists());
    assert!(!root.join("build/temp").exists());
    assert_eq!(report.removed.len(), 2);
}
