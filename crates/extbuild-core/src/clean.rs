//! Ignore-file driven cleanup.
//!
//! Every pattern in the ignore file is expanded and the matches removed,
//! until the `# BEGIN NOT-CLEAN-FILES` marker: everything after it is kept.
//! Individual removals are best-effort; only a missing ignore file is fatal.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BestEffort, Error, Result};
use crate::layout::ProjectLayout;
use crate::manifest::MATCH_OPTIONS;

/// Marker line after which the ignore file lists files that survive `clean`.
pub const SENTINEL: &str = "# BEGIN NOT-CLEAN-FILES";

/// Scanner state. `Halted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Scanning,
    Halted,
}

/// Classification of one ignore-file line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    Blank,
    Comment,
    Sentinel,
    Pattern(&'a str),
}

/// Classify a line. The sentinel must be followed by whitespace or the end
/// of the line.
pub fn classify(line: &str) -> LineKind<'_> {
    let line = line.trim_end();
    if line.trim_start().is_empty() {
        return LineKind::Blank;
    }
    if let Some(rest) = line.strip_prefix(SENTINEL)
        && (rest.is_empty() || rest.starts_with(char::is_whitespace))
    {
        return LineKind::Sentinel;
    }
    if line.starts_with('#') {
        return LineKind::Comment;
    }
    LineKind::Pattern(line)
}

/// Two-state line scanner collecting clean patterns.
#[derive(Debug, Clone)]
pub struct PatternScanner {
    state: ScanState,
    patterns: Vec<String>,
}

impl Default for PatternScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternScanner {
    /// Start scanning.
    pub fn new() -> Self {
        Self {
            state: ScanState::Scanning,
            patterns: Vec::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Feed one line. Lines fed after the sentinel are not examined.
    pub fn feed(&mut self, line: &str) -> ScanState {
        if self.state == ScanState::Halted {
            return self.state;
        }
        match classify(line) {
            LineKind::Blank | LineKind::Comment => {}
            LineKind::Sentinel => self.state = ScanState::Halted,
            LineKind::Pattern(pattern) => self.patterns.push(pattern.to_string()),
        }
        self.state
    }

    /// Finish scanning.
    pub fn finish(self) -> CleanPlan {
        CleanPlan {
            patterns: self.patterns,
            halted: self.state == ScanState::Halted,
        }
    }
}

/// Ordered clean patterns from an ignore file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanPlan {
    patterns: Vec<String>,
    halted: bool,
}

impl CleanPlan {
    /// Scan ignore-file text, stopping at the sentinel.
    pub fn parse(text: &str) -> Self {
        let mut scanner = PatternScanner::new();
        for line in text.lines() {
            if scanner.feed(line) == ScanState::Halted {
                break;
            }
        }
        scanner.finish()
    }

    /// Read and scan an ignore file.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if the file cannot be read.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(Error::io(path))?;
        Ok(Self::parse(&text))
    }

    /// Patterns in file order.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether the sentinel was reached.
    pub fn halted(&self) -> bool {
        self.halted
    }
}

/// What a clean run removed and which failures it ignored.
#[derive(Debug, Clone, Default)]
pub struct CleanReport {
    /// Paths removed, in removal order.
    pub removed: Vec<PathBuf>,

    /// Patterns or paths that could not be processed, with the reason.
    pub ignored: Vec<(String, String)>,
}

impl CleanReport {
    fn record(&mut self, subject: String, outcome: BestEffort<PathBuf>) {
        match outcome {
            BestEffort::Done(path) => self.removed.push(path),
            BestEffort::Ignored { reason } => {
                tracing::debug!("ignoring failure on {}: {}", subject, reason);
                self.ignored.push((subject, reason));
            }
        }
    }
}

/// Remove a file, falling back to recursive directory removal.
pub fn remove_path(path: &Path) -> BestEffort<PathBuf> {
    if fs::remove_file(path).is_ok() {
        return BestEffort::Done(path.to_path_buf());
    }
    match fs::remove_dir_all(path) {
        Ok(()) => BestEffort::Done(path.to_path_buf()),
        Err(e) => BestEffort::ignored(e.to_string()),
    }
}

/// Runs the clean command for a layout.
pub struct Cleaner<'a> {
    layout: &'a ProjectLayout,
}

impl<'a> Cleaner<'a> {
    /// Create a cleaner.
    pub fn new(layout: &'a ProjectLayout) -> Self {
        Self { layout }
    }

    /// Load the ignore file, remove every match, then remove `build/temp`.
    pub fn run(&self) -> Result<CleanReport> {
        let plan = CleanPlan::load(&self.layout.ignore_file)?;
        let mut report = self.apply(&plan);

        let temp = &self.layout.build_temp;
        if temp.exists() {
            report.record(temp.display().to_string(), remove_path(temp));
        }

        tracing::info!(
            "Removed {} path(s), ignored {} failure(s)",
            report.removed.len(),
            report.ignored.len()
        );
        Ok(report)
    }

    /// Expand and remove each pattern of `plan` relative to the root.
    pub fn apply(&self, plan: &CleanPlan) -> CleanReport {
        let mut report = CleanReport::default();
        let root = glob::Pattern::escape(&self.layout.root.to_string_lossy());

        for pattern in plan.patterns() {
            // Anchored gitignore patterns are still relative to the root.
            let expression = format!("{root}/{}", pattern.trim_start_matches('/'));
            let entries = match glob::glob_with(&expression, MATCH_OPTIONS) {
                Ok(entries) => entries,
                Err(e) => {
                    report.record(pattern.clone(), BestEffort::ignored(e.to_string()));
                    continue;
                }
            };

            for entry in entries {
                match entry {
                    Ok(path) => {
                        let subject = path.display().to_string();
                        report.record(subject, remove_path(&path));
                    }
                    Err(e) => report.record(pattern.clone(), BestEffort::ignored(e.to_string())),
                }
            }
        }

        report
    }
}
