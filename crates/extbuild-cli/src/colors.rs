//! ANSI styles for extbuild's progress and summary output, named by role.

use std::io::{self, Write};

pub const RESET: &str = "\x1b[0m";

/// Tool name in the build banner.
pub const BANNER: &str = "\x1b[1m";
/// Package being built.
pub const TARGET: &str = "\x1b[36m";
/// `◆ stage` prefix of a progress line.
pub const STAGE: &str = "\x1b[34m";
/// Completed stages and summary headings.
pub const OK: &str = "\x1b[32m";
/// Failed stages and the error prefix.
pub const FAILED: &str = "\x1b[31m";
/// Skipped stages and secondary details.
pub const MUTED: &str = "\x1b[2m";
/// Failures the clean step ignored.
pub const WARN: &str = "\x1b[33m";

/// Flush stdout so a progress line without newline shows up immediately.
pub fn flush_stdout() {
    io::stdout().flush().ok();
}
