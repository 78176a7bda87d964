//! Stage progress printed as the pipeline runs.

use extbuild_core::{Error, PipelineObserver, Stage};

use crate::colors;

/// Prints one `◆ stage ... ✓` line per pipeline stage.
pub struct ProgressPrinter;

impl PipelineObserver for ProgressPrinter {
    fn on_stage_started(&self, stage: Stage) {
        print!("{}  ◆ {}{} ... ", colors::STAGE, stage, colors::RESET);
        colors::flush_stdout();
    }

    fn on_stage_completed(&self, _stage: Stage) {
        println!("{}✓{}", colors::OK, colors::RESET);
    }

    fn on_stage_skipped(&self, stage: Stage) {
        println!(
            "{}  ◆ {}{} ... {}skipped{}",
            colors::STAGE,
            stage,
            colors::RESET,
            colors::MUTED,
            colors::RESET
        );
    }

    fn on_stage_failed(&self, _stage: Stage, _error: &Error) {
        println!("{}✗{}", colors::FAILED, colors::RESET);
    }
}
