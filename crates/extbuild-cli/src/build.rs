//! Build command implementation.
//!
//! Runs the full pipeline and prints a summary of the linked extension.

use extbuild_core::{BuildOptions, Pipeline};

use crate::colors;
use crate::progress::ProgressPrinter;

/// Result type for CLI operations.
pub type CliResult = anyhow::Result<()>;

/// Build the extension for the repository behind `pipeline`.
pub fn execute(pipeline: Pipeline, incremental: bool) -> CliResult {
    println!(
        "\n{}extbuild{} - Building {}{}{} in {}\n",
        colors::BANNER,
        colors::RESET,
        colors::TARGET,
        pipeline.config().package_name,
        colors::RESET,
        pipeline.layout().root.display()
    );

    let strategy = pipeline.config().strategy();
    let pipeline = pipeline.with_observer(ProgressPrinter);
    let outcome = pipeline.run_build(BuildOptions { incremental })?;
    let report = &outcome.report;

    println!();
    println!(
        "{}Built:{} {}",
        colors::OK,
        colors::RESET,
        report.artifact.display()
    );
    println!(
        "{}Version:{} {}",
        colors::MUTED,
        colors::RESET,
        outcome.version.version
    );
    println!(
        "{}Units:{} {} ({} compiled, {:?})",
        colors::MUTED,
        colors::RESET,
        outcome.sources,
        report.compiled,
        strategy
    );
    println!(
        "{}Time:{} {:.2}s",
        colors::MUTED,
        colors::RESET,
        report.elapsed.as_secs_f64()
    );

    Ok(())
}
