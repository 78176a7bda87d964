//! Clean command implementation.

use extbuild_core::Pipeline;

use crate::build::CliResult;
use crate::colors;
use crate::progress::ProgressPrinter;

/// Remove everything the ignore file lists before the sentinel.
pub fn execute(pipeline: Pipeline) -> CliResult {
    let report = pipeline.with_observer(ProgressPrinter).run_clean()?;

    for path in &report.removed {
        println!("{}removed{} {}", colors::MUTED, colors::RESET, path.display());
    }
    for (subject, reason) in &report.ignored {
        println!(
            "{}ignored{} {}: {}",
            colors::WARN,
            colors::RESET,
            subject,
            reason
        );
    }
    println!(
        "{}Cleaned:{} {} path(s)",
        colors::OK,
        colors::RESET,
        report.removed.len()
    );

    Ok(())
}
