//! Version command implementation.

use extbuild_core::Pipeline;

use crate::build::CliResult;

/// Stamp both version files and print the record.
pub fn execute(pipeline: &Pipeline, json: bool) -> CliResult {
    let record = pipeline.stamp()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        println!("{} ({})", record.version, record.primary_revision);
        if !record.host_revision.is_empty() {
            println!("host {}", record.host_revision);
        }
    }

    Ok(())
}
