//! Sources command implementation.
//!
//! Prints the manifest of the tree as it is now; the code generator is not
//! run, so generated units only show up after a build.

use extbuild_core::Pipeline;

use crate::build::CliResult;

/// Print the translation units, or the whole manifest as JSON.
pub fn execute(pipeline: &Pipeline, json: bool) -> CliResult {
    let manifest = pipeline.discover()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&manifest)?);
    } else {
        for source in manifest.sources() {
            println!("{}", source.display());
        }
    }

    Ok(())
}
