//! Vendored source synchronisation.
//!
//! Copies the vendored computation client into the runtime tree with the
//! system `cp`, preserving timestamps so unchanged files stay up to date for
//! the incremental compile plan.

use std::fs;
use std::process::Command;

use crate::error::{Error, Result};
use crate::layout::ProjectLayout;
use crate::process;

/// Build the copy command for a layout.
pub fn copy_command(layout: &ProjectLayout) -> Command {
    let mut cmd = Command::new("cp");
    // BSD cp has no -u
    if cfg!(target_os = "macos") {
        cmd.args(["-R", "-p"]);
    } else {
        cmd.args(["-r", "-u", "-p"]);
    }
    cmd.arg(&layout.vendored_source)
        .arg(&layout.vendored_dest)
        .current_dir(&layout.root);
    cmd
}

/// Copy the vendored sources into the tree.
///
/// The destination is created first: `cp -r src dest` only nests `src`
/// under `dest` when `dest` already exists.
pub fn sync(layout: &ProjectLayout) -> Result<()> {
    let dest = &layout.vendored_dest;
    fs::create_dir_all(dest).map_err(Error::io(dest))?;
    tracing::info!(
        "Copying {} into {}",
        layout.vendored_source.display(),
        layout.vendored_dest.display()
    );
    process::run(&mut copy_command(layout))
}
