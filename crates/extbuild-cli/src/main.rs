//! extbuild CLI - builds and cleans the native extension of a checkout.

mod build;
mod clean;
mod colors;
mod progress;
mod sources;
mod version;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use extbuild_core::{BuildConfiguration, Pipeline, ProjectLayout};

#[derive(Parser)]
#[command(name = "extbuild")]
#[command(about = "Build orchestrator for the native extension module")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Repository root
    #[arg(short = 'C', long = "root", global = true, default_value = ".")]
    root: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Stamp, generate, compile, link and build the native tests
    Build {
        /// Only recompile units newer than their object (flag changes still rebuild everything)
        #[arg(long)]
        incremental: bool,
    },

    /// Remove the files listed in .gitignore up to the NOT-CLEAN-FILES marker
    Clean,

    /// Print the translation units of the current tree
    Sources {
        /// Print the full manifest as JSON
        #[arg(long)]
        json: bool,
    },

    /// Stamp the version files and print the version record
    Version {
        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}error:{} {}", colors::FAILED, colors::RESET, format_error(&err));
            ExitCode::from(exit_code(&err))
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let pipeline = open_pipeline(&cli.root)?;

    match cli.command {
        Commands::Build { incremental } => build::execute(pipeline, incremental),
        Commands::Clean => clean::execute(pipeline),
        Commands::Sources { json } => sources::execute(&pipeline, json),
        Commands::Version { json } => version::execute(&pipeline, json),
    }
}

/// Resolve the layout and read the environment once for this invocation.
fn open_pipeline(root: &Path) -> anyhow::Result<Pipeline> {
    let layout = ProjectLayout::from_root(root)?;
    let config = BuildConfiguration::from_env()?;
    tracing::debug!("root {}, {:?}", layout.root.display(), config);
    Ok(Pipeline::new(layout, config))
}

/// Format extbuild-core errors with recovery hints.
fn format_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<extbuild_core::Error>() {
        Some(core) => core.with_hint(),
        None => format!("{err:#}"),
    }
}

fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<extbuild_core::Error>()
        .map(extbuild_core::Error::exit_code)
        .unwrap_or(1)
}
