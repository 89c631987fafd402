//! Demo command-line front door for the AR image tracker pipeline.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod catalog_file;
mod commands;
mod directory_camera;
mod directory_catalog_loader;
mod image_io;
mod json_renderer;

/// Prepare reference targets and run the tracker against a directory of
/// still frames.
#[derive(Parser, Debug)]
#[command(name = "art-tracker-cli")]
#[command(about = "Prepare reference targets and run the tracker offline", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract features from a reference image and add it to the catalog
    AddTarget {
        /// Reference image path
        image: PathBuf,

        /// Display name for the target
        name: String,
    },

    /// Add every image in a directory as a reference target, named by
    /// filename (via the `CatalogLoader` collaborator)
    AddTargetsDir {
        /// Directory of reference images
        dir: PathBuf,
    },

    /// Track every catalogued target through a directory of frames
    Track {
        /// Directory of image files, processed in filename order
        frames_dir: PathBuf,
    },

    /// Show a summary of the on-disk catalog
    Info,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level.parse().unwrap_or(tracing::Level::WARN))
        .init();

    match cli.command {
        Commands::AddTarget { image, name } => commands::add_target::run(image, name)?,
        Commands::AddTargetsDir { dir } => commands::add_targets_dir::run(dir)?,
        Commands::Track { frames_dir } => commands::track::run(frames_dir)?,
        Commands::Info => commands::info::run()?,
    }

    Ok(())
}
