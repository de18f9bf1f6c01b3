//! Command-line interface definitions for packrat.
//!
//! Global options (verbosity, color, error format, threads, config file) are
//! accepted before or after the subcommand.
//!
//! # Example
//!
//! ```bash
//! # Deduplicate a folder in place
//! packrat pack ./assets
//!
//! # Write a deduplicated copy elsewhere
//! packrat pack ./assets ./assets-packed
//!
//! # Pack only the files listed in a pack list
//! packrat packlist ./game/assets.pack
//!
//! # Restore every duplicate
//! packrat -v unpack ./assets
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Content-based file deduplication.
///
/// packrat collapses files with identical content into a single copy and
/// records the original layout in a Manifest.json, so the folder can be
/// restored exactly with `unpack`.
#[derive(Debug, Parser)]
#[command(name = "packrat")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print errors as JSON objects
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Number of worker threads (0 = one per CPU)
    ///
    /// Overrides the `threads` setting of the configuration file.
    #[arg(long, value_name = "N", global = true)]
    pub threads: Option<usize>,

    /// Path to a configuration file
    ///
    /// If not specified, a default platform-specific path is used.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for packrat.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Deduplicate every file of a folder
    Pack(PackArgs),
    /// Deduplicate the files selected by a pack list
    #[command(name = "packlist")]
    PackList(PackListArgs),
    /// Restore a packed folder
    Unpack(UnpackArgs),
}

/// Arguments for the pack subcommand.
#[derive(Debug, Args)]
pub struct PackArgs {
    /// Folder to pack
    #[arg(value_name = "FOLDER")]
    pub folder: PathBuf,

    /// Where to write the packed tree (default: FOLDER, packed in place)
    ///
    /// Warning: an existing destination is deleted first.
    #[arg(value_name = "DESTINATION")]
    pub destination: Option<PathBuf>,

    /// Follow symbolic links while collecting files
    #[arg(long)]
    pub follow_symlinks: bool,
}

/// Arguments for the packlist subcommand.
#[derive(Debug, Args)]
pub struct PackListArgs {
    /// Pack list: one include pattern per line, relative to its own folder
    #[arg(value_name = "PACKFILE")]
    pub pack_file: PathBuf,

    /// Where to write the packed tree (default: the pack list's folder)
    ///
    /// Warning: an existing destination is deleted first.
    #[arg(value_name = "DESTINATION")]
    pub destination: Option<PathBuf>,

    /// Follow symbolic links while collecting files
    #[arg(long)]
    pub follow_symlinks: bool,
}

/// Arguments for the unpack subcommand.
#[derive(Debug, Args)]
pub struct UnpackArgs {
    /// Packed folder to restore
    #[arg(value_name = "FOLDER")]
    pub folder: PathBuf,
}
