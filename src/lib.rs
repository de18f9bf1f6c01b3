//! packrat - content-based file deduplication
//!
//! packrat collapses every set of byte-identical files in a folder to a single
//! representative copy and records the original layout in `Manifest.json`.
//! Unpacking recreates every removed copy from its representative.
//!
//! The pipeline:
//!
//! 1. [`scanner`] resolves include patterns to a [`FileInventory`](scanner::FileInventory)
//! 2. [`manifest::ManifestBuilder`] fingerprints the files and groups them
//! 3. [`actions::PackEngine`] transforms the tree and persists the manifest
//! 4. [`actions::UnpackEngine`] reverses the transformation

pub mod actions;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod pool;
pub mod progress;
pub mod scanner;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use yansi::Paint;

use crate::actions::{PackEngine, PackOutcome, UnpackEngine, UnpackOutcome};
use crate::cli::{Cli, Commands, PackArgs, PackListArgs, UnpackArgs};
use crate::config::Config;
use crate::error::{ExitCode, InputError};
use crate::progress::{Progress, ProgressCallback};
use crate::scanner::FileInventory;

/// Run the command described by `cli`.
///
/// Logging must already be initialized. Outcomes are reported on stdout
/// unless `--quiet` is set.
///
/// # Errors
///
/// Returns any input, scan, build, pack or unpack error with context
/// attached; [`ExitCode::from_error`] maps it to an exit code.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::load(cli.config.as_deref())
        .map_err(|e| InputError::Invalid(format!("{:#}", e)))?;
    if let Some(threads) = cli.threads {
        config.threads = threads;
    }
    log::debug!("Effective configuration: {:?}", config);

    let progress: Arc<dyn ProgressCallback> = Arc::new(Progress::new(cli.quiet));
    let quiet = cli.quiet;

    match cli.command {
        Commands::Pack(args) => run_pack(args, &config, progress, quiet),
        Commands::PackList(args) => run_pack_list(args, &config, progress, quiet),
        Commands::Unpack(args) => run_unpack(args, &config, progress, quiet),
    }
}

fn run_pack(
    args: PackArgs,
    config: &Config,
    progress: Arc<dyn ProgressCallback>,
    quiet: bool,
) -> Result<ExitCode> {
    require_folder(&args.folder)?;
    let destination = args.destination.unwrap_or_else(|| args.folder.clone());

    let mut matcher_config = config.matcher_config();
    matcher_config.follow_symlinks |= args.follow_symlinks;

    let inventory = FileInventory::from_directory(&args.folder, &matcher_config)
        .with_context(|| format!("Failed to collect files in {}", args.folder.display()))?;

    pack(inventory, &destination, config, progress, quiet)
}

fn run_pack_list(
    args: PackListArgs,
    config: &Config,
    progress: Arc<dyn ProgressCallback>,
    quiet: bool,
) -> Result<ExitCode> {
    if !args.pack_file.exists() {
        return Err(InputError::FileNotFound(args.pack_file).into());
    }
    if !args.pack_file.is_file() {
        return Err(InputError::Invalid(format!(
            "Not a pack list file: {}",
            args.pack_file.display()
        ))
        .into());
    }

    let destination = match args.destination {
        Some(destination) => destination,
        None => pack_file_folder(&args.pack_file),
    };

    let mut matcher_config = config.matcher_config();
    matcher_config.follow_symlinks |= args.follow_symlinks;

    let inventory = FileInventory::from_pack_file(&args.pack_file, &matcher_config)
        .with_context(|| format!("Failed to resolve pack list {}", args.pack_file.display()))?;

    pack(inventory, &destination, config, progress, quiet)
}

fn run_unpack(
    args: UnpackArgs,
    config: &Config,
    progress: Arc<dyn ProgressCallback>,
    quiet: bool,
) -> Result<ExitCode> {
    require_folder(&args.folder)?;

    let outcome = UnpackEngine::new()
        .with_threads(config.threads)
        .with_progress_callback(progress)
        .unpack(&args.folder)
        .with_context(|| format!("Failed to unpack {}", args.folder.display()))?;

    if !quiet {
        match outcome {
            UnpackOutcome::Unpacked(summary) => println!("{}", summary.green()),
            UnpackOutcome::NotPacked => println!(
                "{} is not packed, nothing to do",
                args.folder.display().yellow()
            ),
        }
    }
    Ok(ExitCode::Success)
}

fn pack(
    inventory: FileInventory,
    destination: &Path,
    config: &Config,
    progress: Arc<dyn ProgressCallback>,
    quiet: bool,
) -> Result<ExitCode> {
    let outcome = PackEngine::with_config(config.pack_config())
        .with_progress_callback(progress)
        .pack_inventory(&inventory, destination)
        .with_context(|| {
            format!(
                "Failed to pack {} into {}",
                inventory.base_path().display(),
                destination.display()
            )
        })?;

    if !quiet {
        match outcome {
            PackOutcome::Packed(summary) => println!("{}", summary.green()),
            PackOutcome::AlreadyPacked => println!(
                "{} is already packed, nothing to do",
                destination.display().yellow()
            ),
        }
    }
    Ok(ExitCode::Success)
}

fn require_folder(folder: &Path) -> Result<(), InputError> {
    if !folder.exists() {
        return Err(InputError::FolderNotFound(folder.to_path_buf()));
    }
    if !folder.is_dir() {
        return Err(InputError::Invalid(format!(
            "Not a folder: {}",
            folder.display()
        )));
    }
    Ok(())
}

/// Folder a pack list's patterns are resolved against.
fn pack_file_folder(pack_file: &Path) -> PathBuf {
    pack_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}
