use clap::Parser;
use packrat::cli::Cli;
use packrat::error::ExitCode;
use packrat::manifest::manifest_exists;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

fn write(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Run the app quietly with a config file that does not exist.
fn run(config_dir: &TempDir, args: &[&str]) -> anyhow::Result<ExitCode> {
    let config = config_dir.path().join("absent.toml");
    let mut argv = vec![
        "packrat".to_string(),
        "--quiet".to_string(),
        "--config".to_string(),
        config.to_string_lossy().into_owned(),
    ];
    argv.extend(args.iter().map(|a| a.to_string()));
    packrat::run_app(Cli::try_parse_from(argv).unwrap())
}

#[test]
fn test_cli_pack_and_unpack() {
    let config = tempdir().unwrap();
    let dir = tempdir().unwrap();
    write(dir.path(), "a.txt", b"X");
    write(dir.path(), "b/b.txt", b"X");
    let folder = dir.path().to_str().unwrap();

    assert_eq!(run(&config, &["pack", folder]).unwrap(), ExitCode::Success);
    assert!(manifest_exists(dir.path()));
    assert!(!dir.path().join("b").exists());

    // Already packed is still a success
    assert_eq!(run(&config, &["pack", folder]).unwrap(), ExitCode::Success);

    assert_eq!(run(&config, &["unpack", folder]).unwrap(), ExitCode::Success);
    assert!(dir.path().join("b/b.txt").exists());

    // Not packed is still a success
    assert_eq!(run(&config, &["unpack", folder]).unwrap(), ExitCode::Success);
}

#[test]
fn test_cli_packlist_defaults_to_list_folder() {
    let config = tempdir().unwrap();
    let dir = tempdir().unwrap();
    write(dir.path(), "one.dat", b"D");
    write(dir.path(), "sub/two.dat", b"D");
    write(dir.path(), "keep.txt", b"D");
    write(dir.path(), "data.pack", b"**/*.dat\n");
    let pack_file = dir.path().join("data.pack");

    let code = run(
        &config,
        &["--threads", "2", "packlist", pack_file.to_str().unwrap()],
    )
    .unwrap();

    assert_eq!(code, ExitCode::Success);
    assert!(manifest_exists(dir.path()));
    assert!(dir.path().join("one.dat").exists());
    assert!(!dir.path().join("sub").exists());
    assert!(dir.path().join("keep.txt").exists());
}

#[test]
fn test_cli_missing_folder_exit_code() {
    let config = tempdir().unwrap();
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing");

    let err = run(&config, &["pack", missing.to_str().unwrap()]).unwrap_err();
    assert_eq!(ExitCode::from_error(&err), ExitCode::FolderNotFound);

    let err = run(&config, &["unpack", missing.to_str().unwrap()]).unwrap_err();
    assert_eq!(ExitCode::from_error(&err), ExitCode::FolderNotFound);
}

#[test]
fn test_cli_missing_pack_list_exit_code() {
    let config = tempdir().unwrap();
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.pack");

    let err = run(&config, &["packlist", missing.to_str().unwrap()]).unwrap_err();
    assert_eq!(ExitCode::from_error(&err), ExitCode::FileNotFound);
}

#[test]
fn test_cli_overlap_is_invalid_argument() {
    let config = tempdir().unwrap();
    let dir = tempdir().unwrap();
    write(dir.path(), "a.txt", b"X");
    let nested = dir.path().join("nested");

    let err = run(
        &config,
        &["pack", dir.path().to_str().unwrap(), nested.to_str().unwrap()],
    )
    .unwrap_err();
    assert_eq!(ExitCode::from_error(&err), ExitCode::InvalidArguments);
    assert!(!nested.exists());
}

#[test]
fn test_cli_corrupted_manifest_is_operation_failure() {
    let config = tempdir().unwrap();
    let dir = tempdir().unwrap();
    write(dir.path(), "Manifest.json", b"not json");

    let err = run(&config, &["unpack", dir.path().to_str().unwrap()]).unwrap_err();
    assert_eq!(ExitCode::from_error(&err), ExitCode::OperationFailed);
    assert!(format!("{:#}", err).contains("Failed to unpack"));
}
