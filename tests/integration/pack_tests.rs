use packrat::actions::{ActionError, PackConfig, PackEngine, PackOutcome, UnpackEngine};
use packrat::manifest::{manifest_exists, manifest_path, Manifest, MANIFEST_FILE_NAME};
use packrat::scanner::{fingerprint_bytes, FileInventory, MatcherConfig};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;

fn write(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn fingerprint(content: &[u8]) -> String {
    fingerprint_bytes(content)
}

fn inventory(root: &Path) -> FileInventory {
    FileInventory::from_directory(root, &MatcherConfig::default()).unwrap()
}

fn files_under(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}

#[test]
fn test_pack_in_place_keeps_representatives() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.txt", b"X");
    write(dir.path(), "b/b.txt", b"X");
    write(dir.path(), "c.txt", b"Y");

    let outcome = PackEngine::new()
        .pack_inventory(&inventory(dir.path()), dir.path())
        .unwrap();
    assert!(matches!(outcome, PackOutcome::Packed(_)));

    assert_eq!(
        files_under(dir.path()),
        vec![MANIFEST_FILE_NAME, "a.txt", "c.txt"]
    );
    assert!(!dir.path().join("b").exists());

    let manifest = Manifest::load(&manifest_path(dir.path())).unwrap();
    assert_eq!(
        manifest.paths(&fingerprint(b"X")).unwrap(),
        &["a.txt".to_string(), "b/b.txt".to_string()]
    );
    assert_eq!(
        manifest.paths(&fingerprint(b"Y")).unwrap(),
        &["c.txt".to_string()]
    );
}

#[test]
fn test_pack_in_place_is_idempotent() {
    let dir = tempdir().unwrap();
    write(dir.path(), "one.bin", b"same");
    write(dir.path(), "two.bin", b"same");

    let engine = PackEngine::new();
    engine
        .pack_inventory(&inventory(dir.path()), dir.path())
        .unwrap();
    let files = files_under(dir.path());
    let manifest = fs::read(manifest_path(dir.path())).unwrap();

    let second = engine
        .pack_inventory(&inventory(dir.path()), dir.path())
        .unwrap();
    assert_eq!(second, PackOutcome::AlreadyPacked);
    assert_eq!(files_under(dir.path()), files);
    assert_eq!(fs::read(manifest_path(dir.path())).unwrap(), manifest);
}

#[test]
fn test_pack_removes_every_emptied_directory() {
    let dir = tempdir().unwrap();
    write(dir.path(), "keep.txt", b"data");
    write(dir.path(), "x/y/z/copy.txt", b"data");
    write(dir.path(), "x/other/copy.txt", b"data");
    write(dir.path(), "x/unique.txt", b"unique");

    PackEngine::new()
        .pack_inventory(&inventory(dir.path()), dir.path())
        .unwrap();

    assert!(dir.path().join("x/unique.txt").exists());
    assert!(!dir.path().join("x/y").exists());
    assert!(!dir.path().join("x/other").exists());

    let empty_dirs: Vec<_> = walkdir::WalkDir::new(dir.path())
        .min_depth(1)
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_dir())
        .filter(|e| fs::read_dir(e.path()).unwrap().next().is_none())
        .collect();
    assert!(empty_dirs.is_empty());
}

#[test]
fn test_pack_out_of_place_replaces_destination() {
    let source = tempdir().unwrap();
    let parent = tempdir().unwrap();
    let destination = parent.path().join("packed");
    write(source.path(), "a.txt", b"X");
    write(source.path(), "b/b.txt", b"X");
    write(source.path(), "c.txt", b"Y");
    write(&destination, "stale/leftover.txt", b"old");

    let outcome = PackEngine::new()
        .pack_inventory(&inventory(source.path()), &destination)
        .unwrap();

    match outcome {
        PackOutcome::Packed(summary) => {
            assert!(!summary.in_place);
            assert_eq!(summary.groups, 2);
            assert_eq!(summary.files, 3);
        }
        PackOutcome::AlreadyPacked => panic!("Expected Packed"),
    }
    assert_eq!(
        files_under(&destination),
        vec![MANIFEST_FILE_NAME, "a.txt", "c.txt"]
    );
    assert_eq!(
        files_under(source.path()),
        vec!["a.txt", "b/b.txt", "c.txt"]
    );
}

#[test]
fn test_pack_out_of_place_into_missing_destination() {
    let source = tempdir().unwrap();
    let parent = tempdir().unwrap();
    let destination = parent.path().join("new").join("deeper");
    write(source.path(), "nested/dir/file.txt", b"content");

    PackEngine::new()
        .pack_inventory(&inventory(source.path()), &destination)
        .unwrap();

    assert_eq!(
        fs::read(destination.join("nested/dir/file.txt")).unwrap(),
        b"content"
    );
    assert!(manifest_exists(&destination));
}

#[test]
fn test_pack_out_of_place_repeats_cleanly() {
    let source = tempdir().unwrap();
    let parent = tempdir().unwrap();
    let destination = parent.path().join("packed");
    write(source.path(), "a.txt", b"A");

    let engine = PackEngine::with_config(PackConfig {
        removal_poll_attempts: 50,
        removal_poll_interval: Duration::from_millis(1),
        ..PackConfig::default()
    });
    engine
        .pack_inventory(&inventory(source.path()), &destination)
        .unwrap();
    // An out-of-place target holding a manifest is rebuilt, not skipped
    let second = engine
        .pack_inventory(&inventory(source.path()), &destination)
        .unwrap();
    assert!(matches!(second, PackOutcome::Packed(_)));
    assert_eq!(files_under(&destination), vec![MANIFEST_FILE_NAME, "a.txt"]);
}

#[test]
fn test_pack_rejects_nested_destination_without_changes() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.txt", b"X");
    write(dir.path(), "out/b.txt", b"X");

    let result = PackEngine::new().pack_inventory(&inventory(dir.path()), &dir.path().join("out"));

    assert!(matches!(result, Err(ActionError::OverlappingFolders { .. })));
    assert_eq!(files_under(dir.path()), vec!["a.txt", "out/b.txt"]);
}

#[test]
fn test_pack_with_explicit_manifest() {
    let dir = tempdir().unwrap();
    write(dir.path(), "keep.txt", b"K");
    write(dir.path(), "drop.txt", b"K");
    write(dir.path(), "untracked.txt", b"K");

    let manifest = Manifest::from_json(
        format!(
            r#"{{"{}": ["keep.txt", "drop.txt"]}}"#,
            fingerprint(b"K")
        )
        .as_bytes(),
    )
    .unwrap();

    PackEngine::new()
        .pack(&manifest, dir.path(), dir.path())
        .unwrap();

    // Files outside the manifest are never touched
    assert_eq!(
        files_under(dir.path()),
        vec![MANIFEST_FILE_NAME, "keep.txt", "untracked.txt"]
    );
}

#[test]
fn test_pack_from_pack_list() {
    let dir = tempdir().unwrap();
    write(dir.path(), "logs/a.log", b"L");
    write(dir.path(), "logs/deep/b.log", b"L");
    write(dir.path(), "logs/deep/c.txt", b"L");
    write(dir.path(), "assets.pack", b"# logs only\nlogs/**/*.log\n");

    let inventory =
        FileInventory::from_pack_file(&dir.path().join("assets.pack"), &MatcherConfig::default())
            .unwrap();
    PackEngine::new()
        .pack_inventory(&inventory, dir.path())
        .unwrap();

    assert!(dir.path().join("logs/a.log").exists());
    assert!(!dir.path().join("logs/deep/b.log").exists());
    assert!(dir.path().join("logs/deep/c.txt").exists());
    assert!(dir.path().join("assets.pack").exists());
}

#[test]
fn test_pack_build_failure_leaves_tree_untouched() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.txt", b"X");
    write(dir.path(), "b.txt", b"X");
    let inventory = FileInventory::new(
        dir.path().to_path_buf(),
        vec![
            dir.path().join("a.txt"),
            dir.path().join("b.txt"),
            dir.path().join("missing.txt"),
        ],
    );

    let result = PackEngine::new().pack_inventory(&inventory, dir.path());

    assert!(matches!(result, Err(ActionError::Build(_))));
    assert_eq!(files_under(dir.path()), vec!["a.txt", "b.txt"]);
}

#[test]
fn test_pack_list_parent_segments_do_not_alias() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a/x.txt", b"only copy");
    write(dir.path(), "assets.pack", b"a/*.txt\na/../a/*.txt\n");

    let inventory =
        FileInventory::from_pack_file(&dir.path().join("assets.pack"), &MatcherConfig::default())
            .unwrap();
    assert_eq!(inventory.len(), 1);

    PackEngine::new()
        .pack_inventory(&inventory, dir.path())
        .unwrap();

    let manifest = Manifest::load(&manifest_path(dir.path())).unwrap();
    assert_eq!(
        manifest.paths(&fingerprint(b"only copy")).unwrap(),
        &["a/x.txt".to_string()]
    );
    assert_eq!(fs::read(dir.path().join("a/x.txt")).unwrap(), b"only copy");
}

#[cfg(unix)]
#[test]
fn test_pack_followed_symlink_keeps_target() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.txt", b"precious");
    std::os::unix::fs::symlink(dir.path().join("a.txt"), dir.path().join("0.txt")).unwrap();

    let config = MatcherConfig {
        follow_symlinks: true,
    };
    let inventory = FileInventory::from_directory(dir.path(), &config).unwrap();
    assert_eq!(inventory.files(), &[dir.path().join("a.txt")]);

    let outcome = PackEngine::new()
        .pack_inventory(&inventory, dir.path())
        .unwrap();
    match outcome {
        PackOutcome::Packed(summary) => assert_eq!(summary.duplicates_removed, 0),
        PackOutcome::AlreadyPacked => panic!("expected a pack"),
    }
    assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"precious");

    UnpackEngine::new().unpack(dir.path()).unwrap();
    assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"precious");
    assert_eq!(fs::read(dir.path().join("0.txt")).unwrap(), b"precious");
}

#[cfg(unix)]
#[test]
fn test_pack_in_place_never_deletes_alias_of_representative() {
    for alias_first in [false, true] {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.txt", b"precious");
        write(dir.path(), "b.txt", b"precious");
        std::os::unix::fs::symlink(dir.path().join("a.txt"), dir.path().join("0.txt")).unwrap();

        let (first, second) = if alias_first {
            ("0.txt", "a.txt")
        } else {
            ("a.txt", "0.txt")
        };
        let inventory = FileInventory::new(
            dir.path().to_path_buf(),
            vec![
                dir.path().join(first),
                dir.path().join(second),
                dir.path().join("b.txt"),
            ],
        );

        let outcome = PackEngine::new()
            .pack_inventory(&inventory, dir.path())
            .unwrap();
        match outcome {
            PackOutcome::Packed(summary) => assert_eq!(summary.duplicates_removed, 1),
            PackOutcome::AlreadyPacked => panic!("expected a pack"),
        }
        assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"precious");
        assert!(!dir.path().join("b.txt").exists());

        UnpackEngine::new().unpack(dir.path()).unwrap();
        assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"precious");
        assert_eq!(fs::read(dir.path().join("b.txt")).unwrap(), b"precious");
        assert!(fs::symlink_metadata(dir.path().join("0.txt"))
            .unwrap()
            .file_type()
            .is_symlink());
    }
}
