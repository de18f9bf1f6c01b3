use packrat::scanner::{FileInventory, MatcherConfig, PathMatcher, ScanError};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn touch(root: &Path, rel: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, rel.as_bytes()).unwrap();
}

fn relative(root: &Path, files: &[PathBuf]) -> Vec<String> {
    files
        .iter()
        .map(|f| {
            f.strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect()
}

#[test]
fn test_recursive_extension_pattern() {
    let dir = tempdir().unwrap();
    for rel in ["a.log", "b.txt", "x/c.log", "x/y/d.log", "x/y/e.log.bak"] {
        touch(dir.path(), rel);
    }

    let matcher = PathMatcher::new(&["**/*.log"], MatcherConfig::default()).unwrap();
    let files = matcher.resolve(dir.path()).unwrap();

    assert_eq!(
        relative(dir.path(), &files),
        vec!["a.log", "x/c.log", "x/y/d.log"]
    );
}

#[test]
fn test_directory_prefixed_pattern() {
    let dir = tempdir().unwrap();
    for rel in ["docs/a.md", "docs/sub/b.md", "other/c.md", "d.md"] {
        touch(dir.path(), rel);
    }

    let flat = PathMatcher::new(&["docs/*.md"], MatcherConfig::default()).unwrap();
    assert_eq!(relative(dir.path(), &flat.resolve(dir.path()).unwrap()), vec!["docs/a.md"]);

    let deep = PathMatcher::new(&["docs/**/*.md"], MatcherConfig::default()).unwrap();
    assert_eq!(
        relative(dir.path(), &deep.resolve(dir.path()).unwrap()),
        vec!["docs/a.md", "docs/sub/b.md"]
    );
}

#[test]
fn test_multiple_patterns_merge_without_duplicates() {
    let dir = tempdir().unwrap();
    for rel in ["a.txt", "b.log", "sub/c.txt"] {
        touch(dir.path(), rel);
    }

    let matcher = PathMatcher::new(&["*.log", "**/*.txt", "a.txt"], MatcherConfig::default())
        .unwrap();
    assert_eq!(
        relative(dir.path(), &matcher.resolve(dir.path()).unwrap()),
        vec!["b.log", "a.txt", "sub/c.txt"]
    );
}

#[test]
fn test_inventory_from_directory_includes_everything() {
    let dir = tempdir().unwrap();
    for rel in [".hidden", "noext", "a.b.c", "deep/er/file"] {
        touch(dir.path(), rel);
    }

    let inventory = FileInventory::from_directory(dir.path(), &MatcherConfig::default()).unwrap();
    assert_eq!(inventory.len(), 4);
    assert_eq!(inventory.base_path(), dir.path());
}

#[test]
fn test_inventory_missing_directory() {
    let dir = tempdir().unwrap();
    let result = FileInventory::from_directory(&dir.path().join("nope"), &MatcherConfig::default());
    assert!(matches!(result, Err(ScanError::NotFound(_))));
}

#[test]
fn test_inventory_rejects_malformed_pattern() {
    let dir = tempdir().unwrap();
    let result = FileInventory::from_patterns(dir.path(), &["[unclosed"], &MatcherConfig::default());
    assert!(matches!(result, Err(ScanError::InvalidPattern { .. })));
}

#[test]
fn test_pack_list_resolves_relative_to_its_folder() {
    let dir = tempdir().unwrap();
    touch(dir.path(), "game/textures/a.png");
    touch(dir.path(), "game/textures/b.jpg");
    touch(dir.path(), "game/sounds/c.wav");
    fs::write(
        dir.path().join("game/assets.pack"),
        "# textures\ntextures/*.png\n\n  sounds/**/*.wav  \n",
    )
    .unwrap();

    let inventory = FileInventory::from_pack_file(
        &dir.path().join("game/assets.pack"),
        &MatcherConfig::default(),
    )
    .unwrap();

    assert_eq!(inventory.base_path(), dir.path().join("game"));
    assert_eq!(
        relative(&dir.path().join("game"), inventory.files()),
        vec!["textures/a.png", "sounds/c.wav"]
    );
}

#[test]
fn test_pack_list_missing_file() {
    let dir = tempdir().unwrap();
    let result = FileInventory::from_pack_file(&dir.path().join("none.pack"), &MatcherConfig::default());
    assert!(matches!(result, Err(ScanError::NotFound(_))));
}
