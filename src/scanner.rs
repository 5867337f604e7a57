//! Recursive directory scan for files matching a [`FileFilter`].
//!
//! Unreadable directories and entries are skipped without error.
//! Symlinked directories are not followed.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::filter::FileFilter;

/// Collect every matching file under `root`, in traversal order: the files
/// of a directory first, then its subdirectories.
pub fn scan(root: &Path, filter: &FileFilter) -> Vec<PathBuf> {
    let mut found = Vec::new();
    walk(root, filter, &mut found);
    found
}

pub fn count(root: &Path, filter: &FileFilter) -> usize {
    scan(root, filter).len()
}

fn walk(dir: &Path, filter: &FileFilter, found: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Skipping unreadable directory {}: {e}", dir.display());
            return;
        }
    };

    let mut subdirs = Vec::new();
    for entry in entries.filter_map(Result::ok) {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let path = entry.path();

        if file_type.is_dir() {
            subdirs.push(path);
            continue;
        }

        let is_file = file_type.is_file() || (file_type.is_symlink() && path.is_file());
        if is_file && filter.matches(&entry.file_name().to_string_lossy()) {
            found.push(path);
        }
    }

    for subdir in subdirs {
        walk(&subdir, filter, found);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "hello").unwrap();
    }

    fn names(paths: &[PathBuf]) -> HashSet<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn finds_matches_recursively() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.txt"));
        touch(&dir.path().join("nested/b.txt"));
        touch(&dir.path().join("nested/deeper/c.md"));
        touch(&dir.path().join("nested/deeper/d.html"));
        touch(&dir.path().join("e.TXT"));

        let filter = FileFilter::parse("*.txt;*.md").unwrap();
        let found = scan(dir.path(), &filter);
        assert_eq!(
            names(&found),
            HashSet::from(["a.txt".into(), "b.txt".into(), "c.md".into()])
        );
        assert_eq!(count(dir.path(), &filter), 3);
    }

    #[test]
    fn counts_only_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..4 {
            touch(&dir.path().join(format!("doc{i}.txt")));
        }
        for i in 0..3 {
            touch(&dir.path().join(format!("img{i}.png")));
        }
        let filter = FileFilter::parse("*.txt").unwrap();
        assert_eq!(count(dir.path(), &filter), 4);
        assert_eq!(count(dir.path(), &FileFilter::Any), 7);
    }

    #[test]
    fn directories_named_like_matches_are_not_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("folder.txt")).unwrap();
        touch(&dir.path().join("folder.txt/inner.txt"));

        let found = scan(dir.path(), &FileFilter::parse("*.txt").unwrap());
        assert_eq!(names(&found), HashSet::from(["inner.txt".into()]));
    }

    #[test]
    fn missing_root_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let found = scan(&dir.path().join("missing"), &FileFilter::Any);
        assert!(found.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_subdirectory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.txt"));
        touch(&dir.path().join("locked/hidden.txt"));
        touch(&dir.path().join("open/b.txt"));

        let locked = dir.path().join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        // root ignores directory permissions
        let readable_anyway = fs::read_dir(&locked).is_ok();

        let found = scan(dir.path(), &FileFilter::parse("*.txt").unwrap());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        if !readable_anyway {
            assert_eq!(names(&found), HashSet::from(["a.txt".into(), "b.txt".into()]));
        }
    }

    #[test]
    fn files_come_before_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("sub/z.txt"));
        touch(&dir.path().join("top.txt"));

        let found = scan(dir.path(), &FileFilter::parse("*.txt").unwrap());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].file_name().unwrap(), "top.txt");
    }
}
