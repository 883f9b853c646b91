//! Filesystem traversal for library scans.
//!
//! Visits every regular file under a root, skipping directories that
//! cannot be read.

use std::fs;
use std::path::Path;

/// Walk every regular file under `root`, invoking `on_file` for each.
///
/// The callback aborts the remaining traversal by returning an error,
/// which is handed back to the caller unchanged; the scan engine uses
/// this for cooperative cancellation. Unreadable directories are skipped.
/// Enumeration order is unspecified.
pub fn walk_files<E>(
    root: &Path,
    mut on_file: impl FnMut(&Path) -> Result<(), E>,
) -> Result<(), E> {
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::debug!(dir = %dir.display(), error = %err, "skipping unreadable directory");
                continue;
            }
        };

        for entry in entries {
            let Ok(entry) = entry else { continue };
            let Ok(file_type) = entry.file_type() else { continue };
            if file_type.is_dir() {
                stack.push(entry.path());
            } else if file_type.is_file() {
                on_file(&entry.path())?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn temp_root(tag: &str) -> std::path::PathBuf {
        let root = std::env::temp_dir().join(format!(
            "nostalgia-walker-{tag}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&root).expect("create temp dir");
        root
    }

    #[test]
    fn visits_every_file_in_nested_tree() {
        let root = temp_root("nested");
        std::fs::create_dir_all(root.join("a/b")).unwrap();
        std::fs::write(root.join("one.flac"), b"x").unwrap();
        std::fs::write(root.join("a/two.txt"), b"x").unwrap();
        std::fs::write(root.join("a/b/three.flac"), b"x").unwrap();

        let mut seen = HashSet::new();
        walk_files::<()>(&root, |path| {
            seen.insert(path.file_name().unwrap().to_string_lossy().to_string());
            Ok(())
        })
        .unwrap();

        let expected: HashSet<String> = ["one.flac", "two.txt", "three.flac"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn callback_error_aborts_traversal() {
        let root = temp_root("abort");
        for i in 0..10 {
            std::fs::write(root.join(format!("{i}.flac")), b"x").unwrap();
        }

        let mut visited = 0usize;
        let result = walk_files(&root, |_path| {
            visited += 1;
            if visited == 3 { Err("cancelled") } else { Ok(()) }
        });

        assert_eq!(result, Err("cancelled"));
        assert_eq!(visited, 3);
    }

    #[test]
    fn missing_root_is_not_an_error() {
        let root = temp_root("missing").join("does-not-exist");
        let mut visited = 0usize;
        walk_files::<()>(&root, |_path| {
            visited += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(visited, 0);
    }
}
