//! Cover art extraction storage.
//!
//! Covers are content-addressed by a stable hash of the source audio
//! file's path, so a re-scan recognizes an already extracted cover
//! without rewriting it.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// On-disk store for extracted cover images.
#[derive(Clone, Debug)]
pub struct CoverStore {
    dir: PathBuf,
}

impl CoverStore {
    /// Create the store, ensuring the backing directory exists.
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create covers dir {:?}", dir))?;
        Ok(Self { dir })
    }

    /// Store an extracted cover for the given source audio file.
    ///
    /// Returns the public reference path (`/covers/<name>`). The write is
    /// skipped when the addressed file already exists.
    pub fn store_for_source(
        &self,
        source_path: &Path,
        mime_type: &str,
        data: &[u8],
    ) -> Result<String> {
        let ext = extension_for_mime(mime_type);
        let filename = format!("{:016x}.{}", hash_path(source_path), ext);
        let full = self.dir.join(&filename);
        if !full.exists() {
            std::fs::write(&full, data)
                .with_context(|| format!("write cover art {:?}", full))?;
        }
        Ok(format!("/covers/{filename}"))
    }

    /// Directory backing the store, for static file serving.
    pub fn dir(&self) -> &Path {
        self.dir.as_path()
    }
}

fn extension_for_mime(mime: &str) -> &'static str {
    let lower = mime.to_ascii_lowercase();
    if lower.contains("png") {
        "png"
    } else if lower.contains("webp") {
        "webp"
    } else {
        "jpg"
    }
}

fn hash_path(path: &Path) -> u64 {
    // DefaultHasher::new() uses fixed keys, so names are stable across runs.
    let mut hasher = DefaultHasher::new();
    path.to_string_lossy().as_bytes().hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(tag: &str) -> CoverStore {
        let dir = std::env::temp_dir().join(format!(
            "nostalgia-covers-{tag}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        CoverStore::new(dir).expect("create cover store")
    }

    #[test]
    fn stores_and_addresses_by_source_path() {
        let store = temp_store("store");
        let source = Path::new("/music/artist/album/track.flac");

        let url = store
            .store_for_source(source, "image/jpeg", b"jpeg-bytes")
            .unwrap();
        assert!(url.starts_with("/covers/"));
        assert!(url.ends_with(".jpg"));

        let name = url.strip_prefix("/covers/").unwrap();
        assert_eq!(std::fs::read(store.dir().join(name)).unwrap(), b"jpeg-bytes");
    }

    #[test]
    fn repeat_store_keeps_first_write() {
        let store = temp_store("repeat");
        let source = Path::new("/music/track.flac");

        let first = store
            .store_for_source(source, "image/png", b"original")
            .unwrap();
        let second = store
            .store_for_source(source, "image/png", b"replacement")
            .unwrap();

        assert_eq!(first, second);
        let name = first.strip_prefix("/covers/").unwrap();
        assert_eq!(std::fs::read(store.dir().join(name)).unwrap(), b"original");
    }

    #[test]
    fn mime_picks_extension_with_jpg_fallback() {
        assert_eq!(extension_for_mime("image/png"), "png");
        assert_eq!(extension_for_mime("image/webp"), "webp");
        assert_eq!(extension_for_mime("image/jpeg"), "jpg");
        assert_eq!(extension_for_mime("application/octet-stream"), "jpg");
    }
}
