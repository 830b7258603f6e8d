//! On-disk store for raw timing feeds, one gzip file per game.
//!
//! The raw bytes are the only durable artifact: parsed plays are rebuilt from
//! them on every process start.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::error::AppError;

pub struct FeedStore {
    dir: PathBuf,
}

impl FeedStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, eid: &str) -> PathBuf {
        self.dir.join(format!("{eid}.xml.gz"))
    }

    pub fn contains(&self, eid: &str) -> bool {
        self.path_for(eid).is_file()
    }

    /// Load and decompress a stored feed. Any read or decode problem reads as
    /// absence; the caller falls back to fetching.
    pub fn load(&self, eid: &str) -> Option<Vec<u8>> {
        let path = self.path_for(eid);
        let compressed = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::trace!(
                    target: "playclip::feed::store",
                    "no stored feed at {}: {}",
                    path.display(),
                    err
                );
                return None;
            }
        };
        let mut raw = Vec::new();
        match GzDecoder::new(compressed.as_slice()).read_to_end(&mut raw) {
            Ok(_) => Some(raw),
            Err(err) => {
                log::warn!(
                    target: "playclip::feed::store",
                    "corrupt stored feed at {}: {}",
                    path.display(),
                    err
                );
                None
            }
        }
    }

    pub fn save(&self, eid: &str, raw: &[u8]) -> Result<(), AppError> {
        fs::create_dir_all(&self.dir)?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(raw)?;
        let compressed = encoder.finish()?;
        fs::write(self.path_for(eid), compressed)?;
        log::debug!(target: "playclip::feed::store", "stored feed for game {}", eid);
        Ok(())
    }
}

/// Read a feed file from an arbitrary path, decompressing `.gz` transparently.
pub fn read_feed_file(path: &Path) -> Result<Vec<u8>, AppError> {
    let bytes = fs::read(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        let mut raw = Vec::new();
        GzDecoder::new(bytes.as_slice()).read_to_end(&mut raw)?;
        Ok(raw)
    } else {
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FeedStore::new(dir.path().join("feeds"));
        store.save("2013090800", b"<dataset/>").expect("save");
        assert!(store.contains("2013090800"));
        assert_eq!(store.load("2013090800").unwrap(), b"<dataset/>");
    }

    #[test]
    fn missing_feed_loads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FeedStore::new(dir.path());
        assert!(store.load("2013090800").is_none());
        assert!(!store.contains("2013090800"));
    }

    #[test]
    fn corrupt_feed_loads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FeedStore::new(dir.path());
        fs::write(store.path_for("2013090800"), b"not gzip").expect("write");
        assert!(store.load("2013090800").is_none());
    }

    #[test]
    fn read_feed_file_handles_both_forms() {
        let dir = tempfile::tempdir().expect("tempdir");
        let plain = dir.path().join("game.xml");
        fs::write(&plain, b"<dataset/>").expect("write");
        assert_eq!(read_feed_file(&plain).unwrap(), b"<dataset/>");

        let store = FeedStore::new(dir.path());
        store.save("game", b"<dataset/>").expect("save");
        assert_eq!(read_feed_file(&store.path_for("game")).unwrap(), b"<dataset/>");
    }
}
