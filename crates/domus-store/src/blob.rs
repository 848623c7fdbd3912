//! Blob storage for uploaded document bytes.
//!
//! Documents only keep an opaque storage pointer; the bytes live behind a
//! [`BlobStore`]. The filesystem implementation names each blob after a
//! content hash prefix plus a sanitized copy of the upload's filename.

use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use domus_core::{Error, Result};

pub trait BlobStore: Send + Sync {
    /// Store `bytes` and return the pointer to record on the document.
    fn put(&self, filename: &str, bytes: &[u8]) -> Result<String>;

    /// Load the bytes behind a pointer previously returned by `put`.
    fn get(&self, pointer: &str) -> Result<Vec<u8>>;
}

/// Blobs as flat files under one directory.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| Error::Storage(e.to_string()))?;
        Ok(Self { root })
    }

    fn resolve(&self, pointer: &str) -> Result<PathBuf> {
        if pointer.is_empty()
            || pointer.contains('/')
            || pointer.contains('\\')
            || pointer.contains("..")
        {
            return Err(Error::Validation(format!("invalid storage pointer: {}", pointer)));
        }
        Ok(self.root.join(pointer))
    }

    /// Write through a temp file in the same directory, then rename into
    /// place, so a blob is either absent or complete.
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let mut tmp = tempfile::Builder::new()
            .prefix(".blob-")
            .tempfile_in(&self.root)
            .map_err(|e| Error::Storage(e.to_string()))?;
        tmp.write_all(bytes)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| Error::Storage(e.to_string()))?;
        tmp.persist(path)
            .map_err(|e| Error::Storage(e.error.to_string()))?;
        Ok(())
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, filename: &str, bytes: &[u8]) -> Result<String> {
        let digest = hex::encode(Sha256::digest(bytes));
        let pointer = format!("{}_{}", &digest[..16], sanitize_filename(filename));
        let path = self.resolve(&pointer)?;

        let intact = std::fs::metadata(&path)
            .map(|meta| meta.len() == bytes.len() as u64)
            .unwrap_or(false);
        if !intact {
            self.write_atomic(&path, bytes)?;
        }
        debug!(pointer = %pointer, size = bytes.len(), "blob stored");
        Ok(pointer)
    }

    fn get(&self, pointer: &str) -> Result<Vec<u8>> {
        let path = self.resolve(pointer)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("blob {}", pointer)))
            }
            Err(e) => Err(Error::Storage(e.to_string())),
        }
    }
}

/// Keep ASCII alphanumerics, `.`, `-` and `_`; everything else becomes `_`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(&['/', '\\'][..]).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').replace("..", "_");
    if cleaned.is_empty() {
        "upload.bin".to_string()
    } else {
        cleaned.chars().take(100).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_put_and_get() {
        let dir = TempDir::new().unwrap();
        let blobs = FsBlobStore::new(dir.path()).unwrap();
        let pointer = blobs.put("LLC1 search.pdf", b"%PDF-1.4 body").unwrap();
        assert!(pointer.ends_with("_LLC1_search.pdf"));
        assert_eq!(blobs.get(&pointer).unwrap(), b"%PDF-1.4 body");
    }

    #[test]
    fn test_same_bytes_same_pointer() {
        let dir = TempDir::new().unwrap();
        let blobs = FsBlobStore::new(dir.path()).unwrap();
        let a = blobs.put("a.pdf", b"same").unwrap();
        let b = blobs.put("a.pdf", b"same").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_put_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let blobs = FsBlobStore::new(dir.path()).unwrap();
        blobs.put("a.pdf", b"%PDF-1.4 one").unwrap();
        blobs.put("b.pdf", b"%PDF-1.4 two").unwrap();

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| !n.starts_with(".blob-")));
    }

    #[test]
    fn test_truncated_blob_is_rewritten() {
        let dir = TempDir::new().unwrap();
        let blobs = FsBlobStore::new(dir.path()).unwrap();
        let pointer = blobs.put("c.pdf", b"%PDF-1.4 complete body").unwrap();

        // Simulate a torn write left by an older process.
        std::fs::write(dir.path().join(&pointer), b"%PDF").unwrap();
        assert_eq!(blobs.put("c.pdf", b"%PDF-1.4 complete body").unwrap(), pointer);
        assert_eq!(blobs.get(&pointer).unwrap(), b"%PDF-1.4 complete body");
    }

    #[test]
    fn test_rejects_traversal_and_missing() {
        let dir = TempDir::new().unwrap();
        let blobs = FsBlobStore::new(dir.path()).unwrap();
        assert!(matches!(blobs.get("../etc/passwd"), Err(Error::Validation(_))));
        assert!(matches!(blobs.get("deadbeef_x.pdf"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../evil.pdf"), "evil.pdf");
        assert_eq!(sanitize_filename("C:\\docs\\con 29.pdf"), "con_29.pdf");
        assert_eq!(sanitize_filename(""), "upload.bin");
        assert_eq!(sanitize_filename("..."), "upload.bin");
    }
}
