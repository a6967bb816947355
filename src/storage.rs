//! Binary storage for uploaded files.
//!
//! The tree only records a [`BlobRef`]; the bytes live with a [`BlobStore`].

use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{new_id, BlobRef};

pub trait BlobStore {
    /// Stores `bytes` under a fresh unique location derived from `name`.
    fn put(&self, name: &str, bytes: &[u8]) -> Result<BlobRef>;

    /// Removing a blob that is already gone is not an error.
    fn delete(&self, blob: &BlobRef) -> Result<()>;

    /// Streams the stored bytes into `out`, returning how many were copied.
    fn copy_to(&self, blob: &BlobRef, out: &mut dyn Write) -> Result<u64>;
}

#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, storage_path: &str) -> Result<PathBuf> {
        let relative = Path::new(storage_path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(Error::validation(format!("Invalid storage path: {storage_path}")));
        }
        Ok(self.root.join(relative))
    }
}

impl BlobStore for LocalBlobStore {
    fn put(&self, name: &str, bytes: &[u8]) -> Result<BlobRef> {
        let storage_path = format!("{}-{}", new_id(), sanitize(name));
        let full_path = self.resolve(&storage_path)?;
        fs::write(&full_path, bytes)?;

        debug!(path = %storage_path, bytes = bytes.len(), "Wrote blob");
        Ok(BlobRef {
            storage_path,
            size: bytes.len() as u64,
            media_type: mime_guess::from_path(name)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        })
    }

    fn delete(&self, blob: &BlobRef) -> Result<()> {
        let full_path = self.resolve(&blob.storage_path)?;
        match fs::remove_file(&full_path) {
            Ok(()) => {
                debug!(path = %blob.storage_path, "Deleted blob");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn copy_to(&self, blob: &BlobRef, out: &mut dyn Write) -> Result<u64> {
        let full_path = self.resolve(&blob.storage_path)?;
        let mut file = fs::File::open(&full_path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                Error::not_found(format!("Stored file '{}'", blob.storage_path))
            } else {
                e.into()
            }
        })?;
        Ok(io::copy(&mut file, out)?)
    }
}

// Keeps only the final name component, with separators and oddities replaced
fn sanitize(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, LocalBlobStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path().join("blobs")).unwrap();
        (dir, store)
    }

    #[test]
    fn put_then_copy_back() {
        let (_dir, store) = store();
        let blob = store.put("notes.pdf", b"%PDF-1.4 hello").unwrap();
        assert_eq!(blob.size, 14);
        assert_eq!(blob.media_type, "application/pdf");
        assert!(blob.storage_path.ends_with("-notes.pdf"));

        let mut out = Vec::new();
        let copied = store.copy_to(&blob, &mut out).unwrap();
        assert_eq!(copied, 14);
        assert_eq!(out, b"%PDF-1.4 hello");
    }

    #[test]
    fn same_name_gets_distinct_locations() {
        let (_dir, store) = store();
        let a = store.put("a.txt", b"one").unwrap();
        let b = store.put("a.txt", b"two").unwrap();
        assert_ne!(a.storage_path, b.storage_path);
    }

    #[test]
    fn unknown_extension_is_octet_stream() {
        let (_dir, store) = store();
        let blob = store.put("data.zzqq", b"x").unwrap();
        assert_eq!(blob.media_type, "application/octet-stream");
    }

    #[test]
    fn delete_is_idempotent() {
        let (_dir, store) = store();
        let blob = store.put("a.txt", b"x").unwrap();
        store.delete(&blob).unwrap();
        store.delete(&blob).unwrap();

        let mut out = Vec::new();
        let err = store.copy_to(&blob, &mut out).unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn traversal_is_rejected() {
        let (_dir, store) = store();
        let evil = BlobRef {
            storage_path: "../outside.txt".into(),
            size: 0,
            media_type: "text/plain".into(),
        };
        assert_eq!(store.delete(&evil).unwrap_err().kind(), "validation");
    }

    #[test]
    fn uploaded_name_is_flattened() {
        assert_eq!(sanitize("../../etc/passwd"), "passwd");
        assert_eq!(sanitize("my notes (1).txt"), "my_notes__1_.txt");
        assert_eq!(sanitize(".."), "upload");
    }
}
