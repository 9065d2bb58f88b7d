//! The default storage backend named in §6: "a content-addressed file tree
//! under the data dir."
//!
//! Keys are hashed with `sha2::Sha256` into a two-level directory fan-out
//! (`ab/cd/<hex>`), the same scheme git and most CAS stores use — grounded
//! on `spark-core`'s own use of `sha2` for audit hashing
//! (`governance::audit::hasher`) as the precedent for "this workspace
//! already reaches for `sha2` over any other hashing crate."

use std::fs;
use std::path::{Path, PathBuf};

use ignis_registry::{RegistryError, StorageBackend};
use sha2::{Digest, Sha256};

use crate::error::SupervisorError;

pub struct FileSystemStorage {
    root: PathBuf,
}

impl FileSystemStorage {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, SupervisorError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        let hex = hex::encode(digest);
        self.root.join(&hex[0..2]).join(&hex[2..4]).join(&hex)
    }
}

impl StorageBackend for FileSystemStorage {
    fn load(&self, key: &str) -> Result<Vec<u8>, RegistryError> {
        Ok(fs::read(self.path_for(key))?)
    }

    fn store(&self, key: &str, value: &[u8]) -> Result<(), RegistryError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, value)?;
        Ok(())
    }

    fn exists(&self, key: &str) -> bool {
        self.path_for(key).is_file()
    }

    fn delete(&self, key: &str) -> Result<(), RegistryError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// A linear scan of the two-level fan-out. Storage keys in this engine
    /// are content hashes, not filenames, so there is no arbitrary
    /// `prefix` structure to index beyond walking the tree and checking
    /// each leaf's hex name.
    fn list(&self, prefix: &str) -> Result<Vec<String>, RegistryError> {
        let mut out = Vec::new();
        collect_leaves(&self.root, prefix, &mut out)?;
        Ok(out)
    }
}

fn collect_leaves(dir: &Path, prefix: &str, out: &mut Vec<String>) -> Result<(), RegistryError> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_leaves(&path, prefix, out)?;
        } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.starts_with(prefix) {
                out.push(name.to_string());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_the_content_addressed_tree() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileSystemStorage::new(dir.path()).unwrap();
        storage.store("cert/example.com", b"pem bytes").unwrap();
        assert!(storage.exists("cert/example.com"));
        assert_eq!(storage.load("cert/example.com").unwrap(), b"pem bytes");
        storage.delete("cert/example.com").unwrap();
        assert!(!storage.exists("cert/example.com"));
    }

    #[test]
    fn missing_key_load_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileSystemStorage::new(dir.path()).unwrap();
        assert!(storage.load("nope").is_err());
    }

    #[test]
    fn delete_of_absent_key_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileSystemStorage::new(dir.path()).unwrap();
        assert!(storage.delete("nope").is_ok());
    }
}
