// # File Last-Known-IP Store
//
// File-based implementation of LastIpStore.
//
// ## File Format
//
// A single line holding the IPv4 literal, e.g.
//
// ```text
// 203.0.113.5
// ```
//
// Trailing whitespace is tolerated on read.
//
// ## Crash Safety
//
// - Atomic writes: new content goes to a `.tmp` sibling, then is renamed
// - A crash mid-write leaves the previous value in place

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::Error;
use crate::traits::LastIpStore;

/// File-backed last-known-IP store
///
/// # Example
///
/// ```rust,no_run
/// use ipsync_core::state::FileLastIpStore;
/// use ipsync_core::traits::LastIpStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileLastIpStore::new("/var/lib/ipsync/last-ip.txt").await?;
///
///     store.save("203.0.113.5").await?;
///     assert_eq!(store.load().await?, Some("203.0.113.5".to_string()));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileLastIpStore {
    path: PathBuf,
}

impl FileLastIpStore {
    /// Open a file store, creating the parent directory if needed
    ///
    /// The file itself is not created until the first `save()`.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create state directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        Ok(Self { path })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }
}

#[async_trait]
impl LastIpStore for FileLastIpStore {
    async fn load(&self) -> Result<Option<String>, Error> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("Last IP file does not exist: {}", self.path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(Error::state_store(format!(
                    "Failed to read last IP file {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let ip = content.trim();
        if ip.is_empty() {
            return Ok(None);
        }

        Ok(Some(ip.to_string()))
    }

    async fn save(&self, ip: &str) -> Result<(), Error> {
        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(ip.trim().as_bytes()).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Last IP written to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_store_basic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("last-ip.txt");

        let store = FileLastIpStore::new(&path).await.unwrap();

        // Missing file is "unknown", not an error
        assert_eq!(store.load().await.unwrap(), None);

        store.save("203.0.113.5").await.unwrap();
        assert!(path.exists());

        // A fresh instance sees the persisted value
        let store2 = FileLastIpStore::new(&path).await.unwrap();
        assert_eq!(store2.load().await.unwrap(), Some("203.0.113.5".to_string()));
    }

    #[tokio::test]
    async fn test_file_store_tolerates_trailing_whitespace() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("last-ip.txt");
        fs::write(&path, b"203.0.113.5\n\n").await.unwrap();

        let store = FileLastIpStore::new(&path).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some("203.0.113.5".to_string()));
    }

    #[tokio::test]
    async fn test_file_store_empty_file_is_unknown() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("last-ip.txt");
        fs::write(&path, b"   \n").await.unwrap();

        let store = FileLastIpStore::new(&path).await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state").join("last-ip.txt");

        let store = FileLastIpStore::new(&path).await.unwrap();
        store.save("198.51.100.7").await.unwrap();

        assert!(path.parent().unwrap().is_dir());
        assert_eq!(store.load().await.unwrap(), Some("198.51.100.7".to_string()));
    }

    #[tokio::test]
    async fn test_file_store_overwrite_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("last-ip.txt");
        let store = FileLastIpStore::new(&path).await.unwrap();

        for i in 0..5 {
            store.save(&format!("203.0.113.{}", i)).await.unwrap();
        }

        assert_eq!(store.load().await.unwrap(), Some("203.0.113.4".to_string()));
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_file_store_unreadable_path_is_error() {
        let dir = tempdir().unwrap();
        // A directory at the file path cannot be read as text
        let path = dir.path().join("last-ip.txt");
        fs::create_dir(&path).await.unwrap();

        let store = FileLastIpStore::new(&path).await.unwrap();
        assert!(store.load().await.is_err());
        assert!(store.save("203.0.113.5").await.is_err());
    }
}
