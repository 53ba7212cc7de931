//! Filesystem blob store for full page documents
//!
//! A key such as `pages/https%3A%2F%2Fex.com%2Fa` maps to
//! `<root>/pages/https%3A%2F%2Fex.com%2Fa.json`. File names longer than most
//! filesystems accept are replaced by the SHA-256 of the whole key, so every
//! key still maps to exactly one file.

use crate::storage::traits::{BlobStore, StorageError, StorageResult};
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Namespace of page document keys
pub const PAGE_KEY_PREFIX: &str = "pages/";

/// Longest file name (in bytes) written as-is
const MAX_FILE_NAME_BYTES: usize = 200;

/// Characters `encodeURIComponent` leaves untouched besides alphanumerics
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Derives the blob key of a page document
///
/// The URL is encoded like JavaScript's `encodeURIComponent`, so the key
/// contains no further `/` and re-crawling a URL always yields the same key.
///
/// # Examples
///
/// ```
/// use sitemap_harvester::storage::blob_key_for_url;
///
/// assert_eq!(
///     blob_key_for_url("https://ex.com/a?b=1"),
///     "pages/https%3A%2F%2Fex.com%2Fa%3Fb%3D1"
/// );
/// ```
pub fn blob_key_for_url(url: &str) -> String {
    format!("{}{}", PAGE_KEY_PREFIX, utf8_percent_encode(url, URI_COMPONENT))
}

/// [`BlobStore`] writing one JSON file per key under a root directory
#[derive(Debug)]
pub struct FsBlobStore {
    root: PathBuf,
    temp_counter: AtomicU64,
}

impl FsBlobStore {
    /// Opens the store, creating the root directory if needed
    pub fn open(root: &Path) -> StorageResult<Self> {
        std::fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            temp_counter: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a key to its file path
    ///
    /// Keys are `/`-separated; empty, `.` and `..` segments are rejected so no
    /// key can escape the root directory.
    pub fn path_for_key(&self, key: &str) -> StorageResult<PathBuf> {
        let segments: Vec<&str> = key.split('/').collect();

        if segments
            .iter()
            .any(|s| s.is_empty() || *s == "." || *s == ".." || s.contains('\\'))
        {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        let (file, dirs) = match segments.split_last() {
            Some(parts) => parts,
            None => return Err(StorageError::InvalidKey(key.to_string())),
        };

        let mut path = self.root.clone();
        for dir in dirs {
            path.push(dir);
        }

        let file_name = format!("{}.json", file);
        if file_name.len() > MAX_FILE_NAME_BYTES {
            let digest = hex::encode(Sha256::digest(key.as_bytes()));
            path.push(format!("{}.json", digest));
        } else {
            path.push(file_name);
        }

        Ok(path)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, value: &serde_json::Value) -> StorageResult<()> {
        let path = self.path_for_key(key)?;
        let bytes = serde_json::to_vec_pretty(value)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write then rename so readers never observe a partial document
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        let temp = path.with_extension(format!("json.{}.{}.tmp", std::process::id(), n));

        if let Err(e) = tokio::fs::write(&temp, &bytes).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }

        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Option<serde_json::Value>> {
        let path = self.path_for_key(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
