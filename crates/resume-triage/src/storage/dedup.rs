//! Content-hash cache that keeps approved attachments from being processed
//! again in later runs.
//!
//! The cache is a JSON array of lowercase SHA-256 hex digests. It is loaded
//! once when a run starts and rewritten after every approval through a
//! temp file plus rename, so a crash can lose at most the approval that was
//! being recorded, and never leaves a truncated file behind.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info};
use sha2::{Digest, Sha256};

use crate::error::StorageError;

/// Lowercase hex SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[derive(Debug)]
pub struct DedupCache {
    path: PathBuf,
    hashes: BTreeSet<String>,
    dirty: bool,
}

impl DedupCache {
    /// Loads the cache, starting empty when the file does not exist yet.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        let hashes = match std::fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => BTreeSet::new(),
            Ok(bytes) => {
                let list: Vec<String> =
                    serde_json::from_slice(&bytes).map_err(|e| StorageError::CorruptCache {
                        path: path.clone(),
                        source: e,
                    })?;
                list.into_iter().map(|h| h.to_ascii_lowercase()).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeSet::new(),
            Err(e) => return Err(StorageError::ReadFile { path, source: e }),
        };

        info!("Loaded {} known attachment hashes", hashes.len());
        Ok(Self {
            path,
            hashes,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.hashes.contains(&hash.to_ascii_lowercase())
    }

    /// Returns `false` when the hash was already present.
    pub fn add(&mut self, hash: &str) -> bool {
        let inserted = self.hashes.insert(hash.to_ascii_lowercase());
        self.dirty |= inserted;
        inserted
    }

    /// Writes the cache if it changed since the last write.
    pub fn persist(&mut self) -> Result<(), StorageError> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let json = serde_json::to_vec_pretty(&self.hashes).map_err(|e| StorageError::Serialize {
            path: self.path.clone(),
            source: e,
        })?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "hashes.json".to_string());
        let tmp = self
            .path
            .with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

        let written = std::fs::File::create(&tmp)
            .and_then(|mut f| f.write_all(&json).and_then(|_| f.sync_all()));
        if let Err(e) = written {
            let _ = std::fs::remove_file(&tmp);
            return Err(StorageError::WriteFile {
                path: tmp,
                source: e,
            });
        }

        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(StorageError::MoveFile {
                from: tmp,
                to: self.path.clone(),
                source: e,
            });
        }

        debug!("Persisted {} hashes", self.hashes.len());
        self.dirty = false;
        Ok(())
    }
}
