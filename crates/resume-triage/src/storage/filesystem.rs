use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::error::StorageError;

const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Writes approved attachments under `<root>/<job-slug>/<YYYY-MM-DD>/`.
///
/// Rejected attachments never touch the disk, so there is nothing to clean
/// up for them.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn approved_directory(&self, job_slug: &str, date: NaiveDate) -> PathBuf {
        self.root
            .join(job_slug)
            .join(date.format("%Y-%m-%d").to_string())
    }

    /// Stores `content` as `filename` (already sanitized). An existing file
    /// is never overwritten: `cv.pdf`, `cv_2.pdf`, `cv_3.pdf`, ...
    pub fn store_approved(
        &self,
        job_slug: &str,
        date: NaiveDate,
        filename: &str,
        content: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let dir = self.approved_directory(job_slug, date);
        ensure_directory(&dir)?;
        create_exclusive(&dir, filename, content)
    }
}

fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
        path: path.to_path_buf(),
        source: e,
    })
}

fn numbered(filename: &str, counter: u32) -> String {
    if counter == 1 {
        return filename.to_string();
    }
    match filename.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() => format!("{}_{}.{}", base, counter, ext),
        _ => format!("{}_{}", filename, counter),
    }
}

/// `create_new` makes the existence check and the creation one step.
fn create_exclusive(dir: &Path, filename: &str, content: &[u8]) -> Result<PathBuf, StorageError> {
    for counter in 1..=MAX_NAME_ATTEMPTS {
        let path = dir.join(numbered(filename, counter));

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                if let Err(e) = file.write_all(content).and_then(|_| file.sync_all()) {
                    drop(file);
                    let _ = std::fs::remove_file(&path);
                    return Err(StorageError::WriteFile { path, source: e });
                }
                return Ok(path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(StorageError::WriteFile { path, source: e }),
        }
    }

    Err(StorageError::FileExists(dir.join(filename)))
}
