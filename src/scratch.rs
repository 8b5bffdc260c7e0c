//! Transient audio files
//!
//! Uploads live only until they are transcribed. Generated replies live until
//! the next reply is written; every file gets a UUID name so concurrent turns
//! never collide.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::{Error, Result};

/// Extension of uploaded recordings
pub const UPLOAD_EXTENSION: &str = "wav";

/// Extension of generated replies
pub const OUTPUT_EXTENSION: &str = "mp3";

/// Which scratch area a file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Upload,
    Output,
}

/// Scratch areas for uploaded and generated audio
#[derive(Debug, Clone)]
pub struct ScratchFiles {
    uploads_dir: PathBuf,
    outputs_dir: PathBuf,
}

impl ScratchFiles {
    /// Create scratch areas rooted at the given directories. Directories are
    /// created lazily on first write.
    pub fn new(uploads_dir: impl Into<PathBuf>, outputs_dir: impl Into<PathBuf>) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
            outputs_dir: outputs_dir.into(),
        }
    }

    #[must_use]
    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    #[must_use]
    pub fn outputs_dir(&self) -> &Path {
        &self.outputs_dir
    }

    /// Fresh collision-free file name for `kind`
    #[must_use]
    pub fn unique_name(kind: FileKind) -> String {
        let extension = match kind {
            FileKind::Upload => UPLOAD_EXTENSION,
            FileKind::Output => OUTPUT_EXTENSION,
        };
        format!("{}.{extension}", Uuid::new_v4())
    }

    /// Write an uploaded recording, returning its path
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileIo`] if the uploads area cannot be created or written
    pub async fn save_upload(&self, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.uploads_dir.join(Self::unique_name(FileKind::Upload));
        write_creating_dir(&self.uploads_dir, &path, bytes).await?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "saved upload");
        Ok(path)
    }

    /// Write a generated reply, returning its path
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileIo`] if the outputs area cannot be created or written
    pub async fn save_output(&self, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.outputs_dir.join(Self::unique_name(FileKind::Output));
        write_creating_dir(&self.outputs_dir, &path, bytes).await?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "saved output");
        Ok(path)
    }

    /// Remove a file. Failures are logged, never returned.
    pub async fn delete(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), error = %e, "failed to delete scratch file");
        }
    }

    /// Remove every generated reply from the outputs area, returning how many
    /// were deleted. Files with other extensions are left alone.
    pub async fn purge_outputs(&self) -> usize {
        let mut entries = match tokio::fs::read_dir(&self.outputs_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
            Err(e) => {
                tracing::warn!(
                    dir = %self.outputs_dir.display(),
                    error = %e,
                    "failed to list outputs"
                );
                return 0;
            }
        };

        let mut removed = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read outputs entry");
                    break;
                }
            };

            let path = entry.path();
            let is_output = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(OUTPUT_EXTENSION));
            if !is_output {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to purge output");
                }
            }
        }

        if removed > 0 {
            tracing::debug!(removed, "purged previous outputs");
        }
        removed
    }

    /// Map an opaque output file name back to its path
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for names that could escape the outputs
    /// area and [`Error::NotFound`] when no such output exists
    pub async fn resolve_output(&self, name: &str) -> Result<PathBuf> {
        let path = Path::new(name);
        let plain = !name.is_empty()
            && path.file_name().is_some_and(|f| f == name)
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(OUTPUT_EXTENSION));
        if !plain {
            return Err(Error::InvalidInput(format!("invalid audio file name: {name}")));
        }

        let full = self.outputs_dir.join(name);
        match tokio::fs::metadata(&full).await {
            Ok(meta) if meta.is_file() => Ok(full),
            Ok(_) => Err(Error::NotFound(name.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(name.to_string()))
            }
            Err(e) => Err(Error::file_io(full, e)),
        }
    }

    /// Read a generated reply by its opaque name
    ///
    /// # Errors
    ///
    /// Same as [`Self::resolve_output`], plus [`Error::FileIo`] on read failure
    pub async fn read_output(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.resolve_output(name).await?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| Error::file_io(path, e))
    }
}

async fn write_creating_dir(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Error::file_io(dir, e))?;
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| Error::file_io(path, e))
}
