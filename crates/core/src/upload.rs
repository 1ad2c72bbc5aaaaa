//! Upload selection rules: the 3-file cap, image-only filter and size limit.
//!
//! [`UploadManager`] decides which local files may be sent to
//! `POST /api/upload` and tracks the ones the service accepted. It does no
//! I/O of its own; the session uploads the selected files and registers
//! each one after the service confirms it.

use std::path::{Path, PathBuf};

use crate::error::CoreError;
use crate::types::FileId;

/// Maximum number of reference images per session.
pub const MAX_UPLOADS: usize = 3;

/// Default per-file size limit (5 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// A local file proposed for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub path: PathBuf,
    /// Display name (the file name component of `path`).
    pub name: String,
    /// MIME type guessed from the extension.
    pub mime: String,
    pub size: u64,
}

impl CandidateFile {
    /// Describe a file without touching the filesystem.
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            path,
            name,
            mime,
            size,
        }
    }

    /// Describe a file on disk, reading its size from metadata.
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let size = std::fs::metadata(path)?.len();
        Ok(Self::new(path, size))
    }

    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }
}

/// A file the service accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub id: FileId,
    pub name: String,
    /// Local source path, used as the preview handle.
    pub preview: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Maximum {max} files allowed")]
    LimitReached { max: usize },

    #[error("File \"{name}\" is too large. Maximum size is {limit_mb}MB.")]
    TooLarge {
        name: String,
        size: u64,
        limit_mb: u64,
    },

    #[error("Failed to upload file \"{name}\": {reason}")]
    Failed { name: String, reason: String },
}

/// Outcome of [`UploadManager::select`].
#[derive(Debug, Default)]
pub struct Selection {
    /// Files to upload, in the order given.
    pub accepted: Vec<CandidateFile>,
    /// Candidates dropped because the batch exceeded the free slots.
    pub over_limit: usize,
    /// Candidates silently dropped for not being images.
    pub skipped_non_image: usize,
    /// Candidates refused with a user-facing reason.
    pub rejected: Vec<UploadError>,
}

/// Session-local set of accepted uploads.
#[derive(Debug)]
pub struct UploadManager {
    files: Vec<UploadedFile>,
    max_files: usize,
    max_bytes: u64,
}

impl Default for UploadManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UPLOAD_BYTES)
    }
}

impl UploadManager {
    pub fn new(max_bytes: u64) -> Self {
        Self::with_limits(MAX_UPLOADS, max_bytes)
    }

    pub fn with_limits(max_files: usize, max_bytes: u64) -> Self {
        Self {
            files: Vec::new(),
            max_files,
            max_bytes,
        }
    }

    pub fn max_files(&self) -> usize {
        self.max_files
    }

    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.files.len() >= self.max_files
    }

    pub fn remaining_slots(&self) -> usize {
        self.max_files.saturating_sub(self.files.len())
    }

    /// The file used as the generation source (the first accepted one).
    pub fn source_file(&self) -> Option<&UploadedFile> {
        self.files.first()
    }

    /// Pick which of `batch` may be uploaded.
    ///
    /// The batch is truncated to the free slots before filtering, so a
    /// non-image in the first slots still consumes one.
    pub fn select(&self, batch: Vec<CandidateFile>) -> Result<Selection, UploadError> {
        if self.is_full() {
            return Err(UploadError::LimitReached {
                max: self.max_files,
            });
        }

        let slots = self.remaining_slots();
        let mut selection = Selection {
            over_limit: batch.len().saturating_sub(slots),
            ..Default::default()
        };

        for candidate in batch.into_iter().take(slots) {
            if !candidate.is_image() {
                selection.skipped_non_image += 1;
                continue;
            }
            if candidate.size > self.max_bytes {
                selection.rejected.push(UploadError::TooLarge {
                    limit_mb: (self.max_bytes as f64 / BYTES_PER_MB).ceil() as u64,
                    name: candidate.name,
                    size: candidate.size,
                });
                continue;
            }
            selection.accepted.push(candidate);
        }

        Ok(selection)
    }

    /// Record a file the service accepted.
    pub fn register(&mut self, file: UploadedFile) -> Result<(), UploadError> {
        if self.is_full() {
            return Err(UploadError::LimitReached {
                max: self.max_files,
            });
        }
        self.files.push(file);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<UploadedFile, CoreError> {
        if index >= self.files.len() {
            return Err(CoreError::NotFound {
                entity: "uploaded file",
                index,
            });
        }
        Ok(self.files.remove(index))
    }
}
