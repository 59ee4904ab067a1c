//! Upload staging: persist multipart file parts under sanitised names.
//!
//! Parts are streamed chunk by chunk to the uploads directory, so memory use
//! does not grow with upload size. Only parts in the `images` field that
//! carry a filename count as files; every other field is skipped.
//!
//! Staged files are never overwritten. If the sanitised name is already
//! taken (same base name within the same millisecond), a numeric suffix is
//! added before the extension. Staged files are not cleaned up afterwards.

use crate::error::ConverterError;
use crate::pipeline::sanitize::{sanitize, split_name};
use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Multipart field that carries the files to convert.
pub const FILES_FIELD: &str = "images";

/// One uploaded file after it has been written to the staging directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// Filename as sent by the client.
    pub original_name: String,
    /// Where the bytes now live.
    pub staged_path: PathBuf,
    /// Content type declared on the part, if any.
    pub mime_hint: Option<String>,
}

/// Writes uploads into one staging directory.
#[derive(Debug, Clone)]
pub struct UploadStager {
    dir: PathBuf,
}

impl UploadStager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stage every file part of the `images` field, in request order.
    ///
    /// # Errors
    /// - [`ConverterError::NoFilesProvided`] if the request has no file parts
    /// - [`ConverterError::MalformedUpload`] if the body cannot be parsed
    /// - [`ConverterError::WriteFailed`] on disk errors
    pub async fn stage_multipart(
        &self,
        multipart: &mut Multipart,
    ) -> Result<Vec<StagedFile>, ConverterError> {
        let mut staged = Vec::new();

        while let Some(mut field) = multipart.next_field().await.map_err(malformed)? {
            if field.name() != Some(FILES_FIELD) {
                debug!("Skipping multipart field {:?}", field.name());
                continue;
            }
            let Some(original_name) = field
                .file_name()
                .filter(|name| !name.is_empty())
                .map(str::to_string)
            else {
                debug!("Skipping '{}' part without a filename", FILES_FIELD);
                continue;
            };
            let mime_hint = field.content_type().map(str::to_string);

            let (mut file, staged_path) = self.create_unique(&original_name).await?;
            let write_failed = |source| ConverterError::WriteFailed {
                path: staged_path.clone(),
                source,
            };

            let mut size = 0usize;
            while let Some(chunk) = field.chunk().await.map_err(malformed)? {
                file.write_all(&chunk).await.map_err(write_failed)?;
                size += chunk.len();
            }
            file.flush().await.map_err(write_failed)?;

            debug!(
                "Staged '{}' → {} ({} bytes)",
                original_name,
                staged_path.display(),
                size
            );
            staged.push(StagedFile {
                original_name,
                staged_path,
                mime_hint,
            });
        }

        if staged.is_empty() {
            return Err(ConverterError::NoFilesProvided);
        }

        info!("Staged {} files in {}", staged.len(), self.dir.display());
        Ok(staged)
    }

    /// Stage one in-memory file.
    #[cfg(test)]
    async fn stage_bytes(
        &self,
        original_name: &str,
        mime_hint: Option<String>,
        bytes: &[u8],
    ) -> Result<StagedFile, ConverterError> {
        let (mut file, staged_path) = self.create_unique(original_name).await?;

        let written = async {
            file.write_all(bytes).await?;
            file.flush().await
        }
        .await;
        written.map_err(|source| ConverterError::WriteFailed {
            path: staged_path.clone(),
            source,
        })?;

        Ok(StagedFile {
            original_name: original_name.to_string(),
            staged_path,
            mime_hint,
        })
    }

    /// Create a new file for `original_name`, never reusing an existing path.
    async fn create_unique(&self, original_name: &str) -> Result<(File, PathBuf), ConverterError> {
        let name = sanitize(original_name);
        let (base, ext) = split_name(&name);

        let mut attempt = 0usize;
        loop {
            let candidate = if attempt == 0 {
                name.clone()
            } else {
                format!("{base}-{attempt}{ext}")
            };
            let path = self.dir.join(candidate);

            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((file, path)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(ConverterError::WriteFailed { path, source: e }),
            }
        }
    }
}

fn malformed(e: MultipartError) -> ConverterError {
    ConverterError::MalformedUpload {
        status: e.status(),
        detail: e.body_text(),
    }
}
