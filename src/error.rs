//! Error type for the img2doc service.
//!
//! Every failure in the upload → convert → store pipeline is a
//! [`ConverterError`]. Handlers return `Result<Response, ConverterError>`, and
//! the [`IntoResponse`] impl is the single place where an error becomes an
//! HTTP status. Internal detail (paths, decoder messages, I/O errors) is
//! logged server-side and never written into the response body.

use crate::store::Namespace;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the img2doc library.
#[derive(Debug, Error)]
pub enum ConverterError {
    // ── Client errors ─────────────────────────────────────────────────────
    /// A conversion request carried zero files in the `images` field.
    #[error("No file")]
    NoFilesProvided,

    /// No artifact exists for this namespace/identifier pair.
    #[error("{namespace} artifact '{id}' not found")]
    IdentifierNotFound { namespace: Namespace, id: String },

    /// The multipart body could not be parsed (truncated, bad boundary,
    /// over the body limit).
    #[error("Malformed upload: {detail}")]
    MalformedUpload { status: StatusCode, detail: String },

    // ── Conversion failures ───────────────────────────────────────────────
    /// An input could not be decoded as a raster image.
    #[error("Cannot decode image '{path}': {detail}")]
    UndecodableImage { path: PathBuf, detail: String },

    /// lopdf rejected the document while building or serialising it.
    #[error("PDF assembly failed: {0}")]
    PdfAssembly(String),

    /// The zip writer failed while adding or finalising entries.
    #[error("ZIP assembly failed: {0}")]
    ZipAssembly(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write a staged upload or an artifact.
    #[error("Failed to write '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not read a staged upload or an artifact.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (e.g. a blocking task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConverterError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ConverterError::NoFilesProvided => StatusCode::BAD_REQUEST,
            ConverterError::IdentifierNotFound { .. } => StatusCode::NOT_FOUND,
            ConverterError::MalformedUpload { status, .. } => *status,
            ConverterError::UndecodableImage { .. }
            | ConverterError::PdfAssembly(_)
            | ConverterError::ZipAssembly(_)
            | ConverterError::WriteFailed { .. }
            | ConverterError::ReadFailed { .. }
            | ConverterError::InvalidConfig(_)
            | ConverterError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for the generic "conversion failed" class that maps to 500.
    pub fn is_conversion_failure(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Plain-text body sent to the client. Never includes internal detail.
    pub fn user_message(&self) -> &'static str {
        match self {
            ConverterError::NoFilesProvided => "No file",
            ConverterError::IdentifierNotFound { .. } => "File not found",
            ConverterError::MalformedUpload { status, .. } => {
                status.canonical_reason().unwrap_or("Bad Request")
            }
            _ => "Internal Server Error",
        }
    }
}

impl IntoResponse for ConverterError {
    fn into_response(self) -> Response {
        if self.is_conversion_failure() {
            tracing::error!("Conversion request failed: {:#}", self);
        } else {
            tracing::debug!("Client error: {}", self);
        }

        (self.status_code(), self.user_message()).into_response()
    }
}
