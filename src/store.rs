//! Artifact store: short random identifiers → generated files on disk.
//!
//! Each [`Namespace`] owns one output directory. An artifact lives at
//! `{dir}/{id}.{ext}` and is never modified after creation. Identifiers are
//! eight characters of `[0-9a-z]`; they are short for URL brevity, not
//! unique by construction. Minting re-draws when the candidate is already on
//! disk, which narrows but does not close the race between two concurrent
//! requests drawing the same identifier.
//!
//! There is no delete, expiry, or quota: the directories grow without bound.

use crate::error::ConverterError;
use rand::prelude::RngExt;
use rand::rng;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Identifier length in characters.
pub const ID_LEN: usize = 8;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Re-draws attempted before accepting a colliding identifier.
const MAX_MINT_ATTEMPTS: usize = 16;

/// The two artifact kinds, each with its own directory and URL segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Pdf,
    Zip,
}

impl Namespace {
    /// URL path segment and directory name.
    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Pdf => "pdf",
            Namespace::Zip => "zip",
        }
    }

    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        self.as_str()
    }

    /// Content type inferred from the extension.
    pub fn content_type(self) -> mime_guess::Mime {
        mime_guess::from_ext(self.extension()).first_or_octet_stream()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated artifact identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Draw a fresh random identifier.
    pub fn random() -> Self {
        let mut rng = rng();
        let id = (0..ID_LEN)
            .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
            .collect();
        Self(id)
    }

    /// Accept a client-supplied identifier if it is a plain alphanumeric
    /// token. Anything else (separators, dots, empty) is rejected so it can
    /// never address a path outside the namespace directory.
    pub fn parse(raw: &str) -> Option<Self> {
        if !raw.is_empty() && raw.len() <= 64 && raw.chars().all(|c| c.is_ascii_alphanumeric()) {
            Some(Self(raw.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub namespace: Namespace,
    pub id: ArtifactId,
    pub path: PathBuf,
}

impl Artifact {
    /// Absolute URL under `base_url` (`{scheme}://{host}`).
    pub fn url(&self, base_url: &str) -> String {
        format!(
            "{}/{}/{}",
            base_url.trim_end_matches('/'),
            self.namespace,
            self.id
        )
    }

    /// Download filename, `{id}.{ext}`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.id, self.namespace.extension())
    }
}

/// Maps `(namespace, identifier)` to files under the PDF and ZIP directories.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    pdf_dir: PathBuf,
    zip_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(pdf_dir: impl Into<PathBuf>, zip_dir: impl Into<PathBuf>) -> Self {
        Self {
            pdf_dir: pdf_dir.into(),
            zip_dir: zip_dir.into(),
        }
    }

    pub fn dir(&self, namespace: Namespace) -> &Path {
        match namespace {
            Namespace::Pdf => &self.pdf_dir,
            Namespace::Zip => &self.zip_dir,
        }
    }

    pub fn path_for(&self, namespace: Namespace, id: &ArtifactId) -> PathBuf {
        self.dir(namespace)
            .join(format!("{}.{}", id, namespace.extension()))
    }

    /// Draw an identifier that is not yet taken in `namespace`.
    ///
    /// After [`MAX_MINT_ATTEMPTS`] collisions the last draw is used anyway
    /// and will overwrite the existing artifact.
    pub async fn mint(&self, namespace: Namespace) -> ArtifactId {
        let mut id = ArtifactId::random();
        for _ in 1..MAX_MINT_ATTEMPTS {
            let taken = tokio::fs::try_exists(self.path_for(namespace, &id))
                .await
                .unwrap_or(false);
            if !taken {
                return id;
            }
            debug!("Identifier {namespace}/{id} already taken, drawing again");
            id = ArtifactId::random();
        }
        warn!("Identifier space crowded in {namespace}; accepting {id}");
        id
    }

    /// Mint an identifier and run `produce` with the artifact's final path.
    ///
    /// The artifact is only returned (and so only ever handed to a client)
    /// after `produce` completes successfully.
    pub async fn create<F, Fut>(
        &self,
        namespace: Namespace,
        produce: F,
    ) -> Result<Artifact, ConverterError>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = Result<(), ConverterError>>,
    {
        let id = self.mint(namespace).await;
        let path = self.path_for(namespace, &id);

        produce(path.clone()).await?;

        info!("Created artifact {namespace}/{id} at {}", path.display());
        Ok(Artifact {
            namespace,
            id,
            path,
        })
    }

    /// Resolve a client-supplied identifier to an existing artifact.
    pub async fn resolve(
        &self,
        namespace: Namespace,
        raw_id: &str,
    ) -> Result<Artifact, ConverterError> {
        let not_found = || ConverterError::IdentifierNotFound {
            namespace,
            id: raw_id.to_string(),
        };

        let id = ArtifactId::parse(raw_id).ok_or_else(not_found)?;
        let path = self.path_for(namespace, &id);

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Artifact {
                namespace,
                id,
                path,
            }),
            Ok(_) => Err(not_found()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found()),
            Err(e) => Err(ConverterError::ReadFailed { path, source: e }),
        }
    }
}
