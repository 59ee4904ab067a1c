//! Conversion entry points: staged uploads → stored artifact.
//!
//! Both functions mint the artifact identifier first, run the matching
//! assembler against the artifact's final path, and return the artifact
//! only once the file is complete. A failed conversion leaves nothing in
//! the output directory.

use crate::error::ConverterError;
use crate::pipeline::archive::assemble_zip;
use crate::pipeline::pdf::assemble_pdf;
use crate::pipeline::stage::StagedFile;
use crate::store::{Artifact, ArtifactStore, Namespace};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Compose staged images into one PDF, one page per file, in upload order.
///
/// # Errors
/// - [`ConverterError::NoFilesProvided`] if `files` is empty
/// - [`ConverterError::UndecodableImage`] if a file is not a supported image
/// - any write error while producing the PDF
pub async fn convert_to_pdf(
    store: &ArtifactStore,
    files: &[StagedFile],
) -> Result<Artifact, ConverterError> {
    if files.is_empty() {
        return Err(ConverterError::NoFilesProvided);
    }
    let start = Instant::now();

    let paths: Vec<PathBuf> = files.iter().map(|f| f.staged_path.clone()).collect();
    let artifact = store
        .create(Namespace::Pdf, |output| async move {
            assemble_pdf(paths, &output).await.map(|_| ())
        })
        .await?;

    info!(
        "PDF {} ready: {} pages in {}ms",
        artifact.id,
        files.len(),
        start.elapsed().as_millis()
    );
    Ok(artifact)
}

/// Bundle staged files into one ZIP, entries named by original filename.
pub async fn convert_to_zip(
    store: &ArtifactStore,
    files: &[StagedFile],
) -> Result<Artifact, ConverterError> {
    if files.is_empty() {
        return Err(ConverterError::NoFilesProvided);
    }
    let start = Instant::now();

    let owned = files.to_vec();
    let artifact = store
        .create(Namespace::Zip, |output| async move {
            assemble_zip(owned, &output).await.map(|_| ())
        })
        .await?;

    info!(
        "ZIP {} ready: {} entries in {}ms",
        artifact.id,
        files.len(),
        start.elapsed().as_millis()
    );
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    fn setup() -> (TempDir, ArtifactStore) {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path().join("pdf"), tmp.path().join("zip"));
        std::fs::create_dir_all(store.dir(Namespace::Pdf)).unwrap();
        std::fs::create_dir_all(store.dir(Namespace::Zip)).unwrap();
        (tmp, store)
    }

    fn png(tmp: &TempDir, name: &str) -> StagedFile {
        let staged_path = tmp.path().join(name);
        ImageBuffer::from_pixel(8, 6, Rgb([200u8, 10, 10]))
            .save(&staged_path)
            .unwrap();
        StagedFile {
            original_name: name.to_string(),
            staged_path,
            mime_hint: Some("image/png".into()),
        }
    }

    #[tokio::test]
    async fn empty_input_is_rejected() {
        let (_tmp, store) = setup();
        assert!(matches!(
            convert_to_pdf(&store, &[]).await,
            Err(ConverterError::NoFilesProvided)
        ));
        assert!(matches!(
            convert_to_zip(&store, &[]).await,
            Err(ConverterError::NoFilesProvided)
        ));
    }

    #[tokio::test]
    async fn pdf_artifact_is_resolvable() {
        let (tmp, store) = setup();
        let files = vec![png(&tmp, "one.png"), png(&tmp, "two.png")];

        let artifact = convert_to_pdf(&store, &files).await.unwrap();
        let doc = lopdf::Document::load(&artifact.path).unwrap();
        assert_eq!(doc.get_pages().len(), 2);

        let resolved = store
            .resolve(Namespace::Pdf, artifact.id.as_str())
            .await
            .unwrap();
        assert_eq!(resolved.path, artifact.path);
    }

    #[tokio::test]
    async fn failed_pdf_leaves_no_artifact() {
        let (tmp, store) = setup();
        let bogus = tmp.path().join("notes.png");
        std::fs::write(&bogus, b"not an image").unwrap();
        let files = vec![StagedFile {
            original_name: "notes.png".into(),
            staged_path: bogus,
            mime_hint: None,
        }];

        let err = convert_to_pdf(&store, &files).await.unwrap_err();
        assert!(err.is_conversion_failure());
        assert_eq!(std::fs::read_dir(store.dir(Namespace::Pdf)).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn zip_artifact_has_every_file() {
        let (tmp, store) = setup();
        let files = vec![png(&tmp, "a.png"), png(&tmp, "b.png")];

        let artifact = convert_to_zip(&store, &files).await.unwrap();
        let archive = zip::ZipArchive::new(std::fs::File::open(&artifact.path).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
        assert!(artifact.path.starts_with(store.dir(Namespace::Zip)));
    }
}
