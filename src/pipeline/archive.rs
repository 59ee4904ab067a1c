//! ZIP assembly: staged files → one deflated archive.
//!
//! Entries are named with the client's original filename, not the staged
//! name, so the archive unpacks to what the user uploaded. Every entry uses
//! Deflate at level 9.
//!
//! Client names are normalised first: backslashes become `/`, a drive
//! prefix such as `C:` is removed, and empty, `.` and `..` components are
//! dropped, so no entry can point outside the extraction directory. A name
//! with nothing left falls back to the staged file name.
//!
//! Two uploads with the same entry name would otherwise produce two
//! entries with one name; the second and later ones are renamed
//! `name (1).ext`, `name (2).ext`, ….
//!
//! The archive is finalised only after every entry has been written, and the
//! call returns only once it is complete on disk.

use crate::error::ConverterError;
use crate::pipeline::sanitize::split_name;
use crate::pipeline::stage::StagedFile;
use crate::pipeline::write_atomically;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Seek, Write};
use std::path::Path;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Deflate level applied to every entry.
pub const COMPRESSION_LEVEL: i64 = 9;

/// Bundle `files` into a ZIP archive at `output`.
///
/// # Returns
/// The number of entries written.
pub async fn assemble_zip(files: Vec<StagedFile>, output: &Path) -> Result<usize, ConverterError> {
    let output = output.to_path_buf();

    tokio::task::spawn_blocking(move || assemble_zip_blocking(&files, &output))
        .await
        .map_err(|e| ConverterError::Internal(format!("ZIP task panicked: {}", e)))?
}

/// Blocking implementation of ZIP assembly.
fn assemble_zip_blocking(files: &[StagedFile], output: &Path) -> Result<usize, ConverterError> {
    write_atomically(output, |writer| write_archive(files, writer))?;

    info!(
        "ZIP written: {} entries → {}",
        files.len(),
        output.display()
    );
    Ok(files.len())
}

/// Stream each staged file into `target` as one entry.
pub fn write_archive<W: Write + Seek>(
    files: &[StagedFile],
    target: W,
) -> Result<(), ConverterError> {
    let zip_err = |e: zip::result::ZipError| ConverterError::ZipAssembly(e.to_string());

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL));

    let mut zip = ZipWriter::new(target);
    let names = entry_names(files);

    for (file, name) in files.iter().zip(&names) {
        let mut source = File::open(&file.staged_path).map_err(|e| ConverterError::ReadFailed {
            path: file.staged_path.clone(),
            source: e,
        })?;

        zip.start_file(name.as_str(), options).map_err(zip_err)?;
        let bytes = io::copy(&mut source, &mut zip)
            .map_err(|e| ConverterError::ZipAssembly(format!("entry '{name}': {e}")))?;
        debug!("Entry '{}' ← {} ({} bytes)", name, file.staged_path.display(), bytes);
    }

    zip.finish().map_err(zip_err)?;
    Ok(())
}

/// Normalised original names, with later duplicates given a ` (n)` suffix.
pub fn entry_names(files: &[StagedFile]) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::with_capacity(files.len());

    files
        .iter()
        .map(|file| {
            let name = entry_name(file);
            if taken.insert(name.clone()) {
                return name;
            }

            let (base, ext) = split_name(&name);
            let prefix = &name[..name.len() - base.len() - ext.len()];
            let mut n = 1;
            loop {
                let candidate = format!("{prefix}{base} ({n}){ext}");
                if taken.insert(candidate.clone()) {
                    return candidate;
                }
                n += 1;
            }
        })
        .collect()
}

/// Relative, forward-slash form of the client's filename.
fn entry_name(file: &StagedFile) -> String {
    let unified = file.original_name.replace('\\', "/");
    let without_drive = match unified.split_once(':') {
        Some((drive, rest))
            if !drive.is_empty() && drive.chars().all(|c| c.is_alphanumeric() || c == '_') =>
        {
            rest
        }
        _ => unified.as_str(),
    };

    let name = without_drive
        .split('/')
        .filter(|part| !matches!(*part, "" | "." | ".."))
        .collect::<Vec<_>>()
        .join("/");
    if !name.is_empty() {
        return name;
    }

    file.staged_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string())
}
