//! Pipeline stages for image upload conversion.
//!
//! Each submodule implements exactly one step:
//!
//! ```text
//! multipart ──▶ sanitize ──▶ stage ──▶ pdf | archive ──▶ store
//!               (names)      (disk)    (lopdf / zip)
//! ```
//!
//! 1. [`sanitize`]: derive a safe, timestamped on-disk name per upload
//! 2. [`stage`]: stream multipart parts into the uploads directory
//! 3. [`pdf`]: compose staged images into one PDF, one page each
//! 4. [`archive`]: bundle staged files into one deflated ZIP
//!
//! Both assemblers are CPU- and disk-bound and run inside
//! `spawn_blocking`. They write through [`write_atomically`], so the final
//! artifact path only ever holds a complete file.

pub mod archive;
pub mod pdf;
pub mod sanitize;
pub mod stage;

use crate::error::ConverterError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Write `output` through a temp file in the same directory, then rename.
///
/// On error the temp file is dropped and removed; nothing appears at
/// `output`.
pub(crate) fn write_atomically<F>(output: &Path, write: F) -> Result<(), ConverterError>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<(), ConverterError>,
{
    let write_failed = |source: std::io::Error| ConverterError::WriteFailed {
        path: output.to_path_buf(),
        source,
    };

    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(write_failed)?;

    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write(&mut writer)?;
        writer.flush().map_err(write_failed)?;
    }
    tmp.as_file().sync_all().map_err(write_failed)?;

    tmp.persist(output).map_err(|e| write_failed(e.error))?;
    Ok(())
}
