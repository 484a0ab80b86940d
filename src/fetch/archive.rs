//! Zip extraction.

use crate::error::{InstallerError, Result};
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Summary of an extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Files written.
    pub written: usize,
    /// Files left alone because they existed and overwrite was off.
    pub kept: usize,
    /// Entries skipped because their path would leave the destination.
    pub skipped: usize,
}

/// Extract a zip archive into `dest`.
///
/// Entries whose names would escape `dest` are skipped. Files already in
/// `dest` that the archive does not mention are untouched; files it does
/// mention are replaced only when `overwrite` is set.
pub fn extract_zip(archive_path: &Path, dest: &Path, overwrite: bool) -> Result<ExtractSummary> {
    let archive_err = |message: String| InstallerError::Archive {
        path: archive_path.to_path_buf(),
        message,
    };

    let file = File::open(archive_path)
        .map_err(|e| archive_err(format!("cannot open: {}", e)))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| archive_err(format!("zip read error: {}", e)))?;

    std::fs::create_dir_all(dest)?;
    let mut summary = ExtractSummary::default();

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| archive_err(format!("zip entry error: {}", e)))?;

        let outpath = match entry.enclosed_name() {
            Some(path) => dest.join(path),
            None => {
                debug!(entry = entry.name(), "Skipping unsafe zip entry");
                summary.skipped += 1;
                continue;
            }
        };

        if entry.is_dir() {
            std::fs::create_dir_all(&outpath)?;
            continue;
        }

        if outpath.exists() && !overwrite {
            summary.kept += 1;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut outfile = File::create(&outpath)?;
        std::io::copy(&mut entry, &mut outfile)
            .map_err(|e| archive_err(format!("write error for {}: {}", outpath.display(), e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode)).ok();
            }
        }

        summary.written += 1;
    }

    debug!(
        archive = %archive_path.display(),
        dest = %dest.display(),
        written = summary.written,
        skipped = summary.skipped,
        "Archive extracted"
    );
    Ok(summary)
}
