//! Extraction of vendored source archives into scratch directories.

use crate::error::PipelineError;
use crate::safety::{SafetyError, TreeGuard};
use std::fs::{self, File};
use std::io;
use std::path::Path;
use zip::ZipArchive;

/// Extract every entry of the zip at `archive` below `dest`.
///
/// Entries whose names would land outside `dest` are rejected rather than
/// skipped. Returns the number of files written.
pub fn extract(archive: &Path, dest: &Path) -> Result<usize, PipelineError> {
    if !archive.is_file() {
        return Err(PipelineError::MissingSource {
            what: "upstream source archive",
            path: archive.to_path_buf(),
        });
    }

    let reader = File::open(archive).map_err(|e| PipelineError::io(archive, e))?;
    let mut zip = ZipArchive::new(reader).map_err(|source| PipelineError::Archive {
        path: archive.to_path_buf(),
        source,
    })?;
    let guard = TreeGuard::new(dest);
    let mut written = 0;

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(|source| PipelineError::Archive {
            path: archive.to_path_buf(),
            source,
        })?;
        let relative = entry
            .enclosed_name()
            .map(Path::to_path_buf)
            .ok_or_else(|| SafetyError::ParentTraversal {
                path: entry.name().into(),
            })?;
        let out_path = guard.resolve(&relative)?;

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| PipelineError::io(&out_path, e))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
        let mut out = File::create(&out_path).map_err(|e| PipelineError::io(&out_path, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| PipelineError::io(&out_path, e))?;
        written += 1;
    }

    tracing::debug!(
        archive = %archive.display(),
        dest = %dest.display(),
        files = written,
        "extracted archive"
    );
    Ok(written)
}
