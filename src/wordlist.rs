//! Plain-text word lists: one entry per line.

use crate::error::PipelineError;
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Trimmed, non-empty lines of `path`. A missing file reads as empty.
pub fn read_lines(path: &Path) -> Result<Vec<String>, PipelineError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(PipelineError::io(path, err)),
    };
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

pub fn read_word_set(path: &Path) -> Result<HashSet<String>, PipelineError> {
    Ok(read_lines(path)?.into_iter().collect())
}

/// Fail with [`PipelineError::MissingSource`] unless `path` is a non-empty file.
pub fn require_file(path: &Path, what: &'static str) -> Result<(), PipelineError> {
    let present = fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false);
    if present {
        Ok(())
    } else {
        Err(PipelineError::MissingSource {
            what,
            path: path.to_path_buf(),
        })
    }
}
