//! Byte-span edits and atomic writes underneath patch application.

use crate::error::PipelineError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// Spans of old text at least this long are verified by hash.
const HASH_THRESHOLD: usize = 1024;

/// One located hunk: replace `[byte_start, byte_end)` of a file with
/// `new_text`, provided the span still holds the hunk's old side.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Edit does nothing until spliced into content"]
pub struct Edit {
    /// Patched file, for error messages
    pub file: PathBuf,
    pub byte_start: usize,
    /// Exclusive
    pub byte_end: usize,
    /// The hunk's new side
    pub new_text: String,
    pub expected_before: EditVerification,
}

/// How the old side of a hunk is recognised in the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    ExactMatch(String),
    /// xxh3 of the old side, for long spans
    Hash(u64),
}

impl EditVerification {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    pub fn from_text(text: &str) -> Self {
        if text.len() >= HASH_THRESHOLD {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("before-text verification failed at {}:{byte_start}", file.display())]
    BeforeTextMismatch {
        file: PathBuf,
        byte_start: usize,
        byte_end: usize,
        found: String,
    },

    #[error("invalid byte range: [{byte_start}, {byte_end}) in file of length {file_len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        file_len: usize,
    },

    #[error("overlapping edits in {}: span ending at {first_end} overlaps span starting at {second_start}", file.display())]
    Overlap {
        file: PathBuf,
        first_end: usize,
        second_start: usize,
    },

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("edit splits a UTF-8 character")]
    InvalidUtf8Edit,
}

impl Edit {
    pub fn new(
        file: impl Into<PathBuf>,
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        expected_before: impl AsRef<str>,
    ) -> Self {
        Self {
            file: file.into(),
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: EditVerification::from_text(expected_before.as_ref()),
        }
    }

    /// The span's current text, if it is in range and still holds the
    /// expected old side.
    fn validate<'a>(&self, content: &'a str) -> Result<&'a str, EditError> {
        if self.byte_start > self.byte_end || self.byte_end > content.len() {
            return Err(EditError::InvalidByteRange {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                file_len: content.len(),
            });
        }

        let current_text = content
            .get(self.byte_start..self.byte_end)
            .ok_or(EditError::InvalidUtf8Edit)?;

        if !self.expected_before.matches(current_text) {
            return Err(EditError::BeforeTextMismatch {
                file: self.file.clone(),
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                found: current_text.to_string(),
            });
        }

        Ok(current_text)
    }
}

/// Splice a set of non-overlapping edits into `content` in memory.
///
/// Edits may arrive in any order; they are verified against the original
/// content first and then applied bottom-to-top so offsets stay valid.
pub fn splice(content: &str, edits: &[Edit]) -> Result<String, EditError> {
    let mut ordered: Vec<&Edit> = edits.iter().collect();
    ordered.sort_by(|a, b| b.byte_start.cmp(&a.byte_start));

    for edit in &ordered {
        edit.validate(content)?;
    }

    // Sorted descending: the earlier span must end before the later one starts
    for window in ordered.windows(2) {
        let (later, earlier) = (window[0], window[1]);
        if earlier.byte_end > later.byte_start {
            return Err(EditError::Overlap {
                file: later.file.clone(),
                first_end: earlier.byte_end,
                second_start: later.byte_start,
            });
        }
    }

    let mut result = content.to_string();
    for edit in ordered {
        result.replace_range(edit.byte_start..edit.byte_end, &edit.new_text);
    }
    Ok(result)
}

/// Write through a sibling tempfile, fsync, then rename over `path`. Readers
/// see the old content or the new content, never a mix.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), EditError> {
    let parent = path.parent().ok_or_else(|| {
        EditError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "path has no parent directory",
        ))
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

/// [`atomic_write`] for pipeline outputs: creates the parent directory and
/// reports failures against `path`.
pub(crate) fn write_output(path: &Path, content: &[u8]) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    atomic_write(path, content).map_err(|err| match err {
        EditError::Io(source) => PipelineError::io(path, source),
        other => PipelineError::io(path, std::io::Error::other(other)),
    })
}
