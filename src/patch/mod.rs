//! Patch application for extracted vendor source trees.
//!
//! Patches are plain unified diffs applied with pure text matching, so the
//! same ordered patch list on the same pristine tree always produces the
//! same result. Every patch is checked in memory against the whole tree
//! before any file is written, and a failing patch rolls back the patches
//! already applied from the same series.

pub mod diff;
mod hunk;

pub use diff::{FilePatch, Hunk, HunkLine, PatchSet};

use crate::edit::{atomic_write, splice, EditError};
use crate::error::PipelineError;
use crate::hash::sha256_bytes;
use crate::safety::{SafetyError, TreeGuard};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("patch contains no file changes")]
    Empty,

    #[error("malformed patch at line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("unsupported patch section at line {line}: {reason}")]
    Unsupported { line: usize, reason: String },

    #[error("hunk #{hunk} (line {line}) does not match {}\n{preview}", file.display())]
    HunkMismatch {
        file: PathBuf,
        hunk: usize,
        line: usize,
        preview: String,
    },

    #[error("patch target does not exist: {}", file.display())]
    MissingTarget { file: PathBuf },

    #[error("patch creates a file that already exists: {}", file.display())]
    TargetExists { file: PathBuf },

    #[error("patch deletes {} but content would remain", file.display())]
    DeletionIncomplete { file: PathBuf },

    #[error(transparent)]
    Unsafe(#[from] SafetyError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Provenance entry for one applied patch.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PatchRecord {
    /// Root-relative POSIX path of the patch file
    pub file: String,
    pub sha256: String,
}

/// A patch file read from disk and parsed.
#[derive(Debug, Clone)]
pub struct PatchFile {
    pub name: String,
    pub path: PathBuf,
    pub sha256: String,
    pub set: PatchSet,
}

impl PatchFile {
    pub fn load(dir: &Path, name: &str) -> Result<Self, PipelineError> {
        let path = dir.join(name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(PipelineError::MissingSource {
                    what: "patch file",
                    path,
                })
            }
            Err(err) => return Err(PipelineError::io(path, err)),
        };
        let text = String::from_utf8_lossy(&bytes);
        let set = diff::parse(&text).map_err(|source| PipelineError::PatchApplication {
            patch: name.to_string(),
            source,
        })?;
        Ok(Self {
            name: name.to_string(),
            path,
            sha256: sha256_bytes(&bytes),
            set,
        })
    }
}

/// The post-patch state of every file a patch touches, computed without
/// writing anything.
#[derive(Debug, Clone, Default)]
pub struct PatchPlan {
    /// `None` marks a file the patch deletes
    changes: BTreeMap<PathBuf, Option<String>>,
}

impl PatchPlan {
    pub fn touched(&self) -> impl Iterator<Item = &Path> {
        self.changes.keys().map(PathBuf::as_path)
    }

    /// Post-patch content of `path`, if the patch touches it and keeps it.
    pub fn content(&self, path: &Path) -> Option<&str> {
        self.changes.get(path).and_then(|c| c.as_deref())
    }

    fn commit(&self, guard: &TreeGuard) -> Result<(), PatchError> {
        for (path, change) in &self.changes {
            let path = guard.confine(path)?;
            match change {
                Some(content) => {
                    if let Some(parent) = path.parent() {
                        fs::create_dir_all(parent).map_err(|source| PatchError::Io {
                            path: parent.to_path_buf(),
                            source,
                        })?;
                    }
                    atomic_write(&path, content.as_bytes())?;
                }
                None => fs::remove_file(&path).map_err(|source| PatchError::Io {
                    path: path.clone(),
                    source,
                })?,
            }
        }
        Ok(())
    }
}

/// Dry-run `set` against the tree rooted at `tree`.
pub fn check(tree: &Path, set: &PatchSet) -> Result<PatchPlan, PatchError> {
    let guard = TreeGuard::new(tree);
    let mut plan = PatchPlan::default();

    for file in &set.files {
        let source = guard.resolve(file.source())?;
        let target = guard.resolve(file.target())?;

        let current = match plan.changes.get(&source) {
            Some(staged) => staged.clone(),
            None => read_optional(&source)?,
        };

        let content = if file.is_creation() {
            if current.is_some() {
                return Err(PatchError::TargetExists { file: target });
            }
            String::new()
        } else {
            current.ok_or_else(|| PatchError::MissingTarget {
                file: source.clone(),
            })?
        };

        let edits = hunk::plan_edits(&source, &content, &file.hunks)?;
        let patched = splice(&content, &edits)?;

        if file.is_deletion() {
            if !patched.is_empty() {
                return Err(PatchError::DeletionIncomplete { file: source });
            }
            plan.changes.insert(source, None);
            continue;
        }

        if source != target && !file.is_creation() {
            plan.changes.insert(source, None);
        }
        plan.changes.insert(target, Some(patched));
    }

    Ok(plan)
}

fn read_optional(path: &Path) -> Result<Option<String>, PatchError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(PatchError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Applies an ordered patch series to one tree, remembering the original
/// bytes of every file it touches so a failed series can be undone.
#[derive(Debug)]
pub struct PatchApplier {
    guard: TreeGuard,
    /// Original content per touched file; `None` if the file did not exist
    snapshots: BTreeMap<PathBuf, Option<Vec<u8>>>,
}

impl PatchApplier {
    pub fn new(tree: impl Into<PathBuf>) -> Self {
        Self {
            guard: TreeGuard::new(tree),
            snapshots: BTreeMap::new(),
        }
    }

    pub fn tree(&self) -> &Path {
        self.guard.root()
    }

    /// Check a patch against the current tree without mutating it.
    pub fn check(&self, patch: &PatchFile) -> Result<PatchPlan, PipelineError> {
        check(self.tree(), &patch.set).map_err(|source| PipelineError::PatchApplication {
            patch: patch.name.clone(),
            source,
        })
    }

    /// Check, then write a single patch.
    pub fn apply(&mut self, patch: &PatchFile) -> Result<(), PipelineError> {
        let plan = self.check(patch)?;

        for path in plan.touched() {
            if self.snapshots.contains_key(path) {
                continue;
            }
            let original = match fs::read(path) {
                Ok(bytes) => Some(bytes),
                Err(err) if err.kind() == ErrorKind::NotFound => None,
                Err(err) => return Err(PipelineError::io(path, err)),
            };
            self.snapshots.insert(path.to_path_buf(), original);
        }

        plan.commit(&self.guard)
            .map_err(|source| PipelineError::PatchApplication {
                patch: patch.name.clone(),
                source,
            })?;

        tracing::info!(
            patch = %patch.name,
            files = plan.touched().count(),
            "applied patch"
        );
        Ok(())
    }

    /// Restore every file touched so far to its pre-series state.
    pub fn rollback(&mut self) {
        for (path, original) in std::mem::take(&mut self.snapshots) {
            let restored = match original {
                Some(bytes) => atomic_write(&path, &bytes).map_err(|e| e.to_string()),
                None => match fs::remove_file(&path) {
                    Err(err) if err.kind() != ErrorKind::NotFound => Err(err.to_string()),
                    _ => Ok(()),
                },
            };
            if let Err(reason) = restored {
                tracing::warn!(file = %path.display(), %reason, "failed to roll back patched file");
            }
        }
    }

    /// Files modified by the patches applied so far.
    pub fn touched(&self) -> impl Iterator<Item = &Path> {
        self.snapshots.keys().map(PathBuf::as_path)
    }
}

/// Apply `names` (in order) from `patch_dir` to `tree`.
///
/// `record_prefix` is the root-relative location of `patch_dir`, used for
/// the provenance records. On any failure the series is rolled back before
/// the error is returned.
pub fn apply_series(
    tree: &Path,
    patch_dir: &Path,
    record_prefix: &str,
    names: &[String],
) -> Result<Vec<PatchRecord>, PipelineError> {
    let mut applier = PatchApplier::new(tree);
    let mut records = Vec::with_capacity(names.len());

    for name in names {
        let step = PatchFile::load(patch_dir, name).and_then(|patch| {
            applier.apply(&patch)?;
            Ok(patch)
        });

        match step {
            Ok(patch) => records.push(PatchRecord {
                file: record_path(record_prefix, name),
                sha256: patch.sha256,
            }),
            Err(err) => {
                applier.rollback();
                return Err(err);
            }
        }
    }

    Ok(records)
}

fn record_path(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}
