use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Confines relative paths (archive entries, diff targets, configured
/// locations) to a single directory tree.
#[derive(Debug, Clone)]
pub struct TreeGuard {
    /// Root every resolved path must stay under
    root: PathBuf,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("absolute path not allowed here: {}", path.display())]
    AbsolutePath { path: PathBuf },

    #[error("path escapes its tree via '..': {}", path.display())]
    ParentTraversal { path: PathBuf },

    #[error("empty path not allowed here")]
    EmptyPath,

    #[error("path is outside tree: {} (root: {})", path.display(), root.display())]
    OutsideTree { path: PathBuf, root: PathBuf },

    #[error("refusing to clear {}: not strictly inside {}", path.display(), root.display())]
    NotDisposable { path: PathBuf, root: PathBuf },

    #[error("failed to canonicalize path: {0}")]
    Canonicalize(#[from] std::io::Error),
}

/// Check that `path` is a plain relative path with no `..` or root component.
pub fn check_relative(path: impl AsRef<Path>) -> Result<(), SafetyError> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(SafetyError::EmptyPath);
    }
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => {
                return Err(SafetyError::ParentTraversal {
                    path: path.to_path_buf(),
                })
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(SafetyError::AbsolutePath {
                    path: path.to_path_buf(),
                })
            }
        }
    }
    Ok(())
}

/// Check that `scratch` can be removed wholesale: it must sit strictly below
/// `root` so a misconfigured path never wipes the project itself.
pub fn ensure_disposable(root: &Path, scratch: &Path) -> Result<(), SafetyError> {
    let inside = scratch
        .strip_prefix(root)
        .map(|rel| check_relative(rel).is_ok())
        .unwrap_or(false);
    if inside {
        Ok(())
    } else {
        Err(SafetyError::NotDisposable {
            path: scratch.to_path_buf(),
            root: root.to_path_buf(),
        })
    }
}

impl TreeGuard {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Join a relative path onto the root after a lexical safety check.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let relative = relative.as_ref();
        check_relative(relative)?;
        Ok(self.root.join(relative))
    }

    /// Re-check a resolved path against the filesystem right before writing.
    ///
    /// The nearest existing ancestor is canonicalized, so a symlink planted
    /// inside the tree cannot redirect a write outside of it.
    pub fn confine(&self, path: &Path) -> Result<PathBuf, SafetyError> {
        let root = self.root.canonicalize()?;
        let mut existing = path;
        let mut tail = Vec::new();
        while !existing.exists() {
            match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    tail.push(name.to_os_string());
                    existing = parent;
                }
                _ => break,
            }
        }
        let mut canonical = existing.canonicalize()?;
        for name in tail.into_iter().rev() {
            canonical.push(name);
        }
        if !canonical.starts_with(&root) {
            return Err(SafetyError::OutsideTree {
                path: canonical,
                root,
            });
        }
        Ok(canonical)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
