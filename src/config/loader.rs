use crate::config::builtin::BUILTIN_PIPELINE;
use crate::config::schema::{PipelineConfig, ValidationError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Location of the pipeline config relative to the project root.
pub const DEFAULT_CONFIG_PATH: &str = "fst/pipeline.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read pipeline config from {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse pipeline config TOML{}: {source}", location(.path))]
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },

    #[error("invalid pipeline config{}: {source}", location(.path))]
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

fn location(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" ({})", path.display()),
        None => String::new(),
    }
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

/// Parse and validate a pipeline config whose relative paths resolve
/// against `root`.
pub fn load_from_str(input: &str, root: impl Into<PathBuf>) -> Result<PipelineConfig, ConfigError> {
    let mut config: PipelineConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    config.root = root.into();
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(
    path: impl AsRef<Path>,
    root: impl Into<PathBuf>,
) -> Result<PipelineConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents, root).map_err(|error| error.with_path(path))
}

/// The built-in Solmaalai layout.
pub fn builtin(root: impl Into<PathBuf>) -> Result<PipelineConfig, ConfigError> {
    load_from_str(BUILTIN_PIPELINE, root)
}

/// Pick the config for a run.
///
/// An explicit path must exist. Without one, `<root>/fst/pipeline.toml` is
/// used when present and the built-in layout otherwise.
pub fn resolve(root: &Path, explicit: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    if let Some(path) = explicit {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        };
        return load_from_path(&path, root);
    }

    let default_path = root.join(DEFAULT_CONFIG_PATH);
    if default_path.is_file() {
        tracing::debug!(path = %default_path.display(), "loading pipeline config");
        load_from_path(&default_path, root)
    } else {
        tracing::debug!("no pipeline config on disk, using built-in layout");
        builtin(root)
    }
}
