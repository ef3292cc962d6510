use crate::build::BuildStage;
use crate::config::ConfigError;
use crate::patch::PatchError;
use crate::regression::RegressionFailure;
use crate::safety::SafetyError;
use std::path::PathBuf;
use thiserror::Error;

/// Every way a pipeline run can stop.
///
/// All variants are terminal: nothing is retried and no partial manifest is
/// written once one of these has been produced.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("required tool not found on PATH: {tool}")]
    MissingTool { tool: String },

    #[error("no compile component named '{name}'")]
    UnknownComponent { name: String },

    #[error("missing {what}: {}", path.display())]
    MissingSource { what: &'static str, path: PathBuf },

    #[error("patch {patch} failed to apply: {source}")]
    PatchApplication {
        patch: String,
        #[source]
        source: PatchError,
    },

    #[error("compiler did not produce output: {}", path.display())]
    EmptyOutput { path: PathBuf },

    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("component '{component}' stopped at stage {stage}; refusing to write manifest")]
    IncompleteBuild {
        component: String,
        stage: BuildStage,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read archive {}: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid suspicious pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error(transparent)]
    Unsafe(#[from] SafetyError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Regression(#[from] RegressionFailure),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
