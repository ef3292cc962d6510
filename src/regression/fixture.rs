use crate::error::PipelineError;
use crate::wordlist::require_file;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Curated expectations for one model. Every list may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub inverse_must_include: Vec<InversePair>,
    pub analysis_must_recognize: Vec<String>,
    pub analysis_should_reject: Vec<String>,
    pub dictionary_must_include: Vec<String>,
    pub dictionary_must_exclude: Vec<String>,
}

/// `analysis` must generate `surface`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InversePair {
    pub analysis: String,
    pub surface: String,
}

impl Fixture {
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        require_file(path, "regression fixture")?;
        let text = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        serde_json::from_str(&text).map_err(|source| PipelineError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}
