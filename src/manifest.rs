//! Distribution of built models and the provenance manifest.

use crate::build::ComponentBuild;
use crate::config::PipelineConfig;
use crate::edit::write_output;
use crate::error::PipelineError;
use crate::hash::sha256_file;
use crate::patch::PatchRecord;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A model as it left the build, before distribution.
#[derive(Debug, Clone)]
pub struct BuiltArtifact {
    /// Output file name, unique across components
    pub output: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputArtifact {
    pub file: String,
    pub sha256: String,
    pub size_bytes: u64,
    pub copied_to: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorRevision {
    pub path: String,
    pub commit: String,
}

/// What was built for one component. Both modes share the shape; a
/// prebuilt copy has no entry and no patches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub name: String,
    pub mode: String,
    /// Archive name for compiled components, vendor-relative path for copies
    pub source: String,
    pub entry: Option<String>,
    pub output: String,
    pub patches: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifest {
    pub built_at: String,
    pub vendor_revision: VendorRevision,
    pub components: Vec<ComponentRecord>,
    pub patches: Vec<PatchRecord>,
    pub outputs: Vec<OutputArtifact>,
}

/// Hash every artifact and copy it into every configured destination.
///
/// Outputs are processed and returned in file-name order. Existing files
/// at the destinations are overwritten.
pub fn distribute(
    config: &PipelineConfig,
    artifacts: &[BuiltArtifact],
) -> Result<Vec<OutputArtifact>, PipelineError> {
    let destinations = config.destinations();
    for (_, dir) in &destinations {
        fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir, e))?;
    }

    let mut ordered: Vec<&BuiltArtifact> = artifacts.iter().collect();
    ordered.sort_by(|a, b| a.output.cmp(&b.output));

    let mut outputs = Vec::with_capacity(ordered.len());
    for artifact in ordered {
        let sha256 = sha256_file(&artifact.path).map_err(|e| PipelineError::io(&artifact.path, e))?;
        let size_bytes = fs::metadata(&artifact.path)
            .map_err(|e| PipelineError::io(&artifact.path, e))?
            .len();

        let mut copied_to = Vec::with_capacity(destinations.len());
        for (label, dir) in &destinations {
            let target = dir.join(&artifact.output);
            fs::copy(&artifact.path, &target).map_err(|e| PipelineError::io(&target, e))?;
            copied_to.push(label.clone());
        }

        tracing::debug!(file = %artifact.output, sha256 = %sha256, size_bytes, "distributed");
        outputs.push(OutputArtifact {
            file: artifact.output.clone(),
            sha256,
            size_bytes,
            copied_to,
        });
    }
    Ok(outputs)
}

impl BuildManifest {
    /// Assemble the manifest, refusing unless every component has been
    /// distributed.
    pub fn assemble(
        progress: &[ComponentBuild],
        vendor_revision: VendorRevision,
        components: Vec<ComponentRecord>,
        mut patches: Vec<PatchRecord>,
        mut outputs: Vec<OutputArtifact>,
    ) -> Result<Self, PipelineError> {
        if let Some(pending) = progress.iter().find(|build| !build.is_distributed()) {
            return Err(PipelineError::IncompleteBuild {
                component: pending.name().to_string(),
                stage: pending.stage(),
            });
        }

        patches.sort_by(|a, b| a.file.cmp(&b.file));
        outputs.sort_by(|a, b| a.file.cmp(&b.file));

        Ok(Self {
            built_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            vendor_revision,
            components,
            patches,
            outputs,
        })
    }

    /// Pretty JSON with a trailing newline.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    pub fn write(&self, path: &Path) -> Result<(), PipelineError> {
        let json = self.to_json().map_err(|source| PipelineError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        write_output(path, json.as_bytes())
    }

    pub fn read(path: &Path) -> Result<Self, PipelineError> {
        let text = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        serde_json::from_str(&text).map_err(|source| PipelineError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}
