//! The component build pipeline.
//!
//! Components are built one at a time, each in its own freshly created
//! scratch directory. Artifacts are only distributed and the manifest only
//! written once every component has been built; the first error stops the
//! run.

mod component;
mod stage;
mod verify;

pub use component::{build_component, ComponentOutput};
pub use stage::{BuildStage, ComponentBuild};
pub use verify::{verify_patches, FileChange, PatchPreview};

use crate::compiler::BuildBackend;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::manifest::{distribute, BuildManifest, VendorRevision};
use crate::safety::ensure_disposable;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    /// Remove the whole scratch root before building
    pub clean: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { clean: true }
    }
}

#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub manifest: BuildManifest,
    pub manifest_path: PathBuf,
    pub stages: Vec<ComponentBuild>,
}

/// Build every configured component, distribute the artifacts and write
/// the manifest.
pub fn build_all(
    config: &PipelineConfig,
    backend: &dyn BuildBackend,
    options: BuildOptions,
) -> Result<BuildOutcome, PipelineError> {
    backend.ensure_available()?;

    let vendor = config.vendor_dir();
    if !vendor.is_dir() {
        return Err(PipelineError::MissingSource {
            what: "vendor checkout",
            path: vendor,
        });
    }

    let scratch = config.scratch_dir();
    ensure_disposable(&config.root, &scratch)?;
    if options.clean && scratch.exists() {
        tracing::info!(scratch = %scratch.display(), "clearing scratch root");
        remove_dir(&scratch)?;
    }
    fs::create_dir_all(&scratch).map_err(|e| PipelineError::io(&scratch, e))?;

    let commit = backend.vendor_revision(&vendor)?;
    tracing::info!(commit = %commit, "vendor revision");

    let mut stages: Vec<ComponentBuild> = config
        .components
        .iter()
        .map(|c| ComponentBuild::new(c.name()))
        .collect();
    let mut records = Vec::with_capacity(config.components.len());
    let mut artifacts = Vec::with_capacity(config.components.len());
    let mut patches = Vec::new();

    for (descriptor, progress) in config.components.iter().zip(stages.iter_mut()) {
        let work_dir = scratch.join(descriptor.name());
        tracing::info!(component = descriptor.name(), mode = descriptor.mode(), "building");

        let built = fresh_dir(&work_dir)
            .and_then(|()| build_component(config, backend, descriptor, &work_dir, progress));
        match built {
            Ok(output) => {
                records.push(output.record);
                artifacts.push(output.artifact);
                patches.extend(output.patches);
            }
            Err(err) => {
                progress.fail();
                tracing::error!(component = descriptor.name(), error = %err, "component failed");
                return Err(err);
            }
        }
    }

    let outputs = distribute(config, &artifacts)?;
    for progress in &mut stages {
        progress.advance(BuildStage::Distributed);
    }

    let manifest = BuildManifest::assemble(
        &stages,
        VendorRevision {
            path: config.paths.vendor.clone(),
            commit,
        },
        records,
        patches,
        outputs,
    )?;
    let manifest_path = config.manifest_path();
    manifest.write(&manifest_path)?;
    for progress in &mut stages {
        progress.advance(BuildStage::Manifested);
    }

    tracing::info!(
        models = manifest.outputs.len(),
        manifest = %manifest_path.display(),
        "build complete"
    );
    Ok(BuildOutcome {
        manifest,
        manifest_path,
        stages,
    })
}

/// Remove and recreate `dir`; a component tree is never reused.
fn fresh_dir(dir: &Path) -> Result<(), PipelineError> {
    if dir.exists() {
        remove_dir(dir)?;
    }
    fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir, e))
}

fn remove_dir(dir: &Path) -> Result<(), PipelineError> {
    fs::remove_dir_all(dir).map_err(|e| PipelineError::io(dir, e))
}
