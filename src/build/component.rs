use super::stage::{BuildStage, ComponentBuild};
use crate::archive;
use crate::compiler::{lexicon_script, BuildBackend};
use crate::config::{
    CompileComponent, ComponentDescriptor, EntryPoint, PipelineConfig, PrebuiltComponent,
};
use crate::error::PipelineError;
use crate::manifest::{BuiltArtifact, ComponentRecord};
use crate::patch::{apply_series, PatchRecord};
use crate::safety::TreeGuard;
use std::fs;
use std::path::Path;

/// Everything one component contributes to the manifest.
#[derive(Debug, Clone)]
pub struct ComponentOutput {
    pub record: ComponentRecord,
    pub artifact: BuiltArtifact,
    pub patches: Vec<PatchRecord>,
}

/// Build one component inside `work_dir`, which must be fresh and empty.
pub fn build_component(
    config: &PipelineConfig,
    backend: &dyn BuildBackend,
    descriptor: &ComponentDescriptor,
    work_dir: &Path,
    progress: &mut ComponentBuild,
) -> Result<ComponentOutput, PipelineError> {
    match descriptor {
        ComponentDescriptor::Compile(component) => {
            compile(config, backend, component, work_dir, progress)
        }
        ComponentDescriptor::CopyPrebuilt(component) => {
            copy_prebuilt(config, component, work_dir, progress)
        }
    }
}

fn compile(
    config: &PipelineConfig,
    backend: &dyn BuildBackend,
    component: &CompileComponent,
    work_dir: &Path,
    progress: &mut ComponentBuild,
) -> Result<ComponentOutput, PipelineError> {
    let guard = TreeGuard::new(work_dir);

    archive::extract(&config.archive_path(&component.archive), work_dir)?;
    if let EntryPoint::Synthesized { lexicon, script } = &component.entry {
        synthesize_entry(&guard, lexicon, script)?;
    }
    progress.advance(BuildStage::Extracted);

    let patches = apply_series(
        work_dir,
        &config.patch_dir(),
        &config.paths.patches,
        &component.patches,
    )?;
    progress.advance(BuildStage::Patched);

    let entry = component.entry.script();
    if !guard.resolve(entry)?.is_file() {
        return Err(PipelineError::MissingSource {
            what: "entry script",
            path: work_dir.join(entry),
        });
    }
    backend.compile(work_dir, entry, &component.output)?;
    progress.advance(BuildStage::Compiled);

    let artifact = guard.resolve(&component.output)?;
    let size = fs::metadata(&artifact).map(|meta| meta.len()).unwrap_or(0);
    if size == 0 {
        return Err(PipelineError::EmptyOutput { path: artifact });
    }
    progress.advance(BuildStage::Verified);

    Ok(ComponentOutput {
        record: ComponentRecord {
            name: component.name.clone(),
            mode: "compile".to_string(),
            source: component.archive.clone(),
            entry: Some(entry.to_string()),
            output: component.output.clone(),
            patches: component.patches.clone(),
        },
        artifact: BuiltArtifact {
            output: component.output.clone(),
            path: artifact,
        },
        patches,
    })
}

fn copy_prebuilt(
    config: &PipelineConfig,
    component: &PrebuiltComponent,
    work_dir: &Path,
    progress: &mut ComponentBuild,
) -> Result<ComponentOutput, PipelineError> {
    let source = TreeGuard::new(config.vendor_dir()).resolve(&component.source)?;
    if !source.is_file() {
        return Err(PipelineError::MissingSource {
            what: "prebuilt model",
            path: source,
        });
    }

    let artifact = TreeGuard::new(work_dir).resolve(&component.output)?;
    fs::copy(&source, &artifact).map_err(|e| PipelineError::io(&artifact, e))?;
    progress.advance(BuildStage::Verified);

    Ok(ComponentOutput {
        record: ComponentRecord {
            name: component.name.clone(),
            mode: "copy-prebuilt".to_string(),
            source: component.source.clone(),
            entry: None,
            output: component.output.clone(),
            patches: Vec::new(),
        },
        artifact: BuiltArtifact {
            output: component.output.clone(),
            path: artifact,
        },
        patches: Vec::new(),
    })
}

/// Write the generated compile script next to its lexicon.
pub(super) fn synthesize_entry(guard: &TreeGuard, lexicon: &str, script: &str) -> Result<(), PipelineError> {
    let lexicon_path = guard.resolve(lexicon)?;
    if !lexicon_path.is_file() {
        return Err(PipelineError::MissingSource {
            what: "lexicon for generated entry script",
            path: lexicon_path,
        });
    }
    let script_path = guard.resolve(script)?;
    fs::write(&script_path, lexicon_script(lexicon)).map_err(|e| PipelineError::io(&script_path, e))?;
    tracing::debug!(script = %script_path.display(), "generated entry script");
    Ok(())
}
