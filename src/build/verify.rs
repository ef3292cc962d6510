use super::component::synthesize_entry;
use crate::archive;
use crate::config::{CompileComponent, ComponentDescriptor, EntryPoint, PipelineConfig};
use crate::error::PipelineError;
use crate::patch::{PatchApplier, PatchFile};
use crate::safety::TreeGuard;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// One file as a patch changes it. `None` means absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// Path inside the component tree
    pub path: PathBuf,
    pub before: Option<String>,
    pub after: Option<String>,
}

/// What one patch does to a pristine component tree.
#[derive(Debug, Clone)]
pub struct PatchPreview {
    pub component: String,
    pub patch: String,
    pub changes: Vec<FileChange>,
}

/// Replay every patched component's series on a throwaway extraction and
/// report what each patch changes. Nothing in the build tree is touched.
///
/// With `only`, just that component is checked.
pub fn verify_patches(
    config: &PipelineConfig,
    only: Option<&str>,
) -> Result<Vec<PatchPreview>, PipelineError> {
    let selected: Vec<&CompileComponent> = config
        .components
        .iter()
        .filter_map(|descriptor| match descriptor {
            ComponentDescriptor::Compile(c) => Some(c),
            ComponentDescriptor::CopyPrebuilt(_) => None,
        })
        .filter(|c| only.map_or(true, |name| c.name == name))
        .collect();

    if let Some(name) = only {
        if selected.is_empty() {
            return Err(PipelineError::UnknownComponent {
                name: name.to_string(),
            });
        }
    }

    let mut previews = Vec::new();
    for component in selected.into_iter().filter(|c| !c.patches.is_empty()) {
        previews.extend(preview_component(config, component)?);
    }
    Ok(previews)
}

fn preview_component(
    config: &PipelineConfig,
    component: &CompileComponent,
) -> Result<Vec<PatchPreview>, PipelineError> {
    let work = tempfile::tempdir().map_err(|e| PipelineError::io(std::env::temp_dir(), e))?;
    archive::extract(&config.archive_path(&component.archive), work.path())?;
    if let EntryPoint::Synthesized { lexicon, script } = &component.entry {
        synthesize_entry(&TreeGuard::new(work.path()), lexicon, script)?;
    }

    let mut applier = PatchApplier::new(work.path());
    let mut previews = Vec::with_capacity(component.patches.len());

    for name in &component.patches {
        let patch = PatchFile::load(&config.patch_dir(), name)?;
        let plan = applier.check(&patch)?;

        let mut changes = Vec::new();
        for path in plan.touched() {
            changes.push(FileChange {
                path: path.strip_prefix(work.path()).unwrap_or(path).to_path_buf(),
                before: read_optional(path)?,
                after: plan.content(path).map(str::to_string),
            });
        }
        applier.apply(&patch)?;

        previews.push(PatchPreview {
            component: component.name.clone(),
            patch: name.clone(),
            changes,
        });
    }
    Ok(previews)
}

fn read_optional(path: &Path) -> Result<Option<String>, PipelineError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(PipelineError::io(path, err)),
    }
}
