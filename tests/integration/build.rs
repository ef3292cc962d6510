//! Build pipeline: extraction, patching, compilation, distribution and the
//! manifest.

use crate::common::*;
use solmaalai_fst::build::{build_all, verify_patches, BuildOptions, BuildStage};
use solmaalai_fst::manifest::BuildManifest;
use solmaalai_fst::PipelineError;
use std::fs;

fn build(ws: &Workspace, patches: &[&str], backend: &FakeBackend) -> Result<solmaalai_fst::BuildOutcome, PipelineError> {
    build_all(&ws.config(patches), backend, BuildOptions::default())
}

// ============================================================================
// Successful builds
// ============================================================================

#[test]
fn test_build_distributes_sorted_outputs() {
    let ws = Workspace::new();
    ws.patch("0001-add-kulam.patch", ADD_KULAM_PATCH);
    let backend = FakeBackend::default();

    let outcome = build(&ws, &["0001-add-kulam.patch"], &backend).unwrap();
    let manifest = &outcome.manifest;

    let files: Vec<&str> = manifest.outputs.iter().map(|o| o.file.as_str()).collect();
    assert_eq!(files, ["adj.fst", "noun.fst", "pronoun.fst"]);

    // Components keep declaration order
    let names: Vec<&str> = manifest.components.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["pronoun", "noun", "adj"]);

    for output in &manifest.outputs {
        assert_eq!(
            output.copied_to,
            ["build/fst-models", "static-word-list/fst-models", "server/fst-models"]
        );
        for dest in &output.copied_to {
            assert!(ws.path(dest).join(&output.file).is_file());
        }
    }
    assert_eq!(
        fs::read(ws.path("server/fst-models/pronoun.fst")).unwrap(),
        b"prebuilt pronoun model"
    );

    assert_eq!(manifest.patches.len(), 1);
    assert_eq!(manifest.patches[0].file, "fst/patches/0001-add-kulam.patch");
    assert_eq!(manifest.patches[0].sha256.len(), 64);
    assert_eq!(manifest.vendor_revision.commit, "4f1c2e9d0b7a");
    assert_eq!(manifest.vendor_revision.path, "vendor/thamizhi-morph");

    assert!(outcome
        .stages
        .iter()
        .all(|build| build.stage() == BuildStage::Manifested));
    assert_eq!(outcome.manifest_path, ws.path("fst/build/manifest.json"));
    assert_eq!(&BuildManifest::read(&outcome.manifest_path).unwrap(), manifest);
}

#[test]
fn test_build_records_component_shapes() {
    let ws = Workspace::new();
    let outcome = build(&ws, &[], &FakeBackend::default()).unwrap();
    let components = &outcome.manifest.components;

    assert_eq!(components[0].mode, "copy-prebuilt");
    assert_eq!(components[0].source, "FST-Models/pronoun.fst");
    assert_eq!(components[0].entry, None);

    assert_eq!(components[1].mode, "compile");
    assert_eq!(components[1].source, "ThamizhiMorph-Nouns.zip");
    assert_eq!(components[1].entry.as_deref(), Some("tamil-noun.foma"));
    assert!(components[1].patches.is_empty());
    assert!(outcome.manifest.patches.is_empty());
}

#[test]
fn test_patched_source_reaches_compiler() {
    let ws = Workspace::new();
    ws.patch("0001-add-kulam.patch", ADD_KULAM_PATCH);
    build(&ws, &["0001-add-kulam.patch"], &FakeBackend::default()).unwrap();

    let lexicon = fs::read_to_string(ws.path("fst/build/.work/noun/Nouns.lexc")).unwrap();
    assert!(lexicon.contains("குளம் C9Sg_inf ;"));

    let unpatched = Workspace::new();
    build(&unpatched, &[], &FakeBackend::default()).unwrap();
    assert_ne!(
        fs::read(ws.path("build/fst-models/noun.fst")).unwrap(),
        fs::read(unpatched.path("build/fst-models/noun.fst")).unwrap()
    );
}

#[test]
fn test_synthesized_entry_script() {
    let ws = Workspace::new();
    let backend = FakeBackend::default();
    build(&ws, &[], &backend).unwrap();

    let script = fs::read_to_string(ws.path("fst/build/.work/adj/__generated_adj_build.foma")).unwrap();
    assert!(script.contains("tamil-adjectives.lexc"));
    assert_eq!(
        *backend.compiled.borrow(),
        ["tamil-noun.foma", "__generated_adj_build.foma"]
    );
}

#[test]
fn test_rebuild_is_reproducible() {
    let ws = Workspace::new();
    ws.patch("0001-add-kulam.patch", ADD_KULAM_PATCH);

    let first = build(&ws, &["0001-add-kulam.patch"], &FakeBackend::default()).unwrap();
    let model = fs::read(ws.path("build/fst-models/noun.fst")).unwrap();
    let second = build(&ws, &["0001-add-kulam.patch"], &FakeBackend::default()).unwrap();

    let mut a = first.manifest;
    let mut b = second.manifest;
    a.built_at.clear();
    b.built_at.clear();
    assert_eq!(a, b);
    assert_eq!(fs::read(ws.path("build/fst-models/noun.fst")).unwrap(), model);
}

#[test]
fn test_clean_option_controls_scratch_root() {
    let ws = Workspace::new();
    ws.write("fst/build/.work/stale/leftover.txt", "old");

    build_all(&ws.config(&[]), &FakeBackend::default(), BuildOptions { clean: false }).unwrap();
    assert!(ws.path("fst/build/.work/stale/leftover.txt").exists());

    build_all(&ws.config(&[]), &FakeBackend::default(), BuildOptions::default()).unwrap();
    assert!(!ws.path("fst/build/.work/stale").exists());
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_missing_tool_stops_before_work() {
    let ws = Workspace::new();
    let backend = FakeBackend {
        missing_tool: Some("foma".to_string()),
        ..FakeBackend::default()
    };

    let err = build(&ws, &[], &backend).unwrap_err();
    assert!(matches!(err, PipelineError::MissingTool { ref tool } if tool == "foma"));
    assert!(!ws.path("fst/build").exists());
    assert!(backend.compiled.borrow().is_empty());
}

#[test]
fn test_missing_vendor_checkout() {
    let ws = Workspace::new();
    fs::remove_dir_all(ws.path("vendor")).unwrap();

    let err = build(&ws, &[], &FakeBackend::default()).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::MissingSource {
            what: "vendor checkout",
            ..
        }
    ));
}

#[test]
fn test_missing_prebuilt_model() {
    let ws = Workspace::new();
    fs::remove_file(ws.path("vendor/thamizhi-morph/FST-Models/pronoun.fst")).unwrap();

    let err = build(&ws, &[], &FakeBackend::default()).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::MissingSource {
            what: "prebuilt model",
            ..
        }
    ));
    assert!(!ws.path("fst/build/manifest.json").exists());
}

#[test]
fn test_missing_archive_fails_build() {
    let ws = Workspace::new();
    fs::remove_file(ws.path("vendor/thamizhi-morph/foma/ThamizhiMorph-Adjectives.zip")).unwrap();

    assert!(build(&ws, &[], &FakeBackend::default()).is_err());
    assert!(!ws.path("fst/build/manifest.json").exists());
    assert!(!ws.path("build/fst-models/noun.fst").exists());
}

#[test]
fn test_failed_patch_rolls_back_series() {
    let ws = Workspace::new();
    ws.patch("0001-add-kulam.patch", ADD_KULAM_PATCH)
        .patch("0002-stale.patch", STALE_PATCH);
    let backend = FakeBackend::default();

    let err = build(&ws, &["0001-add-kulam.patch", "0002-stale.patch"], &backend).unwrap_err();
    match err {
        PipelineError::PatchApplication { patch, .. } => assert_eq!(patch, "0002-stale.patch"),
        other => panic!("expected patch failure, got {other:?}"),
    }

    let lexicon = fs::read_to_string(ws.path("fst/build/.work/noun/Nouns.lexc")).unwrap();
    assert_eq!(lexicon, NOUNS_LEXC);
    assert_eq!(*backend.compiled.borrow(), Vec::<String>::new());
    assert!(!ws.path("fst/build/manifest.json").exists());
}

#[test]
fn test_missing_patch_file() {
    let ws = Workspace::new();
    let err = build(&ws, &["0404-missing.patch"], &FakeBackend::default()).unwrap_err();
    assert!(err.to_string().contains("0404-missing.patch"));
}

#[test]
fn test_empty_output_is_rejected() {
    let ws = Workspace::new();
    let backend = FakeBackend {
        empty_output: Some("noun.fst".to_string()),
        ..FakeBackend::default()
    };

    let err = build(&ws, &[], &backend).unwrap_err();
    match err {
        PipelineError::EmptyOutput { path } => assert!(path.ends_with("noun.fst")),
        other => panic!("expected empty output, got {other:?}"),
    }
    assert!(!ws.path("build/fst-models/pronoun.fst").exists());
}

// ============================================================================
// Patch verification
// ============================================================================

#[test]
fn test_verify_previews_changes() {
    let ws = Workspace::new();
    ws.patch("0001-add-kulam.patch", ADD_KULAM_PATCH);

    let previews = verify_patches(&ws.config(&["0001-add-kulam.patch"]), None).unwrap();
    assert_eq!(previews.len(), 1);
    assert_eq!(previews[0].component, "noun");
    assert_eq!(previews[0].patch, "0001-add-kulam.patch");

    let change = &previews[0].changes[0];
    assert_eq!(change.path, std::path::Path::new("Nouns.lexc"));
    assert_eq!(change.before.as_deref(), Some(NOUNS_LEXC));
    assert!(change.after.as_deref().unwrap().ends_with("குளம் C9Sg_inf ;\n"));

    // Verification never touches the build tree
    assert!(!ws.path("fst/build").exists());
}

#[test]
fn test_verify_unknown_component() {
    let ws = Workspace::new();
    let err = verify_patches(&ws.config(&[]), Some("verb-c99")).unwrap_err();
    assert!(matches!(err, PipelineError::UnknownComponent { ref name } if name == "verb-c99"));
}

#[test]
fn test_verify_reports_stale_patch() {
    let ws = Workspace::new();
    ws.patch("0002-stale.patch", STALE_PATCH);
    let err = verify_patches(&ws.config(&["0002-stale.patch"]), Some("noun")).unwrap_err();
    assert!(matches!(err, PipelineError::PatchApplication { .. }));
}
