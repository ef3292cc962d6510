//! Shared workspace fixtures and in-process tool fakes.

use solmaalai_fst::compiler::BuildBackend;
use solmaalai_fst::config::{self, PipelineConfig};
use solmaalai_fst::hash::tree_digest;
use solmaalai_fst::lookup::{parse_lookup_output, Direction, Lookup, LookupTable};
use solmaalai_fst::PipelineError;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const NOUNS_LEXC: &str = "\
LEXICON Root
Nouns ;

LEXICON C1Sg
அம்மா C1Sg_inf ;
அப்பா C1Sg_inf ;

LEXICON C9Sg
மரம் C9Sg_inf ;
";

/// Adds a new C9Sg lemma.
pub const ADD_KULAM_PATCH: &str = "\
--- a/Nouns.lexc
+++ b/Nouns.lexc
@@ -8,2 +8,3 @@
 LEXICON C9Sg
 மரம் C9Sg_inf ;
+குளம் C9Sg_inf ;
";

/// Lists அம்மா under C9Sg as well as C1Sg.
pub const DUPLICATE_CLASS_PATCH: &str = "\
--- a/Nouns.lexc
+++ b/Nouns.lexc
@@ -8,2 +8,3 @@
 LEXICON C9Sg
 மரம் C9Sg_inf ;
+அம்மா C9Sg_inf ;
";

/// Context that no longer exists upstream.
pub const STALE_PATCH: &str = "\
--- a/Nouns.lexc
+++ b/Nouns.lexc
@@ -4,2 +4,2 @@
 LEXICON C1Sg
-அக்கா C1Sg_inf ;
+அக்கா C2Sg_inf ;
";

pub fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, content) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

/// A project root with vendored archives, a prebuilt model and a patch
/// directory. Patches are written separately with [`Workspace::patch`].
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let archives = root.join("vendor/thamizhi-morph/foma");

        write_zip(
            &archives.join("ThamizhiMorph-Nouns.zip"),
            &[
                ("Nouns.lexc", NOUNS_LEXC),
                ("tamil-noun.foma", "read lexc Nouns.lexc\nregex Root;\n"),
            ],
        );
        write_zip(
            &archives.join("ThamizhiMorph-Adjectives.zip"),
            &[("tamil-adjectives.lexc", "LEXICON Root\nநல்ல # ;\n")],
        );

        let prebuilt = root.join("vendor/thamizhi-morph/FST-Models");
        fs::create_dir_all(&prebuilt).unwrap();
        fs::write(prebuilt.join("pronoun.fst"), b"prebuilt pronoun model").unwrap();
        fs::create_dir_all(root.join("fst/patches")).unwrap();

        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    pub fn patch(&self, name: &str, text: &str) -> &Self {
        fs::write(self.path("fst/patches").join(name), text).unwrap();
        self
    }

    pub fn write(&self, rel: &str, content: &str) -> &Self {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
        self
    }

    /// Pronoun, noun and adjective, declared out of output-name order.
    pub fn config(&self, noun_patches: &[&str]) -> PipelineConfig {
        let patches = noun_patches
            .iter()
            .map(|p| format!("\"{p}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let toml = format!(
            r#"
[[components]]
name = "pronoun"
mode = "copy-prebuilt"
source = "FST-Models/pronoun.fst"
output = "pronoun.fst"

[[components]]
name = "noun"
mode = "compile"
archive = "ThamizhiMorph-Nouns.zip"
entry = "tamil-noun.foma"
output = "noun.fst"
patches = [{patches}]

[[components]]
name = "adj"
mode = "compile"
archive = "ThamizhiMorph-Adjectives.zip"
entry = {{ lexicon = "tamil-adjectives.lexc", script = "__generated_adj_build.foma" }}
output = "adj.fst"
"#
        );
        config::load_from_str(&toml, self.root()).unwrap()
    }
}

/// Compiler fake: the "model" is the entry name plus a digest of the
/// component tree, so any change to the patched source shows up in it.
#[derive(Default)]
pub struct FakeBackend {
    pub missing_tool: Option<String>,
    /// Components whose compile leaves an empty output
    pub empty_output: Option<String>,
    pub compiled: RefCell<Vec<String>>,
}

impl BuildBackend for FakeBackend {
    fn ensure_available(&self) -> Result<(), PipelineError> {
        match &self.missing_tool {
            Some(tool) => Err(PipelineError::MissingTool { tool: tool.clone() }),
            None => Ok(()),
        }
    }

    fn vendor_revision(&self, _vendor: &Path) -> Result<String, PipelineError> {
        Ok("4f1c2e9d0b7a".to_string())
    }

    fn compile(&self, work_dir: &Path, entry: &str, output: &str) -> Result<(), PipelineError> {
        self.compiled.borrow_mut().push(entry.to_string());
        let body = if self.empty_output.as_deref() == Some(output) {
            String::new()
        } else {
            format!("{entry}\n{}\n", tree_digest(work_dir).unwrap())
        };
        fs::write(work_dir.join(output), body).unwrap();
        Ok(())
    }
}

/// Lookup fake answering from fixed tables; unknown queries get `+?`.
#[derive(Default)]
pub struct FakeLookup {
    answers: HashMap<(Direction, String), Vec<String>>,
    pub calls: RefCell<usize>,
}

impl FakeLookup {
    pub fn with(mut self, direction: Direction, query: &str, results: &[&str]) -> Self {
        self.answers.insert(
            (direction, query.to_string()),
            results.iter().map(|r| r.to_string()).collect(),
        );
        self
    }
}

impl Lookup for FakeLookup {
    fn lookup(
        &self,
        _artifact: &Path,
        queries: &[String],
        direction: Direction,
    ) -> Result<LookupTable, PipelineError> {
        *self.calls.borrow_mut() += 1;
        let mut stdout = String::new();
        for query in queries {
            match self.answers.get(&(direction, query.clone())) {
                Some(results) => {
                    for result in results {
                        stdout.push_str(&format!("{query}\t{result}\n"));
                    }
                }
                None => stdout.push_str(&format!("{query}\t+?\n")),
            }
            stdout.push('\n');
        }
        Ok(parse_lookup_output(queries, &stdout))
    }
}
