//! lexc source scanning and the duplicate inflection-class check.

use crate::archive;
use crate::config::{ConfigError, PipelineConfig, ValidationError, ValidationIssue};
use crate::error::PipelineError;
use crate::patch::apply_series;
use crate::safety::TreeGuard;
use crate::wordlist::require_file;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::iter::Enumerate;
use std::str::Lines;

/// One event from [`LexiconScanner`]. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexiconEvent<'a> {
    /// A `LEXICON <name>` header
    Section { name: &'a str, line: usize },
    /// A continuation entry inside the current section
    Entry {
        section: &'a str,
        lemma: &'a str,
        line: usize,
    },
}

/// Line-driven state machine over lexc text. The only state is the
/// current section; entries before the first header are ignored.
pub struct LexiconScanner<'a> {
    lines: Enumerate<Lines<'a>>,
    section: Option<&'a str>,
}

pub fn scan(text: &str) -> LexiconScanner<'_> {
    LexiconScanner {
        lines: text.lines().enumerate(),
        section: None,
    }
}

impl<'a> Iterator for LexiconScanner<'a> {
    type Item = LexiconEvent<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        for (index, raw) in self.lines.by_ref() {
            let line = raw.trim();
            if let Some(name) = section_header(line) {
                self.section = Some(name);
                return Some(LexiconEvent::Section {
                    name,
                    line: index + 1,
                });
            }
            let Some(section) = self.section else {
                continue;
            };
            if let Some(lemma) = entry_lemma(line) {
                return Some(LexiconEvent::Entry {
                    section,
                    lemma,
                    line: index + 1,
                });
            }
        }
        None
    }
}

fn section_header(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("LEXICON")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    rest.split_whitespace().next()
}

fn entry_lemma(line: &str) -> Option<&str> {
    if line.is_empty() || line.starts_with('!') || line.starts_with('#') {
        return None;
    }
    let (before, _) = line.split_once(';')?;
    let lemma = before.split_whitespace().next()?;
    if lemma.starts_with('+') || lemma == "#" {
        return None;
    }
    Some(lemma)
}

/// A lemma listed under more than one inflection class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateClass {
    pub lemma: String,
    /// Sorted class names
    pub classes: Vec<String>,
}

impl DuplicateClass {
    /// `lemma:ClassA/ClassB`
    pub fn summary(&self) -> String {
        format!("{}:{}", self.lemma, self.classes.join("/"))
    }
}

/// Result of scanning one lexicon.
#[derive(Debug, Clone, Default)]
pub struct ClassScan {
    /// Distinct lemmas seen in whitelisted sections
    pub lemmas: usize,
    /// Sorted by lemma
    pub duplicates: Vec<DuplicateClass>,
}

/// Collect the class set of every lemma in a `whitelist` section and report
/// lemmas with more than one class.
pub fn find_duplicate_classes(text: &str, whitelist: &[String]) -> ClassScan {
    let allowed: BTreeSet<&str> = whitelist.iter().map(String::as_str).collect();
    let mut classes: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

    for event in scan(text) {
        if let LexiconEvent::Entry { section, lemma, .. } = event {
            if allowed.contains(section) {
                classes.entry(lemma).or_default().insert(section);
            }
        }
    }

    let duplicates = classes
        .iter()
        .filter(|(_, set)| set.len() > 1)
        .map(|(lemma, set)| DuplicateClass {
            lemma: lemma.to_string(),
            classes: set.iter().map(|c| c.to_string()).collect(),
        })
        .collect();

    ClassScan {
        lemmas: classes.len(),
        duplicates,
    }
}

/// Re-extract the lexicon component into a throwaway directory, replay its
/// patches and scan the lexicon file.
///
/// The persistent build tree is never consulted.
pub fn scan_patched_lexicon(config: &PipelineConfig) -> Result<ClassScan, PipelineError> {
    let component = config.lexicon_component().ok_or_else(|| {
        ConfigError::Validation {
            path: None,
            source: ValidationError {
                issues: vec![ValidationIssue::UnknownLexiconComponent {
                    name: config.regression.lexicon_component.clone(),
                }],
            },
        }
    })?;

    let archive_path = config.archive_path(&component.archive);
    require_file(&archive_path, "lexicon source archive")?;

    let work = tempfile::tempdir().map_err(|e| PipelineError::io(std::env::temp_dir(), e))?;
    archive::extract(&archive_path, work.path())?;
    apply_series(
        work.path(),
        &config.patch_dir(),
        &config.paths.patches,
        &component.patches,
    )?;

    let lexicon = TreeGuard::new(work.path()).resolve(&config.regression.lexicon_file)?;
    require_file(&lexicon, "patched lexicon")?;
    let bytes = fs::read(&lexicon).map_err(|e| PipelineError::io(&lexicon, e))?;
    let text = String::from_utf8_lossy(&bytes);

    let scan = find_duplicate_classes(&text, &config.regression.class_whitelist);
    tracing::info!(
        component = %component.name,
        lemmas = scan.lemmas,
        duplicates = scan.duplicates.len(),
        "scanned lexicon classes"
    );
    Ok(scan)
}
