//! Over- and under-generation statistics for a built model.
//!
//! An audit generates forms for a lemma list, then compares what came out
//! against the dictionary, an optional corpus and the known-good and
//! known-bad lists. It reports numbers and never fails on what it finds;
//! only unreadable inputs are errors.

use crate::config::PipelineConfig;
use crate::edit::write_output;
use crate::error::PipelineError;
use crate::lookup::{Direction, Lookup, LookupTable};
use crate::wordlist::{read_lines, read_word_set, require_file};
use chrono::{SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Characters kept by [`suffix_bucket`].
pub const SUFFIX_LEN: usize = 3;

/// Entries in the report's suffix histogram.
pub const TOP_SUFFIXES: usize = 50;

/// An audit definition, read from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Model path relative to the project root
    pub fst: String,
    #[serde(default)]
    pub mode: Direction,
    /// Analysis tags appended to every lemma in inverse mode
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub suspicious_patterns: Vec<String>,
}

impl AuditConfig {
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let text = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        serde_json::from_str(&text).map_err(|source| PipelineError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Inputs of one audit run, all absolute.
#[derive(Debug, Clone)]
pub struct AuditRequest {
    pub config: PathBuf,
    pub lemmas: PathBuf,
    pub dictionary: PathBuf,
    pub corpus: Option<PathBuf>,
    pub known_good: PathBuf,
    pub known_bad: PathBuf,
    /// Defaults to `<report_dir>/<config stem>-report.json`
    pub report: Option<PathBuf>,
}

impl AuditRequest {
    /// A request using the configured dictionary and known-good/bad lists.
    pub fn new(pipeline: &PipelineConfig, config: PathBuf, lemmas: PathBuf) -> Self {
        let settings = &pipeline.audit;
        Self {
            config,
            lemmas,
            dictionary: pipeline.resolve(&settings.dictionary),
            corpus: None,
            known_good: pipeline.resolve(&settings.known_good),
            known_bad: pipeline.resolve(&settings.known_bad),
            report: None,
        }
    }

    pub fn report_path(&self, pipeline: &PipelineConfig) -> PathBuf {
        if let Some(report) = &self.report {
            return report.clone();
        }
        let stem = self
            .config
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audit".to_string());
        pipeline
            .resolve(&pipeline.audit.report_dir)
            .join(format!("{stem}-report.json"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub generated_at: String,
    pub config: String,
    pub fst: String,
    pub mode: Direction,
    pub lemma_count: usize,
    pub query_count: usize,
    /// Every generated form, duplicates included
    pub generated_total: usize,
    pub generated_unique: usize,
    pub suffix_counts_top50: Vec<(String, usize)>,
    pub suspicious_hits: Vec<String>,
    pub suspicious_count: usize,
    pub not_in_dictionary_count: usize,
    pub not_in_dictionary_rate: Option<f64>,
    pub not_in_corpus_count: usize,
    pub not_in_corpus_rate: Option<f64>,
    pub known_good_missing: Vec<String>,
    pub known_bad_present: Vec<String>,
    pub per_query_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone)]
pub struct AuditOutcome {
    pub report: AuditReport,
    pub report_path: PathBuf,
}

/// Lookup queries for `lemmas`: every lemma with every tag (lemma-major) in
/// inverse mode, the bare lemmas in forward mode.
pub fn synthesize_queries(lemmas: &[String], tags: &[String], mode: Direction) -> Vec<String> {
    match mode {
        Direction::Forward => lemmas.to_vec(),
        Direction::Inverse => lemmas
            .iter()
            .flat_map(|lemma| tags.iter().map(move |tag| format!("{lemma}{tag}")))
            .collect(),
    }
}

/// The last [`SUFFIX_LEN`] characters of `word`, or all of a shorter word.
pub fn suffix_bucket(word: &str) -> &str {
    let count = word.chars().count();
    if count <= SUFFIX_LEN {
        return word;
    }
    let start = word
        .char_indices()
        .nth(count - SUFFIX_LEN)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &word[start..]
}

/// Most common suffix buckets, count descending then suffix ascending.
pub fn suffix_histogram<'a>(words: impl IntoIterator<Item = &'a str>, limit: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for word in words {
        *counts.entry(suffix_bucket(word)).or_default() += 1;
    }
    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(suffix, count)| (suffix.to_string(), count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(limit);
    ranked
}

/// Everything derived from the lookup output, before the reference lists
/// are consulted.
struct Generation {
    total: usize,
    unique: BTreeSet<String>,
    per_query: BTreeMap<String, usize>,
}

fn collect_generation(table: &LookupTable) -> Generation {
    let mut total = 0;
    let mut unique = BTreeSet::new();
    let mut per_query = BTreeMap::new();
    for entry in table.iter() {
        let answers: Vec<&str> = entry.answers().collect();
        total += answers.len();
        per_query.insert(entry.query.clone(), answers.len());
        unique.extend(answers.into_iter().map(str::to_string));
    }
    Generation {
        total,
        unique,
        per_query,
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, PipelineError> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| PipelineError::Pattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}

/// Forms absent from a non-empty reference, and their share of `generated`.
fn missing_from(generated: &BTreeSet<String>, reference: &HashSet<String>) -> (usize, Option<f64>) {
    if reference.is_empty() {
        return (0, None);
    }
    let missing = generated.iter().filter(|w| !reference.contains(*w)).count();
    let rate = (!generated.is_empty()).then(|| missing as f64 / generated.len() as f64);
    (missing, rate)
}

/// Run the audit described by `request` and write its report.
pub fn run_audit(
    pipeline: &PipelineConfig,
    lookup: &dyn Lookup,
    request: &AuditRequest,
) -> Result<AuditOutcome, PipelineError> {
    if !request.config.is_file() {
        return Err(PipelineError::MissingSource {
            what: "audit config",
            path: request.config.clone(),
        });
    }
    if !request.lemmas.is_file() {
        return Err(PipelineError::MissingSource {
            what: "lemma list",
            path: request.lemmas.clone(),
        });
    }

    let audit = AuditConfig::load(&request.config)?;
    let patterns = compile_patterns(&audit.suspicious_patterns)?;
    let fst = pipeline.resolve(&audit.fst);
    require_file(&fst, "audited model")?;

    let lemmas = read_lines(&request.lemmas)?;
    let queries = synthesize_queries(&lemmas, &audit.tags, audit.mode);
    tracing::info!(
        fst = %audit.fst,
        mode = audit.mode.as_str(),
        lemmas = lemmas.len(),
        queries = queries.len(),
        "running audit"
    );

    let table = lookup.lookup(&fst, &queries, audit.mode)?;
    let generation = collect_generation(&table);

    let dictionary = read_word_set(&request.dictionary)?;
    let corpus = match &request.corpus {
        Some(path) => read_word_set(path)?,
        None => HashSet::new(),
    };
    let known_good = read_word_set(&request.known_good)?;
    let known_bad = read_word_set(&request.known_bad)?;

    let suspicious_hits: Vec<String> = generation
        .unique
        .iter()
        .filter(|word| patterns.iter().any(|rx| rx.is_match(word)))
        .cloned()
        .collect();
    let (not_in_dictionary_count, not_in_dictionary_rate) = missing_from(&generation.unique, &dictionary);
    let (not_in_corpus_count, not_in_corpus_rate) = missing_from(&generation.unique, &corpus);

    let mut known_good_missing: Vec<String> = known_good
        .into_iter()
        .filter(|word| !generation.unique.contains(word))
        .collect();
    known_good_missing.sort();
    let mut known_bad_present: Vec<String> = known_bad
        .into_iter()
        .filter(|word| generation.unique.contains(word))
        .collect();
    known_bad_present.sort();

    let report = AuditReport {
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        config: pipeline.display_path(&request.config),
        fst: audit.fst.clone(),
        mode: audit.mode,
        lemma_count: lemmas.len(),
        query_count: queries.len(),
        generated_total: generation.total,
        generated_unique: generation.unique.len(),
        suffix_counts_top50: suffix_histogram(generation.unique.iter().map(String::as_str), TOP_SUFFIXES),
        suspicious_count: suspicious_hits.len(),
        suspicious_hits,
        not_in_dictionary_count,
        not_in_dictionary_rate,
        not_in_corpus_count,
        not_in_corpus_rate,
        known_good_missing,
        known_bad_present,
        per_query_counts: generation.per_query,
    };

    let report_path = request.report_path(pipeline);
    let mut json = serde_json::to_string_pretty(&report).map_err(|source| PipelineError::Json {
        path: report_path.clone(),
        source,
    })?;
    json.push('\n');
    write_output(&report_path, json.as_bytes())?;

    Ok(AuditOutcome {
        report,
        report_path,
    })
}
