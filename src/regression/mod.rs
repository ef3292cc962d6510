//! Fixture-driven regression checks for built models.
//!
//! A run first rebuilds the lexicon component's patched source in a
//! throwaway directory and rejects lemmas listed under more than one
//! inflection class. It then checks the built model against the curated
//! fixture with forward and inverse lookups, and optionally checks the
//! published dictionary.

pub mod consistency;
pub mod fixture;
pub mod lexicon;

pub use consistency::{check_fixture, ConsistencySummary};
pub use fixture::{Fixture, InversePair};
pub use lexicon::{
    find_duplicate_classes, scan, scan_patched_lexicon, ClassScan, DuplicateClass, LexiconEvent,
};

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::lookup::{Lookup, NO_ANALYSIS};
use crate::wordlist::{read_word_set, require_file};
use thiserror::Error;

/// Entries quoted in list-style failure messages.
const PREVIEW_LIMIT: usize = 20;

/// A model or dictionary that does not meet its fixture.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegressionFailure {
    #[error(
        "lexicon class duplicates detected after patches: {}",
        preview_duplicates(.duplicates)
    )]
    DuplicateClasses { duplicates: Vec<DuplicateClass> },

    #[error("inverse miss: {analysis} did not produce {expected} (got {sample:?})")]
    InverseMiss {
        analysis: String,
        expected: String,
        sample: Vec<String>,
    },

    #[error("forward analysis miss: {surface} returned {}", NO_ANALYSIS)]
    ForwardMiss { surface: String },

    #[error(
        "forward analysis unexpectedly accepted forbidden forms: {}",
        preview_forms(.forms)
    )]
    Leak { forms: Vec<String> },

    /// `contaminated` is the subset of `leaked` found in the dictionary.
    #[error(
        "leaked bad forms accepted by the model and present in the dictionary: {}; all leaked forms: {}",
        preview_forms(.contaminated),
        preview_forms(.leaked)
    )]
    Contamination {
        contaminated: Vec<String>,
        leaked: Vec<String>,
    },

    #[error("{}", dictionary_message(.word, .expected_present))]
    Dictionary { word: String, expected_present: bool },
}

fn preview_duplicates(duplicates: &[DuplicateClass]) -> String {
    preview(duplicates.iter().map(DuplicateClass::summary))
}

fn preview_forms(forms: &[String]) -> String {
    preview(forms.iter().cloned())
}

fn preview(items: impl ExactSizeIterator<Item = String>) -> String {
    let total = items.len();
    let mut shown: Vec<String> = items.take(PREVIEW_LIMIT).collect();
    if total > PREVIEW_LIMIT {
        shown.push(format!("... ({} more)", total - PREVIEW_LIMIT));
    }
    shown.join(", ")
}

fn dictionary_message(word: &str, expected_present: &bool) -> String {
    if *expected_present {
        format!("dictionary missing expected word: {word}")
    } else {
        format!("dictionary contains forbidden word: {word}")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RegressionOptions {
    /// Also check the dictionary include/exclude lists and contamination
    pub check_dictionary: bool,
}

/// Counts reported by a passing run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegressionSummary {
    /// Distinct lemmas in whitelisted lexicon sections
    pub lexicon_lemmas: usize,
    pub consistency: ConsistencySummary,
}

/// Run every regression check configured in `config.regression`.
pub fn run_regressions(
    config: &PipelineConfig,
    lookup: &dyn Lookup,
    options: RegressionOptions,
) -> Result<RegressionSummary, PipelineError> {
    let settings = &config.regression;
    let fixture_path = config.resolve(&settings.fixture);
    let artifact = config.resolve(&settings.artifact);

    require_file(&fixture_path, "regression fixture")?;
    require_file(&artifact, "built model")?;

    let scan = scan_patched_lexicon(config)?;
    if !scan.duplicates.is_empty() {
        return Err(RegressionFailure::DuplicateClasses {
            duplicates: scan.duplicates,
        }
        .into());
    }

    let fixture = Fixture::load(&fixture_path)?;
    let dictionary = if options.check_dictionary {
        let path = config.resolve(&settings.dictionary);
        require_file(&path, "dictionary")?;
        Some(read_word_set(&path)?)
    } else {
        None
    };

    let consistency = check_fixture(lookup, &artifact, &fixture, dictionary.as_ref())?;
    tracing::info!(
        inverse = consistency.inverse_checks,
        forward_good = consistency.forward_good,
        rejected_bad = consistency.rejected_bad,
        "regressions passed"
    );

    Ok(RegressionSummary {
        lexicon_lemmas: scan.lemmas,
        consistency,
    })
}
