use super::fixture::Fixture;
use super::RegressionFailure;
use crate::error::PipelineError;
use crate::lookup::{Direction, Lookup};
use std::collections::HashSet;
use std::path::Path;

/// Results shown in an inverse-miss message.
const MISS_SAMPLE: usize = 5;

/// Counts from a passing consistency run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsistencySummary {
    pub inverse_checks: usize,
    pub forward_good: usize,
    pub rejected_bad: usize,
    pub leaked_bad: usize,
    /// Words checked against the dictionary, when dictionary checking ran
    pub dictionary_checked: Option<usize>,
}

/// Check `fixture` against the model at `artifact`.
///
/// Runs the inverse, must-recognize and must-reject checks in that order,
/// then the dictionary checks when a dictionary is given. The first failing
/// check ends the run.
pub fn check_fixture(
    lookup: &dyn Lookup,
    artifact: &Path,
    fixture: &Fixture,
    dictionary: Option<&HashSet<String>>,
) -> Result<ConsistencySummary, PipelineError> {
    let analyses: Vec<String> = fixture
        .inverse_must_include
        .iter()
        .map(|pair| pair.analysis.clone())
        .collect();
    let generated = lookup.lookup(artifact, &analyses, Direction::Inverse)?;
    for pair in &fixture.inverse_must_include {
        let results = generated.results(&pair.analysis);
        if !results.iter().any(|r| *r == pair.surface) {
            return Err(RegressionFailure::InverseMiss {
                analysis: pair.analysis.clone(),
                expected: pair.surface.clone(),
                sample: closest(results, &pair.surface),
            }
            .into());
        }
    }

    let recognized = lookup.lookup(artifact, &fixture.analysis_must_recognize, Direction::Forward)?;
    if let Some(surface) = fixture
        .analysis_must_recognize
        .iter()
        .find(|surface| !recognized.is_recognized(surface))
    {
        return Err(RegressionFailure::ForwardMiss {
            surface: surface.clone(),
        }
        .into());
    }

    let rejected = lookup.lookup(artifact, &fixture.analysis_should_reject, Direction::Forward)?;
    let (leaked, refused): (Vec<&String>, Vec<&String>) = fixture
        .analysis_should_reject
        .iter()
        .partition(|surface| rejected.is_recognized(surface));

    if !leaked.is_empty() {
        let leaked: Vec<String> = leaked.into_iter().cloned().collect();
        let contaminated: Vec<String> = dictionary
            .map(|words| {
                leaked
                    .iter()
                    .filter(|form| words.contains(form.as_str()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if contaminated.is_empty() {
            return Err(RegressionFailure::Leak { forms: leaked }.into());
        }
        return Err(RegressionFailure::Contamination {
            contaminated,
            leaked,
        }
        .into());
    }

    let dictionary_checked = match dictionary {
        Some(words) => Some(check_dictionary(fixture, words)?),
        None => None,
    };

    Ok(ConsistencySummary {
        inverse_checks: fixture.inverse_must_include.len(),
        forward_good: fixture.analysis_must_recognize.len(),
        rejected_bad: refused.len(),
        leaked_bad: leaked.len(),
        dictionary_checked,
    })
}

fn check_dictionary(fixture: &Fixture, words: &HashSet<String>) -> Result<usize, RegressionFailure> {
    for word in &fixture.dictionary_must_include {
        if !words.contains(word) {
            return Err(RegressionFailure::Dictionary {
                word: word.clone(),
                expected_present: true,
            });
        }
    }
    for word in &fixture.dictionary_must_exclude {
        if words.contains(word) {
            return Err(RegressionFailure::Dictionary {
                word: word.clone(),
                expected_present: false,
            });
        }
    }
    Ok(fixture.dictionary_must_include.len() + fixture.dictionary_must_exclude.len())
}

/// Up to [`MISS_SAMPLE`] distinct results, closest to `expected` first.
fn closest(results: &[String], expected: &str) -> Vec<String> {
    let mut distinct: Vec<&String> = results.iter().collect();
    distinct.sort();
    distinct.dedup();
    distinct.sort_by_key(|r| strsim::levenshtein(r, expected));
    distinct.into_iter().take(MISS_SAMPLE).cloned().collect()
}
