//! Typed access to FST lookups.
//!
//! The lookup engine speaks a line protocol: one query per line on stdin,
//! one `query<TAB>result` line per result on stdout. [`parse_lookup_output`]
//! is the only place that protocol is read; everything else works with
//! [`LookupTable`].

use crate::config::Tools;
use crate::error::PipelineError;
use crate::process;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

/// Result the lookup engine prints when a query has no analysis.
pub const NO_ANALYSIS: &str = "+?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Surface form to analyses
    Forward,
    /// Analysis to surface forms
    #[default]
    Inverse,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Inverse => "inverse",
        }
    }
}

/// Every result the engine produced for one query, in output order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupResult {
    pub query: String,
    pub results: Vec<String>,
}

impl LookupResult {
    /// Results that are real answers: neither empty nor [`NO_ANALYSIS`].
    pub fn answers(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .map(String::as_str)
            .filter(|r| !r.is_empty() && *r != NO_ANALYSIS)
    }

    pub fn is_recognized(&self) -> bool {
        self.answers().next().is_some()
    }
}

/// Lookup results keyed by query, iterated in first-query order.
#[derive(Debug, Clone, Default)]
pub struct LookupTable {
    entries: Vec<LookupResult>,
    index: HashMap<String, usize>,
}

impl LookupTable {
    /// A table with an empty result list for every distinct query.
    pub fn new<S: AsRef<str>>(queries: &[S]) -> Self {
        let mut table = Self::default();
        for query in queries {
            let query = query.as_ref();
            if table.index.contains_key(query) {
                continue;
            }
            table.index.insert(query.to_string(), table.entries.len());
            table.entries.push(LookupResult {
                query: query.to_string(),
                results: Vec::new(),
            });
        }
        table
    }

    pub fn get(&self, query: &str) -> Option<&LookupResult> {
        self.index.get(query).map(|&i| &self.entries[i])
    }

    /// Results for `query`, empty when it was never asked.
    pub fn results(&self, query: &str) -> &[String] {
        self.get(query).map(|r| r.results.as_slice()).unwrap_or(&[])
    }

    pub fn is_recognized(&self, query: &str) -> bool {
        self.get(query).is_some_and(LookupResult::is_recognized)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LookupResult> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record one result line; answers for queries not in the table are dropped.
    fn push(&mut self, query: &str, result: &str) {
        if let Some(&i) = self.index.get(query) {
            self.entries[i].results.push(result.to_string());
        }
    }

    fn absorb(&mut self, other: LookupTable) {
        for entry in other.entries {
            for result in entry.results {
                self.push(&entry.query, &result);
            }
        }
    }
}

/// Turn raw engine output into a table for `queries`.
///
/// Lines without a tab are ignored; the result is everything after the first
/// tab, trimmed. Output lines for queries that were not asked are dropped.
pub fn parse_lookup_output<S: AsRef<str>>(queries: &[S], stdout: &str) -> LookupTable {
    let mut table = LookupTable::new(queries);
    for line in stdout.lines() {
        if let Some((query, result)) = line.split_once('\t') {
            table.push(query, result.trim());
        }
    }
    table
}

/// Anything that can answer lookups against a compiled model.
pub trait Lookup {
    fn lookup(
        &self,
        artifact: &Path,
        queries: &[String],
        direction: Direction,
    ) -> Result<LookupTable, PipelineError>;
}

/// The `flookup` command-line engine, driven in batches.
#[derive(Debug, Clone)]
pub struct Flookup {
    program: String,
    batch_size: usize,
    timeout: Duration,
}

impl Flookup {
    pub fn new(tools: &Tools) -> Self {
        Self {
            program: tools.lookup.clone(),
            batch_size: tools.lookup_batch_size.max(1),
            timeout: tools.lookup_timeout(),
        }
    }

    fn run_batch(
        &self,
        artifact: &Path,
        batch: &[String],
        direction: Direction,
    ) -> Result<Option<LookupTable>, PipelineError> {
        let mut cmd = Command::new(&self.program);
        if direction == Direction::Inverse {
            cmd.arg("-i");
        }
        cmd.arg(artifact);

        let mut input = batch.join("\n");
        input.push('\n');

        let output = process::run_with_timeout(cmd, &self.program, Some(&input), self.timeout)?;
        Ok(output.map(|out| parse_lookup_output(batch, &out.stdout)))
    }
}

impl Lookup for Flookup {
    fn lookup(
        &self,
        artifact: &Path,
        queries: &[String],
        direction: Direction,
    ) -> Result<LookupTable, PipelineError> {
        let mut table = LookupTable::new(queries);
        let batches = queries.chunks(self.batch_size);
        let total = batches.len();

        for (index, batch) in batches.enumerate() {
            match self.run_batch(artifact, batch, direction)? {
                Some(parsed) => table.absorb(parsed),
                None => tracing::warn!(
                    artifact = %artifact.display(),
                    batch = index + 1,
                    batches = total,
                    queries = batch.len(),
                    timeout_secs = self.timeout.as_secs(),
                    "lookup batch timed out; its queries get no results"
                ),
            }
        }

        tracing::debug!(
            artifact = %artifact.display(),
            direction = direction.as_str(),
            queries = table.len(),
            "lookup finished"
        );
        Ok(table)
    }
}
