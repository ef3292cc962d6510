//! Solmaalai FST: build and validate Tamil morphology models
//!
//! Builds finite-state morphological analyzers from the vendored
//! ThamizhiMorph sources and checks the result against curated fixtures.
//!
//! # Architecture
//!
//! - [`patch`] applies ordered unified diffs to an extracted source tree.
//!   Every hunk lowers to the byte-span [`Edit`] primitive; a whole patch is
//!   checked in memory before any file is written.
//! - [`build`] drives each component through extraction, patching and
//!   compilation, then [`manifest`] distributes the models and records their
//!   provenance.
//! - [`regression`] and [`audit`] query built models through the [`Lookup`]
//!   trait.
//!
//! The external `foma`/`flookup`/`git` tools sit behind [`BuildBackend`] and
//! [`Lookup`], so every stage can run against in-process fakes.
//!
//! # Safety
//!
//! - Archive entries and diff targets are confined to their tree
//! - Atomic file writes (tempfile + fsync + rename)
//! - A failed patch series is rolled back
//! - No manifest unless every component was built and distributed
//!
//! # Example
//!
//! ```no_run
//! use solmaalai_fst::build::{build_all, BuildOptions};
//! use solmaalai_fst::compiler::ExternalTools;
//! use std::path::Path;
//!
//! let config = solmaalai_fst::config::resolve(Path::new("."), None)?;
//! let backend = ExternalTools::new(config.tools.clone());
//! let outcome = build_all(&config, &backend, BuildOptions::default())?;
//! println!("built {} models", outcome.manifest.outputs.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod archive;
pub mod audit;
pub mod build;
pub mod compiler;
pub mod config;
pub mod edit;
pub mod error;
pub mod hash;
pub mod lookup;
pub mod manifest;
pub mod patch;
pub mod process;
pub mod regression;
pub mod safety;
pub mod telemetry;
pub mod wordlist;

// Re-exports
pub use audit::{run_audit, AuditConfig, AuditReport, AuditRequest};
pub use build::{build_all, verify_patches, BuildOptions, BuildOutcome, BuildStage};
pub use compiler::{BuildBackend, ExternalTools};
pub use config::{load_from_path, load_from_str, ConfigError, PipelineConfig};
pub use edit::{Edit, EditError, EditVerification};
pub use error::PipelineError;
pub use lookup::{Direction, Flookup, Lookup, LookupResult, LookupTable, NO_ANALYSIS};
pub use manifest::BuildManifest;
pub use patch::{apply_series, PatchApplier, PatchError, PatchRecord};
pub use regression::{run_regressions, RegressionFailure, RegressionOptions, RegressionSummary};
pub use safety::{SafetyError, TreeGuard};
