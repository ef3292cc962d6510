//! Generation audits over a lemma list.

use crate::common::*;
use solmaalai_fst::audit::{run_audit, AuditReport, AuditRequest};
use solmaalai_fst::lookup::Direction;
use solmaalai_fst::PipelineError;
use std::fs;

const AUDIT_CONFIG: &str = r#"{
  "fst": "build/fst-models/noun.fst",
  "mode": "inverse",
  "tags": ["+noun", "+noun+acc"],
  "suspicious_patterns": ["ஐ$"]
}"#;

fn audit_workspace() -> Workspace {
    let ws = Workspace::new();
    ws.write("fst/audits/noun-audit.json", AUDIT_CONFIG)
        .write("fst/audits/lemmas.txt", "மரம்\n\nதமிழ்\n")
        .write("build/fst-models/noun.fst", "model")
        .write("public/tamil_dictionary.txt", "மரம்\nமரத்தை\nதமிழ்\nதமிழை\n")
        .write("fst/tests/fixtures/known_good.txt", "மரத்தை\nமரங்கள்\n")
        .write("fst/tests/fixtures/known_bad.txt", "மரம்ஐ\nதமிழ்ஐ\n");
    ws
}

fn generator() -> FakeLookup {
    FakeLookup::default()
        .with(Direction::Inverse, "மரம்+noun", &["மரம்"])
        .with(Direction::Inverse, "மரம்+noun+acc", &["மரத்தை", "மரம்ஐ"])
        .with(Direction::Inverse, "தமிழ்+noun", &["தமிழ்"])
        .with(Direction::Inverse, "தமிழ்+noun+acc", &["தமிழை"])
}

fn request(ws: &Workspace) -> (solmaalai_fst::PipelineConfig, AuditRequest) {
    let config = ws.config(&[]);
    let request = AuditRequest::new(
        &config,
        ws.path("fst/audits/noun-audit.json"),
        ws.path("fst/audits/lemmas.txt"),
    );
    (config, request)
}

#[test]
fn test_audit_report_fields() {
    let ws = audit_workspace();
    let (config, request) = request(&ws);

    let outcome = run_audit(&config, &generator(), &request).unwrap();
    let report = &outcome.report;

    assert_eq!(report.config, "fst/audits/noun-audit.json");
    assert_eq!(report.fst, "build/fst-models/noun.fst");
    assert_eq!(report.mode, Direction::Inverse);
    assert_eq!(report.lemma_count, 2);
    assert_eq!(report.query_count, 4);
    assert_eq!(report.generated_total, 5);
    assert_eq!(report.generated_unique, 5);
    assert_eq!(report.suspicious_hits, ["மரம்ஐ"]);
    assert_eq!(report.suspicious_count, 1);
    assert_eq!(report.not_in_dictionary_count, 1);
    assert_eq!(report.not_in_dictionary_rate, Some(0.2));
    assert_eq!(report.not_in_corpus_count, 0);
    assert_eq!(report.not_in_corpus_rate, None);
    assert_eq!(report.known_good_missing, ["மரங்கள்"]);
    assert_eq!(report.known_bad_present, ["மரம்ஐ"]);
    assert_eq!(report.per_query_counts.get("மரம்+noun+acc"), Some(&2));
    assert_eq!(report.per_query_counts.len(), 4);

    let suffix_total: usize = report.suffix_counts_top50.iter().map(|(_, n)| n).sum();
    assert_eq!(suffix_total, 5);
}

#[test]
fn test_report_written_to_default_path() {
    let ws = audit_workspace();
    let (config, request) = request(&ws);

    let outcome = run_audit(&config, &generator(), &request).unwrap();
    assert_eq!(outcome.report_path, ws.path("fst/reports/noun-audit-report.json"));

    let text = fs::read_to_string(&outcome.report_path).unwrap();
    assert!(text.contains("\"not_in_corpus_rate\": null"));
    let back: AuditReport = serde_json::from_str(&text).unwrap();
    assert_eq!(back, outcome.report);
}

#[test]
fn test_corpus_and_explicit_report() {
    let ws = audit_workspace();
    ws.write("corpus.txt", "மரம்\nதமிழ்\n");
    let (config, mut request) = request(&ws);
    request.corpus = Some(ws.path("corpus.txt"));
    request.report = Some(ws.path("out/custom.json"));

    let outcome = run_audit(&config, &generator(), &request).unwrap();
    assert_eq!(outcome.report.not_in_corpus_count, 3);
    assert_eq!(outcome.report.not_in_corpus_rate, Some(0.6));
    assert!(ws.path("out/custom.json").is_file());
}

#[test]
fn test_empty_dictionary_has_no_rate() {
    let ws = audit_workspace();
    fs::remove_file(ws.path("public/tamil_dictionary.txt")).unwrap();
    let (config, request) = request(&ws);

    let report = run_audit(&config, &generator(), &request).unwrap().report;
    assert_eq!(report.not_in_dictionary_count, 0);
    assert_eq!(report.not_in_dictionary_rate, None);
}

#[test]
fn test_forward_mode_queries_bare_lemmas() {
    let ws = audit_workspace();
    ws.write(
        "fst/audits/noun-audit.json",
        r#"{ "fst": "build/fst-models/noun.fst", "mode": "forward" }"#,
    );
    let lookup = FakeLookup::default().with(Direction::Forward, "மரம்", &["மரம்+noun"]);
    let (config, request) = request(&ws);

    let report = run_audit(&config, &lookup, &request).unwrap().report;
    assert_eq!(report.query_count, 2);
    assert_eq!(report.generated_total, 1);
    assert_eq!(report.per_query_counts.get("தமிழ்"), Some(&0));
}

#[test]
fn test_audit_input_errors() {
    let ws = audit_workspace();
    let (config, request) = request(&ws);

    fs::remove_file(ws.path("fst/audits/lemmas.txt")).unwrap();
    let err = run_audit(&config, &generator(), &request).unwrap_err();
    assert!(matches!(err, PipelineError::MissingSource { what: "lemma list", .. }));

    ws.write("fst/audits/lemmas.txt", "மரம்\n");
    ws.write(
        "fst/audits/noun-audit.json",
        r#"{ "fst": "build/fst-models/noun.fst", "suspicious_patterns": ["(unclosed"] }"#,
    );
    let err = run_audit(&config, &generator(), &request).unwrap_err();
    assert!(matches!(err, PipelineError::Pattern { ref pattern, .. } if pattern == "(unclosed"));

    ws.write("fst/audits/noun-audit.json", AUDIT_CONFIG);
    fs::remove_file(ws.path("build/fst-models/noun.fst")).unwrap();
    let err = run_audit(&config, &generator(), &request).unwrap_err();
    assert!(matches!(err, PipelineError::MissingSource { .. }));
    assert!(!ws.path("fst/reports").exists());
}
