//! Property tests: patching is deterministic and the lexicon scanner
//! accepts arbitrary text.

use proptest::prelude::*;
use solmaalai_fst::hash::tree_digest;
use solmaalai_fst::patch::apply_series;
use solmaalai_fst::regression::{scan, LexiconEvent};
use std::fs;
use tempfile::TempDir;

/// An insertion after the first line of a one-file tree.
fn insertion_patch(first: &str, inserted: &str) -> String {
    format!("--- a/lexicon.lexc\n+++ b/lexicon.lexc\n@@ -1,1 +1,2 @@\n {first}\n+{inserted}\n")
}

fn patched_tree(lines: &[String], patch: &str) -> (TempDir, String) {
    let dir = TempDir::new().unwrap();
    let tree = dir.path().join("tree");
    let patches = dir.path().join("patches");
    fs::create_dir_all(&tree).unwrap();
    fs::create_dir_all(&patches).unwrap();

    fs::write(tree.join("lexicon.lexc"), format!("{}\n", lines.join("\n"))).unwrap();
    fs::write(patches.join("0001.patch"), patch).unwrap();
    apply_series(&tree, &patches, "patches", &["0001.patch".to_string()]).unwrap();

    let digest = tree_digest(&tree).unwrap();
    (dir, digest)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_same_series_same_tree(
        lines in prop::collection::vec("[a-z]{1,8}", 1..20),
        inserted in "[a-z]{1,8}",
    ) {
        let patch = insertion_patch(&lines[0], &inserted);
        let (first_dir, first) = patched_tree(&lines, &patch);
        let (_second_dir, second) = patched_tree(&lines, &patch);
        prop_assert_eq!(first, second);

        let content = fs::read_to_string(first_dir.path().join("tree/lexicon.lexc")).unwrap();
        let mut expected = lines.clone();
        expected.insert(1, inserted);
        prop_assert_eq!(content, format!("{}\n", expected.join("\n")));
    }

    #[test]
    fn prop_scanner_never_panics(text in "(\\PC{0,40}\\n){0,20}") {
        for event in scan(&text) {
            match event {
                LexiconEvent::Section { name, line } => {
                    prop_assert!(!name.is_empty());
                    prop_assert!(line >= 1);
                }
                LexiconEvent::Entry { lemma, .. } => {
                    prop_assert!(!lemma.is_empty());
                    prop_assert!(!lemma.starts_with('+'));
                }
            }
        }
    }

    #[test]
    fn prop_scanner_finds_generated_entries(
        lemmas in prop::collection::vec("[அ-ஹ]{1,6}", 1..10),
    ) {
        let mut text = String::from("LEXICON C1Sg\n");
        for lemma in &lemmas {
            text.push_str(&format!("{lemma} C1Sg_inf ;\n"));
        }
        let found: Vec<&str> = scan(&text)
            .filter_map(|event| match event {
                LexiconEvent::Entry { lemma, .. } => Some(lemma),
                LexiconEvent::Section { .. } => None,
            })
            .collect();
        prop_assert_eq!(found, lemmas.iter().map(String::as_str).collect::<Vec<_>>());
    }
}
