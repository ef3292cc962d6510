//! The Solmaalai component layout used when no config file is present.

pub(crate) const BUILTIN_PIPELINE: &str = r#"
[[components]]
name = "noun"
mode = "compile"
archive = "ThamizhiMorph-Nouns.zip"
entry = "tamil-noun.foma"
output = "noun.fst"
patches = [
    "0001-fix-c11-acc.patch",
    "0002-fix-noun-class-duplicates.patch",
    "0003-fix-noun-malformed-locatives.patch",
]

[[components]]
name = "adj"
mode = "compile"
archive = "ThamizhiMorph-Adjectives.zip"
entry = { lexicon = "tamil-adjectives.lexc", script = "__generated_adj_build.foma" }
output = "adj.fst"

[[components]]
name = "adv"
mode = "compile"
archive = "ThamizhiMorph-Adverbs.zip"
entry = "tamil-adverbs.foma"
output = "adv.fst"

[[components]]
name = "part"
mode = "compile"
archive = "ThamizhiMorph-Particles.zip"
entry = "tamil-part.foma"
output = "part.fst"

[[components]]
name = "verb-c3"
mode = "compile"
archive = "ThamizhiMorph-Verbs.zip"
entry = "ThamizhiFST-C3.foma"
output = "verb-c3.fst"

[[components]]
name = "verb-c4"
mode = "compile"
archive = "ThamizhiMorph-Verbs.zip"
entry = "ThamizhiFST-C4.foma"
output = "verb-c4.fst"

[[components]]
name = "verb-c11"
mode = "compile"
archive = "ThamizhiMorph-Verbs.zip"
entry = "ThamizhiFST-C11.foma"
output = "verb-c11.fst"

[[components]]
name = "verb-c12"
mode = "compile"
archive = "ThamizhiMorph-Verbs.zip"
entry = "ThamizhiFST-C12.foma"
output = "verb-c12.fst"

[[components]]
name = "verb-c62"
mode = "compile"
archive = "ThamizhiMorph-Verbs.zip"
entry = "ThamizhiFST-C62.foma"
output = "verb-c62.fst"

[[components]]
name = "verb-c-rest"
mode = "compile"
archive = "ThamizhiMorph-Verbs.zip"
entry = "ThamizhiFST-otherthan-3-4-62-11-12.foma"
output = "verb-c-rest.fst"

[[components]]
name = "pronoun"
mode = "copy-prebuilt"
source = "FST-Models/pronoun.fst"
output = "pronoun.fst"
"#;
