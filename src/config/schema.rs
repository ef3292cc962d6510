use crate::safety::check_relative;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Everything a pipeline run needs, resolved once at start-up and passed by
/// reference to every stage.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct PipelineConfig {
    /// Project root every relative path resolves against (set by the loader)
    #[serde(skip)]
    pub root: PathBuf,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub tools: Tools,
    #[serde(default)]
    pub regression: RegressionSettings,
    #[serde(default)]
    pub audit: AuditSettings,
    #[serde(default)]
    pub components: Vec<ComponentDescriptor>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Paths {
    /// Pinned upstream checkout (a git submodule)
    pub vendor: String,
    /// Directory holding the upstream source zips
    pub archives: String,
    pub patches: String,
    pub scratch: String,
    pub manifest: String,
    /// Directories every built model is copied to
    pub destinations: Vec<String>,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            vendor: "vendor/thamizhi-morph".to_string(),
            archives: "vendor/thamizhi-morph/foma".to_string(),
            patches: "fst/patches".to_string(),
            scratch: "fst/build/.work".to_string(),
            manifest: "fst/build/manifest.json".to_string(),
            destinations: vec![
                "build/fst-models".to_string(),
                "static-word-list/fst-models".to_string(),
                "server/fst-models".to_string(),
            ],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Tools {
    pub compiler: String,
    pub lookup: String,
    pub git: String,
    pub lookup_timeout_secs: u64,
    pub lookup_batch_size: usize,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            compiler: "foma".to_string(),
            lookup: "flookup".to_string(),
            git: "git".to_string(),
            lookup_timeout_secs: 180,
            lookup_batch_size: 5000,
        }
    }
}

impl Tools {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RegressionSettings {
    pub fixture: String,
    /// Model the fixture is checked against
    pub artifact: String,
    pub dictionary: String,
    /// Component whose archive and patches feed the duplicate-class check
    pub lexicon_component: String,
    /// Lexical source file inside that component's archive
    pub lexicon_file: String,
    /// Sections treated as inflection classes
    pub class_whitelist: Vec<String>,
}

impl Default for RegressionSettings {
    fn default() -> Self {
        let mut class_whitelist: Vec<String> = (1..=16).map(|i| format!("C{i}Sg")).collect();
        class_whitelist.push("C5pl".to_string());
        Self {
            fixture: "fst/tests/fixtures/noun_morph_regressions.json".to_string(),
            artifact: "build/fst-models/noun.fst".to_string(),
            dictionary: "public/tamil_dictionary.txt".to_string(),
            lexicon_component: "noun".to_string(),
            lexicon_file: "Nouns.lexc".to_string(),
            class_whitelist,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AuditSettings {
    pub report_dir: String,
    pub dictionary: String,
    pub known_good: String,
    pub known_bad: String,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            report_dir: "fst/reports".to_string(),
            dictionary: "public/tamil_dictionary.txt".to_string(),
            known_good: "fst/tests/fixtures/known_good.txt".to_string(),
            known_bad: "fst/tests/fixtures/known_bad.txt".to_string(),
        }
    }
}

/// How one model is produced, selected by the `mode` key.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum ComponentDescriptor {
    Compile(CompileComponent),
    CopyPrebuilt(PrebuiltComponent),
}

/// Extract an upstream zip, patch it and run the compiler.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct CompileComponent {
    pub name: String,
    /// Zip file name inside `paths.archives`
    pub archive: String,
    pub entry: EntryPoint,
    pub output: String,
    #[serde(default)]
    pub patches: Vec<String>,
}

/// Copy a model the vendor already ships.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct PrebuiltComponent {
    pub name: String,
    /// Path relative to `paths.vendor`
    pub source: String,
    pub output: String,
}

/// The script handed to the compiler.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum EntryPoint {
    /// A script shipped inside the archive
    Script(String),
    /// A minimal "read this lexc and compile it" script written before patching
    Synthesized { lexicon: String, script: String },
}

impl EntryPoint {
    pub fn script(&self) -> &str {
        match self {
            EntryPoint::Script(script) => script,
            EntryPoint::Synthesized { script, .. } => script,
        }
    }
}

impl ComponentDescriptor {
    pub fn name(&self) -> &str {
        match self {
            ComponentDescriptor::Compile(c) => &c.name,
            ComponentDescriptor::CopyPrebuilt(c) => &c.name,
        }
    }

    pub fn output(&self) -> &str {
        match self {
            ComponentDescriptor::Compile(c) => &c.output,
            ComponentDescriptor::CopyPrebuilt(c) => &c.output,
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            ComponentDescriptor::Compile(_) => "compile",
            ComponentDescriptor::CopyPrebuilt(_) => "copy-prebuilt",
        }
    }
}

impl PipelineConfig {
    pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    pub fn vendor_dir(&self) -> PathBuf {
        self.resolve(&self.paths.vendor)
    }

    pub fn archive_path(&self, archive: &str) -> PathBuf {
        self.resolve(&self.paths.archives).join(archive)
    }

    pub fn patch_dir(&self) -> PathBuf {
        self.resolve(&self.paths.patches)
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.resolve(&self.paths.scratch)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.resolve(&self.paths.manifest)
    }

    /// `(label, absolute path)` for every distribution directory.
    pub fn destinations(&self) -> Vec<(String, PathBuf)> {
        self.paths
            .destinations
            .iter()
            .map(|dest| (dest.clone(), self.resolve(dest)))
            .collect()
    }

    /// The compile component the duplicate-class check replays.
    pub fn lexicon_component(&self) -> Option<&CompileComponent> {
        self.components.iter().find_map(|component| match component {
            ComponentDescriptor::Compile(c) if c.name == self.regression.lexicon_component => {
                Some(c)
            }
            _ => None,
        })
    }

    /// Display form of a path: root-relative POSIX when possible.
    pub fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.components.is_empty() {
            issues.push(ValidationIssue::EmptyComponentList);
        }
        if self.paths.destinations.is_empty() {
            issues.push(ValidationIssue::NoDestinations);
        }
        if self.tools.lookup_batch_size == 0 {
            issues.push(ValidationIssue::InvalidSetting {
                message: "tools.lookup_batch_size must be at least 1".to_string(),
            });
        }

        let configured_paths = [
            ("paths.vendor", &self.paths.vendor),
            ("paths.archives", &self.paths.archives),
            ("paths.patches", &self.paths.patches),
            ("paths.scratch", &self.paths.scratch),
            ("paths.manifest", &self.paths.manifest),
        ];
        for (field, value) in configured_paths {
            if check_relative(value).is_err() {
                issues.push(ValidationIssue::UnsafePath {
                    component: None,
                    field,
                    value: value.clone(),
                });
            }
        }
        for dest in &self.paths.destinations {
            if check_relative(dest).is_err() {
                issues.push(ValidationIssue::UnsafePath {
                    component: None,
                    field: "paths.destinations",
                    value: dest.clone(),
                });
            }
        }

        let mut names = HashSet::new();
        let mut outputs = HashSet::new();

        for component in &self.components {
            let name = component.name();
            if name.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    component: None,
                    field: "name",
                });
            } else if !names.insert(name) {
                issues.push(ValidationIssue::DuplicateName {
                    name: name.to_string(),
                });
            }

            if component.output().trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    component: Some(name.to_string()),
                    field: "output",
                });
            } else if !outputs.insert(component.output()) {
                issues.push(ValidationIssue::DuplicateOutput {
                    output: component.output().to_string(),
                });
            }

            let mut fields: Vec<(&'static str, &str)> = vec![("name", name), ("output", component.output())];
            match component {
                ComponentDescriptor::Compile(c) => {
                    fields.push(("archive", c.archive.as_str()));
                    fields.push(("entry", c.entry.script()));
                    if let EntryPoint::Synthesized { lexicon, .. } = &c.entry {
                        fields.push(("entry.lexicon", lexicon.as_str()));
                    }
                    fields.extend(c.patches.iter().map(|p| ("patches", p.as_str())));
                }
                ComponentDescriptor::CopyPrebuilt(c) => fields.push(("source", c.source.as_str())),
            }
            for (field, value) in fields {
                if value.trim().is_empty() {
                    if field != "name" && field != "output" {
                        issues.push(ValidationIssue::MissingField {
                            component: Some(name.to_string()),
                            field,
                        });
                    }
                } else if check_relative(value).is_err() {
                    issues.push(ValidationIssue::UnsafePath {
                        component: Some(name.to_string()),
                        field,
                        value: value.to_string(),
                    });
                }
            }
        }

        if !self.components.is_empty() && self.lexicon_component().is_none() {
            issues.push(ValidationIssue::UnknownLexiconComponent {
                name: self.regression.lexicon_component.clone(),
            });
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyComponentList,
    NoDestinations,
    MissingField {
        component: Option<String>,
        field: &'static str,
    },
    DuplicateName {
        name: String,
    },
    DuplicateOutput {
        output: String,
    },
    UnsafePath {
        component: Option<String>,
        field: &'static str,
        value: String,
    },
    UnknownLexiconComponent {
        name: String,
    },
    InvalidSetting {
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyComponentList => write!(f, "pipeline config declares no components"),
            ValidationIssue::NoDestinations => {
                write!(f, "pipeline config declares no distribution destinations")
            }
            ValidationIssue::MissingField { component, field } => match component {
                Some(name) => write!(f, "component '{name}' missing required field '{field}'"),
                None => write!(f, "component missing required field '{field}'"),
            },
            ValidationIssue::DuplicateName { name } => {
                write!(f, "component name '{name}' is declared more than once")
            }
            ValidationIssue::DuplicateOutput { output } => {
                write!(f, "output artifact '{output}' is produced by more than one component")
            }
            ValidationIssue::UnsafePath {
                component,
                field,
                value,
            } => match component {
                Some(name) => write!(
                    f,
                    "component '{name}' field '{field}' must be a relative path inside the project: '{value}'"
                ),
                None => write!(
                    f,
                    "'{field}' must be a relative path inside the project: '{value}'"
                ),
            },
            ValidationIssue::UnknownLexiconComponent { name } => write!(
                f,
                "regression.lexicon_component '{name}' does not name a compile component"
            ),
            ValidationIssue::InvalidSetting { message } => write!(f, "{message}"),
        }
    }
}
