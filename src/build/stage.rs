use serde::Serialize;
use std::fmt;

/// Where a component is in the build.
///
/// Stages only move forward; any error moves the component to
/// [`BuildStage::Failed`] and it stays there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStage {
    Clean,
    Extracted,
    Patched,
    Compiled,
    Verified,
    Distributed,
    Manifested,
    Failed,
}

impl BuildStage {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildStage::Clean => "clean",
            BuildStage::Extracted => "extracted",
            BuildStage::Patched => "patched",
            BuildStage::Compiled => "compiled",
            BuildStage::Verified => "verified",
            BuildStage::Distributed => "distributed",
            BuildStage::Manifested => "manifested",
            BuildStage::Failed => "failed",
        }
    }
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage tracker for one component.
#[derive(Debug, Clone)]
pub struct ComponentBuild {
    name: String,
    stage: BuildStage,
}

impl ComponentBuild {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stage: BuildStage::Clean,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage(&self) -> BuildStage {
        self.stage
    }

    /// Move forward to `stage`. Moving backwards or out of `Failed` is
    /// ignored.
    pub fn advance(&mut self, stage: BuildStage) {
        if self.stage == BuildStage::Failed || stage <= self.stage {
            return;
        }
        tracing::debug!(component = %self.name, from = %self.stage, to = %stage, "stage");
        self.stage = stage;
    }

    pub fn fail(&mut self) {
        tracing::debug!(component = %self.name, at = %self.stage, "stage failed");
        self.stage = BuildStage::Failed;
    }

    /// Whether the component's artifact has reached every destination.
    pub fn is_distributed(&self) -> bool {
        matches!(self.stage, BuildStage::Distributed | BuildStage::Manifested)
    }
}
