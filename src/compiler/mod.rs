//! Bridge to the external FST toolchain.
//!
//! Everything the pipeline needs from `foma` and `git` goes through
//! [`BuildBackend`], so the build can be driven by an in-process fake in
//! tests. [`ExternalTools`] is the real implementation.

use crate::config::Tools;
use crate::error::PipelineError;
use crate::process;
use std::path::Path;
use std::process::Command;

/// Capabilities the component builder consumes.
pub trait BuildBackend {
    /// Fail with [`PipelineError::MissingTool`] unless every required tool
    /// can be found.
    fn ensure_available(&self) -> Result<(), PipelineError>;

    /// Commit hash of the vendored checkout.
    fn vendor_revision(&self, vendor: &Path) -> Result<String, PipelineError>;

    /// Compile `entry` into `output`, both relative to `work_dir`.
    fn compile(&self, work_dir: &Path, entry: &str, output: &str) -> Result<(), PipelineError>;
}

/// Commands fed to the compiler on stdin.
pub fn compile_script(entry: &str, output: &str) -> String {
    format!("source {entry}\nsave stack {output}\nquit\n")
}

/// Entry script that compiles a bare lexc lexicon.
pub fn lexicon_script(lexicon: &str) -> String {
    format!("read lexc {lexicon}\ndefine Lexicon;\nregex Lexicon;\n")
}

/// The `foma` / `flookup` / `git` executables named in [`Tools`].
#[derive(Debug, Clone)]
pub struct ExternalTools {
    tools: Tools,
}

impl ExternalTools {
    pub fn new(tools: Tools) -> Self {
        Self { tools }
    }

    fn required(&self) -> [&str; 3] {
        [
            self.tools.compiler.as_str(),
            self.tools.lookup.as_str(),
            self.tools.git.as_str(),
        ]
    }
}

impl BuildBackend for ExternalTools {
    fn ensure_available(&self) -> Result<(), PipelineError> {
        for tool in self.required() {
            let path = which::which(tool).map_err(|err| {
                tracing::debug!(tool, error = %err, "tool lookup failed");
                PipelineError::MissingTool {
                    tool: tool.to_string(),
                }
            })?;
            tracing::debug!(tool, path = %path.display(), "found tool");
        }
        Ok(())
    }

    fn vendor_revision(&self, vendor: &Path) -> Result<String, PipelineError> {
        let mut cmd = Command::new(&self.tools.git);
        cmd.arg("-C").arg(vendor).args(["rev-parse", "HEAD"]);
        let output = process::run(cmd, &self.tools.git, None)?;
        Ok(output.stdout.trim().to_string())
    }

    fn compile(&self, work_dir: &Path, entry: &str, output: &str) -> Result<(), PipelineError> {
        let mut cmd = Command::new(&self.tools.compiler);
        cmd.current_dir(work_dir);
        let script = compile_script(entry, output);
        process::run(cmd, &self.tools.compiler, Some(&script))?;
        Ok(())
    }
}
