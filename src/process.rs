//! Blocking invocation of the external tools (compiler, lookup, git).

use crate::error::PipelineError;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Bytes of stderr kept in a [`PipelineError::ToolFailed`] message.
const STDERR_TAIL: usize = 2000;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Default, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run `cmd` to completion, feeding `stdin` if given.
///
/// A missing executable becomes [`PipelineError::MissingTool`]; a non-zero
/// exit becomes [`PipelineError::ToolFailed`] carrying the tail of stderr.
pub fn run(cmd: Command, tool: &str, stdin: Option<&str>) -> Result<ToolOutput, PipelineError> {
    execute(cmd, tool, stdin, None).map(Option::unwrap_or_default)
}

/// Like [`run`], but kill the child once `timeout` elapses and return
/// `Ok(None)` instead of its output.
pub fn run_with_timeout(
    cmd: Command,
    tool: &str,
    stdin: Option<&str>,
    timeout: Duration,
) -> Result<Option<ToolOutput>, PipelineError> {
    execute(cmd, tool, stdin, Some(timeout))
}

fn execute(
    mut cmd: Command,
    tool: &str,
    stdin: Option<&str>,
    timeout: Option<Duration>,
) -> Result<Option<ToolOutput>, PipelineError> {
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped());

    let start = Instant::now();
    let mut child = cmd.spawn().map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => PipelineError::MissingTool {
            tool: tool.to_string(),
        },
        _ => PipelineError::io(PathBuf::from(tool), source),
    })?;

    let writer = spawn_writer(&mut child, stdin);
    let stdout = spawn_reader(child.stdout.take());
    let stderr = spawn_reader(child.stderr.take());

    let status = loop {
        if let Some(status) = child
            .try_wait()
            .map_err(|e| PipelineError::io(PathBuf::from(tool), e))?
        {
            break Some(status);
        }
        if timeout.is_some_and(|limit| start.elapsed() > limit) {
            let _ = child.kill();
            let _ = child.wait();
            break None;
        }
        thread::sleep(POLL_INTERVAL);
    };

    if let Some(writer) = writer {
        let _ = writer.join();
    }
    let stdout = join_reader(stdout);
    let stderr = join_reader(stderr);

    let Some(status) = status else {
        tracing::debug!(
            tool,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "tool killed after timeout"
        );
        return Ok(None);
    };

    if !status.success() {
        return Err(PipelineError::ToolFailed {
            tool: tool.to_string(),
            status: status.to_string(),
            stderr: tail(stderr.trim(), STDERR_TAIL).to_string(),
        });
    }

    Ok(Some(ToolOutput { stdout, stderr }))
}

fn spawn_writer(child: &mut Child, input: Option<&str>) -> Option<JoinHandle<()>> {
    let mut pipe = child.stdin.take()?;
    let input = input.unwrap_or_default().to_string();
    Some(thread::spawn(move || {
        // The child may exit before reading everything; a broken pipe is fine
        let _ = pipe.write_all(input.as_bytes());
    }))
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    let mut pipe = pipe?;
    Some(thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    }))
}

fn join_reader(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

fn tail(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}
