//! Unified-diff parsing.
//!
//! Accepts the output of `git diff` / `diff -u`: `---`/`+++` file headers
//! (with `a/` and `b/` prefixes stripped), `@@` hunks and `\ No newline at
//! end of file` markers. Text outside a file section (commit messages,
//! trailers) is ignored.
//!
//! A `diff --git` section must carry text hunks, or be the creation or
//! deletion of an empty file. Pure renames and copies, mode changes and
//! binary patches cannot be replayed as text and are rejected.

use super::PatchError;
use std::path::{Path, PathBuf};

/// A parsed patch: one entry per file it touches, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSet {
    pub files: Vec<FilePatch>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePatch {
    /// `None` when the old side is `/dev/null` (file creation)
    pub old_path: Option<PathBuf>,
    /// `None` when the new side is `/dev/null` (file deletion)
    pub new_path: Option<PathBuf>,
    pub hunks: Vec<Hunk>,
}

impl FilePatch {
    /// Path whose content the hunks are matched against.
    pub fn source(&self) -> &Path {
        self.old_path
            .as_deref()
            .or(self.new_path.as_deref())
            .unwrap_or_else(|| Path::new(""))
    }

    /// Path the patched content is written to.
    pub fn target(&self) -> &Path {
        self.new_path
            .as_deref()
            .or(self.old_path.as_deref())
            .unwrap_or_else(|| Path::new(""))
    }

    pub fn is_creation(&self) -> bool {
        self.old_path.is_none()
    }

    pub fn is_deletion(&self) -> bool {
        self.new_path.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub old_len: usize,
    pub new_start: usize,
    pub new_len: usize,
    pub lines: Vec<HunkLine>,
}

/// One body line of a hunk. The text keeps its trailing `\n` unless the
/// hunk marks it as the last line of a file without a final newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HunkLine {
    Context(String),
    Remove(String),
    Add(String),
}

impl Hunk {
    /// Lines the hunk expects to find in the file.
    pub fn old_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|line| match line {
                HunkLine::Context(text) | HunkLine::Remove(text) => Some(text.as_str()),
                HunkLine::Add(_) => None,
            })
            .collect()
    }

    /// Lines the hunk leaves in the file.
    pub fn new_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|line| match line {
                HunkLine::Context(text) | HunkLine::Add(text) => Some(text.as_str()),
                HunkLine::Remove(_) => None,
            })
            .collect()
    }
}

pub fn parse(text: &str) -> Result<PatchSet, PatchError> {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let mut files = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if lines[i].starts_with("diff --git ") {
            let (file, next) = parse_git_section(&lines, i)?;
            files.push(file);
            i = next;
        } else if is_file_header(&lines, i) {
            let (file, next) = parse_file(&lines, i)?;
            files.push(file);
            i = next;
        } else {
            i += 1;
        }
    }

    if files.is_empty() {
        return Err(PatchError::Empty);
    }
    Ok(PatchSet { files })
}

fn is_file_header(lines: &[&str], i: usize) -> bool {
    lines[i].starts_with("--- ") && lines.get(i + 1).is_some_and(|next| next.starts_with("+++ "))
}

/// Extended header lines seen between `diff --git` and the file header.
#[derive(Default)]
struct GitHeader {
    new_file: bool,
    deleted_file: bool,
    rename_or_copy: bool,
    mode_change: bool,
    binary: bool,
}

impl GitHeader {
    fn note(&mut self, line: &str) {
        if line.starts_with("new file mode") {
            self.new_file = true;
        } else if line.starts_with("deleted file mode") {
            self.deleted_file = true;
        } else if ["rename from", "rename to", "copy from", "copy to"]
            .iter()
            .any(|prefix| line.starts_with(prefix))
        {
            self.rename_or_copy = true;
        } else if line.starts_with("old mode") || line.starts_with("new mode") {
            self.mode_change = true;
        } else if line.starts_with("GIT binary patch") || line.starts_with("Binary files ") {
            self.binary = true;
        }
    }
}

/// One `diff --git` section, starting at its `diff --git` line.
fn parse_git_section(lines: &[&str], start: usize) -> Result<(FilePatch, usize), PatchError> {
    let line = start + 1;
    let unsupported = |reason: String| PatchError::Unsupported { line, reason };
    let (old_name, new_name) = git_paths(lines[start]).ok_or_else(|| PatchError::Malformed {
        line,
        reason: "unreadable diff --git header".to_string(),
    })?;

    let mut header = GitHeader::default();
    let mut i = start + 1;
    while i < lines.len() && !lines[i].starts_with("diff --git ") && !is_file_header(lines, i) {
        header.note(lines[i]);
        i += 1;
    }

    if header.binary {
        return Err(unsupported(format!("binary patch for {new_name}")));
    }
    if i < lines.len() && is_file_header(lines, i) {
        if header.mode_change {
            return Err(unsupported(format!("mode change for {new_name}")));
        }
        return parse_file(lines, i);
    }

    // No file header: only an empty file's creation or deletion is text
    if header.rename_or_copy {
        return Err(unsupported(format!(
            "rename or copy {old_name} -> {new_name} without content changes"
        )));
    }
    let file = match (header.new_file, header.deleted_file) {
        (true, false) => FilePatch {
            old_path: None,
            new_path: Some(PathBuf::from(new_name)),
            hunks: Vec::new(),
        },
        (false, true) => FilePatch {
            old_path: Some(PathBuf::from(old_name)),
            new_path: None,
            hunks: Vec::new(),
        },
        _ => return Err(unsupported(format!("no text hunks for {new_name}"))),
    };
    Ok((file, i))
}

/// `a/<old> b/<new>` from a `diff --git` line.
fn git_paths(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix("diff --git ")?.trim_end_matches(['\n', '\r']);
    let rest = rest.strip_prefix("a/")?;
    let (old, new) = rest.split_once(" b/")?;
    Some((old, new))
}

/// A `---`/`+++` header at `start` and the hunks that follow it.
fn parse_file(lines: &[&str], start: usize) -> Result<(FilePatch, usize), PatchError> {
    let header_line = start + 1;
    let old_path = parse_path(&lines[start][4..]);
    let new_path = parse_path(&lines[start + 1][4..]);
    if old_path.is_none() && new_path.is_none() {
        return Err(PatchError::Malformed {
            line: header_line,
            reason: "both sides of the file header are /dev/null".to_string(),
        });
    }

    let mut i = start + 2;
    let mut hunks = Vec::new();
    while i < lines.len() && lines[i].starts_with("@@ ") {
        let (hunk, next) = parse_hunk(lines, i)?;
        hunks.push(hunk);
        i = next;
    }

    if hunks.is_empty() {
        return Err(PatchError::Malformed {
            line: header_line,
            reason: "file header without hunks".to_string(),
        });
    }

    Ok((
        FilePatch {
            old_path,
            new_path,
            hunks,
        },
        i,
    ))
}

/// Parse the path of a `---`/`+++` header, dropping timestamps and the
/// one-level `a/`/`b/` prefix.
fn parse_path(raw: &str) -> Option<PathBuf> {
    let raw = raw.trim_end_matches(['\n', '\r']);
    let raw = raw.split('\t').next().unwrap_or(raw).trim();
    if raw == "/dev/null" {
        return None;
    }
    let stripped = raw
        .strip_prefix("a/")
        .or_else(|| raw.strip_prefix("b/"))
        .unwrap_or(raw);
    Some(PathBuf::from(stripped))
}

fn parse_range(raw: &str, line: usize) -> Result<(usize, usize), PatchError> {
    let malformed = || PatchError::Malformed {
        line,
        reason: format!("invalid hunk range '{raw}'"),
    };
    let (start, len) = match raw.split_once(',') {
        Some((start, len)) => (start, len),
        None => (raw, "1"),
    };
    let start = start.parse().map_err(|_| malformed())?;
    let len = len.parse().map_err(|_| malformed())?;
    Ok((start, len))
}

fn parse_hunk(lines: &[&str], header: usize) -> Result<(Hunk, usize), PatchError> {
    let line_no = header + 1;
    let spec = lines[header]
        .strip_prefix("@@ ")
        .and_then(|rest| rest.split_once(" @@"))
        .map(|(ranges, _)| ranges)
        .ok_or_else(|| PatchError::Malformed {
            line: line_no,
            reason: "unterminated hunk header".to_string(),
        })?;

    let mut ranges = spec.split_whitespace();
    let (old_start, old_len) = match ranges.next().and_then(|r| r.strip_prefix('-')) {
        Some(range) => parse_range(range, line_no)?,
        None => {
            return Err(PatchError::Malformed {
                line: line_no,
                reason: "hunk header missing old range".to_string(),
            })
        }
    };
    let (new_start, new_len) = match ranges.next().and_then(|r| r.strip_prefix('+')) {
        Some(range) => parse_range(range, line_no)?,
        None => {
            return Err(PatchError::Malformed {
                line: line_no,
                reason: "hunk header missing new range".to_string(),
            })
        }
    };

    let mut body = Vec::new();
    let mut bare_blanks = Vec::new();
    let (mut old_seen, mut new_seen) = (0, 0);
    let mut i = header + 1;

    while old_seen < old_len || new_seen < new_len {
        let Some(raw) = lines.get(i) else {
            return Err(PatchError::Malformed {
                line: line_no,
                reason: format!(
                    "hunk truncated: expected {old_len} old / {new_len} new lines, found {old_seen} / {new_seen}"
                ),
            });
        };

        if raw.starts_with('\\') {
            strip_final_newline(&mut body);
            i += 1;
            continue;
        }

        let (marker, text) = match raw.chars().next() {
            // Some editors strip the leading space of blank context lines
            Some('\n') | Some('\r') => {
                bare_blanks.push(body.len());
                let mut text = raw.to_string();
                if !text.ends_with('\n') {
                    text.push('\n');
                }
                (' ', text)
            }
            Some(marker) => {
                let mut text = raw[marker.len_utf8()..].to_string();
                if !text.ends_with('\n') {
                    text.push('\n');
                }
                (marker, text)
            }
            None => {
                return Err(PatchError::Malformed {
                    line: i + 1,
                    reason: "empty hunk line".to_string(),
                })
            }
        };

        match marker {
            ' ' => {
                old_seen += 1;
                new_seen += 1;
                body.push(HunkLine::Context(text));
            }
            '-' => {
                old_seen += 1;
                body.push(HunkLine::Remove(text));
            }
            '+' => {
                new_seen += 1;
                body.push(HunkLine::Add(text));
            }
            other => {
                return Err(PatchError::Malformed {
                    line: i + 1,
                    reason: format!("unexpected hunk line prefix '{other}'"),
                })
            }
        }
        i += 1;
    }

    // The marker for the very last line follows the counted body
    if lines.get(i).is_some_and(|raw| raw.starts_with('\\')) {
        strip_final_newline(&mut body);
        i += 1;
    }

    if !bare_blanks.is_empty() {
        crlf_bare_blanks(&mut body, &bare_blanks);
    }

    Ok((
        Hunk {
            old_start,
            old_len,
            new_start,
            new_len,
            lines: body,
        },
        i,
    ))
}

/// A blank line that lost its space also lost any `\r`; give it back when
/// the rest of the hunk uses CRLF.
fn crlf_bare_blanks(body: &mut [HunkLine], bare: &[usize]) {
    let crlf = body.iter().enumerate().any(|(index, line)| {
        !bare.contains(&index)
            && matches!(line, HunkLine::Context(t) | HunkLine::Remove(t) | HunkLine::Add(t) if t.ends_with("\r\n"))
    });
    if !crlf {
        return;
    }
    for &index in bare {
        if let Some(HunkLine::Context(text)) = body.get_mut(index) {
            if text == "\n" {
                *text = "\r\n".to_string();
            }
        }
    }
}

fn strip_final_newline(body: &mut [HunkLine]) {
    if let Some(HunkLine::Context(text) | HunkLine::Remove(text) | HunkLine::Add(text)) =
        body.last_mut()
    {
        if text.ends_with('\n') {
            text.pop();
        }
    }
}
