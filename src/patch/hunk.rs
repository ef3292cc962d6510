//! Locating hunks in file content and lowering them to [`Edit`]s.

use super::diff::Hunk;
use super::PatchError;
use crate::edit::{Edit, EditVerification};
use similar::TextDiff;
use std::path::Path;

/// Lines of context shown around a failed hunk.
const PREVIEW_RADIUS: usize = 2;

/// Compute one edit per hunk against `content`.
///
/// Each hunk is searched at its declared line first, then at growing
/// offsets on either side. A hunk never matches before the end of the
/// previous one, so hunk order in the diff is preserved.
pub(crate) fn plan_edits(file: &Path, content: &str, hunks: &[Hunk]) -> Result<Vec<Edit>, PatchError> {
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let mut offsets = Vec::with_capacity(lines.len() + 1);
    let mut total = 0;
    offsets.push(0);
    for line in &lines {
        total += line.len();
        offsets.push(total);
    }

    let mut edits = Vec::with_capacity(hunks.len());
    let mut min_pos = 0;

    for (index, hunk) in hunks.iter().enumerate() {
        let old = hunk.old_lines();
        // With no old lines, old_start names the line the insertion follows
        let expected = if hunk.old_len == 0 {
            hunk.old_start
        } else {
            hunk.old_start.saturating_sub(1)
        };

        let Some(pos) = find_hunk(&lines, &old, expected, min_pos) else {
            return Err(PatchError::HunkMismatch {
                file: file.to_path_buf(),
                hunk: index + 1,
                line: hunk.old_start,
                preview: mismatch_preview(&lines, &old, expected),
            });
        };

        if pos != expected {
            tracing::debug!(
                file = %file.display(),
                hunk = index + 1,
                offset = pos as i64 - expected as i64,
                "hunk matched at offset"
            );
        }

        let old_text = old.concat();
        edits.push(Edit {
            file: file.to_path_buf(),
            byte_start: offsets[pos],
            byte_end: offsets[pos + old.len()],
            new_text: hunk.new_lines().concat(),
            expected_before: EditVerification::from_text(&old_text),
        });
        min_pos = pos + old.len();
    }

    Ok(edits)
}

fn find_hunk(lines: &[&str], old: &[&str], expected: usize, min_pos: usize) -> Option<usize> {
    if old.len() > lines.len() {
        return None;
    }
    let max_pos = lines.len() - old.len();
    if min_pos > max_pos {
        return None;
    }
    let matches_at = |pos: usize| lines[pos..pos + old.len()] == *old;
    let expected = expected.clamp(min_pos, max_pos);

    for distance in 0..=(max_pos - min_pos) {
        let before = expected.checked_sub(distance).filter(|pos| *pos >= min_pos);
        let after = Some(expected + distance).filter(|pos| *pos <= max_pos);
        if before.is_none() && after.is_none() {
            break;
        }
        if let Some(pos) = before.filter(|pos| matches_at(*pos)) {
            return Some(pos);
        }
        if let Some(pos) = after.filter(|pos| matches_at(*pos)) {
            return Some(pos);
        }
    }
    None
}

/// Diff of what the hunk expected against what the file holds at the
/// declared position, trimmed to a few lines.
fn mismatch_preview(lines: &[&str], old: &[&str], expected: usize) -> String {
    let start = expected.min(lines.len());
    let end = (start + old.len()).min(lines.len());
    let expected_text = old.concat();
    let found_text = lines[start..end].concat();

    let diff = TextDiff::from_lines(expected_text.as_str(), found_text.as_str());
    let rendered = diff
        .unified_diff()
        .context_radius(PREVIEW_RADIUS)
        .header("expected", "found")
        .to_string();
    let preview = rendered.lines().take(12).collect::<Vec<_>>().join("\n");
    preview
}
