//! Text edits for `edit_file` and their unified-diff rendering.

use serde::Deserialize;
use similar::TextDiff;
use thiserror::Error;

/// One replacement: the first occurrence of `old_text` becomes `new_text`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditOperation {
    /// Text to search for. Must match exactly, or line by line ignoring
    /// leading whitespace.
    pub old_text: String,
    /// Text to replace it with.
    pub new_text: String,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EditError {
    #[error("could not find a match for edit #{index}:\n{old_text}")]
    NoMatch { index: usize, old_text: String },
    #[error("edit #{index} has empty oldText")]
    EmptyPattern { index: usize },
}

/// Apply `edits` in order. Line endings are normalised to `\n` first.
pub fn apply_edits(content: &str, edits: &[EditOperation]) -> Result<String, EditError> {
    let mut content = normalize_line_endings(content);
    for (i, edit) in edits.iter().enumerate() {
        let index = i + 1;
        let old_text = normalize_line_endings(&edit.old_text);
        let new_text = normalize_line_endings(&edit.new_text);
        if old_text.is_empty() {
            return Err(EditError::EmptyPattern { index });
        }
        if content.contains(&old_text) {
            content = content.replacen(&old_text, &new_text, 1);
            continue;
        }
        content = replace_lines_loosely(&content, &old_text, &new_text).ok_or_else(|| {
            EditError::NoMatch {
                index,
                old_text: edit.old_text.clone(),
            }
        })?;
    }
    Ok(content)
}

pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n")
}

fn leading_whitespace(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

/// Find the first run of lines equal to `old_text`'s lines up to leading
/// whitespace, and replace it with `new_text` re-indented to the matched
/// block.
///
/// The first replacement line takes the matched block's indentation. Later
/// lines keep their indentation relative to the first replacement line: a
/// line starting with the first line's indentation has that prefix swapped
/// for the block's; any other line is placed at the block's indentation.
fn replace_lines_loosely(content: &str, old_text: &str, new_text: &str) -> Option<String> {
    let (old_text, new_text) = match old_text.strip_suffix('\n') {
        Some(old) => (old, new_text.strip_suffix('\n').unwrap_or(new_text)),
        None => (old_text, new_text),
    };
    let lines: Vec<&str> = content.split('\n').collect();
    let old_lines: Vec<&str> = old_text.split('\n').collect();
    if old_lines.len() > lines.len() {
        return None;
    }
    let start = (0..=lines.len() - old_lines.len()).find(|&i| {
        old_lines
            .iter()
            .zip(&lines[i..])
            .all(|(old, line)| old.trim_start() == line.trim_start())
    })?;

    let block_indent = leading_whitespace(lines[start]);
    let new_lines: Vec<&str> = new_text.split('\n').collect();
    let first_indent = leading_whitespace(new_lines[0]);
    let replacement = new_lines.iter().enumerate().map(|(j, line)| {
        if j == 0 {
            format!("{block_indent}{}", line.trim_start())
        } else if line.trim().is_empty() {
            line.to_string()
        } else if let Some(rest) = line.strip_prefix(first_indent) {
            format!("{block_indent}{rest}")
        } else {
            format!("{block_indent}{}", line.trim_start())
        }
    });

    let mut out: Vec<String> = lines[..start].iter().map(|l| l.to_string()).collect();
    out.extend(replacement);
    out.extend(lines[start + old_lines.len()..].iter().map(|l| l.to_string()));
    Some(out.join("\n"))
}

/// Render a unified diff of `original` against `modified`, three lines of
/// context per hunk. Identical inputs render as an empty string.
pub fn unified_diff(original: &str, modified: &str, path: &str) -> String {
    TextDiff::from_lines(original, modified)
        .unified_diff()
        .context_radius(3)
        .header(&format!("{path}\toriginal"), &format!("{path}\tmodified"))
        .to_string()
}
