//! Field-specific summarizers for the bounded string manager.

use once_cell::sync::Lazy;
use regex::Regex;

use cortex_truncate::{ContentType, Truncator};

/// Trees past this size go through the depth sampler instead of the
/// line-pattern filter.
const GIANT_TREE_BYTES: usize = 10 * 1024 * 1024;
/// Output budget for the depth sampler on giant trees.
const GIANT_TREE_TARGET: usize = 1024 * 1024;
/// Line cap for the pattern-filtered tree summary.
const TREE_LINE_CAP: usize = 2000;

static PRIORITY_FILE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\.(rs|ts|tsx|js|jsx|py|go|java|c|h|cpp|rb)\b|cargo\.toml|package\.json|pyproject\.toml|go\.mod|makefile|dockerfile|readme|build\.(rs|gradle)",
    )
    .expect("priority file regex")
});

static NOTE_KEYWORDS: [&str; 7] = [
    "task:", "plan:", "error:", "completed:", "todo:", "issue:", "fix:",
];

static LOG_KEYWORDS: [&str; 6] = [
    "error", "warning", "todo", "fixme", "important", "critical",
];

/// Summarize a codebase tree: keep directory structure plus lines naming
/// priority files, capped, with a one-line header carrying the counts.
pub(crate) fn summarize_tree(text: &str, truncator: &Truncator) -> String {
    if text.len() > GIANT_TREE_BYTES {
        return match truncator.truncate(text, GIANT_TREE_TARGET, Some(ContentType::Tree)) {
            Ok(out) => out.content,
            Err(_) => text[..GIANT_TREE_TARGET.min(text.len())].to_string(),
        };
    }

    let total = text.lines().count();
    let mut kept: Vec<&str> = text
        .lines()
        .filter(|line| {
            // Directory lines (no extension) keep the shape; files must
            // match the priority patterns.
            let name = line.trim_start_matches(['│', '├', '└', '─', ' ']);
            !name.contains('.') || PRIORITY_FILE_RE.is_match(line)
        })
        .collect();
    kept.truncate(TREE_LINE_CAP);

    let mut out = format!("[tree summary: {} of {total} lines]\n", kept.len());
    for line in kept {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Summarize context notes: keep the last 20 blank-line-separated
/// sections that carry actionable markers.
pub(crate) fn summarize_notes(text: &str) -> String {
    let sections: Vec<&str> = text.split("\n\n").collect();
    let total = sections.len();
    let mut kept: Vec<&str> = sections
        .into_iter()
        .filter(|section| {
            let lower = section.to_lowercase();
            NOTE_KEYWORDS.iter().any(|k| lower.contains(k))
        })
        .collect();
    let drop = kept.len().saturating_sub(20);
    kept.drain(..drop);

    let mut out = format!("[notes summary: {} of {total} sections]\n", kept.len());
    out.push_str(&kept.join("\n\n"));
    out
}

/// Generic summary: first and last 50 lines plus up to 100 flagged lines
/// from the middle, bracketed with markers.
pub(crate) fn summarize_generic(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() <= 100 {
        return text.to_string();
    }

    let head = &lines[..50];
    let tail = &lines[lines.len() - 50..];
    let flagged: Vec<&str> = lines[50..lines.len() - 50]
        .iter()
        .filter(|line| {
            let lower = line.to_lowercase();
            LOG_KEYWORDS.iter().any(|k| lower.contains(k))
        })
        .take(100)
        .copied()
        .collect();

    let mut out = String::new();
    out.push_str(&head.join("\n"));
    out.push_str(&format!(
        "\n[... {} lines summarized, {} flagged lines retained ...]\n",
        lines.len() - 100,
        flagged.len()
    ));
    if !flagged.is_empty() {
        out.push_str(&flagged.join("\n"));
        out.push('\n');
    }
    out.push_str(&tail.join("\n"));
    out
}
