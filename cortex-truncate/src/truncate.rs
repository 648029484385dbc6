//! The truncation entry point and the generic head/tail strategy.

use serde::{Deserialize, Serialize};
use tracing::debug;

use cortex_types::TruncateError;

use crate::detect::{ContentType, detect};
use crate::{code, json, tree};

/// Tunables for every truncation strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TruncateConfig {
    /// Array elements kept verbatim before the elision placeholder.
    pub keep_array_items: usize,
    /// Leaf strings longer than this are shortened.
    pub max_leaf_string: usize,
    /// Object keys removable under pressure, matched as substrings.
    pub drop_keys: Vec<String>,
    /// Strategy attempts before falling back to the generic strategy.
    pub max_attempts: usize,
    /// Share of the budget reserved for imports in the code strategy.
    pub import_budget_share: f64,
    /// Tree depths retained by the tree strategy.
    pub max_tree_depth: usize,
    /// Share of the budget given to each of head and tail in the generic
    /// strategy.
    pub head_tail_share: f64,
}

impl Default for TruncateConfig {
    fn default() -> Self {
        Self {
            keep_array_items: 10,
            max_leaf_string: 1000,
            drop_keys: [
                "debug",
                "trace",
                "verbose",
                "metadata",
                "stats",
                "cache",
                "logs",
                "history",
                "temp",
                "tmp",
                "deprecated",
                "_id",
                "timestamp",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            max_attempts: 3,
            import_budget_share: 0.10,
            max_tree_depth: 5,
            head_tail_share: 0.40,
        }
    }
}

/// How a truncation was achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TruncateMethod {
    /// Content fit the budget; nothing was done.
    None,
    /// JSON arrays shortened with an elision placeholder.
    ArrayTruncation,
    /// Denylisted JSON properties removed.
    PropertyRemoval,
    /// Long JSON leaf strings shortened.
    StringTruncation,
    /// Minimal JSON skeleton of the most important keys.
    MinimalJson,
    /// Code reduced to complete declarations plus stub comments.
    CodeOutline,
    /// Directory tree sampled by depth.
    TreeSampling,
    /// Generic head and tail with a middle marker.
    HeadTail,
    /// Unrepairable JSON preserved through the generic strategy.
    SafeJsonFallback,
}

impl TruncateMethod {
    /// Stable name for logs and stats.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TruncateMethod::None => "none",
            TruncateMethod::ArrayTruncation => "array-truncation",
            TruncateMethod::PropertyRemoval => "property-removal",
            TruncateMethod::StringTruncation => "string-truncation",
            TruncateMethod::MinimalJson => "minimal-json",
            TruncateMethod::CodeOutline => "code-outline",
            TruncateMethod::TreeSampling => "tree-sampling",
            TruncateMethod::HeadTail => "head-tail",
            TruncateMethod::SafeJsonFallback => "safe-json-fallback",
        }
    }
}

/// A truncation outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Truncated {
    /// The bounded content.
    pub content: String,
    /// Whether anything was removed.
    pub truncated: bool,
    /// Byte size of the input.
    pub original_size: usize,
    /// Byte size of the output.
    pub final_size: usize,
    /// Whether the output still parses under the declared content type.
    pub syntax_valid: bool,
    /// The strategy that produced the output.
    pub method: TruncateMethod,
}

impl Truncated {
    fn unchanged(text: &str) -> Self {
        Self {
            content: text.to_string(),
            truncated: false,
            original_size: text.len(),
            final_size: text.len(),
            syntax_valid: true,
            method: TruncateMethod::None,
        }
    }
}

/// Type-dispatched, budget-respecting truncation.
///
/// # Example
///
/// ```
/// use cortex_truncate::Truncator;
///
/// let truncator = Truncator::default();
/// let out = truncator.truncate(&"line\n".repeat(1000), 200, None).unwrap();
/// assert!(out.truncated);
/// assert!(out.final_size <= 200);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Truncator {
    cfg: TruncateConfig,
}

impl Truncator {
    /// Create a truncator with explicit tunables.
    #[must_use]
    pub fn new(cfg: TruncateConfig) -> Self {
        Self { cfg }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &TruncateConfig {
        &self.cfg
    }

    /// Reduce `text` to at most `max_bytes`, preserving syntax for
    /// structured content. `content_type` overrides detection.
    ///
    /// Guarantees: `final_size <= max_bytes` whenever `truncated` is true;
    /// JSON output with `syntax_valid` parses; code output contains only
    /// complete top-level declarations or comment stubs.
    pub fn truncate(
        &self,
        text: &str,
        max_bytes: usize,
        content_type: Option<ContentType>,
    ) -> Result<Truncated, TruncateError> {
        if max_bytes == 0 {
            return Err(TruncateError::InvalidBudget);
        }
        if text.is_empty() {
            return Ok(Truncated::unchanged(text));
        }
        if text.len() <= max_bytes {
            return Ok(Truncated::unchanged(text));
        }

        let detected = content_type.unwrap_or_else(|| detect(text));
        let original_size = text.len();

        let outcome = match detected {
            ContentType::Json => json::truncate_json(text, max_bytes, &self.cfg),
            ContentType::Code => code::truncate_code(text, max_bytes, &self.cfg),
            ContentType::Tree => tree::truncate_tree(text, max_bytes, &self.cfg),
            // Markup falls through to the generic strategy, which never
            // splits inside a line.
            ContentType::Markup | ContentType::Text => None,
        };

        let (content, syntax_valid, method) = match outcome {
            Some(out) => out,
            None => {
                let body = head_tail(text, max_bytes, self.cfg.head_tail_share);
                let method = if detected == ContentType::Json {
                    TruncateMethod::SafeJsonFallback
                } else {
                    TruncateMethod::HeadTail
                };
                (body, false, method)
            }
        };

        // Hard guarantee, whatever the strategy produced.
        let content = clamp_to_budget(content, max_bytes);
        let final_size = content.len();
        debug!(
            method = method.as_str(),
            original_size, final_size, "truncated content"
        );
        Ok(Truncated {
            content,
            truncated: true,
            original_size,
            final_size,
            syntax_valid,
            method,
        })
    }
}

/// Largest index ≤ `idx` that falls on a char boundary.
fn floor_char_boundary(text: &str, idx: usize) -> usize {
    let mut idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn clamp_to_budget(content: String, max_bytes: usize) -> String {
    if content.len() <= max_bytes {
        return content;
    }
    content[..floor_char_boundary(&content, max_bytes)].to_string()
}

/// Keep the head and tail of the input, marking the elided middle.
pub(crate) fn head_tail(text: &str, max_bytes: usize, share: f64) -> String {
    let head_budget = (max_bytes as f64 * share) as usize;
    let tail_budget = head_budget;

    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let mut head_end = 0usize;
    let mut head_lines = 0usize;
    for line in &lines {
        if head_end + line.len() > head_budget {
            break;
        }
        head_end += line.len();
        head_lines += 1;
    }

    let mut tail_start = text.len();
    let mut tail_lines = 0usize;
    for line in lines.iter().rev() {
        if text.len() - tail_start + line.len() > tail_budget
            || head_lines + tail_lines >= lines.len()
        {
            break;
        }
        tail_start -= line.len();
        tail_lines += 1;
    }

    if head_lines == 0 && tail_lines == 0 {
        // One enormous line: cut raw bytes from both ends.
        let head = &text[..floor_char_boundary(text, head_budget)];
        let tail_at = floor_char_boundary(text, text.len().saturating_sub(tail_budget));
        return format!("{head}\n... [middle truncated] ...\n{}", &text[tail_at..]);
    }

    let skipped = lines.len() - head_lines - tail_lines;
    format!(
        "{}... [{skipped} lines truncated] ...\n{}",
        &text[..head_end],
        &text[tail_start..]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_not_truncated() {
        let out = Truncator::default().truncate("", 100, None).unwrap();
        assert!(!out.truncated);
        assert_eq!(out.content, "");
    }

    #[test]
    fn zero_budget_is_an_error() {
        let err = Truncator::default().truncate("text", 0, None);
        assert!(matches!(err, Err(TruncateError::InvalidBudget)));
    }

    #[test]
    fn within_budget_returns_unchanged() {
        let out = Truncator::default().truncate("short", 100, None).unwrap();
        assert!(!out.truncated);
        assert_eq!(out.method, TruncateMethod::None);
        assert!(out.syntax_valid);
    }

    #[test]
    fn generic_keeps_head_and_tail() {
        let text: String = (0..100).map(|i| format!("line {i}\n")).collect();
        let out = Truncator::default().truncate(&text, 200, None).unwrap();
        assert!(out.truncated);
        assert!(out.final_size <= 200);
        assert!(out.content.starts_with("line 0"));
        assert!(out.content.contains("lines truncated"));
        assert!(out.content.trim_end().ends_with("line 99"));
    }

    #[test]
    fn single_giant_line_is_cut_at_char_boundaries() {
        let text = "é".repeat(10_000);
        let out = Truncator::default().truncate(&text, 300, None).unwrap();
        assert!(out.final_size <= 300);
        assert!(out.content.contains("middle truncated"));
    }

    #[test]
    fn markup_uses_generic_strategy() {
        let text = format!("<doc>\n{}\n</doc>", "<item/>\n".repeat(200));
        let out = Truncator::default()
            .truncate(&text, 150, Some(ContentType::Markup))
            .unwrap();
        assert_eq!(out.method, TruncateMethod::HeadTail);
        assert!(out.final_size <= 150);
    }

    #[test]
    fn method_names_are_stable() {
        assert_eq!(TruncateMethod::ArrayTruncation.as_str(), "array-truncation");
        assert_eq!(TruncateMethod::SafeJsonFallback.as_str(), "safe-json-fallback");
        assert_eq!(TruncateMethod::MinimalJson.as_str(), "minimal-json");
    }
}
