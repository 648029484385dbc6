//! JSON validation, repair, and safe truncation points.
//!
//! Repair is a fixed sequence of (attempt, verify) steps over the text;
//! each step's output is parsed to confirm success before it is returned.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

static TRAILING_COMMA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",(\s*[}\]])").expect("trailing comma regex"));

static UNQUOTED_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)(\s*:)").expect("unquoted key regex"));

/// Result of [`validate_and_fix`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonCheck {
    /// Whether the input parsed as-is.
    pub valid: bool,
    /// Parse error for invalid input.
    pub error: Option<String>,
    /// Repaired text, when a repair (or the minimal skeleton) succeeded.
    pub fixed: Option<String>,
    /// The repairs that were applied.
    pub suggestions: Vec<String>,
}

impl JsonCheck {
    /// The usable text: the original when valid, otherwise the repair.
    #[must_use]
    pub fn usable(&self) -> Option<&str> {
        if self.valid {
            None
        } else {
            self.fixed.as_deref()
        }
    }
}

/// Validate JSON text, repairing it when possible.
///
/// Repairs run cumulatively in a fixed order (trailing commas, unquoted
/// keys, unbalanced delimiters, unterminated strings) and stop at the
/// first stage whose output parses. When nothing parses, a tagged minimal
/// skeleton matching the root shape is emitted instead.
#[must_use]
pub fn validate_and_fix(text: &str) -> JsonCheck {
    if let Err(err) = serde_json::from_str::<serde_json::Value>(text) {
        let error = Some(err.to_string());
        let mut suggestions = Vec::new();
        let mut current = text.to_string();

        let fixers: [(&str, fn(&str) -> String); 4] = [
            ("removed trailing commas", strip_trailing_commas),
            ("quoted unquoted keys", quote_keys),
            ("balanced braces and brackets", balance_delimiters),
            ("closed unterminated string", close_open_string),
        ];
        for (label, fixer) in fixers {
            let next = fixer(&current);
            if next != current {
                suggestions.push(label.to_string());
                current = next;
            }
            if serde_json::from_str::<serde_json::Value>(&current).is_ok() {
                debug!(repairs = suggestions.len(), "json repaired");
                return JsonCheck {
                    valid: false,
                    error,
                    fixed: Some(current),
                    suggestions,
                };
            }
        }

        suggestions.push("unrecoverable, emitted minimal skeleton".to_string());
        return JsonCheck {
            valid: false,
            error,
            fixed: Some(minimal_skeleton(text)),
            suggestions,
        };
    }
    JsonCheck {
        valid: true,
        error: None,
        fixed: None,
        suggestions: Vec::new(),
    }
}

fn strip_trailing_commas(text: &str) -> String {
    TRAILING_COMMA_RE.replace_all(text, "$1").into_owned()
}

fn quote_keys(text: &str) -> String {
    UNQUOTED_KEY_RE
        .replace_all(text, "$1\"$2\"$3")
        .into_owned()
}

/// Append missing closers in reverse nesting order and strip excess
/// closers from the end. Text ending inside an open string is left for
/// the string-closing stage; balancing it would inject closers into the
/// string body.
fn balance_delimiters(text: &str) -> String {
    let mut stack: Vec<char> = Vec::new();
    let mut excess_at: Option<usize> = None;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' | '[' if !in_string => stack.push(ch),
            '}' if !in_string => {
                if stack.last() == Some(&'{') {
                    stack.pop();
                } else if excess_at.is_none() {
                    excess_at = Some(idx);
                }
            }
            ']' if !in_string => {
                if stack.last() == Some(&'[') {
                    stack.pop();
                } else if excess_at.is_none() {
                    excess_at = Some(idx);
                }
            }
            _ => {}
        }
    }

    if in_string {
        return text.to_string();
    }
    let mut out = match excess_at {
        Some(idx) => text[..idx].to_string(),
        None => text.to_string(),
    };
    while let Some(open) = stack.pop() {
        out.push(if open == '{' { '}' } else { ']' });
    }
    out
}

/// Close a string left open at the end of the text, re-balancing after.
fn close_open_string(text: &str) -> String {
    let mut in_string = false;
    let mut escaped = false;
    for ch in text.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            _ => {}
        }
    }
    if in_string {
        let mut out = text.to_string();
        out.push('"');
        balance_delimiters(&out)
    } else {
        text.to_string()
    }
}

/// Tagged minimal replacement matching the root shape of the input.
fn minimal_skeleton(text: &str) -> String {
    match text.trim_start().chars().next() {
        Some('{') => r#"{"data":"<truncated>","error":"truncated"}"#.to_string(),
        Some('[') => r#"["<truncated>"]"#.to_string(),
        _ => "\"<content>\"".to_string(),
    }
}

/// Result of [`safe_truncation_point`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeCut {
    /// Whether a structurally safe cut exists within the budget.
    pub can_truncate: bool,
    /// Byte offset of the cut (end of a complete element), when found.
    pub point: Option<usize>,
    /// Why no cut was found.
    pub reason: Option<String>,
}

impl SafeCut {
    fn none(reason: &str) -> Self {
        Self {
            can_truncate: false,
            point: None,
            reason: Some(reason.to_string()),
        }
    }
}

/// Find the last newline-aligned position inside `max_bytes` where the
/// document can be cut without splitting an element.
///
/// The scan budget is 80% of `max_bytes`, leaving room for the closers a
/// caller appends after cutting. Array roots accept line ends in `,` or
/// `]`; object roots additionally require non-negative brace depth.
#[must_use]
pub fn safe_truncation_point(text: &str, max_bytes: usize) -> SafeCut {
    let budget = max_bytes / 5 * 4;
    let root = match text.trim_start().chars().next() {
        Some('[') => Root::Array,
        Some('{') => Root::Object,
        _ => return SafeCut::none("not a JSON container"),
    };

    let mut consumed = 0usize;
    let mut depth = 0i64;
    let mut in_string = false;
    let mut escaped = false;
    let mut point = None;

    for line in text.split_inclusive('\n') {
        if consumed + line.len() > budget {
            break;
        }
        consumed += line.len();
        for ch in line.chars() {
            if escaped {
                escaped = false;
                continue;
            }
            match ch {
                '\\' if in_string => escaped = true,
                '"' => in_string = !in_string,
                '{' | '[' if !in_string => depth += 1,
                '}' | ']' if !in_string => depth -= 1,
                _ => {}
            }
        }
        if in_string {
            continue;
        }
        let safe_end = match root {
            Root::Array => line.trim_end().ends_with([',', ']']),
            Root::Object => depth >= 0 && line.trim_end().ends_with([',', '}']),
        };
        if safe_end {
            point = Some(consumed);
        }
    }

    match point {
        Some(point) => SafeCut {
            can_truncate: true,
            point: Some(point),
            reason: None,
        },
        None => SafeCut::none("no element boundary within budget"),
    }
}

enum Root {
    Array,
    Object,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_json_passes_through() {
        let check = validate_and_fix(r#"{"a": 1}"#);
        assert!(check.valid);
        assert!(check.fixed.is_none());
    }

    #[test]
    fn trailing_commas_are_removed() {
        let check = validate_and_fix(r#"{"a": [1, 2,], }"#);
        assert!(!check.valid);
        let fixed = check.fixed.unwrap();
        serde_json::from_str::<serde_json::Value>(&fixed).unwrap();
        assert!(check.suggestions.iter().any(|s| s.contains("trailing")));
    }

    #[test]
    fn unquoted_keys_are_quoted() {
        let check = validate_and_fix(r#"{key: 1, other: "x"}"#);
        let fixed = check.fixed.unwrap();
        let value: serde_json::Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(value["key"], 1);
    }

    #[test]
    fn missing_closers_are_appended() {
        let check = validate_and_fix(r#"{"a": {"b": [1, 2"#);
        let fixed = check.fixed.unwrap();
        let value: serde_json::Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(value["a"]["b"][1], 2);
    }

    #[test]
    fn excess_closers_are_stripped() {
        let check = validate_and_fix(r#"{"a": 1}}"#);
        let fixed = check.fixed.unwrap();
        serde_json::from_str::<serde_json::Value>(&fixed).unwrap();
    }

    #[test]
    fn unterminated_string_is_closed() {
        let check = validate_and_fix(r#"{"a": "unfinished"#);
        let fixed = check.fixed.unwrap();
        let value: serde_json::Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(value["a"], "unfinished");
    }

    #[test]
    fn hopeless_object_gets_tagged_skeleton() {
        let check = validate_and_fix(r#"{"a": }"#);
        let fixed = check.fixed.unwrap();
        let value: serde_json::Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(value["error"], "truncated");
        assert!(check.suggestions.iter().any(|s| s.contains("skeleton")));
    }

    #[test]
    fn hopeless_array_gets_array_skeleton() {
        let check = validate_and_fix("[,,,]");
        let fixed = check.fixed.unwrap();
        let value: serde_json::Value = serde_json::from_str(&fixed).unwrap();
        assert!(value.is_array());
        assert!(check.suggestions.iter().any(|s| s.contains("skeleton")));
    }

    #[test]
    fn safe_point_in_array_lands_on_element_boundary() {
        let text = "[\n  \"aaaa\",\n  \"bbbb\",\n  \"cccc\",\n  \"dddd\"\n]\n";
        let cut = safe_truncation_point(text, 30);
        assert!(cut.can_truncate);
        let point = cut.point.unwrap();
        assert!(text[..point].trim_end().ends_with(','));
    }

    #[test]
    fn safe_point_respects_80_percent_budget() {
        let text = "[\n  \"aaaa\",\n  \"bbbb\"\n]\n";
        let cut = safe_truncation_point(text, text.len() + 100);
        assert!(cut.can_truncate);
    }

    #[test]
    fn scalar_root_has_no_safe_point() {
        let cut = safe_truncation_point("\"just a string\"", 100);
        assert!(!cut.can_truncate);
        assert!(cut.reason.is_some());
    }

    #[test]
    fn tiny_budget_reports_no_boundary() {
        let text = "[\n  \"aaaaaaaaaaaaaaaa\",\n  \"b\"\n]";
        let cut = safe_truncation_point(text, 5);
        assert!(!cut.can_truncate);
    }
}
