//! Content-type detection for the truncation dispatch table.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// Declaration shapes that mark JS/TS-family source.
static CODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^\s*(export\s|import\s|function\s+\w|class\s+\w|interface\s+\w|type\s+\w+\s*=|const\s+\w+\s*=)|=>",
    )
    .expect("code detection regex")
});

/// The content classes the truncator dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    /// A JSON document.
    Json,
    /// JS/TS-family source code.
    Code,
    /// HTML or XML markup.
    Markup,
    /// A box-drawing directory tree.
    Tree,
    /// Anything else.
    Text,
}

/// Classify text by ordered structural checks: JSON, then code, then
/// markup, then directory trees, else plain text.
#[must_use]
pub fn detect(text: &str) -> ContentType {
    let trimmed = text.trim_start();
    if looks_like_json(trimmed) {
        return ContentType::Json;
    }
    if CODE_RE.is_match(text) {
        return ContentType::Code;
    }
    if trimmed.starts_with('<') {
        return ContentType::Markup;
    }
    if text.contains('├') || text.contains('└') || text.contains('│') {
        return ContentType::Tree;
    }
    ContentType::Text
}

fn looks_like_json(trimmed: &str) -> bool {
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return false;
    }
    balanced_delimiters(trimmed) && serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
}

/// String-aware check that braces and brackets pair up.
fn balanced_delimiters(text: &str) -> bool {
    let mut braces = 0i64;
    let mut brackets = 0i64;
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
            '{' if !in_string => braces += 1,
            '}' if !in_string => braces -= 1,
            '[' if !in_string => brackets += 1,
            ']' if !in_string => brackets -= 1,
            _ => {}
        }
        if braces < 0 || brackets < 0 {
            return false;
        }
    }
    braces == 0 && brackets == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_json_objects_and_arrays() {
        assert_eq!(detect(r#"{"a": 1}"#), ContentType::Json);
        assert_eq!(detect("[1, 2, 3]"), ContentType::Json);
    }

    #[test]
    fn unbalanced_json_is_not_json() {
        assert_ne!(detect(r#"{"a": 1"#), ContentType::Json);
    }

    #[test]
    fn detects_code() {
        assert_eq!(
            detect("import { x } from './x';\nexport function f() {}"),
            ContentType::Code
        );
        assert_eq!(detect("const add = (a, b) => a + b;"), ContentType::Code);
    }

    #[test]
    fn detects_markup() {
        assert_eq!(detect("<html><body/></html>"), ContentType::Markup);
    }

    #[test]
    fn detects_directory_trees() {
        let tree = "src\n├── lib.rs\n└── main.rs\n";
        assert_eq!(detect(tree), ContentType::Tree);
    }

    #[test]
    fn plain_text_falls_through() {
        assert_eq!(detect("just a sentence about nothing"), ContentType::Text);
    }

    #[test]
    fn json_check_precedes_code_check() {
        // A JSON body mentioning "class" in a string is still JSON.
        assert_eq!(detect(r#"{"note": "export class X"}"#), ContentType::Json);
    }
}
