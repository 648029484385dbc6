//! The JSON truncation pipeline: repair, then staged size reduction.

use serde_json::Value;

use crate::repair::validate_and_fix;
use crate::truncate::{TruncateConfig, TruncateMethod};

/// Run the staged JSON pipeline. Returns `None` when the input cannot be
/// parsed or repaired at all; the caller then falls back to the generic
/// strategy under `safe-json-fallback`.
pub(crate) fn truncate_json(
    text: &str,
    max_bytes: usize,
    cfg: &TruncateConfig,
) -> Option<(String, bool, TruncateMethod)> {
    let check = validate_and_fix(text);
    if !check.valid && value_is_skeleton(&check.suggestions) {
        // No structural repair succeeded; the caller preserves the raw
        // input through the generic strategy instead.
        return None;
    }
    let source = if check.valid {
        text.to_string()
    } else {
        check.fixed.clone()?
    };
    let mut value: Value = serde_json::from_str(&source).ok()?;

    let stages: [(TruncateMethod, fn(&mut Value, &TruncateConfig)); 3] = [
        (TruncateMethod::ArrayTruncation, shorten_arrays),
        (TruncateMethod::PropertyRemoval, drop_denylisted),
        (TruncateMethod::StringTruncation, shorten_strings),
    ];
    let mut attempts = 0;
    for (method, stage) in stages {
        if attempts >= cfg.max_attempts {
            break;
        }
        attempts += 1;
        stage(&mut value, cfg);
        let encoded = value.to_string();
        if encoded.len() <= max_bytes {
            return Some((encoded, true, method));
        }
    }

    let skeleton = skeleton_of(&value, max_bytes);
    Some((skeleton, true, TruncateMethod::MinimalJson))
}

fn value_is_skeleton(suggestions: &[String]) -> bool {
    suggestions.iter().any(|s| s.contains("skeleton"))
}

/// Keep the first K elements of every array, appending an elision marker.
fn shorten_arrays(value: &mut Value, cfg: &TruncateConfig) {
    match value {
        Value::Array(items) => {
            if items.len() > cfg.keep_array_items {
                let elided = items.len() - cfg.keep_array_items;
                items.truncate(cfg.keep_array_items);
                items.push(Value::String(format!("... [{elided} items truncated]")));
            }
            for item in items.iter_mut() {
                shorten_arrays(item, cfg);
            }
        }
        Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                shorten_arrays(v, cfg);
            }
        }
        _ => {}
    }
}

/// Remove object properties whose keys match the denylist.
fn drop_denylisted(value: &mut Value, cfg: &TruncateConfig) {
    match value {
        Value::Object(map) => {
            map.retain(|key, _| {
                let key = key.to_lowercase();
                !cfg.drop_keys.iter().any(|drop| key.contains(drop))
            });
            for (_, v) in map.iter_mut() {
                drop_denylisted(v, cfg);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                drop_denylisted(item, cfg);
            }
        }
        _ => {}
    }
}

/// Shorten long leaf strings, marking the cut.
fn shorten_strings(value: &mut Value, cfg: &TruncateConfig) {
    match value {
        Value::String(s) => {
            if s.chars().count() > cfg.max_leaf_string {
                let kept: String = s.chars().take(cfg.max_leaf_string).collect();
                *s = format!("{kept}...[truncated]");
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                shorten_strings(item, cfg);
            }
        }
        Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                shorten_strings(v, cfg);
            }
        }
        _ => {}
    }
}

/// A minimal object keeping the first three keys as compact previews,
/// progressively shrinking until it fits the budget.
fn skeleton_of(value: &Value, max_bytes: usize) -> String {
    let candidates: Vec<String> = match value {
        Value::Object(map) => (0..=3)
            .rev()
            .map(|keep| {
                let mut out = serde_json::Map::new();
                for (key, v) in map.iter().take(keep) {
                    out.insert(key.clone(), preview(v));
                }
                out.insert("...".to_string(), Value::String("truncated".to_string()));
                Value::Object(out).to_string()
            })
            .collect(),
        Value::Array(items) => vec![
            Value::Array(vec![Value::String(format!(
                "... [{} items truncated]",
                items.len()
            ))])
            .to_string(),
            "[]".to_string(),
        ],
        other => vec![preview(other).to_string(), "\"...\"".to_string()],
    };

    candidates
        .into_iter()
        .find(|c| c.len() <= max_bytes)
        .unwrap_or_else(|| "{}".to_string())
}

/// Compact stand-in for a value inside the skeleton.
fn preview(value: &Value) -> Value {
    match value {
        Value::String(s) if s.chars().count() > 40 => {
            let kept: String = s.chars().take(40).collect();
            Value::String(format!("{kept}..."))
        }
        Value::Array(items) => Value::String(format!("[{} items]", items.len())),
        Value::Object(map) => Value::String(format!("{{{} keys}}", map.len())),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str, max: usize) -> (String, bool, TruncateMethod) {
        truncate_json(text, max, &TruncateConfig::default()).unwrap()
    }

    #[test]
    fn long_arrays_are_elided() {
        let text = serde_json::json!({"items": (0..1000).collect::<Vec<_>>()}).to_string();
        let (content, valid, method) = run(&text, 200);
        assert!(valid);
        assert_eq!(method, TruncateMethod::ArrayTruncation);
        let value: Value = serde_json::from_str(&content).unwrap();
        let items = value["items"].as_array().unwrap();
        assert_eq!(items.len(), 11);
        assert!(items[10].as_str().unwrap().contains("990 items truncated"));
    }

    #[test]
    fn denylisted_keys_go_second() {
        // Arrays are short, but a bulky debug blob pushes it over budget.
        let text = serde_json::json!({
            "result": "ok",
            "debugInfo": "x".repeat(400),
        })
        .to_string();
        let (content, valid, method) = run(&text, 100);
        assert!(valid);
        assert_eq!(method, TruncateMethod::PropertyRemoval);
        let value: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["result"], "ok");
        assert!(value.get("debugInfo").is_none());
    }

    #[test]
    fn long_leaf_strings_go_third() {
        let text = serde_json::json!({"body": "y".repeat(5000)}).to_string();
        let (content, valid, method) = run(&text, 1200);
        assert!(valid);
        assert_eq!(method, TruncateMethod::StringTruncation);
        let value: Value = serde_json::from_str(&content).unwrap();
        let body = value["body"].as_str().unwrap();
        assert!(body.ends_with("...[truncated]"));
        assert!(body.len() < 1100);
    }

    #[test]
    fn skeleton_preserves_first_important_keys() {
        let text = serde_json::json!({
            "name": "svc",
            "port": 8080,
            "body": "z".repeat(5000),
            "extra": {"deep": true},
        })
        .to_string();
        let (content, valid, method) = run(&text, 80);
        assert!(valid);
        assert_eq!(method, TruncateMethod::MinimalJson);
        assert!(content.len() <= 80);
        let value: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["..."], "truncated");
    }

    #[test]
    fn repaired_input_still_truncates() {
        let mut text = serde_json::json!({"a": (0..500).collect::<Vec<_>>()}).to_string();
        text.pop(); // drop the closing brace
        let (content, valid, _) = truncate_json(&text, 150, &TruncateConfig::default()).unwrap();
        assert!(valid);
        serde_json::from_str::<Value>(&content).unwrap();
        assert!(content.len() <= 150);
    }

    #[test]
    fn unrepairable_input_defers_to_the_caller() {
        // Only the skeleton "repaired" this; the pipeline declines so the
        // caller can preserve the raw input generically.
        assert!(truncate_json("{\"a\": }", 100, &TruncateConfig::default()).is_none());
    }
}
