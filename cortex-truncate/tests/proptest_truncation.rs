//! Property-based tests: truncation invariants.

use cortex_truncate::Truncator;
use proptest::prelude::*;
use serde_json::{Value, json};

fn arb_json(depth: u32) -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-zA-Z0-9 ]{0,64}".prop_map(Value::String),
    ];
    leaf.prop_recursive(depth, 64, 8, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..16).prop_map(Value::Array),
            proptest::collection::btree_map("[a-z_]{1,12}", inner, 0..8)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

proptest! {
    #[test]
    fn truncated_output_never_exceeds_budget(
        text in "[ -~\n]{0,2000}",
        max in 16usize..512,
    ) {
        let out = Truncator::default().truncate(&text, max, None).unwrap();
        if out.truncated {
            prop_assert!(out.final_size <= max,
                "final {} > budget {max}", out.final_size);
        } else {
            prop_assert!(text.len() <= max);
            prop_assert_eq!(out.content.as_str(), text.as_str());
        }
    }

    #[test]
    fn truncated_json_still_parses(value in arb_json(3), max in 32usize..256) {
        let text = value.to_string();
        let out = Truncator::default()
            .truncate(&text, max, Some(cortex_truncate::ContentType::Json))
            .unwrap();
        if out.syntax_valid {
            prop_assert!(serde_json::from_str::<Value>(&out.content).is_ok(),
                "claimed valid but does not parse: {}", out.content);
        }
    }

    #[test]
    fn truncation_is_deterministic(
        text in "[ -~\n]{0,1000}",
        max in 16usize..256,
    ) {
        let truncator = Truncator::default();
        let a = truncator.truncate(&text, max, None).unwrap();
        let b = truncator.truncate(&text, max, None).unwrap();
        prop_assert_eq!(a, b);
    }
}
