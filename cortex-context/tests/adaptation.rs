//! Banding boundaries and determinism across the public surface.

use cortex_context::{ContextManager, ProviderFormat, ToolCallAnalyzer};
use cortex_types::{Message, PressureTable, ToolCall};

fn manager() -> ContextManager {
    ContextManager::new(ToolCallAnalyzer::default(), PressureTable::default())
}

fn long_conversation() -> Vec<Message> {
    let mut messages = vec![Message::system("coding agent")];
    for i in 0..100 {
        messages.push(match i % 4 {
            0 => Message::user(format!("step {i}")),
            1 => Message::assistant(format!("working {i}")).with_tool_calls(vec![
                ToolCall::new("read_file").with_path(format!("src/file{i}.rs")),
            ]),
            _ => Message::tool(format!("result {i}")),
        });
    }
    messages
}

#[test]
fn just_below_the_band_no_change() {
    let messages = long_conversation();
    let out = manager().adapt(messages.clone(), &ProviderFormat::anthropic(), 0.60 - 1e-6);
    assert_eq!(out.len(), messages.len());
}

#[test]
fn just_above_the_band_summarizes() {
    let messages = long_conversation();
    let out = manager().adapt(messages.clone(), &ProviderFormat::anthropic(), 0.60 + 1e-6);
    assert!(out.len() < messages.len());
    assert!(
        out.iter()
            .any(|m| m.content.as_text().contains("[Context summary]"))
    );
}

#[test]
fn banding_matches_keep_ratios() {
    let messages = long_conversation();
    let moderate = manager()
        .adapt(messages.clone(), &ProviderFormat::anthropic(), 0.65)
        .len();
    let elevated = manager()
        .adapt(messages.clone(), &ProviderFormat::anthropic(), 0.75)
        .len();
    let high = manager()
        .adapt(messages.clone(), &ProviderFormat::anthropic(), 0.85)
        .len();
    let emergency = manager()
        .adapt(messages.clone(), &ProviderFormat::anthropic(), 0.95)
        .len();
    assert!(moderate > elevated);
    assert!(elevated > high);
    assert!(high > emergency);
    assert!(emergency <= 5);
}

#[test]
fn adaptation_is_deterministic() {
    let messages = long_conversation();
    let a = manager().adapt(messages.clone(), &ProviderFormat::anthropic(), 0.75);
    let b = manager().adapt(messages, &ProviderFormat::anthropic(), 0.75);
    assert_eq!(a, b);
}

#[test]
fn custom_keep_ratios_apply() {
    let table = PressureTable {
        moderate_keep: 0.90,
        ..Default::default()
    };
    let custom = ContextManager::new(ToolCallAnalyzer::default(), table);
    let messages = long_conversation();
    let out = custom.adapt(messages, &ProviderFormat::anthropic(), 0.65);
    // system + summary + 90 recent.
    assert!(out.len() >= 92);
}
