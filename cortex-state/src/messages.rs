//! Streaming message reducer: sliding window with importance retention.

use std::collections::BTreeSet;

use tracing::debug;

use cortex_types::{ByteCounter, Message, MessageWindowConfig, Role};

/// Importance threshold above which a message counts as important.
const IMPORTANT_AT: u8 = 7;
/// Share of the window reserved for regular (non-important) messages.
const REGULAR_SHARE: f64 = 0.70;

/// Score a message's retention importance on a 0–10 scale.
///
/// User messages dominate, tool failures outrank routine tool output,
/// assistant messages that issued tool calls outrank chatter, and
/// milestone phrases add a bonus.
#[must_use]
pub fn importance(message: &Message) -> u8 {
    let mut score = match message.role {
        Role::User => 9,
        Role::Tool => {
            if message.content.contains_ignore_case("error")
                || message.content.contains_ignore_case("failed")
            {
                8
            } else {
                6
            }
        }
        Role::Assistant if !message.tool_calls.is_empty() => 7,
        _ => 5,
    };
    if ["task completed", "plan:", "summary:"]
        .iter()
        .any(|marker| message.content.contains_ignore_case(marker))
    {
        score = (score + 2).min(10);
    }
    score
}

/// Reduce the message log to the configured window.
///
/// Appends `update` to `prev` (merging by id where ids coincide; newer
/// non-empty fields overwrite), then enforces both the count and byte
/// bounds while preserving original relative order. Reducing with an
/// empty update and in-bounds state is the identity.
#[must_use]
pub fn reduce_messages(
    prev: Vec<Message>,
    update: Vec<Message>,
    cfg: &MessageWindowConfig,
) -> Vec<Message> {
    let mut merged = prev;
    for message in update {
        let slot = message.id.as_deref().and_then(|id| {
            merged
                .iter_mut()
                .find(|m| m.id.as_deref() == Some(id))
        });
        match slot {
            Some(existing) => merge_into(existing, message),
            None => merged.push(message),
        }
    }

    let counter = ByteCounter::default();
    if merged.len() <= cfg.max_messages && counter.messages_bytes(&merged) <= cfg.max_total_bytes {
        return merged;
    }

    let keep = if cfg.preserve_important {
        select_by_importance(&merged, cfg)
    } else {
        select_recent(&merged, cfg)
    };

    let mut keep = keep;
    enforce_byte_bound(&merged, &mut keep, cfg, &counter);

    let before = merged.len();
    let output: Vec<Message> = merged
        .into_iter()
        .enumerate()
        .filter_map(|(idx, m)| keep.contains(&idx).then_some(m))
        .collect();
    debug!(before, after = output.len(), "reduced message window");
    output
}

fn merge_into(existing: &mut Message, newer: Message) {
    existing.role = newer.role;
    if !newer.content.is_empty() {
        existing.content = newer.content;
    }
    if !newer.tool_calls.is_empty() {
        existing.tool_calls = newer.tool_calls;
    }
}

/// Plain sliding window: the most recent `max_messages`.
fn select_recent(merged: &[Message], cfg: &MessageWindowConfig) -> BTreeSet<usize> {
    let start = merged.len().saturating_sub(cfg.max_messages);
    (start..merged.len()).collect()
}

/// Tiered retention: the last R regular and last I important messages,
/// with user messages pinned when the important tier overflows.
fn select_by_importance(merged: &[Message], cfg: &MessageWindowConfig) -> BTreeSet<usize> {
    let max = cfg.max_messages;
    let regular_quota = (max as f64 * REGULAR_SHARE).floor() as usize;
    let important_quota = max - regular_quota;

    let mut important: Vec<usize> = Vec::new();
    let mut regular: Vec<usize> = Vec::new();
    for (idx, message) in merged.iter().enumerate() {
        if importance(message) >= IMPORTANT_AT {
            important.push(idx);
        } else {
            regular.push(idx);
        }
    }

    let mut keep: BTreeSet<usize> = if important.len() <= important_quota {
        important.iter().copied().collect()
    } else {
        // Overflowing tier: the most recent fill the quota, and user
        // messages are pinned on top of it.
        let mut set: BTreeSet<usize> = important
            .iter()
            .rev()
            .take(important_quota)
            .copied()
            .collect();
        set.extend(
            important
                .iter()
                .copied()
                .filter(|&idx| merged[idx].role == Role::User),
        );
        set
    };

    let regular_slots = max.saturating_sub(keep.len());
    keep.extend(regular.iter().rev().take(regular_slots).copied());

    // When one tier underfills its quota, backfill the window with the
    // most recent remaining messages so exactly `max` survive.
    if keep.len() < max {
        let mut backfill: Vec<usize> = (0..merged.len()).rev().filter(|i| !keep.contains(i)).collect();
        backfill.truncate(max - keep.len());
        keep.extend(backfill);
    }

    // User pinning can leave the selection above the window; shed
    // regular first, then non-user important, oldest first.
    while keep.len() > max {
        let victim = oldest_where(&keep, merged, |m| importance(m) < IMPORTANT_AT)
            .or_else(|| oldest_where(&keep, merged, |m| m.role != Role::User))
            .or_else(|| keep.first().copied());
        match victim {
            Some(idx) => keep.remove(&idx),
            None => break,
        };
    }
    keep
}

fn oldest_where(
    keep: &BTreeSet<usize>,
    merged: &[Message],
    pred: impl Fn(&Message) -> bool,
) -> Option<usize> {
    keep.iter().copied().find(|&idx| pred(&merged[idx]))
}

/// Drop messages oldest-first (regular tier before important, user kind
/// last) until the byte bound holds.
fn enforce_byte_bound(
    merged: &[Message],
    keep: &mut BTreeSet<usize>,
    cfg: &MessageWindowConfig,
    counter: &ByteCounter,
) {
    let mut bytes: usize = keep.iter().map(|&i| counter.message_bytes(&merged[i])).sum();
    while bytes > cfg.max_total_bytes && !keep.is_empty() {
        let victim = oldest_where(keep, merged, |m| importance(m) < IMPORTANT_AT)
            .or_else(|| oldest_where(keep, merged, |m| m.role != Role::User))
            .or_else(|| keep.first().copied());
        match victim {
            Some(idx) => {
                bytes -= counter.message_bytes(&merged[idx]);
                keep.remove(&idx);
            }
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_types::ToolCall;

    fn window(max_messages: usize, max_total_bytes: usize) -> MessageWindowConfig {
        MessageWindowConfig {
            max_messages,
            max_total_bytes,
            preserve_important: true,
        }
    }

    #[test]
    fn importance_scores_follow_roles() {
        assert_eq!(importance(&Message::user("hi")), 9);
        assert_eq!(importance(&Message::tool("exit 0")), 6);
        assert_eq!(importance(&Message::tool("build failed: E0308")), 8);
        assert_eq!(importance(&Message::assistant("thinking")), 5);
        let with_calls =
            Message::assistant("editing").with_tool_calls(vec![ToolCall::new("edit")]);
        assert_eq!(importance(&with_calls), 7);
    }

    #[test]
    fn milestone_markers_add_bonus() {
        assert_eq!(importance(&Message::assistant("Plan: do the thing")), 7);
        assert_eq!(importance(&Message::tool("task completed cleanly")), 8);
        // The bonus caps at 10.
        assert_eq!(importance(&Message::user("summary: all done")), 10);
    }

    #[test]
    fn pruning_promotes_user_and_tool_callers() {
        let messages = vec![
            Message::user("fix the bug"),
            Message::tool("read file a"),
            Message::tool("read file b"),
            Message::tool("read file c"),
            Message::assistant("patching").with_tool_calls(vec![ToolCall::new("edit")]),
            Message::tool("patch applied"),
        ];
        let out = reduce_messages(messages, Vec::new(), &window(3, usize::MAX));
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].content.as_text(), "fix the bug");
        assert_eq!(out[1].content.as_text(), "patching");
        assert_eq!(out[2].content.as_text(), "patch applied");
    }

    #[test]
    fn at_exactly_max_messages_nothing_is_pruned() {
        let messages: Vec<Message> = (0..5).map(|i| Message::tool(format!("t{i}"))).collect();
        let out = reduce_messages(messages.clone(), Vec::new(), &window(5, usize::MAX));
        assert_eq!(out, messages);
    }

    #[test]
    fn one_over_max_prunes_to_exactly_max() {
        let messages: Vec<Message> = (0..6).map(|i| Message::tool(format!("t{i}"))).collect();
        let out = reduce_messages(messages, Vec::new(), &window(5, usize::MAX));
        assert_eq!(out.len(), 5);
    }

    #[test]
    fn empty_update_is_identity() {
        let messages = vec![Message::user("a"), Message::assistant("b")];
        let out = reduce_messages(messages.clone(), Vec::new(), &window(10, usize::MAX));
        assert_eq!(out, messages);
    }

    #[test]
    fn merge_by_id_overwrites_newer_fields() {
        let prev = vec![
            Message::assistant("draft").with_id("m1"),
            Message::tool("out").with_id("m2"),
        ];
        let update = vec![Message::assistant("final answer").with_id("m1")];
        let out = reduce_messages(prev, update, &window(10, usize::MAX));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].content.as_text(), "final answer");
        assert_eq!(out[0].id.as_deref(), Some("m1"));
    }

    #[test]
    fn byte_bound_sheds_regular_messages_first() {
        let messages = vec![
            Message::user("keep me"),
            Message::tool(&"x".repeat(400)),
            Message::tool(&"y".repeat(400)),
            Message::assistant("done, task completed"),
        ];
        let out = reduce_messages(messages, Vec::new(), &window(3, 600));
        let total: usize = out.iter().map(Message::byte_size).sum();
        assert!(total <= 600);
        assert!(out.iter().any(|m| m.role == Role::User));
    }

    #[test]
    fn relative_order_is_preserved() {
        let messages: Vec<Message> = (0..30)
            .map(|i| {
                if i % 5 == 0 {
                    Message::user(format!("u{i}"))
                } else {
                    Message::tool(format!("t{i}"))
                }
            })
            .collect();
        let out = reduce_messages(messages, Vec::new(), &window(10, usize::MAX));
        assert!(out.len() <= 10);
        let texts: Vec<String> = out.iter().map(|m| m.content.as_text()).collect();
        let mut sorted = texts.clone();
        sorted.sort_by_key(|t| {
            t[1..].parse::<u32>().unwrap_or(0)
        });
        assert_eq!(texts, sorted);
    }

    #[test]
    fn plain_window_when_importance_disabled() {
        let cfg = MessageWindowConfig {
            max_messages: 3,
            max_total_bytes: usize::MAX,
            preserve_important: false,
        };
        let messages = vec![
            Message::user("old user"),
            Message::tool("t1"),
            Message::tool("t2"),
            Message::tool("t3"),
        ];
        let out = reduce_messages(messages, Vec::new(), &cfg);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].content.as_text(), "t1");
    }

    #[test]
    fn bounds_hold_for_streaming_appends() {
        let cfg = window(20, 4000);
        let mut state: Vec<Message> = Vec::new();
        for batch in 0..30 {
            let update: Vec<Message> = (0..5)
                .map(|i| Message::tool(format!("batch {batch} item {i} {}", "p".repeat(50))))
                .collect();
            state = reduce_messages(state, update, &cfg);
            assert!(state.len() <= 20);
            let bytes: usize = state.iter().map(Message::byte_size).sum();
            assert!(bytes <= 4000);
        }
    }
}
