//! Pressure-banded prompt rewriting.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use cortex_types::{Content, Message, PressureTable, Role};

use crate::analyzer::{ToolAnalysis, ToolCallAnalyzer};

/// Cap on extracted decisions, resolved errors, and progress items.
const MAX_EXTRACTED: usize = 10;

static DECISION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^.*(?:\b(?:decided|decision|chose|going with)\b|plan:).*$")
        .expect("decision regex")
});

static RESOLVED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^.*\b(fixed|resolved|worked around)\b.*$").expect("resolved regex")
});

static PROGRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^.*\b(completed|implemented|added|created|done)\b.*$")
        .expect("progress regex")
});

/// Message-shape requirements of an LLM provider.
///
/// Carried as data so the manager can emit a list the target API accepts:
/// where the system message must sit, whether more than one is allowed,
/// and which role a synthesized summary takes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFormat {
    /// Provider name for logs.
    pub name: String,
    /// The system message must be first.
    pub system_first: bool,
    /// Only a single system message is permitted.
    pub single_system: bool,
    /// Role a synthesized summary message adopts.
    pub summary_role: Role,
    /// Advertised context length in tokens. Informational only; no
    /// truncation happens at this layer.
    pub max_context_tokens: usize,
}

impl ProviderFormat {
    /// Anthropic-style: system first, single system, summary as user.
    #[must_use]
    pub fn anthropic() -> Self {
        Self {
            name: "anthropic".to_string(),
            system_first: true,
            single_system: true,
            summary_role: Role::User,
            max_context_tokens: 200_000,
        }
    }

    /// OpenAI-style: system first, single system, summary as user.
    #[must_use]
    pub fn openai() -> Self {
        Self {
            name: "openai".to_string(),
            system_first: true,
            single_system: true,
            summary_role: Role::User,
            max_context_tokens: 128_000,
        }
    }

    /// Ollama-style: system first, multiple systems allowed, summary as
    /// system.
    #[must_use]
    pub fn ollama() -> Self {
        Self {
            name: "ollama".to_string(),
            system_first: true,
            single_system: false,
            summary_role: Role::System,
            max_context_tokens: 32_768,
        }
    }
}

/// The five pressure bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PressureBand {
    /// ρ < 0.60: no rewriting.
    Low,
    /// 0.60 ≤ ρ < 0.70: keep ~70% recent.
    Moderate,
    /// 0.70 ≤ ρ < 0.80: keep ~50% recent.
    Elevated,
    /// 0.80 ≤ ρ < 0.90: keep ~30% recent.
    High,
    /// ρ ≥ 0.90: system + summary + last few only.
    Emergency,
}

impl PressureBand {
    /// Band for a pressure reading.
    #[must_use]
    pub fn for_pressure(rho: f64) -> Self {
        if rho < 0.60 {
            PressureBand::Low
        } else if rho < 0.70 {
            PressureBand::Moderate
        } else if rho < 0.80 {
            PressureBand::Elevated
        } else if rho < 0.90 {
            PressureBand::High
        } else {
            PressureBand::Emergency
        }
    }
}

/// What an [`ContextManager::adapt_report`] call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptReport {
    /// The band the pressure landed in.
    pub band: PressureBand,
    /// Messages in.
    pub input_len: usize,
    /// Messages out.
    pub output_len: usize,
    /// Old messages folded into the summary.
    pub folded: usize,
    /// Essential calls found in the folded window.
    pub essential: usize,
    /// Important calls found.
    pub important: usize,
    /// Routine calls found.
    pub routine: usize,
    /// Extracted decision lines.
    pub decisions: usize,
    /// Extracted resolved-error lines.
    pub errors_resolved: usize,
    /// Extracted progress lines.
    pub progress: usize,
}

impl AdaptReport {
    fn passthrough(band: PressureBand, len: usize) -> Self {
        Self {
            band,
            input_len: len,
            output_len: len,
            folded: 0,
            essential: 0,
            important: 0,
            routine: 0,
            decisions: 0,
            errors_resolved: 0,
            progress: 0,
        }
    }
}

/// Rewrites the prompt before each LLM call according to memory pressure.
///
/// # Example
///
/// ```
/// use cortex_context::{ContextManager, ProviderFormat, ToolCallAnalyzer};
/// use cortex_types::{Message, PressureTable};
///
/// let manager = ContextManager::new(ToolCallAnalyzer::default(), PressureTable::default());
/// let messages = vec![Message::system("be terse"), Message::user("hello")];
/// let out = manager.adapt(messages, &ProviderFormat::anthropic(), 0.30);
/// assert_eq!(out.len(), 2);
/// ```
pub struct ContextManager {
    analyzer: ToolCallAnalyzer,
    table: PressureTable,
}

impl ContextManager {
    /// Build a manager from an analyzer and a (validated) pressure table.
    #[must_use]
    pub fn new(analyzer: ToolCallAnalyzer, table: PressureTable) -> Self {
        Self {
            analyzer,
            table: table.validated(),
        }
    }

    /// Adapt the message list for the provider under pressure `rho`.
    #[must_use]
    pub fn adapt(&self, messages: Vec<Message>, provider: &ProviderFormat, rho: f64) -> Vec<Message> {
        self.adapt_report(messages, provider, rho).0
    }

    /// [`adapt`](Self::adapt) plus a report of what happened.
    #[must_use]
    pub fn adapt_report(
        &self,
        messages: Vec<Message>,
        provider: &ProviderFormat,
        rho: f64,
    ) -> (Vec<Message>, AdaptReport) {
        let band = PressureBand::for_pressure(rho);
        let input_len = messages.len();
        if messages.is_empty() {
            return (messages, AdaptReport::passthrough(band, 0));
        }

        let (output, mut report) = match band {
            PressureBand::Low => (
                format_for_provider(messages, provider),
                AdaptReport::passthrough(band, input_len),
            ),
            PressureBand::Moderate => self.fold(messages, self.table.moderate_keep, band, provider),
            PressureBand::Elevated => self.fold(messages, self.table.elevated_keep, band, provider),
            PressureBand::High => self.fold(messages, self.table.high_keep, band, provider),
            PressureBand::Emergency => self.emergency(messages, band, provider),
        };
        report.input_len = input_len;
        report.output_len = output.len();
        debug!(
            band = ?band,
            input = input_len,
            output = output.len(),
            provider = %provider.name,
            "adapted context"
        );
        (output, report)
    }

    /// Summarize old messages, keeping `keep_ratio` of the recent window
    /// verbatim and every essential message intact.
    fn fold(
        &self,
        messages: Vec<Message>,
        keep_ratio: f64,
        band: PressureBand,
        provider: &ProviderFormat,
    ) -> (Vec<Message>, AdaptReport) {
        let input_len = messages.len();
        let (system, rest) = split_first_system(messages);

        let recent_quota = ((rest.len() as f64) * keep_ratio).ceil() as usize;
        let split_at = rest.len().saturating_sub(recent_quota);
        if split_at == 0 {
            // Nothing old enough to fold.
            let mut out = Vec::new();
            out.extend(system);
            out.extend(rest);
            return (
                format_for_provider(out, provider),
                AdaptReport::passthrough(band, input_len),
            );
        }
        let old = &rest[..split_at];
        let recent = &rest[split_at..];

        let analysis = self.analyzer.analyze(old);
        let essential_indices: Vec<usize> = {
            let mut idx: Vec<usize> = analysis.essential.iter().map(|c| c.message_index).collect();
            idx.sort_unstable();
            idx.dedup();
            idx
        };

        let decisions = extract(old, &DECISION_RE);
        let errors_resolved = extract(old, &RESOLVED_RE);
        let progress = extract(old, &PROGRESS_RE);

        let folded = old.len() - essential_indices.len();
        let summary = build_summary(
            provider.summary_role,
            folded,
            &analysis,
            &decisions,
            &errors_resolved,
            &progress,
        );

        let mut output: Vec<Message> = Vec::with_capacity(2 + essential_indices.len() + recent.len());
        output.extend(system.clone());
        for &idx in &essential_indices {
            output.push(old[idx].clone());
        }
        output.push(summary);
        output.extend(recent.iter().cloned());

        // A fold that fails to shrink the prompt is pointless; take the
        // emergency path instead (which itself degrades to passthrough
        // when the conversation is too short to compact).
        if output.len() >= input_len {
            warn!(input = input_len, output = output.len(), "fold did not shrink, escalating");
            let mut original: Vec<Message> = Vec::with_capacity(input_len);
            original.extend(system);
            original.extend(rest);
            return self.emergency(original, band, provider);
        }

        let report = AdaptReport {
            band,
            input_len,
            output_len: output.len(),
            folded,
            essential: analysis.essential.len(),
            important: analysis.important.len(),
            routine: analysis.routine.len(),
            decisions: decisions.len(),
            errors_resolved: errors_resolved.len(),
            progress: progress.len(),
        };
        (format_for_provider(output, provider), report)
    }

    /// Keep only the system message, one summary, and the last few
    /// non-system messages.
    fn emergency(
        &self,
        messages: Vec<Message>,
        band: PressureBand,
        provider: &ProviderFormat,
    ) -> (Vec<Message>, AdaptReport) {
        let input_len = messages.len();
        let (system, rest) = split_first_system(messages);
        let keep = self.table.emergency_recent.min(rest.len());
        let folded = rest.len() - keep;

        let analysis = self.analyzer.analyze(&rest[..rest.len() - keep]);
        let summary = Message {
            role: provider.summary_role,
            content: Content::Text(format!(
                "[Context summary] Emergency compaction: {folded} earlier messages dropped \
                 ({} essential, {} important, {} routine tool calls observed).",
                analysis.essential.len(),
                analysis.important.len(),
                analysis.routine.len(),
            )),
            tool_calls: Vec::new(),
            id: None,
        };

        let mut output = Vec::with_capacity(2 + keep);
        output.extend(system.iter().cloned());
        output.push(summary);
        output.extend(rest[rest.len() - keep..].iter().cloned());

        // Rewriting must never grow the prompt; for conversations shorter
        // than the emergency window, leave them as they are.
        if output.len() >= input_len {
            let mut original: Vec<Message> = Vec::with_capacity(input_len);
            original.extend(system);
            original.extend(rest);
            return (
                format_for_provider(original, provider),
                AdaptReport::passthrough(band, input_len),
            );
        }

        let report = AdaptReport {
            band,
            input_len,
            output_len: output.len(),
            folded,
            essential: analysis.essential.len(),
            important: analysis.important.len(),
            routine: analysis.routine.len(),
            decisions: 0,
            errors_resolved: 0,
            progress: 0,
        };
        (format_for_provider(output, provider), report)
    }
}

/// Pull the first system message out, preserving everything else in
/// order.
fn split_first_system(messages: Vec<Message>) -> (Option<Message>, Vec<Message>) {
    let mut system = None;
    let mut rest = Vec::with_capacity(messages.len());
    for message in messages {
        if system.is_none() && message.role == Role::System {
            system = Some(message);
        } else {
            rest.push(message);
        }
    }
    (system, rest)
}

/// Enforce the provider's message-shape rules: system message first, and
/// extra system messages demoted when only one is permitted.
fn format_for_provider(messages: Vec<Message>, provider: &ProviderFormat) -> Vec<Message> {
    let (system, rest) = split_first_system(messages);
    let mut out = Vec::with_capacity(rest.len() + 1);
    match (system, provider.system_first) {
        (Some(system), _) => out.push(system),
        (None, _) => {}
    }
    for message in rest {
        if message.role == Role::System && provider.single_system {
            out.push(Message {
                role: provider.summary_role,
                content: Content::Text(format!("[system note] {}", message.content.as_text())),
                tool_calls: message.tool_calls,
                id: message.id,
            });
        } else {
            out.push(message);
        }
    }
    out
}

/// Lines matching an extraction pattern across a message window, capped.
fn extract(messages: &[Message], re: &Regex) -> Vec<String> {
    let mut out = Vec::new();
    for message in messages {
        let text = message.content.as_text();
        for found in re.find_iter(&text) {
            let line = found.as_str().trim();
            if !line.is_empty() && !out.iter().any(|existing| existing == line) {
                out.push(line.to_string());
            }
            if out.len() >= MAX_EXTRACTED {
                return out;
            }
        }
    }
    out
}

fn build_summary(
    role: Role,
    folded: usize,
    analysis: &ToolAnalysis,
    decisions: &[String],
    errors_resolved: &[String],
    progress: &[String],
) -> Message {
    let mut body = format!(
        "[Context summary] Folded {folded} earlier messages \
         ({} tool calls: {} essential, {} important, {} routine).\n",
        analysis.total_analyzed,
        analysis.essential.len(),
        analysis.important.len(),
        analysis.routine.len(),
    );

    if !analysis.essential.is_empty() {
        body.push_str("\nEssential (kept in full above):\n");
        for call in &analysis.essential {
            body.push_str(&format!(
                "- {} → {} ({})\n",
                call.name,
                call.path.as_deref().unwrap_or("-"),
                call.classification.reason,
            ));
        }
    }
    if !analysis.important.is_empty() {
        body.push_str("\nImportant:\n");
        for call in &analysis.important {
            if let Some(summary) = &call.summary {
                body.push_str(&format!("- {summary}\n"));
            }
        }
    }
    if !analysis.routine.is_empty() {
        body.push_str("\nRoutine:\n");
        for call in &analysis.routine {
            body.push_str(&format!(
                "- {} → {}\n",
                call.name,
                call.path.as_deref().unwrap_or("-"),
            ));
        }
    }

    for (title, items) in [
        ("Decisions", decisions),
        ("Errors resolved", errors_resolved),
        ("Progress", progress),
    ] {
        if !items.is_empty() {
            body.push_str(&format!("\n{title}:\n"));
            for item in items {
                body.push_str(&format!("- {item}\n"));
            }
        }
    }

    Message {
        role,
        content: Content::Text(body),
        tool_calls: Vec::new(),
        id: None,
    }
}
