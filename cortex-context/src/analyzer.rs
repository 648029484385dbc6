//! Tool-call criticality analysis.
//!
//! Classification is a pure function of the call: the same call always
//! produces the same tier, reason, and key elements. All pattern lists
//! are configuration data, compiled once at analyzer construction.

use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};
use serde::{Deserialize, Serialize};

use cortex_types::{Message, ToolCall};

/// Top-N caps for extracted key elements.
const MAX_FUNCTIONS: usize = 10;
const MAX_TYPES: usize = 8;
const MAX_EXPORTS: usize = 6;

static FUNCTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)function\s+(\w+)|\bfn\s+(\w+)|\bdef\s+(\w+)|const\s+(\w+)\s*=\s*(?:async\s+)?\(")
        .expect("function extraction regex")
});

static TYPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)\binterface\s+(\w+)|\btype\s+(\w+)\s*=|\benum\s+(\w+)|\bclass\s+(\w+)|\bstruct\s+(\w+)")
        .expect("type extraction regex")
});

static EXPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)export\s+(?:default\s+)?(?:async\s+)?(?:const|function|class|interface|type|enum)\s+(\w+)|\bpub\s+fn\s+(\w+)")
        .expect("export extraction regex")
});

/// How much a tool call matters to the session's behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Criticality {
    /// Losing this call would change system behavior (configs, secrets,
    /// auth, routes, build).
    Essential,
    /// Core business logic, data models, significant components.
    Important,
    /// Everything else.
    Routine,
}

/// A classification verdict with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// The tier.
    pub criticality: Criticality,
    /// Which rule matched.
    pub reason: String,
    /// Confidence in the match, 0–1.
    pub confidence: f32,
    /// Whether downstream compaction must keep the full content.
    pub preserve_full_content: bool,
}

/// Pattern tables driving classification. All entries are regex sources
/// matched case-insensitively; the defaults are representative, and hosts
/// override them as data rather than code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Path patterns marking configuration files.
    pub config_paths: Vec<String>,
    /// Content markers (matched uppercased) for secrets and environment.
    pub secret_markers: Vec<String>,
    /// Path/content patterns for database configuration.
    pub database_patterns: Vec<String>,
    /// Path/content patterns for authentication and authorization code.
    pub auth_patterns: Vec<String>,
    /// Path/content patterns for API routes and middleware.
    pub route_patterns: Vec<String>,
    /// Path patterns for build and deployment configuration.
    pub build_patterns: Vec<String>,
    /// Naming patterns for business logic.
    pub business_patterns: Vec<String>,
    /// Stateful-hook markers for significant UI components.
    pub ui_hook_markers: Vec<String>,
    /// Patterns for data-model definitions.
    pub model_patterns: Vec<String>,
    /// Naming patterns for reusable utilities.
    pub utility_patterns: Vec<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect();
        Self {
            config_paths: strings(&[
                r"config",
                r"\.env",
                r"tsconfig",
                r"package\.json",
                r"cargo\.toml",
                r"dockerfile",
                r"webpack",
                r"vite\.config",
                r"settings",
            ]),
            secret_markers: strings(&[
                "API_KEY",
                "SECRET",
                "TOKEN",
                "PASSWORD",
                "DATABASE_URL",
                "JWT_SECRET",
                "PRIVATE_KEY",
            ]),
            database_patterns: strings(&[
                r"schema\.(sql|prisma)",
                r"migrations?/",
                r"\bdb/config",
                r"database\.(yml|json|toml)",
            ]),
            auth_patterns: strings(&[
                r"auth",
                r"\blogin\b",
                r"session",
                r"passport",
                r"jwt",
                r"oauth",
            ]),
            route_patterns: strings(&[
                r"routes?/",
                r"middleware",
                r"api/",
                r"endpoints?",
                r"controllers?/",
            ]),
            build_patterns: strings(&[
                r"makefile",
                r"\.github/workflows",
                r"docker-compose",
                r"\.gitlab-ci",
                r"build\.(gradle|rs)",
                r"deploy",
            ]),
            business_patterns: strings(&[
                r"service",
                r"controller",
                r"manager",
                r"handler",
                r"processor",
                r"validator",
                r"repository",
                r"provider",
            ]),
            ui_hook_markers: strings(&[r"useState", r"useEffect", r"useReducer", r"useContext"]),
            model_patterns: strings(&[
                r"\binterface\s+\w+",
                r"\btype\s+\w+\s*=",
                r"\benum\s+\w+",
                r"\bclass\s+\w+",
                r"\bstruct\s+\w+",
                r"models?/",
                r"types?/",
            ]),
            utility_patterns: strings(&[r"utils?/", r"helpers?/", r"\blib/", r"shared/", r"common/"]),
        }
    }
}

struct Rules {
    config_paths: RegexSet,
    database: RegexSet,
    auth: RegexSet,
    routes: RegexSet,
    build: RegexSet,
    business: RegexSet,
    ui_hooks: RegexSet,
    models: RegexSet,
    utilities: RegexSet,
    secret_markers: Vec<String>,
}

fn compile(patterns: &[String]) -> RegexSet {
    let sources: Vec<String> = patterns.iter().map(|p| format!("(?i){p}")).collect();
    RegexSet::new(&sources).unwrap_or_else(|_| RegexSet::new(["$^"]).expect("empty regex set"))
}

/// A tool call attributed to its source message, with tiering and key
/// elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedCall {
    /// Index of the message the call came from.
    pub message_index: usize,
    /// Tool name.
    pub name: String,
    /// Target path, when present.
    pub path: Option<String>,
    /// The classification verdict.
    pub classification: Classification,
    /// One-line structured summary (important/routine tiers).
    pub summary: Option<String>,
    /// Extracted symbols.
    pub key_elements: KeyElements,
}

/// Symbols pulled from a call's content by regex scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyElements {
    /// Function names, top 10.
    pub functions: Vec<String>,
    /// Type/interface/class names, top 8.
    pub types: Vec<String>,
    /// Exported symbols, top 6.
    pub exports: Vec<String>,
}

impl KeyElements {
    fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.types.is_empty() && self.exports.is_empty()
    }
}

/// Analysis of a message window, grouped by tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolAnalysis {
    /// Calls whose loss would change behavior.
    pub essential: Vec<AnalyzedCall>,
    /// Calls worth a structured summary.
    pub important: Vec<AnalyzedCall>,
    /// Everything else, one line each.
    pub routine: Vec<AnalyzedCall>,
    /// Total calls inspected.
    pub total_analyzed: usize,
}

/// Classifies tool calls against compiled pattern tables.
///
/// # Example
///
/// ```
/// use cortex_context::{Criticality, ToolCallAnalyzer};
/// use cortex_types::ToolCall;
///
/// let analyzer = ToolCallAnalyzer::default();
/// let call = ToolCall::new("write_file").with_path(".env.production");
/// assert_eq!(analyzer.classify(&call).criticality, Criticality::Essential);
/// ```
pub struct ToolCallAnalyzer {
    rules: Rules,
}

impl Default for ToolCallAnalyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}

impl ToolCallAnalyzer {
    /// Compile the pattern tables once.
    #[must_use]
    pub fn new(cfg: AnalyzerConfig) -> Self {
        Self {
            rules: Rules {
                config_paths: compile(&cfg.config_paths),
                database: compile(&cfg.database_patterns),
                auth: compile(&cfg.auth_patterns),
                routes: compile(&cfg.route_patterns),
                build: compile(&cfg.build_patterns),
                business: compile(&cfg.business_patterns),
                ui_hooks: compile(&cfg.ui_hook_markers),
                models: compile(&cfg.model_patterns),
                utilities: compile(&cfg.utility_patterns),
                secret_markers: cfg.secret_markers,
            },
        }
    }

    /// Classify one call. Pure and deterministic: identical calls yield
    /// identical verdicts.
    #[must_use]
    pub fn classify(&self, call: &ToolCall) -> Classification {
        let path = call.path.clone().unwrap_or_default();
        let content = call.scan_text();
        let rules = &self.rules;

        let essential = |reason: &str, confidence: f32| Classification {
            criticality: Criticality::Essential,
            reason: reason.to_string(),
            confidence,
            preserve_full_content: true,
        };

        if rules.config_paths.is_match(&path) {
            return essential("configuration file", 0.95);
        }
        let upper = content.to_uppercase();
        if rules.secret_markers.iter().any(|m| upper.contains(m)) {
            return essential("secrets or environment values", 0.98);
        }
        if rules.database.is_match(&path) || rules.database.is_match(&content) {
            return essential("database configuration", 0.92);
        }
        if rules.auth.is_match(&path) {
            return essential("authentication or authorization code", 0.92);
        }
        if rules.routes.is_match(&path) {
            return essential("api routes or middleware", 0.90);
        }
        if rules.build.is_match(&path) {
            return essential("build or deployment configuration", 0.90);
        }

        let important = |reason: &str, confidence: f32| Classification {
            criticality: Criticality::Important,
            reason: reason.to_string(),
            confidence,
            preserve_full_content: false,
        };

        if rules.business.is_match(&path) || rules.business.is_match(&call.name) {
            return important("business logic naming", 0.75);
        }
        let is_component = path.ends_with(".tsx") || path.ends_with(".jsx");
        if is_component && rules.ui_hooks.is_match(&content) {
            return important("stateful ui component", 0.70);
        }
        if rules.models.is_match(&path) || rules.models.is_match(&content) {
            return important("data model definitions", 0.70);
        }
        if rules.utilities.is_match(&path) {
            return important("reusable utility code", 0.65);
        }

        Classification {
            criticality: Criticality::Routine,
            reason: "routine operation".to_string(),
            confidence: 0.50,
            preserve_full_content: false,
        }
    }

    /// Extract key symbols from a call's content.
    #[must_use]
    pub fn key_elements(&self, call: &ToolCall) -> KeyElements {
        let content = call.scan_text();
        KeyElements {
            functions: captures(&FUNCTION_RE, &content, MAX_FUNCTIONS),
            types: captures(&TYPE_RE, &content, MAX_TYPES),
            exports: captures(&EXPORT_RE, &content, MAX_EXPORTS),
        }
    }

    /// Analyze every tool call across a message window.
    #[must_use]
    pub fn analyze(&self, messages: &[Message]) -> ToolAnalysis {
        let mut analysis = ToolAnalysis::default();
        for (message_index, message) in messages.iter().enumerate() {
            for call in &message.tool_calls {
                analysis.total_analyzed += 1;
                let classification = self.classify(call);
                let key_elements = if classification.criticality == Criticality::Essential {
                    KeyElements::default()
                } else {
                    self.key_elements(call)
                };
                let summary = (classification.criticality != Criticality::Essential)
                    .then(|| summarize_call(call, &key_elements));
                analysis_bucket(&mut analysis, classification.criticality).push(AnalyzedCall {
                    message_index,
                    name: call.name.clone(),
                    path: call.path.clone(),
                    classification,
                    summary,
                    key_elements,
                });
            }
        }
        analysis
    }
}

fn analysis_bucket(analysis: &mut ToolAnalysis, tier: Criticality) -> &mut Vec<AnalyzedCall> {
    match tier {
        Criticality::Essential => &mut analysis.essential,
        Criticality::Important => &mut analysis.important,
        Criticality::Routine => &mut analysis.routine,
    }
}

fn captures(re: &Regex, content: &str, cap: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for found in re.captures_iter(content) {
        if let Some(name) = found
            .iter()
            .skip(1)
            .flatten()
            .map(|m| m.as_str().to_string())
            .next()
        {
            if !out.contains(&name) {
                out.push(name);
            }
        }
        if out.len() >= cap {
            break;
        }
    }
    out
}

fn summarize_call(call: &ToolCall, elements: &KeyElements) -> String {
    let path = call.path.as_deref().unwrap_or("-");
    if elements.is_empty() {
        format!("{} → {path}", call.name)
    } else {
        format!(
            "{} → {path} | Functions:[{}] | Types:[{}] | Exports:[{}]",
            call.name,
            elements.functions.join(", "),
            elements.types.join(", "),
            elements.exports.join(", "),
        )
    }
}
