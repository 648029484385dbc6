//! Per-field bounded strings: summarize, compress, truncate.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use cortex_truncate::Truncator;
use cortex_types::BoundedStringConfig;
use cortex_types::compress::{gunzip, gzip};

use crate::summarize;

/// Which summarizer a named field dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// A rendered codebase/directory tree.
    CodebaseTree,
    /// Free-form working notes.
    ContextNotes,
    /// Any other large text field.
    Generic,
}

impl FieldKind {
    /// Infer the kind from a field name.
    #[must_use]
    pub fn for_field(name: &str) -> Self {
        let name = name.to_lowercase();
        if name.contains("tree") {
            FieldKind::CodebaseTree
        } else if name.contains("note") {
            FieldKind::ContextNotes
        } else {
            FieldKind::Generic
        }
    }
}

/// Stored payload: plain text, or gzip when compression won.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum Payload {
    Text(String),
    Gzip(Vec<u8>),
}

impl Payload {
    fn stored_len(&self) -> usize {
        match self {
            Payload::Text(s) => s.len(),
            Payload::Gzip(b) => b.len(),
        }
    }
}

/// A bounded state field after processing.
///
/// `current_size` is the stored size (compressed size when gzipped) and
/// is ≤ the per-field cap after every write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundedString {
    payload: Payload,
    /// Whether a summarizer rewrote the content.
    pub summarized: bool,
    /// Whether the payload is stored gzipped.
    pub compressed: bool,
    /// Byte size of the original write.
    pub original_size: usize,
    /// Stored byte size.
    pub current_size: usize,
    /// When the field was last written.
    pub last_modified: SystemTime,
}

impl BoundedString {
    /// The field text, decompressing when needed.
    pub fn text(&self) -> Result<String, std::io::Error> {
        match &self.payload {
            Payload::Text(s) => Ok(s.clone()),
            Payload::Gzip(bytes) => {
                let raw = gunzip(bytes)?;
                String::from_utf8(raw).map_err(|e| {
                    std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
                })
            }
        }
    }
}

/// The per-field pipeline: summarize above the summarize threshold,
/// compress above the compress threshold, truncate when the cap is still
/// exceeded.
///
/// # Example
///
/// ```
/// use cortex_state::BoundedStringManager;
/// use cortex_types::BoundedStringConfig;
///
/// let manager = BoundedStringManager::new(BoundedStringConfig::default());
/// let field = manager.process("fn main() {}", "context_notes");
/// assert_eq!(field.text().unwrap(), "fn main() {}");
/// ```
pub struct BoundedStringManager {
    cfg: BoundedStringConfig,
    overrides: HashMap<String, BoundedStringConfig>,
    truncator: Truncator,
    overflow_logged: Mutex<HashSet<String>>,
}

impl BoundedStringManager {
    /// Create a manager with validated default bounds.
    #[must_use]
    pub fn new(cfg: BoundedStringConfig) -> Self {
        Self {
            cfg: cfg.validated(),
            overrides: HashMap::new(),
            truncator: Truncator::default(),
            overflow_logged: Mutex::new(HashSet::new()),
        }
    }

    /// Override the bounds for one named field.
    #[must_use]
    pub fn with_field_override(mut self, field: impl Into<String>, cfg: BoundedStringConfig) -> Self {
        self.overrides.insert(field.into(), cfg.validated());
        self
    }

    /// Use a custom truncator (shared tunables with the rest of the
    /// subsystem).
    #[must_use]
    pub fn with_truncator(mut self, truncator: Truncator) -> Self {
        self.truncator = truncator;
        self
    }

    fn config_for(&self, field: &str) -> &BoundedStringConfig {
        self.overrides.get(field).unwrap_or(&self.cfg)
    }

    /// Run the pipeline for one write to `field`.
    #[must_use]
    pub fn process(&self, text: &str, field: &str) -> BoundedString {
        let cfg = self.config_for(field);
        let original_size = text.len();
        let mut summarized = false;
        let mut current: String;

        if cfg.summarize && original_size > cfg.summarize_threshold {
            current = match FieldKind::for_field(field) {
                FieldKind::CodebaseTree => summarize::summarize_tree(text, &self.truncator),
                FieldKind::ContextNotes => summarize::summarize_notes(text),
                FieldKind::Generic => summarize::summarize_generic(text),
            };
            summarized = true;
            debug!(field, original_size, summarized_size = current.len(), "summarized field");
        } else {
            current = text.to_string();
        }

        // Still over the cap after summarize + compress: truncate the
        // text form to 80% of the cap and re-decide compression. The
        // write is never rejected.
        if effective_size(&current, cfg) > cfg.max_size {
            self.log_overflow_once(field, current.len(), cfg.max_size);
            let target = cfg.truncate_target();
            current = match self.truncator.truncate(&current, target, None) {
                Ok(out) => out.content,
                Err(_) => String::new(),
            };
        }

        let (payload, compressed) = pack(current, cfg);
        let current_size = payload.stored_len();
        BoundedString {
            payload,
            summarized,
            compressed,
            original_size,
            current_size,
            last_modified: SystemTime::now(),
        }
    }

    /// Reducer form: string fields are replace-by-write, so the previous
    /// value only informs logging.
    #[must_use]
    pub fn reduce(
        &self,
        _prev: Option<&BoundedString>,
        update: &str,
        field: &str,
    ) -> BoundedString {
        self.process(update, field)
    }

    fn log_overflow_once(&self, field: &str, size: usize, cap: usize) {
        let mut logged = self.overflow_logged.lock().expect("overflow lock");
        if logged.insert(field.to_string()) {
            warn!(field, size, cap, "field exceeds cap after pipeline, truncating");
        }
    }
}

/// The size the field would occupy once stored.
fn effective_size(text: &str, cfg: &BoundedStringConfig) -> usize {
    if cfg.compress && text.len() > cfg.compress_threshold {
        match gzip(text.as_bytes()) {
            Ok(packed) if packed.len() < text.len() => packed.len(),
            _ => text.len(),
        }
    } else {
        text.len()
    }
}

fn pack(text: String, cfg: &BoundedStringConfig) -> (Payload, bool) {
    if cfg.compress && text.len() > cfg.compress_threshold {
        if let Ok(packed) = gzip(text.as_bytes()) {
            if packed.len() < text.len() {
                return (Payload::Gzip(packed), true);
            }
        }
    }
    (Payload::Text(text), false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tight_config(max: usize, compress_at: usize, summarize_at: usize) -> BoundedStringConfig {
        BoundedStringConfig {
            max_size: max,
            compress_threshold: compress_at,
            summarize_threshold: summarize_at,
            summarize: true,
            compress: true,
        }
    }

    #[test]
    fn field_kinds_infer_from_names() {
        assert_eq!(FieldKind::for_field("codebase_tree"), FieldKind::CodebaseTree);
        assert_eq!(FieldKind::for_field("contextNotes"), FieldKind::ContextNotes);
        assert_eq!(FieldKind::for_field("scratch"), FieldKind::Generic);
    }

    #[test]
    fn small_writes_pass_through() {
        let manager = BoundedStringManager::new(BoundedStringConfig::default());
        let field = manager.process("short text", "scratch");
        assert!(!field.summarized);
        assert!(!field.compressed);
        assert_eq!(field.text().unwrap(), "short text");
        assert_eq!(field.original_size, field.current_size);
    }

    #[test]
    fn compression_kicks_in_above_threshold() {
        let manager = BoundedStringManager::new(tight_config(1_000_000, 1000, usize::MAX));
        let text = "repeated filler line\n".repeat(200);
        let field = manager.process(&text, "scratch");
        assert!(field.compressed);
        assert!(field.current_size < field.original_size / 4);
        assert_eq!(field.text().unwrap(), text);
    }

    #[test]
    fn summarization_runs_above_threshold() {
        let manager = BoundedStringManager::new(tight_config(usize::MAX, usize::MAX, 500));
        let notes: String = (0..50)
            .map(|i| format!("todo: thing {i}\n\nfiller paragraph\n\n"))
            .collect();
        let field = manager.process(&notes, "context_notes");
        assert!(field.summarized);
        let text = field.text().unwrap();
        assert!(text.starts_with("[notes summary:"));
        assert!(!text.contains("filler paragraph"));
    }

    #[test]
    fn cap_holds_after_every_write() {
        let manager = BoundedStringManager::new(tight_config(2000, usize::MAX, usize::MAX));
        let huge = "incompressible-ish 8f2a9c\n".repeat(500);
        let field = manager.process(&huge, "scratch");
        assert!(field.current_size <= 2000);
        assert!(field.original_size > 2000);
    }

    #[test]
    fn truncation_targets_80_percent_of_cap() {
        let manager = BoundedStringManager::new(tight_config(1000, usize::MAX, usize::MAX));
        let field = manager.process(&"line\n".repeat(1000), "scratch");
        assert!(field.current_size <= 800);
    }

    #[test]
    fn per_field_overrides_apply() {
        let manager = BoundedStringManager::new(BoundedStringConfig::default())
            .with_field_override("tiny", tight_config(100, usize::MAX, usize::MAX));
        let field = manager.process(&"x".repeat(5000), "tiny");
        assert!(field.current_size <= 100);
        let other = manager.process(&"x".repeat(5000), "other");
        assert_eq!(other.current_size, 5000);
    }

    #[test]
    fn reduce_discards_previous_value() {
        let manager = BoundedStringManager::new(BoundedStringConfig::default());
        let first = manager.process("first", "scratch");
        let second = manager.reduce(Some(&first), "second", "scratch");
        assert_eq!(second.text().unwrap(), "second");
    }

    #[test]
    fn tree_fields_use_the_tree_summarizer() {
        let manager = BoundedStringManager::new(tight_config(usize::MAX, usize::MAX, 100));
        let mut tree = String::from("src\n");
        for i in 0..50 {
            tree.push_str(&format!("├── mod{i}.rs\n"));
            tree.push_str(&format!("├── image{i}.png\n"));
        }
        let field = manager.process(&tree, "codebase_tree");
        let text = field.text().unwrap();
        assert!(text.starts_with("[tree summary:"));
        assert!(text.contains("mod0.rs"));
        assert!(!text.contains("image0.png"));
    }
}
