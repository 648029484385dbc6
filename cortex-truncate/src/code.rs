//! Code truncation: keep whole top-level declarations, stub the rest.
//!
//! The output never contains a half-open brace: selected blocks are
//! emitted verbatim, everything else becomes a `// kind: lines X-Y`
//! comment stub, and the listing ends with a `// [TRUNCATED]` marker.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::truncate::{TruncateConfig, TruncateMethod};

const TERMINATOR: &str = "// [TRUNCATED]\n";

static DECL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(export\s+default\b|export\b|import\b|class\b|interface\b|type\b|enum\b|function\b|async\s+function\b|const\b|let\b|var\b)",
    )
    .expect("declaration regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Import,
    ExportDefault,
    Export,
    Class,
    Interface,
    Type,
    Function,
    Const,
    Other,
}

impl BlockKind {
    fn of(first_line: &str) -> Self {
        let line = first_line.trim_start();
        if line.starts_with("import") {
            BlockKind::Import
        } else if line.starts_with("export default") {
            BlockKind::ExportDefault
        } else if line.starts_with("export") {
            BlockKind::Export
        } else if line.starts_with("class") {
            BlockKind::Class
        } else if line.starts_with("interface") {
            BlockKind::Interface
        } else if line.starts_with("type") || line.starts_with("enum") {
            BlockKind::Type
        } else if line.starts_with("function") || line.starts_with("async function") {
            BlockKind::Function
        } else if line.starts_with("const") || line.starts_with("let") || line.starts_with("var") {
            BlockKind::Const
        } else {
            BlockKind::Other
        }
    }

    /// Retention priority: exported > default > class/interface >
    /// function > const > import.
    fn score(self) -> u32 {
        match self {
            BlockKind::Export => 90,
            BlockKind::ExportDefault => 80,
            BlockKind::Class | BlockKind::Interface => 70,
            BlockKind::Type => 65,
            BlockKind::Function => 60,
            BlockKind::Const => 50,
            BlockKind::Other => 30,
            BlockKind::Import => 10,
        }
    }

    fn label(self) -> &'static str {
        match self {
            BlockKind::Import => "import",
            BlockKind::ExportDefault => "export default",
            BlockKind::Export => "export",
            BlockKind::Class => "class",
            BlockKind::Interface => "interface",
            BlockKind::Type => "type",
            BlockKind::Function => "function",
            BlockKind::Const => "const",
            BlockKind::Other => "block",
        }
    }
}

struct Block {
    kind: BlockKind,
    text: String,
    first_line: usize,
    last_line: usize,
}

impl Block {
    fn stub(&self) -> String {
        format!(
            "// {}: lines {}-{}\n",
            self.kind.label(),
            self.first_line,
            self.last_line
        )
    }
}

/// Split source into top-level blocks: a block starts at a column-zero
/// declaration and runs until the next one.
fn split_blocks(text: &str) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    for (idx, line) in text.split_inclusive('\n').enumerate() {
        let starts_block = !line.starts_with([' ', '\t', '}', ')']) && DECL_RE.is_match(line);
        match blocks.last_mut() {
            Some(last) if !starts_block => {
                last.text.push_str(line);
                last.last_line = idx + 1;
            }
            _ => blocks.push(Block {
                kind: BlockKind::of(line),
                text: line.to_string(),
                first_line: idx + 1,
                last_line: idx + 1,
            }),
        }
    }
    blocks
}

/// Reduce code to the budget: imports first (bounded to their share),
/// then the highest-scored blocks verbatim while they fit, stubs for the
/// rest.
pub(crate) fn truncate_code(
    text: &str,
    max_bytes: usize,
    cfg: &TruncateConfig,
) -> Option<(String, bool, TruncateMethod)> {
    let blocks = split_blocks(text);
    if blocks.is_empty() {
        return None;
    }

    let import_budget = (max_bytes as f64 * cfg.import_budget_share) as usize;
    let mut imports = String::new();
    let mut imports_stubbed = false;
    for block in blocks.iter().filter(|b| b.kind == BlockKind::Import) {
        if imports.len() + block.text.len() <= import_budget {
            imports.push_str(&block.text);
        } else {
            imports_stubbed = true;
        }
    }

    let body: Vec<&Block> = blocks.iter().filter(|b| b.kind != BlockKind::Import).collect();

    // Start from all-stubs, then upgrade blocks to verbatim in score
    // order while the total stays inside the budget.
    let mut total = imports.len()
        + TERMINATOR.len()
        + body.iter().map(|b| b.stub().len()).sum::<usize>()
        + if imports_stubbed { "// imports elided\n".len() } else { 0 };

    let mut order: Vec<usize> = (0..body.len()).collect();
    order.sort_by(|&a, &b| {
        body[b]
            .kind
            .score()
            .cmp(&body[a].kind.score())
            .then(a.cmp(&b))
    });

    let mut verbatim = vec![false; body.len()];
    for &idx in &order {
        // A block missing its trailing newline gets one on emission.
        let emitted_len = body[idx].text.len() + usize::from(!body[idx].text.ends_with('\n'));
        let upgraded = total - body[idx].stub().len() + emitted_len;
        if upgraded <= max_bytes {
            total = upgraded;
            verbatim[idx] = true;
        }
    }

    // If even the stub listing overflows, drop stubs lowest-score first.
    let mut dropped = vec![false; body.len()];
    for &idx in order.iter().rev() {
        if total <= max_bytes {
            break;
        }
        if !verbatim[idx] {
            total -= body[idx].stub().len();
            dropped[idx] = true;
        }
    }

    let mut out = imports;
    if imports_stubbed {
        out.push_str("// imports elided\n");
    }
    for (idx, block) in body.iter().enumerate() {
        if dropped[idx] {
            continue;
        }
        if verbatim[idx] {
            out.push_str(&block.text);
            if !block.text.ends_with('\n') {
                out.push('\n');
            }
        } else {
            out.push_str(&block.stub());
        }
    }
    out.push_str(TERMINATOR);

    Some((out, true, TruncateMethod::CodeOutline))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "import { a } from './a';\n\
import { b } from './b';\n\
const helper = (x) => x * 2;\n\
function internal() {\n  return helper(1);\n}\n\
export class Service {\n  run() {\n    return internal();\n  }\n}\n\
export default Service;\n";

    fn run(max: usize) -> String {
        let (content, valid, method) =
            truncate_code(SOURCE, max, &TruncateConfig::default()).unwrap();
        assert!(valid);
        assert_eq!(method, TruncateMethod::CodeOutline);
        content
    }

    #[test]
    fn blocks_split_on_top_level_declarations() {
        let blocks = split_blocks(SOURCE);
        let kinds: Vec<BlockKind> = blocks.iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![
                BlockKind::Import,
                BlockKind::Import,
                BlockKind::Const,
                BlockKind::Function,
                BlockKind::Export,
                BlockKind::ExportDefault,
            ]
        );
        // The class body stays attached to its declaration.
        assert!(blocks[4].text.contains("internal()"));
        assert_eq!(blocks[4].first_line, 7);
    }

    #[test]
    fn exported_blocks_win_the_budget() {
        let content = run(180);
        assert!(content.contains("export class Service"));
        assert!(content.ends_with(TERMINATOR));
    }

    #[test]
    fn unselected_blocks_become_stubs() {
        let content = run(180);
        // Low-score blocks are stubbed with their line spans.
        assert!(content.contains("// function: lines") || content.contains("// const: lines"));
        // No dangling open brace from a partially emitted block.
        let opens = content.matches('{').count();
        let closes = content.matches('}').count();
        assert_eq!(opens, closes);
    }

    #[test]
    fn output_respects_budget() {
        for max in [60, 120, 240, 480] {
            let (content, _, _) =
                truncate_code(SOURCE, max, &TruncateConfig::default()).unwrap();
            assert!(content.len() <= max, "len {} > {max}", content.len());
        }
    }

    #[test]
    fn imports_are_capped_to_their_share() {
        let mut source = String::new();
        for i in 0..50 {
            source.push_str(&format!("import {{ x{i} }} from './x{i}';\n"));
        }
        source.push_str("export function main() {\n  return 1;\n}\n");
        let (content, _, _) = truncate_code(&source, 300, &TruncateConfig::default()).unwrap();
        assert!(content.contains("// imports elided"));
        assert!(content.contains("export function main"));
    }
}
