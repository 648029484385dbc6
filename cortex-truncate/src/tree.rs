//! Directory-tree truncation: sample per depth, shallow levels first.

use crate::truncate::{TruncateConfig, TruncateMethod};

/// Share of the retained line quota given to each depth, shallowest
/// first. Depths past the configured cap are dropped entirely.
const DEPTH_WEIGHTS: [f64; 5] = [0.35, 0.25, 0.18, 0.12, 0.10];

/// Nesting depth of a tree line: the number of box-drawing glyphs that
/// precede the entry name.
fn depth_of(line: &str) -> usize {
    line.chars()
        .take_while(|c| matches!(c, '│' | '├' | '└' | '─' | ' '))
        .filter(|c| matches!(c, '│' | '├' | '└'))
        .count()
}

/// Evenly sample `quota` items from a list of indices.
fn sample_evenly(indices: &[usize], quota: usize) -> Vec<usize> {
    if indices.len() <= quota {
        return indices.to_vec();
    }
    if quota == 0 {
        return Vec::new();
    }
    let step = indices.len() as f64 / quota as f64;
    (0..quota)
        .map(|i| indices[(i as f64 * step) as usize])
        .collect()
}

/// Reduce a box-drawing tree to the budget by keeping a per-depth quota
/// of lines (more at shallow depths), sampled evenly and emitted in the
/// original order.
pub(crate) fn truncate_tree(
    text: &str,
    max_bytes: usize,
    cfg: &TruncateConfig,
) -> Option<(String, bool, TruncateMethod)> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return None;
    }
    let avg_line = (text.len() / lines.len()).max(1);
    let marker_reserve = 48usize;
    let line_quota = max_bytes.saturating_sub(marker_reserve) / avg_line;
    if line_quota == 0 {
        return None;
    }

    let max_depth = cfg.max_tree_depth.min(DEPTH_WEIGHTS.len());
    let mut by_depth: Vec<Vec<usize>> = vec![Vec::new(); max_depth];
    let mut dropped_deep = 0usize;
    for (idx, line) in lines.iter().enumerate() {
        let depth = depth_of(line);
        if depth < max_depth {
            by_depth[depth].push(idx);
        } else {
            dropped_deep += 1;
        }
    }

    let mut keep: Vec<usize> = Vec::new();
    for (depth, indices) in by_depth.iter().enumerate() {
        let quota = (line_quota as f64 * DEPTH_WEIGHTS[depth]) as usize;
        keep.extend(sample_evenly(indices, quota.max(1)));
    }
    keep.sort_unstable();
    keep.dedup();

    // Stay inside the byte budget: trim the deepest kept lines first.
    let mut kept_bytes: usize = keep.iter().map(|&i| lines[i].len() + 1).sum();
    while kept_bytes + marker_reserve > max_bytes && !keep.is_empty() {
        let (pos, _) = keep
            .iter()
            .enumerate()
            .max_by_key(|&(_, &i)| (depth_of(lines[i]), i))?;
        kept_bytes -= lines[keep[pos]].len() + 1;
        keep.remove(pos);
    }
    if keep.is_empty() {
        return None;
    }

    let elided = lines.len() - keep.len();
    let mut out = String::with_capacity(kept_bytes + marker_reserve);
    for &idx in &keep {
        out.push_str(lines[idx]);
        out.push('\n');
    }
    if elided > 0 || dropped_deep > 0 {
        out.push_str(&format!("... [{elided} entries elided]\n"));
    }
    Some((out, true, TruncateMethod::TreeSampling))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree(dirs: usize, files_per_dir: usize) -> String {
        let mut out = String::from("project\n");
        for d in 0..dirs {
            out.push_str(&format!("├── dir{d}\n"));
            for f in 0..files_per_dir {
                out.push_str(&format!("│   ├── file{f}.rs\n"));
            }
        }
        out
    }

    #[test]
    fn depth_counts_glyphs() {
        assert_eq!(depth_of("project"), 0);
        assert_eq!(depth_of("├── src"), 1);
        assert_eq!(depth_of("│   ├── lib.rs"), 2);
        assert_eq!(depth_of("│   │   └── deep.rs"), 3);
    }

    #[test]
    fn sampling_preserves_original_order() {
        let tree = sample_tree(20, 10);
        let (content, valid, method) =
            truncate_tree(&tree, 600, &TruncateConfig::default()).unwrap();
        assert!(valid);
        assert_eq!(method, TruncateMethod::TreeSampling);
        assert!(content.len() <= 600);

        // Directory lines appear in ascending order.
        let dir_positions: Vec<usize> = (0..20)
            .filter_map(|d| content.find(&format!("dir{d}\n")))
            .collect();
        let mut sorted = dir_positions.clone();
        sorted.sort_unstable();
        assert_eq!(dir_positions, sorted);
    }

    #[test]
    fn shallow_depths_get_more_lines() {
        let tree = sample_tree(30, 30);
        let (content, _, _) = truncate_tree(&tree, 800, &TruncateConfig::default()).unwrap();
        let depth1 = content.lines().filter(|l| depth_of(l) == 1).count();
        let depth2 = content.lines().filter(|l| depth_of(l) == 2).count();
        assert!(depth1 >= depth2);
    }

    #[test]
    fn elision_marker_reports_dropped_lines() {
        let tree = sample_tree(50, 5);
        let (content, _, _) = truncate_tree(&tree, 400, &TruncateConfig::default()).unwrap();
        assert!(content.contains("entries elided"));
    }

    #[test]
    fn tiny_budget_falls_back() {
        let tree = sample_tree(5, 5);
        assert!(truncate_tree(&tree, 10, &TruncateConfig::default()).is_none());
    }
}
