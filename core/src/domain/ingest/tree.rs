//! Span tree rollup and reconstruction
//!
//! Spans arrive and are stored flat; the parent_id field defines a forest
//! per trace. This module computes subtree-accumulated metrics at ingest
//! time and rebuilds nested trees at query time.
//!
//! Malformed input is never fatal: orphans (parent_id pointing at a span
//! not in the batch) are treated as subtree roots with a warning, and
//! parent cycles are broken at the first revisited span.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::data::types::Span;

/// Metric prefixes accumulated over subtrees
const ROLLUP_PREFIXES: &[&str] = &["costs.", "tokens."];

// ============================================================================
// ROLLUP
// ============================================================================

/// Compute accumulated cost and token metrics for every span in the batch.
///
/// For each rollup prefix, a span's acc value is its own unit value plus the
/// unit values of every span in its subtree. Spans without children end up
/// with acc equal to their own unit values.
pub fn rollup_metrics(spans: &mut [Span]) {
    if spans.is_empty() {
        return;
    }

    let index: HashMap<String, usize> = spans
        .iter()
        .enumerate()
        .map(|(i, s)| (s.span_id.clone(), i))
        .collect();

    let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut roots: Vec<usize> = Vec::new();
    for (i, span) in spans.iter().enumerate() {
        match span.parent_id.as_deref().and_then(|p| index.get(p)) {
            Some(&parent_idx) if parent_idx != i => {
                children.entry(parent_idx).or_default().push(i);
            }
            Some(_) => {
                tracing::warn!(span_id = %span.span_id, "Span is its own parent, treating as root");
                roots.push(i);
            }
            None => {
                if let Some(parent) = &span.parent_id {
                    tracing::warn!(
                        span_id = %span.span_id,
                        parent_id = %parent,
                        "Parent not in batch, rolling up as subtree root"
                    );
                }
                roots.push(i);
            }
        }
    }

    let mut sums: Vec<Option<BTreeMap<String, f64>>> = vec![None; spans.len()];
    let mut visited: HashSet<usize> = HashSet::new();
    for root in roots {
        accumulate(root, spans, &children, &mut sums, &mut visited);
    }
    // Spans inside parent cycles are reachable from no root
    for i in 0..spans.len() {
        if !visited.contains(&i) {
            tracing::warn!(span_id = %spans[i].span_id, "Parent cycle detected, breaking at this span");
            accumulate(i, spans, &children, &mut sums, &mut visited);
        }
    }

    for (i, span) in spans.iter_mut().enumerate() {
        if let Some(totals) = sums[i].take() {
            for (key, value) in totals {
                span.attributes.metrics.acc.insert(key, value);
            }
        }
    }
}

/// Post-order accumulation of unit metrics over one subtree.
///
/// Walks with an explicit stack; trace depth is producer-controlled and must
/// not be able to exhaust the call stack.
fn accumulate(
    root: usize,
    spans: &[Span],
    children: &HashMap<usize, Vec<usize>>,
    sums: &mut [Option<BTreeMap<String, f64>>],
    visited: &mut HashSet<usize>,
) {
    if !visited.insert(root) {
        return;
    }

    // (span index, next child cursor, partial subtree totals)
    let mut stack: Vec<(usize, usize, BTreeMap<String, f64>)> =
        vec![(root, 0, own_totals(&spans[root]))];
    while let Some(top) = stack.last_mut() {
        let kids = children.get(&top.0).map(Vec::as_slice).unwrap_or(&[]);
        if top.1 < kids.len() {
            let child = kids[top.1];
            top.1 += 1;
            // Revisit means a cycle; the back edge contributes nothing
            if visited.insert(child) {
                stack.push((child, 0, own_totals(&spans[child])));
            }
            continue;
        }
        if let Some((idx, _, totals)) = stack.pop() {
            sums[idx] = Some(totals.clone());
            if let Some((_, _, parent_totals)) = stack.last_mut() {
                for (key, value) in totals {
                    *parent_totals.entry(key).or_insert(0.0) += value;
                }
            }
        }
    }
}

fn own_totals(span: &Span) -> BTreeMap<String, f64> {
    span.attributes
        .metrics
        .unit
        .iter()
        .filter(|(key, _)| ROLLUP_PREFIXES.iter().any(|p| key.starts_with(p)))
        .map(|(key, value)| (key.clone(), *value))
        .collect()
}

// ============================================================================
// RECONSTRUCTION
// ============================================================================

/// Rebuild nested trees from flat spans, returning the forest roots.
///
/// Children are ordered by start time. Orphans become top-level roots.
pub fn reconstruct(spans: Vec<Span>) -> Vec<Span> {
    let ids: HashSet<String> = spans.iter().map(|s| s.span_id.clone()).collect();

    let mut roots: Vec<String> = Vec::new();
    let mut children_of: HashMap<String, Vec<String>> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for span in &spans {
        order.push(span.span_id.clone());
        match &span.parent_id {
            Some(parent) if ids.contains(parent) && *parent != span.span_id => {
                children_of
                    .entry(parent.clone())
                    .or_default()
                    .push(span.span_id.clone());
            }
            Some(parent) => {
                tracing::warn!(
                    span_id = %span.span_id,
                    parent_id = %parent,
                    "Parent not in result set, promoting to root"
                );
                roots.push(span.span_id.clone());
            }
            None => roots.push(span.span_id.clone()),
        }
    }

    let mut pool: HashMap<String, Span> = spans
        .into_iter()
        .map(|s| (s.span_id.clone(), s))
        .collect();

    let mut visited: HashSet<String> = HashSet::new();
    let mut forest: Vec<Span> = roots
        .iter()
        .filter_map(|id| attach(id, &mut pool, &children_of, &mut visited))
        .collect();

    // Anything still pooled sits inside a parent cycle
    for id in order {
        if pool.contains_key(&id) {
            tracing::warn!(span_id = %id, "Parent cycle detected, promoting to root");
            if let Some(span) = attach(&id, &mut pool, &children_of, &mut visited) {
                forest.push(span);
            }
        }
    }

    forest.sort_by(|a, b| a.start_time.cmp(&b.start_time));
    forest
}

/// Pull one subtree out of the pool, nesting children in place. Iterative
/// for the same reason as the rollup walk: depth is producer-controlled.
fn attach(
    id: &str,
    pool: &mut HashMap<String, Span>,
    children_of: &HashMap<String, Vec<String>>,
    visited: &mut HashSet<String>,
) -> Option<Span> {
    if !visited.insert(id.to_string()) {
        return None;
    }
    let root = pool.remove(id)?;

    // (partially built span, next child cursor)
    let mut stack: Vec<(Span, usize)> = vec![(root, 0)];
    loop {
        let top = stack.last_mut()?;
        let kids = children_of
            .get(&top.0.span_id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        if top.1 < kids.len() {
            let child_id = &kids[top.1];
            top.1 += 1;
            if visited.insert(child_id.clone()) {
                if let Some(child) = pool.remove(child_id) {
                    stack.push((child, 0));
                }
            }
            continue;
        }
        let (mut span, _) = stack.pop()?;
        span.children.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        match stack.last_mut() {
            Some((parent, _)) => parent.children.push(span),
            None => return Some(span),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn span(span_id: &str, parent_id: Option<&str>, minute: u32) -> Span {
        Span {
            trace_id: "t1".into(),
            span_id: span_id.into(),
            parent_id: parent_id.map(String::from),
            name: span_id.into(),
            start_time: Utc.with_ymd_and_hms(2025, 6, 1, 10, minute, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 6, 1, 10, minute, 30).unwrap(),
            ..Default::default()
        }
    }

    fn with_cost(mut s: Span, cost: f64) -> Span {
        s.attributes.metrics.unit.insert("costs.total".into(), cost);
        s
    }

    #[test]
    fn test_rollup_chain() {
        // a <- b <- c <- d with unit costs 1, 2, 3, 4
        let mut spans = vec![
            with_cost(span("a", None, 0), 1.0),
            with_cost(span("b", Some("a"), 1), 2.0),
            with_cost(span("c", Some("b"), 2), 3.0),
            with_cost(span("d", Some("c"), 3), 4.0),
        ];
        rollup_metrics(&mut spans);
        let acc = |i: usize| spans[i].attributes.metrics.acc["costs.total"];
        assert_eq!(acc(0), 10.0);
        assert_eq!(acc(1), 9.0);
        assert_eq!(acc(2), 7.0);
        assert_eq!(acc(3), 4.0);
    }

    #[test]
    fn test_rollup_branching() {
        let mut spans = vec![
            with_cost(span("root", None, 0), 1.0),
            with_cost(span("left", Some("root"), 1), 2.0),
            with_cost(span("right", Some("root"), 2), 3.0),
        ];
        rollup_metrics(&mut spans);
        assert_eq!(spans[0].attributes.metrics.acc["costs.total"], 6.0);
        assert_eq!(spans[1].attributes.metrics.acc["costs.total"], 2.0);
    }

    #[test]
    fn test_rollup_leaf_acc_equals_unit() {
        let mut spans = vec![with_cost(span("only", None, 0), 2.5)];
        spans[0]
            .attributes
            .metrics
            .unit
            .insert("tokens.total".into(), 100.0);
        rollup_metrics(&mut spans);
        assert_eq!(spans[0].attributes.metrics.acc["costs.total"], 2.5);
        assert_eq!(spans[0].attributes.metrics.acc["tokens.total"], 100.0);
    }

    #[test]
    fn test_rollup_ignores_non_rollup_metrics() {
        let mut spans = vec![span("a", None, 0)];
        spans[0]
            .attributes
            .metrics
            .unit
            .insert("latency.p50".into(), 12.0);
        rollup_metrics(&mut spans);
        assert!(!spans[0].attributes.metrics.acc.contains_key("latency.p50"));
    }

    #[test]
    fn test_rollup_orphan_is_subtree_root() {
        let mut spans = vec![
            with_cost(span("orphan", Some("missing"), 0), 1.0),
            with_cost(span("child", Some("orphan"), 1), 2.0),
        ];
        rollup_metrics(&mut spans);
        assert_eq!(spans[0].attributes.metrics.acc["costs.total"], 3.0);
    }

    #[test]
    fn test_rollup_survives_parent_cycle() {
        let mut spans = vec![
            with_cost(span("a", Some("b"), 0), 1.0),
            with_cost(span("b", Some("a"), 1), 2.0),
        ];
        rollup_metrics(&mut spans);
        // Every span still gets an acc value; the back edge contributes nothing
        assert!(spans[0].attributes.metrics.acc.contains_key("costs.total"));
        assert!(spans[1].attributes.metrics.acc.contains_key("costs.total"));
    }

    fn deep_chain(depth: usize) -> Vec<Span> {
        (0..depth)
            .map(|i| {
                let parent = if i == 0 { None } else { Some(format!("s{}", i - 1)) };
                span(&format!("s{i}"), parent.as_deref(), 0)
            })
            .collect()
    }

    #[test]
    fn test_rollup_handles_very_deep_chain() {
        let depth = 100_000;
        let mut spans: Vec<Span> = deep_chain(depth)
            .into_iter()
            .map(|s| with_cost(s, 1.0))
            .collect();
        rollup_metrics(&mut spans);
        assert_eq!(spans[0].attributes.metrics.acc["costs.total"], depth as f64);
        assert_eq!(spans[depth - 1].attributes.metrics.acc["costs.total"], 1.0);
    }

    #[test]
    fn test_reconstruct_handles_very_deep_chain() {
        let depth = 100_000;
        let forest = reconstruct(deep_chain(depth));
        assert_eq!(forest.len(), 1);
        let mut node = &forest[0];
        let mut seen = 1;
        while let Some(child) = node.children.first() {
            node = child;
            seen += 1;
        }
        assert_eq!(seen, depth);

        // Dismantle iteratively; dropping the nested tree as-is would
        // recurse through the drop glue
        let mut queue: Vec<Span> = forest;
        while let Some(mut s) = queue.pop() {
            queue.append(&mut s.children);
        }
    }

    #[test]
    fn test_reconstruct_nests_and_orders_children() {
        let spans = vec![
            span("late", Some("root"), 5),
            span("root", None, 0),
            span("early", Some("root"), 1),
            span("grandchild", Some("early"), 2),
        ];
        let forest = reconstruct(spans);
        assert_eq!(forest.len(), 1);
        let root = &forest[0];
        assert_eq!(root.span_id, "root");
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].span_id, "early");
        assert_eq!(root.children[1].span_id, "late");
        assert_eq!(root.children[0].children[0].span_id, "grandchild");
    }

    #[test]
    fn test_reconstruct_promotes_orphans() {
        let spans = vec![span("root", None, 0), span("orphan", Some("missing"), 1)];
        let forest = reconstruct(spans);
        assert_eq!(forest.len(), 2);
    }

    #[test]
    fn test_reconstruct_breaks_cycles() {
        let spans = vec![
            span("a", Some("b"), 0),
            span("b", Some("a"), 1),
            span("root", None, 2),
        ];
        let forest = reconstruct(spans);
        // All three spans appear exactly once somewhere in the forest
        fn count(spans: &[Span]) -> usize {
            spans.iter().map(|s| 1 + count(&s.children)).sum()
        }
        assert_eq!(count(&forest), 3);
    }
}
