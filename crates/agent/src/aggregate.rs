//! Response aggregation: orders settled task reports for display and keeps
//! the running totals for the summary line.

use std::collections::HashMap;

use opsclaw_core::{Outcome, TaskReport};
use serde_json::json;

/// Totals for one rendered batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Items counted by the renderer across all kinds.
    pub items: usize,
    /// Number of reports rendered.
    pub tasks: usize,
    /// Resource kinds whose task failed, in display order.
    pub failed: Vec<String>,
}

/// Orders reports by a fixed priority table over resource kinds.
#[derive(Debug, Clone)]
pub struct Aggregator {
    priority: HashMap<String, usize>,
}

impl Aggregator {
    pub fn new<S: AsRef<str>>(priority: &[S]) -> Self {
        let mut table = HashMap::new();
        for (rank, kind) in priority.iter().enumerate() {
            table.entry(kind.as_ref().to_lowercase()).or_insert(rank);
        }
        Self { priority: table }
    }

    /// Rank of a kind; unknown kinds sort after every known one.
    pub fn rank(&self, kind: &str) -> usize {
        self.priority
            .get(&kind.to_lowercase())
            .copied()
            .unwrap_or(usize::MAX)
    }

    /// Sort reports for display. Ties (same kind, or two unknown kinds) are
    /// broken by kind name and then keep arrival order.
    pub fn order(&self, mut reports: Vec<TaskReport>) -> Vec<TaskReport> {
        reports.sort_by(|a, b| {
            self.rank(a.resource_kind())
                .cmp(&self.rank(b.resource_kind()))
                .then_with(|| a.resource_kind().cmp(b.resource_kind()))
        });
        reports
    }

    /// Hand every report to `render` in display order.
    ///
    /// `render` returns the number of items it showed. A failed report is
    /// still passed to `render` (to be shown inline) and never stops the
    /// remaining ones. A single report skips ordering.
    pub fn present<F>(&self, reports: Vec<TaskReport>, mut render: F) -> BatchSummary
    where
        F: FnMut(&TaskReport) -> usize,
    {
        let ordered = if reports.len() == 1 {
            reports
        } else {
            self.order(reports)
        };

        let mut summary = BatchSummary::default();
        for report in &ordered {
            summary.items += render(report);
            summary.tasks += 1;
            if !report.outcome.is_success() {
                summary.failed.push(report.resource_kind().to_string());
            }
        }
        summary
    }
}

/// A bounded JSON rendering of a batch, passed to the extractor on the next
/// turn. Cut at a char boundary once it exceeds `budget` characters.
pub fn snapshot(reports: &[TaskReport], budget: usize) -> Option<String> {
    if reports.is_empty() || budget == 0 {
        return None;
    }

    let entries: Vec<serde_json::Value> = reports
        .iter()
        .map(|r| match &r.outcome {
            Outcome::Success(payload) => json!({
                "resourceKind": r.query.resource_kind,
                "identifier": r.query.identifier,
                "namespace": r.query.namespace,
                "result": payload,
            }),
            Outcome::Failure(e) => json!({
                "resourceKind": r.query.resource_kind,
                "identifier": r.query.identifier,
                "namespace": r.query.namespace,
                "error": e.to_string(),
            }),
        })
        .collect();

    let text = serde_json::Value::Array(entries).to_string();
    Some(match text.char_indices().nth(budget) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsclaw_core::{Intent, ResolvedQuery, TaskError};
    use std::time::Duration;

    fn report(kind: &str, outcome: Outcome) -> TaskReport {
        TaskReport {
            query: ResolvedQuery {
                namespace: "ns-a".into(),
                resource_kind: kind.into(),
                identifier: "hzh".into(),
                intent: Intent::List,
                line_limit: None,
            },
            outcome,
            elapsed: Duration::from_millis(5),
        }
    }

    fn ok(kind: &str) -> TaskReport {
        report(kind, Outcome::Success(Some(json!({"items": [1, 2]}))))
    }

    #[test]
    fn orders_by_priority_with_unknown_last() {
        let agg = Aggregator::new(&["devbox", "app", "pod"]);
        let ordered = agg.order(vec![ok("zeta"), ok("pod"), ok("alpha"), ok("devbox")]);
        let kinds: Vec<&str> = ordered.iter().map(|r| r.resource_kind()).collect();
        assert_eq!(kinds, vec!["devbox", "pod", "alpha", "zeta"]);
    }

    #[test]
    fn failures_render_inline_and_do_not_stop_others() {
        let agg = Aggregator::new(&["devbox", "pod"]);
        let reports = vec![
            ok("pod"),
            report("devbox", Outcome::Failure(TaskError::Remote("boom".into()))),
        ];
        let mut seen = Vec::new();
        let summary = agg.present(reports, |r| {
            seen.push(r.resource_kind().to_string());
            if r.outcome.is_success() { 2 } else { 0 }
        });
        assert_eq!(seen, vec!["devbox", "pod"]);
        assert_eq!(summary.items, 2);
        assert_eq!(summary.tasks, 2);
        assert_eq!(summary.failed, vec!["devbox"]);
    }

    #[test]
    fn single_report_is_rendered_directly() {
        let agg = Aggregator::new(&["devbox"]);
        let summary = agg.present(vec![ok("unknown")], |_| 7);
        assert_eq!(summary.items, 7);
        assert!(summary.failed.is_empty());
    }

    #[test]
    fn snapshot_respects_budget() {
        let reports = vec![ok("pod"), ok("devbox")];
        let full = snapshot(&reports, 10_000).unwrap();
        assert!(full.contains("\"resourceKind\":\"pod\""));
        let cut = snapshot(&reports, 20).unwrap();
        assert_eq!(cut.chars().count(), 20);
        assert!(snapshot(&[], 100).is_none());
    }
}
