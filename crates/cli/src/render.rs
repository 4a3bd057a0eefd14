//! Terminal rendering of settled task reports.
//!
//! Dispatches on payload shape: a known array field becomes one line per
//! element, an inspect result (`manifest` / `events` / `logs`) becomes
//! sections, anything else is dumped as pretty JSON.

use std::fmt::Write as _;

use opsclaw_agent::BatchSummary;
use opsclaw_core::{Outcome, TaskReport};
use serde_json::Value;

/// Array fields a list tool may answer with.
const ARRAY_FIELDS: &[&str] = &[
    "devboxes",
    "clusters",
    "apps",
    "pods",
    "services",
    "ingresses",
    "certificates",
    "cronjobs",
    "buckets",
    "items",
];

const DEFAULT_LOG_LINES: u32 = 30;

/// One report, ready to print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    /// Items shown, for the summary line.
    pub items: usize,
}

pub fn render(report: &TaskReport, raw: bool) -> Rendered {
    let mut text = header(report);

    let items = match &report.outcome {
        Outcome::Failure(e) => {
            let _ = writeln!(text, "    failed: {e}");
            0
        }
        Outcome::Success(None) | Outcome::Success(Some(Value::Null)) => {
            text.push_str("    no data\n");
            0
        }
        Outcome::Success(Some(payload)) if raw => {
            push_indented(&mut text, &pretty(payload), 4);
            count_items(payload)
        }
        Outcome::Success(Some(payload)) => render_payload(&mut text, payload, report),
    };

    Rendered { text, items }
}

/// The line printed after a batch.
pub fn summary_line(summary: &BatchSummary) -> String {
    let mut line = format!(
        "  {} item{} from {} quer{}",
        summary.items,
        if summary.items == 1 { "" } else { "s" },
        summary.tasks,
        if summary.tasks == 1 { "y" } else { "ies" },
    );
    if !summary.failed.is_empty() {
        let _ = write!(line, ", failed: {}", summary.failed.join(", "));
    }
    line
}

fn header(report: &TaskReport) -> String {
    let q = &report.query;
    let scope = match (q.namespace.is_empty(), q.identifier.is_empty()) {
        (true, true) => String::new(),
        (false, true) => format!(" [{}]", q.namespace),
        (true, false) => format!(" [{}]", q.identifier),
        (false, false) => format!(" [{}/{}]", q.namespace, q.identifier),
    };
    format!(
        "  {} {}{} ({:.1}s)\n",
        q.intent,
        q.resource_kind,
        scope,
        report.elapsed.as_secs_f64()
    )
}

fn render_payload(text: &mut String, payload: &Value, report: &TaskReport) -> usize {
    if let Some(elements) = known_array(payload) {
        if elements.is_empty() {
            text.push_str("    (none)\n");
        }
        for element in elements {
            let _ = writeln!(text, "    - {}", summarize(element));
        }
        return elements.len();
    }

    if is_inspect_shape(payload) {
        let limit = report.query.line_limit.unwrap_or(DEFAULT_LOG_LINES);
        render_inspect(text, payload, limit as usize);
        return 1;
    }

    push_indented(text, &pretty(payload), 4);
    count_items(payload)
}

fn known_array(payload: &Value) -> Option<&Vec<Value>> {
    let object = payload.as_object()?;
    ARRAY_FIELDS
        .iter()
        .find_map(|field| object.get(*field).and_then(Value::as_array))
}

fn is_inspect_shape(payload: &Value) -> bool {
    payload
        .as_object()
        .is_some_and(|o| ["manifest", "events", "logs"].iter().any(|k| o.contains_key(*k)))
}

fn count_items(payload: &Value) -> usize {
    match payload {
        Value::Null => 0,
        Value::Array(items) => items.len(),
        other => known_array(other).map_or(1, Vec::len),
    }
}

/// `name  status` for one list element.
fn summarize(element: &Value) -> String {
    let field = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| element.get(*k).and_then(Value::as_str))
            .map(str::to_string)
    };
    let name = field(&["name"])
        .or_else(|| {
            element
                .pointer("/metadata/name")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| match element {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });

    match field(&["status", "phase", "state"]) {
        Some(status) => format!("{name}  {status}"),
        None => name,
    }
}

fn render_inspect(text: &mut String, payload: &Value, log_lines: usize) {
    if let Some(manifest) = payload.get("manifest") {
        text.push_str("    Manifest:\n");
        let body = match manifest {
            Value::String(s) => s.clone(),
            other => pretty(other),
        };
        push_indented(text, &body, 6);
    }

    if let Some(events) = payload.get("events") {
        text.push_str("    Events:\n");
        match events.as_array() {
            Some(list) if list.is_empty() => text.push_str("      (none)\n"),
            Some(list) => {
                for event in list {
                    let _ = writeln!(text, "      {}", describe_event(event));
                }
            }
            None => push_indented(text, &pretty(events), 6),
        }
    }

    if let Some(logs) = payload.get("logs") {
        let lines: Vec<String> = match logs {
            Value::String(s) => s.lines().map(str::to_string).collect(),
            Value::Array(items) => items
                .iter()
                .map(|l| l.as_str().map_or_else(|| l.to_string(), str::to_string))
                .collect(),
            Value::Null => Vec::new(),
            other => vec![other.to_string()],
        };
        let skip = lines.len().saturating_sub(log_lines);
        if skip > 0 {
            let _ = writeln!(text, "    Logs (last {log_lines} of {}):", lines.len());
        } else {
            text.push_str("    Logs:\n");
        }
        for line in &lines[skip..] {
            let _ = writeln!(text, "      {line}");
        }
    }
}

fn describe_event(event: &Value) -> String {
    let Some(object) = event.as_object() else {
        return event.as_str().map_or_else(|| event.to_string(), str::to_string);
    };
    ["type", "reason", "message"]
        .iter()
        .filter_map(|k| object.get(*k).and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("  ")
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn push_indented(text: &mut String, body: &str, indent: usize) {
    for line in body.lines() {
        let _ = writeln!(text, "{:indent$}{line}", "");
    }
}
