//! Parameter fusion: reconciles extractor candidates with the session
//! context and produces the batch of resolved queries.
//!
//! Rules, applied per candidate in order:
//! 1. A missing namespace is taken from the context.
//! 2. `List`: the stored name is cleared; a missing identifier, or one that
//!    is a zone keyword, is replaced by the stored zone.
//! 3. `Inspect`: the identifier must be present and must not be a zone
//!    keyword, otherwise the **whole batch** is rejected.
//!
//! The result is deduplicated. Context edits are committed only when the
//! batch is accepted.

use std::collections::HashSet;

use opsclaw_core::{Candidate, FusionError, Intent, ResolvedQuery};
use tracing::debug;

use crate::context::{SessionContext, Vocabulary};

/// Per-turn knobs for fusion.
#[derive(Debug, Clone)]
pub struct FusionOptions {
    /// Kind used when candidates name scope but no resource kind.
    pub generic_kind: String,
    /// Log line count attached to inspect queries.
    pub line_limit: Option<u32>,
}

/// Fuse `candidates` against `context`.
pub fn fuse(
    candidates: &[Candidate],
    context: &mut SessionContext,
    vocab: &Vocabulary,
    options: &FusionOptions,
) -> Result<Vec<ResolvedQuery>, FusionError> {
    let mut working = context.clone();
    let mut resolved = Vec::with_capacity(candidates.len());
    let mut scope_only: Option<&Candidate> = None;

    for candidate in candidates {
        if candidate.resource_kind.trim().is_empty() {
            scope_only.get_or_insert(candidate);
            continue;
        }
        resolved.push(resolve_one(candidate, &candidate.resource_kind, &mut working, vocab, options)?);
    }

    if resolved.is_empty() {
        if let Some(candidate) = scope_only {
            let names_scope = candidate.namespace.is_some()
                || candidate.identifier.is_some()
                || working.namespace.is_some();
            if names_scope {
                debug!(kind = %options.generic_kind, "No resource kind recognized, using generic list");
                let generic = Candidate {
                    intent: Intent::List,
                    ..candidate.clone()
                };
                resolved.push(resolve_one(&generic, &options.generic_kind, &mut working, vocab, options)?);
            }
        }
    }

    *context = working;
    Ok(dedup(resolved))
}

fn resolve_one(
    candidate: &Candidate,
    kind: &str,
    context: &mut SessionContext,
    vocab: &Vocabulary,
    options: &FusionOptions,
) -> Result<ResolvedQuery, FusionError> {
    let namespace = non_empty(&candidate.namespace)
        .map(str::to_string)
        .or_else(|| context.namespace.clone())
        .unwrap_or_default();

    let kind = kind.to_lowercase();
    let given = non_empty(&candidate.identifier);

    let (identifier, line_limit) = match candidate.intent {
        Intent::List => {
            context.clear_name();
            let identifier = match given {
                Some(id) if !vocab.is_zone(id) => id.to_string(),
                _ => context
                    .zone
                    .clone()
                    .or_else(|| given.map(str::to_string))
                    .unwrap_or_default(),
            };
            (identifier, None)
        }
        Intent::Inspect => match given {
            Some(id) if !vocab.is_zone(id) => (id.to_string(), options.line_limit),
            _ => {
                return Err(FusionError::MissingIdentifier {
                    usage: format!("Usage: describe {kind} <name> [--lines N]"),
                    resource_kind: kind,
                });
            }
        },
    };

    Ok(ResolvedQuery {
        namespace,
        resource_kind: kind,
        identifier,
        intent: candidate.intent,
        line_limit,
    })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn dedup(queries: Vec<ResolvedQuery>) -> Vec<ResolvedQuery> {
    let first: Vec<bool> = {
        let mut seen = HashSet::new();
        queries.iter().map(|q| seen.insert(q.dedup_key())).collect()
    };
    queries
        .into_iter()
        .zip(first)
        .filter_map(|(q, keep)| keep.then_some(q))
        .collect()
}
