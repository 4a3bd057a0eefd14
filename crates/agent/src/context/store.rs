//! The context store and its update function.

use serde::Serialize;
use tracing::debug;

use super::vocabulary::{TokenClass, Vocabulary};

/// The fields recognized in one turn's tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recognized {
    pub zone: Option<String>,
    pub namespace: Option<String>,
    /// Canonical kind of the last resource keyword.
    pub resource: Option<String>,
    /// The token directly after the last resource keyword, if eligible.
    pub name: Option<String>,
    /// Every resource keyword's canonical kind, in order of appearance.
    pub kinds: Vec<String>,
}

/// Classify tokens and pull out scope fields.
///
/// Fillers are dropped first, then positions are counted over what remains:
/// only the token right after the last resource keyword may become the name,
/// and only if it is not a zone, namespace or filler itself.
pub fn recognize(vocab: &Vocabulary, tokens: &[String]) -> Recognized {
    let kept: Vec<&str> = tokens
        .iter()
        .map(String::as_str)
        .filter(|t| !vocab.is_filler(t))
        .collect();

    let mut seen = Recognized::default();
    let mut last_kind = None;

    for (i, token) in kept.iter().enumerate() {
        match vocab.classify(token) {
            TokenClass::Zone(zone) => seen.zone = Some(zone),
            TokenClass::Namespace(ns) => seen.namespace = Some(ns),
            TokenClass::ResourceKind(kind) => {
                last_kind = Some(i);
                seen.resource = Some(kind.clone());
                if !seen.kinds.contains(&kind) {
                    seen.kinds.push(kind);
                }
            }
            TokenClass::Filler | TokenClass::Other => {}
        }
    }

    seen.name = last_kind
        .and_then(|i| kept.get(i + 1))
        .filter(|t| !vocab.is_zone(t) && !vocab.is_namespace(t) && !vocab.is_filler(t))
        .map(|t| t.to_string());

    seen
}

/// The session's current scope. One instance lives for the whole process
/// and is only touched from the turn loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionContext {
    pub zone: Option<String>,
    pub namespace: Option<String>,
    pub resource: Option<String>,
    pub name: Option<String>,
}

impl SessionContext {
    /// Whether `seen` moves the session to a different zone or namespace.
    pub fn is_scope_change(&self, seen: &Recognized) -> bool {
        let differs = |new: &Option<String>, old: &Option<String>| {
            new.as_ref().is_some_and(|v| old.as_ref() != Some(v))
        };
        differs(&seen.zone, &self.zone) || differs(&seen.namespace, &self.namespace)
    }

    /// Pure merge: the context after applying `seen`, and whether the scope
    /// changed (in which case every prior field was discarded first).
    pub fn merged(&self, seen: &Recognized) -> (SessionContext, bool) {
        let changed = self.is_scope_change(seen);
        let base = if changed {
            SessionContext::default()
        } else {
            self.clone()
        };

        let next = SessionContext {
            zone: seen.zone.clone().or(base.zone),
            namespace: seen.namespace.clone().or(base.namespace),
            resource: seen.resource.clone().or(base.resource),
            name: seen.name.clone().or(base.name),
        };
        (next, changed)
    }

    /// Recognize `tokens` and merge them in. Returns `true` on a scope
    /// change so callers can drop state derived from the old scope.
    pub fn update(&mut self, vocab: &Vocabulary, tokens: &[String]) -> bool {
        let seen = recognize(vocab, tokens);
        let (next, changed) = self.merged(&seen);
        if changed {
            debug!(from = ?self, to = ?next, "Scope changed, context reset");
        }
        *self = next;
        changed
    }

    /// List queries are not instance-scoped.
    pub fn clear_name(&mut self) {
        self.name = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn name_follows_last_resource_keyword() {
        let vocab = Vocabulary::default();
        let seen = recognize(&vocab, &toks(&["devbox", "describe", "my-app"]));
        assert_eq!(seen.resource.as_deref(), Some("devbox"));
        assert_eq!(seen.name.as_deref(), Some("my-app"));
    }

    #[test]
    fn no_name_when_nothing_follows() {
        let vocab = Vocabulary::default();
        let seen = recognize(&vocab, &toks(&["my-app", "devbox"]));
        assert_eq!(seen.resource.as_deref(), Some("devbox"));
        assert!(seen.name.is_none());
    }

    #[test]
    fn zone_or_namespace_is_never_a_name() {
        let vocab = Vocabulary::default();
        assert!(recognize(&vocab, &toks(&["pods", "hzh"])).name.is_none());
        assert!(recognize(&vocab, &toks(&["pods", "ns-a"])).name.is_none());
    }

    #[test]
    fn hyphenated_identifiers_pass_through() {
        let vocab = Vocabulary::default();
        let seen = recognize(&vocab, &toks(&["show", "cluster", "pg-main-01", "in", "ns-data"]));
        assert_eq!(seen.name.as_deref(), Some("pg-main-01"));
        assert_eq!(seen.namespace.as_deref(), Some("ns-data"));
    }

    #[test]
    fn kinds_are_collected_in_order() {
        let vocab = Vocabulary::default();
        let seen = recognize(&vocab, &toks(&["pods", "and", "devboxes", "and", "pod"]));
        assert_eq!(seen.kinds, vec!["pod", "devbox"]);
        assert_eq!(seen.resource.as_deref(), Some("pod"));
    }

    #[test]
    fn absent_fields_are_retained() {
        let vocab = Vocabulary::default();
        let mut ctx = SessionContext::default();
        ctx.update(&vocab, &toks(&["devbox", "my-app", "in", "hzh", "ns-a"]));
        let changed = ctx.update(&vocab, &toks(&["pods"]));
        assert!(!changed);
        assert_eq!(ctx.zone.as_deref(), Some("hzh"));
        assert_eq!(ctx.namespace.as_deref(), Some("ns-a"));
        assert_eq!(ctx.resource.as_deref(), Some("pod"));
        assert_eq!(ctx.name.as_deref(), Some("my-app"));
    }

    #[test]
    fn zone_change_resets_every_field() {
        let vocab = Vocabulary::default();
        let mut ctx = SessionContext {
            zone: Some("hzh".into()),
            namespace: Some("ns-a".into()),
            resource: Some("devbox".into()),
            name: Some("my-app".into()),
        };
        let changed = ctx.update(&vocab, &toks(&["bja"]));
        assert!(changed);
        assert_eq!(
            ctx,
            SessionContext {
                zone: Some("bja".into()),
                ..SessionContext::default()
            }
        );
    }

    #[test]
    fn namespace_change_is_a_scope_change() {
        let vocab = Vocabulary::default();
        let mut ctx = SessionContext {
            zone: Some("hzh".into()),
            namespace: Some("ns-a".into()),
            ..SessionContext::default()
        };
        assert!(ctx.update(&vocab, &toks(&["pods", "ns-b"])));
        assert!(ctx.zone.is_none());
        assert_eq!(ctx.namespace.as_deref(), Some("ns-b"));
    }

    #[test]
    fn same_zone_is_not_a_scope_change() {
        let vocab = Vocabulary::default();
        let mut ctx = SessionContext {
            zone: Some("hzh".into()),
            name: Some("web".into()),
            ..SessionContext::default()
        };
        assert!(!ctx.update(&vocab, &toks(&["HZH"])));
        assert_eq!(ctx.name.as_deref(), Some("web"));
    }

    #[test]
    fn update_is_idempotent() {
        let vocab = Vocabulary::default();
        let tokens = toks(&["describe", "devbox", "my-app", "bja", "ns-x"]);
        let mut ctx = SessionContext {
            zone: Some("hzh".into()),
            ..SessionContext::default()
        };
        ctx.update(&vocab, &tokens);
        let after_first = ctx.clone();
        let changed = ctx.update(&vocab, &tokens);
        assert!(!changed);
        assert_eq!(ctx, after_first);
    }

    #[test]
    fn merged_does_not_touch_self() {
        let vocab = Vocabulary::default();
        let ctx = SessionContext::default();
        let seen = recognize(&vocab, &toks(&["hzh"]));
        let (next, changed) = ctx.merged(&seen);
        assert!(changed);
        assert_eq!(next.zone.as_deref(), Some("hzh"));
        assert_eq!(ctx, SessionContext::default());
    }
}
