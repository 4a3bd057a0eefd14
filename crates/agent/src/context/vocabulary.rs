//! Token recognizers for zones, namespaces, resource kinds and fillers.
//!
//! All matching is case-insensitive. The four sets are disjoint (enforced by
//! config validation), so a token has exactly one class.

use opsclaw_config::VocabularyConfig;
use std::collections::{HashMap, HashSet};

/// Classification of a single token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenClass {
    /// A zone keyword, lowercased.
    Zone(String),
    /// A namespace token, lowercased.
    Namespace(String),
    /// A resource keyword, mapped to its canonical kind.
    ResourceKind(String),
    /// A verb or filler word; dropped before positional analysis.
    Filler,
    /// Anything else (candidate resource name).
    Other,
}

/// The recognizer sets for one session.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    zones: HashSet<String>,
    namespace_prefix: String,
    fillers: HashSet<String>,
    inspect_verbs: HashSet<String>,
    kinds: HashMap<String, String>,
}

impl Vocabulary {
    pub fn from_config(config: &VocabularyConfig) -> Self {
        let lower = |items: &[String]| -> HashSet<String> {
            items.iter().map(|s| s.to_lowercase()).collect()
        };
        Self {
            zones: lower(&config.zones),
            namespace_prefix: config.namespace_prefix.to_lowercase(),
            fillers: lower(&config.fillers),
            inspect_verbs: lower(&config.inspect_verbs),
            kinds: config
                .resource_kinds
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v.to_lowercase()))
                .collect(),
        }
    }

    pub fn classify(&self, token: &str) -> TokenClass {
        let lower = token.to_lowercase();
        if self.fillers.contains(&lower) {
            TokenClass::Filler
        } else if self.zones.contains(&lower) {
            TokenClass::Zone(lower)
        } else if let Some(kind) = self.kinds.get(&lower) {
            TokenClass::ResourceKind(kind.clone())
        } else if self.is_namespace(&lower) {
            TokenClass::Namespace(lower)
        } else {
            TokenClass::Other
        }
    }

    pub fn is_zone(&self, token: &str) -> bool {
        self.zones.contains(&token.to_lowercase())
    }

    pub fn is_namespace(&self, token: &str) -> bool {
        let lower = token.to_lowercase();
        lower.len() > self.namespace_prefix.len() && lower.starts_with(&self.namespace_prefix)
    }

    pub fn is_filler(&self, token: &str) -> bool {
        self.fillers.contains(&token.to_lowercase())
    }

    pub fn is_inspect_verb(&self, token: &str) -> bool {
        self.inspect_verbs.contains(&token.to_lowercase())
    }

    /// Canonical kind for a resource keyword.
    pub fn resource_kind(&self, token: &str) -> Option<&str> {
        self.kinds.get(&token.to_lowercase()).map(String::as_str)
    }

    /// The distinct canonical kinds, sorted.
    pub fn canonical_kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.kinds.values().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds.dedup();
        kinds
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::from_config(&VocabularyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_each_set() {
        let vocab = Vocabulary::default();
        assert_eq!(vocab.classify("HZH"), TokenClass::Zone("hzh".into()));
        assert_eq!(vocab.classify("ns-Team"), TokenClass::Namespace("ns-team".into()));
        assert_eq!(vocab.classify("Pods"), TokenClass::ResourceKind("pod".into()));
        assert_eq!(vocab.classify("describe"), TokenClass::Filler);
        assert_eq!(vocab.classify("my-app"), TokenClass::Other);
    }

    #[test]
    fn bare_prefix_is_not_a_namespace() {
        let vocab = Vocabulary::default();
        assert!(!vocab.is_namespace("ns-"));
        assert!(vocab.is_namespace("ns-a"));
    }

    #[test]
    fn synonyms_share_a_canonical_kind() {
        let vocab = Vocabulary::default();
        assert_eq!(vocab.resource_kind("db"), Some("cluster"));
        assert_eq!(vocab.resource_kind("databases"), Some("cluster"));
        assert!(vocab.canonical_kinds().contains(&"cluster"));
        assert_eq!(
            vocab.canonical_kinds().iter().filter(|k| **k == "cluster").count(),
            1
        );
    }
}
