//! Query value objects.
//!
//! The extractor produces loosely-filled [`Candidate`]s; the fusion engine
//! turns each one into a fully-populated [`ResolvedQuery`] that is handed to
//! the dispatcher and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether a query enumerates many instances or looks at one named instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    List,
    Inspect,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::List => f.write_str("list"),
            Intent::Inspect => f.write_str("inspect"),
        }
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "list" => Ok(Intent::List),
            "inspect" | "describe" => Ok(Intent::Inspect),
            other => Err(format!("unknown intent '{other}'")),
        }
    }
}

/// One structured candidate produced by an extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Canonical resource kind. Empty when the extractor recognised scope
    /// but no kind.
    #[serde(default)]
    pub resource_kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,

    pub intent: Intent,
}

impl Candidate {
    /// A list-intent candidate for the given kind.
    pub fn list(resource_kind: impl Into<String>) -> Self {
        Self {
            namespace: None,
            resource_kind: resource_kind.into(),
            identifier: None,
            intent: Intent::List,
        }
    }

    /// An inspect-intent candidate for the given kind with no identifier yet.
    pub fn inspect(resource_kind: impl Into<String>) -> Self {
        Self {
            intent: Intent::Inspect,
            ..Self::list(resource_kind)
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }
}

/// A validated query ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedQuery {
    pub namespace: String,
    pub resource_kind: String,
    pub identifier: String,
    pub intent: Intent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_limit: Option<u32>,
}

impl ResolvedQuery {
    /// Key used to drop duplicate queries within one batch.
    pub fn dedup_key(&self) -> (&str, &str, &str, Intent) {
        (
            &self.namespace,
            &self.resource_kind,
            &self.identifier,
            self.intent,
        )
    }
}

impl fmt::Display for ResolvedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}/{}",
            self.intent, self.resource_kind, self.namespace, self.identifier
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_parses_case_insensitively() {
        assert_eq!("LIST".parse::<Intent>().unwrap(), Intent::List);
        assert_eq!("Inspect".parse::<Intent>().unwrap(), Intent::Inspect);
        assert_eq!("describe".parse::<Intent>().unwrap(), Intent::Inspect);
        assert!("delete".parse::<Intent>().is_err());
    }

    #[test]
    fn candidate_deserializes_camel_case() {
        let json = r#"{"resourceKind":"devbox","identifier":"my-app","intent":"inspect"}"#;
        let c: Candidate = serde_json::from_str(json).unwrap();
        assert_eq!(c.resource_kind, "devbox");
        assert_eq!(c.identifier.as_deref(), Some("my-app"));
        assert!(c.namespace.is_none());
        assert_eq!(c.intent, Intent::Inspect);
    }

    #[test]
    fn candidate_without_kind_defaults_to_empty() {
        let c: Candidate = serde_json::from_str(r#"{"namespace":"ns-a","intent":"list"}"#).unwrap();
        assert!(c.resource_kind.is_empty());
    }

    #[test]
    fn resolved_query_serializes_line_limit_only_when_set() {
        let q = ResolvedQuery {
            namespace: "ns-a".into(),
            resource_kind: "pod".into(),
            identifier: "web-0".into(),
            intent: Intent::Inspect,
            line_limit: None,
        };
        let json = serde_json::to_string(&q).unwrap();
        assert!(json.contains("resourceKind"));
        assert!(!json.contains("lineLimit"));
    }
}
