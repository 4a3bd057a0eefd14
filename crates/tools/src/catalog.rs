//! Which remote tool answers which query.
//!
//! List queries use a per-kind tool (falling back to the generic kind's
//! tool); every inspect query uses the single inspect tool.

use std::collections::HashMap;

use opsclaw_config::CatalogConfig;
use opsclaw_core::{Intent, ResolvedQuery};
use serde_json::json;

#[derive(Debug, Clone)]
pub struct ToolCatalog {
    list_tools: HashMap<String, String>,
    inspect_tool: String,
    generic_kind: String,
}

impl ToolCatalog {
    pub fn from_config(config: &CatalogConfig) -> Self {
        Self {
            list_tools: config
                .list_tools
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v.clone()))
                .collect(),
            inspect_tool: config.inspect_tool.clone(),
            generic_kind: config.generic_kind.to_lowercase(),
        }
    }

    /// The tool name for a query.
    pub fn tool_for(&self, query: &ResolvedQuery) -> &str {
        match query.intent {
            Intent::Inspect => &self.inspect_tool,
            Intent::List => self
                .list_tools
                .get(&query.resource_kind.to_lowercase())
                .or_else(|| self.list_tools.get(&self.generic_kind))
                .map(String::as_str)
                .unwrap_or("list_resources"),
        }
    }

    /// Tool arguments for a query.
    pub fn arguments(&self, query: &ResolvedQuery) -> serde_json::Value {
        match query.intent {
            Intent::List => json!({
                "namespace": query.namespace,
                "resourceKind": query.resource_kind,
                "zone": query.identifier,
            }),
            Intent::Inspect => {
                let mut args = json!({
                    "namespace": query.namespace,
                    "resourceKind": query.resource_kind,
                    "name": query.identifier,
                });
                if let Some(limit) = query.line_limit {
                    args["lineLimit"] = json!(limit);
                }
                args
            }
        }
    }
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::from_config(&CatalogConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(kind: &str, intent: Intent) -> ResolvedQuery {
        ResolvedQuery {
            namespace: "ns-a".into(),
            resource_kind: kind.into(),
            identifier: "web-0".into(),
            intent,
            line_limit: None,
        }
    }

    #[test]
    fn list_uses_per_kind_tool() {
        let catalog = ToolCatalog::default();
        assert_eq!(catalog.tool_for(&query("devbox", Intent::List)), "list_devboxes");
        assert_eq!(catalog.tool_for(&query("Pod", Intent::List)), "list_pods");
    }

    #[test]
    fn unknown_kind_falls_back_to_generic() {
        let catalog = ToolCatalog::default();
        assert_eq!(catalog.tool_for(&query("gizmo", Intent::List)), "list_resources");
    }

    #[test]
    fn inspect_uses_single_tool() {
        let catalog = ToolCatalog::default();
        assert_eq!(catalog.tool_for(&query("pod", Intent::Inspect)), "inspect_resource");
        assert_eq!(catalog.tool_for(&query("devbox", Intent::Inspect)), "inspect_resource");
    }

    #[test]
    fn inspect_arguments_include_line_limit_when_set() {
        let catalog = ToolCatalog::default();
        let mut q = query("pod", Intent::Inspect);
        assert!(catalog.arguments(&q).get("lineLimit").is_none());
        q.line_limit = Some(40);
        let args = catalog.arguments(&q);
        assert_eq!(args["name"], "web-0");
        assert_eq!(args["lineLimit"], 40);
        assert_eq!(args["resourceKind"], "pod");
    }
}
