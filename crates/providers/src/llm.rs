//! LLM-backed extractor over an OpenAI-compatible chat completions endpoint.
//!
//! Works with OpenRouter, OpenAI, Ollama, vLLM and anything else exposing
//! `/chat/completions`. One non-streaming request per turn; the model is
//! asked for a bare JSON array of candidates.
//!
//! Fail-closed: a refused, truncated or unparseable answer is an error,
//! never a partial guess.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use opsclaw_config::{AppConfig, VocabularyConfig};
use opsclaw_core::{Candidate, ExtractionError, ExtractionRequest, Extractor, Intent};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

pub struct LlmExtractor {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    vocabulary: VocabularyConfig,
    client: reqwest::Client,
}

impl LlmExtractor {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        vocabulary: VocabularyConfig,
    ) -> Result<Self, ExtractionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ExtractionError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.0,
            max_tokens: 512,
            vocabulary,
            client,
        })
    }

    /// Build from the application config. Requires an API key.
    pub fn from_config(config: &AppConfig) -> Result<Self, ExtractionError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ExtractionError::NotConfigured("no API key set".into()))?;

        let mut extractor = Self::new(
            &config.extractor.api_url,
            api_key,
            &config.extractor.model,
            config.vocabulary.clone(),
        )?;
        extractor.temperature = config.extractor.temperature;
        extractor.max_tokens = config.extractor.max_tokens;
        Ok(extractor)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn canonical_kinds(&self) -> BTreeSet<String> {
        self.vocabulary
            .resource_kinds
            .values()
            .map(|k| k.to_lowercase())
            .collect()
    }

    fn system_prompt(&self) -> String {
        let kinds: Vec<_> = self.canonical_kinds().into_iter().collect();
        format!(
            "You extract infrastructure queries from short operator requests.\n\
             Zones: {zones}.\n\
             Namespaces always start with \"{prefix}\".\n\
             Resource kinds: {kinds}.\n\
             Answer with a bare JSON array and nothing else. Each item is an object:\n\
             {{\"namespace\": string or null, \"resourceKind\": one of the kinds, \
             \"identifier\": string or null, \"intent\": \"list\" or \"inspect\"}}.\n\
             For \"list\", identifier is the zone if one is given. For \"inspect\", \
             identifier is the resource name. If the request names a namespace or \
             zone but no kind, emit one item with resourceKind \"\". \
             If nothing can be extracted with certainty, answer [].",
            zones = self.vocabulary.zones.join(", "),
            prefix = self.vocabulary.namespace_prefix,
            kinds = kinds.join(", "),
        )
    }

    fn user_prompt(request: &ExtractionRequest) -> String {
        let mut prompt = format!("Request: {}", request.tokens.join(" "));
        if let Some(snapshot) = &request.snapshot {
            prompt.push_str("\n\nPrevious results (may be truncated):\n");
            prompt.push_str(snapshot);
        }
        prompt
    }

    /// Parse the model's answer into candidates.
    fn parse_candidates(&self, content: &str) -> Result<Vec<Candidate>, ExtractionError> {
        let body = strip_fences(content);
        let value: Value = serde_json::from_str(body)
            .map_err(|e| ExtractionError::Malformed(format!("not JSON: {e}")))?;

        let items = match value {
            Value::Null => return Ok(vec![]),
            Value::Array(items) => items,
            other => {
                return Err(ExtractionError::Malformed(format!(
                    "expected an array, got {}",
                    kind_name(&other)
                )));
            }
        };

        let kinds = self.canonical_kinds();
        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| self.parse_item(i, item, &kinds))
            .collect()
    }

    fn parse_item(
        &self,
        index: usize,
        item: Value,
        kinds: &BTreeSet<String>,
    ) -> Result<Candidate, ExtractionError> {
        let malformed = |what: &str| ExtractionError::Malformed(format!("item {index}: {what}"));

        let raw: RawCandidate =
            serde_json::from_value(item).map_err(|e| malformed(&e.to_string()))?;
        let intent: Intent = raw
            .intent
            .parse()
            .map_err(|_| malformed(&format!("unknown intent {:?}", raw.intent)))?;

        let kind = raw.resource_kind.trim().to_lowercase();
        let kind = if kind.is_empty() || kinds.contains(&kind) {
            kind
        } else if let Some(canonical) = self.vocabulary.resource_kinds.get(&kind) {
            canonical.to_lowercase()
        } else {
            return Err(malformed(&format!("unknown resource kind {kind:?}")));
        };

        Ok(Candidate {
            namespace: raw.namespace.filter(|s| !s.trim().is_empty()),
            resource_kind: kind,
            identifier: raw.identifier.filter(|s| !s.trim().is_empty()),
            intent,
        })
    }
}

#[async_trait]
impl Extractor for LlmExtractor {
    fn name(&self) -> &str {
        "llm"
    }

    async fn extract(
        &self,
        request: &ExtractionRequest,
    ) -> std::result::Result<Vec<Candidate>, ExtractionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": self.system_prompt() },
                { "role": "user", "content": Self::user_prompt(request) },
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "stream": false,
        });

        debug!(model = %self.model, tokens = request.tokens.len(), "Sending extraction request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ExtractionError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ExtractionError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let content = answer_content(api_response)?;
        let candidates = self.parse_candidates(&content)?;
        debug!(count = candidates.len(), "Extracted candidates");
        Ok(candidates)
    }
}

/// Map a non-200 status to its extraction error.
fn status_error(status: u16, body: String) -> ExtractionError {
    if status == 401 || status == 403 {
        return ExtractionError::NotConfigured(
            "Invalid API key or insufficient permissions".into(),
        );
    }
    warn!(status, body = %body, "Extractor endpoint returned error");
    ExtractionError::ApiError {
        status_code: status,
        message: body,
    }
}

/// The first choice's text, unless the model was cut off or filtered.
fn answer_content(response: ApiResponse) -> Result<String, ExtractionError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ExtractionError::Malformed("no choices in response".into()))?;

    match choice.finish_reason.as_deref() {
        Some("length") => Err(ExtractionError::Truncated),
        Some("content_filter") => Err(ExtractionError::Filtered),
        _ => Ok(choice.message.content.unwrap_or_default()),
    }
}

/// Models like to wrap JSON in a markdown code block.
fn strip_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an info string such as "json".
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().trim_end_matches("```").trim()
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// --- Wire types ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCandidate {
    #[serde(default)]
    namespace: Option<String>,
    resource_kind: String,
    #[serde(default)]
    identifier: Option<String>,
    intent: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
}
