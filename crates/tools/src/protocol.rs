//! Worker wire protocol.
//!
//! One JSON request line goes to the worker's stdin, which is then closed.
//! Responses come back newline-delimited on stdout. Only lines that look
//! like a JSON object (`{ ... }`) are decoded; undecodable lines are
//! skipped. The first decoded line carrying `error` or `result` settles the
//! task.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A `tools/call` request.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    pub params: ToolCallParams,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolCallParams {
    pub name: String,
    pub arguments: Value,
}

impl ToolCallRequest {
    pub fn new(id: u64, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: "tools/call",
            params: ToolCallParams {
                name: name.into(),
                arguments,
            },
        }
    }

    /// The request as one newline-terminated line.
    pub fn to_line(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// A decoded line that settles a task.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Decoded payload of `result.content[0].text`.
    Result(Option<Value>),
    /// The remote error message, verbatim.
    Error(String),
}

/// Why a line was not turned into a [`Frame`].
#[derive(Debug, Clone, PartialEq)]
pub enum Skip {
    /// Not shaped like a JSON object; ignored silently.
    NotJson,
    /// Shaped like JSON but failed to decode.
    Undecodable(String),
    /// Answers a different request id.
    ForeignId(Value),
    /// Valid JSON with neither `result` nor `error` (e.g. a notification).
    NoPayload,
}

/// Try to turn one response line into a settling frame.
///
/// A line whose `id` is present and differs from `expected_id` is skipped.
/// Lines without an `id` are accepted.
pub fn decode_line(line: &str, expected_id: u64) -> Result<Frame, Skip> {
    let line = line.trim();
    if !(line.starts_with('{') && line.ends_with('}')) {
        return Err(Skip::NotJson);
    }

    let response: WireResponse =
        serde_json::from_str(line).map_err(|e| Skip::Undecodable(e.to_string()))?;

    if let Some(id) = response.id.filter(|id| !id.is_null()) {
        if id.as_u64() != Some(expected_id) {
            return Err(Skip::ForeignId(id));
        }
    }

    if let Some(error) = response.error {
        return Ok(Frame::Error(error_message(&error)));
    }

    match response.result {
        Some(result) => Ok(Frame::Result(decode_payload(&result))),
        None => Err(Skip::NoPayload),
    }
}

fn error_message(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("message").and_then(Value::as_str) {
            Some(message) => message.to_string(),
            None => error.to_string(),
        },
        other => other.to_string(),
    }
}

/// Pull the payload out of a `result` object.
///
/// The first `text` content item is parsed as JSON; non-JSON text is kept as
/// a string. No text content means no payload.
pub fn decode_payload(result: &Value) -> Option<Value> {
    let text = result
        .get("content")?
        .as_array()?
        .iter()
        .find(|item| item.get("type").and_then(Value::as_str) == Some("text"))?
        .get("text")?
        .as_str()?;

    Some(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
}

/// Accumulates stdout chunks and yields complete lines.
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: Vec<u8>,
    // Bytes of `buf` already known to hold no newline.
    scanned: usize,
}

impl LineFramer {
    /// Append a chunk and drain every complete line.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buf[start.max(self.scanned)..]
            .iter()
            .position(|b| *b == b'\n')
        {
            let end = start.max(self.scanned) + offset;
            lines.push(String::from_utf8_lossy(&self.buf[start..end]).into_owned());
            start = end + 1;
            self.scanned = start;
        }
        self.buf.drain(..start);
        self.scanned = self.buf.len();
        lines
    }

    /// Whatever is left after EOF, if it is not blank.
    pub fn finish(&mut self) -> Option<String> {
        self.scanned = 0;
        let rest = String::from_utf8_lossy(&std::mem::take(&mut self.buf)).into_owned();
        (!rest.trim().is_empty()).then_some(rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_line_shape() {
        let req = ToolCallRequest::new(7, "list_pods", json!({"namespace": "ns-a"}));
        let line = req.to_line().unwrap();
        assert_eq!(*line.last().unwrap(), b'\n');
        let value: Value = serde_json::from_slice(&line).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["method"], "tools/call");
        assert_eq!(value["params"]["name"], "list_pods");
        assert_eq!(value["params"]["arguments"]["namespace"], "ns-a");
    }

    #[test]
    fn result_line_decodes_text_payload() {
        let line = r#"{"result":{"content":[{"type":"text","text":"{\"pods\":[]}"}]}}"#;
        let frame = decode_line(line, 1).unwrap();
        assert_eq!(frame, Frame::Result(Some(json!({"pods": []}))));
    }

    #[test]
    fn non_json_text_is_kept_as_string() {
        let line = r#"{"result":{"content":[{"type":"text","text":"all good"}]}}"#;
        assert_eq!(
            decode_line(line, 1).unwrap(),
            Frame::Result(Some(Value::String("all good".into())))
        );
    }

    #[test]
    fn empty_content_is_no_payload() {
        assert_eq!(
            decode_line(r#"{"result":{"content":[]}}"#, 1).unwrap(),
            Frame::Result(None)
        );
    }

    #[test]
    fn error_line_is_verbatim() {
        let line = r#"{"id":3,"error":{"code":-32000,"message":"namespace not found"}}"#;
        assert_eq!(
            decode_line(line, 3).unwrap(),
            Frame::Error("namespace not found".into())
        );
    }

    #[test]
    fn foreign_id_is_skipped() {
        let line = r#"{"id":9,"result":{"content":[]}}"#;
        assert!(matches!(decode_line(line, 3), Err(Skip::ForeignId(_))));
    }

    #[test]
    fn log_lines_and_garbage_are_skipped() {
        assert_eq!(decode_line("server ready", 1), Err(Skip::NotJson));
        assert!(matches!(decode_line("{not json}", 1), Err(Skip::Undecodable(_))));
        assert_eq!(
            decode_line(r#"{"method":"notifications/progress"}"#, 1),
            Err(Skip::NoPayload)
        );
    }

    #[test]
    fn framer_handles_split_chunks() {
        let mut framer = LineFramer::default();
        assert!(framer.push(b"{\"res").is_empty());
        let lines = framer.push(b"ult\":1}\nlog line\n{\"par");
        assert_eq!(lines, vec!["{\"result\":1}", "log line"]);
        assert_eq!(framer.finish().as_deref(), Some("{\"par"));
        assert!(framer.finish().is_none());
    }

    #[test]
    fn framer_scans_large_line_incrementally() {
        let text = "x".repeat(8 * 1024 * 1024);
        let line = format!("{{\"result\":\"{text}\"}}\n");
        let mut framer = LineFramer::default();
        let started = std::time::Instant::now();
        let mut lines = Vec::new();
        for chunk in line.as_bytes().chunks(8 * 1024) {
            lines.extend(framer.push(chunk));
        }
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), line.len() - 1);
        assert!(framer.finish().is_none());
    }

    #[test]
    fn framer_keeps_partial_tail_across_pushes() {
        let mut framer = LineFramer::default();
        assert!(framer.push(b"abc").is_empty());
        assert!(framer.push(b"def").is_empty());
        assert_eq!(framer.push(b"g\nh\ni"), vec!["abcdefg", "h"]);
        assert_eq!(framer.push(b"j\n"), vec!["ij"]);
        assert!(framer.finish().is_none());
    }
}
