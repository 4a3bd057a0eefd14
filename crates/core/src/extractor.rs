//! The seam to the natural-language parameter extractor.
//!
//! An extractor turns normalized tokens into an ordered list of
//! [`Candidate`]s. Implementations must be fail-closed: anything ambiguous
//! becomes an error (or an empty list), never a guessed value.

use async_trait::async_trait;

use crate::error::ExtractionError;
use crate::query::Candidate;

/// Input to one extraction call.
#[derive(Debug, Clone, Default)]
pub struct ExtractionRequest {
    /// Normalized tokens for the current turn, flags already stripped.
    pub tokens: Vec<String>,

    /// Bounded rendering of the previous turn's results, if still valid.
    pub snapshot: Option<String>,
}

impl ExtractionRequest {
    pub fn new(tokens: Vec<String>) -> Self {
        Self {
            tokens,
            snapshot: None,
        }
    }

    pub fn with_snapshot(mut self, snapshot: Option<String>) -> Self {
        self.snapshot = snapshot;
        self
    }
}

#[async_trait]
pub trait Extractor: Send + Sync {
    /// A short name for logs and the banner (e.g. "keyword", "llm").
    fn name(&self) -> &str;

    /// Extract candidates from the request.
    async fn extract(
        &self,
        request: &ExtractionRequest,
    ) -> std::result::Result<Vec<Candidate>, ExtractionError>;
}
