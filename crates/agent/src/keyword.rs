//! Offline, rule-based [`Extractor`].
//!
//! Uses the same recognizers as the context store. One candidate is emitted
//! per distinct resource kind, in order of appearance. The turn is an
//! inspect turn when any inspect verb (`describe`, `logs`, ...) is present.

use async_trait::async_trait;
use opsclaw_core::{Candidate, ExtractionError, ExtractionRequest, Extractor, Intent};

use crate::context::{Vocabulary, recognize};

pub struct KeywordExtractor {
    vocab: Vocabulary,
}

impl KeywordExtractor {
    pub fn new(vocab: Vocabulary) -> Self {
        Self { vocab }
    }

    fn candidates(&self, tokens: &[String]) -> Vec<Candidate> {
        let seen = recognize(&self.vocab, tokens);
        let intent = if tokens.iter().any(|t| self.vocab.is_inspect_verb(t)) {
            Intent::Inspect
        } else {
            Intent::List
        };

        if seen.kinds.is_empty() {
            if seen.namespace.is_none() && seen.zone.is_none() {
                return vec![];
            }
            return vec![Candidate {
                namespace: seen.namespace,
                resource_kind: String::new(),
                identifier: seen.zone,
                intent: Intent::List,
            }];
        }

        let last = seen.kinds.len() - 1;
        seen.kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| {
                // The name only ever belongs to the last resource keyword.
                let identifier = match intent {
                    Intent::Inspect if i == last => seen.name.clone(),
                    Intent::Inspect => None,
                    Intent::List => seen.zone.clone(),
                };
                Candidate {
                    namespace: seen.namespace.clone(),
                    resource_kind: kind.clone(),
                    identifier,
                    intent,
                }
            })
            .collect()
    }
}

#[async_trait]
impl Extractor for KeywordExtractor {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn extract(
        &self,
        request: &ExtractionRequest,
    ) -> std::result::Result<Vec<Candidate>, ExtractionError> {
        Ok(self.candidates(&request.tokens))
    }
}
