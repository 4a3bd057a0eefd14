//! The turn driver: one free-text line in, one batch of settled reports
//! out.
//!
//! A turn goes:
//!
//! 1. **Update context** from the tokens (a scope change drops the previous
//!    turn's snapshot)
//! 2. **Extract** candidates (fail-closed: errors become "no candidates")
//! 3. **Fuse** candidates with the context; an invalid inspect aborts the
//!    whole batch before anything is spawned
//! 4. **Dispatch** the batch and wait for every task to settle
//! 5. **Snapshot** the results for the next turn's extractor call
//!
//! Only one turn is in flight at a time, so the context is plain owned
//! state.

use std::sync::Arc;

use opsclaw_config::AppConfig;
use opsclaw_core::{ExtractionRequest, Extractor, FusionError, TaskReport};
use opsclaw_tools::{Dispatcher, ToolCatalog, WorkerRegistry, WorkerSpec};
use tracing::{debug, info, warn};

use crate::aggregate::{self, Aggregator};
use crate::context::{SessionContext, Vocabulary};
use crate::fusion::{self, FusionOptions};
use crate::normalizer::NormalizedInput;

/// How a turn ended.
#[derive(Debug)]
pub enum TurnOutcome {
    /// The extractor produced nothing usable; nothing was dispatched.
    NoCandidates,
    /// Fusion rejected the batch; nothing was dispatched.
    Rejected(FusionError),
    /// Every dispatched task settled. Reports are in query order.
    Dispatched(Vec<TaskReport>),
}

pub struct Session {
    vocab: Vocabulary,
    context: SessionContext,
    extractor: Arc<dyn Extractor>,
    dispatcher: Dispatcher,
    aggregator: Aggregator,
    generic_kind: String,
    default_line_limit: u32,
    snapshot: Option<String>,
    snapshot_budget: usize,
}

impl Session {
    pub fn new(extractor: Arc<dyn Extractor>, dispatcher: Dispatcher, vocab: Vocabulary) -> Self {
        Self {
            vocab,
            context: SessionContext::default(),
            extractor,
            dispatcher,
            aggregator: Aggregator::new(&[] as &[&str]),
            generic_kind: "generic".into(),
            default_line_limit: 30,
            snapshot: None,
            snapshot_budget: 4000,
        }
    }

    /// Build a session with a fresh worker registry from `config`.
    pub fn from_config(config: &AppConfig, extractor: Arc<dyn Extractor>) -> Self {
        let dispatcher = Dispatcher::new(
            WorkerSpec::from_config(&config.worker),
            ToolCatalog::from_config(&config.catalog),
            Arc::new(WorkerRegistry::new()),
        );
        Self::new(
            extractor,
            dispatcher,
            Vocabulary::from_config(&config.vocabulary),
        )
        .with_aggregator(Aggregator::new(config.catalog.priority.as_slice()))
        .with_generic_kind(&config.catalog.generic_kind)
        .with_default_line_limit(config.cli.default_line_limit)
        .with_snapshot_budget(config.extractor.snapshot_budget_chars)
    }

    pub fn with_aggregator(mut self, aggregator: Aggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    /// Kind used when the input names a scope but no resource kind.
    pub fn with_generic_kind(mut self, kind: impl Into<String>) -> Self {
        self.generic_kind = kind.into();
        self
    }

    /// Log line count attached to inspect queries when the turn sets none.
    pub fn with_default_line_limit(mut self, limit: u32) -> Self {
        self.default_line_limit = limit;
        self
    }

    /// Character budget for the snapshot handed to the extractor.
    pub fn with_snapshot_budget(mut self, budget: usize) -> Self {
        self.snapshot_budget = budget;
        self
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn registry(&self) -> &Arc<WorkerRegistry> {
        self.dispatcher.registry()
    }

    pub fn extractor_name(&self) -> &str {
        self.extractor.name()
    }

    /// The previous turn's result snapshot, if still in scope.
    pub fn snapshot(&self) -> Option<&str> {
        self.snapshot.as_deref()
    }

    /// Run one turn to completion.
    pub async fn run_turn(&mut self, input: &NormalizedInput) -> TurnOutcome {
        if self.context.update(&self.vocab, &input.tokens) {
            self.snapshot = None;
        }

        let request =
            ExtractionRequest::new(input.tokens.clone()).with_snapshot(self.snapshot.clone());
        let candidates = match self.extractor.extract(&request).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(extractor = self.extractor.name(), "Extraction failed: {e}");
                return TurnOutcome::NoCandidates;
            }
        };
        if candidates.is_empty() {
            debug!("Extractor returned no candidates");
            return TurnOutcome::NoCandidates;
        }

        let options = FusionOptions {
            generic_kind: self.generic_kind.clone(),
            line_limit: Some(input.line_limit.unwrap_or(self.default_line_limit)),
        };
        let queries = match fusion::fuse(&candidates, &mut self.context, &self.vocab, &options) {
            Ok(queries) => queries,
            Err(e) => {
                info!("Batch rejected: {e}");
                return TurnOutcome::Rejected(e);
            }
        };
        if queries.is_empty() {
            return TurnOutcome::NoCandidates;
        }

        let reports = self.dispatcher.dispatch(queries).await;
        self.snapshot = aggregate::snapshot(&reports, self.snapshot_budget);
        TurnOutcome::Dispatched(reports)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use opsclaw_core::{Candidate, ExtractionError, Intent, Outcome};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Returns queued responses and records every request it saw.
    struct ScriptedExtractor {
        responses: Mutex<VecDeque<Result<Vec<Candidate>, ExtractionError>>>,
        seen: Mutex<Vec<ExtractionRequest>>,
    }

    impl ScriptedExtractor {
        fn new(responses: Vec<Result<Vec<Candidate>, ExtractionError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn snapshots(&self) -> Vec<Option<String>> {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.snapshot.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Extractor for ScriptedExtractor {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn extract(
            &self,
            request: &ExtractionRequest,
        ) -> Result<Vec<Candidate>, ExtractionError> {
            self.seen.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(vec![]))
        }
    }

    fn session(extractor: Arc<ScriptedExtractor>) -> Session {
        let script = r#"read -r _; printf '%s\n' '{"result":{"content":[{"type":"text","text":"{\"items\":[{\"name\":\"a\"}]}"}]}}'"#;
        let spec = WorkerSpec::new("sh", vec!["-c".into(), script.into()])
            .with_timeout(Duration::from_secs(5));
        let dispatcher = Dispatcher::new(
            spec,
            ToolCatalog::default(),
            Arc::new(WorkerRegistry::new()),
        );
        Session::new(extractor, dispatcher, Vocabulary::default())
    }

    fn input(line: &str) -> NormalizedInput {
        NormalizedInput {
            tokens: line.split_whitespace().map(String::from).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn extraction_error_means_no_candidates() {
        let extractor = ScriptedExtractor::new(vec![Err(ExtractionError::Truncated)]);
        let mut s = session(extractor);
        let outcome = s.run_turn(&input("pods ns-a")).await;
        assert!(matches!(outcome, TurnOutcome::NoCandidates));
        assert!(s.registry().is_empty());
    }

    #[tokio::test]
    async fn empty_extraction_means_no_candidates() {
        let mut s = session(ScriptedExtractor::new(vec![Ok(vec![])]));
        assert!(matches!(
            s.run_turn(&input("hello")).await,
            TurnOutcome::NoCandidates
        ));
    }

    #[tokio::test]
    async fn inspect_without_name_rejects_whole_batch() {
        let extractor = ScriptedExtractor::new(vec![Ok(vec![
            Candidate::list("pod"),
            Candidate::inspect("app"),
            Candidate::list("devbox"),
        ])]);
        let mut s = session(extractor);
        let outcome = s.run_turn(&input("describe app ns-a")).await;
        match outcome {
            TurnOutcome::Rejected(FusionError::MissingIdentifier { resource_kind, .. }) => {
                assert_eq!(resource_kind, "app");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert!(s.snapshot().is_none());
    }

    #[tokio::test]
    async fn dispatch_fills_namespace_from_context() {
        let extractor = ScriptedExtractor::new(vec![Ok(vec![Candidate::list("pod")])]);
        let mut s = session(extractor);
        let outcome = s.run_turn(&input("pods in ns-team hzh")).await;
        let TurnOutcome::Dispatched(reports) = outcome else {
            panic!("expected dispatch");
        };
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].query.namespace, "ns-team");
        assert_eq!(reports[0].query.identifier, "hzh");
        assert_eq!(reports[0].query.intent, Intent::List);
        assert!(matches!(reports[0].outcome, Outcome::Success(Some(_))));
        assert!(s.snapshot().is_some());
        assert!(s.registry().is_empty());
    }

    #[tokio::test]
    async fn inspect_carries_line_limit() {
        let extractor = ScriptedExtractor::new(vec![Ok(vec![
            Candidate::inspect("pod").with_identifier("web-1"),
        ])]);
        let mut s = session(extractor).with_default_line_limit(50);
        let TurnOutcome::Dispatched(reports) = s.run_turn(&input("logs pod web-1 ns-a")).await
        else {
            panic!("expected dispatch");
        };
        assert_eq!(reports[0].query.line_limit, Some(50));
    }

    #[tokio::test]
    async fn scope_change_drops_snapshot() {
        let extractor = ScriptedExtractor::new(vec![
            Ok(vec![Candidate::list("pod")]),
            Ok(vec![Candidate::list("pod")]),
            Ok(vec![Candidate::list("pod")]),
        ]);
        let mut s = session(Arc::clone(&extractor));

        s.run_turn(&input("pods ns-a hzh")).await;
        s.run_turn(&input("pods again")).await;
        s.run_turn(&input("pods bja")).await;

        let snapshots = extractor.snapshots();
        assert!(snapshots[0].is_none());
        assert!(snapshots[1].is_some());
        // Zone changed: context and snapshot both reset.
        assert!(snapshots[2].is_none());
        assert_eq!(s.context().zone.as_deref(), Some("bja"));
        assert_eq!(s.context().namespace, None);
    }
}
