//! Task dispatcher. Runs one batch of resolved queries concurrently.
//!
//! Every query gets its own worker task. The batch completes when every
//! task has settled; one stalled worker delays the batch only until its
//! own deadline. Reports come back in query order.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use futures::future::join_all;
use opsclaw_core::{Outcome, ResolvedQuery, TaskError, TaskReport};
use tracing::{debug, info, warn};

use crate::catalog::ToolCatalog;
use crate::protocol::ToolCallRequest;
use crate::registry::WorkerRegistry;
use crate::worker::{self, WorkerSpec};

pub struct Dispatcher {
    spec: Arc<WorkerSpec>,
    catalog: Arc<ToolCatalog>,
    registry: Arc<WorkerRegistry>,
    next_id: AtomicU64,
}

impl Dispatcher {
    pub fn new(spec: WorkerSpec, catalog: ToolCatalog, registry: Arc<WorkerRegistry>) -> Self {
        Self {
            spec: Arc::new(spec),
            catalog: Arc::new(catalog),
            registry,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn registry(&self) -> &Arc<WorkerRegistry> {
        &self.registry
    }

    /// Dispatch a batch and wait for every task to settle.
    ///
    /// Workers run on their own tokio tasks, so dropping this future does
    /// not orphan them: they still settle (or are killed by a registry
    /// shutdown) and deregister themselves.
    pub async fn dispatch(&self, queries: Vec<ResolvedQuery>) -> Vec<TaskReport> {
        if queries.is_empty() {
            return Vec::new();
        }
        info!(count = queries.len(), "Dispatching batch");

        let mut pending = Vec::with_capacity(queries.len());
        for query in queries {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let tool = self.catalog.tool_for(&query).to_string();
            let request = ToolCallRequest::new(id, &tool, self.catalog.arguments(&query));
            debug!(id, tool = %tool, query = %query, "Spawning worker");

            let spec = Arc::clone(&self.spec);
            let registry = Arc::clone(&self.registry);
            let task_query = query.clone();
            let handle = tokio::spawn(async move {
                let started = Instant::now();
                let outcome =
                    worker::run(&spec, &registry, &request, &task_query.resource_kind).await;
                TaskReport {
                    query: task_query,
                    outcome,
                    elapsed: started.elapsed(),
                }
            });
            pending.push((query, handle));
        }

        let (queries, handles): (Vec<_>, Vec<_>) = pending.into_iter().unzip();
        let joined = join_all(handles).await;

        queries
            .into_iter()
            .zip(joined)
            .map(|(query, joined)| match joined {
                Ok(report) => report,
                Err(e) => {
                    warn!(query = %query, "Worker task aborted: {e}");
                    TaskReport {
                        query,
                        outcome: Outcome::Failure(TaskError::Io(format!("task aborted: {e}"))),
                        elapsed: Default::default(),
                    }
                }
            })
            .collect()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use opsclaw_core::Intent;
    use std::time::Duration;

    fn list(kind: &str) -> ResolvedQuery {
        ResolvedQuery {
            namespace: "ns-team".into(),
            resource_kind: kind.into(),
            identifier: "hzh".into(),
            intent: Intent::List,
            line_limit: None,
        }
    }

    // Answers per tool name; `list_pods` never answers.
    const SCRIPT: &str = r#"read -r req
case "$req" in
  *list_pods*) exec sleep 30 ;;
  *list_apps*) printf '%s\n' '{"result":{"content":[{"type":"text","text":"{\"apps\":[{\"name\":\"web\"}]}"}]}}' ;;
  *list_devboxes*) printf '%s\n' '{"result":{"content":[{"type":"text","text":"{\"devboxes\":[]}"}]}}' ;;
  *) exit 4 ;;
esac"#;

    fn dispatcher(timeout: Duration) -> Dispatcher {
        let spec = WorkerSpec::new("sh", vec!["-c".into(), SCRIPT.into()]).with_timeout(timeout);
        Dispatcher::new(spec, ToolCatalog::default(), Arc::new(WorkerRegistry::new()))
    }

    #[tokio::test]
    async fn empty_batch_is_empty() {
        let d = dispatcher(Duration::from_secs(1));
        assert!(d.dispatch(vec![]).await.is_empty());
    }

    #[tokio::test]
    async fn reports_follow_query_order() {
        let d = dispatcher(Duration::from_secs(5));
        let reports = d
            .dispatch(vec![list("devbox"), list("app"), list("bucket")])
            .await;
        let kinds: Vec<_> = reports.iter().map(|r| r.resource_kind()).collect();
        assert_eq!(kinds, ["devbox", "app", "bucket"]);
        assert!(reports[0].outcome.is_success());
        assert_eq!(
            reports[1].outcome.payload().and_then(|p| p["apps"][0]["name"].as_str()),
            Some("web")
        );
        assert_eq!(
            reports[2].outcome,
            Outcome::Failure(TaskError::Exited { code: 4 })
        );
        assert!(d.registry().is_empty());
    }

    #[tokio::test]
    async fn stalled_worker_only_fails_itself() {
        let d = dispatcher(Duration::from_millis(500));
        let started = Instant::now();
        let reports = d
            .dispatch(vec![list("devbox"), list("pod"), list("app")])
            .await;

        assert_eq!(reports.len(), 3);
        assert!(reports[0].outcome.is_success());
        assert_eq!(
            reports[1].outcome,
            Outcome::Failure(TaskError::Timeout {
                after: Duration::from_millis(500)
            })
        );
        assert!(reports[2].outcome.is_success());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(d.registry().is_empty());
    }

    #[tokio::test]
    async fn request_ids_increase_across_batches() {
        let d = dispatcher(Duration::from_secs(5));
        d.dispatch(vec![list("devbox"), list("app")]).await;
        assert_eq!(d.next_id.load(Ordering::Relaxed), 3);
        d.dispatch(vec![list("devbox")]).await;
        assert_eq!(d.next_id.load(Ordering::Relaxed), 4);
    }

    #[tokio::test]
    async fn dropped_dispatch_leaves_workers_to_shutdown() {
        let d = dispatcher(Duration::from_secs(20));
        let registry = Arc::clone(d.registry());

        let turn = tokio::time::timeout(Duration::from_millis(300), d.dispatch(vec![list("pod")]));
        assert!(turn.await.is_err());
        assert_eq!(registry.len(), 1);

        let report = registry.shutdown(Duration::from_secs(2)).await;
        assert_eq!(report.terminated, 1);
        assert!(registry.is_empty());
    }
}
