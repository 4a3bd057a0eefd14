//! Worker runner: one fresh process per resolved query.
//!
//! The worker gets exactly one request on stdin, answers on stdout and logs
//! on stderr. Stderr is only ever forwarded to tracing. The task settles on
//! the first decoded `error`/`result` line, on the deadline, or on process
//! exit, whichever comes first; the worker is killed as soon as it settles.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use opsclaw_config::WorkerConfig;
use opsclaw_core::{Outcome, TaskError};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::protocol::{Frame, LineFramer, Skip, ToolCallRequest, decode_line};
use crate::registry::WorkerRegistry;

/// How to start a worker.
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub timeout: Duration,
}

impl WorkerSpec {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: HashMap::new(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            env: config.env.clone(),
            timeout: config.timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Bookkeeping for one in-flight task. The first settle wins; later ones
/// are ignored.
#[derive(Debug)]
pub struct WorkerTask {
    resource_kind: String,
    pid: Option<u32>,
    deadline: Instant,
    outcome: Option<Outcome>,
}

impl WorkerTask {
    pub fn new(resource_kind: impl Into<String>, pid: Option<u32>, deadline: Instant) -> Self {
        Self {
            resource_kind: resource_kind.into(),
            pid,
            deadline,
            outcome: None,
        }
    }

    /// Returns `false` if the task had already settled.
    pub fn settle(&mut self, outcome: Outcome) -> bool {
        if self.outcome.is_some() {
            debug!(kind = %self.resource_kind, pid = ?self.pid, "Ignoring late settle");
            return false;
        }
        self.outcome = Some(outcome);
        true
    }

    pub fn is_settled(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn into_outcome(self) -> Outcome {
        self.outcome
            .unwrap_or_else(|| Outcome::Failure(TaskError::Io("worker never settled".into())))
    }
}

/// Run one worker to settlement. Never fails: every error becomes an
/// [`Outcome::Failure`].
pub async fn run(
    spec: &WorkerSpec,
    registry: &Arc<WorkerRegistry>,
    request: &ToolCallRequest,
    resource_kind: &str,
) -> Outcome {
    let deadline = Instant::now() + spec.timeout;

    let mut child = match Command::new(&spec.command)
        .args(&spec.args)
        .envs(&spec.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            warn!(command = %spec.command, kind = resource_kind, "Worker spawn failed: {e}");
            return Outcome::Failure(TaskError::Spawn(format!("{}: {e}", spec.command)));
        }
    };

    let pid = child.id();
    let registration = registry.register(pid, resource_kind);
    let mut task = WorkerTask::new(resource_kind, pid, deadline);

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_diagnostics(stderr, resource_kind.to_string()));
    }

    let exchange = async {
        match converse(&mut child, request).await? {
            Some(outcome) => Ok(outcome),
            None => {
                registration.release_pid();
                exit_outcome(&mut child).await
            }
        }
    };

    match tokio::time::timeout_at(task.deadline(), exchange).await {
        Ok(Ok(outcome)) => task.settle(outcome),
        Ok(Err(e)) => task.settle(Outcome::Failure(e)),
        Err(_) => {
            warn!(
                kind = resource_kind,
                ?pid,
                worker = registration.id(),
                "Worker timed out after {:?}",
                spec.timeout
            );
            task.settle(Outcome::Failure(TaskError::Timeout {
                after: spec.timeout,
            }))
        }
    };

    registration.release_pid();
    reap(&mut child, resource_kind).await;
    drop(registration);
    task.into_outcome()
}

/// Write the request, then read stdout until a frame settles the task.
/// `None` means stdout closed without one.
async fn converse(
    child: &mut Child,
    request: &ToolCallRequest,
) -> Result<Option<Outcome>, TaskError> {
    let line = request.to_line().map_err(|e| TaskError::Io(e.to_string()))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| TaskError::Io("worker stdin unavailable".into()))?;
    if let Err(e) = stdin.write_all(&line).await {
        // The worker may exit without reading; its exit code decides.
        debug!(id = request.id, "Request write failed: {e}");
    }
    drop(stdin);

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| TaskError::Io("worker stdout unavailable".into()))?;

    let mut framer = LineFramer::default();
    let mut chunk = vec![0u8; 8 * 1024];
    loop {
        let n = stdout
            .read(&mut chunk)
            .await
            .map_err(|e| TaskError::Io(e.to_string()))?;

        if n == 0 {
            if let Some(frame) = framer.finish().and_then(|rest| accept(&rest, request.id)) {
                return Ok(Some(settle_with(frame)));
            }
            return Ok(None);
        }

        for line in framer.push(&chunk[..n]) {
            if let Some(frame) = accept(&line, request.id) {
                return Ok(Some(settle_with(frame)));
            }
        }
    }
}

/// Apply the exit-code rule once stdout has closed without a frame.
async fn exit_outcome(child: &mut Child) -> Result<Outcome, TaskError> {
    let status = child
        .wait()
        .await
        .map_err(|e| TaskError::Io(e.to_string()))?;

    // Exit 0 without a result line counts as an empty success.
    Ok(match status.code() {
        Some(0) => Outcome::Success(None),
        Some(code) => Outcome::Failure(TaskError::Exited { code }),
        None => Outcome::Failure(TaskError::Signalled),
    })
}

fn accept(line: &str, id: u64) -> Option<Frame> {
    match decode_line(line, id) {
        Ok(frame) => Some(frame),
        Err(Skip::NotJson | Skip::NoPayload) => None,
        Err(Skip::Undecodable(e)) => {
            warn!(id, line = %line.trim(), "Discarding undecodable line: {e}");
            None
        }
        Err(Skip::ForeignId(other)) => {
            debug!(id, %other, "Discarding response for another request");
            None
        }
    }
}

fn settle_with(frame: Frame) -> Outcome {
    match frame {
        Frame::Result(payload) => Outcome::Success(payload),
        Frame::Error(message) => Outcome::Failure(TaskError::Remote(message)),
    }
}

/// Kill the worker if it is still running and wait for it to be reaped.
async fn reap(child: &mut Child, resource_kind: &str) {
    if !matches!(child.try_wait(), Ok(Some(_))) {
        if let Err(e) = child.start_kill() {
            debug!(kind = resource_kind, "Kill failed: {e}");
        }
    }
    if let Err(e) = child.wait().await {
        warn!(kind = resource_kind, "Failed to reap worker: {e}");
    }
}

async fn forward_diagnostics(stderr: ChildStderr, resource_kind: String) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(kind = %resource_kind, "worker: {line}");
    }
}
