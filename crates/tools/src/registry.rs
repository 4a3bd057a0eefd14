//! Worker lifecycle registry.
//!
//! Every spawned worker is registered right after spawn (before its request
//! is written) and deregistered when its process has been reaped. The
//! [`Registration`] guard does the deregistration on drop, so it happens
//! exactly once on every path: settle, timeout, I/O failure or a cancelled
//! dispatch.
//!
//! A worker gives up its pid with [`Registration::release_pid`] before its
//! process is waited on, so a reaped pid is never signalled.
//!
//! At shutdown the registry signals every live worker with `SIGTERM`, waits
//! out the grace period, then sends `SIGKILL` to whatever is left.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

/// A live worker process.
#[derive(Debug, Clone)]
pub struct LiveWorker {
    pub pid: Option<u32>,
    pub resource_kind: String,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    live: HashMap<u64, LiveWorker>,
}

/// What a shutdown had to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Workers sent the graceful signal.
    pub terminated: usize,
    /// Workers still alive after the grace period.
    pub killed: usize,
}

#[derive(Debug)]
pub struct WorkerRegistry {
    inner: Mutex<Inner>,
    live_count: watch::Sender<usize>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        let (live_count, _) = watch::channel(0);
        Self {
            inner: Mutex::new(Inner::default()),
            live_count,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a freshly spawned worker.
    pub fn register(self: &Arc<Self>, pid: Option<u32>, resource_kind: &str) -> Registration {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.live.insert(
            id,
            LiveWorker {
                pid,
                resource_kind: resource_kind.to_string(),
            },
        );
        self.live_count.send_replace(inner.live.len());
        debug!(id, ?pid, kind = resource_kind, "Worker registered");

        Registration {
            registry: Arc::clone(self),
            id,
        }
    }

    fn deregister(&self, id: u64) -> bool {
        let mut inner = self.lock();
        let removed = inner.live.remove(&id).is_some();
        if removed {
            self.live_count.send_replace(inner.live.len());
            debug!(id, "Worker deregistered");
        }
        removed
    }

    fn clear_pid(&self, id: u64) {
        if let Some(worker) = self.lock().live.get_mut(&id) {
            worker.pid = None;
        }
    }

    pub fn len(&self) -> usize {
        self.lock().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the live workers.
    pub fn live(&self) -> Vec<LiveWorker> {
        self.lock().live.values().cloned().collect()
    }

    /// Resolves once no worker is registered.
    pub async fn wait_empty(&self) {
        let mut rx = self.live_count.subscribe();
        // The sender lives in `self`, so this only errors if `self` is gone.
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Terminate every live worker: graceful signal, `grace` to exit, then a
    /// forceful kill. The registry is empty when this returns.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        if self.is_empty() {
            return report;
        }

        report.terminated = self.signal_all(Signal::Terminate);
        info!(workers = report.terminated, "Terminating live workers");

        if tokio::time::timeout(grace, self.wait_empty()).await.is_err() {
            report.killed = self.signal_all(Signal::Kill);
            warn!(workers = report.killed, "Workers ignored terminate, killed");
            // Give reapers a moment to deregister before clearing the rest.
            let _ = tokio::time::timeout(Duration::from_millis(200), self.wait_empty()).await;
        }

        let mut inner = self.lock();
        if !inner.live.is_empty() {
            debug!(left = inner.live.len(), "Dropping unreaped workers");
            inner.live.clear();
            self.live_count.send_replace(0);
        }
        report
    }

    // Holds the lock while signalling so a pid cannot be released and
    // reaped in between.
    fn signal_all(&self, signal: Signal) -> usize {
        self.lock()
            .live
            .values()
            .filter_map(|w| w.pid)
            .filter(|pid| send_signal(*pid, signal))
            .count()
    }
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Deregisters its worker when dropped.
#[derive(Debug)]
pub struct Registration {
    registry: Arc<WorkerRegistry>,
    id: u64,
}

impl Registration {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop signalling this worker by pid. Call before waiting on the
    /// process; the entry stays registered until the guard drops.
    pub fn release_pid(&self) {
        self.registry.clear_pid(self.id);
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Terminate,
    Kill,
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: Signal) -> bool {
    use nix::sys::signal::{self, Signal as NixSignal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    let sig = match signal {
        Signal::Terminate => NixSignal::SIGTERM,
        Signal::Kill => NixSignal::SIGKILL,
    };
    match signal::kill(Pid::from_raw(raw), sig) {
        Ok(()) => true,
        Err(e) => {
            debug!(pid, ?sig, "Signal not delivered: {e}");
            false
        }
    }
}

// Without POSIX signals the workers are killed when their handles drop.
#[cfg(not(unix))]
fn send_signal(_pid: u32, _signal: Signal) -> bool {
    false
}
