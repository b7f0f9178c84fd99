//! Background execution owned by one vault instance.
//!
//! Three pieces, all started with the vault and stopped by its shutdown:
//!
//! - [`WorkerPool`] runs fire-and-forget futures (ledger appends) so request
//!   paths never wait on the ledger.
//! - [`Sweeper`] periodically deletes expired share tokens.
//! - [`ActivityLog`] appends audit lines to a file from a dedicated thread.

use std::fs::OpenOptions;
use std::future::Future;
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self as std_mpsc, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, warn};
use vaultify_core::now_millis;
use vaultify_share::TokenManager;

use crate::config::VaultConfig;
use crate::error::Result;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ─────────────────────────────────────────────────────────────────────────────
// Worker Pool
// ─────────────────────────────────────────────────────────────────────────────

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Default)]
struct Pending {
    count: AtomicUsize,
    idle: Notify,
}

impl Pending {
    fn finish(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// A fixed set of tokio tasks draining a queue of detached jobs.
///
/// Each job runs in its own task, so a panicking job is logged and the
/// worker carries on.
pub struct WorkerPool {
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    pending: Arc<Pending>,
}

impl WorkerPool {
    /// Start `size` workers (at least one) on the current runtime.
    pub fn new(size: usize) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel::<Job>();
        let receiver = Arc::new(AsyncMutex::new(receiver));
        let pending = Arc::new(Pending::default());

        let workers = (0..size.max(1))
            .map(|worker| {
                let receiver = receiver.clone();
                let pending = pending.clone();
                tokio::spawn(async move {
                    loop {
                        let job = receiver.lock().await.recv().await;
                        let Some(job) = job else { break };
                        if let Err(e) = tokio::spawn(job).await {
                            error!(worker, error = %e, "background job failed");
                        }
                        pending.finish();
                    }
                })
            })
            .collect();

        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            pending,
        }
    }

    /// Queue a job without waiting for it. Jobs queued after shutdown are dropped.
    pub fn spawn_detached<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = lock(&self.sender);
        let Some(sender) = guard.as_ref() else {
            debug!("worker pool stopped, dropping job");
            return;
        };
        self.pending.count.fetch_add(1, Ordering::AcqRel);
        if sender.send(Box::pin(job)).is_err() {
            self.pending.finish();
            warn!("worker pool queue closed, dropping job");
        }
    }

    /// Jobs queued or running.
    pub fn pending(&self) -> usize {
        self.pending.count.load(Ordering::Acquire)
    }

    /// Wait until every queued job has finished.
    pub async fn wait_idle(&self) {
        loop {
            let idle = self.pending.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            idle.await;
        }
    }

    /// Stop accepting jobs and let the queue drain for at most `timeout`.
    ///
    /// Returns false when workers had to be aborted.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        drop(lock(&self.sender).take());
        let workers = std::mem::take(&mut *lock(&self.workers));
        let aborts: Vec<_> = workers.iter().map(|w| w.abort_handle()).collect();

        let drained = tokio::time::timeout(timeout, async {
            for worker in workers {
                let _ = worker.await;
            }
        })
        .await
        .is_ok();

        if !drained {
            warn!(pending = self.pending(), "worker pool did not drain in time");
            aborts.iter().for_each(|a| a.abort());
        }
        drained
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sweeper
// ─────────────────────────────────────────────────────────────────────────────

/// Recurring expired-token sweep.
///
/// Takes no lock against issuance; a token created during a pass is simply
/// left for the next one.
pub struct Sweeper {
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// First pass runs one `period` after start.
    pub fn start(tokens: TokenManager, period: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match tokens.sweep_expired(now_millis()).await {
                    Ok(removed) => debug!(removed, "token sweep finished"),
                    Err(e) => error!(error = %e, "token sweep failed"),
                }
            }
        });
        Self { handle }
    }

    pub fn stop(&self) {
        self.handle.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Activity Log
// ─────────────────────────────────────────────────────────────────────────────

struct Entry {
    at: DateTime<Local>,
    action: String,
    details: String,
}

/// Render one activity log line.
pub fn format_line(at: &DateTime<Local>, action: &str, details: &str) -> String {
    format!("[{}] {}: {}", at.format("%Y-%m-%d %H:%M:%S"), action, details)
}

/// Append-only audit trail written by one OS thread.
///
/// [`record`](Self::record) never blocks: when the bounded queue is full the
/// entry is dropped with a warning.
pub struct ActivityLog {
    path: PathBuf,
    sender: Mutex<Option<SyncSender<Entry>>>,
    done: Mutex<Option<oneshot::Receiver<()>>>,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl ActivityLog {
    /// Open (or create) the log file and start the writer thread.
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let (sender, receiver) = std_mpsc::sync_channel::<Entry>(capacity.max(1));
        let (done_tx, done_rx) = oneshot::channel();
        let thread = thread::Builder::new()
            .name("vault-activity-log".into())
            .spawn(move || {
                let mut out = LineWriter::new(file);
                for entry in receiver {
                    let line = format_line(&entry.at, &entry.action, &entry.details);
                    if let Err(e) = writeln!(out, "{line}") {
                        error!(error = %e, "activity log write failed");
                    }
                }
                let _ = out.flush();
                let _ = done_tx.send(());
            })?;

        Ok(Self {
            path,
            sender: Mutex::new(Some(sender)),
            done: Mutex::new(Some(done_rx)),
            thread: Mutex::new(Some(thread)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue an entry stamped with the current local time.
    pub fn record(&self, action: &str, details: impl Into<String>) {
        let guard = lock(&self.sender);
        let Some(sender) = guard.as_ref() else {
            return;
        };
        let entry = Entry {
            at: Local::now(),
            action: action.to_owned(),
            details: details.into(),
        };
        match sender.try_send(entry) {
            Ok(()) => {}
            Err(TrySendError::Full(entry)) => {
                warn!(action = %entry.action, "activity log queue full, entry dropped")
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!(action, "activity log writer stopped, entry dropped")
            }
        }
    }

    /// Close the queue and wait at most `timeout` for queued lines to land.
    ///
    /// Returns false when the writer did not finish in time.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        drop(lock(&self.sender).take());
        let Some(done) = lock(&self.done).take() else {
            return true;
        };
        match tokio::time::timeout(timeout, done).await {
            Ok(_) => {
                // The writer has flushed and is returning.
                if let Some(thread) = lock(&self.thread).take() {
                    let _ = thread.join();
                }
                true
            }
            Err(_) => {
                warn!("activity log did not drain in time");
                false
            }
        }
    }
}

impl Drop for ActivityLog {
    fn drop(&mut self) {
        drop(lock(&self.sender).take());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Execution Context
// ─────────────────────────────────────────────────────────────────────────────

/// Everything that runs in the background for one vault.
pub struct ExecutionContext {
    workers: WorkerPool,
    sweeper: Sweeper,
    activity: ActivityLog,
    shutdown_timeout: Duration,
}

impl ExecutionContext {
    /// Start workers, the sweeper and the activity log writer.
    pub fn start(config: &VaultConfig, tokens: TokenManager) -> Result<Self> {
        Ok(Self {
            workers: WorkerPool::new(config.worker_threads),
            sweeper: Sweeper::start(tokens, config.sweep_interval),
            activity: ActivityLog::open(
                config.activity_log_path(),
                config.activity_queue_capacity,
            )?,
            shutdown_timeout: config.shutdown_timeout,
        })
    }

    pub fn workers(&self) -> &WorkerPool {
        &self.workers
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    /// Stop the sweeper, then drain workers and the activity log.
    ///
    /// Each drain is bounded by the configured shutdown timeout.
    pub async fn shutdown(&self) -> bool {
        self.sweeper.stop();
        let workers = self.workers.shutdown(self.shutdown_timeout).await;
        let activity = self.activity.shutdown(self.shutdown_timeout).await;
        workers && activity
    }
}
