//! Non-blocking error reporter.
//!
//! # Data Flow
//! ```text
//! capture() ──try_send──▶ bounded queue ──▶ worker task ──▶ Transport
//!    │                                         │
//!    └── queue full: drop newest, count it     └── delivery failure: log, continue
//! ```
//!
//! # Design Decisions
//! - `capture` never awaits, so the response path and the panic hook never block
//! - Backpressure policy is drop-newest; drops are counted and logged
//! - `flush` and `close` travel through the same queue, so they observe every
//!   event queued before them

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::event::ErrorEvent;
use super::transport::Transport;

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

enum Command {
    Event(Box<ErrorEvent>),
    Flush(oneshot::Sender<()>),
    Close,
}

/// Settings stamped onto every captured event.
#[derive(Debug, Clone)]
pub struct ReporterOptions {
    pub queue_capacity: usize,
    pub environment: Option<String>,
    pub release: Option<String>,
    pub server_name: Option<String>,
}

impl Default for ReporterOptions {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            environment: None,
            release: Some(concat!(env!("CARGO_PKG_NAME"), "@", env!("CARGO_PKG_VERSION")).to_string()),
            server_name: None,
        }
    }
}

struct Inner {
    tx: mpsc::Sender<Command>,
    options: ReporterOptions,
    captured: AtomicU64,
    dropped: AtomicU64,
}

/// Cloneable handle for queueing error events.
#[derive(Clone)]
pub struct ErrorReporter {
    inner: Arc<Inner>,
}

/// Owns the background delivery task.
pub struct ReporterWorker {
    join: JoinHandle<u64>,
}

impl ErrorReporter {
    /// Start the delivery worker on the current Tokio runtime.
    pub fn spawn(transport: Arc<dyn Transport>, options: ReporterOptions) -> (Self, ReporterWorker) {
        let (tx, rx) = mpsc::channel(options.queue_capacity.max(1));
        let join = tokio::spawn(run_worker(transport, rx));
        let reporter = Self {
            inner: Arc::new(Inner {
                tx,
                options,
                captured: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        };
        (reporter, ReporterWorker { join })
    }

    /// Queue an event for delivery. Returns its id, or `None` if it was dropped.
    pub fn capture(&self, mut event: ErrorEvent) -> Option<Uuid> {
        let options = &self.inner.options;
        if event.environment.is_none() {
            event.environment = options.environment.clone();
        }
        if event.release.is_none() {
            event.release = options.release.clone();
        }
        if event.server_name.is_none() {
            event.server_name = options.server_name.clone();
        }

        let event_id = event.event_id;
        match self.inner.tx.try_send(Command::Event(Box::new(event))) {
            Ok(()) => {
                self.inner.captured.fetch_add(1, Ordering::Relaxed);
                Some(event_id)
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.inner.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    event_id = %event_id.simple(),
                    dropped_total = dropped,
                    "Error report queue full, dropping event"
                );
                None
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(event_id = %event_id.simple(), "Error reporter closed, dropping event");
                None
            }
        }
    }

    /// Wait until every event queued before this call has been handed to the transport.
    pub async fn flush(&self, timeout: Duration) -> bool {
        let (ack_tx, ack_rx) = oneshot::channel();
        let flushed = async {
            self.inner.tx.send(Command::Flush(ack_tx)).await.ok()?;
            ack_rx.await.ok()
        };
        matches!(tokio::time::timeout(timeout, flushed).await, Ok(Some(())))
    }

    /// Events accepted into the queue.
    pub fn captured(&self) -> u64 {
        self.inner.captured.load(Ordering::Relaxed)
    }

    /// Events dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorReporter")
            .field("captured", &self.captured())
            .field("dropped", &self.dropped())
            .finish()
    }
}

impl ReporterWorker {
    /// Deliver everything still queued, then stop the worker.
    /// Returns the number of events delivered over the worker's lifetime.
    pub async fn close(self, reporter: &ErrorReporter, timeout: Duration) -> Option<u64> {
        let drained = async {
            reporter.inner.tx.send(Command::Close).await.ok()?;
            self.join.await.ok()
        };
        match tokio::time::timeout(timeout, drained).await {
            Ok(delivered) => delivered,
            Err(_) => {
                tracing::warn!(timeout = ?timeout, "Error reporter did not drain before timeout");
                None
            }
        }
    }
}

async fn run_worker(transport: Arc<dyn Transport>, mut rx: mpsc::Receiver<Command>) -> u64 {
    let mut delivered = 0u64;
    while let Some(command) = rx.recv().await {
        match command {
            Command::Event(event) => match transport.send(&event).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        event_id = %event.event_id.simple(),
                        error = %e,
                        "Failed to deliver error report"
                    );
                }
            },
            Command::Flush(ack) => {
                let _ = ack.send(());
            }
            Command::Close => break,
        }
    }
    tracing::debug!(delivered, "Error reporter stopped");
    delivered
}
