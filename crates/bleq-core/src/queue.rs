// ── Serialized radio queue ──
//
// The radio can only process one low-level command at a time. Every
// operation is funnelled through a single worker task that runs the
// exclusive phase of each operation in FIFO order. Results are pushed
// through per-operation channels, so long-running operations (scans)
// keep streaming after they hand the radio back.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_util::future::BoxFuture;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::{CoreError, ScanError};

/// Future returned by [`RadioOperation::run`]. Resolving it releases the radio.
pub type OperationFuture = BoxFuture<'static, Result<(), ScanError>>;

/// A unit of cancellable radio work.
///
/// `run` performs the exclusive part of the operation: the queue holds the
/// radio until the returned future resolves. Items may keep flowing through
/// the emitter after that point. The operation's result stream ends once
/// every clone of the emitter has been dropped.
///
/// `stop` must be idempotent and callable from any thread.
pub trait RadioOperation: Send + Sync + 'static {
    type Item: Send + 'static;

    fn name(&self) -> &'static str;

    fn run(&self, emitter: Emitter<Self::Item>) -> OperationFuture;

    fn stop(&self);
}

// ── Emitter ──────────────────────────────────────────────────────

/// Sending half of an operation's result stream.
///
/// Unbounded: platform callbacks must never block on a slow observer.
pub struct Emitter<T> {
    tx: mpsc::UnboundedSender<Result<T, ScanError>>,
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl<T> Emitter<T> {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Result<T, ScanError>>) -> Self {
        Self { tx }
    }

    /// Deliver an item. Returns `false` once the observer is gone.
    pub fn next(&self, item: T) -> bool {
        self.tx.send(Ok(item)).is_ok()
    }

    /// Deliver a terminal failure.
    pub fn fail(&self, err: ScanError) -> bool {
        self.tx.send(Err(err)).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ── Queue slots ──────────────────────────────────────────────────

/// Type-erased operation waiting in (or running on) the queue.
trait QueuedOperation: Send + Sync {
    fn name(&self) -> &'static str;
    fn start(&self) -> OperationFuture;
    fn stop(&self);
}

struct Slot<O: RadioOperation> {
    op: Arc<O>,
    /// Handed to the operation on start; afterwards only the operation
    /// decides when its stream ends.
    emitter: StdMutex<Option<Emitter<O::Item>>>,
}

impl<O: RadioOperation> QueuedOperation for Slot<O> {
    fn name(&self) -> &'static str {
        self.op.name()
    }

    fn start(&self) -> OperationFuture {
        let emitter = self
            .emitter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match emitter {
            Some(emitter) => self.op.run(emitter),
            None => Box::pin(async { Err(ScanError::cannot_start("operation already started")) }),
        }
    }

    fn stop(&self) {
        self.op.stop();
    }
}

struct QueueEntry {
    id: u64,
    cancel: CancellationToken,
    slot: Box<dyn QueuedOperation>,
    /// Kept alive only until the radio phase ends so a failed `run` can
    /// still report its error.
    reporter: Box<dyn Fn(ScanError) + Send + Sync>,
}

// ── RadioQueue ───────────────────────────────────────────────────

/// Single-channel FIFO executor for radio operations.
pub struct RadioQueue {
    tx: mpsc::UnboundedSender<QueueEntry>,
    shutdown: CancellationToken,
    next_id: AtomicU64,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RadioQueue {
    /// Spawn the queue worker on the current tokio runtime.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let worker = tokio::spawn(queue_worker(rx, shutdown.clone()));

        Self {
            tx,
            shutdown,
            next_id: AtomicU64::new(1),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Wrap `op` in a lazy result stream.
    ///
    /// Nothing is enqueued until the stream is first polled. Dropping the
    /// stream cancels the operation: it is skipped if still queued, or
    /// stopped on the worker if it already ran.
    pub fn submit<O: RadioOperation>(&self, op: Arc<O>) -> OperationStream<O::Item> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = self.shutdown.child_token();

        let reporter_tx = tx.clone();
        let entry = QueueEntry {
            id,
            cancel: cancel.clone(),
            slot: Box::new(Slot {
                op,
                emitter: StdMutex::new(Some(Emitter::new(tx))),
            }),
            reporter: Box::new(move |err| {
                let _ = reporter_tx.send(Err(err));
            }),
        };

        OperationStream {
            pending: Some((entry, self.tx.clone())),
            rx,
            cancel,
            submitted: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stop the worker. Queued operations are rejected, released ones are
    /// stopped, and later submissions fail with `CannotStart`.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        if let Some(handle) = self.worker.lock().await.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "radio queue worker ended abnormally");
            }
        }
        debug!("radio queue shut down");
    }
}

impl Drop for RadioQueue {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// ── OperationStream ──────────────────────────────────────────────

/// Lazy result stream of one queued operation.
pub struct OperationStream<T> {
    pending: Option<(QueueEntry, mpsc::UnboundedSender<QueueEntry>)>,
    rx: mpsc::UnboundedReceiver<Result<T, ScanError>>,
    cancel: CancellationToken,
    submitted: bool,
}

impl<T> Stream for OperationStream<T> {
    type Item = Result<T, ScanError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some((entry, queue)) = this.pending.take() {
            let id = entry.id;
            let name = entry.slot.name();
            if let Err(mpsc::error::SendError(rejected)) = queue.send(entry) {
                warn!(op = name, id, "radio queue closed, rejecting operation");
                (rejected.reporter)(ScanError::from(CoreError::QueueClosed));
            } else {
                trace!(op = name, id, "operation enqueued");
            }
            this.submitted = true;
        }

        this.rx.poll_recv(cx)
    }
}

impl<T> Drop for OperationStream<T> {
    fn drop(&mut self) {
        // Never-polled streams never reached the queue; nothing to stop.
        if self.submitted {
            self.cancel.cancel();
        }
    }
}

// ── Worker ───────────────────────────────────────────────────────

async fn queue_worker(mut rx: mpsc::UnboundedReceiver<QueueEntry>, shutdown: CancellationToken) {
    loop {
        let entry = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            entry = rx.recv() => {
                let Some(entry) = entry else { break };
                entry
            }
        };
        run_entry(entry).await;
    }

    rx.close();
    while let Ok(entry) = rx.try_recv() {
        debug!(op = entry.slot.name(), id = entry.id, "rejecting queued operation on shutdown");
        (entry.reporter)(ScanError::from(CoreError::QueueClosed));
    }
}

async fn run_entry(entry: QueueEntry) {
    let QueueEntry {
        id,
        cancel,
        slot,
        reporter,
    } = entry;
    let name = slot.name();

    if cancel.is_cancelled() {
        debug!(op = name, id, "operation cancelled while queued");
        slot.stop();
        return;
    }

    debug!(op = name, id, "operation admitted");
    let outcome = tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        result = slot.start() => Some(result),
    };

    match outcome {
        None => {
            debug!(op = name, id, "operation cancelled while holding the radio");
            slot.stop();
        }
        Some(Err(err)) => {
            warn!(op = name, id, error = %err, "operation failed");
            reporter(err);
        }
        Some(Ok(())) => {
            debug!(op = name, id, "radio released");
            drop(reporter);
            // The operation may keep emitting; forward a later cancellation
            // from the observer (or queue shutdown) to `stop` off the caller's
            // thread.
            let slot: Arc<dyn QueuedOperation> = Arc::from(slot);
            tokio::spawn(async move {
                cancel.cancelled().await;
                trace!(op = slot.name(), id, "forwarding cancellation");
                slot.stop();
            });
        }
    }
}
