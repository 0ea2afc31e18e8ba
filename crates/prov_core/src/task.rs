//! Asynchronous provisioning task with live progress and interactivity streams.
//!
//! A [`ProvisioningTask`] runs one operation on its own tokio task. The
//! operation publishes through a [`TaskContext`]; callers subscribe to the
//! streams and wait for the typed result.
//!
//! # Stream contract
//!
//! - Items are delivered to every subscriber strictly in publication order,
//!   without coalescing.
//! - A subscriber first receives everything published before it subscribed,
//!   then live items, so late subscribers miss nothing.
//! - Per-subscriber buffers are unbounded: the producer never waits on a
//!   consumer, and consumers may be dropped or never polled at all.
//! - Every stream ends exactly once, when the operation finishes, fails or
//!   panics, and before [`ProvisioningTask::wait`] resolves.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{ProvisionError, ProvisionResult};
use crate::progress::{Phase, ProgressReport};

struct FanOutState<T> {
    history: Vec<T>,
    subscribers: Vec<mpsc::UnboundedSender<T>>,
    closed: bool,
}

/// Single-producer fan-out with replay.
struct FanOut<T> {
    state: Mutex<FanOutState<T>>,
}

impl<T: Clone> FanOut<T> {
    fn new() -> Self {
        Self {
            state: Mutex::new(FanOutState {
                history: Vec::new(),
                subscribers: Vec::new(),
                closed: false,
            }),
        }
    }

    fn publish(&self, item: T) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.subscribers.retain(|tx| tx.send(item.clone()).is_ok());
        state.history.push(item);
    }

    fn subscribe(&self) -> TaskStream<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        for item in &state.history {
            // The receiver is still held here, so this cannot fail.
            let _ = tx.send(item.clone());
        }
        if !state.closed {
            state.subscribers.push(tx);
        }
        TaskStream { rx }
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.subscribers.clear();
    }

    fn snapshot(&self) -> Vec<T> {
        self.state.lock().history.clone()
    }
}

/// Subscription to one of a task's streams.
///
/// Implements [`Stream`]; [`TaskStream::recv`] is available without
/// importing stream extension traits.
pub struct TaskStream<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> TaskStream<T> {
    /// Receive the next item, or `None` once the task has terminated.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Drain the stream until it closes.
    pub async fn collect_all(mut self) -> Vec<T> {
        let mut items = Vec::new();
        while let Some(item) = self.rx.recv().await {
            items.push(item);
        }
        items
    }
}

impl<T> Stream for TaskStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}

/// Producer side handed to the operation.
#[derive(Clone)]
pub struct TaskContext {
    progress: Arc<FanOut<ProgressReport>>,
    interactive: Arc<FanOut<bool>>,
    cancel: CancellationToken,
}

impl TaskContext {
    /// Publish a progress report.
    pub fn report(&self, phase: Phase, message: impl Into<String>) {
        let report = ProgressReport::new(phase, message);
        debug!(phase = %phase, "{}", report.message);
        self.progress.publish(report);
    }

    /// Signal that the running process needs (`true`) or released (`false`)
    /// direct operator attention.
    pub fn set_interactive(&self, interactive: bool) {
        self.interactive.publish(interactive);
    }

    /// The token governing this task.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fail with [`ProvisionError::Cancelled`] if cancellation was requested.
    pub fn check_cancelled(&self) -> ProvisionResult<()> {
        if self.cancel.is_cancelled() {
            Err(ProvisionError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Closes both streams when the worker finishes or unwinds.
struct CloseOnDrop {
    progress: Arc<FanOut<ProgressReport>>,
    interactive: Arc<FanOut<bool>>,
}

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.progress.close();
        self.interactive.close();
    }
}

/// A running provisioning operation.
pub struct ProvisioningTask<T> {
    progress: Arc<FanOut<ProgressReport>>,
    interactive: Arc<FanOut<bool>>,
    result: oneshot::Receiver<ProvisionResult<T>>,
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl<T: Send + 'static> ProvisioningTask<T> {
    /// Spawn `operation` on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn spawn<F, Fut>(cancel: CancellationToken, operation: F) -> Self
    where
        F: FnOnce(TaskContext) -> Fut,
        Fut: Future<Output = ProvisionResult<T>> + Send + 'static,
    {
        let progress = Arc::new(FanOut::new());
        let interactive = Arc::new(FanOut::new());
        let ctx = TaskContext {
            progress: progress.clone(),
            interactive: interactive.clone(),
            cancel: cancel.clone(),
        };

        let guard = CloseOnDrop {
            progress: progress.clone(),
            interactive: interactive.clone(),
        };
        let (tx, rx) = oneshot::channel();
        let future = operation(ctx);

        let handle = tokio::spawn(async move {
            let result = future.await;
            drop(guard);
            // The caller may have dropped the task without waiting.
            let _ = tx.send(result);
        });

        Self {
            progress,
            interactive,
            result: rx,
            handle,
            cancel,
        }
    }

    /// Subscribe to progress reports.
    pub fn progress(&self) -> TaskStream<ProgressReport> {
        self.progress.subscribe()
    }

    /// Subscribe to interactivity changes.
    pub fn interactive(&self) -> TaskStream<bool> {
        self.interactive.subscribe()
    }

    /// Progress reports published so far.
    pub fn progress_history(&self) -> Vec<ProgressReport> {
        self.progress.snapshot()
    }

    /// Interactivity changes published so far.
    pub fn interactive_history(&self) -> Vec<bool> {
        self.interactive.snapshot()
    }

    /// Request cancellation of the operation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the operation to finish.
    pub async fn wait(self) -> ProvisionResult<T> {
        match self.result.await {
            Ok(result) => result,
            Err(_) => {
                let reason = match self.handle.await {
                    Err(e) if e.is_panic() => "worker panicked".to_string(),
                    Err(e) => e.to_string(),
                    Ok(()) => "worker exited without a result".to_string(),
                };
                warn!("Provisioning task aborted: {}", reason);
                Err(ProvisionError::TaskAborted(reason))
            }
        }
    }
}
