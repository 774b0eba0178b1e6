//! Rate-limited dispatch queue
//!
//! Work submitted here is released to the upstream API in strict FIFO order,
//! never more than `max_per_window` starts in any trailing window, with a fixed
//! pause after each dispatch. A single worker task owns the dispatch loop.
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, Notify};
use tokio::time::Instant;
use tracing::{info, warn};

pub mod window;
mod worker;

use crate::error::{ProxyError, Result};
use crate::settings::DispatchSettings;
pub use window::{Admission, RequestWindow};

pub(crate) type BoxOperation<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// One queued unit of deferred work with a single eventual outcome
pub(crate) struct WorkItem<T> {
    pub operation: Box<dyn FnOnce() -> BoxOperation<T> + Send>,
    pub resp_chan: oneshot::Sender<Result<T>>,
    pub enqueued_at: Instant,
}

pub(crate) struct PendingQueue<T> {
    pub items: VecDeque<WorkItem<T>>,
    pub closed: bool,
}

pub(crate) struct Shared<T> {
    pub settings: DispatchSettings,
    pub pending: Mutex<PendingQueue<T>>,
    pub window: Mutex<RequestWindow>,
    pub dispatching: AtomicBool,
    /// Signalled on every append
    pub wake: Notify,
    /// Signalled once, by `close`
    pub stop: Notify,
}

impl<T> Shared<T> {
    // Nothing panics while these locks are held; recover rather than kill the loop.
    pub fn pending(&self) -> MutexGuard<'_, PendingQueue<T>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn window(&self) -> MutexGuard<'_, RequestWindow> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark the queue closed and wake the loop so it can fail what is left.
    /// Idempotent.
    pub fn close(&self) {
        let mut pending = self.pending();
        if pending.closed {
            return;
        }
        pending.closed = true;
        drop(pending);
        info!("Dispatch queue shutting down");
        self.stop.notify_one();
    }
}

/// Owned by the handles only, never by the worker, so dropping the last
/// handle stops the loop.
struct QueueHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Drop for QueueHandle<T> {
    fn drop(&mut self) {
        self.shared.close();
    }
}

/// Snapshot of queue and window usage, serialized verbatim by `/queue-status`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    #[serde(rename = "queueLength")]
    pub queue_length: usize,
    #[serde(rename = "recentRequests")]
    pub recent_dispatch_count: usize,
    #[serde(rename = "maxPerMinute")]
    pub max_per_window: usize,
    #[serde(rename = "processing")]
    pub is_dispatching: bool,
}

/// Handle to a queue of rate-limited upstream calls.
///
/// Cloning is cheap; every clone feeds the same pending queue and the same
/// dispatch loop. Dropping the last clone has the same effect as `shutdown`.
pub struct DispatchQueue<T> {
    handle: Arc<QueueHandle<T>>,
}

impl<T> Clone for DispatchQueue<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
        }
    }
}

impl<T> std::fmt::Debug for DispatchQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchQueue")
            .field("settings", &self.shared().settings)
            .field("is_dispatching", &self.is_dispatching())
            .finish()
    }
}

impl<T: Send + 'static> DispatchQueue<T> {
    /// Build the queue and spawn its dispatch loop on the current runtime
    pub fn start(settings: DispatchSettings) -> Self {
        let shared = Arc::new(Shared {
            window: Mutex::new(RequestWindow::new(&settings)),
            pending: Mutex::new(PendingQueue {
                items: VecDeque::new(),
                closed: false,
            }),
            dispatching: AtomicBool::new(false),
            wake: Notify::new(),
            stop: Notify::new(),
            settings,
        });
        info!(
            "Starting dispatch loop: {} per {:?}, safety margin {:?}, dispatch delay {:?}",
            shared.settings.max_per_window,
            shared.settings.window,
            shared.settings.safety_margin,
            shared.settings.dispatch_delay
        );
        tokio::spawn(worker::run(shared.clone()));
        Self {
            handle: Arc::new(QueueHandle { shared }),
        }
    }

    /// Append `operation` to the pending queue.
    ///
    /// The item is queued as soon as this returns; awaiting the returned
    /// `Submission` yields the operation's own outcome, exactly once.
    /// Failures are never retried.
    pub fn submit<F, Fut>(&self, operation: F) -> Submission<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (resp_chan, resp_rx) = oneshot::channel();
        let item = WorkItem {
            operation: Box::new(move || Box::pin(operation()) as BoxOperation<T>),
            resp_chan,
            enqueued_at: Instant::now(),
        };
        let shared = self.shared();
        {
            let mut pending = shared.pending();
            if pending.closed {
                return Submission::rejected(ProxyError::DispatcherClosed);
            }
            let bound = shared.settings.max_pending;
            if bound > 0 && pending.items.len() >= bound {
                warn!("Dispatch queue full, rejecting submission ({} pending)", bound);
                return Submission::rejected(ProxyError::QueueFull(bound));
            }
            pending.items.push_back(item);
        }
        shared.wake.notify_one();
        Submission {
            state: SubmissionState::Queued(resp_rx),
        }
    }
}

impl<T> DispatchQueue<T> {
    fn shared(&self) -> &Shared<T> {
        &self.handle.shared
    }

    pub fn status(&self) -> QueueStatus {
        let shared = self.shared();
        let queue_length = shared.pending().items.len();
        let recent_dispatch_count = shared.window().recent_count(Instant::now());
        QueueStatus {
            queue_length,
            recent_dispatch_count,
            max_per_window: shared.settings.max_per_window,
            is_dispatching: self.is_dispatching(),
        }
    }

    pub fn is_dispatching(&self) -> bool {
        self.shared().dispatching.load(Ordering::Acquire)
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.shared().settings
    }

    /// Stop the dispatch loop.
    ///
    /// An operation already running is allowed to finish; everything still
    /// pending resolves to `DispatcherClosed`, as does any later submission.
    pub fn shutdown(&self) {
        self.shared().close();
    }
}

enum SubmissionState<T> {
    Queued(oneshot::Receiver<Result<T>>),
    Rejected(Option<ProxyError>),
}

/// Pending outcome of a submitted operation
#[must_use = "a submission does nothing to its caller unless awaited"]
pub struct Submission<T> {
    state: SubmissionState<T>,
}

impl<T> Unpin for Submission<T> {}

impl<T> Submission<T> {
    fn rejected(err: ProxyError) -> Self {
        Self {
            state: SubmissionState::Rejected(Some(err)),
        }
    }
}

impl<T> Future for Submission<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            // a dropped sender means the loop went away without answering
            SubmissionState::Queued(resp_rx) => Pin::new(resp_rx)
                .poll(cx)
                .map(|outcome| outcome.unwrap_or(Err(ProxyError::DispatcherClosed))),
            SubmissionState::Rejected(err) => {
                Poll::Ready(Err(err.take().unwrap_or(ProxyError::DispatcherClosed)))
            }
        }
    }
}
