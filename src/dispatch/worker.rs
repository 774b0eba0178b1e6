use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use super::{Admission, Shared, WorkItem};
use crate::error::ProxyError;
use crate::operation_error;

enum Step<T> {
    Idle,
    Delay(Duration),
    Dispatch(WorkItem<T>),
    Stop,
}

/// The dispatch loop. Exactly one runs per queue.
pub(crate) async fn run<T: Send + 'static>(shared: Arc<Shared<T>>) {
    let mut dispatched = 0u64;
    loop {
        match next_step(&shared) {
            Step::Stop => break,
            Step::Idle => {
                shared.dispatching.store(false, Ordering::Release);
                tokio::select! {
                    _ = shared.wake.notified() => {}
                    _ = shared.stop.notified() => {}
                }
            }
            Step::Delay(wait) => {
                let pending = shared.pending().items.len();
                info!(
                    "Rate window saturated, delaying dispatch by {:?} ({} pending)",
                    wait, pending
                );
                if !pause(&shared, wait).await {
                    break;
                }
            }
            Step::Dispatch(item) => {
                dispatched += 1;
                dispatch(dispatched, item).await;
                if !pause(&shared, shared.settings.dispatch_delay).await {
                    break;
                }
            }
        }
    }
    fail_pending(&shared);
    shared.dispatching.store(false, Ordering::Release);
    info!("Dispatch loop exited after {} dispatches", dispatched);
}

/// Decide what the loop does next. The head is removed and its start recorded
/// under the same admission check, so the window never over-admits.
fn next_step<T>(shared: &Shared<T>) -> Step<T> {
    let mut pending = shared.pending();
    if pending.closed {
        return Step::Stop;
    }
    if pending.items.is_empty() {
        return Step::Idle;
    }
    shared.dispatching.store(true, Ordering::Release);

    let now = Instant::now();
    let mut window = shared.window();
    match window.admit(now) {
        Admission::Wait(wait) => Step::Delay(wait),
        Admission::Ready => match pending.items.pop_front() {
            Some(item) => {
                window.record(now);
                Step::Dispatch(item)
            }
            None => Step::Idle,
        },
    }
}

/// Sleep unless shutdown arrives first. Returns false on shutdown.
async fn pause<T>(shared: &Shared<T>, duration: Duration) -> bool {
    if duration.is_zero() {
        return true;
    }
    tokio::select! {
        _ = time::sleep(duration) => true,
        _ = shared.stop.notified() => false,
    }
}

/// Run one operation in its own task so a panic cannot escape into the loop,
/// then hand the outcome to the waiting caller.
async fn dispatch<T: Send + 'static>(seq: u64, item: WorkItem<T>) {
    let WorkItem {
        operation,
        resp_chan,
        enqueued_at,
    } = item;
    debug!(
        "Dispatching #{} after {:?} in queue",
        seq,
        enqueued_at.elapsed()
    );

    let outcome = match tokio::spawn(async move { operation().await }).await {
        Ok(outcome) => outcome,
        Err(join_err) => Err(operation_error!("operation #{} aborted: {}", seq, join_err)),
    };
    if let Err(err) = &outcome {
        if err.is_upstream_rate_limited() {
            warn!("Dispatch #{} was rate limited upstream: {}", seq, err);
        } else {
            warn!("Dispatch #{} failed: {}", seq, err);
        }
    }
    if resp_chan.send(outcome).is_err() {
        debug!("Caller for dispatch #{} went away before completion", seq);
    }
}

fn fail_pending<T>(shared: &Shared<T>) {
    let abandoned: Vec<WorkItem<T>> = shared.pending().items.drain(..).collect();
    if !abandoned.is_empty() {
        warn!(
            "Failing {} pending submissions on shutdown",
            abandoned.len()
        );
    }
    for item in abandoned {
        let _ = item.resp_chan.send(Err(ProxyError::DispatcherClosed));
    }
}
