//! A concurrency-bounded buffer of in-flight deliveries.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::{pin, Pin};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{oneshot, Notify};

use crate::CaptureError;

type Job = BoxFuture<'static, ()>;

#[derive(Default)]
struct State {
    running: usize,
    queued: VecDeque<Job>,
}

struct Inner {
    limit: Option<usize>,
    state: Mutex<State>,
    idle: Notify,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hands the next queued job to a worker whose job just settled, or
    /// retires the worker.
    fn next_job(&self) -> Option<Job> {
        let mut state = self.state();
        if let Some(job) = state.queued.pop_front() {
            return Some(job);
        }
        debug_assert_or_log!(
            state.running > 0,
            "[DeliveryBuffer] worker retired while none were running"
        );
        state.running = state.running.saturating_sub(1);
        if state.running == 0 {
            self.idle.notify_waiters();
        }
        None
    }
}

/// Tracks delivery tasks and bounds how many of them run at once.
///
/// Tasks added while the buffer is at its limit are queued and started in
/// the order they were added as soon as a running task settles.  Nothing is
/// ever rejected.
///
/// The buffer is a cheap handle; clones share the same state.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use sentry_pipeline::DeliveryBuffer;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let buffer = DeliveryBuffer::<u32>::new(Some(2));
/// let delivery = buffer.add(async { Ok(42) });
/// assert_eq!(buffer.len(), 1);
/// assert_eq!(delivery.await.unwrap(), 42);
/// assert!(buffer.drain(Some(Duration::from_secs(1))).await);
/// # }
/// ```
pub struct DeliveryBuffer<R> {
    inner: Arc<Inner>,
    _response: std::marker::PhantomData<fn() -> R>,
}

impl<R> Clone for DeliveryBuffer<R> {
    fn clone(&self) -> Self {
        DeliveryBuffer {
            inner: self.inner.clone(),
            _response: std::marker::PhantomData,
        }
    }
}

impl<R> fmt::Debug for DeliveryBuffer<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state();
        f.debug_struct("DeliveryBuffer")
            .field("limit", &self.inner.limit)
            .field("running", &state.running)
            .field("queued", &state.queued.len())
            .finish()
    }
}

impl<R: Send + 'static> Default for DeliveryBuffer<R> {
    fn default() -> Self {
        DeliveryBuffer::new(Some(crate::constants::DEFAULT_BUFFER_SIZE))
    }
}

impl<R: Send + 'static> DeliveryBuffer<R> {
    /// Creates a buffer that runs at most `limit` tasks at once.
    ///
    /// `None` removes the limit.  A limit of zero is treated as one.
    pub fn new(limit: Option<usize>) -> Self {
        DeliveryBuffer {
            inner: Arc::new(Inner {
                limit: limit.map(|limit| limit.max(1)),
                state: Mutex::new(State::default()),
                idle: Notify::new(),
            }),
            _response: std::marker::PhantomData,
        }
    }

    /// The concurrency limit of this buffer.
    pub fn limit(&self) -> Option<usize> {
        self.inner.limit
    }

    /// Admits a task into the buffer.
    ///
    /// Admission happens immediately: the task is either started on the
    /// current tokio runtime or queued behind the tasks already waiting.
    /// The returned [`Delivery`] resolves with the task's result.  Dropping
    /// it does not cancel the task.
    pub fn add<F>(&self, task: F) -> Delivery<R>
    where
        F: Future<Output = Result<R, CaptureError>> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let _ = sender.send(task.await);
        });

        let mut state = self.inner.state();
        if self.inner.limit.is_some_and(|limit| state.running >= limit) {
            state.queued.push_back(job);
            sentry_debug!(
                "[DeliveryBuffer] At capacity, queued delivery ({} waiting)",
                state.queued.len()
            );
        } else {
            state.running += 1;
            drop(state);
            self.spawn_worker(job);
        }

        Delivery { receiver }
    }

    fn spawn_worker(&self, first: Job) {
        let inner = self.inner.clone();
        let worker = async move {
            let mut job = first;
            loop {
                if AssertUnwindSafe(job).catch_unwind().await.is_err() {
                    sentry_debug!("[DeliveryBuffer] Delivery task panicked");
                }
                match inner.next_job() {
                    Some(next) => job = next,
                    None => break,
                }
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(worker);
            }
            Err(err) => {
                sentry_debug!("[DeliveryBuffer] Cannot start delivery: {}", err);
                // The job's sender is dropped with it, so its delivery
                // resolves as aborted; queued jobs are flushed the same way.
                drop(worker);
                let mut state = self.inner.state();
                let abandoned = std::mem::take(&mut state.queued);
                state.running = state.running.saturating_sub(1);
                let idle = state.running == 0;
                drop(state);
                drop(abandoned);
                if idle {
                    self.inner.idle.notify_waiters();
                }
            }
        }
    }

    /// The number of tracked tasks, running and queued.
    pub fn len(&self) -> usize {
        let state = self.inner.state();
        state.running + state.queued.len()
    }

    /// Whether no task is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of tasks currently running.
    pub fn running(&self) -> usize {
        self.inner.state().running
    }

    /// Waits until every tracked task has settled.
    ///
    /// Without a timeout this waits as long as it takes and returns `true`.
    /// With a timeout it returns whether the buffer emptied in time.  Tasks
    /// still running at the deadline are left alone.
    pub async fn drain(&self, timeout: Option<Duration>) -> bool {
        let idle = self.wait_idle();
        let drained = match timeout {
            None => {
                idle.await;
                true
            }
            Some(timeout) => tokio::time::timeout(timeout, idle).await.is_ok(),
        };
        sentry_debug!(
            "[DeliveryBuffer] Drain {}",
            if drained { "completed" } else { "timed out" }
        );
        drained
    }

    async fn wait_idle(&self) {
        loop {
            let mut notified = pin!(self.inner.idle.notified());
            notified.as_mut().enable();
            if self.is_empty() {
                return;
            }
            notified.await;
        }
    }
}

/// The pending result of a task added to a [`DeliveryBuffer`].
///
/// Resolves to [`CaptureError::Aborted`] if the task panicked or could not
/// be started.
#[must_use = "a delivery only reports the outcome, the task runs either way"]
pub struct Delivery<R> {
    receiver: oneshot::Receiver<Result<R, CaptureError>>,
}

impl<R> fmt::Debug for Delivery<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery").finish_non_exhaustive()
    }
}

impl<R> Future for Delivery<R> {
    type Output = Result<R, CaptureError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(CaptureError::Aborted)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Log = Arc<Mutex<Vec<usize>>>;

    fn gated(
        buffer: &DeliveryBuffer<usize>,
        id: usize,
        log: &Log,
    ) -> (oneshot::Sender<()>, Delivery<usize>) {
        let (open, gate) = oneshot::channel::<()>();
        let log = log.clone();
        let delivery = buffer.add(async move {
            log.lock().unwrap().push(id);
            let _ = gate.await;
            Ok(id)
        });
        (open, delivery)
    }

    #[tokio::test]
    async fn test_limit_is_respected() {
        let buffer = DeliveryBuffer::new(Some(2));
        let log = Arc::new(Mutex::new(vec![]));
        let gates: Vec<_> = (0..5).map(|id| gated(&buffer, id, &log)).collect();

        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.running(), 2);

        let mut results = vec![];
        for (open, delivery) in gates {
            assert!(buffer.running() <= 2);
            open.send(()).unwrap();
            results.push(delivery.await.unwrap());
        }
        assert_eq!(results, vec![0, 1, 2, 3, 4]);
        assert!(buffer.drain(None).await);
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn test_queued_tasks_start_in_admission_order() {
        let buffer = DeliveryBuffer::new(Some(1));
        let log = Arc::new(Mutex::new(vec![]));
        let deliveries: Vec<_> = (0..4)
            .map(|id| {
                let log = log.clone();
                buffer.add(async move {
                    log.lock().unwrap().push(id);
                    tokio::time::sleep(Duration::from_millis(5 * (4 - id as u64))).await;
                    Ok(id)
                })
            })
            .collect();

        for delivery in deliveries {
            delivery.await.unwrap();
        }
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_drain_empty_buffer_is_immediate() {
        let buffer = DeliveryBuffer::<()>::new(Some(1));
        assert!(buffer.drain(None).await);
        assert!(buffer.drain(Some(Duration::ZERO)).await);
    }

    #[tokio::test]
    async fn test_drain_times_out_without_cancelling() {
        let buffer = DeliveryBuffer::new(Some(1));
        let log = Arc::new(Mutex::new(vec![]));
        let (open, delivery) = gated(&buffer, 7, &log);

        assert!(!buffer.drain(Some(Duration::ZERO)).await);
        assert!(!buffer.drain(Some(Duration::from_millis(10))).await);
        assert_eq!(buffer.len(), 1);

        open.send(()).unwrap();
        assert_eq!(delivery.await.unwrap(), 7);
        assert!(buffer.drain(Some(Duration::from_secs(1))).await);
    }

    #[tokio::test]
    async fn test_failed_and_panicked_tasks_free_their_slot() {
        let buffer = DeliveryBuffer::<usize>::new(Some(1));
        let failed = buffer.add(async { Err(CaptureError::transport("connection reset")) });
        let panicked = buffer.add(async {
            if true {
                panic!("transport exploded");
            }
            Ok(0)
        });
        let ok = buffer.add(async { Ok(3) });

        assert!(matches!(failed.await, Err(CaptureError::Transport(_))));
        assert!(matches!(panicked.await, Err(CaptureError::Aborted)));
        assert_eq!(ok.await.unwrap(), 3);
        assert!(buffer.drain(Some(Duration::from_secs(1))).await);
        assert_eq!(buffer.running(), 0);
    }

    #[tokio::test]
    async fn test_dropped_delivery_still_runs() {
        let buffer = DeliveryBuffer::new(None);
        let log = Arc::new(Mutex::new(vec![]));
        let (open, delivery) = gated(&buffer, 1, &log);
        drop(delivery);
        open.send(()).unwrap();
        assert!(buffer.drain(None).await);
        assert_eq!(*log.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_add_outside_runtime_aborts() {
        let buffer = DeliveryBuffer::<()>::new(Some(1));
        let delivery = buffer.add(async { Ok(()) });
        assert!(buffer.is_empty());
        let result = futures::executor::block_on(delivery);
        assert!(matches!(result, Err(CaptureError::Aborted)));
    }

    #[test]
    fn test_zero_limit_is_one() {
        assert_eq!(DeliveryBuffer::<()>::new(Some(0)).limit(), Some(1));
        assert_eq!(DeliveryBuffer::<()>::new(None).limit(), None);
    }
}
