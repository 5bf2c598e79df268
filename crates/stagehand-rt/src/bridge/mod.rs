// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Bridge from foreign completion sources into continuations.
//!
//! Worker threads and callback-style APIs cannot touch the scheduler. They
//! get a `Completer`, which is `Send`, and push their result into a shared
//! completion queue. On the scheduler thread a pump drains that queue every
//! tick, stores each payload on its pending record, and reschedules the
//! waiting task on the pump's stage.

pub mod file;

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::future::Future;
use std::panic::Location;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use thiserror::Error;

use crate::cancel::CancelToken;
use crate::continuation::Continuation;
use crate::stage::Stage;
use crate::task::{spawn, TaskId};

/// Identifies one in-flight request within its bridge.
pub type RequestId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("failed to submit request: {0}")]
    Submit(String),
    #[error("request failed: {0}")]
    Failed(String),
    #[error("request was dropped without a result")]
    Dropped,
}

struct Completion<R> {
    id: RequestId,
    result: Result<R, BridgeError>,
}

/// Completions pushed from any thread, drained on the scheduler thread.
struct CompletionQueue<R> {
    queue: Mutex<VecDeque<Completion<R>>>,
}

impl<R> CompletionQueue<R> {
    fn lock(&self) -> MutexGuard<'_, VecDeque<Completion<R>>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, completion: Completion<R>) {
        self.lock().push_back(completion);
    }

    fn drain(&self) -> Vec<Completion<R>> {
        self.lock().drain(..).collect()
    }
}

/// The producer side of one request. Complete it exactly once, from any
/// thread. Dropping it unused delivers `BridgeError::Dropped`.
pub struct Completer<R> {
    id: RequestId,
    queue: Arc<CompletionQueue<R>>,
    sent: bool,
}

impl<R> fmt::Debug for Completer<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer").field("id", &self.id).finish()
    }
}

impl<R> Completer<R> {
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Deliver the outcome. An `Err` reaches the waiter as
    /// `BridgeError::Failed`.
    pub fn complete(mut self, result: Result<R, String>) {
        self.sent = true;
        self.queue.push(Completion {
            id: self.id,
            result: result.map_err(BridgeError::Failed),
        });
    }

    pub fn succeed(self, value: R) {
        self.complete(Ok(value));
    }

    pub fn fail(self, reason: impl Into<String>) {
        self.complete(Err(reason.into()));
    }
}

impl<R> Drop for Completer<R> {
    fn drop(&mut self) {
        if !self.sent {
            self.queue.push(Completion {
                id: self.id,
                result: Err(BridgeError::Dropped),
            });
        }
    }
}

enum Record<R> {
    Waiting(Continuation),
    Done(Result<R, BridgeError>),
}

struct BridgeInner<R> {
    name: String,
    pending: RefCell<HashMap<RequestId, Record<R>>>,
    /// Requests whose submit failed. Their completer may still report in.
    rejected: RefCell<HashSet<RequestId>>,
    completions: Arc<CompletionQueue<R>>,
    next_id: Cell<RequestId>,
}

/// Scheduler-side half of a completion source. Clones share state.
pub struct Bridge<R> {
    inner: Rc<BridgeInner<R>>,
}

impl<R> Clone for Bridge<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<R> fmt::Debug for Bridge<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("name", &self.inner.name)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl<R> Bridge<R> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(BridgeInner {
                name: name.into(),
                pending: RefCell::new(HashMap::new()),
                rejected: RefCell::new(HashSet::new()),
                completions: Arc::new(CompletionQueue {
                    queue: Mutex::new(VecDeque::new()),
                }),
                next_id: Cell::new(1),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Requests submitted and not yet collected by their waiter.
    pub fn in_flight(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    /// Start a request. On first poll the running task is parked on a new
    /// record and `submit` is called with that record's `Completer`. If
    /// `submit` fails, the request resolves at once to
    /// `BridgeError::Submit`.
    #[track_caller]
    pub fn request<S>(&self, submit: S) -> Request<'_, R, S>
    where
        S: FnOnce(Completer<R>) -> Result<(), String>,
    {
        Request {
            bridge: &self.inner,
            submit: Some(submit),
            id: None,
            at: Location::caller(),
        }
    }

    /// Drain the completion queue once, waking each waiting task on
    /// `stage`. Returns how many tasks were woken.
    pub fn pump(&self, stage: &Stage) -> usize {
        let mut woken = 0;
        for completion in self.inner.completions.drain() {
            let record = self.inner.pending.borrow_mut().remove(&completion.id);
            match record {
                Some(Record::Waiting(cont)) => {
                    if let Err(err) = &completion.result {
                        log::warn!(
                            "[{}] request {} completed with error: {}",
                            self.inner.name,
                            completion.id,
                            err
                        );
                    }
                    self.inner
                        .pending
                        .borrow_mut()
                        .insert(completion.id, Record::Done(completion.result));
                    stage.schedule(cont);
                    woken += 1;
                }
                Some(done @ Record::Done(_)) => {
                    log::warn!(
                        "[{}] request {} completed twice; keeping the first result",
                        self.inner.name,
                        completion.id
                    );
                    self.inner.pending.borrow_mut().insert(completion.id, done);
                }
                None if self.inner.rejected.borrow_mut().remove(&completion.id) => {
                    log::trace!(
                        "[{}] dropping completion of rejected request {}",
                        self.inner.name,
                        completion.id
                    );
                }
                None => {
                    log::warn!(
                        "[{}] discarding completion of abandoned request {}",
                        self.inner.name,
                        completion.id
                    );
                }
            }
        }
        woken
    }
}

impl<R: 'static> Bridge<R> {
    /// Spawn the pump: drain the queue on every tick of `stage` until `stop`
    /// is cancelled.
    #[track_caller]
    pub fn run_on(&self, stage: Rc<Stage>, stop: CancelToken) -> TaskId {
        let bridge = self.clone();
        spawn(async move {
            while !stop.is_cancelled() {
                bridge.pump(&stage);
                stage.next_tick().await;
            }
            log::debug!("[{}] pump stopped", bridge.name());
        })
    }
}

/// Future returned by [`Bridge::request`].
#[must_use = "futures do nothing unless awaited"]
pub struct Request<'a, R, S> {
    bridge: &'a BridgeInner<R>,
    submit: Option<S>,
    id: Option<RequestId>,
    at: &'static Location<'static>,
}

impl<R, S> Unpin for Request<'_, R, S> {}

impl<R, S> Future for Request<'_, R, S>
where
    S: FnOnce(Completer<R>) -> Result<(), String>,
{
    type Output = Result<R, BridgeError>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let bridge = self.bridge;
        if let Some(submit) = self.submit.take() {
            let id = bridge.next_id.get();
            bridge.next_id.set(id + 1);
            bridge
                .pending
                .borrow_mut()
                .insert(id, Record::Waiting(Continuation::capture(self.at)));

            let completer = Completer {
                id,
                queue: Arc::clone(&bridge.completions),
                sent: false,
            };
            if let Err(reason) = submit(completer) {
                log::error!(
                    "[{}] request {} at {} could not be submitted: {}",
                    bridge.name,
                    id,
                    self.at,
                    reason
                );
                bridge.pending.borrow_mut().remove(&id);
                bridge.rejected.borrow_mut().insert(id);
                return Poll::Ready(Err(BridgeError::Submit(reason)));
            }
            self.id = Some(id);
            return Poll::Pending;
        }

        let Some(id) = self.id else {
            panic!("bridge request at {} polled after it resolved", self.at);
        };
        let record = bridge.pending.borrow_mut().remove(&id);
        match record {
            Some(Record::Done(result)) => {
                self.id = None;
                Poll::Ready(result)
            }
            Some(waiting) => {
                bridge.pending.borrow_mut().insert(id, waiting);
                Poll::Pending
            }
            None => {
                self.id = None;
                Poll::Ready(Err(BridgeError::Dropped))
            }
        }
    }
}

impl<R, S> Drop for Request<'_, R, S> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            let record = self.bridge.pending.borrow_mut().remove(&id);
            drop(record);
        }
    }
}
