//! Pending task queue shared by the dispatcher's workers
//!
//! Workers are both producers (discovered links) and consumers. The queue
//! tracks how many popped tasks are still being processed so that an empty
//! queue can be told apart from a finished crawl: a worker that finds the
//! queue empty waits while any other worker might still push new tasks.

use crate::crawler::frontier::CrawlTask;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<CrawlTask>,
    in_flight: usize,
    closed: bool,
}

/// Multi-producer, multi-consumer task queue with in-flight tracking
#[derive(Debug, Default)]
pub struct TaskQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a task and wakes waiting workers
    ///
    /// Tasks pushed after [`close`](Self::close) are dropped.
    pub fn push(&self, task: CrawlTask) {
        {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.pending.push_back(task);
        }
        self.notify.notify_waiters();
    }

    /// Takes the next task, waiting while other workers are still busy
    ///
    /// Returns `None` once the queue is empty and no task is in flight, or
    /// after the queue has been closed. Every task returned must be handed
    /// back through [`complete`](Self::complete).
    pub async fn pop(&self) -> Option<CrawlTask> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register interest before checking state so a push or complete
            // between the check and the await is not missed.
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.closed {
                    return None;
                }
                if let Some(task) = state.pending.pop_front() {
                    state.in_flight += 1;
                    return Some(task);
                }
                if state.in_flight == 0 {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Marks a popped task as finished
    ///
    /// When this drains the last in-flight task of an empty queue, every
    /// waiting worker wakes up and observes the end of the crawl.
    pub fn complete(&self) {
        let idle = {
            let mut state = self.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            state.in_flight == 0 && state.pending.is_empty()
        };

        if idle {
            self.notify.notify_waiters();
        }
    }

    /// Stops the queue: pending tasks are dropped and every `pop` returns `None`
    pub fn close(&self) {
        {
            let mut state = self.lock();
            state.closed = true;
            state.pending.clear();
        }
        self.notify.notify_waiters();
    }

    /// Number of tasks waiting to be popped
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of popped tasks not yet completed
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
