#![forbid(unsafe_code)]

//! Microtask queue.
//!
//! The single deferred-work primitive of the host: tasks queued here run at
//! the next [`MicrotaskQueue::checkpoint`], in FIFO order. Tasks queued while a
//! checkpoint is draining run in that same checkpoint.
//!
//! # Failure Modes
//!
//! - A failing task stops the checkpoint and its error is returned; tasks
//!   queued after it stay queued for the next checkpoint.

use std::cell::RefCell;
use std::collections::VecDeque;

use crate::error::Result;

pub type Microtask = Box<dyn FnOnce() -> Result<()>>;

#[derive(Default)]
pub struct MicrotaskQueue {
    tasks: RefCell<VecDeque<Microtask>>,
}

impl std::fmt::Debug for MicrotaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MicrotaskQueue")
            .field("pending", &self.len())
            .finish()
    }
}

impl MicrotaskQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, task: impl FnOnce() -> Result<()> + 'static) {
        self.tasks.borrow_mut().push_back(Box::new(task));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// Run queued tasks until the queue is empty. Returns how many ran.
    pub fn checkpoint(&self) -> Result<usize> {
        let mut ran = 0;
        loop {
            let task = self.tasks.borrow_mut().pop_front();
            let Some(task) = task else {
                return Ok(ran);
            };
            ran += 1;
            task()?;
        }
    }
}
