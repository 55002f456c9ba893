#![forbid(unsafe_code)]

//! Update reconciler for redefined components.
//!
//! When a development-mode redefinition swaps a class's accessors, the class
//! is queued here together with the descriptor map it replaced. The first
//! enqueue of a batch schedules one microtask; when it runs, the whole queue
//! is taken and every live instance of every queued class is brought up to
//! date, in shadow-including tree order:
//!
//! 1. run the instance's disposers,
//! 2. for each current key, invalidate the cached value unless the previous
//!    map declared the key as a plain value identical to the live one,
//! 3. run the connect factories again,
//! 4. fire an invalidation notification.
//!
//! The check in step 2 compares the live value with the raw value the previous
//! map held under the same key. A key still holding exactly that value keeps
//! its cache entry; getters, descriptors and values that drifted from the old
//! declaration are recomputed on the next read.
//!
//! # Failure Modes
//!
//! - An error from any step stops the batch; instances not yet visited keep
//!   their previous connections. The queue was already taken, so the failed
//!   batch is not retried.
//! - The instance being reconciled when the error occurs stays where the
//!   failing step left it. A failed read or invalidation comes after its
//!   disposers ran and before attach, so it stays connected with no active
//!   connections (`is_attached` is false) until it is removed and inserted
//!   again. Keys already invalidated stay invalidated.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::debug;
use trellis_core::{Document, Node, Result, WeakDocument};
use web_time::Instant;

use crate::component::ComponentClass;
use crate::descriptor::{DescriptorMap, Entry};
use crate::notify;

struct Pending {
    class: Rc<ComponentClass>,
    previous: DescriptorMap,
}

pub(crate) struct UpdateReconciler {
    document: WeakDocument,
    queue: RefCell<IndexMap<Rc<str>, Pending>>,
    batches: Cell<u64>,
}

impl UpdateReconciler {
    pub(crate) fn new(document: &Document) -> Rc<Self> {
        Rc::new(Self {
            document: document.downgrade(),
            queue: RefCell::new(IndexMap::new()),
            batches: Cell::new(0),
        })
    }

    /// Queue `class` for reconciliation against `previous`. A class queued
    /// twice in one batch keeps its position and the latest `previous`.
    pub(crate) fn enqueue(self: &Rc<Self>, class: &Rc<ComponentClass>, previous: DescriptorMap) {
        let schedule = {
            let mut queue = self.queue.borrow_mut();
            let was_empty = queue.is_empty();
            queue.insert(
                Rc::from(class.name()),
                Pending {
                    class: Rc::clone(class),
                    previous,
                },
            );
            was_empty
        };
        if !schedule {
            return;
        }
        let Some(document) = self.document.upgrade() else {
            return;
        };
        let weak: Weak<Self> = Rc::downgrade(self);
        document.queue_microtask(move || match weak.upgrade() {
            Some(reconciler) => reconciler.flush(),
            None => Ok(()),
        });
    }

    pub(crate) fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Completed batches.
    pub(crate) fn batches(&self) -> u64 {
        self.batches.get()
    }

    pub(crate) fn flush(&self) -> Result<()> {
        let batch = std::mem::take(&mut *self.queue.borrow_mut());
        if batch.is_empty() {
            return Ok(());
        }
        let Some(document) = self.document.upgrade() else {
            return Ok(());
        };
        let started = Instant::now();
        let mut instances = 0usize;

        document.root().walk_in_shadow(|node| {
            let Some(definition) = node.definition() else {
                return Ok(());
            };
            let Some(pending) = batch.get(definition.name()) else {
                return Ok(());
            };
            if !std::ptr::addr_eq(Rc::as_ptr(&definition), Rc::as_ptr(&pending.class)) {
                return Ok(());
            }
            instances += 1;
            reconcile(&pending.class, &pending.previous, node)
        })?;

        self.batches.set(self.batches.get() + 1);
        debug!(
            classes = batch.len(),
            instances,
            elapsed_us = started.elapsed().as_micros() as u64,
            "reconciled redefined components"
        );
        Ok(())
    }
}

fn reconcile(class: &ComponentClass, previous: &DescriptorMap, node: &Node) -> Result<()> {
    class.detach(node)?;
    let current = class.descriptors();
    for key in current.keys() {
        let live = class.get(node, key)?;
        let unchanged = previous
            .get(key)
            .and_then(Entry::as_value)
            .is_some_and(|old| old.same(&live));
        class.cache().invalidate(node, key, unchanged)?;
    }
    class.attach(node)?;
    notify::dispatch_invalidate(node);
    Ok(())
}
