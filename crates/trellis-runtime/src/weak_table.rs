#![forbid(unsafe_code)]

//! Side table keyed by node identity that does not keep nodes alive.
//!
//! Slots hold a [`WeakNode`] next to the value. Node ids are never reused, so
//! a slot whose node died can only be reached again through pruning, which
//! runs lazily on insertion once the table has grown past a threshold.

use std::cell::{Cell, RefCell};

use ahash::AHashMap;
use trellis_core::{Node, NodeId, WeakNode};

const MIN_PRUNE_AT: usize = 32;

struct Slot<T> {
    node: WeakNode,
    value: T,
}

pub(crate) struct WeakTable<T> {
    slots: RefCell<AHashMap<NodeId, Slot<T>>>,
    prune_at: Cell<usize>,
}

impl<T> Default for WeakTable<T> {
    fn default() -> Self {
        Self {
            slots: RefCell::new(AHashMap::new()),
            prune_at: Cell::new(MIN_PRUNE_AT),
        }
    }
}

impl<T> WeakTable<T> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, node: &Node, value: T) -> Option<T> {
        self.prune();
        let slot = Slot {
            node: node.downgrade(),
            value,
        };
        self.slots
            .borrow_mut()
            .insert(node.id(), slot)
            .map(|old| old.value)
    }

    pub(crate) fn remove(&self, node: &Node) -> Option<T> {
        self.slots.borrow_mut().remove(&node.id()).map(|s| s.value)
    }

    pub(crate) fn contains(&self, node: &Node) -> bool {
        self.slots.borrow().contains_key(&node.id())
    }

    pub(crate) fn with<R>(&self, node: &Node, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.slots.borrow().get(&node.id()).map(|slot| f(&slot.value))
    }

    /// Number of slots whose node is still alive.
    pub(crate) fn live_len(&self) -> usize {
        self.slots
            .borrow()
            .values()
            .filter(|slot| slot.node.is_live())
            .count()
    }

    /// Drop slots of dead nodes once the table reaches the threshold. Values
    /// are dropped after the borrow is released.
    fn prune(&self) {
        let len = self.slots.borrow().len();
        if len < self.prune_at.get() {
            return;
        }
        let dead: Vec<Slot<T>> = {
            let mut slots = self.slots.borrow_mut();
            let ids: Vec<NodeId> = slots
                .iter()
                .filter(|(_, slot)| !slot.node.is_live())
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| slots.remove(id)).collect()
        };
        let remaining = len - dead.len();
        self.prune_at.set((remaining * 2).max(MIN_PRUNE_AT));
        drop(dead);
    }
}

impl<T: Clone> WeakTable<T> {
    pub(crate) fn get(&self, node: &Node) -> Option<T> {
        self.with(node, T::clone)
    }

    pub(crate) fn get_or_insert_with(&self, node: &Node, init: impl FnOnce() -> T) -> T {
        if let Some(value) = self.get(node) {
            return value;
        }
        let value = init();
        self.insert(node, value.clone());
        value
    }
}
