#![forbid(unsafe_code)]

//! Per-instance, per-key value cache with dependency tracking.
//!
//! Every `(host, key)` pair owns one entry holding the last value, a `state`
//! counter bumped whenever the stored value changes, and the set of entries
//! read while it was last computed. Reads made from inside a getter register
//! the read entry as a dependency of the entry being computed, across hosts as
//! well as within one.
//!
//! # Invariants
//!
//! 1. A valid entry is returned without calling its getter.
//! 2. When an entry changes (a write that produces a different value, or an
//!    explicit invalidation) every entry that transitively depends on it
//!    becomes invalid. An invalid entry never has valid dependents.
//! 3. A recompute that yields a value identical to the previous one (see
//!    [`Value::same`]) leaves `state` unchanged.
//! 4. Dependency edges are rebuilt on every recompute; edges from the previous
//!    computation are removed first.
//! 5. Entries do not keep hosts alive; the per-host entry map lives in a
//!    weak side table.
//!
//! # Failure Modes
//!
//! - Reading an entry while it is being computed fails with
//!   [`Error::CircularGet`], including indirect cycles through other entries.
//! - Writing or invalidating while any getter is running fails with
//!   [`Error::SetDuringGet`] / [`Error::InvalidateDuringGet`].
//! - A getter error leaves the entry invalid; the next read calls the getter
//!   again.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use smallvec::SmallVec;
use tracing::trace;
use trellis_core::{Error, Node, Result, Value};

use crate::descriptor::{Getter, Setter};
use crate::weak_table::WeakTable;

type EntryRef = Rc<RefCell<CacheEntry>>;
type EntryMap = Rc<RefCell<AHashMap<Rc<str>, EntryRef>>>;

struct CacheEntry {
    key: Rc<str>,
    value: Value,
    state: u64,
    version: u64,
    valid: bool,
    computing: bool,
    deps: SmallVec<[EntryRef; 4]>,
    dependents: SmallVec<[Weak<RefCell<CacheEntry>>; 4]>,
}

impl CacheEntry {
    fn new(key: Rc<str>) -> Self {
        Self {
            key,
            value: Value::Unset,
            state: 0,
            version: 0,
            valid: false,
            computing: false,
            deps: SmallVec::new(),
            dependents: SmallVec::new(),
        }
    }
}

/// Snapshot of one entry, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryInfo {
    pub value: Value,
    /// Number of times the stored value changed.
    pub state: u64,
    /// Number of completed getter runs.
    pub version: u64,
    pub dirty: bool,
    pub dependencies: usize,
}

#[derive(Default)]
pub struct InstanceCache {
    table: WeakTable<EntryMap>,
    context: RefCell<Option<EntryRef>>,
}

impl std::fmt::Debug for InstanceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceCache")
            .field("hosts", &self.table.live_len())
            .field("computing", &self.context.borrow().is_some())
            .finish()
    }
}

impl InstanceCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value of `key` on `host`, calling
    /// `getter(host, last_value)` when the entry is invalid.
    pub fn get(&self, host: &Node, key: &str, getter: &Getter) -> Result<Value> {
        let entry = self.entry(host, key);
        if entry.borrow().computing {
            return Err(Error::CircularGet {
                key: key.to_owned(),
            });
        }
        if let Some(context) = self.context.borrow().as_ref() {
            link(context, &entry);
        }
        {
            let e = entry.borrow();
            if e.valid {
                return Ok(e.value.clone());
            }
        }
        self.recompute(host, &entry, getter)
    }

    /// Pass `value` through `setter(host, current, value)` and store the
    /// result. When it differs from the current value, dependents are
    /// invalidated and `on_change` runs once.
    pub fn set(
        &self,
        host: &Node,
        key: &str,
        setter: &Setter,
        value: Value,
        on_change: impl FnOnce(),
    ) -> Result<()> {
        if self.context.borrow().is_some() {
            return Err(Error::SetDuringGet {
                key: key.to_owned(),
                element: host.label(),
            });
        }
        let entry = self.entry(host, key);
        let current = entry.borrow().value.clone();
        let next = setter(host, &current, value)?;
        if next.same(&current) {
            return Ok(());
        }
        {
            let mut e = entry.borrow_mut();
            e.value = next;
            e.state += 1;
        }
        mark_stale(&entry);
        on_change();
        Ok(())
    }

    /// Drop the validity of `key` on `host` (the stored value is kept as the
    /// getter's `last_value`). With `skip` only the get-context check runs.
    pub fn invalidate(&self, host: &Node, key: &str, skip: bool) -> Result<()> {
        if self.context.borrow().is_some() {
            return Err(Error::InvalidateDuringGet {
                key: key.to_owned(),
                element: host.label(),
            });
        }
        if skip {
            return Ok(());
        }
        if let Some(entry) = self.lookup(host, key) {
            mark_stale(&entry);
        }
        Ok(())
    }

    /// Whether the next read of `key` on `host` calls its getter.
    #[must_use]
    pub fn is_dirty(&self, host: &Node, key: &str) -> bool {
        self.lookup(host, key).is_none_or(|e| !e.borrow().valid)
    }

    /// Completed getter runs for `key` on `host`.
    #[must_use]
    pub fn version(&self, host: &Node, key: &str) -> u64 {
        self.lookup(host, key).map_or(0, |e| e.borrow().version)
    }

    #[must_use]
    pub fn info(&self, host: &Node, key: &str) -> Option<EntryInfo> {
        self.lookup(host, key).map(|entry| {
            let e = entry.borrow();
            EntryInfo {
                value: e.value.clone(),
                state: e.state,
                version: e.version,
                dirty: !e.valid,
                dependencies: e.deps.len(),
            }
        })
    }

    /// Whether a getter is currently running.
    #[must_use]
    pub fn in_get(&self) -> bool {
        self.context.borrow().is_some()
    }

    fn lookup(&self, host: &Node, key: &str) -> Option<EntryRef> {
        self.table
            .get(host)
            .and_then(|entries| entries.borrow().get(key).cloned())
    }

    fn entry(&self, host: &Node, key: &str) -> EntryRef {
        let entries = self
            .table
            .get_or_insert_with(host, || Rc::new(RefCell::new(AHashMap::new())));
        let mut entries = entries.borrow_mut();
        if let Some(entry) = entries.get(key) {
            return Rc::clone(entry);
        }
        let key: Rc<str> = Rc::from(key);
        let entry = Rc::new(RefCell::new(CacheEntry::new(Rc::clone(&key))));
        entries.insert(key, Rc::clone(&entry));
        entry
    }

    fn recompute(&self, host: &Node, entry: &EntryRef, getter: &Getter) -> Result<Value> {
        let last = {
            let mut e = entry.borrow_mut();
            e.computing = true;
            let old: SmallVec<[EntryRef; 4]> = e.deps.drain(..).collect();
            drop(e);
            for dep in &old {
                unlink(dep, entry);
            }
            entry.borrow().value.clone()
        };

        let previous = self.context.replace(Some(Rc::clone(entry)));
        let result = getter(host, &last);
        *self.context.borrow_mut() = previous;

        let mut e = entry.borrow_mut();
        e.computing = false;
        let next = result?;
        e.version += 1;
        e.valid = true;
        if !next.same(&e.value) {
            e.value = next;
            e.state += 1;
        }
        trace!(key = %e.key, version = e.version, state = e.state, "recomputed");
        Ok(e.value.clone())
    }
}

/// Record that `context` read `entry`.
fn link(context: &EntryRef, entry: &EntryRef) {
    {
        let mut c = context.borrow_mut();
        if c.deps.iter().any(|d| Rc::ptr_eq(d, entry)) {
            return;
        }
        c.deps.push(Rc::clone(entry));
    }
    entry.borrow_mut().dependents.push(Rc::downgrade(context));
}

fn unlink(dep: &EntryRef, dependent: &EntryRef) {
    let target = Rc::as_ptr(dependent);
    dep.borrow_mut()
        .dependents
        .retain(|w| w.strong_count() > 0 && !std::ptr::eq(w.as_ptr(), target));
}

/// Invalidate `entry` and everything that transitively depends on it.
fn mark_stale(entry: &EntryRef) {
    let mut stack = vec![Rc::clone(entry)];
    while let Some(current) = stack.pop() {
        let dependents: SmallVec<[EntryRef; 4]> = {
            let mut e = current.borrow_mut();
            e.valid = false;
            e.dependents.retain(|w| w.strong_count() > 0);
            e.dependents.iter().filter_map(Weak::upgrade).collect()
        };
        stack.extend(dependents.into_iter().filter(|d| d.borrow().valid));
    }
}
