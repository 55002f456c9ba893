#![forbid(unsafe_code)]

//! Lifecycle binder.
//!
//! Runs a component's connect factories when an instance attaches and the
//! disposers they returned when it detaches.
//!
//! # Invariants
//!
//! 1. Each attach stores exactly the disposers its factories returned, keyed
//!    by instance; factories returning `None` contribute nothing.
//! 2. Detach removes the stored set before running it, so every disposer runs
//!    at most once. Detaching an instance with no stored set is a no-op.
//! 3. A successful attach fires one invalidation notification from the host.
//!
//! # Failure Modes
//!
//! - A factory error aborts the remaining factories. Disposers returned so far
//!   are still stored and run on the next detach; no notification fires.
//! - Disposer errors do not stop the other disposers. The first is returned,
//!   the rest are logged.

use smallvec::SmallVec;
use tracing::{trace, warn};
use trellis_core::{Node, Result};

use crate::compile::ConnectFactory;
use crate::descriptor::Disposer;
use crate::notify;
use crate::weak_table::WeakTable;

type Disposers = SmallVec<[Disposer; 4]>;

#[derive(Default)]
pub(crate) struct Lifecycle {
    active: WeakTable<Disposers>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn attach(&self, host: &Node, factories: &[ConnectFactory]) -> Result<()> {
        let mut disposers = Disposers::new();
        let mut outcome = Ok(());
        for factory in factories {
            match factory(host) {
                Ok(Some(disposer)) => disposers.push(disposer),
                Ok(None) => {}
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            }
        }
        trace!(host = %host.label(), disposers = disposers.len(), "attached");
        self.active.insert(host, disposers);
        outcome?;
        notify::dispatch_invalidate(host);
        Ok(())
    }

    pub(crate) fn detach(&self, host: &Node) -> Result<()> {
        let Some(disposers) = self.active.remove(host) else {
            return Ok(());
        };
        let count = disposers.len();
        let mut first = None;
        for dispose in disposers {
            if let Err(err) = dispose() {
                if first.is_none() {
                    first = Some(err);
                } else {
                    warn!(host = %host.label(), error = %err, "disposer failed");
                }
            }
        }
        trace!(host = %host.label(), disposers = count, "detached");
        first.map_or(Ok(()), Err)
    }

    pub(crate) fn is_attached(&self, host: &Node) -> bool {
        self.active.contains(host)
    }

    pub(crate) fn active_disposers(&self, host: &Node) -> usize {
        self.active.with(host, SmallVec::len).unwrap_or(0)
    }
}
