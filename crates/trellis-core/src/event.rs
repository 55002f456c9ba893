#![forbid(unsafe_code)]

//! Notification events.
//!
//! An [`Event`] is dispatched from a target [`Node`](crate::node::Node) and,
//! when [`EventFlags::BUBBLES`] is set, travels up the parent chain. At a
//! shadow root the event stops unless [`EventFlags::COMPOSED`] is set, in which
//! case it continues at the shadow host and listeners outside the shadow tree
//! see the host as [`Event::target`].

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;

use crate::node::Node;

bitflags! {
    /// Dispatch behaviour of an [`Event`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventFlags: u8 {
        /// Propagate to ancestors after the target.
        const BUBBLES = 1 << 0;
        /// Cross shadow-root boundaries while bubbling.
        const COMPOSED = 1 << 1;
    }
}

/// Callback registered with [`Node::add_event_listener`].
pub type Listener = Rc<dyn Fn(&Event)>;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Handle returned by [`Node::add_event_listener`], used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A dispatched notification.
pub struct Event {
    name: Rc<str>,
    flags: EventFlags,
    target: RefCell<Option<Node>>,
    current_target: RefCell<Option<Node>>,
    stopped: Cell<bool>,
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .field("stopped", &self.stopped.get())
            .finish()
    }
}

impl Event {
    #[must_use]
    pub fn new(name: impl Into<Rc<str>>, flags: EventFlags) -> Self {
        Self {
            name: name.into(),
            flags,
            target: RefCell::new(None),
            current_target: RefCell::new(None),
            stopped: Cell::new(false),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn flags(&self) -> EventFlags {
        self.flags
    }

    #[must_use]
    pub fn bubbles(&self) -> bool {
        self.flags.contains(EventFlags::BUBBLES)
    }

    #[must_use]
    pub fn composed(&self) -> bool {
        self.flags.contains(EventFlags::COMPOSED)
    }

    /// Target as seen from the listener currently running (retargeted to the
    /// shadow host outside a shadow tree). `None` outside dispatch.
    #[must_use]
    pub fn target(&self) -> Option<Node> {
        self.target.borrow().clone()
    }

    /// Node whose listener is currently running. `None` outside dispatch.
    #[must_use]
    pub fn current_target(&self) -> Option<Node> {
        self.current_target.borrow().clone()
    }

    /// Prevent the event from reaching further nodes on its path.
    pub fn stop_propagation(&self) {
        self.stopped.set(true);
    }

    #[must_use]
    pub fn is_propagation_stopped(&self) -> bool {
        self.stopped.get()
    }

    pub(crate) fn enter(&self, current: &Node, target: &Node) {
        *self.current_target.borrow_mut() = Some(current.clone());
        *self.target.borrow_mut() = Some(target.clone());
    }

    pub(crate) fn leave(&self) {
        *self.current_target.borrow_mut() = None;
    }
}
