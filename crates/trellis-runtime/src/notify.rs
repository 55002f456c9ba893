#![forbid(unsafe_code)]

//! Invalidation notifier.

use trellis_core::{EventFlags, Node};

/// Name of the event fired when a host's observable state may have changed.
pub const INVALIDATE_EVENT: &str = "invalidate";

/// Fire [`INVALIDATE_EVENT`] from `host`. The event bubbles and crosses
/// shadow boundaries, so ancestors in enclosing trees observe it with the
/// outermost visible host as target.
pub fn dispatch_invalidate(host: &Node) {
    host.dispatch(INVALIDATE_EVENT, EventFlags::BUBBLES | EventFlags::COMPOSED);
}
