#![forbid(unsafe_code)]

//! Render adapter.
//!
//! A getter declared under [`RENDER_KEY`](crate::descriptor::RENDER_KEY) is
//! wrapped so that the host has a shadow root before the getter runs and as
//! soon as the host connects. The getter itself decides what to put there.

use std::rc::Rc;

use trellis_core::{Node, Result, Value};

use crate::descriptor::{Descriptor, Getter};

/// Return the host's shadow root, attaching one if needed.
pub fn ensure_shadow_root(host: &Node) -> Result<Node> {
    match host.shadow_root() {
        Some(root) => Ok(root),
        None => host.attach_shadow(),
    }
}

/// Wrap `render` into a descriptor whose `get` and `connect` both guarantee a
/// shadow root. The connect step acquires nothing, so it has no disposer.
#[must_use]
pub fn render(render: Getter) -> Descriptor {
    Descriptor::new()
        .with_get(move |host, last| {
            ensure_shadow_root(host)?;
            render(host, last)
        })
        .with_connect(|host, _, _| {
            ensure_shadow_root(host)?;
            Ok(None)
        })
}

/// [`render`] for a closure.
#[must_use]
pub fn render_fn(f: impl Fn(&Node, &Value) -> Result<Value> + 'static) -> Descriptor {
    render(Rc::new(f))
}
