#![forbid(unsafe_code)]

//! Property access on host nodes.
//!
//! [`HostExt`] lets callers treat a component instance like an object with
//! properties: `node.get_property("count")` resolves the node's
//! [`ComponentClass`] and reads through its installed accessor.

use std::rc::Rc;

use trellis_core::{ElementDefinition, Error, Event, ListenerId, Node, Result, Value};

use crate::component::ComponentClass;
use crate::notify::INVALIDATE_EVENT;

pub trait HostExt {
    /// The component class backing this node, if any.
    fn component(&self) -> Option<Rc<dyn ElementDefinition>>;

    fn get_property(&self, key: &str) -> Result<Value>;

    fn set_property(&self, key: &str, value: impl Into<Value>) -> Result<()>;

    /// Keys of the backing class in declaration order.
    fn property_names(&self) -> Result<Vec<Rc<str>>>;

    /// Listen for invalidation notifications reaching this node.
    fn on_invalidate(&self, callback: impl Fn(&Event) + 'static) -> ListenerId;
}

fn with_class<R>(node: &Node, f: impl FnOnce(&ComponentClass) -> Result<R>) -> Result<R> {
    let not_a_component = || Error::NotAComponent {
        element: node.label(),
    };
    let definition = node.definition().ok_or_else(not_a_component)?;
    let class = definition
        .as_any()
        .downcast_ref::<ComponentClass>()
        .ok_or_else(not_a_component)?;
    f(class)
}

impl HostExt for Node {
    fn component(&self) -> Option<Rc<dyn ElementDefinition>> {
        self.definition()
            .filter(|d| d.as_any().is::<ComponentClass>())
    }

    fn get_property(&self, key: &str) -> Result<Value> {
        with_class(self, |class| class.get(self, key))
    }

    fn set_property(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        with_class(self, |class| class.set(self, key, value))
    }

    fn property_names(&self) -> Result<Vec<Rc<str>>> {
        with_class(self, |class| Ok(class.property_names()))
    }

    fn on_invalidate(&self, callback: impl Fn(&Event) + 'static) -> ListenerId {
        self.add_event_listener(INVALIDATE_EVENT, callback)
    }
}
