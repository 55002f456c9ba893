#![forbid(unsafe_code)]

//! Component classes.
//!
//! A [`ComponentClass`] is what the registry installs as the element
//! definition for a name. It owns the compiled accessors of its current
//! descriptor map and the lifecycle state of its instances; instance values
//! live in the shared [`InstanceCache`].
//!
//! In development mode the compiled accessors can be swapped for the ones of a
//! new map ([`ComponentClass::recompile`]); existing instances keep their
//! identity and pick up the new accessors on their next read.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use trellis_core::{ElementDefinition, Error, Node, Result, Value};

use crate::cache::InstanceCache;
use crate::compile::{Accessor, Compiled};
use crate::descriptor::DescriptorMap;
use crate::lifecycle::Lifecycle;

pub struct ComponentClass {
    name: Rc<str>,
    cache: Rc<InstanceCache>,
    compiled: RefCell<Compiled>,
    lifecycle: Lifecycle,
    configurable: bool,
}

impl fmt::Debug for ComponentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let compiled = self.compiled.borrow();
        f.debug_struct("ComponentClass")
            .field("name", &self.name)
            .field("properties", &compiled.accessors.keys().collect::<Vec<_>>())
            .field("connects", &compiled.connects.len())
            .field("configurable", &self.configurable)
            .finish()
    }
}

impl ComponentClass {
    pub(crate) fn new(
        name: &str,
        cache: Rc<InstanceCache>,
        compiled: Compiled,
        configurable: bool,
    ) -> Self {
        Self {
            name: Rc::from(name),
            cache,
            compiled: RefCell::new(compiled),
            lifecycle: Lifecycle::new(),
            configurable,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The descriptor map the installed accessors were compiled from.
    #[must_use]
    pub fn descriptors(&self) -> DescriptorMap {
        self.compiled.borrow().descriptors.clone()
    }

    /// Property keys in declaration order.
    #[must_use]
    pub fn property_names(&self) -> Vec<Rc<str>> {
        self.compiled.borrow().accessors.keys().cloned().collect()
    }

    #[must_use]
    pub fn has_property(&self, key: &str) -> bool {
        self.compiled.borrow().accessors.contains_key(key)
    }

    #[must_use]
    pub fn is_writable(&self, key: &str) -> bool {
        self.compiled
            .borrow()
            .accessors
            .get(key)
            .is_some_and(Accessor::writable)
    }

    /// Whether the accessors may be replaced by a redefinition.
    #[must_use]
    pub fn is_configurable(&self) -> bool {
        self.configurable
    }

    #[must_use]
    pub fn cache(&self) -> &Rc<InstanceCache> {
        &self.cache
    }

    /// Read `key` on `host` through the installed accessor.
    pub fn get(&self, host: &Node, key: &str) -> Result<Value> {
        self.accessor(host, key)?.read(&self.cache, host)
    }

    /// Write `key` on `host` through the installed accessor.
    pub fn set(&self, host: &Node, key: &str, value: Value) -> Result<()> {
        self.accessor(host, key)?.write(&self.cache, host, value)
    }

    /// Run every connect factory for `host` and store the disposers.
    pub fn attach(&self, host: &Node) -> Result<()> {
        let factories = self.compiled.borrow().connects.clone();
        self.lifecycle.attach(host, &factories)
    }

    /// Run and forget the disposers stored for `host`.
    pub fn detach(&self, host: &Node) -> Result<()> {
        self.lifecycle.detach(host)
    }

    #[must_use]
    pub fn is_attached(&self, host: &Node) -> bool {
        self.lifecycle.is_attached(host)
    }

    #[must_use]
    pub fn active_disposers(&self, host: &Node) -> usize {
        self.lifecycle.active_disposers(host)
    }

    /// Replace the installed accessors; returns the previous descriptor map.
    #[cfg_attr(feature = "production", allow(dead_code))]
    pub(crate) fn recompile(&self, compiled: Compiled) -> Result<DescriptorMap> {
        if !self.configurable {
            return Err(Error::DuplicateDefinition {
                name: self.name.to_string(),
            });
        }
        let previous = self.compiled.replace(compiled);
        Ok(previous.descriptors)
    }

    /// Accessors are cloned out so user callbacks never run under a borrow.
    fn accessor(&self, host: &Node, key: &str) -> Result<Accessor> {
        self.compiled
            .borrow()
            .accessors
            .get(key)
            .cloned()
            .ok_or_else(|| Error::UnknownProperty {
                key: key.to_owned(),
                element: host.label(),
            })
    }
}

impl ElementDefinition for ComponentClass {
    fn name(&self) -> &str {
        &self.name
    }

    fn connected(&self, element: &Node) -> Result<()> {
        self.attach(element)
    }

    fn disconnected(&self, element: &Node) -> Result<()> {
        self.detach(element)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
