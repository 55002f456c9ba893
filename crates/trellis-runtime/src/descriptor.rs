#![forbid(unsafe_code)]

//! Property descriptors and descriptor maps.
//!
//! A [`DescriptorMap`] is the declarative input of a component definition: an
//! ordered mapping from property key to an [`Entry`], which is one of
//!
//! - a raw [`Value`] (normalized through [`property`](crate::property::property)),
//! - a plain getter function, or
//! - a full [`Descriptor`] with optional `get`, `set` and `connect`.
//!
//! The entry shape is resolved once, when the map is compiled into a
//! [`ComponentClass`](crate::component::ComponentClass); accessors never
//! re-inspect it.
//!
//! A `DescriptorMap` is a cheap-clone handle with identity: two handles are
//! the *same* map only if [`DescriptorMap::ptr_eq`] holds. Redefining a
//! component with the same handle is a no-op.

use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use trellis_core::{Node, Result, Value, WeakNode};

use crate::cache::InstanceCache;
use crate::notify;

/// Key whose getter function is adapted through the render adapter.
pub const RENDER_KEY: &str = "render";

/// `get(host, last_value) -> value`.
pub type Getter = Rc<dyn Fn(&Node, &Value) -> Result<Value>>;

/// `set(host, current_value, new_value) -> stored_value`.
pub type Setter = Rc<dyn Fn(&Node, &Value, Value) -> Result<Value>>;

/// Releases whatever a connect call acquired.
pub type Disposer = Box<dyn FnOnce() -> Result<()>>;

/// `connect(host, key, invalidator) -> optional disposer`.
pub type Connect = Rc<dyn Fn(&Node, &str, Invalidator) -> Result<Option<Disposer>>>;

/// Handle given to a connect call for requesting invalidation of its key.
///
/// Holds the host weakly: once the instance is gone, invalidation is a no-op.
#[derive(Clone)]
pub struct Invalidator {
    host: WeakNode,
    key: Rc<str>,
    cache: Weak<InstanceCache>,
}

impl fmt::Debug for Invalidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invalidator")
            .field("key", &self.key)
            .field("host", &self.host)
            .finish()
    }
}

impl Invalidator {
    pub(crate) fn new(host: &Node, key: Rc<str>, cache: &Rc<InstanceCache>) -> Self {
        Self {
            host: host.downgrade(),
            key,
            cache: Rc::downgrade(cache),
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn host(&self) -> Option<Node> {
        self.host.upgrade()
    }

    /// Optionally drop the key's cache entry, then fire one invalidation
    /// notification from the host.
    pub fn invalidate(&self, clear_cache: bool) -> Result<()> {
        let Some(host) = self.host.upgrade() else {
            return Ok(());
        };
        if clear_cache && let Some(cache) = self.cache.upgrade() {
            cache.invalidate(&host, &self.key, false)?;
        }
        notify::dispatch_invalidate(&host);
        Ok(())
    }
}

/// Full property descriptor.
#[derive(Clone, Default)]
pub struct Descriptor {
    get: Option<Getter>,
    set: Option<Setter>,
    connect: Option<Connect>,
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("get", &self.get.is_some())
            .field("set", &self.set.is_some())
            .field("connect", &self.connect.is_some())
            .finish()
    }
}

impl Descriptor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_getter(get: Getter) -> Self {
        Self {
            get: Some(get),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_get(mut self, get: impl Fn(&Node, &Value) -> Result<Value> + 'static) -> Self {
        self.get = Some(Rc::new(get));
        self
    }

    #[must_use]
    pub fn with_set(
        mut self,
        set: impl Fn(&Node, &Value, Value) -> Result<Value> + 'static,
    ) -> Self {
        self.set = Some(Rc::new(set));
        self
    }

    #[must_use]
    pub fn with_connect(
        mut self,
        connect: impl Fn(&Node, &str, Invalidator) -> Result<Option<Disposer>> + 'static,
    ) -> Self {
        self.connect = Some(Rc::new(connect));
        self
    }

    #[must_use]
    pub fn get(&self) -> Option<&Getter> {
        self.get.as_ref()
    }

    #[must_use]
    pub fn set(&self) -> Option<&Setter> {
        self.set.as_ref()
    }

    #[must_use]
    pub fn connect(&self) -> Option<&Connect> {
        self.connect.as_ref()
    }

    pub(crate) fn into_parts(self) -> (Option<Getter>, Option<Setter>, Option<Connect>) {
        (self.get, self.set, self.connect)
    }
}

/// One value of a [`DescriptorMap`].
#[derive(Clone)]
pub enum Entry {
    Value(Value),
    Getter(Getter),
    Descriptor(Descriptor),
}

impl Entry {
    /// The raw value, for entries declared as plain values.
    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Getter(_) => f.write_str("Getter(..)"),
            Self::Descriptor(d) => f.debug_tuple("Descriptor").field(d).finish(),
        }
    }
}

impl From<Value> for Entry {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Descriptor> for Entry {
    fn from(descriptor: Descriptor) -> Self {
        Self::Descriptor(descriptor)
    }
}

/// Ordered, identity-carrying map of property entries.
#[derive(Clone)]
pub struct DescriptorMap {
    entries: Rc<IndexMap<Rc<str>, Entry>>,
}

impl fmt::Debug for DescriptorMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (&**k, v)))
            .finish()
    }
}

impl DescriptorMap {
    #[must_use]
    pub fn builder() -> DescriptorMapBuilder {
        DescriptorMapBuilder::default()
    }

    /// Whether both handles refer to the same map.
    #[must_use]
    pub fn ptr_eq(&self, other: &DescriptorMap) -> bool {
        Rc::ptr_eq(&self.entries, &other.entries)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| &**k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.entries.iter().map(|(k, v)| (&**k, v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entries(&self) -> &IndexMap<Rc<str>, Entry> {
        &self.entries
    }
}

impl<K: Into<Rc<str>>> FromIterator<(K, Entry)> for DescriptorMap {
    fn from_iter<I: IntoIterator<Item = (K, Entry)>>(iter: I) -> Self {
        Self {
            entries: Rc::new(iter.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }
}

/// Builder for [`DescriptorMap`]. Re-inserting a key replaces its entry but
/// keeps its original position.
#[derive(Default)]
pub struct DescriptorMapBuilder {
    entries: IndexMap<Rc<str>, Entry>,
}

impl DescriptorMapBuilder {
    #[must_use]
    pub fn entry(mut self, key: &str, entry: Entry) -> Self {
        self.entries.insert(Rc::from(key), entry);
        self
    }

    /// Plain value, normalized into a typed property.
    #[must_use]
    pub fn value(self, key: &str, value: impl Into<Value>) -> Self {
        self.entry(key, Entry::Value(value.into()))
    }

    /// Plain getter function.
    #[must_use]
    pub fn getter(
        self,
        key: &str,
        get: impl Fn(&Node, &Value) -> Result<Value> + 'static,
    ) -> Self {
        self.entry(key, Entry::Getter(Rc::new(get)))
    }

    #[must_use]
    pub fn descriptor(self, key: &str, descriptor: Descriptor) -> Self {
        self.entry(key, Entry::Descriptor(descriptor))
    }

    /// Getter under [`RENDER_KEY`].
    #[must_use]
    pub fn render(self, render: impl Fn(&Node, &Value) -> Result<Value> + 'static) -> Self {
        self.getter(RENDER_KEY, render)
    }

    #[must_use]
    pub fn build(self) -> DescriptorMap {
        DescriptorMap {
            entries: Rc::new(self.entries),
        }
    }
}
