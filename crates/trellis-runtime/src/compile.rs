#![forbid(unsafe_code)]

//! Descriptor map compiler.
//!
//! Turns a [`DescriptorMap`] into one [`Accessor`] per key plus the list of
//! connect factories the lifecycle binder runs on attach. Each entry is
//! normalized exactly once:
//!
//! - a getter under [`RENDER_KEY`] goes through the render adapter,
//! - any other getter becomes `{ get }`,
//! - a descriptor declaring `get` or `set` is used as is,
//! - everything else goes through [`property::normalize`].
//!
//! A descriptor without `get` reads through identity (the last stored value).
//! Compilation has no side effects, so a failing map leaves any previously
//! installed accessors untouched.

use std::rc::Rc;

use indexmap::IndexMap;
use trellis_core::{Error, Node, Result, Value};

use crate::cache::InstanceCache;
use crate::descriptor::{
    Connect, Descriptor, DescriptorMap, Disposer, Entry, Getter, Invalidator, RENDER_KEY, Setter,
};
use crate::{notify, property, render};

/// Per-host connect step produced from a descriptor's `connect`.
pub(crate) type ConnectFactory = Rc<dyn Fn(&Node) -> Result<Option<Disposer>>>;

/// Installed read/write path of one key.
#[derive(Clone)]
pub(crate) struct Accessor {
    key: Rc<str>,
    get: Getter,
    set: Option<Setter>,
}

impl Accessor {
    pub(crate) fn writable(&self) -> bool {
        self.set.is_some()
    }

    pub(crate) fn read(&self, cache: &InstanceCache, host: &Node) -> Result<Value> {
        cache.get(host, &self.key, &self.get)
    }

    /// Writes run through the cache; a change notifies the host.
    pub(crate) fn write(&self, cache: &InstanceCache, host: &Node, value: Value) -> Result<()> {
        let Some(set) = &self.set else {
            return Err(Error::ReadOnly {
                key: self.key.to_string(),
                element: host.label(),
            });
        };
        cache.set(host, &self.key, set, value, || notify::dispatch_invalidate(host))
    }
}

pub(crate) struct Compiled {
    pub(crate) descriptors: DescriptorMap,
    pub(crate) accessors: IndexMap<Rc<str>, Accessor>,
    pub(crate) connects: Vec<ConnectFactory>,
}

fn identity_getter() -> Getter {
    Rc::new(|_, last| Ok(last.clone()))
}

fn normalize(key: &str, entry: &Entry) -> Result<Descriptor> {
    match entry {
        Entry::Getter(get) if key == RENDER_KEY => Ok(render::render(Rc::clone(get))),
        Entry::Getter(get) => Ok(Descriptor::from_getter(Rc::clone(get))),
        Entry::Descriptor(d) if d.get().is_some() || d.set().is_some() => Ok(d.clone()),
        other => property::normalize(key, other),
    }
}

fn connect_factory(cache: &Rc<InstanceCache>, key: &Rc<str>, connect: Connect) -> ConnectFactory {
    let cache = Rc::clone(cache);
    let key = Rc::clone(key);
    Rc::new(move |host: &Node| {
        let invalidator = Invalidator::new(host, Rc::clone(&key), &cache);
        connect(host, &key, invalidator)
    })
}

/// Compile `descriptors` against `cache`.
pub(crate) fn compile(cache: &Rc<InstanceCache>, descriptors: &DescriptorMap) -> Result<Compiled> {
    let entries = descriptors.entries();
    let mut accessors = IndexMap::with_capacity(entries.len());
    let mut connects = Vec::new();

    for (key, entry) in entries {
        let (get, set, connect) = normalize(key, entry)?.into_parts();
        accessors.insert(
            Rc::clone(key),
            Accessor {
                key: Rc::clone(key),
                get: get.unwrap_or_else(identity_getter),
                set,
            },
        );
        if let Some(connect) = connect {
            connects.push(connect_factory(cache, key, connect));
        }
    }

    Ok(Compiled {
        descriptors: descriptors.clone(),
        accessors,
        connects,
    })
}
