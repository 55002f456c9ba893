#![forbid(unsafe_code)]

//! Runtime: descriptor compiler, instance cache, lifecycle and registry.
//!
//! A component is declared as a [`DescriptorMap`] and bound to an element name
//! with [`Registry::define`]. Instances of that element then expose the
//! declared properties through [`HostExt`]: reads are memoized per instance
//! and key in the [`InstanceCache`], writes notify the host with a bubbling,
//! composed `invalidate` event, and connect hooks run while the instance is in
//! the document.
//!
//! ```ignore
//! use trellis_core::{Document, Value};
//! use trellis_runtime::{DescriptorMap, HostExt, Registry, RuntimeConfig};
//!
//! let doc = Document::new();
//! let registry = Registry::new(&doc, RuntimeConfig::development());
//! let counter = DescriptorMap::builder()
//!     .value("count", 0)
//!     .getter("double", |host, _| {
//!         let count = host.get_property("count")?;
//!         Ok(Value::Int(count.as_int().unwrap_or(0) * 2))
//!     })
//!     .build();
//! registry.define("x-counter", &counter)?;
//!
//! let el = registry.create("x-counter")?;
//! el.set_property("count", 21)?;
//! assert_eq!(el.get_property("double")?, Value::Int(42));
//! ```

pub mod cache;
pub mod component;
pub mod config;
pub mod descriptor;
pub mod host;
pub mod notify;
pub mod property;
pub mod registry;
pub mod render;

mod compile;
mod lifecycle;
#[cfg(not(feature = "production"))]
mod reconcile;
mod weak_table;

pub use cache::{EntryInfo, InstanceCache};
pub use component::ComponentClass;
pub use config::{Mode, RuntimeConfig};
pub use descriptor::{
    Connect, Descriptor, DescriptorMap, DescriptorMapBuilder, Disposer, Entry, Getter,
    Invalidator, RENDER_KEY, Setter,
};
pub use host::HostExt;
pub use notify::{INVALIDATE_EVENT, dispatch_invalidate};
pub use property::property;
pub use registry::Registry;
pub use render::{ensure_shadow_root, render};
