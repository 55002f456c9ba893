#![forbid(unsafe_code)]

//! Trellis public facade crate.
//!
//! Declarative components for a custom-element host: describe properties as a
//! [`DescriptorMap`](prelude::DescriptorMap), bind it to an element name with
//! a [`Registry`](prelude::Registry), and read or write instance properties
//! through [`HostExt`](prelude::HostExt).

pub mod prelude {
    pub use trellis_core as core;
    pub use trellis_runtime as runtime;

    pub use trellis_core::{Document, Error, Event, EventFlags, Node, Result, Value};
    pub use trellis_runtime::{
        ComponentClass, Descriptor, DescriptorMap, HostExt, Invalidator, Mode, Registry,
        RuntimeConfig, property, render,
    };
}

#[cfg(feature = "tracing-json")]
pub use trellis_core::logging::init_json_subscriber;

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn prelude_covers_a_round_trip() {
        let doc = Document::new();
        let registry = Registry::new(&doc, RuntimeConfig::default());
        let map = DescriptorMap::builder()
            .descriptor("label", property("label", Value::from("hi")))
            .build();
        registry.define("x-facade", &map).unwrap();
        let el = registry.create("x-facade").unwrap();
        doc.root().append_child(&el).unwrap();
        el.set_property("label", 3).unwrap();
        assert_eq!(el.get_property("label").unwrap(), Value::from("3"));
    }
}
