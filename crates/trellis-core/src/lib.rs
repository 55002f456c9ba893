#![forbid(unsafe_code)]

//! Core: host document, nodes, events, element registry and values.
//!
//! This crate is the host substrate the Trellis runtime integrates with. It
//! models just enough of a component host to drive custom elements: a node
//! tree with shadow roots, connection lifecycle callbacks, composed event
//! dispatch and a microtask queue.

pub mod document;
pub mod error;
pub mod event;
pub mod logging;
pub mod microtask;
pub mod node;
pub mod registry;
pub mod value;

pub use document::{Document, WeakDocument};
pub use error::{Error, Result};
pub use event::{Event, EventFlags, ListenerId};
pub use node::{Node, NodeId, NodeKind, WeakNode};
pub use registry::{CustomElementRegistry, ElementDefinition};
pub use value::Value;
