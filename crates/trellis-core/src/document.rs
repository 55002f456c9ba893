#![forbid(unsafe_code)]

//! The host document.
//!
//! A [`Document`] owns the root [`Node`], the [`CustomElementRegistry`] and
//! the [`MicrotaskQueue`]. It is created once and passed by reference (or
//! cheap clone) to everything that needs the host.

use std::rc::{Rc, Weak};

use crate::error::{Error, Result};
use crate::microtask::MicrotaskQueue;
use crate::node::{Node, NodeKind};
use crate::registry::{CustomElementRegistry, ElementDefinition};

#[cfg(feature = "tracing")]
use crate::logging::debug;
#[cfg(not(feature = "tracing"))]
use crate::debug;

pub(crate) struct DocumentInner {
    root: Node,
    registry: CustomElementRegistry,
    microtasks: MicrotaskQueue,
}

/// Shared handle to a host document.
#[derive(Clone)]
pub struct Document {
    inner: Rc<DocumentInner>,
}

/// Non-owning handle to a [`Document`].
#[derive(Clone)]
pub struct WeakDocument {
    inner: Weak<DocumentInner>,
}

impl WeakDocument {
    #[must_use]
    pub fn upgrade(&self) -> Option<Document> {
        self.inner.upgrade().map(Document::from_inner)
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("root", &self.inner.root)
            .field("registry", &self.inner.registry)
            .field("microtasks", &self.inner.microtasks)
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    #[must_use]
    pub fn new() -> Self {
        let inner = Rc::new_cyclic(|weak: &Weak<DocumentInner>| DocumentInner {
            root: Node::new(NodeKind::Document, weak.clone()),
            registry: CustomElementRegistry::new(),
            microtasks: MicrotaskQueue::new(),
        });
        Self { inner }
    }

    pub(crate) fn from_inner(inner: Rc<DocumentInner>) -> Self {
        Self { inner }
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakDocument {
        WeakDocument {
            inner: Rc::downgrade(&self.inner),
        }
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Root of the live tree. Always connected.
    #[must_use]
    pub fn root(&self) -> Node {
        self.inner.root.clone()
    }

    #[must_use]
    pub fn registry(&self) -> &CustomElementRegistry {
        &self.inner.registry
    }

    #[must_use]
    pub fn microtasks(&self) -> &MicrotaskQueue {
        &self.inner.microtasks
    }

    /// Create a detached element. If `tag` is registered the element is built
    /// through its definition's native construction hook.
    pub fn create_element(&self, tag: &str) -> Result<Node> {
        if tag.is_empty() || tag.chars().any(|c| c.is_whitespace() || c == '<' || c == '>') {
            return Err(Error::InvalidName {
                name: tag.to_owned(),
                reason: "not a valid tag name",
            });
        }
        let node = Node::new(
            NodeKind::Element(Rc::from(tag.to_ascii_lowercase())),
            Rc::downgrade(&self.inner),
        );
        node.try_upgrade()?;
        Ok(node)
    }

    /// Register `definition` under `name` and upgrade every connected element
    /// already carrying that tag, in shadow-including tree order.
    pub fn define(&self, name: &str, definition: Rc<dyn ElementDefinition>) -> Result<()> {
        self.inner.registry.define(name, definition)?;
        debug!(name, "element definition registered");
        self.upgrade(name)
    }

    /// Attach the definition registered under `name` to every undefined
    /// element in the tree carrying that tag, constructing it and running the
    /// connected hook. A no-op when `name` is not registered.
    pub fn upgrade(&self, name: &str) -> Result<()> {
        let Some(definition) = self.inner.registry.get(name) else {
            return Ok(());
        };
        let mut pending = Vec::new();
        self.root().walk_in_shadow(|node| {
            if node.tag() == Some(name) && node.definition().is_none() {
                pending.push(node.clone());
            }
            Ok(())
        })?;
        for node in pending {
            node.set_definition(Rc::clone(&definition));
            definition.construct(&node)?;
            if node.is_connected() {
                definition.connected(&node)?;
            }
        }
        Ok(())
    }

    pub fn queue_microtask(&self, task: impl FnOnce() -> Result<()> + 'static) {
        self.inner.microtasks.queue(task);
    }

    /// Drain the microtask queue. Returns how many tasks ran.
    pub fn perform_microtask_checkpoint(&self) -> Result<usize> {
        self.inner.microtasks.checkpoint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::cell::Cell;

    struct Counting {
        connects: Cell<u32>,
    }

    impl ElementDefinition for Counting {
        fn name(&self) -> &str {
            "x-late"
        }

        fn connected(&self, _: &Node) -> Result<()> {
            self.connects.set(self.connects.get() + 1);
            Ok(())
        }

        fn disconnected(&self, _: &Node) -> Result<()> {
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn define_upgrades_connected_elements() {
        let doc = Document::new();
        let early = doc.create_element("x-late").unwrap();
        doc.root().append_child(&early).unwrap();
        assert!(early.definition().is_none());

        let def = Rc::new(Counting {
            connects: Cell::new(0),
        });
        doc.define("x-late", def.clone()).unwrap();
        assert!(early.definition().is_some());
        assert_eq!(def.connects.get(), 1);

        // Elements created after definition are constructed immediately.
        let detached = doc.create_element("x-late").unwrap();
        assert!(detached.definition().is_some());
        doc.root().append_child(&detached).unwrap();
        assert_eq!(def.connects.get(), 2);
    }

    #[test]
    fn create_element_validates_and_lowercases() {
        let doc = Document::new();
        assert!(doc.create_element("").is_err());
        assert!(doc.create_element("a b").is_err());
        assert_eq!(doc.create_element("DIV").unwrap().tag(), Some("div"));
        assert!(doc.root().is_connected());
        assert!(
            doc.create_element("div")
                .unwrap()
                .owner_document()
                .unwrap()
                .ptr_eq(&doc)
        );
    }
}
