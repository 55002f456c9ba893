#![forbid(unsafe_code)]

//! Host tree nodes.
//!
//! A [`Node`] is a cheap-clone handle (`Rc` inside) to one node of a
//! [`Document`](crate::document::Document) tree: the document root, an
//! element, or a shadow root hosted by an element.
//!
//! # Invariants
//!
//! 1. A node has at most one parent; inserting a node that already has a
//!    parent removes it from the old parent first.
//! 2. A node is connected iff its parent (or, for a shadow root, its host) is
//!    connected. The document root is always connected.
//! 3. Whenever an element becomes connected its definition's `connected` hook
//!    runs exactly once, and `disconnected` runs exactly once when it leaves,
//!    in shadow-including tree order.
//! 4. Parents own children strongly; child-to-parent and shadow-to-host links
//!    are weak.
//!
//! # Failure Modes
//!
//! - Structural errors (cycles, inserting a shadow root or document, unknown
//!   reference child) fail with [`Error::Hierarchy`] before any mutation.
//! - Lifecycle hook errors do not roll the mutation back: every pending hook
//!   still runs and the first error is returned to the mutating caller.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use crate::document::{Document, DocumentInner};
use crate::error::{Error, Result};
use crate::event::{Event, EventFlags, Listener, ListenerId};
use crate::registry::ElementDefinition;

#[cfg(feature = "tracing")]
use crate::logging::warn;
#[cfg(not(feature = "tracing"))]
use crate::warn;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique node identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element(Rc<str>),
    ShadowRoot,
}

struct ListenerSlot {
    id: ListenerId,
    name: Rc<str>,
    callback: Listener,
}

pub(crate) struct NodeInner {
    id: NodeId,
    kind: NodeKind,
    owner: Weak<DocumentInner>,
    parent: RefCell<Weak<NodeInner>>,
    host: RefCell<Weak<NodeInner>>,
    children: RefCell<Vec<Node>>,
    shadow_root: RefCell<Option<Node>>,
    definition: RefCell<Option<Rc<dyn ElementDefinition>>>,
    connected: Cell<bool>,
    listeners: RefCell<SmallVec<[ListenerSlot; 2]>>,
}

/// Shared handle to a tree node.
#[derive(Clone)]
pub struct Node {
    inner: Rc<NodeInner>,
}

/// Non-owning handle to a [`Node`].
#[derive(Clone)]
pub struct WeakNode {
    inner: Weak<NodeInner>,
}

impl WeakNode {
    #[must_use]
    pub fn upgrade(&self) -> Option<Node> {
        self.inner.upgrade().map(|inner| Node { inner })
    }

    /// Whether the node is still alive.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl fmt::Debug for WeakNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(node) => write!(f, "WeakNode({node:?})"),
            None => f.write_str("WeakNode(<dropped>)"),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.inner.id.0)
            .field("kind", &self.inner.kind)
            .field("connected", &self.inner.connected.get())
            .field("children", &self.inner.children.borrow().len())
            .finish()
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Node {}

// ---------------------------------------------------------------------------
// Construction and queries
// ---------------------------------------------------------------------------

impl Node {
    pub(crate) fn new(kind: NodeKind, owner: Weak<DocumentInner>) -> Self {
        let connected = matches!(kind, NodeKind::Document);
        Self {
            inner: Rc::new(NodeInner {
                id: NodeId::next(),
                kind,
                owner,
                parent: RefCell::new(Weak::new()),
                host: RefCell::new(Weak::new()),
                children: RefCell::new(Vec::new()),
                shadow_root: RefCell::new(None),
                definition: RefCell::new(None),
                connected: Cell::new(connected),
                listeners: RefCell::new(SmallVec::new()),
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.inner.kind
    }

    /// Tag name for elements.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        match &self.inner.kind {
            NodeKind::Element(tag) => Some(tag),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_element(&self) -> bool {
        matches!(self.inner.kind, NodeKind::Element(_))
    }

    /// Human-readable name used in error messages.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.inner.kind {
            NodeKind::Document => "#document".to_owned(),
            NodeKind::Element(tag) => tag.to_string(),
            NodeKind::ShadowRoot => "#shadow-root".to_owned(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.get()
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakNode {
        WeakNode {
            inner: Rc::downgrade(&self.inner),
        }
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    #[must_use]
    pub fn parent(&self) -> Option<Node> {
        self.inner.parent.borrow().upgrade().map(|inner| Node { inner })
    }

    /// Host element of a shadow root.
    #[must_use]
    pub fn host(&self) -> Option<Node> {
        self.inner.host.borrow().upgrade().map(|inner| Node { inner })
    }

    /// Snapshot of the child list.
    #[must_use]
    pub fn children(&self) -> Vec<Node> {
        self.inner.children.borrow().clone()
    }

    #[must_use]
    pub fn child_count(&self) -> usize {
        self.inner.children.borrow().len()
    }

    #[must_use]
    pub fn shadow_root(&self) -> Option<Node> {
        self.inner.shadow_root.borrow().clone()
    }

    #[must_use]
    pub fn owner_document(&self) -> Option<Document> {
        self.inner.owner.upgrade().map(Document::from_inner)
    }

    /// The element definition ("constructor") this element was built with.
    #[must_use]
    pub fn definition(&self) -> Option<Rc<dyn ElementDefinition>> {
        self.inner.definition.borrow().clone()
    }

    pub(crate) fn set_definition(&self, definition: Rc<dyn ElementDefinition>) {
        *self.inner.definition.borrow_mut() = Some(definition);
    }

    /// Attach a shadow root to this element.
    pub fn attach_shadow(&self) -> Result<Node> {
        if !self.is_element() {
            return Err(Error::Hierarchy("only elements can host a shadow root"));
        }
        if self.inner.shadow_root.borrow().is_some() {
            return Err(Error::Hierarchy("element already hosts a shadow root"));
        }
        let root = Node::new(NodeKind::ShadowRoot, self.inner.owner.clone());
        *root.inner.host.borrow_mut() = Rc::downgrade(&self.inner);
        root.inner.connected.set(self.is_connected());
        *self.inner.shadow_root.borrow_mut() = Some(root.clone());
        Ok(root)
    }

    /// Whether `self` is `other` or one of its shadow-including ancestors.
    #[must_use]
    pub fn is_inclusive_ancestor_of(&self, other: &Node) -> bool {
        let mut cursor = Some(other.clone());
        while let Some(node) = cursor {
            if node.ptr_eq(self) {
                return true;
            }
            cursor = node.parent().or_else(|| node.host());
        }
        false
    }
}

// ---------------------------------------------------------------------------
// Tree mutation
// ---------------------------------------------------------------------------

impl Node {
    pub fn append_child(&self, child: &Node) -> Result<()> {
        self.insert_before(child, None)
    }

    /// Insert `child` before `reference`, or at the end when `reference` is
    /// `None`.
    pub fn insert_before(&self, child: &Node, reference: Option<&Node>) -> Result<()> {
        if !child.is_element() {
            return Err(Error::Hierarchy("only elements can be inserted"));
        }
        if child.is_inclusive_ancestor_of(self) {
            return Err(Error::Hierarchy("node would become its own ancestor"));
        }
        if let Some(reference) = reference
            && !reference.parent().is_some_and(|p| p.ptr_eq(self))
        {
            return Err(Error::Hierarchy("reference node is not a child"));
        }
        if reference.is_some_and(|r| r.ptr_eq(child)) {
            return Ok(());
        }

        let mut errors = HookErrors::default();
        if let Some(old_parent) = child.parent() {
            errors.record(old_parent.detach_child(child));
        }

        {
            let mut children = self.inner.children.borrow_mut();
            let index = reference
                .and_then(|r| children.iter().position(|c| c.ptr_eq(r)))
                .unwrap_or(children.len());
            children.insert(index, child.clone());
        }
        *child.inner.parent.borrow_mut() = Rc::downgrade(&self.inner);

        if self.is_connected() {
            errors.record(child.connect_subtree());
        }
        errors.finish()
    }

    pub fn remove_child(&self, child: &Node) -> Result<()> {
        if !child.parent().is_some_and(|p| p.ptr_eq(self)) {
            return Err(Error::Hierarchy("node is not a child"));
        }
        self.detach_child(child)
    }

    /// Remove this node from its parent, if any.
    pub fn remove(&self) -> Result<()> {
        match self.parent() {
            Some(parent) => parent.detach_child(self),
            None => Ok(()),
        }
    }

    fn detach_child(&self, child: &Node) -> Result<()> {
        self.inner.children.borrow_mut().retain(|c| !c.ptr_eq(child));
        *child.inner.parent.borrow_mut() = Weak::new();
        if child.is_connected() {
            child.disconnect_subtree()
        } else {
            Ok(())
        }
    }

    /// Shadow-including preorder: node, its shadow tree, then its children.
    fn collect_shadow_including(&self, out: &mut Vec<Node>) {
        out.push(self.clone());
        if let Some(root) = self.shadow_root() {
            root.collect_shadow_including(out);
        }
        for child in self.children() {
            child.collect_shadow_including(out);
        }
    }

    fn connect_subtree(&self) -> Result<()> {
        let mut nodes = Vec::new();
        self.collect_shadow_including(&mut nodes);
        for node in &nodes {
            node.inner.connected.set(true);
        }

        let mut errors = HookErrors::default();
        for node in nodes.iter().filter(|n| n.is_element()) {
            if !node.is_connected() {
                continue;
            }
            if node.definition().is_none() {
                errors.record(node.try_upgrade());
            }
            if let Some(definition) = node.definition() {
                errors.record(definition.connected(node));
            }
        }
        errors.finish()
    }

    fn disconnect_subtree(&self) -> Result<()> {
        let mut nodes = Vec::new();
        self.collect_shadow_including(&mut nodes);
        for node in &nodes {
            node.inner.connected.set(false);
        }

        let mut errors = HookErrors::default();
        for node in nodes.iter().filter(|n| n.is_element()) {
            if node.is_connected() {
                continue;
            }
            if let Some(definition) = node.definition() {
                errors.record(definition.disconnected(node));
            }
        }
        errors.finish()
    }

    /// Bind this element to its registered definition if one exists.
    pub(crate) fn try_upgrade(&self) -> Result<()> {
        let (Some(tag), Some(document)) = (self.tag(), self.owner_document()) else {
            return Ok(());
        };
        match document.registry().get(tag) {
            Some(definition) => {
                self.set_definition(Rc::clone(&definition));
                definition.construct(self)
            }
            None => Ok(()),
        }
    }

    /// Depth-first visit of this node, its children, then the children of its
    /// shadow root, recursively. Children are snapshotted before descending.
    pub fn walk_in_shadow(&self, mut f: impl FnMut(&Node) -> Result<()>) -> Result<()> {
        self.walk_in_shadow_inner(&mut f)
    }

    fn walk_in_shadow_inner(&self, f: &mut dyn FnMut(&Node) -> Result<()>) -> Result<()> {
        f(self)?;
        for child in self.children() {
            child.walk_in_shadow_inner(f)?;
        }
        if let Some(root) = self.shadow_root() {
            for child in root.children() {
                child.walk_in_shadow_inner(f)?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

impl Node {
    pub fn add_event_listener(
        &self,
        name: impl Into<Rc<str>>,
        callback: impl Fn(&Event) + 'static,
    ) -> ListenerId {
        let id = ListenerId::next();
        self.inner.listeners.borrow_mut().push(ListenerSlot {
            id,
            name: name.into(),
            callback: Rc::new(callback),
        });
        id
    }

    /// Returns `true` if the listener was registered on this node.
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|slot| slot.id != id);
        listeners.len() < before
    }

    /// Dispatch `event` with this node as target.
    pub fn dispatch_event(&self, event: &Event) {
        // Path of (current target, retargeted target) pairs.
        let mut path: Vec<(Node, Node)> = vec![(self.clone(), self.clone())];
        if event.bubbles() {
            let mut target = self.clone();
            let mut cursor = self.clone();
            loop {
                if let Some(parent) = cursor.parent() {
                    path.push((parent.clone(), target.clone()));
                    cursor = parent;
                    continue;
                }
                if event.composed()
                    && let Some(host) = cursor.host()
                {
                    target = host.clone();
                    path.push((host.clone(), host.clone()));
                    cursor = host;
                    continue;
                }
                break;
            }
        }

        for (current, target) in &path {
            let callbacks: SmallVec<[Listener; 2]> = current
                .inner
                .listeners
                .borrow()
                .iter()
                .filter(|slot| &*slot.name == event.name())
                .map(|slot| Rc::clone(&slot.callback))
                .collect();
            if callbacks.is_empty() {
                continue;
            }
            event.enter(current, target);
            for callback in callbacks {
                callback(event);
            }
            event.leave();
            if event.is_propagation_stopped() {
                break;
            }
        }
    }

    /// Fire a fresh event named `name` from this node.
    pub fn dispatch(&self, name: &str, flags: EventFlags) {
        self.dispatch_event(&Event::new(name, flags));
    }
}

/// First-error collector for lifecycle hooks that must all run.
#[derive(Default)]
struct HookErrors {
    first: Option<Error>,
}

impl HookErrors {
    fn record(&mut self, result: Result<()>) {
        if let Err(err) = result {
            if self.first.is_none() {
                self.first = Some(err);
            } else {
                warn!(error = %err, "additional lifecycle hook error");
            }
        }
    }

    fn finish(self) -> Result<()> {
        self.first.map_or(Ok(()), Err)
    }
}
