//! End-to-end component scenarios driven through the public API.
//!
//! Each test builds a document, defines components through a [`Registry`] and
//! observes the result the way an application would: property reads and
//! writes on host nodes, `invalidate` events, and connect/disconnect effects.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use trellis_core::{Document, Error, Node, Value};
use trellis_runtime::{
    Descriptor, DescriptorMap, HostExt, Invalidator, Registry, RuntimeConfig,
};

// ── Helpers ──────────────────────────────────────────────────────────

fn dev() -> (Document, Registry) {
    let doc = Document::new();
    let registry = Registry::new(&doc, RuntimeConfig::development());
    (doc, registry)
}

fn mount(doc: &Document, registry: &Registry, name: &str) -> Node {
    let el = registry.create(name).unwrap();
    doc.root().append_child(&el).unwrap();
    el
}

fn count_invalidations(node: &Node) -> Rc<Cell<u32>> {
    let count = Rc::new(Cell::new(0));
    let c = Rc::clone(&count);
    node.on_invalidate(move |_| c.set(c.get() + 1));
    count
}

/// Minimal observable store: subscribers are called on every publish.
#[derive(Default)]
struct Store {
    value: Cell<i64>,
    subscribers: RefCell<Vec<(u64, Invalidator)>>,
    next: Cell<u64>,
}

impl Store {
    fn subscribe(&self, invalidator: Invalidator) -> u64 {
        let id = self.next.get();
        self.next.set(id + 1);
        self.subscribers.borrow_mut().push((id, invalidator));
        id
    }

    fn unsubscribe(&self, id: u64) {
        self.subscribers.borrow_mut().retain(|(i, _)| *i != id);
    }

    fn publish(&self, value: i64) {
        self.value.set(value);
        let subscribers: Vec<Invalidator> = self
            .subscribers
            .borrow()
            .iter()
            .map(|(_, inv)| inv.clone())
            .collect();
        for invalidator in subscribers {
            invalidator.invalidate(true).unwrap();
        }
    }
}

fn store_descriptor(store: &Rc<Store>) -> Descriptor {
    let read = Rc::clone(store);
    let sub = Rc::clone(store);
    Descriptor::new()
        .with_get(move |_, _| Ok(Value::Int(read.value.get())))
        .with_connect(move |_, _, invalidator| {
            let id = sub.subscribe(invalidator);
            let store = Rc::clone(&sub);
            Ok(Some(Box::new(move || {
                store.unsubscribe(id);
                Ok(())
            })))
        })
}

// ═════════════════════════════════════════════════════════════════════════
// Properties and caching
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn derived_property_follows_its_source() {
    let (doc, registry) = dev();
    let calls = Rc::new(Cell::new(0));
    let c = Rc::clone(&calls);
    let counter = DescriptorMap::builder()
        .value("count", 0)
        .getter("double", move |host, _| {
            c.set(c.get() + 1);
            let count = host.get_property("count")?;
            Ok(Value::Int(count.as_int().unwrap_or(0) * 2))
        })
        .build();
    registry.define("x-counter", &counter).unwrap();
    let el = mount(&doc, &registry, "x-counter");

    assert_eq!(el.get_property("double").unwrap(), Value::Int(0));
    assert_eq!(el.get_property("double").unwrap(), Value::Int(0));
    assert_eq!(calls.get(), 1);

    el.set_property("count", 21).unwrap();
    assert_eq!(el.get_property("double").unwrap(), Value::Int(42));
    assert_eq!(calls.get(), 2);
    assert_eq!(
        el.property_names().unwrap(),
        [Rc::<str>::from("count"), Rc::from("double")]
    );
}

#[test]
fn instances_do_not_share_values() {
    let (doc, registry) = dev();
    let map = DescriptorMap::builder().value("name", "anon").build();
    registry.define("x-named", &map).unwrap();
    let a = mount(&doc, &registry, "x-named");
    let b = mount(&doc, &registry, "x-named");

    a.set_property("name", "alice").unwrap();
    assert_eq!(a.get_property("name").unwrap(), Value::from("alice"));
    assert_eq!(b.get_property("name").unwrap(), Value::from("anon"));
}

#[test]
fn write_events_fire_only_on_change() {
    let (doc, registry) = dev();
    let map = DescriptorMap::builder().value("flag", false).build();
    registry.define("x-flag", &map).unwrap();
    let el = mount(&doc, &registry, "x-flag");
    let fired = count_invalidations(&el);

    el.set_property("flag", "yes").unwrap();
    el.set_property("flag", 1).unwrap();
    el.set_property("flag", Value::Null).unwrap();
    assert_eq!(fired.get(), 2);
    assert_eq!(el.get_property("flag").unwrap(), Value::Bool(false));
}

#[test]
fn errors_surface_at_the_call_site() {
    let (doc, registry) = dev();
    let map = DescriptorMap::builder()
        .value("n", 0)
        .getter("fails", |_, _| Err(Error::custom("render failed")))
        .build();
    registry.define("x-err", &map).unwrap();
    let el = mount(&doc, &registry, "x-err");

    assert_eq!(
        el.get_property("fails").unwrap_err(),
        Error::custom("render failed")
    );
    assert!(matches!(
        el.set_property("n", "not a number"),
        Err(Error::Coercion { .. })
    ));
    assert!(matches!(
        el.set_property("fails", 1),
        Err(Error::ReadOnly { .. })
    ));
    assert!(matches!(
        el.get_property("nope"),
        Err(Error::UnknownProperty { .. })
    ));
}

// ═════════════════════════════════════════════════════════════════════════
// Lifecycle
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn connect_subscribes_while_in_document() {
    let (doc, registry) = dev();
    let store = Rc::new(Store::default());
    let map = DescriptorMap::builder()
        .descriptor("shared", store_descriptor(&store))
        .build();
    registry.define("x-sub", &map).unwrap();

    let el = registry.create("x-sub").unwrap();
    assert!(store.subscribers.borrow().is_empty());
    doc.root().append_child(&el).unwrap();
    assert_eq!(store.subscribers.borrow().len(), 1);

    assert_eq!(el.get_property("shared").unwrap(), Value::Int(0));
    let fired = count_invalidations(&el);
    store.publish(9);
    assert_eq!(fired.get(), 1);
    assert_eq!(el.get_property("shared").unwrap(), Value::Int(9));

    el.remove().unwrap();
    assert!(store.subscribers.borrow().is_empty());
    store.publish(10);
    assert_eq!(fired.get(), 1);
    assert_eq!(el.get_property("shared").unwrap(), Value::Int(9));
}

#[test]
fn reinserting_moves_connections_without_leaks() {
    let (doc, registry) = dev();
    let store = Rc::new(Store::default());
    let map = DescriptorMap::builder()
        .descriptor("shared", store_descriptor(&store))
        .build();
    registry.define("x-move", &map).unwrap();
    let a = mount(&doc, &registry, "div");
    let b = mount(&doc, &registry, "div");
    let el = registry.create("x-move").unwrap();

    for parent in [&a, &b, &a, &b] {
        parent.append_child(&el).unwrap();
        assert_eq!(store.subscribers.borrow().len(), 1);
    }
    el.remove().unwrap();
    assert!(store.subscribers.borrow().is_empty());
}

#[test]
fn notify_without_clearing_keeps_cached_value() {
    let (doc, registry) = dev();
    let slot: Rc<RefCell<Option<Invalidator>>> = Rc::default();
    let keep = Rc::clone(&slot);
    let source = Rc::new(Cell::new(1));
    let read = Rc::clone(&source);
    let map = DescriptorMap::builder()
        .descriptor(
            "v",
            Descriptor::new()
                .with_get(move |_, _| Ok(Value::Int(read.get())))
                .with_connect(move |_, _, invalidator| {
                    *keep.borrow_mut() = Some(invalidator);
                    Ok(None)
                }),
        )
        .build();
    registry.define("x-soft", &map).unwrap();
    let el = mount(&doc, &registry, "x-soft");
    assert_eq!(el.get_property("v").unwrap(), Value::Int(1));

    let fired = count_invalidations(&el);
    source.set(2);
    let invalidator = slot.borrow().clone().unwrap();
    invalidator.invalidate(false).unwrap();
    assert_eq!(fired.get(), 1);
    assert_eq!(el.get_property("v").unwrap(), Value::Int(1));

    invalidator.invalidate(true).unwrap();
    assert_eq!(el.get_property("v").unwrap(), Value::Int(2));
}

#[test]
fn render_attaches_shadow_root_on_connect() {
    let (doc, registry) = dev();
    let map = DescriptorMap::builder()
        .value("title", "hello")
        .render(|host, _| {
            let root = host.shadow_root().expect("shadow root before render");
            Ok(Value::from(format!(
                "{}:{}",
                host.get_property("title")?,
                root.child_count()
            )))
        })
        .build();
    registry.define("x-view", &map).unwrap();

    let el = registry.create("x-view").unwrap();
    assert!(el.shadow_root().is_none());
    doc.root().append_child(&el).unwrap();
    assert!(el.shadow_root().is_some());
    assert_eq!(el.get_property("render").unwrap(), Value::from("hello:0"));

    el.set_property("title", "bye").unwrap();
    assert_eq!(el.get_property("render").unwrap(), Value::from("bye:0"));
}

#[test]
fn invalidate_is_seen_outside_shadow_tree_as_the_host() {
    let (doc, registry) = dev();
    let map = DescriptorMap::builder().value("v", 0).build();
    registry.define("x-leaf", &map).unwrap();

    let shell = mount(&doc, &registry, "x-shell");
    let shadow = shell.attach_shadow().unwrap();
    let leaf = registry.create("x-leaf").unwrap();
    shadow.append_child(&leaf).unwrap();

    let targets = Rc::new(RefCell::new(Vec::new()));
    let t = Rc::clone(&targets);
    doc.root().on_invalidate(move |event| {
        t.borrow_mut().push(event.target().unwrap().label());
    });
    leaf.set_property("v", 1).unwrap();
    assert_eq!(*targets.borrow(), ["x-shell"]);
}

// ═════════════════════════════════════════════════════════════════════════
// Definitions
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn late_definition_upgrades_existing_tree() {
    let (doc, registry) = dev();
    let store = Rc::new(Store::default());
    let el = mount(&doc, &registry, "x-late");
    assert!(el.get_property("shared").is_err());

    let map = DescriptorMap::builder()
        .descriptor("shared", store_descriptor(&store))
        .build();
    registry.define("x-late", &map).unwrap();
    assert_eq!(store.subscribers.borrow().len(), 1);
    assert_eq!(el.get_property("shared").unwrap(), Value::Int(0));
}

#[test]
fn production_mode_rejects_redefinition() {
    let doc = Document::new();
    let registry = Registry::new(&doc, RuntimeConfig::production());
    let v1 = DescriptorMap::builder().value("a", 1).build();
    let v2 = DescriptorMap::builder().value("a", 2).build();
    registry.define("x-fixed", &v1).unwrap();
    let err = registry.define("x-fixed", &v2).unwrap_err();
    assert!(err.is_duplicate_definition());
    assert_eq!(err.to_string(), "element 'x-fixed' already defined");
    assert_eq!(doc.microtasks().len(), 0);
}

#[test]
#[cfg(not(feature = "production"))]
fn development_redefinition_updates_live_instances() {
    let (doc, registry) = dev();
    let v1 = DescriptorMap::builder()
        .value("n", 1)
        .getter("label", |host, _| {
            Ok(Value::from(format!("v1:{}", host.get_property("n")?)))
        })
        .build();
    registry.define("x-live", &v1).unwrap();
    let el = mount(&doc, &registry, "x-live");
    assert_eq!(el.get_property("label").unwrap(), Value::from("v1:1"));

    let v2 = DescriptorMap::builder()
        .value("n", 1)
        .getter("label", |host, _| {
            Ok(Value::from(format!("v2:{}", host.get_property("n")?)))
        })
        .build();
    let class = registry.define("x-live", &v2).unwrap();
    assert!(class.descriptors().ptr_eq(&v2));

    let fired = count_invalidations(&el);
    registry.flush().unwrap();
    assert_eq!(fired.get(), 2);
    assert_eq!(el.get_property("label").unwrap(), Value::from("v2:1"));
    assert_eq!(el.get_property("n").unwrap(), Value::Int(1));
}
