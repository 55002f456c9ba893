//! Property-based invariant tests for the component runtime.
//!
//! 1. Every disposer runs exactly once per connection, however an instance is
//!    inserted, moved and removed.
//! 2. While connected an instance holds exactly one live set of subscriptions.
//! 3. Reads agree with a plain model of the last written (coerced) value.
//! 4. A getter runs again only after a dependency actually changed.
//! 5. Write notifications fire exactly once per effective change.

use std::cell::Cell;
use std::rc::Rc;

use proptest::prelude::*;
use trellis_core::{Document, Node, Value};
use trellis_runtime::{Descriptor, DescriptorMap, HostExt, Registry, RuntimeConfig};

// ── Helpers ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum TreeOp {
    /// Append the instance to container `n % containers`.
    MoveTo(usize),
    Remove,
}

fn arb_tree_op() -> impl Strategy<Value = TreeOp> {
    prop_oneof![
        3 => (0usize..4).prop_map(TreeOp::MoveTo),
        1 => Just(TreeOp::Remove),
    ]
}

struct Counters {
    connects: Rc<Cell<u32>>,
    disposes: Rc<Cell<u32>>,
}

fn counted_map() -> (DescriptorMap, Counters) {
    let connects = Rc::new(Cell::new(0));
    let disposes = Rc::new(Cell::new(0));
    let (c, d) = (Rc::clone(&connects), Rc::clone(&disposes));
    let map = DescriptorMap::builder()
        .descriptor(
            "watched",
            Descriptor::new()
                .with_get(|_, _| Ok(Value::Null))
                .with_connect(move |_, _, _| {
                    c.set(c.get() + 1);
                    let d = Rc::clone(&d);
                    Ok(Some(Box::new(move || {
                        d.set(d.get() + 1);
                        Ok(())
                    })))
                }),
        )
        .build();
    (map, Counters { connects, disposes })
}

fn containers(doc: &Document, count: usize) -> Vec<Node> {
    (0..count)
        .map(|i| {
            let el = doc.create_element("div").unwrap();
            // Odd containers stay detached from the document.
            if i % 2 == 0 {
                doc.root().append_child(&el).unwrap();
            }
            el
        })
        .collect()
}

// ═════════════════════════════════════════════════════════════════════════
// 1-2. Connection symmetry
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn disposers_balance_connections(ops in proptest::collection::vec(arb_tree_op(), 0..40)) {
        let doc = Document::new();
        let registry = Registry::new(&doc, RuntimeConfig::development());
        let (map, counters) = counted_map();
        let class = registry.define("x-prop", &map).unwrap();
        let parents = containers(&doc, 4);
        let el = registry.create("x-prop").unwrap();

        for op in ops {
            match op {
                TreeOp::MoveTo(i) => parents[i % parents.len()].append_child(&el).unwrap(),
                TreeOp::Remove => el.remove().unwrap(),
            }
            let live = counters.connects.get() - counters.disposes.get();
            prop_assert_eq!(live, u32::from(el.is_connected()));
            prop_assert_eq!(class.is_attached(&el), el.is_connected());
        }

        el.remove().unwrap();
        prop_assert_eq!(counters.connects.get(), counters.disposes.get());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3-5. Cache agreement with a model
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn reads_match_last_effective_write(writes in proptest::collection::vec(-3i64..3, 0..30)) {
        let doc = Document::new();
        let registry = Registry::new(&doc, RuntimeConfig::development());
        let runs = Rc::new(Cell::new(0u32));
        let r = Rc::clone(&runs);
        let map = DescriptorMap::builder()
            .value("n", 0)
            .getter("square", move |host, _| {
                r.set(r.get() + 1);
                let n = host.get_property("n")?.as_int().unwrap_or(0);
                Ok(Value::Int(n * n))
            })
            .build();
        registry.define("x-model", &map).unwrap();
        let el = registry.create("x-model").unwrap();
        doc.root().append_child(&el).unwrap();

        // Materialize the default so the first write compares against it.
        prop_assert_eq!(el.get_property("n").unwrap(), Value::Int(0));
        let fired = Rc::new(Cell::new(0u32));
        let f = Rc::clone(&fired);
        el.on_invalidate(move |_| f.set(f.get() + 1));

        let mut model = 0i64;
        let mut changes = 0u32;
        let mut expected_runs = 0u32;
        let mut stale = true;

        for w in writes {
            // Written as text to exercise numeric coercion.
            el.set_property("n", w.to_string()).unwrap();
            if w != model {
                model = w;
                changes += 1;
                stale = true;
            }
            prop_assert_eq!(el.get_property("square").unwrap(), Value::Int(model * model));
            if stale {
                expected_runs += 1;
                stale = false;
            }
            prop_assert_eq!(runs.get(), expected_runs);
        }
        prop_assert_eq!(el.get_property("n").unwrap(), Value::Int(model));
        prop_assert_eq!(fired.get(), changes);
    }
}
