//! Call-graph traversal scenarios: cycles, depth bounds, direction.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use vibegraph::{call_stack, ChangeNotifier, Direction, GraphStore, Indexer};

fn index(root: &Path) -> Arc<GraphStore> {
    let store = Arc::new(GraphStore::open_in_memory().unwrap());
    let notifier = Arc::new(ChangeNotifier::new());
    let mut indexer = Indexer::new(root, Arc::clone(&store), notifier).unwrap();
    indexer.reindex_all().unwrap();
    store
}

#[test]
fn cycle_terminates_with_marker() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("x.py"),
        "from y import b\n\ndef a():\n    b()\n",
    )
    .unwrap();
    fs::write(
        temp.path().join("y.py"),
        "from x import a\n\ndef b():\n    a()\n",
    )
    .unwrap();
    let store = index(temp.path());

    let groups = call_stack(&store, "a", None, Direction::Down, 5).unwrap();
    let callees = &groups[0].callees;

    // a > b, then the cycle marker back at a; no stack overflow, bounded
    assert!(callees.iter().any(|e| e.breadcrumb == "a > b" && !e.cycle));
    assert!(
        callees.iter().any(|e| e.cycle),
        "cycle marker expected: {callees:?}"
    );
    assert!(callees.len() <= 5);
}

#[test]
fn self_recursion_is_a_cycle_of_length_one() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("r.py"),
        "def fact(n):\n    return fact(n - 1)\n",
    )
    .unwrap();
    let store = index(temp.path());

    let groups = call_stack(&store, "fact", None, Direction::Down, 3).unwrap();
    let callees = &groups[0].callees;
    assert_eq!(callees.len(), 1);
    assert!(callees[0].cycle);
    assert_eq!(callees[0].breadcrumb, "fact > fact");
}

#[test]
fn traversal_respects_depth_bound() {
    let temp = TempDir::new().unwrap();
    // chain: f1 -> f2 -> f3 -> f4 in one file
    fs::write(
        temp.path().join("chain.py"),
        "def f4():\n    pass\n\ndef f3():\n    f4()\n\ndef f2():\n    f3()\n\ndef f1():\n    f2()\n",
    )
    .unwrap();
    let store = index(temp.path());

    for depth in 1..=3 {
        let groups = call_stack(&store, "f1", None, Direction::Down, depth).unwrap();
        let max_depth = groups[0]
            .callees
            .iter()
            .map(|e| e.depth)
            .max()
            .unwrap_or(0);
        assert!(
            max_depth <= depth,
            "depth {depth} traversal reached {max_depth}"
        );
        assert_eq!(groups[0].callees.len(), depth);
    }
}

#[test]
fn both_directions_are_independent() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("m.py"),
        "def top():\n    mid()\n\ndef mid():\n    bottom()\n\ndef bottom():\n    pass\n",
    )
    .unwrap();
    let store = index(temp.path());

    let groups = call_stack(&store, "mid", None, Direction::Both, 2).unwrap();
    let group = &groups[0];
    assert!(group.callers.iter().any(|e| e.name == "top"));
    assert!(group.callees.iter().any(|e| e.name == "bottom"));
}

#[test]
fn breadcrumbs_disambiguate_repeated_names() {
    let temp = TempDir::new().unwrap();
    // two files each define handle(); main calls both via imports
    fs::write(temp.path().join("p.py"), "def handle():\n    pass\n").unwrap();
    fs::write(
        temp.path().join("main.py"),
        "from p import handle\n\ndef run():\n    handle()\n",
    )
    .unwrap();
    let store = index(temp.path());

    let groups = call_stack(&store, "handle", None, Direction::Up, 2).unwrap();
    for group in &groups {
        for entry in &group.callers {
            assert!(
                entry.breadcrumb.starts_with("handle > "),
                "breadcrumb must start at the origin: {}",
                entry.breadcrumb
            );
        }
    }
}

#[test]
fn diamond_shapes_visit_each_node_once_per_root() {
    let temp = TempDir::new().unwrap();
    // top calls left and right; both call bottom
    fs::write(
        temp.path().join("d.py"),
        "def bottom():\n    pass\n\ndef left():\n    bottom()\n\ndef right():\n    bottom()\n\ndef top():\n    left()\n    right()\n",
    )
    .unwrap();
    let store = index(temp.path());

    let groups = call_stack(&store, "top", None, Direction::Down, 3).unwrap();
    let callees = &groups[0].callees;
    let bottom_plain = callees
        .iter()
        .filter(|e| e.name == "bottom" && !e.cycle)
        .count();
    let bottom_cycles = callees
        .iter()
        .filter(|e| e.name == "bottom" && e.cycle)
        .count();
    // one real visit, the second arrival is marked instead of re-expanded
    assert_eq!(bottom_plain, 1);
    assert_eq!(bottom_cycles, 1);
}
