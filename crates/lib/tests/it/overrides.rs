use lineage::{GraphEvent, Index, OverrideType, Value};

use crate::helpers::{derive, id_at, part_graph, texts};

#[test]
fn test_fresh_derivation_is_fully_inherited() {
    let (base, name, parts) = part_graph(&["a", "b"]);
    let (derived, nodes) = derive(&base, &[name, parts]);
    let (d_name, d_parts) = (nodes[0], nodes[1]);

    assert!(derived.is_content_inherited(d_name).unwrap());
    assert!(derived.is_item_inherited(d_parts, &Index::Position(0)).unwrap());
    assert_eq!(derived.content_override(d_name).unwrap(), OverrideType::Base);
    assert!(derived.overridden_item_indices(d_parts).unwrap().is_empty());
    assert!(derived.overridden_deleted_ids(d_parts).unwrap().is_empty());
}

#[test]
fn test_override_can_be_cleared() {
    let (mut graph, name, _) = part_graph(&["a"]);
    graph.update(name, Value::Text("renamed".into())).unwrap();
    assert!(graph.is_content_overridden(name).unwrap());

    graph.override_content(name, false).unwrap();
    assert!(graph.is_content_inherited(name).unwrap());
    // The value itself is untouched; only the marker is cleared.
    assert_eq!(graph.retrieve(name).unwrap().as_text(), Some("renamed"));
}

#[test]
fn test_override_flag_changes_dispatch_events() {
    let (mut graph, name, _) = part_graph(&["a"]);
    let log = std::rc::Rc::new(std::cell::RefCell::new(0usize));
    let sink = std::rc::Rc::clone(&log);
    graph.observe(move |event| {
        if matches!(event, GraphEvent::OverrideChanged { .. }) {
            *sink.borrow_mut() += 1;
        }
    });

    graph.override_content(name, true).unwrap();
    graph.override_content(name, false).unwrap();
    assert_eq!(*log.borrow(), 2);
}

#[test]
fn test_overridden_indices_skip_deleted_items() {
    let (mut graph, _, parts) = part_graph(&["a", "b", "c"]);
    graph
        .update_item(parts, &Index::Position(2), "C".into())
        .unwrap();
    graph.remove_item(parts, &Index::Position(0)).unwrap();

    // "a"'s deletion is an override but carries no live index.
    assert_eq!(
        graph.overridden_item_indices(parts).unwrap(),
        vec![Index::Position(1)]
    );
    assert_eq!(graph.overridden_deleted_ids(parts).unwrap().len(), 1);
}

#[test]
fn test_restore_keeps_overrides_coherent() {
    let (mut graph, _, parts) = part_graph(&["a", "b"]);
    let id = id_at(&graph, parts, 0);
    let value = graph.retrieve_item(parts, &Index::Position(0)).unwrap();

    graph.remove_item(parts, &Index::Position(0)).unwrap();
    assert!(graph.is_item_overridden_deleted(parts, id).unwrap());

    graph.restore_item(parts, value, Index::Position(0), id).unwrap();
    assert_eq!(texts(&graph, parts), vec!["a", "b"]);
    assert_eq!(id_at(&graph, parts, 0), id);
    assert!(!graph.is_item_overridden_deleted(parts, id).unwrap());
}

#[test]
fn test_deletion_override_round_trip() {
    let (mut graph, _, parts) = part_graph(&["a", "b"]);
    let id = id_at(&graph, parts, 0);
    graph.remove_item(parts, &Index::Position(0)).unwrap();

    // Clearing the deletion override forgets the id entirely.
    graph.override_deleted_item(parts, false, id).unwrap();
    assert!(!graph.is_item_deleted(parts, id).unwrap());
    assert!(graph.overridden_deleted_ids(parts).unwrap().is_empty());

    // Marking it again re-records both the tombstone and the override.
    graph.override_deleted_item(parts, true, id).unwrap();
    assert!(graph.is_item_deleted(parts, id).unwrap());
    assert_eq!(graph.overridden_deleted_ids(parts).unwrap(), vec![id]);
}
