use lineage::{Graph, Index, MemberPolicy, ObjectPath, Value};

use crate::helpers::{collection, part_graph};

#[test]
fn test_member_and_index_steps() {
    let (graph, name, parts) = part_graph(&["a", "b"]);

    let resolved = graph
        .resolve_object_path(graph.root(), &ObjectPath::new().member("name"))
        .unwrap();
    assert_eq!(resolved.node, name);
    assert!(resolved.index.is_empty());
    assert!(!resolved.override_on_key);

    let resolved = graph
        .resolve_object_path(
            graph.root(),
            &ObjectPath::new().member("parts").index(Index::Position(1)),
        )
        .unwrap();
    assert_eq!(resolved.node, parts);
    assert_eq!(resolved.index, Index::Position(1));
    assert!(resolved.override_on_key);
}

#[test]
fn test_item_id_step_tracks_position() {
    let (mut graph, _, parts) = part_graph(&["a", "b"]);
    let id = graph.index_to_id(parts, &Index::Position(1)).unwrap();

    // Insert in front so "b" shifts; the id step still finds it.
    graph
        .add_item(parts, Index::Position(0), "front".into())
        .unwrap();

    let resolved = graph
        .resolve_object_path(graph.root(), &ObjectPath::new().member("parts").item(id))
        .unwrap();
    assert_eq!(resolved.node, parts);
    assert_eq!(resolved.index, Index::Position(2));
    assert!(!resolved.override_on_key);
}

#[test]
fn test_member_step_dereferences() {
    let mut graph = Graph::new_object("owner");
    let root = graph.root();
    let target = graph.add_object("target");
    let inner = graph
        .add_member(target, "inner", Value::Int(7), MemberPolicy::default())
        .unwrap();
    let holder = graph
        .add_member(root, "link", Value::Null, MemberPolicy::default())
        .unwrap();
    graph.set_reference(holder, target).unwrap();

    let resolved = graph
        .resolve_object_path(
            graph.root(),
            &ObjectPath::new().member("link").member("inner"),
        )
        .unwrap();
    assert_eq!(resolved.node, inner);
}

#[test]
fn test_index_step_into_referenced_element() {
    let mut graph = Graph::new_object("owner");
    let root = graph.root();
    let target = graph.add_object("target");
    let inner = graph
        .add_member(target, "inner", Value::Int(7), MemberPolicy::default())
        .unwrap();
    let holder = graph
        .add_member(
            root,
            "links",
            Value::Collection(vec![Value::Reference(target)]),
            MemberPolicy::default(),
        )
        .unwrap();
    let _ = holder;

    let resolved = graph
        .resolve_object_path(
            graph.root(),
            &ObjectPath::new()
                .member("links")
                .index(Index::Position(0))
                .member("inner"),
        )
        .unwrap();
    assert_eq!(resolved.node, inner);
    assert!(resolved.index.is_empty());
}

#[test]
fn test_unreachable_paths_resolve_to_none() {
    let (graph, _, _) = part_graph(&["a"]);
    assert!(
        graph
            .resolve_object_path(graph.root(), &ObjectPath::new().member("missing"))
            .is_none()
    );
    assert!(
        graph
            .resolve_object_path(
                graph.root(),
                &ObjectPath::new().member("name").member("deeper"),
            )
            .is_none()
    );
}

#[test]
fn test_path_serde_round_trip() {
    let path = ObjectPath::new()
        .member("parts")
        .index(Index::Key("host".into()));
    let json = serde_json::to_string(&path).unwrap();
    let back: ObjectPath = serde_json::from_str(&json).unwrap();
    assert_eq!(back, path);
}

#[test]
fn test_collection_values_without_identity_still_resolve() {
    let mut graph = Graph::new_object("log");
    let root = graph.root();
    let member = graph
        .add_member(
            root,
            "lines",
            collection(&["x", "y"]),
            MemberPolicy::non_identifiable(),
        )
        .unwrap();

    let resolved = graph
        .resolve_object_path(
            graph.root(),
            &ObjectPath::new().member("lines").index(Index::Position(1)),
        )
        .unwrap();
    assert_eq!(resolved.node, member);
    assert_eq!(resolved.index, Index::Position(1));
}
