use lineage::{Error, GraphEvent, Index, MemberPolicy, NodeKind, Value, graph::GraphError};

use crate::helpers::{collection, dictionary, part_graph, texts};

#[test]
fn test_build_and_retrieve() {
    let (graph, name, parts) = part_graph(&["a", "b"]);
    assert_eq!(graph.retrieve(name).unwrap(), &Value::Text("part".into()));
    assert_eq!(texts(&graph, parts), vec!["a", "b"]);
    assert_eq!(graph.node(name).unwrap().kind(), NodeKind::Member);
    assert_eq!(graph.node(graph.root()).unwrap().kind(), NodeKind::Object);
}

#[test]
fn test_update_and_update_item() {
    let (mut graph, name, parts) = part_graph(&["a", "b"]);
    graph.update(name, Value::Text("renamed".into())).unwrap();
    assert_eq!(graph.retrieve(name).unwrap().as_text(), Some("renamed"));

    graph
        .update_item(parts, &Index::Position(1), "B".into())
        .unwrap();
    assert_eq!(texts(&graph, parts), vec!["a", "B"]);
}

#[test]
fn test_add_and_remove_items() {
    let (mut graph, _, parts) = part_graph(&["a", "c"]);
    graph
        .add_item(parts, Index::Position(1), "b".into())
        .unwrap();
    assert_eq!(texts(&graph, parts), vec!["a", "b", "c"]);

    graph.remove_item(parts, &Index::Position(0)).unwrap();
    assert_eq!(texts(&graph, parts), vec!["b", "c"]);
}

#[test]
fn test_dictionary_items() {
    let mut graph = lineage::Graph::new_object("settings");
    let root = graph.root();
    let member = graph
        .add_member(
            root,
            "options",
            dictionary(&[("host", "localhost")]),
            MemberPolicy::default(),
        )
        .unwrap();

    graph
        .add_item(member, Index::Key("port".into()), "8080".into())
        .unwrap();
    assert_eq!(
        graph
            .retrieve_item(member, &Index::Key("port".into()))
            .unwrap(),
        "8080"
    );

    let err = graph
        .add_item(member, Index::Key("host".into()), "other".into())
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Graph(GraphError::DuplicateKey { .. })
    ));
}

#[test]
fn test_shape_mismatch_is_validation_error() {
    let (mut graph, name, _) = part_graph(&["a"]);
    let err = graph
        .add_item(name, Index::Position(0), "x".into())
        .unwrap_err();
    assert!(matches!(err, Error::Graph(GraphError::ShapeMismatch { .. })));
    assert!(err.is_validation_error());
    assert!(!err.is_not_found());
    assert_eq!(err.module(), "graph");
}

#[test]
fn test_failed_mutation_changes_nothing_and_emits_nothing() {
    let (mut graph, _, parts) = part_graph(&["a"]);
    let events = std::rc::Rc::new(std::cell::RefCell::new(0usize));
    let sink = std::rc::Rc::clone(&events);
    graph.observe(move |_| *sink.borrow_mut() += 1);

    // Out-of-bounds insert position.
    assert!(graph.add_item(parts, Index::Position(5), "x".into()).is_err());
    assert_eq!(texts(&graph, parts), vec!["a"]);
    assert_eq!(*events.borrow(), 0);
}

#[test]
fn test_duplicate_member_rejected() {
    let (mut graph, _, _) = part_graph(&["a"]);
    let root = graph.root();
    let err = graph
        .add_member(root, "name", Value::Null, MemberPolicy::default())
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Graph(GraphError::DuplicateMember { .. })
    ));
}

#[test]
fn test_unknown_node_is_not_found() {
    let (graph, _, _) = part_graph(&[]);
    let (other, _, _) = part_graph(&[]);
    let err = graph.retrieve(other.root()).unwrap_err();
    assert!(err.is_not_found());
    assert!(err.is_graph_error());
}

#[test]
fn test_event_pipeline_order() {
    let (mut graph, name, _) = part_graph(&["a"]);
    let log = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = std::rc::Rc::clone(&log);
    graph.observe(move |event| {
        sink.borrow_mut().push(match event {
            GraphEvent::Preparing { .. } => "preparing",
            GraphEvent::Changing { .. } => "changing",
            GraphEvent::Changed(_) => "changed",
            GraphEvent::Finalizing { .. } => "finalizing",
            GraphEvent::OverrideChanging { .. } => "override-changing",
            GraphEvent::OverrideChanged { .. } => "override-changed",
        });
    });

    graph.update(name, Value::Text("renamed".into())).unwrap();
    assert_eq!(
        *log.borrow(),
        vec![
            "preparing",
            "changing",
            "override-changing",
            "override-changed",
            "changed",
            "finalizing",
        ]
    );
}

#[test]
fn test_changing_event_carries_old_value() {
    let (mut graph, name, _) = part_graph(&["a"]);
    let old = std::rc::Rc::new(std::cell::RefCell::new(None));
    let sink = std::rc::Rc::clone(&old);
    graph.observe(move |event| {
        if let GraphEvent::Changing { old, .. } = event {
            *sink.borrow_mut() = Some(old.clone());
        }
    });

    graph.update(name, Value::Text("renamed".into())).unwrap();
    assert_eq!(
        *old.borrow(),
        Some(Some(Value::Text("part".into())))
    );
}

#[test]
fn test_reference_retrieval() {
    let mut graph = lineage::Graph::new_object("owner");
    let root = graph.root();
    let target = graph.add_object("target");
    let target_member = graph
        .add_member(target, "items", collection(&["x", "y"]), MemberPolicy::default())
        .unwrap();
    let holder = graph
        .add_member(root, "link", Value::Null, MemberPolicy::default())
        .unwrap();
    graph.set_reference(holder, target).unwrap();

    assert_eq!(
        graph.retrieve(holder).unwrap().as_reference(),
        Some(target)
    );
    assert_eq!(texts(&graph, target_member), vec!["x", "y"]);
}

#[test]
fn test_non_identifiable_append_without_position() {
    let mut graph = lineage::Graph::new_object("log");
    let root = graph.root();
    let member = graph
        .add_member(
            root,
            "lines",
            collection(&["first"]),
            MemberPolicy::non_identifiable(),
        )
        .unwrap();

    // Without identity tracking an empty index appends.
    graph.add_item(member, Index::Empty, "second".into()).unwrap();
    assert_eq!(texts(&graph, member), vec!["first", "second"]);
}

#[test]
fn test_identified_collection_requires_position() {
    let (mut graph, _, parts) = part_graph(&["a"]);
    let err = graph.add_item(parts, Index::Empty, "b".into()).unwrap_err();
    assert!(matches!(err, Error::Graph(GraphError::UnindexedAdd)));
}

#[test]
fn test_value_json_round_trip() {
    let value = dictionary(&[("host", "localhost"), ("user", "admin")]);
    let json = value.to_json().unwrap();
    assert_eq!(Value::from_json(&json).unwrap(), value);

    let err = Value::from_json("{not json").unwrap_err();
    assert_eq!(err.module(), "serialize");
}
