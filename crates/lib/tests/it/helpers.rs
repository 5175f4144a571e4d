use std::cell::RefCell;
use std::rc::Rc;

use lineage::{ChangeEvent, Graph, GraphEvent, Index, MemberPolicy, NodeId, Value};

/// Builds a collection of text values.
pub fn collection(items: &[&str]) -> Value {
    Value::Collection(items.iter().map(|s| Value::Text(s.to_string())).collect())
}

/// Builds a dictionary of text values.
pub fn dictionary(entries: &[(&str, &str)]) -> Value {
    Value::Dictionary(
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), Value::Text(v.to_string())))
            .collect(),
    )
}

/// A base graph shaped like a typical asset: a named object with a scalar
/// member and an identified collection member.
///
/// Returns the graph plus the node ids of the "name" and "parts" members.
pub fn part_graph(parts: &[&str]) -> (Graph, NodeId, NodeId) {
    let mut graph = Graph::new_object("part");
    let root = graph.root();
    let name = graph
        .add_member(root, "name", Value::Text("part".into()), MemberPolicy::default())
        .expect("add name member");
    let items = graph
        .add_member(root, "parts", collection(parts), MemberPolicy::default())
        .expect("add parts member");
    graph.ensure_item_ids(items).expect("assign item ids");
    (graph, name, items)
}

/// Derives a graph from `base` and returns the derived counterparts of the
/// given base nodes, located by base link.
pub fn derive(base: &Graph, base_nodes: &[NodeId]) -> (Graph, Vec<NodeId>) {
    let derived = Graph::derive_from(base).expect("derive graph");
    let mapped = base_nodes
        .iter()
        .map(|wanted| {
            derived
                .node_ids()
                .find(|id| {
                    derived
                        .node(*id)
                        .map(|n| n.base() == Some(*wanted))
                        .unwrap_or(false)
                })
                .expect("derived counterpart exists")
        })
        .collect();
    (derived, mapped)
}

/// Records every `Changed` event a graph emits, for replaying into a
/// derived graph.
pub fn record_changes(graph: &mut Graph) -> Rc<RefCell<Vec<ChangeEvent>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    graph.observe(move |event| {
        if let GraphEvent::Changed(change) = event {
            sink.borrow_mut().push(change.clone());
        }
    });
    log
}

/// The collection member's current values as plain strings.
pub fn texts(graph: &Graph, node: NodeId) -> Vec<String> {
    match graph.retrieve(node).expect("retrieve collection") {
        Value::Collection(items) => items
            .iter()
            .map(|v| v.as_text().expect("text item").to_string())
            .collect(),
        other => panic!("expected a collection, got {other}"),
    }
}

/// The id registered at a position of a collection member.
pub fn id_at(graph: &Graph, node: NodeId, position: usize) -> lineage::ItemId {
    graph
        .index_to_id(node, &Index::Position(position))
        .expect("id at position")
}
