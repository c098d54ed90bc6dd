use graphproc::{
    GraphProcError, NodeId, SqliteGraph, neighbors_at_hop, neighbors_at_hop_count,
    neighbors_by_hop, neighbors_by_hop_count, neighbors_to_hop, neighbors_to_hop_count,
};
use serde_json::json;

struct Fixture {
    graph: SqliteGraph,
    a: NodeId,
    b: NodeId,
    c: NodeId,
    d: NodeId,
    e: NodeId,
}

// a -> b -> c, a -> c, c -> d, e -> a
fn fixture() -> Fixture {
    let graph = SqliteGraph::open_in_memory().unwrap();
    let ids: Vec<NodeId> = (0..5)
        .map(|i| graph.insert_node(&["Node"], json!({ "i": i })).unwrap())
        .collect();
    let (a, b, c, d, e) = (ids[0], ids[1], ids[2], ids[3], ids[4]);
    for (from, to) in [(a, b), (b, c), (a, c), (c, d), (e, a)] {
        graph
            .insert_relationship(from, to, "LINK", json!({}))
            .unwrap();
    }
    Fixture {
        graph,
        a,
        b,
        c,
        d,
        e,
    }
}

#[test]
fn each_node_is_reported_at_its_first_hop() {
    let Fixture {
        graph, a, b, c, d, ..
    } = fixture();
    let layers = neighbors_by_hop(&graph, a, "LINK>", 3).unwrap();
    assert_eq!(layers.layers, vec![vec![b, c], vec![d]]);
    assert_eq!(layers.at(1), &[b, c]);
    assert!(layers.at(3).is_empty());
    assert!(layers.at(0).is_empty());
}

#[test]
fn to_hop_collects_every_layer() {
    let Fixture {
        graph, a, b, c, d, ..
    } = fixture();
    assert_eq!(neighbors_to_hop(&graph, a, "LINK>", 2).unwrap(), vec![b, c, d]);
    assert_eq!(neighbors_to_hop_count(&graph, a, "LINK>", 2).unwrap(), 3);
}

#[test]
fn huge_distance_stops_at_the_last_reachable_layer() {
    let graph = SqliteGraph::open_in_memory().unwrap();
    let a = graph.insert_node(&["Node"], json!({})).unwrap();
    let b = graph.insert_node(&["Node"], json!({})).unwrap();
    graph.insert_relationship(a, b, "K", json!({})).unwrap();
    assert_eq!(neighbors_to_hop(&graph, a, "K>", i64::MAX).unwrap(), vec![b]);
    assert_eq!(neighbors_by_hop_count(&graph, a, "K>", i64::MAX).unwrap(), vec![1]);
}

#[test]
fn at_hop_reports_only_the_requested_layer() {
    let Fixture { graph, a, d, .. } = fixture();
    assert_eq!(neighbors_at_hop(&graph, a, "LINK>", 2).unwrap(), vec![d]);
    assert_eq!(neighbors_at_hop_count(&graph, a, "LINK>", 2).unwrap(), 1);
    assert_eq!(neighbors_at_hop_count(&graph, a, "LINK>", 3).unwrap(), 0);
}

#[test]
fn both_directions_reach_incoming_neighbours() {
    let Fixture {
        graph, a, b, c, e, ..
    } = fixture();
    let first = neighbors_at_hop(&graph, a, "LINK", 1).unwrap();
    let mut expected = vec![b, c, e];
    expected.sort_unstable();
    assert_eq!(first, expected);
    assert_eq!(neighbors_by_hop_count(&graph, a, "<LINK", 2).unwrap(), vec![1]);
}

#[test]
fn start_node_is_never_its_own_neighbour() {
    let Fixture { graph, a, .. } = fixture();
    let all = neighbors_to_hop(&graph, a, "", 4).unwrap();
    assert!(!all.contains(&a));
    assert_eq!(all.len(), 4);
}

#[test]
fn distance_below_one_is_rejected() {
    let Fixture { graph, a, .. } = fixture();
    let err = neighbors_to_hop(&graph, a, "LINK>", 0).unwrap_err();
    assert!(matches!(err, GraphProcError::InvalidConfig(_)));
}

#[test]
fn unknown_start_node_is_not_found() {
    let Fixture { graph, .. } = fixture();
    let err = neighbors_by_hop(&graph, 999, "LINK>", 1).unwrap_err();
    assert!(matches!(err, GraphProcError::NotFound(_)));
}
