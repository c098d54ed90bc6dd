//! Hop-limited neighbourhood queries.
//!
//! Visited state is one map from node to the hop at which it was first
//! reached, so a node found at hop 2 is never reported again at hop 3 and
//! memory stays proportional to the neighbourhood. The search is iterative,
//! layer by layer.

use ahash::AHashMap;

use crate::{
    errors::GraphProcError,
    rel_filter::{TypeDirection, parse_relationship_filter},
    store::{GraphStore, NodeId},
};

/// Nodes first reached at each hop, `layers[0]` being hop 1.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HopLayers {
    pub layers: Vec<Vec<NodeId>>,
}

impl HopLayers {
    pub fn all(&self) -> Vec<NodeId> {
        self.layers.iter().flatten().copied().collect()
    }

    pub fn at(&self, hop: usize) -> &[NodeId] {
        hop.checked_sub(1)
            .and_then(|idx| self.layers.get(idx))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

pub fn neighbors_by_hop(
    store: &dyn GraphStore,
    start: NodeId,
    relationship_filter: &str,
    distance: i64,
) -> Result<HopLayers, GraphProcError> {
    let distance = validate_distance(distance)?;
    let filter = parse_relationship_filter(relationship_filter)?;
    if !store.node_exists(start)? {
        return Err(GraphProcError::not_found(format!("node {start}")));
    }
    explore(store, start, &filter, distance)
}

pub fn neighbors_to_hop(
    store: &dyn GraphStore,
    start: NodeId,
    relationship_filter: &str,
    distance: i64,
) -> Result<Vec<NodeId>, GraphProcError> {
    Ok(neighbors_by_hop(store, start, relationship_filter, distance)?.all())
}

pub fn neighbors_at_hop(
    store: &dyn GraphStore,
    start: NodeId,
    relationship_filter: &str,
    distance: i64,
) -> Result<Vec<NodeId>, GraphProcError> {
    let layers = neighbors_by_hop(store, start, relationship_filter, distance)?;
    Ok(layers.at(distance as usize).to_vec())
}

pub fn neighbors_to_hop_count(
    store: &dyn GraphStore,
    start: NodeId,
    relationship_filter: &str,
    distance: i64,
) -> Result<usize, GraphProcError> {
    Ok(neighbors_to_hop(store, start, relationship_filter, distance)?.len())
}

pub fn neighbors_at_hop_count(
    store: &dyn GraphStore,
    start: NodeId,
    relationship_filter: &str,
    distance: i64,
) -> Result<usize, GraphProcError> {
    Ok(neighbors_at_hop(store, start, relationship_filter, distance)?.len())
}

pub fn neighbors_by_hop_count(
    store: &dyn GraphStore,
    start: NodeId,
    relationship_filter: &str,
    distance: i64,
) -> Result<Vec<usize>, GraphProcError> {
    let layers = neighbors_by_hop(store, start, relationship_filter, distance)?;
    Ok(layers.layers.iter().map(Vec::len).collect())
}

fn validate_distance(distance: i64) -> Result<usize, GraphProcError> {
    if distance < 1 {
        return Err(GraphProcError::invalid_config(format!(
            "distance must be at least 1, got {distance}"
        )));
    }
    Ok(distance as usize)
}

fn explore(
    store: &dyn GraphStore,
    start: NodeId,
    filter: &[TypeDirection],
    distance: usize,
) -> Result<HopLayers, GraphProcError> {
    let mut first_seen: AHashMap<NodeId, usize> = AHashMap::new();
    first_seen.insert(start, 0);
    let mut frontier = vec![start];
    let mut layers = Vec::new();
    for hop in 1..=distance {
        let mut next = Vec::new();
        for &node in &frontier {
            for pair in filter {
                for rel in store.relationships(node, pair.rel_type.as_deref(), pair.direction)? {
                    let other = rel?.other_node(node);
                    if !first_seen.contains_key(&other) {
                        first_seen.insert(other, hop);
                        next.push(other);
                    }
                }
            }
        }
        next.sort_unstable();
        if next.is_empty() {
            break;
        }
        layers.push(next.clone());
        frontier = next;
    }
    Ok(HopLayers { layers })
}
