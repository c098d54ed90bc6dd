use ahash::AHashSet;
use log::debug;
use serde::Serialize;

use crate::{
    config::ExploreConfig,
    errors::GraphProcError,
    store::{Direction, GraphStore, NodeId, Relationship},
};

use super::{PathExplorer, PathRows, Uniqueness};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Subgraph {
    pub nodes: Vec<NodeId>,
    pub relationships: Vec<Relationship>,
}

impl<'g> PathExplorer<'g> {
    /// Distinct nodes reachable from `starts`, each visited once.
    pub fn subgraph_nodes(
        &self,
        starts: &[NodeId],
        config: &ExploreConfig,
    ) -> Result<Vec<NodeId>, GraphProcError> {
        let config = tree_config(config)?;
        let mut seen = AHashSet::new();
        let mut nodes = Vec::new();
        for path in self.traverse(starts, &config)? {
            let node = path?.end_node();
            if seen.insert(node) {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    /// Reachable nodes plus every relationship between two of them.
    pub fn subgraph_all(
        &self,
        starts: &[NodeId],
        config: &ExploreConfig,
    ) -> Result<Subgraph, GraphProcError> {
        let nodes = self.subgraph_nodes(starts, config)?;
        let relationships = cover(self.store, &nodes)?;
        debug!(
            "subgraph: {} nodes, {} relationships",
            nodes.len(),
            relationships.len()
        );
        Ok(Subgraph {
            nodes,
            relationships,
        })
    }

    /// One path per reached node; node-global uniqueness makes the result a tree.
    pub fn spanning_tree(
        &self,
        starts: &[NodeId],
        config: &ExploreConfig,
    ) -> Result<PathRows<'g>, GraphProcError> {
        self.expand_config(starts, &tree_config(config)?)
    }
}

/// Relationships whose start and end both lie in `nodes`, ordered by id.
pub fn cover(store: &dyn GraphStore, nodes: &[NodeId]) -> Result<Vec<Relationship>, GraphProcError> {
    let members: AHashSet<NodeId> = nodes.iter().copied().collect();
    let mut relationships = Vec::new();
    for &node in nodes {
        for rel in store.relationships(node, None, Direction::Outgoing)? {
            let rel = rel?;
            if members.contains(&rel.end) {
                relationships.push(rel);
            }
        }
    }
    relationships.sort_unstable_by_key(|rel| rel.id);
    relationships.dedup_by_key(|rel| rel.id);
    Ok(relationships)
}

pub fn structural_signature(subgraph: &Subgraph) -> String {
    let mut nodes = subgraph.nodes.clone();
    nodes.sort_unstable();
    let node_str = nodes
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",");
    let mut edges: Vec<_> = subgraph
        .relationships
        .iter()
        .map(|rel| (rel.start, rel.end, rel.rel_type.as_str()))
        .collect();
    edges.sort_unstable();
    let edge_str = edges
        .iter()
        .map(|(from, to, ty)| format!("{from}->{to}:{ty}"))
        .collect::<Vec<_>>()
        .join(",");
    format!("N[{node_str}]|E[{edge_str}]")
}

fn tree_config(config: &ExploreConfig) -> Result<ExploreConfig, GraphProcError> {
    // -1 is the unset sentinel and falls back to the default of 0
    if !matches!(config.min_level, -1..=1) {
        return Err(GraphProcError::invalid_config(format!(
            "minLevel can only be 0 or 1 for subgraph and spanning tree operations, got {}",
            config.min_level
        )));
    }
    Ok(ExploreConfig {
        uniqueness: Uniqueness::NodeGlobal,
        min_level: config.min_level.max(0),
        ..config.clone()
    })
}
