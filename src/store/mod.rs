//! Host graph primitives consumed by the traversal engine.
//!
//! The explorer never talks to storage directly; it sees the graph through
//! [`GraphStore`], which any host can implement. [`sqlite::SqliteGraph`] is the
//! bundled implementation used by tests and benchmarks.

pub mod sqlite;

use serde::{Deserialize, Serialize};

use crate::errors::GraphProcError;

pub use sqlite::SqliteGraph;

pub type NodeId = i64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Direction::Outgoing => Direction::Incoming,
            Direction::Incoming => Direction::Outgoing,
            Direction::Both => Direction::Both,
        }
    }

    /// Whether a relationship seen from `node` travels in this direction.
    pub fn matches(self, relationship: &Relationship, node: NodeId) -> bool {
        match self {
            Direction::Outgoing => relationship.start == node,
            Direction::Incoming => relationship.end == node,
            Direction::Both => relationship.start == node || relationship.end == node,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relationship {
    pub id: i64,
    pub start: NodeId,
    pub end: NodeId,
    pub rel_type: String,
}

impl Relationship {
    /// The endpoint opposite to `node`. Self loops return `node` itself.
    pub fn other_node(&self, node: NodeId) -> NodeId {
        if self.start == node { self.end } else { self.start }
    }
}

pub type RelationshipIter<'a> =
    Box<dyn Iterator<Item = Result<Relationship, GraphProcError>> + 'a>;

/// Storage primitive required from the host.
pub trait GraphStore {
    fn node_exists(&self, node: NodeId) -> Result<bool, GraphProcError>;

    fn labels(&self, node: NodeId) -> Result<Vec<String>, GraphProcError>;

    /// Relationships incident to `node` in `direction`, restricted to `rel_type`
    /// when given. A self loop is yielded once even for [`Direction::Both`].
    fn relationships(
        &self,
        node: NodeId,
        rel_type: Option<&str>,
        direction: Direction,
    ) -> Result<RelationshipIter<'_>, GraphProcError>;
}

impl<'a, G> GraphStore for &'a G
where
    G: GraphStore + ?Sized,
{
    fn node_exists(&self, node: NodeId) -> Result<bool, GraphProcError> {
        (*self).node_exists(node)
    }

    fn labels(&self, node: NodeId) -> Result<Vec<String>, GraphProcError> {
        (*self).labels(node)
    }

    fn relationships(
        &self,
        node: NodeId,
        rel_type: Option<&str>,
        direction: Direction,
    ) -> Result<RelationshipIter<'_>, GraphProcError> {
        (*self).relationships(node, rel_type, direction)
    }
}

/// Alternating node/relationship sequence. Always holds one more node than
/// relationships; a single node is a valid zero-length path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Path {
    nodes: Vec<NodeId>,
    relationships: Vec<Relationship>,
}

impl Path {
    pub fn single(node: NodeId) -> Self {
        Self {
            nodes: vec![node],
            relationships: Vec::new(),
        }
    }

    pub fn start_node(&self) -> NodeId {
        self.nodes[0]
    }

    pub fn end_node(&self) -> NodeId {
        self.nodes[self.nodes.len() - 1]
    }

    pub fn length(&self) -> usize {
        self.relationships.len()
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn last_relationship(&self) -> Option<&Relationship> {
        self.relationships.last()
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    pub fn contains_relationship(&self, id: i64) -> bool {
        self.relationships.iter().any(|rel| rel.id == id)
    }

    /// Extends the path from its end node across `relationship`.
    pub fn extend(&self, relationship: Relationship) -> Result<Path, GraphProcError> {
        let end = self.end_node();
        if relationship.start != end && relationship.end != end {
            return Err(GraphProcError::invalid_input(format!(
                "relationship {} is not incident to path end node {end}",
                relationship.id
            )));
        }
        let mut nodes = Vec::with_capacity(self.nodes.len() + 1);
        nodes.extend_from_slice(&self.nodes);
        nodes.push(relationship.other_node(end));
        let mut relationships = Vec::with_capacity(self.relationships.len() + 1);
        relationships.extend_from_slice(&self.relationships);
        relationships.push(relationship);
        Ok(Path {
            nodes,
            relationships,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(id: i64, start: NodeId, end: NodeId) -> Relationship {
        Relationship {
            id,
            start,
            end,
            rel_type: "KNOWS".to_string(),
        }
    }

    #[test]
    fn extend_keeps_node_count_one_above_length() {
        let path = Path::single(1).extend(rel(10, 1, 2)).unwrap();
        let path = path.extend(rel(11, 3, 2)).unwrap();
        assert_eq!(path.length(), 2);
        assert_eq!(path.nodes(), &[1, 2, 3]);
        assert_eq!(path.end_node(), 3);
        assert!(path.contains_relationship(11));
    }

    #[test]
    fn extend_rejects_non_incident_relationship() {
        let err = Path::single(1).extend(rel(10, 2, 3)).unwrap_err();
        assert!(matches!(err, GraphProcError::InvalidInput(_)));
    }

    #[test]
    fn direction_matching_respects_orientation() {
        let r = rel(1, 5, 6);
        assert!(Direction::Outgoing.matches(&r, 5));
        assert!(!Direction::Outgoing.matches(&r, 6));
        assert!(Direction::Incoming.matches(&r, 6));
        assert!(Direction::Both.matches(&r, 6));
        assert_eq!(Direction::Incoming.reverse(), Direction::Outgoing);
    }
}
