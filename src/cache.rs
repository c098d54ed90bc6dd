use ahash::AHashMap;
use parking_lot::RwLock;

use crate::store::{NodeId, Relationship};

/// Incident relationships per node, filled lazily by the SQLite store.
#[derive(Default)]
pub struct AdjacencyCache {
    inner: RwLock<AHashMap<NodeId, Vec<Relationship>>>,
}

impl AdjacencyCache {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(AHashMap::new()),
        }
    }

    pub fn get(&self, node: NodeId) -> Option<Vec<Relationship>> {
        self.inner.read().get(&node).cloned()
    }

    pub fn insert(&self, node: NodeId, relationships: Vec<Relationship>) {
        self.inner.write().insert(node, relationships);
    }

    pub fn invalidate(&self, nodes: &[NodeId]) {
        let mut guard = self.inner.write();
        for node in nodes {
            guard.remove(node);
        }
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
