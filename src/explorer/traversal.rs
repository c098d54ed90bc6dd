use std::collections::VecDeque;

use ahash::AHashSet;

use crate::{
    errors::GraphProcError,
    store::{GraphStore, NodeId, Path, Relationship},
};

use super::{TraversalPlan, Uniqueness};

/// Visited bookkeeping for one traversal; never shared between traversals.
enum UniquenessState {
    None,
    NodeGlobal(AHashSet<NodeId>),
    NodePath,
    NodeLevel(AHashSet<(usize, NodeId)>),
    RelationshipGlobal(AHashSet<i64>),
    RelationshipPath,
    RelationshipLevel(AHashSet<(usize, i64)>),
}

impl UniquenessState {
    fn new(uniqueness: Uniqueness) -> Self {
        match uniqueness {
            Uniqueness::None => UniquenessState::None,
            Uniqueness::NodeGlobal => UniquenessState::NodeGlobal(AHashSet::new()),
            Uniqueness::NodePath => UniquenessState::NodePath,
            Uniqueness::NodeLevel => UniquenessState::NodeLevel(AHashSet::new()),
            Uniqueness::RelationshipGlobal => {
                UniquenessState::RelationshipGlobal(AHashSet::new())
            }
            Uniqueness::RelationshipPath => UniquenessState::RelationshipPath,
            Uniqueness::RelationshipLevel => UniquenessState::RelationshipLevel(AHashSet::new()),
        }
    }

    /// Path-local checks; these only look at the parent path.
    fn allows(&self, parent: &Path, rel: &Relationship, next: NodeId) -> bool {
        match self {
            UniquenessState::NodePath => !parent.contains_node(next),
            UniquenessState::RelationshipPath => !parent.contains_relationship(rel.id),
            _ => true,
        }
    }

    /// Claims the end of `path` in the traversal-wide sets.
    fn claim(&mut self, path: &Path) -> bool {
        let depth = path.length();
        let rel = path.last_relationship().map(|rel| rel.id);
        match self {
            UniquenessState::NodeGlobal(seen) => seen.insert(path.end_node()),
            UniquenessState::NodeLevel(seen) => seen.insert((depth, path.end_node())),
            UniquenessState::RelationshipGlobal(seen) => rel.is_none_or(|id| seen.insert(id)),
            UniquenessState::RelationshipLevel(seen) => {
                rel.is_none_or(|id| seen.insert((depth, id)))
            }
            _ => true,
        }
    }
}

/// Lazy sequence of the paths a [`TraversalPlan`] includes.
///
/// Each path is evaluated when it leaves the frontier; its children are only
/// generated when the evaluation says to continue. Breadth-first claims nodes
/// and relationships as they are queued, depth-first when they are popped, so
/// a depth-first walk reaches a shared node down the first branch. The first
/// error ends the traversal.
pub struct PathTraversal<'g> {
    store: &'g dyn GraphStore,
    plan: TraversalPlan,
    frontier: VecDeque<Path>,
    uniqueness: UniquenessState,
    remaining: Option<usize>,
    failed: bool,
}

impl<'g> PathTraversal<'g> {
    pub fn new(
        store: &'g dyn GraphStore,
        plan: TraversalPlan,
        starts: &[NodeId],
    ) -> Result<Self, GraphProcError> {
        let mut uniqueness = UniquenessState::new(plan.uniqueness);
        let mut frontier = VecDeque::with_capacity(starts.len());
        for &start in starts {
            if !store.node_exists(start)? {
                return Err(GraphProcError::not_found(format!("node {start}")));
            }
            let path = Path::single(start);
            if !plan.bfs || uniqueness.claim(&path) {
                frontier.push_back(path);
            }
        }
        if !plan.bfs {
            // the frontier is popped from the back in depth-first order
            frontier.make_contiguous().reverse();
        }
        let remaining = plan.limit;
        Ok(Self {
            store,
            plan,
            frontier,
            uniqueness,
            remaining,
            failed: false,
        })
    }

    fn pop(&mut self) -> Option<Path> {
        if self.plan.bfs {
            return self.frontier.pop_front();
        }
        while let Some(path) = self.frontier.pop_back() {
            if self.uniqueness.claim(&path) {
                return Some(path);
            }
        }
        None
    }

    fn expand(&mut self, path: &Path) -> Result<(), GraphProcError> {
        let end = path.end_node();
        let mut children = Vec::new();
        for rel in self.plan.expander.expand(path, self.store) {
            let rel = rel?;
            let next = rel.other_node(end);
            if !self.uniqueness.allows(path, &rel, next) {
                continue;
            }
            let child = path.extend(rel)?;
            if !self.plan.bfs || self.uniqueness.claim(&child) {
                children.push(child);
            }
        }
        if self.plan.bfs {
            self.frontier.extend(children);
        } else {
            self.frontier.extend(children.into_iter().rev());
        }
        Ok(())
    }

    fn step(&mut self) -> Result<Option<Path>, GraphProcError> {
        while let Some(path) = self.pop() {
            let evaluation = self.plan.evaluators.evaluate(&path, self.store)?;
            if evaluation.continues {
                self.expand(&path)?;
            }
            if evaluation.includes {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }
}

impl Iterator for PathTraversal<'_> {
    type Item = Result<Path, GraphProcError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining == Some(0) {
            return None;
        }
        match self.step() {
            Ok(Some(path)) => {
                if let Some(remaining) = self.remaining.as_mut() {
                    *remaining -= 1;
                }
                Some(Ok(path))
            }
            Ok(None) => None,
            Err(err) => {
                self.failed = true;
                self.frontier.clear();
                Some(Err(err))
            }
        }
    }
}

/// Result rows of a traversal call: one `Some(path)` per included path, or a
/// single `None` when the call is optional and produced nothing.
pub struct PathRows<'g> {
    inner: PathTraversal<'g>,
    optional: bool,
    produced: bool,
    finished: bool,
}

impl<'g> PathRows<'g> {
    pub fn new(inner: PathTraversal<'g>, optional: bool) -> Self {
        Self {
            inner,
            optional,
            produced: false,
            finished: false,
        }
    }
}

impl Iterator for PathRows<'_> {
    type Item = Result<Option<Path>, GraphProcError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.inner.next() {
            Some(Ok(path)) => {
                self.produced = true;
                Some(Ok(Some(path)))
            }
            Some(Err(err)) => {
                self.finished = true;
                Some(Err(err))
            }
            None => {
                self.finished = true;
                if self.optional && !self.produced {
                    Some(Ok(None))
                } else {
                    None
                }
            }
        }
    }
}
