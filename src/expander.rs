//! Relationship expansion driven by a repeating sequence of filter steps.

use ahash::AHashSet;

use crate::{
    errors::GraphProcError,
    rel_filter::{TypeDirection, parse_relationship_filter},
    store::{GraphStore, NodeId, Path, Relationship, RelationshipIter},
};

/// Which sequence entry governs an expansion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequenceStep {
    /// First entry, consumed once to leave the start node.
    Approach,
    /// Index into the repeating part of the sequence.
    Cycle(usize),
    /// The sequence has nothing left to offer at this depth.
    Exhausted,
}

#[derive(Clone, Debug)]
pub struct RelationshipSequenceExpander {
    approach: Option<Vec<TypeDirection>>,
    cycle: Vec<Vec<TypeDirection>>,
}

impl RelationshipSequenceExpander {
    /// Same candidate set at every depth.
    pub fn from_filter(filter: &str) -> Result<Self, GraphProcError> {
        Ok(Self {
            approach: None,
            cycle: vec![parse_relationship_filter(filter)?],
        })
    }

    /// True sequence: one filter string per step. With `begin_sequence_at_start`
    /// unset, the first step only applies when leaving the start node and the
    /// remaining steps repeat.
    pub fn from_steps<S: AsRef<str>>(
        steps: &[S],
        begin_sequence_at_start: bool,
    ) -> Result<Self, GraphProcError> {
        if steps.is_empty() {
            return Err(GraphProcError::invalid_config(
                "relationship sequence has no steps",
            ));
        }
        let mut parsed = steps
            .iter()
            .map(|step| parse_relationship_filter(step.as_ref().trim()))
            .collect::<Result<Vec<_>, _>>()?;
        let approach = if begin_sequence_at_start {
            None
        } else {
            Some(parsed.remove(0))
        };
        Ok(Self {
            approach,
            cycle: parsed,
        })
    }

    pub fn cycle_length(&self) -> usize {
        self.cycle.len()
    }

    pub fn step_for_depth(&self, depth: usize) -> SequenceStep {
        match (&self.approach, depth) {
            (Some(_), 0) => SequenceStep::Approach,
            _ if self.cycle.is_empty() => SequenceStep::Exhausted,
            (Some(_), d) => SequenceStep::Cycle((d - 1) % self.cycle.len()),
            (None, d) => SequenceStep::Cycle(d % self.cycle.len()),
        }
    }

    pub fn filters_for_depth(&self, depth: usize) -> &[TypeDirection] {
        match self.step_for_depth(depth) {
            SequenceStep::Approach => self.approach.as_deref().unwrap_or(&[]),
            SequenceStep::Cycle(idx) => &self.cycle[idx],
            SequenceStep::Exhausted => &[],
        }
    }

    /// Candidate relationships leaving the end node of `path`.
    pub fn expand<'a>(
        &'a self,
        path: &Path,
        store: &'a dyn GraphStore,
    ) -> RelationshipUnion<'a> {
        RelationshipUnion::new(
            store,
            path.end_node(),
            self.filters_for_depth(path.length()),
        )
    }

    /// Bidirectional traversal would need the inverse sequence; not supported.
    pub fn reverse(&self) -> Result<Self, GraphProcError> {
        Err(GraphProcError::unsupported(
            "relationship sequence expansion cannot be reversed",
        ))
    }
}

/// Lazily concatenates the per type/direction relationship iterators of one
/// step, yielding each relationship once. Underlying iterators are dropped as
/// soon as they are drained, and all of them when the union is dropped.
pub struct RelationshipUnion<'a> {
    store: &'a dyn GraphStore,
    node: NodeId,
    pairs: std::slice::Iter<'a, TypeDirection>,
    current: Option<RelationshipIter<'a>>,
    seen: AHashSet<i64>,
    failed: bool,
}

impl<'a> RelationshipUnion<'a> {
    fn new(store: &'a dyn GraphStore, node: NodeId, pairs: &'a [TypeDirection]) -> Self {
        Self {
            store,
            node,
            pairs: pairs.iter(),
            current: None,
            seen: AHashSet::new(),
            failed: false,
        }
    }
}

impl Iterator for RelationshipUnion<'_> {
    type Item = Result<Relationship, GraphProcError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(current) = self.current.as_mut() {
                match current.next() {
                    Some(Ok(rel)) => {
                        if self.seen.insert(rel.id) {
                            return Some(Ok(rel));
                        }
                        continue;
                    }
                    Some(Err(err)) => {
                        self.failed = true;
                        self.current = None;
                        return Some(Err(err));
                    }
                    None => self.current = None,
                }
            }
            let pair = self.pairs.next()?;
            let store = self.store;
            match store.relationships(self.node, pair.rel_type.as_deref(), pair.direction) {
                Ok(iter) => self.current = Some(iter),
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
        }
    }
}
