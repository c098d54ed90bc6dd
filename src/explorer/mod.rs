//! Configurable path exploration.
//!
//! [`PathExplorer`] turns an [`ExploreConfig`] into an immutable
//! [`TraversalPlan`] (expander, evaluator chain, uniqueness, order, limit) and
//! runs it lazily from a set of start nodes. Evaluators are installed in a
//! fixed order: depth bounds, label filter or label sequence, deny-list,
//! end/terminator nodes, allow-list.

mod subgraph;
mod traversal;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    config::ExploreConfig,
    errors::GraphProcError,
    evaluators::{
        DepthEvaluator, EndAndTerminatorEvaluator, Evaluator, EvaluatorChain,
        LabelMatcherGroup, LabelSequenceEvaluator, NodeListEvaluator,
    },
    expander::RelationshipSequenceExpander,
    store::{GraphStore, NodeId, Path},
};

pub use subgraph::{Subgraph, structural_signature};
pub use traversal::{PathRows, PathTraversal};

/// Which repeats a traversal tolerates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Uniqueness {
    /// Anything may repeat.
    None,
    /// A node is visited at most once across the whole traversal.
    NodeGlobal,
    /// A node appears at most once within one path.
    NodePath,
    /// A node is visited at most once per depth.
    NodeLevel,
    /// A relationship is traversed at most once across the whole traversal.
    RelationshipGlobal,
    /// A relationship appears at most once within one path.
    RelationshipPath,
    /// A relationship is traversed at most once per depth.
    RelationshipLevel,
}

/// Everything one traversal needs, fixed before the first path is produced.
#[derive(Clone, Debug)]
pub struct TraversalPlan {
    pub expander: RelationshipSequenceExpander,
    pub evaluators: EvaluatorChain,
    pub uniqueness: Uniqueness,
    pub bfs: bool,
    pub limit: Option<usize>,
    pub optional: bool,
}

impl TraversalPlan {
    pub fn from_config(config: &ExploreConfig) -> Result<Self, GraphProcError> {
        config.validate()?;
        let min_level = config.min_level();
        let mut evaluators = EvaluatorChain::new();
        evaluators.push(Evaluator::Depth(DepthEvaluator {
            min_level,
            max_level: config.max_level(),
        }));

        let expander = match config.sequence.as_deref().map(str::trim) {
            Some(sequence) if !sequence.is_empty() => {
                let (labels, relationships) =
                    split_sequence(sequence, config.begin_sequence_at_start);
                if !labels.is_empty() {
                    let groups = labels
                        .iter()
                        .map(|step| LabelMatcherGroup::parse(step))
                        .collect::<Result<Vec<_>, _>>()?;
                    evaluators.push(Evaluator::Labels(LabelSequenceEvaluator::new(
                        groups,
                        config.filter_start_node,
                        config.begin_sequence_at_start,
                        min_level,
                    )?));
                }
                if relationships.is_empty() {
                    RelationshipSequenceExpander::from_filter("")?
                } else {
                    RelationshipSequenceExpander::from_steps(
                        relationships.as_slice(),
                        config.begin_sequence_at_start,
                    )?
                }
            }
            _ => {
                if let Some(filter) = non_empty(config.label_filter.as_deref()) {
                    evaluators.push(Evaluator::Labels(LabelSequenceEvaluator::from_filter(
                        filter,
                        config.filter_start_node,
                        min_level,
                    )?));
                }
                RelationshipSequenceExpander::from_filter(
                    non_empty(config.relationship_filter.as_deref()).unwrap_or(""),
                )?
            }
        };

        if !config.denylist_nodes.is_empty() {
            evaluators.push(Evaluator::Denylist(NodeListEvaluator::new(
                config.denylist_nodes.iter().copied(),
                config.filter_start_node,
            )));
        }
        if let Some(eval) = EndAndTerminatorEvaluator::new(
            &config.end_nodes,
            &config.terminator_nodes,
            config.filter_start_node,
            min_level,
        ) {
            evaluators.push(Evaluator::EndAndTerminator(eval));
        }
        if !config.allowlist_nodes.is_empty() {
            // end and terminator nodes must survive the allow-list
            let allowed = config
                .allowlist_nodes
                .iter()
                .chain(&config.end_nodes)
                .chain(&config.terminator_nodes)
                .copied();
            evaluators.push(Evaluator::Allowlist(NodeListEvaluator::new(
                allowed,
                config.filter_start_node,
            )));
        }

        debug!(
            "traversal plan: {} evaluators, uniqueness {:?}, bfs {}, limit {:?}",
            evaluators.len(),
            config.uniqueness,
            config.bfs,
            config.limit()
        );
        Ok(Self {
            expander,
            evaluators,
            uniqueness: config.uniqueness,
            bfs: config.bfs,
            limit: config.limit(),
            optional: config.optional,
        })
    }
}

/// Entry point for every traversal-based operation.
pub struct PathExplorer<'g> {
    store: &'g dyn GraphStore,
}

impl<'g> PathExplorer<'g> {
    pub fn new(store: &'g dyn GraphStore) -> Self {
        Self { store }
    }

    /// Lazily explores paths from `starts` according to `config`.
    pub fn traverse(
        &self,
        starts: &[NodeId],
        config: &ExploreConfig,
    ) -> Result<PathTraversal<'g>, GraphProcError> {
        let plan = TraversalPlan::from_config(config)?;
        PathTraversal::new(self.store, plan, starts)
    }

    /// Like [`Self::traverse`], honouring `optional` with a single `None` row.
    pub fn expand_config(
        &self,
        starts: &[NodeId],
        config: &ExploreConfig,
    ) -> Result<PathRows<'g>, GraphProcError> {
        let optional = config.optional;
        Ok(PathRows::new(self.traverse(starts, config)?, optional))
    }

    /// Relationship and label filter between `min_level` and `max_level` hops
    /// (`-1` leaves a bound unset), with default settings otherwise.
    pub fn expand(
        &self,
        starts: &[NodeId],
        relationship_filter: Option<&str>,
        label_filter: Option<&str>,
        min_level: i64,
        max_level: i64,
    ) -> Result<Vec<Path>, GraphProcError> {
        let config = ExploreConfig {
            relationship_filter: relationship_filter.map(str::to_owned),
            label_filter: label_filter.map(str::to_owned),
            min_level,
            max_level,
            ..ExploreConfig::default()
        };
        self.traverse(starts, &config)?.collect()
    }
}

/// Splits `"L0,R0,L1,R1"` into label steps and relationship steps. Label steps
/// come first when the sequence begins at the start node, relationship steps
/// otherwise.
fn split_sequence(sequence: &str, begin_sequence_at_start: bool) -> (Vec<String>, Vec<String>) {
    let mut labels = Vec::new();
    let mut relationships = Vec::new();
    for (idx, step) in sequence.split(',').enumerate() {
        let is_label = (idx % 2 == 0) == begin_sequence_at_start;
        let step = step.trim().to_owned();
        if is_label {
            labels.push(step);
        } else {
            relationships.push(step);
        }
    }
    (labels, relationships)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_split_alternates_from_the_right_side() {
        let (labels, rels) = split_sequence("Person, KNOWS>, Company, <WORKS_AT", true);
        assert_eq!(labels, vec!["Person", "Company"]);
        assert_eq!(rels, vec!["KNOWS>", "<WORKS_AT"]);

        let (labels, rels) = split_sequence("KNOWS>, Person, <WORKS_AT", false);
        assert_eq!(labels, vec!["Person"]);
        assert_eq!(rels, vec!["KNOWS>", "<WORKS_AT"]);
    }

    #[test]
    fn plan_installs_evaluators_in_fixed_order() {
        let config = ExploreConfig {
            label_filter: Some("+Person".to_string()),
            denylist_nodes: vec![9],
            end_nodes: vec![4],
            allowlist_nodes: vec![2],
            ..ExploreConfig::default()
        };
        let plan = TraversalPlan::from_config(&config).unwrap();
        assert_eq!(plan.evaluators.len(), 5);
    }

    #[test]
    fn plan_rejects_bad_filter_before_traversal() {
        let config = ExploreConfig {
            relationship_filter: Some("<KNOWS>".to_string()),
            ..ExploreConfig::default()
        };
        assert!(matches!(
            TraversalPlan::from_config(&config),
            Err(GraphProcError::ParseError(_))
        ));
    }
}
