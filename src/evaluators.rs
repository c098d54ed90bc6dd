//! Per-path include/continue decisions.
//!
//! Every evaluator answers two questions about a candidate path: should it be
//! part of the result, and should the traversal expand beyond it. Several
//! evaluators combine by AND-ing both answers, so any one of them can exclude
//! or prune.

use ahash::AHashSet;

use crate::{
    errors::GraphProcError,
    store::{GraphStore, NodeId, Path},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Evaluation {
    pub includes: bool,
    pub continues: bool,
}

impl Evaluation {
    pub const INCLUDE_AND_CONTINUE: Evaluation = Evaluation::of(true, true);
    pub const INCLUDE_AND_PRUNE: Evaluation = Evaluation::of(true, false);
    pub const EXCLUDE_AND_CONTINUE: Evaluation = Evaluation::of(false, true);
    pub const EXCLUDE_AND_PRUNE: Evaluation = Evaluation::of(false, false);

    pub const fn of(includes: bool, continues: bool) -> Self {
        Self {
            includes,
            continues,
        }
    }

    pub fn and(self, other: Evaluation) -> Evaluation {
        Evaluation::of(
            self.includes && other.includes,
            self.continues && other.continues,
        )
    }
}

#[derive(Clone, Debug)]
pub enum Evaluator {
    Depth(DepthEvaluator),
    Labels(LabelSequenceEvaluator),
    Denylist(NodeListEvaluator),
    EndAndTerminator(EndAndTerminatorEvaluator),
    Allowlist(NodeListEvaluator),
}

impl Evaluator {
    pub fn evaluate(
        &self,
        path: &Path,
        store: &dyn GraphStore,
    ) -> Result<Evaluation, GraphProcError> {
        Ok(match self {
            Evaluator::Depth(eval) => eval.evaluate(path),
            Evaluator::Labels(eval) => eval.evaluate(path, &store.labels(path.end_node())?),
            Evaluator::Denylist(eval) => eval.evaluate_denylist(path),
            Evaluator::EndAndTerminator(eval) => eval.evaluate(path),
            Evaluator::Allowlist(eval) => eval.evaluate_allowlist(path),
        })
    }
}

/// Ordered evaluator chain. All evaluators run for every path; none short-circuits.
#[derive(Clone, Debug, Default)]
pub struct EvaluatorChain {
    evaluators: Vec<Evaluator>,
}

impl EvaluatorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, evaluator: Evaluator) {
        self.evaluators.push(evaluator);
    }

    pub fn len(&self) -> usize {
        self.evaluators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evaluators.is_empty()
    }

    pub fn evaluate(
        &self,
        path: &Path,
        store: &dyn GraphStore,
    ) -> Result<Evaluation, GraphProcError> {
        let mut result = Evaluation::INCLUDE_AND_CONTINUE;
        for evaluator in &self.evaluators {
            result = result.and(evaluator.evaluate(path, store)?);
        }
        Ok(result)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthEvaluator {
    pub min_level: usize,
    pub max_level: Option<usize>,
}

impl DepthEvaluator {
    pub fn evaluate(&self, path: &Path) -> Evaluation {
        let depth = path.length();
        let within_max = self.max_level.is_none_or(|max| depth <= max);
        let below_max = self.max_level.is_none_or(|max| depth < max);
        Evaluation::of(depth >= self.min_level && within_max, below_max)
    }
}

/// Allow-list or deny-list of end nodes. The start node is exempt unless
/// `filter_start_node` is set.
#[derive(Clone, Debug)]
pub struct NodeListEvaluator {
    nodes: AHashSet<NodeId>,
    filter_start_node: bool,
}

impl NodeListEvaluator {
    pub fn new<I: IntoIterator<Item = NodeId>>(nodes: I, filter_start_node: bool) -> Self {
        Self {
            nodes: nodes.into_iter().collect(),
            filter_start_node,
        }
    }

    fn exempt(&self, path: &Path) -> bool {
        path.length() == 0 && !self.filter_start_node
    }

    pub fn evaluate_denylist(&self, path: &Path) -> Evaluation {
        if !self.exempt(path) && self.nodes.contains(&path.end_node()) {
            Evaluation::EXCLUDE_AND_PRUNE
        } else {
            Evaluation::INCLUDE_AND_CONTINUE
        }
    }

    pub fn evaluate_allowlist(&self, path: &Path) -> Evaluation {
        if self.exempt(path) || self.nodes.contains(&path.end_node()) {
            Evaluation::INCLUDE_AND_CONTINUE
        } else {
            Evaluation::EXCLUDE_AND_PRUNE
        }
    }
}

/// End nodes and terminator nodes decided together: a path is included when it
/// ends on either kind, and pruned only on a terminator. Two separate evaluators
/// would each exclude what the other includes.
#[derive(Clone, Debug)]
pub struct EndAndTerminatorEvaluator {
    end_nodes: AHashSet<NodeId>,
    terminator_nodes: AHashSet<NodeId>,
    filter_start_node: bool,
    min_level: usize,
}

impl EndAndTerminatorEvaluator {
    /// `None` when both lists are empty; no filtering is installed in that case.
    pub fn new(
        end_nodes: &[NodeId],
        terminator_nodes: &[NodeId],
        filter_start_node: bool,
        min_level: usize,
    ) -> Option<Self> {
        if end_nodes.is_empty() && terminator_nodes.is_empty() {
            return None;
        }
        Some(Self {
            end_nodes: end_nodes.iter().copied().collect(),
            terminator_nodes: terminator_nodes.iter().copied().collect(),
            filter_start_node,
            min_level,
        })
    }

    pub fn evaluate(&self, path: &Path) -> Evaluation {
        let depth = path.length();
        if (depth == 0 && !self.filter_start_node) || depth < self.min_level {
            return Evaluation::EXCLUDE_AND_CONTINUE;
        }
        let node = path.end_node();
        let terminates = self.terminator_nodes.contains(&node);
        let ends = self.end_nodes.contains(&node);
        Evaluation::of(ends || terminates, !terminates)
    }
}

/// One label filter such as `"+Person|-Banned|/Company|>Manager"`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelMatcherGroup {
    allow: Vec<LabelMatcher>,
    deny: Vec<LabelMatcher>,
    end: Vec<LabelMatcher>,
    terminator: Vec<LabelMatcher>,
}

/// Matches nodes carrying every label of a `A:B` compound, or any node for `*`.
#[derive(Clone, Debug, PartialEq, Eq)]
struct LabelMatcher {
    labels: Vec<String>,
}

impl LabelMatcher {
    fn parse(expr: &str) -> Result<Self, GraphProcError> {
        let expr = expr.trim().trim_start_matches(':');
        if expr.is_empty() {
            return Err(GraphProcError::parse("label filter token without a label"));
        }
        if expr == "*" {
            return Ok(Self { labels: Vec::new() });
        }
        let labels: Vec<String> = expr.split(':').map(|l| l.trim().to_owned()).collect();
        if labels.iter().any(|l| l.is_empty() || l.chars().any(char::is_whitespace)) {
            return Err(GraphProcError::parse(format!(
                "label filter token '{expr}' is not a valid label"
            )));
        }
        Ok(Self { labels })
    }

    fn matches(&self, node_labels: &[String]) -> bool {
        self.labels
            .iter()
            .all(|wanted| node_labels.iter().any(|have| have == wanted))
    }
}

impl LabelMatcherGroup {
    pub fn parse(filter: &str) -> Result<Self, GraphProcError> {
        let mut group = LabelMatcherGroup::default();
        for token in filter.split('|') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let (bucket, expr) = match token.as_bytes()[0] {
                b'+' => (&mut group.allow, &token[1..]),
                b'-' => (&mut group.deny, &token[1..]),
                b'/' => (&mut group.terminator, &token[1..]),
                b'>' => (&mut group.end, &token[1..]),
                _ => (&mut group.allow, token),
            };
            bucket.push(LabelMatcher::parse(expr)?);
        }
        Ok(group)
    }

    pub fn end_nodes_only(&self) -> bool {
        !self.end.is_empty() || !self.terminator.is_empty()
    }

    pub fn evaluate(&self, labels: &[String], below_min_level: bool) -> Evaluation {
        let any = |matchers: &[LabelMatcher]| matchers.iter().any(|m| m.matches(labels));
        if any(&self.deny) {
            return Evaluation::EXCLUDE_AND_PRUNE;
        }
        if any(&self.terminator) {
            return if below_min_level {
                Evaluation::EXCLUDE_AND_CONTINUE
            } else {
                Evaluation::INCLUDE_AND_PRUNE
            };
        }
        if any(&self.end) {
            return if below_min_level {
                Evaluation::EXCLUDE_AND_CONTINUE
            } else {
                Evaluation::INCLUDE_AND_CONTINUE
            };
        }
        if self.allow.is_empty() || any(&self.allow) {
            return if self.end_nodes_only() {
                Evaluation::EXCLUDE_AND_CONTINUE
            } else {
                Evaluation::INCLUDE_AND_CONTINUE
            };
        }
        Evaluation::EXCLUDE_AND_PRUNE
    }
}

/// Label filter applied per depth; a plain label filter is a sequence of one.
#[derive(Clone, Debug)]
pub struct LabelSequenceEvaluator {
    groups: Vec<LabelMatcherGroup>,
    filter_start_node: bool,
    begin_sequence_at_start: bool,
    min_level: usize,
    start_allowed: Evaluation,
}

impl LabelSequenceEvaluator {
    pub fn new(
        groups: Vec<LabelMatcherGroup>,
        filter_start_node: bool,
        begin_sequence_at_start: bool,
        min_level: usize,
    ) -> Result<Self, GraphProcError> {
        if groups.is_empty() {
            return Err(GraphProcError::invalid_config("label sequence has no steps"));
        }
        let start_allowed = if groups.iter().any(LabelMatcherGroup::end_nodes_only) {
            Evaluation::EXCLUDE_AND_CONTINUE
        } else {
            Evaluation::INCLUDE_AND_CONTINUE
        };
        Ok(Self {
            groups,
            filter_start_node,
            begin_sequence_at_start,
            min_level,
            start_allowed,
        })
    }

    pub fn from_filter(
        filter: &str,
        filter_start_node: bool,
        min_level: usize,
    ) -> Result<Self, GraphProcError> {
        Self::new(vec![LabelMatcherGroup::parse(filter)?], filter_start_node, true, min_level)
    }

    pub fn evaluate(&self, path: &Path, labels: &[String]) -> Evaluation {
        let depth = path.length();
        if depth == 0 && (!self.filter_start_node || !self.begin_sequence_at_start) {
            return self.start_allowed;
        }
        let position = if self.begin_sequence_at_start { depth } else { depth - 1 };
        let group = &self.groups[position % self.groups.len()];
        group.evaluate(labels, depth < self.min_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Relationship;

    fn chain(nodes: &[NodeId]) -> Path {
        let mut path = Path::single(nodes[0]);
        for (idx, pair) in nodes.windows(2).enumerate() {
            path = path
                .extend(Relationship {
                    id: idx as i64 + 100,
                    start: pair[0],
                    end: pair[1],
                    rel_type: "NEXT".to_string(),
                })
                .unwrap();
        }
        path
    }

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn depth_bounds_exclude_below_min_and_prune_at_max() {
        let eval = DepthEvaluator {
            min_level: 1,
            max_level: Some(2),
        };
        assert_eq!(eval.evaluate(&chain(&[1])), Evaluation::EXCLUDE_AND_CONTINUE);
        assert_eq!(eval.evaluate(&chain(&[1, 2])), Evaluation::INCLUDE_AND_CONTINUE);
        assert_eq!(eval.evaluate(&chain(&[1, 2, 3])), Evaluation::INCLUDE_AND_PRUNE);
        assert_eq!(eval.evaluate(&chain(&[1, 2, 3, 4])), Evaluation::EXCLUDE_AND_PRUNE);
    }

    #[test]
    fn deny_wins_over_allow_when_combined() {
        let deny = NodeListEvaluator::new([2], false);
        let allow = NodeListEvaluator::new([2], false);
        let path = chain(&[1, 2]);
        let combined = deny
            .evaluate_denylist(&path)
            .and(allow.evaluate_allowlist(&path));
        assert_eq!(combined, Evaluation::EXCLUDE_AND_PRUNE);
    }

    #[test]
    fn start_node_is_exempt_unless_filtered() {
        let path = chain(&[1]);
        assert_eq!(
            NodeListEvaluator::new([1], false).evaluate_denylist(&path),
            Evaluation::INCLUDE_AND_CONTINUE
        );
        assert_eq!(
            NodeListEvaluator::new([1], true).evaluate_denylist(&path),
            Evaluation::EXCLUDE_AND_PRUNE
        );
        assert_eq!(
            NodeListEvaluator::new([9], true).evaluate_allowlist(&path),
            Evaluation::EXCLUDE_AND_PRUNE
        );
    }

    #[test]
    fn end_and_terminator_combine_into_one_decision() {
        assert!(EndAndTerminatorEvaluator::new(&[], &[], false, 0).is_none());
        let eval = EndAndTerminatorEvaluator::new(&[2], &[3], false, 0).unwrap();
        assert_eq!(eval.evaluate(&chain(&[1])), Evaluation::EXCLUDE_AND_CONTINUE);
        assert_eq!(eval.evaluate(&chain(&[1, 2])), Evaluation::INCLUDE_AND_CONTINUE);
        assert_eq!(eval.evaluate(&chain(&[1, 2, 3])), Evaluation::INCLUDE_AND_PRUNE);
        assert_eq!(eval.evaluate(&chain(&[1, 4])), Evaluation::EXCLUDE_AND_CONTINUE);
    }

    #[test]
    fn label_group_operators() {
        let group = LabelMatcherGroup::parse("+Person|-Banned|/Company|>Manager").unwrap();
        assert!(group.end_nodes_only());
        assert_eq!(
            group.evaluate(&labels(&["Person", "Banned"]), false),
            Evaluation::EXCLUDE_AND_PRUNE
        );
        assert_eq!(group.evaluate(&labels(&["Company"]), false), Evaluation::INCLUDE_AND_PRUNE);
        assert_eq!(group.evaluate(&labels(&["Company"]), true), Evaluation::EXCLUDE_AND_CONTINUE);
        assert_eq!(
            group.evaluate(&labels(&["Manager"]), false),
            Evaluation::INCLUDE_AND_CONTINUE
        );
        assert_eq!(
            group.evaluate(&labels(&["Person"]), false),
            Evaluation::EXCLUDE_AND_CONTINUE
        );
        assert_eq!(group.evaluate(&labels(&["Robot"]), false), Evaluation::EXCLUDE_AND_PRUNE);
    }

    #[test]
    fn compound_and_wildcard_labels() {
        let group = LabelMatcherGroup::parse("Person:Actor").unwrap();
        assert_eq!(group.evaluate(&labels(&["Person"]), false), Evaluation::EXCLUDE_AND_PRUNE);
        assert_eq!(
            group.evaluate(&labels(&["Actor", "Person"]), false),
            Evaluation::INCLUDE_AND_CONTINUE
        );
        let any = LabelMatcherGroup::parse("*").unwrap();
        assert_eq!(any.evaluate(&[], false), Evaluation::INCLUDE_AND_CONTINUE);
    }

    #[test]
    fn label_sequence_cycles_by_depth() {
        let groups = vec![
            LabelMatcherGroup::parse("A").unwrap(),
            LabelMatcherGroup::parse("B").unwrap(),
        ];
        let eval = LabelSequenceEvaluator::new(groups, true, true, 0).unwrap();
        assert_eq!(eval.evaluate(&chain(&[1]), &labels(&["A"])), Evaluation::INCLUDE_AND_CONTINUE);
        assert_eq!(eval.evaluate(&chain(&[1, 2]), &labels(&["A"])), Evaluation::EXCLUDE_AND_PRUNE);
        assert_eq!(
            eval.evaluate(&chain(&[1, 2, 3]), &labels(&["A"])),
            Evaluation::INCLUDE_AND_CONTINUE
        );
    }
}
