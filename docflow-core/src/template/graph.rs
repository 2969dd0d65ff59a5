//! Directed step graph over a template or snapshot.

use crate::types::{StepId, TemplateSnapshot, TransitionCondition, WorkflowStep, WorkflowTransition};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::algo::has_path_connecting;
use petgraph::visit::Bfs;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap};

pub struct TemplateGraph<'a> {
    graph: DiGraph<StepId, TransitionCondition>,
    index: HashMap<StepId, NodeIndex>,
    steps: &'a [WorkflowStep],
}

impl<'a> TemplateGraph<'a> {
    /// Transitions whose endpoints are not in `steps` are ignored.
    pub fn new(steps: &'a [WorkflowStep], transitions: &[WorkflowTransition]) -> Self {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        for step in steps {
            index.insert(step.id, graph.add_node(step.id));
        }
        for t in transitions {
            if let (Some(&from), Some(&to)) = (index.get(&t.from_step_id), index.get(&t.to_step_id))
            {
                graph.add_edge(from, to, t.condition);
            }
        }
        Self {
            graph,
            index,
            steps,
        }
    }

    pub fn from_snapshot(snapshot: &'a TemplateSnapshot) -> Self {
        Self::new(&snapshot.steps, &snapshot.transitions)
    }

    /// Lowest-order step with no incoming transition. Falls back to the
    /// lowest-order step overall when every step has a predecessor (cycle).
    pub fn entry_step(&self) -> Option<StepId> {
        let lowest = |candidates: Vec<&WorkflowStep>| {
            candidates
                .into_iter()
                .min_by(|a, b| a.order.cmp(&b.order).then(a.id.cmp(&b.id)))
                .map(|s| s.id)
        };
        let roots: Vec<&WorkflowStep> = self
            .steps
            .iter()
            .filter(|s| {
                self.index.get(&s.id).is_some_and(|&n| {
                    self.graph
                        .neighbors_directed(n, Direction::Incoming)
                        .all(|pred| pred == n)
                })
            })
            .collect();
        if roots.is_empty() {
            lowest(self.steps.iter().collect())
        } else {
            lowest(roots)
        }
    }

    /// Whether a path of one or more transitions leads from `from` to `to`.
    pub fn reaches(&self, from: StepId, to: StepId) -> bool {
        let (Some(&a), Some(&b)) = (self.index.get(&from), self.index.get(&to)) else {
            return false;
        };
        if a == b {
            return self.graph.neighbors_directed(a, Direction::Incoming).any(|p| {
                p == a || has_path_connecting(&self.graph, a, p, None)
            });
        }
        has_path_connecting(&self.graph, a, b, None)
    }

    /// Two distinct steps may both be open only when they sit on separate
    /// branches, i.e. neither leads to the other.
    pub fn may_run_concurrently(&self, a: StepId, b: StepId) -> bool {
        a != b && !self.reaches(a, b) && !self.reaches(b, a)
    }

    /// Steps that cannot be reached from the entry step, in `order`.
    pub fn unreachable_steps(&self) -> Vec<StepId> {
        let Some(entry) = self.entry_step().and_then(|id| self.index.get(&id).copied()) else {
            return Vec::new();
        };
        let mut seen = BTreeSet::new();
        let mut bfs = Bfs::new(&self.graph, entry);
        while let Some(n) = bfs.next(&self.graph) {
            seen.insert(self.graph[n]);
        }
        let mut missing: Vec<&WorkflowStep> =
            self.steps.iter().filter(|s| !seen.contains(&s.id)).collect();
        missing.sort_by_key(|s| s.order);
        missing.into_iter().map(|s| s.id).collect()
    }
}
