use crate::behaviour::Behaviour;
use crate::condition::Condition;
use crate::state::RobotState;
use anyhow::{Result, bail};
use rand_chacha::ChaCha12Rng;
use std::fmt::Write;

/// Finite-state controller over behaviour nodes and condition edges.
///
/// Nodes live in a vector addressed by index and edges refer to them by
/// index, so cycles (including self-loops) need no shared ownership.
pub struct BehaviourTree {
    behaviours: Vec<Box<dyn Behaviour>>,
    conditions: Vec<Box<dyn Condition>>,
    entry: usize,
    active: usize,
}

impl BehaviourTree {
    /// Assemble a tree from initialized behaviours and conditions.
    ///
    /// Edges keep the order of `conditions`, which is the evaluation order.
    pub fn new(
        behaviours: Vec<Box<dyn Behaviour>>,
        conditions: Vec<Box<dyn Condition>>,
        entry: usize,
    ) -> Result<Self> {
        if behaviours.is_empty() {
            bail!("tree must have at least one behaviour");
        }
        let n_nodes = behaviours.len();
        if entry >= n_nodes {
            bail!("entry node {entry} does not exist ({n_nodes} nodes)");
        }
        for condition in &conditions {
            let info = condition.info();
            if info.origin >= n_nodes || info.extremity >= n_nodes {
                bail!(
                    "condition {} ({}) links {} -> {}, but only {n_nodes} nodes exist",
                    info.index,
                    info.label,
                    info.origin,
                    info.extremity
                );
            }
        }

        let mut tree = Self {
            behaviours,
            conditions,
            entry,
            active: entry,
        };
        tree.enter(entry);
        Ok(tree)
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn behaviours(&self) -> &[Box<dyn Behaviour>] {
        &self.behaviours
    }

    pub fn conditions(&self) -> &[Box<dyn Condition>] {
        &self.conditions
    }

    /// Run one control cycle.
    ///
    /// Steps the active behaviour, then switches along the first outgoing
    /// edge whose condition holds. Returns the new node if a transition fired.
    pub fn step(&mut self, state: &mut RobotState, rng: &mut ChaCha12Rng) -> Option<usize> {
        self.behaviours[self.active].step(state, rng);

        let origin = self.active;
        let extremity = self
            .conditions
            .iter_mut()
            .filter(|condition| condition.info().origin == origin)
            .find_map(|condition| {
                condition
                    .evaluate(state, rng)
                    .then(|| condition.info().extremity)
            })?;

        log::debug!("robot {}: behaviour {origin} -> {extremity}", state.robot_id());
        self.active = extremity;
        self.behaviours[extremity].resume();
        self.enter(extremity);
        Some(extremity)
    }

    /// Reset every behaviour and condition and go back to the entry node.
    pub fn reset(&mut self) {
        for behaviour in &mut self.behaviours {
            behaviour.reset();
        }
        for condition in &mut self.conditions {
            condition.reset();
        }
        self.active = self.entry;
        self.enter(self.entry);
    }

    /// DOT graph of the tree: one node per behaviour, one edge per condition.
    pub fn dot(&self) -> String {
        let mut dot = String::from("digraph G {\n");
        for (index, behaviour) in self.behaviours.iter().enumerate() {
            let shape = if index == self.entry { "doublecircle" } else { "circle" };
            let _ = writeln!(
                dot,
                "  n{index} [shape={shape}, label=\"{}\"];",
                escape(&behaviour.dot_description())
            );
        }
        for condition in &self.conditions {
            let info = condition.info();
            let _ = writeln!(
                dot,
                "  n{} -> n{} [label=\"{}\"];",
                info.origin,
                info.extremity,
                escape(&condition.dot_description())
            );
        }
        dot.push('}');
        dot
    }

    fn enter(&mut self, node: usize) {
        for condition in &mut self.conditions {
            if condition.info().origin == node {
                condition.origin_entered();
            }
        }
    }
}

fn escape(label: &str) -> String {
    label.replace('"', "\\\"").replace('\n', "\\n")
}
