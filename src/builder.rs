//! Compact textual tree descriptions.
//!
//! A description is a whitespace-separated list of `--key value` pairs:
//!
//! ```text
//! --nstates 2
//! --s0 0 --rwm0 50 --n0 1 --n0x0 1 --c0x0 0 --p0x0 0.5
//! --s1 1 --n1 1 --n1x0 0 --c1x0 5 --p1x0 0.25
//! ```
//!
//! `--s{i}` selects the behaviour kind of state `i`, `--n{i}` its number of
//! outgoing edges; `--n{i}x{j}` and `--c{i}x{j}` give the destination state
//! and the condition kind of edge `j`. Any other `--{name}{i}` or
//! `--{name}{i}x{j}` is a parameter of the behaviour or condition, so `s` and
//! `n` are reserved on states and `n` and `c` on edges. Edges are evaluated
//! in declaration order and state 0 is the entry node.

use crate::behaviour::{self, Behaviour, BehaviourConstructor};
use crate::condition::{self, Condition, ConditionConstructor};
use crate::params::Params;
use crate::registry::Registry;
use crate::tree::BehaviourTree;
use anyhow::{Context, Result, bail};
use std::collections::BTreeMap;

const ENTRY: usize = 0;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Key {
    Global(String),
    State(usize, String),
    Edge(usize, usize, String),
}

/// Parsed prototypes from which independent trees are instantiated.
pub struct Blueprint {
    behaviours: Vec<Box<dyn Behaviour>>,
    conditions: Vec<Box<dyn Condition>>,
}

impl Blueprint {
    /// Parse a description against the default behaviour and condition registries.
    pub fn parse(description: &str) -> Result<Self> {
        Self::parse_with(description, &behaviour::registry(), &condition::registry())
    }

    pub fn parse_with(
        description: &str,
        behaviour_registry: &Registry<BehaviourConstructor>,
        condition_registry: &Registry<ConditionConstructor>,
    ) -> Result<Self> {
        let mut entries = tokenize(description)?;

        let n_states = take_index(&mut entries, Key::Global("nstates".into()))?
            .context("missing number of states \"--nstates\"")?;
        if n_states == 0 {
            bail!("number of states must be at least 1");
        }

        let mut behaviours = Vec::new();
        let mut conditions = Vec::new();
        for i_state in 0..n_states {
            let kind = take_index(&mut entries, Key::State(i_state, "s".into()))?
                .with_context(|| format!("missing behaviour of state {i_state} \"--s{i_state}\""))?;
            let n_edges = take_index(&mut entries, Key::State(i_state, "n".into()))?.unwrap_or(0);

            let params = take_params(&mut entries, |key| {
                matches!(key, Key::State(i, _) if *i == i_state)
            });
            let prototype = behaviour::prototype(behaviour_registry, kind, i_state, params)
                .with_context(|| format!("invalid behaviour of state {i_state}"))?;
            behaviours.push(prototype);

            for i_edge in 0..n_edges {
                let destination =
                    take_index(&mut entries, Key::Edge(i_state, i_edge, "n".into()))?
                        .with_context(|| {
                            format!("missing destination \"--n{i_state}x{i_edge}\"")
                        })?;
                if destination >= n_states {
                    bail!(
                        "edge {i_state}x{i_edge} leads to state {destination}, \
                         but only {n_states} states exist"
                    );
                }
                let kind = take_index(&mut entries, Key::Edge(i_state, i_edge, "c".into()))?
                    .with_context(|| format!("missing condition \"--c{i_state}x{i_edge}\""))?;

                let params = take_params(&mut entries, |key| {
                    matches!(key, Key::Edge(i, j, _) if *i == i_state && *j == i_edge)
                });
                let index = conditions.len();
                let prototype = condition::prototype(
                    condition_registry,
                    kind,
                    index,
                    (i_state, destination),
                    params,
                )
                .with_context(|| format!("invalid condition of edge {i_state}x{i_edge}"))?;
                conditions.push(prototype);
            }
        }

        if let Some((key, _)) = entries.into_iter().next() {
            bail!("unexpected key {}", format_key(&key));
        }

        Ok(Self {
            behaviours,
            conditions,
        })
    }

    /// Clone and initialize every prototype into a fresh tree.
    pub fn instantiate(&self) -> Result<BehaviourTree> {
        let behaviours = self
            .behaviours
            .iter()
            .map(|prototype| prototype.instantiate())
            .collect::<Result<Vec<_>>>()?;
        let conditions = self
            .conditions
            .iter()
            .map(|prototype| prototype.instantiate())
            .collect::<Result<Vec<_>>>()?;
        BehaviourTree::new(behaviours, conditions, ENTRY)
    }
}

fn tokenize(description: &str) -> Result<BTreeMap<Key, f64>> {
    let mut entries = BTreeMap::new();
    let mut tokens = description.split_whitespace();
    while let Some(token) = tokens.next() {
        let name = token
            .strip_prefix("--")
            .with_context(|| format!("expected a key starting with \"--\", found {token:?}"))?;
        let key = parse_key(name).with_context(|| format!("invalid key {token:?}"))?;
        let value = tokens
            .next()
            .with_context(|| format!("missing value for {token:?}"))?;
        let value: f64 = value
            .parse()
            .with_context(|| format!("invalid value {value:?} for {token:?}"))?;
        if entries.insert(key, value).is_some() {
            bail!("duplicate key {token:?}");
        }
    }
    Ok(entries)
}

fn parse_key(name: &str) -> Result<Key> {
    let split = name
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(name.len());
    let (prefix, suffix) = name.split_at(split);
    if prefix.is_empty() {
        bail!("key has no name");
    }
    let prefix = prefix.to_string();
    if suffix.is_empty() {
        return Ok(Key::Global(prefix));
    }
    match suffix.split_once('x') {
        None => Ok(Key::State(suffix.parse()?, prefix)),
        Some((i, j)) => Ok(Key::Edge(i.parse()?, j.parse()?, prefix)),
    }
}

fn take_index(entries: &mut BTreeMap<Key, f64>, key: Key) -> Result<Option<usize>> {
    let name = format_key(&key);
    let Some(value) = entries.remove(&key) else {
        return Ok(None);
    };
    if value < 0.0 || value.fract() != 0.0 {
        bail!("{name} must be a non-negative integer, but is {value}");
    }
    Ok(Some(value as usize))
}

fn take_params(entries: &mut BTreeMap<Key, f64>, select: impl Fn(&Key) -> bool) -> Params {
    let keys: Vec<Key> = entries.keys().filter(|key| select(key)).cloned().collect();
    let mut params = Params::new();
    for key in keys {
        let value = entries.remove(&key);
        if let (Some(value), Key::State(_, name) | Key::Edge(_, _, name)) = (value, key) {
            params.insert(name, value);
        }
    }
    params
}

fn format_key(key: &Key) -> String {
    match key {
        Key::Global(name) => format!("\"--{name}\""),
        Key::State(i, name) => format!("\"--{name}{i}\""),
        Key::Edge(i, j, name) => format!("\"--{name}{i}x{j}\""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Palette;
    use crate::state::RobotState;
    use crate::types::Color;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    const TWO_STATES: &str = "--nstates 2 \
        --s0 0 --rwm0 50 --n0 1 --n0x0 1 --c0x0 0 --p0x0 0.5 \
        --s1 1 --n1 1 --n1x0 0 --c1x0 5 --p1x0 0.25";

    #[test]
    fn parses_states_and_edges() {
        let tree = Blueprint::parse(TWO_STATES).unwrap().instantiate().unwrap();
        assert_eq!(tree.behaviours().len(), 2);
        assert_eq!(tree.conditions().len(), 2);
        assert_eq!(tree.active(), 0);

        let exploration = tree.behaviours()[0].info();
        assert_eq!(exploration.label, "Exploration");
        assert_eq!(exploration.params.get("rwm"), Some(50.0));

        let black_floor = tree.conditions()[0].info();
        assert_eq!(black_floor.label, "BlackFloor");
        assert_eq!((black_floor.origin, black_floor.extremity), (0, 1));
        assert_eq!(black_floor.params.get("p"), Some(0.5));

        let fixed = tree.conditions()[1].info();
        assert_eq!(fixed.label, "FixedProbability");
        assert_eq!(fixed.index, 1);
        assert_eq!((fixed.origin, fixed.extremity), (1, 0));
    }

    #[test]
    fn rejects_malformed_descriptions() {
        for description in [
            "",
            "--nstates 0",
            "--nstates 1",
            "--nstates 1 --s0",
            "--nstates 1 --s0 abc",
            "nstates 1 --s0 1",
            "--nstates 1 --s0 1 --s0 1",
            "--nstates 1.5 --s0 1",
            "--nstates 1 --s0 99",
            "--nstates 1 --s0 1 --n0 1 --n0x0 3 --c0x0 5 --p0x0 1",
            "--nstates 1 --s0 1 --n0 1 --n0x0 0 --c0x0 99 --p0x0 1",
            "--nstates 1 --s0 1 --n0 1 --c0x0 5 --p0x0 1",
            "--nstates 1 --s0 1 --rwm3 4",
            "--nstates 1 --s0 1 --p0x0 0.5",
            "--nstates 1 --s0 1 --foo 2",
            "--nstates 1 --s0 1 --12 2",
            "--nstates 1e19 --s0 1",
            "--nstates 1 --s0 1 --n0 1e19",
        ] {
            assert!(Blueprint::parse(description).is_err(), "{description:?}");
        }
    }

    #[test]
    fn missing_parameters_fail_at_instantiation() {
        let blueprint = Blueprint::parse("--nstates 1 --s0 0").unwrap();
        assert!(blueprint.instantiate().is_err());

        let blueprint =
            Blueprint::parse("--nstates 2 --s0 1 --n0 1 --n0x0 1 --c0x0 0 --s1 1").unwrap();
        let Err(err) = blueprint.instantiate() else {
            panic!("edge without \"p\" was instantiated");
        };
        assert!(format!("{err:#}").contains("\"p\""));
    }

    #[test]
    fn first_declared_edge_wins() {
        let blueprint = Blueprint::parse(
            "--nstates 3 --s0 1 --n0 2 \
             --n0x0 2 --c0x0 5 --p0x0 1 \
             --n0x1 1 --c0x1 5 --p0x1 1 \
             --s1 1 --s2 1",
        )
        .unwrap();
        for seed in 0..20 {
            let mut tree = blueprint.instantiate().unwrap();
            let mut state = RobotState::new(0, 1.0, Palette::default());
            let mut rng = ChaCha12Rng::seed_from_u64(seed);
            assert_eq!(tree.step(&mut state, &mut rng), Some(2));
        }
    }

    #[test]
    fn instances_run_independently() {
        let blueprint = Blueprint::parse(TWO_STATES).unwrap();
        let mut a = blueprint.instantiate().unwrap();
        let b = blueprint.instantiate().unwrap();

        let mut state = RobotState::new(0, 1.0, Palette::default());
        state.set_ground(Color::BLACK);
        let mut rng = ChaCha12Rng::seed_from_u64(5);
        while a.active() == 0 {
            a.step(&mut state, &mut rng);
        }
        assert_eq!(a.active(), 1);
        assert_eq!(b.active(), 0);
    }

    #[test]
    fn self_loops_are_allowed() {
        let blueprint =
            Blueprint::parse("--nstates 1 --s0 1 --n0 1 --n0x0 0 --c0x0 5 --p0x0 1").unwrap();
        let mut tree = blueprint.instantiate().unwrap();
        let mut state = RobotState::new(0, 1.0, Palette::default());
        let mut rng = ChaCha12Rng::seed_from_u64(0);
        assert_eq!(tree.step(&mut state, &mut rng), Some(0));
    }
}
