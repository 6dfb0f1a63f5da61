use crate::conditions::{FixedProbability, Floor, FloorColor, Ground, NeighboursCount, Timeout};
use crate::params::{self, Params};
use crate::registry::Registry;
use crate::state::RobotState;
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::Bernoulli;

/// Identity, edge and parameters shared by every condition kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionInfo {
    /// Kind name.
    pub label: String,
    /// Position of the edge within its tree.
    pub index: usize,
    /// Kind identifier.
    pub identifier: usize,
    /// Behaviour the edge leaves from.
    pub origin: usize,
    /// Behaviour the edge leads to.
    pub extremity: usize,
    pub params: Params,
}

/// Predicate gating the transition from one behaviour to another.
pub trait Condition: ConditionClone {
    fn info(&self) -> &ConditionInfo;

    /// Validate parameters and bring internal counters to their baseline.
    fn init(&mut self) -> Result<()>;

    /// Bring internal counters back to their post-init baseline.
    fn reset(&mut self) {}

    /// Called each time the origin behaviour becomes active.
    fn origin_entered(&mut self) {}

    /// Whether the transition should fire this cycle.
    fn evaluate(&mut self, state: &RobotState, rng: &mut ChaCha12Rng) -> bool;

    fn dot_description(&self) -> String {
        let info = self.info();
        params::describe(&info.label, &info.params)
    }

    /// Fresh, independently owned and initialized copy of this prototype.
    fn instantiate(&self) -> Result<Box<dyn Condition>> {
        let mut condition = self.clone_box();
        condition.init().with_context(|| {
            let info = self.info();
            format!(
                "failed to initialize condition {} ({} #{}, {} -> {})",
                info.index, info.label, info.identifier, info.origin, info.extremity
            )
        })?;
        Ok(condition)
    }
}

pub trait ConditionClone {
    fn clone_box(&self) -> Box<dyn Condition>;
}

impl<T: Condition + Clone + 'static> ConditionClone for T {
    fn clone_box(&self) -> Box<dyn Condition> {
        Box::new(self.clone())
    }
}

pub type ConditionConstructor = fn(ConditionInfo) -> Box<dyn Condition>;

/// Registry of every condition kind, in identifier order.
pub fn registry() -> Registry<ConditionConstructor> {
    let mut registry: Registry<ConditionConstructor> = Registry::new();
    registry.register("BlackFloor", |info| Box::new(Floor::new(info, Ground::Black)));
    registry.register("GrayFloor", |info| Box::new(Floor::new(info, Ground::Gray)));
    registry.register("WhiteFloor", |info| Box::new(Floor::new(info, Ground::White)));
    registry.register("NeighborsCount", |info| Box::new(NeighboursCount::new(info, false)));
    registry.register("InvertedNeighborsCount", |info| {
        Box::new(NeighboursCount::new(info, true))
    });
    registry.register("FixedProbability", |info| Box::new(FixedProbability::new(info)));
    registry.register("FloorColor", |info| Box::new(FloorColor::new(info)));
    registry.register("Timeout", |info| Box::new(Timeout::new(info)));
    registry
}

/// Build an uninitialized prototype of the kind `identifier` on the edge
/// `origin -> extremity`.
pub fn prototype(
    registry: &Registry<ConditionConstructor>,
    identifier: usize,
    index: usize,
    (origin, extremity): (usize, usize),
    params: Params,
) -> Result<Box<dyn Condition>> {
    let (label, constructor) = registry.get(identifier)?;
    Ok(constructor(ConditionInfo {
        label: label.to_string(),
        index,
        identifier,
        origin,
        extremity,
        params,
    }))
}

/// Bernoulli gate built from the probability parameter `name`.
///
/// Out-of-range probabilities are clamped to `[0, 1]`.
pub fn gate(params: &Params, name: &str) -> Result<Bernoulli> {
    let prob = params.require(name)?;
    if prob.is_nan() {
        bail!("probability {name:?} is not a number");
    }
    Bernoulli::new(prob.clamp(0.0, 1.0)).with_context(|| format!("invalid probability {prob}"))
}

/// Draw from a gate; an uninitialized gate never passes.
pub fn draw(gate: &Option<Bernoulli>, rng: &mut ChaCha12Rng) -> bool {
    gate.as_ref().is_some_and(|gate| gate.sample(rng))
}

/// Draw once with a probability known only at evaluation time.
///
/// The probability is clamped into `[0, 1]`; NaN never passes.
pub fn chance(prob: f64, rng: &mut ChaCha12Rng) -> bool {
    Bernoulli::new(prob.clamp(0.0, 1.0)).is_ok_and(|gate| gate.sample(rng))
}
