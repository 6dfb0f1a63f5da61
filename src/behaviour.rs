use crate::exploration::Exploration;
use crate::params::{self, Params};
use crate::registry::Registry;
use crate::state::RobotState;
use crate::steering::{Steering, Target};
use crate::types::{self, Vector2, polar};
use anyhow::{Context, Result};
use rand_chacha::ChaCha12Rng;
use std::f64::consts::PI;

/// Identity and parameters shared by every behaviour kind.
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviourInfo {
    /// Kind name.
    pub label: String,
    /// Position of the node within its tree.
    pub index: usize,
    /// Kind identifier.
    pub identifier: usize,
    pub params: Params,
}

/// Motion primitive executed one control cycle at a time.
///
/// Instances are obtained from a parsed prototype with
/// [`Behaviour::instantiate`], which clones it and runs [`Behaviour::init`].
pub trait Behaviour: BehaviourClone {
    fn info(&self) -> &BehaviourInfo;

    /// Validate parameters and bring internal state to its baseline.
    fn init(&mut self) -> Result<()>;

    /// Restart internal state from the baseline.
    fn reset(&mut self);

    /// Prepare for re-entry after the tree switched back to this node.
    ///
    /// Kinds without cross-visit state restart from the baseline.
    fn resume(&mut self) {
        self.reset();
    }

    /// Advance one control cycle, writing wheel commands into `state`.
    fn step(&mut self, state: &mut RobotState, rng: &mut ChaCha12Rng);

    fn dot_description(&self) -> String {
        let info = self.info();
        params::describe(&info.label, &info.params)
    }

    /// Fresh, independently owned and initialized copy of this prototype.
    fn instantiate(&self) -> Result<Box<dyn Behaviour>> {
        let mut behaviour = self.clone_box();
        behaviour.init().with_context(|| {
            let info = self.info();
            format!(
                "failed to initialize behaviour {} ({} #{})",
                info.index, info.label, info.identifier
            )
        })?;
        Ok(behaviour)
    }
}

pub trait BehaviourClone {
    fn clone_box(&self) -> Box<dyn Behaviour>;
}

impl<T: Behaviour + Clone + 'static> BehaviourClone for T {
    fn clone_box(&self) -> Box<dyn Behaviour> {
        Box::new(self.clone())
    }
}

pub type BehaviourConstructor = fn(BehaviourInfo) -> Box<dyn Behaviour>;

/// Registry of every behaviour kind, in identifier order.
pub fn registry() -> Registry<BehaviourConstructor> {
    let mut registry: Registry<BehaviourConstructor> = Registry::new();
    registry.register("Exploration", |info| Box::new(Exploration::new(info)));
    registry.register("Stop", |info| Box::new(Stop::new(info)));
    registry.register("Phototaxis", |info| {
        Box::new(Steering::new(info, Target::Light, true))
    });
    registry.register("AntiPhototaxis", |info| {
        Box::new(Steering::new(info, Target::Light, false))
    });
    registry.register("Attraction", |info| {
        Box::new(Steering::new(info, Target::Neighbours, true))
    });
    registry.register("Repulsion", |info| {
        Box::new(Steering::new(info, Target::Neighbours, false))
    });
    registry.register("GoToColor", |info| {
        Box::new(Steering::new(info, Target::Color, true))
    });
    registry.register("GoAwayColor", |info| {
        Box::new(Steering::new(info, Target::Color, false))
    });
    registry
}

/// Build an uninitialized prototype of the kind `identifier`.
pub fn prototype(
    registry: &Registry<BehaviourConstructor>,
    identifier: usize,
    index: usize,
    params: Params,
) -> Result<Box<dyn Behaviour>> {
    let (label, constructor) = registry.get(identifier)?;
    Ok(constructor(BehaviourInfo {
        label: label.to_string(),
        index,
        identifier,
        params,
    }))
}

/// Keeps the robot still.
#[derive(Debug, Clone)]
pub struct Stop {
    info: BehaviourInfo,
}

impl Stop {
    pub fn new(info: BehaviourInfo) -> Self {
        Self { info }
    }
}

impl Behaviour for Stop {
    fn info(&self) -> &BehaviourInfo {
        &self.info
    }

    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn reset(&mut self) {}

    fn step(&mut self, state: &mut RobotState, _rng: &mut ChaCha12Rng) {
        state.set_wheels(0.0, 0.0);
    }
}

/// Wheel velocities that steer the robot along `vector`.
///
/// A vector in the left hemisphere slows the left wheel, one in the right
/// hemisphere slows the right wheel. A null vector drives straight ahead.
pub fn wheels_from_vector(vector: Vector2, max_velocity: f64) -> (f64, f64) {
    if vector.norm() < f64::EPSILON {
        return (max_velocity, max_velocity);
    }
    let angle = types::bearing(&vector);
    let (left, right) = if angle > 0.0 && angle <= PI {
        (angle.cos(), 1.0)
    } else {
        (1.0, angle.cos())
    };
    (left * max_velocity, right * max_velocity)
}

/// Sum of the proximity readings as vectors pointing at the obstacles.
pub fn proximity_vector(state: &RobotState) -> Vector2 {
    let mut sum = Vector2::zeros();
    for reading in state.proximity() {
        sum += polar(reading.value, reading.angle);
    }
    sum
}
