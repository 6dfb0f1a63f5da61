use crate::behaviour::{Behaviour, BehaviourInfo};
use crate::state::RobotState;
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::Uniform;
use std::f64::consts::FRAC_PI_4;

const DEFAULT_PROXIMITY_THRESHOLD: f64 = 0.1;
const DEFAULT_MIN_TURN_STEPS: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    RandomWalk,
    ObstacleAvoidance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnDirection {
    Left,
    Right,
}

/// Straight-line walk that turns in place for a random number of cycles
/// whenever an obstacle shows up on the proximity sensors.
///
/// Parameters: `rwm` (required) upper bound of the turn length in cycles,
/// `rwmin` lower bound (default 1), `prox` detection threshold (default 0.1).
/// With `lidar` set, a lidar ray within 45 degrees of the heading shorter
/// than that range (m) also counts as an obstacle.
#[derive(Debug, Clone)]
pub struct Exploration {
    info: BehaviourInfo,

    proximity_threshold: f64,
    lidar_range: Option<f64>,
    turn_steps_dist: Option<Uniform<u32>>,

    phase: Phase,
    turn_direction: TurnDirection,
    turn_steps: u32,
}

impl Exploration {
    pub fn new(info: BehaviourInfo) -> Self {
        Self {
            info,
            proximity_threshold: DEFAULT_PROXIMITY_THRESHOLD,
            lidar_range: None,
            turn_steps_dist: None,
            phase: Phase::RandomWalk,
            turn_direction: TurnDirection::Left,
            turn_steps: 0,
        }
    }

    /// Bearing of the first reading that signals an obstacle.
    fn obstacle(&self, state: &RobotState) -> Option<f64> {
        let proximity = state
            .proximity()
            .iter()
            .find(|reading| reading.value > self.proximity_threshold)
            .map(|reading| reading.angle);
        proximity.or_else(|| {
            let range = self.lidar_range?;
            state
                .lidar()
                .iter()
                .filter(|reading| reading.angle.abs() <= FRAC_PI_4 && reading.distance < range)
                .min_by(|a, b| a.distance.total_cmp(&b.distance))
                .map(|reading| reading.angle)
        })
    }

    fn start_turn(&mut self, obstacle_angle: f64, rng: &mut ChaCha12Rng) {
        // Turn away from the side the obstacle is on.
        self.turn_direction = if obstacle_angle >= 0.0 {
            TurnDirection::Right
        } else {
            TurnDirection::Left
        };
        self.turn_steps = match &self.turn_steps_dist {
            Some(dist) => dist.sample(rng),
            None => 1,
        };
        self.phase = Phase::ObstacleAvoidance;
    }

    fn turn(&self, state: &mut RobotState) {
        let max = state.max_velocity();
        match self.turn_direction {
            TurnDirection::Left => state.set_wheels(-max, max),
            TurnDirection::Right => state.set_wheels(max, -max),
        }
    }
}

impl Behaviour for Exploration {
    fn info(&self) -> &BehaviourInfo {
        &self.info
    }

    fn init(&mut self) -> Result<()> {
        let params = &self.info.params;
        let max_steps = params.require("rwm")?;
        let min_steps = params.get_or("rwmin", DEFAULT_MIN_TURN_STEPS);
        let dist = Uniform::new_inclusive(min_steps.round() as u32, max_steps.round() as u32)
            .with_context(|| format!("invalid turn range [{min_steps}, {max_steps}]"))?;
        self.turn_steps_dist = Some(dist);
        self.proximity_threshold = params.get_or("prox", DEFAULT_PROXIMITY_THRESHOLD);
        self.lidar_range = params.get("lidar");
        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.phase = Phase::RandomWalk;
        self.turn_direction = TurnDirection::Left;
        self.turn_steps = 0;
    }

    /// A revisit picks up an interrupted turn where it stopped.
    fn resume(&mut self) {}

    fn step(&mut self, state: &mut RobotState, rng: &mut ChaCha12Rng) {
        match self.phase {
            Phase::RandomWalk => {
                match self.obstacle(state) {
                    Some(angle) => {
                        self.start_turn(angle, rng);
                        self.turn(state);
                    }
                    None => {
                        let max = state.max_velocity();
                        state.set_wheels(max, max);
                    }
                }
            }
            Phase::ObstacleAvoidance => {
                self.turn(state);
                self.turn_steps = self.turn_steps.saturating_sub(1);
                if self.turn_steps == 0 {
                    self.phase = Phase::RandomWalk;
                }
            }
        }
    }
}
