//! Behaviours that follow a vector built from the light, the neighbours or
//! colored blobs, with a repulsive term from the proximity sensors.

use crate::behaviour::{self, Behaviour, BehaviourInfo};
use crate::color::{self, N_LABELS};
use crate::state::RobotState;
use crate::types::{Vector2, polar};
use anyhow::{Result, bail};
use rand_chacha::ChaCha12Rng;

/// Weight of the obstacle term against the target vector.
const OBSTACLE_GAIN: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Light,
    Neighbours,
    Color,
}

#[derive(Debug, Clone)]
pub struct Steering {
    info: BehaviourInfo,
    target: Target,
    towards: bool,

    gain: f64,
    label: usize,
}

impl Steering {
    pub fn new(info: BehaviourInfo, target: Target, towards: bool) -> Self {
        Self {
            info,
            target,
            towards,
            gain: 1.0,
            label: 0,
        }
    }

    fn target_vector(&self, state: &RobotState) -> Vector2 {
        let vector = match self.target {
            Target::Light => {
                let light = state.light();
                polar(light.value, light.angle)
            }
            Target::Neighbours => {
                let mut sum = Vector2::zeros();
                for blob in state.camera() {
                    let weight = if self.towards {
                        self.gain / (blob.distance + 1.0)
                    } else {
                        self.gain / (blob.distance + 1.0).powi(2)
                    };
                    sum += polar(weight, blob.angle);
                }
                sum
            }
            Target::Color => {
                let palette = state.palette();
                let mut sum = Vector2::zeros();
                for blob in state.camera() {
                    if palette.closest_label(color::saturate(blob.color)) == self.label {
                        sum += polar(1.0 / (blob.distance + 1.0), blob.angle);
                    }
                }
                sum
            }
        };
        if self.towards { vector } else { -vector }
    }
}

impl Behaviour for Steering {
    fn info(&self) -> &BehaviourInfo {
        &self.info
    }

    fn init(&mut self) -> Result<()> {
        let params = &self.info.params;
        match self.target {
            Target::Light => {}
            Target::Neighbours => {
                self.gain = params.require(if self.towards { "att" } else { "rep" })?;
            }
            Target::Color => {
                let label = params.require("c")?.round();
                if !(0.0..N_LABELS as f64).contains(&label) {
                    bail!("color label must be in 0..{N_LABELS}, but is {label}");
                }
                self.label = label as usize;
            }
        }
        Ok(())
    }

    fn reset(&mut self) {}

    fn step(&mut self, state: &mut RobotState, _rng: &mut ChaCha12Rng) {
        let vector = self.target_vector(state) - behaviour::proximity_vector(state) * OBSTACLE_GAIN;
        let (left, right) = behaviour::wheels_from_vector(vector, state.max_velocity());
        state.set_wheels(left, right);
    }
}
