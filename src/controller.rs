use crate::color::Palette;
use crate::host::{Device, RobotHost};
use crate::state::RobotState;
use crate::tree::BehaviourTree;
use rand_chacha::ChaCha12Rng;
use std::collections::BTreeSet;

/// Per-robot control loop glue between a host and a behaviour tree.
pub struct Controller {
    state: RobotState,
    tree: BehaviourTree,
    rng: ChaCha12Rng,
    devices: BTreeSet<Device>,
    time_step: usize,
}

impl Controller {
    /// Attach `tree` to the robot driven by `host`.
    ///
    /// Devices the host cannot provide are logged and left out; the
    /// controller then runs without them.
    pub fn new(
        host: &mut dyn RobotHost,
        tree: BehaviourTree,
        max_velocity: f64,
        palette: Palette,
        rng: ChaCha12Rng,
    ) -> Self {
        let robot_id = parse_robot_id(host.id());

        let mut devices = BTreeSet::new();
        for device in Device::ALL {
            match host.acquire(device) {
                Ok(()) => {
                    devices.insert(device);
                }
                Err(error) => log::error!("{}: failed to acquire {device}: {error:#}", host.id()),
            }
        }

        Self {
            state: RobotState::new(robot_id, max_velocity, palette),
            tree,
            rng,
            devices,
            time_step: 0,
        }
    }

    /// Run one control cycle: refresh inputs, step the tree, apply outputs.
    ///
    /// Returns the new behaviour node if a transition fired.
    pub fn control_step(&mut self, host: &mut dyn RobotHost) -> Option<usize> {
        if self.has(Device::Ground) {
            self.state.set_ground(host.ground());
        }
        if self.has(Device::Light) {
            self.state.set_light(host.light());
        }
        if self.has(Device::Proximity) {
            self.state.set_proximity(host.proximity());
        }
        if self.has(Device::Lidar) {
            self.state.set_lidar(host.lidar());
        }
        if self.has(Device::Camera) {
            self.state.set_camera(host.camera());
        }

        let transition = self.tree.step(&mut self.state, &mut self.rng);

        if self.has(Device::Wheels) {
            let (left, right) = self.state.wheels();
            host.set_wheels(left, right);
        }

        self.time_step += 1;
        transition
    }

    /// Restart the tree and clear the robot state for a new trial.
    pub fn reset(&mut self) {
        self.tree.reset();
        self.state.reset();
        self.time_step = 0;
    }

    pub fn has(&self, device: Device) -> bool {
        self.devices.contains(&device)
    }

    pub fn active(&self) -> usize {
        self.tree.active()
    }

    #[cfg(test)]
    pub fn state(&self) -> &RobotState {
        &self.state
    }

    pub fn tree(&self) -> &BehaviourTree {
        &self.tree
    }

    pub fn time_step(&self) -> usize {
        self.time_step
    }
}

/// Numeric part of a host identifier such as `rvr12`; 0 when there is none.
fn parse_robot_id(id: &str) -> u32 {
    let digits: String = id.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or_else(|_| {
        log::warn!("robot identifier {id:?} has no numeric part, using 0");
        0
    })
}
