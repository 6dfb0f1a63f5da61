use crate::color::Palette;
use crate::types::{Blob, Color, LidarReading, LightReading, ProximityReading};

/// Latest sensor readings and pending wheel commands of one robot.
///
/// Inputs are written by the controller before each cycle, outputs by the
/// active behaviour. Conditions only read it.
#[derive(Debug, Clone)]
pub struct RobotState {
    robot_id: u32,
    max_velocity: f64,
    palette: Palette,

    proximity: Vec<ProximityReading>,
    ground: Option<Color>,
    light: LightReading,
    lidar: Vec<LidarReading>,
    camera: Vec<Blob>,

    left_velocity: f64,
    right_velocity: f64,
}

impl RobotState {
    pub fn new(robot_id: u32, max_velocity: f64, palette: Palette) -> Self {
        Self {
            robot_id,
            max_velocity,
            palette,
            proximity: Vec::new(),
            ground: None,
            light: LightReading::default(),
            lidar: Vec::new(),
            camera: Vec::new(),
            left_velocity: 0.0,
            right_velocity: 0.0,
        }
    }

    /// Clear readings and commands, keeping identity and configuration.
    pub fn reset(&mut self) {
        self.proximity.clear();
        self.ground = None;
        self.light = LightReading::default();
        self.lidar.clear();
        self.camera.clear();
        self.left_velocity = 0.0;
        self.right_velocity = 0.0;
    }

    pub fn robot_id(&self) -> u32 {
        self.robot_id
    }

    pub fn max_velocity(&self) -> f64 {
        self.max_velocity
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn proximity(&self) -> &[ProximityReading] {
        &self.proximity
    }

    pub fn set_proximity(&mut self, readings: Vec<ProximityReading>) {
        self.proximity = readings;
    }

    /// Ground color under the robot, `None` until a ground sensor reports.
    pub fn ground(&self) -> Option<Color> {
        self.ground
    }

    pub fn set_ground(&mut self, color: Color) {
        self.ground = Some(color);
    }

    pub fn light(&self) -> LightReading {
        self.light
    }

    pub fn set_light(&mut self, reading: LightReading) {
        self.light = reading;
    }

    pub fn lidar(&self) -> &[LidarReading] {
        &self.lidar
    }

    pub fn set_lidar(&mut self, readings: Vec<LidarReading>) {
        self.lidar = readings;
    }

    pub fn camera(&self) -> &[Blob] {
        &self.camera
    }

    pub fn set_camera(&mut self, blobs: Vec<Blob>) {
        self.camera = blobs;
    }

    pub fn wheels(&self) -> (f64, f64) {
        (self.left_velocity, self.right_velocity)
    }

    /// Set the wheel commands, clamped to the maximum velocity.
    pub fn set_wheels(&mut self, left: f64, right: f64) {
        let max = self.max_velocity;
        self.left_velocity = left.clamp(-max, max);
        self.right_velocity = right.clamp(-max, max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_keeps_identity_and_configuration() {
        let mut state = RobotState::new(7, 0.5, Palette::default());
        state.set_ground(Color::BLACK);
        state.set_proximity(vec![ProximityReading {
            value: 0.8,
            angle: 0.0,
        }]);
        state.set_wheels(0.3, -0.3);

        state.reset();

        assert_eq!(state.robot_id(), 7);
        assert_eq!(state.max_velocity(), 0.5);
        assert_eq!(state.ground(), None);
        assert!(state.proximity().is_empty());
        assert_eq!(state.wheels(), (0.0, 0.0));
    }

    #[test]
    fn wheel_commands_are_clamped() {
        let mut state = RobotState::new(0, 0.5, Palette::default());
        state.set_wheels(2.0, -2.0);
        assert_eq!(state.wheels(), (0.5, -0.5));
    }
}
