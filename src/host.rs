use crate::types::{Blob, Color, LidarReading, LightReading, ProximityReading};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sensors and actuators a controller may request from its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Proximity,
    Light,
    Ground,
    Lidar,
    Camera,
    Wheels,
}

impl Device {
    pub const ALL: [Device; 6] = [
        Device::Proximity,
        Device::Light,
        Device::Ground,
        Device::Lidar,
        Device::Camera,
        Device::Wheels,
    ];
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Device::Proximity => "proximity sensor",
            Device::Light => "light sensor",
            Device::Ground => "ground color sensor",
            Device::Lidar => "lidar",
            Device::Camera => "omnidirectional camera",
            Device::Wheels => "wheels actuator",
        };
        f.write_str(name)
    }
}

/// Robot runtime that owns the hardware (or its simulation).
///
/// Readings are valid for the current cycle only. Readers are only called
/// for devices that were acquired successfully.
pub trait RobotHost {
    /// Host identifier of the robot, e.g. `rvr12`.
    fn id(&self) -> &str;

    /// Make a device available to the controller.
    fn acquire(&mut self, device: Device) -> Result<()>;

    fn proximity(&self) -> Vec<ProximityReading>;
    fn light(&self) -> LightReading;
    fn ground(&self) -> Color;
    fn lidar(&self) -> Vec<LidarReading>;
    fn camera(&self) -> Vec<Blob>;

    fn set_wheels(&mut self, left: f64, right: f64);
}
