//! Sensor reading and record data types.

use serde::{Deserialize, Serialize};

/// RGB color as reported by the ground sensor and the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const WHITE: Color = Color::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Luminance of the color, normalized to `[0, 1]`.
    pub fn gray_level(&self) -> f64 {
        (0.299 * self.r as f64 + 0.587 * self.g as f64 + 0.114 * self.b as f64) / 255.0
    }
}

impl From<[u8; 3]> for Color {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

impl From<Color> for [u8; 3] {
    fn from(color: Color) -> Self {
        [color.r, color.g, color.b]
    }
}

/// Planar vector in the robot frame (x forward, y left).
pub type Vector2 = nalgebra::Vector2<f64>;

pub fn polar(length: f64, angle: f64) -> Vector2 {
    Vector2::new(length * angle.cos(), length * angle.sin())
}

/// Angle of `vector` in `(-pi, pi]`.
pub fn bearing(vector: &Vector2) -> f64 {
    vector.y.atan2(vector.x)
}

/// Single proximity sensor reading.
///
/// `value` is an intensity in `[0, 1]` (1 means touching), `angle` is the
/// sensor bearing in radians relative to the robot heading.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProximityReading {
    pub value: f64,
    pub angle: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LightReading {
    pub value: f64,
    pub angle: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LidarReading {
    pub distance: f64,
    pub angle: f64,
}

/// Colored blob seen by the omnidirectional camera.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Blob {
    pub color: Color,
    pub distance: f64,
    pub angle: f64,
}

/// Leading entry of a history file, sizing the records that follow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryHeader {
    pub n_robots: usize,
    pub n_nodes: usize,
    pub n_trials: usize,
    pub n_steps: usize,
}

impl HistoryHeader {
    /// Number of records that follow, `None` on overflow.
    pub fn n_records(&self) -> Option<usize> {
        self.n_trials
            .checked_mul(self.n_steps)?
            .checked_mul(self.n_robots)
    }
}

/// Record of one robot at a single control cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub trial: usize,

    /// Control cycle within the trial.
    pub step: usize,

    /// Robot index within the run.
    pub robot: usize,

    /// Active behaviour node after the cycle.
    pub node: usize,

    pub left: f64,
    pub right: f64,
}
