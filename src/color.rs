//! Color classification against a fixed palette of reference labels.

use crate::types::Color;
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Number of reference labels in a palette.
pub const N_LABELS: usize = 7;

/// Channel maximum at or below which a sample counts as black.
const DARK_CHANNEL_MAX: u8 = 10;

/// Reference colors indexed by label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Color>", into = "Vec<Color>")]
pub struct Palette {
    labels: [Color; N_LABELS],
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            labels: [
                Color::new(0, 0, 0),
                Color::new(0, 255, 0),
                Color::new(0, 123, 194),
                Color::new(228, 53, 64),
                Color::new(252, 238, 33),
                Color::new(126, 79, 154),
                Color::new(0, 255, 255),
            ],
        }
    }
}

impl TryFrom<Vec<Color>> for Palette {
    type Error = anyhow::Error;

    fn try_from(vec: Vec<Color>) -> Result<Self> {
        let len = vec.len();
        let Ok(labels) = <[Color; N_LABELS]>::try_from(vec) else {
            bail!("palette must have {N_LABELS} colors, but has {len}");
        };
        Ok(Self { labels })
    }
}

impl From<Palette> for Vec<Color> {
    fn from(palette: Palette) -> Self {
        palette.labels.to_vec()
    }
}

impl Palette {
    pub fn new(labels: [Color; N_LABELS]) -> Self {
        Self { labels }
    }

    /// Label of the reference color nearest to `color` in RGB space.
    ///
    /// Ties go to the lowest label.
    pub fn closest_label(&self, color: Color) -> usize {
        let mut closest = 0;
        let mut min_dist = f64::MAX;
        for (label, reference) in self.labels.iter().enumerate() {
            let dist = distance(*reference, color);
            if dist < min_dist {
                min_dist = dist;
                closest = label;
            }
        }
        closest
    }
}

/// Rescale `color` so that its brightest channel reaches 255.
pub fn saturate(color: Color) -> Color {
    let max = color.r.max(color.g).max(color.b);
    if max <= DARK_CHANNEL_MAX {
        return Color::BLACK;
    }
    let factor = 255.0 / max as f64;
    let scale = |channel: u8| (channel as f64 * factor).min(255.0) as u8;
    Color::new(scale(color.r), scale(color.g), scale(color.b))
}

fn distance(a: Color, b: Color) -> f64 {
    let dr = a.r as f64 - b.r as f64;
    let dg = a.g as f64 - b.g as f64;
    let db = a.b as f64 - b.b as f64;
    (dr * dr + dg * dg + db * db).sqrt()
}
