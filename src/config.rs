use crate::builder::Blueprint;
use crate::color::Palette;
use crate::host::Device;
use crate::types::Color;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Experiment configuration.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    pub controller: ControllerConfig,
    pub arena: ArenaConfig,
    pub run: RunConfig,
}

/// Per-robot controller parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Textual tree description (see [`crate::builder`]).
    pub tree: String,
    /// Maximum wheel velocity (m/s).
    #[serde(default = "default_velocity")]
    pub velocity: f64,
    /// Write a DOT description of the tree into each run directory.
    #[serde(default)]
    pub readable: bool,
    /// Record the history of every robot.
    #[serde(default)]
    pub history: bool,
    /// Reference colors used for color classification.
    #[serde(default)]
    pub palette: Palette,
}

/// Simulated square arena, centered on the origin.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ArenaConfig {
    /// Side length (m).
    pub size: f64,
    /// Floor color outside the patches.
    #[serde(default = "default_floor")]
    pub floor: Color,
    #[serde(default)]
    pub patches: Vec<Patch>,
    /// Light source position, if any.
    #[serde(default)]
    pub light: Option<[f64; 2]>,
    /// Blob color robots show to each other's cameras.
    #[serde(default = "default_robot_color")]
    pub robot_color: Color,
    /// Devices the simulated robots lack.
    #[serde(default)]
    pub disabled: Vec<Device>,
}

/// Circular floor patch.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Patch {
    pub center: [f64; 2],
    pub radius: f64,
    pub color: Color,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub n_robots: usize,
    #[serde(default = "default_n_trials")]
    pub n_trials: usize,
    /// Control cycles per trial.
    pub n_steps: usize,
    /// Seed of the random number generators; drawn from the OS if absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_velocity() -> f64 {
    0.3
}

fn default_floor() -> Color {
    Color::new(128, 128, 128)
}

fn default_robot_color() -> Color {
    Color::new(0, 255, 255)
}

fn default_n_trials() -> usize {
    1
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters, including building the tree
    /// once, before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        check_num(self.controller.velocity, 0.0..=10.0).context("invalid maximum velocity")?;
        Blueprint::parse(&self.controller.tree)
            .and_then(|blueprint| blueprint.instantiate())
            .context("invalid tree description")?;

        check_num(self.arena.size, 0.5..=100.0).context("invalid arena size")?;
        for (i_patch, patch) in self.arena.patches.iter().enumerate() {
            check_num(patch.radius, 0.0..=self.arena.size)
                .with_context(|| format!("invalid radius of patch {i_patch}"))?;
        }

        check_num(self.run.n_robots, 1..1_000).context("invalid number of robots")?;
        check_num(self.run.n_trials, 1..1_000).context("invalid number of trials")?;
        check_num(self.run.n_steps, 1..10_000_000).context("invalid number of steps")?;

        Ok(())
    }
}

pub fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[controller]
tree = "--nstates 1 --s0 1"

[arena]
size = 2.0

[run]
n_robots = 4
n_steps = 100
"#;

    #[test]
    fn defaults_fill_optional_fields() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        config.validate().unwrap();
        assert_eq!(config.controller.velocity, 0.3);
        assert_eq!(config.controller.palette, Palette::default());
        assert_eq!(config.run.n_trials, 1);
        assert_eq!(config.run.seed, None);
        assert!(config.arena.disabled.is_empty());
    }

    #[test]
    fn parses_patches_palette_and_devices() {
        let contents = String::from(MINIMAL)
            + "\n[[arena.patches]]\ncenter = [0.5, 0.5]\nradius = 0.3\ncolor = [0, 0, 0]\n";
        let mut config: Config = toml::from_str(&contents).unwrap();
        assert_eq!(config.arena.patches[0].color, Color::BLACK);

        let table = r#"
[controller]
tree = "--nstates 1 --s0 1"
palette = [[0, 0, 0], [1, 1, 1], [2, 2, 2], [3, 3, 3], [4, 4, 4], [5, 5, 5], [6, 6, 6]]

[arena]
size = 2.0
disabled = ["lidar", "wheels"]

[run]
n_robots = 1
n_steps = 1
"#;
        config = toml::from_str(table).unwrap();
        let grays = std::array::from_fn(|i| Color::new(i as u8, i as u8, i as u8));
        assert_eq!(config.controller.palette, Palette::new(grays));
        assert_eq!(config.arena.disabled, vec![Device::Lidar, Device::Wheels]);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.run.n_robots = 0;
        assert!(config.validate().is_err());

        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.controller.tree = "--nstates 1 --s0 0".into();
        assert!(config.validate().is_err());

        let short_palette = MINIMAL.replace(
            "tree = \"--nstates 1 --s0 1\"",
            "tree = \"--nstates 1 --s0 1\"\npalette = [[0, 0, 0]]",
        );
        assert!(toml::from_str::<Config>(&short_palette).is_err());
    }
}
