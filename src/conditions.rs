//! Condition kinds.

use crate::color::{self, N_LABELS};
use crate::condition::{self, Condition, ConditionInfo};
use crate::state::RobotState;
use anyhow::{Result, bail};
use rand_chacha::ChaCha12Rng;
use rand_distr::Bernoulli;

/// Gray level at or below which the floor is black.
const BLACK_THRESHOLD: f64 = 0.1;
/// Gray level at or above which the floor is white.
const WHITE_THRESHOLD: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ground {
    Black,
    Gray,
    White,
}

impl Ground {
    fn matches(self, gray: f64) -> bool {
        match self {
            Ground::Black => gray <= BLACK_THRESHOLD,
            Ground::Gray => gray > BLACK_THRESHOLD && gray < WHITE_THRESHOLD,
            Ground::White => gray >= WHITE_THRESHOLD,
        }
    }
}

/// Floor shade under the robot, gated by `p`.
#[derive(Debug, Clone)]
pub struct Floor {
    info: ConditionInfo,
    ground: Ground,
    gate: Option<Bernoulli>,
}

impl Floor {
    pub fn new(info: ConditionInfo, ground: Ground) -> Self {
        Self {
            info,
            ground,
            gate: None,
        }
    }
}

impl Condition for Floor {
    fn info(&self) -> &ConditionInfo {
        &self.info
    }

    fn init(&mut self) -> Result<()> {
        self.gate = Some(condition::gate(&self.info.params, "p")?);
        Ok(())
    }

    fn evaluate(&mut self, state: &RobotState, rng: &mut ChaCha12Rng) -> bool {
        match state.ground() {
            Some(color) if self.ground.matches(color.gray_level()) => {
                condition::draw(&self.gate, rng)
            }
            _ => false,
        }
    }
}

/// Logistic response to the number of robots in sight.
///
/// Fires with probability `1 / (1 + exp(w (p - k)))` for `k` visible
/// robots, or the complement when inverted.
#[derive(Debug, Clone)]
pub struct NeighboursCount {
    info: ConditionInfo,
    inverted: bool,
    midpoint: f64,
    steepness: f64,
}

impl NeighboursCount {
    pub fn new(info: ConditionInfo, inverted: bool) -> Self {
        Self {
            info,
            inverted,
            midpoint: 0.0,
            steepness: 0.0,
        }
    }

    pub fn probability(&self, n_neighbours: usize) -> f64 {
        let prob = 1.0 / (1.0 + (self.steepness * (self.midpoint - n_neighbours as f64)).exp());
        if self.inverted { 1.0 - prob } else { prob }
    }
}

impl Condition for NeighboursCount {
    fn info(&self) -> &ConditionInfo {
        &self.info
    }

    fn init(&mut self) -> Result<()> {
        self.midpoint = self.info.params.require("p")?;
        self.steepness = self.info.params.require("w")?;
        Ok(())
    }

    fn evaluate(&mut self, state: &RobotState, rng: &mut ChaCha12Rng) -> bool {
        condition::chance(self.probability(state.camera().len()), rng)
    }
}

/// Fires with probability `p` regardless of the sensors.
#[derive(Debug, Clone)]
pub struct FixedProbability {
    info: ConditionInfo,
    gate: Option<Bernoulli>,
}

impl FixedProbability {
    pub fn new(info: ConditionInfo) -> Self {
        Self { info, gate: None }
    }
}

impl Condition for FixedProbability {
    fn info(&self) -> &ConditionInfo {
        &self.info
    }

    fn init(&mut self) -> Result<()> {
        self.gate = Some(condition::gate(&self.info.params, "p")?);
        Ok(())
    }

    fn evaluate(&mut self, _state: &RobotState, rng: &mut ChaCha12Rng) -> bool {
        condition::draw(&self.gate, rng)
    }
}

/// Floor classified as palette label `l`, gated by `p`.
#[derive(Debug, Clone)]
pub struct FloorColor {
    info: ConditionInfo,
    label: usize,
    gate: Option<Bernoulli>,
}

impl FloorColor {
    pub fn new(info: ConditionInfo) -> Self {
        Self {
            info,
            label: 0,
            gate: None,
        }
    }
}

impl Condition for FloorColor {
    fn info(&self) -> &ConditionInfo {
        &self.info
    }

    fn init(&mut self) -> Result<()> {
        self.gate = Some(condition::gate(&self.info.params, "p")?);
        let label = self.info.params.require("l")?.round();
        if !(0.0..N_LABELS as f64).contains(&label) {
            bail!("color label must be in 0..{N_LABELS}, but is {label}");
        }
        self.label = label as usize;
        Ok(())
    }

    fn evaluate(&mut self, state: &RobotState, rng: &mut ChaCha12Rng) -> bool {
        let Some(ground) = state.ground() else {
            return false;
        };
        let label = state.palette().closest_label(color::saturate(ground));
        label == self.label && condition::draw(&self.gate, rng)
    }
}

/// Fires, gated by `p`, once its origin behaviour has been active for `t` cycles.
#[derive(Debug, Clone)]
pub struct Timeout {
    info: ConditionInfo,
    limit: u32,
    elapsed: u32,
    gate: Option<Bernoulli>,
}

impl Timeout {
    pub fn new(info: ConditionInfo) -> Self {
        Self {
            info,
            limit: 0,
            elapsed: 0,
            gate: None,
        }
    }
}

impl Condition for Timeout {
    fn info(&self) -> &ConditionInfo {
        &self.info
    }

    fn init(&mut self) -> Result<()> {
        self.limit = self.info.params.require("t")?.round().max(0.0) as u32;
        self.gate = Some(condition::gate(&self.info.params, "p")?);
        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.elapsed = 0;
    }

    fn origin_entered(&mut self) {
        self.reset();
    }

    fn evaluate(&mut self, _state: &RobotState, rng: &mut ChaCha12Rng) -> bool {
        self.elapsed = self.elapsed.saturating_add(1);
        self.elapsed >= self.limit && condition::draw(&self.gate, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Palette;
    use crate::condition::{prototype, registry};
    use crate::params::Params;
    use crate::types::{Blob, Color};
    use rand::SeedableRng;

    const N_TRIALS: usize = 2000;

    fn info(label: &str, params: &[(&str, f64)]) -> ConditionInfo {
        ConditionInfo {
            label: label.to_string(),
            index: 4,
            identifier: 0,
            origin: 1,
            extremity: 2,
            params: params.iter().copied().collect(),
        }
    }

    fn state_on(ground: Color) -> RobotState {
        let mut state = RobotState::new(0, 1.0, Palette::default());
        state.set_ground(ground);
        state
    }

    fn count_fired(condition: &mut dyn Condition, state: &RobotState) -> usize {
        let mut rng = ChaCha12Rng::seed_from_u64(3);
        (0..N_TRIALS)
            .filter(|_| condition.evaluate(state, &mut rng))
            .count()
    }

    #[test]
    fn zero_probability_never_fires() {
        let mut floor = Floor::new(info("BlackFloor", &[("p", 0.0)]), Ground::Black);
        floor.init().unwrap();
        assert_eq!(count_fired(&mut floor, &state_on(Color::BLACK)), 0);
    }

    #[test]
    fn unit_probability_always_fires_on_trigger() {
        let mut floor = Floor::new(info("BlackFloor", &[("p", 1.0)]), Ground::Black);
        floor.init().unwrap();
        assert_eq!(count_fired(&mut floor, &state_on(Color::BLACK)), N_TRIALS);
        assert_eq!(count_fired(&mut floor, &state_on(Color::WHITE)), 0);
    }

    #[test]
    fn intermediate_probability_fires_sometimes() {
        let mut fixed = FixedProbability::new(info("FixedProbability", &[("p", 0.5)]));
        fixed.init().unwrap();
        let fired = count_fired(&mut fixed, &state_on(Color::WHITE));
        assert!((800..1200).contains(&fired));
    }

    #[test]
    fn floor_shades_are_disjoint() {
        let gray = Color::new(128, 128, 128);
        for (ground, color) in [
            (Ground::Black, Color::BLACK),
            (Ground::Gray, gray),
            (Ground::White, Color::WHITE),
        ] {
            let mut floor = Floor::new(info("Floor", &[("p", 1.0)]), ground);
            floor.init().unwrap();
            for other in [Color::BLACK, gray, Color::WHITE] {
                let expected = if other == color { N_TRIALS } else { 0 };
                assert_eq!(count_fired(&mut floor, &state_on(other)), expected);
            }
        }
    }

    #[test]
    fn floor_without_ground_reading_never_fires() {
        let mut floor = Floor::new(info("WhiteFloor", &[("p", 1.0)]), Ground::White);
        floor.init().unwrap();
        let state = RobotState::new(0, 1.0, Palette::default());
        assert_eq!(count_fired(&mut floor, &state), 0);
    }

    #[test]
    fn out_of_range_probability_is_clamped() {
        let mut fixed = FixedProbability::new(info("FixedProbability", &[("p", 3.0)]));
        fixed.init().unwrap();
        assert_eq!(count_fired(&mut fixed, &state_on(Color::WHITE)), N_TRIALS);

        let mut fixed = FixedProbability::new(info("FixedProbability", &[("p", f64::NAN)]));
        assert!(fixed.init().is_err());
    }

    #[test]
    fn floor_color_matches_palette_label() {
        let mut red = FloorColor::new(info("FloorColor", &[("p", 1.0), ("l", 3.0)]));
        red.init().unwrap();
        assert_eq!(count_fired(&mut red, &state_on(Color::new(114, 26, 32))), N_TRIALS);
        assert_eq!(count_fired(&mut red, &state_on(Color::new(0, 123, 194))), 0);
    }

    #[test]
    fn neighbours_probability_is_logistic() {
        let params = [("p", 2.0), ("w", 5.0)];
        let mut count = NeighboursCount::new(info("NeighborsCount", &params), false);
        count.init().unwrap();
        assert!((count.probability(2) - 0.5).abs() < 1e-12);
        assert!(count.probability(0) < 0.01);
        assert!(count.probability(5) > 0.99);

        let mut inverted = NeighboursCount::new(info("InvertedNeighborsCount", &params), true);
        inverted.init().unwrap();
        assert!(inverted.probability(0) > 0.99);

        let mut state = state_on(Color::WHITE);
        state.set_camera(vec![Blob::default(); 6]);
        assert!(count_fired(&mut count, &state) > N_TRIALS * 99 / 100);
    }

    #[test]
    fn computed_chances_are_clamped() {
        let mut rng = ChaCha12Rng::seed_from_u64(9);
        for _ in 0..100 {
            assert!(condition::chance(1.5, &mut rng));
            assert!(!condition::chance(-0.5, &mut rng));
            assert!(!condition::chance(f64::NAN, &mut rng));
        }
    }

    #[test]
    fn timeout_counts_cycles_since_origin_entry() {
        let mut timeout = Timeout::new(info("Timeout", &[("t", 3.0), ("p", 1.0)]));
        timeout.init().unwrap();
        let state = state_on(Color::WHITE);
        let mut rng = ChaCha12Rng::seed_from_u64(0);

        assert!(!timeout.evaluate(&state, &mut rng));
        assert!(!timeout.evaluate(&state, &mut rng));
        assert!(timeout.evaluate(&state, &mut rng));

        timeout.origin_entered();
        assert_eq!(timeout.elapsed, 0);
        assert!(!timeout.evaluate(&state, &mut rng));
    }

    #[test]
    fn required_parameters_are_enforced() {
        let registry = registry();
        for (identifier, required) in [
            (0, vec!["p"]),
            (3, vec!["p", "w"]),
            (5, vec!["p"]),
            (6, vec!["p", "l"]),
            (7, vec!["t", "p"]),
        ] {
            let full: Params = required.iter().map(|&name| (name, 1.0)).collect();
            let proto = prototype(&registry, identifier, 0, (0, 1), full.clone()).unwrap();
            let instance = proto.instantiate().unwrap();
            for &name in &required {
                assert_eq!(instance.info().params.get(name), Some(1.0));
            }

            for &missing in &required {
                let partial: Params = full.iter().filter(|(name, _)| *name != missing).collect();
                let proto = prototype(&registry, identifier, 0, (0, 1), partial).unwrap();
                assert!(proto.instantiate().is_err());
            }
        }
    }

    #[test]
    fn instance_matches_prototype() {
        let params: Params = [("p", 0.3)].into_iter().collect();
        let prototype = prototype(&registry(), 2, 5, (3, 1), params).unwrap();
        let instance = prototype.instantiate().unwrap();
        assert_eq!(instance.info(), prototype.info());
        assert_eq!(instance.info().label, "WhiteFloor");
        assert_eq!((instance.info().origin, instance.info().extremity), (3, 1));
        assert_eq!(instance.dot_description(), "WhiteFloor\np=0.3");
    }

    #[test]
    fn clone_has_its_own_parameters() {
        let prototype = FixedProbability::new(info("FixedProbability", &[("p", 0.2)]));
        let mut instance = prototype.clone();
        instance.info.params.insert("p", 0.9);
        assert_eq!(prototype.info.params.get("p"), Some(0.2));
    }
}
