use crate::config::ArenaConfig;
use crate::host::{Device, RobotHost};
use crate::types::{self, Blob, Color, LidarReading, LightReading, ProximityReading, Vector2, polar};
use anyhow::{Result, bail};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::Uniform;
use std::f64::consts::{FRAC_PI_2, PI, TAU};

pub const ROBOT_RADIUS: f64 = 0.1;
pub const AXLE_LENGTH: f64 = 0.2;
/// Duration of one control cycle (s).
pub const TIME_STEP: f64 = 0.1;

const N_PROXIMITY: usize = 8;
const PROXIMITY_RANGE: f64 = 0.3;
const N_LIDAR: usize = 12;
const LIDAR_RANGE: f64 = 4.0;
const CAMERA_RANGE: f64 = 1.5;
const MAX_PLACEMENT_ATTEMPTS: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Body {
    position: Vector2,
    heading: f64,
}

/// Square arena with walls, floor patches and an optional light source.
///
/// Robots are disks driven by differential kinematics. Each robot is seen
/// by its controller through a [`RobotView`].
pub struct Arena {
    cfg: ArenaConfig,
    bodies: Vec<Body>,
}

impl Arena {
    pub fn new(cfg: ArenaConfig, n_robots: usize, rng: &mut ChaCha12Rng) -> Result<Self> {
        let mut arena = Self {
            cfg,
            bodies: Vec::with_capacity(n_robots),
        };
        arena.place(n_robots, rng)?;
        Ok(arena)
    }

    /// Scatter `n_robots` robots at random, non-overlapping poses.
    pub fn place(&mut self, n_robots: usize, rng: &mut ChaCha12Rng) -> Result<()> {
        let limit = self.limit();
        let coord_dist = Uniform::new_inclusive(-limit, limit)?;
        let heading_dist = Uniform::new(-PI, PI)?;

        self.bodies.clear();
        for i_robot in 0..n_robots {
            let position = (0..MAX_PLACEMENT_ATTEMPTS)
                .map(|_| Vector2::new(coord_dist.sample(rng), coord_dist.sample(rng)))
                .find(|&position| self.is_free(position, None));
            let Some(position) = position else {
                bail!("failed to place robot {i_robot} after {MAX_PLACEMENT_ATTEMPTS} attempts");
            };
            let heading = heading_dist.sample(rng);
            self.bodies.push(Body { position, heading });
        }

        Ok(())
    }

    pub fn view(&self, robot: usize) -> RobotView<'_> {
        RobotView {
            arena: self,
            robot,
            id: format!("rvr{robot}"),
            wheels: (0.0, 0.0),
        }
    }

    /// Move every robot by one time step under its wheel velocities.
    ///
    /// A move that would leave the arena is clipped at the wall; a move into
    /// another robot is cancelled.
    pub fn advance(&mut self, wheels: &[(f64, f64)]) {
        let limit = self.limit();
        for (i_robot, &(left, right)) in wheels.iter().enumerate() {
            let body = self.bodies[i_robot];
            let velocity = 0.5 * (left + right);
            let heading = wrap_angle(body.heading + (right - left) / AXLE_LENGTH * TIME_STEP);
            let mut position = body.position + polar(velocity * TIME_STEP, heading);
            position.x = position.x.clamp(-limit, limit);
            position.y = position.y.clamp(-limit, limit);

            if !self.is_free(position, Some(i_robot)) {
                position = body.position;
            }
            self.bodies[i_robot] = Body { position, heading };
        }
    }

    fn limit(&self) -> f64 {
        0.5 * self.cfg.size - ROBOT_RADIUS
    }

    fn is_free(&self, position: Vector2, ignored: Option<usize>) -> bool {
        self.bodies
            .iter()
            .enumerate()
            .filter(|(i_robot, _)| Some(*i_robot) != ignored)
            .all(|(_, body)| (body.position - position).norm() >= 2.0 * ROBOT_RADIUS)
    }

    /// Surface distance and world bearing of every obstacle around `robot`.
    fn obstacles(&self, robot: usize) -> Vec<(f64, f64)> {
        let half = 0.5 * self.cfg.size;
        let position = self.bodies[robot].position;
        let (x, y) = (position.x, position.y);
        let mut obstacles = vec![
            (half - x - ROBOT_RADIUS, 0.0),
            (half - y - ROBOT_RADIUS, FRAC_PI_2),
            (half + x - ROBOT_RADIUS, PI),
            (half + y - ROBOT_RADIUS, -FRAC_PI_2),
        ];
        for (_, distance, bearing) in self.neighbours(robot) {
            obstacles.push((distance - 2.0 * ROBOT_RADIUS, bearing));
        }
        obstacles
    }

    /// Index, center distance and world bearing of every other robot.
    fn neighbours(&self, robot: usize) -> impl Iterator<Item = (usize, f64, f64)> + '_ {
        let position = self.bodies[robot].position;
        self.bodies
            .iter()
            .enumerate()
            .filter(move |(other, _)| *other != robot)
            .map(move |(other, body)| {
                let offset = body.position - position;
                (other, offset.norm(), types::bearing(&offset))
            })
    }

    fn proximity(&self, robot: usize) -> Vec<ProximityReading> {
        let heading = self.bodies[robot].heading;
        let obstacles = self.obstacles(robot);
        (0..N_PROXIMITY)
            .map(|i_sensor| {
                let angle = wrap_angle(i_sensor as f64 * TAU / N_PROXIMITY as f64);
                let value = obstacles
                    .iter()
                    .filter(|(_, bearing)| {
                        wrap_angle(bearing - heading - angle).abs() <= PI / N_PROXIMITY as f64
                    })
                    .map(|(distance, _)| (1.0 - distance / PROXIMITY_RANGE).clamp(0.0, 1.0))
                    .fold(0.0, f64::max);
                ProximityReading { value, angle }
            })
            .collect()
    }

    fn light(&self, robot: usize) -> LightReading {
        let Some([x, y]) = self.cfg.light else {
            return LightReading::default();
        };
        let body = self.bodies[robot];
        let offset = Vector2::new(x, y) - body.position;
        let distance = offset.norm();
        LightReading {
            value: 1.0 / (1.0 + distance * distance),
            angle: wrap_angle(types::bearing(&offset) - body.heading),
        }
    }

    fn ground(&self, robot: usize) -> Color {
        let position = self.bodies[robot].position;
        self.cfg
            .patches
            .iter()
            .find(|patch| {
                let [x, y] = patch.center;
                (Vector2::new(x, y) - position).norm() <= patch.radius
            })
            .map_or(self.cfg.floor, |patch| patch.color)
    }

    fn lidar(&self, robot: usize) -> Vec<LidarReading> {
        let body = self.bodies[robot];
        (0..N_LIDAR)
            .map(|i_ray| {
                let angle = wrap_angle(i_ray as f64 * TAU / N_LIDAR as f64);
                let direction = polar(1.0, body.heading + angle);
                let distance = self.cast(robot, body.position, direction);
                LidarReading { distance, angle }
            })
            .collect()
    }

    /// Distance along a unit ray to the first wall or robot, capped at the lidar range.
    fn cast(&self, robot: usize, origin: Vector2, direction: Vector2) -> f64 {
        let half = 0.5 * self.cfg.size;
        let to_wall = |position: f64, component: f64| {
            if component > 0.0 {
                (half - position) / component
            } else if component < 0.0 {
                (-half - position) / component
            } else {
                f64::INFINITY
            }
        };
        let mut distance = to_wall(origin.x, direction.x).min(to_wall(origin.y, direction.y));

        for (other, body) in self.bodies.iter().enumerate() {
            if other == robot {
                continue;
            }
            let offset = body.position - origin;
            let along = offset.dot(&direction);
            let across_sq = offset.norm_squared() - along * along;
            let radius_sq = ROBOT_RADIUS * ROBOT_RADIUS;
            if along > 0.0 && across_sq <= radius_sq {
                distance = distance.min(along - (radius_sq - across_sq).sqrt());
            }
        }

        distance.min(LIDAR_RANGE)
    }

    fn camera(&self, robot: usize) -> Vec<Blob> {
        let heading = self.bodies[robot].heading;
        self.neighbours(robot)
            .filter(|(_, distance, _)| *distance <= CAMERA_RANGE)
            .map(|(_, distance, bearing)| Blob {
                color: self.cfg.robot_color,
                distance,
                angle: wrap_angle(bearing - heading),
            })
            .collect()
    }
}

/// Host interface of one simulated robot for the current cycle.
pub struct RobotView<'a> {
    arena: &'a Arena,
    robot: usize,
    id: String,
    wheels: (f64, f64),
}

impl RobotView<'_> {
    /// Wheel velocities requested during this cycle.
    pub fn wheels(&self) -> (f64, f64) {
        self.wheels
    }
}

impl RobotHost for RobotView<'_> {
    fn id(&self) -> &str {
        &self.id
    }

    fn acquire(&mut self, device: Device) -> Result<()> {
        if self.arena.cfg.disabled.contains(&device) {
            bail!("{device} is disabled in this arena");
        }
        Ok(())
    }

    fn proximity(&self) -> Vec<ProximityReading> {
        self.arena.proximity(self.robot)
    }

    fn light(&self) -> LightReading {
        self.arena.light(self.robot)
    }

    fn ground(&self) -> Color {
        self.arena.ground(self.robot)
    }

    fn lidar(&self) -> Vec<LidarReading> {
        self.arena.lidar(self.robot)
    }

    fn camera(&self) -> Vec<Blob> {
        self.arena.camera(self.robot)
    }

    fn set_wheels(&mut self, left: f64, right: f64) {
        self.wheels = (left, right);
    }
}

/// Wrap an angle into `[-pi, pi)`.
fn wrap_angle(angle: f64) -> f64 {
    (angle + PI).rem_euclid(TAU) - PI
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Patch;

    fn config() -> ArenaConfig {
        ArenaConfig {
            size: 2.0,
            floor: Color::WHITE,
            patches: vec![Patch {
                center: [0.5, 0.5],
                radius: 0.2,
                color: Color::BLACK,
            }],
            light: Some([0.0, 0.9]),
            robot_color: Color::new(255, 0, 0),
            disabled: vec![Device::Camera],
        }
    }

    fn arena_with(poses: &[(f64, f64, f64)]) -> Arena {
        let bodies = poses
            .iter()
            .map(|&(x, y, heading)| Body {
                position: Vector2::new(x, y),
                heading,
            })
            .collect();
        Arena {
            cfg: config(),
            bodies,
        }
    }

    #[test]
    fn placement_keeps_robots_apart_and_inside() {
        let mut rng = ChaCha12Rng::seed_from_u64(3);
        let arena = Arena::new(config(), 10, &mut rng).unwrap();
        assert_eq!(arena.bodies.len(), 10);
        for (i, a) in arena.bodies.iter().enumerate() {
            assert!(a.position.x.abs() <= arena.limit());
            assert!(a.position.y.abs() <= arena.limit());
            for b in &arena.bodies[i + 1..] {
                assert!((a.position - b.position).norm() >= 2.0 * ROBOT_RADIUS);
            }
        }

        let mut rng = ChaCha12Rng::seed_from_u64(3);
        assert!(Arena::new(config(), 500, &mut rng).is_err());
    }

    #[test]
    fn proximity_sees_the_nearest_wall_ahead() {
        let arena = arena_with(&[(0.75, 0.0, 0.0)]);
        let readings = arena.proximity(0);
        assert_eq!(readings.len(), N_PROXIMITY);
        assert_eq!(readings[0].angle, 0.0);
        assert!((readings[0].value - 0.5).abs() < 1e-9);
        assert_eq!(readings[N_PROXIMITY / 2].value, 0.0);
    }

    #[test]
    fn proximity_is_relative_to_the_heading() {
        let arena = arena_with(&[(0.75, 0.0, FRAC_PI_2)]);
        let readings = arena.proximity(0);
        let right = readings
            .iter()
            .find(|reading| (reading.angle + FRAC_PI_2).abs() < 1e-9)
            .unwrap();
        assert!(right.value > 0.4);
        assert_eq!(readings[0].value, 0.0);
    }

    #[test]
    fn ground_light_and_camera() {
        let arena = arena_with(&[(0.5, 0.5, 0.0), (0.0, 0.0, FRAC_PI_2)]);
        assert_eq!(arena.ground(0), Color::BLACK);
        assert_eq!(arena.ground(1), Color::WHITE);

        let light = arena.light(1);
        assert!(light.angle.abs() < 1e-9);
        assert!((light.value - 1.0 / 1.81).abs() < 1e-9);

        let blobs = arena.camera(1);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].color, Color::new(255, 0, 0));
        assert!((blobs[0].distance - 0.5_f64.sqrt()).abs() < 1e-9);
        assert!((blobs[0].angle + PI / 4.0).abs() < 1e-9);
    }

    #[test]
    fn lidar_hits_walls_and_robots() {
        let arena = arena_with(&[(0.0, 0.0, 0.0), (-0.5, 0.0, 0.0)]);
        let readings = arena.lidar(0);
        assert_eq!(readings.len(), N_LIDAR);
        assert!((readings[0].distance - 1.0).abs() < 1e-9);
        assert!((readings[N_LIDAR / 2].distance - 0.4).abs() < 1e-9);
    }

    #[test]
    fn differential_drive_kinematics() {
        let mut arena = arena_with(&[(0.0, 0.0, 0.0), (0.5, 0.5, 0.0)]);
        arena.advance(&[(1.0, 1.0), (0.0, 0.0)]);
        assert!((arena.bodies[0].position.x - TIME_STEP).abs() < 1e-9);
        assert_eq!(arena.bodies[1].position, Vector2::new(0.5, 0.5));

        arena.advance(&[(-0.1, 0.1), (0.0, 0.0)]);
        assert!(arena.bodies[0].heading > 0.0);

        let mut arena = arena_with(&[(0.85, 0.0, 0.0)]);
        arena.advance(&[(1.0, 1.0)]);
        assert_eq!(arena.bodies[0].position.x, arena.limit());
    }

    #[test]
    fn collisions_cancel_the_move() {
        let mut arena = arena_with(&[(0.0, 0.0, 0.0), (0.25, 0.0, 0.0)]);
        arena.advance(&[(1.0, 1.0), (0.0, 0.0)]);
        assert_eq!(arena.bodies[0].position, Vector2::zeros());
    }

    #[test]
    fn views_expose_one_robot() {
        let arena = arena_with(&[(0.5, 0.5, 0.0), (0.0, 0.0, 0.0)]);
        let mut view = arena.view(0);
        assert_eq!(view.id(), "rvr0");
        assert!(view.acquire(Device::Ground).is_ok());
        assert!(view.acquire(Device::Camera).is_err());
        assert_eq!(view.ground(), Color::BLACK);

        view.set_wheels(0.1, -0.1);
        assert_eq!(view.wheels(), (0.1, -0.1));
    }
}
