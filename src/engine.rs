use crate::arena::Arena;
use crate::builder::Blueprint;
use crate::config::Config;
use crate::controller::Controller;
use crate::types::{HistoryHeader, Record};
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rmp_serde::encode;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// Simulation engine.
///
/// Holds the configuration, the arena, one controller per robot, and the
/// random number generator used for robot placement.
pub struct Engine {
    cfg: Config,
    arena: Arena,
    controllers: Vec<Controller>,
    rng: ChaCha12Rng,
}

impl Engine {
    /// Build the arena and one independent controller per robot.
    ///
    /// Every controller gets its own stream of the seeded generator.
    pub fn generate(cfg: Config) -> Result<Self> {
        let mut rng = match cfg.run.seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::try_from_os_rng()?,
        };

        let blueprint = Blueprint::parse(&cfg.controller.tree).context("failed to parse tree")?;

        let arena = Arena::new(cfg.arena.clone(), cfg.run.n_robots, &mut rng)
            .context("failed to build arena")?;

        let mut controllers = Vec::with_capacity(cfg.run.n_robots);
        for i_robot in 0..cfg.run.n_robots {
            let tree = blueprint
                .instantiate()
                .with_context(|| format!("failed to instantiate tree of robot {i_robot}"))?;

            let mut robot_rng = rng.clone();
            robot_rng.set_stream(i_robot as u64 + 1);

            let mut view = arena.view(i_robot);
            controllers.push(Controller::new(
                &mut view,
                tree,
                cfg.controller.velocity,
                cfg.controller.palette.clone(),
                robot_rng,
            ));
        }

        if let Some(controller) = controllers.first() {
            log::info!(
                "built {} trees of {} nodes and {} edges",
                controllers.len(),
                controller.tree().behaviours().len(),
                controller.tree().conditions().len()
            );
        }

        Ok(Self {
            cfg,
            arena,
            controllers,
            rng,
        })
    }

    /// Run every trial, optionally recording each robot at each cycle to a binary file.
    pub fn perform_simulation(&mut self, history: Option<&Path>) -> Result<()> {
        let n_robots = self.cfg.run.n_robots;
        let n_trials = self.cfg.run.n_trials;
        let n_steps = self.cfg.run.n_steps;

        let mut writer = match history {
            Some(file) => {
                let file =
                    File::create(file).with_context(|| format!("failed to create {file:?}"))?;
                let mut writer = BufWriter::new(file);
                let header = HistoryHeader {
                    n_robots,
                    n_nodes: count_nodes(&self.controllers),
                    n_trials,
                    n_steps,
                };
                encode::write(&mut writer, &header).context("failed to serialize header")?;
                Some(writer)
            }
            None => None,
        };

        let mut wheels = vec![(0.0, 0.0); n_robots];
        for i_trial in 0..n_trials {
            if i_trial > 0 {
                self.arena
                    .place(n_robots, &mut self.rng)
                    .context("failed to place robots")?;
                for controller in &mut self.controllers {
                    controller.reset();
                }
            }

            let mut n_transitions = 0;
            for i_step in 0..n_steps {
                for (i_robot, controller) in self.controllers.iter_mut().enumerate() {
                    let mut view = self.arena.view(i_robot);
                    if controller.control_step(&mut view).is_some() {
                        n_transitions += 1;
                    }
                    wheels[i_robot] = view.wheels();

                    if let Some(writer) = writer.as_mut() {
                        let (left, right) = wheels[i_robot];
                        let record = Record {
                            trial: i_trial,
                            step: i_step,
                            robot: i_robot,
                            node: controller.active(),
                            left,
                            right,
                        };
                        encode::write(writer, &record).context("failed to serialize record")?;
                    }
                }
                self.arena.advance(&wheels);
            }

            let n_cycles = self.controllers.first().map_or(0, Controller::time_step);
            log::debug!("trial {i_trial}: {n_transitions} transitions over {n_cycles} cycles");
            let progress = 100.0 * (i_trial + 1) as f64 / n_trials as f64;
            log::info!("completed {progress:06.2}%");
        }

        if let Some(mut writer) = writer {
            writer.flush().context("failed to flush writer stream")?;
        }

        Ok(())
    }
}

fn count_nodes(controllers: &[Controller]) -> usize {
    controllers
        .first()
        .map_or(0, |controller| controller.tree().behaviours().len())
}
