use crate::analysis::Analyzer;
use crate::builder::Blueprint;
use crate::config::Config;
use crate::engine::Engine;
use anyhow::{Context, Result};
use glob::glob;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Owns an experiment directory: its config and its numbered run directories.
pub struct Manager {
    exp_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(exp_dir: P) -> Result<Self> {
        let exp_dir = exp_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(exp_dir.join("config.toml")).context("failed to construct cfg")?;
        log::debug!("{cfg:#?}");

        Ok(Self { exp_dir, cfg })
    }

    /// Simulate into a new run directory.
    pub fn run_simulation(&self) -> Result<()> {
        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;

        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        if self.cfg.controller.readable {
            let tree_file = self.tree_file(run_idx);
            fs::write(&tree_file, self.describe_tree()?)
                .with_context(|| format!("failed to write {tree_file:?}"))?;
        }

        let mut engine =
            Engine::generate(self.cfg.clone()).context("failed to generate engine")?;

        let history_file = self.history_file(run_idx);
        let history = self.cfg.controller.history.then_some(history_file.as_path());
        engine
            .perform_simulation(history)
            .context("failed to perform simulation")?;

        Ok(())
    }

    /// DOT graph of the configured tree.
    pub fn describe_tree(&self) -> Result<String> {
        let tree = Blueprint::parse(&self.cfg.controller.tree)
            .and_then(|blueprint| blueprint.instantiate())
            .context("failed to build tree")?;
        Ok(tree.dot())
    }

    pub fn run_analysis(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            let history_file = self.history_file(run_idx);
            if !history_file.is_file() {
                log::warn!("no history in {:?}, skipping", self.run_dir(run_idx));
                continue;
            }

            let analyzer = Analyzer::from_file(&history_file)
                .with_context(|| format!("failed to analyze {history_file:?}"))?;
            analyzer
                .save_results(self.results_file(run_idx))
                .context("failed to save results")?;
            log::info!("analyzed {history_file:?}");
        }

        Ok(())
    }

    pub fn clean_runs(&self) -> Result<()> {
        for run_dir in self.run_dirs()? {
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }
        Ok(())
    }

    fn run_dirs(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.exp_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let run_dirs = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .collect();
        Ok(run_dirs)
    }

    fn count_run_dirs(&self) -> Result<usize> {
        Ok(self.run_dirs()?.len())
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.exp_dir.join(format!("run-{run_idx:04}"))
    }

    fn tree_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("tree.dot")
    }

    fn history_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("history.msgpack")
    }

    fn results_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("results.toml")
    }
}
