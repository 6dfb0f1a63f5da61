use crate::stats::Accumulator;
use crate::types::{HistoryHeader, Record};
use anyhow::{Context, Result, bail};
use rmp_serde::decode;
use std::{
    fs::{self, File},
    io::{BufReader, Read},
    path::Path,
};

/// Observable computed over the records of a history file.
pub trait Obs {
    fn update(&mut self, record: &Record) -> Result<()>;
    fn report(&self) -> Result<(&'static str, toml::Value)>;
}

/// Fraction of robot cycles spent in each behaviour node.
pub struct Occupancy {
    acc_vec: Vec<Accumulator>,
}

impl Occupancy {
    pub fn new(header: &HistoryHeader) -> Self {
        let mut acc_vec = Vec::new();
        acc_vec.resize_with(header.n_nodes, Accumulator::new);
        Self { acc_vec }
    }
}

impl Obs for Occupancy {
    fn update(&mut self, record: &Record) -> Result<()> {
        if record.node >= self.acc_vec.len() {
            bail!("node {} is out of range", record.node);
        }
        for (i_node, acc) in self.acc_vec.iter_mut().enumerate() {
            acc.add(if i_node == record.node { 1.0 } else { 0.0 });
        }
        Ok(())
    }

    fn report(&self) -> Result<(&'static str, toml::Value)> {
        let reports: Vec<_> = self.acc_vec.iter().map(Accumulator::report).collect();
        Ok(("occupancy", toml::Value::try_from(reports)?))
    }
}

/// Number of transitions per robot and trial.
///
/// Each trial starts in node 0.
pub struct Transitions {
    n_robots: usize,
    last_node: Vec<usize>,
    counts: Vec<usize>,
}

impl Transitions {
    pub fn new(header: &HistoryHeader) -> Self {
        Self {
            n_robots: header.n_robots,
            last_node: vec![0; header.n_robots],
            counts: vec![0; header.n_trials * header.n_robots],
        }
    }
}

impl Obs for Transitions {
    fn update(&mut self, record: &Record) -> Result<()> {
        let last_node = self
            .last_node
            .get_mut(record.robot)
            .with_context(|| format!("robot {} is out of range", record.robot))?;
        if record.step == 0 {
            *last_node = 0;
        }
        if record.node != *last_node {
            let count = record
                .trial
                .checked_mul(self.n_robots)
                .and_then(|offset| offset.checked_add(record.robot))
                .and_then(|index| self.counts.get_mut(index))
                .with_context(|| format!("trial {} is out of range", record.trial))?;
            *count += 1;
            *last_node = record.node;
        }
        Ok(())
    }

    fn report(&self) -> Result<(&'static str, toml::Value)> {
        let mut acc = Accumulator::new();
        for &count in &self.counts {
            acc.add(count as f64);
        }
        Ok(("transitions", toml::Value::try_from(acc.report())?))
    }
}

/// Mean forward speed commanded to the wheels.
pub struct Speed {
    acc: Accumulator,
}

impl Speed {
    pub fn new() -> Self {
        Self {
            acc: Accumulator::new(),
        }
    }
}

impl Obs for Speed {
    fn update(&mut self, record: &Record) -> Result<()> {
        self.acc.add(0.5 * (record.left + record.right));
        Ok(())
    }

    fn report(&self) -> Result<(&'static str, toml::Value)> {
        Ok(("speed", toml::Value::try_from(self.acc.report())?))
    }
}

pub struct Analyzer {
    header: HistoryHeader,
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new(header: HistoryHeader) -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(Occupancy::new(&header)),
            Box::new(Transitions::new(&header)),
            Box::new(Speed::new()),
        ];
        Self {
            header,
            obs_ptr_vec,
        }
    }

    /// Read a history file and feed every record to the observables.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);

        let header = decode::from_read(&mut reader).context("failed to read header")?;
        let mut analyzer = Self::new(header);
        analyzer.add_records(&mut reader)?;
        Ok(analyzer)
    }

    fn add_records<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        let n_records = self.header.n_records().context("history is too large")?;
        for i_record in 0..n_records {
            let record: Record = decode::from_read(&mut *reader)
                .with_context(|| format!("failed to read record {i_record}"))?;
            self.add_record(&record).with_context(|| format!("invalid record {i_record}"))?;
        }
        Ok(())
    }

    fn add_record(&mut self, record: &Record) -> Result<()> {
        for obs in &mut self.obs_ptr_vec {
            obs.update(record)?;
        }
        Ok(())
    }

    pub fn results(&self) -> Result<toml::Table> {
        let mut table = toml::Table::new();
        for obs in &self.obs_ptr_vec {
            let (name, value) = obs.report().context("failed to report observable")?;
            table.insert(name.to_string(), value);
        }
        Ok(table)
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let contents = toml::to_string_pretty(&self.results()?)
            .context("failed to serialize results")?;
        fs::write(file, contents).with_context(|| format!("failed to write {file:?}"))?;
        Ok(())
    }
}
