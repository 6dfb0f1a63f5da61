use anyhow::{Context, Result};
use std::collections::BTreeMap;

/// Named numeric parameters of a behaviour or condition.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Params {
    map: BTreeMap<String, f64>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parameter, returning the previous value if the key was taken.
    pub fn insert<S: Into<String>>(&mut self, name: S, value: f64) -> Option<f64> {
        self.map.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.map.get(name).copied()
    }

    /// Value of a parameter that must be present.
    pub fn require(&self, name: &str) -> Result<f64> {
        self.get(name)
            .with_context(|| format!("missing required parameter {name:?}"))
    }

    pub fn get_or(&self, name: &str, default: f64) -> f64 {
        self.get(name).unwrap_or(default)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.map.iter().map(|(name, &value)| (name.as_str(), value))
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for Params {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self {
            map: iter.into_iter().map(|(name, value)| (name.into(), value)).collect(),
        }
    }
}

/// Human-readable label: the kind name followed by one `name=value` line per parameter.
pub fn describe(label: &str, params: &Params) -> String {
    let mut lines = vec![label.to_string()];
    lines.extend(params.iter().map(|(name, value)| format!("{name}={value}")));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_reports_missing_key() {
        let params: Params = [("p", 0.25)].into_iter().collect();
        assert_eq!(params.require("p").unwrap(), 0.25);
        let err = params.require("w").unwrap_err();
        assert!(format!("{err}").contains("\"w\""));
    }

    #[test]
    fn description_lists_parameters_in_key_order() {
        let params: Params = [("w", 2.0), ("p", 3.5)].into_iter().collect();
        assert_eq!(describe("NeighborsCount", &params), "NeighborsCount\np=3.5\nw=2");
        assert_eq!(describe("Stop", &Params::new()), "Stop");
    }
}
