use anyhow::{Result, bail};

/// Constructors of behaviour or condition kinds, keyed by numeric identifier
/// (registration order) and by label.
#[derive(Debug, Clone)]
pub struct Registry<F> {
    kinds: Vec<(&'static str, F)>,
}

impl<F> Registry<F> {
    pub fn new() -> Self {
        Self { kinds: Vec::new() }
    }

    /// Register a kind and return its identifier.
    pub fn register(&mut self, label: &'static str, constructor: F) -> usize {
        self.kinds.push((label, constructor));
        self.kinds.len() - 1
    }

    pub fn get(&self, identifier: usize) -> Result<(&'static str, &F)> {
        match self.kinds.get(identifier) {
            Some((label, constructor)) => Ok((label, constructor)),
            None => bail!(
                "unknown kind identifier {identifier} (known: 0..{})",
                self.kinds.len()
            ),
        }
    }
}

impl<F> Default for Registry<F> {
    fn default() -> Self {
        Self::new()
    }
}
