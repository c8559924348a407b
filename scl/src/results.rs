//! Loading simulation results from the session rawfile.

use std::path::Path;

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;

pub use nutbin::{ComplexTrace, Plot, PlotData};

use crate::error::{Error, Result};

lazy_static! {
    /// The backquoted analysis name inside a plot name, e.g.
    /// ``Transient Analysis `tran1': time = (0 s -> 10 ns)``.
    static ref SHORT_NAME: Regex = Regex::new(r"`([^']+)'").unwrap();
}

/// The numeric data produced by a run, keyed by plot name.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    plots: IndexMap<String, Plot>,
}

impl ResultSet {
    /// Whether the run produced no plots.
    pub fn is_empty(&self) -> bool {
        self.plots.is_empty()
    }

    /// The number of plots.
    pub fn len(&self) -> usize {
        self.plots.len()
    }

    /// The plot names, in file order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plots.keys().map(String::as_str)
    }

    /// Looks up a plot by its full name, or by the backquoted analysis name
    /// embedded in it (`tran1` matches ``Transient Analysis `tran1': ...``).
    pub fn plot(&self, name: &str) -> Option<&Plot> {
        if let Some(plot) = self.plots.get(name) {
            return Some(plot);
        }
        self.plots.iter().find_map(|(key, plot)| {
            let caps = SHORT_NAME.captures(key)?;
            (&caps[1] == name).then_some(plot)
        })
    }

    /// Iterates over `(name, plot)` entries in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Plot)> {
        self.plots.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Decodes the plots appended to `path` at or after byte `offset`.
///
/// Returns the decoded set and the offset to resume from. The file being
/// missing, or the decoded set being empty, is [`Error::ResultNotFound`]: the
/// run executed no analysis that produces data.
pub(crate) fn load_from(path: &Path, offset: usize) -> Result<(ResultSet, usize)> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::ResultNotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    // An offset past the end means the simulator truncated and rewrote the
    // file; start over.
    let offset = if offset > data.len() { 0 } else { offset };
    let (rawfile, next) = nutbin::parse_from(&data, offset, nutbin::Options::default())?;

    let mut plots = IndexMap::new();
    for plot in rawfile.plots {
        plots.insert(plot.name.clone(), plot);
    }
    if plots.is_empty() {
        return Err(Error::ResultNotFound(path.to_path_buf()));
    }
    Ok((ResultSet { plots }, next))
}
