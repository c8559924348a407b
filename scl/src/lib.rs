//! Scripted control of the Cadence Spectre circuit simulator.
//!
//! Spectre's `+interactive` mode exposes its Simulator Control Language
//! (SCL): a line-oriented interpreter that answers s-expression commands such
//! as `(sclListAnalysis)` at a `> ` prompt. This crate launches the simulator
//! as a subprocess, drives that command channel to inspect and mutate the
//! loaded netlist's analyses, instances, nets, and parameters, triggers runs,
//! and decodes the Nutmeg rawfiles the simulator writes.
//!
//! ```no_run
//! use scl::{Options, Session};
//!
//! # fn main() -> scl::Result<()> {
//! let mut session = Session::start("opamp.scs", Options::default())?;
//! session.set_parameter("vdd", 1.8)?;
//! let results = session.run_all()?;
//! let vout = results.plot("tran1").and_then(|p| p.real("v(out)"));
//! session.stop()?;
//! # Ok(())
//! # }
//! ```
//!
//! Batch runs that need no interactive channel go through [`simulate`] and
//! [`simulate_netlist`].
#![warn(missing_docs)]

use std::io::Write;
use std::path::{Path, PathBuf};

pub mod analysis;
pub(crate) mod command;
pub mod config;
pub mod error;
pub mod parse;
pub mod results;
pub mod session;

#[cfg(test)]
mod tests;

pub use analysis::{Ac, AnalysisParams, AnalysisType, Dc, ErrPreset, Sweep, Tran, XPreset};
pub use config::Config;
pub use error::{EntityKind, Error, Result};
pub use parse::{scaled_f64, AttrKind, Attributes, Value};
pub use results::{Plot, ResultSet};
pub use session::{Mode, Session};

/// Per-session options.
///
/// A session needs none of these: the default is an interactive session with
/// discovered configuration and a temporary raw-results file.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub(crate) mode: Mode,
    pub(crate) includes: Vec<PathBuf>,
    pub(crate) raw_path: Option<PathBuf>,
    pub(crate) config_path: Option<PathBuf>,
    pub(crate) aps: Option<ErrPreset>,
    pub(crate) x_preset: Option<XPreset>,
    pub(crate) extra_args: Vec<String>,
}

impl Options {
    /// Runs the simulator in batch mode: one-shot runs, no command channel.
    pub fn batch(&mut self) {
        self.mode = Mode::Batch;
    }

    /// Adds a directory to the include search path (the `-I` flag).
    pub fn include(&mut self, path: impl Into<PathBuf>) {
        self.includes.push(path.into());
    }

    /// Writes raw results to the given path instead of a temporary file.
    pub fn raw_path(&mut self, path: impl Into<PathBuf>) {
        self.raw_path = Some(path.into());
    }

    /// Reads configuration from the given file instead of discovering it.
    pub fn config_file(&mut self, path: impl Into<PathBuf>) {
        self.config_path = Some(path.into());
    }

    /// Enables accelerated parallel simulation (the `++aps=` flag).
    pub fn aps(&mut self, preset: ErrPreset) {
        self.aps = Some(preset);
    }

    /// Enables Spectre X with the given preset (the `+preset=` flag).
    pub fn x_preset(&mut self, preset: XPreset) {
        self.x_preset = Some(preset);
    }

    /// Passes an additional flag to the simulator.
    pub fn arg(&mut self, arg: impl Into<String>) {
        self.extra_args.push(arg.into());
    }
}

/// Runs `netlist` once in batch mode and loads the results.
pub fn simulate(netlist: impl AsRef<Path>, mut options: Options) -> Result<ResultSet> {
    options.batch();
    let mut session = Session::start(netlist, options)?;
    session.run_all()
}

/// Writes netlist text to a temporary file, simulates it once, and removes
/// the file after the results are in.
pub fn simulate_netlist(netlist: &str, options: Options) -> Result<ResultSet> {
    let mut file = tempfile::Builder::new().suffix(".scs").tempfile()?;
    file.write_all(netlist.as_bytes())?;
    file.flush()?;
    simulate(file.path(), options)
}
