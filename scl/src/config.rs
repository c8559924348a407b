//! Simulator configuration.
//!
//! A `spectre.toml` file sets the simulator binary, the flags passed on every
//! invocation, and the response timeout:
//!
//! ```toml
//! [spectre]
//! executable = "spectre"
//! args = ["-64", "-format", "nutbin"]
//! timeout-secs = 120
//! ```
//!
//! Sessions look the file up in the netlist's directory and its ancestors, so
//! a project can pin its simulator setup at the repository root.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The configuration file name searched for by [`Config::discover`].
pub const CONFIG_FILE_NAME: &str = "spectre.toml";

/// Contents of the `[spectre]` table of a configuration file.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// The simulator executable, resolved via `PATH` if not absolute.
    pub executable: PathBuf,
    /// Flags passed on every invocation, before the per-session flags.
    pub args: Vec<String>,
    /// Bound on each blocking response read, in seconds.
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("spectre"),
            args: ["-64", "-format", "nutbin"]
                .into_iter()
                .map(String::from)
                .collect(),
            timeout_secs: 120,
        }
    }
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    spectre: Config,
}

impl Config {
    /// Parses the configuration file at `path`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents)?;
        Ok(file.spectre)
    }

    /// Searches `dir` and its ancestors for a [`CONFIG_FILE_NAME`] file,
    /// falling back to the defaults if none exists.
    pub fn discover(dir: impl AsRef<Path>) -> Result<Self> {
        for dir in dir.as_ref().ancestors() {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                return Self::from_file(&candidate);
            }
        }
        Ok(Self::default())
    }

    /// The response timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
