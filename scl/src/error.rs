//! Session and command errors.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error as ThisError;

/// The result type returned by this crate's functions.
pub type Result<T> = std::result::Result<T, Error>;

/// The kind of netlist entity a failed lookup referred to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum EntityKind {
    /// A named analysis.
    Analysis,
    /// A placed circuit component.
    Instance,
    /// A parameter of the circuit, an instance, or an analysis.
    Parameter,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Analysis => write!(f, "analysis"),
            Self::Instance => write!(f, "instance"),
            Self::Parameter => write!(f, "parameter"),
        }
    }
}

/// Possible session errors.
///
/// Every variant surfaces directly to the caller with the failing command or
/// path attached; nothing is retried. A failed command leaves the session in
/// its prior state.
#[derive(ThisError, Debug)]
pub enum Error {
    /// The simulator binary or the netlist could not be launched.
    #[error("failed to launch `{command}`: {reason}")]
    Launch {
        /// The attempted command line.
        command: String,
        /// Why the launch failed.
        reason: String,
    },
    /// A command was dispatched on a session that was not started in
    /// interactive mode.
    #[error("session is not interactive")]
    NotInteractive,
    /// The simulator reported that a named entity does not exist.
    #[error("unknown {kind} `{name}`")]
    UnknownEntity {
        /// What kind of entity the lookup referred to.
        kind: EntityKind,
        /// The name that failed to resolve.
        name: String,
    },
    /// The simulator's response did not have the expected shape.
    #[error("cannot interpret response to `{command}`: {detail}")]
    Parse {
        /// The command whose response was malformed.
        command: String,
        /// What was wrong with it.
        detail: String,
    },
    /// No response arrived within the configured bound.
    ///
    /// The session itself is left usable; the caller may retry or stop it.
    #[error("`{command}` timed out after {after:?}")]
    Timeout {
        /// The command that went unanswered.
        command: String,
        /// The configured bound.
        after: Duration,
    },
    /// A run completed but produced no result data at the expected path.
    #[error("no simulation results at {}", .0.display())]
    ResultNotFound(PathBuf),
    /// I/O error on the command channel or result files.
    #[error("io error")]
    Io(#[from] std::io::Error),
    /// Configuration file error.
    #[error("cannot parse configuration")]
    Config(#[from] toml::de::Error),
    /// Error decoding the output rawfile.
    #[error("error parsing output rawfile")]
    Rawfile(#[from] nutbin::error::Error),
}
