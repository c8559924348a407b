//! Rawfile parsing errors.

use thiserror::Error as ThisError;

/// The result type returned by rawfile parsing functions.
pub type Result<T> = std::result::Result<T, Error>;

/// Possible rawfile parsing errors.
#[derive(ThisError, Debug, Clone, Eq, PartialEq)]
pub enum Error {
    /// The input is not a well-formed rawfile.
    #[error("malformed rawfile")]
    Parse,
    /// The resume offset lies beyond the end of the input.
    #[error("offset {offset} is beyond the end of the {len}-byte input")]
    Offset {
        /// The requested resume offset.
        offset: usize,
        /// The length of the input.
        len: usize,
    },
}
