//! A parser for Nutmeg simulation rawfiles.
//!
//! Spectre writes this format when invoked with `-format nutbin` (binary data
//! blocks) or `-format nutascii` (printed data blocks); ngspice and other
//! Berkeley-derived simulators write the same layout. A rawfile is a sequence
//! of *plots*, one per completed analysis, each carrying a header, a variable
//! table, and a data block of real or complex points.
//!
//! Interactive simulator sessions append plots to the rawfile as successive
//! runs complete. [`parse_from`] supports that access pattern: it decodes the
//! plots starting at a byte offset and reports the offset just past the last
//! complete plot, so the caller can re-read only what is new.
#![warn(missing_docs)]

use error::{Error, Result};
use serde::Serialize;

pub mod error;
pub mod parser;

pub use parser::{ComplexTrace, Plot, PlotData, Variable};

/// A parsed rawfile: the plots it contains, in file order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rawfile {
    /// The plots contained in this file.
    pub plots: Vec<Plot>,
}

/// Rawfile reading options.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct Options {
    /// The byte order of doubles in `Binary:` data blocks.
    ///
    /// Ignored for ASCII data blocks. Spectre writes big-endian; ngspice
    /// writes the host (little-endian) order.
    pub endianness: ByteOrder,
}

impl Default for Options {
    #[inline]
    fn default() -> Self {
        Self {
            endianness: ByteOrder::BigEndian,
        }
    }
}

/// Byte order for binary-format doubles.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum ByteOrder {
    /// Big endian.
    BigEndian,
    /// Little endian.
    LittleEndian,
}

/// Parse an entire rawfile.
///
/// Unlike [`parse_from`], this is strict: anything left over after the last
/// plot (other than trailing whitespace) is an error.
pub fn parse<T>(input: &T, options: Options) -> Result<Rawfile>
where
    T: AsRef<[u8]>,
{
    let (rawfile, consumed) = parse_from(input, 0, options)?;
    if input.as_ref()[consumed..]
        .iter()
        .any(|b| !b.is_ascii_whitespace())
    {
        return Err(Error::Parse);
    }
    Ok(rawfile)
}

/// Parse the plots beginning `offset` bytes into `input`.
///
/// Returns the decoded plots together with the offset just past the last
/// complete plot. Passing that offset back in after the file has grown decodes
/// only the newly appended plots; a trailing partially-written plot is left
/// for the next call.
pub fn parse_from<T>(input: &T, offset: usize, options: Options) -> Result<(Rawfile, usize)>
where
    T: AsRef<[u8]>,
{
    let data = input.as_ref();
    let tail = data.get(offset..).ok_or(Error::Offset {
        offset,
        len: data.len(),
    })?;
    match parser::plots(tail, options) {
        Ok((rest, plots)) => Ok((Rawfile { plots }, data.len() - rest.len())),
        Err(_) => Err(Error::Parse),
    }
}
