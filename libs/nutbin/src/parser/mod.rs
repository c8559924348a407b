//! The plot data structures and the grammar that produces them.

use std::str;

use nom::branch::alt;
use nom::bytes::complete::{tag_no_case, take, take_till1, take_while, take_while1};
use nom::character::complete::{line_ending, space0, space1};
use nom::combinator::opt;
use nom::error::{Error, ErrorKind};
use nom::multi::many0;
use nom::number::complete::{be_f64, le_f64};
use nom::sequence::{delimited, tuple};
use nom::{Err, IResult};
use serde::{Deserialize, Serialize};

use crate::{ByteOrder, Options};


/// One plot: the data saved by a single analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plot {
    /// The rawfile title, repeated on every plot that carries one.
    pub title: Option<String>,
    /// The date on which the analysis was run.
    pub date: Option<String>,
    /// The plot name, e.g. `tran1: time = (0 s -> 1 us)`.
    pub name: String,
    /// Format flags; contains `complex` when the data block is complex.
    pub flags: String,
    /// The saved variables, in column order.
    pub variables: Vec<Variable>,
    /// The saved data, one trace per variable.
    pub data: PlotData,
}

impl Plot {
    /// Whether this plot's data block is complex-valued.
    pub fn is_complex(&self) -> bool {
        matches!(self.data, PlotData::Complex(_))
    }

    /// The number of points saved per trace.
    pub fn points(&self) -> usize {
        match &self.data {
            PlotData::Real(traces) => traces.first().map(Vec::len).unwrap_or(0),
            PlotData::Complex(traces) => traces.first().map(|t| t.real.len()).unwrap_or(0),
        }
    }

    /// Looks up a variable by name.
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// The trace saved for the named variable, if the plot is real.
    pub fn real(&self, name: &str) -> Option<&[f64]> {
        let var = self.variable(name)?;
        self.data.as_real()?.get(var.idx).map(Vec::as_slice)
    }

    /// The trace saved for the named variable, if the plot is complex.
    pub fn complex(&self, name: &str) -> Option<&ComplexTrace> {
        let var = self.variable(name)?;
        self.data.as_complex()?.get(var.idx)
    }
}

/// One row of a plot's variable table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// The index of this variable among the saved traces.
    pub idx: usize,
    /// The signal name.
    pub name: String,
    /// The signal units, e.g. `voltage` or `time`.
    pub unit: String,
}

/// The data block of a plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlotData {
    /// One real trace per variable.
    Real(Vec<Vec<f64>>),
    /// One complex trace per variable.
    Complex(Vec<ComplexTrace>),
}

impl PlotData {
    /// The real traces, if this data block is real.
    pub fn as_real(&self) -> Option<&[Vec<f64>]> {
        match self {
            Self::Real(traces) => Some(traces),
            Self::Complex(_) => None,
        }
    }

    /// The complex traces, if this data block is complex.
    pub fn as_complex(&self) -> Option<&[ComplexTrace]> {
        match self {
            Self::Real(_) => None,
            Self::Complex(traces) => Some(traces),
        }
    }
}

/// A complex data trace, stored as parallel real and imaginary vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexTrace {
    /// The real parts.
    pub real: Vec<f64>,
    /// The imaginary parts.
    pub imag: Vec<f64>,
}

impl ComplexTrace {
    fn with_capacity(cap: usize) -> Self {
        Self {
            real: Vec::with_capacity(cap),
            imag: Vec::with_capacity(cap),
        }
    }
}

fn is_line_ending(c: u8) -> bool {
    c == b'\n' || c == b'\r'
}

fn is_blank(c: u8) -> bool {
    c == b' ' || c == b'\t' || is_line_ending(c)
}

fn utf8(input: &[u8]) -> Result<&str, Err<Error<&[u8]>>> {
    str::from_utf8(input).map_err(|_| Err::Failure(Error::new(input, ErrorKind::Char)))
}

fn field_usize<'a>(field: &'a [u8]) -> Result<usize, Err<Error<&'a [u8]>>> {
    utf8(field)?
        .trim()
        .parse()
        .map_err(|_| Err::Failure(Error::new(field, ErrorKind::Digit)))
}

fn field_f64<'a>(field: &'a [u8]) -> Result<f64, Err<Error<&'a [u8]>>> {
    utf8(field)?
        .trim()
        .parse()
        .map_err(|_| Err::Failure(Error::new(field, ErrorKind::Float)))
}

/// Matches one `Key: value` header line, returning the trimmed value.
fn header_line<'a, 'k>(key: &'k str) -> impl Fn(&'a [u8]) -> IResult<&'a [u8], &'a str> + 'k {
    move |input| {
        let (input, value) = delimited(
            tuple((tag_no_case(key), space0)),
            take_till1(is_line_ending),
            line_ending,
        )(input)?;
        Ok((input, utf8(value)?.trim_end()))
    }
}

struct PlotHeader<'a> {
    title: Option<&'a str>,
    date: Option<&'a str>,
    name: &'a str,
    flags: &'a str,
    variables: usize,
    points: usize,
}

fn plot_header(input: &[u8]) -> IResult<&[u8], PlotHeader> {
    let (input, title) = opt(header_line("Title:"))(input)?;
    let (input, date) = opt(header_line("Date:"))(input)?;
    let (input, name) = header_line("Plotname:")(input)?;
    let (input, flags) = header_line("Flags:")(input)?;
    let (input, variables) = header_line("No. Variables:")(input)?;
    let (input, points) = header_line("No. Points:")(input)?;
    let header = PlotHeader {
        title,
        date,
        name,
        flags,
        variables: field_usize(variables.as_bytes())?,
        points: field_usize(points.as_bytes())?,
    };
    Ok((input, header))
}

fn variable_line(input: &[u8]) -> IResult<&[u8], Variable> {
    let field = take_till1(is_blank);
    let (input, (_, idx, _, name, _, unit)) =
        tuple((space0, &field, space1, &field, space1, &field))(input)?;
    // AC plots may append `grid=` or `dims=` annotations; skip to end of line.
    let (input, _) = take_while(|c| !is_line_ending(c))(input)?;
    let (input, _) = line_ending(input)?;
    Ok((
        input,
        Variable {
            idx: field_usize(idx)?,
            name: utf8(name)?.to_string(),
            unit: utf8(unit)?.to_string(),
        },
    ))
}

fn variable_table(input: &[u8]) -> IResult<&[u8], Vec<Variable>> {
    let (input, _) = tuple((
        tag_no_case("Variables:"),
        space0,
        opt(line_ending),
        space0,
    ))(input)?;
    many0(variable_line)(input)
}

fn double(input: &[u8], order: ByteOrder) -> IResult<&[u8], f64> {
    match order {
        ByteOrder::BigEndian => be_f64(input),
        ByteOrder::LittleEndian => le_f64(input),
    }
}

fn binary_block(
    vars: usize,
    points: usize,
    complex: bool,
    order: ByteOrder,
) -> impl Fn(&[u8]) -> IResult<&[u8], PlotData> {
    move |input| {
        let (mut input, _) = tuple((tag_no_case("Binary:"), space0, line_ending))(input)?;
        if complex {
            let mut traces = vec![ComplexTrace::with_capacity(points); vars];
            for _ in 0..points {
                for trace in traces.iter_mut() {
                    let val;
                    (input, val) = double(input, order)?;
                    trace.real.push(val);
                    let val;
                    (input, val) = double(input, order)?;
                    trace.imag.push(val);
                }
            }
            Ok((input, PlotData::Complex(traces)))
        } else {
            let mut traces = vec![Vec::with_capacity(points); vars];
            for _ in 0..points {
                for trace in traces.iter_mut() {
                    let val;
                    (input, val) = double(input, order)?;
                    trace.push(val);
                }
            }
            Ok((input, PlotData::Real(traces)))
        }
    }
}

fn ascii_block(
    vars: usize,
    points: usize,
    complex: bool,
) -> impl Fn(&[u8]) -> IResult<&[u8], PlotData> {
    move |input| {
        let (mut input, _) = tuple((tag_no_case("Values:"), space0, line_ending))(input)?;
        (input, _) = take_while(is_blank)(input)?;
        if complex {
            let mut traces = vec![ComplexTrace::with_capacity(points); vars];
            for _ in 0..points {
                // Point index; each value follows as `real,imag`.
                (input, _) = take_till1(is_blank)(input)?;
                for trace in traces.iter_mut() {
                    (input, _) = take_while1(is_blank)(input)?;
                    let re;
                    (input, re) = take_till1(|c| c == b',')(input)?;
                    trace.real.push(field_f64(re)?);
                    (input, _) = take(1usize)(input)?;
                    let im;
                    (input, im) = take_till1(is_blank)(input)?;
                    trace.imag.push(field_f64(im)?);
                }
                (input, _) = take_while(is_blank)(input)?;
            }
            Ok((input, PlotData::Complex(traces)))
        } else {
            let mut traces = vec![Vec::with_capacity(points); vars];
            for _ in 0..points {
                (input, _) = take_till1(is_blank)(input)?;
                for trace in traces.iter_mut() {
                    (input, _) = take_while1(is_blank)(input)?;
                    let val;
                    (input, val) = take_till1(is_blank)(input)?;
                    trace.push(field_f64(val)?);
                }
                (input, _) = take_while(is_blank)(input)?;
            }
            Ok((input, PlotData::Real(traces)))
        }
    }
}

fn plot(opts: Options) -> impl Fn(&[u8]) -> IResult<&[u8], Plot> {
    move |input| {
        let (input, _) = take_while(is_blank)(input)?;
        let (input, header) = plot_header(input)?;
        let (input, variables) = variable_table(input)?;
        let complex = header.flags.contains("complex");
        let (input, data) = alt((
            binary_block(header.variables, header.points, complex, opts.endianness),
            ascii_block(header.variables, header.points, complex),
        ))(input)?;
        Ok((
            input,
            Plot {
                title: header.title.map(str::to_string),
                date: header.date.map(str::to_string),
                name: header.name.to_string(),
                flags: header.flags.to_string(),
                variables,
                data,
            },
        ))
    }
}

pub(crate) fn plots(input: &[u8], opts: Options) -> IResult<&[u8], Vec<Plot>> {
    many0(plot(opts))(input)
}
