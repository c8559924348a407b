//! Interpretation of the simulator's printed responses.
//!
//! The interactive interpreter answers every command with some printed output
//! followed by the value of the evaluated expression on its own line: `t` for
//! success, `nil` for failure, or the queried value itself. List commands
//! print one parenthesized entry per line above the status. This module
//! scrapes those fixed shapes; anything else is a parse error, never a guess.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Error, Result};

lazy_static! {
    /// `("name" "type")` entries printed by the list commands.
    static ref NAME_PAIR: Regex = Regex::new(r#"\(\s*"([^"]*)"\s+"([^"]*)"\s*\)"#).unwrap();
    /// Any quoted string.
    static ref QUOTED: Regex = Regex::new(r#""([^"]*)""#).unwrap();
    /// One `("name" value)` line of an attribute or parameter listing.
    static ref ATTR_LINE: Regex = Regex::new(r#"^\(\s*"([^"]+)"\s+(.*)\)\s*$"#).unwrap();
}

/// A scalar value printed by the simulator.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A number, after engineering-suffix scaling.
    Num(f64),
    /// A string, unquoted.
    Str(String),
    /// A boolean (`t` / `nil`).
    Bool(bool),
    /// A parenthesized list.
    List(Vec<Value>),
}

impl Value {
    /// The numeric value, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Num(v) => Some(*v),
            _ => None,
        }
    }

    /// The string value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Classifies one bare token.
    pub(crate) fn token(token: &str) -> Value {
        let t = token.trim();
        if let Some(stripped) = t.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
            return Value::Str(stripped.to_string());
        }
        match t {
            "t" => Value::Bool(true),
            "nil" => Value::Bool(false),
            _ => scaled_f64(t)
                .map(Value::Num)
                .unwrap_or_else(|| Value::Str(t.to_string())),
        }
    }

    /// Classifies printed value text, which may be a parenthesized list of
    /// quoted strings (the shape of a `choices` attribute).
    pub(crate) fn text(text: &str) -> Value {
        let t = text.trim();
        if t.starts_with('(') {
            Value::List(
                QUOTED
                    .captures_iter(t)
                    .map(|c| Value::Str(c[1].to_string()))
                    .collect(),
            )
        } else {
            Value::token(t)
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Num(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Converts a numeric token to a float, applying engineering-suffix scaling.
///
/// `160n` converts to `1.6e-7`. The suffixes follow Spectre's case-sensitive
/// spelling, where `M` is mega and `m` is milli:
/// `T G M K k % m u n p f a`.
pub fn scaled_f64(token: &str) -> Option<f64> {
    let t = token.trim();
    if t.is_empty() {
        return None;
    }
    if let Ok(v) = t.parse::<f64>() {
        return Some(v);
    }
    if !t.is_char_boundary(t.len() - 1) {
        return None;
    }
    let (digits, suffix) = t.split_at(t.len() - 1);
    let scale = match suffix {
        "T" => 1e12,
        "G" => 1e9,
        "M" => 1e6,
        "K" | "k" => 1e3,
        "%" => 1e-2,
        "m" => 1e-3,
        "u" => 1e-6,
        "n" => 1e-9,
        "p" => 1e-12,
        "f" => 1e-15,
        "a" => 1e-18,
        _ => return None,
    };
    digits.parse::<f64>().ok().map(|v| v * scale)
}

/// The closed set of parameter attributes the simulator exposes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum AttrKind {
    /// The parameter's value.
    Value,
    /// The smallest accepted value.
    Min,
    /// The largest accepted value.
    Max,
    /// The value's units.
    Units,
    /// The accepted values of an enumerated parameter.
    Choices,
}

impl AttrKind {
    /// Maps an attribute name printed by the simulator to its kind.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "value" => Some(Self::Value),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "units" => Some(Self::Units),
            "choices" => Some(Self::Choices),
            _ => None,
        }
    }
}

impl std::fmt::Display for AttrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Value => write!(f, "value"),
            Self::Min => write!(f, "min"),
            Self::Max => write!(f, "max"),
            Self::Units => write!(f, "units"),
            Self::Choices => write!(f, "choices"),
        }
    }
}

/// The typed attribute structure of one parameter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    /// The current value.
    pub value: Option<Value>,
    /// The smallest accepted value.
    pub min: Option<f64>,
    /// The largest accepted value.
    pub max: Option<f64>,
    /// The value's units.
    pub units: Option<String>,
    /// The accepted values of an enumerated parameter.
    pub choices: Option<Vec<String>>,
}

impl Attributes {
    fn from_pairs(pairs: Vec<(String, Value)>, response: &Response) -> Result<Self> {
        let mut attrs = Attributes::default();
        for (name, value) in pairs {
            match AttrKind::from_name(&name) {
                Some(AttrKind::Value) => attrs.value = Some(value),
                Some(AttrKind::Min) => {
                    attrs.min = Some(
                        value
                            .as_f64()
                            .ok_or_else(|| response.parse_err("min is not a number"))?,
                    )
                }
                Some(AttrKind::Max) => {
                    attrs.max = Some(
                        value
                            .as_f64()
                            .ok_or_else(|| response.parse_err("max is not a number"))?,
                    )
                }
                Some(AttrKind::Units) => {
                    attrs.units = Some(
                        value
                            .as_str()
                            .ok_or_else(|| response.parse_err("units is not a string"))?
                            .to_string(),
                    )
                }
                Some(AttrKind::Choices) => {
                    let Value::List(items) = value else {
                        return Err(response.parse_err("choices is not a list"));
                    };
                    attrs.choices = Some(
                        items
                            .into_iter()
                            .map(|item| {
                                item.as_str().map(str::to_string).ok_or_else(|| {
                                    response.parse_err("choices entry is not a string")
                                })
                            })
                            .collect::<Result<_>>()?,
                    )
                }
                None => {
                    return Err(response.parse_err(format!("unknown attribute `{name}`")));
                }
            }
        }
        Ok(attrs)
    }
}

/// One response block: everything the simulator printed before its prompt.
#[derive(Debug, Clone)]
pub(crate) struct Response {
    command: String,
    text: String,
}

impl Response {
    pub(crate) fn new(command: String, raw: &str) -> Self {
        Self {
            command,
            text: raw.replace("\r\n", "\n"),
        }
    }

    /// The last non-empty line: the value of the evaluated expression.
    fn status_line(&self) -> Option<&str> {
        self.text.lines().rev().map(str::trim).find(|l| !l.is_empty())
    }

    /// Whether the interpreter reported success (anything but `nil`).
    pub(crate) fn succeeded(&self) -> bool {
        self.status_line() != Some("nil")
    }

    /// The `("name" "type")` entries of a list response, in print order.
    pub(crate) fn name_pairs(&self) -> Vec<(String, String)> {
        NAME_PAIR
            .captures_iter(&self.text)
            .map(|c| (c[1].to_string(), c[2].to_string()))
            .collect()
    }

    /// Every quoted string in the response, in print order.
    pub(crate) fn quoted_names(&self) -> Vec<String> {
        QUOTED
            .captures_iter(&self.text)
            .map(|c| c[1].to_string())
            .collect()
    }

    /// The `("name" value)` lines of an attribute or parameter listing.
    pub(crate) fn value_pairs(&self) -> Result<Vec<(String, Value)>> {
        let mut pairs = Vec::new();
        for line in self.text.lines().map(str::trim) {
            if line.is_empty() || line == "t" || line == "nil" {
                continue;
            }
            let caps = ATTR_LINE
                .captures(line)
                .ok_or_else(|| self.parse_err(format!("unexpected line `{line}`")))?;
            pairs.push((caps[1].to_string(), Value::text(&caps[2])));
        }
        Ok(pairs)
    }

    /// The response as a typed attribute structure.
    pub(crate) fn attributes(&self) -> Result<Attributes> {
        Attributes::from_pairs(self.value_pairs()?, self)
    }

    /// The response as a single printed value.
    pub(crate) fn scalar(&self) -> Result<Value> {
        let line = self
            .status_line()
            .ok_or_else(|| self.parse_err("empty response"))?;
        Ok(Value::token(line))
    }

    pub(crate) fn parse_err(&self, detail: impl Into<String>) -> Error {
        Error::Parse {
            command: self.command.clone(),
            detail: detail.into(),
        }
    }
}
