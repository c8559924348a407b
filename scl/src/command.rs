//! Construction of SCL command strings.
//!
//! Each function renders exactly the text the interpreter expects, ready to be
//! written to the command channel followed by a newline.

use std::fmt::Display;

use itertools::Itertools;

use crate::analysis::AnalysisType;
use crate::parse::Value;

/// The scope that owns a parameter.
#[derive(Copy, Clone, Debug)]
pub(crate) enum Scope<'a> {
    /// The top-level circuit.
    Circuit,
    /// A placed instance.
    Instance(&'a str),
    /// A named analysis.
    Analysis(&'a str),
}

impl Display for Scope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Circuit => write!(f, r#"(sclGetCircuit "")"#),
            Self::Instance(name) => write!(f, r#"(sclGetInstance "{name}")"#),
            Self::Analysis(name) => write!(f, r#"(sclGetAnalysis "{name}")"#),
        }
    }
}

/// Renders a [`Value`] as an SCL literal.
pub(crate) fn literal(value: &Value) -> String {
    match value {
        Value::Num(v) => format!("{v}"),
        Value::Str(s) => format!("\"{s}\""),
        Value::Bool(true) => "t".to_string(),
        Value::Bool(false) => "nil".to_string(),
        Value::List(items) => format!("({})", items.iter().map(literal).join(" ")),
    }
}

pub(crate) fn list_analyses() -> String {
    "(sclListAnalysis)".to_string()
}

pub(crate) fn list_instances() -> String {
    "(sclListInstance)".to_string()
}

pub(crate) fn list_nets() -> String {
    "(sclListNet)".to_string()
}

pub(crate) fn list_parameters(scope: Scope) -> String {
    format!("(sclListParameter {scope})")
}

pub(crate) fn list_attributes(scope: Scope, param: &str) -> String {
    format!(r#"(sclListAttribute (sclGetParameter {scope} "{param}"))"#)
}

pub(crate) fn get_attribute(scope: Scope, param: &str, attr: impl Display) -> String {
    format!(r#"(sclGetAttribute (sclGetParameter {scope} "{param}") "{attr}")"#)
}

pub(crate) fn set_attribute(scope: Scope, param: &str, attr: impl Display, value: &Value) -> String {
    format!(
        r#"(sclSetAttribute (sclGetParameter {scope} "{param}") "{attr}" {})"#,
        literal(value)
    )
}

pub(crate) fn create_analysis(name: &str, kind: AnalysisType) -> String {
    format!(r#"(sclCreateAnalysis "{name}" "{kind}")"#)
}

pub(crate) fn run_all() -> String {
    r#"(sclRun "all")"#.to_string()
}

pub(crate) fn run_analysis(name: &str) -> String {
    format!(r#"(sclRunAnalysis (sclGetAnalysis "{name}"))"#)
}

pub(crate) fn quit() -> String {
    "(sclQuit)".to_string()
}
