//! Analysis declarations and simulator presets.

use std::fmt::Display;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Analysis statement types accepted by
/// [`Session::create_analysis`](crate::Session::create_analysis).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum AnalysisType {
    /// AC small-signal analysis.
    Ac,
    /// DC operating point or sweep.
    Dc,
    /// Transient analysis.
    Tran,
    /// Noise analysis.
    Noise,
    /// Transfer-function analysis.
    Xf,
    /// S-parameter analysis.
    Sp,
    /// Pole-zero analysis.
    Pz,
    /// Sensitivity analysis.
    Sens,
    /// Stability analysis.
    Stb,
    /// Parameter sweep wrapping a child analysis.
    Sweep,
    /// Monte Carlo wrapping a child analysis.
    MonteCarlo,
    /// Periodic steady state.
    Pss,
    /// Periodic AC.
    Pac,
    /// Periodic noise.
    Pnoise,
    /// Periodic transfer function.
    Pxf,
    /// Periodic S-parameter.
    Psp,
    /// Envelope following.
    Envlp,
    /// Harmonic balance.
    Hb,
    /// Harmonic-balance AC.
    Hbac,
    /// Harmonic-balance noise.
    Hbnoise,
}

impl AnalysisType {
    /// The statement name in the simulator's spelling.
    pub fn name(&self) -> &'static str {
        match *self {
            Self::Ac => "ac",
            Self::Dc => "dc",
            Self::Tran => "tran",
            Self::Noise => "noise",
            Self::Xf => "xf",
            Self::Sp => "sp",
            Self::Pz => "pz",
            Self::Sens => "sens",
            Self::Stb => "stb",
            Self::Sweep => "sweep",
            Self::MonteCarlo => "montecarlo",
            Self::Pss => "pss",
            Self::Pac => "pac",
            Self::Pnoise => "pnoise",
            Self::Pxf => "pxf",
            Self::Psp => "psp",
            Self::Envlp => "envlp",
            Self::Hb => "hb",
            Self::Hbac => "hbac",
            Self::Hbnoise => "hbnoise",
        }
    }

    /// The inverse of [`AnalysisType::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ac" => Some(Self::Ac),
            "dc" => Some(Self::Dc),
            "tran" => Some(Self::Tran),
            "noise" => Some(Self::Noise),
            "xf" => Some(Self::Xf),
            "sp" => Some(Self::Sp),
            "pz" => Some(Self::Pz),
            "sens" => Some(Self::Sens),
            "stb" => Some(Self::Stb),
            "sweep" => Some(Self::Sweep),
            "montecarlo" => Some(Self::MonteCarlo),
            "pss" => Some(Self::Pss),
            "pac" => Some(Self::Pac),
            "pnoise" => Some(Self::Pnoise),
            "pxf" => Some(Self::Pxf),
            "psp" => Some(Self::Psp),
            "envlp" => Some(Self::Envlp),
            "hb" => Some(Self::Hb),
            "hbac" => Some(Self::Hbac),
            "hbnoise" => Some(Self::Hbnoise),
            _ => None,
        }
    }
}

impl Display for AnalysisType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Spectre error presets.
#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
pub enum ErrPreset {
    /// Liberal.
    Liberal,
    /// Moderate.
    #[default]
    Moderate,
    /// Conservative.
    Conservative,
}

impl Display for ErrPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Liberal => write!(f, "liberal"),
            Self::Moderate => write!(f, "moderate"),
            Self::Conservative => write!(f, "conservative"),
        }
    }
}

/// Spectre X presets (the `+preset=` launch flag).
///
/// `Cx` is the most accurate mode and `Vx` the highest-performing.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum XPreset {
    /// Conservative.
    Cx,
    /// Accurate.
    Ax,
    /// Moderate.
    Mx,
    /// Liberal.
    Lx,
    /// Very liberal.
    Vx,
}

impl Display for XPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Cx => write!(f, "cx"),
            Self::Ax => write!(f, "ax"),
            Self::Mx => write!(f, "mx"),
            Self::Lx => write!(f, "lx"),
            Self::Vx => write!(f, "vx"),
        }
    }
}

/// Sweep kinds.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Sweep {
    /// Linear sweep with the given number of points.
    Linear(usize),
    /// Logarithmic sweep with the given number of points.
    Logarithmic(usize),
    /// Logarithmic sweep with the given number of points **per decade**.
    Decade(usize),
}

/// A typed bundle of analysis parameters.
///
/// Implementors expand into the attribute assignments applied after the
/// analysis is created; see
/// [`Session::create_analysis_with`](crate::Session::create_analysis_with).
pub trait AnalysisParams {
    /// The analysis statement type this bundle configures.
    const TYPE: AnalysisType;

    /// The `(parameter, value)` assignments this bundle expands to.
    fn params(&self) -> Vec<(&'static str, String)>;
}

/// A transient analysis.
#[derive(Clone, Default, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Tran {
    /// Stop time (sec).
    pub stop: Decimal,
    /// Start time (sec).
    ///
    /// Defaults to 0.
    pub start: Option<Decimal>,
    /// The error preset.
    pub errpreset: Option<ErrPreset>,
}

impl AnalysisParams for Tran {
    const TYPE: AnalysisType = AnalysisType::Tran;

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("stop", self.stop.to_string())];
        if let Some(ref start) = self.start {
            params.push(("start", start.to_string()));
        }
        if let Some(errpreset) = self.errpreset {
            params.push(("errpreset", errpreset.to_string()));
        }
        params
    }
}

/// An AC small-signal analysis.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Ac {
    /// Start frequency (Hz).
    pub start: Decimal,
    /// Stop frequency (Hz).
    pub stop: Decimal,
    /// The sweep kind and number of points.
    pub sweep: Sweep,
}

impl AnalysisParams for Ac {
    const TYPE: AnalysisType = AnalysisType::Ac;

    fn params(&self) -> Vec<(&'static str, String)> {
        let sweep = match &self.sweep {
            Sweep::Linear(n) => ("lin", n.to_string()),
            Sweep::Logarithmic(n) => ("log", n.to_string()),
            Sweep::Decade(n) => ("dec", n.to_string()),
        };
        vec![
            ("start", self.start.to_string()),
            ("stop", self.stop.to_string()),
            sweep,
        ]
    }
}

/// A DC sweep.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Dc {
    /// The netlist parameter to sweep.
    pub param: String,
    /// The initial parameter value.
    pub start: Decimal,
    /// The final parameter value.
    pub stop: Decimal,
    /// The step size.
    pub step: Decimal,
}

impl AnalysisParams for Dc {
    const TYPE: AnalysisType = AnalysisType::Dc;

    fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("param", self.param.clone()),
            ("start", self.start.to_string()),
            ("stop", self.stop.to_string()),
            ("step", self.step.to_string()),
        ]
    }
}
