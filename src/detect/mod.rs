//! Fault detection and diagnosis timing over scenario replays.

pub mod evaluator;
pub mod report;
pub mod sample;

pub use self::evaluator::{
    evaluate, Evaluation, EvaluationState, EvaluatorParams, Outcome, TimingReport, TraceStep,
};
pub use self::sample::{Sample, SampleRecord};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectError {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("sample {index} is missing required field `{field}`")]
    MissingField { index: usize, field: &'static str },

    #[error("sample {index} has sequence index {sequence_index}, expected greater than {previous}")]
    OutOfOrder {
        index: usize,
        sequence_index: u64,
        previous: u64,
    },

    #[error("unknown scenario class {0} (expected {min}..={max})", min = ScenarioClass::MIN, max = ScenarioClass::MAX)]
    UnknownScenario(i64),
}

/// Round a diagnosis code to the fault class it predicts.
///
/// Ties go to the even neighbour: 1.5 rounds to 2, 2.5 rounds to 2.
pub fn round_diagnosis(code: f64) -> f64 {
    code.round_ties_even()
}

/// A Tennessee Eastman fault scenario, numbered 1 through 20.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct ScenarioClass(u8);

impl ScenarioClass {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 20;

    pub fn new(id: i64) -> Result<Self, DetectError> {
        if id < i64::from(Self::MIN) || id > i64::from(Self::MAX) {
            return Err(DetectError::UnknownScenario(id));
        }
        Ok(Self(id as u8))
    }

    pub fn id(self) -> u8 {
        self.0
    }

    /// Every scenario in the catalogue, in ascending order.
    pub fn all() -> impl Iterator<Item = ScenarioClass> {
        (Self::MIN..=Self::MAX).map(ScenarioClass)
    }

    /// Disturbance the scenario injects into the process.
    pub fn description(self) -> &'static str {
        match self.0 {
            1 => "A/C feed ratio, B composition constant (stream 4): step",
            2 => "B composition, A/C ratio constant (stream 4): step",
            3 => "D feed temperature (stream 2): step",
            4 => "Reactor cooling water inlet temperature: step",
            5 => "Condenser cooling water inlet temperature: step",
            6 => "A feed loss (stream 1): step",
            7 => "C header pressure loss (stream 4): step",
            8 => "A, B, C feed composition (stream 4): random variation",
            9 => "D feed temperature (stream 2): random variation",
            10 => "C feed temperature (stream 4): random variation",
            11 => "Reactor cooling water inlet temperature: random variation",
            12 => "Condenser cooling water inlet temperature: random variation",
            13 => "Reaction kinetics: slow drift",
            14 => "Reactor cooling water valve: sticking",
            15 => "Condenser cooling water valve: sticking",
            _ => "Unknown disturbance",
        }
    }

    /// Whether a raw diagnosis code rounds to this scenario.
    pub fn matches(self, code: f64) -> bool {
        round_diagnosis(code) == f64::from(self.0)
    }
}

impl TryFrom<i64> for ScenarioClass {
    type Error = DetectError;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl From<ScenarioClass> for u8 {
    fn from(class: ScenarioClass) -> Self {
        class.0
    }
}

impl std::fmt::Display for ScenarioClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ScenarioClass {
    type Err = DetectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id: i64 = s
            .trim()
            .parse()
            .map_err(|_| DetectError::InvalidParameter {
                name: "scenario",
                reason: format!("`{}` is not an integer", s),
            })?;
        Self::new(id)
    }
}
