// Session configuration: one cycle of phases, a cycle bound, and the geometry to render on.
// Parsed from JSON passed in by the page; validated before any timer can start.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::sequence::{Phase, PhaseDurations, PhaseSequence, Template};
use crate::visual::Geometry;

/// How many cycles a session runs before completion fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CyclesRepr", into = "CyclesRepr")]
pub enum CycleLimit {
    Bounded(u32),
    /// Continuous player mode: loops until stopped.
    Infinite,
}

impl Default for CycleLimit {
    fn default() -> Self {
        CycleLimit::Bounded(1)
    }
}

impl CycleLimit {
    /// True once `cycles_completed` reaches the bound. Never true for `Infinite`.
    pub fn is_reached(&self, cycles_completed: u32) -> bool {
        match self {
            CycleLimit::Bounded(n) => cycles_completed >= *n,
            CycleLimit::Infinite => false,
        }
    }

    pub fn bound(&self) -> Option<u32> {
        match self {
            CycleLimit::Bounded(n) => Some(*n),
            CycleLimit::Infinite => None,
        }
    }
}

/// JSON form of a cycle limit: a count or the keyword `"infinite"`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
enum CyclesRepr {
    Count(u32),
    Keyword(CyclesKeyword),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum CyclesKeyword {
    Infinite,
}

impl From<CyclesRepr> for CycleLimit {
    fn from(repr: CyclesRepr) -> Self {
        match repr {
            CyclesRepr::Count(n) => CycleLimit::Bounded(n),
            CyclesRepr::Keyword(CyclesKeyword::Infinite) => CycleLimit::Infinite,
        }
    }
}

impl From<CycleLimit> for CyclesRepr {
    fn from(limit: CycleLimit) -> Self {
        match limit {
            CycleLimit::Bounded(n) => CyclesRepr::Count(n),
            CycleLimit::Infinite => CyclesRepr::Keyword(CyclesKeyword::Infinite),
        }
    }
}

/// Engine configuration passed from JS.
///
/// # Example JSON Config
/// ```json
/// {
///   "template": "square",
///   "durations": { "inhale": 4, "holdHigh": 4, "exhale": 4, "holdLow": 4 },
///   "cycles": 5,
///   "geometry": { "shape": "square", "center": { "x": 0.5, "y": 0.5 }, "half_size": 0.4 }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfigJson {
    #[serde(default)]
    pub template: Template,
    #[serde(default)]
    pub durations: PhaseDurations,
    #[serde(default)]
    pub cycles: CycleLimit,
    /// Falls back to the template's own shape when absent.
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

/// Validated session configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    sequence: PhaseSequence,
    cycles: CycleLimit,
    geometry: Geometry,
}

impl SessionConfig {
    pub fn new(
        sequence: PhaseSequence,
        cycles: CycleLimit,
        geometry: Geometry,
    ) -> Result<Self, EngineError> {
        if cycles == CycleLimit::Bounded(0) {
            return Err(EngineError::config("cycles", "must be at least 1"));
        }
        geometry.validate()?;
        Ok(SessionConfig {
            sequence,
            cycles,
            geometry,
        })
    }

    /// Build from a template with default geometry.
    pub fn from_template(
        template: Template,
        durations: &PhaseDurations,
        cycles: CycleLimit,
    ) -> Result<Self, EngineError> {
        let sequence = PhaseSequence::build(template, durations)?;
        Self::new(sequence, cycles, Geometry::for_template(template))
    }

    /// Build from an explicit phase list.
    pub fn from_phases(
        phases: Vec<Phase>,
        cycles: CycleLimit,
        geometry: Geometry,
    ) -> Result<Self, EngineError> {
        Self::new(PhaseSequence::from_phases(phases)?, cycles, geometry)
    }

    pub fn from_json(config_json: &str) -> Result<Self, EngineError> {
        let raw: SessionConfigJson = serde_json::from_str(config_json)?;
        Self::try_from(raw)
    }

    pub fn sequence(&self) -> &PhaseSequence {
        &self.sequence
    }

    pub fn cycles(&self) -> CycleLimit {
        self.cycles
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Planned session length in seconds, `None` when unbounded.
    pub fn planned_secs(&self) -> Option<f64> {
        self.cycles
            .bound()
            .map(|n| n as f64 * self.sequence.cycle_secs())
    }
}

impl TryFrom<SessionConfigJson> for SessionConfig {
    type Error = EngineError;

    fn try_from(raw: SessionConfigJson) -> Result<Self, Self::Error> {
        let sequence = PhaseSequence::build(raw.template, &raw.durations)?;
        let geometry = raw
            .geometry
            .unwrap_or_else(|| Geometry::for_template(raw.template));
        Self::new(sequence, raw.cycles, geometry)
    }
}
