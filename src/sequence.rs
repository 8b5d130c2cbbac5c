// Phase sequences for breathing exercises.
// Pure data: templates plus named durations in, an ordered immutable phase list out. No timing logic.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::PhaseKind;

/// Exercise template selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Template {
    /// Resonance breathing: equal inhale and exhale, no holds.
    #[default]
    Coherence,
    /// Box breathing: inhale, hold, exhale, hold.
    Square,
    /// Inhale, hold, exhale.
    Triangle,
    /// Inhale and exhale required, holds included only when given.
    Custom,
}

/// Named durations in seconds. Missing entries fall back to the template defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PhaseDurations {
    #[serde(default)]
    pub inhale: Option<f64>,
    #[serde(default)]
    pub exhale: Option<f64>,
    #[serde(default)]
    pub hold_high: Option<f64>,
    #[serde(default)]
    pub hold_low: Option<f64>,
}

impl PhaseDurations {
    pub fn new(inhale: f64, exhale: f64) -> Self {
        PhaseDurations {
            inhale: Some(inhale),
            exhale: Some(exhale),
            ..Default::default()
        }
    }

    pub fn with_holds(mut self, hold_high: f64, hold_low: f64) -> Self {
        self.hold_high = Some(hold_high);
        self.hold_low = Some(hold_low);
        self
    }
}

impl Template {
    /// Built-in durations for the template, `None` for `Custom`.
    pub fn default_durations(&self) -> Option<PhaseDurations> {
        match self {
            Template::Coherence => Some(PhaseDurations::new(5.5, 5.5)),
            Template::Square => Some(PhaseDurations::new(4.0, 4.0).with_holds(4.0, 4.0)),
            Template::Triangle => Some(PhaseDurations {
                hold_high: Some(4.0),
                ..PhaseDurations::new(4.0, 4.0)
            }),
            Template::Custom => None,
        }
    }
}

/// Longest accepted phase: one day.
pub const MAX_PHASE_SECS: f64 = 86_400.0;

/// One segment of a breathing cycle. Immutable once built.
///
/// Serializes as `{ kind, duration_secs, label }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "PhaseJson")]
pub struct Phase {
    kind: PhaseKind,
    duration_us: u64,
    label: String,
}

impl Phase {
    /// Build a phase from a duration in seconds.
    pub fn new(kind: PhaseKind, duration_secs: f64) -> Result<Self, EngineError> {
        Self::with_label(kind, duration_secs, kind.default_label())
    }

    pub fn with_label(
        kind: PhaseKind,
        duration_secs: f64,
        label: impl Into<String>,
    ) -> Result<Self, EngineError> {
        let duration_us = validate_seconds("durationSeconds", duration_secs)?;
        Ok(Phase {
            kind,
            duration_us,
            label: label.into(),
        })
    }

    pub fn kind(&self) -> PhaseKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn duration_us(&self) -> u64 {
        self.duration_us
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_us as f64 / 1_000_000.0
    }
}

#[derive(Serialize)]
struct PhaseJson {
    kind: PhaseKind,
    duration_secs: f64,
    label: String,
}

impl From<Phase> for PhaseJson {
    fn from(phase: Phase) -> Self {
        PhaseJson {
            kind: phase.kind,
            duration_secs: phase.duration_secs(),
            label: phase.label,
        }
    }
}

/// Check that `secs` is a finite, positive duration and convert it to whole microseconds.
pub(crate) fn validate_seconds(field: &str, secs: f64) -> Result<u64, EngineError> {
    if !secs.is_finite() {
        return Err(EngineError::config(field, "must be a finite number"));
    }
    if secs <= 0.0 {
        return Err(EngineError::config(
            field,
            format!("must be greater than zero (got {})", secs),
        ));
    }
    if secs > MAX_PHASE_SECS {
        return Err(EngineError::config(
            field,
            format!("is too large (got {}, max {})", secs, MAX_PHASE_SECS),
        ));
    }
    let us = (secs * 1_000_000.0).round();
    if us < 1.0 {
        return Err(EngineError::config(field, "is shorter than one microsecond"));
    }
    Ok(us as u64)
}

/// Start and end value of a quantity over one phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct Span {
    pub start: f32,
    pub end: f32,
}

impl Span {
    pub fn new(start: f32, end: f32) -> Self {
        Span { start, end }
    }

    pub fn constant(value: f32) -> Self {
        Span::new(value, value)
    }

    pub fn lerp(&self, t: f32) -> f32 {
        self.start + (self.end - self.start) * t
    }

    pub fn is_constant(&self) -> bool {
        self.start == self.end
    }
}

/// Where a phase sits in the cycle: lung fullness and perimeter fraction covered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct PhaseTrack {
    /// 0.0 = empty, 1.0 = full. Inhale rises to 1, exhale falls to 0, hold keeps the level.
    pub level: Span,
    /// Fraction of a closed path. Moving phases split [0, 1] evenly, holds stay put.
    pub arc: Span,
}

/// Ordered phases for one cycle, with their precomputed tracks.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSequence {
    phases: Vec<Phase>,
    tracks: Vec<PhaseTrack>,
}

impl PhaseSequence {
    /// Build the phase list for a template. Every duration used must be finite and positive.
    pub fn build(template: Template, durations: &PhaseDurations) -> Result<Self, EngineError> {
        let defaults = template.default_durations().unwrap_or_default();
        let pick = |given: Option<f64>, fallback: Option<f64>| given.or(fallback);

        let inhale = pick(durations.inhale, defaults.inhale)
            .ok_or_else(|| EngineError::config("inhale", "is required"))?;
        let exhale = pick(durations.exhale, defaults.exhale)
            .ok_or_else(|| EngineError::config("exhale", "is required"))?;
        let hold_high = pick(durations.hold_high, defaults.hold_high);
        let hold_low = pick(durations.hold_low, defaults.hold_low);

        let mut slots: Vec<(PhaseKind, &str, f64)> = vec![(PhaseKind::Inhale, "inhale", inhale)];
        match template {
            Template::Coherence => {
                slots.push((PhaseKind::Exhale, "exhale", exhale));
            }
            Template::Triangle => {
                let hold = hold_high.ok_or_else(|| EngineError::config("holdHigh", "is required"))?;
                slots.push((PhaseKind::Hold, "holdHigh", hold));
                slots.push((PhaseKind::Exhale, "exhale", exhale));
            }
            Template::Square => {
                let high = hold_high.ok_or_else(|| EngineError::config("holdHigh", "is required"))?;
                let low = hold_low.ok_or_else(|| EngineError::config("holdLow", "is required"))?;
                slots.push((PhaseKind::Hold, "holdHigh", high));
                slots.push((PhaseKind::Exhale, "exhale", exhale));
                slots.push((PhaseKind::Hold, "holdLow", low));
            }
            Template::Custom => {
                if let Some(high) = hold_high {
                    slots.push((PhaseKind::Hold, "holdHigh", high));
                }
                slots.push((PhaseKind::Exhale, "exhale", exhale));
                if let Some(low) = hold_low {
                    slots.push((PhaseKind::Hold, "holdLow", low));
                }
            }
        }

        let phases = slots
            .into_iter()
            .map(|(kind, field, secs)| -> Result<Phase, EngineError> {
                Ok(Phase {
                    kind,
                    duration_us: validate_seconds(field, secs)?,
                    label: kind.default_label().to_string(),
                })
            })
            .collect::<Result<Vec<_>, EngineError>>()?;

        Self::from_phases(phases)
    }

    /// Wrap an explicit phase list. Fails on an empty list.
    pub fn from_phases(phases: Vec<Phase>) -> Result<Self, EngineError> {
        if phases.is_empty() {
            return Err(EngineError::config("phases", "must not be empty"));
        }
        let tracks = compute_tracks(&phases);
        Ok(PhaseSequence { phases, tracks })
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Phase> {
        self.phases.get(index)
    }

    pub fn track(&self, index: usize) -> Option<&PhaseTrack> {
        self.tracks.get(index)
    }

    /// Phase and track at `index`. Callers keep `index < len()`.
    pub(crate) fn entry(&self, index: usize) -> (&Phase, &PhaseTrack) {
        (&self.phases[index], &self.tracks[index])
    }

    /// Duration of one full cycle in microseconds.
    pub fn cycle_us(&self) -> u64 {
        self.phases
            .iter()
            .fold(0u64, |total, phase| total.saturating_add(phase.duration_us))
    }

    pub fn cycle_secs(&self) -> f64 {
        self.cycle_us() as f64 / 1_000_000.0
    }

    pub fn breaths_per_minute(&self) -> f64 {
        60.0 / self.cycle_secs()
    }
}

fn compute_tracks(phases: &[Phase]) -> Vec<PhaseTrack> {
    let moving = phases.iter().filter(|p| p.kind != PhaseKind::Hold).count();

    // Start where the cycle ends so the wrap from last phase to first is seamless.
    let mut level = phases
        .iter()
        .rev()
        .find_map(|p| target_level(p.kind))
        .unwrap_or(0.0);
    let mut arc = 0.0_f32;
    let mut moved = 0usize;

    phases
        .iter()
        .map(|phase| {
            let level_end = target_level(phase.kind).unwrap_or(level);
            let arc_end = if phase.kind == PhaseKind::Hold {
                arc
            } else {
                moved += 1;
                moved as f32 / moving as f32
            };
            let track = PhaseTrack {
                level: Span::new(level, level_end),
                arc: Span::new(arc, arc_end),
            };
            level = level_end;
            arc = arc_end;
            track
        })
        .collect()
}

fn target_level(kind: PhaseKind) -> Option<f32> {
    match kind {
        PhaseKind::Inhale => Some(1.0),
        PhaseKind::Exhale => Some(0.0),
        PhaseKind::Hold => None,
    }
}
