// Strong typing over strings. Newtypes for timestamps, tick generations, and normalized coordinates.
// All time values crossing into the engine are integer microseconds; seconds only appear at the output edge.

use serde::{Deserialize, Serialize};

/// Monotonic instant in microseconds. Newtype for type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn from_micros(us: u64) -> Self {
        Timestamp(us)
    }

    /// Convert a `DOMHighResTimeStamp` (fractional milliseconds) to a timestamp.
    /// Negative and non-finite inputs map to zero.
    pub fn from_millis_f64(ms: f64) -> Self {
        if !ms.is_finite() || ms <= 0.0 {
            return Timestamp(0);
        }
        Timestamp((ms * 1000.0).round() as u64)
    }

    pub fn from_secs_f64(secs: f64) -> Self {
        Self::from_millis_f64(secs * 1000.0)
    }

    pub fn as_micros(&self) -> u64 {
        self.0
    }

    pub fn as_millis(&self) -> f64 {
        self.0 as f64 / 1000.0
    }

    pub fn as_secs(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Microseconds from `earlier` to `self`, zero if `earlier` is later.
    pub fn saturating_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    pub fn saturating_add_micros(&self, us: u64) -> Self {
        Timestamp(self.0.saturating_add(us))
    }

    pub fn saturating_sub_micros(&self, us: u64) -> Self {
        Timestamp(self.0.saturating_sub(us))
    }
}

/// Convert whole microseconds to seconds.
pub fn micros_to_secs(us: u64) -> f64 {
    us as f64 / 1_000_000.0
}

/// Tick generation token. A scheduled frame is only honoured if it carries the current epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Epoch(u32);

impl Epoch {
    pub fn new(value: u32) -> Self {
        Epoch(value)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    pub fn next(&self) -> Self {
        Epoch(self.0.wrapping_add(1))
    }
}

impl std::fmt::Display for Epoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle returned by a scheduler for a pending frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameHandle(u32);

impl FrameHandle {
    pub fn new(id: u32) -> Self {
        FrameHandle(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

/// Normalized coordinate (0.0 to 1.0, resolution-independent). Origin is top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct NormalizedCoord {
    pub x: f32,
    pub y: f32,
}

impl NormalizedCoord {
    pub fn new(x: f32, y: f32) -> Self {
        NormalizedCoord {
            x: x.clamp(0.0, 1.0),
            y: y.clamp(0.0, 1.0),
        }
    }

    pub fn center() -> Self {
        NormalizedCoord { x: 0.5, y: 0.5 }
    }

    pub fn distance_to(&self, other: &NormalizedCoord) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Kind of breathing phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseKind {
    Inhale,
    Exhale,
    Hold,
}

impl PhaseKind {
    pub fn default_label(&self) -> &'static str {
        match self {
            PhaseKind::Inhale => "Inhale",
            PhaseKind::Exhale => "Exhale",
            PhaseKind::Hold => "Hold",
        }
    }
}

/// Session lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Running => "running",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Easing function applied to phase progress before interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EasingType {
    Linear,
    EaseOut,
    #[default]
    EaseInOut,
    Sine,
}

impl EasingType {
    /// Map `t` in [0, 1] to eased progress. Every curve fixes 0 and 1.
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            EasingType::Linear => t,
            EasingType::EaseOut => 1.0 - (1.0 - t).powi(3),
            EasingType::EaseInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            EasingType::Sine => -((std::f32::consts::PI * t).cos() - 1.0) / 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_conversions() {
        let ts = Timestamp::from_micros(1_500_000);
        assert_eq!(ts.as_micros(), 1_500_000);
        assert!((ts.as_secs() - 1.5).abs() < 0.0001);
        assert_eq!(Timestamp::from_millis_f64(16.6667).as_micros(), 16_667);
        assert_eq!(Timestamp::from_secs_f64(4.0).as_micros(), 4_000_000);
    }

    #[test]
    fn timestamp_rejects_negative_and_nan() {
        assert_eq!(Timestamp::from_millis_f64(-5.0).as_micros(), 0);
        assert_eq!(Timestamp::from_millis_f64(f64::NAN).as_micros(), 0);
    }

    #[test]
    fn saturating_since_never_underflows() {
        let a = Timestamp::from_micros(10);
        let b = Timestamp::from_micros(30);
        assert_eq!(b.saturating_since(a), 20);
        assert_eq!(a.saturating_since(b), 0);
    }

    #[test]
    fn epoch_wraps() {
        assert_eq!(Epoch::new(u32::MAX).next(), Epoch::new(0));
    }

    #[test]
    fn normalized_coord_clamps() {
        let coord = NormalizedCoord::new(1.5, -0.5);
        assert_eq!(coord.x, 1.0);
        assert_eq!(coord.y, 0.0);
    }

    #[test]
    fn easing_bounds() {
        for easing in [
            EasingType::Linear,
            EasingType::EaseOut,
            EasingType::EaseInOut,
            EasingType::Sine,
        ] {
            assert!(easing.apply(0.0).abs() < 1e-6, "{:?} should start at 0", easing);
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-6, "{:?} should end at 1", easing);
        }
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&SessionStatus::Paused).unwrap();
        assert_eq!(json, "\"paused\"");
    }
}
