// Visual mapping: (phase, progress, geometry) -> ball state. Pure and clock-free.
// Each shape is one interpolation strategy over the phase's precomputed level and arc spans.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::sequence::{Phase, PhaseTrack, Template};
use crate::types::{EasingType, NormalizedCoord, PhaseKind};

/// Rendered state of the breathing indicator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisualState {
    /// Ball position, `None` for shapes without a track.
    pub position: Option<NormalizedCoord>,
    pub scale: f32,
    pub opacity: f32,
}

/// Path the ball follows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum Shape {
    /// Grows and fades in place, no position.
    Pulse,
    /// Rises on inhale, sinks on exhale.
    Vertical {
        #[serde(default = "default_track_x")]
        x: f32,
        #[serde(default = "default_top")]
        top: f32,
        #[serde(default = "default_bottom")]
        bottom: f32,
    },
    /// Square perimeter, starting at the bottom edge midpoint.
    Square {
        #[serde(default = "NormalizedCoord::center")]
        center: NormalizedCoord,
        #[serde(default = "default_half_size")]
        half_size: f32,
    },
    /// Upward equilateral triangle, starting at the base midpoint.
    Triangle {
        #[serde(default = "default_triangle_center")]
        center: NormalizedCoord,
        #[serde(default = "default_radius")]
        radius: f32,
    },
}

fn default_track_x() -> f32 {
    0.5
}

fn default_top() -> f32 {
    0.15
}

fn default_bottom() -> f32 {
    0.85
}

fn default_half_size() -> f32 {
    0.4
}

fn default_triangle_center() -> NormalizedCoord {
    NormalizedCoord { x: 0.5, y: 0.55 }
}

fn default_radius() -> f32 {
    0.4
}

fn default_min_scale() -> f32 {
    0.5
}

fn default_max_scale() -> f32 {
    1.0
}

fn default_min_opacity() -> f32 {
    0.6
}

fn default_max_opacity() -> f32 {
    1.0
}

/// Shape plus ball styling. Scale and opacity follow lung fullness on every shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(flatten)]
    pub shape: Shape,
    #[serde(default = "default_min_scale")]
    pub min_scale: f32,
    #[serde(default = "default_max_scale")]
    pub max_scale: f32,
    #[serde(default = "default_min_opacity")]
    pub min_opacity: f32,
    #[serde(default = "default_max_opacity")]
    pub max_opacity: f32,
    #[serde(default)]
    pub easing: EasingType,
}

impl Default for Geometry {
    fn default() -> Self {
        Geometry::with_shape(Shape::Vertical {
            x: default_track_x(),
            top: default_top(),
            bottom: default_bottom(),
        })
    }
}

impl Geometry {
    pub fn with_shape(shape: Shape) -> Self {
        Geometry {
            shape,
            min_scale: default_min_scale(),
            max_scale: default_max_scale(),
            min_opacity: default_min_opacity(),
            max_opacity: default_max_opacity(),
            easing: EasingType::default(),
        }
    }

    /// The shape each exercise page draws by default.
    pub fn for_template(template: Template) -> Self {
        match template {
            Template::Coherence => Geometry::default(),
            Template::Square => Geometry::with_shape(Shape::Square {
                center: NormalizedCoord::center(),
                half_size: default_half_size(),
            }),
            Template::Triangle => Geometry::with_shape(Shape::Triangle {
                center: default_triangle_center(),
                radius: default_radius(),
            }),
            Template::Custom => Geometry::with_shape(Shape::Pulse),
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let finite_non_negative = |field: &str, v: f32| {
            if v.is_finite() && v >= 0.0 {
                Ok(())
            } else {
                Err(EngineError::config(field, "must be a finite non-negative number"))
            }
        };
        finite_non_negative("geometry.min_scale", self.min_scale)?;
        finite_non_negative("geometry.max_scale", self.max_scale)?;
        if self.min_scale > self.max_scale {
            return Err(EngineError::config(
                "geometry.min_scale",
                "must not exceed max_scale",
            ));
        }
        for (field, v) in [
            ("geometry.min_opacity", self.min_opacity),
            ("geometry.max_opacity", self.max_opacity),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(EngineError::config(field, "must be within [0, 1]"));
            }
        }
        if self.min_opacity > self.max_opacity {
            return Err(EngineError::config(
                "geometry.min_opacity",
                "must not exceed max_opacity",
            ));
        }

        match self.shape {
            Shape::Pulse => Ok(()),
            Shape::Vertical { x, top, bottom } => {
                for (field, v) in [
                    ("geometry.x", x),
                    ("geometry.top", top),
                    ("geometry.bottom", bottom),
                ] {
                    if !(0.0..=1.0).contains(&v) {
                        return Err(EngineError::config(field, "must be within [0, 1]"));
                    }
                }
                Ok(())
            }
            Shape::Square { half_size, .. } => {
                positive("geometry.half_size", half_size)?;
                self.check_loop_fits("geometry.half_size")
            }
            Shape::Triangle { radius, .. } => {
                positive("geometry.radius", radius)?;
                self.check_loop_fits("geometry.radius")
            }
        }
    }

    /// Every vertex of a perimeter path must lie inside the unit square.
    fn check_loop_fits(&self, field: &str) -> Result<(), EngineError> {
        let fits = self
            .loop_vertices()
            .iter()
            .all(|&(x, y)| (0.0..=1.0).contains(&x) && (0.0..=1.0).contains(&y));
        if fits {
            Ok(())
        } else {
            Err(EngineError::config(
                field,
                "places the path outside the unit square around geometry.center",
            ))
        }
    }

    /// Closed path for perimeter shapes, starting at the bottom midpoint. Empty otherwise.
    fn loop_vertices(&self) -> Vec<(f32, f32)> {
        match self.shape {
            Shape::Pulse | Shape::Vertical { .. } => Vec::new(),
            Shape::Square { center, half_size } => {
                let (cx, cy, h) = (center.x, center.y, half_size);
                vec![
                    (cx, cy + h),
                    (cx - h, cy + h),
                    (cx - h, cy - h),
                    (cx + h, cy - h),
                    (cx + h, cy + h),
                ]
            }
            Shape::Triangle { center, radius } => {
                let (cx, cy, r) = (center.x, center.y, radius);
                let half_base = r * 3.0_f32.sqrt() / 2.0;
                let base_y = cy + r / 2.0;
                vec![
                    (cx, base_y),
                    (cx - half_base, base_y),
                    (cx, cy - r),
                    (cx + half_base, base_y),
                ]
            }
        }
    }

    fn position_at(&self, level: f32, arc: f32) -> Option<NormalizedCoord> {
        match self.shape {
            Shape::Pulse => None,
            Shape::Vertical { x, top, bottom } => {
                Some(NormalizedCoord::new(x, lerp(bottom, top, level)))
            }
            Shape::Square { .. } | Shape::Triangle { .. } => {
                Some(point_on_loop(&self.loop_vertices(), arc))
            }
        }
    }
}

fn positive(field: &str, v: f32) -> Result<(), EngineError> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(EngineError::config(field, "must be greater than zero"))
    }
}

/// Maps a phase and its progress to what the UI draws.
pub trait VisualMapper {
    fn render(&self, phase: &Phase, track: &PhaseTrack, progress: f64) -> VisualState;
}

impl VisualMapper for Geometry {
    fn render(&self, phase: &Phase, track: &PhaseTrack, progress: f64) -> VisualState {
        let t = match phase.kind() {
            PhaseKind::Hold => 0.0,
            PhaseKind::Inhale | PhaseKind::Exhale => self.easing.apply(progress as f32),
        };
        let level = track.level.lerp(t).clamp(0.0, 1.0);
        let arc = track.arc.lerp(t).clamp(0.0, 1.0);

        VisualState {
            position: self.position_at(level, arc),
            scale: lerp(self.min_scale, self.max_scale, level),
            opacity: lerp(self.min_opacity, self.max_opacity, level),
        }
    }
}

/// Point at fraction `arc` of the closed loop through `vertices` (by arc length).
fn point_on_loop(vertices: &[(f32, f32)], arc: f32) -> NormalizedCoord {
    let n = vertices.len();
    let segment = |i: usize| (vertices[i], vertices[(i + 1) % n]);
    let length = |(a, b): ((f32, f32), (f32, f32))| ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt();

    let total: f32 = (0..n).map(|i| length(segment(i))).sum();
    let mut remaining = arc.clamp(0.0, 1.0) * total;

    for i in 0..n {
        let (a, b) = segment(i);
        let len = length((a, b));
        if remaining <= len || i == n - 1 {
            let t = if len > 0.0 { (remaining / len).min(1.0) } else { 0.0 };
            return NormalizedCoord::new(lerp(a.0, b.0, t), lerp(a.1, b.1, t));
        }
        remaining -= len;
    }

    NormalizedCoord::new(vertices[0].0, vertices[0].1)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::{PhaseDurations, PhaseSequence};
    use proptest::prelude::*;

    const EPS: f32 = 1e-4;

    fn close(a: &VisualState, b: &VisualState) -> bool {
        let pos = match (a.position, b.position) {
            (Some(p), Some(q)) => p.distance_to(&q) < EPS,
            (None, None) => true,
            _ => false,
        };
        pos && (a.scale - b.scale).abs() < EPS && (a.opacity - b.opacity).abs() < EPS
    }

    fn render_at(geometry: &Geometry, seq: &PhaseSequence, index: usize, progress: f64) -> VisualState {
        geometry.render(
            seq.get(index).unwrap(),
            seq.track(index).unwrap(),
            progress,
        )
    }

    fn assert_continuous(template: Template) {
        let seq = PhaseSequence::build(template, &PhaseDurations::default()).unwrap();
        let geometry = Geometry::for_template(template);
        let n = seq.len();
        for i in 0..n {
            let end = render_at(&geometry, &seq, i, 1.0);
            let start = render_at(&geometry, &seq, (i + 1) % n, 0.0);
            assert!(
                close(&end, &start),
                "{:?}: phase {} end {:?} != phase {} start {:?}",
                template,
                i,
                end,
                (i + 1) % n,
                start
            );
        }
    }

    #[test]
    fn square_perimeter_is_continuous() {
        assert_continuous(Template::Square);
    }

    #[test]
    fn triangle_perimeter_is_continuous() {
        assert_continuous(Template::Triangle);
    }

    #[test]
    fn vertical_ball_is_continuous() {
        assert_continuous(Template::Coherence);
    }

    #[test]
    fn pulse_has_no_position() {
        let seq = PhaseSequence::build(Template::Coherence, &PhaseDurations::default()).unwrap();
        let geometry = Geometry::with_shape(Shape::Pulse);
        let state = render_at(&geometry, &seq, 0, 0.5);
        assert!(state.position.is_none());
        assert!(state.scale > geometry.min_scale && state.scale < geometry.max_scale);
    }

    #[test]
    fn vertical_ball_rises_on_inhale() {
        let seq = PhaseSequence::build(Template::Coherence, &PhaseDurations::default()).unwrap();
        let geometry = Geometry::default();
        let start = render_at(&geometry, &seq, 0, 0.0);
        let end = render_at(&geometry, &seq, 0, 1.0);
        let (start_y, end_y) = (start.position.unwrap().y, end.position.unwrap().y);
        assert!((start_y - 0.85).abs() < EPS);
        assert!((end_y - 0.15).abs() < EPS);
        assert!((start.scale - 0.5).abs() < EPS);
        assert!((end.scale - 1.0).abs() < EPS);
    }

    #[test]
    fn square_inhale_ends_top_centre() {
        let seq = PhaseSequence::build(Template::Square, &PhaseDurations::default()).unwrap();
        let geometry = Geometry::for_template(Template::Square);
        let start = render_at(&geometry, &seq, 0, 0.0).position.unwrap();
        let top = render_at(&geometry, &seq, 0, 1.0).position.unwrap();
        assert!((start.x - 0.5).abs() < EPS && (start.y - 0.9).abs() < EPS);
        assert!((top.x - 0.5).abs() < EPS && (top.y - 0.1).abs() < EPS);
    }

    #[test]
    fn triangle_inhale_ends_at_apex() {
        let seq = PhaseSequence::build(Template::Triangle, &PhaseDurations::default()).unwrap();
        let geometry = Geometry::for_template(Template::Triangle);
        let apex = render_at(&geometry, &seq, 0, 1.0).position.unwrap();
        assert!((apex.x - 0.5).abs() < EPS);
        assert!((apex.y - 0.15).abs() < EPS);
    }

    #[test]
    fn hold_is_static() {
        let seq = PhaseSequence::build(Template::Square, &PhaseDurations::default()).unwrap();
        let geometry = Geometry::for_template(Template::Square);
        let first = render_at(&geometry, &seq, 1, 0.0);
        for p in [0.1, 0.37, 0.5, 0.99, 1.0] {
            assert_eq!(render_at(&geometry, &seq, 1, p), first);
        }
    }

    #[test]
    fn geometry_parses_flattened_shape() {
        let json = r#"{ "shape": "triangle", "radius": 0.3, "easing": "linear" }"#;
        let geometry: Geometry = serde_json::from_str(json).unwrap();
        assert_eq!(
            geometry.shape,
            Shape::Triangle {
                center: default_triangle_center(),
                radius: 0.3
            }
        );
        assert_eq!(geometry.easing, EasingType::Linear);
        assert_eq!(geometry.max_scale, 1.0);
    }

    #[test]
    fn validate_rejects_inverted_scale() {
        let geometry = Geometry {
            min_scale: 2.0,
            ..Geometry::default()
        };
        let err = geometry.validate().unwrap_err();
        assert_eq!(err.field(), Some("geometry.min_scale"));
    }

    #[test]
    fn validate_rejects_zero_radius() {
        let geometry = Geometry::with_shape(Shape::Triangle {
            center: NormalizedCoord::center(),
            radius: 0.0,
        });
        assert_eq!(geometry.validate().unwrap_err().field(), Some("geometry.radius"));
    }

    #[test]
    fn validate_rejects_path_outside_unit_square() {
        let square = Geometry::with_shape(Shape::Square {
            center: NormalizedCoord::new(0.2, 0.5),
            half_size: 0.4,
        });
        assert_eq!(square.validate().unwrap_err().field(), Some("geometry.half_size"));

        let triangle = Geometry::with_shape(Shape::Triangle {
            center: NormalizedCoord::new(0.5, 0.9),
            radius: 0.4,
        });
        assert_eq!(triangle.validate().unwrap_err().field(), Some("geometry.radius"));

        assert!(Geometry::for_template(Template::Square).validate().is_ok());
        assert!(Geometry::for_template(Template::Triangle).validate().is_ok());
    }

    fn template_strategy() -> impl Strategy<Value = Template> {
        prop_oneof![
            Just(Template::Coherence),
            Just(Template::Square),
            Just(Template::Triangle),
            Just(Template::Custom),
        ]
    }

    fn shape_strategy() -> impl Strategy<Value = Shape> {
        prop_oneof![
            Just(Shape::Pulse),
            Just(Shape::Vertical {
                x: 0.5,
                top: 0.1,
                bottom: 0.9
            }),
            (0.05f32..0.45).prop_map(|half_size| Shape::Square {
                center: NormalizedCoord::center(),
                half_size
            }),
            (0.05f32..0.4).prop_map(|radius| Shape::Triangle {
                center: NormalizedCoord::center(),
                radius
            }),
        ]
    }

    proptest! {
        /// Rendering is total over [0, 1] and stays inside the styled bounds.
        #[test]
        fn render_stays_in_bounds(
            template in template_strategy(),
            shape in shape_strategy(),
            progress in 0.0f64..=1.0,
        ) {
            let durations = PhaseDurations::new(3.0, 5.0).with_holds(2.0, 1.0);
            let seq = PhaseSequence::build(template, &durations).unwrap();
            let geometry = Geometry::with_shape(shape);
            for i in 0..seq.len() {
                let state = render_at(&geometry, &seq, i, progress);
                prop_assert!(state.scale >= geometry.min_scale - EPS);
                prop_assert!(state.scale <= geometry.max_scale + EPS);
                prop_assert!(state.opacity >= geometry.min_opacity - EPS);
                prop_assert!(state.opacity <= geometry.max_opacity + EPS);
                if let Some(p) = state.position {
                    prop_assert!((0.0..=1.0).contains(&p.x) && (0.0..=1.0).contains(&p.y));
                }
            }
        }

        /// End state of phase k equals start state of phase k+1, including the wrap.
        #[test]
        fn phase_boundaries_are_continuous(
            template in template_strategy(),
            shape in shape_strategy(),
        ) {
            let durations = PhaseDurations::new(4.0, 4.0).with_holds(4.0, 4.0);
            let seq = PhaseSequence::build(template, &durations).unwrap();
            let geometry = Geometry::with_shape(shape);
            let n = seq.len();
            for i in 0..n {
                let end = render_at(&geometry, &seq, i, 1.0);
                let start = render_at(&geometry, &seq, (i + 1) % n, 0.0);
                prop_assert!(close(&end, &start));
            }
        }
    }
}
