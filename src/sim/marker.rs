//! Tracked marker entities
//!
//! A [`Marker`] owns the last known [`Transform`] of one physical pattern and
//! refreshes it once per frame from the detector's candidate list. When the
//! pattern is not seen the previous pose is kept (stale but available) and
//! the marker reports itself invisible.

use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};

use super::pose::Transform;
use crate::error::SetupError;
use crate::pattern::{PatternId, PatternRegistry};
use crate::settings::MarkerSpec;

/// One detector candidate for the current frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    /// Registered pattern id the detector matched
    pub id: PatternId,
    /// Match confidence in 0..=1
    #[serde(default = "full_confidence")]
    pub confidence: f64,
    /// Row-major 3x4 `[R | t]` in the camera frame, millimetres
    pub pose: [[f64; 4]; 3],
}

fn full_confidence() -> f64 {
    1.0
}

impl Detection {
    pub fn new(id: PatternId, confidence: f64, pose: &Transform) -> Self {
        Self {
            id,
            confidence,
            pose: pose.to_rows(),
        }
    }

    /// Candidate with identity rotation at `location`
    pub fn at(id: PatternId, location: DVec3) -> Self {
        Self::new(id, 1.0, &Transform::from_translation(location))
    }

    pub fn transform(&self) -> Transform {
        Transform::from_rows(&self.pose)
    }
}

/// Something whose pose is tracked frame by frame
pub trait Trackable {
    /// Refresh from this frame's candidates. Called exactly once per frame.
    fn update_from_detections(&mut self, detections: &[Detection]);

    /// Advance time bookkeeping
    fn tick(&mut self, elapsed_time: f32);

    /// Whether the pose was refreshed this frame
    fn is_visible(&self) -> bool;

    /// Last known pose; stale while invisible
    fn transform(&self) -> &Transform;

    fn location(&self) -> DVec3 {
        self.transform().location()
    }

    fn yaw(&self) -> f64 {
        self.transform().yaw()
    }

    fn pitch(&self) -> f64 {
        self.transform().pitch()
    }

    fn roll(&self) -> f64 {
        self.transform().roll()
    }

    fn distance_to(&self, other: &dyn Trackable) -> f64 {
        self.transform().distance_to(other.transform())
    }

    fn distance_to_camera(&self) -> f64 {
        self.transform().distance_to_camera()
    }
}

/// A physical marker on the board
#[derive(Debug, Clone)]
pub struct Marker {
    id: PatternId,
    /// Physical width in millimetres
    size: f64,
    /// Sub-pattern offset within a composite pattern
    displacement: DVec2,
    transform: Transform,
    visible: bool,
    last_tick: f32,
    last_seen: Option<f32>,
}

impl Marker {
    pub fn new(id: PatternId, size: f64, displacement: DVec2) -> Self {
        Self {
            id,
            size,
            displacement,
            transform: Transform::IDENTITY,
            visible: false,
            last_tick: 0.0,
            last_seen: None,
        }
    }

    /// Load the pattern file through the registry and build the marker
    pub fn load(registry: &mut PatternRegistry, spec: &MarkerSpec) -> Result<Self, SetupError> {
        if !spec.width.is_finite() || spec.width <= 0.0 {
            return Err(SetupError::InvalidWidth {
                path: spec.pattern.clone(),
                width: spec.width,
            });
        }
        let id = registry
            .load(&spec.pattern)
            .map_err(|source| SetupError::Pattern {
                path: spec.pattern.clone(),
                source,
            })?;
        Ok(Self::new(id, spec.width, DVec2::from(spec.displacement)))
    }

    pub fn id(&self) -> PatternId {
        self.id
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn displacement(&self) -> DVec2 {
        self.displacement
    }

    /// Time passed to the latest `tick`
    pub fn last_tick(&self) -> f32 {
        self.last_tick
    }

    /// Seconds since the marker was last visible, `None` if never seen
    pub fn time_since_seen(&self, elapsed_time: f32) -> Option<f32> {
        self.last_seen.map(|seen| (elapsed_time - seen).max(0.0))
    }

    /// Column-major model-view matrix for the renderer
    pub fn gl_matrix(&self) -> [f64; 16] {
        self.transform.gl_matrix()
    }
}

impl Trackable for Marker {
    fn update_from_detections(&mut self, detections: &[Detection]) {
        let best = detections
            .iter()
            .filter(|d| d.id == self.id)
            .max_by(|a, b| {
                a.confidence
                    .partial_cmp(&b.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

        match best {
            Some(detection) => {
                self.transform = detection.transform().displaced(self.displacement);
                self.visible = true;
            }
            None => self.visible = false,
        }
    }

    fn tick(&mut self, elapsed_time: f32) {
        self.last_tick = elapsed_time;
        if self.visible {
            self.last_seen = Some(elapsed_time);
        }
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn transform(&self) -> &Transform {
        &self.transform
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_missing_detection_keeps_stale_pose() {
        let mut marker = Marker::new(5, 80.0, DVec2::ZERO);
        marker.update_from_detections(&[Detection::at(5, DVec3::new(10.0, 20.0, 600.0))]);
        assert!(marker.is_visible());
        let before = marker.location();

        marker.update_from_detections(&[Detection::at(2, DVec3::new(0.0, 0.0, 100.0))]);
        assert!(!marker.is_visible());
        assert_eq!(marker.location(), before);

        marker.update_from_detections(&[]);
        assert!(!marker.is_visible());
        assert_eq!(marker.location(), DVec3::new(10.0, 20.0, 600.0));
    }

    #[test]
    fn test_highest_confidence_wins() {
        let mut marker = Marker::new(1, 80.0, DVec2::ZERO);
        let near = Detection::new(1, 0.4, &Transform::from_translation(DVec3::new(0.0, 0.0, 100.0)));
        let far = Detection::new(1, 0.9, &Transform::from_translation(DVec3::new(0.0, 0.0, 900.0)));
        marker.update_from_detections(&[near, far]);
        assert!((marker.distance_to_camera() - 900.0).abs() < 1e-9);
    }

    #[test]
    fn test_displacement_applied_to_composite() {
        let mut marker = Marker::new(0, 40.0, DVec2::new(60.0, 0.0));
        marker.update_from_detections(&[Detection::at(0, DVec3::new(100.0, 50.0, 500.0))]);
        assert!((marker.location() - DVec3::new(40.0, 50.0, 500.0)).length() < 1e-9);
    }

    #[test]
    fn test_tick_records_sightings() {
        let mut marker = Marker::new(0, 40.0, DVec2::ZERO);
        marker.tick(0.5);
        assert_eq!(marker.time_since_seen(0.5), None);

        marker.update_from_detections(&[Detection::at(0, DVec3::Z * 300.0)]);
        marker.tick(1.0);
        marker.update_from_detections(&[]);
        marker.tick(1.5);
        assert_eq!(marker.last_tick(), 1.5);
        assert_eq!(marker.time_since_seen(1.75), Some(0.75));
    }

    #[test]
    fn test_distance_between_markers() {
        let mut a = Marker::new(0, 40.0, DVec2::ZERO);
        let mut b = Marker::new(1, 40.0, DVec2::ZERO);
        let frame = [
            Detection::at(0, DVec3::new(0.0, 0.0, 500.0)),
            Detection::at(1, DVec3::new(0.0, 120.0, 500.0)),
        ];
        a.update_from_detections(&frame);
        b.update_from_detections(&frame);
        assert!((a.distance_to(&b) - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_load_rejects_bad_width_and_missing_file() {
        let mut registry = PatternRegistry::new();
        let spec = MarkerSpec {
            pattern: PathBuf::from("does/not/exist.patt"),
            width: 0.0,
            displacement: [0.0, 0.0],
        };
        assert!(matches!(
            Marker::load(&mut registry, &spec),
            Err(SetupError::InvalidWidth { .. })
        ));

        let spec = MarkerSpec { width: 80.0, ..spec };
        assert!(matches!(
            Marker::load(&mut registry, &spec),
            Err(SetupError::Pattern { .. })
        ));
    }
}
