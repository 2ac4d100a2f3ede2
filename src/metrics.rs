//! Summary of all landmark measurements for diagnostics and reports.

use serde::{Deserialize, Serialize};

use crate::landmarks::{EyeSide, LandmarkSet};
use crate::types::Point;

/// Every measurement the validator and solver use, collected in one place.
///
/// Ratios that cannot be computed for a degenerate shape are `None` instead
/// of failing the whole report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceMetrics {
    pub chin: Point,
    /// Landmark 27; not used for placement.
    pub brow_center: Point,
    pub left_eye_center: Point,
    pub right_eye_center: Point,
    pub eyes_midpoint: Point,
    /// Chin to eye line, uncorrected.
    pub chin_to_eye_distance: f32,
    pub tilt_degrees: f32,
    pub side_ratio: Option<f32>,
    pub left_eye_ratio: Option<f32>,
    pub right_eye_ratio: Option<f32>,
    pub mouth_gap: f32,
}

impl FaceMetrics {
    pub fn from_landmarks(landmarks: &LandmarkSet) -> Self {
        Self {
            chin: landmarks.chin(),
            brow_center: landmarks.brow_center(),
            left_eye_center: landmarks.eye_center(EyeSide::Left),
            right_eye_center: landmarks.eye_center(EyeSide::Right),
            eyes_midpoint: landmarks.eyes_midpoint(),
            chin_to_eye_distance: landmarks.face_height(1.0),
            tilt_degrees: landmarks.tilt_angle_degrees(),
            side_ratio: landmarks.side_symmetry_ratio().ok(),
            left_eye_ratio: landmarks.eye_aspect_ratio(EyeSide::Left).ok(),
            right_eye_ratio: landmarks.eye_aspect_ratio(EyeSide::Right).ok(),
            mouth_gap: landmarks.mouth_gap(),
        }
    }
}
