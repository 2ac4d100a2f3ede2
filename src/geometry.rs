//! Measurements derived from a landmark set.
//!
//! Everything here is a pure function of the 68 points. Measurements that
//! divide by a landmark distance return [`Result`] so a collapsed or
//! non-finite shape surfaces as [`Error::DegenerateGeometry`] instead of NaN.

use crate::error::{Error, Result};
use crate::landmarks::{
    EyeSide, LandmarkSet, BROW_CENTER, CHIN, INNER_LIP_BOTTOM, INNER_LIP_TOP, LEFT_EYE_OUTER,
    NOSE_LEFT_ALA, NOSE_RIGHT_ALA, RIGHT_EYE_OUTER,
};
use crate::types::Point;

const EPSILON: f32 = 1e-6;

impl LandmarkSet {
    pub fn chin(&self) -> Point {
        self[CHIN]
    }

    /// Diagnostics only; placement uses the eye line.
    pub fn brow_center(&self) -> Point {
        self[BROW_CENTER]
    }

    pub fn eye_center(&self, side: EyeSide) -> Point {
        Point::mean(self.eye(side))
    }

    pub fn eyes_midpoint(&self) -> Point {
        self.eye_center(EyeSide::Left)
            .midpoint(&self.eye_center(EyeSide::Right))
    }

    /// Estimated face height: chin-to-eye-line distance times a calibrated factor.
    pub fn face_height(&self, chin_to_eye_factor: f32) -> f32 {
        self.chin().distance(&self.eyes_midpoint()) * chin_to_eye_factor
    }

    /// Angle of the line from the left eye center to the right eye center.
    ///
    /// 0° when level; positive when the right eye (42-47) sits lower in the image.
    pub fn tilt_angle_degrees(&self) -> f32 {
        let left = self.eye_center(EyeSide::Left);
        let right = self.eye_center(EyeSide::Right);
        (right.y - left.y).atan2(right.x - left.x).to_degrees()
    }

    pub fn eye_aspect_ratio(&self, side: EyeSide) -> Result<f32> {
        eye_aspect_ratio(self.eye(side))
            .map_err(|e| Error::DegenerateGeometry(format!("{side} eye: {e}")))
    }

    /// Outer-eye-corner to nose-ala distance, left over right. 1.0 is frontal.
    pub fn side_symmetry_ratio(&self) -> Result<f32> {
        let left = self[LEFT_EYE_OUTER].distance(&self[NOSE_LEFT_ALA]);
        let right = self[RIGHT_EYE_OUTER].distance(&self[NOSE_RIGHT_ALA]);
        checked_ratio(left, right, "right eye corner coincides with the nose")
    }

    /// Vertical gap between the inner lips.
    pub fn mouth_gap(&self) -> f32 {
        (self[INNER_LIP_BOTTOM].y - self[INNER_LIP_TOP].y).abs()
    }
}

/// Eye aspect ratio over six ordered eye contour points:
/// `(|p1-p5| + |p2-p4|) / (2 |p0-p3|)`. Smaller means more closed.
pub fn eye_aspect_ratio(eye: &[Point]) -> Result<f32> {
    if eye.len() != 6 {
        return Err(Error::DegenerateGeometry(format!(
            "expected 6 eye points, got {}",
            eye.len()
        )));
    }
    let vertical = eye[1].distance(&eye[5]) + eye[2].distance(&eye[4]);
    let horizontal = 2.0 * eye[0].distance(&eye[3]);
    checked_ratio(vertical, horizontal, "eye corners coincide")
}

fn checked_ratio(numerator: f32, denominator: f32, what: &str) -> Result<f32> {
    if !numerator.is_finite() || !denominator.is_finite() {
        return Err(Error::DegenerateGeometry("non-finite landmark coordinates".into()));
    }
    if denominator.abs() < EPSILON {
        return Err(Error::DegenerateGeometry(what.into()));
    }
    Ok(numerator / denominator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::tests::frontal_face;
    use crate::landmarks::RIGHT_EYE;

    #[test]
    fn frontal_face_measurements() {
        let face = frontal_face();
        assert_eq!(face.chin(), Point::new(200.0, 360.0));
        assert_eq!(face.brow_center(), Point::new(200.0, 160.0));

        let mid = face.eyes_midpoint();
        assert!((mid.x - 200.0).abs() < 1e-4);
        assert!((mid.y - 180.0).abs() < 1e-4);

        assert!((face.face_height(2.2) - 396.0).abs() < 1e-3);
        assert!(face.tilt_angle_degrees().abs() < 1e-4);
        assert!((face.side_symmetry_ratio().unwrap() - 1.0).abs() < 1e-5);
        assert!((face.eye_aspect_ratio(EyeSide::Left).unwrap() - 0.4).abs() < 1e-5);
        assert_eq!(face.mouth_gap(), 0.0);
    }

    #[test]
    fn tilt_is_positive_when_right_eye_is_lower() {
        let face = frontal_face();
        let lowered = {
            let mut pts = *face.points();
            for p in pts[RIGHT_EYE].iter_mut() {
                p.y += 100.0;
            }
            LandmarkSet::new(pts)
        };
        // Eye centers 100px apart horizontally and vertically.
        assert!((lowered.tilt_angle_degrees() - 45.0).abs() < 1e-3);
    }

    #[test]
    fn eye_aspect_ratio_is_mirror_symmetric() {
        let face = frontal_face();
        let eye = face.eye(EyeSide::Left);
        // Mirror across a vertical axis, keeping the contour order.
        let mirrored: Vec<Point> = eye.iter().map(|p| Point::new(-p.x, p.y)).collect();
        let a = eye_aspect_ratio(eye).unwrap();
        let b = eye_aspect_ratio(&mirrored).unwrap();
        assert!((a - b).abs() < 1e-6);
    }

    #[test]
    fn collapsed_eye_is_degenerate() {
        let collapsed = [Point::new(5.0, 5.0); 6];
        assert!(matches!(
            eye_aspect_ratio(&collapsed),
            Err(Error::DegenerateGeometry(_))
        ));
    }

    #[test]
    fn non_finite_coordinates_are_degenerate() {
        let face = frontal_face().map(|p| Point::new(p.x, f32::NAN));
        assert!(face.side_symmetry_ratio().is_err());
    }
}
