//! Biometric compliance checks.
//!
//! Checks run in a fixed order and the first failure wins:
//! side ratio, head tilt, mouth, eyes. A rejection is an ordinary value, not
//! an error; geometry failures are folded into a rejection so one malformed
//! face never aborts a batch.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{BiometricChecksConfig, EnabledChecks, FaceDetectionConfig};
use crate::error::Result;
use crate::landmarks::{EyeSide, LandmarkSet};
use crate::types::{BoundingBox, ImageSize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceResult {
    pub accepted: bool,
    pub reason: String,
}

impl ComplianceResult {
    pub fn ok() -> Self {
        Self {
            accepted: true,
            reason: "OK".to_string(),
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: reason.into(),
        }
    }
}

/// Evaluate the enabled landmark checks against the configured thresholds.
pub fn evaluate(
    landmarks: &LandmarkSet,
    config: &BiometricChecksConfig,
    checks: EnabledChecks,
) -> ComplianceResult {
    match first_failure(landmarks, config, checks) {
        Ok(None) => ComplianceResult::ok(),
        Ok(Some(reason)) => {
            debug!(%reason, "face rejected");
            ComplianceResult::reject(reason)
        }
        Err(e) => {
            debug!(error = %e, "face geometry could not be evaluated");
            ComplianceResult::reject(format!("face landmarks could not be evaluated: {e}"))
        }
    }
}

fn first_failure(
    landmarks: &LandmarkSet,
    config: &BiometricChecksConfig,
    checks: EnabledChecks,
) -> Result<Option<String>> {
    if checks.side_ratio {
        let ratio = landmarks.side_symmetry_ratio()?;
        let tolerance = config.side_ratio_tolerance;
        if !(1.0 - tolerance..=1.0 + tolerance).contains(&ratio) {
            return Ok(Some(format!(
                "head not facing the camera (side ratio: {ratio:.2})"
            )));
        }
    }

    if checks.head_tilt {
        let angle = landmarks.tilt_angle_degrees();
        if !angle.is_finite() || angle.abs() > config.max_head_tilt {
            return Ok(Some(format!("head tilted too far: {angle:.1}°")));
        }
    }

    if checks.mouth {
        let gap = landmarks.mouth_gap();
        if !gap.is_finite() || gap > config.max_mouth_gap {
            return Ok(Some(format!(
                "mouth must be closed (lip gap: {gap:.1}px)"
            )));
        }
    }

    if checks.eye {
        let left = landmarks.eye_aspect_ratio(EyeSide::Left)?;
        let right = landmarks.eye_aspect_ratio(EyeSide::Right)?;
        if left < config.min_eye_ratio || right < config.min_eye_ratio {
            return Ok(Some(format!(
                "eyes must be open (eye ratios: {left:.2}, {right:.2})"
            )));
        }
    }

    Ok(None)
}

/// The region the portrait is expected to occupy around a detected face.
///
/// Height is the face region height times `total_height_factor`; the face
/// center sits 40% down both the face region and the framing box.
pub fn framing_box(face: &BoundingBox, config: &FaceDetectionConfig) -> (i64, i64, i64, i64) {
    let (x, y) = (face.x as i64, face.y as i64);
    let (w, h) = (face.width as i64, face.height as i64);

    let total_height = (h as f32 * config.total_height_factor) as i64;
    let width = (total_height as f32 * config.width_ratio) as i64;
    let center_x = x + w / 2;
    let center_y = y + (h as f32 * 0.4) as i64;

    let left = center_x - width / 2;
    let top = center_y - (total_height as f32 * 0.4) as i64;
    (left, top, width, total_height)
}

/// Reject faces too large for, or too close to the border of, the source image.
pub fn check_framing(
    face: &BoundingBox,
    image: ImageSize,
    config: &FaceDetectionConfig,
) -> ComplianceResult {
    let (left, top, width, height) = framing_box(face, config);
    let fits = left >= 0
        && top >= 0
        && left + width <= image.width as i64
        && top + height <= image.height as i64;
    if fits {
        ComplianceResult::ok()
    } else {
        debug!(left, top, width, height, %image, "framing box leaves the image");
        ComplianceResult::reject("face too large or too close to the image border")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::tests::frontal_face;
    use crate::landmarks::{INNER_LIP_BOTTOM, LEFT_EYE, NOSE_LEFT_ALA, RIGHT_EYE};
    use crate::types::Point;

    fn modify(f: impl FnOnce(&mut [Point; 68])) -> LandmarkSet {
        let mut pts = *frontal_face().points();
        f(&mut pts);
        LandmarkSet::new(pts)
    }

    #[test]
    fn frontal_face_is_accepted() {
        let result = evaluate(
            &frontal_face(),
            &BiometricChecksConfig::default(),
            EnabledChecks::ALL,
        );
        assert_eq!(result, ComplianceResult::ok());
    }

    #[test]
    fn turned_head_is_rejected_with_ratio() {
        // Left corner-to-ala distance 86.02 in the fixture; stretch it to ~1.32x.
        let face = modify(|pts| {
            let right = pts[45].distance(&pts[35]);
            let dir = pts[NOSE_LEFT_ALA] - pts[36];
            let len = pts[36].distance(&pts[NOSE_LEFT_ALA]);
            pts[NOSE_LEFT_ALA] = pts[36] + dir * (1.32 * right / len);
        });
        let ratio = face.side_symmetry_ratio().unwrap();
        assert!((ratio - 1.32).abs() < 1e-4);

        let result = evaluate(&face, &BiometricChecksConfig::default(), EnabledChecks::ALL);
        assert!(!result.accepted);
        assert!(result.reason.contains("1.32"), "{}", result.reason);
    }

    #[test]
    fn first_failing_check_wins() {
        // Tilted and eyes closed: tilt is evaluated first.
        let face = modify(|pts| {
            for p in pts[RIGHT_EYE].iter_mut() {
                p.y += 40.0;
            }
            for i in [1, 2, 4, 5] {
                pts[LEFT_EYE.start + i].y = 180.0;
            }
        });
        let config = BiometricChecksConfig::default();
        let checks = EnabledChecks {
            side_ratio: false,
            ..EnabledChecks::ALL
        };
        let result = evaluate(&face, &config, checks);
        assert!(result.reason.starts_with("head tilted"), "{}", result.reason);

        let result = evaluate(
            &face,
            &config,
            EnabledChecks {
                head_tilt: false,
                ..checks
            },
        );
        assert!(result.reason.starts_with("eyes must be open"), "{}", result.reason);
    }

    #[test]
    fn open_mouth_only_rejected_when_enabled() {
        let face = modify(|pts| pts[INNER_LIP_BOTTOM].y += 20.0);
        let config = BiometricChecksConfig::default();

        assert!(evaluate(&face, &config, EnabledChecks::default()).accepted);

        let result = evaluate(&face, &config, EnabledChecks::ALL);
        assert!(!result.accepted);
        assert!(result.reason.contains("20.0"), "{}", result.reason);
    }

    #[test]
    fn disabled_checks_never_reject() {
        let face = modify(|pts| {
            for p in pts[RIGHT_EYE].iter_mut() {
                p.y += 80.0;
            }
        });
        let result = evaluate(&face, &BiometricChecksConfig::default(), EnabledChecks::NONE);
        assert!(result.accepted);
    }

    #[test]
    fn degenerate_geometry_becomes_rejection() {
        let face = modify(|pts| {
            for p in pts.iter_mut() {
                *p = Point::new(1.0, 1.0);
            }
        });
        let result = evaluate(&face, &BiometricChecksConfig::default(), EnabledChecks::ALL);
        assert!(!result.accepted);
        assert!(result.reason.contains("could not be evaluated"), "{}", result.reason);
    }

    #[test]
    fn framing_fits_inside_large_image() {
        let face = BoundingBox::new(400.0, 300.0, 200.0, 200.0);
        let config = FaceDetectionConfig::default();
        assert_eq!(framing_box(&face, &config), (365, 236, 270, 360));
        assert!(check_framing(&face, ImageSize::new(1000, 1000), &config).accepted);
    }

    #[test]
    fn framing_rejects_face_near_border() {
        let face = BoundingBox::new(10.0, 300.0, 200.0, 200.0);
        let result = check_framing(&face, ImageSize::new(1000, 1000), &FaceDetectionConfig::default());
        assert!(!result.accepted);
        assert!(result.reason.contains("border"));
    }
}
