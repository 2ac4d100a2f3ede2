//! Where the face ends up on the output canvas, measured against the
//! configured compliance bands.
//!
//! Band percentages are heights measured from the bottom edge of the canvas.

use serde::{Deserialize, Serialize};

use crate::config::BiometricChecksConfig;
use crate::landmarks::LandmarkSet;
use crate::transform::CropBox;
use crate::types::ImageSize;

/// Placement of chin, eye line and face height on the output canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementReport {
    /// Chin height above the bottom edge, % of canvas height.
    pub chin_pct: f32,
    /// Eye line height above the bottom edge, % of canvas height.
    pub eye_line_pct: f32,
    /// Estimated face height, % of canvas height.
    pub face_height_pct: f32,
    pub eyes_in_band: bool,
    pub face_in_band: bool,
}

impl PlacementReport {
    /// Measure `landmarks` (working-image coordinates) as they land on the
    /// composed canvas, including any white padding offset.
    pub fn measure(
        landmarks: &LandmarkSet,
        crop: &CropBox,
        bounds: ImageSize,
        target: ImageSize,
        config: &BiometricChecksConfig,
    ) -> Self {
        let region = crop.visible_region(bounds);
        let (_, pad_y) = region.pad_offset(target);
        let height = target.height as f32;
        let to_canvas_y = |y: f32| y - region.y as f32 + pad_y as f32;
        let from_bottom_pct = |y: f32| (height - to_canvas_y(y)) / height * 100.0;

        let chin_pct = from_bottom_pct(landmarks.chin().y);
        let eye_line_pct = from_bottom_pct(landmarks.eyes_midpoint().y);
        let face_height_pct = landmarks.face_height(config.chin_to_eye_factor) / height * 100.0;

        Self {
            chin_pct,
            eye_line_pct,
            face_height_pct,
            eyes_in_band: (config.min_eye_height..=config.max_eye_height).contains(&eye_line_pct),
            face_in_band: (config.min_face_height..=config.max_face_height)
                .contains(&face_height_pct),
        }
    }
}

/// Pixel rows (from the top) of the guide lines for a canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuideLines {
    pub chin: u32,
    /// Top of the face at maximum face height.
    pub face_top_min: u32,
    /// Top of the face at minimum face height.
    pub face_top_max: u32,
    pub eye_min: u32,
    pub eye_max: u32,
}

impl GuideLines {
    pub fn for_canvas(size: ImageSize, config: &BiometricChecksConfig) -> Self {
        let row = |pct_from_bottom: f32| {
            (size.height as f32 * (1.0 - pct_from_bottom / 100.0)).round().max(0.0) as u32
        };
        Self {
            chin: row(config.chin_height),
            face_top_min: row(config.max_face_height),
            face_top_max: row(config.min_face_height),
            eye_min: row(config.max_eye_height),
            eye_max: row(config.min_eye_height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::tests::frontal_face;
    use crate::transform::place_crop;
    use crate::types::Point;

    #[test]
    fn automatic_placement_lands_in_bands() {
        let config = BiometricChecksConfig::default();
        let target = ImageSize::new(413, 531);
        let scale = crate::transform::face_scale(&frontal_face(), target, &config, 1.0).unwrap();
        let landmarks = frontal_face().map(|p| p * scale + Point::new(500.0, 500.0));
        let bounds = ImageSize::new(2000, 2000);
        let crop = place_crop(landmarks.chin(), landmarks.eyes_midpoint(), bounds, target, &config, 0, 0);

        let report = PlacementReport::measure(&landmarks, &crop, bounds, target, &config);
        assert!((report.chin_pct - 13.82).abs() < 0.2, "{report:?}");
        assert!((report.face_height_pct - (86.02 + 94.85) / 2.0).abs() < 0.01);
        assert!(report.face_in_band);
        assert!(report.eyes_in_band);
    }

    #[test]
    fn guide_rows_for_passport_canvas() {
        let lines = GuideLines::for_canvas(ImageSize::new(413, 531), &BiometricChecksConfig::default());
        assert_eq!(lines.chin, 458);
        assert_eq!(lines.face_top_min, 27);
        assert_eq!(lines.face_top_max, 74);
        assert_eq!(lines.eye_min, 154);
        assert_eq!(lines.eye_max, 272);
        assert!(lines.face_top_min < lines.eye_min && lines.eye_max < lines.chin);
    }
}
