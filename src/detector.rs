//! Face locator backed by the SeetaFace cascade in `rustface`.

use std::path::Path;

use image::GrayImage;
use rustface::{Detector, ImageData};
use tracing::debug;

use crate::config::FaceDetectionConfig;
use crate::error::{Error, Result};
use crate::pipeline::FaceLocator;
use crate::types::BoundingBox;

pub struct RustfaceLocator {
    detector: Box<dyn Detector>,
}

impl RustfaceLocator {
    /// Load the detector model. A missing or unreadable model is fatal for
    /// the whole run, so it is reported as a configuration error.
    pub fn from_model_file(path: &Path, config: &FaceDetectionConfig) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::Config(format!(
                "face detector model not found: {}",
                path.display()
            )));
        }
        let path_str = path
            .to_str()
            .ok_or_else(|| Error::Config(format!("invalid model path: {}", path.display())))?;
        let mut detector = rustface::create_detector(path_str)
            .map_err(|e| Error::Config(format!("failed to load face detector: {e}")))?;

        detector.set_min_face_size(20);
        detector.set_score_thresh(2.0);
        detector.set_pyramid_scale_factor(pyramid_scale(config.scale_factor));
        detector.set_slide_window_step(4, 4);
        Ok(Self { detector })
    }
}

/// rustface shrinks by a factor below 1.0 per pyramid level.
fn pyramid_scale(scale_factor: f32) -> f32 {
    if scale_factor > 1.0 {
        (1.0 / scale_factor).clamp(0.01, 0.99)
    } else {
        0.8
    }
}

impl FaceLocator for RustfaceLocator {
    fn locate(&mut self, gray: &GrayImage) -> Vec<BoundingBox> {
        let image_data = ImageData::new(gray.as_raw(), gray.width(), gray.height());
        let faces = self.detector.detect(&image_data);
        debug!(count = faces.len(), "rustface detection");
        faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                BoundingBox::new(
                    bbox.x() as f32,
                    bbox.y() as f32,
                    bbox.width() as f32,
                    bbox.height() as f32,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_is_fatal() {
        let err = RustfaceLocator::from_model_file(
            Path::new("/nonexistent/seeta_fd_frontal_v1.0.bin"),
            &FaceDetectionConfig::default(),
        )
        .err()
        .unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn pyramid_scale_inverts_step() {
        assert!((pyramid_scale(1.25) - 0.8).abs() < 1e-6);
        assert_eq!(pyramid_scale(1.0), 0.8);
    }
}
