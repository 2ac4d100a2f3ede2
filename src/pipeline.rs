//! Single-image pipeline from encoded bytes to an encoded portrait.
//!
//! Face location and landmark prediction are pluggable through
//! [`FaceLocator`] and [`LandmarkPredictor`]. Each call is independent, so a
//! batch can run images in parallel with no coordination.

use std::path::Path;

use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::compose::render;
use crate::config::{BiometricConfig, EnabledChecks};
use crate::encode::{fit, EncodedArtifact, JpegQualityEncoder, QualityEncoder, QualitySearch};
use crate::error::{Error, Result};
use crate::landmarks::LandmarkSet;
use crate::metrics::FaceMetrics;
use crate::placement::PlacementReport;
use crate::transform::CropTransform;
use crate::types::{BoundingBox, ImageSize};
use crate::validator::{check_framing, evaluate, ComplianceResult};

/// Finds face regions in a grayscale image, in detector order.
pub trait FaceLocator {
    fn locate(&mut self, gray: &GrayImage) -> Vec<BoundingBox>;

    /// Whether the returned regions are tight enough for the framing check.
    fn provides_framing(&self) -> bool {
        true
    }
}

/// Predicts the 68 landmarks of the face inside `region`.
pub trait LandmarkPredictor {
    fn predict(&self, gray: &GrayImage, region: &BoundingBox) -> Result<LandmarkSet>;
}

/// Landmarks computed ahead of time by an external predictor.
///
/// Stored as JSON: a list of 68 `[x, y]` pairs. The face region is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrecomputedLandmarks(pub LandmarkSet);

impl PrecomputedLandmarks {
    /// An unreadable file leaves the predictor unusable, so it is a
    /// configuration error.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid landmarks in {}: {e}", path.display())))
    }
}

impl LandmarkPredictor for PrecomputedLandmarks {
    fn predict(&self, _gray: &GrayImage, _region: &BoundingBox) -> Result<LandmarkSet> {
        Ok(self.0.clone())
    }
}

/// Treats the whole image as one face region. The framing check is skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct WholeImageLocator;

impl FaceLocator for WholeImageLocator {
    fn locate(&mut self, gray: &GrayImage) -> Vec<BoundingBox> {
        vec![BoundingBox::new(
            0.0,
            0.0,
            gray.width() as f32,
            gray.height() as f32,
        )]
    }

    fn provides_framing(&self) -> bool {
        false
    }
}

/// What to produce for one image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortraitRequest {
    pub target: ImageSize,
    pub max_bytes: usize,
    pub checks: EnabledChecks,
    /// Level the eye line before placement.
    pub auto_rotate: bool,
}

impl Default for PortraitRequest {
    fn default() -> Self {
        Self {
            target: ImageSize::PASSPORT_35X45,
            max_bytes: 500 * 1024,
            checks: EnabledChecks::default(),
            auto_rotate: false,
        }
    }
}

/// A finished portrait.
#[derive(Debug, Clone)]
pub struct Portrait {
    pub artifact: EncodedArtifact,
    pub face: BoundingBox,
    pub metrics: FaceMetrics,
    pub transform: CropTransform,
    pub placement: PlacementReport,
}

#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    Encoded(Box<Portrait>),
    Rejected(ComplianceResult),
}

impl PipelineOutcome {
    pub fn is_encoded(&self) -> bool {
        matches!(self, PipelineOutcome::Encoded(_))
    }
}

/// Decode image bytes.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    let image = image::load_from_memory(bytes).map_err(|e| Error::Decode(e.to_string()))?;
    if image.width() == 0 || image.height() == 0 {
        return Err(Error::Decode("image has zero dimensions".into()));
    }
    Ok(image)
}

/// Run the full pipeline on encoded image bytes, writing JPEG output.
pub fn process(
    bytes: &[u8],
    config: &BiometricConfig,
    request: &PortraitRequest,
    locator: &mut dyn FaceLocator,
    predictor: &dyn LandmarkPredictor,
) -> Result<PipelineOutcome> {
    process_with(bytes, config, request, locator, predictor, &JpegQualityEncoder)
}

/// A decoded image with its face, landmarks and compliance verdict.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub image: DynamicImage,
    pub face: BoundingBox,
    pub landmarks: LandmarkSet,
    pub verdict: ComplianceResult,
}

impl Analysis {
    /// Rotation that levels the eye line, when requested.
    pub fn initial_rotation(&self, auto_rotate: bool) -> f32 {
        if auto_rotate {
            -self.landmarks.tilt_angle_degrees()
        } else {
            0.0
        }
    }
}

/// Decode, locate the face, predict landmarks and run the enabled checks.
///
/// A rejection is not an error; it is reported in [`Analysis::verdict`].
pub fn analyze(
    bytes: &[u8],
    config: &BiometricConfig,
    checks: EnabledChecks,
    locator: &mut dyn FaceLocator,
    predictor: &dyn LandmarkPredictor,
) -> Result<Analysis> {
    let image = decode(bytes)?;
    let gray = image.to_luma8();
    let size = ImageSize::new(image.width(), image.height());

    let faces = locator.locate(&gray);
    let Some(face) = faces.first().copied() else {
        return Err(Error::NoFace);
    };
    if faces.len() > 1 {
        warn!(count = faces.len(), "multiple faces located, using the first");
    }

    let landmarks = predictor.predict(&gray, &face)?;

    let mut verdict = evaluate(&landmarks, &config.biometric_checks, checks);
    if verdict.accepted && checks.framing && locator.provides_framing() {
        verdict = check_framing(&face, size, &config.face_detection);
    }
    if !verdict.accepted {
        info!(reason = %verdict.reason, "rejected");
    }

    Ok(Analysis {
        image,
        face,
        landmarks,
        verdict,
    })
}

/// [`process`] with a caller-supplied encoder.
pub fn process_with<E: QualityEncoder + ?Sized>(
    bytes: &[u8],
    config: &BiometricConfig,
    request: &PortraitRequest,
    locator: &mut dyn FaceLocator,
    predictor: &dyn LandmarkPredictor,
    encoder: &E,
) -> Result<PipelineOutcome> {
    let analysis = analyze(bytes, config, request.checks, locator, predictor)?;
    if !analysis.verdict.accepted {
        return Ok(PipelineOutcome::Rejected(analysis.verdict));
    }

    let transform = CropTransform {
        rotation_deg: analysis.initial_rotation(request.auto_rotate),
        ..CropTransform::default()
    };

    let Analysis {
        image,
        face,
        landmarks,
        ..
    } = analysis;
    let rgb = image.to_rgb8();
    let rendered = render(
        &rgb,
        &landmarks,
        request.target,
        &config.biometric_checks,
        &transform,
    )?;

    let search = QualitySearch::from(&config.image_quality);
    let artifact = fit(encoder, &rendered.image, request.max_bytes, search)?;
    info!(
        quality = artifact.quality,
        size = artifact.len(),
        within_budget = artifact.within_budget(),
        "portrait encoded"
    );

    Ok(PipelineOutcome::Encoded(Box::new(Portrait {
        artifact,
        face,
        metrics: FaceMetrics::from_landmarks(&landmarks),
        transform,
        placement: rendered.placement,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undecodable_bytes_are_input_errors() {
        let err = decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn missing_landmark_file_is_fatal() {
        let err = PrecomputedLandmarks::from_json_file(Path::new("/nonexistent/face.json"))
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn whole_image_locator_covers_image() {
        let gray = GrayImage::new(30, 40);
        let faces = WholeImageLocator.locate(&gray);
        assert_eq!(faces, vec![BoundingBox::new(0.0, 0.0, 30.0, 40.0)]);
    }
}
