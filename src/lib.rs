//! # percent-portrait
//!
//! Pure Rust biometric passport photo preparation from 68-point facial landmarks.
//!
//! This crate provides:
//! - **Compliance Checks**: head turn, head tilt, closed mouth and open eyes
//! - **Crop Solving**: scale, rotation and crop window that put the chin and
//!   eye line at fixed percentages of the output height
//! - **Composition**: fixed-size output, padded with white where the crop
//!   leaves the source image
//! - **Size Fitting**: JPEG quality search under a byte budget
//! - **Refinement**: an interactive session for nudging the automatic crop
//!
//! Landmarks use the iBUG 300-W 68-point layout (jaw 0-16, brows 17-26,
//! nose 27-35, eyes 36-47, mouth 48-67). Face location and landmark
//! prediction are external; plug them in through [`FaceLocator`] and
//! [`LandmarkPredictor`].
//!
//! ## Pipeline
//!
//! 1. Decode the image and locate the face
//! 2. Predict landmarks and run the enabled compliance checks
//! 3. Rotate, scale and crop so the chin and eyes land on their guide lines
//! 4. Compose onto the target canvas
//! 5. Encode at decreasing JPEG quality until the output fits
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use percent_portrait::{
//!     process, BiometricConfig, PipelineOutcome, PortraitRequest, PrecomputedLandmarks,
//!     WholeImageLocator,
//! };
//!
//! let bytes = std::fs::read("photo.jpg")?;
//! let predictor = PrecomputedLandmarks::from_json_file(Path::new("photo.landmarks.json"))?;
//!
//! let outcome = process(
//!     &bytes,
//!     &BiometricConfig::default(),
//!     &PortraitRequest::default(),
//!     &mut WholeImageLocator,
//!     &predictor,
//! )?;
//!
//! match outcome {
//!     PipelineOutcome::Encoded(portrait) => std::fs::write("passport.jpg", &portrait.artifact.bytes)?,
//!     PipelineOutcome::Rejected(result) => eprintln!("rejected: {}", result.reason),
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Guide Lines
//!
//! ```rust
//! use percent_portrait::{BiometricConfig, GuideLines, ImageSize};
//!
//! let config = BiometricConfig::default();
//! let guides = GuideLines::for_canvas(ImageSize::PASSPORT_35X45, &config.biometric_checks);
//! assert_eq!(guides.chin, 458);
//! ```

mod compose;
mod config;
#[cfg(feature = "rustface")]
mod detector;
mod encode;
mod error;
mod geometry;
pub mod landmarks;
mod metrics;
mod pipeline;
mod placement;
mod session;
mod transform;
mod types;
mod validator;

pub use compose::{compose, render, Rendered};
pub use config::{
    BiometricChecksConfig, BiometricConfig, EnabledChecks, FaceDetectionConfig,
    ImageQualityConfig, RefinementConfig,
};
#[cfg(feature = "rustface")]
pub use detector::RustfaceLocator;
pub use encode::{fit, EncodedArtifact, JpegQualityEncoder, QualityEncoder, QualitySearch};
pub use error::{Error, Result};
pub use geometry::eye_aspect_ratio;
pub use landmarks::{EyeSide, LandmarkSet};
pub use metrics::FaceMetrics;
pub use pipeline::{
    analyze, decode, process, process_with, Analysis, FaceLocator, LandmarkPredictor,
    PipelineOutcome, Portrait, PortraitRequest, PrecomputedLandmarks, WholeImageLocator,
};
pub use placement::{GuideLines, PlacementReport};
pub use session::{AdjustCommand, RefinementSession, SessionState};
pub use transform::{
    face_scale, place_crop, rotate_with_landmarks, solve, CropBox, CropTransform, Region,
    SolvedCrop, WHITE,
};
pub use types::{BoundingBox, ImageSize, Point};
pub use validator::{check_framing, evaluate, framing_box, ComplianceResult};
