//! Tunable parameters for validation, placement and encoding.
//!
//! The configuration is an immutable value passed into every call. It can be
//! built programmatically or loaded from the JSON settings file used by the
//! desktop tool, whose key names (including the `*_hight` spellings) are kept
//! so existing files load unchanged:
//!
//! ```no_run
//! use percent_portrait::BiometricConfig;
//! use std::path::Path;
//!
//! let config = BiometricConfig::from_json_file(Path::new("settings.json"))?;
//! let tolerance = config.get("biometric_checks", "side_ratio_tolerance");
//! # Ok::<(), percent_portrait::Error>(())
//! ```
//!
//! Every key has a default, so partial files are accepted.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BiometricConfig {
    pub face_detection: FaceDetectionConfig,
    pub biometric_checks: BiometricChecksConfig,
    pub image_quality: ImageQualityConfig,
    pub refinement: RefinementConfig,
}

/// Face locator parameters and the framing box derived from a face region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceDetectionConfig {
    /// Image pyramid step between detection scales (> 1.0).
    pub scale_factor: f32,
    pub min_neighbors: u32,
    /// Settings-file key only; placement uses `chin_to_eye_factor`.
    pub head_height_factor: f32,
    /// Height of the framing box relative to the face region height.
    pub total_height_factor: f32,
    /// Framing box width relative to its height.
    pub width_ratio: f32,
}

impl Default for FaceDetectionConfig {
    fn default() -> Self {
        Self {
            scale_factor: 1.3,
            min_neighbors: 5,
            head_height_factor: 1.4,
            total_height_factor: 1.8,
            width_ratio: 0.75,
        }
    }
}

/// Placement bands (percent of canvas height) and compliance thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiometricChecksConfig {
    pub chin_to_eye_factor: f32,
    #[serde(rename = "min_face_hight")]
    pub min_face_height: f32,
    pub max_face_height: f32,
    /// Chin distance from the bottom edge.
    #[serde(rename = "chin_hight")]
    pub chin_height: f32,
    #[serde(rename = "min_eye_hight")]
    pub min_eye_height: f32,
    #[serde(rename = "max_eye_hight")]
    pub max_eye_height: f32,
    /// Multiplier applied per interactive scale step.
    pub after_scale: f32,
    pub side_ratio_tolerance: f32,
    /// Degrees.
    pub max_head_tilt: f32,
    pub min_eye_ratio: f32,
    /// Pixels.
    pub max_mouth_gap: f32,
}

impl Default for BiometricChecksConfig {
    fn default() -> Self {
        Self {
            chin_to_eye_factor: 2.2,
            min_face_height: 86.02,
            max_face_height: 94.85,
            chin_height: 13.82,
            min_eye_height: 48.77,
            max_eye_height: 71.04,
            after_scale: 1.03,
            side_ratio_tolerance: 0.15,
            max_head_tilt: 8.0,
            min_eye_ratio: 0.2,
            max_mouth_gap: 15.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageQualityConfig {
    pub min_jpeg_quality: u8,
    pub start_jpeg_quality: u8,
    pub quality_step: u8,
}

impl Default for ImageQualityConfig {
    fn default() -> Self {
        Self {
            min_jpeg_quality: 30,
            start_jpeg_quality: 95,
            quality_step: 5,
        }
    }
}

/// Step sizes for manual adjustments in a refinement session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinementConfig {
    /// Pixels per move command.
    pub offset_step: i32,
    /// Degrees per rotate command.
    pub rotation_step: f32,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            offset_step: 10,
            rotation_step: 0.5,
        }
    }
}

impl BiometricConfig {
    /// Look up a numeric parameter by section and key, as named in the JSON file.
    pub fn get(&self, section: &str, key: &str) -> Option<f64> {
        let value = serde_json::to_value(self).ok()?;
        value.get(section)?.get(key)?.as_f64()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(format!("invalid settings: {e}")))
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&content)
    }

    /// Save configuration to a JSON file.
    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Which compliance checks run. Mouth is off by default: beards confuse the lip landmarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnabledChecks {
    pub side_ratio: bool,
    pub head_tilt: bool,
    pub mouth: bool,
    pub eye: bool,
    /// Reject faces whose framing box leaves the source image.
    pub framing: bool,
}

impl Default for EnabledChecks {
    fn default() -> Self {
        Self {
            side_ratio: true,
            head_tilt: true,
            mouth: false,
            eye: true,
            framing: true,
        }
    }
}

impl EnabledChecks {
    pub const NONE: EnabledChecks = EnabledChecks {
        side_ratio: false,
        head_tilt: false,
        mouth: false,
        eye: false,
        framing: false,
    };

    pub const ALL: EnabledChecks = EnabledChecks {
        side_ratio: true,
        head_tilt: true,
        mouth: true,
        eye: true,
        framing: true,
    };
}
