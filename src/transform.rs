//! Landmark-driven placement of the face inside a fixed-size canvas.
//!
//! The solver scales the image so the estimated face height lands on the
//! middle of the configured face band, puts the chin on the chin line and
//! centers the eyes horizontally. A [`CropTransform`] layers manual
//! refinement on top: an extra scale multiplier, a pixel offset and a
//! rotation.
//!
//! Rotation is applied to the image and the landmarks with the same
//! projection, so the placement math always sees landmark coordinates in the
//! rotated frame.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{warp, Interpolation, Projection};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::BiometricChecksConfig;
use crate::error::{Error, Result};
use crate::landmarks::LandmarkSet;
use crate::types::{ImageSize, Point};

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Manual refinement applied on top of the automatic placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropTransform {
    /// Multiplier relative to the automatically computed scale.
    pub scale: f32,
    pub offset_x: i32,
    pub offset_y: i32,
    /// Clockwise rotation about the image center, in degrees.
    pub rotation_deg: f32,
}

impl Default for CropTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset_x: 0,
            offset_y: 0,
            rotation_deg: 0.0,
        }
    }
}

impl CropTransform {
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }
}

/// A target-sized window into the working image. May extend past the image
/// when the working image is smaller than the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropBox {
    pub left: i64,
    pub top: i64,
    pub width: u32,
    pub height: u32,
}

impl CropBox {
    pub fn right(&self) -> i64 {
        self.left + self.width as i64
    }

    pub fn bottom(&self) -> i64 {
        self.top + self.height as i64
    }

    /// The part of the box covered by an image of size `bounds`.
    pub fn visible_region(&self, bounds: ImageSize) -> Region {
        let x0 = self.left.clamp(0, bounds.width as i64);
        let y0 = self.top.clamp(0, bounds.height as i64);
        let x1 = self.right().clamp(x0, bounds.width as i64);
        let y1 = self.bottom().clamp(y0, bounds.height as i64);
        Region {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        }
    }
}

/// A rectangle fully inside an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// Offset that centers this region on a canvas of size `target`.
    pub fn pad_offset(&self, target: ImageSize) -> (u32, u32) {
        (
            target.width.saturating_sub(self.width) / 2,
            target.height.saturating_sub(self.height) / 2,
        )
    }
}

/// Result of [`solve`]: the working image, the crop box inside it, and the
/// landmarks expressed in working-image coordinates.
#[derive(Debug, Clone)]
pub struct SolvedCrop {
    pub image: RgbImage,
    pub crop: CropBox,
    pub scale: f32,
    pub landmarks: LandmarkSet,
}

impl SolvedCrop {
    pub fn bounds(&self) -> ImageSize {
        ImageSize::new(self.image.width(), self.image.height())
    }
}

/// Scale factor that maps the estimated face height onto the middle of the face band.
pub fn face_scale(
    landmarks: &LandmarkSet,
    target: ImageSize,
    config: &BiometricChecksConfig,
    multiplier: f32,
) -> Result<f32> {
    let face_height = landmarks.face_height(config.chin_to_eye_factor);
    if !face_height.is_finite() || face_height <= f32::EPSILON {
        return Err(Error::DegenerateGeometry(format!(
            "face height {face_height} cannot be scaled"
        )));
    }

    let band_mid = (config.min_face_height + config.max_face_height) / 2.0 / 100.0;
    let target_face_height = band_mid * target.height as f32;
    let scale = target_face_height / face_height * multiplier;
    if !scale.is_finite() || scale <= 0.0 {
        return Err(Error::DegenerateGeometry(format!("invalid scale {scale}")));
    }
    Ok(scale)
}

/// Position a target-sized crop box so the chin sits on the chin line and
/// the eyes are centered, then shift it inside `bounds`.
pub fn place_crop(
    chin: Point,
    eyes_midpoint: Point,
    bounds: ImageSize,
    target: ImageSize,
    config: &BiometricChecksConfig,
    offset_x: i32,
    offset_y: i32,
) -> CropBox {
    let chin_target_y = target.height as f32 * (1.0 - config.chin_height / 100.0);
    let top = (chin.y - chin_target_y).round() as i64 + offset_y as i64;

    let center_x = eyes_midpoint.x.round() as i64 + offset_x as i64;
    let left = center_x - (target.width / 2) as i64;

    CropBox {
        left: clamp_axis(left, target.width, bounds.width),
        top: clamp_axis(top, target.height, bounds.height),
        width: target.width,
        height: target.height,
    }
}

/// Shift (never resize) a span of `len` so it starts inside `[0, bound - len]`.
/// When the span is longer than the bound it is pinned at 0.
fn clamp_axis(start: i64, len: u32, bound: u32) -> i64 {
    start.min(bound as i64 - len as i64).max(0)
}

/// Rotate the image clockwise about its center, keeping its size, and move
/// the landmarks with it. Uncovered corners are filled with white.
pub fn rotate_with_landmarks(
    image: &RgbImage,
    landmarks: &LandmarkSet,
    degrees: f32,
) -> (RgbImage, LandmarkSet) {
    let (cx, cy) = (image.width() as f32 / 2.0, image.height() as f32 / 2.0);
    let projection = Projection::translate(cx, cy)
        * Projection::rotate(degrees.to_radians())
        * Projection::translate(-cx, -cy);

    let rotated = warp(image, &projection, Interpolation::Bilinear, WHITE);
    let landmarks = landmarks.map(|p| Point::from(projection * (p.x, p.y)));
    (rotated, landmarks)
}

/// Compute the working image and crop box for one image.
pub fn solve(
    image: &RgbImage,
    landmarks: &LandmarkSet,
    target: ImageSize,
    config: &BiometricChecksConfig,
    manual: &CropTransform,
) -> Result<SolvedCrop> {
    if image.width() == 0 || image.height() == 0 {
        return Err(Error::Decode("image has zero dimensions".into()));
    }

    let (working, landmarks) = if manual.rotation_deg != 0.0 {
        rotate_with_landmarks(image, landmarks, manual.rotation_deg)
    } else {
        (image.clone(), landmarks.clone())
    };

    let scale = face_scale(&landmarks, target, config, manual.scale)?;

    let scaled_w = ((working.width() as f32 * scale).round() as u32).max(1);
    let scaled_h = ((working.height() as f32 * scale).round() as u32).max(1);
    let scaled = imageops::resize(&working, scaled_w, scaled_h, FilterType::Lanczos3);
    let landmarks = landmarks.map(|p| p * scale);

    let bounds = ImageSize::new(scaled_w, scaled_h);
    let crop = place_crop(
        landmarks.chin(),
        landmarks.eyes_midpoint(),
        bounds,
        target,
        config,
        manual.offset_x,
        manual.offset_y,
    );

    debug!(
        scale,
        scaled = %bounds,
        left = crop.left,
        top = crop.top,
        rotation = manual.rotation_deg,
        "solved crop"
    );

    Ok(SolvedCrop {
        image: scaled,
        crop,
        scale,
        landmarks,
    })
}
