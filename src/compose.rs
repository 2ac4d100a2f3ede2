//! Cutting the solved crop out of the working image.

use image::imageops;
use image::RgbImage;
use tracing::debug;

use crate::config::BiometricChecksConfig;
use crate::error::Result;
use crate::landmarks::LandmarkSet;
use crate::placement::PlacementReport;
use crate::transform::{solve, CropBox, CropTransform, SolvedCrop, WHITE};
use crate::types::ImageSize;

/// Extract `crop` from `working` as an image of exactly `target` size.
///
/// When the working image does not cover the whole box, the covered part is
/// centered on a white canvas.
pub fn compose(working: &RgbImage, crop: &CropBox, target: ImageSize) -> RgbImage {
    let bounds = ImageSize::new(working.width(), working.height());
    let region = crop.visible_region(bounds);
    let extracted =
        imageops::crop_imm(working, region.x, region.y, region.width, region.height).to_image();

    if extracted.dimensions() == (target.width, target.height) {
        return extracted;
    }

    let (dx, dy) = region.pad_offset(target);
    debug!(
        visible_w = region.width,
        visible_h = region.height,
        %target,
        "padding crop onto white canvas"
    );
    let mut canvas = RgbImage::from_pixel(target.width, target.height, WHITE);
    imageops::replace(&mut canvas, &extracted, dx as i64, dy as i64);
    canvas
}

/// A composed portrait together with how it was produced.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub image: RgbImage,
    pub crop: CropBox,
    pub scale: f32,
    pub placement: PlacementReport,
}

/// Solve and compose in one step.
pub fn render(
    image: &RgbImage,
    landmarks: &LandmarkSet,
    target: ImageSize,
    config: &BiometricChecksConfig,
    manual: &CropTransform,
) -> Result<Rendered> {
    let SolvedCrop {
        image: working,
        crop,
        scale,
        landmarks,
    } = solve(image, landmarks, target, config, manual)?;

    let bounds = ImageSize::new(working.width(), working.height());
    let placement = PlacementReport::measure(&landmarks, &crop, bounds, target, config);
    let image = compose(&working, &crop, target);

    Ok(Rendered {
        image,
        crop,
        scale,
        placement,
    })
}
