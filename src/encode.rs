//! Fitting an encoded portrait under a byte budget.
//!
//! The search walks quality downward from a start value in fixed steps and
//! stops at the first encoding that fits. If none fits, the smallest-quality
//! attempt is returned anyway; callers check [`EncodedArtifact::within_budget`].

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ImageQualityConfig;
use crate::error::{Error, Result};

/// A lossy encoder with a 1-100 quality knob.
pub trait QualityEncoder {
    fn encode(&self, image: &RgbImage, quality: u8) -> Result<Vec<u8>>;
}

/// Baseline JPEG via the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegQualityEncoder;

impl QualityEncoder for JpegQualityEncoder {
    fn encode(&self, image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
            .write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                ExtendedColorType::Rgb8,
            )
            .map_err(|e| Error::Encode(e.to_string()))?;
        Ok(buffer)
    }
}

/// Encoded bytes and the quality that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodedArtifact {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub quality: u8,
    pub max_bytes: usize,
}

impl EncodedArtifact {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// False when even the lowest allowed quality exceeded the budget.
    pub fn within_budget(&self) -> bool {
        self.bytes.len() <= self.max_bytes
    }
}

/// Quality search parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualitySearch {
    pub start: u8,
    pub min: u8,
    pub step: u8,
}

impl QualitySearch {
    /// Qualities clamped to the encodable range 1..=100, step at least 1.
    pub fn normalized(&self) -> Self {
        Self {
            start: self.start.clamp(1, 100),
            min: self.min.clamp(1, 100),
            step: self.step.max(1),
        }
    }

    /// Upper bound on encode calls: `ceil((start - min) / step) + 1`.
    pub fn max_attempts(&self) -> usize {
        let search = self.normalized();
        let span = search.start.saturating_sub(search.min) as usize;
        span.div_ceil(search.step as usize) + 1
    }
}

impl From<&ImageQualityConfig> for QualitySearch {
    fn from(config: &ImageQualityConfig) -> Self {
        Self {
            start: config.start_jpeg_quality,
            min: config.min_jpeg_quality,
            step: config.quality_step,
        }
    }
}

/// Encode at decreasing quality until the result fits in `max_bytes`.
///
/// Returns the first fitting artifact, or the artifact from the last
/// attempted quality when nothing fits. Only codec failures are errors.
/// Qualities outside 1..=100 are clamped before encoding, and the artifact
/// reports the quality actually used.
pub fn fit<E: QualityEncoder + ?Sized>(
    encoder: &E,
    image: &RgbImage,
    max_bytes: usize,
    search: QualitySearch,
) -> Result<EncodedArtifact> {
    let search = search.normalized();
    let mut quality = search.start;

    loop {
        let bytes = encoder.encode(image, quality)?;
        debug!(quality, size = bytes.len(), max_bytes, "encoded attempt");

        let artifact = EncodedArtifact {
            bytes,
            quality,
            max_bytes,
        };
        if artifact.within_budget() {
            return Ok(artifact);
        }
        if quality <= search.min {
            warn!(
                quality,
                size = artifact.len(),
                max_bytes,
                "size budget not met at minimum quality"
            );
            return Ok(artifact);
        }
        quality = quality.saturating_sub(search.step).max(search.min);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Size grows linearly with quality; records every call.
    struct LinearEncoder {
        bytes_per_quality: usize,
        calls: RefCell<Vec<u8>>,
    }

    impl LinearEncoder {
        fn new(bytes_per_quality: usize) -> Self {
            Self {
                bytes_per_quality,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl QualityEncoder for LinearEncoder {
        fn encode(&self, _image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
            self.calls.borrow_mut().push(quality);
            Ok(vec![0; quality as usize * self.bytes_per_quality])
        }
    }

    fn search() -> QualitySearch {
        QualitySearch {
            start: 95,
            min: 30,
            step: 5,
        }
    }

    #[test]
    fn returns_first_quality_that_fits() {
        let encoder = LinearEncoder::new(10);
        let artifact = fit(&encoder, &RgbImage::new(1, 1), 700, search()).unwrap();
        assert_eq!(artifact.quality, 70);
        assert!(artifact.within_budget());
        assert_eq!(*encoder.calls.borrow(), vec![95, 90, 85, 80, 75, 70]);
    }

    #[test]
    fn first_attempt_fits() {
        let encoder = LinearEncoder::new(1);
        let artifact = fit(&encoder, &RgbImage::new(1, 1), 1000, search()).unwrap();
        assert_eq!(artifact.quality, 95);
        assert_eq!(encoder.calls.borrow().len(), 1);
    }

    #[test]
    fn unmet_budget_returns_last_attempt() {
        let encoder = LinearEncoder::new(100);
        let artifact = fit(&encoder, &RgbImage::new(1, 1), 10, search()).unwrap();
        assert!(!artifact.within_budget());
        assert_eq!(artifact.quality, 30);
        assert_eq!(encoder.calls.borrow().len(), search().max_attempts());
        assert_eq!(search().max_attempts(), 14);
    }

    #[test]
    fn uneven_step_still_tries_minimum() {
        let encoder = LinearEncoder::new(100);
        let search = QualitySearch {
            start: 95,
            min: 31,
            step: 5,
        };
        fit(&encoder, &RgbImage::new(1, 1), 10, search).unwrap();
        let calls = encoder.calls.borrow();
        assert_eq!(calls.last(), Some(&31));
        assert!(calls.len() <= search.max_attempts());
        assert!(calls.windows(2).all(|w| w[1] < w[0]));
    }

    #[test]
    fn start_below_minimum_encodes_once() {
        let encoder = LinearEncoder::new(100);
        let search = QualitySearch {
            start: 20,
            min: 30,
            step: 5,
        };
        let artifact = fit(&encoder, &RgbImage::new(1, 1), 10, search).unwrap();
        assert_eq!(artifact.quality, 20);
        assert_eq!(encoder.calls.borrow().len(), 1);
        assert_eq!(search.max_attempts(), 1);
    }

    #[test]
    fn zero_quality_is_clamped_and_reported() {
        let encoder = LinearEncoder::new(100);
        let search = QualitySearch {
            start: 10,
            min: 0,
            step: 5,
        };
        let artifact = fit(&encoder, &RgbImage::new(1, 1), 10, search).unwrap();
        assert_eq!(*encoder.calls.borrow(), vec![10, 5, 1]);
        assert_eq!(artifact.quality, 1);
        assert_eq!(search.max_attempts(), 3);
    }

    #[test]
    fn jpeg_shrinks_with_quality() {
        let image = RgbImage::from_fn(64, 64, |x, y| {
            image::Rgb([(x * 4) as u8, (y * 4) as u8, ((x * y) % 256) as u8])
        });
        let high = JpegQualityEncoder.encode(&image, 95).unwrap();
        let low = JpegQualityEncoder.encode(&image, 30).unwrap();
        assert!(low.len() < high.len());
        assert_eq!(&high[..2], &[0xFF, 0xD8]);
    }
}
