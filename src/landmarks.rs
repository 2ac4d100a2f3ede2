//! The 68-point facial landmark set and its fixed index layout.
//!
//! Indices follow the iBUG 68-point annotation produced by the standard
//! dlib-style shape predictor. They never change, so they are exposed as
//! constants rather than looked up at runtime.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Point;

pub const NUM_LANDMARKS: usize = 68;

pub const JAW: Range<usize> = 0..17;
pub const CHIN: usize = 8;
pub const BROWS: Range<usize> = 17..27;
/// Top of the nose bridge, centered between the brows.
pub const BROW_CENTER: usize = 27;
pub const NOSE: Range<usize> = 27..36;
pub const NOSE_LEFT_ALA: usize = 31;
pub const NOSE_RIGHT_ALA: usize = 35;
pub const LEFT_EYE: Range<usize> = 36..42;
pub const RIGHT_EYE: Range<usize> = 42..48;
pub const LEFT_EYE_OUTER: usize = 36;
pub const RIGHT_EYE_OUTER: usize = 45;
pub const MOUTH: Range<usize> = 48..68;
pub const INNER_LIP_TOP: usize = 62;
pub const INNER_LIP_BOTTOM: usize = 66;

/// Which eye to measure. `Left` is landmarks 36-41, `Right` is 42-47.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EyeSide {
    Left,
    Right,
}

impl EyeSide {
    pub fn range(self) -> Range<usize> {
        match self {
            EyeSide::Left => LEFT_EYE,
            EyeSide::Right => RIGHT_EYE,
        }
    }
}

impl std::fmt::Display for EyeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EyeSide::Left => f.write_str("left"),
            EyeSide::Right => f.write_str("right"),
        }
    }
}

/// Exactly 68 landmark points in image coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: [Point; NUM_LANDMARKS],
}

impl LandmarkSet {
    pub fn new(points: [Point; NUM_LANDMARKS]) -> Self {
        Self { points }
    }

    /// Build from a slice, rejecting anything that is not exactly 68 points.
    pub fn from_points(points: &[Point]) -> Result<Self> {
        let points: [Point; NUM_LANDMARKS] = points
            .try_into()
            .map_err(|_| Error::InvalidLandmarks {
                count: points.len(),
            })?;
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Point; NUM_LANDMARKS] {
        &self.points
    }

    /// The six contour points of one eye, in predictor order.
    pub fn eye(&self, side: EyeSide) -> &[Point] {
        &self.points[side.range()]
    }

    /// Apply `f` to every point, e.g. to follow a scale or rotation of the image.
    pub fn map(&self, mut f: impl FnMut(Point) -> Point) -> Self {
        let mut points = self.points;
        for p in points.iter_mut() {
            *p = f(*p);
        }
        Self { points }
    }

    pub fn is_finite(&self) -> bool {
        self.points.iter().all(Point::is_finite)
    }
}

impl std::ops::Index<usize> for LandmarkSet {
    type Output = Point;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.points[idx]
    }
}

impl TryFrom<Vec<Point>> for LandmarkSet {
    type Error = Error;

    fn try_from(points: Vec<Point>) -> Result<Self> {
        Self::from_points(&points)
    }
}

impl Serialize for LandmarkSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let pairs: Vec<[f32; 2]> = self.points.iter().map(|p| [p.x, p.y]).collect();
        pairs.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for LandmarkSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let pairs: Vec<[f32; 2]> = Vec::deserialize(deserializer)?;
        let points: Vec<Point> = pairs.into_iter().map(|[x, y]| Point::new(x, y)).collect();
        LandmarkSet::from_points(&points).map_err(serde::de::Error::custom)
    }
}
