//! Body keypoints in normalized image coordinates

use serde::{Deserialize, Serialize};

/// Number of landmarks produced by the pose estimator
pub const KEYPOINT_COUNT: usize = 33;

/// Landmark indices used by signal derivation
pub mod landmark {
    pub const NOSE: usize = 0;
    pub const LEFT_SHOULDER: usize = 11;
    pub const RIGHT_SHOULDER: usize = 12;
    pub const LEFT_WRIST: usize = 15;
    pub const RIGHT_WRIST: usize = 16;
    pub const LEFT_HIP: usize = 23;
    pub const RIGHT_HIP: usize = 24;
}

/// 2D point, `x` to the right and `y` downward, both roughly in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance
    #[inline]
    pub fn distance(&self, other: &Point2) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    #[inline]
    pub fn midpoint(&self, other: &Point2) -> Point2 {
        Point2::new((self.x + other.x) * 0.5, (self.y + other.y) * 0.5)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Validated set of exactly [`KEYPOINT_COUNT`] finite landmarks for one subject
#[derive(Debug, Clone, PartialEq)]
pub struct KeypointSet {
    points: Vec<Point2>,
}

impl KeypointSet {
    /// Build a set, rejecting wrong length or non-finite coordinates
    pub fn new(points: Vec<Point2>) -> crate::Result<Self> {
        if points.len() != KEYPOINT_COUNT {
            return Err(crate::Error::InvalidInput(format!(
                "expected {} keypoints, got {}",
                KEYPOINT_COUNT,
                points.len()
            )));
        }
        if let Some(idx) = points.iter().position(|p| !p.is_finite()) {
            return Err(crate::Error::InvalidInput(format!(
                "keypoint {} is not finite",
                idx
            )));
        }
        Ok(Self { points })
    }

    /// Build from `[x, y]` pairs
    pub fn from_pairs(pairs: &[[f64; 2]]) -> crate::Result<Self> {
        Self::new(pairs.iter().map(|[x, y]| Point2::new(*x, *y)).collect())
    }

    pub fn point(&self, index: usize) -> Option<Point2> {
        self.points.get(index).copied()
    }

    pub fn points(&self) -> &[Point2] {
        &self.points
    }

    pub fn nose(&self) -> Point2 {
        self.points[landmark::NOSE]
    }

    pub fn shoulder_mid(&self) -> Point2 {
        self.points[landmark::LEFT_SHOULDER].midpoint(&self.points[landmark::RIGHT_SHOULDER])
    }

    /// Hip midpoint, used as the body centroid
    pub fn hip_mid(&self) -> Point2 {
        self.points[landmark::LEFT_HIP].midpoint(&self.points[landmark::RIGHT_HIP])
    }

    /// Left and right wrist
    pub fn wrists(&self) -> [Point2; 2] {
        [
            self.points[landmark::LEFT_WRIST],
            self.points[landmark::RIGHT_WRIST],
        ]
    }
}
