//! Detector collaborator interfaces
//!
//! Model implementations live outside this crate. They plug in through
//! [`Detector`] (run on a worker thread) and [`PoseEstimator`] (run inline on
//! the tick thread).

use crate::capture::Frame;
use crate::signals::KeypointSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A model that turns one frame into one result
pub trait Detector: Send + 'static {
    /// Per-frame result
    type Output: Clone + Send + 'static;

    /// Run inference on a frame
    fn infer(&mut self, frame: &Frame) -> crate::Result<Self::Output>;
}

/// Builds a detector inside the worker thread.
///
/// Called again on every worker reset.
pub type DetectorFactory<D> = Arc<dyn Fn() -> crate::Result<D> + Send + Sync>;

/// Type-erased detector with a fixed output
pub type DynDetector<O> = Box<dyn Detector<Output = O>>;

impl<O: Clone + Send + 'static> Detector for DynDetector<O> {
    type Output = O;

    fn infer(&mut self, frame: &Frame) -> crate::Result<O> {
        (**self).infer(frame)
    }
}

/// Wrap a concrete detector constructor as a factory of [`DynDetector`]
pub fn boxed_factory<D, F>(make: F) -> DetectorFactory<DynDetector<D::Output>>
where
    D: Detector,
    F: Fn() -> crate::Result<D> + Send + Sync + 'static,
{
    Arc::new(move || make().map(|d| Box::new(d) as DynDetector<D::Output>))
}

/// Synchronous single-subject pose estimator
pub trait PoseEstimator: Send {
    /// Keypoints for the frame, or `None` when no subject is visible
    fn estimate(&mut self, frame: &Frame) -> crate::Result<Option<KeypointSet>>;
}

/// Action-classifier probability pair
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ViolenceProbs(pub [f64; 2]);

impl ViolenceProbs {
    pub fn new(p0: f64, p1: f64) -> Self {
        Self([p0, p1])
    }

    /// Probability of class `index`; 0 for an out-of-range index
    pub fn get(&self, index: usize) -> f64 {
        self.0.get(index).copied().unwrap_or(0.0)
    }
}

/// Axis-aligned box in pixels, top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

/// One object-detector hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponDetection {
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    pub score: f64,
    pub class: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violence_probs_index() {
        let p = ViolenceProbs::new(0.2, 0.8);
        assert_eq!(p.get(0), 0.2);
        assert_eq!(p.get(1), 0.8);
        assert_eq!(p.get(2), 0.0);
    }

    #[test]
    fn test_violence_probs_serde_as_pair() {
        let p: ViolenceProbs = serde_json::from_str("[0.25, 0.75]").unwrap();
        assert_eq!(p, ViolenceProbs::new(0.25, 0.75));
    }

    #[test]
    fn test_detection_serde_box_key() {
        let json = r#"{"box": {"x": 1, "y": 2, "w": 3, "h": 4}, "score": 0.9, "class": "knife"}"#;
        let d: WeaponDetection = serde_json::from_str(json).unwrap();
        assert_eq!(d.bbox.w, 3);
        assert_eq!(d.class, "knife");
    }
}
