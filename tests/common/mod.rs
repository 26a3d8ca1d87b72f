//! Common helpers for tracker integration tests

#![allow(dead_code)]

use nalgebra::Vector3;

use depthtrack::prelude::*;
use depthtrack::Result;

/// Deterministic scorer pulling each object toward a fixed anchor
/// position. Stands in for the rendered-depth likelihood so statistical
/// assertions do not depend on rasterization details.
pub struct AnchorScorer {
    pub anchors: Vec<Vector3<f64>>,
    pub sharpness: f64,
}

impl AnchorScorer {
    pub fn new(anchors: Vec<Vector3<f64>>) -> Self {
        Self {
            anchors,
            sharpness: 100.0,
        }
    }
}

impl HypothesisScorer<f64> for AnchorScorer {
    fn log_likelihoods(
        &self,
        states: &[JointState<f64>],
        _frame: &DepthImage<f64>,
    ) -> Result<Vec<f64>> {
        Ok(states
            .iter()
            .map(|state| {
                let mut score = 0.0;
                for (object, anchor) in self.anchors.iter().enumerate() {
                    score -= self.sharpness
                        * (state.body(object).pose.position - anchor).norm_squared();
                }
                score
            })
            .collect())
    }
}

pub fn test_intrinsics() -> CameraIntrinsics<f64> {
    CameraIntrinsics::new(60.0, 60.0, 32.0, 24.0, 64, 48)
}

/// A frame whose pixels carry no information; pair with [`AnchorScorer`].
pub fn blank_frame(timestamp: f64) -> DepthImage<f64> {
    DepthImage::empty(64, 48, timestamp)
}

/// Single-object pose candidates scattered on a line through `center`.
pub fn candidate_poses(center: Vector3<f64>, count: usize, spread: f64) -> Vec<ObjectPose<f64>> {
    (0..count)
        .map(|i| {
            let offset = (i as f64 / (count - 1).max(1) as f64 - 0.5) * 2.0 * spread;
            ObjectPose::from_position(center + Vector3::new(offset, 0.0, 0.0))
        })
        .collect()
}

pub fn config_with_seed(object_count: usize, seed: u64) -> TrackerConfig<f64> {
    let mut config = TrackerConfig::new(object_count);
    config.population_size = 100;
    config.seed = Some(seed);
    config
}
