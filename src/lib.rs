//! Depthtrack: 6-DoF object tracking from depth images
//!
//! A sequential Monte Carlo (particle filter) tracking core that estimates
//! the full pose (position + orientation) of one or more known rigid
//! objects over time from a stream of depth frames.
//!
//! # Features
//!
//! - **Block-wise proposals**: joint-state coordinates are partitioned
//!   into sampling blocks that are proposed and weighted independently
//! - **Staged initialization**: multi-object search is refined one object
//!   at a time instead of over the exponential joint space
//! - **Adaptive resampling**: a KL-divergence criterion bounds both
//!   particle degeneracy and resampling-induced variance loss
//! - **Pluggable scoring backends**: hypothesis likelihoods are evaluated
//!   through a batched trait so CPU and GPU scorers are interchangeable

pub mod config;
pub mod filter;
pub mod models;
pub mod types;

pub mod prelude {
    pub use crate::config::TrackerConfig;
    pub use crate::filter::block_filter::BlockParticleFilter;
    pub use crate::filter::population::Population;
    pub use crate::filter::tracker::{InitialStates, MultiObjectTracker};
    pub use crate::models::observation::{DepthRenderer, HypothesisScorer, RenderedDepthScorer};
    pub use crate::models::process::{ControlInput, DampedMotionModel};
    pub use crate::types::blocks::SamplingSchedule;
    pub use crate::types::image::{CameraIntrinsics, DepthImage};
    pub use crate::types::pose::{JointState, ObjectPose};
}

/// Error type for the tracking core.
///
/// No failure is ever turned into a default pose: configuration problems
/// prevent a session from starting, per-frame problems leave the previous
/// belief untouched, and a degenerate particle population aborts the
/// filter step instead of fabricating a mean.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A session-start parameter is missing or out of range.
    #[error("invalid configuration parameter `{parameter}`: {reason}")]
    InvalidConfig {
        /// Name of the offending parameter
        parameter: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// A frame's dimensions do not match the session camera intrinsics.
    #[error("frame is {actual_width}x{actual_height}, expected {expected_width}x{expected_height}")]
    FrameMismatch {
        expected_width: usize,
        expected_height: usize,
        actual_width: usize,
        actual_height: usize,
    },

    /// All particle weights are zero or non-finite after scoring.
    #[error("particle population is degenerate (no finite likelihood mass)")]
    DegeneratePopulation,

    /// Inference was attempted on an empty particle population.
    #[error("particle population is empty")]
    EmptyPopulation,

    /// An initialization was requested with no candidate states.
    #[error("no candidate states supplied for initialization")]
    EmptyCandidates,

    /// Resampling to zero particles is an input-contract violation.
    #[error("resampling target size must be positive")]
    InvalidTargetSize,

    /// The tracker was used before a session was initialized.
    #[error("tracker is not initialized")]
    Uninitialized,

    /// The external hypothesis scorer failed.
    #[error("hypothesis scorer failed: {0}")]
    Scorer(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = ::core::result::Result<T, Error>;
