//! The sequential Monte Carlo tracking core
//!
//! Particle populations, importance resampling, the block-wise filter
//! step, and the session-level multi-object tracker.

pub mod block_filter;
pub mod population;
pub mod resample;
pub mod tracker;

pub use block_filter::BlockParticleFilter;
pub use population::Population;
pub use resample::systematic_resample;
pub use tracker::{InitialStates, MultiObjectTracker};
