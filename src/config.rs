//! Session configuration
//!
//! Everything a tracking session accepts at start time, validated before
//! any session state exists. A rejected configuration means the session
//! never begins.

use nalgebra::{RealField, Vector3};
use num_traits::Float;

use crate::types::blocks::SamplingSchedule;
use crate::types::pose::{ObjectPose, OBJECT_DOF};
use crate::{Error, Result};

/// Configuration of one tracking session.
///
/// Fields are public so callers can adjust what their parameter source
/// provides; [`TrackerConfig::validate`] is run by the tracker before the
/// session starts.
#[derive(Debug, Clone)]
pub struct TrackerConfig<T: RealField> {
    /// Number of tracked objects; fixes the joint-state layout.
    pub object_count: usize,
    /// Operating particle count after initialization.
    pub population_size: usize,
    /// Operating sampling-block partition over `6 * object_count`
    /// coordinates.
    pub sampling_blocks: Vec<Vec<usize>>,
    /// KL divergence (weights vs. uniform) above which a weighting step
    /// triggers a resample.
    pub max_kl_divergence: T,

    /// Probability that an object pixel is visible at session start.
    pub p_visible_init: T,
    /// Probability that a visible pixel stays visible.
    pub p_visible_visible: T,
    /// Probability that an occluded pixel becomes visible.
    pub p_visible_occluded: T,

    /// Linear acceleration noise, per axis (m/s^2).
    pub linear_acceleration_sigma: T,
    /// Angular acceleration noise, per axis (rad/s^2).
    pub angular_acceleration_sigma: T,
    /// Velocity damping rate (1/s); velocities decay toward zero.
    pub velocity_damping: T,

    /// Mixture weight of the uniform outlier tail in the pixel model.
    pub tail_weight: T,
    /// Base depth noise sigma (m).
    pub model_sigma: T,
    /// Depth-proportional sigma growth (per meter of depth).
    pub sigma_factor: T,
    /// Largest depth the sensor reports (m); bounds the outlier tail.
    pub max_depth: T,

    /// Integer factor frames and intrinsics are downsampled by before
    /// they reach the filter.
    pub downsampling_factor: usize,
    /// Position of the out-of-frame sentinel pose used while an object is
    /// pending during staged initialization.
    pub sentinel_position: Vector3<T>,
    /// Per-object rotation centers in the body frame; orientation noise
    /// pivots about these. Empty means the body-frame origin for all.
    pub rotation_centers: Vec<Vector3<T>>,
    /// RNG seed; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl<T: RealField + Float + Copy> TrackerConfig<T> {
    /// A workable default configuration for `object_count` objects: one
    /// sampling block per object and typical depth-sensor noise values.
    ///
    /// # Panics
    /// Panics if `object_count` is zero.
    pub fn new(object_count: usize) -> Self {
        assert!(object_count > 0, "at least one object must be tracked");
        Self {
            object_count,
            population_size: 200,
            sampling_blocks: SamplingSchedule::per_object(object_count)
                .blocks()
                .to_vec(),
            max_kl_divergence: T::from_f64(2.0).unwrap(),
            p_visible_init: T::from_f64(0.1).unwrap(),
            p_visible_visible: T::from_f64(0.9).unwrap(),
            p_visible_occluded: T::from_f64(0.3).unwrap(),
            linear_acceleration_sigma: T::from_f64(0.02).unwrap(),
            angular_acceleration_sigma: T::from_f64(0.05).unwrap(),
            velocity_damping: T::from_f64(0.5).unwrap(),
            tail_weight: T::from_f64(0.01).unwrap(),
            model_sigma: T::from_f64(0.003).unwrap(),
            sigma_factor: T::from_f64(0.0014).unwrap(),
            max_depth: T::from_f64(6.0).unwrap(),
            downsampling_factor: 1,
            sentinel_position: Vector3::new(
                T::zero(),
                T::zero(),
                T::from_f64(1.5).unwrap(),
            ),
            rotation_centers: Vec::new(),
            seed: None,
        }
    }

    /// Total pose degrees of freedom of the joint state.
    #[inline]
    pub fn dof(&self) -> usize {
        self.object_count * OBJECT_DOF
    }

    /// The validated operating schedule.
    pub fn operating_schedule(&self) -> Result<SamplingSchedule> {
        SamplingSchedule::from_blocks(self.sampling_blocks.clone(), self.dof())
    }

    /// The sentinel pose pending objects are parked at during staged
    /// initialization.
    #[inline]
    pub fn sentinel_pose(&self) -> ObjectPose<T> {
        ObjectPose::from_position(self.sentinel_position)
    }

    /// Checks every parameter; an `Err` means the session must not start.
    pub fn validate(&self) -> Result<()> {
        if self.object_count == 0 {
            return Err(invalid("object_count", "must be at least 1"));
        }
        if self.population_size == 0 {
            return Err(invalid("population_size", "must be at least 1"));
        }
        self.operating_schedule()?;
        if !(self.max_kl_divergence > T::zero()) {
            return Err(invalid("max_kl_divergence", "must be positive"));
        }

        check_probability("p_visible_init", self.p_visible_init)?;
        check_probability("p_visible_visible", self.p_visible_visible)?;
        check_probability("p_visible_occluded", self.p_visible_occluded)?;

        check_non_negative("linear_acceleration_sigma", self.linear_acceleration_sigma)?;
        check_non_negative("angular_acceleration_sigma", self.angular_acceleration_sigma)?;
        check_non_negative("velocity_damping", self.velocity_damping)?;

        check_probability("tail_weight", self.tail_weight)?;
        if !(self.model_sigma > T::zero()) {
            return Err(invalid("model_sigma", "must be positive"));
        }
        check_non_negative("sigma_factor", self.sigma_factor)?;
        if !(self.max_depth > T::zero()) {
            return Err(invalid("max_depth", "must be positive"));
        }

        if self.downsampling_factor == 0 {
            return Err(invalid("downsampling_factor", "must be at least 1"));
        }
        if !self.rotation_centers.is_empty() && self.rotation_centers.len() != self.object_count {
            return Err(invalid(
                "rotation_centers",
                "must be empty or provide one center per object",
            ));
        }
        Ok(())
    }
}

fn invalid(parameter: &'static str, reason: impl Into<String>) -> Error {
    Error::InvalidConfig {
        parameter,
        reason: reason.into(),
    }
}

fn check_probability<T: RealField + Copy>(parameter: &'static str, value: T) -> Result<()> {
    if value >= T::zero() && value <= T::one() {
        Ok(())
    } else {
        Err(invalid(parameter, "must be in [0, 1]"))
    }
}

fn check_non_negative<T: RealField + Copy>(parameter: &'static str, value: T) -> Result<()> {
    if value >= T::zero() {
        Ok(())
    } else {
        Err(invalid(parameter, "must be non-negative"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(TrackerConfig::<f64>::new(1).validate().is_ok());
        assert!(TrackerConfig::<f64>::new(3).validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_population() {
        let mut config = TrackerConfig::<f64>::new(1);
        config.population_size = 0;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfig {
                parameter: "population_size",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_incomplete_blocks() {
        let mut config = TrackerConfig::<f64>::new(2);
        config.sampling_blocks = vec![vec![0, 1, 2, 3, 4, 5]];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_probability() {
        let mut config = TrackerConfig::<f64>::new(1);
        config.p_visible_visible = 1.2;
        assert!(config.validate().is_err());

        let mut config = TrackerConfig::<f64>::new(1);
        config.tail_weight = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_negative_noise() {
        let mut config = TrackerConfig::<f64>::new(1);
        config.linear_acceleration_sigma = -1.0;
        assert!(config.validate().is_err());

        let mut config = TrackerConfig::<f64>::new(1);
        config.model_sigma = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_kl_threshold_zero() {
        let mut config = TrackerConfig::<f64>::new(1);
        config.max_kl_divergence = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_wrong_rotation_center_count() {
        let mut config = TrackerConfig::<f64>::new(2);
        config.rotation_centers = vec![nalgebra::Vector3::zeros()];
        assert!(config.validate().is_err());
    }
}
