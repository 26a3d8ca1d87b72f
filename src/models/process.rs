//! Damped-acceleration motion model
//!
//! Object dynamics between frames: velocities decay toward zero at a
//! configured damping rate while zero-mean Gaussian acceleration noise is
//! injected, scaled by the elapsed time. With `dt = 0` the model reduces
//! exactly to the identity, which is relied upon for the first frame of a
//! session and for the measurement-only initialization steps.

use nalgebra::{RealField, UnitQuaternion, Vector3};
use num_traits::Float;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::types::pose::BodyState;

// ============================================================================
// Control Input
// ============================================================================

/// Exogenous per-object acceleration command.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyControl<T: RealField> {
    /// Linear acceleration (m/s^2)
    pub linear: Vector3<T>,
    /// Angular acceleration (rad/s^2)
    pub angular: Vector3<T>,
}

impl<T: RealField + Copy> BodyControl<T> {
    #[inline]
    pub fn zero() -> Self {
        Self {
            linear: Vector3::zeros(),
            angular: Vector3::zeros(),
        }
    }
}

/// Control input for the whole joint state, one command per object.
///
/// Per-frame tracking passes [`ControlInput::zero`]; the field exists so
/// a caller with a manipulation platform can feed commanded accelerations
/// through the proposal.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlInput<T: RealField> {
    bodies: Vec<BodyControl<T>>,
}

impl<T: RealField + Copy> ControlInput<T> {
    /// Zero input for `object_count` objects.
    pub fn zero(object_count: usize) -> Self {
        Self {
            bodies: vec![BodyControl::zero(); object_count],
        }
    }

    /// Builds an input from per-object commands.
    pub fn from_bodies(bodies: Vec<BodyControl<T>>) -> Self {
        Self { bodies }
    }

    #[inline]
    pub fn object_count(&self) -> usize {
        self.bodies.len()
    }

    #[inline]
    pub fn body(&self, index: usize) -> &BodyControl<T> {
        &self.bodies[index]
    }
}

// ============================================================================
// Motion Delta
// ============================================================================

/// One sampled motion increment for a single object.
///
/// The pose part is expressed as a translation plus a scaled-axis rotation
/// so a sampling block can commit any subset of the six coordinates while
/// leaving the rest untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionDelta<T: RealField> {
    /// Translation increment (m)
    pub translation: Vector3<T>,
    /// Rotation increment as a scaled-axis vector (rad), applied about the
    /// object's rotation center
    pub rotation: Vector3<T>,
    /// Post-step linear velocity
    pub linear_velocity: Vector3<T>,
    /// Post-step angular velocity
    pub angular_velocity: Vector3<T>,
}

impl<T: RealField + Copy> MotionDelta<T> {
    /// Turns the rotation increment into a unit quaternion.
    #[inline]
    pub fn rotation_quaternion(&self) -> UnitQuaternion<T> {
        UnitQuaternion::from_scaled_axis(self.rotation)
    }
}

// ============================================================================
// Damped Motion Model
// ============================================================================

/// Stochastic damped-acceleration kinematics shared by all objects, with a
/// per-object rotation center.
///
/// Velocity evolves as
/// `v' = exp(-damping * dt) * v + dt * control + sqrt(dt) * sigma * eps`
/// with `eps ~ N(0, I)` independently per axis, and the pose advances by
/// `v' * dt`. Sampling is deterministic given the RNG state.
#[derive(Debug, Clone)]
pub struct DampedMotionModel<T: RealField> {
    damping: T,
    linear_sigma: T,
    angular_sigma: T,
    rotation_centers: Vec<Vector3<T>>,
}

impl<T: RealField + Float + Copy> DampedMotionModel<T> {
    /// Creates a motion model for `object_count` objects.
    ///
    /// `rotation_centers` are per-object pivots in the body frame; pass an
    /// empty vector to pivot about each body-frame origin.
    ///
    /// # Panics
    /// Panics if a noise sigma or the damping rate is negative, or if a
    /// non-empty `rotation_centers` does not match `object_count`.
    pub fn new(
        object_count: usize,
        damping: T,
        linear_sigma: T,
        angular_sigma: T,
        rotation_centers: Vec<Vector3<T>>,
    ) -> Self {
        assert!(damping >= T::zero(), "damping rate must be non-negative");
        assert!(
            linear_sigma >= T::zero() && angular_sigma >= T::zero(),
            "acceleration noise sigma must be non-negative"
        );
        let rotation_centers = if rotation_centers.is_empty() {
            vec![Vector3::zeros(); object_count]
        } else {
            assert_eq!(
                rotation_centers.len(),
                object_count,
                "one rotation center per object required"
            );
            rotation_centers
        };
        Self {
            damping,
            linear_sigma,
            angular_sigma,
            rotation_centers,
        }
    }

    #[inline]
    pub fn object_count(&self) -> usize {
        self.rotation_centers.len()
    }

    /// Rotation center of `object` in the body frame.
    #[inline]
    pub fn rotation_center(&self, object: usize) -> &Vector3<T> {
        &self.rotation_centers[object]
    }

    /// Samples one motion increment for `body` over `dt` seconds.
    ///
    /// `dt = 0` yields an exact identity: velocities are unchanged and the
    /// pose increments are zero.
    pub fn sample_motion<R: Rng>(
        &self,
        body: &BodyState<T>,
        dt: T,
        control: &BodyControl<T>,
        rng: &mut R,
    ) -> MotionDelta<T>
    where
        StandardNormal: Distribution<T>,
    {
        let decay = Float::exp(-self.damping * dt);
        let sqrt_dt = Float::sqrt(dt);

        let linear_velocity = body.motion.linear_velocity * decay
            + control.linear * dt
            + sample_axes(rng) * (self.linear_sigma * sqrt_dt);
        let angular_velocity = body.motion.angular_velocity * decay
            + control.angular * dt
            + sample_axes(rng) * (self.angular_sigma * sqrt_dt);

        MotionDelta {
            translation: linear_velocity * dt,
            rotation: angular_velocity * dt,
            linear_velocity,
            angular_velocity,
        }
    }
}

fn sample_axes<T: RealField + Copy, R: Rng>(rng: &mut R) -> Vector3<T>
where
    StandardNormal: Distribution<T>,
{
    Vector3::new(
        rng.sample(StandardNormal),
        rng.sample(StandardNormal),
        rng.sample(StandardNormal),
    )
}
