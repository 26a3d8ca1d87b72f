//! Rigid-body poses and joint multi-object states
//!
//! A tracking session estimates one pose per tracked object. The joint
//! state concatenates all object poses (plus latent velocities for the
//! motion model) in a fixed order: object `i` always occupies slot `i`
//! for the lifetime of the session.

use nalgebra::{
    Isometry3, Matrix4, Quaternion, RealField, Translation3, UnitQuaternion, Vector3,
};
use num_traits::Float;

use crate::{Error, Result};

/// Number of pose degrees of freedom per object (3 translation + 3 rotation).
pub const OBJECT_DOF: usize = 6;

// ============================================================================
// Object Pose
// ============================================================================

/// The 6-DoF pose of a single rigid object.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectPose<T: RealField> {
    /// Position of the body frame in camera coordinates (meters)
    pub position: Vector3<T>,
    /// Orientation of the body frame in camera coordinates
    pub orientation: UnitQuaternion<T>,
}

impl<T: RealField + Copy> ObjectPose<T> {
    /// Creates a pose from a position and an orientation.
    #[inline]
    pub fn new(position: Vector3<T>, orientation: UnitQuaternion<T>) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// The identity pose (origin, no rotation).
    #[inline]
    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
        }
    }

    /// Creates a pose at a position with identity orientation.
    #[inline]
    pub fn from_position(position: Vector3<T>) -> Self {
        Self {
            position,
            orientation: UnitQuaternion::identity(),
        }
    }

    /// Returns the pose as a homogeneous transform matrix.
    #[inline]
    pub fn homogeneous(&self) -> Matrix4<T> {
        Isometry3::from_parts(Translation3::from(self.position), self.orientation)
            .to_homogeneous()
    }

    /// Maps a point from the body frame to the camera frame.
    #[inline]
    pub fn transform_point(&self, point: &Vector3<T>) -> Vector3<T> {
        self.orientation * point + self.position
    }

    /// Applies a rotation about a pivot point given in camera coordinates.
    ///
    /// The pivot stays fixed; both position and orientation change. This is
    /// how orientation noise is applied about an object's center so that
    /// rotating a hypothesis does not also translate it across the scene.
    pub fn rotate_about(&mut self, delta: &UnitQuaternion<T>, pivot: &Vector3<T>) {
        self.position = pivot + delta * (self.position - pivot);
        self.orientation = delta * self.orientation;
    }
}

// ============================================================================
// Object Motion
// ============================================================================

/// Latent velocity state of a single object, used by the process model.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectMotion<T: RealField> {
    /// Linear velocity (m/s)
    pub linear_velocity: Vector3<T>,
    /// Angular velocity (rad/s, scaled-axis)
    pub angular_velocity: Vector3<T>,
}

impl<T: RealField + Copy> ObjectMotion<T> {
    /// A body at rest.
    #[inline]
    pub fn at_rest() -> Self {
        Self {
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
        }
    }
}

impl<T: RealField + Copy> Default for ObjectMotion<T> {
    fn default() -> Self {
        Self::at_rest()
    }
}

/// Pose and latent motion of a single tracked object.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyState<T: RealField> {
    pub pose: ObjectPose<T>,
    pub motion: ObjectMotion<T>,
}

impl<T: RealField + Copy> BodyState<T> {
    /// Creates a body at the given pose, at rest.
    #[inline]
    pub fn at_pose(pose: ObjectPose<T>) -> Self {
        Self {
            pose,
            motion: ObjectMotion::at_rest(),
        }
    }
}

// ============================================================================
// Joint State
// ============================================================================

/// The joint state of all tracked objects: one [`BodyState`] per object,
/// in fixed session order.
#[derive(Debug, Clone, PartialEq)]
pub struct JointState<T: RealField> {
    bodies: Vec<BodyState<T>>,
}

impl<T: RealField + Copy> JointState<T> {
    /// Creates a joint state from per-object body states.
    ///
    /// # Panics
    /// Panics if `bodies` is empty.
    pub fn from_bodies(bodies: Vec<BodyState<T>>) -> Self {
        assert!(!bodies.is_empty(), "joint state must contain at least one object");
        Self { bodies }
    }

    /// Creates a joint state from per-object poses, all bodies at rest.
    ///
    /// # Panics
    /// Panics if `poses` is empty.
    pub fn from_poses(poses: Vec<ObjectPose<T>>) -> Self {
        Self::from_bodies(poses.into_iter().map(BodyState::at_pose).collect())
    }

    /// Creates a joint state with every object at the same pose, at rest.
    ///
    /// # Panics
    /// Panics if `object_count` is zero.
    pub fn uniform(pose: ObjectPose<T>, object_count: usize) -> Self {
        assert!(object_count > 0, "joint state must contain at least one object");
        Self {
            bodies: (0..object_count).map(|_| BodyState::at_pose(pose.clone())).collect(),
        }
    }

    /// Number of tracked objects.
    #[inline]
    pub fn object_count(&self) -> usize {
        self.bodies.len()
    }

    /// Total pose degrees of freedom across all objects.
    #[inline]
    pub fn dof(&self) -> usize {
        self.bodies.len() * OBJECT_DOF
    }

    /// The object a joint-state coordinate index belongs to.
    #[inline]
    pub fn object_of(coord: usize) -> usize {
        coord / OBJECT_DOF
    }

    #[inline]
    pub fn body(&self, index: usize) -> &BodyState<T> {
        &self.bodies[index]
    }

    #[inline]
    pub fn body_mut(&mut self, index: usize) -> &mut BodyState<T> {
        &mut self.bodies[index]
    }

    #[inline]
    pub fn bodies(&self) -> &[BodyState<T>] {
        &self.bodies
    }

    /// Replaces one object's pose, resetting its motion to rest.
    #[inline]
    pub fn set_pose(&mut self, index: usize, pose: ObjectPose<T>) {
        self.bodies[index] = BodyState::at_pose(pose);
    }
}

// ============================================================================
// Weighted Mean on the Pose Manifold
// ============================================================================

/// Computes the weighted mean of a set of joint states.
///
/// Positions and velocities average linearly. Orientations use the
/// manifold-correct mean: the dominant eigenvector of the weighted
/// quaternion outer-product matrix, which is invariant under the sign
/// ambiguity of the quaternion representation. A naive linear average of
/// quaternion components is not generally a valid rotation mean.
///
/// `weights` must be normalized (summing to 1); the caller obtains them
/// from the population's weight normalization.
///
/// # Errors
/// Returns [`Error::EmptyPopulation`] if `states` is empty.
///
/// # Panics
/// Panics if `weights` and `states` differ in length, or if the states
/// disagree on object count.
pub fn mean_state<T: RealField + Float + Copy>(
    states: &[JointState<T>],
    weights: &[T],
) -> Result<JointState<T>> {
    if states.is_empty() {
        return Err(Error::EmptyPopulation);
    }
    assert_eq!(states.len(), weights.len(), "one weight per state required");

    let object_count = states[0].object_count();
    let mut bodies = Vec::with_capacity(object_count);

    for object in 0..object_count {
        let mut position = Vector3::zeros();
        let mut linear_velocity = Vector3::zeros();
        let mut angular_velocity = Vector3::zeros();
        let mut outer = Matrix4::<T>::zeros();

        for (state, &w) in states.iter().zip(weights) {
            assert_eq!(
                state.object_count(),
                object_count,
                "all states must share one object count"
            );
            let body = state.body(object);
            position += body.pose.position * w;
            linear_velocity += body.motion.linear_velocity * w;
            angular_velocity += body.motion.angular_velocity * w;

            let q = body.pose.orientation.as_ref().coords;
            outer += (q * q.transpose()) * w;
        }

        bodies.push(BodyState {
            pose: ObjectPose::new(position, dominant_orientation(&outer)),
            motion: ObjectMotion {
                linear_velocity,
                angular_velocity,
            },
        });
    }

    Ok(JointState::from_bodies(bodies))
}

/// Extracts the rotation mean from an accumulated quaternion outer-product
/// matrix as its dominant eigenvector.
fn dominant_orientation<T: RealField + Float + Copy>(outer: &Matrix4<T>) -> UnitQuaternion<T> {
    let eigen = nalgebra::SymmetricEigen::new(*outer);

    let mut best = 0;
    for i in 1..4 {
        if eigen.eigenvalues[i] > eigen.eigenvalues[best] {
            best = i;
        }
    }

    let coords = eigen.eigenvectors.column(best).into_owned();
    UnitQuaternion::from_quaternion(Quaternion::from_vector(coords))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quarter_turn_z() -> UnitQuaternion<f64> {
        UnitQuaternion::from_scaled_axis(Vector3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2))
    }

    #[test]
    fn test_homogeneous_carries_translation() {
        let pose = ObjectPose::from_position(Vector3::new(1.0, 2.0, 3.0));
        let m = pose.homogeneous();
        assert!((m[(0, 3)] - 1.0).abs() < 1e-12);
        assert!((m[(1, 3)] - 2.0).abs() < 1e-12);
        assert!((m[(2, 3)] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_rotate_about_keeps_pivot_fixed() {
        let pivot = Vector3::new(0.5, 0.0, 2.0);
        let mut pose = ObjectPose::from_position(pivot);
        pose.rotate_about(&quarter_turn_z(), &pivot);
        assert!((pose.position - pivot).norm() < 1e-12);

        // A point away from the pivot moves.
        let mut off = ObjectPose::from_position(Vector3::new(1.5, 0.0, 2.0));
        off.rotate_about(&quarter_turn_z(), &pivot);
        assert!((off.position - Vector3::new(0.5, 1.0, 2.0)).norm() < 1e-12);
    }

    #[test]
    fn test_mean_positions_average_linearly() {
        let a = JointState::from_poses(vec![ObjectPose::from_position(Vector3::new(0.0, 0.0, 1.0))]);
        let b = JointState::from_poses(vec![ObjectPose::from_position(Vector3::new(2.0, 0.0, 3.0))]);

        let mean = mean_state(&[a, b], &[0.5, 0.5]).unwrap();
        assert!((mean.body(0).pose.position - Vector3::new(1.0, 0.0, 2.0)).norm() < 1e-12);
    }

    #[test]
    fn test_mean_orientation_lands_between() {
        let zero = UnitQuaternion::identity();
        let ninety = quarter_turn_z();

        let a = JointState::from_poses(vec![ObjectPose::new(Vector3::zeros(), zero)]);
        let b = JointState::from_poses(vec![ObjectPose::new(Vector3::zeros(), ninety)]);

        let mean = mean_state(&[a, b], &[0.5, 0.5]).unwrap();
        let angle = mean.body(0).pose.orientation.angle();
        assert!(
            (angle - std::f64::consts::FRAC_PI_4).abs() < 1e-6,
            "expected ~45 degrees, got {} rad",
            angle
        );
    }

    #[test]
    fn test_mean_orientation_ignores_quaternion_sign() {
        let q = quarter_turn_z();
        let neg = UnitQuaternion::new_unchecked(-q.into_inner());

        let a = JointState::from_poses(vec![ObjectPose::new(Vector3::zeros(), q)]);
        let b = JointState::from_poses(vec![ObjectPose::new(Vector3::zeros(), neg)]);

        let mean = mean_state(&[a, b], &[0.5, 0.5]).unwrap();
        let diff = mean.body(0).pose.orientation.angle_to(&q);
        assert!(diff < 1e-6, "q and -q must average to the same rotation");
    }

    #[test]
    fn test_mean_rejects_empty_input() {
        let states: Vec<JointState<f64>> = Vec::new();
        assert!(matches!(
            mean_state(&states, &[]),
            Err(Error::EmptyPopulation)
        ));
    }
}
