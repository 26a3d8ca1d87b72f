//! Multi-object tracking sessions
//!
//! [`MultiObjectTracker`] owns the belief over all tracked objects and
//! drives the block particle filter through the two phases of a session:
//! initialization from detector candidates (full-state or staged
//! per-object) and per-frame recursive filtering.
//!
//! A tracker instance is not reentrant: initialization and update both
//! read-modify-write the population and the session clock, so every
//! public call holds one mutex for its whole duration. Independent
//! tracker instances share nothing and run concurrently.

use nalgebra::RealField;
use num_traits::Float;
use parking_lot::Mutex;
use rand_distr::{Distribution, StandardNormal};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::TrackerConfig;
use crate::filter::block_filter::BlockParticleFilter;
use crate::models::observation::HypothesisScorer;
use crate::models::process::{ControlInput, DampedMotionModel};
use crate::types::blocks::SamplingSchedule;
use crate::types::image::{CameraIntrinsics, DepthImage};
use crate::types::pose::{JointState, ObjectPose};
use crate::{Error, Result};

/// Candidate states handed to [`MultiObjectTracker::initialize`].
///
/// Detectors either propose complete joint states or, when only
/// single-object hypotheses are available, a pool of per-object pose
/// candidates that the tracker refines one object at a time.
#[derive(Debug, Clone)]
pub enum InitialStates<T: RealField> {
    /// Each candidate is a complete joint-state guess.
    Full(Vec<JointState<T>>),
    /// Each candidate is a pose hypothesis for a single object; the pool
    /// is tried for every object in turn during staged initialization.
    PerObject(Vec<ObjectPose<T>>),
}

impl<T: RealField> InitialStates<T> {
    fn len(&self) -> usize {
        match self {
            InitialStates::Full(states) => states.len(),
            InitialStates::PerObject(poses) => poses.len(),
        }
    }
}

struct Session<T: RealField, S> {
    filter: BlockParticleFilter<T, S>,
    intrinsics: Option<CameraIntrinsics<T>>,
    /// Timestamp of the last processed frame; the next frame's elapsed
    /// time is computed against this.
    last_measurement_time: Option<T>,
    initialized: bool,
}

/// Particle-filter tracker for a fixed set of rigid objects.
pub struct MultiObjectTracker<T: RealField, S> {
    object_count: usize,
    population_size: usize,
    sentinel_pose: ObjectPose<T>,
    operating_schedule: SamplingSchedule,
    session: Mutex<Session<T, S>>,
}

impl<T, S> MultiObjectTracker<T, S>
where
    T: RealField + Float + Copy,
    S: HypothesisScorer<T>,
    StandardNormal: Distribution<T>,
{
    /// Builds a tracker from a session configuration and a scoring
    /// backend.
    ///
    /// The whole configuration is validated here; an invalid configuration
    /// means no session state is ever created.
    pub fn new(config: TrackerConfig<T>, scorer: S) -> Result<Self> {
        config.validate()?;
        let operating_schedule = config.operating_schedule()?;

        let process = DampedMotionModel::new(
            config.object_count,
            config.velocity_damping,
            config.linear_acceleration_sigma,
            config.angular_acceleration_sigma,
            config.rotation_centers.clone(),
        );
        let filter = BlockParticleFilter::new(
            process,
            scorer,
            operating_schedule.clone(),
            config.max_kl_divergence,
            config.seed,
        );

        Ok(Self {
            object_count: config.object_count,
            population_size: config.population_size,
            sentinel_pose: config.sentinel_pose(),
            operating_schedule,
            session: Mutex::new(Session {
                filter,
                intrinsics: None,
                last_measurement_time: None,
                initialized: false,
            }),
        })
    }

    /// Number of tracked objects.
    #[inline]
    pub fn object_count(&self) -> usize {
        self.object_count
    }

    /// Seeds the belief from detector candidates and runs the
    /// initialization filtering against the first frame.
    ///
    /// With [`InitialStates::Full`] the candidates are complete joint
    /// states: the population is seeded directly, one full-joint
    /// measurement-only step is run, and the belief is resampled to the
    /// operating size.
    ///
    /// With [`InitialStates::PerObject`] the joint estimate is refined one
    /// object at a time: every object starts at the out-of-frame sentinel
    /// pose, then for each object index in turn the candidate poses are
    /// injected, a step restricted to that object's coordinates is run,
    /// and the belief is resampled back to the candidate count. Finalized
    /// objects keep their refined poses while later objects are staged.
    /// The joint search this replaces is exponential in the object count;
    /// the staged refinement is linear.
    ///
    /// Both modes end by resampling to the operating population size,
    /// restoring the configured sampling schedule, and setting the session
    /// clock to the frame's timestamp.
    ///
    /// # Errors
    /// [`Error::EmptyCandidates`] without candidates,
    /// [`Error::FrameMismatch`] if the frame does not match `intrinsics`,
    /// plus any filtering failure. On error the tracker is left
    /// uninitialized.
    ///
    /// # Panics
    /// Panics if a full-state candidate's object count does not match the
    /// session's.
    pub fn initialize(
        &self,
        candidates: InitialStates<T>,
        first_frame: &DepthImage<T>,
        intrinsics: CameraIntrinsics<T>,
    ) -> Result<()> {
        let mut session = self.session.lock();
        session.initialized = false;

        if candidates.len() == 0 {
            return Err(Error::EmptyCandidates);
        }
        if !first_frame.dimensions_match(&intrinsics) {
            return Err(frame_mismatch(&intrinsics, first_frame));
        }

        let zero_input = ControlInput::zero(self.object_count);
        match candidates {
            InitialStates::Full(states) => {
                for state in &states {
                    assert_eq!(
                        state.object_count(),
                        self.object_count,
                        "candidate joint states must match the session object count"
                    );
                }
                info!(candidates = states.len(), "initializing from full joint states");

                session
                    .filter
                    .set_schedule(SamplingSchedule::full_joint(self.dof()));
                session.filter.set_samples(states);
                session.filter.filter(first_frame, T::zero(), &zero_input)?;
            }
            InitialStates::PerObject(poses) => {
                info!(
                    candidates = poses.len(),
                    objects = self.object_count,
                    "staged initialization from per-object candidates"
                );

                // All objects parked out of frame; they contribute a
                // stable, negligible likelihood until their stage runs.
                let mut samples = vec![
                    JointState::uniform(self.sentinel_pose.clone(), self.object_count);
                    poses.len()
                ];

                for object in 0..self.object_count {
                    debug!(object, "refining object stage");
                    for (sample, pose) in samples.iter_mut().zip(&poses) {
                        sample.set_pose(object, pose.clone());
                    }

                    session
                        .filter
                        .set_schedule(SamplingSchedule::single_object(object, self.dof()));
                    session.filter.set_samples(samples);
                    session.filter.filter(first_frame, T::zero(), &zero_input)?;
                    session.filter.resample(poses.len())?;

                    samples = session.filter.population().to_samples();
                }
            }
        }

        session.filter.resample(self.population_size)?;
        session.filter.set_schedule(self.operating_schedule.clone());

        session.intrinsics = Some(intrinsics);
        session.last_measurement_time = Some(first_frame.timestamp());
        session.initialized = true;
        info!(population = self.population_size, "tracking session initialized");
        Ok(())
    }

    /// Filters one frame and returns the updated mean joint state.
    ///
    /// The elapsed time is derived from the session clock (zero on the
    /// logically first frame); the process input is zero. The clock only
    /// advances when the step succeeds.
    ///
    /// # Errors
    /// [`Error::Uninitialized`] before a session exists;
    /// [`Error::FrameMismatch`] when the frame does not match the session
    /// intrinsics, in which case the previous belief is retained
    /// unchanged; plus any filtering failure.
    pub fn update(&self, frame: &DepthImage<T>) -> Result<JointState<T>> {
        let mut session = self.session.lock();
        if !session.initialized {
            return Err(Error::Uninitialized);
        }

        {
            let intrinsics = session.intrinsics.as_ref().ok_or(Error::Uninitialized)?;
            if !frame.dimensions_match(intrinsics) {
                return Err(frame_mismatch(intrinsics, frame));
            }
        }

        let dt = match session.last_measurement_time {
            Some(last) => {
                let dt = frame.timestamp() - last;
                if dt < T::zero() {
                    warn!(
                        dt = ?dt,
                        "frame is older than the session clock, treating as simultaneous"
                    );
                    T::zero()
                } else {
                    dt
                }
            }
            None => T::zero(),
        };

        let started = Instant::now();
        session
            .filter
            .filter(frame, dt, &ControlInput::zero(self.object_count))?;
        let mean = session.filter.mean()?;
        session.last_measurement_time = Some(frame.timestamp());
        debug!(elapsed = ?started.elapsed(), "frame filtered");

        Ok(mean)
    }

    /// Reads back the current mean belief without filtering.
    pub fn mean(&self) -> Result<JointState<T>> {
        let session = self.session.lock();
        if !session.initialized {
            return Err(Error::Uninitialized);
        }
        session.filter.mean()
    }

    /// Number of particles currently representing the belief.
    pub fn sample_count(&self) -> Result<usize> {
        let session = self.session.lock();
        if !session.initialized {
            return Err(Error::Uninitialized);
        }
        Ok(session.filter.population().len())
    }

    #[inline]
    fn dof(&self) -> usize {
        self.object_count * crate::types::pose::OBJECT_DOF
    }
}

fn frame_mismatch<T: RealField + Float + Copy>(
    intrinsics: &CameraIntrinsics<T>,
    frame: &DepthImage<T>,
) -> Error {
    Error::FrameMismatch {
        expected_width: intrinsics.width,
        expected_height: intrinsics.height,
        actual_width: frame.width(),
        actual_height: frame.height(),
    }
}
