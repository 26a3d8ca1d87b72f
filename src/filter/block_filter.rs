//! Block-wise particle filter step
//!
//! One filter step walks the active sampling schedule: for each block it
//! proposes new values for the covered coordinates from the process model
//! (a block-wise Gibbs-style proposal, everything outside the block held
//! fixed), batch-scores the resulting joint states, folds the likelihoods
//! into the particle weights, and resamples when the weight distribution
//! has drifted too far from uniform. With a single full-joint block this
//! is the classic propagate, weight, resample cycle.

use nalgebra::{RealField, Vector3};
use num_traits::Float;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use tracing::debug;

use crate::filter::population::Population;
use crate::filter::resample::systematic_resample;
use crate::models::observation::HypothesisScorer;
use crate::models::process::{ControlInput, DampedMotionModel};
use crate::types::blocks::{block_axes_for_object, SamplingSchedule};
use crate::types::image::DepthImage;
use crate::types::pose::JointState;
use crate::Result;

/// Sequential Monte Carlo filter over the joint object state with
/// block-partitioned proposals.
///
/// Owns the particle population and the RNG; the process model and the
/// scorer are configured once and only invoked.
pub struct BlockParticleFilter<T: RealField, S> {
    process: DampedMotionModel<T>,
    scorer: S,
    schedule: SamplingSchedule,
    max_kl_divergence: T,
    population: Population<T>,
    rng: StdRng,
}

impl<T, S> BlockParticleFilter<T, S>
where
    T: RealField + Float + Copy,
    S: HypothesisScorer<T>,
    StandardNormal: Distribution<T>,
{
    /// Creates a filter with an empty belief.
    ///
    /// `seed` fixes the RNG for reproducible runs; `None` seeds from the
    /// operating system.
    pub fn new(
        process: DampedMotionModel<T>,
        scorer: S,
        schedule: SamplingSchedule,
        max_kl_divergence: T,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            process,
            scorer,
            schedule,
            max_kl_divergence,
            population: Population::empty(),
            rng,
        }
    }

    /// Replaces the belief with unweighted samples.
    pub fn set_samples(&mut self, samples: Vec<JointState<T>>) {
        self.population = Population::from_samples(samples);
    }

    /// The current belief.
    #[inline]
    pub fn population(&self) -> &Population<T> {
        &self.population
    }

    /// Swaps the active sampling schedule, returning the previous one.
    pub fn set_schedule(&mut self, schedule: SamplingSchedule) -> SamplingSchedule {
        core::mem::replace(&mut self.schedule, schedule)
    }

    #[inline]
    pub fn schedule(&self) -> &SamplingSchedule {
        &self.schedule
    }

    /// Runs one filter step against a frame.
    ///
    /// `dt` is the elapsed time since the previous step; zero means a pure
    /// measurement update (the proposal is the identity). `control` is the
    /// exogenous per-object input, zero during normal tracking.
    ///
    /// # Errors
    /// Propagates scorer failures and degenerate-weight conditions; in
    /// either case the step is aborted rather than completed with
    /// fabricated mass.
    ///
    /// # Panics
    /// Panics if `dt` is negative or `control` does not match the tracked
    /// object count.
    pub fn filter(
        &mut self,
        frame: &DepthImage<T>,
        dt: T,
        control: &ControlInput<T>,
    ) -> Result<()> {
        assert!(dt >= T::zero(), "elapsed time must be non-negative");
        assert_eq!(
            control.object_count(),
            self.process.object_count(),
            "one control command per object required"
        );
        if self.population.is_empty() {
            return Err(crate::Error::EmptyPopulation);
        }

        for block_index in 0..self.schedule.len() {
            let block = self.schedule.blocks()[block_index].clone();
            self.propose_block(&block, dt, control);

            let log_likelihoods = self
                .scorer
                .log_likelihoods(self.population.states(), frame)?;
            self.population.accumulate_log_weights(&log_likelihoods);

            let weights = self.population.normalized_weights()?;
            let kl = Population::kl_divergence_from_uniform(&weights);
            if kl > self.max_kl_divergence {
                debug!(block = block_index, kl = ?kl, "weight degeneracy, resampling");
                let target = self.population.len();
                self.resample(target)?;
            }
        }
        Ok(())
    }

    /// Unconditionally resamples the belief to `target_size` particles.
    pub fn resample(&mut self, target_size: usize) -> Result<()> {
        self.population = systematic_resample(&self.population, target_size, &mut self.rng)?;
        Ok(())
    }

    /// Weight-normalized mean of the belief.
    pub fn mean(&self) -> Result<JointState<T>> {
        self.population.mean()
    }

    /// Proposes new values for the coordinates of one block, for every
    /// particle, leaving all other coordinates untouched.
    fn propose_block(&mut self, block: &[usize], dt: T, control: &ControlInput<T>) {
        // Per-object axis masks are a property of the block, not of the
        // particle; compute them once.
        let mut touched = Vec::new();
        for object in 0..self.process.object_count() {
            let (translation_mask, rotation_mask) = block_axes_for_object(block, object);
            if translation_mask.iter().any(|&m| m) || rotation_mask.iter().any(|&m| m) {
                touched.push((object, translation_mask, rotation_mask));
            }
        }

        let process = &self.process;
        let rng = &mut self.rng;
        for state in self.population.states_mut() {
            for &(object, translation_mask, rotation_mask) in &touched {
                let delta =
                    process.sample_motion(state.body(object), dt, control.body(object), rng);

                let center = *process.rotation_center(object);
                let body = state.body_mut(object);

                let mut rotation = Vector3::zeros();
                for axis in 0..3 {
                    if rotation_mask[axis] {
                        rotation[axis] = delta.rotation[axis];
                        body.motion.angular_velocity[axis] = delta.angular_velocity[axis];
                    }
                }
                let mut translation = Vector3::zeros();
                for axis in 0..3 {
                    if translation_mask[axis] {
                        translation[axis] = delta.translation[axis];
                        body.motion.linear_velocity[axis] = delta.linear_velocity[axis];
                    }
                }

                if rotation != Vector3::zeros() {
                    let pivot = body.pose.transform_point(&center);
                    let delta_q = nalgebra::UnitQuaternion::from_scaled_axis(rotation);
                    body.pose.rotate_about(&delta_q, &pivot);
                }
                body.pose.position += translation;
            }
        }
    }
}
