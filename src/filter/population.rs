//! Weighted particle populations
//!
//! The belief over the joint object state is an ordered set of joint-state
//! samples with associated weights. Weights live in log space while the
//! filter accumulates likelihoods and are only exponentiated during
//! normalization, so a frame that scores hundreds of pixels cannot
//! underflow the weight recursion.

use nalgebra::RealField;
use num_traits::Float;

use crate::types::pose::{mean_state, JointState};
use crate::{Error, Result};

/// An ordered, weighted set of joint-state samples.
///
/// Invariants: all samples share one object count; after a successful
/// normalization the weights are non-negative and sum to 1. A population
/// is either unweighted (equal log-weights, post-resample) or carries
/// weights proportional to accumulated likelihood.
#[derive(Debug, Clone)]
pub struct Population<T: RealField> {
    states: Vec<JointState<T>>,
    log_weights: Vec<T>,
}

impl<T: RealField + Float + Copy> Population<T> {
    /// Creates an unweighted population from samples.
    pub fn from_samples(states: Vec<JointState<T>>) -> Self {
        let log_weights = vec![T::zero(); states.len()];
        Self {
            states,
            log_weights,
        }
    }

    /// An empty population (no belief yet).
    pub fn empty() -> Self {
        Self {
            states: Vec::new(),
            log_weights: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    #[inline]
    pub fn states(&self) -> &[JointState<T>] {
        &self.states
    }

    #[inline]
    pub fn states_mut(&mut self) -> &mut [JointState<T>] {
        &mut self.states
    }

    /// Copies the samples out, e.g. to re-inject candidates between staged
    /// initialization rounds.
    pub fn to_samples(&self) -> Vec<JointState<T>> {
        self.states.clone()
    }

    /// Resets to equal weights without touching the samples.
    pub fn set_equal_weights(&mut self) {
        for w in &mut self.log_weights {
            *w = T::zero();
        }
    }

    /// Applies the incremental weight recursion `new ∝ old × likelihood`
    /// in log space.
    ///
    /// # Panics
    /// Panics if `log_likelihoods` does not provide one value per sample.
    pub fn accumulate_log_weights(&mut self, log_likelihoods: &[T]) {
        assert_eq!(
            log_likelihoods.len(),
            self.log_weights.len(),
            "one log-likelihood per particle required"
        );
        for (w, &l) in self.log_weights.iter_mut().zip(log_likelihoods) {
            *w += l;
        }
    }

    /// Normalized linear weights.
    ///
    /// # Errors
    /// [`Error::EmptyPopulation`] on an empty population;
    /// [`Error::DegeneratePopulation`] when no sample carries finite
    /// likelihood mass (all weights zero or non-finite). The degenerate
    /// case is reported instead of being papered over: a mean extracted
    /// from such a population would be an arbitrary pose.
    pub fn normalized_weights(&self) -> Result<Vec<T>> {
        if self.is_empty() {
            return Err(Error::EmptyPopulation);
        }

        let mut max = T::neg_infinity();
        for &w in &self.log_weights {
            if w > max {
                max = w;
            }
        }
        if !Float::is_finite(max) {
            return Err(Error::DegeneratePopulation);
        }

        let mut weights: Vec<T> = self
            .log_weights
            .iter()
            .map(|&w| Float::exp(w - max))
            .collect();
        let sum: T = weights.iter().fold(T::zero(), |acc, &w| acc + w);
        if !Float::is_finite(sum) || !(sum > T::zero()) {
            return Err(Error::DegeneratePopulation);
        }

        for w in &mut weights {
            *w /= sum;
        }
        Ok(weights)
    }

    /// Empirical KL divergence of normalized weights from the uniform
    /// distribution: `Σ wᵢ ln(wᵢ · M)`.
    ///
    /// Zero for an unweighted population, `ln(M)` when all mass sits on a
    /// single particle. This is the adaptive resampling criterion.
    pub fn kl_divergence_from_uniform(weights: &[T]) -> T {
        let m = T::from_f64(weights.len() as f64).unwrap();
        let mut kl = T::zero();
        for &w in weights {
            if w > T::zero() {
                kl += w * Float::ln(w * m);
            }
        }
        kl
    }

    /// Weight-normalized mean of the belief on the pose manifold.
    pub fn mean(&self) -> Result<JointState<T>> {
        let weights = self.normalized_weights()?;
        mean_state(&self.states, &weights)
    }
}
