//! Batched hypothesis scoring against depth frames
//!
//! The filter only ever asks one question of a sensor model: given a batch
//! of hypothesized joint states and one depth frame, what is each
//! hypothesis' log-likelihood? [`HypothesisScorer`] is that seam; CPU and
//! GPU backends implement it interchangeably and the filter blocks on the
//! complete batch result.
//!
//! [`RenderedDepthScorer`] is the reference CPU backend: it renders each
//! hypothesis through an externally supplied [`DepthRenderer`] and scores
//! the rendered depth against the observed depth with a tail-robust pixel
//! noise model and an occlusion-aware visibility prior. Rasterization
//! itself stays behind the renderer trait.

use nalgebra::RealField;
use num_traits::Float;

use crate::types::image::{CameraIntrinsics, DepthImage};
use crate::types::pose::JointState;
use crate::{Error, Result};

// ============================================================================
// Scoring Contracts
// ============================================================================

/// Batched joint-state likelihood evaluation.
///
/// Implementations must be pure with respect to the filter: no observable
/// side effects, one finite-or-`-inf` log-likelihood per input hypothesis,
/// in input order, monotone non-increasing in rendered-vs-observed depth
/// discrepancy.
pub trait HypothesisScorer<T: RealField> {
    /// Scores every hypothesis against one frame.
    fn log_likelihoods(&self, states: &[JointState<T>], frame: &DepthImage<T>)
        -> Result<Vec<T>>;
}

/// Renders the predicted depth of one joint hypothesis.
///
/// `depth` is a row-major buffer of `intrinsics.width * intrinsics.height`
/// pixels, pre-filled with NaN; the renderer writes predicted depth in
/// meters wherever an object surface projects.
pub trait DepthRenderer<T: RealField> {
    fn render(&self, state: &JointState<T>, intrinsics: &CameraIntrinsics<T>, depth: &mut [T]);
}

// ============================================================================
// Visibility Model
// ============================================================================

/// Two-state visible/occluded pixel process.
///
/// Only the stationary visibility mass is consumed here; the transition
/// probabilities are kept as the session-level parameterization so a
/// backend that tracks per-pixel occlusion over time can share them.
#[derive(Debug, Clone)]
pub struct VisibilityModel<T: RealField> {
    pub p_visible_init: T,
    pub p_visible_visible: T,
    pub p_visible_occluded: T,
}

impl<T: RealField + Float + Copy> VisibilityModel<T> {
    /// # Panics
    /// Panics if any probability is outside [0, 1].
    pub fn new(p_visible_init: T, p_visible_visible: T, p_visible_occluded: T) -> Self {
        for p in [p_visible_init, p_visible_visible, p_visible_occluded] {
            assert!(
                p >= T::zero() && p <= T::one(),
                "visibility probabilities must be in [0, 1]"
            );
        }
        Self {
            p_visible_init,
            p_visible_visible,
            p_visible_occluded,
        }
    }

    /// Stationary probability that a pixel on the object is visible.
    ///
    /// Falls back to the initial visibility when the chain has no unique
    /// stationary distribution.
    pub fn stationary_visible(&self) -> T {
        let denom = T::one() - self.p_visible_visible + self.p_visible_occluded;
        if denom > T::zero() {
            self.p_visible_occluded / denom
        } else {
            self.p_visible_init
        }
    }
}

// ============================================================================
// Pixel Noise Model
// ============================================================================

/// Tail-robust depth noise model for a single pixel.
///
/// The visible component is a Gaussian around the predicted depth with a
/// depth-proportional sigma, mixed with a uniform outlier tail of weight
/// `tail_weight` over `[0, max_depth]`. The tail bounds any single
/// pixel's influence on the hypothesis log-likelihood.
#[derive(Debug, Clone)]
pub struct PixelNoiseModel<T: RealField> {
    pub tail_weight: T,
    pub model_sigma: T,
    pub sigma_factor: T,
    pub max_depth: T,
}

impl<T: RealField + Float + Copy> PixelNoiseModel<T> {
    /// # Panics
    /// Panics if `tail_weight` is outside [0, 1] or `model_sigma` or
    /// `max_depth` is not positive.
    pub fn new(tail_weight: T, model_sigma: T, sigma_factor: T, max_depth: T) -> Self {
        assert!(
            tail_weight >= T::zero() && tail_weight <= T::one(),
            "tail weight must be in [0, 1]"
        );
        assert!(model_sigma > T::zero(), "model sigma must be positive");
        assert!(sigma_factor >= T::zero(), "sigma factor must be non-negative");
        assert!(max_depth > T::zero(), "max depth must be positive");
        Self {
            tail_weight,
            model_sigma,
            sigma_factor,
            max_depth,
        }
    }

    /// Depth noise sigma at a predicted depth.
    #[inline]
    pub fn sigma_at(&self, predicted: T) -> T {
        self.model_sigma + self.sigma_factor * predicted
    }

    /// Density of the uniform outlier tail.
    #[inline]
    fn tail_density(&self) -> T {
        T::one() / self.max_depth
    }

    /// Log-probability of an observed depth given a predicted object
    /// surface at `predicted` depth, visible with probability `p_visible`.
    pub fn log_prob(&self, observed: T, predicted: T, p_visible: T) -> T {
        let sigma = self.sigma_at(predicted);
        let two_pi = T::from_f64(core::f64::consts::TAU).unwrap();
        let norm = T::one() / (sigma * Float::sqrt(two_pi));
        let z = (observed - predicted) / sigma;
        let gaussian = norm * Float::exp(-z * z / T::from_f64(2.0).unwrap());

        let visible =
            (T::one() - self.tail_weight) * gaussian + self.tail_weight * self.tail_density();
        let occluded = self.tail_density();

        let p = p_visible * visible + (T::one() - p_visible) * occluded;
        Float::ln(Float::max(p, T::from_f64(1e-300).unwrap()))
    }

    /// Log-probability of an observed depth on a pixel where no object
    /// surface is predicted: only the outlier tail explains it.
    #[inline]
    pub fn log_prob_background(&self) -> T {
        Float::ln(self.tail_density() * self.tail_weight + T::from_f64(1e-300).unwrap())
    }
}

// ============================================================================
// Rendered-Depth Scorer
// ============================================================================

/// CPU hypothesis scorer: render, then score pixel-wise.
#[derive(Debug, Clone)]
pub struct RenderedDepthScorer<T: RealField, R> {
    renderer: R,
    intrinsics: CameraIntrinsics<T>,
    visibility: VisibilityModel<T>,
    noise: PixelNoiseModel<T>,
}

impl<T: RealField + Float + Copy, R: DepthRenderer<T>> RenderedDepthScorer<T, R> {
    pub fn new(
        renderer: R,
        intrinsics: CameraIntrinsics<T>,
        visibility: VisibilityModel<T>,
        noise: PixelNoiseModel<T>,
    ) -> Self {
        Self {
            renderer,
            intrinsics,
            visibility,
            noise,
        }
    }

    /// Builds the scorer from a session configuration.
    pub fn from_config(
        renderer: R,
        intrinsics: CameraIntrinsics<T>,
        config: &crate::config::TrackerConfig<T>,
    ) -> Self {
        Self::new(
            renderer,
            intrinsics,
            VisibilityModel::new(
                config.p_visible_init,
                config.p_visible_visible,
                config.p_visible_occluded,
            ),
            PixelNoiseModel::new(
                config.tail_weight,
                config.model_sigma,
                config.sigma_factor,
                config.max_depth,
            ),
        )
    }

    fn score_one(&self, rendered: &[T], frame: &DepthImage<T>) -> T {
        let p_visible = self.visibility.stationary_visible();
        let mut total = T::zero();
        for (&observed, &predicted) in frame.as_slice().iter().zip(rendered) {
            if !Float::is_finite(observed) {
                continue;
            }
            total += if Float::is_finite(predicted) {
                self.noise.log_prob(observed, predicted, p_visible)
            } else {
                self.noise.log_prob_background()
            };
        }
        total
    }
}

impl<T: RealField + Float + Copy, R: DepthRenderer<T>> HypothesisScorer<T>
    for RenderedDepthScorer<T, R>
{
    fn log_likelihoods(
        &self,
        states: &[JointState<T>],
        frame: &DepthImage<T>,
    ) -> Result<Vec<T>> {
        if !frame.dimensions_match(&self.intrinsics) {
            return Err(Error::FrameMismatch {
                expected_width: self.intrinsics.width,
                expected_height: self.intrinsics.height,
                actual_width: frame.width(),
                actual_height: frame.height(),
            });
        }

        let pixel_count = self.intrinsics.width * self.intrinsics.height;
        let mut rendered = vec![T::nan(); pixel_count];
        let mut scores = Vec::with_capacity(states.len());
        for state in states {
            rendered.fill(T::nan());
            self.renderer.render(state, &self.intrinsics, &mut rendered);
            scores.push(self.score_one(&rendered, frame));
        }
        Ok(scores)
    }
}
