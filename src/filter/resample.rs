//! Importance resampling
//!
//! Replaces a weighted population with an unweighted one of a requested
//! size whose sample frequencies approximate the weight distribution.
//! Systematic resampling is used: one uniform offset and an evenly spaced
//! comb through the cumulative weights, which preserves the expectation
//! of bounded statistics with lower variance than independent multinomial
//! draws.

use nalgebra::RealField;
use num_traits::Float;
use rand::Rng;

use crate::filter::population::Population;
use crate::{Error, Result};

/// Systematic resampling to exactly `target_size` unweighted particles.
///
/// # Errors
/// - [`Error::InvalidTargetSize`] if `target_size` is zero; that is a
///   contract violation, not a request for an empty belief.
/// - [`Error::EmptyPopulation`] / [`Error::DegeneratePopulation`]
///   propagated from weight normalization.
pub fn systematic_resample<T, R>(
    population: &Population<T>,
    target_size: usize,
    rng: &mut R,
) -> Result<Population<T>>
where
    T: RealField + Float + Copy,
    R: Rng,
{
    if target_size == 0 {
        return Err(Error::InvalidTargetSize);
    }
    let weights = population.normalized_weights()?;

    let m = T::from_f64(target_size as f64).unwrap();
    let offset = T::from_f64(rng.random::<f64>()).unwrap() / m;
    let step = T::one() / m;

    let mut resampled = Vec::with_capacity(target_size);
    let mut cumulative = weights[0];
    let mut index = 0usize;
    for i in 0..target_size {
        let pointer = offset + step * T::from_f64(i as f64).unwrap();
        while pointer > cumulative && index + 1 < weights.len() {
            index += 1;
            cumulative += weights[index];
        }
        resampled.push(population.states()[index].clone());
    }

    Ok(Population::from_samples(resampled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::pose::{JointState, ObjectPose};
    use nalgebra::Vector3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn two_state_population(log_weight_ratio: f64) -> Population<f64> {
        let states = vec![
            JointState::from_poses(vec![ObjectPose::from_position(Vector3::new(0.0, 0.0, 1.0))]),
            JointState::from_poses(vec![ObjectPose::from_position(Vector3::new(1.0, 0.0, 1.0))]),
        ];
        let mut population = Population::from_samples(states);
        population.accumulate_log_weights(&[0.0, log_weight_ratio]);
        population
    }

    #[test]
    fn test_output_has_exact_target_size() {
        let population = two_state_population(0.0);
        let mut rng = StdRng::seed_from_u64(1);

        for target in [1, 2, 17, 100] {
            let resampled = systematic_resample(&population, target, &mut rng).unwrap();
            assert_eq!(resampled.len(), target);
        }
    }

    #[test]
    fn test_zero_target_size_is_rejected() {
        let population = two_state_population(0.0);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            systematic_resample(&population, 0, &mut rng),
            Err(Error::InvalidTargetSize)
        ));
    }

    #[test]
    fn test_empty_population_is_rejected() {
        let population = Population::<f64>::empty();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            systematic_resample(&population, 10, &mut rng),
            Err(Error::EmptyPopulation)
        ));
    }

    #[test]
    fn test_expectation_is_preserved() {
        // P(x = 1) = e^1 / (1 + e^1) ~= 0.731; the mean of x over the
        // resampled population must approximate that across trials.
        let population = two_state_population(1.0);
        let expected = 1.0f64.exp() / (1.0 + 1.0f64.exp());

        let mut rng = StdRng::seed_from_u64(99);
        let trials = 50;
        let target = 400;
        let mut total = 0.0;
        for _ in 0..trials {
            let resampled = systematic_resample(&population, target, &mut rng).unwrap();
            let ones = resampled
                .states()
                .iter()
                .filter(|s| s.body(0).pose.position.x > 0.5)
                .count();
            total += ones as f64 / target as f64;
        }
        let mean = total / trials as f64;
        assert!(
            (mean - expected).abs() < 0.02,
            "expected ~{:.3}, got {:.3}",
            expected,
            mean
        );
    }

    #[test]
    fn test_resampled_population_is_unweighted() {
        let population = two_state_population(3.0);
        let mut rng = StdRng::seed_from_u64(5);

        let resampled = systematic_resample(&population, 50, &mut rng).unwrap();
        let weights = resampled.normalized_weights().unwrap();
        assert!(weights.iter().all(|&w| (w - 1.0 / 50.0).abs() < 1e-12));
    }
}
