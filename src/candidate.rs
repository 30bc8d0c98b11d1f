/**
 * Candidate Algorithm: locally optimal seed patterns
 *
 * Starting from any pattern with at least one sample and at least one empty
 * cell, repeatedly:
 *
 *   1. remove the sample sitting in the tightest cluster,
 *   2. find the largest void with that sample gone,
 *   3. stop if the void is the cell just vacated, otherwise fill it.
 *
 * When removing the worst cluster recreates the best void there is no
 * improving move left and the pattern is a fixed point. The energy map is
 * kept current with delta updates, so each iteration costs two O(N) scans
 * plus O(kernel area).
 *
 * TERMINATION
 * ===========
 * Convergence is empirical, not proven. The loop is capped (10·N iterations
 * unless configured otherwise) and reports `NonConvergence` past the cap.
 */

use crate::cancel::CancelToken;
use crate::convolution::{convolve, delta_update, ConvolutionStrategy, EnergyMap};
use crate::error::{Result, VoidClusterError};
use crate::grid::Grid;
use crate::kernel::Kernel;
use crate::pattern::BinaryPattern;
use crate::precision::Precision;
use tracing::{debug, warn};

/// Default iteration cap, as a multiple of the grid area
pub const MAX_ITERATIONS_MULTIPLIER: usize = 10;

/// Default scale for the adaptive spread heuristic
pub const DEFAULT_ADAPTIVE_SCALE: f64 = 0.3;

/// Knobs for one candidate refinement
#[derive(Debug, Clone, Default)]
pub struct CandidateOptions {
    /// Iteration cap, `None` for 10·N
    pub max_iterations: Option<usize>,
    /// How the initial energy map is computed
    pub strategy: ConvolutionStrategy,
    /// Polled once per iteration
    pub cancel: Option<CancelToken>,
}

/// Refined seed energy and the work it took
#[derive(Debug, Clone)]
pub struct CandidateOutcome<T> {
    /// Energy map of the refined pattern
    pub energy: EnergyMap<T>,
    /// Loop iterations, including the final one that found the fixed point
    pub iterations: usize,
}

/**
 * Spread that tracks the expected distance between samples
 *
 * sqrt(N / min(samples, N - samples)) · scale
 */
pub fn adaptive_spread(grid: &Grid, samples: usize, scale: f64) -> Result<f64> {
    let area = grid.area();
    if samples == 0 || samples >= area {
        return Err(VoidClusterError::DegeneratePattern {
            ones: samples,
            area,
        });
    }
    if !scale.is_finite() || scale <= 0.0 {
        return Err(VoidClusterError::invalid(format!(
            "adaptive spread scale must be positive and finite, got {}",
            scale
        )));
    }

    let minority = samples.min(area - samples);
    Ok((area as f64 / minority as f64).sqrt() * scale)
}

/**
 * Refine `pattern` in place into a candidate-algorithm fixed point
 *
 * Returns the energy map of the refined pattern under `kernel`. On error
 * the pattern is left exactly as it was passed in.
 */
pub fn refine_pattern<T: Precision>(
    pattern: &mut BinaryPattern,
    kernel: &Kernel<T>,
    options: &CandidateOptions,
) -> Result<CandidateOutcome<T>> {
    let grid = pattern.grid();
    let area = grid.area();
    let ones = pattern.ones();

    if ones == 0 || ones == area {
        return Err(VoidClusterError::DegeneratePattern { ones, area });
    }
    kernel.check_fits(&grid)?;

    let max_iterations = match options.max_iterations {
        Some(0) => {
            return Err(VoidClusterError::invalid(
                "candidate iteration cap must be at least 1",
            ))
        }
        Some(cap) => cap,
        None => area.saturating_mul(MAX_ITERATIONS_MULTIPLIER),
    };

    debug!(
        width = grid.width(),
        height = grid.height(),
        samples = ones,
        max_iterations,
        "refining candidate pattern"
    );

    let mut work = pattern.clone();
    let mut energy = convolve(options.strategy, &work, kernel);
    let mut iterations = 0;

    loop {
        if iterations == max_iterations {
            warn!(iterations, "candidate pattern did not converge");
            return Err(VoidClusterError::NonConvergence { iterations });
        }
        if options.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(VoidClusterError::Cancelled);
        }
        iterations += 1;

        // Remove the tightest cluster
        let cluster_idx = energy
            .find_tightest_cluster(&work)
            .ok_or(VoidClusterError::DegeneratePattern { ones, area })?;
        work.clear(cluster_idx);
        delta_update(&mut energy, kernel, cluster_idx, -T::one());

        // Find the largest void with that sample gone
        let void_idx = energy
            .find_largest_void(&work)
            .ok_or(VoidClusterError::DegeneratePattern { ones, area })?;

        if void_idx == cluster_idx {
            work.set(cluster_idx);
            delta_update(&mut energy, kernel, cluster_idx, T::one());
            break;
        }

        work.set(void_idx);
        delta_update(&mut energy, kernel, void_idx, T::one());
    }

    debug!(iterations, "candidate pattern converged");
    *pattern = work;

    Ok(CandidateOutcome { energy, iterations })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convolution::full_convolve;
    use crate::kernel::{KernelCache, KernelSpec};
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    fn shuffled(grid: Grid, count: usize, seed: u64) -> BinaryPattern {
        let mut pattern = BinaryPattern::with_prefix(grid, count).unwrap();
        pattern.shuffle(&mut ChaCha12Rng::seed_from_u64(seed));
        pattern
    }

    #[test]
    fn test_reaches_fixed_point() {
        let grid = Grid::new(16, 16).unwrap();
        let cache = KernelCache::<f64>::new();
        let kernel = cache.get(&KernelSpec::gaussian(1.5), &grid).unwrap();
        let mut pattern = shuffled(grid, 26, 42);

        let outcome = refine_pattern(&mut pattern, &kernel, &CandidateOptions::default()).unwrap();

        assert_eq!(pattern.ones(), 26);
        assert!(outcome.iterations >= 1);

        // Returned energy is the convolution of the refined pattern
        let fresh = full_convolve(&pattern, &kernel);
        for (a, b) in outcome.energy.values().iter().zip(fresh.values()) {
            assert!((a - b).abs() < 1e-10);
        }

        // Removing the tightest cluster makes it the largest void
        let cluster = outcome.energy.find_tightest_cluster(&pattern).unwrap();
        let mut probe = pattern.clone();
        let mut energy = outcome.energy.clone();
        probe.clear(cluster);
        delta_update(&mut energy, &kernel, cluster, -1.0);
        assert_eq!(energy.find_largest_void(&probe), Some(cluster));
    }

    #[test]
    fn test_refinement_is_deterministic() {
        let grid = Grid::new(12, 12).unwrap();
        let cache = KernelCache::<f32>::new();
        let kernel = cache.get(&KernelSpec::gaussian(1.5), &grid).unwrap();

        let mut a = shuffled(grid, 14, 9);
        let mut b = a.clone();
        let first = refine_pattern(&mut a, &kernel, &CandidateOptions::default()).unwrap();
        let second = refine_pattern(&mut b, &kernel, &CandidateOptions::default()).unwrap();

        assert_eq!(a, b);
        assert_eq!(first.iterations, second.iterations);
    }

    #[test]
    fn test_rejects_degenerate_patterns() {
        let grid = Grid::new(4, 4).unwrap();
        let kernel = Kernel::<f64>::build(&KernelSpec::gaussian(1.0), 1, 1).unwrap();

        let mut empty = BinaryPattern::empty(grid);
        let err = refine_pattern(&mut empty, &kernel, &CandidateOptions::default()).unwrap_err();
        assert_eq!(err, VoidClusterError::DegeneratePattern { ones: 0, area: 16 });

        let mut full = BinaryPattern::with_prefix(grid, 16).unwrap();
        let err = refine_pattern(&mut full, &kernel, &CandidateOptions::default()).unwrap_err();
        assert_eq!(err, VoidClusterError::DegeneratePattern { ones: 16, area: 16 });
    }

    #[test]
    fn test_iteration_cap_leaves_pattern_untouched() {
        let grid = Grid::new(16, 16).unwrap();
        let cache = KernelCache::<f64>::new();
        let kernel = cache.get(&KernelSpec::gaussian(1.5), &grid).unwrap();

        // Everything packed into the first rows needs many moves to spread out
        let mut pattern = BinaryPattern::with_prefix(grid, 40).unwrap();
        let before = pattern.clone();
        let options = CandidateOptions {
            max_iterations: Some(1),
            ..Default::default()
        };

        let err = refine_pattern(&mut pattern, &kernel, &options).unwrap_err();
        assert_eq!(err, VoidClusterError::NonConvergence { iterations: 1 });
        assert_eq!(pattern, before);

        let options = CandidateOptions {
            max_iterations: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            refine_pattern(&mut pattern, &kernel, &options),
            Err(VoidClusterError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_cancelled_before_first_iteration() {
        let grid = Grid::new(8, 8).unwrap();
        let kernel = Kernel::<f32>::build(&KernelSpec::gaussian(1.0), 2, 2).unwrap();
        let mut pattern = shuffled(grid, 8, 1);
        let token = CancelToken::new();
        token.cancel();

        let options = CandidateOptions {
            cancel: Some(token),
            ..Default::default()
        };
        assert_eq!(
            refine_pattern(&mut pattern, &kernel, &options).unwrap_err(),
            VoidClusterError::Cancelled
        );
    }

    #[test]
    fn test_oversized_custom_kernel_rejected() {
        let grid = Grid::new(4, 4).unwrap();
        let kernel = Kernel::<f64>::from_weights(5, 1, vec![0.2; 5]).unwrap();
        let mut pattern = shuffled(grid, 3, 2);
        assert!(matches!(
            refine_pattern(&mut pattern, &kernel, &CandidateOptions::default()),
            Err(VoidClusterError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_adaptive_spread() {
        let grid = Grid::new(64, 64).unwrap();

        // 4096 / 409 samples
        let spread = adaptive_spread(&grid, 409, DEFAULT_ADAPTIVE_SCALE).unwrap();
        assert!((spread - (4096.0f64 / 409.0).sqrt() * 0.3).abs() < 1e-12);

        // Symmetric around half density
        let low = adaptive_spread(&grid, 100, 0.3).unwrap();
        let high = adaptive_spread(&grid, 4096 - 100, 0.3).unwrap();
        assert_eq!(low, high);

        assert!(adaptive_spread(&grid, 0, 0.3).is_err());
        assert!(adaptive_spread(&grid, 4096, 0.3).is_err());
        assert!(adaptive_spread(&grid, 10, 0.0).is_err());
    }
}
