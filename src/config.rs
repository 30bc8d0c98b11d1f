//! Immutable configuration for one mask generation.

use crate::candidate::{adaptive_spread, DEFAULT_ADAPTIVE_SCALE};
use crate::convolution::ConvolutionStrategy;
use crate::error::{Result, VoidClusterError};
use crate::grid::Grid;
use crate::kernel::{KernelShape, KernelSpec};
use serde::{Deserialize, Serialize};

/// How many samples the seed pattern starts with
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedSamples {
    /// floor(N · density) samples, density strictly between 0 and 1
    Density(f64),
    /// Exact sample count, strictly between 0 and N
    Count(usize),
}

impl Default for SeedSamples {
    fn default() -> Self {
        SeedSamples::Density(BlueNoiseDefaults::INITIAL_DENSITY)
    }
}

/// Spread used while refining the seed pattern
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CandidateSpread {
    /// `candidate_sigma` if set, else `sigma`
    #[default]
    Fixed,
    /// Derived from the sample count so the kernel tracks sample spacing
    Adaptive {
        /// Multiplier on sqrt(N / minority count)
        scale: f64,
    },
}

impl CandidateSpread {
    /// Adaptive spread with the usual scale
    pub fn adaptive() -> Self {
        CandidateSpread::Adaptive {
            scale: DEFAULT_ADAPTIVE_SCALE,
        }
    }
}

/// Which void-and-cluster variant assigns the ranks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingMode {
    /// Seed serialization, then void filling up to N - 1
    #[default]
    Extended,
    /// Void filling stops at N / 2; the rest is ranked by removing the
    /// tightest clusters of the inverted pattern
    Classic,
}

/// Shape parameters shared by every generated kernel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelOptions {
    /// Kernel radius as a multiple of sigma
    pub radius_multiplier: f64,
    /// Gaussian or tail Gaussian
    pub shape: KernelShape,
}

impl Default for KernelOptions {
    fn default() -> Self {
        Self {
            radius_multiplier: KernelSpec::DEFAULT_RADIUS_MULTIPLIER,
            shape: KernelShape::Gaussian,
        }
    }
}

impl KernelOptions {
    /// Kernel spec for `spread` with these options
    pub fn spec(&self, spread: f64) -> KernelSpec {
        KernelSpec {
            spread,
            radius_multiplier: self.radius_multiplier,
            shape: self.shape,
        }
    }
}

struct BlueNoiseDefaults;

impl BlueNoiseDefaults {
    const WIDTH: usize = 64;
    const HEIGHT: usize = 64;
    const SIGMA: f64 = 1.9;
    const INITIAL_DENSITY: f64 = 0.1;
}

/// Configuration for rank mask generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Width of the mask in cells
    pub width: usize,
    /// Height of the mask in cells
    pub height: usize,
    /// Gaussian sigma for ranking (typically 1.5-2.5)
    pub sigma: f64,
    /// Separate sigma for refining the seed pattern
    pub candidate_sigma: Option<f64>,
    /// Size of the seed pattern
    pub seed_samples: SeedSamples,
    /// Kernel radius and shape
    pub kernel: KernelOptions,
    /// Fixed or adaptive candidate spread
    pub candidate_spread: CandidateSpread,
    /// Candidate loop cap, `None` for 10·N
    pub max_candidate_iterations: Option<usize>,
    /// How full convolutions are computed
    pub convolution: ConvolutionStrategy,
    /// Extended or classic ranking
    pub ranking: RankingMode,
    /// Optional random seed for reproducible results
    pub seed: Option<u64>,
    /// Show a progress bar
    pub verbose: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            width: BlueNoiseDefaults::WIDTH,
            height: BlueNoiseDefaults::HEIGHT,
            sigma: BlueNoiseDefaults::SIGMA,
            candidate_sigma: None,
            seed_samples: SeedSamples::default(),
            kernel: KernelOptions::default(),
            candidate_spread: CandidateSpread::Fixed,
            max_candidate_iterations: None,
            convolution: ConvolutionStrategy::Direct,
            ranking: RankingMode::Extended,
            seed: None,
            verbose: false,
        }
    }
}

impl GeneratorConfig {
    /// Check every parameter up front so generation cannot fail on bad input midway
    pub fn validate(&self) -> Result<()> {
        let grid = self.grid()?;
        self.ranking_spec().validate()?;
        if let Some(sigma) = self.candidate_sigma {
            self.kernel.spec(sigma).validate()?;
        }
        let samples = self.seed_sample_count(&grid)?;
        if let CandidateSpread::Adaptive { scale } = self.candidate_spread {
            adaptive_spread(&grid, samples, scale)?;
        }
        if self.max_candidate_iterations == Some(0) {
            return Err(VoidClusterError::invalid(
                "max_candidate_iterations must be at least 1",
            ));
        }
        Ok(())
    }

    /// Grid described by `width` × `height`
    pub fn grid(&self) -> Result<Grid> {
        Grid::new(self.width, self.height)
    }

    /// Resolve `seed_samples` to a count S with 0 < S < N
    pub fn seed_sample_count(&self, grid: &Grid) -> Result<usize> {
        let area = grid.area();
        let count = match self.seed_samples {
            SeedSamples::Density(density) => {
                if !density.is_finite() || density <= 0.0 || density >= 1.0 {
                    return Err(VoidClusterError::invalid(format!(
                        "initial density must be between 0 and 1, got {}",
                        density
                    )));
                }
                (area as f64 * density).floor() as usize
            }
            SeedSamples::Count(count) => count,
        };

        if count == 0 || count >= area {
            return Err(VoidClusterError::invalid(format!(
                "seed sample count must be between 1 and {}, got {}",
                area - 1,
                count
            )));
        }
        Ok(count)
    }

    /// Kernel spec used for ranking
    pub fn ranking_spec(&self) -> KernelSpec {
        self.kernel.spec(self.sigma)
    }

    /// Kernel spec used for refining a seed of `samples` samples
    pub fn candidate_spec(&self, grid: &Grid, samples: usize) -> Result<KernelSpec> {
        let spread = match self.candidate_spread {
            CandidateSpread::Adaptive { scale } => adaptive_spread(grid, samples, scale)?,
            CandidateSpread::Fixed => self.candidate_sigma.unwrap_or(self.sigma),
        };
        Ok(self.kernel.spec(spread))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GeneratorConfig::default();
        assert_eq!(config.width, 64);
        assert_eq!(config.height, 64);
        assert_eq!(config.sigma, 1.9);
        assert_eq!(config.seed_samples, SeedSamples::Density(0.1));
        assert_eq!(config.kernel.radius_multiplier, 4.0);
        assert_eq!(config.ranking, RankingMode::Extended);
        assert_eq!(config.seed, None);
        assert!(!config.verbose);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let invalid = [
            GeneratorConfig {
                width: 0,
                ..Default::default()
            },
            GeneratorConfig {
                height: 0,
                ..Default::default()
            },
            GeneratorConfig {
                sigma: -1.0,
                ..Default::default()
            },
            GeneratorConfig {
                sigma: 0.0,
                ..Default::default()
            },
            GeneratorConfig {
                candidate_sigma: Some(0.0),
                ..Default::default()
            },
            GeneratorConfig {
                seed_samples: SeedSamples::Density(0.0),
                ..Default::default()
            },
            GeneratorConfig {
                seed_samples: SeedSamples::Density(1.0),
                ..Default::default()
            },
            GeneratorConfig {
                seed_samples: SeedSamples::Count(0),
                ..Default::default()
            },
            GeneratorConfig {
                seed_samples: SeedSamples::Count(64 * 64),
                ..Default::default()
            },
            GeneratorConfig {
                max_candidate_iterations: Some(0),
                ..Default::default()
            },
            GeneratorConfig {
                candidate_spread: CandidateSpread::Adaptive { scale: -0.3 },
                ..Default::default()
            },
        ];

        for config in invalid {
            assert!(
                matches!(config.validate(), Err(VoidClusterError::InvalidArgument(_))),
                "{:?} should be rejected",
                config
            );
        }
    }

    #[test]
    fn test_density_too_small_for_grid() {
        // floor(16 * 0.05) = 0
        let config = GeneratorConfig {
            width: 4,
            height: 4,
            seed_samples: SeedSamples::Density(0.05),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_seed_sample_count() {
        let config = GeneratorConfig::default();
        let grid = config.grid().unwrap();
        assert_eq!(config.seed_sample_count(&grid).unwrap(), 409);

        let config = GeneratorConfig {
            width: 8,
            height: 8,
            seed_samples: SeedSamples::Count(6),
            ..Default::default()
        };
        let grid = config.grid().unwrap();
        assert_eq!(config.seed_sample_count(&grid).unwrap(), 6);
    }

    #[test]
    fn test_candidate_spec_precedence() {
        let grid = Grid::new(64, 64).unwrap();
        let mut config = GeneratorConfig::default();
        assert_eq!(config.candidate_spec(&grid, 409).unwrap().spread, 1.9);

        config.candidate_sigma = Some(2.5);
        assert_eq!(config.candidate_spec(&grid, 409).unwrap().spread, 2.5);

        config.candidate_spread = CandidateSpread::adaptive();
        let spread = config.candidate_spec(&grid, 409).unwrap().spread;
        assert!((spread - (4096.0f64 / 409.0).sqrt() * 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: GeneratorConfig = serde_json::from_str(
            r#"{
                "width": 32,
                "height": 16,
                "seed_samples": { "count": 50 },
                "kernel": { "shape": { "type": "tail_gaussian", "exponent": 1.5 } },
                "candidate_spread": { "mode": "adaptive", "scale": 0.3 },
                "convolution": "fft",
                "ranking": "classic",
                "seed": 7
            }"#,
        )
        .unwrap();

        assert_eq!(config.width, 32);
        assert_eq!(config.height, 16);
        assert_eq!(config.sigma, 1.9);
        assert_eq!(config.seed_samples, SeedSamples::Count(50));
        assert_eq!(config.kernel.radius_multiplier, 4.0);
        assert_eq!(config.kernel.shape, KernelShape::TailGaussian { exponent: 1.5 });
        assert_eq!(config.candidate_spread, CandidateSpread::Adaptive { scale: 0.3 });
        assert_eq!(config.convolution, ConvolutionStrategy::Fft);
        assert_eq!(config.ranking, RankingMode::Classic);
        assert_eq!(config.seed, Some(7));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_integer_dimensions_rejected_by_parser() {
        let parsed: std::result::Result<GeneratorConfig, _> =
            serde_json::from_str(r#"{ "width": 12.5, "height": 8 }"#);
        assert!(parsed.is_err());
    }
}
