//! Void-and-Cluster Rank Masks
//!
//! A Rust implementation of Robert Ulichney's void-and-cluster algorithm for
//! generating blue noise rank masks, extended with incremental energy-map
//! maintenance so each step costs O(kernel area) instead of a full blur.
//!
//! # Features
//!
//! - Extended void-and-cluster ranking with a candidate-algorithm seed
//! - Toroidal convolution with O(kernel area) delta updates
//! - Gaussian and tail-Gaussian kernels, or any odd-sized custom kernel
//! - Shared, thread-safe kernel cache
//! - Single or double precision energy maps from one generic engine
//! - Reproducible results with seeded random number generation
//!
//! # Quick Start
//!
//! ```no_run
//! use void_and_cluster::{GeneratorConfig, MaskGenerator, SeedSamples};
//!
//! let config = GeneratorConfig {
//!     width: 64,
//!     height: 64,
//!     sigma: 1.9,
//!     seed_samples: SeedSamples::Density(0.1),
//!     seed: Some(42),
//!     ..Default::default()
//! };
//!
//! let generator = MaskGenerator::<f32>::new(config).unwrap();
//! let mask = generator.generate().unwrap();
//! assert!(mask.is_permutation());
//! ```
//!
//! # Algorithm
//!
//! 1. **Setup**: shuffle S samples onto the grid and refine them with the
//!    candidate algorithm until the tightest cluster is the largest void
//! 2. **Phase 1**: remove seed samples from the tightest clusters, ranking
//!    them S - 1 down to 0
//! 3. **Phase 2**: from the seed again, fill the largest voids, ranking
//!    cells S up to N - 1
//!
//! All convolutions wrap around the edges (toroidal topology), so masks tile
//! seamlessly.
//!
//! # References
//!
//! - Ulichney, R. (1993). "Void-and-cluster method for dither array generation"
//! - Ulichney, R. (1988). "Dithering with blue noise"

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Cooperative cancellation
pub mod cancel;
/// Candidate algorithm for seed patterns
pub mod candidate;
/// Generation configuration
pub mod config;
/// Toroidal convolution engine
pub mod convolution;
/// Error types
pub mod error;
/// Rank mask generation
pub mod generator;
/// Grid geometry
pub mod grid;
/// Kernel construction and caching
pub mod kernel;
/// Binary patterns
pub mod pattern;
/// Numeric precision policy
pub mod precision;

// Re-export main types for convenience
pub use cancel::CancelToken;
pub use candidate::{adaptive_spread, refine_pattern, CandidateOptions, CandidateOutcome};
pub use config::{CandidateSpread, GeneratorConfig, KernelOptions, RankingMode, SeedSamples};
pub use convolution::{delta_update, full_convolve, ConvolutionStrategy, EnergyMap};
pub use error::{Result, VoidClusterError};
pub use generator::{generate_rank_map, MaskGenerator, RankMap};
pub use grid::Grid;
pub use kernel::{Kernel, KernelCache, KernelShape, KernelSpec};
pub use pattern::{BinaryPattern, LiveSamples};
pub use precision::Precision;
