/**
 * Rank Mask Generator using Extended Void-and-Cluster
 *
 * Implementation of Robert Ulichney's void-and-cluster method, extended with
 * incremental energy maps. The output is a rank for every cell: a
 * permutation of [0, N) whose order of insertion spreads samples as evenly
 * as possible at every density. Comparing ranks against intensity gives a
 * blue noise dither mask.
 *
 * ENERGY MAP
 * ==========
 * The binary pattern blurred by a Gaussian on a torus. High energy marks a
 * cluster, low energy a void. It is computed once per setup and afterwards
 * only changed by delta updates, so every step costs O(kernel area) for the
 * update plus one scan.
 *
 * GENERATION PHASES
 * =================
 *
 * Setup: Build the seed pattern
 *   - Set the first S cells and Fisher–Yates shuffle them
 *   - Refine with the candidate algorithm until cluster == void
 *   - Snapshot the seed energy map
 *
 * Phase 1: Serialize the seed
 *   - Remove samples from the tightest cluster, scanning only live samples
 *   - Assign ranks from S - 1 down to 0
 *
 * Phase 2: Fill the voids
 *   - Restart from the seed snapshot
 *   - Insert samples into the largest void, scanning the whole grid
 *   - Assign ranks from S up to N - 1 (extended) or N / 2 (classic)
 *
 * Phase 3: Fill to completion (classic only)
 *   - Invert the pattern so the empty cells become the minority
 *   - Remove minority samples from their tightest clusters
 *   - Assign ranks from N / 2 up to N - 1
 *
 * Ties always go to the first index in row-major order, which makes the
 * output reproducible for a given seed.
 *
 * REFERENCES
 * ==========
 * - Ulichney, R. (1993). "Void-and-cluster method for dither array generation"
 *   Proceedings of SPIE 1913, Human Vision, Visual Processing, and Digital
 *   Display IV. https://doi.org/10.1117/12.152707
 */

use crate::cancel::CancelToken;
use crate::candidate::{refine_pattern, CandidateOptions};
use crate::config::{GeneratorConfig, RankingMode};
use crate::convolution::{convolve, delta_update, EnergyMap};
use crate::error::{Result, VoidClusterError};
use crate::grid::Grid;
use crate::kernel::{Kernel, KernelCache};
use crate::pattern::BinaryPattern;
use crate::precision::Precision;
use indicatif::{ProgressBar, ProgressStyle};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Result of rank mask generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankMap {
    /// Width of the mask
    pub width: usize,
    /// Height of the mask
    pub height: usize,
    /// Number of samples in the refined seed pattern
    pub seed_samples: usize,
    /// Row-major ranks, a permutation of [0, width · height)
    pub ranks: Vec<u32>,
}

impl RankMap {
    /// Rank of cell `(x, y)`, `None` outside the mask
    pub fn get(&self, x: usize, y: usize) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.ranks.get(y * self.width + x).copied()
    }

    /// Whether every value in [0, N) appears exactly once
    pub fn is_permutation(&self) -> bool {
        let area = self.width * self.height;
        if self.ranks.len() != area {
            return false;
        }
        let mut seen = vec![false; area];
        for &rank in &self.ranks {
            match seen.get_mut(rank as usize) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
        true
    }
}

const UNRANKED: u32 = u32::MAX;

/// Write-once rank buffer
struct RankArray {
    ranks: Vec<u32>,
}

impl RankArray {
    fn new(area: usize) -> Self {
        Self {
            ranks: vec![UNRANKED; area],
        }
    }

    #[inline]
    fn assign(&mut self, idx: usize, rank: usize) {
        debug_assert_eq!(self.ranks[idx], UNRANKED, "cell {} ranked twice", idx);
        self.ranks[idx] = rank as u32;
    }
}

/// Seed pattern plus its energy under the ranking kernel
struct Seed<T> {
    pattern: BinaryPattern,
    energy: EnergyMap<T>,
}

/**
 * Generator for void-and-cluster rank masks
 *
 * Holds an immutable configuration and a shared kernel cache. `generate`
 * borrows the generator immutably, so one instance can serve several
 * threads, each producing independent masks.
 */
#[derive(Debug, Clone)]
pub struct MaskGenerator<T: Precision = f32> {
    config: GeneratorConfig,
    grid: Grid,
    seed_samples: usize,
    kernels: Arc<KernelCache<T>>,
    custom_kernel: Option<Arc<Kernel<T>>>,
    cancel: Option<CancelToken>,
}

impl<T: Precision> MaskGenerator<T> {
    /// Create a new generator with the given configuration
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        config.validate()?;
        let grid = config.grid()?;
        let seed_samples = config.seed_sample_count(&grid)?;

        Ok(Self {
            config,
            grid,
            seed_samples,
            kernels: Arc::new(KernelCache::new()),
            custom_kernel: None,
            cancel: None,
        })
    }

    /// Share a kernel cache with other generators
    pub fn with_kernel_cache(mut self, kernels: Arc<KernelCache<T>>) -> Self {
        self.kernels = kernels;
        self
    }

    /// Use an explicit kernel for both refinement and ranking
    pub fn with_custom_kernel(mut self, kernel: Kernel<T>) -> Result<Self> {
        kernel.check_fits(&self.grid)?;
        self.custom_kernel = Some(Arc::new(kernel));
        Ok(self)
    }

    /// Poll `token` once per candidate iteration and once per rank
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Configuration this generator was built with
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Kernel cache used by this generator
    pub fn kernel_cache(&self) -> &Arc<KernelCache<T>> {
        &self.kernels
    }

    /// Generate a mask, seeding the shuffle from `config.seed`
    pub fn generate(&self) -> Result<RankMap> {
        let mut rng = match self.config.seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::from_rng(&mut rand::rng()),
        };
        self.generate_with_rng(&mut rng)
    }

    /// Generate a mask with a caller-supplied random source for the shuffle
    pub fn generate_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<RankMap> {
        let mut pattern = BinaryPattern::with_prefix(self.grid, self.seed_samples)?;
        pattern.shuffle(rng);
        self.generate_from_pattern(pattern)
    }

    /**
     * Generate a mask from a caller-supplied initial pattern
     *
     * The pattern is refined with the candidate algorithm before ranking,
     * and its sample count replaces the configured one.
     */
    pub fn generate_from_pattern(&self, pattern: BinaryPattern) -> Result<RankMap> {
        if pattern.grid() != self.grid {
            return Err(VoidClusterError::shape(format!(
                "pattern is {}x{}, generator expects {}x{}",
                pattern.grid().width(),
                pattern.grid().height(),
                self.grid.width(),
                self.grid.height()
            )));
        }

        let start_time = Instant::now();
        info!(
            width = self.grid.width(),
            height = self.grid.height(),
            sigma = self.config.sigma,
            precision = T::NAME,
            "generating rank mask"
        );

        let ranking_kernel = self.ranking_kernel()?;
        let seed = self.build_seed(pattern, &ranking_kernel)?;
        let seed_samples = seed.pattern.ones();

        let progress = self.progress_bar();
        let mut ranks = RankArray::new(self.grid.area());

        let mut energy = seed.energy.clone();
        self.phase1_serialize_seed(&seed, &mut energy, &ranking_kernel, &mut ranks, progress.as_ref())?;

        let area = self.grid.area();
        let fill_end = match self.config.ranking {
            RankingMode::Extended => area,
            RankingMode::Classic => (area / 2).max(seed_samples),
        };

        energy.restore_from(&seed.energy);
        let mut pattern = seed.pattern;
        self.phase2_fill_voids(&mut pattern, &mut energy, &ranking_kernel, &mut ranks, fill_end, progress.as_ref())?;

        if fill_end < area {
            self.phase3_fill_clusters(&pattern, &ranking_kernel, &mut ranks, progress.as_ref())?;
        }

        if let Some(pb) = &progress {
            pb.finish_with_message("Rank mask complete");
        }
        info!(
            seed_samples,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "rank mask complete"
        );

        Ok(RankMap {
            width: self.grid.width(),
            height: self.grid.height(),
            seed_samples,
            ranks: ranks.ranks,
        })
    }

    fn ranking_kernel(&self) -> Result<Arc<Kernel<T>>> {
        match &self.custom_kernel {
            Some(kernel) => Ok(Arc::clone(kernel)),
            None => self.kernels.get(&self.config.ranking_spec(), &self.grid),
        }
    }

    fn candidate_kernel(&self, samples: usize, ranking: &Arc<Kernel<T>>) -> Result<Arc<Kernel<T>>> {
        if self.custom_kernel.is_some() {
            return Ok(Arc::clone(ranking));
        }
        let spec = self.config.candidate_spec(&self.grid, samples)?;
        self.kernels.get(&spec, &self.grid)
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(VoidClusterError::Cancelled),
            _ => Ok(()),
        }
    }

    fn progress_bar(&self) -> Option<ProgressBar> {
        if !self.config.verbose {
            return None;
        }
        let pb = ProgressBar::new(self.grid.area() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
        {
            pb.set_style(style.progress_chars("##-"));
        }
        Some(pb)
    }

    /**
     * Setup: refine the initial pattern into the seed
     *
     * The candidate algorithm may run with its own spread; when it does,
     * the seed energy is recomputed under the ranking kernel so the
     * snapshot always matches what the phases use.
     */
    fn build_seed(&self, mut pattern: BinaryPattern, ranking_kernel: &Arc<Kernel<T>>) -> Result<Seed<T>> {
        let start = Instant::now();
        let candidate_kernel = self.candidate_kernel(pattern.ones(), ranking_kernel)?;

        let options = CandidateOptions {
            max_iterations: self.config.max_candidate_iterations,
            strategy: self.config.convolution,
            cancel: self.cancel.clone(),
        };
        let outcome = refine_pattern(&mut pattern, &candidate_kernel, &options)?;

        let energy = if Arc::ptr_eq(&candidate_kernel, ranking_kernel) {
            outcome.energy
        } else {
            convolve(self.config.convolution, &pattern, ranking_kernel)
        };

        debug!(
            samples = pattern.ones(),
            iterations = outcome.iterations,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "seed pattern ready"
        );

        Ok(Seed { pattern, energy })
    }

    /**
     * Phase 1: Serialize the seed
     *
     * Removes seed samples from the tightest cluster first, ranking them
     * from S - 1 down to 0. Only the live sample list is scanned.
     */
    fn phase1_serialize_seed(
        &self,
        seed: &Seed<T>,
        energy: &mut EnergyMap<T>,
        kernel: &Kernel<T>,
        ranks: &mut RankArray,
        progress: Option<&ProgressBar>,
    ) -> Result<()> {
        let start = Instant::now();
        if let Some(pb) = progress {
            pb.set_message("Phase 1: Serializing seed");
        }

        let mut live = seed.pattern.live_samples();

        for rank in (0..live.len()).rev() {
            self.check_cancelled()?;

            let pos = energy.find_tightest_live(&live).ok_or(VoidClusterError::DegeneratePattern {
                ones: 0,
                area: self.grid.area(),
            })?;
            let idx = live.remove_at(pos);
            ranks.assign(idx, rank);
            delta_update(energy, kernel, idx, -T::one());

            if let Some(pb) = progress {
                pb.inc(1);
            }
        }

        debug!(
            ranked = seed.pattern.ones(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "phase 1 complete"
        );
        Ok(())
    }

    /**
     * Phase 2: Fill the voids
     *
     * Starting again from the seed, inserts samples into the largest void
     * and ranks them from S up to `fill_end - 1`. Empty cells are not
     * indexed, so every step scans the full grid.
     */
    fn phase2_fill_voids(
        &self,
        pattern: &mut BinaryPattern,
        energy: &mut EnergyMap<T>,
        kernel: &Kernel<T>,
        ranks: &mut RankArray,
        fill_end: usize,
        progress: Option<&ProgressBar>,
    ) -> Result<()> {
        let start = Instant::now();
        if let Some(pb) = progress {
            pb.set_message("Phase 2: Filling voids");
        }

        let area = self.grid.area();
        let first_rank = pattern.ones();

        for rank in first_rank..fill_end {
            self.check_cancelled()?;

            let void_idx = energy
                .find_largest_void(pattern)
                .ok_or(VoidClusterError::DegeneratePattern { ones: area, area })?;
            pattern.set(void_idx);
            ranks.assign(void_idx, rank);
            delta_update(energy, kernel, void_idx, T::one());

            if let Some(pb) = progress {
                pb.inc(1);
            }
        }

        debug!(
            ranked = fill_end - first_rank,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "phase 2 complete"
        );
        Ok(())
    }

    /**
     * Phase 3: Fill to completion
     *
     * Inverts the half-full pattern so the remaining empty cells become the
     * minority, then removes them from their tightest clusters, ranking
     * them up to N - 1. The inverted energy map is built once and kept
     * current with delta updates.
     */
    fn phase3_fill_clusters(
        &self,
        pattern: &BinaryPattern,
        kernel: &Kernel<T>,
        ranks: &mut RankArray,
        progress: Option<&ProgressBar>,
    ) -> Result<()> {
        let start = Instant::now();
        if let Some(pb) = progress {
            pb.set_message("Phase 3: Filling to completion");
        }

        let area = self.grid.area();
        let first_rank = pattern.ones();
        let mut minority = pattern.inverted();
        let mut energy = convolve(self.config.convolution, &minority, kernel);

        for rank in first_rank..area {
            self.check_cancelled()?;

            let cluster_idx = energy
                .find_tightest_cluster(&minority)
                .ok_or(VoidClusterError::DegeneratePattern { ones: 0, area })?;
            minority.clear(cluster_idx);
            ranks.assign(cluster_idx, rank);
            delta_update(&mut energy, kernel, cluster_idx, -T::one());

            if let Some(pb) = progress {
                pb.inc(1);
            }
        }

        debug!(
            ranked = area - first_rank,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "phase 3 complete"
        );
        Ok(())
    }
}

/**
 * Convenience function to generate a single-precision rank mask
 */
pub fn generate_rank_map(width: usize, height: usize, sigma: f64, seed: Option<u64>) -> Result<RankMap> {
    let config = GeneratorConfig {
        width,
        height,
        sigma,
        seed,
        ..Default::default()
    };
    MaskGenerator::<f32>::new(config)?.generate()
}
