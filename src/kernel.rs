/**
 * Gaussian Kernel Construction and Caching
 *
 * The energy map is the binary pattern blurred by a normalized 2-D kernel.
 * Kernels are built once per parameter tuple and handed out as immutable
 * `Arc<Kernel<T>>` values, so many generations can read the same table.
 *
 * KERNEL SHAPES
 * =============
 * Gaussian:      w(dx, dy) = exp(-(dx² + dy²) / (2σ²))
 * Tail Gaussian: w(dx, dy) = exp(-(√(dx² + dy²) / (2σ))^p)
 *
 * The tail variant controls how fast weight falls off away from the centre.
 * It improves the extreme low and high ranks when σ is small.
 *
 * TORUS FIT
 * =========
 * The radius is ceil(multiplier · σ). A kernel wider than the grid would
 * wrap onto itself and count some neighbours twice, so each radius is
 * clamped to (dimension - 1) / 2 before the table is built. The clamped
 * radii are part of the cache key.
 */

use crate::error::{Result, VoidClusterError};
use crate::grid::Grid;
use crate::precision::Precision;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Fall-off profile of a generated kernel
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KernelShape {
    /// Standard Gaussian
    #[default]
    Gaussian,
    /// Gaussian with a tunable tail exponent (1 = exponential fall-off)
    TailGaussian {
        /// Fall-off steepness, higher means faster decay from the centre
        exponent: f64,
    },
}

/// Parameters that fully determine a generated kernel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KernelSpec {
    /// Gaussian sigma
    pub spread: f64,
    /// Radius as a multiple of `spread`
    pub radius_multiplier: f64,
    /// Weight profile
    pub shape: KernelShape,
}

impl KernelSpec {
    /// 3σ truncates too much of the tail for small masks
    pub const DEFAULT_RADIUS_MULTIPLIER: f64 = 4.0;

    /// Standard Gaussian with the default radius multiplier
    pub fn gaussian(spread: f64) -> Self {
        Self {
            spread,
            radius_multiplier: Self::DEFAULT_RADIUS_MULTIPLIER,
            shape: KernelShape::Gaussian,
        }
    }

    /// Tail Gaussian with the default radius multiplier
    pub fn tail_gaussian(spread: f64, exponent: f64) -> Self {
        Self {
            spread,
            radius_multiplier: Self::DEFAULT_RADIUS_MULTIPLIER,
            shape: KernelShape::TailGaussian { exponent },
        }
    }

    /// Reject parameters that cannot produce a kernel
    pub fn validate(&self) -> Result<()> {
        if !self.spread.is_finite() || self.spread <= 0.0 {
            return Err(VoidClusterError::invalid(format!(
                "spread must be positive and finite, got {}",
                self.spread
            )));
        }
        if !self.radius_multiplier.is_finite() || self.radius_multiplier <= 0.0 {
            return Err(VoidClusterError::invalid(format!(
                "radius multiplier must be positive and finite, got {}",
                self.radius_multiplier
            )));
        }
        if let KernelShape::TailGaussian { exponent } = self.shape {
            if !exponent.is_finite() || exponent <= 0.0 {
                return Err(VoidClusterError::invalid(format!(
                    "tail exponent must be positive and finite, got {}",
                    exponent
                )));
            }
        }
        Ok(())
    }

    /// Unclamped radius, ceil(multiplier · spread)
    pub fn radius(&self) -> usize {
        (self.radius_multiplier * self.spread).ceil() as usize
    }

    fn weight(&self, dx: isize, dy: isize) -> f64 {
        let dist_sq = (dx * dx + dy * dy) as f64;
        match self.shape {
            KernelShape::Gaussian => (-dist_sq / (2.0 * self.spread * self.spread)).exp(),
            KernelShape::TailGaussian { exponent } => {
                (-(dist_sq.sqrt() / (2.0 * self.spread)).powf(exponent)).exp()
            }
        }
    }
}

/// Normalized 2-D weight table with odd width and height
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel<T> {
    width: usize,
    height: usize,
    weights: Vec<T>,
}

impl<T: Precision> Kernel<T> {
    /// Build a generated kernel with explicit per-axis radii
    pub fn build(spec: &KernelSpec, radius_x: usize, radius_y: usize) -> Result<Self> {
        spec.validate()?;

        let width = 2 * radius_x + 1;
        let height = 2 * radius_y + 1;
        let mut table = Vec::with_capacity(width * height);

        for dy in -(radius_y as isize)..=radius_y as isize {
            for dx in -(radius_x as isize)..=radius_x as isize {
                table.push(spec.weight(dx, dy));
            }
        }

        // Centre weight is exp(0) = 1, so the sum is never zero
        let sum: f64 = table.iter().sum();
        let weights = table.into_iter().map(|w| T::from_weight(w / sum)).collect();

        Ok(Self {
            width,
            height,
            weights,
        })
    }

    /// Custom kernel from a row-major weight table of declared size
    pub fn from_weights(width: usize, height: usize, weights: Vec<T>) -> Result<Self> {
        if width % 2 == 0 || height % 2 == 0 {
            return Err(VoidClusterError::shape(format!(
                "kernel dimensions must be odd, got {}x{}",
                width, height
            )));
        }
        if weights.len() != width * height {
            return Err(VoidClusterError::shape(format!(
                "kernel declared as {}x{} but {} weights were supplied",
                width,
                height,
                weights.len()
            )));
        }
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(VoidClusterError::invalid("kernel weights must be finite"));
        }

        Ok(Self {
            width,
            height,
            weights,
        })
    }

    /// Custom kernel from rows of equal length
    pub fn from_rows(rows: &[Vec<T>]) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);

        if let Some(row) = rows.iter().find(|row| row.len() != width) {
            return Err(VoidClusterError::shape(format!(
                "kernel rows must share one width, found {} and {}",
                width,
                row.len()
            )));
        }

        Self::from_weights(width, height, rows.concat())
    }

    /// Width in cells (odd)
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in cells (odd)
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Horizontal distance from the centre to the edge
    #[inline]
    pub fn half_width(&self) -> usize {
        self.width / 2
    }

    /// Vertical distance from the centre to the edge
    #[inline]
    pub fn half_height(&self) -> usize {
        self.height / 2
    }

    /// Row-major weights
    #[inline]
    pub fn weights(&self) -> &[T] {
        &self.weights
    }

    /// Weight at kernel column `kx`, row `ky`
    #[inline]
    pub fn weight(&self, kx: usize, ky: usize) -> T {
        self.weights[ky * self.width + kx]
    }

    /// Sum of all weights
    pub fn sum(&self) -> T {
        self.weights.iter().copied().sum()
    }

    /// The kernel must not wrap onto itself on `grid`
    pub fn check_fits(&self, grid: &Grid) -> Result<()> {
        if self.width > grid.width() || self.height > grid.height() {
            return Err(VoidClusterError::shape(format!(
                "{}x{} kernel does not fit a {}x{} grid",
                self.width,
                self.height,
                grid.width(),
                grid.height()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ShapeKey {
    Gaussian,
    Tail(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct KernelKey {
    spread: u64,
    radius_multiplier: u64,
    shape: ShapeKey,
    radius_x: usize,
    radius_y: usize,
}

impl KernelKey {
    fn new(spec: &KernelSpec, radius_x: usize, radius_y: usize) -> Self {
        Self {
            spread: spec.spread.to_bits(),
            radius_multiplier: spec.radius_multiplier.to_bits(),
            shape: match spec.shape {
                KernelShape::Gaussian => ShapeKey::Gaussian,
                KernelShape::TailGaussian { exponent } => ShapeKey::Tail(exponent.to_bits()),
            },
            radius_x,
            radius_y,
        }
    }
}

/// Cache of generated kernels keyed by their full parameter tuple
///
/// Owned by a generation context and shared through `Arc`; independent
/// contexts never see each other's entries. Fills happen under the write
/// lock, reads only take the read lock.
#[derive(Debug, Default)]
pub struct KernelCache<T> {
    entries: RwLock<HashMap<KernelKey, Arc<Kernel<T>>>>,
}

impl<T: Precision> KernelCache<T> {
    /// Empty cache
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Kernel for `spec`, clamped so it fits `grid`
    pub fn get(&self, spec: &KernelSpec, grid: &Grid) -> Result<Arc<Kernel<T>>> {
        spec.validate()?;

        let radius = spec.radius();
        let radius_x = radius.min((grid.width() - 1) / 2);
        let radius_y = radius.min((grid.height() - 1) / 2);
        let key = KernelKey::new(spec, radius_x, radius_y);

        // Entries are never mutated after insertion, so a poisoned map is still consistent
        if let Some(kernel) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(kernel));
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(kernel) = entries.get(&key) {
            return Ok(Arc::clone(kernel));
        }

        let kernel = Arc::new(Kernel::build(spec, radius_x, radius_y)?);
        debug!(
            spread = spec.spread,
            radius,
            width = kernel.width(),
            height = kernel.height(),
            precision = T::NAME,
            "built kernel"
        );
        entries.insert(key, Arc::clone(&kernel));
        Ok(kernel)
    }

    /// Number of cached kernels
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True when nothing has been cached yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
