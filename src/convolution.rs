/**
 * Toroidal Convolution Engine
 *
 * The energy map is the binary pattern convolved with a kernel on a torus:
 *
 *   energy[x, y] = Σ pattern[(x + dx) mod W, (y + dy) mod H] · kernel[dx, dy]
 *
 * where (dx, dy) ranges over the kernel footprint centred on its middle
 * cell. High energy marks a cluster, low energy a void.
 *
 * INCREMENTAL UPDATES
 * ===================
 * Convolution is linear, so changing one pattern cell by `amount` changes
 * the energy map by `amount` times the kernel footprint around that cell.
 * `delta_update` applies exactly that in O(kernel area), which keeps the
 * per-step cost of the void-and-cluster loops independent of grid size.
 * A full convolution is only needed once per setup.
 *
 * FFT STRATEGY
 * ============
 * The full convolution can also be done in the frequency domain, where it
 * becomes element-wise multiplication. The kernel is embedded in a grid-sized
 * torus, so the circular convolution matches the direct sum up to rounding.
 * Rounding differences can flip exact ties, so the direct strategy remains
 * the default for reproducible ranks.
 */

use crate::grid::Grid;
use crate::kernel::Kernel;
use crate::pattern::{BinaryPattern, LiveSamples};
use crate::precision::Precision;
use rustfft::num_complex::Complex;
use rustfft::{FftDirection, FftPlanner};
use serde::{Deserialize, Serialize};

/// How the full convolution is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvolutionStrategy {
    /// Spatial-domain sum over the kernel footprint
    #[default]
    Direct,
    /// Frequency-domain multiplication via 2-D FFT
    Fft,
}

/// Blurred view of a binary pattern
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyMap<T> {
    grid: Grid,
    values: Vec<T>,
}

impl<T: Precision> EnergyMap<T> {
    /// Energy map of a grid with no samples
    pub fn zeros(grid: Grid) -> Self {
        Self {
            grid,
            values: vec![T::zero(); grid.area()],
        }
    }

    /// Grid the map covers
    #[inline]
    pub fn grid(&self) -> Grid {
        self.grid
    }

    /// Row-major energy values
    #[inline]
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Energy at `idx`
    #[inline]
    pub fn get(&self, idx: usize) -> T {
        self.values[idx]
    }

    /// Overwrite this map with another of the same grid
    pub fn restore_from(&mut self, snapshot: &EnergyMap<T>) {
        debug_assert_eq!(self.grid, snapshot.grid);
        self.values.copy_from_slice(&snapshot.values);
    }

    /**
     * Find the tightest cluster: set cell with the highest energy
     *
     * Ties go to the first index in a forward row-major scan.
     */
    pub fn find_tightest_cluster(&self, pattern: &BinaryPattern) -> Option<usize> {
        let mut max_energy = T::neg_infinity();
        let mut max_idx = None;

        for (i, (&energy, &cell)) in self.values.iter().zip(pattern.cells()).enumerate() {
            if cell == 1 && energy > max_energy {
                max_energy = energy;
                max_idx = Some(i);
            }
        }

        max_idx
    }

    /**
     * Find the largest void: clear cell with the lowest energy
     *
     * Ties go to the first index in a forward row-major scan.
     */
    pub fn find_largest_void(&self, pattern: &BinaryPattern) -> Option<usize> {
        let mut min_energy = T::infinity();
        let mut min_idx = None;

        for (i, (&energy, &cell)) in self.values.iter().zip(pattern.cells()).enumerate() {
            if cell == 0 && energy < min_energy {
                min_energy = energy;
                min_idx = Some(i);
            }
        }

        min_idx
    }

    /// Position within `live` of the highest-energy sample, scanning only the live set
    pub fn find_tightest_live(&self, live: &LiveSamples) -> Option<usize> {
        let mut max_energy = T::neg_infinity();
        let mut max_pos = None;

        for (pos, &idx) in live.indices().iter().enumerate() {
            let energy = self.values[idx];
            if energy > max_energy {
                max_energy = energy;
                max_pos = Some(pos);
            }
        }

        max_pos
    }
}

/// Full toroidal convolution of a binary pattern
pub fn full_convolve<T: Precision>(pattern: &BinaryPattern, kernel: &Kernel<T>) -> EnergyMap<T> {
    let values: Vec<T> = pattern
        .cells()
        .iter()
        .map(|&c| if c == 1 { T::one() } else { T::zero() })
        .collect();
    convolve_values(pattern.grid(), &values, kernel)
}

/**
 * Full toroidal convolution of real-valued cells
 *
 * For every cell, sums the wrapped neighbours weighted by the kernel.
 * Cost O(N · kernel area). Column offsets are wrapped once per kernel
 * column rather than once per multiply.
 */
pub fn convolve_values<T: Precision>(grid: Grid, values: &[T], kernel: &Kernel<T>) -> EnergyMap<T> {
    debug_assert_eq!(values.len(), grid.area());

    let width = grid.width();
    let half_w = kernel.half_width() as isize;
    let half_h = kernel.half_height() as isize;

    // wrapped_cols[kx * width + x] = (x + kx - half_w) mod width
    let mut wrapped_cols = Vec::with_capacity(kernel.width() * width);
    for kx in 0..kernel.width() as isize {
        for x in 0..width as isize {
            wrapped_cols.push(grid.wrap_x(x + kx - half_w));
        }
    }

    let mut blurred = vec![T::zero(); grid.area()];

    for y in 0..grid.height() {
        let row = &mut blurred[y * width..(y + 1) * width];

        for ky in 0..kernel.height() {
            let src_y = grid.wrap_y(y as isize + ky as isize - half_h);
            let src_row = &values[src_y * width..(src_y + 1) * width];

            for kx in 0..kernel.width() {
                let weight = kernel.weight(kx, ky);
                let cols = &wrapped_cols[kx * width..(kx + 1) * width];

                for (out, &src_x) in row.iter_mut().zip(cols) {
                    *out = *out + src_row[src_x] * weight;
                }
            }
        }
    }

    EnergyMap {
        grid,
        values: blurred,
    }
}

/**
 * Incremental energy update for a single-cell change
 *
 * Adds `amount · kernel` to the footprint of every energy cell that sees
 * `idx`. After toggling `pattern[idx]` by `amount`, this leaves the map
 * equal (up to rounding) to a fresh `full_convolve` of the new pattern.
 * Cost O(kernel area), independent of grid size.
 */
pub fn delta_update<T: Precision>(energy: &mut EnergyMap<T>, kernel: &Kernel<T>, idx: usize, amount: T) {
    let grid = energy.grid;
    let (cx, cy) = grid.coords(idx);
    let half_w = kernel.half_width() as isize;
    let half_h = kernel.half_height() as isize;

    for ky in 0..kernel.height() {
        // Cell (x, y) reads pattern[x + dx, y + dy], so idx feeds (cx - dx, cy - dy)
        let y = grid.wrap_y(cy as isize - (ky as isize - half_h));
        let row = y * grid.width();

        for kx in 0..kernel.width() {
            let x = grid.wrap_x(cx as isize - (kx as isize - half_w));
            let cell = &mut energy.values[row + x];
            *cell = *cell + kernel.weight(kx, ky) * amount;
        }
    }
}

/// Full convolution with the chosen strategy
pub fn convolve<T: Precision>(
    strategy: ConvolutionStrategy,
    pattern: &BinaryPattern,
    kernel: &Kernel<T>,
) -> EnergyMap<T> {
    match strategy {
        ConvolutionStrategy::Direct => full_convolve(pattern, kernel),
        ConvolutionStrategy::Fft => full_convolve_fft(pattern, kernel),
    }
}

/**
 * Full toroidal convolution in the frequency domain
 *
 * convolution(A, B) = IFFT(FFT(A) · FFT(B)). The kernel is laid onto a
 * grid-sized torus at the mirrored offsets so the circular convolution
 * reproduces the centred sum computed by `full_convolve`.
 */
pub fn full_convolve_fft<T: Precision>(pattern: &BinaryPattern, kernel: &Kernel<T>) -> EnergyMap<T> {
    let grid = pattern.grid();
    let half_w = kernel.half_width() as isize;
    let half_h = kernel.half_height() as isize;
    let mut planner = FftPlanner::<T>::new();

    let mut kernel_freq = vec![Complex::new(T::zero(), T::zero()); grid.area()];
    for ky in 0..kernel.height() {
        let y = grid.wrap_y(half_h - ky as isize);
        for kx in 0..kernel.width() {
            let x = grid.wrap_x(half_w - kx as isize);
            let slot = &mut kernel_freq[grid.index(x, y)].re;
            *slot = *slot + kernel.weight(kx, ky);
        }
    }
    fft_2d(&mut planner, grid, &mut kernel_freq, FftDirection::Forward);

    let mut data: Vec<Complex<T>> = pattern
        .cells()
        .iter()
        .map(|&c| Complex::new(if c == 1 { T::one() } else { T::zero() }, T::zero()))
        .collect();
    fft_2d(&mut planner, grid, &mut data, FftDirection::Forward);

    for (d, k) in data.iter_mut().zip(&kernel_freq) {
        *d = *d * *k;
    }
    fft_2d(&mut planner, grid, &mut data, FftDirection::Inverse);

    let scale = T::from_weight(grid.area() as f64);
    EnergyMap {
        grid,
        values: data.iter().map(|c| c.re / scale).collect(),
    }
}

/// In-place 2-D FFT: rows, then columns
fn fft_2d<T: Precision>(
    planner: &mut FftPlanner<T>,
    grid: Grid,
    data: &mut [Complex<T>],
    direction: FftDirection,
) {
    let (width, height) = (grid.width(), grid.height());

    let fft = planner.plan_fft(width, direction);
    for row in data.chunks_exact_mut(width) {
        fft.process(row);
    }

    let fft = planner.plan_fft(height, direction);
    let mut column = vec![Complex::new(T::zero(), T::zero()); height];
    for x in 0..width {
        for y in 0..height {
            column[y] = data[y * width + x];
        }
        fft.process(&mut column);
        for y in 0..height {
            data[y * width + x] = column[y];
        }
    }
}
