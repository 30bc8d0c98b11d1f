//! Binary sample patterns and the live sample index set.

use crate::error::{Result, VoidClusterError};
use crate::grid::Grid;
use rand::Rng;

/// N cells in {0, 1}, 1 meaning a sample is present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryPattern {
    grid: Grid,
    cells: Vec<u8>,
    ones: usize,
}

impl BinaryPattern {
    /// Pattern with every cell cleared
    pub fn empty(grid: Grid) -> Self {
        Self {
            grid,
            cells: vec![0; grid.area()],
            ones: 0,
        }
    }

    /// Pattern with the first `count` cells (row-major) set
    pub fn with_prefix(grid: Grid, count: usize) -> Result<Self> {
        if count > grid.area() {
            return Err(VoidClusterError::invalid(format!(
                "cannot set {} cells on a grid of {}",
                count,
                grid.area()
            )));
        }
        let mut cells = vec![0; grid.area()];
        cells[..count].fill(1);
        Ok(Self {
            grid,
            cells,
            ones: count,
        })
    }

    /// Wrap existing cell values, which must all be 0 or 1
    pub fn from_cells(grid: Grid, cells: Vec<u8>) -> Result<Self> {
        if cells.len() != grid.area() {
            return Err(VoidClusterError::shape(format!(
                "pattern has {} cells, grid expects {}",
                cells.len(),
                grid.area()
            )));
        }
        if let Some(pos) = cells.iter().position(|&c| c > 1) {
            return Err(VoidClusterError::invalid(format!(
                "pattern cell {} holds {}, expected 0 or 1",
                pos, cells[pos]
            )));
        }
        let ones = cells.iter().map(|&c| c as usize).sum();
        Ok(Self { grid, cells, ones })
    }

    /// Fisher–Yates shuffle: for i from N-1 down to 1, swap with uniform j ≤ i
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for i in (1..self.cells.len()).rev() {
            let j = rng.random_range(0..=i);
            self.cells.swap(i, j);
        }
    }

    /// Grid the pattern lives on
    #[inline]
    pub fn grid(&self) -> Grid {
        self.grid
    }

    /// Raw cell values
    #[inline]
    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    /// Whether `idx` holds a sample
    #[inline]
    pub fn is_set(&self, idx: usize) -> bool {
        self.cells[idx] == 1
    }

    /// Number of set cells
    #[inline]
    pub fn ones(&self) -> usize {
        self.ones
    }

    /// Number of cleared cells
    #[inline]
    pub fn zeros(&self) -> usize {
        self.cells.len() - self.ones
    }

    /// Set `idx`; it must currently be clear
    #[inline]
    pub fn set(&mut self, idx: usize) {
        debug_assert_eq!(self.cells[idx], 0, "cell {} already set", idx);
        self.cells[idx] = 1;
        self.ones += 1;
    }

    /// Clear `idx`; it must currently be set
    #[inline]
    pub fn clear(&mut self, idx: usize) {
        debug_assert_eq!(self.cells[idx], 1, "cell {} already clear", idx);
        self.cells[idx] = 0;
        self.ones -= 1;
    }

    /// Complement: every set cell cleared and every clear cell set
    pub fn inverted(&self) -> Self {
        Self {
            grid: self.grid,
            cells: self.cells.iter().map(|&c| 1 - c).collect(),
            ones: self.zeros(),
        }
    }

    /// Indices of every set cell, ascending
    pub fn live_samples(&self) -> LiveSamples {
        LiveSamples {
            indices: self
                .cells
                .iter()
                .enumerate()
                .filter(|&(_, &c)| c == 1)
                .map(|(i, _)| i)
                .collect(),
        }
    }
}

/// Ascending list of the indices currently set in a pattern
///
/// Scanning it in order visits samples in row-major order, so an argmax over
/// it breaks ties the same way a full forward scan of the grid would.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSamples {
    indices: Vec<usize>,
}

impl LiveSamples {
    /// Sample indices in ascending order
    #[inline]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Number of live samples
    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// True once every sample has been removed
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Remove the entry at `position`, keeping the rest ordered, and return its cell index
    pub fn remove_at(&mut self, position: usize) -> usize {
        self.indices.remove(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    #[test]
    fn test_prefix_and_shuffle_preserve_count() {
        let grid = Grid::new(8, 8).unwrap();
        let mut pattern = BinaryPattern::with_prefix(grid, 6).unwrap();
        assert_eq!(pattern.ones(), 6);
        assert!(pattern.cells()[..6].iter().all(|&c| c == 1));

        let mut rng = ChaCha12Rng::seed_from_u64(7);
        pattern.shuffle(&mut rng);

        assert_eq!(pattern.ones(), 6);
        assert_eq!(pattern.cells().iter().filter(|&&c| c == 1).count(), 6);
        assert_eq!(pattern.zeros(), 58);
    }

    #[test]
    fn test_shuffle_deterministic() {
        let grid = Grid::new(16, 16).unwrap();
        let mut a = BinaryPattern::with_prefix(grid, 25).unwrap();
        let mut b = a.clone();

        a.shuffle(&mut ChaCha12Rng::seed_from_u64(42));
        b.shuffle(&mut ChaCha12Rng::seed_from_u64(42));
        assert_eq!(a, b);

        let mut c = BinaryPattern::with_prefix(grid, 25).unwrap();
        c.shuffle(&mut ChaCha12Rng::seed_from_u64(43));
        assert_ne!(a, c);
    }

    #[test]
    fn test_from_cells_validation() {
        let grid = Grid::new(2, 2).unwrap();
        assert!(matches!(
            BinaryPattern::from_cells(grid, vec![0, 1, 0]),
            Err(VoidClusterError::ShapeMismatch(_))
        ));
        assert!(matches!(
            BinaryPattern::from_cells(grid, vec![0, 1, 2, 0]),
            Err(VoidClusterError::InvalidArgument(_))
        ));
        let pattern = BinaryPattern::from_cells(grid, vec![0, 1, 1, 0]).unwrap();
        assert_eq!(pattern.ones(), 2);
        assert!(BinaryPattern::with_prefix(grid, 5).is_err());
    }

    #[test]
    fn test_inverted_swaps_cells() {
        let grid = Grid::new(3, 2).unwrap();
        let pattern = BinaryPattern::from_cells(grid, vec![1, 0, 0, 1, 1, 0]).unwrap();
        let inverted = pattern.inverted();

        assert_eq!(inverted.cells(), &[0, 1, 1, 0, 0, 1]);
        assert_eq!(inverted.ones(), 3);
        assert_eq!(inverted.inverted(), pattern);
        assert_eq!(BinaryPattern::empty(grid).inverted().ones(), 6);
    }

    #[test]
    fn test_live_samples_stay_ordered() {
        let grid = Grid::new(4, 4).unwrap();
        let mut pattern = BinaryPattern::empty(grid);
        for idx in [9, 2, 14, 5] {
            pattern.set(idx);
        }

        let mut live = pattern.live_samples();
        assert_eq!(live.indices(), &[2, 5, 9, 14]);

        assert_eq!(live.remove_at(1), 5);
        assert_eq!(live.indices(), &[2, 9, 14]);
        assert_eq!(live.len(), 3);

        pattern.clear(5);
        assert_eq!(pattern.live_samples(), live);
    }
}
