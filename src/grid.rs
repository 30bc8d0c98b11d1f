//! Toroidal grid geometry.

use crate::error::{Result, VoidClusterError};

/// Fixed width × height torus, cells indexed row-major
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Grid {
    width: usize,
    height: usize,
}

impl Grid {
    /// Create a grid, rejecting zero dimensions and areas that overflow
    pub fn new(width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(VoidClusterError::invalid(format!(
                "width and height must be positive, got {}x{}",
                width, height
            )));
        }
        // Ranks are stored as u32
        let area = width
            .checked_mul(height)
            .filter(|&area| area <= u32::MAX as usize)
            .ok_or_else(|| {
                VoidClusterError::invalid(format!("{}x{} grid is too large", width, height))
            })?;
        debug_assert!(area > 0);
        Ok(Self { width, height })
    }

    /// Width in cells
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in cells
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of cells
    #[inline]
    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// Row-major index of `(x, y)`
    #[inline]
    pub fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// `(x, y)` of a row-major index
    #[inline]
    pub fn coords(&self, idx: usize) -> (usize, usize) {
        (idx % self.width, idx / self.width)
    }

    /// Wrap a signed column offset onto the torus
    #[inline]
    pub fn wrap_x(&self, x: isize) -> usize {
        x.rem_euclid(self.width as isize) as usize
    }

    /// Wrap a signed row offset onto the torus
    #[inline]
    pub fn wrap_y(&self, y: isize) -> usize {
        y.rem_euclid(self.height as isize) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_dimensions() {
        assert!(matches!(
            Grid::new(0, 8),
            Err(VoidClusterError::InvalidArgument(_))
        ));
        assert!(Grid::new(8, 0).is_err());
        assert!(Grid::new(1, 1).is_ok());
    }

    #[test]
    fn test_index_round_trip_and_wrapping() {
        let grid = Grid::new(5, 3).unwrap();
        assert_eq!(grid.area(), 15);
        assert_eq!(grid.index(4, 2), 14);
        assert_eq!(grid.coords(14), (4, 2));
        assert_eq!(grid.wrap_x(-1), 4);
        assert_eq!(grid.wrap_x(5), 0);
        assert_eq!(grid.wrap_y(-4), 2);
    }
}
