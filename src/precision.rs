//! Numeric precision policy for energy maps and kernels.
//!
//! Every buffer in the engine is generic over one [`Precision`] type, so the
//! same code path serves single- and double-precision generation.

use rustfft::num_traits::Float;
use rustfft::FftNum;
use std::fmt;
use std::iter::Sum;

/// Floating point type an energy map is stored in.
///
/// Kernels are always built in `f64` and narrowed once through
/// [`Precision::from_weight`], so the weights of an `f32` kernel are the
/// rounded `f64` weights rather than an independently accumulated table.
pub trait Precision: FftNum + Float + Default + Sum + fmt::Display {
    /// Short label used in logs
    const NAME: &'static str;

    /// Narrow an `f64` weight into this precision
    fn from_weight(value: f64) -> Self;

    /// Widen back to `f64`
    fn as_f64(self) -> f64;
}

impl Precision for f32 {
    const NAME: &'static str = "f32";

    #[inline]
    fn from_weight(value: f64) -> Self {
        value as f32
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl Precision for f64 {
    const NAME: &'static str = "f64";

    #[inline]
    fn from_weight(value: f64) -> Self {
        value
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self
    }
}
