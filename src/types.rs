//! Types for real and complex numbers
pub use num_complex::Complex64;
use num_traits::Zero;

/// Complex zero
pub const CZERO: Complex64 = Complex64 { re: 0., im: 0. };

/// Imaginary unit
pub const IMAG: Complex64 = Complex64 { re: 0., im: 1. };

/// True if real and imaginary part are finite
pub fn is_finite(c: &Complex64) -> bool {
    c.re.is_finite() && c.im.is_finite()
}

/// Buffer of complex zeros
pub(crate) fn czeros(n: usize) -> Vec<Complex64> {
    vec![Complex64::zero(); n]
}
