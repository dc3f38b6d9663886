//! # Vector fields
//! Three component arrays (x, y, z) that are always
//! transformed and transposed together.
//!
//! `VectorField` holds spectral (complex) data,
//! `PhysicalField` holds real data in physical space.
//! Both carry a [`Decomp`] tag, which is checked by every
//! transform and transpose, so that a field in the wrong
//! orientation is rejected instead of silently misread.
pub mod io;
use crate::error::{Error, Result};
use crate::grid::Grid;
use crate::types::Complex64;
use ndarray::{Array3, Zip};
use num_traits::Zero;

/// Distribution of a field across processes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decomp {
    /// Distributed along x, memory order (x, y, z)
    XSlab,
    /// Distributed along ky, memory order (ky, kz, kx)
    YSlab,
}

/// Field with three components (spectral)
pub type VectorField = VectorFieldBase<Complex64>;

/// Field with three components (physical)
pub type PhysicalField = VectorFieldBase<f64>;

/// Three equally shaped component arrays plus decomposition tag
///
/// `x, y, z`: ndarray
///
///   Local data of the velocity components
///
/// `decomp`: `Decomp`
///
///   Current distribution, changed by transposes only
#[derive(Debug, Clone, PartialEq)]
pub struct VectorFieldBase<T> {
    /// x component
    pub x: Array3<T>,
    /// y component
    pub y: Array3<T>,
    /// z component
    pub z: Array3<T>,
    decomp: Decomp,
}

impl<T: Clone + Zero> VectorFieldBase<T> {
    /// Zero field of local `shape`
    pub fn zeros(shape: [usize; 3], decomp: Decomp) -> Self {
        Self {
            x: Array3::zeros(shape),
            y: Array3::zeros(shape),
            z: Array3::zeros(shape),
            decomp,
        }
    }

    /// Set all components to zero
    pub fn set_zero(&mut self) {
        for c in self.components_mut() {
            c.fill(T::zero());
        }
    }
}

impl<T> VectorFieldBase<T> {
    /// Current decomposition
    pub fn decomp(&self) -> Decomp {
        self.decomp
    }

    /// Local shape of the components
    pub fn shape(&self) -> [usize; 3] {
        let s = self.x.shape();
        [s[0], s[1], s[2]]
    }

    /// Components as array
    pub fn components(&self) -> [&Array3<T>; 3] {
        [&self.x, &self.y, &self.z]
    }

    /// Mutable components as array
    pub fn components_mut(&mut self) -> [&mut Array3<T>; 3] {
        [&mut self.x, &mut self.y, &mut self.z]
    }

    /// Return error if field is not in decomposition `expected`
    ///
    /// # Errors
    /// Decomposition mismatch
    pub fn expect_decomp(&self, expected: Decomp) -> Result<()> {
        if self.decomp == expected {
            Ok(())
        } else {
            Err(Error::Layout {
                expected,
                found: self.decomp,
            })
        }
    }

    /// Return error if any component deviates from `shape`
    ///
    /// # Errors
    /// Shape mismatch
    pub fn expect_shape(&self, shape: [usize; 3]) -> Result<()> {
        for c in self.components() {
            if c.shape() != shape {
                return Err(Error::Shape {
                    expected: shape.to_vec(),
                    found: c.shape().to_vec(),
                });
            }
        }
        Ok(())
    }
}

impl<T: Copy + Send + Sync> VectorFieldBase<T> {
    /// Copy data and decomposition of `other`
    ///
    /// # Errors
    /// Shape mismatch
    pub fn assign(&mut self, other: &Self) -> Result<()> {
        self.expect_shape(other.shape())?;
        for (c, o) in self.components_mut().into_iter().zip(other.components()) {
            Zip::from(c).and(o).par_for_each(|c, &o| *c = o);
        }
        self.decomp = other.decomp;
        Ok(())
    }
}

impl VectorField {
    /// Spectral field in `YSlab` distribution
    pub fn spectral(grid: &Grid) -> Self {
        Self::zeros(grid.shape_yslab(), Decomp::YSlab)
    }

    /// Spectral field in `XSlab` distribution (intermediate
    /// state of the transform pipeline)
    pub fn spectral_xslab(grid: &Grid) -> Self {
        Self::zeros(grid.shape_xslab(), Decomp::XSlab)
    }

    /// True if all coefficients are finite
    pub fn is_finite(&self) -> bool {
        self.components()
            .iter()
            .all(|c| c.iter().all(crate::types::is_finite))
    }
}

impl PhysicalField {
    /// Real field in physical space (`XSlab`)
    pub fn physical(grid: &Grid) -> Self {
        Self::zeros(grid.shape_physical(), Decomp::XSlab)
    }

    /// Fill components from a function of the global
    /// coordinates (x, y, z) -> [ux, uy, uz]
    pub fn from_fn<F>(grid: &Grid, f: F) -> Self
    where
        F: Fn(f64, f64, f64) -> [f64; 3] + Sync,
    {
        let mut field = Self::physical(grid);
        let PhysicalField { x, y, z, .. } = &mut field;
        Zip::indexed(x)
            .and(y)
            .and(z)
            .par_for_each(|(i, j, k), ux, uy, uz| {
                let u = f(grid.coord(grid.x0 + i), grid.coord(j), grid.coord(k));
                *ux = u[0];
                *uy = u[1];
                *uz = u[2];
            });
        field
    }

    /// Local maximum of the absolute value per component,
    /// `NaN` if a component holds a `NaN`
    pub fn max_abs(&self) -> [f64; 3] {
        let m = |c: &Array3<f64>| {
            c.iter().fold(0f64, |acc, v| {
                if acc.is_nan() || v.is_nan() {
                    f64::NAN
                } else {
                    acc.max(v.abs())
                }
            })
        };
        [m(&self.x), m(&self.y), m(&self.z)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decomp_check() {
        let grid = Grid::new(8, 2, 1).unwrap();
        let field = VectorField::spectral(&grid);
        assert!(field.expect_decomp(Decomp::YSlab).is_ok());
        assert!(matches!(
            field.expect_decomp(Decomp::XSlab),
            Err(Error::Layout { .. })
        ));
        assert!(field.expect_shape(grid.shape_xslab()).is_err());
    }

    #[test]
    fn test_assign_mismatch_leaves_field() {
        let grid = Grid::new(8, 1, 0).unwrap();
        let mut a = VectorField::spectral(&grid);
        let b = VectorField::spectral_xslab(&grid);
        assert!(a.assign(&b).is_err());
        assert_eq!(a.decomp(), Decomp::YSlab);
    }

    #[test]
    fn test_from_fn_uses_global_coords() {
        let grid = Grid::new(8, 2, 1).unwrap();
        let field = PhysicalField::from_fn(&grid, |x, y, z| [x, y, z]);
        assert!((field.x[[0, 0, 0]] - grid.coord(4)).abs() < 1e-14);
        assert!((field.y[[0, 3, 0]] - grid.coord(3)).abs() < 1e-14);
        assert!((field.z[[1, 0, 5]] - grid.coord(5)).abs() < 1e-14);
        assert_eq!(field.max_abs()[0], grid.coord(7));
    }
}
