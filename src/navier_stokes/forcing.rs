//! # Forcing
//! Energy injection into the low wavenumber shells
//! `1 <= round(|k|) <= kf`.
//!
//! The forcing term is `Cf u` on those shells, which injects
//! the power `2 Cf E_f` (`E_f`: energy of the forced shells).
//! How `Cf` follows from `E_f` is the forcing law.
use crate::error::Result;
use crate::field::{Decomp, VectorField};
use crate::grid::Grid;
use crate::statistics::shell;
use ndarray::Zip;

/// Forcing coefficient from the energy of the forced shells
#[enum_dispatch]
pub trait ForcingLaw {
    /// Coefficient `Cf` for shell energy `ef`
    fn coefficient(&self, ef: f64) -> f64;
}

/// Collection of forcing laws
#[enum_dispatch(ForcingLaw)]
#[derive(Debug, Clone, PartialEq)]
pub enum Forcing {
    /// Constant injected power
    ConstantPower(ConstantPower),
    /// Decaying turbulence
    Unforced(Unforced),
}

/// Inject a constant power `eps`: `Cf = eps / (2 E_f)`
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantPower {
    /// Injected power
    pub power: f64,
}

impl ForcingLaw for ConstantPower {
    fn coefficient(&self, ef: f64) -> f64 {
        if ef > 0. && ef.is_finite() {
            self.power / (2. * ef)
        } else {
            0.
        }
    }
}

/// No forcing, `Cf = 0`
#[derive(Debug, Clone, PartialEq)]
pub struct Unforced;

impl ForcingLaw for Unforced {
    fn coefficient(&self, _ef: f64) -> f64 {
        0.
    }
}

impl Forcing {
    /// Constant power if `forcing` is set, else unforced
    pub fn new(forcing: bool, power: f64) -> Self {
        if forcing {
            ConstantPower { power }.into()
        } else {
            Unforced.into()
        }
    }
}

/// Add `cf * u` to `rhs` on the shells `1..=kf`
///
/// # Errors
/// A field is not in `YSlab` decomposition.
pub fn apply(grid: &Grid, u: &VectorField, rhs: &mut VectorField, cf: f64, kf: usize) -> Result<()> {
    u.expect_decomp(Decomp::YSlab)?;
    rhs.expect_decomp(Decomp::YSlab)?;
    if cf == 0. {
        return Ok(());
    }
    for (r, u) in rhs.components_mut().into_iter().zip(u.components()) {
        Zip::indexed(r).and(u).par_for_each(|(j, l, i), r, &u| {
            let s = shell(&grid.k_yslab(j, l, i));
            if s >= 1 && s <= kf {
                *r += u * cf;
            }
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Complex64;

    #[test]
    fn test_constant_power() {
        let forcing = Forcing::new(true, 0.5);
        assert_eq!(forcing.coefficient(0.25), 1.);
        // injected power 2 Cf Ef equals eps
        let ef = 0.37;
        assert!((2. * forcing.coefficient(ef) * ef - 0.5).abs() < 1e-14);
        assert_eq!(forcing.coefficient(0.), 0.);
        assert_eq!(forcing.coefficient(f64::NAN), 0.);
    }

    #[test]
    fn test_unforced() {
        let forcing = Forcing::new(false, 0.5);
        assert_eq!(forcing, Forcing::Unforced(Unforced));
        assert_eq!(forcing.coefficient(1.), 0.);
    }

    #[test]
    fn test_apply_on_shells() {
        let grid = Grid::new(8, 1, 0).unwrap();
        let mut u = VectorField::spectral(&grid);
        for c in u.components_mut() {
            c.fill(Complex64::new(1., 1.));
        }
        let mut rhs = VectorField::spectral(&grid);
        apply(&grid, &u, &mut rhs, 2., 1).unwrap();
        // (ky, kz, kx)
        assert_eq!(rhs.x[[0, 0, 1]], Complex64::new(2., 2.));
        assert_eq!(rhs.y[[1, 0, 0]], Complex64::new(2., 2.));
        assert_eq!(rhs.z[[0, 0, 0]], Complex64::new(0., 0.));
        assert_eq!(rhs.z[[1, 1, 1]], Complex64::new(0., 0.));
    }
}
