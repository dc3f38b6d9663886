//! # Step size control
//! `dt = min(max_dt, cfl dx / (|ux|max + |uy|max + |uz|max))`,
//! clipped so that a run ends exactly at its end time.
use crate::error::{Error, Result};

/// Courant number based step size policy
#[derive(Debug, Clone, PartialEq)]
pub struct StepControl {
    /// Target Courant number
    pub cfl: f64,
    /// Upper bound of dt
    pub max_dt: f64,
    /// Grid spacing
    pub dx: f64,
}

impl StepControl {
    /// New policy
    pub fn new(cfl: f64, max_dt: f64, dx: f64) -> Self {
        Self { cfl, max_dt, dx }
    }

    /// Courant number of velocity maxima `umax` at step size `dt`
    pub fn courant(&self, umax: [f64; 3], dt: f64) -> f64 {
        umax.iter().sum::<f64>() * dt / self.dx
    }

    /// Largest step size the Courant bound allows, `None`
    /// for a fluid at rest
    pub fn bound(&self, umax: [f64; 3]) -> Option<f64> {
        let sum: f64 = umax.iter().sum();
        if sum > 0. {
            Some(self.cfl * self.dx / sum)
        } else {
            None
        }
    }

    /// Step size for global velocity maxima `umax`, at most
    /// `remaining` (time left until the end of the run).
    ///
    /// # Errors
    /// `umax` is not finite; `rank` and `time` go into the error.
    pub fn select(&self, umax: [f64; 3], remaining: f64, rank: usize, time: f64) -> Result<f64> {
        if umax.iter().any(|u| !u.is_finite()) {
            return Err(Error::NumericalInstability {
                quantity: "velocity maximum",
                rank,
                time,
            });
        }
        let mut dt = self.bound(umax).map_or(self.max_dt, |b| b.min(self.max_dt));
        if remaining > 0. && remaining < dt {
            dt = remaining;
        }
        Ok(dt)
    }
}
