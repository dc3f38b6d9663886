//! # `spectral-hit`: Pseudo-spectral solver for homogeneous isotropic turbulence
//!<img align="right" src="https://rustacean.net/assets/cuddlyferris.png" width="80">
//!
//! # Dependencies
//! - cargo >= v1.65
//! - `hdf5` (sudo apt-get install -y libhdf5-dev), feature `hdf5`
//! - mpi installation and libclang, feature `mpi`
//!
//! Both features are enabled by default. Without `mpi` the
//! solver runs on a single process, without `hdf5` no
//! checkpoints can be read or written.
//!
//! # Details
//!
//! The incompressible Navier-Stokes equations are solved in
//! rotational form in a periodic box `(2 pi)^3` with `n^3`
//! points. The velocity is advanced in Fourier space:
//! - the nonlinear term is evaluated in physical space and
//!   dealiased with the 2/3 rule, see [`navier_stokes::nonlinear`]
//! - the viscous term is integrated exactly (integrating factor),
//!   time stepping is RK2 or RK3, see [`navier_stokes::rk`]
//! - energy is injected at a constant rate into the lowest
//!   wavenumber shells, see [`navier_stokes::forcing`]
//!
//! The box is split into slabs along x in physical space and
//! along ky in Fourier space. The 3D transform ([`fft`]) needs a
//! single global transpose per direction ([`transpose`]), whose
//! exchange overlaps with packing, unpacking and the 1D transforms
//! of neighbouring planes.
//!
//! # Example
//! Run forced turbulence (`cargo mpirun --np 2 --bin spectral-hit -- run.toml`)
//! ```ignore
//! use spectral_hit::config::RunConfig;
//! use spectral_hit::mpi::{initialize, MpiComm};
//! use spectral_hit::navier_stokes::Navier3D;
//! use spectral_hit::integrate;
//!
//! fn main() {
//!     let universe = initialize().unwrap();
//!     let config = RunConfig::from_file("run.toml").unwrap();
//!     let mut navier = Navier3D::new(MpiComm::new(&universe), config.clone()).unwrap();
//!     integrate(&mut navier, config.time, Some(config.stats_every)).unwrap();
//!     navier.write_checkpoint().unwrap();
//! }
//! ```
//!
//! ## Documentation
//!
//! Download and run:
//!
//! `cargo doc --open`
#![warn(missing_docs)]
#![allow(clippy::unnecessary_cast)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#[macro_use]
extern crate enum_dispatch;
pub mod comm;
pub mod config;
pub mod context;
pub mod dealias;
pub mod error;
pub mod fft;
pub mod field;
pub mod grid;
pub mod io;
pub mod mpi;
pub mod navier_stokes;
pub mod statistics;
pub mod transpose;
pub mod types;
pub use error::{Error, Result};

const MAX_TIMESTEP: usize = 10_000_000;

/// Integrate trait, step forward in time, and write results
pub trait Integrate {
    /// Update solution
    ///
    /// # Errors
    /// The step failed, the state is unusable afterwards.
    fn update(&mut self) -> Result<()>;
    /// Receive current time
    fn get_time(&self) -> f64;
    /// Callback function (can be used for i/o)
    ///
    /// # Errors
    /// Output failed or diagnostics are not finite.
    fn callback(&mut self) -> Result<()>;
    /// Additional break criteria, must agree on all ranks
    fn exit(&mut self) -> bool;
    /// Rank of this process
    fn nrank(&self) -> usize;
}

/// Integrade pde, that implements the Integrate trait.
///
/// The callback runs for the initial state and every
/// `stats_every` steps. Returns the number of steps taken.
///
/// Stop Criteria:
/// 1. Timestep limit
/// 2. Time limit
/// 3. [`Integrate::exit`]
///
/// # Errors
/// First error of `update` or `callback`.
pub fn integrate<T: Integrate>(
    pde: &mut T,
    max_time: f64,
    stats_every: Option<usize>,
) -> Result<usize> {
    let mut timestep: usize = 0;
    let eps_time = max_time * 1e-12;
    if stats_every.is_some() {
        pde.callback()?;
    }
    loop {
        // Update
        pde.update()?;
        timestep += 1;

        // Save
        if let Some(every) = stats_every {
            if timestep % every == 0 {
                pde.callback()?;
            }
        }

        // Break
        if pde.get_time() + eps_time >= max_time {
            if pde.nrank() == 0 {
                tracing::info!("time limit reached: {:?}", pde.get_time());
            }
            break;
        }
        if timestep >= MAX_TIMESTEP {
            if pde.nrank() == 0 {
                tracing::info!("timestep limit reached: {:?}", timestep);
            }
            break;
        }
        if pde.exit() {
            if pde.nrank() == 0 {
                tracing::info!("break criteria triggered");
            }
            break;
        }
    }
    Ok(timestep)
}
