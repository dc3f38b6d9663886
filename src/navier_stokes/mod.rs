//! Navier--Stokes solver for homogeneous isotropic turbulence
pub mod cfl;
pub mod forcing;
pub mod functions;
pub mod navier;
pub mod navier_io;
pub mod nonlinear;
pub mod rk;
pub use navier::Navier3D;
