//! MPI Routines
//!
//! Thin wrapper around the world communicator of `rsmpi`.
//! Only the thread that initialized MPI issues calls
//! (`Threading::Funneled`); the transpose pipeline keeps
//! its worker threads free of MPI.
#![cfg(feature = "mpi")]
use crate::comm::{check_all_gather, check_all_to_all, check_reduce, Comm};
use crate::error::{Error, Result};
pub use mpi::environment::Universe;
use mpi::collective::SystemOperation;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;
use mpi::Threading;

/// Initialize MPI with funneled threading support.
///
/// # Errors
/// MPI was already initialized, or the library does not
/// provide the requested threading level.
pub fn initialize() -> Result<Universe> {
    let (universe, threading) = mpi::initialize_with_threading(Threading::Funneled)
        .ok_or_else(|| Error::Comm("MPI was already initialized".to_owned()))?;
    if matches!(threading, Threading::Single) {
        return Err(Error::Comm(
            "MPI library provides no thread support, need Funneled".to_owned(),
        ));
    }
    Ok(universe)
}

/// MPI world communicator
pub struct MpiComm {
    world: SimpleCommunicator,
}

impl MpiComm {
    /// Wrap the world communicator of an initialized universe
    pub fn new(universe: &Universe) -> Self {
        Self {
            world: universe.world(),
        }
    }
}

impl Comm for MpiComm {
    #[allow(clippy::cast_sign_loss)]
    fn rank(&self) -> usize {
        self.world.rank() as usize
    }

    #[allow(clippy::cast_sign_loss)]
    fn size(&self) -> usize {
        self.world.size() as usize
    }

    fn all_to_all(&self, send: &[f64], recv: &mut [f64]) -> Result<()> {
        check_all_to_all(self.size(), send, recv)?;
        self.world.all_to_all_into(send, recv);
        Ok(())
    }

    fn all_gather(&self, send: &[f64], recv: &mut [f64]) -> Result<()> {
        check_all_gather(self.size(), send, recv)?;
        self.world.all_gather_into(send, recv);
        Ok(())
    }

    fn all_reduce_sum(&self, local: &[f64], global: &mut [f64]) -> Result<()> {
        check_reduce(local, global)?;
        self.world
            .all_reduce_into(local, global, SystemOperation::sum());
        Ok(())
    }

    fn all_reduce_max(&self, local: &[f64], global: &mut [f64]) -> Result<()> {
        check_reduce(local, global)?;
        self.world
            .all_reduce_into(local, global, SystemOperation::max());
        Ok(())
    }

    fn barrier(&self) {
        self.world.barrier();
    }

    fn abort(&self, code: i32) -> ! {
        self.world.abort(code)
    }
}
