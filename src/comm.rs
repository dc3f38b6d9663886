//! # Communication layer
//!
//! All collectives the solver needs, behind one trait:
//! - [`crate::mpi::MpiComm`]: MPI world communicator (feature `mpi`)
//! - [`SerialComm`]: single process, no network
//! - [`ThreadComm`]: several ranks as threads of one process,
//!   used to exercise the distributed code paths in tests
//!
//! Every rank must enter the same collectives in the same
//! order, otherwise the run deadlocks.
pub mod thread;
use crate::error::{Error, Result};
pub use thread::{run_ranks, ThreadComm};

/// Collective operations on a group of processes
pub trait Comm {
    /// Rank of this process
    fn rank(&self) -> usize;

    /// Number of participating processes
    fn size(&self) -> usize;

    /// Personalised all-to-all exchange.
    ///
    /// `send` and `recv` are split into `size` equal blocks; block `r`
    /// of `send` goes to rank `r`, block `s` of `recv` comes from rank `s`.
    ///
    /// # Errors
    /// Buffer lengths differ or are not divisible by `size`.
    fn all_to_all(&self, send: &[f64], recv: &mut [f64]) -> Result<()>;

    /// Gather `send` of every rank into `recv` (rank order).
    ///
    /// # Errors
    /// `recv` is not `size` times as long as `send`.
    fn all_gather(&self, send: &[f64], recv: &mut [f64]) -> Result<()>;

    /// Elementwise sum over all ranks
    ///
    /// # Errors
    /// Buffer lengths differ.
    fn all_reduce_sum(&self, local: &[f64], global: &mut [f64]) -> Result<()>;

    /// Elementwise maximum over all ranks
    ///
    /// # Errors
    /// Buffer lengths differ.
    fn all_reduce_max(&self, local: &[f64], global: &mut [f64]) -> Result<()>;

    /// Block until all ranks arrived
    fn barrier(&self);

    /// Terminate all ranks
    fn abort(&self, code: i32) -> !;
}

/// Check buffer sizes of an all-to-all exchange
pub(crate) fn check_all_to_all(size: usize, send: &[f64], recv: &[f64]) -> Result<usize> {
    if send.len() != recv.len() || send.len() % size != 0 {
        return Err(Error::Comm(format!(
            "all_to_all: send {} / recv {} not split in {} equal blocks",
            send.len(),
            recv.len(),
            size
        )));
    }
    Ok(send.len() / size)
}

/// Check buffer sizes of an all-gather
pub(crate) fn check_all_gather(size: usize, send: &[f64], recv: &[f64]) -> Result<()> {
    if recv.len() != send.len() * size {
        return Err(Error::Comm(format!(
            "all_gather: recv {} != {} x send {}",
            recv.len(),
            size,
            send.len()
        )));
    }
    Ok(())
}

/// Check buffer sizes of a reduction
pub(crate) fn check_reduce(local: &[f64], global: &[f64]) -> Result<()> {
    if local.len() != global.len() {
        return Err(Error::Comm(format!(
            "reduce: local {} != global {}",
            local.len(),
            global.len()
        )));
    }
    Ok(())
}

/// Single process: every collective is a copy
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialComm;

impl Comm for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_to_all(&self, send: &[f64], recv: &mut [f64]) -> Result<()> {
        check_all_to_all(1, send, recv)?;
        recv.copy_from_slice(send);
        Ok(())
    }

    fn all_gather(&self, send: &[f64], recv: &mut [f64]) -> Result<()> {
        check_all_gather(1, send, recv)?;
        recv.copy_from_slice(send);
        Ok(())
    }

    fn all_reduce_sum(&self, local: &[f64], global: &mut [f64]) -> Result<()> {
        check_reduce(local, global)?;
        global.copy_from_slice(local);
        Ok(())
    }

    fn all_reduce_max(&self, local: &[f64], global: &mut [f64]) -> Result<()> {
        check_reduce(local, global)?;
        global.copy_from_slice(local);
        Ok(())
    }

    fn barrier(&self) {}

    fn abort(&self, code: i32) -> ! {
        std::process::exit(code)
    }
}
