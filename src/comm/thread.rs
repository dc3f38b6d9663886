//! In-process communicator.
//!
//! Every rank is a thread; collectives meet in a shared mailbox
//! guarded by a barrier. Reductions are evaluated in rank order,
//! so results do not depend on thread scheduling.
use super::{check_all_gather, check_all_to_all, check_reduce, Comm};
use crate::error::{Error, Result};
use std::sync::{Arc, Barrier, Mutex};

struct Shared {
    size: usize,
    barrier: Barrier,
    /// `size * size` mailboxes, index `src * size + dst`
    slots: Mutex<Vec<Vec<f64>>>,
}

/// One rank of a group of threads
#[derive(Clone)]
pub struct ThreadComm {
    rank: usize,
    shared: Arc<Shared>,
}

impl ThreadComm {
    /// Create communicators for a group of `size` ranks.
    ///
    /// # Panics
    /// If `size` is zero.
    pub fn group(size: usize) -> Vec<ThreadComm> {
        assert!(size > 0, "group must have at least one rank");
        let shared = Arc::new(Shared {
            size,
            barrier: Barrier::new(size),
            slots: Mutex::new(vec![Vec::new(); size * size]),
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect()
    }

    /// Deposit messages, wait for all ranks, collect, wait again
    /// (so the mailbox can be reused by the next collective).
    fn exchange<D, C>(&self, deposit: D, collect: C) -> Result<()>
    where
        D: FnOnce(&mut [Vec<f64>]),
        C: FnOnce(&[Vec<f64>]),
    {
        {
            let mut slots = self.lock()?;
            deposit(&mut slots);
        }
        self.shared.barrier.wait();
        {
            let slots = self.lock()?;
            collect(&slots);
        }
        self.shared.barrier.wait();
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Vec<f64>>>> {
        self.shared
            .slots
            .lock()
            .map_err(|_| Error::Comm(format!("rank {}: mailbox poisoned", self.rank)))
    }

    fn reduce<F>(&self, local: &[f64], global: &mut [f64], op: F) -> Result<()>
    where
        F: Fn(f64, f64) -> f64,
    {
        check_reduce(local, global)?;
        let (rank, size) = (self.rank, self.shared.size);
        self.exchange(
            |slots| slots[rank * size] = local.to_vec(),
            |slots| {
                global.copy_from_slice(&slots[0]);
                for src in 1..size {
                    for (g, v) in global.iter_mut().zip(slots[src * size].iter()) {
                        *g = op(*g, *v);
                    }
                }
            },
        )
    }
}

impl Comm for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn all_to_all(&self, send: &[f64], recv: &mut [f64]) -> Result<()> {
        let (rank, size) = (self.rank, self.shared.size);
        let block = check_all_to_all(size, send, recv)?;
        self.exchange(
            |slots| {
                for (dst, chunk) in send.chunks(block.max(1)).enumerate().take(size) {
                    slots[rank * size + dst] = chunk.to_vec();
                }
            },
            |slots| {
                for (src, chunk) in recv.chunks_mut(block.max(1)).enumerate().take(size) {
                    chunk.copy_from_slice(&slots[src * size + rank]);
                }
            },
        )
    }

    fn all_gather(&self, send: &[f64], recv: &mut [f64]) -> Result<()> {
        let (rank, size) = (self.rank, self.shared.size);
        check_all_gather(size, send, recv)?;
        let block = send.len();
        self.exchange(
            |slots| slots[rank * size] = send.to_vec(),
            |slots| {
                for (src, chunk) in recv.chunks_mut(block.max(1)).enumerate().take(size) {
                    chunk.copy_from_slice(&slots[src * size]);
                }
            },
        )
    }

    fn all_reduce_sum(&self, local: &[f64], global: &mut [f64]) -> Result<()> {
        self.reduce(local, global, |a, b| a + b)
    }

    fn all_reduce_max(&self, local: &[f64], global: &mut [f64]) -> Result<()> {
        self.reduce(local, global, f64::max)
    }

    fn barrier(&self) {
        self.shared.barrier.wait();
    }

    fn abort(&self, code: i32) -> ! {
        panic!("rank {} aborted with code {}", self.rank, code)
    }
}

/// Run `f` on `size` ranks (one thread each) and return
/// the results in rank order.
///
/// # Panics
/// Re-raises the panic of a failing rank.
pub fn run_ranks<F, T>(size: usize, f: F) -> Vec<T>
where
    F: Fn(ThreadComm) -> T + Sync,
    T: Send,
{
    let comms = ThreadComm::group(size);
    std::thread::scope(|scope| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                let f = &f;
                scope.spawn(move || f(comm))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    })
}
