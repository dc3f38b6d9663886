//! # Distributed transpose
//! Redistribute spectral data between `XSlab` (x distributed,
//! local (x, ky, kz)) and `YSlab` (ky distributed, local
//! (ky, kz, kx)). Every element keeps its logical index.
//!
//! Each direction is pack -> all-to-all -> unpack. The arrays
//! are cut into independent tasks (one component, one chunk
//! of kz planes). While the exchange of task `t` runs on the
//! calling thread, a worker thread unpacks task `t-1` and
//! packs task `t+1`, so local reshuffles and the 1D transforms
//! fused into them hide behind the network traffic.
//!
//! Only the calling thread issues collectives.
use crate::comm::Comm;
use crate::error::{Error, Result};
use crate::field::{Decomp, VectorField};
use crate::grid::Grid;
use crate::types::Complex64;
use ndarray::{s, Array3, ArrayViewMut3};

/// One unit of the pipeline: component `comp`, kz planes `z0..z1`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Task {
    comp: usize,
    z0: usize,
    z1: usize,
}

impl Task {
    /// Number of f64 values one task sends in total
    fn len(&self, grid: &Grid) -> usize {
        2 * grid.nxl * grid.n * (self.z1 - self.z0)
    }

    /// Number of f64 values per destination rank
    fn block(&self, grid: &Grid) -> usize {
        2 * grid.nxl * grid.nyl * (self.z1 - self.z0)
    }
}

/// Transpose engine, owns the send and receive buffers
#[derive(Debug, Clone)]
pub struct Transposer {
    planes: usize,
    send: Vec<f64>,
    recv: Vec<f64>,
}

impl Transposer {
    /// Engine that cuts every component into `planes` kz chunks
    /// (clamped to `1..=nz`).
    pub fn new(grid: &Grid, planes: usize) -> Self {
        let len = 6 * grid.nxl * grid.n * grid.nz;
        Self {
            planes: planes.clamp(1, grid.nz),
            send: vec![0.; len],
            recv: vec![0.; len],
        }
    }

    /// Number of kz chunks per component
    pub fn planes(&self) -> usize {
        self.planes
    }

    fn tasks(&self, grid: &Grid, ncomp: usize) -> Vec<Task> {
        let chunks = self.planes;
        (0..ncomp)
            .flat_map(|comp| {
                (0..chunks).map(move |c| Task {
                    comp,
                    z0: c * grid.nz / chunks,
                    z1: (c + 1) * grid.nz / chunks,
                })
            })
            .collect()
    }

    /// Grow buffers if needed and split them into per task slices
    fn buffers<'a>(
        &'a mut self,
        grid: &Grid,
        tasks: &[Task],
    ) -> (Vec<&'a mut [f64]>, Vec<&'a mut [f64]>) {
        let lens: Vec<usize> = tasks.iter().map(|t| t.len(grid)).collect();
        let total = lens.iter().sum();
        if self.send.len() < total {
            self.send.resize(total, 0.);
            self.recv.resize(total, 0.);
        }
        (
            split_lens(&mut self.send, &lens),
            split_lens(&mut self.recv, &lens),
        )
    }

    /// Transpose component arrays from `XSlab` to `YSlab`.
    ///
    /// `hook` is applied to every kz chunk of `dst`
    /// (view of shape `[nyl, planes, n]`) once it is complete.
    ///
    /// # Errors
    /// Mismatched component counts or shapes (checked before
    /// any exchange), failed exchange or worker.
    pub fn x_to_y<C, H>(
        &mut self,
        comm: &C,
        grid: &Grid,
        src: &[&Array3<Complex64>],
        dst: &mut [&mut Array3<Complex64>],
        hook: H,
    ) -> Result<()>
    where
        C: Comm,
        H: Fn(ArrayViewMut3<Complex64>) + Sync,
    {
        check_components(src.len(), dst.len())?;
        check_shapes(src.iter().map(|a| a.shape()), grid.shape_xslab())?;
        check_shapes(dst.iter().map(|a| a.shape()), grid.shape_yslab())?;
        let tasks = self.tasks(grid, src.len());
        let (mut send, mut recv) = self.buffers(grid, &tasks);
        let pack = |t: &Task, buf: &mut [f64]| pack_xslab(grid, src[t.comp], t, buf);
        let unpack = |t: &Task, buf: &[f64]| {
            let b = &mut *dst[t.comp];
            unpack_yslab(grid, b, t, buf);
            hook(b.slice_mut(s![.., t.z0..t.z1, ..]));
        };
        pipeline(comm, grid, &tasks, &mut send, &mut recv, pack, unpack)
    }

    /// Transpose component arrays from `YSlab` to `XSlab`.
    ///
    /// `pre_hook` is applied to every kz chunk of `src`
    /// (view of shape `[nyl, planes, n]`) right before it is
    /// packed, `src` is modified by it.
    ///
    /// # Errors
    /// Mismatched component counts or shapes (checked before
    /// any exchange), failed exchange or worker.
    pub fn y_to_x<C, H>(
        &mut self,
        comm: &C,
        grid: &Grid,
        src: &mut [&mut Array3<Complex64>],
        dst: &mut [&mut Array3<Complex64>],
        pre_hook: H,
    ) -> Result<()>
    where
        C: Comm,
        H: Fn(ArrayViewMut3<Complex64>) + Sync,
    {
        check_components(src.len(), dst.len())?;
        check_shapes(src.iter().map(|a| a.shape()), grid.shape_yslab())?;
        check_shapes(dst.iter().map(|a| a.shape()), grid.shape_xslab())?;
        let tasks = self.tasks(grid, src.len());
        let (mut send, mut recv) = self.buffers(grid, &tasks);
        let pack = |t: &Task, buf: &mut [f64]| {
            let b = &mut *src[t.comp];
            pre_hook(b.slice_mut(s![.., t.z0..t.z1, ..]));
            pack_yslab(grid, b, t, buf);
        };
        let unpack = |t: &Task, buf: &[f64]| unpack_xslab(grid, &mut *dst[t.comp], t, buf);
        pipeline(comm, grid, &tasks, &mut send, &mut recv, pack, unpack)
    }

    /// Transpose a whole field from `XSlab` to `YSlab`
    ///
    /// # Errors
    /// See [`Transposer::x_to_y`], or wrong decomposition
    /// of `src` or `dst`.
    pub fn forward<C: Comm>(
        &mut self,
        comm: &C,
        grid: &Grid,
        src: &VectorField,
        dst: &mut VectorField,
    ) -> Result<()> {
        src.expect_decomp(Decomp::XSlab)?;
        dst.expect_decomp(Decomp::YSlab)?;
        let [x, y, z] = dst.components_mut();
        self.x_to_y(comm, grid, &src.components(), &mut [x, y, z], |_| {})
    }

    /// Transpose a whole field from `YSlab` to `XSlab`
    ///
    /// # Errors
    /// See [`Transposer::y_to_x`], or wrong decomposition
    /// of `src` or `dst`.
    pub fn backward<C: Comm>(
        &mut self,
        comm: &C,
        grid: &Grid,
        src: &mut VectorField,
        dst: &mut VectorField,
    ) -> Result<()> {
        src.expect_decomp(Decomp::YSlab)?;
        dst.expect_decomp(Decomp::XSlab)?;
        let [sx, sy, sz] = src.components_mut();
        let [dx, dy, dz] = dst.components_mut();
        self.y_to_x(comm, grid, &mut [sx, sy, sz], &mut [dx, dy, dz], |_| {})
    }
}

/// Run the task pipeline.
///
/// Task 0 is packed up front. In step `t` the calling thread
/// exchanges task `t` while a worker unpacks `t-1` and packs
/// `t+1`; the worker is joined before step `t+1` starts.
fn pipeline<C, P, U>(
    comm: &C,
    grid: &Grid,
    tasks: &[Task],
    send: &mut [&mut [f64]],
    recv: &mut [&mut [f64]],
    mut pack: P,
    mut unpack: U,
) -> Result<()>
where
    C: Comm,
    P: FnMut(&Task, &mut [f64]) + Send,
    U: FnMut(&Task, &[f64]) + Send,
{
    let ntask = tasks.len();
    if ntask == 0 {
        return Ok(());
    }
    pack(&tasks[0], &mut *send[0]);
    for t in 0..ntask {
        let (send_head, send_tail) = send.split_at_mut(t + 1);
        let (recv_head, recv_tail) = recv.split_at_mut(t);
        let send_t: &[f64] = &*send_head[t];
        let recv_t: &mut [f64] = &mut *recv_tail[0];
        let prev = recv_head.last().map(|b| (&tasks[t - 1], &**b));
        let next = send_tail.first_mut().map(|b| (&tasks[t + 1], &mut **b));
        let (pack, unpack) = (&mut pack, &mut unpack);
        std::thread::scope(|scope| {
            let worker = scope.spawn(move || {
                if let Some((task, buf)) = prev {
                    unpack(task, buf);
                }
                if let Some((task, buf)) = next {
                    pack(task, buf);
                }
            });
            let exchanged = comm.all_to_all(send_t, recv_t);
            worker
                .join()
                .map_err(|_| Error::Runtime(format!("transpose worker of task {} panicked", t)))?;
            exchanged
        })?;
        tracing::trace!(
            "transpose task {}/{} ({} values per rank)",
            t + 1,
            ntask,
            tasks[t].block(grid)
        );
    }
    unpack(&tasks[ntask - 1], &*recv[ntask - 1]);
    Ok(())
}

/// Pack `XSlab` array: block r holds `[.., r*nyl..(r+1)*nyl, z0..z1]`
fn pack_xslab(grid: &Grid, a: &Array3<Complex64>, t: &Task, buf: &mut [f64]) {
    let nyl = grid.nyl;
    for (r, block) in buf.chunks_exact_mut(t.block(grid)).enumerate() {
        let view = a.slice(s![.., r * nyl..(r + 1) * nyl, t.z0..t.z1]);
        for (pair, v) in block.chunks_exact_mut(2).zip(view.iter()) {
            pair[0] = v.re;
            pair[1] = v.im;
        }
    }
}

/// Unpack into `YSlab` array: block s holds kx `s*nxl..(s+1)*nxl`
fn unpack_yslab(grid: &Grid, b: &mut Array3<Complex64>, t: &Task, buf: &[f64]) {
    let nxl = grid.nxl;
    for (s, block) in buf.chunks_exact(t.block(grid)).enumerate() {
        // sender order (x, ky, kz)
        let view = b
            .slice_mut(s![.., t.z0..t.z1, s * nxl..(s + 1) * nxl])
            .permuted_axes([2, 0, 1]);
        for (v, pair) in view.into_iter().zip(block.chunks_exact(2)) {
            *v = Complex64::new(pair[0], pair[1]);
        }
    }
}

/// Pack `YSlab` array: block r holds kx `r*nxl..(r+1)*nxl`
fn pack_yslab(grid: &Grid, b: &Array3<Complex64>, t: &Task, buf: &mut [f64]) {
    let nxl = grid.nxl;
    for (r, block) in buf.chunks_exact_mut(t.block(grid)).enumerate() {
        let view = b
            .slice(s![.., t.z0..t.z1, r * nxl..(r + 1) * nxl])
            .permuted_axes([2, 0, 1]);
        for (pair, v) in block.chunks_exact_mut(2).zip(view.iter()) {
            pair[0] = v.re;
            pair[1] = v.im;
        }
    }
}

/// Unpack into `XSlab` array: block s holds ky `s*nyl..(s+1)*nyl`
fn unpack_xslab(grid: &Grid, a: &mut Array3<Complex64>, t: &Task, buf: &[f64]) {
    let nyl = grid.nyl;
    for (s, block) in buf.chunks_exact(t.block(grid)).enumerate() {
        let mut view = a.slice_mut(s![.., s * nyl..(s + 1) * nyl, t.z0..t.z1]);
        for (v, pair) in view.iter_mut().zip(block.chunks_exact(2)) {
            *v = Complex64::new(pair[0], pair[1]);
        }
    }
}

/// Cut `buf` into consecutive slices of lengths `lens`
fn split_lens<'a>(buf: &'a mut [f64], lens: &[usize]) -> Vec<&'a mut [f64]> {
    let mut rest = buf;
    let mut out = Vec::with_capacity(lens.len());
    for &len in lens {
        let (head, tail) = std::mem::take(&mut rest).split_at_mut(len);
        out.push(head);
        rest = tail;
    }
    out
}

fn check_components(nsrc: usize, ndst: usize) -> Result<()> {
    if nsrc == ndst {
        Ok(())
    } else {
        Err(Error::Shape {
            expected: vec![nsrc],
            found: vec![ndst],
        })
    }
}

fn check_shapes<'a, I>(shapes: I, expected: [usize; 3]) -> Result<()>
where
    I: Iterator<Item = &'a [usize]>,
{
    for shape in shapes {
        if shape != expected {
            return Err(Error::Shape {
                expected: expected.to_vec(),
                found: shape.to_vec(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{run_ranks, SerialComm};

    /// Unique value per logical index (x|kx, ky, kz) and component
    fn tag(c: usize, x: usize, y: usize, z: usize) -> Complex64 {
        Complex64::new((1000 * x + 10 * y + z) as f64, c as f64)
    }

    fn tagged_xslab(grid: &Grid) -> VectorField {
        let mut field = VectorField::spectral_xslab(grid);
        for (c, comp) in field.components_mut().into_iter().enumerate() {
            for ((i, j, l), v) in comp.indexed_iter_mut() {
                *v = tag(c, grid.x0 + i, j, l);
            }
        }
        field
    }

    fn check_placement(nprocs: usize, n: usize, planes: usize) {
        run_ranks(nprocs, |comm| {
            let grid = Grid::new(n, nprocs, comm.rank()).unwrap();
            let mut tr = Transposer::new(&grid, planes);
            let src = tagged_xslab(&grid);
            let mut ys = VectorField::spectral(&grid);
            tr.forward(&comm, &grid, &src, &mut ys).unwrap();
            for (c, comp) in ys.components().into_iter().enumerate() {
                for ((j, l, i), v) in comp.indexed_iter() {
                    assert_eq!(*v, tag(c, i, grid.y0 + j, l));
                }
            }
            let mut back = VectorField::spectral_xslab(&grid);
            tr.backward(&comm, &grid, &mut ys, &mut back).unwrap();
            assert_eq!(back, src);
        });
    }

    #[test]
    fn test_transpose_serial() {
        check_placement(1, 8, 4);
    }

    #[test]
    fn test_transpose_two_ranks() {
        check_placement(2, 8, 1);
        check_placement(2, 8, 3);
    }

    #[test]
    fn test_transpose_four_ranks() {
        check_placement(4, 8, 4);
        check_placement(4, 12, 100);
    }

    #[test]
    fn test_hook_sees_complete_planes() {
        let grid = Grid::new(8, 1, 0).unwrap();
        let mut tr = Transposer::new(&grid, 2);
        let src = tagged_xslab(&grid);
        let mut dst = VectorField::spectral(&grid);
        let [x, y, z] = dst.components_mut();
        tr.x_to_y(&SerialComm, &grid, &src.components(), &mut [x, y, z], |mut v| {
            v.mapv_inplace(|c| -c)
        })
        .unwrap();
        assert_eq!(dst.y[[3, 2, 5]], -tag(1, 5, 3, 2));
    }

    #[test]
    fn test_shape_mismatch_before_exchange() {
        let grid = Grid::new(8, 1, 0).unwrap();
        let mut tr = Transposer::new(&grid, 2);
        let src = VectorField::spectral(&grid);
        let mut dst = VectorField::spectral(&grid);
        assert!(matches!(
            tr.forward(&SerialComm, &grid, &src, &mut dst),
            Err(Error::Layout { .. })
        ));
        let a = Array3::<Complex64>::zeros([2, 2, 2]);
        let mut b = Array3::<Complex64>::zeros(grid.shape_yslab());
        assert!(matches!(
            tr.x_to_y(&SerialComm, &grid, &[&a], &mut [&mut b], |_| {}),
            Err(Error::Shape { .. })
        ));
    }
}
