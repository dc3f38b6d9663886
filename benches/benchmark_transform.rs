use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use spectral_hit::comm::SerialComm;
use spectral_hit::fft::SpectralTransform;
use spectral_hit::field::{PhysicalField, VectorField};
use spectral_hit::grid::Grid;

const SIZES: [usize; 3] = [16, 32, 64];

pub fn bench_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("Transform");
    group.significance_level(0.1).sample_size(10);
    for n in SIZES.iter() {
        let grid = Grid::new(*n, 1, 0).unwrap();
        let mut transform = SpectralTransform::new(&grid, 4);
        let mut p = PhysicalField::from_fn(&grid, |x, y, z| [x.sin(), y.cos() * z.sin(), 0.]);
        let mut u = VectorField::spectral(&grid);
        let name = format!("Size: {} x {} x {}", *n, *n, *n);
        group.bench_with_input(BenchmarkId::new("Forward", &name), n, |b, _| {
            b.iter(|| transform.forward(&SerialComm, &grid, &p, &mut u).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("Backward", &name), n, |b, _| {
            b.iter(|| transform.backward(&SerialComm, &grid, &u, &mut p).unwrap())
        });
    }
    group.finish();
}

pub fn bench_planes(c: &mut Criterion) {
    let mut group = c.benchmark_group("Planes");
    group.significance_level(0.1).sample_size(10);
    let grid = Grid::new(32, 1, 0).unwrap();
    let p = PhysicalField::from_fn(&grid, |x, y, z| [x.sin(), y.cos() * z.sin(), 0.]);
    let mut u = VectorField::spectral(&grid);
    for planes in [1, 4, 17] {
        let mut transform = SpectralTransform::new(&grid, planes);
        group.bench_with_input(BenchmarkId::new("Forward", planes), &planes, |b, _| {
            b.iter(|| transform.forward(&SerialComm, &grid, &p, &mut u).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_transform, bench_planes);
criterion_main!(benches);
