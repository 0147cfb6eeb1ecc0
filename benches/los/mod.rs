pub mod alloc_sweep;
pub mod promote;

pub use criterion::Criterion;

pub fn bench(c: &mut Criterion) {
    alloc_sweep::bench(c);
    promote::bench(c);
}
