use criterion::Criterion;

use genlos::util::constants::BYTES_IN_MBYTE;
use genlos::{LargeObjectSpace, MmapPageResource};

const OBJECTS: usize = 64;

pub fn bench(c: &mut Criterion) {
    let mut pr = MmapPageResource::new(256 * BYTES_IN_MBYTE);
    let mut los = LargeObjectSpace::new(2).unwrap();

    c.bench_function("los_alloc_sweep", |b| {
        b.iter(|| {
            for i in 0..OBJECTS {
                los.allocate(&mut pr, 16 * 1024 + i * 64, 0).unwrap();
            }
            let mut cycle = los.begin_collection();
            let summary = cycle.sweep(&mut pr, 0);
            cycle.finish();
            assert_eq!(summary.objects_freed, OBJECTS);
        })
    });
}
