use criterion::Criterion;

use genlos::util::constants::BYTES_IN_MBYTE;
use genlos::{LargeObjectSpace, ListId, MmapPageResource};

const OBJECTS: usize = 256;

pub fn bench(c: &mut Criterion) {
    let mut pr = MmapPageResource::new(256 * BYTES_IN_MBYTE);
    let mut los = LargeObjectSpace::new(2).unwrap();
    let objects: Vec<_> = (0..OBJECTS)
        .map(|_| los.allocate(&mut pr, 8 * 1024, 0).unwrap())
        .collect();

    // Mark everything, then promote it back and forth between the two generations.
    let mut from = 0;
    c.bench_function("los_mark_promote", |b| {
        b.iter(|| {
            let to = 1 - from;
            let mut cycle = los.begin_collection();
            for object in &objects {
                cycle.mark(*object, from);
            }
            cycle.sweep(&mut pr, from);
            cycle.append_and_clear_list(&mut pr, ListId::Marked, to);
            cycle.finish();
            from = to;
        })
    });

    los.release_all(&mut pr);
}
