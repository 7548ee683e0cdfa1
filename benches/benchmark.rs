use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stratum::block::AIR;
use stratum::circle::Circle;
use stratum::column::{Column, ColumnSink};

struct VecSink(Vec<u8>);
impl ColumnSink for VecSink {
    fn set_voxel(&mut self, _x: usize, y: usize, _z: usize, block: u8) {
        self.0[y] = block;
    }
}

/// Fill a full 16x16 chunk column-by-column, as `World::load_chunk_at` does
/// on every chunk admission.
fn bench_column_fill_chunk(c: &mut Criterion) {
    c.bench_function("column_fill_chunk", |b| {
        b.iter(|| {
            let mut col = Column::new();
            let mut sink = VecSink(vec![AIR; 256]);
            for x in 0..16 {
                for z in 0..16 {
                    col.clear();
                    col.push(1, 4);
                    col.push(2, 64);
                    col.overwrite(3, 70);
                    col.fill_chunk(black_box(x), black_box(z), &mut sink, x == 0 && z == 0);
                }
            }
            let mut out = vec![false; 256];
            col.fill_equilevels(&mut out);
            black_box(out)
        })
    });
}

/// Construct a chunk-radius circle index, as happens once per `World::new`.
fn bench_circle_construction(c: &mut Criterion) {
    c.bench_function("circle_construction", |b| {
        b.iter(|| {
            let circle: Circle<u32> = Circle::new(black_box(12));
            black_box(circle)
        })
    });
}

/// Recenter a chunk-radius circle repeatedly, as happens once per
/// `World::recenter` call while the viewer travels in a straight line.
fn bench_circle_recenter_walk(c: &mut Criterion) {
    c.bench_function("circle_recenter_walk", |b| {
        b.iter(|| {
            let mut circle: Circle<u32> = Circle::new(12);
            for i in 0..200 {
                circle.set(i, 0, i as u32);
                circle.recenter(black_box(i), 0, |_, _, _| {});
            }
            black_box(&circle);
        })
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(200);
    targets = bench_column_fill_chunk, bench_circle_construction, bench_circle_recenter_walk
}
criterion_main!(benches);
