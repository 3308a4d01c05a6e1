use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use memseg::layout::{MemoryLayout, PathElement};
use memseg::mem::{ArenaAllocator, MemorySegment, ResourceScope, SegmentAllocator, ShardedArena};

fn filled(scope: &ResourceScope, len: usize, byte: u8) -> MemorySegment {
    let seg = MemorySegment::allocate_native(len, 64, scope).unwrap();
    seg.fill(byte).unwrap();
    seg
}

fn bench_mismatch(c: &mut Criterion) {
    let scope = ResourceScope::new_confined();
    let mut group = c.benchmark_group("mismatch");
    for len in [64usize, 4 * 1024, 1024 * 1024] {
        let a = filled(&scope, len, 0x5A);
        let b = filled(&scope, len, 0x5A);
        b.set::<u8>(len - 1, 0).unwrap();
        group.throughput(Throughput::Bytes(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |bench, _| {
            bench.iter(|| black_box(a.mismatch(&b).unwrap()))
        });
    }
    group.finish();
}

fn bench_copy(c: &mut Criterion) {
    let scope = ResourceScope::new_confined();
    let len = 1024 * 1024;
    let src = filled(&scope, len, 0x11);
    let dst = filled(&scope, len, 0);
    let mut group = c.benchmark_group("copy");
    group.throughput(Throughput::Bytes(len as u64));
    group.bench_function("copy_from", |bench| bench.iter(|| dst.copy_from(&src).unwrap()));
    group.bench_function("copy_from_swapped_u32", |bench| {
        bench.iter(|| dst.copy_from_swapped(&src, 4).unwrap())
    });
    group.finish();
}

fn bench_arena(c: &mut Criterion) {
    c.bench_function("arena_1k_small_allocations", |bench| {
        bench.iter(|| {
            let scope = ResourceScope::new_confined();
            let arena = ArenaAllocator::new(&scope);
            for i in 0..1024u64 {
                black_box(arena.allocate_value(i).unwrap());
            }
            scope.close().unwrap();
        })
    });
    c.bench_function("sharded_arena_1k_small_allocations", |bench| {
        bench.iter(|| {
            let scope = ResourceScope::new_shared();
            let arena = ShardedArena::new(&scope);
            for i in 0..1024u64 {
                black_box(arena.allocate_value(i).unwrap());
            }
            scope.close().unwrap();
        })
    });
}

fn bench_value_handle(c: &mut Criterion) {
    let scope = ResourceScope::new_confined();
    let layout = MemoryLayout::sequence(1024, MemoryLayout::of::<u64>());
    let seg = scope.allocate(8 * 1024, 8).unwrap();
    let each = layout
        .value_handle::<u64>(&[PathElement::Sequence])
        .unwrap();
    c.bench_function("value_handle_sum_1k", |bench| {
        bench.iter(|| {
            let mut sum = 0u64;
            for i in 0..1024 {
                sum = sum.wrapping_add(each.get(&seg, &[i]).unwrap());
            }
            black_box(sum)
        })
    });
}

criterion_group!(memory, bench_mismatch, bench_copy, bench_arena, bench_value_handle);
criterion_main!(memory);
