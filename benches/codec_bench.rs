use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use docset_rs::{
    DocIdSet, DocIdSetIterator, DocSetBuilder, PforBuilder, PforSet, WahBuilder, WahSet,
    ops::{Intersection, Union},
    testutil::SetGen,
    wah,
};

fn mkwah(values: impl IntoIterator<Item = u32>) -> WahSet {
    let mut builder = WahBuilder::default();
    builder.add_all(values).unwrap();
    builder.build().unwrap()
}

fn mkpfor(values: impl IntoIterator<Item = u32>) -> PforSet {
    let mut builder = PforBuilder::default();
    builder.add_all(values).unwrap();
    builder.build().unwrap()
}

fn drain<S: DocIdSet>(set: &S) -> u32 {
    let mut iter = set.iter();
    let mut count = 0;
    while iter.next_doc().unwrap() != docset_rs::NO_MORE_DOCS {
        count += 1;
    }
    count
}

fn benchmark_build(c: &mut Criterion) {
    let cardinalities = [1024usize, 16384, 131072];

    let mut group = c.benchmark_group("build");
    let mut set_gen = SetGen::new(0xDEAD_BEEF);

    for &cardinality in &cardinalities {
        let set = set_gen.random_below(cardinality, cardinality * 16);

        group.bench_function(BenchmarkId::new("wah", cardinality), |b| {
            b.iter(|| mkwah(black_box(set.iter().copied())))
        });

        group.bench_function(BenchmarkId::new("pfor", cardinality), |b| {
            b.iter(|| mkpfor(black_box(set.iter().copied())))
        });
    }

    group.finish();
}

fn benchmark_iterate(c: &mut Criterion) {
    let cardinalities = [1024usize, 16384, 131072];

    let mut group = c.benchmark_group("iterate");
    let mut set_gen = SetGen::new(0xDEAD_BEEF);

    for &cardinality in &cardinalities {
        let set = set_gen.random_below(cardinality, cardinality * 16);

        group.bench_function(BenchmarkId::new("wah", cardinality), |b| {
            let wah = mkwah(set.iter().copied());
            assert_eq!(drain(&wah) as usize, cardinality);
            b.iter(|| drain(black_box(&wah)))
        });

        group.bench_function(BenchmarkId::new("pfor", cardinality), |b| {
            let pfor = mkpfor(set.iter().copied());
            assert_eq!(drain(&pfor) as usize, cardinality);
            b.iter(|| drain(black_box(&pfor)))
        });
    }

    group.finish();
}

fn benchmark_advance(c: &mut Criterion) {
    const STRIDE: usize = 97;

    let mut group = c.benchmark_group("advance");
    let mut set_gen = SetGen::new(0xDEAD_BEEF);

    for &cardinality in &[16384usize, 131072, 1048576] {
        let set = set_gen.random_below(cardinality, cardinality * 64);
        let targets: Vec<u32> = set.iter().step_by(STRIDE).map(|&d| d + 1).collect();

        group.bench_function(BenchmarkId::new("wah", cardinality), |b| {
            let wah = mkwah(set.iter().copied());
            b.iter(|| {
                let mut iter = wah.iter();
                for &target in &targets {
                    if iter.advance(black_box(target)).unwrap() == docset_rs::NO_MORE_DOCS {
                        break;
                    }
                }
            })
        });

        group.bench_function(BenchmarkId::new("pfor", cardinality), |b| {
            let pfor = mkpfor(set.iter().copied());
            b.iter(|| {
                let mut iter = pfor.iter();
                for &target in &targets {
                    if iter.advance(black_box(target)).unwrap() == docset_rs::NO_MORE_DOCS {
                        break;
                    }
                }
            })
        });
    }

    group.finish();
}

fn benchmark_algebra(c: &mut Criterion) {
    let mut group = c.benchmark_group("algebra");
    let mut set_gen = SetGen::new(0xDEAD_BEEF);

    let clustered = mkwah(set_gen.clustered(2048, 48, 64));
    let sparse = mkwah(set_gen.random_below(16384, 16 << 20));
    let dense = mkwah(set_gen.random_below(1 << 20, 2 << 20));

    group.bench_function("intersection clustered sparse", |b| {
        b.iter(|| black_box(&clustered).intersection(black_box(&sparse)))
    });

    group.bench_function("intersection clustered dense", |b| {
        b.iter(|| black_box(&clustered).intersection(black_box(&dense)))
    });

    group.bench_function("union clustered sparse", |b| {
        b.iter(|| black_box(&clustered).union(black_box(&sparse)))
    });

    group.bench_function("intersect 3 sets", |b| {
        let sets = [&clustered, &sparse, &dense];
        b.iter(|| wah::intersect(black_box(sets), wah::DEFAULT_INDEX_INTERVAL).unwrap())
    });

    group.bench_function("union 3 sets", |b| {
        let sets = [&clustered, &sparse, &dense];
        b.iter(|| wah::union(black_box(sets), wah::DEFAULT_INDEX_INTERVAL).unwrap())
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_build,
    benchmark_iterate,
    benchmark_advance,
    benchmark_algebra
);
criterion_main!(benches);
