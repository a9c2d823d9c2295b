use std::fmt::Debug;

use bitvec::{bitvec, order::Lsb0, vec::BitVec};
use itertools::Itertools;
use rand::{SeedableRng, seq::index};

use crate::{
    DocId, DocIdSet, DocIdSetIterator, DocSetBuilder, DocSetError, NO_MORE_DOCS, PforBuilder,
    PforSet, WahBuilder, WahSet,
};

fn build<B: DocSetBuilder>(
    mut builder: B,
    values: impl IntoIterator<Item = u32>,
    interval: Option<usize>,
) -> B::Output {
    if let Some(interval) = interval {
        builder.set_index_interval(interval).unwrap();
    }
    builder.add_all(values).unwrap();
    builder.build().unwrap()
}

pub fn mkwah(values: impl IntoIterator<Item = u32>) -> WahSet {
    build(WahBuilder::default(), values, None)
}

pub fn mkwah_with_interval(values: impl IntoIterator<Item = u32>, interval: usize) -> WahSet {
    build(WahBuilder::default(), values, Some(interval))
}

pub fn mkpfor(values: impl IntoIterator<Item = u32>) -> PforSet {
    build(PforBuilder::default(), values, None)
}

pub fn mkpfor_with_interval(values: impl IntoIterator<Item = u32>, interval: usize) -> PforSet {
    build(PforBuilder::default(), values, Some(interval))
}

/// Drains `set` with `next_doc` and checks it against `expected`.
#[track_caller]
pub fn check_drain<S: DocIdSet + Debug>(set: &S, expected: &[DocId]) {
    assert_eq!(set.cardinality(), expected.len(), "{set:?}");
    let mut iter = set.iter();
    assert_eq!(iter.doc_id(), NO_MORE_DOCS);
    for (i, &want) in expected.iter().enumerate() {
        let doc = iter.next_doc().unwrap();
        assert_eq!(doc, want, "doc #{i} of {set:?}");
        assert_eq!(iter.doc_id(), doc);
    }
    assert_eq!(iter.next_doc().unwrap(), NO_MORE_DOCS, "{set:?}");
    assert_eq!(iter.doc_id(), NO_MORE_DOCS);
    assert_eq!(iter.next_doc(), Err(DocSetError::Exhausted));
}

/// Advances a single iterator over `set` to each of `targets`, which must be
/// increasing. Targets at or before the current doc are skipped. After odd
/// targets the iterator also steps once with `next_doc`.
#[track_caller]
pub fn check_advance<S: DocIdSet + Debug>(
    set: &S,
    expected: &[DocId],
    targets: impl IntoIterator<Item = DocId>,
) {
    let mut iter = set.iter();
    let mut current = None;
    for target in targets {
        match current {
            Some(NO_MORE_DOCS) => break,
            Some(doc) if target <= doc => continue,
            _ => {}
        }

        let idx = expected.partition_point(|&d| d < target);
        let want = expected.get(idx).copied().unwrap_or(NO_MORE_DOCS);
        let doc = iter.advance(target).unwrap();
        assert_eq!(doc, want, "advance({target}) on {set:?}");
        assert_eq!(iter.doc_id(), doc);
        current = Some(doc);

        if doc != NO_MORE_DOCS && target % 2 == 1 {
            let want = expected.get(idx + 1).copied().unwrap_or(NO_MORE_DOCS);
            let doc = iter.next_doc().unwrap();
            assert_eq!(doc, want, "next_doc after advance({target}) on {set:?}");
            current = Some(doc);
        }
    }
}

/// Computes set algebra on plain bitmaps.
pub struct BitmapOracle;

impl BitmapOracle {
    fn bitmap(docs: &[DocId], len: usize) -> BitVec<u64, Lsb0> {
        let mut bits = bitvec![u64, Lsb0; 0; len];
        for &doc in docs {
            bits.set(doc as usize, true);
        }
        bits
    }

    fn universe(sets: &[Vec<DocId>]) -> usize {
        sets.iter()
            .filter_map(|docs| docs.last())
            .max()
            .map_or(0, |&max| max as usize + 1)
    }

    fn docs(bits: &BitVec<u64, Lsb0>) -> Vec<DocId> {
        bits.iter_ones().map(|doc| doc as DocId).collect()
    }

    pub fn intersect(sets: &[Vec<DocId>]) -> Vec<DocId> {
        let len = Self::universe(sets);
        let mut out = bitvec![u64, Lsb0; 1; len];
        for docs in sets {
            out &= Self::bitmap(docs, len);
        }
        Self::docs(&out)
    }

    pub fn union(sets: &[Vec<DocId>]) -> Vec<DocId> {
        let len = Self::universe(sets);
        let mut out = bitvec![u64, Lsb0; 0; len];
        for docs in sets {
            out |= Self::bitmap(docs, len);
        }
        Self::docs(&out)
    }
}

pub struct SetGen {
    rng: rand::rngs::StdRng,
}

impl SetGen {
    pub fn new(seed: u64) -> Self {
        let rng = rand::rngs::StdRng::seed_from_u64(seed);
        Self { rng }
    }

    fn below(&mut self, bound: usize) -> usize {
        index::sample(&mut self.rng, bound, 1).index(0)
    }

    pub fn random(&mut self, len: usize) -> Vec<u32> {
        self.random_below(len, NO_MORE_DOCS as usize)
    }

    pub fn random_below(&mut self, len: usize, bound: usize) -> Vec<u32> {
        index::sample(&mut self.rng, bound, len)
            .into_iter()
            .map(|i| i as u32)
            .sorted()
            .collect()
    }

    /// Generates `clusters` runs of `cluster_len` docs, each picked among a
    /// window of `window` consecutive docs. Clusters are at least 512 docs
    /// apart.
    #[track_caller]
    pub fn clustered(&mut self, clusters: usize, cluster_len: usize, window: usize) -> Vec<u32> {
        assert!(cluster_len <= window, "cluster larger than its window");
        let mut out = Vec::with_capacity(clusters * cluster_len);
        let mut start = 0;
        for _ in 0..clusters {
            start += 512 + self.below(4096);
            let cluster = index::sample(&mut self.rng, window, cluster_len);
            out.extend(cluster.into_iter().sorted().map(|i| (start + i) as u32));
            start += window;
        }
        out
    }

    /// Generates `len` docs whose gaps are mostly below `1 << bits`, with
    /// an occasional gap of up to `1 << outlier_bits`.
    pub fn gaps(&mut self, len: usize, bits: u32, outlier_bits: u32) -> Vec<u32> {
        let mut out = Vec::with_capacity(len);
        let mut doc = 0usize;
        for _ in 0..len {
            let gap_bits = if self.below(16) == 0 { outlier_bits } else { bits };
            doc += 1 + self.below(1 << gap_bits);
            out.push(doc as u32);
        }
        out
    }
}
