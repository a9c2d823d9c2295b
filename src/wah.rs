//! Word-aligned hybrid (WAH) run-length encoding.
//!
//! A set is viewed as a sequence of 8-bit words, where bit `i` of word `n`
//! stands for doc `n * 8 + i`. Words which are all zeros or all ones are
//! *clean* and run-length encoded; other words are *dirty* and stored as is.
//! The encoded buffer is a list of sequences, each made of a clean run
//! followed by a span of dirty words. See [`header`] for the token layout.

use std::{fmt::Debug, iter::FusedIterator};

use bytes::Bytes;

use crate::{
    DocId, DocSetError, NO_MORE_DOCS,
    bits::SetBits,
    skip::SkipIndex,
    traits::{DocIdSet, DocIdSetIterator, Position},
};

mod algebra;
mod builder;
pub mod header;
mod reader;

pub use algebra::{intersect, union};
pub(crate) use algebra::{intersect_sorted, union_unchecked};
pub use builder::WahBuilder;

pub(crate) use builder::WordEncoder;
pub(crate) use reader::WordReader;

/// The default number of sequences between two skip index checkpoints.
pub const DEFAULT_INDEX_INTERVAL: usize = 24;

#[inline(always)]
pub(crate) fn word_num(doc: DocId) -> u32 {
    doc >> 3
}

/// An immutable WAH-encoded set of doc ids.
#[derive(Clone, PartialEq, Eq)]
pub struct WahSet {
    data: Bytes,
    cardinality: usize,
    skips: SkipIndex,
}

impl WahSet {
    pub(crate) fn new(data: Bytes, cardinality: usize, skips: SkipIndex) -> Self {
        Self { data, cardinality, skips }
    }

    pub(crate) fn empty_with_interval(index_interval: usize) -> Self {
        Self::new(Bytes::new(), 0, SkipIndex::sentinel(index_interval))
    }

    /// An empty set.
    pub fn empty() -> Self {
        Self::empty_with_interval(DEFAULT_INDEX_INTERVAL)
    }

    /// Builds a set from docs in strictly increasing order.
    pub fn from_sorted<I: IntoIterator<Item = DocId>>(docs: I) -> Result<Self, DocSetError> {
        use crate::DocSetBuilder;
        let mut builder = WahBuilder::default();
        builder.add_all(docs)?;
        builder.build()
    }

    /// The encoded sequences.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn skip_index(&self) -> &SkipIndex {
        &self.skips
    }

    /// The number of sequences between two skip index checkpoints.
    #[inline]
    pub fn index_interval(&self) -> usize {
        self.skips.interval()
    }

    #[inline]
    pub(crate) fn words(&self) -> WordReader<'_> {
        WordReader::new(&self.data, &self.skips)
    }
}

impl Default for WahSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl Debug for WahSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "WahSet(cardinality={}, bytes={}, {:?})",
            self.cardinality,
            self.data.len(),
            self.skips
        )
    }
}

impl DocIdSet for WahSet {
    type Iter<'a> = WahIter<'a>;

    fn iter(&self) -> WahIter<'_> {
        WahIter {
            words: self.words(),
            bits: SetBits::EMPTY,
            position: Position::Unpositioned,
            cardinality: self.cardinality,
        }
    }

    #[inline]
    fn cardinality(&self) -> usize {
        self.cardinality
    }

    #[inline]
    fn serialized_len(&self) -> usize {
        self.data.len()
    }

    fn ram_bytes_used(&self) -> usize {
        size_of::<Self>() + self.data.len() + self.skips.ram_bytes_used()
    }
}

impl<'a> IntoIterator for &'a WahSet {
    type Item = DocId;
    type IntoIter = WahIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterates over the docs of a [`WahSet`].
#[derive(Debug, Clone)]
pub struct WahIter<'a> {
    words: WordReader<'a>,
    bits: SetBits,
    position: Position,
    cardinality: usize,
}

impl WahIter<'_> {
    #[inline]
    fn current(&mut self, offset: u32) -> DocId {
        let doc = ((self.words.word_num() as u64) << 3 | offset as u64) as DocId;
        self.position = Position::At(doc);
        doc
    }

    #[inline]
    fn exhaust(&mut self) -> DocId {
        self.position = Position::Exhausted;
        NO_MORE_DOCS
    }

    fn next_unchecked(&mut self) -> DocId {
        if let Some(offset) = self.bits.next() {
            return self.current(offset);
        }
        self.words.next_word();
        if self.words.is_exhausted() {
            return self.exhaust();
        }
        self.bits = SetBits::new(self.words.word());
        debug_assert!(!self.bits.is_empty(), "BUG: decoded a zero word");
        match self.bits.next() {
            Some(offset) => self.current(offset),
            None => self.exhaust(),
        }
    }
}

impl DocIdSetIterator for WahIter<'_> {
    #[inline]
    fn doc_id(&self) -> DocId {
        self.position.doc_id()
    }

    fn next_doc(&mut self) -> Result<DocId, DocSetError> {
        self.position.ensure_not_exhausted()?;
        Ok(self.next_unchecked())
    }

    fn advance(&mut self, target: DocId) -> Result<DocId, DocSetError> {
        self.position.ensure_can_advance(target)?;
        if target == NO_MORE_DOCS {
            return Ok(self.exhaust());
        }
        let target_word = word_num(target) as i64;
        if target_word > self.words.word_num() {
            self.words.advance_word(target_word);
            if self.words.is_exhausted() {
                return Ok(self.exhaust());
            }
            self.bits = SetBits::new(self.words.word());
        }
        loop {
            let doc = self.next_unchecked();
            if doc >= target {
                return Ok(doc);
            }
        }
    }

    #[inline]
    fn cost(&self) -> u64 {
        self.cardinality as u64
    }
}

impl Iterator for WahIter<'_> {
    type Item = DocId;

    fn next(&mut self) -> Option<DocId> {
        match self.position {
            Position::Exhausted => None,
            _ => match self.next_unchecked() {
                NO_MORE_DOCS => None,
                doc => Some(doc),
            },
        }
    }
}

impl FusedIterator for WahIter<'_> {}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use itertools::Itertools;
    use proptest::{collection::btree_set, proptest};

    use super::*;
    use crate::{
        DocSetBuilder,
        testutil::{SetGen, check_advance, check_drain, mkwah, mkwah_with_interval},
    };

    #[test]
    fn test_example_set() {
        let set = mkwah([0, 1, 2, 64, 65, 1000]);
        assert_eq!(set.cardinality(), 6);
        check_drain(&set, &[0, 1, 2, 64, 65, 1000]);

        let mut iter = set.iter();
        assert_eq!(iter.doc_id(), NO_MORE_DOCS);
        assert_eq!(iter.advance(3).unwrap(), 64);
        assert_eq!(iter.doc_id(), 64);
        assert_eq!(iter.advance(2000).unwrap(), NO_MORE_DOCS);
        assert_matches!(iter.next_doc(), Err(DocSetError::Exhausted));
    }

    #[test]
    fn test_empty_set() {
        let set = mkwah([]);
        assert_eq!(set.cardinality(), 0);
        let mut iter = set.iter();
        assert_eq!(iter.next_doc().unwrap(), NO_MORE_DOCS);
        assert_matches!(iter.next_doc(), Err(DocSetError::Exhausted));
        assert_eq!(set.iter().advance(0).unwrap(), NO_MORE_DOCS);
    }

    #[test]
    fn test_iterator_misuse() {
        let set = mkwah([5, 10, 15]);
        let mut iter = set.iter();
        assert_eq!(iter.next_doc().unwrap(), 5);
        assert_matches!(
            iter.advance(5),
            Err(DocSetError::NonIncreasingTarget { target: 5, current: 5 })
        );
        assert_eq!(iter.advance(11).unwrap(), 15);
        assert_eq!(iter.next_doc().unwrap(), NO_MORE_DOCS);
        assert_matches!(iter.advance(100), Err(DocSetError::Exhausted));
    }

    #[test]
    fn test_largest_doc() {
        let max = NO_MORE_DOCS - 1;
        let set = mkwah([0, max - 8, max]);
        check_drain(&set, &[0, max - 8, max]);
        assert_eq!(set.iter().advance(max).unwrap(), max);
        assert_eq!(set.iter().advance(NO_MORE_DOCS).unwrap(), NO_MORE_DOCS);
    }

    #[test]
    fn test_dense_runs() {
        // long all-ones runs interleaved with zero runs
        let docs = (0..20_000u32)
            .filter(|d| (d / 1000) % 2 == 0 || d % 97 == 0)
            .collect_vec();
        let set = mkwah(docs.iter().copied());
        check_drain(&set, &docs);
        check_advance(&set, &docs, (0..20_000).step_by(37));
        // a 1000-doc all-ones run is ~125 words, far less than 1000 bytes
        assert!(set.serialized_len() < docs.len() / 4, "{set:?}");
    }

    #[test]
    fn test_skip_index_agrees_with_linear_scan() {
        let mut setgen = SetGen::new(0xDEAD_BEEF);
        // every cluster starts at least one new sequence
        let docs = setgen.clustered(500, 40, 64);
        let indexed = mkwah_with_interval(docs.iter().copied(), 8);
        let linear = mkwah_with_interval(docs.iter().copied(), usize::MAX);

        assert_eq!(indexed.as_bytes(), linear.as_bytes());
        assert!(indexed.skip_index().len() >= 50, "{indexed:?}");
        assert!(linear.skip_index().is_sentinel());

        let last = *docs.last().unwrap();
        for step in [7, 100, 1_000, 25_000, 300_000] {
            let targets = (0..=last + 1).step_by(step).collect_vec();
            check_advance(&indexed, &docs, targets.iter().copied());
            check_advance(&linear, &docs, targets.iter().copied());
        }
    }

    #[test]
    fn test_add_docs_from_iterator() {
        let source = mkwah([3, 9, 27, 81]);
        let mut builder = WahBuilder::default();
        builder.add_docs(&mut source.iter()).unwrap();
        assert_eq!(builder.build().unwrap(), source);
    }

    #[test]
    fn test_ram_bytes_used() {
        let set = mkwah(0..10_000);
        assert!(set.ram_bytes_used() >= set.serialized_len());
        assert!(WahSet::empty().ram_bytes_used() < 256);
    }

    proptest! {
        #[test]
        fn test_wah_roundtrip_proptest(docs in btree_set(0u32..100_000, 0..2000)) {
            let docs = docs.into_iter().collect_vec();
            let set = mkwah(docs.iter().copied());
            assert_eq!(set.cardinality(), docs.len());
            check_drain(&set, &docs);
        }

        #[test]
        fn test_wah_advance_proptest(
            docs in btree_set(0u32..50_000, 1..3000),
            targets in btree_set(0u32..60_000, 1..200),
        ) {
            let docs = docs.into_iter().collect_vec();
            let set = mkwah_with_interval(docs.iter().copied(), 8);
            check_advance(&set, &docs, targets);
        }
    }
}
