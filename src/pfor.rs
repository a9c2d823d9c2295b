//! Patched frame-of-reference (PFOR) encoding of doc gaps.
//!
//! Docs are turned into gaps (`doc - previous - 1`, the first doc counting
//! from `-1`) and grouped into blocks of [`BLOCK_SIZE`]. Each block is either
//! bit packed at the width which minimizes its size, with up to
//! [`MAX_EXCEPTIONS`] wider gaps patched in afterwards, or written as a unary
//! bitmap when that is smaller.
//!
//! ```text
//! block := token packed [exceptions] [len]      (packed)
//!        | token bitmap [len]                   (unary)
//!
//! token:  bit 7 unary, bit 6 has exceptions, bit 5 last block,
//!         bits 0-4 width of the packed gaps
//! exceptions := count:u8 width:u8 packed-high-bits index:u8*count
//! ```
//!
//! The last block is always present, may hold fewer than [`BLOCK_SIZE`]
//! docs (possibly none), and ends with its length.

use std::{fmt::Debug, iter::FusedIterator};

use bytes::Bytes;

use crate::{
    DocId, DocSetError, NO_MORE_DOCS,
    skip::SkipIndex,
    traits::{DocIdSet, DocIdSetIterator, Position},
};

mod bitpack;
mod builder;
mod decoder;

pub use builder::PforBuilder;

use decoder::BlockDecoder;

/// The number of docs per block.
pub const BLOCK_SIZE: usize = 128;

/// The maximum number of patched gaps per block.
pub const MAX_EXCEPTIONS: usize = 24;

/// The default number of blocks between two skip index checkpoints.
pub const DEFAULT_INDEX_INTERVAL: usize = 8;

const UNARY: u8 = 1 << 7;
const HAS_EXCEPTIONS: u8 = 1 << 6;
const LAST_BLOCK: u8 = 1 << 5;
const BITS_MASK: u8 = 0x1F;

/// The widest packed gap which fits in a token. Wider gaps are exceptions.
const MAX_BITS_PER_VALUE: u32 = BITS_MASK as u32;

static_assertions::const_assert!(MAX_EXCEPTIONS <= u8::MAX as usize);
static_assertions::const_assert!(BLOCK_SIZE <= u8::MAX as usize + 1);

/// An immutable PFOR-encoded set of doc ids.
#[derive(Clone, PartialEq, Eq)]
pub struct PforSet {
    data: Bytes,
    cardinality: usize,
    num_blocks: usize,
    skips: SkipIndex,
}

impl PforSet {
    pub(crate) fn new(data: Bytes, cardinality: usize, num_blocks: usize, skips: SkipIndex) -> Self {
        Self { data, cardinality, num_blocks, skips }
    }

    pub(crate) fn empty_with_interval(index_interval: usize) -> Self {
        Self::new(Bytes::new(), 0, 0, SkipIndex::sentinel(index_interval))
    }

    /// An empty set.
    pub fn empty() -> Self {
        Self::empty_with_interval(DEFAULT_INDEX_INTERVAL)
    }

    /// Builds a set from docs in strictly increasing order.
    pub fn from_sorted<I: IntoIterator<Item = DocId>>(docs: I) -> Result<Self, DocSetError> {
        use crate::DocSetBuilder;
        let mut builder = PforBuilder::default();
        builder.add_all(docs)?;
        builder.build()
    }

    /// The encoded blocks.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The number of encoded blocks, including the trailing last block.
    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    #[inline]
    pub fn skip_index(&self) -> &SkipIndex {
        &self.skips
    }

    /// The number of blocks between two skip index checkpoints.
    #[inline]
    pub fn index_interval(&self) -> usize {
        self.skips.interval()
    }
}

impl Default for PforSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl Debug for PforSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PforSet(cardinality={}, bytes={}, blocks={}, {:?})",
            self.cardinality,
            self.data.len(),
            self.num_blocks,
            self.skips
        )
    }
}

impl DocIdSet for PforSet {
    type Iter<'a> = PforIter<'a>;

    fn iter(&self) -> PforIter<'_> {
        PforIter {
            blocks: BlockDecoder::new(&self.data),
            skips: &self.skips,
            next: 0,
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

impl<'a> IntoIterator for &'a PforSet {
    type Item = DocId;
    type IntoIter = PforIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterates over the docs of a [`PforSet`].
#[derive(Debug, Clone)]
pub struct PforIter<'a> {
    blocks: BlockDecoder<'a>,
    skips: &'a SkipIndex,
    /// Index of the next doc within the current block.
    next: usize,
    position: Position,
    cardinality: usize,
}

impl PforIter<'_> {
    #[inline]
    fn exhaust(&mut self) -> DocId {
        self.position = Position::Exhausted;
        NO_MORE_DOCS
    }

    fn next_unchecked(&mut self) -> DocId {
        while self.next >= self.blocks.docs().len() {
            if !self.blocks.decode_next() {
                return self.exhaust();
            }
            self.next = 0;
        }
        let doc = self.blocks.docs()[self.next];
        self.next += 1;
        self.position = Position::At(doc);
        doc
    }

    /// Jumps to the last checkpoint whose base is at most `target`. The index
    /// is only searched when a checkpoint past the next block is in reach.
    /// Returns true if the decoder moved.
    fn skip_to(&mut self, target: DocId) -> bool {
        let interval = self.skips.interval();
        let from = self.blocks.block_num() / interval;
        if from + 1 >= self.skips.len() || self.skips.checkpoint(from + 1).key > target {
            return false;
        }
        let idx = self.skips.find_floor(target, from + 1);
        let checkpoint = self.skips.checkpoint(idx);
        if checkpoint.offset > self.blocks.offset() {
            self.blocks.seek(checkpoint.offset, idx * interval, checkpoint.key);
            return true;
        }
        false
    }
}

impl DocIdSetIterator for PforIter<'_> {
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

        if self.blocks.docs().last().is_none_or(|&last| last < target) {
            self.skip_to(target);
            loop {
                if !self.blocks.decode_next() {
                    return Ok(self.exhaust());
                }
                if self.blocks.docs().last().is_some_and(|&last| last >= target) {
                    break;
                }
            }
            self.next = 0;
        }

        self.next += self.blocks.docs()[self.next..].partition_point(|&doc| doc < target);
        Ok(self.next_unchecked())
    }

    #[inline]
    fn cost(&self) -> u64 {
        self.cardinality as u64
    }
}

impl Iterator for PforIter<'_> {
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

impl FusedIterator for PforIter<'_> {}
