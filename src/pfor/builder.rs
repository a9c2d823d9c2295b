use bitvec::{order::Lsb0, vec::BitVec};
use bytes::{BufMut, BytesMut};

use crate::{
    DocId, DocSetError,
    pfor::{
        BLOCK_SIZE, DEFAULT_INDEX_INTERVAL, HAS_EXCEPTIONS, LAST_BLOCK, MAX_BITS_PER_VALUE,
        MAX_EXCEPTIONS, PforSet, UNARY,
        bitpack::{bits_required, pack, packed_len},
        decoder::BlockDecoder,
    },
    skip::{SkipIndex, SkipIndexBuilder},
    traits::{AddState, DocSetBuilder},
};

/// The bit width picked for a packed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockLayout {
    pub bits: u32,
    pub exceptions: usize,
    /// The width of the widest gap in the block.
    pub max_bits: u32,
}

impl BlockLayout {
    #[inline]
    pub fn exception_bits(&self) -> u32 {
        self.max_bits - self.bits
    }

    /// The encoded size of the block, without its header and length bytes.
    pub fn body_len(&self) -> usize {
        let mut len = packed_len(BLOCK_SIZE, self.bits);
        if self.exceptions > 0 {
            // count, width, packed high bits and one index byte per exception
            len += 2 + self.exceptions + packed_len(self.exceptions, self.exception_bits());
        }
        len
    }

    /// Picks the width which minimizes the block size, moving gaps which do
    /// not fit into exceptions. On ties the wider width wins.
    pub fn optimal(gaps: &[u32; BLOCK_SIZE]) -> Self {
        let mut freqs = [0usize; u32::BITS as usize + 1];
        for &gap in gaps {
            freqs[bits_required(gap) as usize] += 1;
        }
        let max_bits = freqs.iter().rposition(|&f| f > 0).unwrap_or(0) as u32;

        let mut bits = max_bits.min(MAX_BITS_PER_VALUE);
        let mut exceptions: usize = freqs[bits as usize + 1..].iter().sum();
        let mut best = BlockLayout { bits, exceptions, max_bits };
        let mut best_len = best.body_len();

        while bits > 0 {
            bits -= 1;
            exceptions += freqs[bits as usize + 1];
            if exceptions > MAX_EXCEPTIONS {
                break;
            }
            let candidate = BlockLayout { bits, exceptions, max_bits };
            let len = candidate.body_len();
            if len < best_len {
                best = candidate;
                best_len = len;
            }
        }
        best
    }
}

/// The number of bits of the unary encoding of `gaps`: one set bit per gap,
/// preceded by as many zeros as the gap.
fn unary_bits(gaps: &[u32; BLOCK_SIZE]) -> u64 {
    gaps.iter().map(|&gap| gap as u64 + 1).sum()
}

/// Encodes blocks of gaps into PFOR or unary blocks.
#[derive(Debug)]
pub(crate) struct BlockEncoder {
    out: BytesMut,
    index_interval: usize,

    gaps: [u32; BLOCK_SIZE],
    len: usize,
    /// The smallest doc the next gap can be relative to.
    next_base: DocId,

    num_blocks: usize,
    cardinality: usize,

    exceptions: Vec<u32>,
    exception_indices: Vec<u8>,
}

impl BlockEncoder {
    pub fn new(index_interval: usize) -> Self {
        Self {
            out: BytesMut::with_capacity(1024),
            index_interval,
            gaps: [0; BLOCK_SIZE],
            len: 0,
            next_base: 0,
            num_blocks: 0,
            cardinality: 0,
            exceptions: Vec::with_capacity(MAX_EXCEPTIONS),
            exception_indices: Vec::with_capacity(MAX_EXCEPTIONS),
        }
    }

    /// Adds a doc greater than or equal to `next_base`.
    pub fn push(&mut self, doc: DocId) {
        debug_assert!(doc >= self.next_base, "BUG: docs must be added in order");
        self.gaps[self.len] = doc - self.next_base;
        self.len += 1;
        self.next_base = doc + 1;
        self.cardinality += 1;
        if self.len == BLOCK_SIZE {
            self.encode_block(false);
        }
    }

    fn encode_block(&mut self, last: bool) {
        let start = self.out.len();

        self.gaps[self.len..].fill(0);
        let layout = BlockLayout::optimal(&self.gaps);
        let unary_len = unary_bits(&self.gaps).div_ceil(8);
        let flags = if last { LAST_BLOCK } else { 0 };

        let body_len = if layout.body_len() as u64 <= unary_len {
            let mut token = flags | layout.bits as u8;
            if layout.exceptions > 0 {
                token |= HAS_EXCEPTIONS;
            }
            self.out.put_u8(token);
            self.pack_block(layout);
            layout.body_len()
        } else {
            self.out.put_u8(UNARY | flags);
            self.unary_block();
            unary_len as usize
        };
        if last {
            self.out.put_u8(self.len as u8);
        }

        debug_assert_eq!(
            self.out.len() - start,
            1 + body_len + usize::from(last),
            "BUG: block size does not match its layout"
        );
        log::trace!(
            "encoded PFOR block {}: len={} bytes={}",
            self.num_blocks,
            self.len,
            self.out.len() - start
        );

        self.num_blocks += 1;
        self.len = 0;
    }

    fn pack_block(&mut self, layout: BlockLayout) {
        pack(&self.gaps, layout.bits, &mut self.out);
        if layout.exceptions == 0 {
            return;
        }

        let mask = (1u32 << layout.bits) - 1;
        self.exceptions.clear();
        self.exception_indices.clear();
        for (i, &gap) in self.gaps.iter().enumerate() {
            if gap > mask {
                self.exceptions.push(gap >> layout.bits);
                self.exception_indices.push(i as u8);
            }
        }
        debug_assert_eq!(self.exceptions.len(), layout.exceptions);

        let exception_bits = layout.exception_bits();
        self.out.put_u8(layout.exceptions as u8);
        self.out.put_u8(exception_bits as u8);
        pack(&self.exceptions, exception_bits, &mut self.out);
        self.out.put_slice(&self.exception_indices);
    }

    fn unary_block(&mut self) {
        let mut bits: BitVec<u8, Lsb0> = BitVec::repeat(false, unary_bits(&self.gaps) as usize);
        let mut pos = 0;
        for &gap in &self.gaps {
            pos += gap as usize;
            bits.set(pos, true);
            pos += 1;
        }
        self.out.put_slice(bits.as_raw_slice());
    }

    pub fn finish(mut self) -> PforSet {
        if self.cardinality == 0 {
            return PforSet::empty_with_interval(self.index_interval);
        }
        // the last block is always written, even if empty, so that readers
        // find its length trailer
        self.encode_block(true);
        let data = self.out.freeze();
        let skips = build_skip_index(&data, self.num_blocks, self.index_interval);

        log::debug!(
            "built PFOR set: cardinality={} bytes={} blocks={} checkpoints={}",
            self.cardinality,
            data.len(),
            self.num_blocks,
            skips.len()
        );

        PforSet::new(data, self.cardinality, self.num_blocks, skips)
    }
}

/// Replays the encoded blocks, recording a checkpoint every `interval`
/// blocks keyed by the smallest doc the block can hold.
fn build_skip_index(data: &[u8], num_blocks: usize, interval: usize) -> SkipIndex {
    let num_checkpoints = (num_blocks - 1) / interval + 1;
    let mut builder = SkipIndexBuilder::with_capacity(interval, num_checkpoints);
    if num_checkpoints <= 1 {
        return builder.freeze();
    }

    builder.append(0, 0);
    let mut blocks = BlockDecoder::new(data);
    for _ in 1..num_checkpoints {
        for _ in 0..interval {
            let decoded = blocks.decode_next();
            assert!(decoded, "BUG: fewer blocks than counted");
        }
        builder.append(blocks.base(), blocks.offset());
    }
    builder.freeze()
}

/// Builds a [`PforSet`] from docs added in strictly increasing order.
///
/// ```
/// use docset_rs::{DocIdSet, DocSetBuilder, PforBuilder};
///
/// let mut builder = PforBuilder::default();
/// builder.add_all((0..10_000).step_by(7)).unwrap();
/// let set = builder.build().unwrap();
/// assert_eq!(set.cardinality(), 1429);
/// assert_eq!(set.num_blocks(), 12);
/// ```
#[derive(Debug)]
pub struct PforBuilder {
    encoder: BlockEncoder,
    state: AddState,
}

impl Default for PforBuilder {
    fn default() -> Self {
        Self {
            encoder: BlockEncoder::new(DEFAULT_INDEX_INTERVAL),
            state: AddState::Empty,
        }
    }
}

impl DocSetBuilder for PforBuilder {
    type Output = PforSet;

    fn set_index_interval(&mut self, interval: usize) -> Result<(), DocSetError> {
        DocSetError::ensure_index_interval(interval)?;
        self.state.ensure_configurable()?;
        self.encoder = BlockEncoder::new(interval);
        Ok(())
    }

    fn add(&mut self, doc: DocId) -> Result<(), DocSetError> {
        self.state.accept(doc)?;
        self.encoder.push(doc);
        Ok(())
    }

    fn build(self) -> Result<PforSet, DocSetError> {
        self.state.ensure_buildable()?;
        Ok(self.encoder.finish())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::{DocIdSet, NO_MORE_DOCS};

    fn padded(gaps: &[u32]) -> [u32; BLOCK_SIZE] {
        let mut out = [0; BLOCK_SIZE];
        out[..gaps.len()].copy_from_slice(gaps);
        out
    }

    #[test]
    fn test_optimal_layout_without_outliers() {
        let layout = BlockLayout::optimal(&[5; BLOCK_SIZE]);
        assert_eq!(layout, BlockLayout { bits: 3, exceptions: 0, max_bits: 3 });
        assert_eq!(layout.body_len(), 48);

        let layout = BlockLayout::optimal(&[0; BLOCK_SIZE]);
        assert_eq!(layout, BlockLayout { bits: 0, exceptions: 0, max_bits: 0 });
        assert_eq!(layout.body_len(), 0);
    }

    #[test]
    fn test_optimal_layout_with_outlier() {
        let mut gaps = [1; BLOCK_SIZE];
        gaps[BLOCK_SIZE - 1] = 1_000_000;
        let layout = BlockLayout::optimal(&gaps);
        assert_eq!(layout, BlockLayout { bits: 1, exceptions: 1, max_bits: 20 });
        // 16 packed bytes, count, width, 3 bytes of high bits, one index
        assert_eq!(layout.body_len(), 16 + 2 + 3 + 1);
    }

    #[test]
    fn test_optimal_layout_caps_exceptions() {
        // 25 outliers are one too many to patch
        let mut gaps = [1; BLOCK_SIZE];
        gaps[..25].fill(1 << 12);
        let layout = BlockLayout::optimal(&gaps);
        assert_eq!(layout, BlockLayout { bits: 13, exceptions: 0, max_bits: 13 });

        gaps[0] = 1;
        let layout = BlockLayout::optimal(&gaps);
        assert_eq!(layout.bits, 1);
        assert_eq!(layout.exceptions, 24);
    }

    #[test]
    fn test_optimal_layout_full_width_gap() {
        let layout = BlockLayout::optimal(&padded(&[u32::MAX - 1]));
        assert_eq!(layout.max_bits, 32);
        assert_eq!(layout, BlockLayout { bits: 0, exceptions: 1, max_bits: 32 });
        assert_eq!(layout.exception_bits(), 32);
    }

    #[test]
    fn test_unary_bits() {
        assert_eq!(unary_bits(&[0; BLOCK_SIZE]), 128);
        assert_eq!(unary_bits(&padded(&[3, 1])), 128 + 4);
    }

    #[test]
    fn test_builder_errors() {
        let mut builder = PforBuilder::default();
        assert_matches!(
            builder.set_index_interval(1),
            Err(DocSetError::InvalidIndexInterval { interval: 1, min: 8 })
        );
        builder.set_index_interval(16).unwrap();
        builder.add(3).unwrap();
        assert_matches!(builder.set_index_interval(32), Err(DocSetError::AlreadyStarted));
        assert_matches!(builder.add(2), Err(DocSetError::OutOfOrder { doc: 2, last: 3 }));
        assert_matches!(builder.add(4), Err(DocSetError::Poisoned));
        assert_matches!(builder.build(), Err(DocSetError::Poisoned));

        let mut builder = PforBuilder::default();
        assert_matches!(
            builder.add(NO_MORE_DOCS),
            Err(DocSetError::OutOfRange(NO_MORE_DOCS))
        );
    }

    #[test]
    fn test_empty_build() {
        let set = PforBuilder::default().build().unwrap();
        assert!(set.is_empty());
        assert_eq!(set.serialized_len(), 0);
        assert_eq!(set.num_blocks(), 0);
    }

    #[test]
    fn test_single_doc_layout() {
        let mut builder = PforBuilder::default();
        builder.add(5).unwrap();
        let set = builder.build().unwrap();
        // a zero-width last block patched with the 3-bit gap, then the
        // length trailer
        let expected = vec![LAST_BLOCK | HAS_EXCEPTIONS, 1, 3, 0b101, 0, 1];
        assert_eq!(set.as_bytes(), expected.as_slice());
    }
}
