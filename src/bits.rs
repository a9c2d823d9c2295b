//! Byte-level population counts and set-bit listings shared by both codecs.

use std::iter::FusedIterator;

static_assertions::const_assert_eq!(BIT_POSITIONS[0xFF], 0x8765_4321);

const POP_COUNT: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut b = 0;
    while b < 256 {
        let mut count = 0;
        let mut v = b;
        while v != 0 {
            count += v & 1;
            v >>= 1;
        }
        table[b] = count as u8;
        b += 1;
    }
    table
};

/// For each byte, the 1-based positions of its set bits packed one nibble per
/// position, lowest position in the lowest nibble. A byte has at most 8 set
/// bits so the list always fits in a `u32`.
const BIT_POSITIONS: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut b = 0;
    while b < 256 {
        let mut list = 0u32;
        let mut shift = 0;
        let mut bit = 0;
        while bit < 8 {
            if b & (1 << bit) != 0 {
                list |= (bit as u32 + 1) << shift;
                shift += 4;
            }
            bit += 1;
        }
        table[b] = list;
        b += 1;
    }
    table
};

/// Returns the number of bits set in `byte`.
#[inline(always)]
pub fn pop_count(byte: u8) -> u32 {
    POP_COUNT[byte as usize] as u32
}

/// Returns the packed list of 1-based set-bit positions of `byte`.
///
/// ```
/// // bits 0 and 3 are set
/// assert_eq!(docset_rs::bits::bit_positions(0b1001), 0x41);
/// ```
#[inline(always)]
pub fn bit_positions(byte: u8) -> u32 {
    BIT_POSITIONS[byte as usize]
}

/// Walks the set bits of a single byte in ascending order, yielding 0-based
/// offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetBits {
    list: u32,
}

impl SetBits {
    pub const EMPTY: Self = SetBits { list: 0 };

    #[inline]
    pub fn new(byte: u8) -> Self {
        Self { list: bit_positions(byte) }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.list == 0
    }
}

impl Iterator for SetBits {
    type Item = u32;

    #[inline]
    fn next(&mut self) -> Option<u32> {
        if self.list == 0 {
            return None;
        }
        let offset = (self.list & 0x0F) - 1;
        self.list >>= 4;
        Some(offset)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        // positions are non-zero nibbles packed from the bottom
        let len = (u32::BITS - self.list.leading_zeros()).div_ceil(4) as usize;
        (len, Some(len))
    }
}

impl ExactSizeIterator for SetBits {}
impl FusedIterator for SetBits {}
