//! Fixed-width bit packing, least significant bit first.
//!
//! Value `i` of a packed array of width `b` occupies bits `i * b..(i + 1) * b`
//! of the little-endian bit stream, and the stream is padded with zeros to
//! the next byte.

use bytes::BufMut;

/// The number of bits needed to represent `value`.
#[inline]
pub(crate) fn bits_required(value: u32) -> u32 {
    u32::BITS - value.leading_zeros()
}

/// The number of bytes taken by `count` values packed at `bits` bits.
#[inline]
pub(crate) fn packed_len(count: usize, bits: u32) -> usize {
    (count * bits as usize).div_ceil(8)
}

/// Packs the low `bits` bits of each value.
pub(crate) fn pack<B: BufMut>(values: &[u32], bits: u32, out: &mut B) {
    debug_assert!(bits <= u32::BITS);
    if bits == 0 {
        return;
    }
    let mask = (1u64 << bits) - 1;
    let mut acc = 0u64;
    let mut filled = 0;
    for &value in values {
        acc |= (value as u64 & mask) << filled;
        filled += bits;
        while filled >= 8 {
            out.put_u8(acc as u8);
            acc >>= 8;
            filled -= 8;
        }
    }
    if filled > 0 {
        out.put_u8(acc as u8);
    }
}

/// Unpacks `out.len()` values of width `BITS` from the start of `input`.
fn unpack<const BITS: u32>(input: &[u8], out: &mut [u32]) {
    if BITS == 0 {
        out.fill(0);
        return;
    }
    let mask = (1u64 << BITS) - 1;
    let mut acc = 0u64;
    let mut filled = 0;
    let mut pos = 0;
    for slot in out.iter_mut() {
        while filled < BITS {
            acc |= (input[pos] as u64) << filled;
            pos += 1;
            filled += 8;
        }
        *slot = (acc & mask) as u32;
        acc >>= BITS;
        filled -= BITS;
    }
}

type Unpacker = fn(&[u8], &mut [u32]);

macro_rules! unpackers {
    ($($bits:literal)*) => {
        [$(unpack::<$bits> as Unpacker),*]
    };
}

static UNPACKERS: [Unpacker; 33] = unpackers!(
    0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16
    17 18 19 20 21 22 23 24 25 26 27 28 29 30 31 32
);

/// Unpacks `out.len()` values of width `bits`, using a decoder specialized
/// for that width.
#[inline]
pub(crate) fn unpack_into(input: &[u8], bits: u32, out: &mut [u32]) {
    UNPACKERS[bits as usize](input, out)
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;
    use proptest::{collection::vec, proptest};

    use super::*;

    #[test]
    fn test_bits_required() {
        assert_eq!(bits_required(0), 0);
        assert_eq!(bits_required(1), 1);
        assert_eq!(bits_required(2), 2);
        assert_eq!(bits_required(255), 8);
        assert_eq!(bits_required(256), 9);
        assert_eq!(bits_required(u32::MAX), 32);
    }

    #[test]
    fn test_pack_layout() {
        let mut out: Vec<u8> = vec![];
        pack(&[1, 2, 3, 0b111], 3, &mut out);
        // 001 010 011 111, least significant bits first
        assert_eq!(out, vec![0b1101_0001, 0b0000_1110]);
        assert_eq!(out.len(), packed_len(4, 3));

        // bits above the width are dropped
        let mut out: Vec<u8> = vec![];
        pack(&[0xFFFF_FF01], 4, &mut out);
        assert_eq!(out, vec![0x01]);
    }

    #[test]
    fn test_zero_width() {
        let mut out: Vec<u8> = vec![];
        pack(&[0; 128], 0, &mut out);
        assert!(out.is_empty());
        let mut values = [7u32; 128];
        unpack_into(&[], 0, &mut values);
        assert_eq!(values, [0; 128]);
    }

    proptest! {
        #[test]
        fn test_pack_unpack_proptest(bits in 0u32..=32, seeds in vec(proptest::num::u32::ANY, 0..200)) {
            let mask = if bits == 32 { u32::MAX } else { (1u32 << bits) - 1 };
            let values = seeds.iter().map(|v| v & mask).collect_vec();
            let mut packed: Vec<u8> = vec![];
            pack(&values, bits, &mut packed);
            assert_eq!(packed.len(), packed_len(values.len(), bits));

            let mut unpacked = vec![0u32; values.len()];
            unpack_into(&packed, bits, &mut unpacked);
            assert_eq!(unpacked, values);
        }
    }
}
