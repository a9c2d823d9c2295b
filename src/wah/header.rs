//! The token introducing each WAH sequence.
//!
//! ```text
//!   bit 7     all-ones: the clean run is made of 0xFF words
//!   bit 6     the clean length continues in a varint
//!   bits 4-5  low 2 bits of the clean length
//!   bit 3     the dirty length continues in a varint
//!   bits 0-2  low 3 bits of the dirty length
//! ```
//!
//! Clean runs are at least 2 words long so their length is stored minus 2,
//! except for the first sequence of a buffer which may start with any number
//! of zero words, including none.

use bytes::BufMut;

const ALL_ONES: u8 = 1 << 7;
const CLEAN_CONTINUES: u8 = 1 << 6;
const DIRTY_CONTINUES: u8 = 1 << 3;

const CLEAN_LOW_BITS: u32 = 2;
const DIRTY_LOW_BITS: u32 = 3;

/// The smallest clean run after the first sequence.
pub(crate) const MIN_CLEAN_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SequenceHeader {
    pub all_ones: bool,
    pub clean_len: usize,
    pub dirty_len: usize,
}

impl SequenceHeader {
    /// Writes this header. `first` must be true only for the sequence at
    /// offset 0.
    pub fn encode<B: BufMut>(&self, first: bool, out: &mut B) {
        let clean = if first {
            self.clean_len
        } else {
            assert!(
                self.clean_len >= MIN_CLEAN_LEN,
                "BUG: clean run of {} words is too short",
                self.clean_len
            );
            self.clean_len - MIN_CLEAN_LEN
        };
        let dirty = self.dirty_len;

        let clean_mask = (1 << CLEAN_LOW_BITS) - 1;
        let dirty_mask = (1 << DIRTY_LOW_BITS) - 1;

        let mut token = (((clean & clean_mask) as u8) << 4) | (dirty & dirty_mask) as u8;
        if self.all_ones {
            token |= ALL_ONES;
        }
        if clean > clean_mask {
            token |= CLEAN_CONTINUES;
        }
        if dirty > dirty_mask {
            token |= DIRTY_CONTINUES;
        }

        out.put_u8(token);
        if clean > clean_mask {
            put_vint(out, clean >> CLEAN_LOW_BITS);
        }
        if dirty > dirty_mask {
            put_vint(out, dirty >> DIRTY_LOW_BITS);
        }
    }

    /// Reads the header starting at `*pos`, leaving `*pos` on the first dirty
    /// byte.
    pub fn decode(data: &[u8], pos: &mut usize) -> Self {
        let first = *pos == 0;
        let token = data[*pos];
        *pos += 1;

        let mut clean = ((token >> 4) & 0x03) as usize;
        if token & CLEAN_CONTINUES != 0 {
            clean |= get_vint(data, pos) << CLEAN_LOW_BITS;
        }
        if !first {
            clean += MIN_CLEAN_LEN;
        }

        let mut dirty = (token & 0x07) as usize;
        if token & DIRTY_CONTINUES != 0 {
            dirty |= get_vint(data, pos) << DIRTY_LOW_BITS;
        }

        SequenceHeader {
            all_ones: token & ALL_ONES != 0,
            clean_len: clean,
            dirty_len: dirty,
        }
    }
}

fn put_vint<B: BufMut>(out: &mut B, mut value: usize) {
    while value >= 0x80 {
        out.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    out.put_u8(value as u8);
}

fn get_vint(data: &[u8], pos: &mut usize) -> usize {
    let mut value = 0usize;
    let mut shift = 0;
    loop {
        let byte = data[*pos];
        *pos += 1;
        value |= ((byte & 0x7F) as usize) << shift;
        if byte & 0x80 == 0 {
            return value;
        }
        shift += 7;
    }
}
