use crate::{
    DocId, NO_MORE_DOCS,
    bits::SetBits,
    pfor::{
        BITS_MASK, BLOCK_SIZE, HAS_EXCEPTIONS, LAST_BLOCK, MAX_EXCEPTIONS, UNARY,
        bitpack::{packed_len, unpack_into},
    },
};

/// Decodes a PFOR buffer one block at a time.
#[derive(Debug, Clone)]
pub(crate) struct BlockDecoder<'a> {
    data: &'a [u8],
    /// Offset of the next block.
    offset: usize,
    /// Index of the next block.
    block_num: usize,
    /// The smallest doc the next block can contain.
    base: DocId,
    /// True once the last block was decoded.
    done: bool,

    docs: [DocId; BLOCK_SIZE],
    len: usize,
    exceptions: [u32; MAX_EXCEPTIONS],
}

impl<'a> BlockDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            block_num: 0,
            base: 0,
            done: data.is_empty(),
            docs: [0; BLOCK_SIZE],
            len: 0,
            exceptions: [0; MAX_EXCEPTIONS],
        }
    }

    /// The docs of the current block.
    #[inline]
    pub fn docs(&self) -> &[DocId] {
        &self.docs[..self.len]
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The smallest doc the next block can contain.
    #[inline]
    pub fn base(&self) -> DocId {
        self.base
    }

    #[inline]
    pub fn block_num(&self) -> usize {
        self.block_num
    }

    /// Moves to the block starting at `offset`, dropping the current one.
    pub fn seek(&mut self, offset: usize, block_num: usize, base: DocId) {
        debug_assert!(offset > self.offset, "BUG: seek must move forward");
        self.offset = offset;
        self.block_num = block_num;
        self.base = base;
        self.len = 0;
    }

    /// Decodes the next block. Returns false once every block was decoded.
    pub fn decode_next(&mut self) -> bool {
        if self.done {
            return false;
        }
        let data = self.data;
        let token = data[self.offset];
        self.offset += 1;

        let unary = token & UNARY != 0;
        if unary {
            self.decode_unary();
        } else {
            self.decode_packed(token);
        }

        self.done = token & LAST_BLOCK != 0;
        self.len = if self.done {
            let len = data[self.offset] as usize;
            self.offset += 1;
            len
        } else {
            BLOCK_SIZE
        };

        if !unary {
            // only the real gaps, padding is overwritten below
            let mut next = self.base;
            for doc in &mut self.docs[..self.len] {
                *doc += next;
                next = *doc + 1;
            }
        }
        self.docs[self.len..].fill(NO_MORE_DOCS);
        if let Some(&last) = self.docs().last() {
            self.base = last + 1;
        }
        self.block_num += 1;
        true
    }

    fn decode_packed(&mut self, token: u8) {
        let data = self.data;
        let bits = (token & BITS_MASK) as u32;
        unpack_into(&data[self.offset..], bits, &mut self.docs);
        self.offset += packed_len(BLOCK_SIZE, bits);

        if token & HAS_EXCEPTIONS != 0 {
            let count = data[self.offset] as usize;
            let exception_bits = data[self.offset + 1] as u32;
            self.offset += 2;

            let exceptions = &mut self.exceptions[..count];
            unpack_into(&data[self.offset..], exception_bits, exceptions);
            self.offset += packed_len(count, exception_bits);

            let indices = &data[self.offset..self.offset + count];
            for (&high, &idx) in exceptions.iter().zip(indices) {
                self.docs[idx as usize] |= high << bits;
            }
            self.offset += count;
        }
    }

    fn decode_unary(&mut self) {
        // padding gaps decode past the real docs and may wrap around
        let mut byte_base = self.base;
        let mut i = 0;
        while i < BLOCK_SIZE {
            let byte = self.data[self.offset];
            self.offset += 1;
            for offset in SetBits::new(byte) {
                self.docs[i] = byte_base.wrapping_add(offset);
                i += 1;
            }
            byte_base = byte_base.wrapping_add(8);
        }
        debug_assert_eq!(i, BLOCK_SIZE, "BUG: unary block overruns");
    }
}
