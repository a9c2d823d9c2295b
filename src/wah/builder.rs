use bytes::{BufMut, BytesMut};

use crate::{
    DocId, DocSetError,
    bits::pop_count,
    skip::{SkipIndex, SkipIndexBuilder},
    traits::{AddState, DocSetBuilder},
    wah::{DEFAULT_INDEX_INTERVAL, WahSet, header::SequenceHeader, reader::WordReader, word_num},
};

/// Encodes non-zero words into WAH sequences.
///
/// Words must be added with strictly increasing word numbers. Zero words are
/// never added: they are implied by the gaps between word numbers.
#[derive(Debug)]
pub(crate) struct WordEncoder {
    out: BytesMut,
    dirty: Vec<u8>,
    clean: usize,
    all_ones: bool,
    last_word_num: Option<u32>,
    num_sequences: usize,
    cardinality: usize,
    index_interval: usize,
}

impl WordEncoder {
    pub fn new(index_interval: usize) -> Self {
        Self {
            out: BytesMut::with_capacity(1024),
            dirty: Vec::with_capacity(128),
            clean: 0,
            all_ones: false,
            last_word_num: None,
            num_sequences: 0,
            cardinality: 0,
            index_interval,
        }
    }

    fn write_sequence(&mut self) {
        debug_assert!(
            !self.dirty.windows(2).any(|w| w == [0, 0] || w == [0xFF, 0xFF]),
            "BUG: inconsistent dirty words"
        );
        let header = SequenceHeader {
            all_ones: self.all_ones,
            clean_len: self.clean,
            dirty_len: self.dirty.len(),
        };
        header.encode(self.num_sequences == 0, &mut self.out);
        self.out.put_slice(&self.dirty);
        self.dirty.clear();
        self.num_sequences += 1;
    }

    /// Whether the last buffered dirty word is all ones.
    #[inline]
    fn peek_ones(&self) -> bool {
        self.dirty.last() == Some(&0xFF)
    }

    pub fn add_word(&mut self, word_num: u32, word: u8) {
        debug_assert_ne!(word, 0, "BUG: zero words are implicit");

        match self.last_word_num {
            None => {
                // the first sequence may start with any number of zero words
                self.clean = word_num as usize;
                self.dirty.push(word);
            }
            Some(last) => {
                debug_assert!(word_num > last, "BUG: words must be added in order");
                match word_num - last {
                    1 if word == 0xFF && self.all_ones && self.dirty.is_empty() => {
                        self.clean += 1;
                    }
                    1 if word == 0xFF && self.peek_ones() => {
                        // two consecutive all-ones words become a clean run
                        self.dirty.pop();
                        self.write_sequence();
                        self.all_ones = true;
                        self.clean = 2;
                    }
                    1 => self.dirty.push(word),
                    2 => {
                        // a single missing word is cheaper as an explicit zero
                        self.dirty.push(0);
                        self.dirty.push(word);
                    }
                    gap => {
                        self.write_sequence();
                        self.all_ones = false;
                        self.clean = (gap - 1) as usize;
                        self.dirty.push(word);
                    }
                }
            }
        }

        self.last_word_num = Some(word_num);
        self.cardinality += pop_count(word) as usize;
    }

    pub fn finish(mut self) -> WahSet {
        if self.cardinality == 0 {
            return WahSet::empty_with_interval(self.index_interval);
        }
        self.write_sequence();
        let data = self.out.freeze();
        let skips = build_skip_index(&data, self.num_sequences, self.index_interval);

        log::debug!(
            "built WAH set: cardinality={} bytes={} sequences={} checkpoints={}",
            self.cardinality,
            data.len(),
            self.num_sequences,
            skips.len()
        );

        WahSet::new(data, self.cardinality, skips)
    }
}

/// Replays the encoded sequences, recording a checkpoint every `interval`
/// sequences.
fn build_skip_index(data: &[u8], num_sequences: usize, interval: usize) -> SkipIndex {
    let num_checkpoints = (num_sequences - 1) / interval + 1;
    let mut builder = SkipIndexBuilder::with_capacity(interval, num_checkpoints);
    if num_checkpoints <= 1 {
        return builder.freeze();
    }

    builder.append(0, 0);
    let sentinel = SkipIndex::SENTINEL;
    let mut reader = WordReader::new(data, &sentinel);
    for _ in 1..num_checkpoints {
        for _ in 0..interval {
            let read = reader.read_sequence();
            assert!(read, "BUG: fewer sequences than counted");
            reader.skip_sequence();
        }
        let key = u32::try_from(reader.word_num() + 1).expect("BUG: word number out of range");
        builder.append(key, reader.position());
    }
    builder.freeze()
}

/// Builds a [`WahSet`] from docs added in strictly increasing order.
///
/// ```
/// use docset_rs::{DocIdSet, DocSetBuilder, WahBuilder};
///
/// let mut builder = WahBuilder::default();
/// builder.set_index_interval(16).unwrap();
/// builder.add_all((0..1000).step_by(3)).unwrap();
/// let set = builder.build().unwrap();
/// assert_eq!(set.cardinality(), 334);
/// ```
#[derive(Debug)]
pub struct WahBuilder {
    encoder: WordEncoder,
    state: AddState,
    word_num: u32,
    word: u8,
}

impl Default for WahBuilder {
    fn default() -> Self {
        Self {
            encoder: WordEncoder::new(DEFAULT_INDEX_INTERVAL),
            state: AddState::Empty,
            word_num: 0,
            word: 0,
        }
    }
}

impl DocSetBuilder for WahBuilder {
    type Output = WahSet;

    fn set_index_interval(&mut self, interval: usize) -> Result<(), DocSetError> {
        DocSetError::ensure_index_interval(interval)?;
        self.state.ensure_configurable()?;
        self.encoder.index_interval = interval;
        Ok(())
    }

    fn add(&mut self, doc: DocId) -> Result<(), DocSetError> {
        let first = self.state == AddState::Empty;
        self.state.accept(doc)?;

        let word_num = word_num(doc);
        let bit = 1u8 << (doc & 0x07);
        if first {
            self.word_num = word_num;
            self.word = bit;
        } else if word_num == self.word_num {
            self.word |= bit;
        } else {
            self.encoder.add_word(self.word_num, self.word);
            self.word_num = word_num;
            self.word = bit;
        }
        Ok(())
    }

    fn build(mut self) -> Result<WahSet, DocSetError> {
        self.state.ensure_buildable()?;
        if self.word != 0 {
            self.encoder.add_word(self.word_num, self.word);
        }
        Ok(self.encoder.finish())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::{DocIdSet, DocIdSetIterator, NO_MORE_DOCS, skip::Checkpoint};

    fn encode_words(words: &[(u32, u8)]) -> WahSet {
        let mut encoder = WordEncoder::new(DEFAULT_INDEX_INTERVAL);
        for &(num, word) in words {
            encoder.add_word(num, word);
        }
        encoder.finish()
    }

    #[test]
    fn test_single_word_layout() {
        let set = encode_words(&[(0, 0b0000_0111)]);
        // header: first sequence, no clean words, one dirty word
        assert_eq!(set.as_bytes(), &[0x01, 0x07]);
        assert_eq!(set.cardinality(), 3);
    }

    #[test]
    fn test_gap_of_two_writes_explicit_zero() {
        let set = encode_words(&[(0, 0x01), (2, 0x02)]);
        assert_eq!(set.as_bytes(), &[0x03, 0x01, 0x00, 0x02]);
    }

    #[test]
    fn test_large_gap_starts_new_sequence() {
        let set = encode_words(&[(1, 0x01), (5, 0x02)]);
        assert_eq!(
            set.as_bytes(),
            &[
                // clean=1, dirty=1
                0x11, 0x01,
                // clean=3 (stored as 1), dirty=1
                0x11, 0x02,
            ]
        );
    }

    #[test]
    fn test_all_ones_fold() {
        let set = encode_words(&[(0, 0x0F), (1, 0xFF), (2, 0xFF), (3, 0xFF), (4, 0x01)]);
        assert_eq!(
            set.as_bytes(),
            &[
                // clean=0, dirty=1
                0x01, 0x0F,
                // all ones, clean=3 (stored as 1), dirty=1
                0x91, 0x01,
            ]
        );
        assert_eq!(set.cardinality(), 4 + 24 + 1);
    }

    #[test]
    fn test_all_ones_run_then_gap() {
        let set = encode_words(&[(0, 0xFF), (1, 0xFF), (7, 0x80)]);
        assert_eq!(
            set.as_bytes(),
            &[
                // first sequence is empty
                0x00,
                // all ones, clean=2 (stored as 0), no dirty words
                0x80,
                // clean=5 (stored as 3), dirty=1
                0x31, 0x80,
            ]
        );
    }

    #[test]
    fn test_skip_index_replay() {
        // every third word, so each word opens a two byte sequence
        let mut encoder = WordEncoder::new(8);
        for i in 0..17 {
            encoder.add_word(3 * i, 0x01);
        }
        let set = encoder.finish();
        assert_eq!(set.as_bytes().len(), 34);

        let skips = set.skip_index();
        assert_eq!(skips.len(), 3);
        assert_eq!(skips.checkpoint(0), Checkpoint::START);
        assert_eq!(skips.checkpoint(1), Checkpoint { key: 22, offset: 16 });
        assert_eq!(skips.checkpoint(2), Checkpoint { key: 46, offset: 32 });

        let mut iter = set.iter();
        assert_eq!(iter.advance(45 * 8).unwrap(), 45 * 8);
        assert_eq!(iter.next_doc().unwrap(), 48 * 8);
        assert_eq!(iter.next_doc().unwrap(), NO_MORE_DOCS);
    }

    #[test]
    fn test_builder_errors() {
        let mut builder = WahBuilder::default();
        assert_matches!(
            builder.set_index_interval(7),
            Err(DocSetError::InvalidIndexInterval { interval: 7, min: 8 })
        );
        builder.add(10).unwrap();
        assert_matches!(builder.set_index_interval(32), Err(DocSetError::AlreadyStarted));
        assert_matches!(
            builder.add(10),
            Err(DocSetError::OutOfOrder { doc: 10, last: 10 })
        );
        assert_matches!(builder.add(11), Err(DocSetError::Poisoned));
        assert_matches!(builder.build(), Err(DocSetError::Poisoned));

        let mut builder = WahBuilder::default();
        assert_matches!(
            builder.add(NO_MORE_DOCS),
            Err(DocSetError::OutOfRange(NO_MORE_DOCS))
        );
    }

    #[test]
    fn test_empty_build() {
        let set = WahBuilder::default().build().unwrap();
        assert!(set.is_empty());
        assert_eq!(set.serialized_len(), 0);
    }
}
