use crate::{
    heap::CurrentKey,
    skip::SkipIndex,
    wah::header::SequenceHeader,
};

/// The word number reported once the buffer is exhausted.
pub(crate) const END_WORD: i64 = i64::MAX;

/// Each sequence costs at least 3 words (a 2-word clean run and a dirty
/// word), so the skip index only pays off for jumps spanning more than
/// `3 * 3 * interval` words.
const SKIP_THRESHOLD_FACTOR: usize = 9;

/// Decodes a WAH buffer one word at a time.
///
/// Clean runs of zeros are never materialized: reading the header of a
/// sequence moves `word_num` directly past them. All-ones runs and dirty
/// words are returned one by one.
#[derive(Debug, Clone)]
pub(crate) struct WordReader<'a> {
    data: &'a [u8],
    skips: &'a SkipIndex,
    skip_threshold: i64,

    pos: usize,
    all_ones_len: usize,
    dirty_len: usize,
    sequence_num: i64,

    word_num: i64,
    word: u8,
}

impl<'a> WordReader<'a> {
    pub fn new(data: &'a [u8], skips: &'a SkipIndex) -> Self {
        let threshold = skips.interval().saturating_mul(SKIP_THRESHOLD_FACTOR);
        Self {
            data,
            skips,
            skip_threshold: i64::try_from(threshold).unwrap_or(i64::MAX),
            pos: 0,
            all_ones_len: 0,
            dirty_len: 0,
            sequence_num: -1,
            word_num: -1,
            word: 0,
        }
    }

    /// The current word number, `-1` before the first word and [`END_WORD`]
    /// once exhausted.
    #[inline]
    pub fn word_num(&self) -> i64 {
        self.word_num
    }

    #[inline]
    pub fn word(&self) -> u8 {
        self.word
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.word_num == END_WORD
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Words left in the current sequence which can be skipped without
    /// reading a new header.
    #[inline]
    fn pending(&self) -> usize {
        self.all_ones_len + self.dirty_len
    }

    /// Reads the next sequence header. Returns false at the end of the buffer.
    pub fn read_sequence(&mut self) -> bool {
        if self.pos >= self.data.len() {
            self.word_num = END_WORD;
            return false;
        }
        let header = SequenceHeader::decode(self.data, &mut self.pos);
        if header.all_ones {
            self.all_ones_len = header.clean_len;
        } else {
            self.word_num += header.clean_len as i64;
        }
        self.dirty_len = header.dirty_len;
        debug_assert!(
            self.data.len() - self.pos >= self.dirty_len,
            "BUG: sequence overruns the buffer"
        );
        self.sequence_num += 1;
        true
    }

    /// Skips `count` words of the current sequence.
    fn skip_words(&mut self, mut count: usize) {
        debug_assert!(count <= self.pending());
        self.word_num += count as i64;
        if count <= self.all_ones_len {
            self.all_ones_len -= count;
        } else {
            count -= self.all_ones_len;
            self.all_ones_len = 0;
            self.pos += count;
            self.dirty_len -= count;
        }
    }

    /// Skips the rest of the current sequence.
    pub fn skip_sequence(&mut self) {
        self.word_num += self.pending() as i64;
        self.pos += self.dirty_len;
        self.all_ones_len = 0;
        self.dirty_len = 0;
    }

    #[inline]
    fn read_dirty(&mut self) -> u8 {
        let word = self.data[self.pos];
        self.pos += 1;
        self.word_num += 1;
        self.dirty_len -= 1;
        word
    }

    /// Moves to the next non-zero word.
    pub fn next_word(&mut self) {
        loop {
            if self.all_ones_len > 0 {
                self.word = 0xFF;
                self.word_num += 1;
                self.all_ones_len -= 1;
                return;
            }
            if self.dirty_len > 0 {
                self.word = self.read_dirty();
                if self.word != 0 {
                    return;
                }
                // an explicit zero word is always followed by a non-zero one
                if self.dirty_len > 0 {
                    self.word = self.read_dirty();
                    debug_assert_ne!(self.word, 0, "BUG: consecutive zero dirty words");
                    return;
                }
            }
            if !self.read_sequence() {
                return;
            }
        }
    }

    /// Moves to the first non-zero word whose number is at least `target`.
    pub fn advance_word(&mut self, target: i64) {
        debug_assert!(target > self.word_num, "BUG: advance_word must move forward");
        let delta = target - self.word_num;
        if delta <= self.pending() as i64 + 1 {
            self.skip_words(delta as usize - 1);
        } else {
            self.skip_sequence();
            if delta > self.skip_threshold {
                self.skip_to(target);
            }
            loop {
                if !self.read_sequence() {
                    return;
                }
                let delta = target - self.word_num;
                if delta <= self.pending() as i64 + 1 {
                    if delta > 1 {
                        self.skip_words(delta as usize - 1);
                    }
                    break;
                }
                self.skip_sequence();
            }
        }
        self.next_word();
    }

    /// Jumps to the last checkpoint before `target` if it is ahead of the
    /// current position. Must be called on a sequence boundary.
    fn skip_to(&mut self, target: i64) {
        let interval = i64::try_from(self.skips.interval()).unwrap_or(i64::MAX);
        let from = (self.sequence_num.max(0) / interval) as usize;
        let key = u32::try_from(target).unwrap_or(u32::MAX);
        let idx = self.skips.find_floor(key, from);
        let checkpoint = self.skips.checkpoint(idx);
        if checkpoint.offset > self.pos {
            self.pos = checkpoint.offset;
            self.word_num = checkpoint.key as i64 - 1;
            self.sequence_num = idx as i64 * interval - 1;
        }
    }
}

impl CurrentKey for WordReader<'_> {
    type Key = i64;

    #[inline]
    fn current_key(&self) -> i64 {
        self.word_num
    }
}
