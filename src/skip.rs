//! Checkpoints into an encoded buffer, used by iterators to jump close to a
//! target instead of decoding every sequence or block in between.

use std::fmt::Debug;

/// A single skip index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    /// The smallest key (word number or doc id) which may be found at or
    /// after `offset`.
    pub key: u32,
    /// Byte offset of the sequence or block starting at this checkpoint.
    pub offset: usize,
}

impl Checkpoint {
    pub const START: Self = Checkpoint { key: 0, offset: 0 };
}

/// Accumulates checkpoints while a set is being built.
#[derive(Debug)]
pub struct SkipIndexBuilder {
    interval: usize,
    keys: Vec<u32>,
    offsets: Vec<u32>,
}

impl SkipIndexBuilder {
    pub fn new(interval: usize) -> Self {
        Self { interval, keys: Vec::new(), offsets: Vec::new() }
    }

    pub fn with_capacity(interval: usize, capacity: usize) -> Self {
        Self {
            interval,
            keys: Vec::with_capacity(capacity),
            offsets: Vec::with_capacity(capacity),
        }
    }

    /// Appends a checkpoint. Keys and offsets must never decrease.
    pub fn append(&mut self, key: u32, offset: usize) {
        let offset = u32::try_from(offset).expect("BUG: encoded buffer exceeds u32 offsets");
        if let (Some(&last_key), Some(&last_offset)) = (self.keys.last(), self.offsets.last()) {
            assert!(
                key >= last_key && offset >= last_offset,
                "BUG: skip index checkpoints must be non-decreasing"
            );
        }
        self.keys.push(key);
        self.offsets.push(offset);
    }

    /// Returns the number of checkpoints appended so far.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Freezes the index. An index with fewer than two checkpoints can never
    /// move an iterator forward so it collapses into the start sentinel.
    pub fn freeze(mut self) -> SkipIndex {
        if self.keys.len() < 2 {
            return SkipIndex::sentinel(self.interval);
        }
        self.keys.shrink_to_fit();
        self.offsets.shrink_to_fit();
        SkipIndex {
            interval: self.interval,
            keys: self.keys,
            offsets: self.offsets,
        }
    }
}

/// A frozen, read-only skip index made of two parallel monotonic sequences.
#[derive(Clone, PartialEq, Eq)]
pub struct SkipIndex {
    interval: usize,
    keys: Vec<u32>,
    offsets: Vec<u32>,
}

impl SkipIndex {
    /// The degenerate index holding only the implicit `(0, 0)` checkpoint.
    pub const SENTINEL: SkipIndex = SkipIndex {
        interval: usize::MAX,
        keys: Vec::new(),
        offsets: Vec::new(),
    };

    /// A sentinel index for a set built with the given interval.
    pub fn sentinel(interval: usize) -> Self {
        SkipIndex { interval, ..Self::SENTINEL }
    }

    /// The number of sequences or blocks between two checkpoints.
    #[inline]
    pub fn interval(&self) -> usize {
        self.interval
    }

    /// The number of checkpoints, counting the sentinel.
    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len().max(1)
    }

    /// True when this index only holds the start sentinel.
    #[inline]
    pub fn is_sentinel(&self) -> bool {
        self.keys.is_empty()
    }

    #[inline]
    pub fn checkpoint(&self, idx: usize) -> Checkpoint {
        if self.keys.is_empty() {
            debug_assert_eq!(idx, 0);
            return Checkpoint::START;
        }
        Checkpoint {
            key: self.keys[idx],
            offset: self.offsets[idx] as usize,
        }
    }

    /// Returns the largest index `i` such that `key[i] <= target`.
    ///
    /// The search starts at `from`, falling back to the first checkpoint when
    /// `key[from] > target`. It probes forward with a doubling step until it
    /// overshoots the target and then binary searches the window it found, so
    /// targets close to `from` are resolved in a handful of comparisons.
    /// Returns 0 if every key is above the target.
    pub fn find_floor(&self, target: u32, from: usize) -> usize {
        if self.keys.len() < 2 {
            return 0;
        }
        let len = self.keys.len();
        let mut lo = from.min(len - 1);
        if self.keys[lo] > target {
            lo = 0;
        }

        let mut step = 1;
        let mut hi = lo + step;
        while hi < len && self.keys[hi] <= target {
            lo = hi;
            step <<= 1;
            hi = lo + step;
        }
        let hi = hi.min(len);

        // zero only when every key is above the target
        (lo + self.keys[lo..hi].partition_point(|&k| k <= target)).saturating_sub(1)
    }

    /// The heap memory owned by this index.
    pub fn ram_bytes_used(&self) -> usize {
        (self.keys.capacity() + self.offsets.capacity()) * size_of::<u32>()
    }
}

impl Debug for SkipIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SkipIndex(interval={}, checkpoints={})", self.interval, self.len())
    }
}
