use std::{cmp::Ordering, collections::BinaryHeap};

/// A cursor which can be ordered by the key it currently points at.
pub(crate) trait CurrentKey {
    type Key: Ord + Copy;

    fn current_key(&self) -> Self::Key;
}

/// Orders cursors so that [`BinaryHeap`] behaves as a min-heap on their
/// current key.
struct ByCurrentKey<C>(C);

impl<C: CurrentKey> PartialEq for ByCurrentKey<C> {
    fn eq(&self, other: &Self) -> bool {
        self.0.current_key() == other.0.current_key()
    }
}

impl<C: CurrentKey> Eq for ByCurrentKey<C> {}

impl<C: CurrentKey> PartialOrd for ByCurrentKey<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<C: CurrentKey> Ord for ByCurrentKey<C> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.current_key().cmp(&self.0.current_key())
    }
}

/// A min-heap of cursors. Cursors are never popped; instead the top cursor is
/// moved forward in place and sifted down again.
pub(crate) struct CursorHeap<C: CurrentKey> {
    heap: BinaryHeap<ByCurrentKey<C>>,
}

impl<C: CurrentKey> FromIterator<C> for CursorHeap<C> {
    fn from_iter<I: IntoIterator<Item = C>>(iter: I) -> Self {
        Self {
            heap: iter.into_iter().map(ByCurrentKey).collect(),
        }
    }
}

impl<C: CurrentKey> CursorHeap<C> {
    /// Returns the cursor with the smallest current key.
    #[inline]
    pub fn top(&self) -> Option<&C> {
        self.heap.peek().map(|c| &c.0)
    }

    /// Mutates the top cursor and restores the heap order afterwards.
    /// Returns false if the heap is empty.
    #[inline]
    pub fn update_top(&mut self, f: impl FnOnce(&mut C)) -> bool {
        match self.heap.peek_mut() {
            Some(mut top) => {
                f(&mut top.0);
                // dropping `top` sifts it down
                true
            }
            None => false,
        }
    }
}
