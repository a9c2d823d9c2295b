use crate::{DocId, DocSetError, NO_MORE_DOCS};

/// An immutable set of doc ids which can be iterated any number of times.
pub trait DocIdSet {
    type Iter<'a>: DocIdSetIterator
    where
        Self: 'a;

    /// Returns a fresh iterator positioned before the first doc.
    fn iter(&self) -> Self::Iter<'_>;

    /// The exact number of docs in this set.
    fn cardinality(&self) -> usize;

    /// returns true if this set contains no docs
    #[inline]
    fn is_empty(&self) -> bool {
        self.cardinality() == 0
    }

    /// The number of bytes of the encoded representation.
    fn serialized_len(&self) -> usize;

    /// The memory held by this set, including its skip index.
    fn ram_bytes_used(&self) -> usize;
}

/// A forward-only cursor over a sorted set of doc ids.
pub trait DocIdSetIterator {
    /// Returns the current doc, or [`NO_MORE_DOCS`] if the iterator is not
    /// yet positioned or is exhausted.
    fn doc_id(&self) -> DocId;

    /// Moves to the next doc and returns it, or returns [`NO_MORE_DOCS`] once
    /// the set is drained. Calling this again after [`NO_MORE_DOCS`] was
    /// returned is an error.
    fn next_doc(&mut self) -> Result<DocId, DocSetError>;

    /// Moves to the first doc which is greater than or equal to `target`.
    /// `target` must be greater than the current doc.
    fn advance(&mut self, target: DocId) -> Result<DocId, DocSetError>;

    /// A cheap upper bound on the number of docs this iterator can return.
    fn cost(&self) -> u64;

    /// Advances by calling `next_doc` until reaching `target`.
    fn slow_advance(&mut self, target: DocId) -> Result<DocId, DocSetError> {
        loop {
            let doc = self.next_doc()?;
            if doc >= target {
                return Ok(doc);
            }
        }
    }
}

/// Accepts docs in strictly increasing order and freezes them into a set.
pub trait DocSetBuilder: Sized {
    type Output: DocIdSet;

    /// Sets the number of sequences or blocks between two skip index
    /// checkpoints. Must be called before the first doc is added.
    fn set_index_interval(&mut self, interval: usize) -> Result<(), DocSetError>;

    /// Adds a doc. Docs must be strictly increasing and below
    /// [`NO_MORE_DOCS`]; a rejected doc poisons the builder.
    fn add(&mut self, doc: DocId) -> Result<(), DocSetError>;

    /// Freezes the builder into an immutable set.
    fn build(self) -> Result<Self::Output, DocSetError>;

    fn add_all<I: IntoIterator<Item = DocId>>(&mut self, docs: I) -> Result<(), DocSetError> {
        for doc in docs {
            self.add(doc)?;
        }
        Ok(())
    }

    /// Drains `iter` into this builder.
    fn add_docs<I: DocIdSetIterator>(&mut self, iter: &mut I) -> Result<(), DocSetError> {
        loop {
            match iter.next_doc()? {
                NO_MORE_DOCS => return Ok(()),
                doc => self.add(doc)?,
            }
        }
    }
}

/// Tracks where an iterator is, so that misuse can be reported instead of
/// silently returning stale docs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Position {
    Unpositioned,
    At(DocId),
    Exhausted,
}

impl Position {
    #[inline]
    pub(crate) fn doc_id(self) -> DocId {
        match self {
            Position::At(doc) => doc,
            Position::Unpositioned | Position::Exhausted => NO_MORE_DOCS,
        }
    }

    #[inline]
    pub(crate) fn ensure_not_exhausted(self) -> Result<(), DocSetError> {
        match self {
            Position::Exhausted => Err(DocSetError::Exhausted),
            _ => Ok(()),
        }
    }

    #[inline]
    pub(crate) fn ensure_can_advance(self, target: DocId) -> Result<(), DocSetError> {
        match self {
            Position::Exhausted => Err(DocSetError::Exhausted),
            Position::At(current) if target <= current => {
                Err(DocSetError::NonIncreasingTarget { target, current })
            }
            _ => Ok(()),
        }
    }
}

/// Tracks the last doc accepted by a builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum AddState {
    #[default]
    Empty,
    Last(DocId),
    Poisoned,
}

impl AddState {
    /// Validates `doc` against the last accepted doc, poisoning the state if
    /// it is rejected.
    pub(crate) fn accept(&mut self, doc: DocId) -> Result<(), DocSetError> {
        let result = match *self {
            AddState::Poisoned => return Err(DocSetError::Poisoned),
            _ if doc == NO_MORE_DOCS => Err(DocSetError::OutOfRange(doc)),
            AddState::Last(last) if doc <= last => Err(DocSetError::OutOfOrder { doc, last }),
            _ => Ok(()),
        };
        *self = match result {
            Ok(()) => AddState::Last(doc),
            Err(_) => AddState::Poisoned,
        };
        result
    }

    #[inline]
    pub(crate) fn ensure_configurable(self) -> Result<(), DocSetError> {
        match self {
            AddState::Empty => Ok(()),
            AddState::Last(_) => Err(DocSetError::AlreadyStarted),
            AddState::Poisoned => Err(DocSetError::Poisoned),
        }
    }

    #[inline]
    pub(crate) fn ensure_buildable(self) -> Result<(), DocSetError> {
        match self {
            AddState::Poisoned => Err(DocSetError::Poisoned),
            _ => Ok(()),
        }
    }
}
