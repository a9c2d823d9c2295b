//! Compressed, immutable DocID sets for a full-text search engine.
//!
//! Two competing codecs are provided, both built once from strictly increasing
//! document ids and read many times:
//!
//! - **[`WahSet`]**: a word-aligned hybrid run-length encoding over 8-bit
//!   words. Dense and clustered sets compress into runs of clean words, and
//!   sets can be intersected and unioned directly in their encoded form.
//!
//! - **[`PforSet`]**: a patched frame-of-reference encoding of 128-value
//!   blocks of gaps. Each block picks the bit width that minimizes its size,
//!   moving outliers into an exception list, or falls back to a unary bitmap
//!   when that is smaller.
//!
//! Both share a [`SkipIndex`] so that [`DocIdSetIterator::advance`] runs in
//! logarithmic time over long sets.
//!
//! ```
//! use docset_rs::{DocIdSet, DocIdSetIterator, DocSetBuilder, NO_MORE_DOCS, WahBuilder};
//!
//! let mut builder = WahBuilder::default();
//! builder.add_all([0, 1, 2, 64, 65, 1000]).unwrap();
//! let set = builder.build().unwrap();
//! assert_eq!(set.cardinality(), 6);
//!
//! let mut iter = set.iter();
//! assert_eq!(iter.advance(3).unwrap(), 64);
//! assert_eq!(iter.advance(2000).unwrap(), NO_MORE_DOCS);
//! ```

use thiserror::Error;

pub mod bits;
mod heap;
pub mod ops;
pub mod pfor;
pub mod skip;
mod traits;
pub mod wah;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use pfor::{PforBuilder, PforIter, PforSet};
pub use skip::{SkipIndex, SkipIndexBuilder};
pub use traits::{DocIdSet, DocIdSetIterator, DocSetBuilder};
pub use wah::{WahBuilder, WahIter, WahSet};

/// A document identifier.
pub type DocId = u32;

/// Returned by iterators once they are exhausted. It is also the reported
/// [`DocIdSetIterator::doc_id`] before the first call to `next_doc`, which
/// is why it can never be added to a set.
pub const NO_MORE_DOCS: DocId = DocId::MAX;

/// The smallest accepted skip index interval.
pub const MIN_INDEX_INTERVAL: usize = 8;

static_assertions::assert_impl_all!(WahSet: Send, Sync, Clone);
static_assertions::assert_impl_all!(PforSet: Send, Sync, Clone);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocSetError {
    #[error("doc ids must be added in increasing order: got {doc} after {last}")]
    OutOfOrder { doc: DocId, last: DocId },

    #[error("doc id {0} is reserved as the exhaustion sentinel")]
    OutOfRange(DocId),

    #[error("index interval must be at least {min}, got {interval}")]
    InvalidIndexInterval { interval: usize, min: usize },

    #[error("index interval must be configured before the first doc is added")]
    AlreadyStarted,

    #[error("builder rejected a previous doc and can no longer be used")]
    Poisoned,

    #[error("iterator is exhausted")]
    Exhausted,

    #[error("advance target {target} must be greater than the current doc {current}")]
    NonIncreasingTarget { target: DocId, current: DocId },

    #[error("there must be at least one set to intersect")]
    NoSets,
}

impl DocSetError {
    #[inline]
    pub(crate) fn ensure_index_interval(interval: usize) -> Result<(), DocSetError> {
        if interval < MIN_INDEX_INTERVAL {
            Err(Self::InvalidIndexInterval { interval, min: MIN_INDEX_INTERVAL })
        } else {
            Ok(())
        }
    }
}
