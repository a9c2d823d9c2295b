use itertools::Itertools;

use crate::{
    DocIdSet, DocSetError,
    heap::CursorHeap,
    wah::{WahSet, WordEncoder, WordReader},
};

/// Intersects `sets` word by word, without decoding them into docs.
///
/// Readers are aligned leap-frog style, starting from the set with the
/// shortest encoding. Returns [`DocSetError::NoSets`] if `sets` is empty.
pub fn intersect<'a, I>(sets: I, index_interval: usize) -> Result<WahSet, DocSetError>
where
    I: IntoIterator<Item = &'a WahSet>,
{
    DocSetError::ensure_index_interval(index_interval)?;
    let sets = sets
        .into_iter()
        .sorted_by_key(|set| set.serialized_len())
        .collect_vec();

    let Some((first, rest)) = sets.split_first() else {
        return Err(DocSetError::NoSets);
    };
    if rest.is_empty() {
        if first.index_interval() == index_interval {
            return Ok((*first).clone());
        }
        return Ok(union_unchecked([*first], index_interval));
    }
    Ok(intersect_sorted(first, rest, index_interval))
}

/// Intersects `lead` with `others`, where `lead` is expected to be the
/// cheapest set to scan.
pub(crate) fn intersect_sorted(lead: &WahSet, others: &[&WahSet], index_interval: usize) -> WahSet {
    if lead.is_empty() {
        return WahSet::empty_with_interval(index_interval);
    }

    let mut others = others.iter().map(|set| set.words()).collect_vec();
    let mut lead = lead.words();
    let mut encoder = WordEncoder::new(index_interval);

    lead.next_word();
    'lead: while !lead.is_exhausted() {
        let word_num = lead.word_num();
        let mut word = lead.word();
        for other in others.iter_mut() {
            if other.word_num() < word_num {
                other.advance_word(word_num);
            }
            if other.is_exhausted() {
                break 'lead;
            }
            if other.word_num() > word_num {
                lead.advance_word(other.word_num());
                continue 'lead;
            }
            word &= other.word();
        }
        if word != 0 {
            encoder.add_word(word_num as u32, word);
        }
        lead.next_word();
    }

    log::trace!("intersected {} WAH sets", others.len() + 1);
    encoder.finish()
}

/// Unions `sets` word by word, without decoding them into docs.
///
/// Readers are kept in a min-heap keyed by their current word number and
/// equal words are OR-ed together. The union of no sets is the empty set.
pub fn union<'a, I>(sets: I, index_interval: usize) -> Result<WahSet, DocSetError>
where
    I: IntoIterator<Item = &'a WahSet>,
{
    DocSetError::ensure_index_interval(index_interval)?;
    Ok(union_unchecked(sets, index_interval))
}

pub(crate) fn union_unchecked<'a, I>(sets: I, index_interval: usize) -> WahSet
where
    I: IntoIterator<Item = &'a WahSet>,
{
    let mut num_sets = 0;
    let mut heap: CursorHeap<WordReader<'a>> = sets
        .into_iter()
        .inspect(|_| num_sets += 1)
        .map(|set| {
            let mut reader = set.words();
            reader.next_word();
            reader
        })
        .collect();

    let mut encoder = WordEncoder::new(index_interval);
    loop {
        let (word_num, mut word) = match heap.top() {
            Some(top) if !top.is_exhausted() => (top.word_num(), top.word()),
            _ => break,
        };
        heap.update_top(WordReader::next_word);
        while let Some(top) = heap.top() {
            if top.word_num() != word_num {
                break;
            }
            word |= top.word();
            heap.update_top(WordReader::next_word);
        }
        encoder.add_word(word_num as u32, word);
    }

    log::trace!("unioned {num_sets} WAH sets");
    encoder.finish()
}
