use crate::{
    DocIdSet,
    wah::{WahSet, intersect_sorted, union_unchecked},
};

pub trait Intersection<Rhs = Self> {
    type Output;

    /// Returns the intersection between self and other
    fn intersection(&self, rhs: &Rhs) -> Self::Output;
}

pub trait Union<Rhs = Self> {
    type Output;

    /// Returns the union between self and other
    fn union(&self, rhs: &Rhs) -> Self::Output;
}

// The result keeps the skip index interval of the left hand side.

impl Intersection for WahSet {
    type Output = WahSet;

    fn intersection(&self, rhs: &Self) -> Self::Output {
        if rhs.serialized_len() < self.serialized_len() {
            intersect_sorted(rhs, &[self], self.index_interval())
        } else {
            intersect_sorted(self, &[rhs], self.index_interval())
        }
    }
}

impl Union for WahSet {
    type Output = WahSet;

    fn union(&self, rhs: &Self) -> Self::Output {
        union_unchecked([self, rhs], self.index_interval())
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;
    use proptest::{collection::btree_set, proptest};

    use super::*;
    use crate::testutil::{BitmapOracle, check_drain, mkwah, mkwah_with_interval};

    #[test]
    fn test_wah_binary_ops() {
        let lhs = mkwah([1, 2, 3, 100, 200]);
        let rhs = mkwah([2, 3, 4, 200, 300]);
        check_drain(&lhs.intersection(&rhs), &[2, 3, 200]);
        check_drain(&lhs.union(&rhs), &[1, 2, 3, 4, 100, 200, 300]);
        check_drain(&lhs.intersection(&WahSet::empty()), &[]);
        assert_eq!(lhs.union(&WahSet::empty()), lhs);
    }

    #[test]
    fn test_ops_keep_lhs_interval() {
        let lhs = mkwah_with_interval(0..1000, 64);
        let rhs = mkwah(500..1500);
        assert_eq!(lhs.intersection(&rhs).index_interval(), 64);
        assert_eq!(lhs.union(&rhs).index_interval(), 64);
        assert_eq!(rhs.intersection(&lhs).index_interval(), rhs.index_interval());
    }

    proptest! {
        #[test]
        fn test_binary_ops_proptest(
            lhs in btree_set(0u32..10_000, 0..1000),
            rhs in btree_set(0u32..10_000, 0..1000),
        ) {
            let sets = [lhs.into_iter().collect_vec(), rhs.into_iter().collect_vec()];
            let [lhs, rhs] = sets.clone().map(mkwah);
            check_drain(&lhs.intersection(&rhs), &BitmapOracle::intersect(&sets));
            check_drain(&lhs.union(&rhs), &BitmapOracle::union(&sets));
            assert_eq!(lhs.intersection(&rhs), rhs.intersection(&lhs));
        }
    }
}
