//! Ordered set of small non-negative integers with paired iteration (§3, L2).
//!
//! Grounded on `original_source/jade/intset.{h,cpp}`: a thin wrapper over an
//! ordered set, plus a "walk two sets in lockstep" iterator used throughout
//! the BDT and solver code to implement set algebra without materializing
//! intermediate vectors.

use std::collections::BTreeSet;

/// An ordered set of non-negative integers (deal ids, BDT variables).
#[derive(Clone, Debug, Default, Eq)]
pub struct IntSet {
    data: BTreeSet<u32>,
}

impl IntSet {
    pub fn new() -> IntSet {
        IntSet {
            data: BTreeSet::new(),
        }
    }

    pub fn full_set(n: u32) -> IntSet {
        IntSet {
            data: (0..n).collect(),
        }
    }

    pub fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> IntSet {
        IntSet {
            data: iter.into_iter().collect(),
        }
    }

    #[inline]
    pub fn insert(&mut self, x: u32) {
        self.data.insert(x);
    }

    #[inline]
    pub fn remove(&mut self, x: u32) {
        self.data.remove(&x);
    }

    pub fn remove_all(&mut self) {
        self.data.clear();
    }

    #[inline]
    pub fn contains(&self, x: u32) -> bool {
        self.data.contains(&x)
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Remove and return the smallest element.
    pub fn pop_smallest(&mut self) -> u32 {
        let x = *self.data.iter().next().expect("IntSet::pop_smallest of empty set");
        self.data.remove(&x);
        x
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.data.iter().copied()
    }

    pub fn subset_of(&self, other: &IntSet) -> bool {
        self.data.is_subset(&other.data)
    }

    pub fn superset_of(&self, other: &IntSet) -> bool {
        self.data.is_superset(&other.data)
    }

    pub fn combine(a: &IntSet, b: &IntSet) -> IntSet {
        IntSet {
            data: a.data.union(&b.data).copied().collect(),
        }
    }

    pub fn to_string_brackets(&self) -> String {
        let mut out = String::from("[");
        for (i, x) in self.data.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&x.to_string());
        }
        out.push(']');
        out
    }
}

impl PartialEq for IntSet {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl std::fmt::Display for IntSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string_brackets())
    }
}

impl FromIterator<u32> for IntSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        IntSet::from_iter(iter)
    }
}

/// At each step of a paired walk over the sorted union of two sets, which
/// side(s) the current element belongs to.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Membership {
    AOnly,
    BOnly,
    Both,
}

/// Walks the ascending union of two `IntSet`s, reporting at each element
/// whether it came from `a` only, `b` only, or both.
pub struct PairIter<'a> {
    a: std::iter::Peekable<std::collections::btree_set::Iter<'a, u32>>,
    b: std::iter::Peekable<std::collections::btree_set::Iter<'a, u32>>,
}

impl<'a> PairIter<'a> {
    pub fn new(a: &'a IntSet, b: &'a IntSet) -> PairIter<'a> {
        PairIter {
            a: a.data.iter().peekable(),
            b: b.data.iter().peekable(),
        }
    }
}

impl<'a> Iterator for PairIter<'a> {
    type Item = (u32, Membership);

    fn next(&mut self) -> Option<(u32, Membership)> {
        match (self.a.peek(), self.b.peek()) {
            (None, None) => None,
            (Some(&&x), None) => {
                self.a.next();
                Some((x, Membership::AOnly))
            }
            (None, Some(&&y)) => {
                self.b.next();
                Some((y, Membership::BOnly))
            }
            (Some(&&x), Some(&&y)) => {
                if x < y {
                    self.a.next();
                    Some((x, Membership::AOnly))
                } else if x > y {
                    self.b.next();
                    Some((y, Membership::BOnly))
                } else {
                    self.a.next();
                    self.b.next();
                    Some((x, Membership::Both))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_ops() {
        let mut s = IntSet::new();
        s.insert(3);
        s.insert(1);
        s.insert(2);
        assert_eq!(s.size(), 3);
        assert!(s.contains(2));
        s.remove(2);
        assert!(!s.contains(2));
        assert_eq!(s.pop_smallest(), 1);
    }

    #[test]
    fn full_set_and_subset() {
        let full = IntSet::full_set(5);
        assert_eq!(full.size(), 5);
        let mut sub = IntSet::new();
        sub.insert(1);
        sub.insert(3);
        assert!(sub.subset_of(&full));
        assert!(full.superset_of(&sub));
        assert!(!full.subset_of(&sub));
    }

    #[test]
    fn pair_iter_classifies_membership() {
        let a = IntSet::from_iter([1, 2, 4]);
        let b = IntSet::from_iter([2, 3, 4, 5]);
        let got: Vec<(u32, Membership)> = PairIter::new(&a, &b).collect();
        assert_eq!(
            got,
            vec![
                (1, Membership::AOnly),
                (2, Membership::Both),
                (3, Membership::BOnly),
                (4, Membership::Both),
                (5, Membership::BOnly),
            ]
        );
    }

    #[test]
    fn equality_matches_pair_iter_semantics() {
        let a = IntSet::from_iter([1, 2, 3]);
        let b = IntSet::from_iter([1, 2, 3]);
        let c = IntSet::from_iter([1, 2]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn combine_is_union() {
        let a = IntSet::from_iter([1, 3]);
        let b = IntSet::from_iter([2, 3]);
        let c = IntSet::combine(&a, &b);
        assert_eq!(c, IntSet::from_iter([1, 2, 3]));
    }
}
