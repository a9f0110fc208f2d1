//! Insertion-coalescing set of closed byte-address intervals
//!
//! Compute and communication events record the unique address ranges they
//! touched. Traced programs touch adjacent bytes constantly, so the set fuses
//! contiguous and overlapping ranges on insertion to keep events compact.

use std::collections::BTreeSet;

use crate::types::AddrRange;

/// An ordered collection of disjoint, non-adjacent closed intervals.
///
/// Stored ranges never overlap and never touch (`last + 1 == next.first` is
/// fused away). The point set after any insertion sequence is the union of
/// the inserted ranges, independent of insertion order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AddrRangeSet {
    ranges: BTreeSet<AddrRange>,
}

impl AddrRangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb `range` into the set, fusing with any touching or overlapping
    /// neighbors.
    ///
    /// Locates the first stored range not ordered below `range`, backs off to
    /// the predecessor when that one reaches `range.first`, and resolves the
    /// relationship between the two. Any merge removes the stored range and
    /// re-inserts the fused one, cascading across further neighbors.
    pub fn insert(&mut self, range: AddrRange) {
        debug_assert!(range.first <= range.last);

        if self.ranges.is_empty() {
            self.ranges.insert(range);
            return;
        }

        let mut cand = self.ranges.range(range..).next().copied();
        if let Some(prev) = self.ranges.range(..range).next_back().copied() {
            match cand {
                // no stored range sorts at or above: examine the last one
                None => cand = Some(prev),
                Some(_) => {
                    if range.first <= prev.last.saturating_add(1) {
                        cand = Some(prev);
                    }
                }
            }
        }

        let it = match cand {
            Some(it) => it,
            None => {
                self.ranges.insert(range);
                return;
            }
        };

        if range.first > it.last && range.first - 1 == it.last {
            // touching at the candidate's upper edge
            self.ranges.remove(&it);
            self.insert(AddrRange::new(it.first, range.last));
        } else if it.first > range.last && it.first - 1 == range.last {
            // touching at the candidate's lower edge
            self.ranges.remove(&it);
            self.insert(AddrRange::new(range.first, it.last));
        } else if range.first > it.last {
            // disjoint above
            self.ranges.insert(range);
        } else if range.first >= it.first {
            if range.last > it.last {
                // overlap extending the candidate's upper end
                self.ranges.remove(&it);
                self.insert(AddrRange::new(it.first, range.last));
            }
            // otherwise contained, nothing to do
        } else if range.last < it.first {
            // disjoint below
            self.ranges.insert(range);
        } else if range.last <= it.last {
            // overlap extending the candidate's lower end; the predecessor
            // check already ruled out a touch further down, no recheck needed
            self.ranges.remove(&it);
            self.ranges.insert(AddrRange::new(range.first, it.last));
        } else {
            // range encompasses the candidate
            self.ranges.remove(&it);
            self.insert(range);
        }
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    /// Ranges in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = AddrRange> + '_ {
        self.ranges.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}
