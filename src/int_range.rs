use std::fmt;

use serde::{Deserialize, Serialize};

/// A simple type for gene index ranges
///
/// All ranges follow the bed file range convention: 0-indexed, half-closed, [start,end)
///
/// This struct is used instead of the native rust Range type so that ranges can be copied, ordered
/// and serialized as plain interval records.
///
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
pub struct IntRange {
    pub start: usize,
    pub end: usize,
}

impl IntRange {
    pub fn from_pair(start: usize, end: usize) -> Self {
        assert!(start <= end, "Invalid range [{start}-{end})");
        Self { start, end }
    }

    pub fn size(&self) -> usize {
        self.end - self.start
    }

    /// Return true if the ranges intersect (adjacency does not count)
    ///
    pub fn intersect_range(&self, other: &IntRange) -> bool {
        other.end > self.start && other.start < self.end
    }

    /// Return true if other lies completely within this range
    ///
    pub fn contains_range(&self, other: &IntRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Debug for IntRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}-{})", self.start, self.end)
    }
}
