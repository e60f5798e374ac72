//! Cached byte-range tracking.
//!
//! A [`ChunkSet`] records which byte offsets of a remote file are already
//! present in its local cache file. Ranges are inclusive, kept sorted by
//! start, and always merged: no two stored ranges overlap or touch.
//!
//! ```text
//!   add [0,99]      -> [0,99]
//!   add [200,299]   -> [0,99] [200,299]
//!   add [100,199]   -> [0,299]
//! ```
//!
//! Lookups are binary searches; insertion shifts the backing `Vec`. Both
//! assume the number of disjoint spans per file stays small (a handful of
//! seeks per playback), so no interval tree is used.
//!
//! The persisted form is `first,last` pairs joined by `;`, e.g.
//! `"0,8191;20000,40959"`. Parsing skips blank or malformed segments.

use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Inclusive `[first, last]` byte interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ByteRange {
    first: u64,
    last: u64,
}

impl ByteRange {
    /// Returns `None` if `first > last`.
    pub fn new(first: u64, last: u64) -> Option<Self> {
        (first <= last).then_some(Self { first, last })
    }

    /// Range of `len` bytes starting at `start`. `None` for an empty span.
    pub fn with_len(start: u64, len: u64) -> Option<Self> {
        let last = start.checked_add(len.checked_sub(1)?)?;
        Some(Self { first: start, last })
    }

    pub fn first(&self) -> u64 {
        self.first
    }

    pub fn last(&self) -> u64 {
        self.last
    }

    /// Number of bytes covered. Saturates for the full `u64` domain.
    pub fn len(&self) -> u64 {
        (self.last - self.first).saturating_add(1)
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, offset: u64) -> bool {
        self.first <= offset && offset <= self.last
    }

    pub fn contains_range(&self, other: &ByteRange) -> bool {
        self.first <= other.first && other.last <= self.last
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.first, self.last)
    }
}

/// Sorted, merged set of cached byte ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkSet {
    ranges: Vec<ByteRange>,
}

impl ChunkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of disjoint spans.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn ranges(&self) -> &[ByteRange] {
        &self.ranges
    }

    pub fn iter(&self) -> impl Iterator<Item = &ByteRange> {
        self.ranges.iter()
    }

    /// Total number of cached bytes.
    pub fn covered_bytes(&self) -> u64 {
        self.ranges
            .iter()
            .fold(0u64, |acc, r| acc.saturating_add(r.len()))
    }

    /// Inserts `range` at its sorted position and merges neighbours.
    ///
    /// Adding an already covered range leaves the set unchanged.
    pub fn add(&mut self, range: ByteRange) {
        let idx = self.ranges.partition_point(|r| r.first < range.first);
        self.ranges.insert(idx, range);
        self.merge();
    }

    /// Removes a stored range that matches `range` exactly.
    pub fn remove(&mut self, range: ByteRange) -> bool {
        match self.ranges.binary_search(&range) {
            Ok(idx) => {
                self.ranges.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    /// The stored range containing `offset`, if any.
    pub fn contains(&self, offset: u64) -> Option<ByteRange> {
        self.ranges
            .binary_search_by(|r| {
                if r.last < offset {
                    Ordering::Less
                } else if r.first > offset {
                    Ordering::Greater
                } else {
                    Ordering::Equal
                }
            })
            .ok()
            .map(|idx| self.ranges[idx])
    }

    /// True iff a single stored range contains all of `range`.
    pub fn covers_gap_free(&self, range: ByteRange) -> bool {
        self.contains(range.first)
            .is_some_and(|stored| stored.last >= range.last)
    }

    /// First offset at or after `offset` that is not cached.
    pub fn first_gap_from(&self, offset: u64) -> u64 {
        match self.contains(offset) {
            Some(range) => range.last.saturating_add(1),
            None => offset,
        }
    }

    /// Drops everything at or beyond `len`. Returns true if the set changed.
    pub fn truncate_to(&mut self, len: u64) -> bool {
        let before = self.ranges.clone();
        if len == 0 {
            self.ranges.clear();
        } else {
            let limit = len - 1;
            self.ranges.retain(|r| r.first <= limit);
            if let Some(last) = self.ranges.last_mut() {
                last.last = last.last.min(limit);
            }
        }
        before != self.ranges
    }

    // Single pass over the sorted ranges, folding each into its predecessor
    // when they overlap or touch.
    fn merge(&mut self) {
        if self.ranges.len() < 2 {
            return;
        }
        let mut write = 0;
        for read in 1..self.ranges.len() {
            let next = self.ranges[read];
            let current = &mut self.ranges[write];
            if current.last.saturating_add(1) >= next.first {
                current.last = current.last.max(next.last);
            } else {
                write += 1;
                self.ranges[write] = next;
            }
        }
        self.ranges.truncate(write + 1);
    }
}

impl fmt::Display for ChunkSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, range) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{}", range)?;
        }
        Ok(())
    }
}

impl FromStr for ChunkSet {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = ChunkSet::new();
        for segment in s.split(';') {
            if let Some(range) = parse_segment(segment) {
                set.add(range);
            }
        }
        Ok(set)
    }
}

impl FromIterator<ByteRange> for ChunkSet {
    fn from_iter<I: IntoIterator<Item = ByteRange>>(iter: I) -> Self {
        let mut set = ChunkSet::new();
        for range in iter {
            set.add(range);
        }
        set
    }
}

fn parse_segment(segment: &str) -> Option<ByteRange> {
    let segment = segment.trim();
    if segment.is_empty() {
        return None;
    }
    let (first, last) = segment.split_once(',')?;
    ByteRange::new(first.trim().parse().ok()?, last.trim().parse().ok()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(first: u64, last: u64) -> ByteRange {
        ByteRange::new(first, last).unwrap()
    }

    fn assert_canonical(set: &ChunkSet) {
        for pair in set.ranges().windows(2) {
            assert!(
                pair[0].last() + 1 < pair[1].first(),
                "ranges {} and {} overlap or touch",
                pair[0],
                pair[1]
            );
        }
    }

    // Small deterministic generator so the sequence tests stay reproducible.
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self) -> u64 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            self.0 >> 33
        }
    }

    #[test]
    fn test_byte_range_construction() {
        assert!(ByteRange::new(5, 4).is_none());
        assert_eq!(ByteRange::new(4, 4).unwrap().len(), 1);
        assert_eq!(ByteRange::with_len(100, 10), Some(r(100, 109)));
        assert_eq!(ByteRange::with_len(100, 0), None);
    }

    #[test]
    fn test_add_merges_touching_and_overlapping() {
        let mut set = ChunkSet::new();
        set.add(r(200, 299));
        set.add(r(0, 99));
        assert_eq!(set.ranges(), &[r(0, 99), r(200, 299)]);

        set.add(r(100, 199));
        assert_eq!(set.ranges(), &[r(0, 299)]);

        set.add(r(250, 400));
        assert_eq!(set.ranges(), &[r(0, 400)]);
    }

    #[test]
    fn test_add_bridges_many_ranges() {
        let mut set: ChunkSet = [r(0, 9), r(20, 29), r(40, 49), r(60, 69)]
            .into_iter()
            .collect();
        set.add(r(5, 65));
        assert_eq!(set.ranges(), &[r(0, 69)]);
    }

    #[test]
    fn test_random_sequences_stay_canonical() {
        let mut rng = Lcg(42);
        for _ in 0..200 {
            let mut set = ChunkSet::new();
            let mut reference = vec![false; 2048];
            for _ in 0..25 {
                let first = rng.next() % 2000;
                let len = rng.next() % 48 + 1;
                let range = ByteRange::with_len(first, len).unwrap();
                set.add(range);
                for offset in range.first()..=range.last() {
                    reference[offset as usize] = true;
                }
                assert_canonical(&set);
            }
            for (offset, cached) in reference.iter().enumerate() {
                assert_eq!(set.contains(offset as u64).is_some(), *cached);
            }
        }
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut set: ChunkSet = [r(0, 8191), r(20000, 40959)].into_iter().collect();
        let before = set.to_string();

        set.add(r(0, 8191));
        set.add(r(100, 200));
        set.add(r(20000, 20000));
        assert_eq!(set.to_string(), before);
    }

    #[test]
    fn test_remove_exact_only() {
        let mut set: ChunkSet = [r(0, 99), r(200, 299)].into_iter().collect();

        assert!(!set.remove(r(0, 50)));
        assert!(set.remove(r(200, 299)));
        assert!(!set.remove(r(200, 299)));
        assert_eq!(set.ranges(), &[r(0, 99)]);
    }

    #[test]
    fn test_contains_boundaries() {
        let set: ChunkSet = [r(10, 19), r(30, 39)].into_iter().collect();

        assert_eq!(set.contains(9), None);
        assert_eq!(set.contains(10), Some(r(10, 19)));
        assert_eq!(set.contains(19), Some(r(10, 19)));
        assert_eq!(set.contains(20), None);
        assert_eq!(set.contains(39), Some(r(30, 39)));
        assert_eq!(set.contains(40), None);
    }

    #[test]
    fn test_covers_gap_free() {
        let set: ChunkSet = [r(0, 99), r(101, 200)].into_iter().collect();

        assert!(set.covers_gap_free(r(0, 99)));
        assert!(set.covers_gap_free(r(120, 200)));
        assert!(!set.covers_gap_free(r(50, 150)));
        assert!(!set.covers_gap_free(r(100, 100)));
        assert!(!set.covers_gap_free(r(150, 201)));
    }

    #[test]
    fn test_first_gap_from() {
        let set: ChunkSet = [r(0, 99), r(200, 299)].into_iter().collect();

        assert_eq!(set.first_gap_from(0), 100);
        assert_eq!(set.first_gap_from(150), 150);
        assert_eq!(set.first_gap_from(250), 300);
        assert_eq!(ChunkSet::new().first_gap_from(0), 0);
    }

    #[test]
    fn test_truncate_to() {
        let mut set: ChunkSet = [r(0, 99), r(200, 299), r(400, 499)].into_iter().collect();

        assert!(set.truncate_to(250));
        assert_eq!(set.ranges(), &[r(0, 99), r(200, 249)]);

        assert!(!set.truncate_to(1000));

        assert!(set.truncate_to(0));
        assert!(set.is_empty());
    }

    #[test]
    fn test_serialization_format() {
        let set: ChunkSet = [r(20000, 40959), r(0, 8191)].into_iter().collect();
        assert_eq!(set.to_string(), "0,8191;20000,40959");
        assert_eq!(ChunkSet::new().to_string(), "");
    }

    #[test]
    fn test_roundtrip_including_empty() {
        for encoded in ["", "0,0", "0,8191;20000,40959", "5,10;12,12;100,1000"] {
            let set: ChunkSet = encoded.parse().unwrap();
            assert_eq!(set.to_string(), encoded);
        }
    }

    #[test]
    fn test_parse_is_lenient() {
        let set: ChunkSet = " 0 , 99 ;;abc;5;300,200; 200,299 ;".parse().unwrap();
        assert_eq!(set.ranges(), &[r(0, 99), r(200, 299)]);
    }

    #[test]
    fn test_parse_merges_unsorted_input() {
        let set: ChunkSet = "100,199;0,99".parse().unwrap();
        assert_eq!(set.ranges(), &[r(0, 199)]);
        assert_eq!(set.covered_bytes(), 200);
    }
}
