//! Offsets and spans in one version of the document.
//!
//! Every [`Position`] and [`Span`] is only meaningful against a specific
//! [`Version`]. Values that cross a version boundary are carried as
//! [`VersionedSpan`] and brought forward with a
//! [`PositionTracker`](crate::PositionTracker).

use crate::tracking::Version;
use smallvec::SmallVec;
use std::fmt;

/// Character offset into the document.
pub type Position = usize;

/// Half-open range `[start, end)` of document offsets.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        debug_assert!(start <= end, "span start {start} after end {end}");
        Self { start, end }
    }

    /// Zero-length span at `position`.
    pub fn point(position: Position) -> Self {
        Self {
            start: position,
            end: position,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `position` lies in `[start, end)`.
    pub fn contains(&self, position: Position) -> bool {
        self.start <= position && position < self.end
    }

    /// Whether the spans overlap or touch.
    ///
    /// Touching counts so a zero-length span at a line's end still hits that line.
    pub fn intersects(&self, other: &Span) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

impl From<std::ops::Range<Position>> for Span {
    fn from(range: std::ops::Range<Position>) -> Self {
        Span::new(range.start, range.end)
    }
}

/// A span tagged with the document version it was computed against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VersionedSpan {
    pub span: Span,
    pub version: Version,
}

impl VersionedSpan {
    pub fn new(span: impl Into<Span>, version: Version) -> Self {
        Self {
            span: span.into(),
            version,
        }
    }
}

/// Sorted set of disjoint spans. Overlapping and abutting inputs are merged.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NormalizedSpans {
    spans: SmallVec<[Span; 4]>,
}

impl NormalizedSpans {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Span> + '_ {
        self.spans.iter()
    }

    /// Whether any member span overlaps or touches `span`.
    pub fn intersects(&self, span: &Span) -> bool {
        // Members are sorted and disjoint, so the first one whose end reaches
        // `span.start` is the only candidate.
        let index = self.spans.partition_point(|s| s.end < span.start);
        self.spans
            .get(index)
            .is_some_and(|candidate| candidate.intersects(span))
    }
}

impl FromIterator<Span> for NormalizedSpans {
    fn from_iter<I: IntoIterator<Item = Span>>(iter: I) -> Self {
        let mut sorted: SmallVec<[Span; 4]> = iter.into_iter().collect();
        sorted.sort_unstable();

        let mut spans: SmallVec<[Span; 4]> = SmallVec::with_capacity(sorted.len());
        for span in sorted {
            match spans.last_mut() {
                Some(last) if span.start <= last.end => last.end = last.end.max(span.end),
                _ => spans.push(span),
            }
        }
        Self { spans }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_spans_intersect() {
        let line = Span::new(10, 20);

        assert!(line.intersects(&Span::point(20)));
        assert!(line.intersects(&Span::point(10)));
        assert!(line.intersects(&Span::new(15, 30)));
        assert!(!line.intersects(&Span::new(21, 30)));
        assert!(!line.intersects(&Span::point(9)));
    }

    #[test]
    fn contains_is_half_open() {
        let span = Span::new(3, 6);

        assert!(span.contains(3));
        assert!(span.contains(5));
        assert!(!span.contains(6));
        assert!(!Span::point(4).contains(4));
    }

    #[test]
    fn normalization_merges_overlap_and_adjacency() {
        let spans: NormalizedSpans = [
            Span::new(30, 40),
            Span::new(0, 5),
            Span::new(5, 8),
            Span::new(35, 50),
            Span::new(20, 22),
        ]
        .into_iter()
        .collect();

        let collected: Vec<_> = spans.iter().copied().collect();
        assert_eq!(
            collected,
            vec![Span::new(0, 8), Span::new(20, 22), Span::new(30, 50)]
        );
    }

    #[test]
    fn normalization_keeps_contained_spans_once() {
        let spans: NormalizedSpans = [Span::new(0, 100), Span::new(10, 20)].into_iter().collect();

        assert_eq!(spans.len(), 1);
        assert!(spans.intersects(&Span::new(50, 60)));
    }

    #[test]
    fn normalized_intersection_lookup() {
        let spans: NormalizedSpans = [Span::new(0, 5), Span::new(20, 30), Span::point(50)]
            .into_iter()
            .collect();

        assert!(spans.intersects(&Span::new(4, 10)));
        assert!(spans.intersects(&Span::new(10, 20)));
        assert!(!spans.intersects(&Span::new(6, 19)));
        assert!(spans.intersects(&Span::new(45, 50)));
        assert!(!spans.intersects(&Span::new(51, 60)));
        assert!(!NormalizedSpans::new().intersects(&Span::new(0, 100)));
    }
}
