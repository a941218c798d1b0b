//! Tag sources: where annotations come from.
//!
//! The manager asks a [`TagSource`] for the tags on each line it formats. Sources tell the
//! manager about stale results out of band: the host forwards the regions they report to
//! [`AdornmentManager::on_batched_change`](crate::AdornmentManager::on_batched_change).

use crate::{
    error::SpanContractError,
    graph::{BufferGraph, BufferId},
    span::{Position, Span, VersionedSpan},
    tag::Tag,
    tracking::{Bias, PositionTracker, Version},
};
use smallvec::{smallvec, SmallVec};
use std::rc::Rc;

/// A tag together with where it maps to in the queried version.
///
/// Well-behaved sources return exactly one zero-length span inside the queried extent. An
/// empty `spans` means the tag is not displayed in that version and is skipped.
pub struct TagSpan<W> {
    pub tag: Rc<Tag<W>>,
    pub spans: SmallVec<[Span; 1]>,
}

impl<W> TagSpan<W> {
    pub fn at(tag: Rc<Tag<W>>, position: Position) -> Self {
        Self {
            tag,
            spans: smallvec![Span::point(position)],
        }
    }
}

impl<W> Clone for TagSpan<W> {
    fn clone(&self) -> Self {
        Self {
            tag: Rc::clone(&self.tag),
            spans: self.spans.clone(),
        }
    }
}

pub trait TagSource<W> {
    /// Tags anchored within `extent` of `version`.
    fn tags(&mut self, extent: Span, version: Version) -> Vec<TagSpan<W>>;
}

/// Check that the spans a source returned for one tag collapse to a single point inside
/// the queried `extent`, and return that point.
pub fn validate_tag_span(spans: &[Span], extent: Span) -> Result<Position, SpanContractError> {
    let [span] = spans else {
        return Err(SpanContractError::MultipleSpans { count: spans.len() });
    };
    if !span.is_empty() {
        return Err(SpanContractError::NonEmptySpan { span: *span });
    }
    if !extent.intersects(span) {
        return Err(SpanContractError::OutsideExtent {
            position: span.start,
            extent,
        });
    }
    Ok(span.start)
}

struct Entry<W> {
    tag: Rc<Tag<W>>,
    position: Position,
    version: Version,
}

/// In-memory [`TagSource`] of point-anchored tags.
///
/// Positions are recorded against the version they were placed in and carried forward
/// lazily when queried. Every insert, move and removal is accumulated into one pending
/// batch that [`TagSet::take_changes`] hands out, so a host reports all changes of one
/// turn in a single notification.
pub struct TagSet<W, T> {
    entries: Vec<Entry<W>>,
    tracker: T,
    pending: Vec<VersionedSpan>,
}

impl<W, T: PositionTracker> TagSet<W, T> {
    pub fn new(tracker: T) -> Self {
        Self {
            entries: Vec::new(),
            tracker,
            pending: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, tag: &Rc<Tag<W>>) -> bool {
        self.entries.iter().any(|entry| Rc::ptr_eq(&entry.tag, tag))
    }

    /// Anchor `tag` at `position` of `version`. Re-inserting a known tag moves it.
    pub fn insert(&mut self, tag: Rc<Tag<W>>, position: Position, version: Version) {
        self.remove(&tag);
        self.pending.push(VersionedSpan::new(Span::point(position), version));
        self.entries.push(Entry {
            tag,
            position,
            version,
        });
    }

    pub fn remove(&mut self, tag: &Rc<Tag<W>>) -> bool {
        let Some(index) = self
            .entries
            .iter()
            .position(|entry| Rc::ptr_eq(&entry.tag, tag))
        else {
            return false;
        };

        let entry = self.entries.remove(index);
        self.pending
            .push(VersionedSpan::new(Span::point(entry.position), entry.version));
        true
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drain the regions touched since the last call.
    pub fn take_changes(&mut self) -> Vec<VersionedSpan> {
        std::mem::take(&mut self.pending)
    }
}

impl<W, T: PositionTracker> TagSource<W> for TagSet<W, T> {
    fn tags(&mut self, extent: Span, version: Version) -> Vec<TagSpan<W>> {
        let mut found = Vec::new();
        for entry in &mut self.entries {
            if entry.version > version {
                tracing::trace!(?version, placed = ?entry.version, "tag placed after queried version");
                continue;
            }
            if entry.version < version {
                entry.position =
                    self.tracker
                        .track_forward(entry.position, entry.version, version, Bias::Left);
                entry.version = version;
            }
            if extent.intersects(&Span::point(entry.position)) {
                found.push(TagSpan::at(Rc::clone(&entry.tag), entry.position));
            }
        }
        found
    }
}

/// Exposes a [`TagSource`] over a leaf buffer in the coordinates of a composite buffer
/// built on top of it.
pub struct ProjectedTagSource<S> {
    inner: S,
    graph: Rc<BufferGraph>,
    view_buffer: BufferId,
    data_buffer: BufferId,
}

impl<S> ProjectedTagSource<S> {
    pub fn new(inner: S, graph: Rc<BufferGraph>, view_buffer: BufferId, data_buffer: BufferId) -> Self {
        Self {
            inner,
            graph,
            view_buffer,
            data_buffer,
        }
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }
}

impl<W, S: TagSource<W>> TagSource<W> for ProjectedTagSource<S> {
    fn tags(&mut self, extent: Span, version: Version) -> Vec<TagSpan<W>> {
        let pieces = match self.graph.map_span_down(self.view_buffer, extent) {
            Ok(pieces) => pieces,
            Err(err) => {
                tracing::warn!(%err, ?extent, "cannot map view extent to data buffer");
                return Vec::new();
            },
        };

        let data_buffer = self.data_buffer;
        let mut found: Vec<TagSpan<W>> = Vec::new();
        for (_, piece) in pieces
            .into_iter()
            .filter(|(buffer, _)| *buffer == data_buffer)
        {
            for tag_span in self.inner.tags(piece, version) {
                if found.iter().any(|seen| Rc::ptr_eq(&seen.tag, &tag_span.tag)) {
                    continue;
                }

                let spans = tag_span
                    .spans
                    .iter()
                    .filter_map(|span| {
                        self.graph
                            .map_up(data_buffer, span.start, self.view_buffer)
                            .ok()
                            .flatten()
                    })
                    .filter(|position| extent.intersects(&Span::point(*position)))
                    .map(Span::point)
                    .collect();
                found.push(TagSpan {
                    tag: tag_span.tag,
                    spans,
                });
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{graph::SourceSegment, tracking::{Edit, EditHistory}};
    use std::cell::RefCell;

    fn tag(height: f64) -> Rc<Tag<()>> {
        Tag::builder(true).height(height).build().unwrap()
    }

    #[test]
    fn returns_tags_inside_extent() {
        let mut set = TagSet::new(EditHistory::new());
        let a = tag(10.0);
        let b = tag(20.0);
        set.insert(Rc::clone(&a), 3, Version(0));
        set.insert(Rc::clone(&b), 40, Version(0));

        let found = set.tags(Span::new(0, 10), Version(0));

        assert_eq!(found.len(), 1);
        assert!(Rc::ptr_eq(&found[0].tag, &a));
        assert_eq!(found[0].spans.as_slice(), &[Span::point(3)]);
    }

    #[test]
    fn positions_follow_edits() {
        let history = Rc::new(RefCell::new(EditHistory::new()));
        let mut set = TagSet::new(Rc::clone(&history));
        let a = tag(10.0);
        set.insert(Rc::clone(&a), 5, Version(0));
        let v1 = history.borrow_mut().push([Edit::insert(0, 10)]);

        let found = set.tags(Span::new(10, 20), v1);

        assert_eq!(found[0].spans.as_slice(), &[Span::point(15)]);
    }

    #[test]
    fn changes_are_batched_until_taken() {
        let mut set = TagSet::new(EditHistory::new());
        let a = tag(10.0);
        set.insert(Rc::clone(&a), 3, Version(0));
        set.insert(Rc::clone(&a), 8, Version(0));

        assert_eq!(set.len(), 1);
        let changes = set.take_changes();
        assert_eq!(
            changes,
            vec![
                VersionedSpan::new(Span::point(3), Version(0)),
                VersionedSpan::new(Span::point(3), Version(0)),
                VersionedSpan::new(Span::point(8), Version(0)),
            ]
        );
        assert!(!set.has_pending_changes());

        assert!(set.remove(&a));
        assert!(!set.remove(&a));
        assert_eq!(set.take_changes().len(), 1);
        assert!(set.is_empty());
    }

    #[test]
    fn tags_placed_in_a_later_version_are_hidden() {
        let mut set = TagSet::new(EditHistory::new());
        set.insert(tag(1.0), 0, Version(3));

        assert!(set.tags(Span::new(0, 10), Version(2)).is_empty());
    }

    #[test]
    fn span_contract() {
        let extent = Span::new(10, 20);

        assert_eq!(validate_tag_span(&[Span::point(20)], extent), Ok(20));
        assert_eq!(
            validate_tag_span(&[Span::point(10), Span::point(12)], extent),
            Err(SpanContractError::MultipleSpans { count: 2 })
        );
        assert_eq!(
            validate_tag_span(&[Span::new(11, 13)], extent),
            Err(SpanContractError::NonEmptySpan {
                span: Span::new(11, 13)
            })
        );
        assert_eq!(
            validate_tag_span(&[Span::point(25)], extent),
            Err(SpanContractError::OutsideExtent {
                position: 25,
                extent
            })
        );
    }

    #[test]
    fn projected_source_maps_into_view_coordinates() {
        let data = BufferId(1);
        let prefix = BufferId(2);
        let view = BufferId(3);
        let mut graph = BufferGraph::new();
        graph.add_leaf(data, 50);
        graph.add_leaf(prefix, 4);
        graph
            .add_composite(
                view,
                [SourceSegment::new(prefix, 0..4), SourceSegment::new(data, 20..50)],
            )
            .unwrap();

        let mut set = TagSet::new(EditHistory::new());
        let shown = tag(5.0);
        let hidden = tag(6.0);
        set.insert(Rc::clone(&shown), 25, Version(0));
        set.insert(Rc::clone(&hidden), 10, Version(0));
        let mut projected = ProjectedTagSource::new(set, Rc::new(graph), view, data);

        let found = projected.tags(Span::new(0, 34), Version(0));

        assert_eq!(found.len(), 1);
        assert!(Rc::ptr_eq(&found[0].tag, &shown));
        assert_eq!(found[0].spans.as_slice(), &[Span::point(9)]);

        projected.inner_mut().remove(&shown);
        assert!(projected.tags(Span::new(0, 34), Version(0)).is_empty());
    }
}
