//! Document versions and forward position tracking.
//!
//! The manager stores every position against the version it last observed. When the view
//! moves to a newer version, positions are carried forward through the intervening edits
//! with a [`Bias`] deciding which side of an edit a point sticks to.

use crate::span::{Position, Span};
use std::{cell::RefCell, fmt, rc::Rc};

/// Monotonically increasing identifier for one state of the document.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(pub u64);

impl Version {
    pub fn next(self) -> Self {
        Version(self.0 + 1)
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Which side of an edit a tracked point sticks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Bias {
    /// Stay with the character before the edit.
    Left,
    /// Move with the character after the edit.
    Right,
}

/// Maps points forward from one document version to a later one.
pub trait PositionTracker {
    /// Track `position` from `from` to `to`. Requires `from <= to`.
    fn track_forward(&self, position: Position, from: Version, to: Version, bias: Bias)
        -> Position;

    /// Track a span edge-exclusively: text inserted at either edge stays outside it.
    fn track_span_forward(&self, span: Span, from: Version, to: Version) -> Span {
        let start = self.track_forward(span.start, from, to, Bias::Right);
        let end = self.track_forward(span.end, from, to, Bias::Left);
        Span::new(start, end.max(start))
    }
}

impl<T: PositionTracker + ?Sized> PositionTracker for Rc<T> {
    fn track_forward(
        &self,
        position: Position,
        from: Version,
        to: Version,
        bias: Bias,
    ) -> Position {
        (**self).track_forward(position, from, to, bias)
    }
}

impl<T: PositionTracker> PositionTracker for RefCell<T> {
    fn track_forward(
        &self,
        position: Position,
        from: Version,
        to: Version,
        bias: Bias,
    ) -> Position {
        self.borrow().track_forward(position, from, to, bias)
    }
}

/// Replacement of `old` (in pre-edit coordinates) with `new_len` characters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edit {
    pub old: Span,
    pub new_len: usize,
}

impl Edit {
    pub fn insert(at: Position, len: usize) -> Self {
        Self {
            old: Span::point(at),
            new_len: len,
        }
    }

    pub fn delete(span: impl Into<Span>) -> Self {
        Self {
            old: span.into(),
            new_len: 0,
        }
    }

    pub fn replace(span: impl Into<Span>, new_len: usize) -> Self {
        Self {
            old: span.into(),
            new_len,
        }
    }
}

/// Edit log recording how each version was derived from the previous one.
///
/// The edits of one step are expressed in the coordinates of the version they apply to,
/// sorted and non-overlapping.
#[derive(Debug, Default)]
pub struct EditHistory {
    base: Version,
    steps: Vec<Vec<Edit>>,
}

impl EditHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// History whose oldest trackable version is `base`.
    pub fn starting_at(base: Version) -> Self {
        Self {
            base,
            steps: Vec::new(),
        }
    }

    pub fn current(&self) -> Version {
        Version(self.base.0 + self.steps.len() as u64)
    }

    /// Record one step of edits and return the new version.
    pub fn push(&mut self, edits: impl IntoIterator<Item = Edit>) -> Version {
        let mut edits: Vec<Edit> = edits.into_iter().collect();
        edits.sort_by_key(|edit| edit.old.start);
        debug_assert!(
            edits.windows(2).all(|w| w[0].old.end <= w[1].old.start),
            "overlapping edits in one step: {edits:?}"
        );
        self.steps.push(edits);
        self.current()
    }

    fn step(&self, version: Version) -> Option<&[Edit]> {
        let index = version.0.checked_sub(self.base.0)?;
        self.steps.get(index as usize).map(Vec::as_slice)
    }
}

impl PositionTracker for EditHistory {
    fn track_forward(
        &self,
        position: Position,
        from: Version,
        to: Version,
        bias: Bias,
    ) -> Position {
        debug_assert!(from <= to, "cannot track backwards from {from:?} to {to:?}");
        if from > to {
            return position;
        }

        let mut position = position;
        let mut version = from;
        while version < to {
            match self.step(version) {
                Some(edits) => position = track_through(edits, position, bias),
                None => {
                    tracing::warn!(?version, "edit history has no record of version step");
                    break;
                },
            }
            version = version.next();
        }
        position
    }
}

/// Map `position` through one step of sorted, non-overlapping edits.
fn track_through(edits: &[Edit], position: Position, bias: Bias) -> Position {
    let mut grown = 0usize;
    let mut shrunk = 0usize;

    for edit in edits {
        if position < edit.old.start {
            break;
        }

        let new_start = edit.old.start + grown - shrunk;
        let past_edit = position > edit.old.end || (position == edit.old.end && !edit.old.is_empty());
        if past_edit {
            grown += edit.new_len;
            shrunk += edit.old.len();
            continue;
        }

        // At the start of the edit, or strictly inside the replaced text.
        return match bias {
            Bias::Left => new_start,
            Bias::Right => new_start + edit.new_len,
        };
    }

    position + grown - shrunk
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(steps: &[&[Edit]]) -> EditHistory {
        let mut history = EditHistory::new();
        for step in steps {
            history.push(step.iter().copied());
        }
        history
    }

    #[test]
    fn insertion_before_shifts_position() {
        let history = history(&[&[Edit::insert(2, 5)]]);

        assert_eq!(history.track_forward(10, Version(0), Version(1), Bias::Left), 15);
        assert_eq!(history.track_forward(1, Version(0), Version(1), Bias::Left), 1);
    }

    #[test]
    fn insertion_at_position_respects_bias() {
        let history = history(&[&[Edit::insert(10, 3)]]);

        assert_eq!(history.track_forward(10, Version(0), Version(1), Bias::Left), 10);
        assert_eq!(history.track_forward(10, Version(0), Version(1), Bias::Right), 13);
    }

    #[test]
    fn deletion_collapses_inner_points() {
        let history = history(&[&[Edit::delete(5..15)]]);

        assert_eq!(history.track_forward(8, Version(0), Version(1), Bias::Left), 5);
        assert_eq!(history.track_forward(8, Version(0), Version(1), Bias::Right), 5);
        assert_eq!(history.track_forward(15, Version(0), Version(1), Bias::Left), 5);
        assert_eq!(history.track_forward(20, Version(0), Version(1), Bias::Left), 10);
    }

    #[test]
    fn replacement_inner_points_follow_bias() {
        let history = history(&[&[Edit::replace(5..10, 2)]]);

        assert_eq!(history.track_forward(7, Version(0), Version(1), Bias::Left), 5);
        assert_eq!(history.track_forward(7, Version(0), Version(1), Bias::Right), 7);
        // End of the replaced text always lands after the new text.
        assert_eq!(history.track_forward(10, Version(0), Version(1), Bias::Left), 7);
    }

    #[test]
    fn multiple_edits_in_one_step_accumulate() {
        let history = history(&[&[Edit::insert(0, 4), Edit::delete(10..12), Edit::insert(20, 1)]]);

        assert_eq!(history.track_forward(5, Version(0), Version(1), Bias::Left), 9);
        assert_eq!(history.track_forward(15, Version(0), Version(1), Bias::Left), 17);
        assert_eq!(history.track_forward(25, Version(0), Version(1), Bias::Left), 28);
    }

    #[test]
    fn tracking_spans_several_versions() {
        let history = history(&[&[Edit::insert(0, 2)], &[Edit::delete(0..1)], &[Edit::insert(50, 10)]]);

        assert_eq!(history.current(), Version(3));
        assert_eq!(history.track_forward(10, Version(0), Version(3), Bias::Left), 11);
        assert_eq!(history.track_forward(10, Version(1), Version(3), Bias::Left), 9);
        assert_eq!(history.track_forward(10, Version(3), Version(3), Bias::Left), 10);
    }

    #[test]
    fn span_tracking_is_edge_exclusive() {
        let history = history(&[&[Edit::insert(10, 3), Edit::insert(20, 3)]]);

        let span = history.track_span_forward(Span::new(10, 20), Version(0), Version(1));

        assert_eq!(span, Span::new(13, 23));
    }

    #[test]
    fn span_swallowed_by_deletion_collapses() {
        let history = history(&[&[Edit::delete(0..30)]]);

        let span = history.track_span_forward(Span::new(10, 20), Version(0), Version(1));

        assert_eq!(span, Span::point(0));
    }

    #[test]
    fn history_with_offset_base() {
        let mut history = EditHistory::starting_at(Version(7));
        let v8 = history.push([Edit::insert(0, 1)]);

        assert_eq!(v8, Version(8));
        assert_eq!(history.track_forward(3, Version(7), v8, Bias::Left), 4);
    }

    #[test]
    fn shared_history_tracks_through_rc() {
        let shared = Rc::new(RefCell::new(EditHistory::new()));
        shared.borrow_mut().push([Edit::insert(0, 2)]);

        assert_eq!(shared.track_forward(1, Version(0), Version(1), Bias::Left), 3);
    }
}
