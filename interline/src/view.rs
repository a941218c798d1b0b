//! The host view's side of the protocol.
//!
//! The view owns layout. It calls
//! [`AdornmentManager::query_line_space`](crate::AdornmentManager::query_line_space) for every
//! line it formats and
//! [`AdornmentManager::on_layout_complete`](crate::AdornmentManager::on_layout_complete) once
//! the pass is done. The manager never calls back into the view to lay out: when it needs a
//! re-layout it hands back a [`Redisplay`] for the host to execute.

use crate::{
    span::{Position, Span},
    tracking::Version,
};

/// How a line changed in the layout pass that produced it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LineChange {
    /// Reused from the previous layout at the same offset.
    #[default]
    None,
    /// Formatted for the first time, or its text changed.
    NewOrReformatted,
    /// Reused from the previous layout but moved vertically.
    Translated,
}

/// Geometry and extent of one formatted line, in the view's current version.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LineInfo {
    pub start: Position,
    /// End of the visible text, excluding the line break.
    pub end: Position,
    pub end_including_line_break: Position,
    pub is_last_line: bool,
    pub change: LineChange,
    /// Top of the line including the space reserved above it.
    pub top: f64,
    /// Top of the line's text.
    pub text_top: f64,
    /// Bottom of the line's text.
    pub text_bottom: f64,
}

impl LineInfo {
    /// Visible text of the line.
    pub fn extent(&self) -> Span {
        Span::new(self.start, self.end)
    }

    /// Whether `position` belongs to this line. The last line also owns the document end.
    pub fn contains_position(&self, position: Position) -> bool {
        self.start <= position
            && (position < self.end_including_line_break
                || (self.is_last_line && position == self.end_including_line_break))
    }
}

/// Extra space the manager asks the view to reserve around one line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineTransform {
    pub top_space: f64,
    pub bottom_space: f64,
    /// Always 1.0: line text itself is never rescaled.
    pub vertical_scale: f64,
}

impl LineTransform {
    pub fn new(top_space: f64, bottom_space: f64) -> Self {
        Self {
            top_space,
            bottom_space,
            vertical_scale: 1.0,
        }
    }
}

impl Default for LineTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Which edge of the anchor line [`Redisplay::offset`] is measured to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AnchorMode {
    /// From the viewport top to the top of the line (including space above it).
    ViewportTop,
    /// From the viewport bottom to the bottom of the line.
    ViewportBottom,
    /// From the viewport top to the top of the line's text.
    TextTop,
    /// From the viewport bottom to the bottom of the line's text.
    TextBottom,
}

/// Request to lay the document out again with the line starting at `line_start` kept
/// `offset` away from the viewport edge named by `anchor`.
///
/// The host must run the requested layout and report it through
/// [`AdornmentManager::on_layout_complete`](crate::AdornmentManager::on_layout_complete).
/// Until that happens the manager treats the layout as underway and asks for no other.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Redisplay {
    pub line_start: Position,
    pub offset: f64,
    pub anchor: AnchorMode,
}

/// Read-only view state the manager consults.
pub trait TextView {
    /// Version of the document the view currently displays.
    fn version(&self) -> Version;

    fn is_closed(&self) -> bool;

    /// True while the view is in the middle of a layout pass.
    fn is_in_layout(&self) -> bool;

    fn caret_position(&self) -> Position;

    /// Formatted lines of the last completed layout, top to bottom.
    fn visible_lines(&self) -> &[LineInfo];

    fn viewport_top(&self) -> f64;

    fn viewport_left(&self) -> f64;

    /// Left edge of the character at `position` on `line`.
    fn character_left(&self, line: &LineInfo, position: Position) -> f64;

    fn line_containing(&self, position: Position) -> Option<&LineInfo> {
        self.visible_lines()
            .iter()
            .find(|line| line.contains_position(position))
    }

    fn first_visible_line(&self) -> Option<&LineInfo> {
        self.visible_lines().first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(start: Position, end: Position, is_last_line: bool) -> LineInfo {
        LineInfo {
            start,
            end,
            end_including_line_break: if is_last_line { end } else { end + 1 },
            is_last_line,
            ..LineInfo::default()
        }
    }

    #[test]
    fn line_break_belongs_to_its_line() {
        let first = line(0, 5, false);

        assert!(first.contains_position(0));
        assert!(first.contains_position(5));
        assert!(!first.contains_position(6));
    }

    #[test]
    fn last_line_owns_document_end() {
        let last = line(6, 10, true);

        assert!(last.contains_position(10));
        assert!(!line(6, 10, false).contains_position(11));
    }

    #[test]
    fn empty_last_line_contains_its_start() {
        let last = line(12, 12, true);

        assert!(last.contains_position(12));
        assert_eq!(last.extent(), Span::point(12));
    }

    #[test]
    fn transform_never_scales_text() {
        assert_eq!(LineTransform::new(20.0, 0.0).vertical_scale, 1.0);
        assert_eq!(LineTransform::default(), LineTransform::new(0.0, 0.0));
    }
}
