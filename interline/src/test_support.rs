//! In-memory host for exercising an [`AdornmentManager`] without a real editor.
//!
//! [`TestView`] lays out a plain string with fixed-size lines and characters, drives the
//! manager through the full protocol and executes the layouts it requests.
//! [`RecordingSurface`] keeps track of every widget operation.

use crate::{
    manager::{AdornmentManager, AfterLayout},
    source::TagSource,
    span::{Position, Span},
    surface::RenderSurface,
    tracking::{Bias, Edit, EditHistory, PositionTracker, Version},
    view::{AnchorMode, LineChange, LineInfo, Redisplay, TextView},
};
use std::{cell::RefCell, ops::Range, rc::Rc};

pub const LINE_HEIGHT: f64 = 10.0;
pub const CHAR_WIDTH: f64 = 7.0;

pub struct TestView {
    text: String,
    history: Rc<RefCell<EditHistory>>,
    caret: Position,
    lines: Vec<LineInfo>,
    first_row: usize,
    visible_rows: usize,
    viewport_top: f64,
    viewport_left: f64,
    /// Distance from the viewport top to the first laid out line, kept by plain layouts.
    first_line_offset: f64,
    /// Text changed since the last layout, in the current version.
    dirty: Option<Span>,
    /// Whether the next layout formats every line from scratch.
    fresh: bool,
    in_layout: bool,
    closed: bool,
    queued_follow_ups: usize,
    layouts: usize,
}

impl TestView {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            history: Rc::new(RefCell::new(EditHistory::new())),
            caret: 0,
            lines: Vec::new(),
            first_row: 0,
            visible_rows: usize::MAX,
            viewport_top: 0.0,
            viewport_left: 0.0,
            first_line_offset: 0.0,
            dirty: None,
            fresh: true,
            in_layout: false,
            closed: false,
            queued_follow_ups: 0,
            layouts: 0,
        }
    }

    /// The edit log shared with anything that tracks positions in this view.
    pub fn history(&self) -> Rc<RefCell<EditHistory>> {
        Rc::clone(&self.history)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace `range` with `new_text` and return the new version.
    pub fn edit(&mut self, range: Range<Position>, new_text: &str) -> Version {
        let old = self.version();
        self.text.replace_range(range.clone(), new_text);
        let version = self
            .history
            .borrow_mut()
            .push([Edit::replace(range.clone(), new_text.len())]);

        self.caret = self
            .history
            .track_forward(self.caret, old, version, Bias::Right);
        let changed = Span::new(range.start, range.start + new_text.len());
        self.dirty = Some(match self.dirty {
            Some(dirty) => {
                let dirty = self.history.track_span_forward(dirty, old, version);
                Span::new(dirty.start.min(changed.start), dirty.end.max(changed.end))
            },
            None => changed,
        });
        version
    }

    pub fn set_caret(&mut self, position: Position) {
        self.caret = position;
    }

    /// Distance from the viewport top to the text of the caret line.
    pub fn caret_line_offset(&self) -> Option<f64> {
        self.line_containing(self.caret)
            .map(|line| line.text_top - self.viewport_top)
    }

    /// Show rows starting at `first_row`. Newly shown lines are formatted from scratch.
    pub fn scroll_to_row(&mut self, first_row: usize) {
        self.first_row = first_row;
        self.fresh = true;
    }

    pub fn set_visible_rows(&mut self, rows: usize) {
        self.visible_rows = rows;
    }

    pub fn set_viewport_left(&mut self, left: f64) {
        self.viewport_left = left;
    }

    /// Pretend a layout is underway, as when a source fires from inside one.
    pub fn set_in_layout(&mut self, in_layout: bool) {
        self.in_layout = in_layout;
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Follow-up layouts the manager asked for that have not run yet.
    pub fn queued_follow_ups(&self) -> usize {
        self.queued_follow_ups
    }

    /// Number of layout passes performed so far.
    pub fn layout_count(&self) -> usize {
        self.layouts
    }

    /// Lay out the visible rows, keeping the first line where it was.
    pub fn layout<S, T, R>(&mut self, manager: &mut AdornmentManager<S, T, R>) -> AfterLayout
    where
        S: TagSource<R::Widget>,
        T: PositionTracker,
        R: RenderSurface,
        R::Widget: 'static,
    {
        self.layout_anchored(manager, None)
    }

    /// Execute a layout requested by the manager.
    pub fn apply<S, T, R>(
        &mut self,
        manager: &mut AdornmentManager<S, T, R>,
        redisplay: Option<Redisplay>,
    ) -> Option<AfterLayout>
    where
        S: TagSource<R::Widget>,
        T: PositionTracker,
        R: RenderSurface,
        R::Widget: 'static,
    {
        redisplay.map(|redisplay| self.layout_anchored(manager, Some(redisplay)))
    }

    /// Run one queued follow-up. Returns false if none was queued.
    pub fn run_idle<S, T, R>(&mut self, manager: &mut AdornmentManager<S, T, R>) -> bool
    where
        S: TagSource<R::Widget>,
        T: PositionTracker,
        R: RenderSurface,
        R::Widget: 'static,
    {
        if self.queued_follow_ups == 0 {
            return false;
        }
        self.queued_follow_ups -= 1;
        let redisplay = manager.run_follow_up(self);
        self.apply(manager, redisplay);
        true
    }

    /// Run follow-ups until none are queued.
    pub fn settle<S, T, R>(&mut self, manager: &mut AdornmentManager<S, T, R>)
    where
        S: TagSource<R::Widget>,
        T: PositionTracker,
        R: RenderSurface,
        R::Widget: 'static,
    {
        while self.run_idle(manager) {}
    }

    fn layout_anchored<S, T, R>(
        &mut self,
        manager: &mut AdornmentManager<S, T, R>,
        redisplay: Option<Redisplay>,
    ) -> AfterLayout
    where
        S: TagSource<R::Widget>,
        T: PositionTracker,
        R: RenderSurface,
        R::Widget: 'static,
    {
        self.in_layout = true;
        let version = self.version();
        let rows = self.rows();
        let first_row = self.first_row.min(rows.len().saturating_sub(1));

        let mut lines = Vec::new();
        let mut y = 0.0;
        for mut line in rows.into_iter().skip(first_row).take(self.visible_rows) {
            let span = Span::new(line.start, line.end_including_line_break);
            line.change = if self.fresh || self.dirty.is_some_and(|dirty| dirty.intersects(&span)) {
                LineChange::NewOrReformatted
            } else {
                LineChange::None
            };

            let transform = manager.query_line_space(&line, version);
            line.top = y;
            line.text_top = y + transform.top_space;
            line.text_bottom = line.text_top + LINE_HEIGHT;
            y = line.text_bottom + transform.bottom_space;
            lines.push(line);
        }

        let anchored = redisplay.and_then(|redisplay| {
            lines
                .iter()
                .find(|line| line.start == redisplay.line_start)
                .map(|line| (redisplay, line))
        });
        let first_top = lines.first().map_or(0.0, |line| line.top);
        self.viewport_top = match anchored {
            Some((redisplay, line)) => match redisplay.anchor {
                AnchorMode::TextTop => line.text_top - redisplay.offset,
                AnchorMode::ViewportTop => line.top - redisplay.offset,
                AnchorMode::TextBottom | AnchorMode::ViewportBottom => {
                    line.text_bottom + redisplay.offset - self.viewport_height()
                },
            },
            None => first_top - self.first_line_offset,
        };
        self.first_line_offset = first_top - self.viewport_top;

        self.lines = lines;
        self.dirty = None;
        self.fresh = false;
        self.in_layout = false;
        self.layouts += 1;

        let after = manager.on_layout_complete(self);
        if after == AfterLayout::ScheduleFollowUp {
            self.queued_follow_ups += 1;
        }
        after
    }

    fn viewport_height(&self) -> f64 {
        self.lines.len() as f64 * LINE_HEIGHT
    }

    fn rows(&self) -> Vec<LineInfo> {
        let pieces: Vec<&str> = self.text.split('\n').collect();
        let last = pieces.len() - 1;

        let mut start = 0;
        let mut rows = Vec::with_capacity(pieces.len());
        for (row, piece) in pieces.into_iter().enumerate() {
            let end = start + piece.len();
            let is_last_line = row == last;
            rows.push(LineInfo {
                start,
                end,
                end_including_line_break: if is_last_line { end } else { end + 1 },
                is_last_line,
                ..LineInfo::default()
            });
            start = end + 1;
        }
        rows
    }
}

impl TextView for TestView {
    fn version(&self) -> Version {
        self.history.borrow().current()
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn is_in_layout(&self) -> bool {
        self.in_layout
    }

    fn caret_position(&self) -> Position {
        self.caret
    }

    fn visible_lines(&self) -> &[LineInfo] {
        &self.lines
    }

    fn viewport_top(&self) -> f64 {
        self.viewport_top
    }

    fn viewport_left(&self) -> f64 {
        self.viewport_left
    }

    fn character_left(&self, line: &LineInfo, position: Position) -> f64 {
        position.saturating_sub(line.start) as f64 * CHAR_WIDTH
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceEvent<W> {
    Added(W),
    Removed(W),
    Placed { widget: W, x: f64, y: f64 },
}

/// [`RenderSurface`] that records what was done to it.
#[derive(Debug)]
pub struct RecordingSurface<W> {
    events: Vec<SurfaceEvent<W>>,
    widgets: Vec<(W, Option<(f64, f64)>)>,
}

impl<W> Default for RecordingSurface<W> {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            widgets: Vec::new(),
        }
    }
}

impl<W: Clone + PartialEq> RecordingSurface<W> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[SurfaceEvent<W>] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<SurfaceEvent<W>> {
        std::mem::take(&mut self.events)
    }

    pub fn widget_count(&self) -> usize {
        self.widgets.len()
    }

    pub fn contains(&self, widget: &W) -> bool {
        self.widgets.iter().any(|(candidate, _)| candidate == widget)
    }

    /// Where `widget` was last placed.
    pub fn position_of(&self, widget: &W) -> Option<(f64, f64)> {
        self.widgets
            .iter()
            .find(|(candidate, _)| candidate == widget)
            .and_then(|(_, position)| *position)
    }

    pub fn removed_count(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, SurfaceEvent::Removed(_)))
            .count()
    }
}

impl<W: Clone + PartialEq> RenderSurface for RecordingSurface<W> {
    type Widget = W;

    fn add(&mut self, widget: &W) {
        debug_assert!(!self.contains(widget), "widget added twice");
        self.events.push(SurfaceEvent::Added(widget.clone()));
        self.widgets.push((widget.clone(), None));
    }

    fn remove(&mut self, widget: &W) {
        self.events.push(SurfaceEvent::Removed(widget.clone()));
        self.widgets.retain(|(candidate, _)| candidate != widget);
    }

    fn place(&mut self, widget: &W, x: f64, y: f64) {
        self.events.push(SurfaceEvent::Placed {
            widget: widget.clone(),
            x,
            y,
        });
        if let Some((_, position)) = self
            .widgets
            .iter_mut()
            .find(|(candidate, _)| candidate == widget)
        {
            *position = Some((x, y));
        }
    }
}
