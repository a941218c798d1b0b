//! Reserves inter-line space for tags and keeps their widgets on the surface.
//!
//! The manager sits between a [`TagSource`], the host [`TextView`] and a [`RenderSurface`].
//! During a layout pass the view asks [`AdornmentManager::query_line_space`] how much room
//! each formatted line needs. When the pass completes, [`AdornmentManager::on_layout_complete`]
//! creates, moves and removes widgets to match.
//!
//! The manager never drives the view. Operations that need the document laid out again
//! return a [`Redisplay`] describing which line to keep in place, and
//! [`AdornmentManager::on_layout_complete`] returns [`AfterLayout::ScheduleFollowUp`] when
//! the host should call [`AdornmentManager::run_follow_up`] once it is idle.
//!
//! # Deferral
//!
//! When the document version changes mid-layout, tag additions and removals are deferred
//! to a follow-up layout: removed tags keep their space and new tags get none until then.
//! This keeps lines from jumping while text is being typed. Deferred tags are committed
//! the next time the manager asks for a layout.


use crate::{
    active::{ActiveTag, Inbox, TagEventKind},
    config::ManagerConfig,
    source::{validate_tag_span, TagSource},
    span::{NormalizedSpans, Position, Span, VersionedSpan},
    surface::RenderSurface,
    tag::{HorizontalPositioning, Tag},
    tracking::{Bias, PositionTracker, Version},
    view::{AnchorMode, LineChange, LineInfo, LineTransform, Redisplay, TextView},
};
use std::rc::Rc;

/// What the host should do once a layout pass has been reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AfterLayout {
    Idle,
    /// Call [`AdornmentManager::run_follow_up`] when the host is next idle.
    ScheduleFollowUp,
}

pub struct AdornmentManager<S, T, R: RenderSurface> {
    source: S,
    tracker: T,
    surface: R,
    config: ManagerConfig,

    current_version: Version,
    tags: Vec<ActiveTag<R::Widget>>,
    deferring: bool,
    /// Regions reported stale by the source, in `current_version`. Lines intersecting them
    /// are re-queried during the next layout.
    invalidated: Option<NormalizedSpans>,
    layout_pending: bool,
    layout_in_progress: bool,
    /// A batch arrived while the view was laying out; its regions carry into a follow-up.
    changed_during_layout: bool,
    follow_up_scheduled: bool,
    follow_ups_in_a_row: u32,
    inbox: Inbox<R::Widget>,
    closed: bool,
}

impl<S, T, R> AdornmentManager<S, T, R>
where
    S: TagSource<R::Widget>,
    T: PositionTracker,
    R: RenderSurface,
    R::Widget: 'static,
{
    pub fn new(view: &dyn TextView, source: S, tracker: T, surface: R, config: ManagerConfig) -> Self {
        tracing::debug!(version = ?view.version(), ?config, "adornment manager created");
        Self {
            source,
            tracker,
            surface,
            config,
            current_version: view.version(),
            tags: Vec::new(),
            deferring: false,
            invalidated: None,
            layout_pending: false,
            layout_in_progress: false,
            changed_during_layout: false,
            follow_up_scheduled: false,
            follow_ups_in_a_row: 0,
            inbox: Rc::default(),
            closed: false,
        }
    }

    /// Space to reserve above and below `line`, which was formatted against `version`.
    ///
    /// Repeated queries for the same line with no intervening change return the same
    /// transform.
    pub fn query_line_space(&mut self, line: &LineInfo, version: Version) -> LineTransform {
        if self.closed {
            return LineTransform::default();
        }

        self.layout_in_progress = true;
        self.advance_to(version);

        let extent = line.extent();
        let stale = line.change == LineChange::NewOrReformatted
            || self
                .invalidated
                .as_ref()
                .is_some_and(|invalidated| invalidated.intersects(&extent));
        if stale {
            self.refresh_line(line, extent);
        }

        let transform = self.line_transform(line);
        tracing::trace!(
            start = line.start,
            top = transform.top_space,
            bottom = transform.bottom_space,
            "line space"
        );
        transform
    }

    /// The source reported `regions` as stale. Returns the layout to run, anchored at the
    /// line containing `anchor` when it is visible.
    pub fn on_batched_change(
        &mut self,
        regions: &[VersionedSpan],
        anchor: Position,
        view: &dyn TextView,
    ) -> Option<Redisplay> {
        if self.closed || view.is_closed() {
            return None;
        }

        let fresh: NormalizedSpans = regions
            .iter()
            .map(|region| self.to_current(*region))
            .collect();
        if fresh.is_empty() {
            return None;
        }

        tracing::debug!(regions = fresh.len(), "tag source reported changes");
        self.invalidated = Some(match self.invalidated.take() {
            Some(existing) => existing.iter().chain(fresh.iter()).copied().collect(),
            None => fresh,
        });
        self.layout_pending = true;
        self.follow_ups_in_a_row = 0;

        let redisplay = self.perform_layout(anchor, view);
        if redisplay.is_none() {
            if view.is_in_layout() {
                // Lines already formatted in this pass missed the regions.
                self.changed_during_layout = true;
            } else if !self.layout_in_progress {
                self.invalidated = None;
            }
        }
        redisplay
    }

    /// The view finished a layout pass. Creates, positions and removes widgets.
    pub fn on_layout_complete(&mut self, view: &dyn TextView) -> AfterLayout {
        if self.closed {
            return AfterLayout::Idle;
        }

        let carried = std::mem::take(&mut self.changed_during_layout);
        self.layout_in_progress = false;
        self.layout_pending = carried;
        if !carried {
            self.invalidated = None;
        }

        let version = view.version();
        if version != self.current_version {
            // A pass that formatted no lines never told us about the new version.
            tracing::debug!(
                from = ?self.current_version,
                to = ?version,
                "layout completed at an unqueried version"
            );
            self.advance_to(version);
        }

        let mut index = self.tags.len();
        while index > 0 {
            index -= 1;

            if self.tags[index].pending_delete {
                if self.deferring {
                    self.layout_pending = true;
                } else {
                    self.destroy_at(index);
                }
                continue;
            }

            let Some(line) = view.line_containing(self.tags[index].position) else {
                tracing::trace!(position = self.tags[index].position, "tag anchor scrolled out of view");
                self.destroy_at(index);
                continue;
            };

            if self.tags[index].pending_create {
                debug_assert!(self.deferring, "pending creation outside deferral");
                self.layout_pending = true;
                continue;
            }

            let active = &mut self.tags[index];
            if !active.is_realized {
                if let Some(widget) = active.realize(view, &self.inbox) {
                    self.surface.add(widget);
                }
            }
            if let Some(widget) = &active.visual {
                place(&mut self.surface, view, line, active, widget);
            }
        }

        if !self.layout_pending {
            self.deferring = false;
            self.follow_ups_in_a_row = 0;
            return AfterLayout::Idle;
        }
        self.schedule_follow_up()
    }

    /// Run the follow-up layout requested by [`AfterLayout::ScheduleFollowUp`], anchored at
    /// the caret line.
    pub fn run_follow_up(&mut self, view: &dyn TextView) -> Option<Redisplay> {
        self.follow_up_scheduled = false;
        if self.closed {
            return None;
        }
        self.perform_layout(view.caret_position(), view)
    }

    /// Handle height and offset changes made to realized tags since the last flush.
    pub fn flush_tag_events(&mut self, view: &dyn TextView) -> Option<Redisplay> {
        let events: Vec<_> = self.inbox.borrow_mut().drain(..).collect();
        if self.closed {
            return None;
        }

        let mut redisplay = None;
        for event in events {
            let Some(tag) = event.tag.upgrade() else {
                continue;
            };
            let Some(index) = self.index_of(&tag) else {
                continue;
            };

            match event.kind {
                TagEventKind::Height => {
                    self.layout_pending = true;
                    self.follow_ups_in_a_row = 0;
                    if redisplay.is_none() {
                        let anchor = self.to_view(self.tags[index].position, view);
                        redisplay = self.perform_layout(anchor, view);
                    }
                },
                TagEventKind::HorizontalOffset => {
                    // Positions are only meaningful for the view's version.
                    if self.current_version != view.version() {
                        continue;
                    }
                    let active = &self.tags[index];
                    let (Some(widget), Some(line)) =
                        (&active.visual, view.line_containing(active.position))
                    else {
                        continue;
                    };
                    place(&mut self.surface, view, line, active, widget);
                },
            }
        }
        redisplay
    }

    pub fn version(&self) -> Version {
        self.current_version
    }

    pub fn is_deferring(&self) -> bool {
        self.deferring
    }

    /// Whether changes are waiting for a layout the manager has asked for, or will ask for.
    pub fn is_layout_pending(&self) -> bool {
        self.layout_pending
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn active_tags(&self) -> impl Iterator<Item = &ActiveTag<R::Widget>> + '_ {
        self.tags.iter()
    }

    pub fn active_tag_count(&self) -> usize {
        self.tags.len()
    }

    pub fn active_tag(&self, tag: &Rc<Tag<R::Widget>>) -> Option<&ActiveTag<R::Widget>> {
        self.tags.iter().find(|active| active.is_tracking(tag))
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    pub fn surface(&self) -> &R {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut R {
        &mut self.surface
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Move every tracked position to `version` and start deferring changes.
    fn advance_to(&mut self, version: Version) {
        if version == self.current_version {
            return;
        }
        if version < self.current_version {
            tracing::warn!(
                current = ?self.current_version,
                requested = ?version,
                "ignoring query for an older version"
            );
            return;
        }

        let from = self.current_version;
        for active in &mut self.tags {
            active.position = self
                .tracker
                .track_forward(active.position, from, version, Bias::Left);
        }
        if let Some(invalidated) = self.invalidated.take() {
            self.invalidated = Some(
                invalidated
                    .iter()
                    .map(|span| self.tracker.track_span_forward(*span, from, version))
                    .collect(),
            );
        }

        tracing::debug!(?from, to = ?version, tags = self.tags.len(), "document version changed, deferring");
        self.current_version = version;
        self.deferring = true;
    }

    /// Re-fetch the tags on `line` and reconcile them with the tracked ones.
    fn refresh_line(&mut self, line: &LineInfo, extent: Span) {
        for active in &mut self.tags {
            if line.contains_position(active.position) {
                active.pending_delete = true;
            }
        }

        for tag_span in self.source.tags(extent, self.current_version) {
            if tag_span.spans.is_empty() {
                continue;
            }
            let position = match validate_tag_span(&tag_span.spans, extent) {
                Ok(position) => position,
                Err(err) => {
                    if self.config.strict_tag_spans {
                        panic!("tag source broke its span contract: {err}");
                    }
                    tracing::warn!(%err, ?extent, "discarding tag with malformed span");
                    continue;
                },
            };

            match self
                .tags
                .iter_mut()
                .find(|active| active.is_tracking(&tag_span.tag))
            {
                Some(active) => {
                    active.pending_delete = false;
                    active.position = position;
                },
                None => {
                    tracing::trace!(position, deferred = self.deferring, "tracking new tag");
                    self.tags
                        .push(ActiveTag::new(tag_span.tag, position, self.deferring));
                },
            }
        }
    }

    fn line_transform(&mut self, line: &LineInfo) -> LineTransform {
        let deferring = self.deferring;
        let mut top_space: f64 = 0.0;
        let mut bottom_space: f64 = 0.0;

        for active in &mut self.tags {
            if !active.contributes_space(deferring) || !line.contains_position(active.position) {
                continue;
            }
            // While deferring, heights stay as they were so nothing moves under the caret.
            if !deferring {
                active.cached_height = active.tag.height();
            }
            if active.tag.is_above_line() {
                top_space = top_space.max(active.cached_height);
            } else {
                bottom_space = bottom_space.max(active.cached_height);
            }
        }
        LineTransform::new(top_space, bottom_space)
    }

    /// Commit deferred changes and ask for a layout keeping the line at `anchor` in place.
    fn perform_layout(&mut self, anchor: Position, view: &dyn TextView) -> Option<Redisplay> {
        if self.closed
            || view.is_closed()
            || !self.layout_pending
            || self.layout_in_progress
            || view.is_in_layout()
        {
            return None;
        }

        self.layout_pending = false;
        if self.deferring {
            self.deferring = false;
            self.commit_deferred();
        }

        let redisplay = match view.line_containing(anchor) {
            Some(line) => Redisplay {
                line_start: line.start,
                offset: line.text_top - view.viewport_top(),
                anchor: AnchorMode::TextTop,
            },
            None => {
                let first = view.first_visible_line()?;
                Redisplay {
                    line_start: first.start,
                    offset: first.top - view.viewport_top(),
                    anchor: AnchorMode::ViewportTop,
                }
            },
        };

        tracing::debug!(?redisplay, "requesting layout");
        self.layout_in_progress = true;
        Some(redisplay)
    }

    fn commit_deferred(&mut self) {
        let mut index = self.tags.len();
        while index > 0 {
            index -= 1;
            if self.tags[index].pending_delete {
                self.destroy_at(index);
            } else {
                self.tags[index].pending_create = false;
            }
        }
    }

    fn schedule_follow_up(&mut self) -> AfterLayout {
        if self.follow_up_scheduled {
            return AfterLayout::Idle;
        }
        if self.follow_ups_in_a_row >= self.config.max_follow_up_layouts {
            tracing::warn!(
                limit = self.config.max_follow_up_layouts,
                "follow-up layout limit reached, leaving changes deferred"
            );
            return AfterLayout::Idle;
        }

        self.follow_ups_in_a_row += 1;
        self.follow_up_scheduled = true;
        tracing::trace!(attempt = self.follow_ups_in_a_row, "scheduling follow-up layout");
        AfterLayout::ScheduleFollowUp
    }

    fn index_of(&self, tag: &Rc<Tag<R::Widget>>) -> Option<usize> {
        self.tags.iter().position(|active| active.is_tracking(tag))
    }

    fn to_current(&self, region: VersionedSpan) -> Span {
        if region.version > self.current_version {
            tracing::debug!(
                region = ?region.span,
                version = ?region.version,
                current = ?self.current_version,
                "change reported ahead of the manager, keeping as is"
            );
            return region.span;
        }
        self.tracker
            .track_span_forward(region.span, region.version, self.current_version)
    }

    fn to_view(&self, position: Position, view: &dyn TextView) -> Position {
        let version = view.version();
        if version > self.current_version {
            self.tracker
                .track_forward(position, self.current_version, version, Bias::Left)
        } else {
            position
        }
    }
}

impl<S, T, R: RenderSurface> AdornmentManager<S, T, R> {
    /// Remove every widget and stop listening to tags. Later calls do nothing.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        tracing::debug!(tags = self.tags.len(), "closing adornment manager");
        while !self.tags.is_empty() {
            self.destroy_at(self.tags.len() - 1);
        }
        self.inbox.borrow_mut().clear();
        self.invalidated = None;
        self.layout_pending = false;
        self.changed_during_layout = false;
        self.deferring = false;
    }

    fn destroy_at(&mut self, index: usize) {
        let mut active = self.tags.remove(index);
        if let Some(widget) = active.retire() {
            active.tag.notify_removed(&widget);
            self.surface.remove(&widget);
        }
    }
}

impl<S, T, R: RenderSurface> Drop for AdornmentManager<S, T, R> {
    fn drop(&mut self) {
        self.close();
    }
}

fn place<R: RenderSurface>(
    surface: &mut R,
    view: &dyn TextView,
    line: &LineInfo,
    active: &ActiveTag<R::Widget>,
    widget: &R::Widget,
) {
    let tag = &active.tag;
    let x = tag.horizontal_offset()
        + match tag.positioning() {
            HorizontalPositioning::TextRelative => view.character_left(line, active.position),
            HorizontalPositioning::ViewRelative => view.viewport_left(),
            HorizontalPositioning::Absolute => 0.0,
        };
    let y = if tag.is_above_line() {
        line.text_top - tag.height()
    } else {
        line.text_bottom
    };
    surface.place(widget, x, y);
}
