//! The manager's private record for one tag it currently tracks.

use crate::{
    observable::SubscriptionId,
    span::Position,
    tag::Tag,
    view::TextView,
};
use std::{
    cell::RefCell,
    collections::VecDeque,
    rc::{Rc, Weak},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TagEventKind {
    Height,
    HorizontalOffset,
}

/// A property change on a realized tag, queued until the host flushes the manager.
pub(crate) struct TagEvent<W> {
    pub(crate) tag: Weak<Tag<W>>,
    pub(crate) kind: TagEventKind,
}

pub(crate) type Inbox<W> = Rc<RefCell<VecDeque<TagEvent<W>>>>;

#[derive(Clone, Copy, Debug)]
struct Subscriptions {
    height: SubscriptionId,
    horizontal_offset: SubscriptionId,
}

/// Binds a [`Tag`] to a position in the manager's current version and tracks its lifecycle.
pub struct ActiveTag<W> {
    pub(crate) tag: Rc<Tag<W>>,
    /// Always expressed in the manager's current version.
    pub(crate) position: Position,
    /// Height last used for spacing while changes were not deferred.
    pub(crate) cached_height: f64,
    pub(crate) visual: Option<W>,
    subscriptions: Option<Subscriptions>,
    pub(crate) pending_delete: bool,
    pub(crate) pending_create: bool,
    pub(crate) is_realized: bool,
}

impl<W> ActiveTag<W> {
    pub(crate) fn new(tag: Rc<Tag<W>>, position: Position, pending_create: bool) -> Self {
        let cached_height = tag.height();
        Self {
            tag,
            position,
            cached_height,
            visual: None,
            subscriptions: None,
            pending_delete: false,
            pending_create,
            is_realized: false,
        }
    }

    pub fn tag(&self) -> &Rc<Tag<W>> {
        &self.tag
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn cached_height(&self) -> f64 {
        self.cached_height
    }

    pub fn visual(&self) -> Option<&W> {
        self.visual.as_ref()
    }

    pub fn is_pending_delete(&self) -> bool {
        self.pending_delete
    }

    pub fn is_pending_create(&self) -> bool {
        self.pending_create
    }

    pub fn is_realized(&self) -> bool {
        self.is_realized
    }

    /// Whether this tag reserves space in the current layout.
    pub(crate) fn contributes_space(&self, deferring: bool) -> bool {
        !self.pending_create && (deferring || !self.pending_delete)
    }

    pub(crate) fn is_tracking(&self, tag: &Rc<Tag<W>>) -> bool {
        Rc::ptr_eq(&self.tag, tag)
    }

    fn unsubscribe(&mut self) {
        if let Some(subscriptions) = self.subscriptions.take() {
            self.tag.unsubscribe_height(subscriptions.height);
            self.tag.unsubscribe_horizontal_offset(subscriptions.horizontal_offset);
        }
    }

    /// Drop the subscriptions and hand back the widget, if any, for removal.
    pub(crate) fn retire(&mut self) -> Option<W> {
        self.unsubscribe();
        self.visual.take()
    }
}

impl<W: 'static> ActiveTag<W> {
    /// Create the widget. Runs at most once per record, whatever the factory returns.
    pub(crate) fn realize(&mut self, view: &dyn TextView, inbox: &Inbox<W>) -> Option<&W> {
        debug_assert!(!self.is_realized, "tag realized twice");
        self.is_realized = true;
        self.visual = self.tag.create_visual(view, self.position);

        // Subscribe only now so changes made by the factory itself are not reported.
        if self.visual.is_some() {
            self.subscribe(inbox);
        }
        self.visual.as_ref()
    }

    fn subscribe(&mut self, inbox: &Inbox<W>) {
        let height = self.tag.on_height_changed(notifier(
            Rc::downgrade(&self.tag),
            Rc::downgrade(inbox),
            TagEventKind::Height,
        ));
        let horizontal_offset = self.tag.on_horizontal_offset_changed(notifier(
            Rc::downgrade(&self.tag),
            Rc::downgrade(inbox),
            TagEventKind::HorizontalOffset,
        ));
        self.subscriptions = Some(Subscriptions {
            height,
            horizontal_offset,
        });
    }
}

fn notifier<W: 'static>(
    tag: Weak<Tag<W>>,
    inbox: Weak<RefCell<VecDeque<TagEvent<W>>>>,
    kind: TagEventKind,
) -> impl Fn(f64, f64) + 'static {
    move |_, _| {
        let (Some(strong), Some(inbox)) = (tag.upgrade(), inbox.upgrade()) else {
            return;
        };
        // Only animating tags ask for a layout of their own.
        if kind == TagEventKind::Height && !strong.is_animating() {
            return;
        }
        inbox.borrow_mut().push_back(TagEvent {
            tag: Weak::clone(&tag),
            kind,
        });
    }
}
