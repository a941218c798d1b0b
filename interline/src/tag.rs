//! Annotation descriptors supplied by tag sources.
//!
//! A [`Tag`] describes one annotation that reserves vertical space above or below the line
//! containing its position. Placement facts are fixed at construction; the height and
//! horizontal offset are [`Observable`] so they can be animated while the annotation is on
//! screen.
//!
//! Tags are compared by identity. A source that wants an annotation to survive edits
//! without flicker must keep handing out the same [`Rc<Tag>`]; an equal but freshly
//! allocated tag is a different annotation.

use crate::{
    error::TagError,
    observable::{Observable, SubscriptionId},
    span::Position,
    view::TextView,
};
use std::{cell::Cell, fmt, rc::Rc};

/// Where the horizontal offset of a tag's widget is measured from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum HorizontalPositioning {
    /// Left edge of the character at the tag's position.
    #[default]
    TextRelative,
    /// Left edge of the viewport.
    ViewRelative,
    /// Left edge of the view.
    Absolute,
}

/// Creates the widget for a tag the first time it is realized.
///
/// Called with the tag, the view and the tag's position in the view's current version.
/// Returning `None` leaves the tag as a pure spacer.
pub type VisualFactory<W> = Box<dyn Fn(&Tag<W>, &dyn TextView, Position) -> Option<W>>;

/// Invoked with the tag and its widget just before the widget leaves the surface.
pub type RemovalCallback<W> = Box<dyn Fn(&Tag<W>, &W)>;

pub struct Tag<W> {
    is_above_line: bool,
    positioning: HorizontalPositioning,
    height: Observable<f64>,
    horizontal_offset: Observable<f64>,
    is_animating: Cell<bool>,
    visual_factory: Option<VisualFactory<W>>,
    removal_callback: Option<RemovalCallback<W>>,
}

impl<W> Tag<W> {
    /// Start building a tag placed above (`true`) or below (`false`) its line.
    pub fn builder(is_above_line: bool) -> TagBuilder<W> {
        TagBuilder {
            is_above_line,
            height: 0.0,
            positioning: HorizontalPositioning::default(),
            horizontal_offset: 0.0,
            visual_factory: None,
            removal_callback: None,
        }
    }

    pub fn is_above_line(&self) -> bool {
        self.is_above_line
    }

    pub fn positioning(&self) -> HorizontalPositioning {
        self.positioning
    }

    pub fn height(&self) -> f64 {
        self.height.get()
    }

    /// Change the reserved height. Views re-layout around animating tags on their own.
    pub fn set_height(&self, height: f64) -> Result<(), TagError> {
        validate_height(height)?;
        self.height.set(height);
        Ok(())
    }

    pub fn horizontal_offset(&self) -> f64 {
        self.horizontal_offset.get()
    }

    pub fn set_horizontal_offset(&self, offset: f64) {
        self.horizontal_offset.set(offset);
    }

    /// Whether height changes should trigger a layout preserving this tag's line.
    ///
    /// Defaults to true. When false, a new height only takes effect at the next layout
    /// the view performs for some other reason.
    pub fn is_animating(&self) -> bool {
        self.is_animating.get()
    }

    pub fn set_animating(&self, animating: bool) {
        self.is_animating.set(animating);
    }

    pub fn has_visual_factory(&self) -> bool {
        self.visual_factory.is_some()
    }

    pub(crate) fn create_visual(&self, view: &dyn TextView, position: Position) -> Option<W> {
        self.visual_factory
            .as_ref()
            .and_then(|factory| factory(self, view, position))
    }

    pub(crate) fn notify_removed(&self, widget: &W) {
        if let Some(callback) = &self.removal_callback {
            callback(self, widget);
        }
    }

    pub fn on_height_changed(&self, callback: impl Fn(f64, f64) + 'static) -> SubscriptionId {
        self.height.subscribe(callback)
    }

    pub fn on_horizontal_offset_changed(
        &self,
        callback: impl Fn(f64, f64) + 'static,
    ) -> SubscriptionId {
        self.horizontal_offset.subscribe(callback)
    }

    pub fn unsubscribe_height(&self, id: SubscriptionId) -> bool {
        self.height.unsubscribe(id)
    }

    pub fn unsubscribe_horizontal_offset(&self, id: SubscriptionId) -> bool {
        self.horizontal_offset.unsubscribe(id)
    }

    /// Number of live height and offset subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.height.subscriber_count() + self.horizontal_offset.subscriber_count()
    }
}

impl<W> fmt::Debug for Tag<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tag")
            .field("is_above_line", &self.is_above_line)
            .field("positioning", &self.positioning)
            .field("height", &self.height.get())
            .field("horizontal_offset", &self.horizontal_offset.get())
            .field("is_animating", &self.is_animating.get())
            .field("has_visual_factory", &self.visual_factory.is_some())
            .finish()
    }
}

fn validate_height(height: f64) -> Result<(), TagError> {
    // Written so NaN is rejected too.
    if height >= 0.0 {
        Ok(())
    } else {
        Err(TagError::NegativeHeight { height })
    }
}

pub struct TagBuilder<W> {
    is_above_line: bool,
    height: f64,
    positioning: HorizontalPositioning,
    horizontal_offset: f64,
    visual_factory: Option<VisualFactory<W>>,
    removal_callback: Option<RemovalCallback<W>>,
}

impl<W> TagBuilder<W> {
    pub fn height(mut self, height: f64) -> Self {
        self.height = height;
        self
    }

    pub fn positioning(mut self, positioning: HorizontalPositioning) -> Self {
        self.positioning = positioning;
        self
    }

    pub fn horizontal_offset(mut self, offset: f64) -> Self {
        self.horizontal_offset = offset;
        self
    }

    pub fn visual(
        mut self,
        factory: impl Fn(&Tag<W>, &dyn TextView, Position) -> Option<W> + 'static,
    ) -> Self {
        self.visual_factory = Some(Box::new(factory));
        self
    }

    pub fn on_removed(mut self, callback: impl Fn(&Tag<W>, &W) + 'static) -> Self {
        self.removal_callback = Some(Box::new(callback));
        self
    }

    pub fn build(self) -> Result<Rc<Tag<W>>, TagError> {
        validate_height(self.height)?;
        if self.removal_callback.is_some() && self.visual_factory.is_none() {
            return Err(TagError::RemovalWithoutFactory);
        }

        Ok(Rc::new(Tag {
            is_above_line: self.is_above_line,
            positioning: self.positioning,
            height: Observable::new(self.height),
            horizontal_offset: Observable::new(self.horizontal_offset),
            is_animating: Cell::new(true),
            visual_factory: self.visual_factory,
            removal_callback: self.removal_callback,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let tag = Tag::<()>::builder(true).build().unwrap();

        assert!(tag.is_above_line());
        assert_eq!(tag.height(), 0.0);
        assert_eq!(tag.horizontal_offset(), 0.0);
        assert_eq!(tag.positioning(), HorizontalPositioning::TextRelative);
        assert!(tag.is_animating());
        assert!(!tag.has_visual_factory());
    }

    #[test]
    fn negative_height_is_rejected() {
        let err = Tag::<()>::builder(false).height(-1.0).build().unwrap_err();

        assert_eq!(err, TagError::NegativeHeight { height: -1.0 });
    }

    #[test]
    fn nan_height_is_rejected() {
        assert!(Tag::<()>::builder(false).height(f64::NAN).build().is_err());

        let tag = Tag::<()>::builder(false).height(4.0).build().unwrap();
        assert!(tag.set_height(f64::NAN).is_err());
        assert_eq!(tag.height(), 4.0);
    }

    #[test]
    fn removal_callback_requires_factory() {
        let err = Tag::<u32>::builder(true)
            .on_removed(|_, _| {})
            .build()
            .unwrap_err();

        assert_eq!(err, TagError::RemovalWithoutFactory);
    }

    #[test]
    fn height_changes_reach_subscribers() {
        let tag = Tag::<()>::builder(true).height(10.0).build().unwrap();
        let seen = Rc::new(Cell::new(0.0));

        let sink = Rc::clone(&seen);
        let id = tag.on_height_changed(move |_, new| sink.set(new));
        tag.set_height(25.0).unwrap();

        assert_eq!(seen.get(), 25.0);
        assert!(tag.unsubscribe_height(id));
        assert_eq!(tag.subscriber_count(), 0);
    }
}
