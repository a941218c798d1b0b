/// Layer that displays widgets on top of the text. It knows nothing about tags.
///
/// A widget is added at most once and is never shared with another surface.
pub trait RenderSurface {
    type Widget;

    fn add(&mut self, widget: &Self::Widget);

    fn remove(&mut self, widget: &Self::Widget);

    /// Move `widget` so its top-left corner sits at `(x, y)` in view coordinates.
    fn place(&mut self, widget: &Self::Widget, x: f64, y: f64);
}
