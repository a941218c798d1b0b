//! One [`AdornmentManager`] per view, created on first use and closed with the view.

use crate::{manager::AdornmentManager, surface::RenderSurface};
use rustc_hash::FxHashMap;

/// Host-assigned identity of a text view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewId(pub u64);

pub struct ManagerRegistry<S, T, R: RenderSurface> {
    managers: FxHashMap<ViewId, AdornmentManager<S, T, R>>,
}

impl<S, T, R: RenderSurface> Default for ManagerRegistry<S, T, R> {
    fn default() -> Self {
        Self {
            managers: FxHashMap::default(),
        }
    }
}

impl<S, T, R: RenderSurface> ManagerRegistry<S, T, R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The manager for `view`, building it with `create` the first time.
    pub fn get_or_create_with(
        &mut self,
        view: ViewId,
        create: impl FnOnce() -> AdornmentManager<S, T, R>,
    ) -> &mut AdornmentManager<S, T, R> {
        self.managers.entry(view).or_insert_with(|| {
            tracing::debug!(?view, "creating adornment manager for view");
            create()
        })
    }

    pub fn get(&self, view: ViewId) -> Option<&AdornmentManager<S, T, R>> {
        self.managers.get(&view)
    }

    pub fn get_mut(&mut self, view: ViewId) -> Option<&mut AdornmentManager<S, T, R>> {
        self.managers.get_mut(&view)
    }

    /// Close and forget the manager of a closed view. Returns false if there was none.
    pub fn on_view_closed(&mut self, view: ViewId) -> bool {
        let Some(mut manager) = self.managers.remove(&view) else {
            return false;
        };
        manager.close();
        true
    }

    pub fn contains(&self, view: ViewId) -> bool {
        self.managers.contains_key(&view)
    }

    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }
}
