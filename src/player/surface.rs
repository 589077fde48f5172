use std::cell::RefCell;
use std::rc::Rc;

/// Where an engine renders. `window_id` is an embedding handle when the
/// surface belongs to another window; `None` lets the engine open its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Surface {
    pub(crate) label: String,
    pub(crate) window_id: Option<i64>,
}

pub(crate) trait SurfaceProvider {
    /// Returns `None` while the surface is not attachable yet.
    fn attach_point(&self) -> Option<Surface>;
}

/// A surface that appears once its owner attaches it.
#[derive(Debug, Clone, Default)]
pub(crate) struct SurfaceSlot {
    inner: Rc<RefCell<Option<Surface>>>,
}

impl SurfaceSlot {
    pub(crate) fn attach(&self, surface: Surface) {
        *self.inner.borrow_mut() = Some(surface);
    }

    pub(crate) fn detach(&self) {
        self.inner.borrow_mut().take();
    }
}

impl SurfaceProvider for SurfaceSlot {
    fn attach_point(&self) -> Option<Surface> {
        self.inner.borrow().clone()
    }
}
