//! Guard allowing one running session per mode.

use std::cell::Cell;
use std::rc::Rc;

use crate::policy::SessionMode;

#[derive(Debug, Default)]
pub struct SessionRegistry {
    bake: Cell<bool>,
    animation: Cell<bool>,
    viewport: Cell<bool>,
}

impl SessionRegistry {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    fn slot(&self, mode: SessionMode) -> &Cell<bool> {
        match mode {
            SessionMode::Bake => &self.bake,
            SessionMode::Animation => &self.animation,
            SessionMode::Viewport => &self.viewport,
        }
    }

    /// Claim `mode`. Returns false if a session of that mode already runs.
    pub fn try_acquire(&self, mode: SessionMode) -> bool {
        let slot = self.slot(mode);
        if slot.get() {
            return false;
        }
        slot.set(true);
        true
    }

    pub fn release(&self, mode: SessionMode) {
        self.slot(mode).set(false);
    }

    pub fn is_active(&self, mode: SessionMode) -> bool {
        self.slot(mode).get()
    }

    /// A final-quality render holds the GPU; the preview must not draw tiles.
    pub fn bake_active(&self) -> bool {
        self.bake.get() || self.animation.get()
    }
}
