//! Capabilities the host application lends to a session.

use std::rc::{Rc, Weak};

use stratus_core::error::StratusError;
use stratus_core::output::OutputFormat;

/// Which host loop drives a registered session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickSource {
    /// Idle redraw of the viewport.
    Redraw,
    /// Fixed-interval timer.
    Timer,
}

/// Opaque subscription id returned by [`FrameScheduler::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickHandle(pub u64);

/// Host loop that calls back into sessions. Sessions keep only the handle.
pub trait FrameScheduler {
    fn register(&mut self, source: TickSource) -> TickHandle;
    fn unregister(&mut self, handle: TickHandle);
}

/// Owned by the host for as long as its display area exists.
#[derive(Debug, Default)]
pub struct ViewAnchor(Rc<()>);

impl ViewAnchor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> ViewHandle {
        ViewHandle(Rc::downgrade(&self.0))
    }
}

/// Weak reference to a host display area, checked at the top of every tick.
#[derive(Debug, Clone)]
pub struct ViewHandle(Weak<()>);

impl ViewHandle {
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

/// Sinks for committed images and user-facing messages.
pub trait SessionHost {
    /// Mirror committed pixels into the host's display texture.
    fn display(&mut self, pixels: &[f32], width: u32, height: u32);

    /// Encode committed pixels to `path`.
    fn encode(
        &mut self,
        pixels: &[f32],
        width: u32,
        height: u32,
        path: &str,
        format: OutputFormat,
    ) -> Result<(), StratusError>;

    /// Move the host timeline to `frame`.
    fn set_frame(&mut self, frame: u32);

    /// Run the host's still-image render/compose step for `frame`.
    fn render_still(&mut self, frame: u32) -> Result<(), StratusError>;

    /// Cached viewport shading must be redrawn.
    fn refresh_viewport(&mut self);

    /// One-line message for the user.
    fn report(&mut self, message: &str);
}
