//! Progressive render sessions: bake, animation and live preview.
//!
//! A [`RenderSessionController`] owns one session's lifecycle and drives a
//! [`SessionBackend`] one tile per host tick. The host lends a
//! [`FrameScheduler`] for ticks and a [`SessionHost`] for output.

pub mod backend;
pub mod controller;
pub mod gpu_backend;
pub mod host;
pub mod policy;
pub mod registry;

pub use backend::{ResourceRequest, SessionBackend, TileProgress};
pub use controller::{RenderSessionController, SessionState, StartOutcome, TickOutcome};
pub use gpu_backend::{GpuSessionBackend, ViewportFrame};
pub use host::{FrameScheduler, SessionHost, TickHandle, TickSource, ViewAnchor, ViewHandle};
pub use policy::{FrameTiming, SessionMode, SessionPolicy};
pub use registry::SessionRegistry;
