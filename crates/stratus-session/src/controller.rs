//! The session state machine shared by bake, animation and live preview.
//!
//! ```text
//! Idle -> Initializing -> Running -> Finalizing -> Idle
//! ```
//!
//! Every tick runs at most one irradiance compute and one tile draw, so a
//! single host callback stays cheap. What happens when the tile sequence
//! completes is decided by the [`SessionPolicy`].

use std::rc::Rc;
use std::time::Instant;

use stratus_core::commands::{Command, CommandQueue, EditTracker};
use stratus_core::error::StratusError;
use stratus_core::params::SceneParameterSnapshot;
use stratus_core::settings::RenderSettings;

use crate::backend::SessionBackend;
use crate::host::{FrameScheduler, SessionHost, TickHandle, ViewHandle};
use crate::policy::{CompletedImage, Completion, FrameTiming, SessionMode, SessionPolicy};
use crate::registry::SessionRegistry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    Initializing,
    Running,
    Finalizing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A session of this mode is already running; nothing was done.
    AlreadyRunning,
}

/// Status reported to the host after every tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    pub state: SessionState,
    /// Fraction of the current tile sequence drawn.
    pub progress: f32,
    pub drew_tile: bool,
    pub composited: bool,
    /// A preview pass completed; cached viewport shading is stale.
    pub refresh: bool,
    /// The session finished and released its resources this tick.
    pub finished: bool,
    /// The session cancelled itself this tick (its view went away).
    pub cancelled: bool,
    /// The session stopped on this error this tick.
    pub error: Option<String>,
}

#[derive(Debug, Default)]
struct Step {
    drew_tile: bool,
    composited: bool,
    refresh: bool,
    finished: bool,
}

pub struct RenderSessionController<B: SessionBackend> {
    mode: SessionMode,
    policy: SessionPolicy,
    backend: B,
    registry: Rc<SessionRegistry>,
    state: SessionState,
    snapshot: SceneParameterSnapshot,
    commands: CommandQueue,
    edits: EditTracker,
    /// Preview tile drawing on/off (Hold/Draw commands).
    drawing: bool,
    tick_handle: Option<TickHandle>,
    view: Option<ViewHandle>,
    sequence_started: Instant,
    timings: Vec<FrameTiming>,
}

impl<B: SessionBackend> RenderSessionController<B> {
    pub fn new(mode: SessionMode, backend: B, registry: Rc<SessionRegistry>) -> Self {
        Self {
            mode,
            policy: SessionPolicy::new(mode, &RenderSettings::default()),
            backend,
            registry,
            state: SessionState::Idle,
            snapshot: SceneParameterSnapshot::default(),
            commands: CommandQueue::new(),
            edits: EditTracker::new(),
            drawing: true,
            tick_handle: None,
            view: None,
            sequence_started: Instant::now(),
            timings: Vec::new(),
        }
    }

    /// Tie the session to a host display area. Once the area is gone the
    /// next tick cancels the session.
    pub fn attach_view(&mut self, view: ViewHandle) {
        self.view = Some(view);
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn snapshot(&self) -> &SceneParameterSnapshot {
        &self.snapshot
    }

    /// Wall times of every image completed since the last start.
    pub fn timings(&self) -> &[FrameTiming] {
        &self.timings
    }

    /// Queue a command for the next tick. Only the live preview applies them.
    pub fn push_command(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// A parameter changed. The preview takes the new snapshot at once and
    /// holds tile drawing until the edit ends. Running bakes keep the
    /// snapshot they started with.
    pub fn on_edit(&mut self, snapshot: SceneParameterSnapshot) {
        if self.mode != SessionMode::Viewport && self.state != SessionState::Idle {
            log::debug!("{:?} session ignores parameter edits while running", self.mode);
            return;
        }
        self.snapshot = snapshot;
        self.edits.on_edit(&mut self.commands);
    }

    pub fn on_edit_end(&mut self) {
        self.edits.on_edit_end(&mut self.commands);
    }

    /// Allocate resources and subscribe to host ticks.
    ///
    /// A start while a session of the same mode runs is a no-op. Invalid
    /// settings and resource failures leave the controller `Idle`.
    pub fn start(
        &mut self,
        snapshot: SceneParameterSnapshot,
        settings: &RenderSettings,
        scheduler: &mut dyn FrameScheduler,
        host: &mut dyn SessionHost,
    ) -> Result<StartOutcome, StratusError> {
        if self.state != SessionState::Idle || !self.registry.try_acquire(self.mode) {
            log::debug!("{:?} session already running, start ignored", self.mode);
            return Ok(StartOutcome::AlreadyRunning);
        }

        let policy = SessionPolicy::new(self.mode, settings);
        if let Err(e) = settings.validate().and_then(|_| policy.validate()) {
            self.registry.release(self.mode);
            log::error!("{:?} session refused: {e}", self.mode);
            host.report(&format!("Stratus: {e}"));
            return Err(e);
        }

        self.state = SessionState::Initializing;
        let request = policy.resource_request(settings);
        if let Err(e) = self.backend.acquire(&request) {
            self.backend.release();
            self.registry.release(self.mode);
            self.state = SessionState::Idle;
            log::error!("{:?} session could not allocate resources: {e}", self.mode);
            host.report(&format!("Stratus: {e}"));
            return Err(e);
        }

        self.policy = policy;
        self.snapshot = snapshot;
        self.commands = CommandQueue::new();
        self.edits = EditTracker::new();
        self.drawing = true;
        self.timings.clear();
        self.tick_handle = Some(scheduler.register(self.mode.tick_source()));
        self.policy.on_resources_ready(host);
        self.sequence_started = Instant::now();
        self.state = SessionState::Running;

        let progress = self.backend.progress();
        log::info!(
            "{:?} session started: {}x{}, {} tiles",
            self.mode,
            progress.width,
            progress.height,
            progress.tile_count
        );
        Ok(StartOutcome::Started)
    }

    /// One host callback's worth of work.
    pub fn tick(
        &mut self,
        scheduler: &mut dyn FrameScheduler,
        host: &mut dyn SessionHost,
    ) -> TickOutcome {
        if self.state != SessionState::Running {
            return self.outcome();
        }

        if let Some(view) = &self.view {
            if !view.is_alive() {
                log::info!("{:?} session view closed, cancelling", self.mode);
                self.finalize(scheduler);
                return TickOutcome {
                    cancelled: true,
                    ..self.outcome()
                };
            }
        }

        match self.step(host) {
            Ok(step) => {
                if step.finished {
                    let progress = self.backend.progress().fraction();
                    self.finalize(scheduler);
                    log::info!("{:?} session finished", self.mode);
                    return TickOutcome {
                        progress,
                        drew_tile: step.drew_tile,
                        composited: step.composited,
                        finished: true,
                        ..self.outcome()
                    };
                }
                TickOutcome {
                    drew_tile: step.drew_tile,
                    composited: step.composited,
                    refresh: step.refresh,
                    ..self.outcome()
                }
            }
            Err(e) => {
                log::error!("{:?} session stopped: {e}", self.mode);
                host.report(&format!("Stratus: {e}"));
                self.finalize(scheduler);
                TickOutcome {
                    error: Some(e.to_string()),
                    ..self.outcome()
                }
            }
        }
    }

    /// Stop and release everything. Returns false if nothing was running.
    pub fn cancel(
        &mut self,
        scheduler: &mut dyn FrameScheduler,
        host: &mut dyn SessionHost,
    ) -> bool {
        if self.state == SessionState::Idle {
            return false;
        }
        self.policy.on_cancel(host);
        self.finalize(scheduler);
        log::info!("{:?} session cancelled", self.mode);
        true
    }

    fn step(&mut self, host: &mut dyn SessionHost) -> Result<Step, StratusError> {
        self.apply_commands()?;

        let variant = self.mode.variant();
        let tiles_allowed = match self.mode {
            SessionMode::Viewport => self.drawing && !self.registry.bake_active(),
            SessionMode::Bake | SessionMode::Animation => true,
        };
        let draw_tile = tiles_allowed && !self.backend.progress().completed();
        let composite = self.mode == SessionMode::Viewport && self.backend.has_view();

        let mut step = Step::default();
        // Irradiance follows the snapshot, so refresh it whenever anything consumes it
        if draw_tile || composite {
            self.backend.compute_irradiance(&self.snapshot, variant)?;
        }
        if draw_tile {
            self.backend.draw_tile(&self.snapshot, variant)?;
            step.drew_tile = true;
        }
        if composite {
            step.composited = self.backend.composite(&self.snapshot)?;
        }

        let progress = self.backend.progress();
        if step.drew_tile && progress.completed() {
            let pixels = self.backend.commit()?;
            let elapsed = self.sequence_started.elapsed();
            self.timings.push(FrameTiming {
                frame: self.policy.current_frame(),
                elapsed,
                width: progress.width,
                height: progress.height,
                tile_count: progress.tile_count,
            });
            let image = CompletedImage {
                pixels: &pixels,
                width: progress.width,
                height: progress.height,
                tile_count: progress.tile_count,
                elapsed,
            };
            match self.policy.on_tile_sequence_complete(&image, host)? {
                Completion::Finish => step.finished = true,
                Completion::Continue => {
                    self.backend.reset();
                    self.sequence_started = Instant::now();
                    step.refresh = self.mode == SessionMode::Viewport;
                }
            }
        }
        Ok(step)
    }

    /// Apply queued commands in their fixed order: resize, retile, reset,
    /// hold, draw.
    fn apply_commands(&mut self) -> Result<(), StratusError> {
        let pending = self.commands.drain();
        if pending.is_empty() {
            return Ok(());
        }
        if self.mode != SessionMode::Viewport {
            log::debug!("{:?} session ignores {:?}", self.mode, pending);
            return Ok(());
        }
        for command in pending.ordered() {
            match command {
                Command::Resize(multiplier) => {
                    self.backend.resize(multiplier)?;
                    self.sequence_started = Instant::now();
                }
                Command::Retile { tile_size, tiling } => {
                    self.backend.retile(tile_size, tiling)?;
                    self.sequence_started = Instant::now();
                }
                Command::Reset => {
                    self.backend.reset();
                    self.sequence_started = Instant::now();
                }
                Command::Hold => self.drawing = false,
                Command::Draw => self.drawing = true,
            }
        }
        Ok(())
    }

    fn finalize(&mut self, scheduler: &mut dyn FrameScheduler) {
        self.state = SessionState::Finalizing;
        self.backend.release();
        if let Some(handle) = self.tick_handle.take() {
            scheduler.unregister(handle);
        }
        self.registry.release(self.mode);
        self.state = SessionState::Idle;
    }

    fn outcome(&self) -> TickOutcome {
        let progress = if self.state == SessionState::Running {
            self.backend.progress().fraction()
        } else {
            0.0
        };
        TickOutcome {
            state: self.state,
            progress,
            ..Default::default()
        }
    }
}

impl<B: SessionBackend> Drop for RenderSessionController<B> {
    fn drop(&mut self) {
        // No scheduler here; the host drops its subscriptions with the controller.
        if self.state != SessionState::Idle {
            log::warn!("{:?} session dropped while running", self.mode);
            self.backend.release();
            self.registry.release(self.mode);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ResourceRequest, TileProgress};
    use crate::host::{TickSource, ViewAnchor};
    use stratus_core::output::OutputFormat;
    use stratus_core::params::BudgetVariant;
    use stratus_core::tiling::TileGrid;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Acquire(f32),
        Release,
        Irradiance(BudgetVariant),
        Draw(u32),
        Composite,
        Reset,
        Resize(f32),
        Retile(u32, bool),
        Commit,
    }

    #[derive(Default)]
    struct MockBackend {
        grid: Option<TileGrid>,
        calls: Vec<Call>,
        fail_acquire: bool,
        fail_draw_at: Option<u32>,
        view: bool,
    }

    impl MockBackend {
        fn count(&self, f: impl Fn(&Call) -> bool) -> usize {
            self.calls.iter().filter(|c| f(c)).count()
        }

        fn draws(&self) -> usize {
            self.count(|c| matches!(c, Call::Draw(_)))
        }

        fn releases(&self) -> usize {
            self.count(|c| *c == Call::Release)
        }

        fn commits(&self) -> usize {
            self.count(|c| *c == Call::Commit)
        }

        fn irradiance(&self) -> usize {
            self.count(|c| matches!(c, Call::Irradiance(_)))
        }

        fn grid(&mut self) -> Result<&mut TileGrid, StratusError> {
            self.grid.as_mut().ok_or(StratusError::ReadbackFailed("no grid".into()))
        }
    }

    impl SessionBackend for MockBackend {
        fn acquire(&mut self, request: &ResourceRequest) -> Result<(), StratusError> {
            self.calls.push(Call::Acquire(request.size_multiplier));
            if self.fail_acquire {
                return Err(StratusError::ResourceCreationFailed {
                    label: "env-image".into(),
                    reason: "out of memory".into(),
                });
            }
            let mut grid = TileGrid::new(16384);
            grid.set_size(request.size_multiplier)?;
            grid.set_tile_size(request.tile_size)?;
            if !request.tiling {
                grid.disable_tiling();
            }
            self.grid = Some(grid);
            Ok(())
        }

        fn release(&mut self) {
            self.calls.push(Call::Release);
            self.grid = None;
        }

        fn compute_irradiance(
            &mut self,
            _snapshot: &SceneParameterSnapshot,
            variant: BudgetVariant,
        ) -> Result<(), StratusError> {
            self.calls.push(Call::Irradiance(variant));
            Ok(())
        }

        fn draw_tile(
            &mut self,
            _snapshot: &SceneParameterSnapshot,
            _variant: BudgetVariant,
        ) -> Result<(), StratusError> {
            let index = self.grid()?.tile_index();
            self.calls.push(Call::Draw(index));
            if self.fail_draw_at == Some(self.draws() as u32) {
                return Err(StratusError::ResourceCreationFailed {
                    label: "raymarch-tile-pass".into(),
                    reason: "device lost".into(),
                });
            }
            self.grid()?.advance_tile();
            Ok(())
        }

        fn composite(&mut self, _snapshot: &SceneParameterSnapshot) -> Result<bool, StratusError> {
            self.calls.push(Call::Composite);
            Ok(self.view)
        }

        fn has_view(&self) -> bool {
            self.view
        }

        fn progress(&self) -> TileProgress {
            match &self.grid {
                Some(grid) => {
                    let (width, height) = grid.size();
                    TileProgress {
                        tile_index: grid.tile_index(),
                        tile_count: grid.tile_count(),
                        width,
                        height,
                    }
                }
                None => TileProgress {
                    tile_index: 0,
                    tile_count: 0,
                    width: 0,
                    height: 0,
                },
            }
        }

        fn reset(&mut self) {
            self.calls.push(Call::Reset);
            if let Some(grid) = &mut self.grid {
                grid.reset();
            }
        }

        fn resize(&mut self, multiplier: f32) -> Result<(), StratusError> {
            self.calls.push(Call::Resize(multiplier));
            self.grid()?.set_size(multiplier)?;
            Ok(())
        }

        fn retile(&mut self, tile_size: u32, tiling: bool) -> Result<(), StratusError> {
            self.calls.push(Call::Retile(tile_size, tiling));
            let grid = self.grid()?;
            grid.set_tile_size(tile_size)?;
            if tiling {
                grid.enable_tiling();
            } else {
                grid.disable_tiling();
            }
            Ok(())
        }

        fn commit(&mut self) -> Result<Vec<f32>, StratusError> {
            self.calls.push(Call::Commit);
            let (w, h) = self.grid()?.size();
            Ok(vec![0.5; (w * h * 4) as usize])
        }
    }

    #[derive(Default)]
    struct MockScheduler {
        next: u64,
        registered: Vec<TickHandle>,
        unregistered: Vec<TickHandle>,
    }

    impl FrameScheduler for MockScheduler {
        fn register(&mut self, _source: TickSource) -> TickHandle {
            self.next += 1;
            let handle = TickHandle(self.next);
            self.registered.push(handle);
            handle
        }

        fn unregister(&mut self, handle: TickHandle) {
            self.unregistered.push(handle);
        }
    }

    #[derive(Default)]
    struct MockHost {
        displays: Vec<(u32, u32)>,
        encodes: Vec<String>,
        frames: Vec<u32>,
        stills: Vec<u32>,
        refreshes: u32,
        reports: Vec<String>,
    }

    impl SessionHost for MockHost {
        fn display(&mut self, _pixels: &[f32], width: u32, height: u32) {
            self.displays.push((width, height));
        }

        fn encode(
            &mut self,
            pixels: &[f32],
            width: u32,
            height: u32,
            path: &str,
            _format: OutputFormat,
        ) -> Result<(), StratusError> {
            assert_eq!(pixels.len(), (width * height * 4) as usize);
            self.encodes.push(path.to_string());
            Ok(())
        }

        fn set_frame(&mut self, frame: u32) {
            self.frames.push(frame);
        }

        fn render_still(&mut self, frame: u32) -> Result<(), StratusError> {
            self.stills.push(frame);
            Ok(())
        }

        fn refresh_viewport(&mut self) {
            self.refreshes += 1;
        }

        fn report(&mut self, message: &str) {
            self.reports.push(message.to_string());
        }
    }

    struct Rig {
        scheduler: MockScheduler,
        host: MockHost,
        registry: Rc<SessionRegistry>,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                scheduler: MockScheduler::default(),
                host: MockHost::default(),
                registry: SessionRegistry::new(),
            }
        }

        fn controller(&self, mode: SessionMode) -> RenderSessionController<MockBackend> {
            self.controller_with(mode, MockBackend::default())
        }

        fn controller_with(
            &self,
            mode: SessionMode,
            backend: MockBackend,
        ) -> RenderSessionController<MockBackend> {
            RenderSessionController::new(mode, backend, self.registry.clone())
        }

        fn start(
            &mut self,
            controller: &mut RenderSessionController<MockBackend>,
            settings: &RenderSettings,
        ) -> Result<StartOutcome, StratusError> {
            controller.start(
                SceneParameterSnapshot::default(),
                settings,
                &mut self.scheduler,
                &mut self.host,
            )
        }

        fn tick(&mut self, controller: &mut RenderSessionController<MockBackend>) -> TickOutcome {
            controller.tick(&mut self.scheduler, &mut self.host)
        }
    }

    fn untiled(render_size: f32) -> RenderSettings {
        RenderSettings {
            render_size,
            viewport_size: render_size,
            tiling: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_bake_draws_every_tile_then_commits_once() {
        let mut rig = Rig::new();
        let mut bake = rig.controller(SessionMode::Bake);
        let settings = RenderSettings {
            render_size: 4.0,
            tile_size: 512,
            ..Default::default()
        };
        assert_eq!(rig.start(&mut bake, &settings).ok(), Some(StartOutcome::Started));
        assert_eq!(bake.state(), SessionState::Running);
        assert_eq!(rig.scheduler.registered.len(), 1);

        for i in 0..31 {
            let outcome = rig.tick(&mut bake);
            assert!(outcome.drew_tile, "tick {i}");
            assert!(!outcome.finished);
        }
        assert_eq!(bake.backend().commits(), 0);

        let last = rig.tick(&mut bake);
        assert!(last.finished);
        assert_eq!(last.state, SessionState::Idle);
        assert_eq!(last.progress, 1.0);

        let backend = bake.backend();
        assert_eq!(backend.draws(), 32);
        assert_eq!(backend.irradiance(), 32);
        assert_eq!(backend.commits(), 1);
        assert_eq!(backend.releases(), 1);
        assert_eq!(rig.host.encodes, vec!["stratus_sky.exr".to_string()]);
        assert_eq!(rig.host.displays, vec![(4096, 2048)]);
        assert!(rig.host.reports[0].starts_with("Stratus time: "));
        assert_eq!(rig.scheduler.unregistered, rig.scheduler.registered);
        assert!(!rig.registry.is_active(SessionMode::Bake));
        assert_eq!(bake.timings().len(), 1);
        assert_eq!(bake.timings()[0].tile_count, 32);

        // Ticks after completion do nothing
        let idle = rig.tick(&mut bake);
        assert!(!idle.drew_tile);
        assert_eq!(bake.backend().draws(), 32);
    }

    #[test]
    fn test_closed_view_cancels_exactly_once() {
        let mut rig = Rig::new();
        let mut preview = rig.controller(SessionMode::Viewport);
        let anchor = ViewAnchor::new();
        preview.attach_view(anchor.handle());
        rig.start(&mut preview, &RenderSettings::default()).ok();
        assert!(rig.tick(&mut preview).drew_tile);

        drop(anchor);
        let outcome = rig.tick(&mut preview);
        assert!(outcome.cancelled);
        assert!(!outcome.drew_tile);
        assert_eq!(preview.state(), SessionState::Idle);

        let again = rig.tick(&mut preview);
        assert!(!again.cancelled);
        assert!(!preview.cancel(&mut rig.scheduler, &mut rig.host));
        assert_eq!(preview.backend().releases(), 1);
        assert_eq!(rig.scheduler.unregistered.len(), 1);
        assert!(!rig.registry.is_active(SessionMode::Viewport));
    }

    #[test]
    fn test_back_to_back_resizes_apply_last_then_reset() {
        let mut rig = Rig::new();
        let mut preview = rig.controller(SessionMode::Viewport);
        rig.start(&mut preview, &RenderSettings::default()).ok();
        rig.tick(&mut preview);

        preview.push_command(Command::Reset);
        preview.push_command(Command::Resize(1.0));
        preview.push_command(Command::Resize(2.0));
        let before = preview.backend().calls.len();
        let outcome = rig.tick(&mut preview);
        assert!(outcome.drew_tile);

        let calls = &preview.backend().calls[before..];
        assert_eq!(calls[0], Call::Resize(2.0));
        assert_eq!(calls[1], Call::Reset);
        assert_eq!(calls[3], Call::Draw(0));
        assert_eq!(preview.backend().count(|c| matches!(c, Call::Resize(_))), 1);
        let progress = preview.backend().progress();
        assert_eq!((progress.width, progress.height), (2048, 1024));
    }

    #[test]
    fn test_animation_refuses_video_container() {
        let mut rig = Rig::new();
        let mut anim = rig.controller(SessionMode::Animation);
        let mut settings = RenderSettings::default();
        settings.output.format = OutputFormat::Mp4;

        let result = rig.start(&mut anim, &settings);
        assert!(matches!(result, Err(StratusError::UnsupportedOutputFormat(_))));
        assert_eq!(anim.state(), SessionState::Idle);
        assert!(anim.backend().calls.is_empty());
        assert!(rig.scheduler.registered.is_empty());
        assert!(!rig.registry.is_active(SessionMode::Animation));
        assert_eq!(rig.host.reports.len(), 1);
    }

    #[test]
    fn test_bake_refuses_video_container() {
        let mut rig = Rig::new();
        let mut bake = rig.controller(SessionMode::Bake);
        let mut settings = RenderSettings::default();
        settings.render_size = 4.0;
        settings.tile_size = 512;
        settings.output.format = OutputFormat::Mp4;

        let result = rig.start(&mut bake, &settings);
        assert!(matches!(result, Err(StratusError::UnsupportedOutputFormat(_))));
        assert_eq!(bake.state(), SessionState::Idle);
        // Refused before any tile is drawn
        assert!(bake.backend().calls.is_empty());
        assert!(rig.host.encodes.is_empty());
        assert!(rig.scheduler.registered.is_empty());
        assert!(!rig.registry.is_active(SessionMode::Bake));
        assert_eq!(rig.host.reports.len(), 1);
    }

    #[test]
    fn test_second_start_is_noop() {
        let mut rig = Rig::new();
        let mut first = rig.controller(SessionMode::Bake);
        let mut second = rig.controller(SessionMode::Bake);
        let settings = RenderSettings::default();

        assert_eq!(rig.start(&mut first, &settings).ok(), Some(StartOutcome::Started));
        assert_eq!(
            rig.start(&mut second, &settings).ok(),
            Some(StartOutcome::AlreadyRunning)
        );
        assert_eq!(
            rig.start(&mut first, &settings).ok(),
            Some(StartOutcome::AlreadyRunning)
        );
        assert!(second.backend().calls.is_empty());
        assert_eq!(second.state(), SessionState::Idle);
        assert_eq!(rig.scheduler.registered.len(), 1);

        // A different mode is unaffected
        let mut preview = rig.controller(SessionMode::Viewport);
        assert_eq!(
            rig.start(&mut preview, &settings).ok(),
            Some(StartOutcome::Started)
        );
    }

    #[test]
    fn test_preview_skips_tiles_while_bake_active() {
        let mut rig = Rig::new();
        let mut preview = rig.controller(SessionMode::Viewport);
        rig.start(&mut preview, &RenderSettings::default()).ok();

        assert!(rig.registry.try_acquire(SessionMode::Bake));
        let outcome = rig.tick(&mut preview);
        assert!(!outcome.drew_tile);
        // No consumer ran, so no irradiance either
        assert_eq!(preview.backend().irradiance(), 0);

        rig.registry.release(SessionMode::Bake);
        assert!(rig.tick(&mut preview).drew_tile);
        assert_eq!(preview.backend().irradiance(), 1);
    }

    #[test]
    fn test_animation_advances_frames_until_end() {
        let mut rig = Rig::new();
        let mut anim = rig.controller(SessionMode::Animation);
        let settings = RenderSettings {
            frame_start: 1,
            frame_end: 3,
            ..untiled(0.5)
        };
        rig.start(&mut anim, &settings).ok();
        assert_eq!(rig.host.frames, vec![1]);

        assert!(!rig.tick(&mut anim).finished);
        assert!(!rig.tick(&mut anim).finished);
        let last = rig.tick(&mut anim);
        assert!(last.finished);

        assert_eq!(rig.host.stills, vec![1, 2, 3]);
        assert_eq!(rig.host.frames, vec![1, 2, 3]);
        assert_eq!(anim.backend().commits(), 3);
        assert_eq!(anim.backend().count(|c| *c == Call::Reset), 2);
        let frames: Vec<_> = anim.timings().iter().map(|t| t.frame).collect();
        assert_eq!(frames, vec![Some(1), Some(2), Some(3)]);
        assert_eq!(anim.backend().releases(), 1);
    }

    #[test]
    fn test_preview_refines_continuously() {
        let mut rig = Rig::new();
        let mut preview = rig.controller(SessionMode::Viewport);
        rig.start(&mut preview, &untiled(0.5)).ok();

        for _ in 0..3 {
            let outcome = rig.tick(&mut preview);
            assert!(outcome.drew_tile);
            assert!(outcome.refresh);
            assert!(!outcome.finished);
        }
        assert_eq!(preview.state(), SessionState::Running);
        assert_eq!(preview.backend().commits(), 3);
        assert_eq!(rig.host.refreshes, 3);
        assert!(rig.host.encodes.is_empty());

        assert!(preview.cancel(&mut rig.scheduler, &mut rig.host));
        assert_eq!(preview.backend().releases(), 1);
    }

    #[test]
    fn test_edit_burst_holds_then_restarts_once() {
        let mut rig = Rig::new();
        let mut preview = rig.controller(SessionMode::Viewport);
        rig.start(&mut preview, &RenderSettings::default()).ok();
        rig.tick(&mut preview);

        let mut snapshot = SceneParameterSnapshot::default();
        for i in 0..5 {
            snapshot.sun.elevation = i as f32 * 0.1;
            preview.on_edit(snapshot.clone());
        }
        assert!(!rig.tick(&mut preview).drew_tile);
        assert!(!rig.tick(&mut preview).drew_tile);
        assert!((preview.snapshot().sun.elevation - 0.4).abs() < 1e-6);

        preview.on_edit_end();
        let before = preview.backend().calls.len();
        assert!(rig.tick(&mut preview).drew_tile);
        let calls = &preview.backend().calls[before..];
        assert_eq!(calls[0], Call::Reset);
        assert_eq!(calls[2], Call::Draw(0));
    }

    #[test]
    fn test_resource_failure_reported_once_without_retry() {
        let mut rig = Rig::new();
        let backend = MockBackend {
            fail_acquire: true,
            ..Default::default()
        };
        let mut bake = rig.controller_with(SessionMode::Bake, backend);

        let result = rig.start(&mut bake, &RenderSettings::default());
        assert!(matches!(result, Err(StratusError::ResourceCreationFailed { .. })));
        assert_eq!(bake.state(), SessionState::Idle);
        assert_eq!(rig.host.reports.len(), 1);
        assert!(!rig.registry.is_active(SessionMode::Bake));

        // Ticking a failed session does not try again
        rig.tick(&mut bake);
        assert_eq!(bake.backend().count(|c| matches!(c, Call::Acquire(_))), 1);
        assert_eq!(rig.host.reports.len(), 1);
    }

    #[test]
    fn test_draw_error_stops_session() {
        let mut rig = Rig::new();
        let backend = MockBackend {
            fail_draw_at: Some(2),
            ..Default::default()
        };
        let mut bake = rig.controller_with(SessionMode::Bake, backend);
        rig.start(&mut bake, &RenderSettings::default()).ok();

        assert!(rig.tick(&mut bake).error.is_none());
        let failed = rig.tick(&mut bake);
        assert!(failed.error.is_some());
        assert_eq!(failed.state, SessionState::Idle);
        assert_eq!(bake.backend().releases(), 1);
        assert_eq!(rig.host.reports.len(), 1);

        rig.tick(&mut bake);
        assert_eq!(rig.host.reports.len(), 1);
        assert_eq!(bake.backend().commits(), 0);
    }

    #[test]
    fn test_composite_alone_still_refreshes_irradiance() {
        let mut rig = Rig::new();
        let backend = MockBackend {
            view: true,
            ..Default::default()
        };
        let mut preview = rig.controller_with(SessionMode::Viewport, backend);
        rig.start(&mut preview, &RenderSettings::default()).ok();

        preview.push_command(Command::Hold);
        let outcome = rig.tick(&mut preview);
        assert!(!outcome.drew_tile);
        assert!(outcome.composited);
        assert_eq!(preview.backend().irradiance(), 1);
        assert_eq!(preview.backend().calls.last(), Some(&Call::Composite));
    }

    #[test]
    fn test_bake_ignores_edits_and_commands() {
        let mut rig = Rig::new();
        let mut bake = rig.controller(SessionMode::Bake);
        rig.start(&mut bake, &untiled(0.25)).ok();

        let mut snapshot = SceneParameterSnapshot::default();
        snapshot.sun.intensity = 99.0;
        bake.on_edit(snapshot);
        bake.push_command(Command::Hold);
        assert_eq!(bake.snapshot(), &SceneParameterSnapshot::default());

        let outcome = rig.tick(&mut bake);
        assert!(outcome.drew_tile);
        assert!(outcome.finished);
        let render_computes = bake
            .backend()
            .count(|c| *c == Call::Irradiance(BudgetVariant::Render));
        assert_eq!(render_computes, 1);
    }
}
