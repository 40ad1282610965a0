//! [`SessionBackend`] over the wgpu render stages.

use std::cell::RefCell;
use std::rc::Rc;

use stratus_core::error::StratusError;
use stratus_core::params::{BudgetVariant, SceneParameterSnapshot};
use stratus_render::gpu::submit_checked;
use stratus_render::{
    DisplaySettings, EnvImage, IrradianceStage, SkyContext, TileRaymarchStage, ViewCamera,
    ViewportCompositor,
};

use crate::backend::{ResourceRequest, SessionBackend, TileProgress};

/// Everything the compositor needs for one host redraw.
pub struct ViewportFrame {
    pub camera: ViewCamera,
    /// Host color target, in the context's surface format.
    pub target: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    pub display: DisplaySettings,
}

/// Per-session GPU state, created by `acquire` and dropped by `release`.
struct GpuResources {
    image: EnvImage,
    irradiance: IrradianceStage,
    raymarch: TileRaymarchStage,
    compositor: Option<ViewportCompositor>,
}

pub struct GpuSessionBackend {
    context: Rc<RefCell<SkyContext>>,
    resources: Option<GpuResources>,
    frame: Option<ViewportFrame>,
    pixel_size: Option<u32>,
}

impl GpuSessionBackend {
    pub fn new(context: Rc<RefCell<SkyContext>>) -> Self {
        Self {
            context,
            resources: None,
            frame: None,
            pixel_size: None,
        }
    }

    /// Hand over the target for the next composite. Consumed by that composite.
    pub fn set_view_frame(&mut self, frame: ViewportFrame) {
        self.frame = Some(frame);
    }

    pub fn clear_view_frame(&mut self) {
        self.frame = None;
    }

    pub fn is_acquired(&self) -> bool {
        self.resources.is_some()
    }

    fn resources(&mut self) -> Result<&mut GpuResources, StratusError> {
        self.resources.as_mut().ok_or(StratusError::ResourceCreationFailed {
            label: "session".into(),
            reason: "resources not acquired".into(),
        })
    }
}

impl SessionBackend for GpuSessionBackend {
    fn acquire(&mut self, request: &ResourceRequest) -> Result<(), StratusError> {
        let mut ctx = self.context.borrow_mut();
        let (gpu, shared) = ctx.parts()?;

        let mut image = EnvImage::new(gpu, request.size_multiplier)?;
        image.set_tile_size(request.tile_size)?;
        if !request.tiling {
            image.disable_tiling();
        }
        let irradiance = IrradianceStage::new(gpu, shared)?;
        let raymarch = TileRaymarchStage::new(gpu, shared)?;

        let (width, height) = image.size();
        log::info!(
            "Session resources: {}x{} env image, {} tiles ({:?})",
            width,
            height,
            image.grid().tile_count(),
            request.variant
        );
        self.resources = Some(GpuResources {
            image,
            irradiance,
            raymarch,
            compositor: None,
        });
        self.pixel_size = request.viewport_pixel_size;
        Ok(())
    }

    fn release(&mut self) {
        if self.resources.take().is_some() {
            log::debug!("Session resources released");
        }
        self.frame = None;
        self.pixel_size = None;
    }

    fn compute_irradiance(
        &mut self,
        snapshot: &SceneParameterSnapshot,
        variant: BudgetVariant,
    ) -> Result<(), StratusError> {
        let context = self.context.clone();
        let res = self.resources()?;
        let mut ctx = context.borrow_mut();
        let (gpu, shared) = ctx.parts()?;

        submit_checked(gpu, "irradiance-encoder", |encoder| {
            res.irradiance
                .compute(gpu, shared, encoder, snapshot, variant);
        })
    }

    fn draw_tile(
        &mut self,
        snapshot: &SceneParameterSnapshot,
        variant: BudgetVariant,
    ) -> Result<(), StratusError> {
        let context = self.context.clone();
        let GpuResources {
            image,
            irradiance,
            raymarch,
            ..
        } = self.resources()?;
        let mut ctx = context.borrow_mut();
        let (gpu, shared) = ctx.parts()?;

        submit_checked(gpu, "raymarch-tile-encoder", |encoder| {
            raymarch.draw_tile(
                gpu,
                shared,
                encoder,
                image,
                irradiance,
                snapshot,
                variant,
            );
        })
    }

    fn composite(&mut self, snapshot: &SceneParameterSnapshot) -> Result<bool, StratusError> {
        let (Some(frame), Some(pixel_size)) = (self.frame.take(), self.pixel_size) else {
            return Ok(false);
        };
        let context = self.context.clone();
        let res = self.resources()?;
        let mut ctx = context.borrow_mut();
        let (gpu, shared) = ctx.parts()?;

        let compositor = match res.compositor.take() {
            Some(mut compositor) => {
                compositor.resize(gpu, shared, frame.width, frame.height, pixel_size)?;
                compositor
            }
            None => ViewportCompositor::new(gpu, shared, frame.width, frame.height, pixel_size)?,
        };
        let compositor = res.compositor.insert(compositor);

        let irradiance = &res.irradiance;
        submit_checked(gpu, "viewport-encoder", |encoder| {
            compositor.draw(
                gpu,
                shared,
                encoder,
                &frame.target,
                irradiance,
                snapshot,
                &frame.camera,
                frame.display,
            );
        })?;
        Ok(true)
    }

    fn has_view(&self) -> bool {
        self.frame.is_some() && self.pixel_size.is_some()
    }

    fn progress(&self) -> TileProgress {
        match &self.resources {
            Some(res) => {
                let grid = res.image.grid();
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
        if let Some(res) = &mut self.resources {
            res.image.reset();
        }
    }

    fn resize(&mut self, multiplier: f32) -> Result<(), StratusError> {
        let context = self.context.clone();
        let res = self.resources()?;
        let ctx = context.borrow();
        res.image.set_size(&ctx.gpu, multiplier)?;
        Ok(())
    }

    fn retile(&mut self, tile_size: u32, tiling: bool) -> Result<(), StratusError> {
        let res = self.resources()?;
        res.image.set_tile_size(tile_size)?;
        if tiling {
            res.image.enable_tiling();
        } else {
            res.image.disable_tiling();
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<Vec<f32>, StratusError> {
        let context = self.context.clone();
        let res = self.resources()?;
        let ctx = context.borrow();
        res.image.commit(&ctx.gpu)
    }
}

#[cfg(all(test, feature = "gpu_tests"))]
mod tests {
    use super::*;

    use glam::{Mat4, Vec3};
    use stratus_core::output::OutputFormat;
    use stratus_core::settings::RenderSettings;
    use stratus_render::{GpuContext, NoiseConfig};

    use crate::controller::RenderSessionController;
    use crate::host::{FrameScheduler, SessionHost, TickHandle, TickSource};
    use crate::policy::SessionMode;
    use crate::registry::SessionRegistry;

    fn small_context() -> Rc<RefCell<SkyContext>> {
        let gpu = GpuContext::headless().expect("headless gpu");
        let config = NoiseConfig {
            shape_size: 16,
            detail_size: 8,
            coverage_size: 32,
            blue_noise_size: 64,
            moon_width: 32,
            seed: 7,
        };
        Rc::new(RefCell::new(SkyContext::with_noise_config(
            gpu,
            wgpu::TextureFormat::Rgba8Unorm,
            config,
        )))
    }

    #[derive(Default)]
    struct Recorder {
        encoded: Vec<(String, usize)>,
        handles: u64,
    }

    impl FrameScheduler for Recorder {
        fn register(&mut self, _source: TickSource) -> TickHandle {
            self.handles += 1;
            TickHandle(self.handles)
        }

        fn unregister(&mut self, _handle: TickHandle) {}
    }

    impl SessionHost for Recorder {
        fn display(&mut self, _pixels: &[f32], _width: u32, _height: u32) {}

        fn encode(
            &mut self,
            pixels: &[f32],
            _width: u32,
            _height: u32,
            path: &str,
            _format: OutputFormat,
        ) -> Result<(), StratusError> {
            self.encoded.push((path.to_string(), pixels.len()));
            Ok(())
        }

        fn set_frame(&mut self, _frame: u32) {}

        fn render_still(&mut self, _frame: u32) -> Result<(), StratusError> {
            Ok(())
        }

        fn refresh_viewport(&mut self) {}

        fn report(&mut self, _message: &str) {}
    }

    #[test]
    fn test_bake_through_controller() {
        let context = small_context();
        let backend = GpuSessionBackend::new(context.clone());
        let mut bake = RenderSessionController::new(
            SessionMode::Bake,
            backend,
            SessionRegistry::new(),
        );
        let mut scheduler = Recorder::default();
        let mut host = Recorder::default();
        let settings = RenderSettings {
            render_size: 0.25,
            tile_size: 128,
            ..Default::default()
        };
        bake.start(
            Default::default(),
            &settings,
            &mut scheduler,
            &mut host,
        )
        .expect("start");

        let mut ticks = 0;
        while bake.is_running() {
            let outcome = bake.tick(&mut scheduler, &mut host);
            assert!(outcome.error.is_none(), "{:?}", outcome.error);
            ticks += 1;
        }
        // 256x128 image in 128px tiles
        assert_eq!(ticks, 2);
        assert_eq!(host.encoded, vec![("stratus_sky.exr".to_string(), 256 * 128 * 4)]);
        assert!(!bake.backend().is_acquired());
        assert!(context.borrow().is_initialized());
    }

    #[test]
    fn test_viewport_composites_into_host_target() {
        let context = small_context();
        let target = context
            .borrow()
            .gpu
            .device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("host-target"),
                size: wgpu::Extent3d {
                    width: 64,
                    height: 32,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });

        let mut backend = GpuSessionBackend::new(context);
        backend
            .acquire(&ResourceRequest {
                size_multiplier: 0.25,
                tile_size: 512,
                tiling: true,
                variant: BudgetVariant::Viewport,
                viewport_pixel_size: Some(4),
            })
            .expect("acquire");
        assert!(!backend.has_view());

        backend.set_view_frame(ViewportFrame {
            camera: ViewCamera {
                view: Mat4::look_at_rh(Vec3::ZERO, Vec3::Y, Vec3::Z),
                projection: Mat4::perspective_rh(1.0, 2.0, 0.1, 100.0),
                position: Vec3::ZERO,
                clip_end: 100.0,
            },
            target: target.create_view(&Default::default()),
            width: 64,
            height: 32,
            display: DisplaySettings {
                strength: 0.1,
                gamma: 1.0,
            },
        });
        assert!(backend.has_view());

        let snapshot = SceneParameterSnapshot::default();
        backend
            .compute_irradiance(&snapshot, BudgetVariant::Viewport)
            .expect("irradiance");
        assert!(backend.composite(&snapshot).expect("composite"));
        // The frame is consumed by the composite
        assert!(!backend.has_view());
        assert!(!backend.composite(&snapshot).expect("composite"));
        backend.release();
    }
}
