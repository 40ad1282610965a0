//! End-to-end rendering checks on a real device.
//!
//! GPU tests are gated behind `#[cfg(feature = "gpu_tests")]` since they
//! require an adapter. They use shrunken noise assets so setup stays fast.

#[cfg(all(test, feature = "gpu_tests"))]
mod tests {
    use stratus_core::params::{BudgetVariant, SceneParameterSnapshot};

    use crate::context::SkyContext;
    use crate::env_image::EnvImage;
    use crate::gpu::GpuContext;
    use crate::irradiance::IrradianceStage;
    use crate::noise::NoiseConfig;
    use crate::raymarch::TileRaymarchStage;

    fn small_context() -> SkyContext {
        let gpu = GpuContext::headless().expect("headless gpu");
        let config = NoiseConfig {
            shape_size: 16,
            detail_size: 8,
            coverage_size: 32,
            blue_noise_size: 64,
            moon_width: 32,
            seed: 7,
        };
        SkyContext::with_noise_config(gpu, wgpu::TextureFormat::Rgba8Unorm, config)
    }

    /// Draw every tile of `image`, one submit per tile, then read it back.
    fn render(
        ctx: &mut SkyContext,
        image: &mut EnvImage,
        snapshot: &SceneParameterSnapshot,
    ) -> Vec<f32> {
        let (gpu, shared) = ctx.parts().expect("shared resources");
        let irradiance = IrradianceStage::new(gpu, shared).expect("irradiance");
        let stage = TileRaymarchStage::new(gpu, shared).expect("raymarch");

        image.reset();
        let mut draws = 0;
        while !image.completed() {
            let mut encoder = gpu.device.create_command_encoder(&Default::default());
            irradiance.compute(gpu, shared, &mut encoder, snapshot, BudgetVariant::Render);
            stage.draw_tile(
                gpu,
                shared,
                &mut encoder,
                image,
                &irradiance,
                snapshot,
                BudgetVariant::Render,
            );
            gpu.queue.submit(std::iter::once(encoder.finish()));
            draws += 1;
        }
        assert_eq!(draws, image.grid().tile_count());
        image.commit(gpu).expect("commit")
    }

    #[test]
    fn test_render_is_byte_identical() {
        let mut ctx = small_context();
        let mut snapshot = SceneParameterSnapshot::default();
        snapshot.steps.render.max_steps = 32;
        snapshot.steps.render.max_light_steps = 4;

        let mut image = EnvImage::new(&ctx.gpu, 0.25).expect("env image");
        image.set_tile_size(128).expect("tile size");

        let first = render(&mut ctx, &mut image, &snapshot);
        let second = render(&mut ctx, &mut image, &snapshot);
        assert_eq!(first.len(), 256 * 128 * 4);
        assert!(first.iter().all(|v| v.is_finite()));
        assert_eq!(
            bytemuck::cast_slice::<f32, u8>(&first),
            bytemuck::cast_slice::<f32, u8>(&second)
        );
    }

    #[test]
    fn test_tiled_matches_untiled() {
        let mut ctx = small_context();
        let mut snapshot = SceneParameterSnapshot::default();
        snapshot.steps.render.max_steps = 16;
        snapshot.steps.render.max_light_steps = 2;

        let mut image = EnvImage::new(&ctx.gpu, 0.25).expect("env image");
        image.set_tile_size(128).expect("tile size");
        let tiled = render(&mut ctx, &mut image, &snapshot);

        image.disable_tiling();
        let untiled = render(&mut ctx, &mut image, &snapshot);
        assert_eq!(tiled, untiled);
    }

    #[test]
    fn test_context_init_is_idempotent() {
        let mut ctx = small_context();
        ctx.ensure_initialized().expect("first init");
        ctx.ensure_initialized().expect("second init");
        assert!(ctx.is_initialized());
        ctx.teardown();
        assert!(!ctx.is_initialized());
    }
}
