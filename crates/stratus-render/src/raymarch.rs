use stratus_core::error::StratusError;
use stratus_core::params::{BudgetVariant, SceneParameterSnapshot};

use crate::context::SharedResources;
use crate::env_image::EnvImage;
use crate::gpu::{checked, GpuContext};
use crate::irradiance::IrradianceStage;
use crate::uniforms::{RayTarget, SceneUniforms};

/// Draws one tile of the equirectangular image per call.
pub struct TileRaymarchStage {
    scene_buffer: wgpu::Buffer,
    scene_bind_group: wgpu::BindGroup,
}

impl TileRaymarchStage {
    pub fn new(gpu: &GpuContext, shared: &SharedResources) -> Result<Self, StratusError> {
        let device = &gpu.device;
        let scene_buffer = checked(device, "raymarch-scene-uniforms", || {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("raymarch-scene-uniforms"),
                size: std::mem::size_of::<SceneUniforms>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        })?;
        let scene_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("raymarch-scene-bg"),
            layout: &shared.programs.scene_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: scene_buffer.as_entire_binding(),
            }],
        });
        Ok(Self {
            scene_buffer,
            scene_bind_group,
        })
    }

    /// Record the raymarch of the current tile, then advance the tile cursor.
    ///
    /// Viewport and scissor cover only the tile; earlier tiles are preserved
    /// by loading the existing surface contents. Does nothing once the image
    /// is complete.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_tile(
        &self,
        gpu: &GpuContext,
        shared: &SharedResources,
        encoder: &mut wgpu::CommandEncoder,
        image: &mut EnvImage,
        irradiance: &IrradianceStage,
        snapshot: &SceneParameterSnapshot,
        variant: BudgetVariant,
    ) {
        if image.completed() {
            return;
        }
        let (width, height) = image.size();
        let rect = image.current_tile_rect();

        let uniforms =
            SceneUniforms::from_snapshot(snapshot, variant, RayTarget::Equirect { width, height });
        gpu.queue
            .write_buffer(&self.scene_buffer, 0, bytemuck::bytes_of(&uniforms));

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("raymarch-tile-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: image.view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_viewport(
                rect.x as f32,
                rect.y as f32,
                rect.width as f32,
                rect.height as f32,
                0.0,
                1.0,
            );
            pass.set_scissor_rect(rect.x, rect.y, rect.width, rect.height);
            pass.set_pipeline(&shared.programs.env_image_pipeline);
            pass.set_bind_group(0, &self.scene_bind_group, &[]);
            pass.set_bind_group(1, shared.noise.bind_group(), &[]);
            pass.set_bind_group(2, irradiance.bind_group(), &[]);
            pass.draw(0..3, 0..1);
        }

        log::debug!(
            "Tile {}/{} drawn at ({}, {}) {}x{}",
            image.grid().tile_index() + 1,
            image.grid().tile_count(),
            rect.x,
            rect.y,
            rect.width,
            rect.height
        );
        image.advance_tile();
    }
}
