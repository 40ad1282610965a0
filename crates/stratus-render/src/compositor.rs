//! Live preview path: a low-resolution perspective raymarch of the whole view,
//! drawn every redraw and composited behind the scene as a camera-centered
//! cube. Independent of the tiled environment image.

use glam::{Mat4, Vec3};
use stratus_core::constants::VIEWPORT_PIXEL_SIZES;
use stratus_core::error::StratusError;
use stratus_core::params::{BudgetVariant, SceneParameterSnapshot};

use crate::context::SharedResources;
use crate::gpu::{checked, GpuContext};
use crate::irradiance::IrradianceStage;
use crate::programs::{CUBE_INDEX_COUNT, HDR_FORMAT};
use crate::uniforms::{RayTarget, SceneUniforms, ScreenUniforms};

/// Fraction of the far clip distance used for the background cube half-size.
const CUBE_CLIP_FRACTION: f32 = 0.45;

/// Host camera for one viewport redraw.
#[derive(Debug, Clone, Copy)]
pub struct ViewCamera {
    pub view: Mat4,
    pub projection: Mat4,
    pub position: Vec3,
    pub clip_end: f32,
}

/// Display transform for the composite.
#[derive(Debug, Clone, Copy)]
pub struct DisplaySettings {
    pub strength: f32,
    pub gamma: f32,
}

/// Preview buffer size for a view and pixel-size divisor.
pub fn preview_size(view_width: u32, view_height: u32, pixel_size: u32) -> (u32, u32) {
    let d = pixel_size.max(1);
    ((view_width / d).max(1), (view_height / d).max(1))
}

/// Model matrix of the background cube for `camera`.
pub fn cube_model(camera: &ViewCamera) -> Mat4 {
    Mat4::from_translation(camera.position)
        * Mat4::from_scale(Vec3::splat(camera.clip_end * CUBE_CLIP_FRACTION))
}

pub struct ViewportCompositor {
    view_size: (u32, u32),
    pixel_size: u32,
    preview_size: (u32, u32),
    preview_texture: wgpu::Texture,
    preview_view: wgpu::TextureView,
    preview_sampler: wgpu::Sampler,
    scene_buffer: wgpu::Buffer,
    scene_bind_group: wgpu::BindGroup,
    screen_buffer: wgpu::Buffer,
    screen_bind_group: wgpu::BindGroup,
}

impl ViewportCompositor {
    pub fn new(
        gpu: &GpuContext,
        shared: &SharedResources,
        view_width: u32,
        view_height: u32,
        pixel_size: u32,
    ) -> Result<Self, StratusError> {
        validate_pixel_size(pixel_size)?;
        let device = &gpu.device;
        let preview_size = preview_size(view_width, view_height, pixel_size);
        let (preview_texture, preview_view) = create_preview(device, preview_size)?;

        // Nearest keeps the chunky preview pixels visible instead of smearing them
        let preview_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("preview-sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let scene_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("viewport-scene-uniforms"),
            size: std::mem::size_of::<SceneUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let scene_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("viewport-scene-bg"),
            layout: &shared.programs.scene_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: scene_buffer.as_entire_binding(),
            }],
        });

        let screen_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("screen-uniforms"),
            size: std::mem::size_of::<ScreenUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let screen_bind_group = Self::create_screen_bind_group(
            device,
            shared,
            &screen_buffer,
            &preview_view,
            &preview_sampler,
        );

        Ok(Self {
            view_size: (view_width, view_height),
            pixel_size,
            preview_size,
            preview_texture,
            preview_view,
            preview_sampler,
            scene_buffer,
            scene_bind_group,
            screen_buffer,
            screen_bind_group,
        })
    }

    /// Recreate the preview buffer when the view or divisor changes.
    pub fn resize(
        &mut self,
        gpu: &GpuContext,
        shared: &SharedResources,
        view_width: u32,
        view_height: u32,
        pixel_size: u32,
    ) -> Result<(), StratusError> {
        validate_pixel_size(pixel_size)?;
        if (view_width, view_height) == self.view_size && pixel_size == self.pixel_size {
            return Ok(());
        }
        let size = preview_size(view_width, view_height, pixel_size);
        let (texture, view) = create_preview(&gpu.device, size)?;
        self.preview_texture.destroy();
        self.preview_texture = texture;
        self.preview_view = view;
        self.screen_bind_group = Self::create_screen_bind_group(
            &gpu.device,
            shared,
            &self.screen_buffer,
            &self.preview_view,
            &self.preview_sampler,
        );
        self.view_size = (view_width, view_height);
        self.pixel_size = pixel_size;
        self.preview_size = size;
        Ok(())
    }

    pub fn preview_size(&self) -> (u32, u32) {
        self.preview_size
    }

    /// Raymarch the preview and composite it into `target`.
    #[allow(clippy::too_many_arguments)]
    pub fn draw(
        &self,
        gpu: &GpuContext,
        shared: &SharedResources,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        irradiance: &IrradianceStage,
        snapshot: &SceneParameterSnapshot,
        camera: &ViewCamera,
        display: DisplaySettings,
    ) {
        let (pw, ph) = self.preview_size;
        let view_proj = camera.projection * camera.view;
        let uniforms = SceneUniforms::from_snapshot(
            snapshot,
            BudgetVariant::Viewport,
            RayTarget::Perspective {
                width: pw,
                height: ph,
                inv_view_proj: view_proj.inverse(),
            },
        );
        gpu.queue
            .write_buffer(&self.scene_buffer, 0, bytemuck::bytes_of(&uniforms));

        let (vw, vh) = self.view_size;
        let screen = ScreenUniforms {
            projection: (view_proj * cube_model(camera)).to_cols_array_2d(),
            sizes: [vw as f32, vh as f32, pw as f32, ph as f32],
            params: [display.strength, display.gamma, 0.0, 0.0],
        };
        gpu.queue
            .write_buffer(&self.screen_buffer, 0, bytemuck::bytes_of(&screen));

        // -- Preview raymarch --
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("viewport-preview-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.preview_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&shared.programs.viewport_pipeline);
            pass.set_bind_group(0, &self.scene_bind_group, &[]);
            pass.set_bind_group(1, shared.noise.bind_group(), &[]);
            pass.set_bind_group(2, irradiance.bind_group(), &[]);
            pass.draw(0..3, 0..1);
        }

        // -- Composite --
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("viewport-composite-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
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
            pass.set_pipeline(&shared.programs.screen_pipeline);
            pass.set_bind_group(0, &self.screen_bind_group, &[]);
            pass.set_vertex_buffer(0, shared.programs.cube_vertex_buffer.slice(..));
            pass.set_index_buffer(
                shared.programs.cube_index_buffer.slice(..),
                wgpu::IndexFormat::Uint16,
            );
            pass.draw_indexed(0..CUBE_INDEX_COUNT, 0, 0..1);
        }
    }

    fn create_screen_bind_group(
        device: &wgpu::Device,
        shared: &SharedResources,
        screen_buffer: &wgpu::Buffer,
        preview_view: &wgpu::TextureView,
        preview_sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("screen-bg"),
            layout: &shared.programs.screen_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: screen_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(preview_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(preview_sampler),
                },
            ],
        })
    }
}

fn validate_pixel_size(pixel_size: u32) -> Result<(), StratusError> {
    if VIEWPORT_PIXEL_SIZES.contains(&pixel_size) {
        Ok(())
    } else {
        Err(StratusError::InvalidPixelSize(pixel_size))
    }
}

fn create_preview(
    device: &wgpu::Device,
    (width, height): (u32, u32),
) -> Result<(wgpu::Texture, wgpu::TextureView), StratusError> {
    let texture = checked(device, "viewport-preview", || {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some("viewport-preview"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: HDR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        })
    })?;
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Ok((texture, view))
}
