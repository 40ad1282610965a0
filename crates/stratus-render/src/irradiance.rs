use stratus_core::constants::{IRRADIANCE_HEIGHT, IRRADIANCE_WIDTH};
use stratus_core::error::StratusError;
use stratus_core::params::{BudgetVariant, SceneParameterSnapshot};

use crate::context::SharedResources;
use crate::gpu::{checked, GpuContext};
use crate::programs::HDR_FORMAT;
use crate::slots::{SlotBinding, TextureSlot, SAMPLERS, IRRADIANCE_GROUP};
use crate::uniforms::{RayTarget, SceneUniforms};

/// Two-pass ambient sky lighting.
///
/// Pass 1 renders raw sky radiance into a 128x64 equirect map. Pass 2
/// convolves it into cosine-weighted irradiance, which the raymarch samples
/// through group 2. Both maps are overwritten on every compute.
pub struct IrradianceStage {
    _sky_texture: wgpu::Texture,
    sky_view: wgpu::TextureView,
    _irradiance_texture: wgpu::Texture,
    irradiance_view: wgpu::TextureView,
    scene_buffer: wgpu::Buffer,
    scene_bind_group: wgpu::BindGroup,
    sky_map_bind_group: wgpu::BindGroup,
    irradiance_bind_group: wgpu::BindGroup,
}

impl IrradianceStage {
    pub fn new(gpu: &GpuContext, shared: &SharedResources) -> Result<Self, StratusError> {
        let device = &gpu.device;
        let programs = &shared.programs;

        // -- Map textures --
        let (sky_texture, sky_view) = map_texture(device, "irradiance-sky-map")?;
        let (irradiance_texture, irradiance_view) = map_texture(device, "irradiance-map")?;

        // Wraps horizontally, clamps at the poles
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("irradiance-sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        // -- Uniforms for pass 1 --
        let scene_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("irradiance-scene-uniforms"),
            size: std::mem::size_of::<SceneUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // -- Bind groups --
        let scene_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("irradiance-scene-bg"),
            layout: &programs.scene_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: scene_buffer.as_entire_binding(),
            }],
        });

        let sky_map_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("irradiance-sky-map-bg"),
            layout: &programs.sky_map_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&sky_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let map_slot: &SlotBinding = TextureSlot::Irradiance.binding();
        let sampler_binding = SAMPLERS
            .iter()
            .find(|(_, group, _)| *group == IRRADIANCE_GROUP)
            .map(|(_, _, binding)| *binding)
            .unwrap_or(1);
        let irradiance_bind_group = checked(device, "irradiance-bg", || {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("irradiance-bg"),
                layout: &programs.irradiance_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: map_slot.binding,
                        resource: wgpu::BindingResource::TextureView(&irradiance_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: sampler_binding,
                        resource: wgpu::BindingResource::Sampler(&sampler),
                    },
                ],
            })
        })?;

        Ok(Self {
            _sky_texture: sky_texture,
            sky_view,
            _irradiance_texture: irradiance_texture,
            irradiance_view,
            scene_buffer,
            scene_bind_group,
            sky_map_bind_group,
            irradiance_bind_group,
        })
    }

    /// Record both passes for `snapshot` into `encoder`.
    pub fn compute(
        &self,
        gpu: &GpuContext,
        shared: &SharedResources,
        encoder: &mut wgpu::CommandEncoder,
        snapshot: &SceneParameterSnapshot,
        variant: BudgetVariant,
    ) {
        let uniforms = SceneUniforms::from_snapshot(
            snapshot,
            variant,
            RayTarget::Equirect {
                width: IRRADIANCE_WIDTH,
                height: IRRADIANCE_HEIGHT,
            },
        );
        gpu.queue
            .write_buffer(&self.scene_buffer, 0, bytemuck::bytes_of(&uniforms));

        // Pass 1: raw sky radiance
        {
            let mut pass = begin_pass(encoder, "irradiance-sky-pass", &self.sky_view);
            pass.set_pipeline(&shared.programs.sky_pipeline);
            pass.set_bind_group(0, &self.scene_bind_group, &[]);
            pass.draw(0..3, 0..1);
        }

        // Pass 2: cosine-weighted convolution
        {
            let mut pass = begin_pass(encoder, "irradiance-convolve-pass", &self.irradiance_view);
            pass.set_pipeline(&shared.programs.irradiance_pipeline);
            pass.set_bind_group(0, &self.sky_map_bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
    }

    /// Group 2 bind group holding the convolved map.
    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.irradiance_bind_group
    }
}

fn map_texture(
    device: &wgpu::Device,
    label: &str,
) -> Result<(wgpu::Texture, wgpu::TextureView), StratusError> {
    let texture = checked(device, label, || {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: IRRADIANCE_WIDTH,
                height: IRRADIANCE_HEIGHT,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: HDR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        })
    })?;
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Ok((texture, view))
}

fn begin_pass<'a>(
    encoder: &'a mut wgpu::CommandEncoder,
    label: &str,
    view: &'a wgpu::TextureView,
) -> wgpu::RenderPass<'a> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    })
}
