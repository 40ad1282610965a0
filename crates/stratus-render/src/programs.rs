use stratus_core::constants::{
    ATMOSPHERE_RADIUS, BLUE_NOISE_SIZE, IRRADIANCE_HEIGHT, IRRADIANCE_WIDTH, MIE_BETA,
    MIE_SCALE_HEIGHT, MOON_LUX, OZONE_BETA, OZONE_SCALE_HEIGHT, PLANET_RADIUS, RAYLEIGH_BETA,
    RAYLEIGH_SCALE_HEIGHT, SUN_LUX,
};
use stratus_core::error::StratusError;
use wgpu::util::DeviceExt;

use crate::gpu::checked;
use crate::slots::{self, ASSET_GROUP, IRRADIANCE_GROUP};

/// Format of the full-resolution environment image.
pub const ENV_IMAGE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// Format of the irradiance maps and the viewport preview buffer.
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Unit cube drawn around the camera by the composite pass.
const CUBE_VERTICES: [[f32; 3]; 8] = [
    [-1.0, -1.0, -1.0],
    [1.0, -1.0, -1.0],
    [1.0, 1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, 1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, 1.0],
    [-1.0, 1.0, 1.0],
];

const CUBE_INDICES: [u16; 36] = [
    0, 1, 2, 2, 3, 0, // bottom
    4, 6, 5, 6, 4, 7, // top
    0, 4, 5, 5, 1, 0, // front
    1, 5, 6, 6, 2, 1, // right
    2, 6, 7, 7, 3, 2, // back
    3, 7, 4, 4, 0, 3, // left
];

/// Number of indices in the cube batch.
pub const CUBE_INDEX_COUNT: u32 = CUBE_INDICES.len() as u32;

fn wgsl_vec3(v: [f32; 3]) -> String {
    format!("vec3<f32>({:?}, {:?}, {:?})", v[0], v[1], v[2])
}

/// Constants shared by every shader, generated from the Rust values.
pub fn constants_preamble() -> String {
    format!(
        "const PLANET_RADIUS: f32 = {:?};\n\
         const ATMOSPHERE_RADIUS: f32 = {:?};\n\
         const RAYLEIGH_SCALE_HEIGHT: f32 = {:?};\n\
         const MIE_SCALE_HEIGHT: f32 = {:?};\n\
         const OZONE_SCALE_HEIGHT: f32 = {:?};\n\
         const RAYLEIGH_BETA: vec3<f32> = {};\n\
         const OZONE_BETA: vec3<f32> = {};\n\
         const MIE_BETA: f32 = {:?};\n\
         const SUN_LUX: f32 = {:?};\n\
         const MOON_LUX: f32 = {:?};\n\
         const BLUE_NOISE_SIZE: f32 = {:?};\n\
         const IRRADIANCE_WIDTH: u32 = {}u;\n\
         const IRRADIANCE_HEIGHT: u32 = {}u;\n",
        PLANET_RADIUS,
        ATMOSPHERE_RADIUS,
        RAYLEIGH_SCALE_HEIGHT,
        MIE_SCALE_HEIGHT,
        OZONE_SCALE_HEIGHT,
        wgsl_vec3(RAYLEIGH_BETA),
        wgsl_vec3(OZONE_BETA),
        MIE_BETA,
        SUN_LUX,
        MOON_LUX,
        BLUE_NOISE_SIZE as f32,
        IRRADIANCE_WIDTH,
        IRRADIANCE_HEIGHT,
    )
}

/// Full WGSL sources for every program, before compilation.
pub struct ShaderSources {
    pub sky: String,
    pub irradiance: String,
    pub env_image: String,
    pub viewport: String,
    pub screen: String,
}

impl ShaderSources {
    pub fn compose() -> Self {
        let preamble = constants_preamble();
        let declarations = slots::wgsl_declarations();

        let math_wgsl = include_str!("../../../shaders/common/math.wgsl");
        let types_wgsl = include_str!("../../../shaders/common/types.wgsl");
        let atmosphere_wgsl = include_str!("../../../shaders/common/atmosphere.wgsl");
        let clouds_wgsl = include_str!("../../../shaders/common/clouds.wgsl");
        let celestial_wgsl = include_str!("../../../shaders/common/celestial.wgsl");
        let render_wgsl = include_str!("../../../shaders/common/render.wgsl");
        let sky_wgsl = include_str!("../../../shaders/render/sky.wgsl");
        let irradiance_wgsl = include_str!("../../../shaders/render/irradiance.wgsl");
        let env_image_wgsl = include_str!("../../../shaders/render/env_image.wgsl");
        let viewport_wgsl = include_str!("../../../shaders/render/viewport.wgsl");
        let screen_wgsl = include_str!("../../../shaders/render/screen.wgsl");

        // Raymarch body shared by the equirect and perspective programs
        let raymarch = format!(
            "{preamble}\n{declarations}\n{math_wgsl}\n{types_wgsl}\n{atmosphere_wgsl}\n\
             {clouds_wgsl}\n{celestial_wgsl}\n{render_wgsl}"
        );

        Self {
            sky: format!("{preamble}\n{math_wgsl}\n{types_wgsl}\n{atmosphere_wgsl}\n{sky_wgsl}"),
            irradiance: format!("{preamble}\n{math_wgsl}\n{irradiance_wgsl}"),
            env_image: format!("{raymarch}\n{env_image_wgsl}"),
            viewport: format!("{raymarch}\n{viewport_wgsl}"),
            screen: screen_wgsl.to_string(),
        }
    }
}

/// Compiled programs, their bind group layouts and the shared geometry batches.
pub struct ShaderProgramSet {
    pub sky_pipeline: wgpu::RenderPipeline,
    pub irradiance_pipeline: wgpu::RenderPipeline,
    pub env_image_pipeline: wgpu::RenderPipeline,
    pub viewport_pipeline: wgpu::RenderPipeline,
    pub screen_pipeline: wgpu::RenderPipeline,
    /// Group 0 of sky, env-image and viewport programs: the scene uniforms.
    pub scene_layout: wgpu::BindGroupLayout,
    /// Group 1: noise volumes, moon textures and their samplers.
    pub asset_layout: wgpu::BindGroupLayout,
    /// Group 2: irradiance map and sampler.
    pub irradiance_layout: wgpu::BindGroupLayout,
    /// Group 0 of the irradiance convolution: the raw sky map.
    pub sky_map_layout: wgpu::BindGroupLayout,
    /// Group 0 of the composite: screen uniforms and the preview buffer.
    pub screen_layout: wgpu::BindGroupLayout,
    pub cube_vertex_buffer: wgpu::Buffer,
    pub cube_index_buffer: wgpu::Buffer,
}

impl ShaderProgramSet {
    /// Compile every program. `surface_format` is the format of the host's
    /// viewport target, used only by the composite pass.
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
    ) -> Result<Self, StratusError> {
        let sources = ShaderSources::compose();

        // -- Shader modules --
        let module = |label: &str, source: &str| {
            checked(device, label, || {
                device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(label),
                    source: wgpu::ShaderSource::Wgsl(source.into()),
                })
            })
        };
        let sky_module = module("sky-shader", &sources.sky)?;
        let irradiance_module = module("irradiance-shader", &sources.irradiance)?;
        let env_image_module = module("env-image-shader", &sources.env_image)?;
        let viewport_module = module("viewport-shader", &sources.viewport)?;
        let screen_module = module("screen-shader", &sources.screen)?;

        // -- Bind group layouts --
        let scene_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scene-bgl"),
            entries: &[uniform_entry(0)],
        });
        let asset_layout = slots::group_layout(device, ASSET_GROUP, "asset-bgl");
        let irradiance_layout = slots::group_layout(device, IRRADIANCE_GROUP, "irradiance-bgl");
        let sky_map_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sky-map-bgl"),
            entries: &[texture_entry(0), sampler_entry(1)],
        });
        let screen_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("screen-bgl"),
            entries: &[uniform_entry(0), texture_entry(1), sampler_entry(2)],
        });

        // -- Pipelines --
        let sky_pipeline = fullscreen_pipeline(
            device,
            "sky-pipeline",
            &sky_module,
            &[&scene_layout],
            HDR_FORMAT,
        )?;
        let irradiance_pipeline = fullscreen_pipeline(
            device,
            "irradiance-pipeline",
            &irradiance_module,
            &[&sky_map_layout],
            HDR_FORMAT,
        )?;
        let raymarch_layouts = [&scene_layout, &asset_layout, &irradiance_layout];
        let env_image_pipeline = fullscreen_pipeline(
            device,
            "env-image-pipeline",
            &env_image_module,
            &raymarch_layouts,
            ENV_IMAGE_FORMAT,
        )?;
        let viewport_pipeline = fullscreen_pipeline(
            device,
            "viewport-pipeline",
            &viewport_module,
            &raymarch_layouts,
            HDR_FORMAT,
        )?;

        let screen_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("screen-pipeline-layout"),
            bind_group_layouts: &[&screen_layout],
            push_constant_ranges: &[],
        });
        let screen_pipeline = checked(device, "screen-pipeline", || {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("screen-pipeline"),
                layout: Some(&screen_pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &screen_module,
                    entry_point: Some("vs_main"),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<[f32; 3]>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x3,
                            offset: 0,
                            shader_location: 0,
                        }],
                    }],
                    compilation_options: Default::default(),
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &screen_module,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: surface_format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                multiview: None,
                cache: None,
            })
        })?;

        // -- Geometry batches --
        let cube_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("cube-vertices"),
            contents: bytemuck::cast_slice(&CUBE_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let cube_index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("cube-indices"),
            contents: bytemuck::cast_slice(&CUBE_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        log::info!("Shader programs compiled (sky, irradiance, env-image, viewport, screen)");

        Ok(Self {
            sky_pipeline,
            irradiance_pipeline,
            env_image_pipeline,
            viewport_pipeline,
            screen_pipeline,
            scene_layout,
            asset_layout,
            irradiance_layout,
            sky_map_layout,
            screen_layout,
            cube_vertex_buffer,
            cube_index_buffer,
        })
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

/// Vertex-less fullscreen-triangle pipeline writing one color target.
fn fullscreen_pipeline(
    device: &wgpu::Device,
    label: &str,
    module: &wgpu::ShaderModule,
    layouts: &[&wgpu::BindGroupLayout],
    format: wgpu::TextureFormat,
) -> Result<wgpu::RenderPipeline, StratusError> {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: layouts,
        push_constant_ranges: &[],
    });
    checked(device, label, || {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some("fs_main"),
                // Float32 targets are not blendable
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview: None,
            cache: None,
        })
    })
}
