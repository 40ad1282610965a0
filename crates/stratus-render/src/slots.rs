//! Fixed texture slot table.
//!
//! Every named sampler input has one (group, binding) pair, used by every
//! pipeline that reads it. The WGSL declarations are generated from this
//! table so Rust and the shaders cannot disagree.

/// Bind group holding the static noise and moon textures.
pub const ASSET_GROUP: u32 = 1;

/// Bind group holding the per-session irradiance map.
pub const IRRADIANCE_GROUP: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureSlot {
    DetailNoise,
    ShapeNoise,
    Coverage,
    BlueNoise,
    MoonAlbedo,
    MoonNormal,
    Irradiance,
}

#[derive(Debug, Clone, Copy)]
pub struct SlotBinding {
    pub slot: TextureSlot,
    pub name: &'static str,
    pub group: u32,
    pub binding: u32,
    pub dimension: wgpu::TextureViewDimension,
}

pub const SLOT_TABLE: [SlotBinding; 7] = [
    SlotBinding {
        slot: TextureSlot::DetailNoise,
        name: "detail_noise",
        group: ASSET_GROUP,
        binding: 0,
        dimension: wgpu::TextureViewDimension::D3,
    },
    SlotBinding {
        slot: TextureSlot::ShapeNoise,
        name: "shape_noise",
        group: ASSET_GROUP,
        binding: 1,
        dimension: wgpu::TextureViewDimension::D3,
    },
    SlotBinding {
        slot: TextureSlot::Coverage,
        name: "coverage_noise",
        group: ASSET_GROUP,
        binding: 2,
        dimension: wgpu::TextureViewDimension::D2,
    },
    SlotBinding {
        slot: TextureSlot::BlueNoise,
        name: "blue_noise",
        group: ASSET_GROUP,
        binding: 3,
        dimension: wgpu::TextureViewDimension::D2,
    },
    SlotBinding {
        slot: TextureSlot::MoonAlbedo,
        name: "moon_albedo",
        group: ASSET_GROUP,
        binding: 4,
        dimension: wgpu::TextureViewDimension::D2,
    },
    SlotBinding {
        slot: TextureSlot::MoonNormal,
        name: "moon_normal",
        group: ASSET_GROUP,
        binding: 5,
        dimension: wgpu::TextureViewDimension::D2,
    },
    SlotBinding {
        slot: TextureSlot::Irradiance,
        name: "irradiance_map",
        group: IRRADIANCE_GROUP,
        binding: 0,
        dimension: wgpu::TextureViewDimension::D2,
    },
];

/// Samplers that live beside the textures, as (name, group, binding).
pub const SAMPLERS: [(&str, u32, u32); 3] = [
    ("repeat_sampler", ASSET_GROUP, 6),
    ("clamp_sampler", ASSET_GROUP, 7),
    ("irradiance_sampler", IRRADIANCE_GROUP, 1),
];

impl TextureSlot {
    pub fn binding(self) -> &'static SlotBinding {
        // The table holds exactly one entry per variant.
        &SLOT_TABLE[self as usize]
    }
}

/// WGSL `var` declarations for every slot and sampler.
pub fn wgsl_declarations() -> String {
    let mut out = String::new();
    for entry in &SLOT_TABLE {
        let ty = match entry.dimension {
            wgpu::TextureViewDimension::D3 => "texture_3d<f32>",
            _ => "texture_2d<f32>",
        };
        out.push_str(&format!(
            "@group({}) @binding({}) var {}: {};\n",
            entry.group, entry.binding, entry.name, ty
        ));
    }
    for (name, group, binding) in SAMPLERS {
        out.push_str(&format!(
            "@group({group}) @binding({binding}) var {name}: sampler;\n"
        ));
    }
    out
}

fn texture_entry(binding: u32, dimension: wgpu::TextureViewDimension) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: dimension,
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

/// Layout for one bind group of the slot table.
pub fn group_layout(device: &wgpu::Device, group: u32, label: &str) -> wgpu::BindGroupLayout {
    let mut entries: Vec<wgpu::BindGroupLayoutEntry> = SLOT_TABLE
        .iter()
        .filter(|e| e.group == group)
        .map(|e| texture_entry(e.binding, e.dimension))
        .collect();
    entries.extend(
        SAMPLERS
            .iter()
            .filter(|(_, g, _)| *g == group)
            .map(|(_, _, b)| sampler_entry(*b)),
    );
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &entries,
    })
}
