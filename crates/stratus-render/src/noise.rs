//! Procedural noise volumes and moon textures.
//!
//! Everything is generated on the CPU from a fixed seed, so the same config
//! always produces byte-identical assets. The GPU copies live in
//! [`NoiseLibrary`], which owns the asset bind group (group 1).

use glam::{IVec3, Vec2, Vec3};
use stratus_core::constants::{
    BLUE_NOISE_SIZE, COVERAGE_NOISE_SIZE, DETAIL_NOISE_SIZE, MOON_TEXTURE_WIDTH, NOISE_SEED,
    SHAPE_NOISE_SIZE,
};
use stratus_core::error::StratusError;

use crate::gpu::{checked, GpuContext};
use crate::slots::{self, TextureSlot, ASSET_GROUP};

/// Sizes and seed for the generated assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoiseConfig {
    pub shape_size: u32,
    pub detail_size: u32,
    pub coverage_size: u32,
    pub blue_noise_size: u32,
    /// Width of the equirectangular moon maps; height is half.
    pub moon_width: u32,
    pub seed: u32,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            shape_size: SHAPE_NOISE_SIZE,
            detail_size: DETAIL_NOISE_SIZE,
            coverage_size: COVERAGE_NOISE_SIZE,
            blue_noise_size: BLUE_NOISE_SIZE,
            moon_width: MOON_TEXTURE_WIDTH,
            seed: NOISE_SEED,
        }
    }
}

// -- Hashing --

/// PCG-style integer hash of a lattice point.
fn hash3(p: IVec3, seed: u32) -> u32 {
    let mut state = (p.x as u32)
        .wrapping_mul(0x9E3779B9)
        .wrapping_add((p.y as u32).wrapping_mul(0x517CC1B7))
        .wrapping_add((p.z as u32).wrapping_mul(0x6C62272E))
        .wrapping_add(seed.wrapping_mul(0x2545F491));
    state ^= state >> 16;
    state = state.wrapping_mul(0x45D9F3B);
    state ^= state >> 16;
    state = state.wrapping_mul(0x45D9F3B);
    state ^= state >> 16;
    state
}

fn hash_to_float(hash: u32) -> f32 {
    (hash >> 8) as f32 / 16_777_216.0
}

fn hash_vec3(p: IVec3, seed: u32) -> Vec3 {
    Vec3::new(
        hash_to_float(hash3(p, seed)),
        hash_to_float(hash3(p, seed ^ 0xA511E9B3)),
        hash_to_float(hash3(p, seed ^ 0x63D83595)),
    )
}

fn to_unorm8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

fn remap(v: f32, lo: f32, hi: f32, new_lo: f32, new_hi: f32) -> f32 {
    new_lo + (v - lo) / (hi - lo) * (new_hi - new_lo)
}

// -- Tileable primitives --

/// Cellular noise with `cells` feature points per axis, wrapping at `cells`.
/// `p` is in cell units. Returns the distance to the nearest feature, in [0, 1].
pub fn worley3(p: Vec3, cells: i32, seed: u32) -> f32 {
    let base = p.floor().as_ivec3();
    let mut best = f32::MAX;
    for dz in -1..=1 {
        for dy in -1..=1 {
            for dx in -1..=1 {
                let cell = base + IVec3::new(dx, dy, dz);
                let wrapped = IVec3::new(
                    cell.x.rem_euclid(cells),
                    cell.y.rem_euclid(cells),
                    cell.z.rem_euclid(cells),
                );
                let feature = cell.as_vec3() + hash_vec3(wrapped, seed);
                best = best.min(feature.distance_squared(p));
            }
        }
    }
    best.sqrt().min(1.0)
}

fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn gradient(p: IVec3, period: i32, seed: u32) -> Vec3 {
    let wrapped = IVec3::new(
        p.x.rem_euclid(period),
        p.y.rem_euclid(period),
        p.z.rem_euclid(period),
    );
    (hash_vec3(wrapped, seed) * 2.0 - Vec3::ONE).normalize_or(Vec3::X)
}

/// Gradient noise wrapping every `period` lattice units. Roughly in [-1, 1].
pub fn perlin3(p: Vec3, period: i32, seed: u32) -> f32 {
    let i = p.floor().as_ivec3();
    let f = p - p.floor();
    let u = Vec3::new(fade(f.x), fade(f.y), fade(f.z));

    let corner = |o: IVec3| gradient(i + o, period, seed).dot(f - o.as_vec3());
    let x00 = lerp(corner(IVec3::new(0, 0, 0)), corner(IVec3::new(1, 0, 0)), u.x);
    let x10 = lerp(corner(IVec3::new(0, 1, 0)), corner(IVec3::new(1, 1, 0)), u.x);
    let x01 = lerp(corner(IVec3::new(0, 0, 1)), corner(IVec3::new(1, 0, 1)), u.x);
    let x11 = lerp(corner(IVec3::new(0, 1, 1)), corner(IVec3::new(1, 1, 1)), u.x);
    lerp(lerp(x00, x10, u.y), lerp(x01, x11, u.y), u.z)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Inverted worley fBm over three octaves, each octave doubling the cell count.
fn worley_fbm(uvw: Vec3, cells: i32, seed: u32) -> f32 {
    let mut sum = 0.0;
    let mut amp = 0.625;
    for octave in 0..3 {
        let n = cells << octave;
        sum += amp * (1.0 - worley3(uvw * n as f32, n, seed.wrapping_add(octave as u32)));
        amp *= 0.5;
    }
    sum / 0.875
}

fn perlin_fbm(uvw: Vec3, period: i32, octaves: u32, seed: u32) -> f32 {
    let mut sum = 0.0;
    let mut amp = 1.0;
    let mut norm = 0.0;
    for octave in 0..octaves {
        let n = period << octave;
        sum += amp * perlin3(uvw * n as f32, n, seed.wrapping_add(31 * octave));
        norm += amp;
        amp *= 0.5;
    }
    sum / norm
}

// -- Generators --

/// Perlin-worley base shape volume, `size`³ texels of R8.
pub fn shape_volume(size: u32, seed: u32) -> Vec<u8> {
    volume(size, |uvw| {
        let perlin = perlin_fbm(uvw, 4, 4, seed) * 0.5 + 0.5;
        let worley = worley_fbm(uvw, 4, seed ^ 0x51A9E);
        remap(perlin, worley - 1.0, 1.0, 0.0, 1.0)
    })
}

/// High-frequency worley fBm used for erosion and curl warping.
pub fn detail_volume(size: u32, seed: u32) -> Vec<u8> {
    volume(size, |uvw| worley_fbm(uvw, 2, seed ^ 0xDE7A1))
}

fn volume(size: u32, f: impl Fn(Vec3) -> f32) -> Vec<u8> {
    let inv = 1.0 / size as f32;
    let mut out = Vec::with_capacity((size * size * size) as usize);
    for z in 0..size {
        for y in 0..size {
            for x in 0..size {
                let uvw = (Vec3::new(x as f32, y as f32, z as f32) + 0.5) * inv;
                out.push(to_unorm8(f(uvw)));
            }
        }
    }
    out
}

/// Tileable 2D coverage map: perlin fBm with worley billows.
pub fn coverage_map(size: u32, seed: u32) -> Vec<u8> {
    let inv = 1.0 / size as f32;
    let mut out = Vec::with_capacity((size * size) as usize);
    for y in 0..size {
        for x in 0..size {
            let uvw = Vec3::new((x as f32 + 0.5) * inv, (y as f32 + 0.5) * inv, 0.0);
            let perlin = perlin_fbm(uvw, 4, 5, seed ^ 0xC0FE) * 0.5 + 0.5;
            let cells = 1.0 - worley3(uvw * 8.0, 8, seed ^ 0xC0FF);
            out.push(to_unorm8(perlin * 0.75 + cells * 0.25));
        }
    }
    out
}

/// Low-discrepancy dither (R2 sequence over the pixel lattice).
pub fn blue_noise(size: u32) -> Vec<u8> {
    const A1: f32 = 0.754_877_7;
    const A2: f32 = 0.569_840_3;
    let mut out = Vec::with_capacity((size * size) as usize);
    for y in 0..size {
        for x in 0..size {
            let v = (0.5 + x as f32 * A1 + y as f32 * A2).fract();
            out.push(to_unorm8(v));
        }
    }
    out
}

/// Direction for an equirect texel, matching `equirect_dir` in math.wgsl.
fn equirect_dir(uv: Vec2) -> Vec3 {
    let phi = (uv.x - 0.5) * std::f32::consts::TAU;
    let theta = (0.5 - uv.y) * std::f32::consts::PI;
    Vec3::new(
        -phi.cos() * theta.cos(),
        phi.sin() * theta.cos(),
        theta.sin(),
    )
}

struct Crater {
    center: Vec3,
    /// Angular radius in radians.
    radius: f32,
    depth: f32,
}

fn craters(seed: u32) -> Vec<Crater> {
    (0..96)
        .map(|i| {
            let h = hash_vec3(IVec3::new(i, 7, 13), seed ^ 0x300);
            let center = (h * 2.0 - Vec3::ONE).normalize_or(Vec3::Z);
            let size = hash_to_float(hash3(IVec3::new(i, 1, 2), seed ^ 0x301));
            Crater {
                center,
                radius: 0.02 + size * size * 0.25,
                depth: 0.4 + 0.6 * (1.0 - size),
            }
        })
        .collect()
}

fn moon_height(dir: Vec3, craters: &[Crater], seed: u32) -> f32 {
    let mut h = 0.1 * perlin3(dir * 6.0 + 32.0, 64, seed ^ 0x302);
    for crater in craters {
        let d = dir.dot(crater.center).clamp(-1.0, 1.0).acos() / crater.radius;
        if d < 1.0 {
            // Bowl
            h -= crater.depth * (1.0 - d * d) * 0.3;
        } else if d < 1.4 {
            // Raised rim
            let t = (d - 1.0) / 0.4;
            h += crater.depth * 0.08 * (1.0 - t) * (1.0 - t);
        }
    }
    h
}

/// Moon albedo (RGBA8) and tangent-space normal map (RGBA8, xyz * 0.5 + 0.5).
pub fn moon_maps(width: u32, seed: u32) -> (Vec<u8>, Vec<u8>) {
    let height = (width / 2).max(1);
    let craters = craters(seed);

    let mut heights = Vec::with_capacity((width * height) as usize);
    let mut albedo = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let uv = Vec2::new(
                (x as f32 + 0.5) / width as f32,
                (y as f32 + 0.5) / height as f32,
            );
            let dir = equirect_dir(uv);
            let h = moon_height(dir, &craters, seed);
            heights.push(h);

            // Dark maria from a low-frequency field
            let maria = (perlin3(dir * 1.5 + 16.0, 64, seed ^ 0x303) * 2.0).clamp(0.0, 1.0);
            let grey = (0.62 - 0.3 * maria + 0.15 * h).clamp(0.05, 1.0);
            let a = to_unorm8(grey);
            albedo.extend_from_slice(&[a, a, to_unorm8(grey * 0.97), 255]);
        }
    }

    let at = |x: i64, y: i64| -> f32 {
        let xw = x.rem_euclid(width as i64) as u32;
        let yc = y.clamp(0, height as i64 - 1) as u32;
        heights[(yc * width + xw) as usize]
    };

    let strength = width as f32 / 64.0;
    let mut normal = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let du = (at(x + 1, y) - at(x - 1, y)) * 0.5 * strength;
            let dv = (at(x, y + 1) - at(x, y - 1)) * 0.5 * strength;
            let n = Vec3::new(-du, dv, 1.0).normalize();
            let e = n * 0.5 + Vec3::splat(0.5);
            normal.extend_from_slice(&[to_unorm8(e.x), to_unorm8(e.y), to_unorm8(e.z), 255]);
        }
    }

    (albedo, normal)
}

/// CPU-side copies of every generated asset.
pub struct NoiseAssets {
    pub shape: Vec<u8>,
    pub detail: Vec<u8>,
    pub coverage: Vec<u8>,
    pub blue_noise: Vec<u8>,
    pub moon_albedo: Vec<u8>,
    pub moon_normal: Vec<u8>,
}

impl NoiseAssets {
    pub fn generate(config: &NoiseConfig) -> Self {
        let (moon_albedo, moon_normal) = moon_maps(config.moon_width, config.seed);
        Self {
            shape: shape_volume(config.shape_size, config.seed),
            detail: detail_volume(config.detail_size, config.seed),
            coverage: coverage_map(config.coverage_size, config.seed),
            blue_noise: blue_noise(config.blue_noise_size),
            moon_albedo,
            moon_normal,
        }
    }
}

/// GPU-resident noise volumes, moon textures and the samplers that read them.
pub struct NoiseLibrary {
    // Kept alive for the views in the bind group
    _textures: Vec<wgpu::Texture>,
    bind_group: wgpu::BindGroup,
}

impl NoiseLibrary {
    /// Generate every asset and upload it once. `layout` is the asset group
    /// layout shared with the raymarch pipelines.
    pub fn new(
        gpu: &GpuContext,
        config: &NoiseConfig,
        layout: &wgpu::BindGroupLayout,
    ) -> Result<Self, StratusError> {
        let assets = NoiseAssets::generate(config);
        log::info!(
            "Noise assets generated: shape {}^3, detail {}^3, coverage {}^2, moon {}x{}",
            config.shape_size,
            config.detail_size,
            config.coverage_size,
            config.moon_width,
            config.moon_width / 2
        );
        Self::upload(gpu, config, &assets, layout)
    }

    pub fn upload(
        gpu: &GpuContext,
        config: &NoiseConfig,
        assets: &NoiseAssets,
        layout: &wgpu::BindGroupLayout,
    ) -> Result<Self, StratusError> {
        let device = &gpu.device;
        let moon_height = (config.moon_width / 2).max(1);

        // Same order as the slot table
        let specs: [(TextureSlot, wgpu::Extent3d, wgpu::TextureFormat, &[u8]); 6] = [
            (
                TextureSlot::DetailNoise,
                cube_extent(config.detail_size),
                wgpu::TextureFormat::R8Unorm,
                &assets.detail,
            ),
            (
                TextureSlot::ShapeNoise,
                cube_extent(config.shape_size),
                wgpu::TextureFormat::R8Unorm,
                &assets.shape,
            ),
            (
                TextureSlot::Coverage,
                flat_extent(config.coverage_size, config.coverage_size),
                wgpu::TextureFormat::R8Unorm,
                &assets.coverage,
            ),
            (
                TextureSlot::BlueNoise,
                flat_extent(config.blue_noise_size, config.blue_noise_size),
                wgpu::TextureFormat::R8Unorm,
                &assets.blue_noise,
            ),
            (
                TextureSlot::MoonAlbedo,
                flat_extent(config.moon_width, moon_height),
                wgpu::TextureFormat::Rgba8Unorm,
                &assets.moon_albedo,
            ),
            (
                TextureSlot::MoonNormal,
                flat_extent(config.moon_width, moon_height),
                wgpu::TextureFormat::Rgba8Unorm,
                &assets.moon_normal,
            ),
        ];

        let mut textures = Vec::with_capacity(specs.len());
        let mut views = Vec::with_capacity(specs.len());
        for (slot, size, format, data) in specs {
            let binding = slot.binding();
            let texture = upload_texture(gpu, binding.name, size, format, data)?;
            views.push((
                binding.binding,
                texture.create_view(&wgpu::TextureViewDescriptor::default()),
            ));
            textures.push(texture);
        }

        let repeat_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("repeat-sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let clamp_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("clamp-sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let mut entries: Vec<wgpu::BindGroupEntry> = views
            .iter()
            .map(|(binding, view)| wgpu::BindGroupEntry {
                binding: *binding,
                resource: wgpu::BindingResource::TextureView(view),
            })
            .collect();
        for (name, _, binding) in slots::SAMPLERS.iter().filter(|s| s.1 == ASSET_GROUP) {
            let sampler = if *name == "repeat_sampler" {
                &repeat_sampler
            } else {
                &clamp_sampler
            };
            entries.push(wgpu::BindGroupEntry {
                binding: *binding,
                resource: wgpu::BindingResource::Sampler(sampler),
            });
        }
        let bind_group = checked(device, "noise-library-bg", || {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("noise-library-bg"),
                layout,
                entries: &entries,
            })
        })?;

        Ok(Self {
            _textures: textures,
            bind_group,
        })
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}

fn cube_extent(size: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: size,
        height: size,
        depth_or_array_layers: size,
    }
}

fn flat_extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

fn upload_texture(
    gpu: &GpuContext,
    label: &str,
    size: wgpu::Extent3d,
    format: wgpu::TextureFormat,
    data: &[u8],
) -> Result<wgpu::Texture, StratusError> {
    let dimension = if size.depth_or_array_layers > 1 {
        wgpu::TextureDimension::D3
    } else {
        wgpu::TextureDimension::D2
    };
    let texel_bytes = format.block_copy_size(None).unwrap_or(1);

    let texture = checked(&gpu.device, label, || {
        gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        })
    })?;

    gpu.queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(size.width * texel_bytes),
            rows_per_image: Some(size.height),
        },
        size,
    );
    Ok(texture)
}
