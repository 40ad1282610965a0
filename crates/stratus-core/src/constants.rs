//! Single source of truth for shared constants.
//! Values that the WGSL sources also need are injected into the shader
//! preamble by `stratus-render`, never duplicated by hand.

// -- Environment image --

/// Width of the environment image at size multiplier 1.0.
pub const ENV_BASE_WIDTH: u32 = 1024;

/// Height of the environment image at size multiplier 1.0 (equirectangular, 2:1).
pub const ENV_BASE_HEIGHT: u32 = 512;

/// Smallest accepted environment image size multiplier.
pub const MIN_SIZE_MULTIPLIER: f32 = 0.25;

/// Largest accepted environment image size multiplier (before the hardware cap).
pub const MAX_SIZE_MULTIPLIER: f32 = 24.0;

/// Discrete size multiplier steps offered by the configuration surface.
pub const SIZE_MULTIPLIER_STEPS: [f32; 8] = [0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 16.0, 24.0];

/// Discrete tile size steps in pixels.
pub const TILE_SIZE_STEPS: [u32; 6] = [128, 256, 512, 1024, 2048, 4096];

/// Tile size used until the caller picks one.
pub const DEFAULT_TILE_SIZE: u32 = 512;

/// Viewport pixel-size divisors.
pub const VIEWPORT_PIXEL_SIZES: [u32; 4] = [1, 2, 4, 8];

// -- Irradiance map --

/// Width of the sky radiance and irradiance maps.
pub const IRRADIANCE_WIDTH: u32 = 128;

/// Height of the sky radiance and irradiance maps.
pub const IRRADIANCE_HEIGHT: u32 = 64;

// -- Atmosphere (meters, inverse meters) --

pub const PLANET_RADIUS: f32 = 6360e3;
pub const ATMOSPHERE_RADIUS: f32 = 6420e3;
pub const RAYLEIGH_SCALE_HEIGHT: f32 = 7994.0;
pub const MIE_SCALE_HEIGHT: f32 = 1200.0;
pub const OZONE_SCALE_HEIGHT: f32 = 8000.0;
pub const RAYLEIGH_BETA: [f32; 3] = [5.87901e-6, 13.7369e-6, 33.5374e-6];
pub const MIE_BETA: f32 = 21e-6;
pub const OZONE_BETA: [f32; 3] = [2.0556e-6, 4.9788e-6, 2.136e-7];

/// Illuminance of the sun disk at the top of the atmosphere (lux).
pub const SUN_LUX: f32 = 100_000.0;

/// Illuminance of a full moon (lux).
pub const MOON_LUX: f32 = 0.25;

// -- Clouds --

/// Radial extent of the cloud domain above its inner shell (meters).
pub const CLOUD_DOMAIN_THICKNESS: f32 = 15_000.0;

/// Meters of shell thickness per unit of the layer `thickness` parameter at size 1.0.
pub const CLOUD_THICKNESS_UNIT: f32 = 1_000.0;

/// Extinction per unit density (1/m) at full density.
pub const CLOUD_SIGMA_REFERENCE: f32 = 0.05;

/// Lower bound applied to extinction so transmittance never divides by zero.
pub const SIGMA_EPSILON: f32 = 1e-6;

/// Absolute atmospheric-perspective distance (meters) reached at slider value 1.0.
pub const AP_INTENSITY_MAX: f32 = 500_000.0;

/// World-space period of the coverage map at size 1.0 (meters).
pub const COVERAGE_NOISE_PERIOD: f32 = 60_000.0;

/// World-space period of the 128^3 shape volume at size 1.0 (meters).
pub const SHAPE_NOISE_PERIOD: f32 = 12_000.0;

/// World-space period of the 32^3 detail volume at size 1.0 (meters).
pub const DETAIL_NOISE_PERIOD: f32 = 1_500.0;

// -- Noise assets --

/// Edge length of the worley/perlin shape volume.
pub const SHAPE_NOISE_SIZE: u32 = 128;

/// Edge length of the worley detail volume.
pub const DETAIL_NOISE_SIZE: u32 = 32;

/// Edge length of the 2D coverage map.
pub const COVERAGE_NOISE_SIZE: u32 = 512;

/// Edge length of the blue-noise dither tile.
pub const BLUE_NOISE_SIZE: u32 = 64;

/// Width of the moon albedo and normal maps (height is half).
pub const MOON_TEXTURE_WIDTH: u32 = 512;

/// Seed for every procedural asset. Fixed so assets are byte-identical across runs.
pub const NOISE_SEED: u32 = 0x5EED_C10D;
