//! Scene parameters for one render.
//!
//! A [`SceneParameterSnapshot`] is taken by value when a session starts and is
//! never mutated while that session draws. All angles are radians. Directions
//! are never stored; they are derived from elevation/rotation pairs in
//! [`crate::celestial`].

use serde::{Deserialize, Serialize};

/// Which step budget and visibility flags a draw uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BudgetVariant {
    /// Interactive preview: cheap budgets, viewport visibility flags.
    Viewport,
    /// Final bake or animation frame: full budgets, render visibility flags.
    Render,
}

/// Independent on/off switches for the two render contexts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Visibility {
    pub viewport: bool,
    pub render: bool,
}

impl Default for Visibility {
    fn default() -> Self {
        Self {
            viewport: true,
            render: true,
        }
    }
}

impl Visibility {
    pub fn get(&self, variant: BudgetVariant) -> bool {
        match variant {
            BudgetVariant::Viewport => self.viewport,
            BudgetVariant::Render => self.render,
        }
    }
}

/// Atmosphere densities are relative to Earth's (1.0 = clear day).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Atmosphere {
    pub enabled: Visibility,
    /// Rayleigh (air molecule) density multiplier.
    pub air: f32,
    /// Mie (aerosol) density multiplier.
    pub dust: f32,
    /// Ozone density multiplier.
    pub ozone: f32,
    /// Camera altitude above sea level in meters.
    pub altitude: f32,
}

impl Default for Atmosphere {
    fn default() -> Self {
        Self {
            enabled: Visibility::default(),
            air: 1.0,
            dust: 1.0,
            ozone: 1.0,
            altitude: 2000.0,
        }
    }
}

/// One procedural noise channel of a cloud layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseChannel {
    /// How strongly this channel erodes or builds density.
    pub intensity: f32,
    /// Zoom applied on top of the layer size (1.0 = reference period).
    pub scale: f32,
    /// Offset in noise space, in reference periods.
    pub offset: [f32; 3],
}

impl Default for NoiseChannel {
    fn default() -> Self {
        Self {
            intensity: 0.0,
            scale: 1.0,
            offset: [0.0; 3],
        }
    }
}

/// One spherical-shell cloud deck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudLayer {
    pub enabled: bool,
    pub density: f32,
    /// Fraction of the shell height at which density peaks.
    pub density_height: f32,
    /// Horizontal zoom of all noise channels; also scales shell thickness.
    pub size: f32,
    pub height_above_sea_level: f32,
    pub thickness: f32,
    pub top_roundness: f32,
    pub bottom_roundness: f32,
    pub top_density: f32,
    pub bottom_density: f32,
    pub absorption_color: [f32; 3],
    pub ambient_intensity: f32,
    /// Normalized 0..1; remapped to meters before upload.
    pub atmospheric_perspective_intensity: f32,
    pub scattering_attenuation: f32,
    pub scattering_contribution: f32,
    pub scattering_eccentricity: f32,
    pub powder_intensity: f32,
    pub coverage: NoiseChannel,
    /// Contrast of the coverage map before thresholding.
    pub coverage_shape: f32,
    pub shape: NoiseChannel,
    pub detail: NoiseChannel,
    pub curl_octaves: u32,
    pub position_offset: [f32; 3],
    /// Rotation of the layer about the zenith axis.
    pub rotation: f32,
}

impl Default for CloudLayer {
    fn default() -> Self {
        Self::high_deck()
    }
}

impl CloudLayer {
    /// The upper (cirro/alto) deck.
    pub fn high_deck() -> Self {
        Self {
            enabled: true,
            density: 0.25,
            density_height: 0.45,
            size: 1.0,
            height_above_sea_level: 8000.0,
            thickness: 0.9,
            top_roundness: 0.2,
            bottom_roundness: 0.1,
            top_density: 1.0,
            bottom_density: 0.5,
            absorption_color: [1.0, 1.0, 1.0],
            ambient_intensity: 3.0,
            atmospheric_perspective_intensity: 0.5,
            scattering_attenuation: 0.5,
            scattering_contribution: 0.5,
            scattering_eccentricity: 0.5,
            powder_intensity: 0.5,
            coverage: NoiseChannel {
                intensity: 0.87,
                scale: 1.0,
                offset: [936.0, 0.0, 0.0],
            },
            coverage_shape: 0.36,
            shape: NoiseChannel {
                intensity: -0.17,
                scale: 1.0,
                offset: [0.0; 3],
            },
            detail: NoiseChannel {
                intensity: -0.024,
                scale: 1.0,
                offset: [0.0; 3],
            },
            curl_octaves: 2,
            position_offset: [0.0; 3],
            rotation: 0.0,
        }
    }

    /// The lower (cumulus) deck.
    pub fn low_deck() -> Self {
        Self {
            density: 0.2,
            size: 0.45,
            height_above_sea_level: 2000.0,
            thickness: 2.5,
            powder_intensity: 1.0,
            coverage: NoiseChannel {
                intensity: 0.62,
                scale: 1.0,
                offset: [0.0; 3],
            },
            coverage_shape: 0.1,
            shape: NoiseChannel {
                intensity: 0.23,
                scale: 1.0,
                offset: [0.0; 3],
            },
            detail: NoiseChannel {
                intensity: 0.05,
                scale: 1.0,
                offset: [0.0; 3],
            },
            curl_octaves: 3,
            ..Self::high_deck()
        }
    }
}

/// Both cloud decks plus the shared domain geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Clouds {
    pub enabled: Visibility,
    /// Ground distance to the visible cloud horizon (meters).
    pub horizon_distance: f32,
    /// Height of the cloud domain above the camera at the zenith (meters).
    pub horizon_height: f32,
    /// Global Henyey-Greenstein anisotropy blended into each layer's phase.
    pub phase_g: f32,
    pub layers: [CloudLayer; 2],
}

impl Default for Clouds {
    fn default() -> Self {
        Self {
            enabled: Visibility::default(),
            horizon_distance: 10_000.0,
            horizon_height: 6_500.0,
            phase_g: 0.5,
            layers: [CloudLayer::high_deck(), CloudLayer::low_deck()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sun {
    pub enabled: Visibility,
    pub elevation: f32,
    pub rotation: f32,
    /// Full angular diameter of the disk.
    pub angular_size: f32,
    pub intensity: f32,
    /// Whether the sun lights the sky and clouds.
    pub as_light: bool,
    pub silver_intensity: f32,
    pub silver_spread: f32,
}

impl Default for Sun {
    fn default() -> Self {
        Self {
            enabled: Visibility::default(),
            elevation: 5f32.to_radians(),
            rotation: 0.0,
            angular_size: 0.545f32.to_radians(),
            intensity: 10.0,
            as_light: true,
            silver_intensity: 0.6,
            silver_spread: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Moon {
    pub enabled: Visibility,
    pub elevation: f32,
    pub rotation: f32,
    pub angular_size: f32,
    pub intensity: f32,
    /// Earthshine on the unlit side of the disk.
    pub ambient_intensity: f32,
    /// Angle of the terminator around the moon's up axis.
    pub phase: f32,
    /// Rotation of the terminator around the line of sight.
    pub phase_rotation: f32,
    /// Rotation of the surface texture around the line of sight.
    pub face_rotation: f32,
    pub use_sun_as_phase_source: bool,
    pub as_light: bool,
    pub silver_intensity: f32,
    pub silver_spread: f32,
}

impl Default for Moon {
    fn default() -> Self {
        Self {
            enabled: Visibility::default(),
            elevation: 15f32.to_radians(),
            rotation: 0.0,
            angular_size: 0.545f32.to_radians(),
            intensity: 1.0,
            ambient_intensity: 0.01,
            phase: 0.0,
            phase_rotation: 15f32.to_radians(),
            face_rotation: 15f32.to_radians(),
            use_sun_as_phase_source: false,
            as_light: true,
            silver_intensity: 1.13,
            silver_spread: 0.12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stars {
    pub enabled: Visibility,
    pub intensity: f32,
    /// Rotation of the star field about the celestial pole.
    pub rotation: f32,
    pub pole_elevation: f32,
    pub pole_rotation: f32,
}

impl Default for Stars {
    fn default() -> Self {
        Self {
            enabled: Visibility::default(),
            intensity: 1.0,
            rotation: 0.0,
            pole_elevation: std::f32::consts::FRAC_PI_2,
            pole_rotation: 0.0,
        }
    }
}

/// Raymarch step counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCounts {
    pub max_steps: u32,
    pub max_light_steps: u32,
}

/// Per-layer step overrides, one optional value per variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerStepOverride {
    pub viewport: Option<StepCounts>,
    pub render: Option<StepCounts>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepBudget {
    pub viewport: StepCounts,
    pub render: StepCounts,
    pub layer_overrides: [LayerStepOverride; 2],
}

impl Default for StepBudget {
    fn default() -> Self {
        Self {
            viewport: StepCounts {
                max_steps: 150,
                max_light_steps: 16,
            },
            render: StepCounts {
                max_steps: 300,
                max_light_steps: 64,
            },
            layer_overrides: [LayerStepOverride::default(); 2],
        }
    }
}

/// Step counts after applying the variant and per-layer overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSteps {
    pub global: StepCounts,
    pub layers: [StepCounts; 2],
}

impl StepBudget {
    pub fn resolve(&self, variant: BudgetVariant) -> ResolvedSteps {
        let global = match variant {
            BudgetVariant::Viewport => self.viewport,
            BudgetVariant::Render => self.render,
        };
        let layers = self.layer_overrides.map(|o| {
            let over = match variant {
                BudgetVariant::Viewport => o.viewport,
                BudgetVariant::Render => o.render,
            };
            over.unwrap_or(global)
        });
        ResolvedSteps { global, layers }
    }
}

/// Everything one render needs, captured at session start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneParameterSnapshot {
    pub atmosphere: Atmosphere,
    pub clouds: Clouds,
    pub sun: Sun,
    pub moon: Moon,
    pub stars: Stars,
    pub steps: StepBudget,
}
