//! Derived cloud-layer quantities.
//!
//! The cloud decks live on spherical shells whose common center sits below
//! the camera so that the shell meets the ground at `horizon_distance` and
//! rises `horizon_height` above the camera at the zenith.

use glam::{Mat4, Vec3};

use crate::constants::{
    AP_INTENSITY_MAX, CLOUD_DOMAIN_THICKNESS, CLOUD_SIGMA_REFERENCE, CLOUD_THICKNESS_UNIT,
    COVERAGE_NOISE_PERIOD, DETAIL_NOISE_PERIOD, PLANET_RADIUS, SHAPE_NOISE_PERIOD, SIGMA_EPSILON,
};
use crate::params::{CloudLayer, Clouds};

/// Flat-horizon paraboloid approximation of the domain radius:
/// `r = (2d)^2 / (8h) + h / 2`.
pub fn domain_radius(horizon_distance: f32, horizon_height: f32) -> f32 {
    let d = horizon_distance as f64;
    let h = (horizon_height as f64).max(f64::EPSILON);
    ((2.0 * d).powi(2) / (8.0 * h) + h * 0.5) as f32
}

/// Domain center relative to the ground point below the camera.
pub fn domain_center(horizon_distance: f32, horizon_height: f32) -> Vec3 {
    let r = domain_radius(horizon_distance, horizon_height);
    Vec3::new(0.0, 0.0, horizon_height - r)
}

/// Inner and outer radii of the whole cloud domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloudDomain {
    pub center: Vec3,
    pub min_radius: f32,
    pub max_radius: f32,
}

pub fn cloud_domain(clouds: &Clouds) -> CloudDomain {
    let r = domain_radius(clouds.horizon_distance, clouds.horizon_height);
    CloudDomain {
        center: domain_center(clouds.horizon_distance, clouds.horizon_height),
        min_radius: r,
        max_radius: r + CLOUD_DOMAIN_THICKNESS,
    }
}

/// World-to-layer-local transform.
///
/// World space has the planet center at the origin. The layer frame is the
/// domain center lifted by the planet radius, rotated about Z, then inverted.
pub fn layer_transform(domain: &CloudDomain, layer: &CloudLayer) -> Mat4 {
    let translation = Mat4::from_translation(domain.center + Vec3::new(0.0, 0.0, PLANET_RADIUS));
    let rotation = Mat4::from_rotation_z(layer.rotation);
    (rotation * translation).inverse()
}

/// Shell radii of one layer in layer-local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerShell {
    pub inner_radius: f32,
    pub thickness: f32,
}

pub fn layer_shell(domain: &CloudDomain, layer: &CloudLayer) -> LayerShell {
    LayerShell {
        inner_radius: domain.min_radius + layer.height_above_sea_level,
        thickness: layer.thickness * layer.size * CLOUD_THICKNESS_UNIT,
    }
}

/// Inverse periods (1/m) for the three noise channels of a layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseScales {
    pub coverage: f32,
    pub shape: f32,
    pub detail: f32,
}

pub fn noise_scales(layer: &CloudLayer) -> NoiseScales {
    let size = layer.size.max(1e-3);
    NoiseScales {
        coverage: layer.coverage.scale / (COVERAGE_NOISE_PERIOD * size),
        shape: layer.shape.scale / (SHAPE_NOISE_PERIOD * size),
        detail: layer.detail.scale / (DETAIL_NOISE_PERIOD * size),
    }
}

/// Scattering and extinction coefficients (1/m) per color channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extinction {
    pub sigma_s: Vec3,
    pub sigma_t: Vec3,
}

pub fn extinction(layer: &CloudLayer) -> Extinction {
    let sigma_s = Vec3::from(layer.absorption_color) * layer.density * CLOUD_SIGMA_REFERENCE;
    Extinction {
        sigma_s,
        sigma_t: sigma_s.max(Vec3::splat(SIGMA_EPSILON)),
    }
}

/// Atmospheric-perspective distance (meters) for a normalized slider value.
pub fn atmospheric_perspective(normalized: f32) -> f32 {
    lerp(0.0, AP_INTENSITY_MAX, normalized.clamp(0.0, 1.0))
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
