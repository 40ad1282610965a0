use glam::Mat4;
use stratus_core::celestial::{
    compute_dir, half_angular, moon_frame, moon_phase_dir, star_rotation, sun_solid_angle,
};
use stratus_core::cloud::{
    atmospheric_perspective, cloud_domain, extinction, layer_shell, layer_transform, noise_scales,
    CloudDomain,
};
use stratus_core::constants::PLANET_RADIUS;
use stratus_core::params::{BudgetVariant, CloudLayer, SceneParameterSnapshot, StepCounts};

/// GPU-uploadable per-layer parameters. Must match LayerUniforms in types.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LayerUniforms {
    pub transform: [[f32; 4]; 4],
    pub shape: [f32; 4],
    pub shell: [f32; 4],
    pub roundness: [f32; 4],
    pub sigma_s: [f32; 4],
    pub sigma_t: [f32; 4],
    pub scattering: [f32; 4],
    pub noise_scale: [f32; 4],
    pub noise_intensity: [f32; 4],
    pub coverage_offset: [f32; 4],
    pub shape_offset: [f32; 4],
    pub detail_offset: [f32; 4],
    pub position_offset: [f32; 4],
    pub steps: [u32; 4],
}

/// GPU-uploadable scene parameters. Must match SceneUniforms in types.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneUniforms {
    pub inv_view_proj: [[f32; 4]; 4],
    pub moon_rotation: [[f32; 4]; 4],
    pub star_rotation: [[f32; 4]; 4],
    pub camera: [f32; 4],
    pub target_size: [f32; 4],
    pub atmosphere: [f32; 4],
    pub sun_dir: [f32; 4],
    pub sun_params: [f32; 4],
    pub moon_dir: [f32; 4],
    pub moon_phase_dir: [f32; 4],
    pub moon_params: [f32; 4],
    pub stars: [f32; 4],
    pub visibility: [u32; 4],
    pub light_visibility: [u32; 4],
    pub steps: [u32; 4],
    pub domain: [f32; 4],
    pub layers: [LayerUniforms; 2],
}

/// GPU-uploadable composite parameters. Must match ScreenUniforms in screen.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ScreenUniforms {
    pub projection: [[f32; 4]; 4],
    pub sizes: [f32; 4],
    pub params: [f32; 4],
}

/// What the rays of a draw are generated for.
#[derive(Debug, Clone, Copy)]
pub enum RayTarget {
    /// Full equirectangular image of the given size.
    Equirect { width: u32, height: u32 },
    /// Perspective view; rays are rebuilt from the inverse view-projection.
    Perspective {
        width: u32,
        height: u32,
        inv_view_proj: Mat4,
    },
}

fn flag(on: bool) -> u32 {
    on as u32
}

/// Index of the layer with the larger inner radius. It is marched first.
fn upper_layer(layers: &[LayerUniforms; 2]) -> u32 {
    if layers[1].shape[3] > layers[0].shape[3] {
        1
    } else {
        0
    }
}

fn vec4(v: [f32; 3], w: f32) -> [f32; 4] {
    [v[0], v[1], v[2], w]
}

impl LayerUniforms {
    pub fn from_layer(domain: &CloudDomain, layer: &CloudLayer, steps: StepCounts) -> Self {
        let shell = layer_shell(domain, layer);
        let scales = noise_scales(layer);
        let ext = extinction(layer);
        Self {
            transform: layer_transform(domain, layer).to_cols_array_2d(),
            shape: [
                flag(layer.enabled) as f32,
                layer.density,
                layer.density_height,
                shell.inner_radius,
            ],
            shell: [
                shell.thickness,
                layer.ambient_intensity,
                atmospheric_perspective(layer.atmospheric_perspective_intensity),
                layer.powder_intensity,
            ],
            roundness: [
                layer.top_roundness,
                layer.bottom_roundness,
                layer.top_density,
                layer.bottom_density,
            ],
            sigma_s: vec4(ext.sigma_s.to_array(), layer.coverage_shape),
            sigma_t: vec4(ext.sigma_t.to_array(), layer.curl_octaves as f32),
            scattering: [
                layer.scattering_attenuation,
                layer.scattering_contribution,
                layer.scattering_eccentricity,
                0.0,
            ],
            noise_scale: [scales.coverage, scales.shape, scales.detail, 0.0],
            noise_intensity: [
                layer.coverage.intensity,
                layer.shape.intensity,
                layer.detail.intensity,
                0.0,
            ],
            coverage_offset: vec4(layer.coverage.offset, 0.0),
            shape_offset: vec4(layer.shape.offset, 0.0),
            detail_offset: vec4(layer.detail.offset, 0.0),
            position_offset: vec4(layer.position_offset, 0.0),
            steps: [steps.max_steps, steps.max_light_steps, 0, 0],
        }
    }
}

impl SceneUniforms {
    /// Derive every shader parameter from a snapshot.
    ///
    /// Visibility flags and step counts come from `variant`. The result is a
    /// pure function of its inputs, so identical snapshots upload identical
    /// bytes.
    pub fn from_snapshot(
        snapshot: &SceneParameterSnapshot,
        variant: BudgetVariant,
        target: RayTarget,
    ) -> Self {
        let SceneParameterSnapshot {
            atmosphere,
            clouds,
            sun,
            moon,
            stars,
            steps,
        } = snapshot;

        let resolved = steps.resolve(variant);
        let domain = cloud_domain(clouds);
        let frame = moon_frame(moon);
        let phase_dir = moon_phase_dir(moon, sun, &frame);
        let sun_dir = compute_dir(sun.elevation, sun.rotation);

        let (target_size, inv_view_proj) = match target {
            RayTarget::Equirect { width, height } => {
                ([width as f32, height as f32, 0.0, 0.0], Mat4::IDENTITY)
            }
            RayTarget::Perspective {
                width,
                height,
                inv_view_proj,
            } => ([width as f32, height as f32, 1.0, 0.0], inv_view_proj),
        };

        let layers = [
            LayerUniforms::from_layer(&domain, &clouds.layers[0], resolved.layers[0]),
            LayerUniforms::from_layer(&domain, &clouds.layers[1], resolved.layers[1]),
        ];

        Self {
            inv_view_proj: inv_view_proj.to_cols_array_2d(),
            moon_rotation: frame.rotation.to_cols_array_2d(),
            star_rotation: star_rotation(stars).to_cols_array_2d(),
            camera: [
                0.0,
                0.0,
                PLANET_RADIUS + atmosphere.altitude,
                atmosphere.altitude,
            ],
            target_size,
            atmosphere: [atmosphere.air, atmosphere.dust, atmosphere.ozone, 0.0],
            sun_dir: vec4(sun_dir.to_array(), half_angular(sun.angular_size)),
            sun_params: [
                sun.intensity,
                sun.silver_intensity,
                sun.silver_spread,
                sun_solid_angle(sun),
            ],
            moon_dir: vec4(frame.dir.to_array(), half_angular(moon.angular_size)),
            moon_phase_dir: vec4(phase_dir.to_array(), moon.ambient_intensity),
            moon_params: [moon.intensity, moon.silver_intensity, moon.silver_spread, 0.0],
            stars: [stars.intensity, 0.0, 0.0, 0.0],
            visibility: [
                flag(atmosphere.enabled.get(variant)),
                flag(clouds.enabled.get(variant)),
                flag(sun.enabled.get(variant)),
                flag(moon.enabled.get(variant)),
            ],
            light_visibility: [
                flag(sun.as_light),
                flag(moon.as_light),
                flag(stars.enabled.get(variant)),
                0,
            ],
            steps: [
                resolved.global.max_steps,
                resolved.global.max_light_steps,
                upper_layer(&layers),
                0,
            ],
            domain: [
                domain.center.z,
                domain.min_radius,
                domain.max_radius,
                clouds.phase_g,
            ],
            layers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EQUIRECT: RayTarget = RayTarget::Equirect {
        width: 2048,
        height: 1024,
    };

    #[test]
    fn test_uniform_sizes_match_wgsl() {
        assert_eq!(std::mem::size_of::<LayerUniforms>(), 272);
        assert_eq!(std::mem::size_of::<SceneUniforms>(), 400 + 2 * 272);
        assert_eq!(std::mem::size_of::<ScreenUniforms>(), 96);
    }

    #[test]
    fn test_marshaling_deterministic() {
        let snapshot = SceneParameterSnapshot::default();
        let a = SceneUniforms::from_snapshot(&snapshot, BudgetVariant::Render, EQUIRECT);
        let b = SceneUniforms::from_snapshot(&snapshot.clone(), BudgetVariant::Render, EQUIRECT);
        assert_eq!(bytemuck::bytes_of(&a), bytemuck::bytes_of(&b));
    }

    #[test]
    fn test_variant_selects_visibility_and_steps() {
        let mut snapshot = SceneParameterSnapshot::default();
        snapshot.clouds.enabled.viewport = false;
        snapshot.stars.enabled.render = false;
        snapshot.steps.layer_overrides[1].viewport = Some(StepCounts {
            max_steps: 40,
            max_light_steps: 4,
        });

        let view = SceneUniforms::from_snapshot(&snapshot, BudgetVariant::Viewport, EQUIRECT);
        let render = SceneUniforms::from_snapshot(&snapshot, BudgetVariant::Render, EQUIRECT);

        assert_eq!(view.visibility[1], 0);
        assert_eq!(render.visibility[1], 1);
        assert_eq!(view.light_visibility[2], 1);
        assert_eq!(render.light_visibility[2], 0);
        assert_eq!(view.steps[0], 150);
        assert_eq!(render.steps[0], 300);
        assert_eq!(view.layers[0].steps[0], 150);
        assert_eq!(view.layers[1].steps[..2], [40, 4]);
        assert_eq!(render.layers[1].steps[0], 300);
    }

    #[test]
    fn test_higher_layer_marched_first() {
        let mut snapshot = SceneParameterSnapshot::default();
        snapshot.clouds.layers[0].height_above_sea_level = 6000.0;
        snapshot.clouds.layers[1].height_above_sea_level = 1500.0;
        let u = SceneUniforms::from_snapshot(&snapshot, BudgetVariant::Render, EQUIRECT);
        assert!(u.layers[0].shape[3] > u.layers[1].shape[3]);
        assert_eq!(u.steps[2], 0);

        snapshot.clouds.layers[1].height_above_sea_level = 9000.0;
        let u = SceneUniforms::from_snapshot(&snapshot, BudgetVariant::Render, EQUIRECT);
        assert!(u.layers[1].shape[3] > u.layers[0].shape[3]);
        assert_eq!(u.steps[2], 1);
    }

    #[test]
    fn test_zero_density_layer_keeps_sigma_t_positive() {
        let mut snapshot = SceneParameterSnapshot::default();
        snapshot.clouds.layers[0].density = 0.0;
        let u = SceneUniforms::from_snapshot(&snapshot, BudgetVariant::Render, EQUIRECT);
        for c in &u.layers[0].sigma_t[..3] {
            assert!(*c > 0.0);
        }
        assert_eq!(u.layers[0].sigma_s[..3], [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_perspective_target_flags_rays() {
        let snapshot = SceneParameterSnapshot::default();
        let inv = Mat4::from_scale(glam::Vec3::splat(2.0));
        let u = SceneUniforms::from_snapshot(
            &snapshot,
            BudgetVariant::Viewport,
            RayTarget::Perspective {
                width: 320,
                height: 180,
                inv_view_proj: inv,
            },
        );
        assert_eq!(u.target_size, [320.0, 180.0, 1.0, 0.0]);
        assert_eq!(u.inv_view_proj, inv.to_cols_array_2d());

        let e = SceneUniforms::from_snapshot(&snapshot, BudgetVariant::Viewport, EQUIRECT);
        assert_eq!(e.target_size[2], 0.0);
    }

    #[test]
    fn test_sun_direction_unit_and_half_angle() {
        let snapshot = SceneParameterSnapshot::default();
        let u = SceneUniforms::from_snapshot(&snapshot, BudgetVariant::Render, EQUIRECT);
        let d = glam::Vec3::new(u.sun_dir[0], u.sun_dir[1], u.sun_dir[2]);
        assert!((d.length() - 1.0).abs() < 1e-5);
        assert!((u.sun_dir[3] - snapshot.sun.angular_size * 0.5).abs() < 1e-7);
    }
}
