//! Directions and orientation matrices for the sun, moon and star field.
//!
//! World space is Z-up. Elevation is measured from the horizon, rotation
//! clockwise from +Y around the zenith.

use glam::{Mat3, Mat4, Vec3, Vec4};

use crate::params::{Moon, Stars, Sun};

/// Unit direction for an (elevation, rotation) pair.
pub fn compute_dir(elevation: f32, rotation: f32) -> Vec3 {
    Vec3::new(
        rotation.sin() * elevation.cos(),
        rotation.cos() * elevation.cos(),
        elevation.sin(),
    )
    .normalize_or_zero()
}

/// Look-at basis with the translation stored in the bottom row.
///
/// Rows are `(mx.x, my.x, mz.x, 0)`, `(mx.y, my.y, mz.y, 0)`,
/// `(mx.z, my.z, mz.z, 0)`, `(mx·eye, my·eye, mz·eye, 1)` where `mz` points
/// from the target back to the eye.
pub fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    let mz = (eye - target).normalize_or_zero();
    let mx = up.cross(mz).normalize_or_zero();
    let my = mz.cross(mx).normalize_or_zero();

    from_rows([
        [mx.x, my.x, mz.x, 0.0],
        [mx.y, my.y, mz.y, 0.0],
        [mx.z, my.z, mz.z, 0.0],
        [mx.dot(eye), my.dot(eye), mz.dot(eye), 1.0],
    ])
}

fn from_rows(rows: [[f32; 4]; 4]) -> Mat4 {
    Mat4::from_cols_array_2d(&rows).transpose()
}

/// Maps the moon's local frame so its texture faces the observer.
const MOON_ROT_OFFSET: [[f32; 4]; 4] = [
    [0.0, 0.0, -1.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Moon disk orientation plus the up vector used to place the terminator.
#[derive(Debug, Clone, Copy)]
pub struct MoonFrame {
    pub dir: Vec3,
    pub rotation: Mat4,
    pub up: Vec3,
}

/// Orient the moon so it always faces the origin.
///
/// Past the zenith (`cos(elevation) < 0`) the look-at basis flips its x and
/// y axes; negating the first two rows of the inverse cancels that flip so
/// the disk does not spin by 180 degrees at elevation = 90 degrees.
pub fn moon_frame(moon: &Moon) -> MoonFrame {
    let dir = compute_dir(moon.elevation, moon.rotation);
    let mut inv_look = look_at(dir, Vec3::ZERO, Vec3::Z).inverse();

    let up = if moon.elevation.cos() < 0.0 {
        inv_look = Mat4::from_diagonal(Vec4::new(-1.0, -1.0, 1.0, 1.0)) * inv_look;
        Vec3::new(dir.y, -dir.x, 0.0)
    } else {
        Vec3::new(-dir.y, dir.x, 0.0)
    }
    .normalize_or_zero();

    let face = Mat4::from_axis_angle(dir, moon.face_rotation);
    let rotation = from_rows(MOON_ROT_OFFSET) * inv_look * face;

    MoonFrame { dir, rotation, up }
}

/// Direction the moon's lit hemisphere faces.
pub fn moon_phase_dir(moon: &Moon, sun: &Sun, frame: &MoonFrame) -> Vec3 {
    if moon.use_sun_as_phase_source {
        return compute_dir(sun.elevation, sun.rotation);
    }
    let inv_dir = -frame.dir;
    let up = (Mat3::from_axis_angle(inv_dir, moon.phase_rotation) * frame.up).normalize_or_zero();
    (Mat3::from_axis_angle(up, moon.phase) * inv_dir).normalize_or_zero()
}

/// Half the angular diameter of a disk.
pub fn half_angular(angular_size: f32) -> f32 {
    angular_size * 0.5
}

/// Solid angle of the sun disk used to normalize its radiance.
pub fn sun_solid_angle(sun: &Sun) -> f32 {
    2.0 * std::f32::consts::PI * (1.0 - (0.5 * half_angular(sun.angular_size)).cos())
}

/// Rotation of the star field about the celestial pole.
pub fn star_rotation(stars: &Stars) -> Mat4 {
    let pole = compute_dir(stars.pole_elevation, stars.pole_rotation);
    Mat4::from_axis_angle(pole, stars.rotation)
}
