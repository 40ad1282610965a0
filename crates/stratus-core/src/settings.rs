//! Read-only render configuration consumed by sessions.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_TILE_SIZE, MAX_SIZE_MULTIPLIER, MIN_SIZE_MULTIPLIER, VIEWPORT_PIXEL_SIZES,
};
use crate::error::StratusError;
use crate::output::OutputFormat;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub format: OutputFormat,
    /// Path prefix; frame numbers and the extension are appended.
    pub basename: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            format: OutputFormat::OpenExr,
            basename: "stratus_sky".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Size multiplier for bakes and animation frames.
    pub render_size: f32,
    /// Size multiplier for the live preview accumulation buffer.
    pub viewport_size: f32,
    pub tile_size: u32,
    pub tiling: bool,
    /// Divisor applied to the view resolution by the compositor.
    pub viewport_pixel_size: u32,
    /// Exposure applied by the viewport composite.
    pub env_strength: f32,
    /// Display gamma applied by the viewport composite.
    pub gamma: f32,
    pub output: OutputSettings,
    pub frame_start: u32,
    pub frame_end: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            render_size: 2.0,
            viewport_size: 0.5,
            tile_size: DEFAULT_TILE_SIZE,
            tiling: true,
            viewport_pixel_size: 4,
            env_strength: 0.1,
            gamma: 1.0,
            output: OutputSettings::default(),
            frame_start: 1,
            frame_end: 1,
        }
    }
}

impl RenderSettings {
    /// Reject values outside the ranges the pipeline accepts.
    pub fn validate(&self) -> Result<(), StratusError> {
        for size in [self.render_size, self.viewport_size] {
            if !(MIN_SIZE_MULTIPLIER..=MAX_SIZE_MULTIPLIER).contains(&size) {
                return Err(StratusError::InvalidImageSize(size));
            }
        }
        if self.tile_size == 0 {
            return Err(StratusError::InvalidTileSize(self.tile_size));
        }
        if !VIEWPORT_PIXEL_SIZES.contains(&self.viewport_pixel_size) {
            return Err(StratusError::InvalidPixelSize(self.viewport_pixel_size));
        }
        Ok(())
    }

    /// Inclusive frame range length, saturating at `u32::MAX`.
    pub fn frame_count(&self) -> u32 {
        if self.frame_end < self.frame_start {
            return 0;
        }
        (self.frame_end - self.frame_start).saturating_add(1)
    }
}
