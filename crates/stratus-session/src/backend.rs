//! Seam between the session state machine and the GPU stages.
//!
//! The controller only ever talks to a [`SessionBackend`]. The wgpu
//! implementation lives in [`crate::gpu_backend`]; tests drive the controller
//! through a recording mock.

use stratus_core::error::StratusError;
use stratus_core::params::{BudgetVariant, SceneParameterSnapshot};

/// What a session asks the backend to allocate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceRequest {
    pub size_multiplier: f32,
    pub tile_size: u32,
    pub tiling: bool,
    pub variant: BudgetVariant,
    /// Compositor divisor; only set for the live preview.
    pub viewport_pixel_size: Option<u32>,
}

/// Tile progress as seen by the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileProgress {
    pub tile_index: u32,
    pub tile_count: u32,
    pub width: u32,
    pub height: u32,
}

impl TileProgress {
    pub fn completed(&self) -> bool {
        self.tile_index >= self.tile_count
    }

    pub fn fraction(&self) -> f32 {
        if self.tile_count == 0 {
            return 0.0;
        }
        (self.tile_index.min(self.tile_count)) as f32 / self.tile_count as f32
    }
}

pub trait SessionBackend {
    /// Allocate the environment image, irradiance maps and draw state.
    fn acquire(&mut self, request: &ResourceRequest) -> Result<(), StratusError>;

    /// Drop everything `acquire` created. Safe to call when nothing is held.
    fn release(&mut self);

    fn compute_irradiance(
        &mut self,
        snapshot: &SceneParameterSnapshot,
        variant: BudgetVariant,
    ) -> Result<(), StratusError>;

    /// Draw the current tile and advance the cursor.
    fn draw_tile(
        &mut self,
        snapshot: &SceneParameterSnapshot,
        variant: BudgetVariant,
    ) -> Result<(), StratusError>;

    /// Draw the live preview if a view is attached. Returns whether it drew.
    fn composite(&mut self, snapshot: &SceneParameterSnapshot) -> Result<bool, StratusError>;

    /// Whether a composite would run this tick.
    fn has_view(&self) -> bool;

    fn progress(&self) -> TileProgress;

    fn reset(&mut self);

    /// Reallocate the image surface. Discards progress.
    fn resize(&mut self, multiplier: f32) -> Result<(), StratusError>;

    /// Change tile geometry. Discards progress.
    fn retile(&mut self, tile_size: u32, tiling: bool) -> Result<(), StratusError>;

    /// Read the finished image back as RGBA f32.
    fn commit(&mut self) -> Result<Vec<f32>, StratusError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_fraction() {
        let p = TileProgress {
            tile_index: 8,
            tile_count: 32,
            width: 4096,
            height: 2048,
        };
        assert!((p.fraction() - 0.25).abs() < 1e-6);
        assert!(!p.completed());

        let done = TileProgress {
            tile_index: 32,
            ..p
        };
        assert!(done.completed());
        assert_eq!(done.fraction(), 1.0);
    }
}
