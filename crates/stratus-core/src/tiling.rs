//! Tile geometry and progress for the environment image.
//!
//! The image is covered by a grid of square tiles, visited row-major from the
//! top-left. Edge tiles are clipped to the image, so the grid size rounds up.
//! When tiling is off, or the tile does not fit inside the image, the whole
//! surface counts as a single tile.

use crate::constants::{
    DEFAULT_TILE_SIZE, ENV_BASE_HEIGHT, ENV_BASE_WIDTH, MAX_SIZE_MULTIPLIER, MIN_SIZE_MULTIPLIER,
};
use crate::error::StratusError;

/// Pixel rectangle of one tile, already clipped to the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct TileGrid {
    width: u32,
    height: u32,
    tile_size: u32,
    tile_index: u32,
    tiling_enabled: bool,
    max_texture_dimension: u32,
}

impl TileGrid {
    /// A 1024x512 grid with the default tile size.
    pub fn new(max_texture_dimension: u32) -> Self {
        Self {
            width: ENV_BASE_WIDTH.min(max_texture_dimension),
            height: ENV_BASE_HEIGHT.min(max_texture_dimension),
            tile_size: DEFAULT_TILE_SIZE.min(max_texture_dimension),
            tile_index: 0,
            tiling_enabled: true,
            max_texture_dimension,
        }
    }

    /// Largest multiplier the hardware allows, never below the minimum step.
    pub fn max_multiplier(&self) -> f32 {
        (self.max_texture_dimension as f32 / ENV_BASE_WIDTH as f32)
            .floor()
            .clamp(MIN_SIZE_MULTIPLIER, MAX_SIZE_MULTIPLIER)
    }

    /// Resize to `1024*m x 512*m`, capped by the hardware. Restarts progress.
    pub fn set_size(&mut self, multiplier: f32) -> Result<(u32, u32), StratusError> {
        if !(MIN_SIZE_MULTIPLIER..=MAX_SIZE_MULTIPLIER).contains(&multiplier) {
            return Err(StratusError::InvalidImageSize(multiplier));
        }
        let m = multiplier.min(self.max_multiplier());
        self.width = (ENV_BASE_WIDTH as f32 * m) as u32;
        self.height = (ENV_BASE_HEIGHT as f32 * m) as u32;
        self.tile_index = 0;
        Ok((self.width, self.height))
    }

    /// Change the tile edge length, capped by the hardware. Restarts progress.
    pub fn set_tile_size(&mut self, tile_size: u32) -> Result<(), StratusError> {
        if tile_size == 0 {
            return Err(StratusError::InvalidTileSize(tile_size));
        }
        self.tile_size = tile_size.min(self.max_texture_dimension);
        self.tile_index = 0;
        Ok(())
    }

    pub fn enable_tiling(&mut self) {
        self.tiling_enabled = true;
    }

    pub fn disable_tiling(&mut self) {
        self.tiling_enabled = false;
    }

    /// Tiling is in effect only when enabled and the tile fits the image.
    pub fn uses_tiling(&self) -> bool {
        self.tiling_enabled && self.tile_size <= self.width && self.tile_size <= self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn tile_index(&self) -> u32 {
        self.tile_index
    }

    /// Columns and rows of the tile grid.
    pub fn grid_dims(&self) -> (u32, u32) {
        if self.uses_tiling() {
            (
                self.width.div_ceil(self.tile_size),
                self.height.div_ceil(self.tile_size),
            )
        } else {
            (1, 1)
        }
    }

    pub fn tile_count(&self) -> u32 {
        let (cols, rows) = self.grid_dims();
        cols * rows
    }

    /// Grid coordinates of the tile drawn next.
    pub fn current_tile_position(&self) -> (u32, u32) {
        if !self.uses_tiling() {
            return (0, 0);
        }
        let (cols, rows) = self.grid_dims();
        // Past completion the cursor stays on the last tile.
        let index = self.tile_index.min(cols * rows - 1);
        (index % cols, index / cols)
    }

    /// Pixel rectangle of the tile drawn next.
    pub fn current_tile_rect(&self) -> TileRect {
        if !self.uses_tiling() {
            return TileRect {
                x: 0,
                y: 0,
                width: self.width,
                height: self.height,
            };
        }
        let (tx, ty) = self.current_tile_position();
        let x = tx * self.tile_size;
        let y = ty * self.tile_size;
        TileRect {
            x,
            y,
            width: self.tile_size.min(self.width - x),
            height: self.tile_size.min(self.height - y),
        }
    }

    /// Move to the next tile. Does nothing once the sequence is complete.
    pub fn advance_tile(&mut self) {
        if !self.completed() {
            self.tile_index += 1;
        }
    }

    pub fn completed(&self) -> bool {
        self.tile_index >= self.tile_count()
    }

    /// Restart the tile sequence without touching geometry.
    pub fn reset(&mut self) {
        self.tile_index = 0;
    }

    /// Fraction of tiles drawn, in `0.0..=1.0`.
    pub fn progress(&self) -> f32 {
        self.tile_index as f32 / self.tile_count() as f32
    }
}
