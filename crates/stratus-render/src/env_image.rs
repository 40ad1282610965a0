use stratus_core::error::StratusError;
use stratus_core::tiling::{TileGrid, TileRect};

use crate::gpu::{checked, GpuContext};
use crate::programs::ENV_IMAGE_FORMAT;

/// Bytes per Rgba32Float texel.
const TEXEL_BYTES: u32 = 16;

/// Readback staging buffers never exceed this size, whatever the device allows.
const MAX_STAGING_BYTES: u64 = 256 * 1024 * 1024;

/// Row pitch of a texture-to-buffer copy, padded to the copy alignment.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * TEXEL_BYTES;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Rows per readback band for an image of `width` under a `max_bytes` buffer cap.
pub fn band_rows(width: u32, height: u32, max_bytes: u64) -> u32 {
    let pitch = padded_bytes_per_row(width) as u64;
    ((max_bytes / pitch).max(1) as u32).min(height.max(1))
}

/// The full-resolution equirectangular surface plus its tile schedule.
pub struct EnvImage {
    grid: TileGrid,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl EnvImage {
    /// Allocate at `multiplier` times the base 1024x512 size.
    pub fn new(gpu: &GpuContext, multiplier: f32) -> Result<Self, StratusError> {
        let mut grid = TileGrid::new(gpu.max_texture_dimension);
        let (width, height) = grid.set_size(multiplier)?;
        let (texture, view) = create_surface(&gpu.device, width, height)?;
        Ok(Self {
            grid,
            texture,
            view,
        })
    }

    /// Reallocate the surface. Destroys any progress and pixel data.
    pub fn set_size(&mut self, gpu: &GpuContext, multiplier: f32) -> Result<(u32, u32), StratusError> {
        let (width, height) = self.grid.set_size(multiplier)?;
        let (texture, view) = create_surface(&gpu.device, width, height)?;
        self.texture.destroy();
        self.texture = texture;
        self.view = view;
        log::info!("Env image resized to {}x{}", width, height);
        Ok((width, height))
    }

    pub fn set_tile_size(&mut self, tile_size: u32) -> Result<(), StratusError> {
        self.grid.set_tile_size(tile_size)
    }

    pub fn enable_tiling(&mut self) {
        self.grid.enable_tiling();
    }

    pub fn disable_tiling(&mut self) {
        self.grid.disable_tiling();
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn size(&self) -> (u32, u32) {
        self.grid.size()
    }

    pub fn current_tile_position(&self) -> (u32, u32) {
        self.grid.current_tile_position()
    }

    pub fn current_tile_rect(&self) -> TileRect {
        self.grid.current_tile_rect()
    }

    pub fn advance_tile(&mut self) {
        self.grid.advance_tile();
    }

    pub fn completed(&self) -> bool {
        self.grid.completed()
    }

    pub fn reset(&mut self) {
        self.grid.reset();
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// Read the surface back as tightly packed RGBA f32, top row first.
    ///
    /// Only meaningful once [`completed`](Self::completed) holds; earlier
    /// calls return whatever tiles have been drawn so far.
    pub fn commit(&self, gpu: &GpuContext) -> Result<Vec<f32>, StratusError> {
        let device = &gpu.device;
        let (width, height) = self.grid.size();
        let pitch = padded_bytes_per_row(width);
        let row_bytes = (width * TEXEL_BYTES) as usize;
        let limit = device.limits().max_buffer_size.min(MAX_STAGING_BYTES);
        let rows = band_rows(width, height, limit);

        let staging = checked(device, "env-image-staging", || {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("env-image-staging"),
                size: pitch as u64 * rows as u64,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            })
        })?;

        let mut pixels: Vec<f32> = Vec::with_capacity((width * height * 4) as usize);
        let mut y = 0;
        while y < height {
            let band = rows.min(height - y);

            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("env-image-readback"),
            });
            encoder.copy_texture_to_buffer(
                wgpu::TexelCopyTextureInfo {
                    texture: &self.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d { x: 0, y, z: 0 },
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::TexelCopyBufferInfo {
                    buffer: &staging,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(pitch),
                        rows_per_image: Some(band),
                    },
                },
                wgpu::Extent3d {
                    width,
                    height: band,
                    depth_or_array_layers: 1,
                },
            );
            gpu.queue.submit(std::iter::once(encoder.finish()));

            let slice = staging.slice(..pitch as u64 * band as u64);
            let (sender, receiver) = std::sync::mpsc::channel();
            slice.map_async(wgpu::MapMode::Read, move |result| {
                let _ = sender.send(result);
            });
            device.poll(wgpu::Maintain::Wait);
            receiver
                .recv()
                .map_err(|e| StratusError::ReadbackFailed(format!("map callback dropped: {e}")))?
                .map_err(|e| StratusError::ReadbackFailed(format!("failed to map buffer: {e}")))?;

            {
                let data = slice.get_mapped_range();
                for row in 0..band as usize {
                    let start = row * pitch as usize;
                    pixels.extend_from_slice(bytemuck::cast_slice(&data[start..start + row_bytes]));
                }
            }
            staging.unmap();
            y += band;
        }

        staging.destroy();
        Ok(pixels)
    }
}

fn create_surface(
    device: &wgpu::Device,
    width: u32,
    height: u32,
) -> Result<(wgpu::Texture, wgpu::TextureView), StratusError> {
    let texture = checked(device, "env-image", || {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some("env-image"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: ENV_IMAGE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        })
    })?;
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Ok((texture, view))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_pitch_alignment() {
        assert_eq!(padded_bytes_per_row(256), 4096);
        assert_eq!(padded_bytes_per_row(17), 512);
        assert_eq!(padded_bytes_per_row(1) % wgpu::COPY_BYTES_PER_ROW_ALIGNMENT, 0);
    }

    #[test]
    fn test_band_rows_respect_limit() {
        // 24576 px wide rows are 393216 bytes; a 1 MiB cap fits two of them
        assert_eq!(band_rows(24576, 12288, 1024 * 1024), 2);
        assert_eq!(band_rows(1024, 512, u64::MAX), 512);
        // A cap smaller than one row still reads one row at a time
        assert_eq!(band_rows(1024, 512, 16), 1);
    }

    #[cfg(feature = "gpu_tests")]
    #[test]
    fn test_commit_reads_back_cleared_surface() {
        let gpu = crate::gpu::GpuContext::headless().expect("gpu");
        let image = EnvImage::new(&gpu, 0.25).expect("env image");

        let mut encoder = gpu.device.create_command_encoder(&Default::default());
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: image.view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.25,
                            g: 0.5,
                            b: 2.0,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));

        let pixels = image.commit(&gpu).expect("commit");
        assert_eq!(pixels.len(), 256 * 128 * 4);
        assert_eq!(&pixels[..4], &[0.25, 0.5, 2.0, 1.0]);
        assert_eq!(&pixels[pixels.len() - 4..], &[0.25, 0.5, 2.0, 1.0]);
    }
}
