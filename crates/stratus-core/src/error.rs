use thiserror::Error;

/// Errors that can occur while configuring or running a sky render.
#[derive(Debug, Error)]
pub enum StratusError {
    #[error("Invalid environment image size multiplier {0} (expected 0.25..=24.0)")]
    InvalidImageSize(f32),

    #[error("Invalid tile size {0}")]
    InvalidTileSize(u32),

    #[error("Invalid viewport pixel size {0} (expected 1, 2, 4 or 8)")]
    InvalidPixelSize(u32),

    #[error("Output format {0} is a video container; only still-image formats can be written")]
    UnsupportedOutputFormat(String),

    #[error("GPU adapter not found: {0}")]
    AdapterNotFound(String),

    #[error("Failed to request GPU device: {0}")]
    DeviceRequestFailed(String),

    #[error("Failed to create GPU resource '{label}': {reason}")]
    ResourceCreationFailed { label: String, reason: String },

    #[error("GPU pass '{label}' failed: {reason}")]
    GpuCommandFailed { label: String, reason: String },

    #[error("Surface readback failed: {0}")]
    ReadbackFailed(String),

    #[error("Image encode failed: {0}")]
    EncodeFailed(String),
}
