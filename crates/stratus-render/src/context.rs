//! Owned replacement for process-wide shader and texture handles.
//!
//! Programs and noise assets are expensive to build and identical for every
//! session, so they are created once on first use and kept until
//! [`SkyContext::teardown`].

use stratus_core::error::StratusError;

use crate::gpu::GpuContext;
use crate::noise::{NoiseConfig, NoiseLibrary};
use crate::programs::ShaderProgramSet;

/// Resources shared by every stage of every session.
pub struct SharedResources {
    pub programs: ShaderProgramSet,
    pub noise: NoiseLibrary,
}

pub struct SkyContext {
    pub gpu: GpuContext,
    surface_format: wgpu::TextureFormat,
    noise_config: NoiseConfig,
    shared: Option<SharedResources>,
}

impl SkyContext {
    /// `surface_format` is the host viewport format for the composite pass.
    pub fn new(gpu: GpuContext, surface_format: wgpu::TextureFormat) -> Self {
        Self::with_noise_config(gpu, surface_format, NoiseConfig::default())
    }

    pub fn with_noise_config(
        gpu: GpuContext,
        surface_format: wgpu::TextureFormat,
        noise_config: NoiseConfig,
    ) -> Self {
        Self {
            gpu,
            surface_format,
            noise_config,
            shared: None,
        }
    }

    /// Build programs and noise assets if they do not exist yet.
    /// Calling this again is a no-op.
    pub fn ensure_initialized(&mut self) -> Result<(), StratusError> {
        if self.shared.is_some() {
            return Ok(());
        }
        let programs = ShaderProgramSet::new(&self.gpu.device, self.surface_format)?;
        let noise = NoiseLibrary::new(&self.gpu, &self.noise_config, &programs.asset_layout)?;
        self.shared = Some(SharedResources { programs, noise });
        log::info!("Sky context initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.shared.is_some()
    }

    /// Device plus shared resources, building the latter on first use.
    pub fn parts(&mut self) -> Result<(&GpuContext, &SharedResources), StratusError> {
        self.ensure_initialized()?;
        match &self.shared {
            Some(shared) => Ok((&self.gpu, shared)),
            None => Err(StratusError::ResourceCreationFailed {
                label: "sky-context".into(),
                reason: "shared resources missing after initialization".into(),
            }),
        }
    }

    /// Drop every shared resource. The next use rebuilds them.
    pub fn teardown(&mut self) {
        if self.shared.take().is_some() {
            log::info!("Sky context torn down");
        }
    }
}
