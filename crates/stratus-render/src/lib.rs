pub mod compositor;
pub mod context;
pub mod env_image;
pub mod gpu;
pub mod irradiance;
pub mod noise;
pub mod programs;
pub mod raymarch;
pub mod slots;
pub mod test_harness;
pub mod uniforms;

pub use compositor::{DisplaySettings, ViewCamera, ViewportCompositor};
pub use context::{SharedResources, SkyContext};
pub use env_image::EnvImage;
pub use gpu::GpuContext;
pub use irradiance::IrradianceStage;
pub use noise::{NoiseConfig, NoiseLibrary};
pub use programs::ShaderProgramSet;
pub use raymarch::TileRaymarchStage;
pub use uniforms::{LayerUniforms, RayTarget, SceneUniforms};
