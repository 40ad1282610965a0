use stratus_core::error::StratusError;

/// Device and queue shared by every stage, plus the caps read once at startup.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_name: String,
    pub backend: String,
    /// Largest 2D texture edge the device accepts.
    pub max_texture_dimension: u32,
}

impl GpuContext {
    /// Initialize wgpu natively without a surface. Blocks on the async requests.
    pub fn headless() -> Result<Self, StratusError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| StratusError::AdapterNotFound("no suitable GPU adapter found".into()))?;

        Self::from_adapter(&adapter)
    }

    /// Request a device from an adapter the host already picked.
    pub fn from_adapter(adapter: &wgpu::Adapter) -> Result<Self, StratusError> {
        let info = adapter.get_info();
        let adapter_name = info.name.clone();
        let backend = format!("{:?}", info.backend);
        log::info!("Adapter: {} ({})", adapter_name, backend);

        // Large environment images need the adapter's own texture limits.
        let limits = adapter.limits();
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("stratus-device"),
                required_features: wgpu::Features::empty(),
                required_limits: limits.clone(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))
        .map_err(|e| StratusError::DeviceRequestFailed(format!("{e}")))?;

        // Errors outside a scope are logged; the default handler panics.
        device.on_uncaptured_error(Box::new(|err| {
            log::error!("Uncaptured GPU error: {err}");
        }));

        log::info!(
            "Max texture dimension: {}, max buffer size: {}",
            limits.max_texture_dimension_2d,
            limits.max_buffer_size
        );

        Ok(Self {
            device,
            queue,
            adapter_name,
            backend,
            max_texture_dimension: limits.max_texture_dimension_2d,
        })
    }
}

/// Run `f` inside validation and out-of-memory error scopes and return the
/// first error either scope caught.
fn scoped<T>(device: &wgpu::Device, f: impl FnOnce() -> T) -> (T, Option<wgpu::Error>) {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    let validation = pollster::block_on(device.pop_error_scope());
    let oom = pollster::block_on(device.pop_error_scope());
    (value, validation.or(oom))
}

/// Run `create` inside error scopes so a failed allocation or shader compile
/// comes back as an error instead of a panic.
pub fn checked<T>(
    device: &wgpu::Device,
    label: &str,
    create: impl FnOnce() -> T,
) -> Result<T, StratusError> {
    match scoped(device, create) {
        (_, Some(err)) => Err(StratusError::ResourceCreationFailed {
            label: label.to_string(),
            reason: err.to_string(),
        }),
        (value, None) => Ok(value),
    }
}

/// Record one command buffer with `record` and submit it, all inside error
/// scopes. Validation errors and OOM in the recorded passes come back as
/// [`StratusError::GpuCommandFailed`].
pub fn submit_checked(
    gpu: &GpuContext,
    label: &str,
    record: impl FnOnce(&mut wgpu::CommandEncoder),
) -> Result<(), StratusError> {
    let ((), err) = scoped(&gpu.device, || {
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        record(&mut encoder);
        gpu.queue.submit(std::iter::once(encoder.finish()));
    });
    match err {
        Some(err) => Err(StratusError::GpuCommandFailed {
            label: label.to_string(),
            reason: err.to_string(),
        }),
        None => Ok(()),
    }
}
