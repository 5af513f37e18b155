use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::error::RenderError;
use crate::types::GpuPowerPreference;

/// Adapter, device and queue shared by every GPU component.
pub(crate) struct GpuContext {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub max_texture_dimension: u32,
}

impl GpuContext {
    pub(crate) fn create_instance() -> wgpu::Instance {
        wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        })
    }

    /// Creates a surface for `target` on `instance`.
    ///
    /// # Safety
    ///
    /// `target` must outlive the returned surface.
    pub(crate) unsafe fn create_surface<T>(
        instance: &wgpu::Instance,
        target: &T,
    ) -> Result<wgpu::Surface<'static>, RenderError>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let window_handle = target.window_handle()?;
        let display_handle = target.display_handle()?;
        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: display_handle.as_raw(),
                raw_window_handle: window_handle.as_raw(),
            })
        }?;
        Ok(surface)
    }

    pub(crate) fn new(
        instance: &wgpu::Instance,
        power: GpuPowerPreference,
        allow_software: bool,
        compatible_surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<Self, RenderError> {
        let request = |force_fallback_adapter| {
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: power.to_wgpu(),
                compatible_surface,
                force_fallback_adapter,
            }))
        };
        let adapter = match request(false) {
            Ok(adapter) => adapter,
            Err(err) if allow_software => {
                tracing::warn!(%err, "no hardware adapter; trying software fallback");
                request(true).map_err(|err| RenderError::NoAdapter(err.to_string()))?
            }
            Err(err) => return Err(RenderError::NoAdapter(err.to_string())),
        };

        let info = adapter.get_info();
        let limits = adapter.limits();
        tracing::debug!(
            name = %info.name,
            backend = ?info.backend,
            device_type = ?info.device_type,
            max_texture_dimension = limits.max_texture_dimension_2d,
            "selected GPU adapter"
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("postpro device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits.clone(),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))?;

        Ok(Self {
            adapter,
            device,
            queue,
            max_texture_dimension: limits.max_texture_dimension_2d,
        })
    }
}
