//! GPU compute path.
//!
//! The step runs as a single compute dispatch over every pool slot. Nothing
//! here needs a window: the device is requested headless, so the same path
//! serves the demo binary, tests and benches.
//!
//! Whether a usable adapter exists is probed once per process and cached;
//! [`acceleration_available`] is cheap to call afterwards.

mod compute;
pub mod shader;

use std::sync::OnceLock;

pub use compute::GpuStepper;

use crate::error::GpuError;

static ACCELERATION: OnceLock<bool> = OnceLock::new();

/// Whether a compute-capable adapter exists. Probed on first call only.
pub fn acceleration_available() -> bool {
    *ACCELERATION.get_or_init(|| {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&adapter_options()));
        match adapter {
            Some(adapter) => {
                let info = adapter.get_info();
                log::info!("compute adapter: {} ({:?})", info.name, info.backend);
                true
            }
            None => {
                log::info!("no compute adapter, particles will step on the CPU");
                false
            }
        }
    })
}

fn adapter_options() -> wgpu::RequestAdapterOptions<'static, 'static> {
    wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }
}

/// Headless device and queue.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: wgpu::AdapterInfo,
}

impl GpuContext {
    /// Request an adapter and device without a surface.
    pub fn new_headless() -> Result<Self, GpuError> {
        pollster::block_on(Self::request())
    }

    async fn request() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&adapter_options())
            .await
            .ok_or(GpuError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Particle Compute Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        // Errors are collected through error scopes instead.
        device.on_uncaptured_error(Box::new(|error| {
            log::error!("uncaptured GPU error: {error}");
        }));

        Ok(Self {
            device,
            queue,
            adapter_info: adapter.get_info(),
        })
    }
}

impl std::fmt::Debug for GpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuContext")
            .field("adapter", &self.adapter_info.name)
            .field("backend", &self.adapter_info.backend)
            .finish()
    }
}
