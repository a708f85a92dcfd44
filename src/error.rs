//! Error types for zenfield.
//!
//! Nothing in the per-frame path (input, spawn, step) returns these: the core
//! degrades instead. They surface only where a caller can act on them, such
//! as probing for a compute device or loading a configuration file.

use thiserror::Error;

/// Errors raised while bringing up or driving the GPU compute path.
#[derive(Debug, Error)]
pub enum GpuError {
    /// No compatible adapter was found.
    #[error("no compatible GPU adapter found")]
    NoAdapter,

    /// The adapter refused to create a device.
    #[error("failed to create GPU device: {0}")]
    DeviceCreation(#[from] wgpu::RequestDeviceError),

    /// The window surface could not be created.
    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    /// Shader or pipeline creation failed validation.
    #[error("failed to build compute pipeline: {0}")]
    Pipeline(String),

    /// The readback staging buffer could not be mapped.
    #[error("failed to map GPU buffer: {0}")]
    BufferMapping(String),
}

/// Errors raised while loading or validating a [`SimulationConfig`](crate::SimulationConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f32,
        max: f32,
        value: f32,
    },
}
