//! Simulation configuration.
//!
//! [`SimulationConfig`] holds everything that can be tuned, either from code
//! with the `with_*` builders or from a TOML file:
//!
//! ```toml
//! max_particles = 2048
//! gravity = 0.8
//! friction = 0.97
//! behavior = "turbulence"
//! correlation = "stable_id"
//!
//! [canvas]
//! width = 1280.0
//! height = 720.0
//! ```
//!
//! Missing keys fall back to [`SimulationConfig::default`]. Gravity and
//! friction are live settings and can also be changed at runtime through
//! [`ParticleSimulation`](crate::ParticleSimulation); changes take effect on
//! the next step.

use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::force::{Behavior, ForceEnv};
use crate::source::{DEFAULT_RADIUS, DEFAULT_STRENGTH};

/// Allowed range for the global gravity scalar.
pub const GRAVITY_RANGE: RangeInclusive<f32> = -1.0..=2.0;

/// Allowed range for the per-frame friction multiplier.
pub const FRICTION_RANGE: RangeInclusive<f32> = 0.9..=1.0;

/// What happens to particles that reach the canvas edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    /// Reflect off the edge, losing energy per `restitution`.
    #[default]
    Bounce,
    /// Leave one edge, enter at the opposite one.
    Wrap,
    /// No boundary; particles may drift off-canvas until they expire.
    Open,
}

impl Boundary {
    pub fn id(self) -> u32 {
        match self {
            Boundary::Bounce => 0,
            Boundary::Wrap => 1,
            Boundary::Open => 2,
        }
    }
}

/// How touches are matched to registry entries across input batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Correlation {
    /// Touch `i` of a batch drives registry entry `i`.
    #[default]
    Positional,
    /// Each touch id owns the source it created for as long as it is down.
    StableId,
}

/// Which step implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputePreference {
    /// Use the GPU when an adapter is available, otherwise the CPU.
    #[default]
    Auto,
    /// Never touch the GPU.
    CpuOnly,
}

/// Canvas extent in rendering coordinates. Origin top-left, +y down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: f32,
    pub height: f32,
}

impl Canvas {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    /// Clamp a point into `[0, width] x [0, height]`.
    pub fn clamp(&self, point: Vec2) -> Vec2 {
        point.clamp(Vec2::ZERO, self.size())
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new(1000.0, 1000.0)
    }
}

/// Full simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Fixed number of particle slots.
    pub max_particles: u32,
    /// Global gravity scalar.
    pub gravity: f32,
    /// Direction gravity pulls toward (normalized on use).
    pub gravity_direction: Vec2,
    /// Velocity multiplier applied once per step.
    pub friction: f32,
    /// Behavior given to new sources.
    pub behavior: Behavior,
    pub canvas: Canvas,

    /// Lifetime of a freshly spawned particle, in seconds.
    pub particle_lifetime: f32,
    pub particle_size: f32,
    /// Maximum distance of a spawn from its source.
    pub spawn_jitter: f32,
    /// Velocity magnitude clamp applied every step.
    pub max_speed: f32,

    pub source_strength: f32,
    pub source_radius: f32,

    pub boundary: Boundary,
    /// Fraction of speed kept when bouncing off an edge.
    pub restitution: f32,

    /// Delta substituted when the clock reports a degenerate frame time.
    pub fallback_dt: f32,
    /// Frame times above this are treated as a stalled clock.
    pub max_dt: f32,

    pub correlation: Correlation,
    /// Whether lifting every finger also clears the registry.
    pub clear_sources_on_release: bool,
    pub compute: ComputePreference,
    /// Seed for spawn jitter and initial velocities.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_particles: 1024,
            gravity: 0.5,
            gravity_direction: Vec2::Y,
            friction: 0.98,
            behavior: Behavior::Gravity,
            canvas: Canvas::default(),
            particle_lifetime: 5.0,
            particle_size: 10.0,
            spawn_jitter: 4.0,
            max_speed: 600.0,
            source_strength: DEFAULT_STRENGTH,
            source_radius: DEFAULT_RADIUS,
            boundary: Boundary::Bounce,
            restitution: 0.8,
            fallback_dt: 0.016,
            max_dt: 0.25,
            correlation: Correlation::Positional,
            clear_sources_on_release: false,
            compute: ComputePreference::Auto,
            seed: 0x5EED,
        }
    }
}

impl SimulationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Check that every tunable is within its supported range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check("gravity", self.gravity, GRAVITY_RANGE)?;
        check("friction", self.friction, FRICTION_RANGE)?;
        check("restitution", self.restitution, 0.0..=1.0)?;
        check("max_particles", self.max_particles as f32, 1.0..=1_048_576.0)?;
        check("particle_lifetime", self.particle_lifetime, f32::MIN_POSITIVE..=3600.0)?;
        check("max_speed", self.max_speed, f32::MIN_POSITIVE..=f32::MAX)?;
        check("fallback_dt", self.fallback_dt, f32::MIN_POSITIVE..=1.0)?;
        check("max_dt", self.max_dt, self.fallback_dt..=10.0)?;
        check("particle_size", self.particle_size, f32::MIN_POSITIVE..=f32::MAX)?;
        check("spawn_jitter", self.spawn_jitter, 0.0..=f32::MAX)?;
        check("source_strength", self.source_strength, f32::MIN..=f32::MAX)?;
        check("source_radius", self.source_radius, 0.0..=f32::MAX)?;
        check("canvas.width", self.canvas.width, 0.0..=f32::MAX)?;
        check("canvas.height", self.canvas.height, 0.0..=f32::MAX)?;
        Ok(())
    }

    pub fn with_max_particles(mut self, count: u32) -> Self {
        self.max_particles = count.max(1);
        self
    }

    /// Set gravity, clamped to [`GRAVITY_RANGE`].
    pub fn with_gravity(mut self, gravity: f32) -> Self {
        self.gravity = clamp_to(gravity, GRAVITY_RANGE);
        self
    }

    /// Set friction, clamped to [`FRICTION_RANGE`].
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = clamp_to(friction, FRICTION_RANGE);
        self
    }

    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_canvas(mut self, width: f32, height: f32) -> Self {
        self.canvas = Canvas::new(width, height);
        self
    }

    pub fn with_particle_lifetime(mut self, seconds: f32) -> Self {
        self.particle_lifetime = seconds;
        self
    }

    pub fn with_max_speed(mut self, max_speed: f32) -> Self {
        self.max_speed = max_speed;
        self
    }

    pub fn with_boundary(mut self, boundary: Boundary) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn with_correlation(mut self, correlation: Correlation) -> Self {
        self.correlation = correlation;
        self
    }

    pub fn with_compute(mut self, compute: ComputePreference) -> Self {
        self.compute = compute;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_clear_sources_on_release(mut self, clear: bool) -> Self {
        self.clear_sources_on_release = clear;
        self
    }

    /// Parameters for one step with the given (already sanitized) delta.
    pub fn step_params(&self, dt: f32, source_count: usize) -> StepParams {
        StepParams {
            dt,
            env: ForceEnv {
                gravity: self.gravity,
                gravity_direction: self.gravity_direction.normalize_or_zero(),
            },
            friction: self.friction,
            max_speed: self.max_speed,
            canvas: self.canvas,
            boundary: self.boundary,
            restitution: self.restitution,
            source_count: source_count as u32,
        }
    }
}

/// Everything one step needs besides the particles and sources.
///
/// Rebuilt from live state for every step and never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepParams {
    pub dt: f32,
    pub env: ForceEnv,
    pub friction: f32,
    pub max_speed: f32,
    pub canvas: Canvas,
    pub boundary: Boundary,
    pub restitution: f32,
    pub source_count: u32,
}

impl Default for StepParams {
    fn default() -> Self {
        SimulationConfig::default().step_params(0.016, 0)
    }
}

pub(crate) fn clamp_to(value: f32, range: RangeInclusive<f32>) -> f32 {
    if value.is_nan() {
        return *range.start();
    }
    value.clamp(*range.start(), *range.end())
}

fn check(field: &'static str, value: f32, range: RangeInclusive<f32>) -> Result<(), ConfigError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            min: *range.start(),
            max: *range.end(),
            value,
        })
    }
}
