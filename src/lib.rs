//! # zenfield
//!
//! Touch-driven 2D particle fields, stepped on the GPU when one is around.
//!
//! Fingers (or the mouse) place force sources on a canvas. Each source emits
//! particles and pushes every live particle around according to its
//! [`Behavior`]. The simulation owns a fixed pool of particle slots, a bounded
//! registry of sources and a step backend; a renderer reads immutable
//! snapshots once per frame.
//!
//! ## Quick Start
//!
//! ```ignore
//! use zenfield::prelude::*;
//!
//! let mut sim = ParticleSimulation::new(SimulationConfig::default());
//!
//! // input thread: one batch per touch event
//! sim.handle_touches(&[TouchPoint::new(0, Vec2::new(200.0, 300.0))]);
//!
//! // once per displayed frame
//! sim.tick();
//! for p in sim.live_particles() {
//!     // draw p.position, p.size, p.color
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Sources
//!
//! A [`Source`] has a position, color, strength, radius and behavior. At most
//! [`MAX_SOURCES`] exist at once; adding one more evicts the oldest.
//!
//! | Behavior | Effect |
//! |----------|--------|
//! | `Gravity` | constant pull along the gravity direction, ignores distance |
//! | `Repulsion` | pushes away, strongest close up, zero beyond `radius` |
//! | `Attraction` | pulls in, same falloff as repulsion |
//! | `Turbulence` | swirling pseudo-noise driven by the source age |
//!
//! ### Particles
//!
//! The pool has a fixed number of slots. A spawn takes a dead slot or is
//! dropped when none is free; the live count never exceeds the capacity.
//! Each step integrates velocity, applies friction, clamps speed, moves,
//! resolves the canvas boundary and burns lifetime.
//!
//! ### Touches
//!
//! The [`InputAdapter`] maps touch batches to sources: new touches create a
//! source and spawn a particle, moving touches drag their source, and lifted
//! touches drop theirs. See [`Correlation`] for how touches are matched
//! across batches.
//!
//! ## Backends
//!
//! [`ParticleSimulation::new`] probes for a GPU once and caches the answer.
//! Without one, or after a device error, the same step runs on the CPU.
//! [`ParticleSimulation::backend_kind`] reports which one is active.

pub mod adapter;
mod backend;
pub mod config;
pub mod error;
pub mod force;
pub mod gpu;
pub mod input;
pub mod particle;
pub mod pool;
mod simulation;
pub mod source;
pub mod time;

pub use adapter::{InputAdapter, SourceTemplate, SpawnRequest, TouchPoint, NEON_PALETTE};
pub use backend::BackendKind;
pub use config::{Boundary, Canvas, ComputePreference, Correlation, SimulationConfig, StepParams};
pub use error::{ConfigError, GpuError};
pub use force::{Behavior, ForceEnv};
pub use glam::{Vec2, Vec3};
pub use input::{TouchSignal, TouchTracker};
pub use particle::{Particle, ParticleSnapshot};
pub use pool::{LiveParticles, ParticlePool, SpawnSettings};
pub use simulation::{ParticleSimulation, REMOVE_THRESHOLD};
pub use source::{Source, SourceRegistry, SourceSnapshot, MAX_SOURCES};
pub use time::FrameClock;

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use zenfield::prelude::*;
/// ```
pub mod prelude {
    pub use crate::adapter::TouchPoint;
    pub use crate::backend::BackendKind;
    pub use crate::config::{Boundary, Correlation, SimulationConfig};
    pub use crate::force::Behavior;
    pub use crate::input::{TouchSignal, TouchTracker};
    pub use crate::particle::ParticleSnapshot;
    pub use crate::simulation::ParticleSimulation;
    pub use crate::source::Source;
    pub use crate::time::FrameClock;
    pub use crate::{Vec2, Vec3};
}
