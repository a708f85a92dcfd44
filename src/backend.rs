//! Step backend selection.
//!
//! The simulation steps either on the GPU through [`GpuStepper`] or on the CPU
//! through [`ParticlePool::step`]. Both read the same pool and the same source
//! snapshot and produce behaviorally consistent motion. GPU absence is not an
//! error: the capability probe runs once at startup, and a device failure
//! later on drops the simulation to the CPU for good.

use crate::config::{ComputePreference, StepParams};
use crate::gpu::{self, GpuContext, GpuStepper};
use crate::pool::ParticlePool;
use crate::source::Source;

/// Which implementation is stepping the particles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Cpu,
    Gpu,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Cpu => write!(f, "CPU"),
            BackendKind::Gpu => write!(f, "GPU"),
        }
    }
}

#[derive(Debug)]
pub(crate) enum StepBackend {
    Cpu,
    Gpu(Box<GpuStepper>),
}

impl StepBackend {
    /// Pick a backend for a pool of `capacity` slots.
    pub fn select(preference: ComputePreference, capacity: usize) -> Self {
        if preference == ComputePreference::CpuOnly {
            log::info!("stepping particles on the CPU (requested)");
            return StepBackend::Cpu;
        }
        if !gpu::acceleration_available() {
            return StepBackend::Cpu;
        }

        match GpuContext::new_headless().and_then(|ctx| GpuStepper::new(ctx, capacity)) {
            Ok(stepper) => {
                log::info!("stepping particles on {}", stepper.adapter_name());
                StepBackend::Gpu(Box::new(stepper))
            }
            Err(e) => {
                log::warn!("GPU compute unavailable ({e}), stepping particles on the CPU");
                StepBackend::Cpu
            }
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            StepBackend::Cpu => BackendKind::Cpu,
            StepBackend::Gpu(_) => BackendKind::Gpu,
        }
    }

    pub fn step(&mut self, pool: &mut ParticlePool, sources: &[Source], params: &StepParams) {
        let failure = match self {
            StepBackend::Cpu => {
                pool.step(sources, params);
                return;
            }
            StepBackend::Gpu(stepper) => match stepper.step(pool, sources, params) {
                Ok(()) => return,
                Err(e) => e,
            },
        };

        // The pool was not overwritten, so it still holds the pre-step state.
        log::warn!("GPU step failed ({failure}), switching to the CPU");
        *self = StepBackend::Cpu;
        pool.step(sources, params);
    }
}
