//! The owned simulation object.
//!
//! [`ParticleSimulation`] owns the particle pool, the source registry, the
//! input adapter and the step backend. Every mutation goes through its
//! methods, all of which take `&mut self`, so an input batch, a spawn and a
//! step can never overlap. Renderers get read-only views:
//! [`live_particles`](ParticleSimulation::live_particles) and
//! [`sources`](ParticleSimulation::sources).
//!
//! # Example
//!
//! ```ignore
//! use zenfield::prelude::*;
//!
//! let mut sim = ParticleSimulation::new(
//!     SimulationConfig::new()
//!         .with_canvas(1280.0, 720.0)
//!         .with_behavior(Behavior::Repulsion),
//! );
//!
//! sim.handle_touches(&[TouchPoint::new(0, Vec2::new(640.0, 360.0))]);
//! sim.step(1.0 / 60.0);
//!
//! for particle in sim.live_particles() {
//!     draw(particle.position, particle.size, particle.color);
//! }
//! ```

use glam::Vec2;

use crate::adapter::{palette_color, InputAdapter, SourceTemplate, SpawnRequest, TouchPoint};
use crate::backend::{BackendKind, StepBackend};
use crate::config::{clamp_to, Canvas, ComputePreference, SimulationConfig, FRICTION_RANGE, GRAVITY_RANGE};
use crate::force::Behavior;
use crate::input::TouchSignal;
use crate::pool::{LiveParticles, ParticlePool};
use crate::source::{Source, SourceRegistry, SourceSnapshot};
use crate::time::{sanitize_delta, FrameClock};

/// Default distance for [`ParticleSimulation::remove_sources_near`] gestures.
pub const REMOVE_THRESHOLD: f32 = 50.0;

/// Touch-driven 2D particle simulation.
#[derive(Debug)]
pub struct ParticleSimulation {
    config: SimulationConfig,
    pool: ParticlePool,
    registry: SourceRegistry,
    adapter: InputAdapter,
    backend: StepBackend,
    clock: FrameClock,
}

impl ParticleSimulation {
    /// Create a simulation, stepping on the GPU when one is available.
    ///
    /// Gravity and friction outside their supported ranges are clamped.
    pub fn new(config: SimulationConfig) -> Self {
        let backend = StepBackend::select(config.compute, config.max_particles as usize);
        Self::with_backend(config, backend)
    }

    /// Create a simulation that never touches the GPU.
    pub fn cpu_only(config: SimulationConfig) -> Self {
        Self::with_backend(config.with_compute(ComputePreference::CpuOnly), StepBackend::Cpu)
    }

    fn with_backend(mut config: SimulationConfig, backend: StepBackend) -> Self {
        config.gravity = clamp_to(config.gravity, GRAVITY_RANGE);
        config.friction = clamp_to(config.friction, FRICTION_RANGE);

        log::info!(
            "particle simulation: {} slots, {} backend, {:?} correlation",
            config.max_particles,
            backend.kind(),
            config.correlation
        );

        Self {
            pool: ParticlePool::new(config.max_particles as usize, config.seed),
            registry: SourceRegistry::new(),
            adapter: InputAdapter::new(config.correlation),
            clock: FrameClock::with_limits(config.fallback_dt, config.max_dt),
            backend,
            config,
        }
    }

    // ========== Input ==========

    /// Apply one batch of simultaneous touches in canvas coordinates.
    ///
    /// Returns the number of particles spawned for touches that just went down.
    pub fn handle_touches(&mut self, points: &[TouchPoint]) -> usize {
        let template = self.source_template();
        let requests =
            self.adapter
                .handle_touches(points, &self.config.canvas, &mut self.registry, &template);
        self.spawn_requests(&requests)
    }

    /// Every touch lifted or was cancelled.
    pub fn touches_ended(&mut self) {
        self.adapter
            .touches_ended(&mut self.registry, self.config.clear_sources_on_release);
    }

    /// Route a [`TouchSignal`] to [`handle_touches`](Self::handle_touches) or
    /// [`touches_ended`](Self::touches_ended).
    pub fn apply(&mut self, signal: TouchSignal) -> usize {
        match signal {
            TouchSignal::Batch(points) => self.handle_touches(&points),
            TouchSignal::Ended => {
                self.touches_ended();
                0
            }
        }
    }

    /// Place a source that no touch owns and spawn one particle from it.
    ///
    /// Returns the new registry index.
    pub fn add_source(&mut self, position: Vec2) -> usize {
        let template = self.source_template();
        let color = palette_color(self.registry.len());
        let position = self.config.canvas.clamp(position);
        let index = self.registry.add(
            Source::new(position, color, template.behavior)
                .with_strength(template.strength)
                .with_radius(template.radius),
        );
        self.spawn_from(index);
        index
    }

    /// Remove every source strictly closer than `threshold` to `position`.
    pub fn remove_sources_near(&mut self, position: Vec2, threshold: f32) -> usize {
        let removed = self.registry.remove_near(position, threshold);
        if removed > 0 {
            log::debug!("removed {removed} source(s) near ({:.0}, {:.0})", position.x, position.y);
        }
        removed
    }

    /// Spawn one particle from the source at `index`.
    ///
    /// Returns false if the index is out of range or the pool is full.
    pub fn spawn_from(&mut self, index: usize) -> bool {
        let Some(source) = self.registry.get(index).copied() else {
            return false;
        };
        let settings = self.config.spawn_settings();
        self.pool.spawn(&source, index as u32, &settings).is_some()
    }

    fn spawn_requests(&mut self, requests: &[SpawnRequest]) -> usize {
        let settings = self.config.spawn_settings();
        requests
            .iter()
            .filter(|req| self.pool.spawn(&req.source, req.source_index, &settings).is_some())
            .count()
    }

    fn source_template(&self) -> SourceTemplate {
        SourceTemplate {
            behavior: self.config.behavior,
            strength: self.config.source_strength,
            radius: self.config.source_radius,
        }
    }

    // ========== Stepping ==========

    /// Advance the simulation by `dt` seconds.
    ///
    /// Zero, negative, non-finite or stalled-clock deltas are replaced by the
    /// configured fallback. Every particle sees the same source snapshot and
    /// the same delta.
    pub fn step(&mut self, dt: f32) {
        let dt = {
            let sane = sanitize_delta(dt, self.config.fallback_dt, self.config.max_dt);
            if sane != dt {
                log::debug!("degenerate timestep {dt}, using {sane}");
            }
            sane
        };
        self.advance(dt);
    }

    /// Measure the frame time with the internal clock and step by it.
    ///
    /// The clock has already sanitized and scaled the delta, so it is used
    /// as is. Nothing moves while the clock is paused or its time scale is
    /// zero. Returns the delta used.
    pub fn tick(&mut self) -> f32 {
        let dt = self.clock.tick();
        if dt > 0.0 {
            self.advance(dt);
        }
        dt
    }

    fn advance(&mut self, dt: f32) {
        self.registry.advance(dt);
        let sources = self.registry.snapshot();
        let params = self.config.step_params(dt, sources.len());
        self.backend.step(&mut self.pool, &sources, &params);
    }

    // ========== Render views ==========

    /// Lazily iterate over live particles.
    pub fn live_particles(&self) -> LiveParticles<'_> {
        self.pool.live_particles()
    }

    pub fn live_count(&self) -> usize {
        self.pool.live_count()
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Active sources, for debug overlays.
    pub fn sources(&self) -> &[Source] {
        self.registry.as_slice()
    }

    /// Immutable copy of the active sources that can outlive this borrow.
    pub fn source_snapshot(&mut self) -> SourceSnapshot {
        self.registry.snapshot()
    }

    // ========== Settings ==========

    /// Kill every particle and remove every source.
    pub fn clear(&mut self) {
        self.pool.clear();
        self.adapter.touches_ended(&mut self.registry, true);
    }

    /// Set global gravity, clamped to -1.0..=2.0.
    pub fn set_gravity(&mut self, gravity: f32) {
        self.config.gravity = clamp_to(gravity, GRAVITY_RANGE);
    }

    pub fn gravity(&self) -> f32 {
        self.config.gravity
    }

    /// Set per-step friction, clamped to 0.9..=1.0.
    pub fn set_friction(&mut self, friction: f32) {
        self.config.friction = clamp_to(friction, FRICTION_RANGE);
    }

    pub fn friction(&self) -> f32 {
        self.config.friction
    }

    /// Behavior for new sources. Existing sources switch too.
    pub fn set_behavior(&mut self, behavior: Behavior) {
        self.config.behavior = behavior;
        self.registry.set_behavior_all(behavior);
    }

    pub fn behavior(&self) -> Behavior {
        self.config.behavior
    }

    pub fn set_canvas_size(&mut self, width: f32, height: f32) {
        self.config.canvas = Canvas::new(width, height);
    }

    pub fn canvas(&self) -> Canvas {
        self.config.canvas
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut FrameClock {
        &mut self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MAX_SOURCES;

    fn sim() -> ParticleSimulation {
        ParticleSimulation::cpu_only(SimulationConfig::default())
    }

    fn touch(id: u64, x: f32, y: f32) -> TouchPoint {
        TouchPoint::new(id, Vec2::new(x, y))
    }

    #[test]
    fn test_new_touch_spawns_particle() {
        let mut sim = sim();
        assert_eq!(sim.handle_touches(&[touch(0, 100.0, 100.0)]), 1);
        assert_eq!(sim.live_count(), 1);
        assert_eq!(sim.sources().len(), 1);

        // Moving spawns nothing.
        assert_eq!(sim.handle_touches(&[touch(0, 120.0, 100.0)]), 0);
        assert_eq!(sim.live_count(), 1);
    }

    #[test]
    fn test_clear_empties_everything() {
        let mut sim = sim();
        sim.handle_touches(&[touch(0, 100.0, 100.0), touch(1, 300.0, 300.0)]);
        sim.step(0.016);
        sim.clear();

        assert_eq!(sim.live_particles().count(), 0);
        assert!(sim.sources().is_empty());
    }

    #[test]
    fn test_setters_clamp() {
        let mut sim = sim();
        sim.set_gravity(9.0);
        sim.set_friction(0.1);
        assert_eq!(sim.gravity(), 2.0);
        assert_eq!(sim.friction(), 0.9);

        sim.set_gravity(-9.0);
        assert_eq!(sim.gravity(), -1.0);
    }

    #[test]
    fn test_set_behavior_rewrites_sources() {
        let mut sim = sim();
        sim.add_source(Vec2::new(10.0, 10.0));
        sim.add_source(Vec2::new(20.0, 20.0));
        sim.set_behavior(Behavior::Attraction);

        assert!(sim.sources().iter().all(|s| s.behavior == Behavior::Attraction));
        assert_eq!(sim.behavior(), Behavior::Attraction);
    }

    #[test]
    fn test_step_ages_sources() {
        let mut sim = sim();
        sim.add_source(Vec2::new(10.0, 10.0));
        sim.step(0.02);
        sim.step(0.0);
        let age = sim.sources()[0].age;
        assert!((age - 0.036).abs() < 1e-6, "age = {age}");
    }

    #[test]
    fn test_degenerate_dt_still_advances() {
        let mut sim = sim();
        sim.handle_touches(&[touch(0, 500.0, 500.0)]);
        let before = sim.live_particles().next().unwrap().lifetime;

        sim.step(f32::NAN);
        let after = sim.live_particles().next().unwrap();
        assert!((before - after.lifetime - 0.016).abs() < 1e-6);
        assert!(after.position.is_finite());
    }

    #[test]
    fn test_remove_sources_near() {
        let mut sim = sim();
        sim.add_source(Vec2::new(100.0, 100.0));
        sim.add_source(Vec2::new(900.0, 900.0));
        assert_eq!(sim.remove_sources_near(Vec2::new(100.0, 140.0), REMOVE_THRESHOLD), 1);
        assert_eq!(sim.sources().len(), 1);
    }

    #[test]
    fn test_spawn_from_invalid_index() {
        let mut sim = sim();
        assert!(!sim.spawn_from(3));
        sim.add_source(Vec2::ZERO);
        assert!(sim.spawn_from(0));
        assert_eq!(sim.live_count(), 2);
    }

    #[test]
    fn test_registry_capped_through_simulation() {
        let mut sim = sim();
        for i in 0..25 {
            sim.add_source(Vec2::splat(i as f32));
        }
        assert_eq!(sim.sources().len(), MAX_SOURCES);
    }

    #[test]
    fn test_release_policy() {
        let mut keep = sim();
        keep.handle_touches(&[touch(0, 1.0, 1.0)]);
        keep.touches_ended();
        assert_eq!(keep.sources().len(), 1);

        let mut wipe = ParticleSimulation::cpu_only(
            SimulationConfig::default().with_clear_sources_on_release(true),
        );
        wipe.handle_touches(&[touch(0, 1.0, 1.0)]);
        wipe.apply(TouchSignal::Ended);
        assert!(wipe.sources().is_empty());
    }

    #[test]
    fn test_cpu_only_reports_backend() {
        assert_eq!(sim().backend_kind(), BackendKind::Cpu);
    }

    #[test]
    fn test_zero_time_scale_freezes() {
        let mut sim = sim();
        sim.handle_touches(&[touch(0, 500.0, 500.0)]);
        sim.clock_mut().set_time_scale(0.0);
        let before = sim.live_particles().next().unwrap().lifetime;

        assert_eq!(sim.tick(), 0.0);
        assert_eq!(sim.tick(), 0.0);
        assert_eq!(sim.live_particles().next().unwrap().lifetime, before);
        assert_eq!(sim.sources()[0].age, 0.0);
    }

    #[test]
    fn test_time_scale_speeds_up_past_max_dt() {
        let mut sim = sim();
        sim.handle_touches(&[touch(0, 500.0, 500.0)]);
        sim.clock_mut().set_fixed_delta(Some(0.1));
        sim.clock_mut().set_time_scale(4.0);
        let before = sim.live_particles().next().unwrap().lifetime;

        let dt = sim.tick();
        assert!((dt - 0.4).abs() < 1e-6);
        let after = sim.live_particles().next().unwrap().lifetime;
        assert!((before - after - 0.4).abs() < 1e-5);
    }

    #[test]
    fn test_paused_tick_does_not_step() {
        let mut sim = sim();
        sim.handle_touches(&[touch(0, 500.0, 500.0)]);
        sim.clock_mut().toggle_pause();
        let before = sim.live_particles().next().unwrap().lifetime;

        sim.tick();
        assert_eq!(sim.live_particles().next().unwrap().lifetime, before);
    }
}
