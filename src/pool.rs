//! Fixed-capacity particle pool.
//!
//! The pool owns every particle slot for the life of the simulation. Slots
//! never move; a particle "dies" when its lifetime reaches zero and the slot
//! becomes free for the next spawn. Capacity is fixed at construction, so
//! spawning never allocates.
//!
//! The pool is also the authoritative copy of particle state. When stepping
//! on the GPU, the pool records which slots changed on the CPU side
//! (spawns, clears) so the backend can upload just those before dispatch,
//! then receives the stepped slots back via readback.
//!
//! # Step order
//!
//! For each live particle, with `dt` already sanitized:
//!
//! 1. `velocity += acceleration * dt` (sum over all sources)
//! 2. `velocity *= friction`
//! 3. clamp speed to `max_speed`
//! 4. `position += velocity * dt`
//! 5. apply the canvas boundary
//! 6. `lifetime -= dt`, floored at zero

use std::f32::consts::TAU;

use glam::Vec2;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::{Boundary, Canvas, SimulationConfig, StepParams};
use crate::force::{self, Behavior};
use crate::particle::{Particle, ParticleSnapshot};
use crate::source::Source;

/// Per-spawn settings that do not come from the source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnSettings {
    /// Initial lifetime in seconds.
    pub lifetime: f32,
    pub size: f32,
    /// Maximum spawn distance from the source position.
    pub jitter: f32,
}

impl Default for SpawnSettings {
    fn default() -> Self {
        SimulationConfig::default().spawn_settings()
    }
}

impl SimulationConfig {
    pub fn spawn_settings(&self) -> SpawnSettings {
        SpawnSettings {
            lifetime: self.particle_lifetime,
            size: self.particle_size,
            jitter: self.spawn_jitter,
        }
    }
}

/// Slots written on the CPU since the last upload.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct PendingUploads {
    /// Every slot must be re-uploaded.
    pub full: bool,
    /// Individual slots, in write order. Ignored when `full` is set.
    pub slots: Vec<usize>,
}

impl PendingUploads {
    pub fn is_empty(&self) -> bool {
        !self.full && self.slots.is_empty()
    }
}

/// Fixed array of particle slots plus a spawn cursor.
#[derive(Debug)]
pub struct ParticlePool {
    slots: Vec<Particle>,
    /// Next slot to try when spawning.
    cursor: usize,
    live: usize,
    rng: SmallRng,
    dirty: Vec<usize>,
    full_upload: bool,
}

impl ParticlePool {
    /// Create a pool with `capacity` dead slots.
    pub fn new(capacity: usize, seed: u64) -> Self {
        Self {
            slots: vec![Particle::dead(); capacity],
            cursor: 0,
            live: 0,
            rng: SmallRng::seed_from_u64(seed),
            dirty: Vec::new(),
            full_upload: true,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live particles.
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Initialize one free slot from `source`.
    ///
    /// Returns the slot index, or `None` when every slot is alive. A full pool
    /// drops the request; it never overwrites a live particle.
    pub fn spawn(
        &mut self,
        source: &Source,
        source_index: u32,
        settings: &SpawnSettings,
    ) -> Option<usize> {
        if settings.lifetime <= 0.0 {
            return None;
        }
        let Some(index) = self.find_free() else {
            log::trace!("particle pool full, dropping spawn");
            return None;
        };

        let dir = self.random_dir();
        let offset = if settings.jitter > 0.0 && settings.jitter.is_finite() {
            dir * self.rng.gen_range(0.0..settings.jitter)
        } else {
            Vec2::ZERO
        };
        let velocity = self.initial_velocity(source.behavior, dir);

        self.slots[index] = Particle {
            position: source.position + offset,
            velocity,
            color: source.color,
            size: settings.size,
            lifetime: settings.lifetime,
            source_index,
            _pad: [0; 2],
        };
        self.live += 1;
        self.cursor = (index + 1) % self.slots.len();
        if !self.full_upload {
            self.dirty.push(index);
        }
        Some(index)
    }

    fn find_free(&self) -> Option<usize> {
        let len = self.slots.len();
        if self.live >= len {
            return None;
        }
        (0..len)
            .map(|i| (self.cursor + i) % len)
            .find(|&i| !self.slots[i].is_alive())
    }

    /// Starting velocity for a new particle, `dir` being its jitter direction.
    fn initial_velocity(&mut self, behavior: Behavior, dir: Vec2) -> Vec2 {
        match behavior {
            Behavior::Gravity => self.random_dir() * self.speed(20.0, 80.0),
            Behavior::Repulsion => dir * self.speed(40.0, 120.0),
            Behavior::Attraction => dir.perp() * self.speed(20.0, 60.0),
            Behavior::Turbulence => self.random_dir() * self.speed(10.0, 50.0),
        }
    }

    fn random_dir(&mut self) -> Vec2 {
        Vec2::from_angle(self.rng.gen_range(0.0..TAU))
    }

    fn speed(&mut self, min: f32, max: f32) -> f32 {
        self.rng.gen_range(min..max)
    }

    /// Advance every live particle by `params.dt` on the CPU.
    ///
    /// Only the first `params.source_count` entries of `sources` are read.
    pub fn step(&mut self, sources: &[Source], params: &StepParams) {
        let sources = &sources[..(params.source_count as usize).min(sources.len())];
        let mut live = 0;
        for particle in self.slots.iter_mut().filter(|p| p.is_alive()) {
            step_particle(particle, sources, params);
            if particle.is_alive() {
                live += 1;
            }
        }
        self.live = live;
        // The device copy is now stale.
        self.full_upload = true;
        self.dirty.clear();
    }

    /// Lazily iterate over live particles.
    pub fn live_particles(&self) -> LiveParticles<'_> {
        LiveParticles {
            inner: self.slots.iter(),
        }
    }

    /// Kill every particle.
    pub fn clear(&mut self) {
        self.slots.fill(Particle::dead());
        self.live = 0;
        self.cursor = 0;
        self.full_upload = true;
        self.dirty.clear();
    }

    pub(crate) fn slots(&self) -> &[Particle] {
        &self.slots
    }

    /// Drain the set of slots written since the last call.
    pub(crate) fn take_uploads(&mut self) -> PendingUploads {
        let pending = PendingUploads {
            full: self.full_upload,
            slots: std::mem::take(&mut self.dirty),
        };
        self.full_upload = false;
        pending
    }

    /// Replace every slot with stepped state read back from the device.
    pub(crate) fn overwrite(&mut self, stepped: &[Particle]) {
        let n = stepped.len().min(self.slots.len());
        self.slots[..n].copy_from_slice(&stepped[..n]);
        self.live = self.slots.iter().filter(|p| p.is_alive()).count();
        // Anything written before readback was already uploaded.
        self.dirty.clear();
    }
}

/// One step of the particle integrator.
pub(crate) fn step_particle(particle: &mut Particle, sources: &[Source], params: &StepParams) {
    let dt = params.dt;
    let accel = force::total_acceleration(sources, particle.position, &params.env);

    let mut velocity = (particle.velocity + accel * dt) * params.friction;
    velocity = velocity.clamp_length_max(params.max_speed);
    let mut position = particle.position + velocity * dt;

    apply_boundary(
        &mut position,
        &mut velocity,
        &params.canvas,
        params.boundary,
        params.restitution,
    );

    particle.position = position;
    particle.velocity = velocity;
    particle.lifetime = (particle.lifetime - dt).max(0.0);
}

fn apply_boundary(
    position: &mut Vec2,
    velocity: &mut Vec2,
    canvas: &Canvas,
    boundary: Boundary,
    restitution: f32,
) {
    let size = canvas.size();
    match boundary {
        Boundary::Bounce => {
            for axis in 0..2 {
                if position[axis] < 0.0 {
                    position[axis] = 0.0;
                    velocity[axis] = velocity[axis].abs() * restitution;
                } else if position[axis] > size[axis] {
                    position[axis] = size[axis];
                    velocity[axis] = -velocity[axis].abs() * restitution;
                }
            }
        }
        Boundary::Wrap => {
            for axis in 0..2 {
                if size[axis] > 0.0 {
                    position[axis] = position[axis].rem_euclid(size[axis]);
                }
            }
        }
        Boundary::Open => {}
    }
}

/// Iterator over live particles, returned by [`ParticlePool::live_particles`].
#[derive(Debug, Clone)]
pub struct LiveParticles<'a> {
    inner: std::slice::Iter<'a, Particle>,
}

impl Iterator for LiveParticles<'_> {
    type Item = ParticleSnapshot;

    fn next(&mut self) -> Option<ParticleSnapshot> {
        self.inner
            .by_ref()
            .find(|p| p.is_alive())
            .map(Particle::snapshot)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.inner.size_hint().1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn source(behavior: Behavior) -> Source {
        Source::new(Vec2::new(500.0, 500.0), Vec3::new(1.0, 0.0, 0.27), behavior)
    }

    fn still_params() -> StepParams {
        let mut params = StepParams::default();
        params.env.gravity = 0.0;
        params
    }

    #[test]
    fn test_spawn_ignores_non_finite_jitter() {
        let mut pool = ParticlePool::new(4, 1);
        let settings = SpawnSettings {
            jitter: f32::INFINITY,
            ..SpawnSettings::default()
        };
        let index = pool.spawn(&source(Behavior::Gravity), 0, &settings).unwrap();
        assert_eq!(pool.slots()[index].position, Vec2::new(500.0, 500.0));
    }

    #[test]
    fn test_spawn_initializes_slot() {
        let mut pool = ParticlePool::new(16, 1);
        let settings = SpawnSettings::default();
        let index = pool.spawn(&source(Behavior::Repulsion), 3, &settings).unwrap();

        let p = pool.slots()[index];
        assert!(p.is_alive());
        assert_eq!(p.lifetime, settings.lifetime);
        assert_eq!(p.source_index, 3);
        assert_eq!(p.color, Vec3::new(1.0, 0.0, 0.27));
        assert!(p.position.distance(Vec2::new(500.0, 500.0)) <= settings.jitter);
        assert_eq!(pool.live_count(), 1);
    }

    #[test]
    fn test_spawn_never_exceeds_capacity() {
        let mut pool = ParticlePool::new(1024, 7);
        let s = source(Behavior::Gravity);
        let settings = SpawnSettings::default();
        let spawned = (0..2000)
            .filter(|_| pool.spawn(&s, 0, &settings).is_some())
            .count();

        assert_eq!(spawned, 1024);
        assert_eq!(pool.live_count(), 1024);
        assert_eq!(pool.live_particles().count(), 1024);
    }

    #[test]
    fn test_spawn_reuses_dead_slots() {
        let mut pool = ParticlePool::new(4, 1);
        let s = source(Behavior::Gravity);
        let settings = SpawnSettings {
            lifetime: 0.01,
            ..SpawnSettings::default()
        };
        for _ in 0..4 {
            pool.spawn(&s, 0, &settings).unwrap();
        }
        assert!(pool.spawn(&s, 0, &settings).is_none());

        pool.step(&[], &still_params());
        assert_eq!(pool.live_count(), 0);
        assert!(pool.spawn(&s, 0, &settings).is_some());
    }

    #[test]
    fn test_lifetime_monotonic() {
        let mut pool = ParticlePool::new(64, 3);
        let s = source(Behavior::Turbulence);
        let settings = SpawnSettings::default();
        for _ in 0..64 {
            pool.spawn(&s, 0, &settings);
        }

        let sources = [s];
        let mut params = StepParams::default();
        params.source_count = 1;
        let mut previous: Vec<f32> = pool.slots().iter().map(|p| p.lifetime).collect();
        for _ in 0..400 {
            pool.step(&sources, &params);
            for (p, before) in pool.slots().iter().zip(&previous) {
                assert!(p.lifetime <= *before);
                assert!(p.lifetime >= 0.0);
            }
            previous = pool.slots().iter().map(|p| p.lifetime).collect();
        }
        assert_eq!(pool.live_count(), 0);
    }

    #[test]
    fn test_speed_clamped() {
        let mut pool = ParticlePool::new(32, 5);
        let s = source(Behavior::Repulsion).with_strength(1.0e6);
        for _ in 0..32 {
            pool.spawn(&s, 0, &SpawnSettings::default());
        }

        let mut params = StepParams::default();
        params.source_count = 1;
        params.boundary = Boundary::Open;
        pool.step(&[s], &params);

        for p in pool.live_particles() {
            assert!(p.velocity.length() <= params.max_speed + 1e-2);
        }
    }

    #[test]
    fn test_no_forces_no_friction_drifts_linearly() {
        let mut pool = ParticlePool::new(1, 9);
        pool.spawn(&source(Behavior::Gravity), 0, &SpawnSettings::default());
        let before = pool.slots()[0];

        let mut params = still_params();
        params.friction = 1.0;
        pool.step(&[], &params);

        let after = pool.slots()[0];
        assert_eq!(after.velocity, before.velocity);
        let expected = before.position + before.velocity * params.dt;
        assert!(after.position.distance(expected) < 1e-4);
    }

    #[test]
    fn test_friction_slows_particles() {
        let mut pool = ParticlePool::new(8, 11);
        for _ in 0..8 {
            pool.spawn(&source(Behavior::Repulsion), 0, &SpawnSettings::default());
        }
        let params = still_params();

        let mut speeds: Vec<f32> = pool.live_particles().map(|p| p.velocity.length()).collect();
        for _ in 0..10 {
            pool.step(&[], &params);
            let now: Vec<f32> = pool.live_particles().map(|p| p.velocity.length()).collect();
            for (a, b) in now.iter().zip(&speeds) {
                assert!(a < b, "speed should strictly decrease: {a} >= {b}");
            }
            speeds = now;
        }
    }

    #[test]
    fn test_bounce_keeps_particles_on_canvas() {
        let mut pool = ParticlePool::new(1, 1);
        let corner = Source::new(Vec2::new(999.0, 999.0), Vec3::ONE, Behavior::Gravity);
        pool.spawn(&corner, 0, &SpawnSettings::default());

        let mut params = StepParams::default();
        params.source_count = 1;
        for _ in 0..100 {
            pool.step(&[corner], &params);
            for p in pool.live_particles() {
                assert!(p.position.x >= 0.0 && p.position.x <= 1000.0);
                assert!(p.position.y >= 0.0 && p.position.y <= 1000.0);
            }
        }
    }

    #[test]
    fn test_wrap_boundary() {
        let mut particle = Particle::dead();
        particle.lifetime = 1.0;
        particle.position = Vec2::new(995.0, 10.0);
        particle.velocity = Vec2::new(500.0, 0.0);

        let mut params = still_params();
        params.friction = 1.0;
        params.boundary = Boundary::Wrap;
        params.dt = 0.02;
        step_particle(&mut particle, &[], &params);

        assert!((particle.position.x - 5.0).abs() < 1e-3);
    }

    #[test]
    fn test_clear_kills_everything() {
        let mut pool = ParticlePool::new(32, 1);
        for _ in 0..10 {
            pool.spawn(&source(Behavior::Gravity), 0, &SpawnSettings::default());
        }
        pool.clear();
        assert_eq!(pool.live_count(), 0);
        assert_eq!(pool.live_particles().count(), 0);
        assert_eq!(pool.capacity(), 32);
    }

    #[test]
    fn test_uploads_track_spawns() {
        let mut pool = ParticlePool::new(8, 1);
        assert!(pool.take_uploads().full);

        let a = pool.spawn(&source(Behavior::Gravity), 0, &SpawnSettings::default()).unwrap();
        let b = pool.spawn(&source(Behavior::Gravity), 0, &SpawnSettings::default()).unwrap();
        let pending = pool.take_uploads();
        assert!(!pending.full);
        assert_eq!(pending.slots, vec![a, b]);
        assert!(pool.take_uploads().is_empty());
    }
}
