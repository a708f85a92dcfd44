//! Force sources and the bounded registry that owns them.
//!
//! The registry is array-backed: indices are only stable between mutations.
//! Any `add` (which may evict the oldest entry) or removal can renumber the
//! entries that follow it. Callers correlating entries with something
//! external (touches, UI handles) should compare [`SourceRegistry::generation`]
//! before trusting a previously returned index.
//!
//! The simulation step never reads the registry directly. It is handed a
//! [`SourceSnapshot`], an immutable copy that is rebuilt only after the
//! registry changes.

use std::ops::Deref;
use std::sync::Arc;

use glam::{Vec2, Vec3};

use crate::force::Behavior;

/// Maximum number of concurrent sources.
pub const MAX_SOURCES: usize = 10;

/// Default strength of a new source.
pub const DEFAULT_STRENGTH: f32 = 100.0;

/// Default influence radius of a new source, in canvas units.
pub const DEFAULT_RADIUS: f32 = 200.0;

/// A positioned force emitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Source {
    pub position: Vec2,
    /// RGB color (0.0-1.0) given to particles spawned from this source.
    pub color: Vec3,
    pub strength: f32,
    pub radius: f32,
    pub behavior: Behavior,
    /// Seconds since the source was added. Drives the turbulence phase.
    pub age: f32,
    /// Per-source phase seed, assigned by the registry.
    pub seed: u32,
}

impl Source {
    /// Create a source with default strength and radius.
    pub fn new(position: Vec2, color: Vec3, behavior: Behavior) -> Self {
        Self {
            position,
            color,
            strength: DEFAULT_STRENGTH,
            radius: DEFAULT_RADIUS,
            behavior,
            age: 0.0,
            seed: 0,
        }
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength;
        self
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius.max(0.0);
        self
    }
}

/// Immutable view of the registry taken at one point in time.
///
/// Cheap to clone; every clone shares the same backing slice.
#[derive(Debug, Clone)]
pub struct SourceSnapshot(Arc<[Source]>);

impl SourceSnapshot {
    pub fn empty() -> Self {
        Self(Arc::from(Vec::new()))
    }
}

impl Deref for SourceSnapshot {
    type Target = [Source];

    fn deref(&self) -> &[Source] {
        &self.0
    }
}

/// Bounded, ordered list of active sources with FIFO eviction.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: Vec<Source>,
    /// Bumped on every change that can renumber entries.
    generation: u64,
    /// Seed handed to the next added source.
    next_seed: u32,
    snapshot: Option<SourceSnapshot>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::with_capacity(MAX_SOURCES),
            ..Default::default()
        }
    }

    /// Append a source and return its index.
    ///
    /// When the registry already holds [`MAX_SOURCES`] entries the oldest one
    /// (index 0) is evicted first, shifting every other entry down by one.
    pub fn add(&mut self, mut source: Source) -> usize {
        if self.sources.len() >= MAX_SOURCES {
            let evicted = self.sources.remove(0);
            log::debug!(
                "source registry full, evicted oldest source at ({:.1}, {:.1})",
                evicted.position.x,
                evicted.position.y
            );
        }

        source.seed = self.next_seed;
        self.next_seed = self.next_seed.wrapping_add(1);
        self.sources.push(source);
        self.touch_structure();
        self.sources.len() - 1
    }

    /// Move the source at `index`. Returns false if `index` is out of range.
    pub fn update(&mut self, index: usize, position: Vec2) -> bool {
        match self.sources.get_mut(index) {
            Some(source) => {
                source.position = position;
                self.snapshot = None;
                true
            }
            None => false,
        }
    }

    /// Recolor the source at `index`. Returns false if `index` is out of range.
    pub fn set_color(&mut self, index: usize, color: Vec3) -> bool {
        match self.sources.get_mut(index) {
            Some(source) => {
                source.color = color;
                self.snapshot = None;
                true
            }
            None => false,
        }
    }

    /// Remove every source strictly closer than `threshold` to `position`.
    ///
    /// Returns the number of removed sources.
    pub fn remove_near(&mut self, position: Vec2, threshold: f32) -> usize {
        let before = self.sources.len();
        self.sources
            .retain(|source| source.position.distance(position) >= threshold);
        let removed = before - self.sources.len();
        if removed > 0 {
            self.touch_structure();
        }
        removed
    }

    /// Remove and return the source at `index`.
    pub fn remove_at(&mut self, index: usize) -> Option<Source> {
        if index >= self.sources.len() {
            return None;
        }
        let source = self.sources.remove(index);
        self.touch_structure();
        Some(source)
    }

    /// Drop entries from the end until at most `len` remain.
    pub fn truncate(&mut self, len: usize) {
        if len < self.sources.len() {
            self.sources.truncate(len);
            self.touch_structure();
        }
    }

    pub fn clear(&mut self) {
        if !self.sources.is_empty() {
            self.sources.clear();
            self.touch_structure();
        }
    }

    /// Rewrite the behavior of every source.
    pub fn set_behavior_all(&mut self, behavior: Behavior) {
        for source in &mut self.sources {
            source.behavior = behavior;
        }
        self.snapshot = None;
    }

    /// Advance every source's age by `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        if self.sources.is_empty() {
            return;
        }
        for source in &mut self.sources {
            source.age += dt;
        }
        self.snapshot = None;
    }

    /// Immutable copy of the current entries.
    ///
    /// Repeated calls without an intervening mutation return the same
    /// shared snapshot.
    pub fn snapshot(&mut self) -> SourceSnapshot {
        self.snapshot
            .get_or_insert_with(|| SourceSnapshot(Arc::from(self.sources.as_slice())))
            .clone()
    }

    pub fn get(&self, index: usize) -> Option<&Source> {
        self.sources.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter()
    }

    pub fn as_slice(&self) -> &[Source] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Counter bumped whenever entries may have been renumbered.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn touch_structure(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.snapshot = None;
    }
}
