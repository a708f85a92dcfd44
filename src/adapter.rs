//! Input adapter: multi-touch batches to source lifecycle calls.
//!
//! The adapter receives one batch of canvas-space touch points per input
//! event and a payload-less "touches ended" signal. It creates, moves and
//! removes registry entries accordingly and reports which new sources should
//! emit a particle right away.
//!
//! Two correlation policies are available:
//!
//! - [`Correlation::Positional`]: touch `i` of a batch drives registry entry
//!   `i`. A shrinking batch drops trailing entries. When a middle finger
//!   lifts, the fingers after it take over their neighbour's source.
//! - [`Correlation::StableId`]: each touch id owns the source it created,
//!   tracked by the source's registry seed so the mapping survives any
//!   renumbering (evictions, manual removal) in between batches.

use std::collections::HashMap;

use glam::{Vec2, Vec3};

use crate::config::{Canvas, Correlation};
use crate::force::Behavior;
use crate::source::{Source, SourceRegistry, DEFAULT_RADIUS, DEFAULT_STRENGTH, MAX_SOURCES};

/// Colors given to touch sources, cycled by touch order.
pub const NEON_PALETTE: [Vec3; 8] = [
    Vec3::new(1.0, 0.0, 0.27),   // pink
    Vec3::new(1.0, 0.13, 1.0),   // purple
    Vec3::new(0.0, 1.0, 0.62),   // green
    Vec3::new(0.0, 0.48, 1.0),   // blue
    Vec3::new(1.0, 0.8, 0.0),    // yellow
    Vec3::new(1.0, 0.58, 0.0),   // orange
    Vec3::new(0.2, 0.68, 0.9),   // cyan
    Vec3::new(1.0, 0.0, 1.0),    // magenta
];

/// Palette color for the `n`th touch.
pub fn palette_color(n: usize) -> Vec3 {
    NEON_PALETTE[n % NEON_PALETTE.len()]
}

/// One touch as delivered by the input producer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    /// Platform touch id. Only read by [`Correlation::StableId`].
    pub id: u64,
    pub position: Vec2,
}

impl TouchPoint {
    pub fn new(id: u64, position: Vec2) -> Self {
        Self { id, position }
    }
}

/// Parameters copied into every source the adapter creates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceTemplate {
    pub behavior: Behavior,
    pub strength: f32,
    pub radius: f32,
}

impl Default for SourceTemplate {
    fn default() -> Self {
        Self {
            behavior: Behavior::default(),
            strength: DEFAULT_STRENGTH,
            radius: DEFAULT_RADIUS,
        }
    }
}

impl SourceTemplate {
    fn instantiate(&self, position: Vec2, color: Vec3) -> Source {
        Source::new(position, color, self.behavior)
            .with_strength(self.strength)
            .with_radius(self.radius)
    }
}

/// A particle to spawn on behalf of a touch.
///
/// Carries a copy of the source because later registry mutations in the same
/// batch may renumber entries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnRequest {
    pub source: Source,
    pub source_index: u32,
}

/// Source owned by one stable touch id.
#[derive(Debug, Clone, Copy)]
struct Owned {
    seed: u32,
    color: Vec3,
}

/// Per-gesture touch bookkeeping.
#[derive(Debug, Default)]
pub struct InputAdapter {
    correlation: Correlation,
    /// Positional: number of touch indices active in the last batch.
    active: usize,
    /// Stable id: touch id to the source it owns.
    owners: HashMap<u64, Owned>,
    /// Stable id: touches seen this gesture, for palette cycling.
    touches_seen: usize,
}

impl InputAdapter {
    pub fn new(correlation: Correlation) -> Self {
        Self {
            correlation,
            ..Default::default()
        }
    }

    pub fn correlation(&self) -> Correlation {
        self.correlation
    }

    /// Number of touches the adapter currently tracks.
    pub fn active_touches(&self) -> usize {
        match self.correlation {
            Correlation::Positional => self.active,
            Correlation::StableId => self.owners.len(),
        }
    }

    /// Apply one batch of simultaneous touches.
    ///
    /// Positions are clamped to `canvas` before they reach the registry.
    /// Returns one spawn request per touch that just went down.
    pub fn handle_touches(
        &mut self,
        points: &[TouchPoint],
        canvas: &Canvas,
        registry: &mut SourceRegistry,
        template: &SourceTemplate,
    ) -> Vec<SpawnRequest> {
        match self.correlation {
            Correlation::Positional => self.positional(points, canvas, registry, template),
            Correlation::StableId => self.stable(points, canvas, registry, template),
        }
    }

    /// All touches lifted or were cancelled.
    ///
    /// Resets gesture bookkeeping. The registry is cleared as well when
    /// `clear_sources` is set.
    pub fn touches_ended(&mut self, registry: &mut SourceRegistry, clear_sources: bool) {
        self.active = 0;
        self.owners.clear();
        self.touches_seen = 0;
        if clear_sources {
            registry.clear();
        }
    }

    fn positional(
        &mut self,
        points: &[TouchPoint],
        canvas: &Canvas,
        registry: &mut SourceRegistry,
        template: &SourceTemplate,
    ) -> Vec<SpawnRequest> {
        let mut spawns = Vec::new();
        // Past capacity, adding would evict entry 0 and shift every index.
        let points = &points[..points.len().min(MAX_SOURCES)];

        for (index, point) in points.iter().enumerate() {
            let position = canvas.clamp(point.position);
            let is_new = index >= self.active;

            if index < registry.len() {
                registry.update(index, position);
                if is_new {
                    // Left over from an earlier gesture: the new touch owns it now.
                    registry.set_color(index, palette_color(index));
                    if let Some(source) = registry.get(index) {
                        spawns.push(SpawnRequest {
                            source: *source,
                            source_index: index as u32,
                        });
                    }
                }
            } else {
                let added = registry.add(template.instantiate(position, palette_color(index)));
                if let Some(source) = registry.get(added) {
                    spawns.push(SpawnRequest {
                        source: *source,
                        source_index: added as u32,
                    });
                }
            }
        }

        self.active = points.len();
        registry.truncate(points.len());
        spawns
    }

    fn stable(
        &mut self,
        points: &[TouchPoint],
        canvas: &Canvas,
        registry: &mut SourceRegistry,
        template: &SourceTemplate,
    ) -> Vec<SpawnRequest> {
        // Drop the sources of touches that are no longer down.
        let lifted: Vec<u64> = self
            .owners
            .keys()
            .filter(|id| !points.iter().any(|p| p.id == **id))
            .copied()
            .collect();
        for id in lifted {
            if let Some(owned) = self.owners.remove(&id) {
                if let Some(index) = index_of_seed(registry, owned.seed) {
                    registry.remove_at(index);
                }
            }
        }

        let mut spawns = Vec::new();
        for point in points {
            let position = canvas.clamp(point.position);

            if let Some(owned) = self.owners.get(&point.id).copied() {
                match index_of_seed(registry, owned.seed) {
                    Some(index) => {
                        registry.update(index, position);
                    }
                    // Evicted from outside. Take a free entry back without
                    // spawning, or stay detached until one frees up.
                    None if registry.len() < MAX_SOURCES => {
                        let added = registry.add(template.instantiate(position, owned.color));
                        if let Some(source) = registry.get(added) {
                            self.owners.insert(
                                point.id,
                                Owned {
                                    seed: source.seed,
                                    color: owned.color,
                                },
                            );
                        }
                    }
                    None => {}
                }
                continue;
            }

            if self.owners.len() >= MAX_SOURCES {
                log::trace!("ignoring touch {}: every source is taken", point.id);
                continue;
            }
            self.touches_seen += 1;

            let color = palette_color(self.touches_seen - 1);
            let added = registry.add(template.instantiate(position, color));
            if let Some(source) = registry.get(added) {
                self.owners.insert(
                    point.id,
                    Owned {
                        seed: source.seed,
                        color,
                    },
                );
                spawns.push(SpawnRequest {
                    source: *source,
                    source_index: added as u32,
                });
            }
        }
        spawns
    }
}

fn index_of_seed(registry: &SourceRegistry, seed: u32) -> Option<usize> {
    registry.iter().position(|source| source.seed == seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> SourceTemplate {
        SourceTemplate {
            behavior: Behavior::Repulsion,
            strength: 100.0,
            radius: 200.0,
        }
    }

    fn touches(points: &[(u64, f32, f32)]) -> Vec<TouchPoint> {
        points
            .iter()
            .map(|&(id, x, y)| TouchPoint::new(id, Vec2::new(x, y)))
            .collect()
    }

    #[test]
    fn test_positional_new_touch_creates_and_spawns() {
        let mut adapter = InputAdapter::new(Correlation::Positional);
        let mut registry = SourceRegistry::new();
        let canvas = Canvas::default();

        let spawns = adapter.handle_touches(
            &touches(&[(0, 10.0, 20.0), (1, 30.0, 40.0)]),
            &canvas,
            &mut registry,
            &template(),
        );

        assert_eq!(spawns.len(), 2);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(0).unwrap().color, NEON_PALETTE[0]);
        assert_eq!(registry.get(1).unwrap().color, NEON_PALETTE[1]);
        assert_eq!(registry.get(1).unwrap().behavior, Behavior::Repulsion);
    }

    #[test]
    fn test_positional_move_does_not_spawn() {
        let mut adapter = InputAdapter::new(Correlation::Positional);
        let mut registry = SourceRegistry::new();
        let canvas = Canvas::default();

        adapter.handle_touches(&touches(&[(0, 10.0, 20.0)]), &canvas, &mut registry, &template());
        let spawns =
            adapter.handle_touches(&touches(&[(0, 50.0, 60.0)]), &canvas, &mut registry, &template());

        assert!(spawns.is_empty());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(0).unwrap().position, Vec2::new(50.0, 60.0));
    }

    #[test]
    fn test_positional_shrink_drops_trailing_sources() {
        let mut adapter = InputAdapter::new(Correlation::Positional);
        let mut registry = SourceRegistry::new();
        let canvas = Canvas::default();

        adapter.handle_touches(
            &touches(&[(0, 1.0, 1.0), (1, 2.0, 2.0), (2, 3.0, 3.0)]),
            &canvas,
            &mut registry,
            &template(),
        );
        adapter.handle_touches(&touches(&[(0, 1.0, 1.0)]), &canvas, &mut registry, &template());

        assert_eq!(registry.len(), 1);
        assert_eq!(adapter.active_touches(), 1);
    }

    #[test]
    fn test_positional_retouch_spawns_from_existing_source() {
        let mut adapter = InputAdapter::new(Correlation::Positional);
        let mut registry = SourceRegistry::new();
        let canvas = Canvas::default();

        adapter.handle_touches(&touches(&[(0, 1.0, 1.0)]), &canvas, &mut registry, &template());
        adapter.touches_ended(&mut registry, false);
        assert_eq!(registry.len(), 1);

        let spawns =
            adapter.handle_touches(&touches(&[(5, 9.0, 9.0)]), &canvas, &mut registry, &template());
        assert_eq!(spawns.len(), 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(spawns[0].source.position, Vec2::new(9.0, 9.0));
    }

    #[test]
    fn test_positions_are_clamped() {
        let mut adapter = InputAdapter::new(Correlation::Positional);
        let mut registry = SourceRegistry::new();
        let canvas = Canvas::new(100.0, 100.0);

        adapter.handle_touches(
            &touches(&[(0, -20.0, 500.0)]),
            &canvas,
            &mut registry,
            &template(),
        );
        assert_eq!(registry.get(0).unwrap().position, Vec2::new(0.0, 100.0));
    }

    #[test]
    fn test_positional_ignores_touches_past_capacity() {
        let mut adapter = InputAdapter::new(Correlation::Positional);
        let mut registry = SourceRegistry::new();
        let canvas = Canvas::default();
        let many: Vec<TouchPoint> = (0..14)
            .map(|i| TouchPoint::new(i, Vec2::splat(i as f32)))
            .collect();

        let spawns = adapter.handle_touches(&many, &canvas, &mut registry, &template());
        assert_eq!(spawns.len(), MAX_SOURCES);
        assert_eq!(registry.len(), MAX_SOURCES);
        assert_eq!(registry.get(0).unwrap().position, Vec2::ZERO);
    }

    #[test]
    fn test_touches_ended_optionally_clears() {
        let mut adapter = InputAdapter::new(Correlation::Positional);
        let mut registry = SourceRegistry::new();
        let canvas = Canvas::default();

        adapter.handle_touches(&touches(&[(0, 1.0, 1.0)]), &canvas, &mut registry, &template());
        adapter.touches_ended(&mut registry, true);
        assert!(registry.is_empty());
        assert_eq!(adapter.active_touches(), 0);
    }

    #[test]
    fn test_stable_middle_finger_lift_keeps_others() {
        let mut adapter = InputAdapter::new(Correlation::StableId);
        let mut registry = SourceRegistry::new();
        let canvas = Canvas::default();

        adapter.handle_touches(
            &touches(&[(10, 1.0, 1.0), (20, 2.0, 2.0), (30, 3.0, 3.0)]),
            &canvas,
            &mut registry,
            &template(),
        );
        let third_color = registry.get(2).unwrap().color;

        // Finger 20 lifts, finger 30 moves.
        let spawns = adapter.handle_touches(
            &touches(&[(10, 1.0, 1.0), (30, 300.0, 300.0)]),
            &canvas,
            &mut registry,
            &template(),
        );

        assert!(spawns.is_empty());
        assert_eq!(registry.len(), 2);
        let moved = registry.get(1).unwrap();
        assert_eq!(moved.position, Vec2::new(300.0, 300.0));
        assert_eq!(moved.color, third_color);
    }

    #[test]
    fn test_stable_survives_external_removal() {
        let mut adapter = InputAdapter::new(Correlation::StableId);
        let mut registry = SourceRegistry::new();
        let canvas = Canvas::default();

        adapter.handle_touches(
            &touches(&[(1, 100.0, 100.0), (2, 800.0, 800.0)]),
            &canvas,
            &mut registry,
            &template(),
        );
        // Something else removes touch 1's source, renumbering touch 2's.
        registry.remove_near(Vec2::new(100.0, 100.0), 50.0);

        adapter.handle_touches(
            &touches(&[(1, 100.0, 100.0), (2, 700.0, 700.0)]),
            &canvas,
            &mut registry,
            &template(),
        );
        assert_eq!(registry.len(), 2);
        assert!(registry.iter().any(|s| s.position == Vec2::new(100.0, 100.0)));
        assert!(registry.iter().any(|s| s.position == Vec2::new(700.0, 700.0)));
        assert!(registry.iter().all(|s| s.position != Vec2::new(800.0, 800.0)));
    }

    #[test]
    fn test_stable_caps_owned_sources() {
        let mut adapter = InputAdapter::new(Correlation::StableId);
        let mut registry = SourceRegistry::new();
        let canvas = Canvas::default();
        let many: Vec<TouchPoint> = (0..12)
            .map(|i| TouchPoint::new(i, Vec2::splat(i as f32)))
            .collect();

        let first = adapter.handle_touches(&many, &canvas, &mut registry, &template());
        let second = adapter.handle_touches(&many, &canvas, &mut registry, &template());
        assert_eq!(first.len(), MAX_SOURCES);
        assert!(second.is_empty());
        assert_eq!(adapter.active_touches(), MAX_SOURCES);
    }

    #[test]
    fn test_stable_evicted_touch_waits_for_room() {
        let mut adapter = InputAdapter::new(Correlation::StableId);
        let mut registry = SourceRegistry::new();
        let canvas = Canvas::default();
        let down: Vec<TouchPoint> = (0..MAX_SOURCES as u64)
            .map(|i| TouchPoint::new(i, Vec2::splat(i as f32 * 10.0)))
            .collect();
        adapter.handle_touches(&down, &canvas, &mut registry, &template());

        // A tap elsewhere evicts touch 0's source.
        let manual = registry.add(Source::new(Vec2::splat(999.0), Vec3::ONE, Behavior::Gravity));
        let manual_seed = registry.get(manual).unwrap().seed;

        let moved: Vec<TouchPoint> = down
            .iter()
            .map(|t| TouchPoint::new(t.id, t.position + Vec2::ONE))
            .collect();
        let spawns = adapter.handle_touches(&moved, &canvas, &mut registry, &template());

        assert!(spawns.is_empty());
        assert_eq!(registry.len(), MAX_SOURCES);
        assert!(registry.iter().any(|s| s.seed == manual_seed));
        assert_eq!(registry.get(0).unwrap().position, Vec2::splat(11.0));

        // Once the manual source is gone, touch 0 gets its source back.
        registry.remove_near(Vec2::splat(999.0), 1.0);
        let spawns = adapter.handle_touches(&moved, &canvas, &mut registry, &template());
        assert!(spawns.is_empty());
        assert_eq!(registry.len(), MAX_SOURCES);
        let regained = registry.get(MAX_SOURCES - 1).unwrap();
        assert_eq!(regained.position, Vec2::ONE);
        assert_eq!(regained.color, NEON_PALETTE[0]);
    }

    #[test]
    fn test_positional_reused_source_takes_touch_color() {
        let mut adapter = InputAdapter::new(Correlation::Positional);
        let mut registry = SourceRegistry::new();
        let canvas = Canvas::default();
        registry.add(Source::new(Vec2::ZERO, Vec3::ONE, Behavior::Gravity));

        let spawns =
            adapter.handle_touches(&touches(&[(0, 5.0, 5.0)]), &canvas, &mut registry, &template());

        assert_eq!(registry.get(0).unwrap().color, NEON_PALETTE[0]);
        assert_eq!(spawns[0].source.color, NEON_PALETTE[0]);
    }
}
