//! Particle slot layout.
//!
//! [`Particle`] is the exact byte layout shared by the CPU pool and the GPU
//! storage buffer, so it has to match the WGSL `Particle` struct:
//!
//! | Offset | Field | WGSL type |
//! |--------|-------|-----------|
//! | 0 | `position` | `vec2<f32>` |
//! | 8 | `velocity` | `vec2<f32>` |
//! | 16 | `color` | `vec3<f32>` |
//! | 28 | `size` | `f32` |
//! | 32 | `lifetime` | `f32` |
//! | 36 | `source_index` | `u32` |
//! | 40 | padding | `vec2<u32>` |

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// One fixed slot of the particle pool.
///
/// A slot with `lifetime <= 0.0` is dead and free for reuse. Identity is the
/// slot index; a slot holds many particles over the pool's lifetime.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Particle {
    pub position: Vec2,
    pub velocity: Vec2,
    pub color: Vec3,
    pub size: f32,
    /// Remaining lifetime in seconds.
    pub lifetime: f32,
    /// Registry index of the source that spawned it. Informational only.
    pub source_index: u32,
    pub _pad: [u32; 2],
}

impl Particle {
    /// A dead slot.
    pub fn dead() -> Self {
        Self::zeroed()
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.lifetime > 0.0
    }

    /// Read-only view handed to renderers.
    #[inline]
    pub fn snapshot(&self) -> ParticleSnapshot {
        ParticleSnapshot {
            position: self.position,
            velocity: self.velocity,
            color: self.color,
            size: self.size,
            lifetime: self.lifetime,
            source_index: self.source_index,
        }
    }
}

/// Copy of a live particle as seen by a renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleSnapshot {
    pub position: Vec2,
    pub velocity: Vec2,
    pub color: Vec3,
    pub size: f32,
    pub lifetime: f32,
    pub source_index: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_particle_layout_is_48_bytes() {
        assert_eq!(std::mem::size_of::<Particle>(), 48);
        assert_eq!(std::mem::offset_of!(Particle, color), 16);
        assert_eq!(std::mem::offset_of!(Particle, lifetime), 32);
    }

    #[test]
    fn test_dead_particle() {
        let p = Particle::dead();
        assert!(!p.is_alive());
        assert_eq!(p.lifetime, 0.0);
    }
}
