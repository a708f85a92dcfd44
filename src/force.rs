//! Force field model.
//!
//! Every active [`Source`] contributes an acceleration to every live particle.
//! The contribution depends only on the source, the particle position and the
//! global gravity settings, so [`acceleration`] is a pure function. The WGSL
//! step shader in [`crate::gpu`] mirrors these formulas using the same
//! constants.
//!
//! | Behavior | Direction | Range |
//! |----------|-----------|-------|
//! | [`Behavior::Gravity`] | global gravity direction | unbounded |
//! | [`Behavior::Repulsion`] | away from the source | inside `radius` |
//! | [`Behavior::Attraction`] | toward the source | inside `radius` |
//! | [`Behavior::Turbulence`] | time-varying pseudo-periodic | unbounded, magnitude clamped |

use std::f32::consts::{PI, TAU};

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::source::Source;

/// Distances below this are treated as this value.
pub const MIN_DISTANCE: f32 = 1.0;

/// Acceleration (canvas units/s²) produced per unit of source strength at full falloff.
pub const FORCE_GAIN: f32 = 4.0;

/// Spatial frequency of the turbulence pattern.
pub const TURBULENCE_SCALE: f32 = 0.01;

/// How a source pushes particles around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Behavior {
    /// Constant pull along the global gravity direction.
    #[default]
    Gravity,
    /// Push away from the source, fading to zero at `radius`.
    Repulsion,
    /// Pull toward the source, fading to zero at `radius`.
    Attraction,
    /// Swirling, deterministic pseudo-noise driven by the source age.
    Turbulence,
}

impl Behavior {
    /// All behaviors, in GPU id order.
    pub const ALL: [Behavior; 4] = [
        Behavior::Gravity,
        Behavior::Repulsion,
        Behavior::Attraction,
        Behavior::Turbulence,
    ];

    /// Numeric id used in GPU buffers.
    pub fn id(self) -> u32 {
        match self {
            Behavior::Gravity => 0,
            Behavior::Repulsion => 1,
            Behavior::Attraction => 2,
            Behavior::Turbulence => 3,
        }
    }

    /// Inverse of [`Behavior::id`]. Unknown ids map to `Gravity`.
    pub fn from_id(id: u32) -> Self {
        match id {
            1 => Behavior::Repulsion,
            2 => Behavior::Attraction,
            3 => Behavior::Turbulence,
            _ => Behavior::Gravity,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Behavior::Gravity => "Gravity",
            Behavior::Repulsion => "Repulsion",
            Behavior::Attraction => "Attraction",
            Behavior::Turbulence => "Turbulence",
        }
    }
}

/// Global settings the force model reads besides the source itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceEnv {
    /// Global gravity scalar.
    pub gravity: f32,
    /// Unit direction gravity pulls toward. Canvas space has +y pointing down.
    pub gravity_direction: Vec2,
}

impl Default for ForceEnv {
    fn default() -> Self {
        Self {
            gravity: 0.5,
            gravity_direction: Vec2::Y,
        }
    }
}

/// Acceleration contributed by `source` to a particle at `position`.
pub fn acceleration(source: &Source, position: Vec2, env: &ForceEnv) -> Vec2 {
    match source.behavior {
        Behavior::Gravity => env.gravity_direction * env.gravity * source.strength * FORCE_GAIN,
        Behavior::Repulsion => match radial(source, position) {
            Some((away, falloff)) => {
                let dir = away.unwrap_or(Vec2::NEG_Y);
                dir * source.strength * FORCE_GAIN * falloff
            }
            None => Vec2::ZERO,
        },
        Behavior::Attraction => match radial(source, position) {
            // Sitting on the source: nowhere to be pulled.
            Some((Some(away), falloff)) => -away * source.strength * FORCE_GAIN * falloff,
            _ => Vec2::ZERO,
        },
        Behavior::Turbulence => turbulence(source, position),
    }
}

/// Sum of [`acceleration`] over all `sources`.
pub fn total_acceleration(sources: &[Source], position: Vec2, env: &ForceEnv) -> Vec2 {
    sources
        .iter()
        .map(|source| acceleration(source, position, env))
        .fold(Vec2::ZERO, |acc, a| acc + a)
}

/// Direction away from the source (None when closer than [`MIN_DISTANCE`])
/// and the linear falloff in `(0, 1]`. Returns None outside `radius`.
fn radial(source: &Source, position: Vec2) -> Option<(Option<Vec2>, f32)> {
    let offset = position - source.position;
    let dist = offset.length();
    // Written so a NaN radius or distance contributes nothing.
    if !(source.radius > 0.0 && dist < source.radius) {
        return None;
    }

    let falloff = 1.0 - dist.max(MIN_DISTANCE).min(source.radius) / source.radius;
    let away = if dist > MIN_DISTANCE {
        Some(offset / dist)
    } else {
        None
    };
    Some((away, falloff))
}

/// Phase offset so sources created at the same moment do not swirl in lockstep.
pub(crate) fn seed_phase(seed: u32) -> f32 {
    (seed as f32 * 0.618_034).fract() * TAU
}

fn turbulence(source: &Source, position: Vec2) -> Vec2 {
    let t = source.age + seed_phase(source.seed);
    let q = position * TURBULENCE_SCALE;

    let angle = (q.x * 1.7 + t * 0.9).sin() * PI
        + (q.y * 2.3 - t * 1.3).cos() * PI
        + ((q.x + q.y) * 0.5 + t * 2.1).sin();
    let pulse = 0.5 + 0.5 * (t * 1.1 + q.x * 0.7 - q.y * 0.4).sin();

    let limit = source.strength.abs() * FORCE_GAIN;
    let accel = Vec2::new(angle.cos(), angle.sin()) * source.strength * FORCE_GAIN * pulse;
    accel.clamp_length_max(limit)
}
