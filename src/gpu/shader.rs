//! GPU buffer layouts and the generated WGSL step shader.
//!
//! The shader is the device twin of [`ParticlePool::step`](crate::ParticlePool::step)
//! and [`force::acceleration`](crate::force::acceleration): same step order,
//! same formulas, same constants. Constants that never change at runtime are
//! baked into the source with `format!`; everything else arrives through
//! [`StepUniforms`].
//!
//! # Bindings
//!
//! | Binding | Resource | Access |
//! |---------|----------|--------|
//! | 0 | `array<Particle>` | read_write |
//! | 1 | `array<Source, MAX_SOURCES>` | read |
//! | 2 | `Uniforms` | uniform |

use bytemuck::{Pod, Zeroable};

use crate::config::StepParams;
use crate::force::{self, FORCE_GAIN, MIN_DISTANCE, TURBULENCE_SCALE};
use crate::source::{Source, MAX_SOURCES};

/// Threads per workgroup for the step dispatch.
pub const WORKGROUP_SIZE: u32 = 256;

/// Force source as laid out in the `sources` storage buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuSource {
    pub position: [f32; 2],
    pub _pad0: [f32; 2],
    pub color: [f32; 3],
    pub strength: f32,
    pub radius: f32,
    pub behavior: u32,
    pub age: f32,
    /// Precomputed from the source seed.
    pub phase: f32,
}

impl From<&Source> for GpuSource {
    fn from(source: &Source) -> Self {
        Self {
            position: source.position.to_array(),
            _pad0: [0.0; 2],
            color: source.color.to_array(),
            strength: source.strength,
            radius: source.radius,
            behavior: source.behavior.id(),
            age: source.age,
            phase: force::seed_phase(source.seed),
        }
    }
}

/// Fixed-size source table, zero-padded past the live entries.
pub fn pack_sources(sources: &[Source]) -> [GpuSource; MAX_SOURCES] {
    let mut packed = [GpuSource::zeroed(); MAX_SOURCES];
    for (slot, source) in packed.iter_mut().zip(sources) {
        *slot = GpuSource::from(source);
    }
    packed
}

/// Per-step uniforms.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct StepUniforms {
    pub dt: f32,
    pub gravity: f32,
    pub friction: f32,
    pub max_speed: f32,
    pub gravity_dir: [f32; 2],
    pub canvas: [f32; 2],
    pub source_count: u32,
    pub particle_count: u32,
    pub boundary: u32,
    pub restitution: f32,
    pub _pad: [f32; 4],
}

impl StepUniforms {
    pub fn new(params: &StepParams, particle_count: u32) -> Self {
        Self {
            dt: params.dt,
            gravity: params.env.gravity,
            friction: params.friction,
            max_speed: params.max_speed,
            gravity_dir: params.env.gravity_direction.to_array(),
            canvas: params.canvas.size().to_array(),
            source_count: params.source_count.min(MAX_SOURCES as u32),
            particle_count,
            boundary: params.boundary.id(),
            restitution: params.restitution,
            _pad: [0.0; 4],
        }
    }
}

/// WGSL source of the particle step kernel.
pub fn step_shader() -> String {
    format!(
        r#"
const PI: f32 = 3.14159265;
const MAX_SOURCES: u32 = {max_sources}u;
const FORCE_GAIN: f32 = {force_gain:?};
const MIN_DISTANCE: f32 = {min_distance:?};
const TURBULENCE_SCALE: f32 = {turbulence_scale:?};

struct Particle {{
    position: vec2<f32>,
    velocity: vec2<f32>,
    color: vec3<f32>,
    size: f32,
    lifetime: f32,
    source_index: u32,
    pad: vec2<u32>,
}};

struct Source {{
    position: vec2<f32>,
    color: vec3<f32>,
    strength: f32,
    radius: f32,
    behavior: u32,
    age: f32,
    phase: f32,
}};

struct Uniforms {{
    dt: f32,
    gravity: f32,
    friction: f32,
    max_speed: f32,
    gravity_dir: vec2<f32>,
    canvas: vec2<f32>,
    source_count: u32,
    particle_count: u32,
    boundary: u32,
    restitution: f32,
    pad: vec4<f32>,
}};

@group(0) @binding(0) var<storage, read_write> particles: array<Particle>;
@group(0) @binding(1) var<storage, read> sources: array<Source, {max_sources}>;
@group(0) @binding(2) var<uniform> uniforms: Uniforms;

fn clamp_length(v: vec2<f32>, max_len: f32) -> vec2<f32> {{
    let len = length(v);
    if (len > max_len && len > 0.0) {{
        return v * (max_len / len);
    }}
    return v;
}}

fn turbulence(s: Source, pos: vec2<f32>) -> vec2<f32> {{
    let t = s.age + s.phase;
    let q = pos * TURBULENCE_SCALE;
    let angle = sin(q.x * 1.7 + t * 0.9) * PI
        + cos(q.y * 2.3 - t * 1.3) * PI
        + sin((q.x + q.y) * 0.5 + t * 2.1);
    let pulse = 0.5 + 0.5 * sin(t * 1.1 + q.x * 0.7 - q.y * 0.4);
    let accel = vec2<f32>(cos(angle), sin(angle)) * s.strength * FORCE_GAIN * pulse;
    return clamp_length(accel, abs(s.strength) * FORCE_GAIN);
}}

fn source_accel(s: Source, pos: vec2<f32>) -> vec2<f32> {{
    var accel = vec2<f32>(0.0, 0.0);
    let gain = s.strength * FORCE_GAIN;
    switch s.behavior {{
        // gravity
        case 0u: {{
            accel = uniforms.gravity_dir * uniforms.gravity * gain;
        }}
        // repulsion, attraction
        case 1u, 2u: {{
            let offset = pos - s.position;
            let dist = length(offset);
            if (s.radius > 0.0 && dist < s.radius) {{
                let falloff = 1.0 - min(max(dist, MIN_DISTANCE), s.radius) / s.radius;
                if (dist > MIN_DISTANCE) {{
                    let away = offset / dist;
                    if (s.behavior == 1u) {{
                        accel = away * gain * falloff;
                    }} else {{
                        accel = -away * gain * falloff;
                    }}
                }} else if (s.behavior == 1u) {{
                    accel = vec2<f32>(0.0, -1.0) * gain * falloff;
                }}
            }}
        }}
        case 3u: {{
            accel = turbulence(s, pos);
        }}
        default: {{}}
    }}
    return accel;
}}

@compute @workgroup_size({workgroup_size})
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {{
    let index = gid.x;
    if (index >= uniforms.particle_count) {{
        return;
    }}

    var p = particles[index];
    if (p.lifetime <= 0.0) {{
        return;
    }}

    let dt = uniforms.dt;
    var accel = vec2<f32>(0.0, 0.0);
    let count = min(uniforms.source_count, MAX_SOURCES);
    for (var i = 0u; i < count; i++) {{
        accel += source_accel(sources[i], p.position);
    }}

    var vel = (p.velocity + accel * dt) * uniforms.friction;
    vel = clamp_length(vel, uniforms.max_speed);
    var pos = p.position + vel * dt;

    let bounds = uniforms.canvas;
    if (uniforms.boundary == 0u) {{
        if (pos.x < 0.0) {{
            pos.x = 0.0;
            vel.x = abs(vel.x) * uniforms.restitution;
        }} else if (pos.x > bounds.x) {{
            pos.x = bounds.x;
            vel.x = -abs(vel.x) * uniforms.restitution;
        }}
        if (pos.y < 0.0) {{
            pos.y = 0.0;
            vel.y = abs(vel.y) * uniforms.restitution;
        }} else if (pos.y > bounds.y) {{
            pos.y = bounds.y;
            vel.y = -abs(vel.y) * uniforms.restitution;
        }}
    }} else if (uniforms.boundary == 1u) {{
        if (bounds.x > 0.0) {{
            pos.x = pos.x - floor(pos.x / bounds.x) * bounds.x;
        }}
        if (bounds.y > 0.0) {{
            pos.y = pos.y - floor(pos.y / bounds.y) * bounds.y;
        }}
    }}

    p.position = pos;
    p.velocity = vel;
    p.lifetime = max(p.lifetime - dt, 0.0);
    particles[index] = p;
}}
"#,
        max_sources = MAX_SOURCES,
        force_gain = FORCE_GAIN,
        min_distance = MIN_DISTANCE,
        turbulence_scale = TURBULENCE_SCALE,
        workgroup_size = WORKGROUP_SIZE,
    )
}
