//! Demo window: winit event loop plus a wgpu renderer for simulation snapshots.
//!
//! | Input | Action |
//! |-------|--------|
//! | touch / left drag | create and drag sources |
//! | right click | remove sources near the cursor |
//! | `S` | place a source at the cursor |
//! | `1`-`4` | gravity, repulsion, attraction, turbulence |
//! | up / down | gravity +/- 0.1 |
//! | left / right | friction -/+ 0.005 |
//! | `C` | clear everything |
//! | space | pause |

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, MouseButton, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use zenfield::{
    Behavior, GpuError, ParticleSimulation, SimulationConfig, TouchTracker, MAX_SOURCES,
    REMOVE_THRESHOLD,
};

/// Frames between window title refreshes.
const TITLE_INTERVAL: u64 = 15;

/// One instanced quad: a particle glow or a source ring.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct QuadInstance {
    center: [f32; 2],
    radius: f32,
    /// 0 = particle, 1 = source ring.
    kind: f32,
    color: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ViewUniforms {
    canvas: [f32; 2],
    _pad: [f32; 2],
}

const QUAD_SHADER: &str = r#"
struct View {
    canvas: vec2<f32>,
    pad: vec2<f32>,
};

@group(0) @binding(0) var<uniform> view: View;

struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) local: vec2<f32>,
    @location(1) color: vec4<f32>,
    @location(2) kind: f32,
};

@vertex
fn vs_main(
    @builtin(vertex_index) vi: u32,
    @location(0) center: vec2<f32>,
    @location(1) radius: f32,
    @location(2) kind: f32,
    @location(3) color: vec4<f32>,
) -> VertexOutput {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0), vec2<f32>(1.0, -1.0), vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, -1.0), vec2<f32>(1.0, 1.0), vec2<f32>(-1.0, 1.0),
    );
    let corner = corners[vi];
    let world = center + corner * radius;
    let ndc = world / view.canvas * 2.0 - 1.0;

    var out: VertexOutput;
    out.clip = vec4<f32>(ndc.x, -ndc.y, 0.0, 1.0);
    out.local = corner;
    out.color = color;
    out.kind = kind;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let d = length(in.local);
    var alpha: f32;
    if (in.kind < 0.5) {
        let glow = 1.0 - smoothstep(0.0, 1.0, d);
        alpha = glow * glow;
    } else {
        alpha = (1.0 - smoothstep(0.0, 0.04, abs(d - 0.96))) * 0.6;
    }
    return vec4<f32>(in.color.rgb * alpha * in.color.a, alpha * in.color.a);
}
"#;

/// Surface-backed renderer that draws whatever the simulation exposes.
pub struct Renderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    instances: Vec<QuadInstance>,
}

impl Renderer {
    pub async fn new(window: Arc<Window>, max_particles: usize) -> Result<Self, GpuError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Render Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or(GpuError::NoAdapter)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Quad Shader"),
            source: wgpu::ShaderSource::Wgsl(QUAD_SHADER.into()),
        });

        let instance_capacity = max_particles + MAX_SOURCES;
        let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Quad Instance Buffer"),
            size: (instance_capacity.max(1) * std::mem::size_of::<QuadInstance>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("View Uniforms"),
            size: std::mem::size_of::<ViewUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("View Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("View Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Quad Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        // Additive blending for the neon look.
        let additive = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Quad Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<QuadInstance>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Instance,
                    attributes: &wgpu::vertex_attr_array![
                        0 => Float32x2,
                        1 => Float32,
                        2 => Float32,
                        3 => Float32x4,
                    ],
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState {
                        color: additive,
                        alpha: additive,
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Ok(Self {
            surface,
            device,
            queue,
            config,
            pipeline,
            instance_buffer,
            instance_capacity,
            uniform_buffer,
            bind_group,
            instances: Vec::with_capacity(instance_capacity),
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    pub fn render(&mut self, sim: &ParticleSimulation) -> Result<(), wgpu::SurfaceError> {
        self.instances.clear();
        self.instances.extend(sim.live_particles().map(|p| {
            // Fade out over the last second of life.
            let fade = p.lifetime.min(1.0);
            QuadInstance {
                center: p.position.to_array(),
                radius: p.size,
                kind: 0.0,
                color: [p.color.x, p.color.y, p.color.z, fade],
            }
        }));
        self.instances.extend(sim.sources().iter().map(|s| QuadInstance {
            center: s.position.to_array(),
            radius: s.radius,
            kind: 1.0,
            color: [s.color.x, s.color.y, s.color.z, 0.35],
        }));
        self.instances.truncate(self.instance_capacity);

        let canvas = sim.canvas();
        self.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&ViewUniforms {
                canvas: [canvas.width.max(1.0), canvas.height.max(1.0)],
                _pad: [0.0; 2],
            }),
        );
        if !self.instances.is_empty() {
            self.queue
                .write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&self.instances));
        }

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.01,
                            g: 0.01,
                            b: 0.03,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &self.bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.instance_buffer.slice(..));
            render_pass.draw(0..6, 0..self.instances.len() as u32);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

pub struct App {
    config: SimulationConfig,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    sim: Option<ParticleSimulation>,
    touches: TouchTracker,
}

impl App {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            window: None,
            renderer: None,
            sim: None,
            touches: TouchTracker::new(),
        }
    }

    fn handle_key(&mut self, code: KeyCode) {
        let cursor = self.touches.cursor();
        let Some(sim) = &mut self.sim else {
            return;
        };
        match code {
            KeyCode::Digit1 => sim.set_behavior(Behavior::Gravity),
            KeyCode::Digit2 => sim.set_behavior(Behavior::Repulsion),
            KeyCode::Digit3 => sim.set_behavior(Behavior::Attraction),
            KeyCode::Digit4 => sim.set_behavior(Behavior::Turbulence),
            KeyCode::ArrowUp => sim.set_gravity(sim.gravity() + 0.1),
            KeyCode::ArrowDown => sim.set_gravity(sim.gravity() - 0.1),
            KeyCode::ArrowRight => sim.set_friction(sim.friction() + 0.005),
            KeyCode::ArrowLeft => sim.set_friction(sim.friction() - 0.005),
            KeyCode::KeyS => {
                sim.add_source(cursor);
            }
            KeyCode::KeyC => sim.clear(),
            KeyCode::Space => sim.clock_mut().toggle_pause(),
            _ => {}
        }
    }

    fn update_title(&self) {
        let (Some(window), Some(sim)) = (&self.window, &self.sim) else {
            return;
        };
        window.set_title(&format!(
            "zenfield | {} | gravity {:.1} friction {:.3} | {}/{} particles | {} sources | {} | {:.0} fps",
            sim.behavior().display_name(),
            sim.gravity(),
            sim.friction(),
            sim.live_count(),
            sim.capacity(),
            sim.sources().len(),
            sim.backend_kind(),
            sim.clock().fps(),
        ));
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = Window::default_attributes()
            .with_title("zenfield")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));
        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        let renderer = match pollster::block_on(Renderer::new(
            window.clone(),
            self.config.max_particles as usize,
        )) {
            Ok(renderer) => renderer,
            Err(e) => {
                log::error!("failed to set up rendering: {e}");
                event_loop.exit();
                return;
            }
        };

        let (width, height) = renderer.size();
        let config = self
            .config
            .clone()
            .with_canvas(width as f32, height as f32);
        self.sim = Some(ParticleSimulation::new(config));
        self.renderer = Some(renderer);
        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let Some(signal) = self.touches.handle_event(&event) {
            if let Some(sim) = &mut self.sim {
                sim.apply(signal);
            }
        }

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(renderer) = &mut self.renderer {
                    renderer.resize(size.width, size.height);
                }
                if let Some(sim) = &mut self.sim {
                    sim.set_canvas_size(size.width as f32, size.height as f32);
                }
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Right,
                ..
            } => {
                let cursor = self.touches.cursor();
                if let Some(sim) = &mut self.sim {
                    sim.remove_sources_near(cursor, REMOVE_THRESHOLD);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => self.handle_key(code),
            WindowEvent::RedrawRequested => {
                if let (Some(sim), Some(renderer)) = (&mut self.sim, &mut self.renderer) {
                    sim.tick();
                    match renderer.render(sim) {
                        Ok(()) => {}
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            let (width, height) = renderer.size();
                            renderer.resize(width, height);
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => event_loop.exit(),
                        Err(e) => log::warn!("render error: {e:?}"),
                    }
                    if sim.clock().frame() % TITLE_INTERVAL == 0 {
                        self.update_title();
                    }
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}
