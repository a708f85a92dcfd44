//! Compute pipeline that steps the particle pool on the device.

use std::sync::mpsc;

use wgpu::util::DeviceExt;

use crate::config::StepParams;
use crate::error::GpuError;
use crate::particle::Particle;
use crate::pool::ParticlePool;
use crate::source::Source;

use super::shader::{pack_sources, step_shader, StepUniforms, WORKGROUP_SIZE};
use super::GpuContext;

const PARTICLE_SIZE: u64 = std::mem::size_of::<Particle>() as u64;

/// Device buffers and pipeline for the particle step.
///
/// The pool stays authoritative: before each dispatch the slots written on the
/// CPU since the last step are uploaded, after it the whole buffer is read
/// back into the pool.
pub struct GpuStepper {
    context: GpuContext,
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    particle_buffer: wgpu::Buffer,
    source_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    staging_buffer: wgpu::Buffer,
    capacity: u32,
}

impl GpuStepper {
    /// Build buffers and pipeline for a pool of `capacity` slots.
    pub fn new(context: GpuContext, capacity: usize) -> Result<Self, GpuError> {
        let device = &context.device;
        let capacity = capacity.max(1) as u32;
        let buffer_size = capacity as u64 * PARTICLE_SIZE;

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Particle Step Shader"),
            source: wgpu::ShaderSource::Wgsl(step_shader().into()),
        });

        let particle_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Buffer"),
            size: buffer_size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let source_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Source Buffer"),
            contents: bytemuck::cast_slice(&pack_sources(&[])),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Step Uniforms"),
            contents: bytemuck::bytes_of(&StepUniforms::new(&StepParams::default(), 0)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Readback Buffer"),
            size: buffer_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Step Bind Group Layout"),
            entries: &[
                // Particles
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Sources
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Uniforms
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Particle Step Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: particle_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: source_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniform_buffer.as_entire_binding(),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Particle Step Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Particle Step Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(GpuError::Pipeline(error.to_string()));
        }

        Ok(Self {
            context,
            pipeline,
            bind_group,
            particle_buffer,
            source_buffer,
            uniform_buffer,
            staging_buffer,
            capacity,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.context.adapter_info.name
    }

    /// Upload pending slots, run one step and read the result back into `pool`.
    ///
    /// Blocks until the readback lands, so step N is visible before step N+1.
    pub fn step(
        &mut self,
        pool: &mut ParticlePool,
        sources: &[Source],
        params: &StepParams,
    ) -> Result<(), GpuError> {
        let device = &self.context.device;
        let queue = &self.context.queue;
        let count = (pool.capacity() as u32).min(self.capacity);
        if count == 0 {
            return Ok(());
        }

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        self.upload(pool, count);
        let packed = pack_sources(sources);
        queue.write_buffer(&self.source_buffer, 0, bytemuck::cast_slice(&packed));
        queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&StepUniforms::new(params, count)),
        );

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Particle Step Encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Particle Step Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.dispatch_workgroups(count.div_ceil(WORKGROUP_SIZE), 1, 1);
        }
        let copy_size = count as u64 * PARTICLE_SIZE;
        encoder.copy_buffer_to_buffer(&self.particle_buffer, 0, &self.staging_buffer, 0, copy_size);
        queue.submit(Some(encoder.finish()));

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(GpuError::Pipeline(error.to_string()));
        }

        let stepped = self.read_back(copy_size)?;
        pool.overwrite(&stepped);
        Ok(())
    }

    fn upload(&self, pool: &mut ParticlePool, count: u32) {
        let queue = &self.context.queue;
        let pending = pool.take_uploads();
        let slots = &pool.slots()[..count as usize];

        if pending.full {
            queue.write_buffer(&self.particle_buffer, 0, bytemuck::cast_slice(slots));
            return;
        }
        for index in pending.slots {
            if let Some(slot) = slots.get(index) {
                queue.write_buffer(
                    &self.particle_buffer,
                    index as u64 * PARTICLE_SIZE,
                    bytemuck::bytes_of(slot),
                );
            }
        }
    }

    fn read_back(&self, size: u64) -> Result<Vec<Particle>, GpuError> {
        let slice = self.staging_buffer.slice(..size);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.context.device.poll(wgpu::Maintain::Wait);

        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(GpuError::BufferMapping(e.to_string())),
            Err(e) => return Err(GpuError::BufferMapping(e.to_string())),
        }

        let particles = {
            let data = slice.get_mapped_range();
            bytemuck::try_cast_slice::<u8, Particle>(&data)
                .map(|p| p.to_vec())
                .map_err(|e| GpuError::BufferMapping(e.to_string()))
        };
        self.staging_buffer.unmap();
        particles
    }
}

impl std::fmt::Debug for GpuStepper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuStepper")
            .field("context", &self.context)
            .field("capacity", &self.capacity)
            .finish()
    }
}
