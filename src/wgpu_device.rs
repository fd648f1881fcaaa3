use std::borrow::Cow;
use std::sync::Arc;

use log::{error, info};
use wgpu::util::DeviceExt;

use crate::error::{ParticleSystemError, Result};
use crate::feedback_device::FeedbackDevice;
use crate::gpu_check;
use crate::particle::{Particle, ParticleLayout};
use crate::update_program::{
    workgroup_count, FeedbackPass, FrameUniforms, ProgramDescriptor, StaticUniforms,
};

pub struct SizedBuffer {
    pub buffer: wgpu::Buffer,
    pub size: wgpu::BufferAddress,
}

fn make_uniform_buffer<T: bytemuck::Pod>(device: &wgpu::Device, label: &str, value: &T) -> SizedBuffer {
    let contents = bytemuck::bytes_of(value);
    SizedBuffer {
        buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        }),
        size: contents.len() as wgpu::BufferAddress,
    }
}

fn uniform_entry(binding: u32, size: wgpu::BufferAddress) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(size),
        },
        count: None,
    }
}

fn particle_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(ParticleLayout::STRIDE),
        },
        count: None,
    }
}

/// The compiled update program together with its uniform buffers.
pub struct UpdatePipeline {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    static_uniforms: SizedBuffer,
    frame_uniforms: SizedBuffer,
    workgroup_size: u32,
}

/// Feedback device backed by a wgpu compute queue.
pub struct WgpuDevice {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
}

impl WgpuDevice {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        gpu_check::log_uncaptured_errors(&device);
        WgpuDevice { device, queue }
    }

    /// Opens the default adapter without a surface.
    pub fn request_headless() -> Result<Self> {
        futures::executor::block_on(Self::request_headless_async())
    }

    async fn request_headless_async() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .ok_or(ParticleSystemError::NoAdapter)?;
        info!("Using adapter: {:?}", adapter.get_info());
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Tornado device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await?;
        Ok(WgpuDevice::new(Arc::new(device), Arc::new(queue)))
    }

    /// Copies a particle buffer back to host memory. Blocks until the GPU
    /// has finished every pass submitted so far.
    pub fn read_particles(&self, buffer: &SizedBuffer) -> Result<Vec<Particle>> {
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle readback"),
            size: buffer.size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Particle readback"),
            });
        encoder.copy_buffer_to_buffer(&buffer.buffer, 0, &staging, 0, buffer.size);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = futures::channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        let mapped = futures::executor::block_on(receiver)
            .map_err(|e| e.to_string())
            .and_then(|r| r.map_err(|e| e.to_string()));
        if let Err(reason) = mapped {
            return Err(ParticleSystemError::BufferAllocation {
                label: "Particle readback".to_string(),
                reason,
            });
        }
        let particles = bytemuck::cast_slice::<u8, Particle>(&slice.get_mapped_range()).to_vec();
        staging.unmap();
        Ok(particles)
    }
}

impl FeedbackDevice for WgpuDevice {
    type Program = UpdatePipeline;
    type Buffer = SizedBuffer;
    type Binding = wgpu::BindGroup;

    fn max_buffer_size(&self) -> u64 {
        let limits = self.device.limits();
        limits
            .max_buffer_size
            .min(u64::from(limits.max_storage_buffer_binding_size))
    }

    fn create_program(&mut self, descriptor: &ProgramDescriptor<'_>) -> Result<UpdatePipeline> {
        descriptor.validate()?;
        let device = &*self.device;
        let fail = |reason: String| ParticleSystemError::ProgramCreation {
            label: descriptor.label.to_string(),
            reason,
        };
        gpu_check::capture(device, || {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(descriptor.label),
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(descriptor.source.as_ref())),
            });
            let static_uniforms =
                make_uniform_buffer(device, "Static uniforms", &StaticUniforms::default());
            let frame_uniforms =
                make_uniform_buffer(device, "Frame uniforms", &FrameUniforms::default());
            let bind_group_layout =
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Tornado update layout"),
                    entries: &[
                        uniform_entry(0, static_uniforms.size),
                        uniform_entry(1, frame_uniforms.size),
                        particle_entry(2, true),
                        particle_entry(3, false),
                    ],
                });
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Tornado update pipeline layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });
            let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(descriptor.label),
                layout: Some(&layout),
                module: &module,
                entry_point: Some(descriptor.entry_point),
                compilation_options: Default::default(),
                cache: None,
            });
            UpdatePipeline {
                pipeline,
                bind_group_layout,
                static_uniforms,
                frame_uniforms,
                workgroup_size: descriptor.workgroup_size,
            }
        })
        .map_err(fail)
    }

    fn create_particle_buffer(
        &mut self,
        label: &str,
        capacity: u32,
        contents: Option<&[Particle]>,
    ) -> Result<SizedBuffer> {
        let fail = |reason: String| ParticleSystemError::BufferAllocation {
            label: label.to_string(),
            reason,
        };
        let size = ParticleLayout::buffer_size(capacity);
        let max = self.max_buffer_size();
        if size > max {
            return Err(fail(format!(
                "{} bytes exceeds the device limit of {} bytes",
                size, max
            )));
        }
        if let Some(contents) = contents {
            if contents.len() != capacity as usize {
                return Err(fail(format!(
                    "{} seed records for a capacity of {}",
                    contents.len(),
                    capacity
                )));
            }
        }
        let usage = wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::VERTEX
            | wgpu::BufferUsages::COPY_DST
            | wgpu::BufferUsages::COPY_SRC;
        let device = &*self.device;
        let buffer = gpu_check::capture(device, || match contents {
            Some(contents) => device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(contents),
                usage,
            }),
            None => device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage,
                mapped_at_creation: false,
            }),
        })
        .map_err(fail)?;
        Ok(SizedBuffer { buffer, size })
    }

    fn create_binding(
        &mut self,
        program: &UpdatePipeline,
        source: &SizedBuffer,
        dest: &SizedBuffer,
    ) -> Result<wgpu::BindGroup> {
        let device = &*self.device;
        gpu_check::capture(device, || {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Tornado feedback binding"),
                layout: &program.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: program.static_uniforms.buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: program.frame_uniforms.buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: source.buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: dest.buffer.as_entire_binding(),
                    },
                ],
            })
        })
        .map_err(|reason| ParticleSystemError::BufferAllocation {
            label: "Tornado feedback binding".to_string(),
            reason,
        })
    }

    fn set_static_uniforms(&mut self, program: &UpdatePipeline, uniforms: &StaticUniforms) {
        self.queue.write_buffer(
            &program.static_uniforms.buffer,
            0,
            bytemuck::bytes_of(uniforms),
        );
    }

    fn set_frame_uniforms(&mut self, program: &UpdatePipeline, uniforms: &FrameUniforms) {
        self.queue.write_buffer(
            &program.frame_uniforms.buffer,
            0,
            bytemuck::bytes_of(uniforms),
        );
    }

    fn run_feedback_pass(
        &mut self,
        program: &UpdatePipeline,
        binding: &wgpu::BindGroup,
        pass: &FeedbackPass,
    ) {
        let workgroups = workgroup_count(pass.max_particles, program.workgroup_size);
        let max_workgroups = self.device.limits().max_compute_workgroups_per_dimension;
        if workgroups > max_workgroups {
            error!(
                "Feedback pass needs {} workgroups, device allows {}; skipping",
                workgroups, max_workgroups
            );
            return;
        }
        gpu_check::push_frame_scope(&self.device);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Tornado update"),
            });
        {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Tornado update"),
                timestamp_writes: None,
            });
            cpass.set_pipeline(&program.pipeline);
            cpass.set_bind_group(0, binding, &[]);
            cpass.dispatch_workgroups(workgroups, 1, 1);
        }
        self.queue.submit(Some(encoder.finish()));
        gpu_check::check_frame_errors(&self.device, "feedback pass");
    }
}
