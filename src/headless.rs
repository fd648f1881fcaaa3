use log::debug;

use crate::error::{ParticleSystemError, Result};
use crate::feedback_device::FeedbackDevice;
use crate::kernel;
use crate::particle::{Particle, ParticleLayout};
use crate::update_program::{FeedbackPass, FrameUniforms, ProgramDescriptor, StaticUniforms};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(pub usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProgramId(pub usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HeadlessBinding {
    pub source: BufferId,
    pub dest: BufferId,
}

/// Everything submitted to a `HeadlessDevice`, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    CreateProgram {
        program: ProgramId,
    },
    CreateBuffer {
        buffer: BufferId,
        capacity: u32,
        seeded: bool,
    },
    CreateBinding {
        source: BufferId,
        dest: BufferId,
    },
    SetStaticUniforms {
        program: ProgramId,
        uniforms: StaticUniforms,
    },
    SetFrameUniforms {
        program: ProgramId,
        uniforms: FrameUniforms,
    },
    FeedbackPass {
        program: ProgramId,
        source: BufferId,
        dest: BufferId,
        pass: FeedbackPass,
    },
}

#[derive(Default)]
struct ProgramState {
    statics: StaticUniforms,
    frame: FrameUniforms,
}

/// Host-memory device. Keeps buffers in `Vec`s, records every command, and
/// runs the update kernel on the CPU so that passes have real output.
#[derive(Default)]
pub struct HeadlessDevice {
    buffers: Vec<Vec<Particle>>,
    programs: Vec<ProgramState>,
    commands: Vec<Command>,
    // Allocations larger than this fail, standing in for device memory limits.
    max_buffer_size: Option<u64>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        HeadlessDevice::default()
    }

    pub fn with_max_buffer_size(max_buffer_size: u64) -> Self {
        HeadlessDevice {
            max_buffer_size: Some(max_buffer_size),
            ..HeadlessDevice::default()
        }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn buffer_contents(&self, buffer: BufferId) -> &[Particle] {
        &self.buffers[buffer.0]
    }

    pub fn num_passes(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::FeedbackPass { .. }))
            .count()
    }
}

impl FeedbackDevice for HeadlessDevice {
    type Program = ProgramId;
    type Buffer = BufferId;
    type Binding = HeadlessBinding;

    fn max_buffer_size(&self) -> u64 {
        self.max_buffer_size.unwrap_or(u64::MAX)
    }

    fn create_program(&mut self, descriptor: &ProgramDescriptor<'_>) -> Result<ProgramId> {
        descriptor.validate()?;
        let program = ProgramId(self.programs.len());
        self.programs.push(ProgramState::default());
        self.commands.push(Command::CreateProgram { program });
        debug!("Created headless program {:?} from {}", program, descriptor.label);
        Ok(program)
    }

    fn create_particle_buffer(
        &mut self,
        label: &str,
        capacity: u32,
        contents: Option<&[Particle]>,
    ) -> Result<BufferId> {
        let fail = |reason: String| ParticleSystemError::BufferAllocation {
            label: label.to_string(),
            reason,
        };
        let size = ParticleLayout::buffer_size(capacity);
        let max = self.max_buffer_size();
        if size > max {
            return Err(fail(format!("{} bytes exceeds the {} byte limit", size, max)));
        }
        let data = match contents {
            Some(contents) if contents.len() != capacity as usize => {
                return Err(fail(format!(
                    "{} seed records for a capacity of {}",
                    contents.len(),
                    capacity
                )));
            }
            Some(contents) => contents.to_vec(),
            None => vec![Particle::default(); capacity as usize],
        };
        let buffer = BufferId(self.buffers.len());
        self.buffers.push(data);
        self.commands.push(Command::CreateBuffer {
            buffer,
            capacity,
            seeded: contents.is_some(),
        });
        Ok(buffer)
    }

    fn create_binding(
        &mut self,
        _program: &ProgramId,
        source: &BufferId,
        dest: &BufferId,
    ) -> Result<HeadlessBinding> {
        self.commands.push(Command::CreateBinding {
            source: *source,
            dest: *dest,
        });
        Ok(HeadlessBinding {
            source: *source,
            dest: *dest,
        })
    }

    fn set_static_uniforms(&mut self, program: &ProgramId, uniforms: &StaticUniforms) {
        self.programs[program.0].statics = *uniforms;
        self.commands.push(Command::SetStaticUniforms {
            program: *program,
            uniforms: *uniforms,
        });
    }

    fn set_frame_uniforms(&mut self, program: &ProgramId, uniforms: &FrameUniforms) {
        self.programs[program.0].frame = *uniforms;
        self.commands.push(Command::SetFrameUniforms {
            program: *program,
            uniforms: *uniforms,
        });
    }

    fn run_feedback_pass(
        &mut self,
        program: &ProgramId,
        binding: &HeadlessBinding,
        pass: &FeedbackPass,
    ) {
        assert_ne!(binding.source, binding.dest, "feedback pass reads its own target");
        let state = &self.programs[program.0];
        let mut frame = state.frame;
        frame.num_active_particles = pass.num_active_particles;
        frame.max_particles = pass.max_particles;
        let particles_in = std::mem::take(&mut self.buffers[binding.source.0]);
        kernel::run_pass(
            &particles_in,
            &mut self.buffers[binding.dest.0],
            &state.statics,
            &frame,
        );
        self.buffers[binding.source.0] = particles_in;
        self.commands.push(Command::FeedbackPass {
            program: *program,
            source: binding.source,
            dest: binding.dest,
            pass: *pass,
        });
    }
}
