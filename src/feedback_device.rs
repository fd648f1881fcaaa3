use crate::error::Result;
use crate::particle::Particle;
use crate::update_program::{FeedbackPass, FrameUniforms, ProgramDescriptor, StaticUniforms};

/// The GPU services the particle system depends on: program creation, buffer
/// allocation, bindings, uniform upload and the feedback pass itself.
///
/// Handles are owned by the caller and released when dropped.
pub trait FeedbackDevice {
    type Program;
    type Buffer;
    type Binding;

    /// Largest particle buffer, in bytes, the device will allocate.
    fn max_buffer_size(&self) -> u64;

    fn create_program(&mut self, descriptor: &ProgramDescriptor<'_>) -> Result<Self::Program>;

    /// Allocates room for `capacity` particles. `contents`, when given, holds
    /// exactly `capacity` records; otherwise the buffer is left for the
    /// feedback pass to fill.
    fn create_particle_buffer(
        &mut self,
        label: &str,
        capacity: u32,
        contents: Option<&[Particle]>,
    ) -> Result<Self::Buffer>;

    /// Binds `source` as the pass input and `dest` as the capture target.
    fn create_binding(
        &mut self,
        program: &Self::Program,
        source: &Self::Buffer,
        dest: &Self::Buffer,
    ) -> Result<Self::Binding>;

    fn set_static_uniforms(&mut self, program: &Self::Program, uniforms: &StaticUniforms);

    fn set_frame_uniforms(&mut self, program: &Self::Program, uniforms: &FrameUniforms);

    /// Submits one pass. Returns once the work is queued, not when it has run.
    fn run_feedback_pass(
        &mut self,
        program: &Self::Program,
        binding: &Self::Binding,
        pass: &FeedbackPass,
    );
}
