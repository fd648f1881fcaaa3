use std::borrow::Cow;

use crate::curve::BezierBasis;
use crate::error::{ParticleSystemError, Result};
use crate::params::ProgramParams;
use crate::particle::ParticleLayout;
use crate::shader_constants::UPDATE_WORKGROUP_SIZE;
use crate::shader_utils::ShaderSource;

pub const UPDATE_SHADER: &str = "tornado_update.wgsl";
pub const UPDATE_ENTRY_POINT: &str = "main";

// Set once at load. Must match StaticUniforms in tornado_update.wgsl.
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct StaticUniforms {
    pub rotation_radius: f32,
    pub rotational_velocity: f32,
    pub parametric_velocity: f32,
    _padding: f32,
}

impl From<&ProgramParams> for StaticUniforms {
    fn from(params: &ProgramParams) -> Self {
        StaticUniforms {
            rotation_radius: params.rotation_radius,
            rotational_velocity: params.rotational_velocity,
            parametric_velocity: params.parametric_velocity,
            _padding: 0.0,
        }
    }
}

// Uploaded before every feedback pass. Must match FrameUniforms in
// tornado_update.wgsl.
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct FrameUniforms {
    pub basis_matrix: [[f32; 4]; 4],
    pub deriv_matrix: [[f32; 4]; 4],
    pub delta_time: f32,
    pub particle_randomness: f32,
    pub num_active_particles: u32,
    pub max_particles: u32,
}

impl FrameUniforms {
    pub fn new(
        basis: &BezierBasis,
        delta_time: f32,
        particle_randomness: f32,
        num_active_particles: u32,
        max_particles: u32,
    ) -> Self {
        FrameUniforms {
            basis_matrix: basis.basis_matrix.into(),
            deriv_matrix: basis.deriv_matrix.into(),
            delta_time,
            particle_randomness,
            num_active_particles,
            max_particles,
        }
    }
}

impl Default for FrameUniforms {
    fn default() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}

/// Everything a backend needs to build the update program.
#[derive(Debug, Clone)]
pub struct ProgramDescriptor<'a> {
    pub label: &'a str,
    pub source: Cow<'a, str>,
    pub entry_point: &'a str,
    pub captured_outputs: &'a [&'a str],
    pub workgroup_size: u32,
}

impl<'a> ProgramDescriptor<'a> {
    /// Looks up the update shader. A missing shader aborts construction.
    pub fn load(shaders: &'a dyn ShaderSource) -> Result<Self> {
        let source = shaders.require(UPDATE_SHADER)?;
        Ok(ProgramDescriptor {
            label: UPDATE_SHADER,
            source,
            entry_point: UPDATE_ENTRY_POINT,
            captured_outputs: &ParticleLayout::CAPTURED_OUTPUTS,
            workgroup_size: UPDATE_WORKGROUP_SIZE,
        })
    }

    /// Checks the source declares the entry point and every captured output.
    /// Backends run this before handing the source to the driver.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| ParticleSystemError::ProgramCreation {
            label: self.label.to_string(),
            reason,
        };
        if !self.source.contains("@compute") {
            return Err(fail("source has no compute stage".to_string()));
        }
        if !self.source.contains(&format!("fn {}(", self.entry_point)) {
            return Err(fail(format!("entry point {:?} not found", self.entry_point)));
        }
        for output in self.captured_outputs {
            if !self.source.contains(*output) {
                return Err(fail(format!("captured output {:?} is not declared", output)));
            }
        }
        if self.workgroup_size == 0 {
            return Err(fail("workgroup size must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Workgroups needed for one invocation per particle.
pub fn workgroup_count(num_particles: u32, workgroup_size: u32) -> u32 {
    num_particles.div_ceil(workgroup_size)
}

/// One feedback pass: read the source binding, write the destination.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FeedbackPass {
    pub num_active_particles: u32,
    pub max_particles: u32,
}
