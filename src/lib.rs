pub mod curve;
pub mod error;
pub mod feedback_buffers;
pub mod feedback_device;
pub mod fps_estimator;
pub mod gpu_check;
pub mod headless;
pub mod kernel;
pub mod params;
pub mod particle;
pub mod particle_system;
pub mod shader_constants;
pub mod shader_utils;
pub mod update_program;
pub mod wgpu_device;

pub use error::{ParticleSystemError, Result};
pub use particle_system::ParticleSystem;
