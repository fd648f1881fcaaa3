use thiserror::Error;

/// Failures that prevent a particle system from being constructed. There is no
/// partially usable system: any of these aborts construction.
#[derive(Debug, Error)]
pub enum ParticleSystemError {
    #[error("no shader named {0:?} in the shader library")]
    MissingShader(String),

    #[error("failed to create update program {label:?}: {reason}")]
    ProgramCreation { label: String, reason: String },

    #[error("failed to allocate particle buffer {label:?}: {reason}")]
    BufferAllocation { label: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("no compatible graphics adapter found")]
    NoAdapter,

    #[error(transparent)]
    RequestDevice(#[from] wgpu::RequestDeviceError),
}

pub type Result<T> = std::result::Result<T, ParticleSystemError>;
