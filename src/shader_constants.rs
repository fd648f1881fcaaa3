// Shared between the crate and build.rs, which renders these values into the
// WGSL templates.

/// Invocations per workgroup of the particle update kernel.
pub const UPDATE_WORKGROUP_SIZE: u32 = 64;
