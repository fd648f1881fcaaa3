use rand::{rngs::StdRng, Rng, SeedableRng};
use std::f32::consts::TAU;

use crate::curve::wrap_angle;

// This should match the struct defined in the update shader.
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Particle {
    pub position: [f32; 3],
    // Position along the curve, [0, 1).
    pub parametric_dist: f32,
    // Phase of the orbit around the curve, [0, 2π).
    pub rotation_angle: f32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ElementType {
    Float32,
}

/// How a renderer should read one field out of the particle buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VertexAttributeDescriptor {
    pub num_components: u32,
    pub element_type: ElementType,
    pub stride: wgpu::BufferAddress,
    pub offset: wgpu::BufferAddress,
}

impl VertexAttributeDescriptor {
    pub fn vertex_format(&self) -> Option<wgpu::VertexFormat> {
        match (self.element_type, self.num_components) {
            (ElementType::Float32, 1) => Some(wgpu::VertexFormat::Float32),
            (ElementType::Float32, 2) => Some(wgpu::VertexFormat::Float32x2),
            (ElementType::Float32, 3) => Some(wgpu::VertexFormat::Float32x3),
            (ElementType::Float32, 4) => Some(wgpu::VertexFormat::Float32x4),
            _ => None,
        }
    }
}

/// Interleaved layout of `Particle` records. Both buffers of the pair share it,
/// so a binding built for one buffer reads the other the same way.
pub struct ParticleLayout;

impl ParticleLayout {
    pub const STRIDE: wgpu::BufferAddress = std::mem::size_of::<Particle>() as wgpu::BufferAddress;
    pub const POSITION_OFFSET: wgpu::BufferAddress = 0;
    pub const PARAMETRIC_DIST_OFFSET: wgpu::BufferAddress = 3 * 4;
    pub const ROTATION_ANGLE_OFFSET: wgpu::BufferAddress = 4 * 4;

    // Position, parametric distance, rotation angle.
    pub const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32, 2 => Float32];

    /// Names of the fields the update program writes, in record order.
    pub const CAPTURED_OUTPUTS: [&'static str; 3] =
        ["position", "parametric_dist", "rotation_angle"];

    pub fn vertex_buffer_layout(
        step_mode: wgpu::VertexStepMode,
    ) -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: ParticleLayout::STRIDE,
            step_mode,
            attributes: &ParticleLayout::ATTRIBUTES,
        }
    }

    pub fn positions_descriptor() -> VertexAttributeDescriptor {
        VertexAttributeDescriptor {
            num_components: 3,
            element_type: ElementType::Float32,
            stride: ParticleLayout::STRIDE,
            offset: ParticleLayout::POSITION_OFFSET,
        }
    }

    pub fn buffer_size(num_particles: u32) -> wgpu::BufferAddress {
        num_particles as wgpu::BufferAddress * ParticleLayout::STRIDE
    }
}

/// Scatters particles uniformly over the curve and the orbit phase. Positions
/// start at the origin and are filled in by the first update.
pub fn seed_particles(num_particles: u32, seed: Option<u64>) -> Vec<Particle> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    (0..num_particles)
        .map(|_| Particle {
            position: [0.0; 3],
            parametric_dist: rng.gen::<f32>(),
            rotation_angle: wrap_angle(rng.gen::<f32>() * TAU),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_struct() {
        assert_eq!(ParticleLayout::STRIDE, 20);
        let particle = Particle {
            position: [1.0, 2.0, 3.0],
            parametric_dist: 4.0,
            rotation_angle: 5.0,
        };
        let floats: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&particle));
        assert_eq!(floats[(ParticleLayout::PARAMETRIC_DIST_OFFSET / 4) as usize], 4.0);
        assert_eq!(floats[(ParticleLayout::ROTATION_ANGLE_OFFSET / 4) as usize], 5.0);
        assert_eq!(ParticleLayout::ATTRIBUTES[1].offset, ParticleLayout::PARAMETRIC_DIST_OFFSET);
        assert_eq!(ParticleLayout::ATTRIBUTES[2].offset, ParticleLayout::ROTATION_ANGLE_OFFSET);
    }

    #[test]
    fn vertex_layout_for_renderers() {
        let layout = ParticleLayout::vertex_buffer_layout(wgpu::VertexStepMode::Instance);
        assert_eq!(layout.array_stride, 20);
        assert_eq!(layout.step_mode, wgpu::VertexStepMode::Instance);
        assert_eq!(layout.attributes.len(), 3);
        let position = &layout.attributes[0];
        assert_eq!(position.shader_location, 0);
        assert_eq!(position.offset, ParticleLayout::positions_descriptor().offset);
        assert_eq!(
            Some(position.format),
            ParticleLayout::positions_descriptor().vertex_format()
        );
    }

    #[test]
    fn positions_descriptor() {
        let descriptor = ParticleLayout::positions_descriptor();
        assert_eq!(descriptor.num_components, 3);
        assert_eq!(descriptor.element_type, ElementType::Float32);
        assert_eq!(descriptor.stride, 20);
        assert_eq!(descriptor.offset, 0);
        assert_eq!(descriptor.vertex_format(), Some(wgpu::VertexFormat::Float32x3));
    }

    #[test]
    fn seeds_are_in_range() {
        let particles = seed_particles(10_000, None);
        assert_eq!(particles.len(), 10_000);
        for particle in &particles {
            assert_eq!(particle.position, [0.0; 3]);
            assert!(particle.parametric_dist >= 0.0 && particle.parametric_dist < 1.0);
            assert!(particle.rotation_angle >= 0.0 && particle.rotation_angle < TAU);
        }
    }

    #[test]
    fn fixed_seed_is_reproducible() {
        assert_eq!(seed_particles(64, Some(3)), seed_particles(64, Some(3)));
        assert_ne!(seed_particles(64, Some(3)), seed_particles(64, Some(4)));
    }
}
