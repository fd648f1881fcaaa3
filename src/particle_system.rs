use cgmath::Vector3;
use log::{debug, info, warn};

use crate::curve::TornadoCurve;
use crate::error::{ParticleSystemError, Result};
use crate::feedback_buffers::FeedbackBuffers;
use crate::feedback_device::FeedbackDevice;
use crate::params::TornadoParams;
use crate::particle::{ParticleLayout, VertexAttributeDescriptor};
use crate::shader_utils::ShaderSource;
use crate::update_program::{FeedbackPass, FrameUniforms, ProgramDescriptor, StaticUniforms};

/// A tornado of particles advected along a cubic Bézier curve.
///
/// All particle state lives on the device. Each `update` runs one feedback
/// pass from the source buffer into the destination buffer and then swaps the
/// two, so `particle_positions_vbo` always names the most recent output.
pub struct ParticleSystem<D: FeedbackDevice> {
    device: D,
    program: D::Program,
    buffers: FeedbackBuffers<D>,
    curve: TornadoCurve,
    max_particles: u32,
    num_active_particles: u32,
    particle_randomness: f32,
    capacity_limiting: bool,
    frames: u64,
}

impl<D: FeedbackDevice> ParticleSystem<D> {
    /// Loads the update program, allocates and seeds both particle buffers
    /// and computes the initial curve. Any failure drops everything created
    /// so far.
    pub fn new(mut device: D, shaders: &dyn ShaderSource, params: &TornadoParams) -> Result<Self> {
        if params.max_particles == 0 {
            return Err(ParticleSystemError::Config(
                "max_particles must be at least 1".to_string(),
            ));
        }
        let descriptor = ProgramDescriptor::load(shaders)?;
        let program = device.create_program(&descriptor)?;
        device.set_static_uniforms(&program, &StaticUniforms::from(&params.program));

        let buffers = FeedbackBuffers::new(&mut device, &program, params.max_particles, params.seed)?;
        let curve = TornadoCurve::from_params(
            &params.curve,
            params.animated_control_points,
            params.particle_randomness,
        );

        let num_active_particles = if params.capacity_limiting {
            params.num_active_particles.min(params.max_particles)
        } else {
            params.max_particles
        };
        info!(
            "Tornado ready: {} of {} particles active, randomness {}",
            num_active_particles, params.max_particles, params.particle_randomness
        );
        Ok(ParticleSystem {
            device,
            program,
            buffers,
            curve,
            max_particles: params.max_particles,
            num_active_particles,
            particle_randomness: params.particle_randomness,
            capacity_limiting: params.capacity_limiting,
            frames: 0,
        })
    }

    /// Advances the simulation by `dt` seconds. Negative or non-finite steps
    /// are treated as zero.
    pub fn update(&mut self, dt: f64) {
        let dt = if dt.is_finite() && dt > 0.0 { dt as f32 } else { 0.0 };

        if self.curve.is_animated() {
            self.curve.advance(dt, self.particle_randomness);
        }

        let uniforms = FrameUniforms::new(
            self.curve.basis(),
            dt,
            self.particle_randomness,
            self.num_active_particles,
            self.max_particles,
        );
        self.device.set_frame_uniforms(&self.program, &uniforms);

        let pass = FeedbackPass {
            num_active_particles: self.num_active_particles,
            max_particles: self.max_particles,
        };
        self.device
            .run_feedback_pass(&self.program, self.buffers.source_binding(), &pass);

        // The destination just captured becomes the next source.
        self.buffers.swap();
        self.frames += 1;
    }

    pub fn set_num_active_particles(&mut self, num_active_particles: u32) {
        if !self.capacity_limiting {
            warn!(
                "Capacity limiting is disabled; keeping all {} particles active",
                self.max_particles
            );
            return;
        }
        self.num_active_particles = num_active_particles.min(self.max_particles);
        debug!("Active particles: {}", self.num_active_particles);
    }

    pub fn num_active_particles(&self) -> u32 {
        self.num_active_particles
    }

    pub fn max_particles(&self) -> u32 {
        self.max_particles
    }

    /// Values outside [0, 1] are accepted and exaggerate the effect.
    pub fn set_particle_randomness(&mut self, particle_randomness: f32) {
        self.particle_randomness = particle_randomness;
    }

    pub fn particle_randomness(&self) -> f32 {
        self.particle_randomness
    }

    /// The buffer holding the latest particle state. Renderers should query
    /// it again after every `update`.
    pub fn particle_positions_vbo(&self) -> &D::Buffer {
        self.buffers.source()
    }

    pub fn vertex_descriptor_for_particle_positions(&self) -> VertexAttributeDescriptor {
        ParticleLayout::positions_descriptor()
    }

    pub fn center_of_tornado(&self) -> Vector3<f32> {
        self.curve.center_of_tornado()
    }

    pub fn curve(&self) -> &TornadoCurve {
        &self.curve
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn device(&self) -> &D {
        &self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{BufferId, Command, HeadlessDevice};
    use crate::particle::ElementType;
    use crate::shader_utils::{EmbeddedShaders, ShaderMap};
    use std::f32::consts::TAU;

    fn params(max: u32, active: u32, randomness: f32) -> TornadoParams {
        TornadoParams {
            max_particles: max,
            num_active_particles: active,
            particle_randomness: randomness,
            seed: Some(42),
            ..TornadoParams::default()
        }
    }

    fn system(params: &TornadoParams) -> ParticleSystem<HeadlessDevice> {
        ParticleSystem::new(HeadlessDevice::new(), &EmbeddedShaders, params).unwrap()
    }

    #[test]
    fn active_count_is_clamped() {
        let mut system = system(&params(100, 10, 0.0));
        system.set_num_active_particles(50);
        assert_eq!(system.num_active_particles(), 50);
        system.set_num_active_particles(100);
        assert_eq!(system.num_active_particles(), 100);
        system.set_num_active_particles(99999);
        assert_eq!(system.num_active_particles(), system.max_particles());
        system.set_num_active_particles(0);
        assert_eq!(system.num_active_particles(), 0);
    }

    #[test]
    fn initial_active_count_is_clamped() {
        let system = system(&params(100, 500, 0.0));
        assert_eq!(system.num_active_particles(), 100);
    }

    #[test]
    fn disabled_capacity_limiting_keeps_everything_active() {
        let mut p = params(100, 10, 0.0);
        p.capacity_limiting = false;
        let mut system = system(&p);
        assert_eq!(system.num_active_particles(), 100);
        system.set_num_active_particles(5);
        assert_eq!(system.num_active_particles(), 100);
    }

    #[test]
    fn source_alternates_each_update() {
        let mut system = system(&params(100, 10, 0.5));
        let original_source = *system.particle_positions_vbo();
        system.update(1.0 / 60.0);
        let original_dest = *system.particle_positions_vbo();
        assert_ne!(original_source, original_dest);
        for k in 1..10 {
            system.update(1.0 / 60.0);
            let expected = if k % 2 == 1 { original_source } else { original_dest };
            assert_eq!(*system.particle_positions_vbo(), expected);
        }
        assert_eq!(system.frames(), 10);
    }

    #[test]
    fn center_is_midpoint_of_end_points() {
        let mut system = system(&params(100, 10, 0.7));
        for _ in 0..30 {
            system.update(0.05);
            let points = system.curve().control_points();
            let expected = points[0] + (points[3] - points[0]) * 0.5;
            let center = system.center_of_tornado();
            assert!((center.x - expected.x).abs() < 1e-5);
            assert!((center.y - expected.y).abs() < 1e-5);
            assert!((center.z - expected.z).abs() < 1e-5);
        }
    }

    #[test]
    fn seeded_records_are_in_range() {
        let system = system(&params(1000, 10, 0.0));
        let source: BufferId = *system.particle_positions_vbo();
        let particles = system.device().buffer_contents(source);
        assert_eq!(particles.len(), 1000);
        for particle in particles {
            assert_eq!(particle.position, [0.0; 3]);
            assert!((0.0..1.0).contains(&particle.parametric_dist));
            assert!((0.0..TAU).contains(&particle.rotation_angle));
        }
    }

    #[test]
    fn sixty_frames_at_sixty_hertz() {
        let mut system = system(&params(100, 10, 0.0));
        for _ in 0..60 {
            system.update(1.0 / 60.0);
        }
        assert_eq!(system.num_active_particles(), 10);
        assert_eq!(system.device().num_passes(), 60);

        let latest: BufferId = *system.particle_positions_vbo();
        let particles = system.device().buffer_contents(latest);
        for particle in &particles[..10] {
            assert!((0.0..1.0).contains(&particle.parametric_dist));
            assert!((0.0..TAU).contains(&particle.rotation_angle));
        }
    }

    #[test]
    fn randomness_changes_control_point_motion() {
        let mut calm = system(&params(100, 10, 0.0));
        let mut wild = system(&params(100, 10, 0.0));
        wild.set_particle_randomness(1.0);
        assert_eq!(wild.particle_randomness(), 1.0);
        for _ in 0..20 {
            calm.update(1.0 / 60.0);
            wild.update(1.0 / 60.0);
        }
        let calm_angle = calm.curve().p0_motion().unwrap().angle;
        let wild_angle = wild.curve().p0_motion().unwrap().angle;
        assert_ne!(calm_angle, wild_angle);

        wild.set_num_active_particles(99999);
        assert_eq!(wild.num_active_particles(), 100);
        assert_eq!(wild.frames() % 2, 0);
    }

    #[test]
    fn uniforms_precede_pass_and_swap_follows() {
        let mut system = system(&params(64, 32, 0.2));
        system.device.clear_commands();
        system.update(0.01);
        system.update(0.01);
        let commands = system.device().commands();
        assert_eq!(commands.len(), 4);
        let mut sources = Vec::new();
        for pair in commands.chunks(2) {
            match (&pair[0], &pair[1]) {
                (
                    Command::SetFrameUniforms { uniforms, .. },
                    Command::FeedbackPass {
                        source, dest, pass, ..
                    },
                ) => {
                    assert_eq!(uniforms.num_active_particles, 32);
                    assert_eq!(pass.num_active_particles, 32);
                    assert_eq!(pass.max_particles, 64);
                    sources.push((*source, *dest));
                }
                other => panic!("unexpected command order: {:?}", other),
            }
        }
        // The second pass reads what the first wrote.
        assert_eq!(sources[1].0, sources[0].1);
        assert_eq!(sources[1].1, sources[0].0);
    }

    #[test]
    fn invalid_time_steps_do_not_move_particles() {
        let mut p = params(16, 16, 0.0);
        p.animated_control_points = false;
        let mut system = system(&p);
        let before = system
            .device()
            .buffer_contents(*system.particle_positions_vbo())
            .to_vec();
        system.update(-1.0);
        system.update(f64::NAN);
        let after = system.device().buffer_contents(*system.particle_positions_vbo());
        for (a, b) in before.iter().zip(after) {
            assert_eq!(a.parametric_dist, b.parametric_dist);
            assert_eq!(a.rotation_angle, b.rotation_angle);
        }
    }

    #[test]
    fn position_descriptor() {
        let system = system(&params(10, 10, 0.0));
        let descriptor = system.vertex_descriptor_for_particle_positions();
        assert_eq!(descriptor.num_components, 3);
        assert_eq!(descriptor.element_type, ElementType::Float32);
        assert_eq!(descriptor.stride, 20);
        assert_eq!(descriptor.offset, 0);
    }

    #[test]
    fn missing_shader_fails_construction() {
        let result = ParticleSystem::new(HeadlessDevice::new(), &ShaderMap::new(), &params(10, 10, 0.0));
        assert!(matches!(result, Err(ParticleSystemError::MissingShader(_))));
    }

    #[test]
    fn allocation_failure_fails_construction() {
        let device = HeadlessDevice::with_max_buffer_size(1024);
        let result = ParticleSystem::new(device, &EmbeddedShaders, &params(1000, 10, 0.0));
        assert!(matches!(
            result,
            Err(ParticleSystemError::BufferAllocation { .. })
        ));
    }

    #[test]
    fn huge_capacity_fails_without_allocating() {
        let device = HeadlessDevice::with_max_buffer_size(1024);
        let result = ParticleSystem::new(device, &EmbeddedShaders, &params(u32::MAX, 10, 0.0));
        assert!(matches!(
            result,
            Err(ParticleSystemError::BufferAllocation { .. })
        ));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let result = ParticleSystem::new(HeadlessDevice::new(), &EmbeddedShaders, &params(0, 0, 0.0));
        assert!(matches!(result, Err(ParticleSystemError::Config(_))));
    }
}
