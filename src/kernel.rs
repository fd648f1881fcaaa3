//! Host implementation of the particle update. It follows tornado_update.wgsl
//! step for step and is what `HeadlessDevice` runs in place of the GPU.

use cgmath::{InnerSpace, Matrix4, Vector3, Vector4};

use crate::curve::{wrap_angle, wrap_unit};
use crate::particle::Particle;
use crate::update_program::{FrameUniforms, StaticUniforms};

fn pcg_hash(value: u32) -> u32 {
    let state = value.wrapping_mul(747796405).wrapping_add(2891336453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277803737);
    (word >> 22) ^ word
}

/// Uniform value in [0, 1) derived from the particle index.
pub fn jitter(i: u32) -> f32 {
    (pcg_hash(i) >> 8) as f32 / 16777216.0
}

pub fn advance_particle(
    i: u32,
    particle: &Particle,
    statics: &StaticUniforms,
    frame: &FrameUniforms,
) -> Particle {
    let r = frame.particle_randomness;
    let speed_jitter = 1.0 + r * (jitter(i) - 0.5);
    let dt = frame.delta_time * speed_jitter;
    let dist = wrap_unit(particle.parametric_dist + statics.parametric_velocity * dt);
    let angle = wrap_angle(particle.rotation_angle + statics.rotational_velocity * dt);

    let t = dist;
    let powers = Vector4::new(1.0, t, t * t, t * t * t);
    let basis = Matrix4::from(frame.basis_matrix);
    let deriv = Matrix4::from(frame.deriv_matrix);
    let center = (basis * powers).truncate();
    let raw_tangent = (deriv * powers).truncate();
    let tangent = if raw_tangent.magnitude() > 1e-6 {
        raw_tangent.normalize()
    } else {
        Vector3::unit_y()
    };
    let ref_axis = if tangent.dot(Vector3::unit_x()).abs() > 0.99 {
        Vector3::unit_y()
    } else {
        Vector3::unit_x()
    };
    let normal = tangent.cross(ref_axis).normalize();
    let binormal = tangent.cross(normal);

    let radius =
        statics.rotation_radius * (0.25 + t) * (1.0 + r * (jitter(i ^ 0x9e37) - 0.5));
    let position = center + (normal * angle.cos() + binormal * angle.sin()) * radius;

    Particle {
        position: position.into(),
        parametric_dist: dist,
        rotation_angle: angle,
    }
}

/// Runs one pass over the whole capacity. Records past the active count are
/// copied through unchanged.
pub fn run_pass(
    particles_in: &[Particle],
    particles_out: &mut [Particle],
    statics: &StaticUniforms,
    frame: &FrameUniforms,
) {
    let count = (frame.max_particles as usize)
        .min(particles_in.len())
        .min(particles_out.len());
    for (i, (input, output)) in particles_in[..count]
        .iter()
        .zip(particles_out[..count].iter_mut())
        .enumerate()
    {
        *output = if (i as u32) < frame.num_active_particles {
            advance_particle(i as u32, input, statics, frame)
        } else {
            *input
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::TornadoCurve;
    use crate::params::{CurveParams, ProgramParams};
    use crate::particle::seed_particles;
    use std::f32::consts::TAU;

    fn uniforms(randomness: f32, active: u32, max: u32) -> (StaticUniforms, FrameUniforms) {
        let curve = TornadoCurve::from_params(&CurveParams::default(), false, randomness);
        (
            StaticUniforms::from(&ProgramParams::default()),
            FrameUniforms::new(curve.basis(), 1.0 / 60.0, randomness, active, max),
        )
    }

    #[test]
    fn jitter_is_in_unit_range() {
        for i in 0..10_000 {
            let j = jitter(i);
            assert!((0.0..1.0).contains(&j));
        }
        assert_ne!(jitter(1), jitter(2));
    }

    #[test]
    fn inactive_records_are_copied_through() {
        let (statics, frame) = uniforms(0.5, 10, 100);
        let input = seed_particles(100, Some(1));
        let mut output = vec![Particle::default(); 100];
        run_pass(&input, &mut output, &statics, &frame);
        assert_eq!(&input[10..], &output[10..]);
        for (before, after) in input[..10].iter().zip(&output[..10]) {
            assert_ne!(before.parametric_dist, after.parametric_dist);
        }
    }

    #[test]
    fn zero_randomness_advances_uniformly() {
        let (statics, frame) = uniforms(0.0, 2, 2);
        let particle = Particle {
            position: [0.0; 3],
            parametric_dist: 0.1,
            rotation_angle: 1.0,
        };
        let a = advance_particle(0, &particle, &statics, &frame);
        let b = advance_particle(1, &particle, &statics, &frame);
        assert_eq!(a, b);
        let expected = 0.1 + statics.parametric_velocity * frame.delta_time;
        assert!((a.parametric_dist - expected).abs() < 1e-6);
    }

    #[test]
    fn particles_orbit_near_the_curve() {
        let (statics, frame) = uniforms(1.0, 1000, 1000);
        let curve = TornadoCurve::from_params(&CurveParams::default(), false, 1.0);
        let mut particles = seed_particles(1000, Some(9));
        let mut scratch = particles.clone();
        for _ in 0..300 {
            run_pass(&particles, &mut scratch, &statics, &frame);
            std::mem::swap(&mut particles, &mut scratch);
        }
        // Radius is at most rotation_radius * 1.25 * 1.5.
        let max_radius = statics.rotation_radius * 1.25 * 1.5 + 1e-3;
        for particle in &particles {
            assert!((0.0..1.0).contains(&particle.parametric_dist));
            assert!((0.0..TAU).contains(&particle.rotation_angle));
            let center = curve.basis().evaluate(particle.parametric_dist);
            let offset = Vector3::from(particle.position) - center;
            assert!(offset.magnitude() <= max_radius);
        }
    }
}
