use cgmath::{Matrix3, Matrix4, Rad, Vector3, Vector4};
use std::f32::consts::TAU;

use crate::params::{CurveParams, MotionParams};

/// Wraps an angle into `[0, 2π)`.
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid can round up to the modulus for tiny negative inputs.
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Wraps a parametric distance into `[0, 1)`.
pub fn wrap_unit(x: f32) -> f32 {
    let wrapped = x - x.floor();
    if wrapped >= 1.0 {
        0.0
    } else {
        wrapped
    }
}

#[rustfmt::skip]
const BEZIER_COEFFICIENTS: Matrix4<f32> = Matrix4::new(
     1.0,  0.0,  0.0,  0.0,
    -3.0,  3.0,  0.0,  0.0,
     3.0, -6.0,  3.0,  0.0,
    -1.0,  3.0, -3.0,  1.0,
);

#[rustfmt::skip]
const BEZIER_DERIV_COEFFICIENTS: Matrix4<f32> = Matrix4::new(
    -3.0,   3.0,  0.0, 0.0,
     6.0, -12.0,  6.0, 0.0,
    -3.0,   9.0, -9.0, 3.0,
     0.0,   0.0,  0.0, 0.0,
);

/// Matrix form of a cubic Bézier and its derivative. Multiplying either matrix
/// by `(1, t, t², t³)` yields the curve point or the tangent at `t`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BezierBasis {
    pub basis_matrix: Matrix4<f32>,
    pub deriv_matrix: Matrix4<f32>,
}

impl BezierBasis {
    pub fn from_control_points(points: &[Vector3<f32>; 4]) -> Self {
        // Control points are the columns, with w = 0.
        let p = Matrix4::from_cols(
            points[0].extend(0.0),
            points[1].extend(0.0),
            points[2].extend(0.0),
            points[3].extend(0.0),
        );
        BezierBasis {
            basis_matrix: p * BEZIER_COEFFICIENTS,
            deriv_matrix: p * BEZIER_DERIV_COEFFICIENTS,
        }
    }

    fn powers(t: f32) -> Vector4<f32> {
        Vector4::new(1.0, t, t * t, t * t * t)
    }

    pub fn evaluate(&self, t: f32) -> Vector3<f32> {
        (self.basis_matrix * BezierBasis::powers(t)).truncate()
    }

    /// Unnormalized derivative of the curve at `t`.
    pub fn tangent(&self, t: f32) -> Vector3<f32> {
        (self.deriv_matrix * BezierBasis::powers(t)).truncate()
    }
}

/// An end point travelling on its own circle in the XZ plane around
/// `center_of_rotation`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlPointMotion {
    pub center_of_rotation: Vector3<f32>,
    pub radius: f32,
    pub angle: f32,
    pub rotation_speed: f32,
}

impl ControlPointMotion {
    pub fn from_params(center_of_rotation: Vector3<f32>, params: &MotionParams) -> Self {
        ControlPointMotion {
            center_of_rotation,
            radius: params.radius,
            angle: wrap_angle(params.initial_angle),
            rotation_speed: params.rotation_speed,
        }
    }

    pub fn effective_radius(&self, randomness: f32) -> f32 {
        self.radius * (1.0 + 2.0 * randomness)
    }

    pub fn effective_speed(&self, randomness: f32) -> f32 {
        self.rotation_speed * 2.0 * randomness
    }

    pub fn advance(&mut self, dt: f32, randomness: f32) {
        self.angle = wrap_angle(self.angle + self.effective_speed(randomness) * dt);
    }

    pub fn position(&self, randomness: f32) -> Vector3<f32> {
        let offset = Vector3::unit_x() * self.effective_radius(randomness);
        self.center_of_rotation + Matrix3::from_angle_y(Rad(self.angle)) * offset
    }
}

/// The spatial skeleton of the tornado: four control points plus the cached
/// basis that the update program samples.
#[derive(Debug, Clone)]
pub struct TornadoCurve {
    control_points: [Vector3<f32>; 4],
    p0_motion: Option<ControlPointMotion>,
    p3_motion: Option<ControlPointMotion>,
    basis: BezierBasis,
}

impl TornadoCurve {
    pub fn new(control_points: [Vector3<f32>; 4]) -> Self {
        TornadoCurve {
            basis: BezierBasis::from_control_points(&control_points),
            control_points,
            p0_motion: None,
            p3_motion: None,
        }
    }

    /// Builds the curve from configuration. With `animated` set, p0 and p3 are
    /// placed on their circles immediately.
    pub fn from_params(params: &CurveParams, animated: bool, randomness: f32) -> Self {
        let mut curve = TornadoCurve::new([
            params.p0.into(),
            params.p1.into(),
            params.p2.into(),
            params.p3.into(),
        ]);
        if animated {
            curve.p0_motion = Some(ControlPointMotion::from_params(
                params.p0.into(),
                &params.p0_motion,
            ));
            curve.p3_motion = Some(ControlPointMotion::from_params(
                params.p3.into(),
                &params.p3_motion,
            ));
            curve.place_animated_points(randomness);
        }
        curve
    }

    pub fn set_control_points(&mut self, control_points: [Vector3<f32>; 4]) {
        self.control_points = control_points;
        self.basis = BezierBasis::from_control_points(&self.control_points);
    }

    fn place_animated_points(&mut self, randomness: f32) {
        if let Some(motion) = &self.p0_motion {
            self.control_points[0] = motion.position(randomness);
        }
        if let Some(motion) = &self.p3_motion {
            self.control_points[3] = motion.position(randomness);
        }
        self.basis = BezierBasis::from_control_points(&self.control_points);
    }

    /// Moves the animated end points and recomputes the basis.
    pub fn advance(&mut self, dt: f32, randomness: f32) {
        if let Some(motion) = &mut self.p0_motion {
            motion.advance(dt, randomness);
        }
        if let Some(motion) = &mut self.p3_motion {
            motion.advance(dt, randomness);
        }
        self.place_animated_points(randomness);
    }

    pub fn is_animated(&self) -> bool {
        self.p0_motion.is_some() || self.p3_motion.is_some()
    }

    pub fn control_points(&self) -> &[Vector3<f32>; 4] {
        &self.control_points
    }

    pub fn p0_motion(&self) -> Option<&ControlPointMotion> {
        self.p0_motion.as_ref()
    }

    pub fn p3_motion(&self) -> Option<&ControlPointMotion> {
        self.p3_motion.as_ref()
    }

    pub fn basis(&self) -> &BezierBasis {
        &self.basis
    }

    /// Midpoint between the two end points.
    pub fn center_of_tornado(&self) -> Vector3<f32> {
        let p0 = self.control_points[0];
        let p3 = self.control_points[3];
        p0 + (p3 - p0) * 0.5
    }
}
